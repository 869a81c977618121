// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Clone of functionality of linux/tools/gpio/lsgpio.c

use gpio_linereq::{
    chips,
    line::options::{Bias, Direction, Drive, EdgeDetect},
    LineInfo,
};

fn describe(info: &LineInfo) -> String {
    let mut flags = vec![];

    if info.is_used() {
        flags.push("used");
    }

    match info.direction() {
        Direction::Input => flags.push("input"),
        Direction::Output => flags.push("output"),
    }

    if info.is_active_low() {
        flags.push("active-low");
    }

    match info.drive() {
        Some(Drive::OpenDrain) => flags.push("open-drain"),
        Some(Drive::OpenSource) => flags.push("open-source"),
        Some(Drive::PushPull) | None => (),
    }

    match info.bias() {
        Some(Bias::PullUp) => flags.push("pull-up"),
        Some(Bias::PullDown) => flags.push("pull-down"),
        Some(Bias::Disabled) => flags.push("bias-disabled"),
        None => (),
    }

    match info.edge_detection() {
        Some(EdgeDetect::Rising) => flags.push("rising-edge"),
        Some(EdgeDetect::Falling) => flags.push("falling-edge"),
        Some(EdgeDetect::Both) => flags.push("both-edges"),
        None => (),
    }

    let mut usage = if !flags.is_empty() {
        format!("[{}]", flags.join(" "))
    } else {
        "".to_owned()
    };

    if let Some(debounce) = info.debounce() {
        usage.push_str(&format!(" debounce={}us", debounce.as_micros()));
    }

    usage
}

fn main() {
    let chip_iterator = match chips() {
        Ok(chips) => chips,
        Err(e) => {
            println!("Failed to get chip iterator: {:?}", e);
            return;
        }
    };

    for chip in chip_iterator {
        let chip = match chip {
            Ok(chip) => chip,
            Err(e) => {
                eprintln!("Failed to open chip: {e}");
                continue;
            }
        };

        println!(
            "GPIO chip: {}, \"{}\", \"{}\", {} GPIO Lines",
            chip.path().display(),
            chip.name(),
            chip.label(),
            chip.num_lines()
        );
        for (lineno, info) in chip.line_infos().enumerate() {
            let info = match info {
                Ok(info) => info,
                Err(e) => {
                    eprintln!("\tline {lineno:>3}: error {e}");
                    continue;
                }
            };

            println!(
                "\tline {lineno:>3}: {name} {consumer} {usage}",
                lineno = info.offset(),
                name = info.name().unwrap_or("unnamed"),
                consumer = info.consumer().unwrap_or("unused"),
                usage = describe(&info),
            );
        }
        println!();
    }
}
