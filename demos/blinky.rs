// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use gpio_linereq::line::options::Drive;
use gpio_linereq::line::values::LineValue;
use gpio_linereq::{Chip, LineConfig};
use quicli::prelude::*;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::{Duration, Instant};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Cli {
    /// The gpiochip device (e.g. /dev/gpiochip0)
    chip: PathBuf,
    /// The offset of the GPIO line for the provided chip
    line: u32,
    /// Period in milliseconds
    period_ms: u64,
    /// Duration over which to blink in milliseconds
    duration_ms: u64,
    /// Drive the line open drain
    #[structopt(long = "open-drain")]
    open_drain: bool,
}

fn do_main(args: Cli) -> anyhow::Result<()> {
    let chip = Chip::open(&args.chip)?;

    let drive = if args.open_drain {
        Drive::OpenDrain
    } else {
        Drive::PushPull
    };

    // NOTE: the initial value is part of the request so the line never
    // glitches high before the first write
    let mut req = chip.request(args.line)?;
    req.reserve(
        "blinky",
        0,
        &[LineConfig::new([args.line])
            .as_output()
            .with_drive(drive)
            .with_values([false])],
    )?;

    let duration = Duration::from_millis(args.duration_ms);
    let start_time = Instant::now();
    while start_time.elapsed() < duration {
        sleep(Duration::from_millis(args.period_ms));
        req.write(&LineValue::Active)?;
        sleep(Duration::from_millis(args.period_ms));
        req.write(&LineValue::Inactive)?;
    }

    req.release();
    Ok(())
}

fn main() -> CliResult {
    let args = Cli::from_args();
    do_main(args).or_else(|e| {
        error!("{:?}", e);
        Ok(())
    })
}
