// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Print edge events on a set of input lines, in the spirit of
//! linux/tools/gpio/gpio-event-mon.c

use gpio_linereq::line::event::{EdgeEvent, EdgeKind};
use gpio_linereq::line::options::{Bias, EdgeDetect};
use gpio_linereq::{Chip, LineConfig};
use quicli::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Cli {
    /// The gpiochip device (e.g. /dev/gpiochip0)
    chip: PathBuf,
    /// The offsets of the GPIO lines to watch
    lines: Vec<u32>,
    /// Only report rising edges
    #[structopt(long = "rising", conflicts_with = "falling")]
    rising: bool,
    /// Only report falling edges
    #[structopt(long = "falling")]
    falling: bool,
    /// Enable the internal pull-up
    #[structopt(long = "pull-up")]
    pull_up: bool,
    /// Debounce period in microseconds
    #[structopt(long = "debounce-us")]
    debounce_us: Option<u32>,
    /// Stop after this many seconds without an event
    #[structopt(long = "idle-secs")]
    idle_secs: Option<u64>,
}

fn do_main(args: Cli) -> anyhow::Result<()> {
    let chip = Chip::open(&args.chip)?;

    let edge = match (args.rising, args.falling) {
        (true, _) => EdgeDetect::Rising,
        (_, true) => EdgeDetect::Falling,
        _ => EdgeDetect::Both,
    };
    let mut config = LineConfig::new(args.lines.iter().copied()).with_edge_detect(edge);
    if args.pull_up {
        config = config.with_bias(Bias::PullUp);
    }
    if let Some(us) = args.debounce_us {
        config = config.with_debounce(Duration::from_micros(us.into()));
    }

    let mut req = chip.request(args.lines.clone())?;
    req.reserve("monitor", 64, &[config])?;
    info!("watching lines {:?} on {}", req.lines(), chip.name());

    let timeout = args.idle_secs.map(Duration::from_secs);
    let mut events = [EdgeEvent::default(); 16];
    while req.wait_edge_event(timeout)? {
        let n = req.read_edge_events(&mut events)?;
        for event in &events[..n] {
            let kind = match event.kind {
                EdgeKind::Rising => "rising",
                EdgeKind::Falling => "falling",
            };
            println!(
                "{}.{:09} line {:>3} {:<7} seqno {} (line seqno {})",
                event.timestamp().as_secs(),
                event.timestamp().subsec_nanos(),
                event.offset,
                kind,
                event.seqno,
                event.line_seqno
            );
        }
    }

    info!("no events for {:?}, exiting", timeout);
    Ok(())
}

fn main() -> CliResult {
    let args = Cli::from_args();
    do_main(args).or_else(|e| {
        error!("{:?}", e);
        Ok(())
    })
}
