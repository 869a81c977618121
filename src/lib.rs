// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The `gpio-linereq` crate provides line requests over version 2 of the
//! [GPIO character device
//! ABI](https://www.kernel.org/doc/Documentation/ABI/testing/gpio-cdev).
//!
//! A [`Chip`] is opened from `/dev/gpiochipN`.  Lines are claimed through a
//! [`Request`], configured with one [`LineConfig`] per group of lines that
//! share a configuration.  The kernel addresses the lines of a request by
//! their position in the request, so the crate keeps each request's lines in
//! a [`LineSet`] and translates between line numbers and those positions.
//!
//! # Examples
//!
//! Mirror an input line onto an output line on every edge:
//!
//! ```no_run
//! use gpio_linereq::{line::options::EdgeDetect, Chip, LineConfig};
//!
//! fn mirror_gpio(input: u32, output: u32) -> gpio_linereq::Result<()> {
//!     let chip = Chip::open("/dev/gpiochip0")?;
//!
//!     let mut req = chip.request([input, output])?;
//!     req.reserve(
//!         "mirror-gpio",
//!         0,
//!         &[
//!             LineConfig::new([input]).with_edge_detect(EdgeDetect::Both),
//!             LineConfig::new([output]).as_output().with_values([false]),
//!         ],
//!     )?;
//!
//!     loop {
//!         let event = req.read_edge_event()?;
//!         println!("{:?}", event);
//!         req.set_value(output, req.value(input)?)?;
//!     }
//! }
//!
//! # fn main() -> gpio_linereq::Result<()> {
//! #     mirror_gpio(0, 1)
//! # }
//! ```
//!
//! To get the state of a GPIO Line on a given chip:
//!
//! ```no_run
//! use gpio_linereq::{Chip, LineConfig};
//!
//! # fn main() -> gpio_linereq::Result<()> {
//! // Read the state of GPIO4 on a raspberry pi.  /dev/gpiochip0
//! // maps to the driver for the SoC (builtin) GPIO controller.
//! // The lines are released when the request is dropped.
//! let chip = Chip::open("/dev/gpiochip0")?;
//! let mut req = chip.request(4u32)?;
//! req.reserve("read-input", 0, &[LineConfig::new([4]).as_input()])?;
//! for _ in 1..4 {
//!     println!("Value: {:?}", req.value(4)?);
//! }
//! # Ok(()) }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod errors;

pub mod fixed_str;

#[allow(non_camel_case_types)]
pub mod uapi;

pub mod gateway;

pub mod chip;

pub mod line;

pub mod request;

#[cfg(test)]
mod sim;

pub use chip::{chips, Chip, ChipInfo};
pub use errors::{Error, IoctlKind, Result};
pub use line::{options::LineConfig, Line, LineInfo, LineSet};
pub use request::Request;
