mod common;

pub use common::*;

pub mod v2;
