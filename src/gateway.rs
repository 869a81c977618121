//! The system calls the chip and request layers are built on.
//!
//! Chips are generic over a [`Gateway`] so the encoding and request logic can
//! run against something other than a real device.  [`Kernel`] is the
//! implementation backed by the GPIO character device.

use std::{
    fs::OpenOptions,
    os::{
        fd::{BorrowedFd, IntoRawFd, RawFd},
        unix::fs::OpenOptionsExt,
    },
    path::Path,
    time::Duration,
};

use nix::poll::{PollFd, PollFlags, PollTimeout};

use crate::uapi::{self, v2};

/// Access to the uAPI calls on a chip or line request file descriptor.
///
/// Implementations return the raw errno; classification happens in the
/// callers, which know which call failed.
pub trait Gateway {
    /// Open a chip device read-write and close-on-exec.
    fn open(&self, path: &Path) -> std::io::Result<RawFd>;

    fn close(&self, fd: RawFd) -> nix::Result<()>;

    fn get_chip_info(&self, fd: RawFd, info: &mut uapi::gpio_chip_info) -> nix::Result<()>;

    fn get_line_info(&self, fd: RawFd, info: &mut v2::gpio_line_info) -> nix::Result<()>;

    fn watch_line_info(&self, fd: RawFd, info: &mut v2::gpio_line_info) -> nix::Result<()>;

    fn unwatch_line_info(&self, fd: RawFd, offset: u32) -> nix::Result<()>;

    /// Request lines; on success `req.fd` holds the new line stream.
    fn get_line(&self, fd: RawFd, req: &mut v2::gpio_line_request) -> nix::Result<()>;

    fn set_line_config(&self, fd: RawFd, config: &mut v2::gpio_line_config) -> nix::Result<()>;

    fn get_line_values(&self, fd: RawFd, values: &mut v2::gpio_line_values) -> nix::Result<()>;

    fn set_line_values(&self, fd: RawFd, values: &mut v2::gpio_line_values) -> nix::Result<()>;

    fn read(&self, fd: RawFd, buf: &mut [u8]) -> nix::Result<usize>;

    /// Wait until `fd` is readable.  `None` waits forever.
    fn poll(&self, fd: RawFd, timeout: Option<Duration>) -> nix::Result<bool>;
}

/// The GPIO character device.
#[derive(Debug, Clone, Copy, Default)]
pub struct Kernel;

impl Gateway for Kernel {
    fn open(&self, path: &Path) -> std::io::Result<RawFd> {
        let f = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(path)?;
        Ok(f.into_raw_fd())
    }

    fn close(&self, fd: RawFd) -> nix::Result<()> {
        nix::unistd::close(fd)
    }

    fn get_chip_info(&self, fd: RawFd, info: &mut uapi::gpio_chip_info) -> nix::Result<()> {
        // SAFETY: `info` is a valid, exclusively borrowed gpiochip_info
        unsafe { uapi::gpio_get_chipinfo(fd, info) }.map(drop)
    }

    fn get_line_info(&self, fd: RawFd, info: &mut v2::gpio_line_info) -> nix::Result<()> {
        // SAFETY: as above, for gpio_v2_line_info
        unsafe { v2::gpio_get_line_info(fd, info) }.map(drop)
    }

    fn watch_line_info(&self, fd: RawFd, info: &mut v2::gpio_line_info) -> nix::Result<()> {
        unsafe { v2::gpio_get_line_info_watch(fd, info) }.map(drop)
    }

    fn unwatch_line_info(&self, fd: RawFd, offset: u32) -> nix::Result<()> {
        let mut offset = offset;
        unsafe { uapi::gpio_get_lineinfo_unwatch(fd, &mut offset) }.map(drop)
    }

    fn get_line(&self, fd: RawFd, req: &mut v2::gpio_line_request) -> nix::Result<()> {
        unsafe { v2::gpio_get_line(fd, req) }.map(drop)
    }

    fn set_line_config(&self, fd: RawFd, config: &mut v2::gpio_line_config) -> nix::Result<()> {
        unsafe { v2::gpio_line_set_config(fd, config) }.map(drop)
    }

    fn get_line_values(&self, fd: RawFd, values: &mut v2::gpio_line_values) -> nix::Result<()> {
        unsafe { v2::gpio_line_get_values(fd, values) }.map(drop)
    }

    fn set_line_values(&self, fd: RawFd, values: &mut v2::gpio_line_values) -> nix::Result<()> {
        unsafe { v2::gpio_line_set_values(fd, values) }.map(drop)
    }

    fn read(&self, fd: RawFd, buf: &mut [u8]) -> nix::Result<usize> {
        nix::unistd::read(fd, buf)
    }

    fn poll(&self, fd: RawFd, timeout: Option<Duration>) -> nix::Result<bool> {
        // SAFETY: the caller owns `fd` for the duration of the call
        let fd = unsafe { BorrowedFd::borrow_raw(fd) };
        let pollfd = PollFd::new(fd, PollFlags::POLLIN);
        let timeout = match timeout {
            None => PollTimeout::NONE,
            // round up so a short, non-zero timeout still waits
            Some(t) => t
                .as_nanos()
                .div_ceil(1_000_000)
                .try_into()
                .unwrap_or(PollTimeout::MAX),
        };

        Ok(nix::poll::poll(&mut [pollfd], timeout)? != 0)
    }
}
