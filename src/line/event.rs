//! Edge and line-info-change events, and the blocking read and poll shared by
//! the chip and request event streams.

use std::os::fd::RawFd;
use std::time::Duration;

use crate::errors::{ioctl_err, Error, IoctlKind, Result};
use crate::gateway::Gateway;
use crate::line::info::LineInfo;
use crate::uapi::v2;

/// A kernel event record that can be read from a stream.
pub trait WireEvent: Sized {
    /// The record as laid out by the kernel.
    type Raw: Copy;

    fn zeroed_raw() -> Self::Raw;

    fn from_raw(raw: Self::Raw) -> Result<Self>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EdgeKind {
    #[default]
    Rising,
    Falling,
}

/// An edge detected on a requested line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeEvent {
    /// Nanoseconds on the line's event clock
    pub timestamp_ns: u64,
    pub kind: EdgeKind,
    pub offset: u32,
    /// Sequence number across all lines of the request
    pub seqno: u32,
    /// Sequence number for this line
    pub line_seqno: u32,
}

impl EdgeEvent {
    pub fn timestamp(&self) -> Duration {
        Duration::from_nanos(self.timestamp_ns)
    }
}

impl WireEvent for EdgeEvent {
    type Raw = v2::gpio_line_event;

    fn zeroed_raw() -> Self::Raw {
        v2::gpio_line_event::zeroed()
    }

    fn from_raw(event: v2::gpio_line_event) -> Result<Self> {
        let kind = match v2::LineEventId::from_bits_retain(event.id) {
            v2::LineEventId::RISING_EDGE => EdgeKind::Rising,
            v2::LineEventId::FALLING_EDGE => EdgeKind::Falling,
            _ => return Err(Error::UnknownEvent(event.id)),
        };

        Ok(EdgeEvent {
            timestamp_ns: event.timestamp_ns,
            kind,
            offset: event.offset,
            seqno: event.seqno,
            line_seqno: event.line_seqno,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InfoChangeKind {
    #[default]
    Requested,
    Released,
    Reconfigured,
}

/// A change to the request state or configuration of a watched line.
#[derive(Debug, Clone, Default)]
pub struct InfoChangeEvent {
    pub info: LineInfo,
    pub timestamp_ns: u64,
    pub kind: InfoChangeKind,
}

impl WireEvent for InfoChangeEvent {
    type Raw = v2::gpio_line_info_changed;

    fn zeroed_raw() -> Self::Raw {
        v2::gpio_line_info_changed::zeroed()
    }

    fn from_raw(event: v2::gpio_line_info_changed) -> Result<Self> {
        let kind = match v2::LineChangedType::from_bits_retain(event.event_type) {
            v2::LineChangedType::REQUESTED => InfoChangeKind::Requested,
            v2::LineChangedType::RELEASED => InfoChangeKind::Released,
            v2::LineChangedType::CONFIG => InfoChangeKind::Reconfigured,
            _ => return Err(Error::UnknownEvent(event.event_type)),
        };

        Ok(InfoChangeEvent {
            info: LineInfo::from_v2(event.info)?,
            timestamp_ns: event.timestamp_ns,
            kind,
        })
    }
}

/// Wait for an event to be queued on `fd`.
///
/// `None` blocks indefinitely; a zero timeout only checks.  Returns false if
/// the timeout elapsed first.
pub(crate) fn poll<G: Gateway>(gateway: &G, fd: RawFd, timeout: Option<Duration>) -> Result<bool> {
    gateway
        .poll(fd, timeout)
        .map_err(|e| ioctl_err(IoctlKind::Poll, e))
}

/// Read as many whole events as fit in `buf`, blocking until at least one is
/// available.
///
/// Records that fail to decode are dropped and the rest are packed into the
/// front of `buf`.  The decode error is only returned if nothing decoded.
pub(crate) fn read<G: Gateway, E: WireEvent>(
    gateway: &G,
    fd: RawFd,
    buf: &mut [E],
) -> Result<usize> {
    let mut events = Vec::with_capacity(buf.len());
    read_raw::<G, E>(gateway, fd, buf.len(), &mut events)?;

    let mut n = 0;
    let mut first_err = None;
    for raw in events {
        match E::from_raw(raw) {
            Ok(event) => {
                buf[n] = event;
                n += 1;
            }
            Err(e) => {
                log::warn!("dropping event: {}", e);
                first_err.get_or_insert(e);
            }
        }
    }
    match first_err {
        Some(e) if n == 0 => Err(e),
        _ => Ok(n),
    }
}

/// Read a single event, blocking until one is available.
pub(crate) fn read_one<G: Gateway, E: WireEvent>(gateway: &G, fd: RawFd) -> Result<E> {
    let mut events = Vec::with_capacity(1);
    read_raw::<G, E>(gateway, fd, 1, &mut events)?;
    let raw = events.pop().ok_or(Error::PartialEvent {
        expected: std::mem::size_of::<E::Raw>(),
        read: 0,
    })?;
    E::from_raw(raw)
}

fn read_raw<G: Gateway, E: WireEvent>(
    gateway: &G,
    fd: RawFd,
    max: usize,
    out: &mut Vec<E::Raw>,
) -> Result<()> {
    let size = std::mem::size_of::<E::Raw>();
    let mut buf = vec![0u8; size * max];

    let n = gateway
        .read(fd, &mut buf)
        .map_err(|e| ioctl_err(IoctlKind::Read, e))?;
    if n % size != 0 {
        return Err(Error::PartialEvent {
            expected: size,
            read: n,
        });
    }

    out.extend(buf[..n].chunks_exact(size).map(|chunk| {
        let mut raw = E::zeroed_raw();
        // SAFETY: `chunk` holds exactly one record written by the kernel and
        // the record types are plain old data.
        unsafe {
            std::ptr::copy_nonoverlapping(
                chunk.as_ptr(),
                &mut raw as *mut E::Raw as *mut u8,
                size,
            );
        }
        raw
    }));
    Ok(())
}
