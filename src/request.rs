//! Requests: exclusive claims on a set of lines, and the value and edge
//! event operations on the claimed lines.

use std::{
    os::fd::{AsRawFd, RawFd},
    time::Duration,
};

use itertools::Itertools;

use crate::{
    chip::Chip,
    errors::{invalid_err, ioctl_err, Error, IoctlKind, Result},
    fixed_str::FixedStr,
    gateway::{Gateway, Kernel},
    line::{
        encoder::{encode_config, encode_request, ResolvedConfig},
        event::{self, EdgeEvent},
        options::LineConfig,
        values::{AsValues, LineValues, MaskedBits},
        Line, LineSet,
    },
    uapi::v2,
};

/// A set of lines on a [`Chip`] and, once reserved, the kernel line request
/// holding them.
///
/// A request starts inactive.  [`reserve`](Self::reserve) claims its lines and
/// makes it active; [`release`](Self::release), or dropping the request,
/// gives them back.  Values and edge events are only available while active.
///
/// Value bitmaps passed to and returned from the `*_masked` calls are
/// request-relative: bit `i` is the `i`th line of [`lines`](Self::lines) in
/// ascending order.
#[derive(Debug)]
pub struct Request<'c, G: Gateway = Kernel> {
    chip: &'c Chip<G>,
    lines: LineSet,
    fd: Option<RawFd>,
    consumer: FixedStr<{ v2::GPIO_MAX_NAME_SIZE }>,
    /// configuration the kernel holds for each line, by ordinal
    held: Vec<ResolvedConfig>,
}

impl<'c, G: Gateway> Request<'c, G> {
    pub(crate) fn new(chip: &'c Chip<G>, lines: LineSet) -> Self {
        Self {
            chip,
            lines,
            fd: None,
            consumer: FixedStr::empty(),
            held: Vec::new(),
        }
    }

    pub fn chip(&self) -> &'c Chip<G> {
        self.chip
    }

    /// The lines of the request, ascending.
    pub fn lines(&self) -> LineSet {
        self.lines
    }

    pub fn is_active(&self) -> bool {
        self.fd.is_some()
    }

    /// The consumer label of the last successful reserve.
    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// Claim the lines of the request, configured by `configs`.
    ///
    /// Any lines already held are released first.  Lines a config names that
    /// are not yet part of the request join it.  `event_buffer_size` sizes
    /// the kernel's edge event queue, zero leaving it to the kernel.
    ///
    /// On failure the request is left inactive.
    pub fn reserve(
        &mut self,
        consumer: &str,
        event_buffer_size: u32,
        configs: &[LineConfig],
    ) -> Result<()> {
        self.release();

        let mut record = encode_request(self.lines, configs)?;
        record.set_consumer(consumer)?;
        record.set_event_buffer_size(event_buffer_size);
        for line in record.lines() {
            self.chip.check_line(line)?;
        }

        let mut req = record.request_v2();
        log::trace!("get line {:?} on {}", record.lines(), self.chip.name());
        self.chip
            .gateway()
            .get_line(self.chip.as_raw_fd(), &mut req)
            .map_err(|e| ioctl_err(IoctlKind::GetLine, e))?;

        self.fd = Some(req.fd);
        self.lines = record.lines();
        self.held = record.resolved();
        self.consumer = FixedStr::new_terminated(consumer)?;
        log::debug!(
            "{} reserved lines [{}] on {}",
            consumer,
            self.lines.iter().join(", "),
            self.chip.name()
        );
        Ok(())
    }

    /// Give the lines back to the kernel.  Does nothing if inactive.
    ///
    /// The request is inactive afterwards even if closing the descriptor
    /// fails; the failure is only logged.
    pub fn release(&mut self) {
        let Some(fd) = self.fd.take() else {
            return;
        };
        log::debug!(
            "{} releasing lines [{}]",
            self.consumer,
            self.lines.iter().join(", ")
        );
        if let Err(e) = self.chip.gateway().close(fd) {
            log::warn!(
                "releasing lines [{}]: {}",
                self.lines.iter().join(", "),
                ioctl_err(IoctlKind::Close, e)
            );
        }
    }

    /// Reconfigure lines of the active request.
    ///
    /// Only the lines the configs name are touched, and every one of them
    /// must already be part of the request.  The other lines keep their
    /// flags, debounce period and output level.
    pub fn set_line_config(&mut self, configs: &[LineConfig]) -> Result<()> {
        let fd = self.fd()?;
        let mut record = encode_config(self.lines, configs)?;
        let outputs = record.held_outputs(&self.held);
        let levels = if outputs != 0 {
            self.values_masked(outputs)?
        } else {
            0
        };
        record.keep_untouched(&self.held, levels)?;

        let mut config = record.config_v2();
        log::trace!(
            "set config on lines [{}]: {} attributes",
            self.lines.iter().join(", "),
            record.attrs().len()
        );
        self.chip
            .gateway()
            .set_line_config(fd, &mut config)
            .map_err(|e| ioctl_err(IoctlKind::SetLineConfig, e))?;
        self.held = record.resolved();
        Ok(())
    }

    /// A view of one line of the request.
    pub fn line(&self, offset: u32) -> Result<Line<'_, G>> {
        if !self.lines.is_set(offset) {
            return Err(invalid_err(format!(
                "line {offset} is not part of the request"
            )));
        }
        Ok(Line::new(self.chip, offset, Some(self)))
    }

    fn fd(&self) -> Result<RawFd> {
        self.fd.ok_or(Error::NotOpen)
    }

    fn ordinal(&self, offset: u32) -> Result<usize> {
        self.lines.ordinal(offset).ok_or(Error::NotRequested(offset))
    }

    /// Read the values of the lines selected by the request-relative `mask`.
    /// Bits outside the mask are zero.
    pub fn values_masked(&self, mask: u64) -> Result<u64> {
        let fd = self.fd()?;
        let mut values = v2::gpio_line_values { bits: 0, mask };
        self.chip
            .gateway()
            .get_line_values(fd, &mut values)
            .map_err(|e| ioctl_err(IoctlKind::GetLineValues, e))?;
        Ok(values.bits & mask)
    }

    /// Every line of the chip in line order, `None` for lines outside the
    /// request.
    pub fn all_values(&self) -> Result<Vec<Option<bool>>> {
        let bits = self.values_masked(self.lines.mask())?;
        Ok((0..self.chip.num_lines())
            .map(|offset| {
                self.lines
                    .ordinal(offset)
                    .map(|ord| bits & (1 << ord) != 0)
            })
            .collect())
    }

    pub fn value(&self, offset: u32) -> Result<bool> {
        let bit = 1 << self.ordinal(offset)?;
        Ok(self.values_masked(bit)? != 0)
    }

    /// Set the lines selected by the request-relative `mask` to the
    /// corresponding `bits`.
    pub fn set_values_masked(&self, mask: u64, bits: u64) -> Result<()> {
        let fd = self.fd()?;
        let mut values = v2::gpio_line_values { bits, mask };
        self.chip
            .gateway()
            .set_line_values(fd, &mut values)
            .map_err(|e| ioctl_err(IoctlKind::SetLineValues, e))
    }

    pub fn set_value(&self, offset: u32, value: bool) -> Result<()> {
        let bit = 1 << self.ordinal(offset)?;
        self.set_values_masked(bit, if value { bit } else { 0 })
    }

    /// Read every line of the request.
    pub fn read(&self) -> Result<LineValues> {
        let mask = self.lines.mask();
        let bits = self.values_masked(mask)?;
        Ok(LineValues {
            offsets: self.lines,
            values: MaskedBits::new(bits, mask),
        })
    }

    /// Write values given by line number, or one value for every line.
    pub fn write<V: AsValues + ?Sized>(&self, values: &V) -> Result<()> {
        let values = values.values(&self.lines)?;
        if values.is_empty() {
            return Ok(());
        }
        self.set_values_masked(values.mask(), values.bits())
    }

    /// Wait up to `timeout` for an edge event, `None` waiting forever.
    /// Returns true if one is ready to read.
    pub fn wait_edge_event(&self, timeout: Option<Duration>) -> Result<bool> {
        event::poll(self.chip.gateway(), self.fd()?, timeout)
    }

    /// Read one edge event, blocking until one is available.
    pub fn read_edge_event(&self) -> Result<EdgeEvent> {
        event::read_one(self.chip.gateway(), self.fd()?)
    }

    /// Read up to `buf.len()` edge events, returning the number read.
    pub fn read_edge_events(&self, buf: &mut [EdgeEvent]) -> Result<usize> {
        event::read(self.chip.gateway(), self.fd()?, buf)
    }
}

impl<G: Gateway> Drop for Request<'_, G> {
    fn drop(&mut self) {
        self.release();
    }
}
