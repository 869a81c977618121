use std::{
    os::{
        fd::{AsRawFd, RawFd},
        unix::ffi::OsStrExt,
    },
    path::{Path, PathBuf},
    time::Duration,
};

use bstr::ByteSlice;

use crate::{
    errors::{invalid_err, ioctl_err, Error, IoctlKind, Result},
    fixed_str::FixedStr,
    gateway::{Gateway, Kernel},
    line::{
        event::{self, InfoChangeEvent},
        set::AsLineSet,
        Line, LineInfo,
    },
    request::Request,
    uapi::{self, v2},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChipInfo {
    name: FixedStr<{ v2::GPIO_MAX_NAME_SIZE }>,
    label: FixedStr<{ v2::GPIO_MAX_NAME_SIZE }>,
    lines: u32,
}

impl ChipInfo {
    fn from_raw(info: uapi::gpio_chip_info) -> Result<Self> {
        Ok(ChipInfo {
            name: FixedStr::from_byte_array(info.name)?,
            label: FixedStr::from_byte_array(info.label)?,
            lines: info.lines,
        })
    }

    /// The name of the device driving this GPIO chip in the kernel
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// A functional name for this GPIO chip, such as a product number.  Might
    /// be an empty string.
    ///
    /// As an example, the SoC GPIO chip on a Raspberry Pi is "pinctrl-bcm2835"
    pub fn label(&self) -> &str {
        self.label.as_str()
    }

    /// The number of lines/pins indexable through this chip
    ///
    /// Not all of these may be usable depending on how the hardware is
    /// configured/muxed.
    pub const fn num_lines(&self) -> u32 {
        self.lines
    }
}

/// A GPIO Chip maps to the actual device driver instance in hardware that
/// one interacts with to interact with individual GPIOs.  Often these chips
/// map to IP chunks on an SoC but could also be enumerated within the kernel
/// via something like a PCI or USB bus.
///
/// It is best not to assume that a device will always be enumerated in the
/// same order (especially if it is connected via a bus).  In order to reliably
/// find the correct chip, there are a few approaches that one could reasonably
/// take:
///
/// 1. Create a udev rule that will match attributes of the device and
///    setup a symlink to the device.
/// 2. Iterate over all available chips using the [`chips()`] call to find the
///    device with matching criteria.
/// 3. For simple cases, just using the enumerated path is fine (demo work).  This
///    is discouraged for production.
///
/// A chip is the collaborator of its [`Request`]s: they borrow it for the
/// gateway and the descriptor the line request call is issued on.
#[derive(Debug)]
pub struct Chip<G: Gateway = Kernel> {
    gateway: G,
    fd: RawFd,
    path: PathBuf,
    info: ChipInfo,
    names: Vec<Option<String>>,
}

impl Chip {
    /// Open the GPIO Chip at the provided path (e.g. `/dev/gpiochip<N>`)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(Kernel, path)
    }
}

impl<G: Gateway> Chip<G> {
    /// Open the chip at `path` through `gateway`, reading its info and the
    /// names of its lines.
    pub fn open_with(gateway: G, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let fd = gateway.open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => Error::PermissionDenied,
            _ => Error::Io(e),
        })?;

        // from here on Drop closes the descriptor on any error
        let mut chip = Chip {
            gateway,
            fd,
            path: path.to_path_buf(),
            info: ChipInfo::default(),
            names: Vec::new(),
        };

        let mut raw = uapi::gpio_chip_info::zeroed();
        chip.gateway
            .get_chip_info(fd, &mut raw)
            .map_err(|e| ioctl_err(IoctlKind::ChipInfo, e))?;
        chip.info = ChipInfo::from_raw(raw)?;

        let names = (0..chip.info.lines)
            .map(|offset| Ok(chip.line_info(offset)?.name().map(str::to_string)))
            .collect::<Result<_>>()?;
        chip.names = names;

        log::debug!(
            "opened {} ({}, {} lines) at {}",
            chip.info.name(),
            chip.info.label(),
            chip.info.lines,
            chip.path.display()
        );
        Ok(chip)
    }

    pub fn info(&self) -> &ChipInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn label(&self) -> &str {
        self.info.label()
    }

    pub fn num_lines(&self) -> u32 {
        self.info.lines
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The name of line `offset`, as read when the chip was opened.
    pub fn line_name(&self, offset: u32) -> Option<&str> {
        self.names.get(offset as usize)?.as_deref()
    }

    /// Find a line by name.
    pub fn find_line(&self, name: &str) -> Option<u32> {
        self.names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .map(|offset| offset as u32)
    }

    pub(crate) fn gateway(&self) -> &G {
        &self.gateway
    }

    pub(crate) fn check_line(&self, offset: u32) -> Result<()> {
        if offset >= self.info.lines {
            return Err(invalid_err(format!(
                "line {offset} is not on {} ({} lines)",
                self.info.name(),
                self.info.lines
            )));
        }
        Ok(())
    }

    /// Get the information of a line at a given offset.
    pub fn line_info(&self, offset: u32) -> Result<LineInfo> {
        self.check_line(offset)?;
        let mut info = v2::gpio_line_info::zeroed();
        info.offset = offset;
        self.gateway
            .get_line_info(self.fd, &mut info)
            .map_err(|e| ioctl_err(IoctlKind::LineInfo, e))?;
        LineInfo::from_v2(info)
    }

    /// The information of every line, in line order.
    pub fn line_infos(&self) -> impl Iterator<Item = Result<LineInfo>> + '_ {
        (0..self.info.lines).map(|offset| self.line_info(offset))
    }

    /// Get a handle to the GPIO line at a given offset
    ///
    /// The actual physical line corresponding to a given offset
    /// is completely dependent on how the driver/hardware for
    /// the chip works as well as the associated board layout.
    ///
    /// For a device like the NXP i.mx6 SoC GPIO controller there
    /// are several banks of GPIOs with each bank containing 32
    /// GPIOs.  For this hardware and driver something like
    /// `GPIO2_5` would map to offset 37.
    pub fn line(&self, offset: u32) -> Result<Line<'_, G>> {
        self.check_line(offset)?;
        Ok(Line::new(self, offset, None))
    }

    /// Create an inactive request for `lines`; nothing is claimed until
    /// [`Request::reserve`].
    pub fn request(&self, lines: impl AsLineSet) -> Result<Request<'_, G>> {
        let lines = lines.as_line_set().map_err(|e| match e {
            Error::OutOfRange(line) => invalid_err(format!(
                "line {line} exceeds the {} line limit",
                v2::GPIO_LINES_MAX
            )),
            e => e,
        })?;
        Ok(Request::new(self, lines))
    }

    /// Start queueing info change events for `offset`, returning its
    /// current info.
    pub fn watch_line_info(&self, offset: u32) -> Result<LineInfo> {
        self.check_line(offset)?;
        let mut info = v2::gpio_line_info::zeroed();
        info.offset = offset;
        self.gateway
            .watch_line_info(self.fd, &mut info)
            .map_err(|e| ioctl_err(IoctlKind::WatchLineInfo, e))?;
        log::trace!("watching line {offset} on {}", self.info.name());
        LineInfo::from_v2(info)
    }

    pub fn unwatch_line_info(&self, offset: u32) -> Result<()> {
        self.check_line(offset)?;
        self.gateway
            .unwatch_line_info(self.fd, offset)
            .map_err(|e| ioctl_err(IoctlKind::UnwatchLineInfo, e))
    }

    /// Wait up to `timeout` for an info change event, `None` waiting
    /// forever.  Returns true if one is ready to read.
    pub fn wait_info_event(&self, timeout: Option<Duration>) -> Result<bool> {
        event::poll(&self.gateway, self.fd, timeout)
    }

    /// Read one info change event, blocking until one is available.
    pub fn read_info_event(&self) -> Result<InfoChangeEvent> {
        event::read_one(&self.gateway, self.fd)
    }

    /// Read up to `buf.len()` info change events, returning the number read.
    pub fn read_info_events(&self, buf: &mut [InfoChangeEvent]) -> Result<usize> {
        event::read(&self.gateway, self.fd, buf)
    }
}

impl<G: Gateway> AsRawFd for Chip<G> {
    #[inline(always)]
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl<G: Gateway> Drop for Chip<G> {
    fn drop(&mut self) {
        if let Err(e) = self.gateway.close(self.fd) {
            log::warn!("closing {}: {}", self.path.display(), e);
        }
    }
}

/// Iterate over all GPIO chips currently present on this system
pub fn chips() -> Result<ChipIterator> {
    Ok(ChipIterator {
        readdir: std::fs::read_dir("/dev")?,
    })
}

/// Iterator over chips
#[derive(Debug)]
pub struct ChipIterator {
    readdir: std::fs::ReadDir,
}

impl Iterator for ChipIterator {
    type Item = Result<Chip>;

    fn next(&mut self) -> Option<Result<Chip>> {
        for entry in &mut self.readdir {
            let e = match entry {
                Ok(e) => e,
                Err(e) => {
                    return Some(Err(e.into()));
                }
            };
            let p = e.path();
            let Some(f) = p.file_name() else {
                continue;
            };
            if f.as_bytes().contains_str("gpiochip") {
                return Some(Chip::open(&p));
            }
        }

        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::line::event::InfoChangeKind;
    use crate::line::options::LineConfig;
    use crate::sim::SimGateway;

    fn open(sim: &SimGateway) -> Chip<SimGateway> {
        Chip::open_with(sim.clone(), "/dev/gpiochip0").unwrap()
    }

    #[test]
    fn open_reads_info_and_names() {
        let sim = SimGateway::new(8);
        let chip = open(&sim);

        assert_eq!(chip.name(), "gpiochip-sim");
        assert_eq!(chip.label(), "sim-gpio");
        assert_eq!(chip.num_lines(), 8);
        assert_eq!(chip.path(), Path::new("/dev/gpiochip0"));
        assert_eq!(chip.line_name(3), Some("line3"));
        assert_eq!(chip.line_name(8), None);
        assert_eq!(chip.find_line("line6"), Some(6));
        assert_eq!(chip.find_line("led"), None);
    }

    #[test]
    fn open_failures() {
        let sim = SimGateway::new(4);
        sim.deny_open(true);
        assert!(matches!(
            Chip::open_with(sim.clone(), "/dev/gpiochip0"),
            Err(Error::PermissionDenied)
        ));

        sim.deny_open(false);
        assert!(matches!(
            Chip::open_with(sim.clone(), "/dev/null"),
            Err(Error::Io(_))
        ));
        assert_eq!(sim.open_fds(), 0);
    }

    #[test]
    fn drop_closes_chip() {
        let sim = SimGateway::new(4);
        let chip = open(&sim);
        assert_eq!(sim.open_fds(), 1);
        drop(chip);
        assert_eq!(sim.open_fds(), 0);
    }

    #[test]
    fn line_info_range() {
        let sim = SimGateway::new(4);
        let chip = open(&sim);

        let info = chip.line_info(2).unwrap();
        assert_eq!(info.offset(), 2);
        assert_eq!(info.name(), Some("line2"));
        assert!(!info.is_used());

        assert!(matches!(chip.line_info(4), Err(Error::InvalidRequest(_))));
        assert_eq!(chip.line_infos().count(), 4);
        assert!(chip.line(4).is_err());
    }

    #[test]
    fn request_beyond_line_limit() {
        let sim = SimGateway::new(4);
        let chip = open(&sim);
        assert!(matches!(chip.request(64u32), Err(Error::InvalidRequest(_))));
        assert!(chip.request([0u32, 63]).is_ok());
    }

    #[test]
    fn watched_line_reports_changes() {
        let sim = SimGateway::new(8);
        let chip = open(&sim);

        let info = chip.watch_line_info(5).unwrap();
        assert!(!info.is_used());
        assert!(matches!(chip.watch_line_info(5), Err(Error::LineBusy)));
        assert!(!chip.wait_info_event(Some(Duration::ZERO)).unwrap());

        let mut req = chip.request(5u32).unwrap();
        req.reserve("watcher", 0, &[LineConfig::new([5]).as_output()])
            .unwrap();
        req.set_line_config(&[LineConfig::new([5]).as_input()])
            .unwrap();
        req.release();

        assert!(chip.wait_info_event(None).unwrap());
        let first = chip.read_info_event().unwrap();
        assert_eq!(first.kind, InfoChangeKind::Requested);
        assert_eq!(first.info.offset(), 5);
        assert_eq!(first.info.consumer(), Some("watcher"));
        assert!(first.info.is_used());

        let mut buf = vec![InfoChangeEvent::default(); 4];
        let n = chip.read_info_events(&mut buf).unwrap();
        assert_eq!(n, 2);
        assert_eq!(buf[0].kind, InfoChangeKind::Reconfigured);
        assert_eq!(buf[1].kind, InfoChangeKind::Released);
        assert!(buf[0].timestamp_ns < buf[1].timestamp_ns);

        chip.unwatch_line_info(5).unwrap();
        assert!(matches!(chip.unwatch_line_info(5), Err(Error::LineBusy)));
    }
}
