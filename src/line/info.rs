use super::encoder::LineAttribute;
use super::options::{Bias, Debounce, Direction, Drive, EdgeDetect, EventClock};
use crate::errors::Result;
use crate::fixed_str::FixedStr;
use crate::uapi::v2::{self, LineFlags};

/// The kernel's view of a single line: who holds it and how it is
/// configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineInfo {
    name: FixedStr<{ v2::GPIO_MAX_NAME_SIZE }>,
    consumer: FixedStr<{ v2::GPIO_MAX_NAME_SIZE }>,
    offset: u32,
    flags: LineFlags,
    attrs: LineAttributes,
}

impl LineInfo {
    pub(crate) fn from_v2(info: v2::gpio_line_info) -> Result<Self> {
        let name = FixedStr::from_byte_array(info.name)?;
        let consumer = FixedStr::from_byte_array(info.consumer)?;
        let num_attrs = (info.num_attrs as usize).min(v2::GPIO_LINE_NUM_ATTRS_MAX);
        let attrs = LineAttributes::from_attr_list(&info.attrs[..num_attrs])?;

        Ok(Self {
            name,
            consumer,
            offset: info.offset,
            flags: LineFlags::unpack(info.flags),
            attrs,
        })
    }

    /// The name the driver or device tree gave the line, if any.
    pub fn name(&self) -> Option<&str> {
        if self.name.is_empty() {
            None
        } else {
            Some(&self.name)
        }
    }

    /// The label of the current holder, if the line is requested.
    pub fn consumer(&self) -> Option<&str> {
        if self.consumer.is_empty() {
            None
        } else {
            Some(&self.consumer)
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn flags(&self) -> LineFlags {
        self.attrs.flags.unwrap_or(self.flags)
    }

    pub fn debounce(&self) -> Option<Debounce> {
        self.attrs.debounce
    }

    /// Lines are considered to be inputs if not explicitly
    /// marked as outputs in the line info flags by the kernel.
    pub fn direction(&self) -> Direction {
        if self.flags().contains(LineFlags::OUTPUT) {
            Direction::Output
        } else {
            Direction::Input
        }
    }

    pub fn bias(&self) -> Option<Bias> {
        let flags = self.flags();
        if flags.contains(LineFlags::BIAS_PULL_UP) {
            Some(Bias::PullUp)
        } else if flags.contains(LineFlags::BIAS_PULL_DOWN) {
            Some(Bias::PullDown)
        } else if flags.contains(LineFlags::BIAS_DISABLED) {
            Some(Bias::Disabled)
        } else {
            None
        }
    }

    /// Only meaningful for outputs.
    pub fn drive(&self) -> Option<Drive> {
        let flags = self.flags();
        if !flags.contains(LineFlags::OUTPUT) {
            None
        } else if flags.contains(LineFlags::OPEN_DRAIN) {
            Some(Drive::OpenDrain)
        } else if flags.contains(LineFlags::OPEN_SOURCE) {
            Some(Drive::OpenSource)
        } else {
            Some(Drive::PushPull)
        }
    }

    pub fn edge_detection(&self) -> Option<EdgeDetect> {
        let flags = self.flags();
        match (
            flags.contains(LineFlags::EDGE_RISING),
            flags.contains(LineFlags::EDGE_FALLING),
        ) {
            (true, true) => Some(EdgeDetect::Both),
            (true, false) => Some(EdgeDetect::Rising),
            (false, true) => Some(EdgeDetect::Falling),
            (false, false) => None,
        }
    }

    pub fn event_clock(&self) -> EventClock {
        let flags = self.flags();
        if flags.contains(LineFlags::EVENT_CLOCK_HTE) {
            EventClock::HardwareTimestampEngine
        } else if flags.contains(LineFlags::EVENT_CLOCK_REALTIME) {
            EventClock::RealTime
        } else {
            EventClock::Monotonic
        }
    }

    /// True if the line is held by the kernel or another consumer
    pub fn is_used(&self) -> bool {
        self.flags().contains(LineFlags::USED)
    }

    /// True if this line is marked as active low in the kernel
    pub fn is_active_low(&self) -> bool {
        self.flags().contains(LineFlags::ACTIVE_LOW)
    }

    /// True if this line is marked as open drain in the kernel
    pub fn is_open_drain(&self) -> bool {
        self.flags().contains(LineFlags::OPEN_DRAIN)
    }

    /// True if this line is marked as open source in the kernel
    pub fn is_open_source(&self) -> bool {
        self.flags().contains(LineFlags::OPEN_SOURCE)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct LineAttributes {
    flags: Option<LineFlags>,
    debounce: Option<Debounce>,
}

impl LineAttributes {
    fn from_attr_list(attrs: &[v2::gpio_line_attribute]) -> Result<Self> {
        attrs
            .iter()
            .map(LineAttribute::from_v2)
            .try_fold(Self::default(), |attrs, attr| {
                Ok(match attr? {
                    LineAttribute::Flags(f) => Self {
                        flags: Some(attrs.flags.map_or(f, |acc| acc.union(f))),
                        ..attrs
                    },
                    // the kernel does not report output values in line info
                    LineAttribute::Values(_) => attrs,
                    LineAttribute::Debounce(us) => Self {
                        debounce: Some(Debounce::new_micros(us)),
                        ..attrs
                    },
                })
            })
    }
}
