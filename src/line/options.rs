use std::time::Duration;

use crate::errors::{invalid_err, Result};
use crate::uapi::v2::LineFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Active {
    #[default]
    High,
    Low,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EdgeDetect {
    Rising,
    Falling,
    #[default]
    Both,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Drive {
    #[default]
    PushPull,
    OpenDrain,
    OpenSource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Bias {
    #[default]
    Disabled,
    PullUp,
    PullDown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum EventClock {
    #[default]
    Monotonic,
    HardwareTimestampEngine,
    RealTime,
}

/// A debounce period, held in the microseconds the kernel works in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Debounce(u32);

impl Debounce {
    pub const fn new_micros(us: u32) -> Self {
        Self(us)
    }

    /// Rounds up to the next whole microsecond, saturating at `u32::MAX`.
    pub fn from_duration(period: Duration) -> Self {
        let us = period.as_nanos().div_ceil(1_000);
        Self(u32::try_from(us).unwrap_or(u32::MAX))
    }

    pub const fn as_micros(&self) -> u32 {
        self.0
    }

    pub const fn as_duration(&self) -> Duration {
        Duration::from_micros(self.0 as u64)
    }
}

impl From<Duration> for Debounce {
    fn from(period: Duration) -> Self {
        Self::from_duration(period)
    }
}

/// The configuration to apply to a group of lines.
///
/// Every field is optional; a field left unset leaves the corresponding
/// property to the kernel default (on request) or as it is (on
/// reconfiguration).
///
/// ```
/// use gpio_linereq::line::options::{Bias, LineConfig};
///
/// let leds = LineConfig::new([3, 4]).as_output().with_values([true, false]);
/// let button = LineConfig::new([5]).with_bias(Bias::PullUp);
/// # let _ = (leds, button);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineConfig {
    pub(crate) lines: Vec<u32>,
    pub(crate) values: Option<Vec<bool>>,
    pub(crate) direction: Option<Direction>,
    pub(crate) active: Option<Active>,
    pub(crate) bias: Option<Bias>,
    pub(crate) edge: Option<EdgeDetect>,
    pub(crate) drive: Option<Drive>,
    pub(crate) clock: Option<EventClock>,
    pub(crate) debounce: Option<Debounce>,
}

impl LineConfig {
    /// Configuration targeting `lines`.  Output values given later pair with
    /// the lines in this order.
    pub fn new(lines: impl IntoIterator<Item = u32>) -> Self {
        Self {
            lines: lines.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn lines(&self) -> &[u32] {
        &self.lines
    }

    pub fn values(&self) -> Option<&[bool]> {
        self.values.as_deref()
    }

    pub fn as_input(self) -> Self {
        self.with_direction(Direction::Input)
    }

    pub fn as_output(self) -> Self {
        self.with_direction(Direction::Output)
    }

    pub fn with_direction(self, direction: Direction) -> Self {
        Self {
            direction: Some(direction),
            ..self
        }
    }

    pub fn with_values(self, values: impl IntoIterator<Item = bool>) -> Self {
        Self {
            values: Some(values.into_iter().collect()),
            ..self
        }
    }

    pub fn with_active(self, active: Active) -> Self {
        Self {
            active: Some(active),
            ..self
        }
    }

    pub fn as_active_low(self) -> Self {
        self.with_active(Active::Low)
    }

    pub fn with_bias(self, bias: Bias) -> Self {
        Self {
            bias: Some(bias),
            ..self
        }
    }

    pub fn with_edge_detect(self, edge_detect: EdgeDetect) -> Self {
        Self {
            edge: Some(edge_detect),
            ..self
        }
    }

    pub fn with_drive(self, drive: Drive) -> Self {
        Self {
            drive: Some(drive),
            ..self
        }
    }

    pub fn with_clock_source(self, clock: EventClock) -> Self {
        Self {
            clock: Some(clock),
            ..self
        }
    }

    pub fn with_debounce(self, period: impl Into<Debounce>) -> Self {
        Self {
            debounce: Some(period.into()),
            ..self
        }
    }

    /// True if any flag producing field is set.
    pub(crate) fn has_flags(&self) -> bool {
        self.direction.is_some()
            || self.active.is_some()
            || self.bias.is_some()
            || self.edge.is_some()
            || self.drive.is_some()
            || self.clock.is_some()
    }

    /// Merge the flag producing fields into the kernel flags, or `None` if
    /// there are none.
    ///
    /// Bias and edge detection imply input unless output was asked for,
    /// drive implies output.
    pub(crate) fn build_v2(&self) -> Result<Option<LineFlags>> {
        if !self.has_flags() {
            return Ok(None);
        }

        let direction = match (self.direction, self.drive) {
            (Some(Direction::Input), Some(Drive::OpenDrain | Drive::OpenSource)) => {
                return Err(invalid_err("drive requires an output line"));
            }
            (Some(dir), _) => Some(dir),
            (None, Some(_)) => Some(Direction::Output),
            (None, None) if self.bias.is_some() || self.edge.is_some() => {
                Some(Direction::Input)
            }
            (None, None) => None,
        };

        if direction == Some(Direction::Output) && self.edge.is_some() {
            return Err(invalid_err("edge detection requires an input line"));
        }

        let flags = match direction {
            Some(Direction::Input) => LineFlags::INPUT,
            Some(Direction::Output) => LineFlags::OUTPUT,
            None => LineFlags::empty(),
        };

        let flags = match self.active {
            Some(Active::Low) => flags.union(LineFlags::ACTIVE_LOW),
            Some(Active::High) | None => flags,
        };

        let flags = match self.bias {
            Some(Bias::PullDown) => flags.union(LineFlags::BIAS_PULL_DOWN),
            Some(Bias::PullUp) => flags.union(LineFlags::BIAS_PULL_UP),
            Some(Bias::Disabled) => flags.union(LineFlags::BIAS_DISABLED),
            None => flags,
        };

        let flags = match self.edge {
            Some(EdgeDetect::Both) => flags
                .union(LineFlags::EDGE_RISING)
                .union(LineFlags::EDGE_FALLING),
            Some(EdgeDetect::Rising) => flags.union(LineFlags::EDGE_RISING),
            Some(EdgeDetect::Falling) => flags.union(LineFlags::EDGE_FALLING),
            None => flags,
        };

        let flags = match self.drive {
            Some(Drive::OpenDrain) => flags.union(LineFlags::OPEN_DRAIN),
            Some(Drive::OpenSource) => flags.union(LineFlags::OPEN_SOURCE),
            Some(Drive::PushPull) | None => flags,
        };

        let flags = match self.clock {
            Some(EventClock::HardwareTimestampEngine) => flags.union(LineFlags::EVENT_CLOCK_HTE),
            Some(EventClock::RealTime) => flags.union(LineFlags::EVENT_CLOCK_REALTIME),
            Some(EventClock::Monotonic) | None => flags,
        };

        Ok(Some(flags))
    }
}
