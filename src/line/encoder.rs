//! Translation of [`LineConfig`]s into the kernel's tagged-attribute request.
//!
//! The kernel addresses the lines of a request by their position in the
//! request's own line array, not by chip line number.  Every mask built here
//! uses those request-relative ordinals, taken from the same [`LineSet`] the
//! request later uses to interpret value bitmaps.

use itertools::Itertools;

use super::options::{Debounce, LineConfig};
use super::set::{LineSet, MAX_LINES};
use crate::errors::{invalid_err, Error, Result};
use crate::fixed_str::FixedStr;
use crate::uapi::v2::{self, LineAttrId, LineFlags};

/// A line attribute, with the tag the wire union leaves to `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAttribute {
    Flags(LineFlags),
    /// Output values, bit per request-relative ordinal.
    Values(u64),
    /// Debounce period in microseconds.
    Debounce(u32),
}

impl LineAttribute {
    pub(crate) fn from_v2(attr: &v2::gpio_line_attribute) -> Result<Self> {
        // SAFETY: the union is plain old data; `id` selects the field the
        // kernel, or `into_v2`, wrote.
        let res = unsafe {
            match LineAttrId::from_bits_retain(attr.id) {
                LineAttrId::FLAGS => Self::Flags(LineFlags::unpack(attr.attribute.flags)),
                LineAttrId::OUTPUT_VALUES => Self::Values(attr.attribute.values),
                LineAttrId::DEBOUNCE => Self::Debounce(attr.attribute.debounce_period),
                _ => {
                    return Err(invalid_err(format!(
                        "Invalid gpio line attribute ID: 0x{:X}",
                        attr.id
                    )))
                }
            }
        };
        Ok(res)
    }

    pub fn id(&self) -> LineAttrId {
        match self {
            LineAttribute::Flags(_) => LineAttrId::FLAGS,
            LineAttribute::Values(_) => LineAttrId::OUTPUT_VALUES,
            LineAttribute::Debounce(_) => LineAttrId::DEBOUNCE,
        }
    }

    pub(crate) fn into_v2(self) -> v2::gpio_line_attribute {
        let (id, attribute) = match self {
            LineAttribute::Flags(flags) => (
                LineAttrId::FLAGS,
                v2::gpio_line_attribute_union {
                    flags: flags.pack(),
                },
            ),
            LineAttribute::Values(values) => (
                LineAttrId::OUTPUT_VALUES,
                v2::gpio_line_attribute_union { values },
            ),
            LineAttribute::Debounce(debounce_period) => {
                // write the whole union so the upper half is zero filled
                let mut attribute = v2::gpio_line_attribute_union { values: 0 };
                attribute.debounce_period = debounce_period;
                (LineAttrId::DEBOUNCE, attribute)
            }
        };

        v2::gpio_line_attribute {
            id: id.bits(),
            _padding: 0,
            attribute,
        }
    }
}

/// An attribute applied to the lines selected by `mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigAttribute {
    pub attr: LineAttribute,
    /// request-relative line mask
    pub mask: u64,
}

/// The configuration a request record resolves to for one line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub flags: Option<LineFlags>,
    pub value: Option<bool>,
    pub debounce: Option<Debounce>,
}

/// The kernel line request, before serialisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRequestRecord {
    lines: LineSet,
    consumer: FixedStr<{ v2::GPIO_MAX_NAME_SIZE }>,
    attrs: heapless::Vec<ConfigAttribute, { v2::GPIO_LINE_NUM_ATTRS_MAX }>,
    event_buffer_size: u32,
}

impl LineRequestRecord {
    /// The requested lines, ascending, which is also their ordinal order.
    pub fn lines(&self) -> LineSet {
        self.lines
    }

    pub fn num_lines(&self) -> usize {
        self.lines.count()
    }

    pub fn attrs(&self) -> &[ConfigAttribute] {
        &self.attrs
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    pub fn event_buffer_size(&self) -> u32 {
        self.event_buffer_size
    }

    /// Set the consumer label; at most 31 bytes so the kernel sees a NUL.
    pub fn set_consumer(&mut self, consumer: &str) -> Result<()> {
        self.consumer = FixedStr::new_terminated(consumer)
            .map_err(|e| invalid_err(format!("consumer name: {e}")))?;
        Ok(())
    }

    pub fn set_event_buffer_size(&mut self, size: u32) {
        self.event_buffer_size = size;
    }

    /// The flags, output value and debounce period the attributes apply to
    /// `line`.  Later attributes override earlier ones of the same kind.
    pub fn config_for(&self, line: u32) -> Option<ResolvedConfig> {
        let bit = 1u64 << self.lines.ordinal(line)?;
        Some(self.resolve(bit))
    }

    /// The resolved configuration of every line, in ordinal order.
    pub fn resolved(&self) -> Vec<ResolvedConfig> {
        (0..self.lines.count()).map(|ord| self.resolve(1 << ord)).collect()
    }

    fn resolve(&self, bit: u64) -> ResolvedConfig {
        self.attrs
            .iter()
            .filter(|a| a.mask & bit != 0)
            .fold(ResolvedConfig::default(), |acc, a| match a.attr {
                LineAttribute::Flags(flags) => ResolvedConfig {
                    flags: Some(flags),
                    ..acc
                },
                LineAttribute::Values(values) => ResolvedConfig {
                    value: Some(values & bit != 0),
                    ..acc
                },
                LineAttribute::Debounce(us) => ResolvedConfig {
                    debounce: Some(Debounce::new_micros(us)),
                    ..acc
                },
            })
    }

    fn covered(&self, kind: LineAttrId) -> u64 {
        self.attrs
            .iter()
            .filter(|a| a.attr.id() == kind)
            .fold(0, |mask, a| mask | a.mask)
    }

    /// The outputs of `held` that remain outputs but get no new value.
    ///
    /// The kernel drives an output without a value attribute low, so the
    /// current levels of these lines must be read and carried over with
    /// [`keep_untouched`](Self::keep_untouched).
    pub fn held_outputs(&self, held: &[ResolvedConfig]) -> u64 {
        let valued = self.covered(LineAttrId::OUTPUT_VALUES);
        held.iter()
            .enumerate()
            .filter(|(ord, cfg)| {
                let bit = 1u64 << *ord;
                let is_output = |f: LineFlags| f.contains(LineFlags::OUTPUT);
                valued & bit == 0
                    && cfg.flags.is_some_and(is_output)
                    && self.resolve(bit).flags.map_or(true, is_output)
            })
            .fold(0, |mask, (ord, _)| mask | (1 << ord))
    }

    /// Re-apply `held`, the configuration by ordinal the request's lines
    /// currently have, to whatever this record leaves uncovered.
    ///
    /// The kernel resets every line of a request on reconfiguration, so
    /// flags and debounce periods not named here must be sent again, and
    /// `levels` supplies the values of [`held_outputs`](Self::held_outputs).
    pub fn keep_untouched(&mut self, held: &[ResolvedConfig], levels: u64) -> Result<()> {
        let flagged = self.covered(LineAttrId::FLAGS);
        let debounced = self.covered(LineAttrId::DEBOUNCE);
        let outputs = self.held_outputs(held);

        let mut extra: Vec<ConfigAttribute> = Vec::new();
        let mut merge = |attr: LineAttribute, bit: u64| {
            match extra.iter_mut().find(|a| a.attr == attr) {
                Some(existing) => existing.mask |= bit,
                None => extra.push(ConfigAttribute { attr, mask: bit }),
            }
        };
        for (ord, cfg) in held.iter().enumerate() {
            let bit = 1u64 << ord;
            if let Some(flags) = cfg.flags.filter(|f| !f.is_empty() && flagged & bit == 0) {
                merge(LineAttribute::Flags(flags), bit);
            }
            if let Some(debounce) = cfg
                .debounce
                .filter(|d| d.as_micros() != 0 && debounced & bit == 0)
            {
                merge(LineAttribute::Debounce(debounce.as_micros()), bit);
            }
        }
        if outputs != 0 {
            merge(LineAttribute::Values(levels & outputs), outputs);
        }

        let required = self.attrs.len() + extra.len();
        if required > v2::GPIO_LINE_NUM_ATTRS_MAX {
            return Err(Error::TooManyAttributes { required });
        }
        self.attrs
            .extend_from_slice(&extra)
            .map_err(|_| Error::TooManyAttributes { required })
    }

    pub(crate) fn config_v2(&self) -> v2::gpio_line_config {
        let mut cfg = v2::gpio_line_config::zeroed();
        cfg.num_attrs = self.attrs.len() as u32;
        for (attr, wr) in self.attrs.iter().zip(cfg.attrs.iter_mut()) {
            wr.attr = attr.attr.into_v2();
            wr.mask = attr.mask;
        }
        cfg
    }

    pub(crate) fn request_v2(&self) -> v2::gpio_line_request {
        let mut req = v2::gpio_line_request::zeroed();
        let (num_lines, offsets) = self.lines.to_api_v2();
        req.offsets = offsets;
        req.num_lines = num_lines;
        req.consumer = self.consumer.into_byte_array();
        req.config = self.config_v2();
        req.event_buffer_size = self.event_buffer_size;
        req
    }

    /// Decode a kernel line request.
    ///
    /// The line array must be strictly ascending, as built by
    /// [`encode_request`].
    pub fn from_v2(req: &v2::gpio_line_request) -> Result<Self> {
        let num_lines = req.num_lines as usize;
        if num_lines > v2::GPIO_LINES_MAX {
            return Err(invalid_err(format!("{num_lines} lines in request")));
        }
        let offsets = &req.offsets[..num_lines];
        if !offsets.iter().tuple_windows().all(|(a, b)| a < b) {
            return Err(invalid_err("request lines are not in ascending order"));
        }
        let lines = LineSet::try_from_iter(offsets.iter().copied())?;

        let num_attrs = req.config.num_attrs as usize;
        if num_attrs > v2::GPIO_LINE_NUM_ATTRS_MAX {
            return Err(Error::TooManyAttributes {
                required: num_attrs,
            });
        }
        let attrs = req.config.attrs[..num_attrs]
            .iter()
            .map(|a| {
                Ok(ConfigAttribute {
                    attr: LineAttribute::from_v2(&a.attr)?,
                    mask: a.mask,
                })
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            lines,
            consumer: FixedStr::from_byte_array(req.consumer)?,
            attrs,
            event_buffer_size: req.event_buffer_size,
        })
    }
}

/// Encode a new request for `baseline` plus every line the configs target.
///
/// Lines named by a config but missing from the baseline join the request.
/// The line array is kept ascending, so ordinals always agree with
/// [`LineSet::ordinal`] on the returned [`LineRequestRecord::lines`].
pub fn encode_request(baseline: LineSet, configs: &[LineConfig]) -> Result<LineRequestRecord> {
    let record = encode(baseline, true, configs)?;
    if record.lines.is_empty() {
        return Err(invalid_err("no lines requested"));
    }
    Ok(record)
}

/// Encode a reconfiguration of the existing request over `lines`.
///
/// Never adds lines: a config naming a line outside `lines` fails with
/// [`Error::NotRequested`].
pub fn encode_config(lines: LineSet, configs: &[LineConfig]) -> Result<LineRequestRecord> {
    encode(lines, false, configs)
}

fn encode(baseline: LineSet, grow: bool, configs: &[LineConfig]) -> Result<LineRequestRecord> {
    let mut lines = baseline;
    let mut seen = LineSet::empty();
    let mut required = 0;
    let mut flags = Vec::with_capacity(configs.len());

    // validate everything before building any attribute
    for cfg in configs {
        if cfg.lines.is_empty() {
            return Err(invalid_err("line config names no lines"));
        }
        for &line in &cfg.lines {
            if line >= MAX_LINES {
                return Err(invalid_err(format!(
                    "line {line} exceeds the {MAX_LINES} line limit"
                )));
            }
            if seen.is_set(line) {
                return Err(invalid_err(format!(
                    "line {line} is configured more than once"
                )));
            }
            seen.set(line)?;
            if !lines.is_set(line) {
                if !grow {
                    return Err(Error::NotRequested(line));
                }
                lines.set(line)?;
            }
        }

        if let Some(values) = &cfg.values {
            if values.len() != cfg.lines.len() {
                return Err(Error::WrongNumberOfValues {
                    lines: cfg.lines.len(),
                    values: values.len(),
                });
            }
            required += 1;
        }
        if cfg.debounce.is_some() {
            required += 1;
        }
        let cfg_flags = cfg.build_v2()?;
        if cfg_flags.is_some() {
            required += 1;
        }
        flags.push(cfg_flags);
    }

    if required > v2::GPIO_LINE_NUM_ATTRS_MAX {
        return Err(Error::TooManyAttributes { required });
    }

    let mut attrs: heapless::Vec<ConfigAttribute, { v2::GPIO_LINE_NUM_ATTRS_MAX }> =
        heapless::Vec::new();
    let mut push = |attr: LineAttribute, mask: u64| {
        attrs
            .push(ConfigAttribute { attr, mask })
            .map_err(|_| Error::TooManyAttributes { required })
    };

    for (cfg, cfg_flags) in configs.iter().zip(flags) {
        let ordinals = cfg
            .lines
            .iter()
            .map(|line| lines.ordinal(*line).ok_or(Error::NotRequested(*line)))
            .collect::<Result<Vec<_>>>()?;
        let config_mask = ordinals.iter().fold(0u64, |mask, ord| mask | (1 << *ord));

        if let Some(values) = &cfg.values {
            let bits = ordinals
                .iter()
                .zip(values)
                .filter(|(_, v)| **v)
                .fold(0u64, |bits, (ord, _)| bits | (1 << *ord));
            push(LineAttribute::Values(bits & config_mask), config_mask)?;
        }

        if let Some(debounce) = cfg.debounce {
            push(LineAttribute::Debounce(debounce.as_micros()), config_mask)?;
        }

        if let Some(cfg_flags) = cfg_flags {
            push(LineAttribute::Flags(cfg_flags), config_mask)?;
        }
    }

    log::trace!(
        "encoded {} attributes over lines [{}]",
        attrs.len(),
        lines.iter().join(", ")
    );

    Ok(LineRequestRecord {
        lines,
        consumer: FixedStr::empty(),
        attrs,
        event_buffer_size: 0,
    })
}
