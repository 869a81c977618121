use itertools::Itertools;

use super::set::LineSet;
use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineValue {
    Active,
    Inactive,
}

impl LineValue {
    pub const fn new(is_active: bool) -> Self {
        if is_active {
            Self::Active
        } else {
            Self::Inactive
        }
    }

    pub const fn is_active(&self) -> bool {
        matches!(self, LineValue::Active)
    }
}

impl From<bool> for LineValue {
    fn from(v: bool) -> Self {
        Self::new(v)
    }
}

impl From<LineValue> for bool {
    fn from(v: LineValue) -> Self {
        v.is_active()
    }
}

/// Values to write to the lines of a request, resolved to request-relative
/// bits against its [`LineSet`].
pub trait AsValues {
    fn values(&self, lines: &LineSet) -> Result<MaskedBits>;
}

impl AsValues for LineValue {
    fn values(&self, lines: &LineSet) -> Result<MaskedBits> {
        self.is_active().values(lines)
    }
}

impl AsValues for bool {
    fn values(&self, lines: &LineSet) -> Result<MaskedBits> {
        let mask = lines.mask();

        let bits = if *self { mask } else { 0 };

        Ok(MaskedBits { bits, mask })
    }
}

impl AsValues for [(u32, bool)] {
    fn values(&self, lines: &LineSet) -> Result<MaskedBits> {
        let missing = self
            .iter()
            .filter(|(offset, _)| !lines.is_set(*offset))
            .map(|(offset, _)| *offset)
            .collect::<Vec<_>>();

        match missing.as_slice() {
            [] => (),
            [offset] => return Err(Error::NotRequested(*offset)),
            _ => {
                return Err(Error::InvalidRequest(format!(
                    "Offsets not in line set: {}",
                    missing.iter().join(", ")
                )))
            }
        }

        let mut bits = MaskedBits::empty();
        for (offset, val) in self {
            if let Some(idx) = lines.ordinal(*offset) {
                bits.set_bit_value(idx, *val);
            }
        }

        Ok(bits)
    }
}

impl<const N: usize> AsValues for [(u32, bool); N] {
    fn values(&self, lines: &LineSet) -> Result<MaskedBits> {
        self.as_slice().values(lines)
    }
}

impl AsValues for MaskedBits {
    fn values(&self, lines: &LineSet) -> Result<MaskedBits> {
        Ok(MaskedBits {
            bits: self.bits,
            mask: self.mask & lines.mask(),
        })
    }
}

/// A request-relative value bitmap: `mask` selects the meaningful
/// positions, `bits` holds their values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaskedBits {
    pub(crate) bits: u64,
    pub(crate) mask: u64,
}

impl MaskedBits {
    pub const fn new(bits: u64, mask: u64) -> Self {
        Self { bits, mask }
    }

    pub const fn empty() -> Self {
        MaskedBits { bits: 0, mask: 0 }
    }

    pub const fn bits(&self) -> u64 {
        self.bits & self.mask
    }

    pub const fn mask(&self) -> u64 {
        self.mask
    }

    pub const fn len(&self) -> usize {
        self.mask.count_ones() as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.mask == 0
    }

    #[inline(always)]
    pub const fn get(&self, bit: usize) -> Option<bool> {
        if bit >= 64 {
            return None;
        }
        let bit = 1 << bit;
        if self.mask & bit > 0 {
            Some(self.bits & bit > 0)
        } else {
            None
        }
    }

    #[inline]
    pub fn set_bit_value(&mut self, bit: usize, value: bool) {
        let bit = 1u64 << bit;

        if value {
            self.bits |= bit;
        } else {
            self.bits &= !bit;
        }
        self.mask |= bit;
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, bool)> + 'static {
        let mask = self.mask;
        let bits = self.bits;
        (0..64).filter_map(move |idx| {
            let bit = 1u64 << idx;

            if mask & bit > 0 {
                Some((idx, bits & bit > 0))
            } else {
                None
            }
        })
    }
}

/// Values read from a request, keyed by chip line number.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LineValues {
    pub(crate) offsets: LineSet,
    pub(crate) values: MaskedBits,
}

impl LineValues {
    pub fn get(&self, offset: u32) -> Option<LineValue> {
        let idx = self.offsets.ordinal(offset)?;
        self.values.get(idx).map(LineValue::new)
    }

    pub fn bits(&self) -> MaskedBits {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, LineValue)> + '_ {
        self.offsets
            .iter()
            .enumerate()
            .filter_map(|(idx, offset)| {
                let v = LineValue::new(self.values.get(idx)?);
                Some((offset, v))
            })
    }
}

impl std::fmt::Debug for LineValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();

        for (offset, val) in self.iter() {
            map.entry(&offset, &val);
        }

        map.finish()
    }
}
