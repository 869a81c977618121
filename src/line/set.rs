use std::fmt;

use itertools::Itertools;

use crate::errors::{Error, Result};
use crate::uapi;

/// Maximum number of lines a set, and so a request, can hold.
pub const MAX_LINES: u32 = uapi::v2::GPIO_LINES_MAX as u32;

/// Conversion of the various ways of naming lines into a [`LineSet`].
pub trait AsLineSet {
    fn as_line_set(&self) -> Result<LineSet>;
}

impl AsLineSet for u32 {
    fn as_line_set(&self) -> Result<LineSet> {
        LineSet::try_from_iter([*self])
    }
}

impl AsLineSet for [u32] {
    fn as_line_set(&self) -> Result<LineSet> {
        LineSet::try_from_iter(self.iter().copied())
    }
}

impl<const M: usize> AsLineSet for [u32; M] {
    fn as_line_set(&self) -> Result<LineSet> {
        LineSet::try_from_iter(*self)
    }
}

impl AsLineSet for Vec<u32> {
    fn as_line_set(&self) -> Result<LineSet> {
        self.as_slice().as_line_set()
    }
}

impl AsLineSet for LineSet {
    #[inline(always)]
    fn as_line_set(&self) -> Result<LineSet> {
        Ok(*self)
    }
}

/// A set of line numbers on one chip.
///
/// The position of a member among the members, in ascending line order, is
/// its *ordinal*.  Ordinals are the bit positions the kernel uses for the
/// value and attribute masks of a request.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LineSet(u64);

impl LineSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The set with members `0..n`.
    pub fn first(n: u32) -> Result<Self> {
        match n {
            0 => Ok(Self(0)),
            n if n <= MAX_LINES => Ok(Self(u64::MAX >> (MAX_LINES - n))),
            n => Err(Error::OutOfRange(n - 1)),
        }
    }

    pub fn try_from_iter(iter: impl IntoIterator<Item = u32>) -> Result<Self> {
        let mut set = Self::empty();
        for line in iter {
            set.set(line)?;
        }
        Ok(set)
    }

    /// Add a line to the set.
    pub fn set(&mut self, line: u32) -> Result<()> {
        if line >= MAX_LINES {
            return Err(Error::OutOfRange(line));
        }
        self.0 |= 1 << line;
        Ok(())
    }

    /// Remove a line from the set, returning whether it was a member.
    pub fn clear(&mut self, line: u32) -> bool {
        let was_set = self.is_set(line);
        if was_set {
            self.0 &= !(1 << line);
        }
        was_set
    }

    #[inline]
    pub const fn is_set(&self, line: u32) -> bool {
        line < MAX_LINES && self.0 & (1 << line) != 0
    }

    /// The number of members below `line`, if `line` is a member.
    #[inline]
    pub const fn ordinal(&self, line: u32) -> Option<usize> {
        if !self.is_set(line) {
            return None;
        }
        let below = (1u64 << line) - 1;
        Some((self.0 & below).count_ones() as usize)
    }

    /// The member at `ordinal`, the inverse of [`ordinal`](Self::ordinal).
    pub fn offset_at(&self, ordinal: usize) -> Option<u32> {
        self.iter().nth(ordinal)
    }

    #[inline]
    pub const fn count(&self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.count()
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// The request-relative mask covering every member.
    pub(crate) const fn mask(&self) -> u64 {
        match self.count() {
            0 => 0,
            n => u64::MAX >> (MAX_LINES as usize - n),
        }
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn contains_all(&self, other: &Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Members in ascending order.
    pub fn iter(&self) -> Iter {
        Iter(self.0)
    }

    /// The members as the kernel's line array.
    pub(crate) fn to_api_v2(self) -> (u32, [u32; uapi::v2::GPIO_LINES_MAX]) {
        let mut lines = [0; uapi::v2::GPIO_LINES_MAX];
        for (offset, wr) in self.iter().zip(lines.iter_mut()) {
            *wr = offset;
        }
        (self.count() as u32, lines)
    }
}

impl fmt::Debug for LineSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LineSet{{{}}}", self.iter().join(", "))
    }
}

impl IntoIterator for LineSet {
    type Item = u32;
    type IntoIter = Iter;

    fn into_iter(self) -> Iter {
        self.iter()
    }
}

impl IntoIterator for &LineSet {
    type Item = u32;
    type IntoIter = Iter;

    fn into_iter(self) -> Iter {
        self.iter()
    }
}

/// Iterator over the members of a [`LineSet`], in ascending order.
#[derive(Debug, Clone)]
pub struct Iter(u64);

impl Iterator for Iter {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.0 == 0 {
            return None;
        }
        let line = self.0.trailing_zeros();
        self.0 &= self.0 - 1;
        Some(line)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Iter {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ordinal_counts_members_below() {
        let set = LineSet::try_from_iter([3, 4, 5, 6, 40, 63]).unwrap();
        let mut last = None;
        for line in set.iter() {
            let ord = set.ordinal(line).unwrap();
            assert_eq!(ord, set.iter().filter(|l| *l < line).count());
            if let Some(prev) = last {
                assert!(ord > prev);
            }
            last = Some(ord);
        }
        assert_eq!(set.ordinal(4), Some(1));
        assert_eq!(set.ordinal(63), Some(5));
        assert_eq!(set.ordinal(7), None);
        assert_eq!(set.ordinal(64), None);
    }

    #[test]
    fn offset_at_inverts_ordinal() {
        let set = LineSet::try_from_iter([9, 1, 22]).unwrap();
        for line in set {
            assert_eq!(set.offset_at(set.ordinal(line).unwrap()), Some(line));
        }
        assert_eq!(set.offset_at(3), None);
    }

    #[test]
    fn iterates_ascending_without_duplicates() {
        let set = LineSet::try_from_iter([7, 2, 7, 0, 63]).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 2, 7, 63]);
        assert_eq!(set.count(), 4);
        assert_eq!(set.iter().len(), 4);
    }

    #[test]
    fn out_of_range() {
        let mut set = LineSet::empty();
        assert!(matches!(set.set(64), Err(Error::OutOfRange(64))));
        assert!(matches!(
            LineSet::try_from_iter([1, 100]),
            Err(Error::OutOfRange(100))
        ));
        assert!(set.is_empty());
    }

    #[test]
    fn mask_covers_ordinals() {
        assert_eq!(LineSet::empty().mask(), 0);
        assert_eq!(LineSet::try_from_iter([3, 4, 5, 6]).unwrap().mask(), 0xF);
        assert_eq!(LineSet::first(64).unwrap().mask(), u64::MAX);
        assert_eq!(LineSet::first(3).unwrap().bits(), 0b111);
        assert!(LineSet::first(65).is_err());
    }

    #[test]
    fn clear_and_union() {
        let mut set = [1u32, 2].as_line_set().unwrap();
        assert!(set.clear(1));
        assert!(!set.clear(1));
        let set = set.union(5u32.as_line_set().unwrap());
        assert_eq!(format!("{set:?}"), "LineSet{2, 5}");
        assert!(set.contains_all(&2u32.as_line_set().unwrap()));
    }

    #[test]
    fn to_api_v2_orders_lines() {
        let (n, lines) = [12u32, 3, 8].as_line_set().unwrap().to_api_v2();
        assert_eq!(n, 3);
        assert_eq!(&lines[..4], &[3, 8, 12, 0]);
    }
}
