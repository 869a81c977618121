//! Fixed capacity, NUL padded strings as used by the kernel name fields.

use std::ops::Deref;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FixedStr<const N: usize> {
    s: [u8; N],
}

impl<const N: usize> FixedStr<N> {
    #[inline]
    pub const fn empty() -> Self {
        Self { s: [0; N] }
    }

    /// Copy `s`, which may fill all `N` bytes.
    #[inline]
    pub fn new(s: &str) -> Result<Self, FixedStrErr> {
        let mut f = Self::empty();
        f.write(s)?;
        Ok(f)
    }

    /// Copy `s`, leaving room for the terminating NUL the kernel expects on
    /// strings it reads, so at most `N - 1` bytes are accepted.
    pub fn new_terminated(s: &str) -> Result<Self, FixedStrErr> {
        if s.len() >= N {
            return Err(FixedStrErr::CapacityOverflow {
                capacity: N.saturating_sub(1),
                required: s.len(),
            });
        }
        if s.as_bytes().contains(&0) {
            return Err(FixedStrErr::InteriorNul);
        }
        Self::new(s)
    }

    pub fn from_byte_array(mut bytes: [u8; N]) -> Result<Self, FixedStrErr> {
        let nul = find_nul(&bytes);
        let _ = core::str::from_utf8(&bytes[..nul])?;
        bytes[nul..].fill(0);

        Ok(FixedStr { s: bytes })
    }

    pub const fn into_byte_array(self) -> [u8; N] {
        self.s
    }

    #[inline]
    pub fn len(&self) -> usize {
        find_nul(&self.s)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        N == 0 || self.s[0] == 0
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        let l = self.len();
        let s = &self.s[0..l];
        // SAFETY: every constructor validates the bytes up to the first NUL
        unsafe { std::str::from_utf8_unchecked(s) }
    }

    pub fn write(&mut self, s: &str) -> Result<(), FixedStrErr> {
        let l = self.len();
        let new_len = l + s.len();

        if new_len > N {
            return Err(FixedStrErr::CapacityOverflow {
                capacity: N,
                required: new_len,
            });
        }

        self.s[l..new_len].copy_from_slice(s.as_bytes());
        Ok(())
    }
}

impl<const N: usize> Default for FixedStr<N> {
    #[inline(always)]
    fn default() -> Self {
        Self::empty()
    }
}

impl<const N: usize> std::fmt::Debug for FixedStr<N> {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FixedStr").field(&self.as_str()).finish()
    }
}

impl<const N: usize> std::fmt::Display for FixedStr<N> {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> AsRef<str> for FixedStr<N> {
    #[inline(always)]
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl<const N: usize> Deref for FixedStr<N> {
    type Target = str;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FixedStrErr {
    #[error(
        "Exceeded fixed string size: required {required} bytes with only {capacity} available"
    )]
    CapacityOverflow { capacity: usize, required: usize },
    #[error("String contains an interior NUL")]
    InteriorNul,
    #[error("UTF8 Error")]
    Utf8(#[from] core::str::Utf8Error),
}

#[inline]
fn find_nul(s: &[u8]) -> usize {
    s.iter().position(|c| *c == 0).unwrap_or(s.len())
}
