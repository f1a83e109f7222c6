//! Bounded sets of column or table indices.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign};

/// A fixed-width set of small indices with an overflow sentinel.
///
/// Indices `0..=62` are represented exactly. Bit 63 is not index 63: it is
/// the overflow sentinel, meaning "one or more indices ≥ 63 are present".
/// This caps the number of exactly distinguishable join participants or
/// columns at 63; anything past that collapses into the sentinel.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
#[repr(transparent)]
pub struct Bitmask(pub u64);

impl Bitmask {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Every exact index plus the overflow sentinel.
    pub const ALL: Self = Self(u64::MAX);

    /// Highest index that is represented exactly.
    pub const MAX_EXACT: u32 = 62;

    const OVERFLOW: u64 = 1 << 63;

    /// The set containing only `idx` (or only the sentinel if `idx` ≥ 63).
    #[inline]
    #[must_use]
    pub const fn single(idx: u32) -> Self {
        if idx > Self::MAX_EXACT {
            Self(Self::OVERFLOW)
        } else {
            Self(1 << idx)
        }
    }

    /// Add `idx` to the set. Indices ≥ 63 set the overflow sentinel.
    #[inline]
    pub fn set(&mut self, idx: u32) {
        self.0 |= Self::single(idx).0;
    }

    /// Test membership of `idx`.
    ///
    /// For `idx` ≥ 63 this tests the sentinel, i.e. answers "is some index
    /// ≥ 63 present", not whether that particular index was added.
    #[inline]
    #[must_use]
    pub const fn contains(self, idx: u32) -> bool {
        self.0 & Self::single(idx).0 != 0
    }

    /// True if the overflow sentinel is set.
    #[inline]
    #[must_use]
    pub const fn has_overflow(self) -> bool {
        self.0 & Self::OVERFLOW != 0
    }

    /// True if no index (and no sentinel) is present.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Set union.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Set intersection.
    #[inline]
    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }
}

impl BitOr for Bitmask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for Bitmask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Bitmask {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        self.intersect(rhs)
    }
}

impl BitAndAssign for Bitmask {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl fmt::Display for Bitmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
