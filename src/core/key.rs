//! Variable keys and robot-pair identifiers.
//!
//! A [`Key`] packs a one-byte prefix (robot or landmark identifier) and a
//! 56-bit index into a single `u64`, so `a12` and `b12` are distinct
//! variables belonging to different trajectories.

use std::fmt;

const CHR_BITS: u32 = 8;
const INDEX_BITS: u32 = 64 - CHR_BITS;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// Variable identifier: prefix character + index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(u64);

impl Key {
    /// Create a key from a prefix character and an index.
    ///
    /// Only the low byte of `chr` is kept; indices wider than 56 bits are
    /// truncated.
    #[inline]
    pub fn symbol(chr: char, index: u64) -> Self {
        let c = (chr as u32 & 0xff) as u64;
        Self((c << INDEX_BITS) | (index & INDEX_MASK))
    }

    /// Wrap a raw packed key value.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw packed value.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Prefix character.
    #[inline]
    pub fn chr(self) -> char {
        ((self.0 >> INDEX_BITS) as u8) as char
    }

    /// Index within the prefix.
    #[inline]
    pub fn index(self) -> u64 {
        self.0 & INDEX_MASK
    }

    /// True if both keys share a prefix and `other` directly follows `self`.
    #[inline]
    pub fn is_consecutive(self, other: Key) -> bool {
        self.chr() == other.chr() && self.index() + 1 == other.index()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.chr(), self.index())
    }
}

/// Unordered pair of robot prefixes identifying the agents involved in a
/// loop closure.
///
/// The pair is normalised at construction so `ObservationId::new('a', 'b')`
/// and `ObservationId::new('b', 'a')` compare and hash equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservationId {
    first: char,
    second: char,
}

impl ObservationId {
    /// Create an identifier for the robot pair.
    pub fn new(a: char, b: char) -> Self {
        if a <= b {
            Self {
                first: a,
                second: b,
            }
        } else {
            Self {
                first: b,
                second: a,
            }
        }
    }

    /// Lower prefix of the pair.
    pub fn first(&self) -> char {
        self.first
    }

    /// Higher prefix of the pair.
    pub fn second(&self) -> char {
        self.second
    }

    /// True if the closure involves `prefix`.
    pub fn contains(&self, prefix: char) -> bool {
        self.first == prefix || self.second == prefix
    }

    /// True if the closure links two different robots.
    pub fn is_multirobot(&self) -> bool {
        self.first != self.second
    }
}

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// Endpoints of a factor, as returned by loop closure removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Source key
    pub from: Key,
    /// Target key
    pub to: Key,
}

impl Edge {
    /// Create an edge.
    pub fn new(from: Key, to: Key) -> Self {
        Self { from, to }
    }
}
