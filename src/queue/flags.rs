//! Transport option bits passed through terminal operations.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Option bits for acknowledge / negative-acknowledge / reject.
///
/// The consumer never examines these; they are handed to the queue as-is.
/// The named constants follow the common broker conventions, and transports
/// with their own bits can build values with [`Flags::from_bits`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Flags(u32);

impl Flags {
    /// No options.
    pub const NONE: Flags = Flags(0);
    /// Apply to every outstanding delivery up to and including the given tag.
    pub const MULTIPLE: Flags = Flags(1);
    /// Put the message back on the queue instead of discarding it.
    pub const REQUEUE: Flags = Flags(1 << 1);

    pub const fn from_bits(bits: u32) -> Self {
        Flags(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06b}", self.0)
    }
}
