//! Task scheduling state bitfield.
//!
//! Each task row carries exactly one lifecycle state, but tests and
//! subscription filters are masks: `WAITING | LOST` matches a task in
//! either state. Test-and-update applies its update iff
//! `current.intersects(mask)`.

use core::fmt;
use core::ops::{BitAnd, BitOr, BitOrAssign};
use serde::{Deserialize, Serialize};

/// Scheduling state of a task, or a mask over states.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchedulingState(u32);

impl SchedulingState {
    /// No state bits set. Matches nothing when used as a mask.
    pub const NONE: Self = Self(0);
    /// The task is waiting for a scheduler to claim it.
    pub const WAITING: Self = Self(1);
    /// A scheduler has claimed the task.
    pub const SCHEDULED: Self = Self(2);
    /// The task is queued on its scheduler's node.
    pub const QUEUED: Self = Self(4);
    /// The task is executing.
    pub const RUNNING: Self = Self(8);
    /// The task finished.
    pub const DONE: Self = Self(16);
    /// The node owning the task died.
    pub const LOST: Self = Self(32);
    /// The task is being re-executed to rebuild lost objects.
    pub const RECONSTRUCTING: Self = Self(64);
    /// Every defined state.
    pub const ALL: Self = Self(127);

    const NAMES: [(Self, &'static str); 7] = [
        (Self::WAITING, "WAITING"),
        (Self::SCHEDULED, "SCHEDULED"),
        (Self::QUEUED, "QUEUED"),
        (Self::RUNNING, "RUNNING"),
        (Self::DONE, "DONE"),
        (Self::LOST, "LOST"),
        (Self::RECONSTRUCTING, "RECONSTRUCTING"),
    ];

    /// Construct from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Return the raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if `self & mask` is non-zero.
    #[must_use]
    pub const fn intersects(self, mask: Self) -> bool {
        self.0 & mask.0 != 0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no bits are set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Bitwise union.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for SchedulingState {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for SchedulingState {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for SchedulingState {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for SchedulingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let mut first = true;
        let mut rest = self.0;
        for (state, name) in Self::NAMES {
            if self.contains(state) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
                rest &= !state.0;
            }
        }
        if rest != 0 {
            if !first {
                f.write_str(" | ")?;
            }
            write!(f, "{rest:#x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SchedulingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
