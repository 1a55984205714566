use std::time::Duration;

use serde::{Serialize, Serializer};

/// Store sentinel for a key that does not exist.
pub const TTL_MISSING: i64 = -2;

/// Store sentinel for a key that exists without an expiry.
pub const TTL_PERSISTENT: i64 = -1;

/// Remaining lease on a lock record.
///
/// `Missing` (not locked) is distinct from `Remaining(Duration::ZERO)`
/// (locked, about to expire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTtl {
    /// The key does not exist.
    Missing,
    /// The key exists but carries no expiry.
    Persistent,
    /// The key exists and expires after the given duration.
    Remaining(Duration),
}

impl LockTtl {
    /// Decode a millisecond TTL using the `PTTL` convention
    /// (`-2` missing, `-1` no expiry).
    #[must_use]
    pub fn from_millis(ms: i64) -> Self {
        match ms {
            TTL_PERSISTENT => Self::Persistent,
            ms if ms < 0 => Self::Missing,
            ms => Self::Remaining(Duration::from_millis(ms.unsigned_abs())),
        }
    }

    /// Encode back into the `PTTL` integer convention.
    #[must_use]
    pub fn as_millis(&self) -> i64 {
        match self {
            Self::Missing => TTL_MISSING,
            Self::Persistent => TTL_PERSISTENT,
            Self::Remaining(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Remaining duration, if the key exists with an expiry.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Self::Remaining(d) => Some(*d),
            _ => None,
        }
    }

    /// Whether the key exists at all.
    #[must_use]
    pub fn exists(&self) -> bool {
        !matches!(self, Self::Missing)
    }
}

impl Serialize for LockTtl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.as_millis())
    }
}
