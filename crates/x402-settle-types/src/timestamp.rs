//! Unix timestamps for payment authorization windows.
//!
//! ERC-3009 `validAfter` / `validBefore` and JWT `iat` / `nbf` / `exp` are all
//! expressed in whole seconds since the Unix epoch.

use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt;
use std::num::ParseIntError;
use std::ops::{Add, Sub};
use std::str::FromStr;
use std::time::SystemTime;

/// Seconds since the Unix epoch (1970-01-01T00:00:00Z).
///
/// Serialized as a stringified integer, because JavaScript facilitators cannot
/// represent every 64-bit integer as a JSON number.
///
/// ```
/// use x402_settle_types::timestamp::UnixTimestamp;
///
/// let valid_after = UnixTimestamp::from_secs(1_700_000_000);
/// let valid_before = valid_after + 3600;
/// assert_eq!(valid_before - valid_after, 3600);
/// assert_eq!(serde_json::to_string(&valid_before).unwrap(), "\"1700003600\"");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct UnixTimestamp(u64);

impl fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UnixTimestamp {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(UnixTimestamp)
    }
}

impl Add<u64> for UnixTimestamp {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        UnixTimestamp(self.0.saturating_add(rhs))
    }
}

/// Distance in seconds between two timestamps, saturating at zero.
impl Sub for UnixTimestamp {
    type Output = u64;

    fn sub(self, rhs: Self) -> Self::Output {
        self.0.saturating_sub(rhs.0)
    }
}

impl UnixTimestamp {
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Current system time. A clock set before the epoch reads as zero.
    pub fn now() -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self(now)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }
}
