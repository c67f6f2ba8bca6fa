//! Time-derived posting identifiers.
//!
//! A [`PostingId`] is the number of nanoseconds since the Unix epoch at the
//! moment the posting was created. It doubles as primary key and creation
//! timestamp. Externally it is always rendered as 16 lowercase hex digits,
//! zero-padded, so that lexical order of file names equals numeric order.
//!
//! The value `0` is reserved: it marks a posting that has not been assigned an
//! identifier yet. Parsing never produces it from a malformed string; malformed
//! input yields `None` instead.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of hex characters in a rendered identifier.
pub const ID_HEX_LEN: usize = 16;

/// Identifier of a posting: nanoseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PostingId(u64);

impl PostingId {
    /// The unassigned identifier.
    pub const UNASSIGNED: Self = Self(0);

    /// Largest representable identifier.
    pub const MAX: Self = Self(u64::MAX);

    /// Wrap a raw nanosecond value.
    #[must_use]
    pub const fn new(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Mint an identifier from the wall clock.
    #[must_use]
    pub fn now() -> Self {
        Self::from_time(SystemTime::now())
    }

    /// Convert a point in time to an identifier.
    ///
    /// Times before the epoch clamp to zero; times past the `u64` nanosecond
    /// range (year 2554) saturate.
    #[must_use]
    pub fn from_time(time: SystemTime) -> Self {
        let nanos = time
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX));
        Self(nanos)
    }

    /// Convert a UTC datetime to an identifier.
    #[must_use]
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self::from_time(SystemTime::from(datetime))
    }

    /// Point in time this identifier encodes.
    ///
    /// Exact for the whole `u64` range, including values above `i64::MAX`
    /// nanoseconds that a signed conversion would overflow.
    #[must_use]
    pub fn to_time(self) -> SystemTime {
        UNIX_EPOCH + Duration::from_nanos(self.0)
    }

    /// The identifier as a UTC datetime.
    ///
    /// Identifiers above `i64::MAX` nanoseconds go through `SystemTime`
    /// instead of the signed nanosecond constructor.
    #[must_use]
    pub fn to_datetime(self) -> DateTime<Utc> {
        match i64::try_from(self.0) {
            Ok(nanos) => DateTime::from_timestamp_nanos(nanos),
            Err(_) => DateTime::from(self.to_time()),
        }
    }

    /// Calendar year (UTC) of the identifier's timestamp.
    #[must_use]
    pub fn year(self) -> i32 {
        self.to_datetime().year()
    }

    /// Raw nanosecond value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether this is the reserved unassigned identifier.
    #[must_use]
    pub const fn is_unassigned(self) -> bool {
        self.0 == 0
    }

    /// 16-character lowercase hex rendering, zero-padded.
    #[must_use]
    pub fn to_hex(self) -> String {
        hex::encode(self.0.to_be_bytes())
    }

    /// Parse exactly 16 hex characters.
    ///
    /// Returns `None` for any other length or for non-hex characters.
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != ID_HEX_LEN {
            return None;
        }
        let mut bytes = [0u8; 8];
        hex::decode_to_slice(s, &mut bytes).ok()?;
        Some(Self(u64::from_be_bytes(bytes)))
    }
}

impl fmt::Display for PostingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Error returned when a string is not a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid posting id {input:?}: expected {ID_HEX_LEN} hex characters")]
pub struct ParseIdError {
    input: String,
}

impl FromStr for PostingId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s).ok_or_else(|| ParseIdError {
            input: s.to_owned(),
        })
    }
}

impl Serialize for PostingId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PostingId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
