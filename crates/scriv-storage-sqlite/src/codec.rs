//! Conversions between posting values and SQLite column types.
//!
//! SQLite integers are signed 64-bit, identifiers are unsigned. Identifiers
//! up to `i64::MAX` (every timestamp before the year 2262) are stored
//! unchanged. The upper half keeps its bit pattern and lands on the negative
//! integers, so the mapping stays one-to-one over all of `u64`.
//!
//! Negative column values therefore sort after the newest identifiers they
//! stand for. Queries order by `(id < 0) DESC, id DESC` and
//! [`id_segments`] splits identifier ranges at the sign boundary.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use scriv_storage::PostingId;

/// Column value for an identifier.
#[must_use]
pub fn id_to_db(id: u64) -> i64 {
    i64::try_from(id).unwrap_or_else(|_| i64::from_ne_bytes(id.to_ne_bytes()))
}

/// Identifier for a column value.
#[must_use]
pub fn id_from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_else(|_| u64::from_ne_bytes(value.to_ne_bytes()))
}

/// A segment that `BETWEEN ? AND ?` never matches.
const EMPTY_SEGMENT: (i64, i64) = (1, 0);

/// Inclusive column segments covering the identifiers `lo..hi`.
///
/// A range that crosses `i64::MAX` becomes two segments; unused slots hold a
/// segment that matches nothing.
pub(crate) fn id_segments(lo: PostingId, hi: PostingId) -> [(i64, i64); 2] {
    if lo >= hi {
        return [EMPTY_SEGMENT; 2];
    }
    let (lo, last) = (lo.as_u64(), hi.as_u64() - 1);
    let split = i64::MAX.unsigned_abs();
    if last <= split || lo > split {
        [(id_to_db(lo), id_to_db(last)), EMPTY_SEGMENT]
    } else {
        [(id_to_db(lo), i64::MAX), (i64::MIN, id_to_db(last))]
    }
}

pub(crate) fn posting_id_to_db(id: PostingId) -> i64 {
    id_to_db(id.as_u64())
}

pub(crate) fn posting_id_from_db(value: i64) -> PostingId {
    PostingId::new(id_from_db(value))
}

/// Nanoseconds since the epoch, saturating. Times before the epoch map to 0.
pub(crate) fn time_to_db(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
}

pub(crate) fn time_from_db(nanos: i64) -> SystemTime {
    u64::try_from(nanos).map_or(UNIX_EPOCH, |n| UNIX_EPOCH + Duration::from_nanos(n))
}
