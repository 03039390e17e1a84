//! Utility functions shared by the harvesters.

use chrono::{DateTime, TimeZone, Utc};

/// Type prefix the platform puts in front of submission ids
pub const SUBMISSION_PREFIX: &str = "t3_";

/// Strip a `t3_` prefix from a submission reference.
///
/// Ids without the prefix are returned unchanged.
#[must_use]
pub fn strip_submission_prefix(id: &str) -> &str {
    id.strip_prefix(SUBMISSION_PREFIX).unwrap_or(id)
}

/// Fully qualified submission name, as used for pagination cursors.
#[must_use]
pub fn submission_fullname(id: &str) -> String {
    if id.starts_with(SUBMISSION_PREFIX) {
        id.to_string()
    } else {
        format!("{SUBMISSION_PREFIX}{id}")
    }
}

/// Whether a community name denotes a user profile rather than a community.
#[must_use]
pub fn is_profile_community(name: &str) -> bool {
    name.starts_with("u_") || name.starts_with("u/")
}

/// Share of upvotes among all votes; 0 when nobody voted.
#[must_use]
pub fn approval_ratio(ups: i64, downs: i64) -> f64 {
    let total = ups + downs;
    if total > 0 {
        ups as f64 / total as f64
    } else {
        0.0
    }
}

/// Convert a fractional Unix timestamp into a UTC datetime.
///
/// Out-of-range values clamp to the epoch.
#[must_use]
pub fn timestamp_to_utc(secs: f64) -> DateTime<Utc> {
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9) as u32;
    Utc.timestamp_opt(whole, nanos).single().unwrap_or_default()
}
