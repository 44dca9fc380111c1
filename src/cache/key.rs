//! Cache key derivation.
//!
//! Keys combine the task identity, the normalized subject and a coarse time
//! bucket of the as-of date, so identical requests inside the same bucket
//! share one entry.

use chrono::{Datelike, NaiveDate};
use std::time::Duration;

const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Granularity of the time component of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBucket {
    /// Calendar day, e.g. `2026-10-18`.
    Day,
    /// ISO week, e.g. `2026-W42`.
    Week,
}

impl TimeBucket {
    /// Bucket matching a TTL: weekly for a week or longer, daily below.
    pub fn for_ttl(ttl: Duration) -> Self {
        if ttl >= WEEK {
            TimeBucket::Week
        } else {
            TimeBucket::Day
        }
    }

    pub fn label(&self, date: NaiveDate) -> String {
        match self {
            TimeBucket::Day => date.format("%Y-%m-%d").to_string(),
            TimeBucket::Week => {
                let week = date.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
        }
    }
}

/// Key for `task` on `subject` as of `as_of`.
pub fn cache_key(task: &str, subject: &str, as_of: NaiveDate, bucket: TimeBucket) -> String {
    format!(
        "{}:{}:{}",
        task,
        subject.trim().to_uppercase(),
        bucket.label(as_of)
    )
}
