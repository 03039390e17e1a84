//! Metrics collection
//!
//! Thin wrapper around the `metrics` facade. Nothing is exported unless the
//! binary installs a recorder, so every call is cheap by default.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Submissions taken from community listings
pub const SUBMISSIONS_COLLECTED: &str = "subharvest_submissions_collected_total";
/// Cross-post edges discovered
pub const CROSSPOSTS_COLLECTED: &str = "subharvest_crossposts_collected_total";
/// Comments flattened
pub const COMMENTS_COLLECTED: &str = "subharvest_comments_collected_total";
/// Retryable upstream failures, labelled by kind
pub const RETRIES: &str = "subharvest_retries_total";
/// Finished communities, labelled by outcome
pub const COMMUNITIES: &str = "subharvest_communities_total";
/// Wall-clock time of one community collection
pub const COLLECTION_DURATION: &str = "subharvest_collection_duration_seconds";

/// Metrics recorder for harvesting
#[derive(Debug, Default, Clone, Copy)]
pub struct HarvestMetrics;

impl HarvestMetrics {
    /// Register metric descriptions with the installed recorder
    pub fn describe() {
        describe_counter!(SUBMISSIONS_COLLECTED, Unit::Count, "Submissions collected from community listings");
        describe_counter!(CROSSPOSTS_COLLECTED, Unit::Count, "Cross-post edges discovered");
        describe_counter!(COMMENTS_COLLECTED, Unit::Count, "Comments collected");
        describe_counter!(RETRIES, Unit::Count, "Retryable upstream failures");
        describe_counter!(COMMUNITIES, Unit::Count, "Communities processed by outcome");
        describe_histogram!(COLLECTION_DURATION, Unit::Seconds, "Time spent collecting one community");
    }

    /// Record one listing post with its comments and cross-posts
    pub fn record_post(&self, comments: usize, crossposts: usize) {
        counter!(SUBMISSIONS_COLLECTED).increment(1);
        counter!(COMMENTS_COLLECTED).increment(comments as u64);
        counter!(CROSSPOSTS_COLLECTED).increment(crossposts as u64);
    }

    /// Record a retry after a transient failure
    pub fn record_retry(&self, kind: &'static str) {
        counter!(RETRIES, "kind" => kind).increment(1);
    }

    /// Record the outcome of one community
    pub fn record_community(&self, outcome: &'static str, duration: Duration) {
        counter!(COMMUNITIES, "outcome" => outcome).increment(1);
        histogram!(COLLECTION_DURATION).record(duration.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let metrics = HarvestMetrics;
        HarvestMetrics::describe();
        metrics.record_post(3, 1);
        metrics.record_retry("server");
        metrics.record_community("collected", Duration::from_secs(2));
    }
}
