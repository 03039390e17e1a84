//! Error types for the subharvest library.
//!
//! Upstream failures are classified once, in [`ClientError`], so the
//! collector can decide between backing off and giving up. Collection
//! outcomes that end a community's run are [`CollectError`]s.

use thiserror::Error;

/// Errors reported by a content source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Upstream overloaded or failing (5xx, rate limited)
    #[error("Server error: {0}")]
    Server(String),

    /// Network-level failure (connect, timeout, reset)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Anything else; never retried
    #[error("Request failed: {0}")]
    Fatal(String),
}

impl ClientError {
    /// Whether the collector may back off and try again
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Server(_) | Self::Connection(_))
    }

    /// Short label used in logs and metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Server(_) => "server",
            Self::Connection(_) => "connection",
            Self::Fatal(_) => "fatal",
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            return Self::Connection(err.to_string());
        }
        match err.status() {
            Some(status) if status.is_server_error() || status.as_u16() == 429 => Self::Server(err.to_string()),
            _ => Self::Fatal(err.to_string()),
        }
    }
}

/// Errors that end the collection of one community.
#[derive(Error, Debug)]
pub enum CollectError {
    /// The time budget ran out before the submission target was reached
    #[error("Collected {collected}/{target} submissions of r/{community} before the time budget ran out ({})", describe_last(.last_error.as_ref()))]
    TimedOut {
        /// Community being collected
        community: String,
        /// Listing submissions collected in this run
        collected: usize,
        /// Submissions this run had to collect
        target: usize,
        /// Last retryable error seen, if any
        last_error: Option<ClientError>,
    },

    /// The listing ended before the submission target was reached
    #[error("Listing of r/{community} ended after {collected}/{target} submissions")]
    ListingExhausted {
        /// Community being collected
        community: String,
        /// Listing submissions collected in this run
        collected: usize,
        /// Submissions this run had to collect
        target: usize,
    },

    /// A cross-post landed in a user profile and the policy is to abort
    #[error("Cross-post of {post_id} from r/{community} lands in profile {profile}; aborting collection")]
    ProfileCrosspost {
        /// Community being collected
        community: String,
        /// Original submission
        post_id: String,
        /// Profile the duplicate belongs to
        profile: String,
    },

    /// The resume offset already meets the submission limit
    #[error("r/{community} already has {offset} of {limit} submissions")]
    AlreadyComplete {
        /// Community being collected
        community: String,
        /// Stored listing submissions
        offset: usize,
        /// Configured submission limit
        limit: usize,
    },

    /// No post ever yielded community metadata
    #[error("No community information captured for r/{0}")]
    MissingCommunity(String),

    /// Non-retryable upstream failure
    #[error(transparent)]
    Client(#[from] ClientError),
}

fn describe_last(last: Option<&ClientError>) -> String {
    last.map_or_else(|| "timed out".to_string(), |e| format!("last error: {e}"))
}

/// Convenience type alias for collection results
pub type Result<T> = std::result::Result<T, CollectError>;
