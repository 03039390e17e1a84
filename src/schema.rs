//! Database schema definitions
//!
//! Table and column names used by the SQLite store.

/// Communities table schema
pub mod communities {
    /// Table name
    pub const TABLE: &str = "communities";
    /// Community name, primary key
    pub const NAME: &str = "name";
    /// Public description column
    pub const DESCRIPTION: &str = "description";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Adult content flag
    pub const IS_RESTRICTED: &str = "is_restricted";
    /// Subscriber count column
    pub const SUBSCRIBER_COUNT: &str = "subscriber_count";
}

/// Submissions table schema
pub mod submissions {
    /// Table name
    pub const TABLE: &str = "submissions";
    /// Submission id, primary key
    pub const ID: &str = "id";
    /// Title column
    pub const TITLE: &str = "title";
    /// Author column
    pub const AUTHOR: &str = "author";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Adult content flag
    pub const IS_RESTRICTED: &str = "is_restricted";
    /// Content kind column
    pub const KIND: &str = "kind";
    /// Upvote ratio column
    pub const APPROVAL_RATIO: &str = "approval_ratio";
    /// Award count column
    pub const AWARD_COUNT: &str = "award_count";
    /// Cross-post count column
    pub const CROSS_POST_COUNT: &str = "cross_post_count";
    /// Self-text column
    pub const BODY_TEXT: &str = "body_text";
    /// Video duration column
    pub const VIDEO_DURATION_SECONDS: &str = "video_duration_seconds";
    /// Flair column
    pub const CATEGORY: &str = "category";
    /// Owning community column
    pub const COMMUNITY_NAME: &str = "community_name";
    /// Listing origin flag
    pub const FROM_LISTING: &str = "from_listing";
}

/// Listing order of listing-derived submissions per community
pub mod listing_entries {
    /// Table name
    pub const TABLE: &str = "listing_entries";
    /// Insertion sequence
    pub const SEQ: &str = "seq";
    /// Community column
    pub const COMMUNITY_NAME: &str = "community_name";
    /// Submission column
    pub const SUBMISSION_ID: &str = "submission_id";
}

/// Comments table schema
pub mod comments {
    /// Table name
    pub const TABLE: &str = "comments";
    /// Comment id, primary key
    pub const ID: &str = "id";
    /// Body column
    pub const BODY_TEXT: &str = "body_text";
    /// Author column
    pub const AUTHOR: &str = "author";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Parent fullname column
    pub const PARENT_ID: &str = "parent_id";
    /// Owning submission column
    pub const SUBMISSION_ID: &str = "submission_id";
    /// Vote ratio column
    pub const APPROVAL_RATIO: &str = "approval_ratio";
    /// Pinned flag
    pub const IS_PINNED: &str = "is_pinned";
}

/// Cross-post edges table schema
pub mod crossposts {
    /// Table name
    pub const TABLE: &str = "crossposts";
    /// Original submission column
    pub const PARENT_ID: &str = "parent_id";
    /// Copy submission column
    pub const POST_ID: &str = "post_id";
}
