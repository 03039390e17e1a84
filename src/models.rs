//! Data models for harvested communities
//!
//! This module contains the persisted records (communities, submissions,
//! comments, cross-post edges), the raw records handed over by a
//! [`ContentSource`](crate::source::ContentSource), and the in-memory result
//! of collecting one community.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author recorded when the platform no longer knows who wrote something.
///
/// Downstream consumers match on this literal, so it must not become an
/// empty string or a NULL.
pub const MISSING_AUTHOR: &str = "None";

/// A community (subreddit) snapshot, taken once on its first successful pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Community {
    /// Unique community name
    pub name: String,
    /// Public description
    pub description: String,
    /// Creation time of the community
    pub created_at: DateTime<Utc>,
    /// Restricted (NSFW) flag
    pub is_restricted: bool,
    /// Subscriber count at snapshot time
    pub subscriber_count: i64,
}

/// Persisted classification of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    /// Single image
    Image,
    /// Image gallery
    Gallery,
    /// Hosted video
    Video,
    /// Poll
    Poll,
    /// Self (text) post
    Text,
    /// Anything else
    Link,
}

impl PostKind {
    /// Lowercase name used in storage
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Gallery => "gallery",
            Self::Video => "video",
            Self::Poll => "poll",
            Self::Text => "text",
            Self::Link => "link",
        }
    }
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "gallery" => Ok(Self::Gallery),
            "video" => Ok(Self::Video),
            "poll" => Ok(Self::Poll),
            "text" => Ok(Self::Text),
            "link" => Ok(Self::Link),
            other => Err(format!("unknown post kind: {other}")),
        }
    }
}

/// A top-level post within a community
///
/// Field order is the column order of the flat-file variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Platform post id, without type prefix
    pub id: String,
    /// Title
    pub title: String,
    /// Author name, or [`MISSING_AUTHOR`]
    pub author: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Restricted (NSFW) flag
    pub is_restricted: bool,
    /// Classified kind
    pub kind: PostKind,
    /// Upvote ratio in [0, 1]
    pub approval_ratio: f64,
    /// Number of awards received
    pub award_count: i64,
    /// Number of cross-posts the platform reports
    pub cross_post_count: i64,
    /// Self-text body, empty for non-text posts
    pub body_text: String,
    /// Video duration, 0 unless a video with known duration
    pub video_duration_seconds: u32,
    /// Flair category, empty when absent
    pub category: String,
    /// Owning community; may not be collected yet
    pub community_name: String,
    /// True when the post came from its community's own listing rather than
    /// as a cross-post copy. Resume cursors are derived from these only.
    pub from_listing: bool,
}

/// A reply to a submission or to another comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Platform comment id
    pub id: String,
    /// Comment body
    pub body_text: String,
    /// Author name, or [`MISSING_AUTHOR`]
    pub author: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Prefixed id of the parent comment (`t1_`) or submission (`t3_`)
    pub parent_id: String,
    /// Owning submission id, prefix stripped
    pub submission_id: String,
    /// ups / (ups + downs), 0 when there were no votes
    pub approval_ratio: f64,
    /// Pinned by moderators
    pub is_pinned: bool,
}

/// Directed cross-post edge: `post_id` re-posts `parent_id` elsewhere
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrossPost {
    /// Original submission id
    pub parent_id: String,
    /// Re-posted submission id
    pub post_id: String,
}

/// Where to continue a partially collected community
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeCursor {
    /// Last submission collected from the listing, if any
    pub last_submission_id: Option<String>,
    /// Number of listing submissions already stored
    pub offset: usize,
}

/// A community whose stored listing is shorter than required
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteCommunity {
    /// Community name
    pub name: String,
    /// Last listing submission stored for it
    pub last_submission_id: String,
    /// Number of listing submissions stored
    pub offset: usize,
}

impl IncompleteCommunity {
    /// Resume point for the collector
    #[must_use]
    pub fn cursor(&self) -> ResumeCursor {
        ResumeCursor {
            last_submission_id: Some(self.last_submission_id.clone()),
            offset: self.offset,
        }
    }
}

/// Everything collected for one community in one successful run
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityHarvest {
    /// Community snapshot
    pub community: Community,
    /// Listing posts and their cross-post copies, deduplicated by id
    pub submissions: Vec<Submission>,
    /// Flattened comments of every submission
    pub comments: Vec<Comment>,
    /// Cross-post edges
    pub crossposts: Vec<CrossPost>,
}

impl CommunityHarvest {
    /// Number of submissions taken from the community's own listing
    #[must_use]
    pub fn listing_count(&self) -> usize {
        self.submissions.iter().filter(|s| s.from_listing).count()
    }
}

/// Normalized content classification produced by the source adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Single image
    Image,
    /// Image gallery
    Gallery,
    /// Hosted video, with duration when the platform reports media metadata
    Video {
        /// Duration in seconds
        duration_secs: Option<u32>,
    },
    /// Poll
    Poll,
    /// Self (text) post
    Text,
    /// Fallback
    Link,
}

/// A post as reported by the platform
#[derive(Debug, Clone, PartialEq)]
pub struct RawPost {
    /// Post id, without type prefix
    pub id: String,
    /// Title
    pub title: String,
    /// Author name; `None` when deleted or unavailable
    pub author: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// NSFW flag
    pub over_18: bool,
    /// Normalized classification
    pub kind: ContentKind,
    /// Upvote ratio
    pub upvote_ratio: f64,
    /// Awards received
    pub total_awards: i64,
    /// Cross-post count
    pub num_crossposts: i64,
    /// Self-text
    pub selftext: String,
    /// Flair text
    pub flair: Option<String>,
    /// Owning community name (may be a user profile, `u_...`)
    pub community: String,
}

/// Community metadata as reported by the platform
#[derive(Debug, Clone, PartialEq)]
pub struct RawCommunity {
    /// Display name
    pub name: String,
    /// Public description
    pub public_description: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// NSFW flag
    pub over_18: bool,
    /// Subscribers
    pub subscribers: i64,
}

impl From<RawCommunity> for Community {
    fn from(raw: RawCommunity) -> Self {
        Self {
            name: raw.name,
            description: raw.public_description,
            created_at: raw.created_at,
            is_restricted: raw.over_18,
            subscriber_count: raw.subscribers,
        }
    }
}

/// A comment as reported by the platform
#[derive(Debug, Clone, PartialEq)]
pub struct RawComment {
    /// Comment id
    pub id: String,
    /// Body
    pub body: String,
    /// Author; `None` when deleted
    pub author: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Prefixed parent reference
    pub parent_id: String,
    /// Prefixed submission reference, when reported
    pub link_id: Option<String>,
    /// Upvotes
    pub ups: i64,
    /// Downvotes
    pub downs: i64,
    /// Pinned flag
    pub stickied: bool,
}

/// Node of a comment forest
#[derive(Debug, Clone, PartialEq)]
pub enum CommentNode {
    /// A real comment with its replies
    Comment {
        /// The comment
        comment: RawComment,
        /// Direct replies, in platform order
        replies: Vec<CommentNode>,
    },
    /// "Load more comments" placeholder
    More {
        /// Number of hidden comments
        count: u64,
    },
}

/// One page of a community's "top" listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    /// Posts on this page, in listing order
    pub posts: Vec<RawPost>,
    /// Cursor of the next page; `None` when the listing ends here
    pub after: Option<String>,
}
