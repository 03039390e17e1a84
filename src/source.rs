//! Content source contract
//!
//! A [`ContentSource`] wraps the upstream platform and hands back normalized
//! records. It never retries; the collector owns the retry policy.

use async_trait::async_trait;

use crate::error::ClientError;
use crate::models::{CommentNode, ContentKind, Listing, RawCommunity, RawPost};

/// Read access to the platform's communities, posts and comments.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// One page of the community's "top" listing, starting after `after`
    /// (a bare post id) and holding at most `limit` posts.
    async fn fetch_top(&self, community: &str, after: Option<&str>, limit: usize) -> Result<Listing, ClientError>;

    /// Metadata of a community.
    async fn fetch_community(&self, name: &str) -> Result<RawCommunity, ClientError>;

    /// Up to `limit` cross-posted duplicates of a post.
    async fn fetch_duplicates(&self, post_id: &str, limit: usize) -> Result<Vec<RawPost>, ClientError>;

    /// The post's comment forest in "top" order.
    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<CommentNode>, ClientError>;
}

/// Shape hints the platform attaches to a post
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFlags {
    /// `post_hint` value, e.g. "image"
    pub post_hint: Option<String>,
    /// Gallery flag
    pub is_gallery: bool,
    /// Hosted video flag
    pub is_video: bool,
    /// Poll data present
    pub has_poll: bool,
    /// Self post flag
    pub is_self: bool,
    /// Video duration from media metadata, when present
    pub video_duration: Option<u32>,
}

/// Classify a post. The first matching hint wins: image, gallery, video,
/// poll, self post; everything else is a link.
#[must_use]
pub fn classify(flags: &PostFlags) -> ContentKind {
    if flags.post_hint.as_deref() == Some("image") {
        ContentKind::Image
    } else if flags.is_gallery {
        ContentKind::Gallery
    } else if flags.is_video {
        ContentKind::Video {
            duration_secs: flags.video_duration,
        }
    } else if flags.has_poll {
        ContentKind::Poll
    } else if flags.is_self {
        ContentKind::Text
    } else {
        ContentKind::Link
    }
}
