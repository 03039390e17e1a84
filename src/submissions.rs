//! Submission harvesting

use tracing::debug;

use crate::comments::collect_comments;
use crate::error::ClientError;
use crate::models::{Comment, ContentKind, PostKind, RawPost, Submission, MISSING_AUTHOR};
use crate::source::ContentSource;
use crate::utils::is_profile_community;

/// A submission together with its flattened comments
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestedPost {
    /// The submission record
    pub submission: Submission,
    /// Its comments in "top" order
    pub comments: Vec<Comment>,
}

/// Build the submission record of a raw post.
///
/// Returns `None` for posts that live in a user profile.
#[must_use]
pub fn to_submission(raw: &RawPost, from_listing: bool) -> Option<Submission> {
    if is_profile_community(&raw.community) {
        return None;
    }

    let (kind, video_duration_seconds) = match raw.kind {
        ContentKind::Image => (PostKind::Image, 0),
        ContentKind::Gallery => (PostKind::Gallery, 0),
        ContentKind::Video { duration_secs } => (PostKind::Video, duration_secs.unwrap_or(0)),
        ContentKind::Poll => (PostKind::Poll, 0),
        ContentKind::Text => (PostKind::Text, 0),
        ContentKind::Link => (PostKind::Link, 0),
    };

    Some(Submission {
        id: raw.id.clone(),
        title: raw.title.clone(),
        author: raw.author.clone().unwrap_or_else(|| MISSING_AUTHOR.to_string()),
        created_at: raw.created_at,
        is_restricted: raw.over_18,
        kind,
        approval_ratio: raw.upvote_ratio,
        award_count: raw.total_awards,
        cross_post_count: raw.num_crossposts,
        body_text: raw.selftext.clone(),
        video_duration_seconds,
        category: raw.flair.clone().unwrap_or_default(),
        community_name: raw.community.clone(),
        from_listing,
    })
}

/// Build a submission and fetch its comments.
///
/// Profile posts yield `None` without touching the source.
pub async fn build_submission<S>(source: &S, raw: &RawPost, from_listing: bool) -> Result<Option<HarvestedPost>, ClientError>
where
    S: ContentSource + ?Sized,
{
    let Some(submission) = to_submission(raw, from_listing) else {
        debug!(post_id = %raw.id, community = %raw.community, "Skipping profile post");
        return Ok(None);
    };

    let comments = collect_comments(source, &submission.id).await?;
    Ok(Some(HarvestedPost { submission, comments }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn raw_post(kind: ContentKind) -> RawPost {
        RawPost {
            id: "abc".to_string(),
            title: "Hello".to_string(),
            author: None,
            created_at: Utc::now(),
            over_18: false,
            kind,
            upvote_ratio: 0.93,
            total_awards: 2,
            num_crossposts: 0,
            selftext: String::new(),
            flair: None,
            community: "rust".to_string(),
        }
    }

    #[test]
    fn test_defaults_for_missing_author_and_flair() {
        let submission = to_submission(&raw_post(ContentKind::Link), true).unwrap();
        assert_eq!(submission.author, "None");
        assert_eq!(submission.category, "");
        assert_eq!(submission.kind, PostKind::Link);
        assert!(submission.from_listing);
    }

    #[test]
    fn test_video_duration() {
        let with = to_submission(&raw_post(ContentKind::Video { duration_secs: Some(61) }), true).unwrap();
        assert_eq!(with.kind, PostKind::Video);
        assert_eq!(with.video_duration_seconds, 61);

        let without = to_submission(&raw_post(ContentKind::Video { duration_secs: None }), true).unwrap();
        assert_eq!(without.video_duration_seconds, 0);

        let image = to_submission(&raw_post(ContentKind::Image), true).unwrap();
        assert_eq!(image.video_duration_seconds, 0);
    }

    #[test]
    fn test_profile_posts_are_dropped() {
        let mut post = raw_post(ContentKind::Text);
        post.community = "u_someone".to_string();
        assert!(to_submission(&post, true).is_none());
        post.community = "u/someone".to_string();
        assert!(to_submission(&post, false).is_none());
    }
}
