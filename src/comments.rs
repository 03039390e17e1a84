//! Comment harvesting
//!
//! Turns a post's comment forest into flat [`Comment`] records. Threading is
//! kept through `parent_id`; "more comments" placeholders are dropped.

use tracing::debug;

use crate::error::ClientError;
use crate::models::{Comment, CommentNode, RawComment, MISSING_AUTHOR};
use crate::source::ContentSource;
use crate::utils::{approval_ratio, strip_submission_prefix};

/// Fetch and flatten the comments of one post, in "top" order.
pub async fn collect_comments<S>(source: &S, post_id: &str) -> Result<Vec<Comment>, ClientError>
where
    S: ContentSource + ?Sized,
{
    let forest = source.fetch_comments(post_id).await?;
    let comments = flatten_comments(&forest);
    debug!(post_id, count = comments.len(), "Collected comments");
    Ok(comments)
}

/// Flatten a comment forest depth-first, parents before their replies.
#[must_use]
pub fn flatten_comments(forest: &[CommentNode]) -> Vec<Comment> {
    let mut out = Vec::new();
    let mut stack: Vec<&CommentNode> = forest.iter().rev().collect();

    while let Some(node) = stack.pop() {
        if let CommentNode::Comment { comment, replies } = node {
            out.push(to_comment(comment));
            stack.extend(replies.iter().rev());
        }
    }

    out
}

/// Build a comment record from its raw form.
#[must_use]
pub fn to_comment(raw: &RawComment) -> Comment {
    let reference = raw.link_id.as_deref().unwrap_or(&raw.parent_id);

    Comment {
        id: raw.id.clone(),
        body_text: raw.body.clone(),
        author: raw.author.clone().unwrap_or_else(|| MISSING_AUTHOR.to_string()),
        created_at: raw.created_at,
        parent_id: raw.parent_id.clone(),
        submission_id: strip_submission_prefix(reference).to_string(),
        approval_ratio: approval_ratio(raw.ups, raw.downs),
        is_pinned: raw.stickied,
    }
}
