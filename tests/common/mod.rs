//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use subharvest::models::{
    Comment, CommentNode, Community, ContentKind, CrossPost, Listing, PostKind, RawComment, RawCommunity, RawPost,
    Submission, MISSING_AUTHOR,
};
use subharvest::{ClientError, ContentSource};

/// One recorded `fetch_top` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopCall {
    pub community: String,
    pub after: Option<String>,
    pub limit: usize,
}

/// Shared record of `fetch_top` calls
pub type CallLog = Arc<Mutex<Vec<TopCall>>>;

/// Scripted in-memory content source
pub struct FakeSource {
    page_size: usize,
    listings: HashMap<String, Vec<RawPost>>,
    comments: HashMap<String, Vec<CommentNode>>,
    duplicates: HashMap<String, Vec<RawPost>>,
    failures: Mutex<HashMap<usize, ClientError>>,
    fail_always: Option<ClientError>,
    comment_failures: Mutex<HashMap<String, ClientError>>,
    duplicate_failures: Mutex<HashMap<String, ClientError>>,
    calls: CallLog,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            page_size: 100,
            listings: HashMap::new(),
            comments: HashMap::new(),
            duplicates: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
            fail_always: None,
            comment_failures: Mutex::new(HashMap::new()),
            duplicate_failures: Mutex::new(HashMap::new()),
            calls: CallLog::default(),
        }
    }

    /// Largest page the source hands out, whatever the requested limit
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_listing(mut self, community: &str, posts: Vec<RawPost>) -> Self {
        self.listings.insert(community.to_string(), posts);
        self
    }

    pub fn with_comments(mut self, post_id: &str, forest: Vec<CommentNode>) -> Self {
        self.comments.insert(post_id.to_string(), forest);
        self
    }

    pub fn with_duplicates(mut self, post_id: &str, posts: Vec<RawPost>) -> Self {
        self.duplicates.insert(post_id.to_string(), posts);
        self
    }

    /// Fail the `call`-th `fetch_top` call (0-based) once
    pub fn fail_top_call(self, call: usize, error: ClientError) -> Self {
        self.failures.lock().expect("failures lock").insert(call, error);
        self
    }

    /// Fail every `fetch_top` call
    pub fn fail_every_top_call(mut self, error: ClientError) -> Self {
        self.fail_always = Some(error);
        self
    }

    /// Fail the first `fetch_comments` call for `post_id`
    pub fn fail_comments_once(self, post_id: &str, error: ClientError) -> Self {
        self.comment_failures
            .lock()
            .expect("failures lock")
            .insert(post_id.to_string(), error);
        self
    }

    /// Fail the first `fetch_duplicates` call for `post_id`
    pub fn fail_duplicates_once(self, post_id: &str, error: ClientError) -> Self {
        self.duplicate_failures
            .lock()
            .expect("failures lock")
            .insert(post_id.to_string(), error);
        self
    }

    /// Handle on the call record that outlives a move of the source
    pub fn call_log(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    pub fn top_calls(&self) -> Vec<TopCall> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl Default for FakeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn fetch_top(&self, community: &str, after: Option<&str>, limit: usize) -> Result<Listing, ClientError> {
        let call = {
            let mut calls = self.calls.lock().expect("calls lock");
            calls.push(TopCall {
                community: community.to_string(),
                after: after.map(str::to_string),
                limit,
            });
            calls.len() - 1
        };

        if let Some(error) = &self.fail_always {
            return Err(error.clone());
        }
        if let Some(error) = self.failures.lock().expect("failures lock").remove(&call) {
            return Err(error);
        }

        let Some(posts) = self.listings.get(community) else {
            return Ok(Listing::default());
        };
        let start = match after {
            Some(id) => match posts.iter().position(|post| post.id == id) {
                Some(index) => index + 1,
                None => return Ok(Listing::default()),
            },
            None => 0,
        };
        let end = (start + limit.min(self.page_size)).min(posts.len());
        let page: Vec<RawPost> = posts[start..end].to_vec();
        let after = if end < posts.len() {
            page.last().map(|post| post.id.clone())
        } else {
            None
        };

        Ok(Listing { posts: page, after })
    }

    async fn fetch_community(&self, name: &str) -> Result<RawCommunity, ClientError> {
        Ok(community(name))
    }

    async fn fetch_duplicates(&self, post_id: &str, limit: usize) -> Result<Vec<RawPost>, ClientError> {
        if let Some(error) = self.duplicate_failures.lock().expect("failures lock").remove(post_id) {
            return Err(error);
        }
        Ok(self
            .duplicates
            .get(post_id)
            .map(|posts| posts.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<CommentNode>, ClientError> {
        if let Some(error) = self.comment_failures.lock().expect("failures lock").remove(post_id) {
            return Err(error);
        }
        Ok(self.comments.get(post_id).cloned().unwrap_or_default())
    }
}

pub fn community(name: &str) -> RawCommunity {
    RawCommunity {
        name: name.to_string(),
        public_description: format!("All about {name}"),
        created_at: Utc.with_ymd_and_hms(2012, 3, 4, 5, 6, 7).single().expect("valid date"),
        over_18: false,
        subscribers: 4_200,
    }
}

pub fn post(id: &str, community: &str) -> RawPost {
    RawPost {
        id: id.to_string(),
        title: format!("Post {id}"),
        author: Some("ferris".to_string()),
        created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).single().expect("valid date"),
        over_18: false,
        kind: ContentKind::Text,
        upvote_ratio: 0.9,
        total_awards: 0,
        num_crossposts: 0,
        selftext: "hello".to_string(),
        flair: None,
        community: community.to_string(),
    }
}

/// `count` posts of `community` with ids `{prefix}0000`, `{prefix}0001`, ...
pub fn posts(prefix: &str, community: &str, count: usize) -> Vec<RawPost> {
    (0..count).map(|i| post(&format!("{prefix}{i:04}"), community)).collect()
}

pub fn raw_comment(id: &str, parent_id: &str, post_id: &str) -> RawComment {
    RawComment {
        id: id.to_string(),
        body: format!("comment {id}"),
        author: Some("crab".to_string()),
        created_at: Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).single().expect("valid date"),
        parent_id: parent_id.to_string(),
        link_id: Some(format!("t3_{post_id}")),
        ups: 3,
        downs: 1,
        stickied: false,
    }
}

/// A top-level comment with one reply, followed by a "more" placeholder
pub fn comment_thread(post_id: &str) -> Vec<CommentNode> {
    let top = format!("{post_id}c1");
    let reply = format!("{post_id}c2");
    vec![
        CommentNode::Comment {
            comment: raw_comment(&top, &format!("t3_{post_id}"), post_id),
            replies: vec![CommentNode::Comment {
                comment: raw_comment(&reply, &format!("t1_{top}"), post_id),
                replies: Vec::new(),
            }],
        },
        CommentNode::More { count: 5 },
    ]
}

pub fn community_record(name: &str) -> Community {
    community(name).into()
}

pub fn submission(id: &str, community: &str, from_listing: bool) -> Submission {
    Submission {
        id: id.to_string(),
        title: format!("Submission {id}"),
        author: "ferris".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).single().expect("valid date"),
        is_restricted: false,
        kind: PostKind::Text,
        approval_ratio: 0.9,
        award_count: 1,
        cross_post_count: 0,
        body_text: "hello, \"world\"\nsecond line".to_string(),
        video_duration_seconds: 0,
        category: String::new(),
        community_name: community.to_string(),
        from_listing,
    }
}

/// `count` listing submissions of `community` with ids `{prefix}0000`, ...
pub fn submissions(prefix: &str, community: &str, count: usize) -> Vec<Submission> {
    (0..count)
        .map(|i| submission(&format!("{prefix}{i:04}"), community, true))
        .collect()
}

pub fn comment(id: &str, submission_id: &str) -> Comment {
    Comment {
        id: id.to_string(),
        body_text: format!("comment {id}"),
        author: MISSING_AUTHOR.to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).single().expect("valid date"),
        parent_id: format!("t3_{submission_id}"),
        submission_id: submission_id.to_string(),
        approval_ratio: 0.75,
        is_pinned: false,
    }
}

pub fn edge(parent_id: &str, post_id: &str) -> CrossPost {
    CrossPost {
        parent_id: parent_id.to_string(),
        post_id: post_id.to_string(),
    }
}
