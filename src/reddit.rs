//! HTTP content source for the platform's OAuth JSON API.
//!
//! Authenticates with the application-only client-credentials grant and
//! caches the bearer token until shortly before it expires. Responses are
//! decoded into private wire structs and normalized into the raw records of
//! [`crate::models`] here, so nothing past this module sees platform JSON.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RedditConfig;
use crate::error::ClientError;
use crate::models::{CommentNode, Listing, RawComment, RawCommunity, RawPost};
use crate::source::{classify, ContentSource, PostFlags};
use crate::utils::{submission_fullname, timestamp_to_utc};

const AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";

/// Largest page the listing endpoints serve
pub const MAX_PAGE_SIZE: usize = 100;

const DELETED_AUTHOR: &str = "[deleted]";

// Refresh this long before the platform would reject the token
const TOKEN_SLACK: Duration = Duration::from_secs(60);

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Content source backed by the platform's HTTP API
pub struct RedditClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    /// Create a client from the `reddit` config section
    pub fn new(config: &RedditConfig) -> Result<Self> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            anyhow::bail!("API credentials missing: set CLIENT_ID and CLIENT_SECRET");
        }

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token: Mutex::new(None),
        })
    }

    async fn bearer(&self) -> Result<String, ClientError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .http
            .post(AUTH_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let granted: TokenResponse = read_json(response).await?;

        let lifetime = Duration::from_secs(granted.expires_in).saturating_sub(TOKEN_SLACK);
        debug!(expires_in = granted.expires_in, "Obtained access token");
        let value = granted.access_token;
        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ClientError> {
        let token = self.bearer().await?;
        let response = self
            .http
            .get(format!("{API_BASE}{path}"))
            .bearer_auth(token)
            .query(&[("raw_json", "1")])
            .query(query)
            .send()
            .await?;

        if let Some(pause) = rate_limit_pause(&response) {
            warn!(pause_secs = pause.as_secs_f64(), "Rate limit reached, pausing");
            tokio::time::sleep(pause).await;
        }

        if response.status() == StatusCode::UNAUTHORIZED {
            // Revoked or expired early; the next attempt fetches a new one.
            self.token.lock().await.take();
            return Err(ClientError::Server(format!("Unauthorized for {path}")));
        }

        read_json(response).await
    }
}

/// Read the whole body, then decode it.
///
/// A body cut off mid-transfer is a connection failure; a complete body that
/// does not decode is not worth retrying.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let body = response
        .error_for_status()?
        .bytes()
        .await
        .map_err(|err| ClientError::Connection(format!("Failed to read response body: {err}")))?;

    serde_json::from_slice(&body).map_err(|err| ClientError::Fatal(format!("Invalid response body: {err}")))
}

#[async_trait]
impl ContentSource for RedditClient {
    async fn fetch_top(&self, community: &str, after: Option<&str>, limit: usize) -> Result<Listing, ClientError> {
        let mut query = vec![("t", "all".to_string()), ("limit", limit.min(MAX_PAGE_SIZE).to_string())];
        if let Some(after) = after {
            query.push(("after", submission_fullname(after)));
        }

        let envelope: Thing<ListingData<Thing<PostData>>> = self.get(&format!("/r/{community}/top"), &query).await?;
        Ok(envelope.data.into_listing())
    }

    async fn fetch_community(&self, name: &str) -> Result<RawCommunity, ClientError> {
        let about: Thing<AboutData> = self.get(&format!("/r/{name}/about"), &[]).await?;
        Ok(about.data.into())
    }

    async fn fetch_duplicates(&self, post_id: &str, limit: usize) -> Result<Vec<RawPost>, ClientError> {
        let query = [("limit", limit.min(MAX_PAGE_SIZE).to_string())];
        let (_, duplicates): (PostListing, PostListing) = self.get(&format!("/duplicates/{post_id}"), &query).await?;
        Ok(duplicates.data.into_listing().posts)
    }

    async fn fetch_comments(&self, post_id: &str) -> Result<Vec<CommentNode>, ClientError> {
        let query = [("sort", "top".to_string())];
        let (_, comments): (PostListing, CommentListing) = self.get(&format!("/comments/{post_id}"), &query).await?;
        Ok(comments.data.into_forest())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct Thing<T> {
    data: T,
}

#[derive(Deserialize)]
struct ListingData<T> {
    #[serde(default)]
    after: Option<String>,
    #[serde(default = "Vec::new")]
    children: Vec<T>,
}

type PostListing = Thing<ListingData<Thing<PostData>>>;
type CommentListing = Thing<ListingData<CommentThing>>;

impl ListingData<Thing<PostData>> {
    fn into_listing(self) -> Listing {
        Listing {
            posts: self.children.into_iter().map(|child| child.data.into()).collect(),
            after: self.after,
        }
    }
}

impl ListingData<CommentThing> {
    fn into_forest(self) -> Vec<CommentNode> {
        self.children.into_iter().filter_map(CommentThing::into_node).collect()
    }
}

#[derive(Deserialize)]
struct PostData {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    over_18: bool,
    #[serde(default)]
    post_hint: Option<String>,
    #[serde(default)]
    is_gallery: Option<bool>,
    #[serde(default)]
    is_video: bool,
    #[serde(default)]
    poll_data: Option<serde_json::Value>,
    #[serde(default)]
    is_self: bool,
    #[serde(default)]
    media: Option<Media>,
    #[serde(default)]
    upvote_ratio: f64,
    #[serde(default)]
    total_awards_received: i64,
    #[serde(default)]
    num_crossposts: i64,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    link_flair_text: Option<String>,
    subreddit: String,
}

#[derive(Deserialize)]
struct Media {
    #[serde(default)]
    reddit_video: Option<VideoMeta>,
}

#[derive(Deserialize)]
struct VideoMeta {
    #[serde(default)]
    duration: Option<u32>,
}

impl From<PostData> for RawPost {
    fn from(post: PostData) -> Self {
        let flags = PostFlags {
            post_hint: post.post_hint,
            is_gallery: post.is_gallery.unwrap_or(false),
            is_video: post.is_video,
            has_poll: post.poll_data.as_ref().is_some_and(|poll| !poll.is_null()),
            is_self: post.is_self,
            video_duration: post
                .media
                .and_then(|media| media.reddit_video)
                .and_then(|video| video.duration),
        };

        Self {
            id: post.id,
            title: post.title,
            author: known_author(post.author),
            created_at: timestamp_to_utc(post.created_utc),
            over_18: post.over_18,
            kind: classify(&flags),
            upvote_ratio: post.upvote_ratio,
            total_awards: post.total_awards_received,
            num_crossposts: post.num_crossposts,
            selftext: post.selftext,
            flair: post.link_flair_text,
            community: post.subreddit,
        }
    }
}

#[derive(Deserialize)]
struct AboutData {
    display_name: String,
    #[serde(default)]
    public_description: String,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    over18: bool,
    #[serde(default)]
    subscribers: Option<i64>,
}

impl From<AboutData> for RawCommunity {
    fn from(about: AboutData) -> Self {
        Self {
            name: about.display_name,
            public_description: about.public_description,
            created_at: timestamp_to_utc(about.created_utc),
            over_18: about.over18,
            subscribers: about.subscribers.unwrap_or(0),
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "kind", content = "data")]
enum CommentThing {
    #[serde(rename = "t1")]
    Comment(Box<CommentData>),
    #[serde(rename = "more")]
    More(MoreData),
    #[serde(other)]
    Other,
}

impl CommentThing {
    fn into_node(self) -> Option<CommentNode> {
        match self {
            Self::Comment(data) => Some((*data).into()),
            Self::More(more) => Some(CommentNode::More { count: more.count }),
            Self::Other => None,
        }
    }
}

#[derive(Deserialize)]
struct MoreData {
    #[serde(default)]
    count: u64,
}

#[derive(Deserialize)]
struct CommentData {
    id: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    created_utc: f64,
    parent_id: String,
    #[serde(default)]
    link_id: Option<String>,
    #[serde(default)]
    ups: i64,
    #[serde(default)]
    downs: i64,
    #[serde(default)]
    stickied: bool,
    #[serde(default)]
    replies: Option<Replies>,
}

// Leaf comments carry an empty string instead of a listing.
#[derive(Deserialize)]
#[serde(untagged)]
enum Replies {
    Listing(CommentListing),
    Empty(String),
}

impl From<CommentData> for CommentNode {
    fn from(data: CommentData) -> Self {
        let replies = match data.replies {
            Some(Replies::Listing(listing)) => listing.data.into_forest(),
            Some(Replies::Empty(_)) | None => Vec::new(),
        };

        Self::Comment {
            comment: RawComment {
                id: data.id,
                body: data.body,
                author: known_author(data.author),
                created_at: timestamp_to_utc(data.created_utc),
                parent_id: data.parent_id,
                link_id: data.link_id,
                ups: data.ups,
                downs: data.downs,
                stickied: data.stickied,
            },
            replies,
        }
    }
}

/// Time to wait before the next request once the quota is used up
fn rate_limit_pause(response: &Response) -> Option<Duration> {
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<f64>().ok())
    };

    let remaining = header("x-ratelimit-remaining")?;
    let reset = header("x-ratelimit-reset").filter(|secs| secs.is_finite())?;
    (remaining < 1.0).then(|| Duration::from_secs_f64(reset.max(0.0)))
}

fn known_author(author: Option<String>) -> Option<String> {
    author.filter(|name| name != DELETED_AUTHOR && !name.is_empty())
}
