//! Community collection
//!
//! [`CommunityCollector`] pages through one community's "top" listing until
//! it holds the requested number of submissions. It resumes from a
//! [`ResumeCursor`], backs off on transient upstream failures, expands
//! cross-posts, and gives up once the time budget is spent.
//!
//! A run moves through `Starting -> Fetching -> (RetryWait -> Fetching)* ->
//! Done | Failed`. Nothing is returned for a failed run, so partial results
//! never reach storage.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::{ClientError, CollectError, Result};
use crate::metrics::HarvestMetrics;
use crate::models::{Comment, Community, CommunityHarvest, CrossPost, ResumeCursor, Submission};
use crate::source::ContentSource;
use crate::submissions::{build_submission, HarvestedPost};
use crate::utils::is_profile_community;

/// What to do when a cross-post lands in a user profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileCrosspostPolicy {
    /// Abandon the whole community run
    #[default]
    Abort,
    /// Drop the duplicate and keep going
    Skip,
}

/// Limits and timings of a collection run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorSettings {
    /// Listing submissions wanted per community, including already stored ones
    pub submissions_limit: usize,
    /// Duplicates fetched per cross-posted submission
    pub crossposts_limit: usize,
    /// Wall-clock budget of one community
    pub time_budget: Duration,
    /// Pause after an upstream server error
    pub server_error_backoff: Duration,
    /// Pause after a connection error
    pub connection_error_backoff: Duration,
    /// Handling of cross-posts into user profiles
    pub profile_crossposts: ProfileCrosspostPolicy,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            submissions_limit: 350,
            crossposts_limit: 10,
            time_budget: Duration::from_secs(900),
            server_error_backoff: Duration::from_secs(30),
            connection_error_backoff: Duration::from_secs(120),
            profile_crossposts: ProfileCrosspostPolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectorState {
    Starting,
    Fetching,
    RetryWait,
    Done,
    Failed,
}

enum PassOutcome {
    Reached,
    Exhausted,
    OutOfTime,
}

struct Progress {
    cursor: Option<String>,
    collected: usize,
    target: usize,
}

/// In-memory batch of one community, deduplicated by submission id
#[derive(Default)]
struct Batch {
    community: Option<Community>,
    submissions: Vec<Submission>,
    positions: HashMap<String, usize>,
    comments: Vec<Comment>,
    crossposts: Vec<CrossPost>,
    edges: HashSet<CrossPost>,
}

impl Batch {
    fn add_post(&mut self, post: HarvestedPost) {
        if let Some(&position) = self.positions.get(&post.submission.id) {
            // Seen before as a cross-post copy. The listing wins and the
            // record moves to its listing position.
            if post.submission.from_listing && !self.submissions[position].from_listing {
                let mut promoted = self.submissions.remove(position);
                promoted.from_listing = true;
                for (index, submission) in self.submissions.iter().enumerate().skip(position) {
                    self.positions.insert(submission.id.clone(), index);
                }
                self.positions.insert(promoted.id.clone(), self.submissions.len());
                self.submissions.push(promoted);
            }
            return;
        }

        self.positions.insert(post.submission.id.clone(), self.submissions.len());
        self.comments.extend(post.comments);
        self.submissions.push(post.submission);
    }

    fn add_edge(&mut self, parent_id: &str, post_id: &str) -> bool {
        if parent_id == post_id {
            return false;
        }
        let edge = CrossPost {
            parent_id: parent_id.to_string(),
            post_id: post_id.to_string(),
        };
        if self.edges.insert(edge.clone()) {
            self.crossposts.push(edge);
            true
        } else {
            false
        }
    }

    fn finish(self, community: &str) -> Result<CommunityHarvest> {
        let snapshot = self
            .community
            .ok_or_else(|| CollectError::MissingCommunity(community.to_string()))?;

        Ok(CommunityHarvest {
            community: snapshot,
            submissions: self.submissions,
            comments: self.comments,
            crossposts: self.crossposts,
        })
    }
}

/// Collects one community at a time from a content source
pub struct CommunityCollector<'a, S: ?Sized> {
    source: &'a S,
    settings: CollectorSettings,
    metrics: HarvestMetrics,
}

impl<'a, S> CommunityCollector<'a, S>
where
    S: ContentSource + ?Sized,
{
    /// Create a collector over `source`
    pub const fn new(source: &'a S, settings: CollectorSettings) -> Self {
        Self {
            source,
            settings,
            metrics: HarvestMetrics,
        }
    }

    /// Collect `community`, continuing after `resume` when given.
    ///
    /// Succeeds only once `submissions_limit - resume.offset` listing
    /// submissions were collected in this run.
    pub async fn collect(&self, community: &str, resume: Option<&ResumeCursor>) -> Result<CommunityHarvest> {
        let offset = resume.map_or(0, |cursor| cursor.offset);
        let limit = self.settings.submissions_limit;
        let target = limit.saturating_sub(offset);
        if target == 0 {
            return Err(CollectError::AlreadyComplete {
                community: community.to_string(),
                offset,
                limit,
            });
        }

        let started = Instant::now();
        let mut state = CollectorState::Starting;
        let mut progress = Progress {
            cursor: resume.and_then(|cursor| cursor.last_submission_id.clone()),
            collected: 0,
            target,
        };
        let mut batch = Batch::default();
        let mut last_error: Option<ClientError> = None;

        info!(community, target, offset, after = ?progress.cursor, "Collecting submissions");

        while progress.collected < target && started.elapsed() < self.settings.time_budget {
            state = transition(community, state, CollectorState::Fetching);

            match self.fetch_pass(community, started, &mut progress, &mut batch).await {
                Ok(PassOutcome::Reached | PassOutcome::OutOfTime) => {},
                Ok(PassOutcome::Exhausted) => {
                    transition(community, state, CollectorState::Failed);
                    self.metrics.record_community("failed", started.elapsed());
                    return Err(CollectError::ListingExhausted {
                        community: community.to_string(),
                        collected: progress.collected,
                        target,
                    });
                },
                Err(CollectError::Client(err)) if err.is_retryable() => {
                    let pause = self.backoff(&err);
                    warn!(
                        community,
                        error = %err,
                        collected = progress.collected,
                        pause_secs = pause.as_secs(),
                        "Transient upstream failure, backing off"
                    );
                    self.metrics.record_retry(err.kind());
                    state = transition(community, state, CollectorState::RetryWait);
                    last_error = Some(err);
                    sleep(pause).await;
                },
                Err(err) => {
                    transition(community, state, CollectorState::Failed);
                    self.metrics.record_community("failed", started.elapsed());
                    return Err(err);
                },
            }
        }

        if progress.collected < target {
            transition(community, state, CollectorState::Failed);
            self.metrics.record_community("failed", started.elapsed());
            warn!(community, collected = progress.collected, target, "Time budget exhausted");
            return Err(CollectError::TimedOut {
                community: community.to_string(),
                collected: progress.collected,
                target,
                last_error,
            });
        }

        let harvest = batch.finish(community)?;
        transition(community, state, CollectorState::Done);
        self.metrics.record_community("collected", started.elapsed());
        info!(
            community,
            submissions = harvest.submissions.len(),
            comments = harvest.comments.len(),
            crossposts = harvest.crossposts.len(),
            "Collection finished"
        );
        Ok(harvest)
    }

    /// Page through the listing from the current cursor until the target is
    /// met, the listing ends, the budget runs out, or an error escapes.
    async fn fetch_pass(
        &self, community: &str, started: Instant, progress: &mut Progress, batch: &mut Batch,
    ) -> Result<PassOutcome> {
        loop {
            if started.elapsed() >= self.settings.time_budget {
                return Ok(PassOutcome::OutOfTime);
            }

            let wanted = progress.target - progress.collected;
            let listing = self.source.fetch_top(community, progress.cursor.as_deref(), wanted).await?;
            debug!(community, after = ?progress.cursor, wanted, returned = listing.posts.len(), "Fetched listing page");

            if listing.posts.is_empty() {
                return Ok(PassOutcome::Exhausted);
            }

            for raw in &listing.posts {
                if batch.community.is_none() {
                    let info = self.source.fetch_community(&raw.community).await?;
                    batch.community = Some(info.into());
                }

                if let Some(post) = build_submission(self.source, raw, true).await? {
                    let duplicates = if raw.num_crossposts > 0 {
                        self.expand_crossposts(community, &post.submission).await?
                    } else {
                        Vec::new()
                    };

                    // Everything for this post was fetched; commit it.
                    let parent_id = post.submission.id.clone();
                    let mut comments = post.comments.len();
                    let mut edges = 0;
                    batch.add_post(post);
                    for duplicate in duplicates {
                        if batch.add_edge(&parent_id, &duplicate.submission.id) {
                            edges += 1;
                        }
                        comments += duplicate.comments.len();
                        batch.add_post(duplicate);
                    }
                    progress.collected += 1;
                    self.metrics.record_post(comments, edges);
                    debug!(community, post_id = %parent_id, collected = progress.collected, "Collected submission");
                }

                progress.cursor = Some(raw.id.clone());
                if progress.collected >= progress.target {
                    return Ok(PassOutcome::Reached);
                }
            }

            if listing.after.is_none() {
                return Ok(PassOutcome::Exhausted);
            }
        }
    }

    async fn expand_crossposts(&self, community: &str, original: &Submission) -> Result<Vec<HarvestedPost>> {
        let duplicates = self
            .source
            .fetch_duplicates(&original.id, self.settings.crossposts_limit)
            .await?;

        let mut posts = Vec::with_capacity(duplicates.len());
        for duplicate in &duplicates {
            if is_profile_community(&duplicate.community) {
                match self.settings.profile_crossposts {
                    ProfileCrosspostPolicy::Abort => {
                        return Err(CollectError::ProfileCrosspost {
                            community: community.to_string(),
                            post_id: original.id.clone(),
                            profile: duplicate.community.clone(),
                        });
                    },
                    ProfileCrosspostPolicy::Skip => {
                        debug!(community, post_id = %duplicate.id, profile = %duplicate.community, "Skipping profile cross-post");
                        continue;
                    },
                }
            }
            if duplicate.id == original.id {
                continue;
            }

            if let Some(post) = build_submission(self.source, duplicate, false).await? {
                posts.push(post);
            }
        }

        Ok(posts)
    }

    fn backoff(&self, err: &ClientError) -> Duration {
        match err {
            ClientError::Connection(_) => self.settings.connection_error_backoff,
            _ => self.settings.server_error_backoff,
        }
    }
}

fn transition(community: &str, from: CollectorState, to: CollectorState) -> CollectorState {
    if from != to {
        debug!(community, from = ?from, to = ?to, "Collector state change");
    }
    to
}
