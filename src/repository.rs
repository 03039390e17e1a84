use std::collections::BTreeSet;

use anyhow::Result;

use crate::models::{Comment, Community, CommunityHarvest, CrossPost, IncompleteCommunity, Submission};

/// Durable storage of harvested records.
///
/// Every write is insert-or-ignore on the natural key: re-saving a record
/// that is already stored leaves the stored copy untouched.
pub trait HarvestStore: Send + Sync {
    /// Store one community snapshot
    fn upsert_community(&self, community: &Community) -> Result<()>;

    /// Store submissions, returning how many were new
    fn upsert_submissions(&self, submissions: &[Submission]) -> Result<usize>;

    /// Store comments, returning how many were new
    fn upsert_comments(&self, comments: &[Comment]) -> Result<usize>;

    /// Store cross-post edges, returning how many were new
    fn upsert_crossposts(&self, crossposts: &[CrossPost]) -> Result<usize>;

    /// Community names referenced by stored submissions that have no stored
    /// community record.
    fn query_unexplored_community_names(&self) -> Result<BTreeSet<String>>;

    /// Communities whose stored listing submissions number fewer than
    /// `min_submissions`, with the cursor to resume each one.
    fn query_incomplete_communities(&self, min_submissions: usize) -> Result<Vec<IncompleteCommunity>>;

    /// Persist a finished harvest.
    ///
    /// The community goes first, then submissions, comments and cross-posts.
    fn save_harvest(&self, harvest: &CommunityHarvest) -> Result<SaveSummary> {
        self.upsert_community(&harvest.community)?;
        Ok(SaveSummary {
            submissions: self.upsert_submissions(&harvest.submissions)?,
            comments: self.upsert_comments(&harvest.comments)?,
            crossposts: self.upsert_crossposts(&harvest.crossposts)?,
        })
    }
}

/// Newly stored record counts of one save
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    /// New submissions
    pub submissions: usize,
    /// New comments
    pub comments: usize,
    /// New cross-post edges
    pub crossposts: usize,
}

impl<T: HarvestStore + ?Sized> HarvestStore for Box<T> {
    fn upsert_community(&self, community: &Community) -> Result<()> {
        (**self).upsert_community(community)
    }

    fn upsert_submissions(&self, submissions: &[Submission]) -> Result<usize> {
        (**self).upsert_submissions(submissions)
    }

    fn upsert_comments(&self, comments: &[Comment]) -> Result<usize> {
        (**self).upsert_comments(comments)
    }

    fn upsert_crossposts(&self, crossposts: &[CrossPost]) -> Result<usize> {
        (**self).upsert_crossposts(crossposts)
    }

    fn query_unexplored_community_names(&self) -> Result<BTreeSet<String>> {
        (**self).query_unexplored_community_names()
    }

    fn query_incomplete_communities(&self, min_submissions: usize) -> Result<Vec<IncompleteCommunity>> {
        (**self).query_incomplete_communities(min_submissions)
    }

    fn save_harvest(&self, harvest: &CommunityHarvest) -> Result<SaveSummary> {
        (**self).save_harvest(harvest)
    }
}
