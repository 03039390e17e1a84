//! Exploration frontier
//!
//! Answers which communities still need collecting: the ones referenced by
//! stored submissions but never crawled, and the ones crawled only partly.

use std::collections::BTreeSet;

use anyhow::Result;
use tracing::debug;

use crate::models::{IncompleteCommunity, ResumeCursor};
use crate::repository::HarvestStore;
use crate::utils::is_profile_community;

/// Frontier queries over a harvest store
pub struct Frontier<'a, D: ?Sized> {
    store: &'a D,
}

impl<'a, D> Frontier<'a, D>
where
    D: HarvestStore + ?Sized,
{
    /// Create a frontier over `store`
    pub const fn new(store: &'a D) -> Self {
        Self { store }
    }

    /// Communities referenced by stored submissions with no stored record
    pub fn unexplored_communities(&self) -> Result<BTreeSet<String>> {
        let mut names = self.store.query_unexplored_community_names()?;
        names.retain(|name| !is_profile_community(name));
        debug!(count = names.len(), "Unexplored communities");
        Ok(names)
    }

    /// Communities with fewer than `min_submissions` stored listing posts
    pub fn incomplete_communities(&self, min_submissions: usize) -> Result<Vec<IncompleteCommunity>> {
        let communities = self.store.query_incomplete_communities(min_submissions)?;
        debug!(min_submissions, count = communities.len(), "Incomplete communities");
        Ok(communities)
    }

    /// Incomplete communities paired with the cursor to resume each one
    pub fn resume_targets(&self, min_submissions: usize) -> Result<Vec<(String, ResumeCursor)>> {
        Ok(self
            .incomplete_communities(min_submissions)?
            .into_iter()
            .map(|community| {
                let cursor = community.cursor();
                (community.name, cursor)
            })
            .collect())
    }
}
