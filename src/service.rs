//! Batch orchestration over many communities.

use std::collections::HashSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::collector::{CollectorSettings, CommunityCollector};
use crate::error::CollectError;
use crate::frontier::Frontier;
use crate::logging::OperationTimer;
use crate::models::ResumeCursor;
use crate::repository::HarvestStore;
use crate::source::ContentSource;
use crate::validation::InputValidator;

/// What a batch does after one community fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchPolicy {
    /// Record the failure and move on
    #[default]
    Continue,
    /// Stop the batch at the first failure
    Halt,
}

/// One community that could not be collected or stored
#[derive(Debug)]
pub struct CommunityFailure {
    /// Community name
    pub community: String,
    /// Collection or storage error, with context
    pub error: anyhow::Error,
}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Communities collected and stored
    pub collected: Vec<String>,
    /// Communities that already held enough submissions
    pub skipped: Vec<String>,
    /// Communities that failed, in batch order
    pub failures: Vec<CommunityFailure>,
    /// The batch stopped early under [`BatchPolicy::Halt`]
    pub halted: bool,
}

impl BatchReport {
    /// Number of communities the batch looked at
    pub fn attempted(&self) -> usize {
        self.collected.len() + self.skipped.len() + self.failures.len()
    }

    fn merge(&mut self, other: Self) {
        self.collected.extend(other.collected);
        self.skipped.extend(other.skipped);
        self.failures.extend(other.failures);
        self.halted |= other.halted;
    }
}

/// Collects communities from a content source into a harvest store
pub struct HarvestService<S, D> {
    source: S,
    store: D,
    settings: CollectorSettings,
    policy: BatchPolicy,
}

impl<S, D> HarvestService<S, D>
where
    S: ContentSource,
    D: HarvestStore,
{
    /// Create a service collecting from `source` into `store`
    pub const fn new(source: S, store: D, settings: CollectorSettings, policy: BatchPolicy) -> Self {
        Self {
            source,
            store,
            settings,
            policy,
        }
    }

    /// Frontier queries over the store
    pub const fn frontier(&self) -> Frontier<'_, D> {
        Frontier::new(&self.store)
    }

    /// Collect `communities`, or the unexplored frontier when `None`.
    ///
    /// Names are normalized first; one invalid name rejects the whole call.
    pub async fn collect_communities(&self, communities: Option<Vec<String>>) -> Result<BatchReport> {
        let names: Vec<String> = match communities {
            Some(names) => names
                .iter()
                .map(|name| InputValidator::normalize_community_name(name))
                .collect::<Result<_>>()?,
            None => self.frontier().unexplored_communities()?.into_iter().collect(),
        };

        let mut seen = HashSet::new();
        let targets = names
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .map(|name| (name, None))
            .collect();

        self.run_batch(targets, self.settings.clone()).await
    }

    /// Resume every community holding fewer than `min_submissions`.
    ///
    /// Each resumed run collects up to `min_submissions` in total, whatever
    /// the configured submission limit.
    pub async fn complete_collection(&self, min_submissions: usize) -> Result<BatchReport> {
        let targets = self
            .frontier()
            .resume_targets(min_submissions)?
            .into_iter()
            .map(|(name, cursor)| (name, Some(cursor)))
            .collect();
        let settings = CollectorSettings {
            submissions_limit: min_submissions,
            ..self.settings.clone()
        };

        self.run_batch(targets, settings).await
    }

    /// Collect the unexplored frontier repeatedly.
    ///
    /// Each round picks up the communities discovered by the previous one.
    /// A community is attempted at most once across all rounds.
    pub async fn explore(&self, rounds: usize) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        let mut attempted: HashSet<String> = HashSet::new();

        for round in 1..=rounds {
            let targets: Vec<(String, Option<ResumeCursor>)> = self
                .frontier()
                .unexplored_communities()?
                .into_iter()
                .filter(|name| !attempted.contains(name))
                .map(|name| (name, None))
                .collect();

            if targets.is_empty() {
                info!(round, "Frontier is empty");
                break;
            }

            info!(round, communities = targets.len(), "Exploration round");
            attempted.extend(targets.iter().map(|(name, _)| name.clone()));

            let round_report = self.run_batch(targets, self.settings.clone()).await?;
            let halted = round_report.halted;
            report.merge(round_report);
            if halted {
                break;
            }
        }

        Ok(report)
    }

    async fn run_batch(
        &self, targets: Vec<(String, Option<ResumeCursor>)>, settings: CollectorSettings,
    ) -> Result<BatchReport> {
        let collector = CommunityCollector::new(&self.source, settings);
        let mut report = BatchReport::default();

        info!(communities = targets.len(), policy = ?self.policy, "Starting batch");

        for (community, cursor) in targets {
            let timer = OperationTimer::new(&format!("collect {community}"));

            let failure = match collector.collect(&community, cursor.as_ref()).await {
                Ok(harvest) => match self.store.save_harvest(&harvest) {
                    Ok(summary) => {
                        info!(
                            community = %community,
                            submissions = summary.submissions,
                            comments = summary.comments,
                            crossposts = summary.crossposts,
                            "Stored harvest"
                        );
                        report.collected.push(community.clone());
                        None
                    },
                    Err(err) => Some(err.context(format!("Failed to store {community}"))),
                },
                Err(CollectError::AlreadyComplete { .. }) => {
                    info!(community = %community, "Already complete, skipping");
                    report.skipped.push(community.clone());
                    None
                },
                Err(err) => Some(anyhow::Error::new(err)),
            };
            timer.finish();

            if let Some(error) = failure {
                error!(community = %community, error = ?error, "Community failed");
                report.failures.push(CommunityFailure { community, error });

                if self.policy == BatchPolicy::Halt {
                    warn!("Halting batch after failure");
                    report.halted = true;
                    break;
                }
            }
        }

        info!(
            collected = report.collected.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "Batch finished"
        );
        Ok(report)
    }
}
