//! Flat-file harvest store.
//!
//! Four append-only, headerless CSV tables live in one directory:
//! `communities.csv`, `submissions.csv`, `comments.csv` and `crossposts.csv`.
//! Column order follows the field order of the matching model, so a
//! submission row ends with its `from_listing` flag.
//!
//! Keys already on disk are loaded when the store is opened; writes skip
//! records whose key is known, giving the same insert-or-ignore behaviour
//! as the SQLite store.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::{create_dir_all, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::models::{Comment, Community, CrossPost, IncompleteCommunity, Submission};
use crate::repository::HarvestStore;

/// Community table file name
pub const COMMUNITIES_FILE: &str = "communities.csv";
/// Submission table file name
pub const SUBMISSIONS_FILE: &str = "submissions.csv";
/// Comment table file name
pub const COMMENTS_FILE: &str = "comments.csv";
/// Cross-post table file name
pub const CROSSPOSTS_FILE: &str = "crossposts.csv";

/// Everything stored in a file store, deduplicated by key
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StoredRecords {
    /// Community rows in write order
    pub communities: Vec<Community>,
    /// Submission rows in first-write order
    pub submissions: Vec<Submission>,
    /// Comment rows in write order
    pub comments: Vec<Comment>,
    /// Cross-post edges in write order
    pub crossposts: Vec<CrossPost>,
}

#[derive(Default)]
struct StoredKeys {
    communities: HashSet<String>,
    // id -> stored as a listing post
    submissions: HashMap<String, bool>,
    comments: HashSet<String>,
    crossposts: HashSet<CrossPost>,
}

/// CSV-backed harvest store
pub struct FileStore {
    directory: PathBuf,
    keys: Mutex<StoredKeys>,
}

impl FileStore {
    /// Open the store in `directory`, creating it when missing
    pub fn open(directory: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        create_dir_all(&directory)
            .with_context(|| format!("Failed to create data directory {}", directory.display()))?;

        let mut keys = StoredKeys::default();
        for community in read_rows::<Community>(&directory.join(COMMUNITIES_FILE))? {
            keys.communities.insert(community.name);
        }
        for submission in read_rows::<Submission>(&directory.join(SUBMISSIONS_FILE))? {
            let listed = keys.submissions.entry(submission.id).or_insert(false);
            *listed |= submission.from_listing;
        }
        for comment in read_rows::<Comment>(&directory.join(COMMENTS_FILE))? {
            keys.comments.insert(comment.id);
        }
        keys.crossposts.extend(read_rows::<CrossPost>(&directory.join(CROSSPOSTS_FILE))?);

        info!(
            directory = %directory.display(),
            communities = keys.communities.len(),
            submissions = keys.submissions.len(),
            "File store ready"
        );

        Ok(Self {
            directory,
            keys: Mutex::new(keys),
        })
    }

    /// Directory holding the tables
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Read every table, keeping one row per key.
    ///
    /// A submission stored first as a cross-post copy and later from its own
    /// listing is returned once, as a listing post.
    pub fn load_all(&self) -> Result<StoredRecords> {
        let _guard = self.lock()?;

        let mut submissions: Vec<Submission> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for submission in read_rows::<Submission>(&self.path(SUBMISSIONS_FILE))? {
            match positions.get(&submission.id) {
                Some(&position) => submissions[position].from_listing |= submission.from_listing,
                None => {
                    positions.insert(submission.id.clone(), submissions.len());
                    submissions.push(submission);
                },
            }
        }

        Ok(StoredRecords {
            communities: dedup_by_key(read_rows(&self.path(COMMUNITIES_FILE))?, |c: &Community| c.name.clone()),
            submissions,
            comments: dedup_by_key(read_rows(&self.path(COMMENTS_FILE))?, |c: &Comment| c.id.clone()),
            crossposts: dedup_by_key(read_rows(&self.path(CROSSPOSTS_FILE))?, |edge: &CrossPost| edge.clone()),
        })
    }

    fn path(&self, file: &str) -> PathBuf {
        self.directory.join(file)
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoredKeys>> {
        self.keys.lock().map_err(|_| anyhow!("File store lock poisoned"))
    }

    fn append<'r, T, I>(&self, file: &str, rows: I) -> Result<()>
    where
        T: Serialize + 'r,
        I: IntoIterator<Item = &'r T>,
    {
        let path = self.path(file);
        let handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(handle);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl HarvestStore for FileStore {
    fn upsert_community(&self, community: &Community) -> Result<()> {
        let mut keys = self.lock()?;
        if keys.communities.contains(&community.name) {
            return Ok(());
        }

        self.append(COMMUNITIES_FILE, [community])?;
        keys.communities.insert(community.name.clone());
        Ok(())
    }

    fn upsert_submissions(&self, submissions: &[Submission]) -> Result<usize> {
        let mut keys = self.lock()?;

        let mut fresh = 0;
        let mut rows = Vec::new();
        let mut pending: HashMap<&str, bool> = HashMap::new();
        for submission in submissions {
            let known = pending
                .get(submission.id.as_str())
                .copied()
                .or_else(|| keys.submissions.get(&submission.id).copied());
            match known {
                None => fresh += 1,
                // A copy turned listing post gets a second row
                Some(false) if submission.from_listing => {},
                Some(_) => continue,
            }
            pending.insert(&submission.id, submission.from_listing);
            rows.push(submission);
        }

        self.append(SUBMISSIONS_FILE, rows)?;
        for (id, listed) in pending {
            keys.submissions.insert(id.to_string(), listed);
        }
        debug!(fresh, "Appended submissions");
        Ok(fresh)
    }

    fn upsert_comments(&self, comments: &[Comment]) -> Result<usize> {
        let mut keys = self.lock()?;

        let mut seen = HashSet::new();
        let rows: Vec<&Comment> = comments
            .iter()
            .filter(|c| !keys.comments.contains(&c.id) && seen.insert(c.id.as_str()))
            .collect();

        self.append(COMMENTS_FILE, rows.iter().copied())?;
        keys.comments.extend(rows.iter().map(|c| c.id.clone()));
        Ok(rows.len())
    }

    fn upsert_crossposts(&self, crossposts: &[CrossPost]) -> Result<usize> {
        let mut keys = self.lock()?;

        let mut seen = HashSet::new();
        let rows: Vec<&CrossPost> = crossposts
            .iter()
            .filter(|edge| !keys.crossposts.contains(*edge) && seen.insert(*edge))
            .collect();

        self.append(CROSSPOSTS_FILE, rows.iter().copied())?;
        keys.crossposts.extend(rows.iter().map(|edge| (*edge).clone()));
        Ok(rows.len())
    }

    fn query_unexplored_community_names(&self) -> Result<BTreeSet<String>> {
        let keys = self.lock()?;

        let names = read_rows::<Submission>(&self.path(SUBMISSIONS_FILE))?
            .into_iter()
            .map(|s| s.community_name)
            .filter(|name| !keys.communities.contains(name))
            .collect();
        Ok(names)
    }

    /// Only the most recently written community is considered. Its listing
    /// rows are counted from the end of the submission table until
    /// `min_submissions` are found.
    fn query_incomplete_communities(&self, min_submissions: usize) -> Result<Vec<IncompleteCommunity>> {
        let _guard = self.lock()?;

        let Some(last) = read_rows::<Community>(&self.path(COMMUNITIES_FILE))?.pop() else {
            return Ok(Vec::new());
        };

        let submissions = read_rows::<Submission>(&self.path(SUBMISSIONS_FILE))?;
        let mut offset = 0;
        let mut last_submission_id = None;
        for submission in submissions.iter().rev() {
            if offset >= min_submissions {
                break;
            }
            if submission.from_listing && submission.community_name == last.name {
                last_submission_id.get_or_insert_with(|| submission.id.clone());
                offset += 1;
            }
        }

        match last_submission_id {
            Some(last_submission_id) if offset < min_submissions => Ok(vec![IncompleteCommunity {
                name: last.name,
                last_submission_id,
                offset,
            }]),
            _ => Ok(Vec::new()),
        }
    }
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row.with_context(|| format!("Malformed row in {}", path.display()))?);
    }
    Ok(rows)
}

fn dedup_by_key<T, K, F>(rows: Vec<T>, key: F) -> Vec<T>
where
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    rows.into_iter().filter(|row| seen.insert(key(row))).collect()
}
