use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::models::{Comment, Community, CommunityHarvest, CrossPost, IncompleteCommunity, PostKind, Submission};
use crate::repository::{HarvestStore, SaveSummary};
use crate::schema::{comments, communities, crossposts, listing_entries, submissions};

/// Pool of SQLite connections
pub type DbPool = Pool<SqliteConnectionManager>;
/// Connection checked out of a [`DbPool`]
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// SQLite harvest store backed by a connection pool
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) the database at `database_url`
    pub fn new(database_url: &str) -> Result<Self> {
        Self::with_max_connections(database_url, DEFAULT_MAX_CONNECTIONS)
    }

    /// Open the database with an explicit pool size
    pub fn with_max_connections(database_url: &str, max_connections: u32) -> Result<Self> {
        let path = database_path(database_url);

        // Create parent directory if it doesn't exist
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create database directory {}", parent.display()))?;
            }
        }

        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(max_connections.max(1))
            .build(manager)
            .context("Failed to create database connection pool")?;

        let conn = pool.get()?;
        Self::run_migrations(&conn)?;
        info!(path, "Database ready");

        Ok(Self { pool })
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(include_str!("../migrations/2026-10-19-000000_create_tables/up.sql"))
            .context("Failed to run initial migration")?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<DbConnection> {
        self.pool.get().context("Failed to get database connection")
    }

    /// Get a community by name
    pub fn get_community(&self, name: &str) -> Result<Option<Community>> {
        let conn = self.get_connection()?;

        let community = conn
            .query_row(
                &format!("SELECT * FROM {} WHERE {} = ?", communities::TABLE, communities::NAME),
                params![name],
                map_db_community,
            )
            .optional()?;

        Ok(community)
    }

    /// Get a submission by id
    pub fn get_submission(&self, id: &str) -> Result<Option<Submission>> {
        let conn = self.get_connection()?;

        let submission = conn
            .query_row(
                &format!("SELECT * FROM {} WHERE {} = ?", submissions::TABLE, submissions::ID),
                params![id],
                map_db_submission,
            )
            .optional()?;

        Ok(submission)
    }

    /// Comments of one submission, in insertion order
    pub fn get_comments(&self, submission_id: &str) -> Result<Vec<Comment>> {
        let conn = self.get_connection()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} WHERE {} = ? ORDER BY rowid",
            comments::TABLE,
            comments::SUBMISSION_ID
        ))?;
        let rows = stmt.query_map(params![submission_id], map_db_comment)?;

        let mut results = Vec::new();
        for comment in rows {
            results.push(comment?);
        }
        Ok(results)
    }

    /// Number of stored submissions owned by `community`
    pub fn count_submissions(&self, community: &str) -> Result<usize> {
        let conn = self.get_connection()?;

        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE {} = ?", submissions::TABLE, submissions::COMMUNITY_NAME),
            params![community],
            |row| row.get(0),
        )?;

        Ok(count as usize)
    }

    /// Number of stored cross-post edges
    pub fn count_crossposts(&self) -> Result<usize> {
        let conn = self.get_connection()?;

        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", crossposts::TABLE), [], |row| row.get(0))?;

        Ok(count as usize)
    }
}

impl HarvestStore for Database {
    fn upsert_community(&self, community: &Community) -> Result<()> {
        let conn = self.get_connection()?;
        insert_community(&conn, community)
    }

    fn upsert_submissions(&self, records: &[Submission]) -> Result<usize> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        let inserted = insert_submissions(&tx, records)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn upsert_comments(&self, records: &[Comment]) -> Result<usize> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        let inserted = insert_comments(&tx, records)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn upsert_crossposts(&self, records: &[CrossPost]) -> Result<usize> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        let inserted = insert_crossposts(&tx, records)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn query_unexplored_community_names(&self) -> Result<BTreeSet<String>> {
        let conn = self.get_connection()?;

        let query = format!(
            "SELECT DISTINCT s.{} FROM {} s LEFT JOIN {} c ON s.{} = c.{} WHERE c.{} IS NULL",
            submissions::COMMUNITY_NAME,
            submissions::TABLE,
            communities::TABLE,
            submissions::COMMUNITY_NAME,
            communities::NAME,
            communities::NAME
        );

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut names = BTreeSet::new();
        for name in rows {
            names.insert(name?);
        }
        Ok(names)
    }

    fn query_incomplete_communities(&self, min_submissions: usize) -> Result<Vec<IncompleteCommunity>> {
        let conn = self.get_connection()?;

        let query = format!(
            "SELECT agg.{community}, agg.stored, last.{submission} \
             FROM (SELECT {community}, COUNT(*) AS stored, MAX({seq}) AS last_seq \
                   FROM {table} GROUP BY {community} HAVING COUNT(*) < ?) agg \
             JOIN {table} last ON last.{seq} = agg.last_seq \
             ORDER BY agg.{community}",
            community = listing_entries::COMMUNITY_NAME,
            submission = listing_entries::SUBMISSION_ID,
            seq = listing_entries::SEQ,
            table = listing_entries::TABLE,
        );

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map(params![min_submissions as i64], |row| {
            Ok(IncompleteCommunity {
                name: row.get(0)?,
                offset: row.get::<_, i64>(1)? as usize,
                last_submission_id: row.get(2)?,
            })
        })?;

        let mut results = Vec::new();
        for community in rows {
            results.push(community?);
        }
        debug!(min_submissions, found = results.len(), "Queried incomplete communities");
        Ok(results)
    }

    /// Persist a harvest in one transaction.
    fn save_harvest(&self, harvest: &CommunityHarvest) -> Result<SaveSummary> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;

        insert_community(&tx, &harvest.community)?;
        let summary = SaveSummary {
            submissions: insert_submissions(&tx, &harvest.submissions)?,
            comments: insert_comments(&tx, &harvest.comments)?,
            crossposts: insert_crossposts(&tx, &harvest.crossposts)?,
        };

        tx.commit().context("Failed to commit harvest")?;
        debug!(community = %harvest.community.name, ?summary, "Saved harvest");
        Ok(summary)
    }
}

impl ToSql for PostKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PostKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// Strip an optional `sqlite:` scheme from a database url
fn database_path(database_url: &str) -> &str {
    database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url)
}

fn insert_community(conn: &Connection, community: &Community) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {} ({}, {}, {}, {}, {}) VALUES (?, ?, ?, ?, ?)",
            communities::TABLE,
            communities::NAME,
            communities::DESCRIPTION,
            communities::CREATED_AT,
            communities::IS_RESTRICTED,
            communities::SUBSCRIBER_COUNT
        ),
        params![
            community.name,
            community.description,
            community.created_at,
            community.is_restricted,
            community.subscriber_count
        ],
    )
    .with_context(|| format!("Failed to store community {}", community.name))?;
    Ok(())
}

fn insert_submissions(conn: &Connection, records: &[Submission]) -> Result<usize> {
    let mut insert = conn.prepare(&format!(
        "INSERT OR IGNORE INTO {} ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        submissions::TABLE,
        submissions::ID,
        submissions::TITLE,
        submissions::AUTHOR,
        submissions::CREATED_AT,
        submissions::IS_RESTRICTED,
        submissions::KIND,
        submissions::APPROVAL_RATIO,
        submissions::AWARD_COUNT,
        submissions::CROSS_POST_COUNT,
        submissions::BODY_TEXT,
        submissions::VIDEO_DURATION_SECONDS,
        submissions::CATEGORY,
        submissions::COMMUNITY_NAME,
        submissions::FROM_LISTING
    ))?;
    let mut list = conn.prepare(&format!(
        "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?, ?)",
        listing_entries::TABLE,
        listing_entries::COMMUNITY_NAME,
        listing_entries::SUBMISSION_ID
    ))?;

    let mut inserted = 0;
    for submission in records {
        inserted += insert.execute(params![
            submission.id,
            submission.title,
            submission.author,
            submission.created_at,
            submission.is_restricted,
            submission.kind,
            submission.approval_ratio,
            submission.award_count,
            submission.cross_post_count,
            submission.body_text,
            submission.video_duration_seconds,
            submission.category,
            submission.community_name,
            submission.from_listing
        ])?;

        if submission.from_listing {
            // A copy stored earlier keeps its row untouched; only the
            // listing order learns about it.
            list.execute(params![submission.community_name, submission.id])?;
        }
    }

    Ok(inserted)
}

fn insert_comments(conn: &Connection, records: &[Comment]) -> Result<usize> {
    let mut insert = conn.prepare(&format!(
        "INSERT OR IGNORE INTO {} ({}, {}, {}, {}, {}, {}, {}, {}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        comments::TABLE,
        comments::ID,
        comments::BODY_TEXT,
        comments::AUTHOR,
        comments::CREATED_AT,
        comments::PARENT_ID,
        comments::SUBMISSION_ID,
        comments::APPROVAL_RATIO,
        comments::IS_PINNED
    ))?;

    let mut inserted = 0;
    for comment in records {
        inserted += insert.execute(params![
            comment.id,
            comment.body_text,
            comment.author,
            comment.created_at,
            comment.parent_id,
            comment.submission_id,
            comment.approval_ratio,
            comment.is_pinned
        ])?;
    }

    Ok(inserted)
}

fn insert_crossposts(conn: &Connection, records: &[CrossPost]) -> Result<usize> {
    let mut insert = conn.prepare(&format!(
        "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?, ?)",
        crossposts::TABLE,
        crossposts::PARENT_ID,
        crossposts::POST_ID
    ))?;

    let mut inserted = 0;
    for edge in records {
        inserted += insert.execute(params![edge.parent_id, edge.post_id])?;
    }

    Ok(inserted)
}

/// Map a database row to a Community
fn map_db_community(row: &Row) -> rusqlite::Result<Community> {
    Ok(Community {
        name: row.get(communities::NAME)?,
        description: row.get(communities::DESCRIPTION)?,
        created_at: row.get(communities::CREATED_AT)?,
        is_restricted: row.get(communities::IS_RESTRICTED)?,
        subscriber_count: row.get(communities::SUBSCRIBER_COUNT)?,
    })
}

/// Map a database row to a Submission
fn map_db_submission(row: &Row) -> rusqlite::Result<Submission> {
    Ok(Submission {
        id: row.get(submissions::ID)?,
        title: row.get(submissions::TITLE)?,
        author: row.get(submissions::AUTHOR)?,
        created_at: row.get(submissions::CREATED_AT)?,
        is_restricted: row.get(submissions::IS_RESTRICTED)?,
        kind: row.get(submissions::KIND)?,
        approval_ratio: row.get(submissions::APPROVAL_RATIO)?,
        award_count: row.get(submissions::AWARD_COUNT)?,
        cross_post_count: row.get(submissions::CROSS_POST_COUNT)?,
        body_text: row.get(submissions::BODY_TEXT)?,
        video_duration_seconds: row.get(submissions::VIDEO_DURATION_SECONDS)?,
        category: row.get(submissions::CATEGORY)?,
        community_name: row.get(submissions::COMMUNITY_NAME)?,
        from_listing: row.get(submissions::FROM_LISTING)?,
    })
}

/// Map a database row to a Comment
fn map_db_comment(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(comments::ID)?,
        body_text: row.get(comments::BODY_TEXT)?,
        author: row.get(comments::AUTHOR)?,
        created_at: row.get(comments::CREATED_AT)?,
        parent_id: row.get(comments::PARENT_ID)?,
        submission_id: row.get(comments::SUBMISSION_ID)?,
        approval_ratio: row.get(comments::APPROVAL_RATIO)?,
        is_pinned: row.get(comments::IS_PINNED)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_path_strips_scheme() {
        assert_eq!(database_path("sqlite:data/subharvest.db"), "data/subharvest.db");
        assert_eq!(database_path("sqlite://data/subharvest.db"), "data/subharvest.db");
        assert_eq!(database_path("/tmp/x.db"), "/tmp/x.db");
    }
}
