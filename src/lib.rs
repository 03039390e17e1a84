//! Subharvest - Resumable Community Harvester
//!
//! A Rust library for collecting posts, comments and cross-post links from
//! a content platform's communities into SQLite or flat CSV files.
//!
//! # Features
//!
//! - Paginated "top" listing collection with resume cursors
//! - Retry with fixed backoff inside a per-community time budget
//! - Cross-post discovery feeding an exploration frontier
//! - Insert-or-ignore persistence to SQLite or append-only CSV
//! - Batch runs that isolate or halt on per-community failures

/// Community collection
pub mod collector;
/// Comment harvesting
pub mod comments;
/// Configuration management
pub mod config;
/// SQLite store and connection pooling
pub mod db;
/// Error types
pub mod error;
/// CSV store
pub mod file_store;
/// Exploration frontier queries
pub mod frontier;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// HTTP content source
pub mod reddit;
/// Storage contract
pub mod repository;
/// Database schema definitions
pub mod schema;
/// Batch orchestration
pub mod service;
/// Content source contract
pub mod source;
/// Submission harvesting
pub mod submissions;
/// Shared helpers
pub mod utils;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use collector::{CollectorSettings, CommunityCollector, ProfileCrosspostPolicy};
pub use db::Database;
pub use error::{ClientError, CollectError};
pub use file_store::FileStore;
pub use models::{Comment, Community, CommunityHarvest, CrossPost, ResumeCursor, Submission};
pub use repository::HarvestStore;
pub use service::{BatchPolicy, BatchReport, HarvestService};
pub use source::ContentSource;
