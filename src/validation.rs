use std::path::Path;

use anyhow::{anyhow, Result};
use regex::Regex;

use crate::utils::is_profile_community;

/// Largest page count the platform serves for one listing
pub const MAX_LISTING_SIZE: usize = 1000;

/// Largest duplicate count the platform serves for one post
pub const MAX_DUPLICATES: usize = 100;

/// Validation utilities for input sanitization and edge case handling
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Normalize a community name given on the command line.
    ///
    /// Surrounding whitespace and a leading `r/` or `/r/` are removed before
    /// the name is validated.
    pub fn normalize_community_name(name: &str) -> Result<String> {
        let trimmed = name.trim();
        let bare = trimmed
            .strip_prefix("/r/")
            .or_else(|| trimmed.strip_prefix("r/"))
            .unwrap_or(trimmed)
            .trim_end_matches('/');

        Self::validate_community_name(bare)?;
        Ok(bare.to_string())
    }

    /// Validate a community name as a crawl target
    pub fn validate_community_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(anyhow!("Community name cannot be empty"));
        }

        if is_profile_community(name) {
            return Err(anyhow!("{name} is a user profile, not a community"));
        }

        let pattern = Regex::new(r"^[A-Za-z0-9_]{2,21}$")
            .map_err(|e| anyhow!("Failed to compile community name regex: {e}"))?;
        if !pattern.is_match(name) {
            return Err(anyhow!(
                "Invalid community name: {name}. Use 2 to 21 letters, digits or underscores"
            ));
        }

        Ok(())
    }

    /// Validate the number of listing submissions wanted per community
    pub fn validate_submissions_limit(limit: usize) -> Result<()> {
        if limit == 0 {
            return Err(anyhow!("Submissions limit must be greater than 0"));
        }

        if limit > MAX_LISTING_SIZE {
            return Err(anyhow!("Submissions limit too large (max {MAX_LISTING_SIZE})"));
        }

        Ok(())
    }

    /// Validate the number of duplicates fetched per cross-posted submission
    pub fn validate_crossposts_limit(limit: usize) -> Result<()> {
        if limit == 0 {
            return Err(anyhow!("Crossposts limit must be greater than 0"));
        }

        if limit > MAX_DUPLICATES {
            return Err(anyhow!("Crossposts limit too large (max {MAX_DUPLICATES})"));
        }

        Ok(())
    }

    /// Validate the number of exploration rounds
    pub fn validate_rounds(rounds: usize) -> Result<()> {
        if rounds == 0 {
            return Err(anyhow!("Rounds must be greater than 0"));
        }

        Ok(())
    }

    /// Validate the user agent sent to the platform
    pub fn validate_user_agent(user_agent: &str) -> Result<()> {
        if user_agent.trim().is_empty() {
            return Err(anyhow!("User agent cannot be empty"));
        }

        if user_agent.contains('\r') || user_agent.contains('\n') {
            return Err(anyhow!("User agent contains invalid characters"));
        }

        Ok(())
    }

    /// Validate file path
    pub fn validate_file_path(path: &Path) -> Result<()> {
        if path.to_string_lossy().is_empty() {
            return Err(anyhow!("File path cannot be empty"));
        }

        // Check for path traversal attempts
        let path_str = path.to_string_lossy();
        if path_str.contains("..") || path_str.contains('~') {
            return Err(anyhow!("File path contains potentially dangerous characters"));
        }

        if path_str.len() > 4096 {
            return Err(anyhow!("File path too long (max 4096 characters)"));
        }

        Ok(())
    }

    /// Validate database URL
    pub fn validate_database_url(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(anyhow!("Database URL cannot be empty"));
        }

        if !url.starts_with("sqlite:") {
            return Err(anyhow!("Only SQLite databases are supported"));
        }

        if url.len() > 1000 {
            return Err(anyhow!("Database URL too long"));
        }

        Ok(())
    }
}
