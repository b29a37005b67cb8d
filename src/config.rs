use std::env;

use anyhow::{Context, Result};

use crate::db::models::MAX_SNAPSHOTS;
use crate::diff::CompareKey;

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    /// Snapshots kept per identity before the oldest are evicted.
    pub retention: usize,
    /// Member field used to decide whether two list entries are the same account.
    pub compare_key: CompareKey,
    /// Public AT Protocol API endpoint (defaults to https://public.api.bsky.app).
    pub public_api_url: String,
    /// Largest list a fetch will accept; None fetches lists of any size.
    pub max_members: Option<usize>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every value has a default; invalid values are rejected with the
    /// variable name in the error.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let retention = match lookup("FOLLOWTRAIL_RETENTION") {
            Some(raw) => {
                let value: usize = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("FOLLOWTRAIL_RETENTION is not a number: {raw}"))?;
                if value == 0 {
                    anyhow::bail!("FOLLOWTRAIL_RETENTION must be at least 1");
                }
                value
            }
            None => MAX_SNAPSHOTS,
        };

        let compare_key = match lookup("FOLLOWTRAIL_COMPARE_KEY") {
            Some(raw) => raw
                .parse::<CompareKey>()
                .context("Invalid FOLLOWTRAIL_COMPARE_KEY")?,
            None => CompareKey::Handle,
        };

        let max_members = match lookup("FOLLOWTRAIL_MAX_MEMBERS") {
            Some(raw) => {
                let value: usize = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("FOLLOWTRAIL_MAX_MEMBERS is not a number: {raw}"))?;
                if value == 0 {
                    anyhow::bail!("FOLLOWTRAIL_MAX_MEMBERS must be at least 1");
                }
                Some(value)
            }
            None => None,
        };

        Ok(Self {
            db_path: lookup("FOLLOWTRAIL_DB_PATH").unwrap_or_else(|| "./followtrail.db".to_string()),
            retention,
            compare_key,
            public_api_url: lookup("PUBLIC_API_URL")
                .unwrap_or_else(|| crate::fetch::client::DEFAULT_PUBLIC_API_URL.to_string()),
            max_members,
        })
    }
}
