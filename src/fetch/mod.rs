// Fetch collaborator contract — what a completed fetch hands to the tracker.
//
// The tracker only ever consumes a successful `FetchResult`. Failures are
// described by `FetchFailure` and must be handled by the caller before
// anything is recorded. Two producers live here: a JSON loader for results
// captured elsewhere (e.g. by the browser extension), and a client for the
// public AT Protocol graph endpoints.

pub mod client;
pub mod graph;

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::db::models::Member;

/// A completed fetch: the identity's two membership lists.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub identity: String,
    pub followers: Vec<Member>,
    pub following: Vec<Member>,
}

/// Why a fetch did not produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    NotLoggedIn,
    RateLimited,
    UserNotFound,
    PrivateAccount,
    ContentScriptUnavailable,
    Http(u16),
    Unknown,
}

impl FetchFailure {
    /// Parse a wire code such as `RATE_LIMITED` or `HTTP_502`.
    /// Unrecognized codes become `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "NOT_LOGGED_IN" => FetchFailure::NotLoggedIn,
            "RATE_LIMITED" => FetchFailure::RateLimited,
            "USER_NOT_FOUND" => FetchFailure::UserNotFound,
            "PRIVATE_ACCOUNT" => FetchFailure::PrivateAccount,
            // older extension builds used this name
            "CONTENT_SCRIPT_UNAVAILABLE" | "CONTENT_SCRIPT_NOT_LOADED" => {
                FetchFailure::ContentScriptUnavailable
            }
            other => other
                .strip_prefix("HTTP_")
                .and_then(|status| status.parse::<u16>().ok())
                .map(FetchFailure::Http)
                .unwrap_or(FetchFailure::Unknown),
        }
    }

    pub fn code(&self) -> String {
        match self {
            FetchFailure::NotLoggedIn => "NOT_LOGGED_IN".to_string(),
            FetchFailure::RateLimited => "RATE_LIMITED".to_string(),
            FetchFailure::UserNotFound => "USER_NOT_FOUND".to_string(),
            FetchFailure::PrivateAccount => "PRIVATE_ACCOUNT".to_string(),
            FetchFailure::ContentScriptUnavailable => "CONTENT_SCRIPT_UNAVAILABLE".to_string(),
            FetchFailure::Http(status) => format!("HTTP_{status}"),
            FetchFailure::Unknown => "UNKNOWN".to_string(),
        }
    }

    /// A human-readable explanation for terminal output.
    pub fn message(&self) -> String {
        match self {
            FetchFailure::NotLoggedIn => {
                "Not logged in. Sign in to the service and try again.".to_string()
            }
            FetchFailure::RateLimited => {
                "The service is rate limiting requests. Wait a few minutes and try again."
                    .to_string()
            }
            FetchFailure::UserNotFound => "No account found with that handle.".to_string(),
            FetchFailure::PrivateAccount => "This account is private.".to_string(),
            FetchFailure::ContentScriptUnavailable => {
                "Could not reach the page the extension fetches from. Open it and try again."
                    .to_string()
            }
            FetchFailure::Http(status) => format!("The service answered with HTTP {status}."),
            FetchFailure::Unknown => "Fetch failed for an unknown reason.".to_string(),
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl std::error::Error for FetchFailure {}

/// Find the fetch failure inside an error chain, if there is one.
pub fn failure_of(err: &anyhow::Error) -> Option<FetchFailure> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<FetchFailure>().copied())
}

// -- Serde types for captured fetch results --

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CapturedResult {
    /// `{ "success": bool, "data": {...}, "error": "CODE" }`
    ///
    /// `data` is only decoded as lists on success; failures may carry
    /// unrelated payloads such as the account's profile.
    Envelope {
        success: bool,
        #[serde(default)]
        data: Option<serde_json::Value>,
        #[serde(default)]
        error: Option<String>,
    },
    /// `{ "followers": [...], "following": [...] }`
    Bare(CapturedLists),
}

#[derive(Debug, Deserialize)]
struct CapturedLists {
    followers: Vec<Member>,
    following: Vec<Member>,
}

/// Parse a captured fetch result for `identity` from JSON text.
///
/// A `success: false` envelope yields its `FetchFailure` as the error.
pub fn parse_result(identity: &str, json: &str) -> Result<FetchResult> {
    let captured: CapturedResult =
        serde_json::from_str(json).context("Fetch result is not valid JSON")?;

    let lists = match captured {
        CapturedResult::Envelope {
            success: true,
            data: Some(data),
            ..
        } => serde_json::from_value::<CapturedLists>(data)
            .context("Fetch result data does not hold follower and following lists")?,
        CapturedResult::Envelope { success: true, .. } => {
            anyhow::bail!("Fetch result reports success but carries no data")
        }
        CapturedResult::Envelope { error, .. } => {
            let failure = error
                .as_deref()
                .map(FetchFailure::from_code)
                .unwrap_or(FetchFailure::Unknown);
            return Err(anyhow::Error::new(failure).context(format!("Fetch for {identity} failed")));
        }
        CapturedResult::Bare(lists) => lists,
    };

    Ok(FetchResult {
        identity: identity.to_string(),
        followers: lists.followers,
        following: lists.following,
    })
}

/// Load a captured fetch result from a JSON file.
pub fn load_result(identity: &str, path: &Path) -> Result<FetchResult> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fetch result {}", path.display()))?;
    parse_result(identity, &json)
        .with_context(|| format!("Failed to load fetch result {}", path.display()))
}
