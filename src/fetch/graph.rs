// Follower and following list fetching with pagination.
//
// Looks the actor up first (so an unknown handle fails fast with
// USER_NOT_FOUND and we know the totals for the progress bar), then pages
// through getFollowers and getFollows until the cursor runs out. A list is
// either fetched completely or the fetch fails: a partial list recorded as a
// snapshot would show every member past the cap as lost.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::{debug, info};

use super::client::PublicAtpClient;
use super::FetchResult;
use crate::db::models::Member;

/// Page size for graph endpoints (the API maximum).
const PAGE_LIMIT: &str = "100";

/// Which list to page through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Followers,
    Following,
}

impl ListKind {
    fn nsid(&self) -> &'static str {
        match self {
            ListKind::Followers => "app.bsky.graph.getFollowers",
            ListKind::Following => "app.bsky.graph.getFollows",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ListKind::Followers => "followers",
            ListKind::Following => "following",
        }
    }
}

// -- Serde types for app.bsky.actor.getProfile / app.bsky.graph.* --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub followers_count: Option<u64>,
    #[serde(default)]
    pub follows_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl From<ProfileView> for Member {
    fn from(view: ProfileView) -> Self {
        Member {
            id: view.did,
            handle: view.handle,
            display_name: view.display_name.unwrap_or_default(),
            avatar_url: view.avatar.unwrap_or_default(),
        }
    }
}

/// One page of either getFollowers (`followers`) or getFollows (`follows`).
#[derive(Debug, Deserialize)]
pub struct GraphPage {
    #[serde(alias = "followers", alias = "follows")]
    pub members: Vec<ProfileView>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Fetch both membership lists for `identity`.
///
/// With `max_members` set, an account with a longer list is refused instead
/// of truncated.
pub async fn fetch_graph(
    client: &PublicAtpClient,
    identity: &str,
    max_members: Option<usize>,
    show_progress: bool,
) -> Result<FetchResult> {
    let profile: ProfileResponse = client
        .xrpc_get("app.bsky.actor.getProfile", &[("actor", identity)])
        .await
        .with_context(|| format!("Failed to look up @{identity}"))?;

    debug!(did = %profile.did, handle = %profile.handle, "Resolved profile");

    let followers = fetch_list(
        client,
        identity,
        ListKind::Followers,
        profile.followers_count,
        max_members,
        show_progress,
    )
    .await?;
    let following = fetch_list(
        client,
        identity,
        ListKind::Following,
        profile.follows_count,
        max_members,
        show_progress,
    )
    .await?;

    Ok(FetchResult {
        identity: identity.to_string(),
        followers,
        following,
    })
}

/// Page through one list until the cursor runs out.
pub async fn fetch_list(
    client: &PublicAtpClient,
    identity: &str,
    kind: ListKind,
    expected_total: Option<u64>,
    max_members: Option<usize>,
    show_progress: bool,
) -> Result<Vec<Member>> {
    let pb = if show_progress {
        progress_bar(kind, expected_total)
    } else {
        ProgressBar::hidden()
    };

    let mut members = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let mut params = vec![("actor", identity), ("limit", PAGE_LIMIT)];
        if let Some(ref c) = cursor {
            params.push(("cursor", c.as_str()));
        }

        let page: GraphPage = client
            .xrpc_get(kind.nsid(), &params)
            .await
            .with_context(|| format!("Failed to fetch {} for @{}", kind.label(), identity))?;

        let page_size = page.members.len();
        if let Err(e) = absorb_page(&mut members, page.members, max_members) {
            pb.finish_and_clear();
            return Err(e.context(format!("Refusing to record @{identity}'s {}", kind.label())));
        }
        pb.set_position(members.len() as u64);

        debug!(
            page_size,
            total = members.len(),
            list = kind.label(),
            "Fetched page for @{}",
            identity
        );

        cursor = page.cursor;
        if cursor.is_none() || page_size == 0 {
            break;
        }
    }

    pb.finish_and_clear();

    info!(
        count = members.len(),
        list = kind.label(),
        identity = identity,
        "Collected members"
    );

    Ok(members)
}

/// Append one page of members, failing once the list grows past the cap.
fn absorb_page(
    members: &mut Vec<Member>,
    page: Vec<ProfileView>,
    max_members: Option<usize>,
) -> Result<()> {
    if let Some(max) = max_members {
        let total = members.len() + page.len();
        if total > max {
            anyhow::bail!(
                "list has more than {max} members; raise --max-members or FOLLOWTRAIL_MAX_MEMBERS"
            );
        }
    }
    members.extend(page.into_iter().map(Member::from));
    Ok(())
}

fn progress_bar(kind: ListKind, expected_total: Option<u64>) -> ProgressBar {
    let template = format!("  {:<9} [{{bar:30}}] {{pos}}/{{len}}", kind.label());
    match expected_total {
        Some(total) => {
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar().template(&template) {
                pb.set_style(style);
            }
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            let template = format!("  {{spinner}} {} {{pos}}", kind.label());
            if let Ok(style) = ProgressStyle::default_spinner().template(&template) {
                pb.set_style(style);
            }
            pb
        }
    }
}
