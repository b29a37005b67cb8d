// Identity normalization — the storage key for a tracked account.

use anyhow::Result;

/// Normalize user input into the identity used as the storage key:
/// trim, drop one leading `@`, lowercase.
pub fn normalize(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let bare = trimmed.strip_prefix('@').unwrap_or(trimmed).trim();
    if bare.is_empty() {
        anyhow::bail!("Identity is empty. Pass a handle such as @someone.bsky.social");
    }
    Ok(bare.to_lowercase())
}
