// System status display — DB stats and per-identity last observations.

use anyhow::Result;
use chrono::Utc;

use crate::tracker::Tracker;

/// Display system status to the terminal. The database must already exist.
pub async fn show(tracker: &Tracker, db_display_path: &str, retention: usize) -> Result<()> {
    let file_size = std::fs::metadata(db_display_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_display_path, file_size);
    println!(
        "Retention: {} snapshots per identity, compared by {}",
        retention,
        tracker.compare_key()
    );

    let tracked = tracker.tracked().await?;
    if tracked.is_empty() {
        println!("Tracked identities: none yet");
        println!("  Run `followtrail fetch <handle>` to take a first snapshot");
        return Ok(());
    }

    println!("Tracked identities: {}", tracked.len());
    let now = Utc::now();
    for entry in &tracked {
        match tracker.last_observation(&entry.identity).await? {
            Some(obs) => println!(
                "  @{}: {} followers, {} following ({})",
                entry.identity,
                obs.follower_count,
                obs.following_count,
                crate::output::time_ago(obs.taken_at, now)
            ),
            None => println!("  @{}: no observation recorded", entry.identity),
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
