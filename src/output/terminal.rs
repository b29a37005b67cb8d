// Colored terminal output for overviews, change feeds and member lists.
//
// This module handles all terminal-specific formatting. main.rs gathers the
// data through the Tracker and delegates display here.

use chrono::Utc;
use colored::Colorize;

use crate::db::models::{Member, TrackedIdentity};
use crate::diff::Diff;
use crate::insights::Insights;
use crate::tracker::Overview;

/// Display current totals with the change since the previous snapshot.
pub fn display_overview(overview: &Overview) {
    println!(
        "\n{}",
        format!("=== @{} ===", overview.identity).bold()
    );
    println!(
        "  Followers: {:>8} {}",
        overview.follower_count,
        colorize_delta(overview.follower_delta.unwrap_or(0))
    );
    println!(
        "  Following: {:>8} {}",
        overview.following_count,
        colorize_delta(overview.following_delta.unwrap_or(0))
    );
    let ratio = overview
        .ratio
        .map(|r| format!("{r:.2}"))
        .unwrap_or_else(|| "∞".to_string());
    println!("  Ratio:     {:>8}", ratio);
    println!(
        "  Last sync: {} ({} snapshots kept)",
        super::time_ago(overview.taken_at, Utc::now()),
        overview.snapshot_count
    );
}

/// Display a newest-first change feed.
pub fn display_change_feed(identity: &str, feed: &[Diff]) {
    if feed.is_empty() {
        println!(
            "No changes recorded for @{identity} yet. At least two fetches with different members are needed."
        );
        return;
    }

    println!(
        "\n{}",
        format!("=== Changes for @{} ({} entries) ===", identity, feed.len()).bold()
    );

    for diff in feed {
        println!(
            "\n  {}",
            diff.observed_at
                .format("%Y-%m-%d %H:%M UTC")
                .to_string()
                .dimmed()
        );
        let sections = [
            ("new followers", &diff.new_followers, true),
            ("unfollowed", &diff.lost_followers, false),
            ("newly followed", &diff.new_following, true),
            ("no longer followed", &diff.lost_following, false),
        ];
        for (label, members, gained) in sections {
            display_section(label, members, gained);
        }
    }
    println!();
}

fn display_section(label: &str, members: &[Member], gained: bool) {
    if members.is_empty() {
        return;
    }
    let sign = if gained { '+' } else { '-' };
    let title = format!("{sign}{} {label}", members.len());
    let title = if gained { title.green() } else { title.red() };
    println!("    {}", title);
    for member in members {
        println!("      {}", format_member(member));
    }
}

/// Display a member list with an optional heading count.
pub fn display_members(heading: &str, members: &[&Member]) {
    println!(
        "\n{}",
        format!("=== {} ({}) ===", heading, members.len()).bold()
    );
    if members.is_empty() {
        println!("  {}", "No data".dimmed());
        return;
    }
    for member in members {
        println!("  {}", format_member(member));
    }
}

/// Display follow-back insights.
pub fn display_insights(identity: &str, insights: &Insights) {
    println!(
        "\n{}",
        format!("=== Insights for @{identity} ===").bold()
    );

    println!(
        "\n  {} ({})",
        "You follow, they don't follow back".bold(),
        insights.not_following_back.len()
    );
    if insights.not_following_back.is_empty() {
        println!("    {}", "Everyone follows you back".green());
    }
    for member in &insights.not_following_back {
        println!("    {}", format_member(member));
    }

    println!(
        "\n  {} ({})",
        "They follow, you don't follow back".bold(),
        insights.not_followed_back.len()
    );
    if insights.not_followed_back.is_empty() {
        println!("    {}", "You follow everyone back".green());
    }
    for member in &insights.not_followed_back {
        println!("    {}", format_member(member));
    }

    println!("\n  Mutuals: {}", insights.mutuals.len());
}

/// Display the tracked-identity index.
pub fn display_tracked(tracked: &[TrackedIdentity]) {
    if tracked.is_empty() {
        println!("No identities tracked yet. Run `followtrail fetch <handle>` first.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Tracked identities ({}) ===", tracked.len()).bold()
    );
    println!(
        "  {:<36} {:>9}  {}",
        "Identity".dimmed(),
        "Snapshots".dimmed(),
        "Last sync".dimmed()
    );
    let now = Utc::now();
    for entry in tracked {
        println!(
            "  @{:<35} {:>9}  {}",
            entry.identity,
            entry.snapshot_count,
            super::time_ago(entry.last_taken_at, now)
        );
    }
}

fn format_member(member: &Member) -> String {
    if member.display_name.is_empty() {
        format!("@{}", member.handle)
    } else {
        format!(
            "@{:<30} {}",
            member.handle,
            super::truncate_chars(&member.display_name, 40).dimmed()
        )
    }
}

fn colorize_delta(delta: i64) -> colored::ColoredString {
    let text = super::format_delta(delta);
    match delta {
        d if d > 0 => text.green(),
        d if d < 0 => text.red(),
        _ => text.normal(),
    }
}
