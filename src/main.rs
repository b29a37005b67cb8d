use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use followtrail::config::Config;
use followtrail::db::SnapshotStore;
use followtrail::fetch::{self, FetchResult};
use followtrail::tracker::Tracker;

/// Followtrail: follower and following history for the accounts you track.
///
/// Each fetch is stored as a snapshot; consecutive snapshots are compared to
/// show who followed, unfollowed, was followed or dropped.
#[derive(Parser)]
#[command(name = "followtrail", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Fetch an account's followers and following and record a snapshot
    Fetch {
        /// The handle to fetch (e.g. someone.bsky.social)
        handle: String,

        /// Refuse lists longer than this (default: FOLLOWTRAIL_MAX_MEMBERS, or no limit)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_members: Option<u64>,
    },

    /// Record a snapshot from a captured fetch result (JSON file)
    Import {
        /// Path to the JSON fetch result
        file: PathBuf,

        /// The identity the result belongs to
        #[arg(long)]
        identity: String,
    },

    /// Show the change feed for an identity, newest first
    Changes {
        handle: String,

        /// Emit JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// Show the latest snapshot's members
    Show {
        handle: String,

        /// List following instead of followers
        #[arg(long)]
        following: bool,

        /// Only show members whose handle or display name contains this text
        #[arg(long)]
        search: Option<String>,
    },

    /// Show who doesn't follow back, based on the latest snapshot
    Insights { handle: String },

    /// List tracked identities
    Tracked,

    /// Delete all stored history for an identity
    Delete { handle: String },

    /// Export the whole database as JSON
    Export {
        /// Output path (default: followtrail-export-YYYY-MM-DD.json)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show database status and last observation per identity
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("followtrail=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Init => {
            info!("Initializing Followtrail database...");
            let store = followtrail::db::initialize_sqlite(&config.db_path, config.retention)?;
            let table_count = store.table_count().await?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nNext step: followtrail fetch <handle>");
        }

        Commands::Fetch {
            handle,
            max_members,
        } => {
            let identity = followtrail::identity::normalize(&handle)?;
            let tracker = open_tracker(&config, true)?;
            let client = fetch::client::PublicAtpClient::new(&config.public_api_url)?;
            let max_members = max_members
                .map(|n| n as usize)
                .or(config.max_members);

            println!("Fetching @{identity} from {}...", client.base_url());

            let result =
                match fetch::graph::fetch_graph(&client, &identity, max_members, true).await {
                    Ok(result) => result,
                    Err(e) => return Err(explain_fetch_error(e)),
                };

            record_and_summarize(&tracker, result).await?;
        }

        Commands::Import { file, identity } => {
            let identity = followtrail::identity::normalize(&identity)?;
            let tracker = open_tracker(&config, true)?;

            let result = match fetch::load_result(&identity, &file) {
                Ok(result) => result,
                Err(e) => return Err(explain_fetch_error(e)),
            };

            record_and_summarize(&tracker, result).await?;
        }

        Commands::Changes { handle, json } => {
            let tracker = open_tracker(&config, false)?;
            let identity = followtrail::identity::normalize(&handle)?;
            let feed = tracker.change_feed(&identity).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&feed)?);
            } else {
                followtrail::output::terminal::display_change_feed(&identity, &feed);
            }
        }

        Commands::Show {
            handle,
            following,
            search,
        } => {
            let tracker = open_tracker(&config, false)?;
            let identity = followtrail::identity::normalize(&handle)?;

            let Some(overview) = tracker.overview(&identity).await? else {
                println!("No snapshots for @{identity}. Run `followtrail fetch {identity}` first.");
                return Ok(());
            };
            let Some(snapshot) = tracker.latest(&identity).await? else {
                return Ok(());
            };

            followtrail::output::terminal::display_overview(&overview);

            let (heading, list) = if following {
                ("Following", &snapshot.following)
            } else {
                ("Followers", &snapshot.followers)
            };
            let members = followtrail::insights::search(list, search.as_deref().unwrap_or(""));
            followtrail::output::terminal::display_members(heading, &members);
        }

        Commands::Insights { handle } => {
            let tracker = open_tracker(&config, false)?;
            let identity = followtrail::identity::normalize(&handle)?;

            match tracker.insights(&identity).await? {
                Some(insights) => {
                    followtrail::output::terminal::display_insights(&identity, &insights)
                }
                None => {
                    println!("No snapshots for @{identity}. Run `followtrail fetch {identity}` first.")
                }
            }
        }

        Commands::Tracked => {
            let tracker = open_tracker(&config, false)?;
            let tracked = tracker.tracked().await?;
            followtrail::output::terminal::display_tracked(&tracked);
        }

        Commands::Delete { handle } => {
            let tracker = open_tracker(&config, false)?;
            let identity = followtrail::identity::normalize(&handle)?;
            tracker.delete(&identity).await?;
            println!("Deleted all stored history for @{identity}.");
        }

        Commands::Export { out } => {
            let tracker = open_tracker(&config, false)?;
            let json = tracker.export_json().await?;
            let path = out.unwrap_or_else(|| {
                PathBuf::from(followtrail::output::export::default_export_name(
                    chrono::Utc::now().date_naive(),
                ))
            });
            let written = followtrail::output::export::write_export(&json, &path)?;
            println!(
                "{}",
                format!("Export saved to: {}", written.display()).bold()
            );
        }

        Commands::Status => {
            if !std::path::Path::new(&config.db_path).exists() {
                println!("Database: not initialized");
                println!("\nRun `followtrail init` to set up the database.");
                return Ok(());
            }
            let tracker = open_tracker(&config, false)?;
            followtrail::status::show(&tracker, &config.db_path, config.retention).await?;
        }
    }

    Ok(())
}

/// Open the SQLite store and wrap it in a Tracker.
///
/// Commands that record snapshots create the database on first use; read
/// commands require it to exist.
fn open_tracker(config: &Config, create: bool) -> Result<Tracker> {
    let store: Arc<dyn SnapshotStore> = if create {
        followtrail::db::initialize_sqlite(&config.db_path, config.retention)?
    } else {
        followtrail::db::open_sqlite(&config.db_path, config.retention)?
    };
    Ok(Tracker::new(store, config.compare_key))
}

/// Record a fetch result and print what changed since the previous snapshot.
async fn record_and_summarize(tracker: &Tracker, result: FetchResult) -> Result<()> {
    let snapshot = tracker.record(result).await?;

    println!(
        "{} {} followers, {} following",
        "Saved.".green().bold(),
        snapshot.follower_count,
        snapshot.following_count
    );

    let feed = tracker.change_feed(&snapshot.identity).await?;
    match feed.first() {
        Some(latest) if latest.observed_at == snapshot.taken_at => {
            println!(
                "  {} new followers, {} unfollowed, {} newly followed, {} no longer followed",
                latest.new_followers.len(),
                latest.lost_followers.len(),
                latest.new_following.len(),
                latest.lost_following.len()
            );
            println!(
                "  Run `followtrail changes {}` for details.",
                snapshot.identity
            );
        }
        _ => {
            if tracker.history(&snapshot.identity).await?.len() < 2 {
                println!("  First snapshot recorded. Fetch again later to see changes.");
            } else {
                println!("  No membership changes since the previous snapshot.");
            }
        }
    }

    Ok(())
}

/// Replace a fetch failure with its human-readable explanation.
fn explain_fetch_error(err: anyhow::Error) -> anyhow::Error {
    match fetch::failure_of(&err) {
        Some(failure) => err.context(format!("{} ({})", failure.message(), failure.code())),
        None => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_rejects_zero_max_members() {
        assert!(Cli::try_parse_from(["followtrail", "fetch", "alice", "--max-members", "0"]).is_err());
        let cli =
            Cli::try_parse_from(["followtrail", "fetch", "alice", "--max-members", "5"]).unwrap();
        match cli.command {
            Commands::Fetch { max_members, .. } => assert_eq!(max_members, Some(5)),
            _ => panic!("expected fetch"),
        }
    }
}
