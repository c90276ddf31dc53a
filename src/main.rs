use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_batteries::Session;

use crate::prelude::*;

mod config;
mod db;
mod errors;
mod graph;
mod listeners;
mod models;
mod prelude;
mod services;

#[cfg(test)]
mod testing;

/// Collects the posts and comments of public pages and groups from the Graph API.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// The TOML configuration file to load.
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stores the posts of a page or group, resuming any earlier scrape.
    Posts {
        /// The id or username of the page or group.
        collection: String,

        /// Only fetch posts created after this time (ISO 8601).
        #[arg(long)]
        since: Option<String>,

        /// Only fetch posts created before this time (ISO 8601).
        #[arg(long)]
        until: Option<String>,
    },

    /// Stores the comments of every stored post which does not have them yet.
    Comments {
        /// The id or username of the page or group.
        collection: String,
    },
}

#[tokio::main]
async fn main() {
    let session = Session::new("graph-scraper", env!("CARGO_PKG_VERSION"));

    if let Err(err) = run(Args::parse()).await {
        error!("{err}");
        eprintln!("{err}");
        session.shutdown();
        std::process::exit(1);
    }

    session.shutdown();
}

async fn run(args: Args) -> Result<(), human_errors::Error> {
    dotenvy::dotenv().ok();

    let config = match args.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    }
    .merge(&Config::from_env()?);

    let database = db::SqliteDatabase::open(config.database.path()).await?;
    let services = services::ServicesContainer::new(database, config);

    let cancellation = CancellationToken::new();
    tokio::spawn({
        let cancellation = cancellation.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current request.");
                cancellation.cancel();
            }
        }
    });

    let mut scraper = listeners::GraphScraper::new(services).with_cancellation(cancellation);
    scraper.authenticate_from_config().await?;

    match args.command {
        Command::Posts {
            collection,
            since,
            until,
        } => {
            let window = graph::Window::parse(since.as_deref(), until.as_deref())?;
            let report = scraper.scrape_posts(&collection, window).await?;
            info!(
                collection.id = %report.collection.id,
                "Stored {} new posts from the {} '{}', which now has {} posts.",
                report.added(),
                report.collection.kind,
                report.collection.name,
                report.collection.nposts
            );
        }
        Command::Comments { collection } => {
            let report = scraper.fetch_collection_comments(&collection).await?;
            info!(
                "Stored {} comments across {} posts.",
                report.comments,
                report.posts
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posts_command() {
        let args = Args::parse_from([
            "graph-scraper",
            "--config",
            "scraper.toml",
            "posts",
            "BillGates",
            "--since",
            "2017-01-01T00:00:00+0000",
        ]);

        assert_eq!(args.config.as_deref(), Some("scraper.toml"));
        match args.command {
            Command::Posts {
                collection,
                since,
                until,
            } => {
                assert_eq!(collection, "BillGates");
                assert_eq!(since.as_deref(), Some("2017-01-01T00:00:00+0000"));
                assert_eq!(until, None);
            }
            other => panic!("expected the posts command, got {other:?}"),
        }
    }

    #[test]
    fn test_comments_command() {
        let args = Args::parse_from(["graph-scraper", "comments", "BillGates"]);
        assert!(matches!(args.command, Command::Comments { collection } if collection == "BillGates"));
    }
}
