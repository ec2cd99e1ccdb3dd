//! Offgrid CLI - prepare route areas for offline use and search them.
//!
//! Every command prints its result as JSON on stdout; logs go to stderr.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use offgrid_core::{EntryKind, OfflineSession, SessionConfig};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "offgrid")]
#[command(about = "Offline map regions and local address/POI search")]
struct Args {
    /// Data directory (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (defaults to offgrid.json in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Print the buffered bounding box around a path
    Bbox {
        /// Path point as "lat,lng" (repeatable)
        #[arg(long = "point", required = true)]
        points: Vec<String>,

        /// Buffer around the path in kilometres
        #[arg(long, default_value = "1.0")]
        buffer_km: f64,
    },

    /// Download and index the area around a route
    PrepareRoute {
        /// JSON file holding {"id": ..., "coordinates": [{"latitude": .., "longitude": ..}]}
        route_file: PathBuf,
    },

    /// Search downloaded regions
    Search {
        query: String,

        /// Restrict results to one region
        #[arg(long)]
        region: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },

    /// Inspect and manage downloaded regions
    Regions {
        #[command(subcommand)]
        action: RegionsAction,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum RegionsAction {
    /// List regions that are not expired
    List,
    /// Remove a region and its search data
    Evict { region_id: String },
    /// Remove every expired region
    Sweep,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub(crate) enum KindArg {
    Address,
    Poi,
}

impl From<KindArg> for EntryKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Address => EntryKind::Address,
            KindArg::Poi => EntryKind::PointOfInterest,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let output = match args.command {
        Command::Bbox { points, buffer_km } => commands::bbox(&points, buffer_km)?,
        command => {
            let session = open_session(args.data_dir, args.config).await?;
            let output = commands::run(&session, command).await;
            session.shutdown().await;
            output?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn open_session(
    data_dir: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<OfflineSession> {
    let data_dir = match data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .context("No platform data directory; pass --data-dir")?
            .join("offgrid"),
    };
    debug!("Data directory: {}", data_dir.display());

    let builder = OfflineSession::builder(&data_dir).auto_create_dirs(true);
    let builder = match config {
        Some(path) => builder.with_config(
            SessionConfig::load(&path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
        ),
        None => builder.load_config_file()?,
    };

    // One-shot commands do not need the background sweeper.
    Ok(builder.with_sweeper(false).build().await?)
}
