use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "loopcast")]
#[command(author, version, about = "Fetch a video dataset and loop-stream the playable files")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, validate, and stream every playable video until Ctrl+C
    Run {
        /// Fetch one asset and stream only the first valid file
        #[arg(short, long)]
        single: bool,

        /// Do not download; use what is already in the video directory
        #[arg(short = 'd', long)]
        skip_download: bool,

        /// Host for the stream listing endpoint
        #[arg(long)]
        host: Option<String>,

        /// Port for the stream listing endpoint
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Download manifest assets into the video directory
    Fetch {
        /// Number of assets to fetch (-1 for all)
        #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
        limit: i64,
    },

    /// List playable videos, updating the validity cache
    Scan {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete corrupted videos from the video directory
    Clean,

    /// Check that required external tools are available
    CheckTools,
}
