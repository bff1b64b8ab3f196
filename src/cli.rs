use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelstitch")]
#[command(author, version, about = "Merge every item of a playlist into one file")]
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
    /// Start the HTTP server
    Start {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run a single merge job and print the result as JSON
    Run {
        /// Playlist URL
        #[arg(required = true)]
        url: String,

        /// Output format (mp3, m4a, wav, mp4, mkv, webm)
        #[arg(short, long, default_value = "mp4")]
        format: String,

        /// Maximum video height, e.g. 720 or 1080p
        #[arg(short, long)]
        resolution: Option<String>,

        /// Print the job's events to stderr as JSON lines
        #[arg(long)]
        events: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
