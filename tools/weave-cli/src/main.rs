//! Weave CLI — drive a compositing pipeline from the command line.
//!
//! Usage:
//!   weave run [OPTIONS]        Composite N synthetic sources
//!   weave layout <COUNT>       Print the layout table for a source count

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "weave",
    about = "Real-time multi-source video frame compositing",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline over synthetic test-pattern sources
    Run {
        /// Number of sources to composite (1-6)
        #[arg(short, long, default_value = "2")]
        sources: usize,

        /// Frames per second for each source
        #[arg(long, default_value = "30")]
        fps: u32,

        /// How long to run, in seconds (0 = until Ctrl+C)
        #[arg(short, long, default_value = "5")]
        duration: u64,

        /// Canvas width
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Canvas height
        #[arg(long, default_value = "720")]
        height: u32,
    },

    /// Print the placement rectangles for a given source count
    Layout {
        /// Active source count (0-6)
        count: usize,

        /// Canvas width
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Canvas height
        #[arg(long, default_value = "720")]
        height: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    weave_common::logging::init_logging(&weave_common::config::LoggingConfig {
        level: log_level.to_string(),
        json: false,
        file: None,
    });

    match cli.command {
        Commands::Run {
            sources,
            fps,
            duration,
            width,
            height,
        } => commands::run::run(sources, fps, duration, width, height).await,
        Commands::Layout {
            count,
            width,
            height,
        } => commands::layout::run(count, width, height),
    }
}
