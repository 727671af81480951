use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kwzforge")]
#[command(author, version, about = "Flipnote KWZ to MP4 conversion pipeline")]
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
    /// Convert KWZ files to MP4
    Convert {
        /// Source files; anything not ending in .kwz is ignored
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory receiving the converted videos (overrides config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Render decoded tracks to a mono 16-bit WAV file
    ExportAudio {
        /// Directory holding track0.wav .. track4.wav
        #[arg(required = true)]
        tracks_dir: PathBuf,

        /// Output WAV file
        #[arg(required = true)]
        output: PathBuf,

        /// Track index (0-4) or "mix"
        #[arg(short, long, default_value = "mix")]
        track: String,

        /// Output sample rate (overrides config)
        #[arg(long)]
        sample_rate: Option<u32>,
    },

    /// Check that required external tools are available
    CheckTools {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
