use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use advanced_archiver::Algorithm;
use advanced_archiver::config::DEFAULT_CHUNK_SIZE;

#[derive(Parser)]
#[command(name = "advanced_archiver", version, about = "Advanced File Archiver")]
pub struct CliArgs {
    #[command(subcommand)]
    pub subcommand: SubCommand,

    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// No progress bars, warnings and errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum SubCommand {
    /// Compress a file or directory
    Compress {
        #[command(flatten)]
        paths: CodecArgs,
        /// Compression level, 0-9 (bz2: 1-9); defaults per algorithm
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=9))]
        level: Option<u32>,
    },
    /// Decompress a file or directory
    Decompress {
        #[command(flatten)]
        paths: CodecArgs,
    },
    /// Interact with cloud storage
    Cloud {
        #[command(subcommand)]
        provider: CloudProvider,
    },
}

#[derive(Args)]
pub struct CodecArgs {
    /// Input file or directory path
    pub input: PathBuf,
    /// Output file or directory path
    pub output: PathBuf,
    #[arg(short, long, value_enum, ignore_case = true, default_value_t = Algorithm::Gzip)]
    pub algorithm: Algorithm,
    /// Bytes read per step
    #[arg(long, env = "ARCHIVER_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
    /// Files processed in parallel
    #[arg(short, long, env = "ARCHIVER_JOBS", default_value_t = 1)]
    pub jobs: usize,
}

#[derive(Subcommand)]
pub enum CloudProvider {
    /// Interact with Amazon S3
    S3 {
        #[command(subcommand)]
        action: CloudAction,
    },
    /// Interact with Google Cloud Storage
    Gcs {
        #[command(subcommand)]
        action: CloudAction,
    },
}

#[derive(Subcommand)]
pub enum CloudAction {
    /// Upload a local file
    Upload(TransferArgs),
    /// Download an object to a local file
    Download(TransferArgs),
}

#[derive(Args)]
pub struct TransferArgs {
    /// Local file path
    pub local_path: PathBuf,
    /// Bucket name
    pub bucket: String,
    /// Object key (blob name on GCS)
    pub key: String,
}
