mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use colored::*;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use advanced_archiver::cloud::{self, Provider, Transfer};
use advanced_archiver::summary::print_summary;
use advanced_archiver::{
    ArchiveError, CancelFlag, Direction, NoopObserver, ProcessOptions, ProgressObserver,
    TerminalProgress, Walker,
};
use cli::{CliArgs, CloudAction, CloudProvider, CodecArgs, SubCommand};

const EXIT_FAILURE: u8 = 1;
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let bars = (!args.quiet).then(TerminalProgress::new);
    init_tracing(args.verbose, args.quiet, bars.as_ref());

    match run(args, bars.as_ref()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            let usage = err
                .downcast_ref::<ArchiveError>()
                .is_some_and(ArchiveError::is_usage_error);
            ExitCode::from(if usage { EXIT_USAGE } else { EXIT_FAILURE })
        }
    }
}

/// Log lines go to stderr, through the progress bars when they are shown.
fn init_tracing(verbose: u8, quiet: bool, bars: Option<&TerminalProgress>) {
    let default = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let writer = match bars {
        Some(bars) => BoxMakeWriter::new(bars.log_writer()),
        None => BoxMakeWriter::new(std::io::stderr),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .init();
}

fn run(args: CliArgs, bars: Option<&TerminalProgress>) -> anyhow::Result<ExitCode> {
    match args.subcommand {
        SubCommand::Compress { paths, level } => run_codec(paths, level, Direction::Compress, bars),
        SubCommand::Decompress { paths } => run_codec(paths, None, Direction::Decompress, bars),
        SubCommand::Cloud { provider } => {
            let (provider, action) = match provider {
                CloudProvider::S3 { action } => (Provider::S3, action),
                CloudProvider::Gcs { action } => (Provider::Gcs, action),
            };
            let (op, t) = match action {
                CloudAction::Upload(t) => (Transfer::Upload, t),
                CloudAction::Download(t) => (Transfer::Download, t),
            };
            cloud::run(provider, op, &t.local_path, &t.bucket, &t.key)
                .with_context(|| format!("cloud {op} of '{}'", t.local_path.display()))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_codec(
    paths: CodecArgs,
    level: Option<u32>,
    direction: Direction,
    bars: Option<&TerminalProgress>,
) -> anyhow::Result<ExitCode> {
    let options = ProcessOptions {
        chunk_size: paths.chunk_size,
        level,
        jobs: paths.jobs,
    };
    options.validate()?;
    if !paths.input.exists() {
        return Err(ArchiveError::SourceNotFound(paths.input).into());
    }
    let output = file_destination(&paths.input, &paths.output, paths.algorithm, direction);

    let cancel = CancelFlag::new();
    watch_ctrl_c(cancel.clone());

    let observer: &dyn ProgressObserver = match bars {
        Some(bars) => bars,
        None => &NoopObserver,
    };

    let start = Instant::now();
    let report = Walker::new(paths.algorithm, direction)
        .with_options(options)
        .with_observer(observer)
        .with_cancel(cancel)
        .run(&paths.input, &output)?;
    print_summary(&report, direction, start.elapsed());

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILURE)
    })
}

/// A single input file written into an existing directory keeps its name,
/// with the suffix added or removed.
fn file_destination(
    input: &Path,
    output: &Path,
    algorithm: advanced_archiver::Algorithm,
    direction: Direction,
) -> PathBuf {
    if !(input.is_file() && output.is_dir()) {
        return output.to_path_buf();
    }
    let Some(name) = input.file_name() else {
        return output.to_path_buf();
    };
    let name = Path::new(name);
    let rel = advanced_archiver::walker::destination_for(name, algorithm, direction)
        .unwrap_or_else(|| name.with_extension("out"));
    output.join(rel)
}

/// First Ctrl-C lets the current chunk finish, then fails the remaining tasks.
fn watch_ctrl_c(cancel: CancelFlag) {
    std::thread::spawn(move || {
        let Ok(rt) = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        else {
            return;
        };
        rt.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current chunk");
                cancel.cancel();
            }
        });
    });
}
