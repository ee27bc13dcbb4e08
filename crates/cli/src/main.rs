use anyhow::{bail, Result};
use automation::AutomationHost;
use clap::{Parser, Subcommand};
use cli::scope::{self, ScopeArg};
use cli::{backend, logging, report};
use converter_core::archive;
use converter_core::config::{self, AppConfig};
use converter_core::images::ImageToDocumentWorker;
use converter_core::scanner;
use converter_core::{CancelToken, ChannelSink, ConversionWorker, ProgressEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Convert { path, kind, json } => run_convert(cfg, path, kind, json).await,
        Commands::Images {
            output,
            images,
            json,
        } => run_images(cfg, output, images, json).await,
        Commands::Restore { archive_dir, json } => run_restore(archive_dir, json),
        Commands::Drives => {
            for drive in scanner::available_drives() {
                println!("{}", drive.display());
            }
            Ok(())
        }
    }
}

#[derive(Parser)]
#[command(name = "converter")]
#[command(about = "Convert legacy Office documents and bundle images into PDFs", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert .doc/.xls/.ppt files to their modern formats and archive the originals
    Convert {
        /// File, folder, or drive root to convert
        path: PathBuf,
        /// Scope kind (inferred from the path if omitted)
        #[arg(long, value_enum)]
        kind: Option<ScopeArg>,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Combine images into one multi-page PDF
    Images {
        /// Output PDF path (.pdf appended if missing)
        output: PathBuf,
        /// Images in page order
        #[arg(required = true, num_args = 1..)]
        images: Vec<PathBuf>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Move archived originals back using the run's manifest
    Restore {
        /// Archive folder created by a conversion run
        archive_dir: PathBuf,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List drive roots that can be used as a conversion scope
    Drives,
}

async fn run_convert(cfg: AppConfig, path: PathBuf, kind: Option<ScopeArg>, json: bool) -> Result<()> {
    let scope = scope::scope_for(path, kind);
    let host = backend::build_host(&cfg.conversion);
    info!(backend = host.name(), root = %scope.root.display(), "starting conversion");

    let (tx, rx) = mpsc::unbounded_channel();
    let mut worker = ConversionWorker::new(host, &cfg, Arc::new(ChannelSink::new(tx)));
    let cancel = worker.cancel_token();
    let task = tokio::task::spawn_blocking(move || worker.run(&scope));

    let result = drive_with_progress(task, rx, cancel, json).await??;
    if json {
        println!("{}", serde_json::to_string_pretty(&report::batch_json(&result))?);
    } else {
        print!(
            "{}",
            report::batch_summary(&result, cfg.report.max_error_lines)
        );
    }
    Ok(())
}

async fn run_images(cfg: AppConfig, output: PathBuf, images: Vec<PathBuf>, json: bool) -> Result<()> {
    let output = report::pdf_output_path(&output);
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = ImageToDocumentWorker::new(&cfg.images, Arc::new(ChannelSink::new(tx)));
    let cancel = worker.cancel_token();
    let task = tokio::task::spawn_blocking(move || worker.run(&images, &output));

    let result = drive_with_progress(task, rx, cancel, json).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", report::image_summary(&result));
    }
    if !result.success {
        bail!(result.error.unwrap_or_else(|| "image conversion failed".into()));
    }
    Ok(())
}

fn run_restore(archive_dir: PathBuf, json: bool) -> Result<()> {
    let restored = archive::restore(&archive_dir)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&restored)?);
    } else {
        print!("{}", report::restore_summary(&restored));
    }
    Ok(())
}

/// Prints progress until the blocking task finishes. The first Ctrl-C asks
/// the worker to stop after the file in flight.
async fn drive_with_progress<T>(
    mut task: JoinHandle<T>,
    mut rx: UnboundedReceiver<ProgressEvent>,
    cancel: CancelToken,
    quiet: bool,
) -> Result<T> {
    let show = |event: &ProgressEvent| {
        if let Some(line) = report::progress_line(event) {
            if !quiet {
                eprintln!("{line}");
            }
        } else {
            debug!(?event, "progress");
        }
    };

    let out = loop {
        tokio::select! {
            Some(event) = rx.recv() => show(&event),
            joined = &mut task => break joined?,
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                eprintln!("Cancelling after the current file...");
                cancel.cancel();
            }
        }
    };
    while let Ok(event) = rx.try_recv() {
        show(&event);
    }
    Ok(out)
}
