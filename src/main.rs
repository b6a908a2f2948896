use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use qurandl::prelude::*;
use qurandl::version;

#[derive(Parser)]
#[command(name = "qurandl", version, about = "Download Quran companion assets")]
struct Cli {
    /// Downloads root directory.
    #[arg(long, global = true, default_value = "downloads")]
    dir: PathBuf,

    /// JSON file overriding the bundled reciter/content registry.
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download every verse recitation of one surah.
    Recitation {
        /// Reciter index in the registry.
        #[arg(long)]
        reciter: usize,
        /// Surah number (1-114).
        #[arg(long)]
        surah: u32,
    },
    /// Download the complete QCF V2 page-font set.
    Qcf,
    /// Download a tafsir database by registry index.
    Tafsir {
        #[arg(long)]
        index: usize,
    },
    /// Download a translation database by registry index.
    Translation {
        #[arg(long)]
        index: usize,
    },
    /// Print the latest published application version, if reachable.
    CheckUpdate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let registry = match &cli.registry {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("couldn't read {}", path.display()))?;
            Registry::from_json(&data).context("invalid registry file")?
        }
        None => Registry::bundled(),
    };
    let dirs = DownloadDirs::new(&cli.dir);
    let fetcher = Arc::new(HttpFetcher::new());

    if matches!(cli.command, Command::CheckUpdate) {
        match version::latest_version(fetcher.client()).await {
            Some(v) => println!("latest published version: {v}"),
            None => println!("no version information available"),
        }
        return Ok(());
    }

    let job = match cli.command {
        Command::Recitation { reciter, surah } => {
            Job::recitation(&registry, &dirs, reciter, surah)?
        }
        Command::Qcf => Job::qcf(&dirs),
        Command::Tafsir { index } => Job::tafsir(&registry, &dirs, index)?,
        Command::Translation { index } => Job::translation(&registry, &dirs, index)?,
        Command::CheckUpdate => unreachable!("handled above"),
    };

    let (manager, mut events) = JobManager::new(fetcher);
    manager.add_job(job).await;
    manager.start().await;

    // ctrl-c stops the queue; the manager answers with one Aborted event.
    {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                manager.stop().await;
            }
        });
    }

    let mut failures = 0usize;
    loop {
        let event = tokio::select! {
            ev = events.recv() => match ev {
                Some(ev) => ev,
                None => break,
            },
            _ = tokio::time::sleep(Duration::from_millis(200)), if !manager.is_on() => break,
        };

        match event {
            DownloadEvent::JobStarted { name, .. } => println!("downloading {name}"),
            DownloadEvent::Progress { completed, total } => println!("  {completed}/{total}"),
            DownloadEvent::Speed(speed) => println!("  {speed}"),
            DownloadEvent::JobFailed { meta, .. } => {
                failures += 1;
                eprintln!("  failed: {meta:?}");
            }
            DownloadEvent::JobCompleted { .. } => {
                println!("done");
                break;
            }
            DownloadEvent::Aborted => {
                println!("aborted");
                return Ok(());
            }
        }
    }

    if failures > 0 {
        bail!("{failures} file(s) could not be downloaded");
    }
    Ok(())
}
