use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vaultdl::cli::{Args, Commands};
use vaultdl::config::{AppConfig, Settings, SettingsService, SettingsSource};
use vaultdl::domain::Job;
use vaultdl::downloader::{
    BrowserNameResolver, PathTranscoderResolver, Supervisor, SupervisorDeps, TranscoderResolver,
};
use vaultdl::events::{BroadcastEventSink, DownloadEvent, TallyingSink};
use vaultdl::library::{LibraryStore, MemoryLibraryStore, SqliteLibraryStore};
use vaultdl::logging;
use vaultdl::scheduler::{Scheduler, SchedulerDeps};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::from_env()?;

    let (logging_config, _guard) = logging::init_logging(&config.log_dir)?;
    if args.verbose {
        logging_config.set_filter("vaultdl=debug,sqlx=warn")?;
    }
    let shutdown = CancellationToken::new();
    logging_config.start_retention_cleanup(shutdown.clone());

    let result = match args.command {
        Commands::Run {
            jobs,
            settings,
            concurrency,
            memory_store,
            quiet,
        } => {
            let mut loaded = match &settings {
                Some(path) => Settings::load(path).await?,
                None => Settings::default(),
            };
            if let Some(n) = concurrency {
                loaded.concurrent_downloads = n;
            }
            loaded.validate()?;

            let raw = tokio::fs::read_to_string(&jobs)
                .await
                .with_context(|| format!("reading jobs file {}", jobs.display()))?;
            let jobs: Vec<Job> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing jobs file {}", jobs.display()))?;

            run(config, loaded, jobs, memory_store, quiet, shutdown.clone()).await
        }
        Commands::Tools => {
            let transcoder = PathTranscoderResolver::from_env(config.ffmpeg_path.clone())
                .resolve()
                .await;
            let downloader = process_utils::find_executable(&config.downloader_path);
            println!(
                "downloader: {}",
                downloader
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| format!("{} (not found)", config.downloader_path))
            );
            println!(
                "transcoder: {}",
                transcoder
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "not found (degraded formats)".to_string())
            );
            Ok(())
        }
    };

    shutdown.cancel();
    result
}

async fn run(
    config: AppConfig,
    settings: Settings,
    jobs: Vec<Job>,
    memory_store: bool,
    quiet: bool,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let store: Arc<dyn LibraryStore> = if memory_store {
        Arc::new(MemoryLibraryStore::new())
    } else {
        Arc::new(SqliteLibraryStore::connect(&config.database_url).await?)
    };

    let settings_service = Arc::new(SettingsService::new(settings));
    let sink = Arc::new(TallyingSink::new(BroadcastEventSink::new()));
    let mut events = sink.inner().subscribe();

    let supervisor = Supervisor::new(SupervisorDeps {
        store,
        sink: sink.clone(),
        settings: settings_service.clone(),
        transcoder: Arc::new(PathTranscoderResolver::from_env(config.ffmpeg_path.clone())),
        cookies: Arc::new(BrowserNameResolver),
        paths: config.library.clone(),
        downloader: config.downloader_path.clone(),
        stall_timeout: config.stall_timeout,
    });
    let scheduler = Scheduler::new(SchedulerDeps {
        runner: Arc::new(supervisor),
        sink: sink.clone(),
        settings: settings_service.snapshot(),
    });
    let listener = scheduler.spawn_settings_listener(settings_service.clone(), shutdown.clone());

    let mut seen = HashSet::new();
    let jobs: Vec<Job> = jobs
        .into_iter()
        .filter(|job| {
            let fresh = seen.insert(job.id().to_string());
            if !fresh {
                warn!(job_id = %job.id(), "Skipping duplicate job");
            }
            fresh
        })
        .collect();
    let total = jobs.len();
    info!(total, "Starting batch");
    scheduler.enqueue(jobs);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    // Completion is decided by the tally, not the broadcast stream, which may lag.
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                warn!("Interrupted, cancelling remaining jobs");
                scheduler.shutdown();
                break;
            }
            _ = sink.wait_for(total) => break,
            event = events.recv() => match event {
                Ok(event) => print_event(&event, quiet)?,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Dropped {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    loop {
        match events.try_recv() {
            Ok(event) => print_event(&event, quiet)?,
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    let (completed, failed) = (sink.completed(), sink.failed());

    shutdown.cancel();
    let _ = listener.await;
    info!(completed, failed, total, "Batch finished");

    if failed > 0 {
        anyhow::bail!("{failed} of {total} jobs failed");
    }
    Ok(())
}

fn print_event(event: &DownloadEvent, quiet: bool) -> anyhow::Result<()> {
    if quiet && matches!(event, DownloadEvent::Progress { .. }) {
        return Ok(());
    }
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}
