//! Per-job supervision of the downloader process.
//!
//! A run resolves its external resources, launches the downloader, relays
//! progress, and finishes with exactly one terminal event: `complete` after
//! a successful registration, or `error` for every failure path. Cancelled
//! runs end silently.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, trace, warn};

use super::args::{ArgsContext, build_args};
use super::classify::{ErrorKind, classify};
use super::resolver::{CookieResolver, TranscoderResolver};
use super::utils::{ProcessOutcome, ProcessRunner, parse_progress};
use crate::Error;
use crate::config::{LibraryPaths, SettingsSource};
use crate::domain::{HistoryEntry, Job};
use crate::events::EventSink;
use crate::library::LibraryStore;
use crate::pipeline::PostProcessor;
use crate::scheduler::{JobContext, JobRunner, ProcessHandle};
use crate::utils::fs::ensure_dir_all_with_op;

/// Collaborators of the supervisor.
pub struct SupervisorDeps {
    pub store: Arc<dyn LibraryStore>,
    pub sink: Arc<dyn EventSink>,
    pub settings: Arc<dyn SettingsSource>,
    pub transcoder: Arc<dyn TranscoderResolver>,
    pub cookies: Arc<dyn CookieResolver>,
    pub paths: LibraryPaths,
    /// Downloader binary, a name on `PATH` or a full path.
    pub downloader: String,
    pub stall_timeout: Duration,
}

/// Runs jobs through the external downloader and the post-processing pipeline.
pub struct Supervisor {
    store: Arc<dyn LibraryStore>,
    sink: Arc<dyn EventSink>,
    settings: Arc<dyn SettingsSource>,
    transcoder: Arc<dyn TranscoderResolver>,
    cookies: Arc<dyn CookieResolver>,
    pipeline: PostProcessor,
    downloader: String,
    stall_timeout: Duration,
}

impl Supervisor {
    pub fn new(deps: SupervisorDeps) -> Self {
        Self {
            pipeline: PostProcessor::new(deps.store.clone(), deps.paths),
            store: deps.store,
            sink: deps.sink,
            settings: deps.settings,
            transcoder: deps.transcoder,
            cookies: deps.cookies,
            downloader: deps.downloader,
            stall_timeout: deps.stall_timeout,
        }
    }

    async fn supervise(&self, job: Job, ctx: JobContext) {
        let job_id = job.id().to_string();
        let token = ctx.token().clone();
        let paths = self.pipeline.paths();
        let mut log = String::new();

        if let Err(e) = ensure_dir_all_with_op("creating media directory", &paths.media_dir).await
        {
            push_log(&mut log, &e.report());
            self.fail(job, ErrorKind::LaunchFailed, e.to_string(), log)
                .await;
            return;
        }

        let settings = self.settings.snapshot();
        let transcoder = self.transcoder.resolve().await;
        if transcoder.is_none() {
            warn!(job_id = %job_id, "FFmpeg not found, falling back to pre-muxed formats");
            push_log(
                &mut log,
                "[vaultdl] FFmpeg not found; downloading a single pre-muxed stream without conversion",
            );
        }
        let cookie_browser = self.cookies.resolve(settings.cookie_browser.as_deref());

        let args = build_args(
            &job,
            &ArgsContext {
                settings: &settings,
                media_dir: &paths.media_dir,
                transcoder: transcoder.as_deref(),
                cookie_browser: cookie_browser.as_deref(),
            },
        );
        debug!(job_id = %job_id, program = %self.downloader, ?args, "Launching downloader");

        if token.is_cancelled() {
            debug!(job_id = %job_id, "Cancelled before launch");
            return;
        }

        let runner = ProcessRunner::new(&self.downloader, args, self.stall_timeout);
        let process = match runner.spawn() {
            Ok(process) => process,
            Err(source) => {
                let err = Error::Launch {
                    program: runner.program().to_string(),
                    source,
                };
                push_log(&mut log, &err.report());
                self.fail(job, ErrorKind::LaunchFailed, err.to_string(), log)
                    .await;
                return;
            }
        };
        if !ctx.attach(ProcessHandle::new(token.clone(), process.pid())) {
            debug!(job_id = %job_id, "Slot released before the process handle was attached");
        }
        info!(job_id = %job_id, pid = ?process.pid(), "Download started");

        let sink = self.sink.clone();
        let report = process
            .wait(&token, |line| match parse_progress(&line.text) {
                Some(progress) => sink.progress(&job_id, progress),
                None => trace!(job_id = %job_id, stream = ?line.stream, "{}", line.text),
            })
            .await;
        push_log(&mut log, &report.log);

        match report.outcome {
            ProcessOutcome::Cancelled => {
                info!(job_id = %job_id, "Download cancelled");
            }
            ProcessOutcome::Stalled => {
                let message = ErrorKind::Stalled
                    .message()
                    .unwrap_or_default()
                    .to_string();
                self.fail(job, ErrorKind::Stalled, message, log).await;
            }
            ProcessOutcome::Exited { code } if !report.outcome.is_success() => {
                let classified = classify(&report.stderr);
                debug!(job_id = %job_id, ?code, kind = ?classified.kind, "Downloader failed");
                self.fail(job, classified.kind, classified.message, log)
                    .await;
            }
            ProcessOutcome::Exited { .. } => {
                if token.is_cancelled() {
                    info!(job_id = %job_id, "Cancelled after download, skipping registration");
                    return;
                }
                match self
                    .pipeline
                    .process(&job, &settings.subtitle_langs, &mut log)
                    .await
                {
                    Ok(record) => {
                        info!(job_id = %job_id, file = %record.file_path, "Download complete");
                        self.sink.complete(&job_id, record, log);
                    }
                    Err(e) => {
                        push_log(&mut log, &format!("[pipeline] {}", e.report()));
                        self.fail(
                            job,
                            ErrorKind::PostProcessing,
                            format!("Post-processing failed: {e}"),
                            log,
                        )
                        .await;
                    }
                }
            }
        }
    }

    /// Record a failed history entry (best-effort) and emit the error event.
    async fn fail(&self, job: Job, kind: ErrorKind, message: String, log: String) {
        warn!(job_id = %job.id(), ?kind, %message, "Download failed");

        let video = &job.video_info;
        let entry = HistoryEntry::failed(
            video.url.clone(),
            video.title.clone(),
            job.download_type,
            video.thumbnail.clone(),
            message.clone(),
        );
        if let Err(e) = self.store.add_history_entry(&entry).await {
            warn!(job_id = %job.id(), error = %e, "Failed to record history entry");
        }

        let job_id = job.id().to_string();
        self.sink.error(&job_id, kind, message, log, job);
    }
}

#[async_trait]
impl JobRunner for Supervisor {
    async fn run(&self, job: Job, ctx: JobContext) {
        self.supervise(job, ctx).await;
    }
}

fn push_log(log: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !log.is_empty() {
        log.push('\n');
    }
    log.push_str(text);
}
