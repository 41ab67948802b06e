//! Push-only events for the UI layer.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, broadcast};

use crate::domain::{Job, MediaRecord};
use crate::downloader::ErrorKind;

/// Incremental progress parsed from downloader output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// 0.0 - 100.0
    pub percent: f64,
    /// Total size as printed by the downloader, e.g. `12.34MiB`.
    pub total_size: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
}

/// Events emitted per job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DownloadEvent {
    #[serde(rename_all = "camelCase")]
    Progress {
        job_id: String,
        progress: ProgressUpdate,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        job_id: String,
        record: Box<MediaRecord>,
        log: String,
    },
    /// Carries the original job so the UI can offer a one-click retry.
    #[serde(rename_all = "camelCase")]
    Error {
        job_id: String,
        kind: ErrorKind,
        message: String,
        log: String,
        job: Box<Job>,
    },
}

impl DownloadEvent {
    pub fn job_id(&self) -> &str {
        match self {
            Self::Progress { job_id, .. }
            | Self::Complete { job_id, .. }
            | Self::Error { job_id, .. } => job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}

/// Fire-and-forget sink for job events.
pub trait EventSink: Send + Sync {
    fn progress(&self, job_id: &str, progress: ProgressUpdate);

    fn complete(&self, job_id: &str, record: MediaRecord, log: String);

    fn error(&self, job_id: &str, kind: ErrorKind, message: String, log: String, job: Job);
}

/// Default channel capacity for job events.
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Event sink fanning out over a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<DownloadEvent>,
}

impl BroadcastEventSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.sender.subscribe()
    }

    fn send(&self, event: DownloadEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BroadcastEventSink {
    fn progress(&self, job_id: &str, progress: ProgressUpdate) {
        self.send(DownloadEvent::Progress {
            job_id: job_id.to_string(),
            progress,
        });
    }

    fn complete(&self, job_id: &str, record: MediaRecord, log: String) {
        self.send(DownloadEvent::Complete {
            job_id: job_id.to_string(),
            record: Box::new(record),
            log,
        });
    }

    fn error(&self, job_id: &str, kind: ErrorKind, message: String, log: String, job: Job) {
        self.send(DownloadEvent::Error {
            job_id: job_id.to_string(),
            kind,
            message,
            log,
            job: Box::new(job),
        });
    }
}

/// Sink decorator that counts terminal events before forwarding them.
///
/// The counts stay exact even when a broadcast subscriber of the inner sink
/// lags and loses events.
pub struct TallyingSink<S> {
    inner: S,
    completed: AtomicUsize,
    failed: AtomicUsize,
    changed: Notify,
}

impl<S: EventSink> TallyingSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            changed: Notify::new(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Jobs that reached a terminal event.
    pub fn finished(&self) -> usize {
        self.completed() + self.failed()
    }

    /// Resolve once at least `total` terminal events have been seen.
    pub async fn wait_for(&self, total: usize) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.finished() >= total {
                return;
            }
            notified.await;
        }
    }
}

impl<S: EventSink> EventSink for TallyingSink<S> {
    fn progress(&self, job_id: &str, progress: ProgressUpdate) {
        self.inner.progress(job_id, progress);
    }

    fn complete(&self, job_id: &str, record: MediaRecord, log: String) {
        self.inner.complete(job_id, record, log);
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    fn error(&self, job_id: &str, kind: ErrorKind, message: String, log: String, job: Job) {
        self.inner.error(job_id, kind, message, log, job);
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VideoInfo;

    #[tokio::test]
    async fn test_error_event_carries_job() {
        let sink = BroadcastEventSink::new();
        let mut rx = sink.subscribe();
        let job = Job::video(VideoInfo {
            id: "abc".to_string(),
            title: "t".to_string(),
            uploader: None,
            url: "https://example.com/abc".to_string(),
            thumbnail: None,
            duration: None,
        });

        sink.error(
            "abc",
            ErrorKind::PrivateVideo,
            "This video is private.".to_string(),
            "ERROR: Private video".to_string(),
            job.clone(),
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.job_id(), "abc");
        assert!(event.is_terminal());
        match event {
            DownloadEvent::Error { job: carried, kind, .. } => {
                assert_eq!(*carried, job);
                assert_eq!(kind, ErrorKind::PrivateVideo);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    fn sample_job(id: &str) -> Job {
        Job::video(VideoInfo {
            id: id.to_string(),
            title: "t".to_string(),
            uploader: None,
            url: format!("https://example.com/{id}"),
            thumbnail: None,
            duration: None,
        })
    }

    fn sample_record(id: &str) -> MediaRecord {
        MediaRecord {
            id: id.to_string(),
            title: "t".to_string(),
            uploader: None,
            creator: None,
            description: None,
            duration: None,
            upload_date: None,
            original_url: format!("https://example.com/{id}"),
            file_path: format!("/media/{id}.mp4"),
            cover_path: None,
            subtitle_path: None,
            has_embedded_subs: false,
            media_type: crate::domain::DownloadType::Video,
            downloaded_at: chrono::Utc::now(),
            is_favorite: false,
            source: "example".to_string(),
        }
    }

    #[tokio::test]
    async fn test_tally_survives_lagging_subscriber() {
        let sink = TallyingSink::new(BroadcastEventSink::with_capacity(4));
        let mut rx = sink.inner().subscribe();

        sink.complete("a", sample_record("a"), String::new());
        for _ in 0..50 {
            sink.progress("b", ProgressUpdate::default());
        }
        sink.error(
            "b",
            ErrorKind::Stalled,
            "stalled".to_string(),
            String::new(),
            sample_job("b"),
        );

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert_eq!(sink.completed(), 1);
        assert_eq!(sink.failed(), 1);
        tokio::time::timeout(std::time::Duration::from_secs(1), sink.wait_for(2))
            .await
            .expect("tally reached");
    }

    #[tokio::test]
    async fn test_wait_for_wakes_on_later_events() {
        let sink = std::sync::Arc::new(TallyingSink::new(BroadcastEventSink::new()));
        let waiter = tokio::spawn({
            let sink = sink.clone();
            async move { sink.wait_for(2).await }
        });

        sink.complete("a", sample_record("a"), String::new());
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        sink.complete("b", sample_record("b"), String::new());

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
        assert_eq!(sink.finished(), 2);
    }

    #[test]
    fn test_progress_event_serializes_with_tag() {
        let event = DownloadEvent::Progress {
            job_id: "abc".to_string(),
            progress: ProgressUpdate {
                percent: 12.5,
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "progress");
        assert_eq!(json["jobId"], "abc");
        assert_eq!(json["progress"]["percent"], 12.5);
    }
}
