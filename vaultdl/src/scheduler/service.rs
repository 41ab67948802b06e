//! Concurrency-bounded job scheduler.
//!
//! Pending jobs wait in a FIFO queue; admitted jobs occupy a slot in the
//! active map until their runner finishes or they are cancelled. All state
//! sits behind one lock that is never held across an await point or a call
//! into the runner or event sink.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handle::{JobHandle, StartingHandle};
use crate::config::{Settings, SettingsEvent, SettingsSource};
use crate::domain::Job;
use crate::downloader::ErrorKind;
use crate::events::EventSink;
use crate::{Error, Result};

/// Executes admitted jobs.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    /// Synchronous check run at admission. An error fails the job without
    /// occupying a slot.
    fn prepare(&self, job: &Job) -> Result<()> {
        job.validate()
    }

    /// Run the job to completion. Reports its own outcome; never fails.
    async fn run(&self, job: Job, ctx: JobContext);
}

/// Per-job view of the scheduler handed to the runner.
pub struct JobContext {
    job_id: String,
    generation: u64,
    token: CancellationToken,
    inner: Arc<Inner>,
}

impl JobContext {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Cancelled when the job is cancelled or the scheduler shuts down.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Replace the job's placeholder handle. Returns `false` when the slot
    /// no longer belongs to this run (cancelled, or re-admitted since).
    pub fn attach(&self, handle: impl JobHandle + 'static) -> bool {
        let mut state = self.inner.state.lock();
        match state.active.get_mut(&self.job_id) {
            Some(slot) if slot.generation == self.generation => {
                slot.handle = Box::new(handle);
                true
            }
            _ => false,
        }
    }
}

/// Collaborators of the scheduler.
pub struct SchedulerDeps {
    pub runner: Arc<dyn JobRunner>,
    pub sink: Arc<dyn EventSink>,
    pub settings: Settings,
}

struct Slot {
    generation: u64,
    handle: Box<dyn JobHandle>,
}

struct State {
    pending: VecDeque<Job>,
    active: HashMap<String, Slot>,
    settings: Settings,
}

struct Inner {
    state: Mutex<State>,
    runner: Arc<dyn JobRunner>,
    sink: Arc<dyn EventSink>,
    next_generation: AtomicU64,
}

/// Download job scheduler. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(deps: SchedulerDeps) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    pending: VecDeque::new(),
                    active: HashMap::new(),
                    settings: deps.settings,
                }),
                runner: deps.runner,
                sink: deps.sink,
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Append jobs to the queue tail and admit what fits.
    pub fn enqueue(&self, jobs: impl IntoIterator<Item = Job>) {
        {
            let mut state = self.inner.state.lock();
            for job in jobs {
                debug!(job_id = %job.id(), "Job queued");
                state.pending.push_back(job);
            }
        }
        self.attempt_admission();
    }

    /// Put a job at the queue head and admit what fits.
    pub fn retry(&self, job: Job) {
        debug!(job_id = %job.id(), "Job queued for retry");
        self.inner.state.lock().pending.push_front(job);
        self.attempt_admission();
    }

    /// Cancel an active job and free its slot at once.
    ///
    /// Returns `false` when `job_id` is not active. Pending jobs are left
    /// alone; see [`Scheduler::remove_pending`].
    pub fn cancel(&self, job_id: &str) -> bool {
        let slot = self.inner.state.lock().active.remove(job_id);
        let Some(slot) = slot else {
            return false;
        };
        slot.handle.cancel();
        info!(job_id = %job_id, "Job cancelled");
        self.attempt_admission();
        true
    }

    /// Drop a queued job that has not been admitted yet.
    pub fn remove_pending(&self, job_id: &str) -> Option<Job> {
        let mut state = self.inner.state.lock();
        let pos = state.pending.iter().position(|j| j.id() == job_id)?;
        state.pending.remove(pos)
    }

    /// Swap the settings snapshot and re-evaluate admission right away.
    ///
    /// A lower limit never preempts running jobs.
    pub fn update_settings(&self, settings: Settings) {
        {
            let mut state = self.inner.state.lock();
            info!(
                from = state.settings.max_concurrent(),
                to = settings.max_concurrent(),
                "Scheduler settings updated"
            );
            state.settings = settings;
        }
        self.attempt_admission();
    }

    /// Clear the queue and cancel every active job.
    ///
    /// The scheduler stays usable; a later `enqueue` starts fresh.
    pub fn shutdown(&self) {
        let (handles, dropped) = {
            let mut state = self.inner.state.lock();
            let dropped = state.pending.len();
            state.pending.clear();
            let handles: Vec<_> = state.active.drain().map(|(_, slot)| slot.handle).collect();
            (handles, dropped)
        };
        info!(
            cancelled = handles.len(),
            dropped_pending = dropped,
            "Scheduler shut down"
        );
        for handle in handles {
            handle.cancel();
        }
    }

    /// Follow settings changes published by `source` until `token` fires.
    pub fn spawn_settings_listener(
        &self,
        source: Arc<dyn SettingsSource>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let scheduler = self.clone();
        let mut receiver = source.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = receiver.recv() => match event {
                        Ok(SettingsEvent::Updated(settings)) => scheduler.update_settings(settings),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Scheduler lagged {} settings events", n);
                            scheduler.update_settings(source.snapshot());
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Settings event channel closed");
                            break;
                        }
                    },
                }
            }
        })
    }

    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.inner.state.lock().active.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Queued ids in admission order.
    pub fn pending_ids(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .pending
            .iter()
            .map(|j| j.id().to_string())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.inner.state.lock().active.len()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Whether `job_id` is queued or running.
    pub fn is_tracked(&self, job_id: &str) -> bool {
        let state = self.inner.state.lock();
        state.active.contains_key(job_id) || state.pending.iter().any(|j| j.id() == job_id)
    }

    pub fn settings(&self) -> Settings {
        self.inner.state.lock().settings.clone()
    }

    /// Admit pending jobs while slots are free. Safe to call from anywhere.
    fn attempt_admission(&self) {
        loop {
            let admitted = {
                let mut state = self.inner.state.lock();
                if state.active.len() >= state.settings.max_concurrent() {
                    return;
                }
                let Some(job) = state.pending.pop_front() else {
                    return;
                };

                let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                let token = CancellationToken::new();
                let slot = Slot {
                    generation,
                    handle: Box::new(StartingHandle::new(token.clone())),
                };
                if let Some(previous) = state.active.insert(job.id().to_string(), slot) {
                    warn!(job_id = %job.id(), "Job id admitted twice; detaching earlier run");
                    previous.handle.cancel();
                }
                (job, generation, token)
            };

            let (job, generation, token) = admitted;
            if let Err(e) = self.start(&job, generation, token) {
                let job_id = job.id().to_string();
                self.release(&job_id, generation);
                warn!(job_id = %job_id, error = %e, "Job failed to start");
                self.inner.sink.error(
                    &job_id,
                    ErrorKind::LaunchFailed,
                    e.to_string(),
                    e.report(),
                    job,
                );
            }
        }
    }

    fn start(&self, job: &Job, generation: u64, token: CancellationToken) -> Result<()> {
        self.inner.runner.prepare(job)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Other(format!("no async runtime available: {e}")))?;

        let ctx = JobContext {
            job_id: job.id().to_string(),
            generation,
            token,
            inner: self.inner.clone(),
        };
        let guard = CompletionGuard {
            scheduler: self.clone(),
            job_id: job.id().to_string(),
            generation,
        };
        let runner = self.inner.runner.clone();
        let job = job.clone();
        info!(job_id = %guard.job_id, "Job admitted");

        runtime.spawn(async move {
            // Releases the slot even if the runner panics.
            let _guard = guard;
            runner.run(job, ctx).await;
        });
        Ok(())
    }

    /// Remove the slot if it still belongs to `generation`.
    fn release(&self, job_id: &str, generation: u64) -> bool {
        let mut state = self.inner.state.lock();
        match state.active.get(job_id) {
            Some(slot) if slot.generation == generation => {
                state.active.remove(job_id);
                true
            }
            _ => false,
        }
    }

    fn on_finished(&self, job_id: &str, generation: u64) {
        if self.release(job_id, generation) {
            debug!(job_id = %job_id, "Job finished");
        }
        self.attempt_admission();
    }
}

struct CompletionGuard {
    scheduler: Scheduler,
    job_id: String,
    generation: u64,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.scheduler.on_finished(&self.job_id, self.generation);
    }
}
