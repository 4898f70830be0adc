//! Worker runtime
//!
//! Runs one job invocation end to end: spec parsing, task binding,
//! lock acquisition through the PID file, signal scope, monitoring
//! hooks, the job body itself, and cleanup on every normal exit path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};

use crate::config::{self, Settings};
use crate::error::{Error, Result};
use crate::jobs::registry;
use crate::monitor::Monitor;
use crate::process::ProcessManager;
use crate::spec::{JobSpec, HEARTBEAT_ID_PARAM, TASK_ID_PARAM};
use crate::task::{CronTask, NoTaskStore, TaskStore};
use crate::worker::files::{lock_base_name, PidFile};
use crate::worker::signals::SignalNotifier;

pub mod files;
pub mod fleet;
pub mod info;
pub mod listing;
pub mod signals;

pub use fleet::WorkerFleet;

pub struct WorkerRuntime {
    settings: Settings,
    monitor: Monitor,
    task_store: Arc<dyn TaskStore>,
}

impl WorkerRuntime {
    pub fn new(settings: Settings) -> Self {
        Self::with_task_store(settings, Arc::new(NoTaskStore))
    }

    pub fn with_task_store(settings: Settings, task_store: Arc<dyn TaskStore>) -> Self {
        let monitor = Monitor::new(&settings);
        Self {
            settings,
            monitor,
            task_store,
        }
    }

    /// Execute the job named by `raw_spec`.
    ///
    /// Returns `OK: Processed <spec>` or `FAIL: Processed <spec>`.
    /// Lock hits and invalid task states return their warning message
    /// instead; only unparseable or unregistered specs are an error.
    pub async fn run(&self, raw_spec: &str) -> Result<String> {
        if config::is_process_resumed() {
            info!("worker was respawned by a resume pass");
        }
        let mut spec = JobSpec::parse(raw_spec)?;
        let job = registry::global()
            .get(&spec.name)
            .map_err(|err| Error::InvalidParams(err.to_string()))?;
        let meta = job.meta();

        let heartbeat_id = spec
            .take_kwarg(HEARTBEAT_ID_PARAM)
            .or_else(|| meta.heartbeat_id.clone());
        let task = self.fetch_task(&mut spec).await;

        if let Some(task) = &task {
            if !task.is_pending() {
                if task_killed(task) {
                    info!("starting {raw_spec:?} for killed task {}", task.id);
                } else {
                    let err = Error::InvalidTaskStatus(format!(
                        "unable to start {raw_spec:?}, associated task has invalid status {:?}",
                        task.status.as_str()
                    ));
                    return Ok(self.monitor.warning(&err, false).await);
                }
            }
            self.task_store.mark_queued(task.id).await;
        }

        let lock_name = meta.lock_name.as_deref().unwrap_or(&spec.name);
        let base = lock_base_name(lock_name, meta.lock_regime, &spec.args, &spec.kwargs);
        let pid_file = PidFile::new(&self.settings.data_dir, &base);
        if pid_file_locked(&pid_file, meta.lock_check_attempts).await {
            let err = Error::Locked(format!(
                "unable to start {raw_spec:?}, a similar process is already running \
                 (PID file exists)"
            ));
            return Ok(self.monitor.warning(&err, meta.lock_ignore_errors).await);
        }
        let job_spec_file = meta.can_resume.then(|| pid_file.job_spec_file());

        let signal_scope = SignalNotifier::install(raw_spec, &self.settings)?;

        pid_file.create()?;
        if let Some(file) = &job_spec_file {
            file.create(raw_spec)?;
        }

        let run_start = Utc::now();
        let clock = Instant::now();
        if let Some(task) = &task {
            self.task_store
                .mark_started(task.id, std::process::id(), run_start)
                .await;
        }
        info!("starting {raw_spec:?}...");

        if let (Some(id), true) = (&heartbeat_id, meta.heartbeat_ping_run) {
            self.monitor.heartbeat.run(id).await;
        }

        let outcome = job.run(&spec.args, &spec.kwargs).await;
        let elapsed = clock.elapsed();

        let ok = match outcome {
            Ok(()) => {
                if let Some(id) = &heartbeat_id {
                    self.monitor.heartbeat.complete(id).await;
                }
                if meta.chat_notify_done {
                    self.monitor
                        .chat
                        .post(&format!("Cron job {raw_spec:?} is done."))
                        .await;
                }
                if let Some(task) = &task {
                    self.task_store.mark_finished(task.id, Utc::now()).await;
                }
                info!("processing {raw_spec:?} finished after {elapsed:?}");
                true
            }
            Err(err) => {
                self.monitor.exceptions.capture(raw_spec, &err);
                if let (Some(id), true) = (&heartbeat_id, meta.heartbeat_ping_fail) {
                    self.monitor.heartbeat.fail(id, Some(&err.to_string())).await;
                }
                if self.settings.debug {
                    eprintln!("{err:?}");
                }
                if let Some(task) = &task {
                    self.task_store.mark_failed(task.id).await;
                }
                warn!("processing {raw_spec:?} FAILED after {elapsed:?}");
                false
            }
        };

        // Cleanup in reverse acquisition order; the signal scope is
        // released last, by drop.
        if let Some(file) = &job_spec_file {
            file.delete()?;
        }
        pid_file.delete()?;
        drop(signal_scope);

        Ok(format!(
            "{}: Processed {raw_spec}",
            if ok { "OK" } else { "FAIL" }
        ))
    }

    async fn fetch_task(&self, spec: &mut JobSpec) -> Option<CronTask> {
        let task_id: u64 = spec.take_kwarg(TASK_ID_PARAM)?.parse().ok()?;
        self.task_store.get(task_id).await
    }
}

/// Up to `attempts` lock checks spaced one second apart. Each check is
/// self-healing: PID files of dead owners are deleted on sight.
async fn pid_file_locked(pid_file: &PidFile, attempts: u32) -> bool {
    let mut remaining = attempts.max(1);
    loop {
        remaining -= 1;
        if !pid_file.exists_with_alive_process() {
            return false;
        }
        if remaining == 0 {
            return true;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// A task whose recorded worker died mid-run: status STARTED with a
/// PID no longer alive.
fn task_killed(task: &CronTask) -> bool {
    task.is_started()
        && task
            .pid
            .is_some_and(|pid| ProcessManager::new(Some(pid)).alive() != Some(true))
}
