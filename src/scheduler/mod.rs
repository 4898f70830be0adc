//! Scheduler tick
//!
//! One bounded pass per invocation: poll the remote control plane,
//! honor the lock file, run a pending resume, compute which crontab
//! entries fire inside this tick's window and hand each to the
//! spawner. The scheduler never blocks on a worker.

use std::time::Instant;

use chrono::{DateTime, Duration, Local, Timelike};
use croner::Cron;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::jobs::registry;
use crate::monitor::Monitor;
use crate::remote::{RemoteControl, SchedulerStatus, ALL_HOSTS};
use crate::scheduler::files::MarkerFile;
use crate::spawner::Spawner;
use crate::spec::Selector;
use crate::worker::WorkerFleet;

pub mod files;

/// Minutes between scheduler invocations.
pub const DEFAULT_INTERVAL_MINUTES: i64 = 2;

pub struct Scheduler {
    settings: Settings,
    now: DateTime<Local>,
    interval_minutes: i64,
    crontab: Vec<(String, String)>,
    monitor: Monitor,
    remote: RemoteControl,
    fleet: WorkerFleet,
    lock_file: MarkerFile,
    resume_file: MarkerFile,
}

impl Scheduler {
    pub fn new(settings: Settings) -> Self {
        Self::at(settings, Local::now())
    }

    /// Scheduler evaluating the tick window as of `now`.
    pub fn at(settings: Settings, now: DateTime<Local>) -> Self {
        let monitor = Monitor::new(&settings);
        let remote = RemoteControl::new(&settings);
        let fleet = WorkerFleet::new(settings.clone());
        let lock_file = MarkerFile::lock(&settings.data_dir);
        let resume_file = MarkerFile::resume(&settings.data_dir);
        Self {
            settings,
            now,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            crontab: registry::global().crontab().to_vec(),
            monitor,
            remote,
            fleet,
            lock_file,
            resume_file,
        }
    }

    pub fn with_interval(mut self, minutes: i64) -> Self {
        self.interval_minutes = minutes;
        self
    }

    /// Override the crontab taken from the global registry.
    pub fn with_crontab(mut self, crontab: Vec<(String, String)>) -> Self {
        self.crontab = crontab;
        self
    }

    /// Run one tick.
    pub async fn run(&self) -> Result<String> {
        if self.crontab.is_empty() {
            let err = Error::NoJobs(
                "scheduler has no jobs to start, verify the job registration module".into(),
            );
            self.monitor.warning(&err, false).await;
        }

        for job_spec_or_pid in self.remote.pop_killed(None).await {
            info!("scheduler: processing KILL {job_spec_or_pid:?} request from remote manager...");
            match Selector::parse(&job_spec_or_pid) {
                Ok(selector) => {
                    let kill_output = self.fleet.kill(Some(&selector)).await;
                    info!("{kill_output}");
                }
                Err(err) => warn!(%err, "scheduler: unusable KILL request"),
            }
        }

        // Fleet-wide pinned status wins; the host key is consumed.
        let remote_status = match self.remote.get_status(Some(ALL_HOSTS)).await {
            Some(status) => Some(status),
            None => self.remote.pop_status(None).await,
        };

        if self.lock_file.exists() {
            if remote_status == Some(SchedulerStatus::Enabled) {
                info!("scheduler: processing ENABLE request from remote manager...");
                self.enable(true).await?;
            } else {
                let err = Error::SchedulerLocked(
                    "scheduler is disabled (lock file exists); to enable it again, \
                     run \"scheduler enable\" -- quitting now"
                        .into(),
                );
                return Ok(self.monitor.warning(&err, false).await);
            }
        } else if remote_status == Some(SchedulerStatus::Disabled) {
            info!("scheduler: processing DISABLE request from remote manager...");
            return self.disable(true).await;
        }

        let mut output = String::new();
        if self.resume_file.exists() {
            self.resume_file.delete()?;
            output += &self.fleet.resume(None).await?;
        }

        let clock = Instant::now();
        let jobs = self.due_jobs()?;
        let num_jobs = jobs.len();
        let mut num_started = 0;
        let mut spawner = Spawner::new(self.settings.clone());
        for (i, (time_expr, job_spec)) in jobs.iter().enumerate() {
            info!(
                "starting worker for {time_expr} {job_spec} ({}/{num_jobs})",
                i + 1
            );
            match spawner.start_worker(job_spec).await {
                Ok(Some(_pid)) => num_started += 1,
                Ok(None) => {}
                Err(err) => warn!(%err, %job_spec, "worker spawn failed"),
            }
        }
        if num_started > 0 {
            output += &format!("Started {num_started} job(s) in {:?}\n", clock.elapsed());
        } else {
            output += "No jobs started.\n";
        }
        Ok(output)
    }

    /// Disable the scheduler: future ticks refuse to start workers.
    /// With `workers`, also kill everything currently running.
    pub async fn disable(&self, workers: bool) -> Result<String> {
        if self.lock_file.exists() {
            let err =
                Error::SchedulerLocked("scheduler is already disabled (lock file exists)".into());
            return Ok(self.monitor.warning(&err, false).await);
        }
        self.lock_file.create()?;
        let mut summary = vec!["lock file created"];

        let suspend_output = if workers {
            summary.push("workers suspended");
            self.fleet.suspend().await?
        } else {
            String::new()
        };

        Ok(format!(
            "Scheduler disabled ({}).\n{}",
            summary.join(", "),
            suspend_output
        ))
    }

    /// Enable the scheduler. With `workers`, ask the next tick to
    /// resume killed workers first.
    pub async fn enable(&self, workers: bool) -> Result<String> {
        if !self.lock_file.exists() {
            let err = Error::SchedulerUnlocked(
                "scheduler is already enabled (lock file does not exist)".into(),
            );
            return Ok(self.monitor.warning(&err, false).await);
        }
        let mut summary = Vec::new();
        if workers {
            self.resume_file.create()?;
            summary.push("resume file created");
        }
        self.lock_file.delete()?;
        summary.push("lock file deleted");

        Ok(format!("Scheduler enabled ({}).\n", summary.join(", ")))
    }

    /// Tick window: one second before the current minute boundary,
    /// extended by the tick interval. The one-second backstep keeps
    /// minute-boundary firings inside the window under tick jitter.
    pub fn datetime_range(&self) -> (DateTime<Local>, DateTime<Local>) {
        let floored = self
            .now
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(self.now);
        let start = floored - Duration::seconds(1);
        (start, start + Duration::minutes(self.interval_minutes))
    }

    /// Crontab entries whose next firing after the window start falls
    /// inside the window, ordered by firing time; ties keep crontab
    /// registration order.
    pub fn due_jobs(&self) -> Result<Vec<(String, String)>> {
        let (start, end) = self.datetime_range();
        let mut to_be_started = Vec::new();
        for (index, (time_expr, job_spec)) in self.crontab.iter().enumerate() {
            let cron = Cron::new(time_expr)
                .parse()
                .map_err(|err| Error::CronExpr(format!("{time_expr:?}: {err}")))?;
            let job_start = cron
                .find_next_occurrence(&start, false)
                .map_err(|err| Error::CronExpr(format!("{time_expr:?}: {err}")))?;
            if job_start <= end {
                to_be_started.push((job_start, index, time_expr.clone(), job_spec.clone()));
            }
        }
        to_be_started.sort_by_key(|(job_start, index, _, _)| (*job_start, *index));
        Ok(to_be_started
            .into_iter()
            .map(|(_, _, time_expr, job_spec)| (time_expr, job_spec))
            .collect())
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
