//! Worker fleet operations
//!
//! Stateless views over the data directory's PID and JobSpec files:
//! listing, two-phase killing, cleaning of dead state and resuming of
//! killed resumable workers. Every operation accepts an optional
//! job-spec-or-PID filter.

use std::path::Path;
use std::time::Duration;

use tracing::warn;

use crate::config::{Settings, ENV_PROCESS_RESUMED};
use crate::error::Result;
use crate::spec::Selector;
use crate::spawner::Spawner;
use crate::worker::files::{JobSpecFile, NameFilter, PidFile};
use crate::worker::listing::format_listing;

pub const NO_PID_FILES_MESSAGE: &str = "No PID file(s) found.";
pub const NO_JOB_SPEC_FILES_MESSAGE: &str = "No JobSpec file(s) found.";

/// Seconds granted to TERMed workers before escalation to SIGKILL.
const WAIT_TO_KILL: Duration = Duration::from_secs(7);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidStatus {
    Alive,
    Dead,
    Termed,
    Killed,
    Deleted,
}

impl PidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PidStatus::Alive => "ALIVE",
            PidStatus::Dead => "DEAD",
            PidStatus::Termed => "TERMED",
            PidStatus::Killed => "KILLED",
            PidStatus::Deleted => "DELETED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSpecStatus {
    Active,
    Stalled,
    Deleted,
    Resumed,
}

impl JobSpecStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobSpecStatus::Active => "ACTIVE",
            JobSpecStatus::Stalled => "STALLED",
            JobSpecStatus::Deleted => "DELETED",
            JobSpecStatus::Resumed => "RESUMED",
        }
    }
}

fn name_filter(selector: Option<&Selector>) -> Option<NameFilter> {
    match selector {
        Some(Selector::Spec(spec)) => Some(NameFilter {
            name: spec.name.clone(),
            args: spec.args.clone(),
            kwargs: spec.kwargs.clone(),
        }),
        _ => None,
    }
}

/// PID files matching a selector, sorted by base name.
fn pid_files(data_dir: &Path, selector: Option<&Selector>) -> Vec<PidFile> {
    let mut files = match selector {
        Some(Selector::Pid(pid)) => PidFile::by_pid(data_dir, *pid).into_iter().collect(),
        other => PidFile::all(data_dir, name_filter(other).as_ref()),
    };
    files.sort_by(|a, b| a.base().cmp(b.base()));
    files
}

/// JobSpec files matching a selector, sorted by base name.
fn job_spec_files(data_dir: &Path, selector: Option<&Selector>) -> Vec<JobSpecFile> {
    let mut files = match selector {
        Some(Selector::Pid(pid)) => JobSpecFile::by_pid(data_dir, *pid).into_iter().collect(),
        other => JobSpecFile::all(data_dir, name_filter(other).as_ref()),
    };
    files.sort_by(|a, b| a.base().cmp(b.base()));
    files
}

struct PidItem {
    file: PidFile,
    status: PidStatus,
}

/// Live PID rows; entries whose process cannot be inspected (access
/// denied) are skipped with a warning.
fn iter_pid_items(files: Vec<PidFile>) -> Vec<PidItem> {
    let mut items = Vec::new();
    for file in files {
        match file.process().exists() {
            None => {
                warn!(
                    "PidAccess: {} no access to PID {:?}",
                    file.base(),
                    file.pid()
                );
            }
            Some(true) => items.push(PidItem {
                file,
                status: PidStatus::Alive,
            }),
            Some(false) => items.push(PidItem {
                file,
                status: PidStatus::Dead,
            }),
        }
    }
    items
}

struct JobSpecItem {
    file: JobSpecFile,
    status: JobSpecStatus,
}

fn iter_job_spec_items(files: Vec<JobSpecFile>) -> Vec<JobSpecItem> {
    let mut items = Vec::new();
    for file in files {
        let pid_file = file.pid_file();
        let status = if pid_file.exists() {
            match pid_file.process().exists() {
                None => {
                    warn!(
                        "PidAccess: {} no access to PID {:?}",
                        pid_file.base(),
                        pid_file.pid()
                    );
                    continue;
                }
                Some(true) => JobSpecStatus::Active,
                Some(false) => JobSpecStatus::Stalled,
            }
        } else {
            JobSpecStatus::Stalled
        };
        items.push(JobSpecItem { file, status });
    }
    items
}

fn pid_row(item: &PidItem) -> Vec<String> {
    vec![
        item.file.base().to_string(),
        item.status.as_str().to_string(),
        item.file
            .pid()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string()),
    ]
}

fn job_spec_row(item: &JobSpecItem) -> Vec<String> {
    vec![
        item.file.base().to_string(),
        item.status.as_str().to_string(),
        item.file.job_spec().unwrap_or_else(|| "-".to_string()),
    ]
}

/// All workers on this host, viewed through the file store.
pub struct WorkerFleet {
    settings: Settings,
}

impl WorkerFleet {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Status listing of worker PID files, with ALIVE/DEAD totals.
    pub fn status(&self, selector: Option<&Selector>) -> String {
        let items = iter_pid_items(pid_files(&self.settings.data_dir, selector));
        let rows: Vec<_> = items.iter().map(pid_row).collect();
        let alive = items
            .iter()
            .filter(|i| i.status == PidStatus::Alive)
            .count();
        let dead = items.len() - alive;
        format_listing(
            Some("STATUS:"),
            &rows,
            Some(&[("TOTAL", items.len()), ("ALIVE", alive), ("DEAD", dead)]),
            NO_PID_FILES_MESSAGE,
        )
    }

    /// Two-phase kill: SIGTERM every live target, then after a single
    /// grace sleep SIGKILL whatever is still alive. The one sleep
    /// covers the whole batch; most TERMed workers quit during it.
    pub async fn kill(&self, selector: Option<&Selector>) -> String {
        let mut items = iter_pid_items(pid_files(&self.settings.data_dir, selector));

        let mut any_termed = false;
        for item in &mut items {
            if item.status == PidStatus::Alive {
                let _ = item.file.process().terminate();
                item.status = PidStatus::Termed;
                any_termed = true;
            }
        }

        if any_termed {
            let mut wait = true;
            for item in &mut items {
                if item.status != PidStatus::Termed || item.file.process().alive() != Some(true) {
                    continue;
                }
                if wait {
                    tokio::time::sleep(WAIT_TO_KILL).await;
                    wait = false;
                    // The process may have finished while we slept.
                    if item.file.process().alive() != Some(true) {
                        continue;
                    }
                }
                let _ = item.file.process().kill();
                item.status = PidStatus::Killed;
            }
        }

        let rows: Vec<_> = items.iter().map(pid_row).collect();
        let count = |status: PidStatus| items.iter().filter(|i| i.status == status).count();
        format_listing(
            Some("KILL:"),
            &rows,
            Some(&[
                ("TOTAL", items.len()),
                ("DEAD", count(PidStatus::Dead)),
                ("TERMED", count(PidStatus::Termed)),
                ("KILLED", count(PidStatus::Killed)),
            ]),
            NO_PID_FILES_MESSAGE,
        )
    }

    /// Delete PID files of dead processes.
    pub fn clean_pid_files(&self) -> Result<String> {
        let mut rows = Vec::new();
        for mut item in iter_pid_items(pid_files(&self.settings.data_dir, None)) {
            if item.status == PidStatus::Dead {
                item.file.delete()?;
                item.status = PidStatus::Deleted;
                rows.push(pid_row(&item));
            }
        }
        let total = rows.len();
        Ok(format_listing(
            Some("CLEAN PID FILES:"),
            &rows,
            Some(&[("TOTAL", total)]),
            NO_PID_FILES_MESSAGE,
        ))
    }

    /// Delete JobSpec files whose worker is gone (stalled).
    pub fn clean_job_spec_files(&self) -> Result<String> {
        let mut rows = Vec::new();
        for mut item in iter_job_spec_items(job_spec_files(&self.settings.data_dir, None)) {
            if item.status == JobSpecStatus::Stalled {
                item.file.delete()?;
                item.status = JobSpecStatus::Deleted;
                rows.push(job_spec_row(&item));
            }
        }
        let total = rows.len();
        Ok(format_listing(
            Some("CLEAN JOBSPEC FILES:"),
            &rows,
            Some(&[("TOTAL", total)]),
            NO_JOB_SPEC_FILES_MESSAGE,
        ))
    }

    /// Remove all dead PID files and stalled JobSpec files.
    pub fn clean(&self) -> Result<String> {
        Ok(format!(
            "{}{}",
            self.clean_pid_files()?,
            self.clean_job_spec_files()?
        ))
    }

    /// Administrative stop: clean dead state, then kill every worker.
    pub async fn suspend(&self) -> Result<String> {
        Ok(format!("{}{}", self.clean()?, self.kill(None).await))
    }

    /// Respawn a worker for every stalled JobSpec file. The file is
    /// deleted before the spawn so a retry cannot double-start it.
    pub async fn resume(&self, selector: Option<&Selector>) -> Result<String> {
        let mut spawner = Spawner::with_extra_env(
            self.settings.clone(),
            vec![(ENV_PROCESS_RESUMED.to_string(), "1".to_string())],
        );
        let mut rows = Vec::new();
        for mut item in iter_job_spec_items(job_spec_files(&self.settings.data_dir, selector)) {
            if item.status != JobSpecStatus::Stalled {
                continue;
            }
            let row_spec = item.file.job_spec().unwrap_or_else(|| "-".to_string());
            let Some(spec) = item.file.take_spec()? else {
                continue;
            };
            match spawner.start_worker(&spec).await {
                Ok(Some(_pid)) => {
                    item.status = JobSpecStatus::Resumed;
                    rows.push(vec![
                        item.file.base().to_string(),
                        item.status.as_str().to_string(),
                        row_spec,
                    ]);
                }
                Ok(None) => {}
                Err(err) => warn!(%err, %spec, "resume spawn failed"),
            }
        }
        let total = rows.len();
        Ok(format_listing(
            Some("RESUME:"),
            &rows,
            Some(&[("TOTAL", total)]),
            NO_JOB_SPEC_FILES_MESSAGE,
        ))
    }
}

#[cfg(test)]
#[path = "fleet_tests.rs"]
mod tests;
