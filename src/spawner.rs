//! Worker process spawner
//!
//! Builds the argv and environment for a worker child and launches it
//! detached, with stdout/stderr discarded. CPU/IO niceness wrappers
//! are prepended per job class; an optional exception-sink wrapper
//! swallows the whole command line.

use std::process::Stdio;
use std::time::Duration;

use nix::errno::Errno;
use tracing::{debug, warn};

use crate::config::{self, Settings};
use crate::error::{Error, Result};
use crate::jobs::registry;
use crate::spec::JobSpec;

/// Seconds to wait before retrying a spawn that hit ENOMEM.
pub const WAIT_FOR_MEMORY: Duration = Duration::from_secs(7);

pub struct Spawner {
    settings: Settings,
    extra_env: Vec<(String, String)>,
    /// Sticky: once a spawn ran out of memory, later spawns in this
    /// process do not retry.
    memory_error_occurred: bool,
}

impl Spawner {
    pub fn new(settings: Settings) -> Self {
        Self::with_extra_env(settings, Vec::new())
    }

    pub fn with_extra_env(settings: Settings, extra_env: Vec<(String, String)>) -> Self {
        Self {
            settings,
            extra_env,
            memory_error_occurred: false,
        }
    }

    /// Environment overrides for the child, so workers resolve the
    /// exact configuration the scheduler runs with regardless of how
    /// either process was launched.
    pub fn worker_env(&self) -> Vec<(String, String)> {
        let s = &self.settings;
        let mut env = vec![
            (config::ENV_DATA_DIR.into(), s.data_dir.display().to_string()),
            (config::ENV_DEBUG.into(), bool_env(s.debug)),
            (config::ENV_JOBS_MODULE.into(), s.jobs_module.clone()),
            (
                config::ENV_NICE_CMD.into(),
                s.nice_cmd.clone().unwrap_or_default(),
            ),
            (
                config::ENV_IONICE_CMD.into(),
                s.ionice_cmd.clone().unwrap_or_default(),
            ),
            (config::ENV_HEARTBEAT_URL.into(), s.heartbeat_url.clone()),
            (
                config::ENV_HEARTBEAT_ENABLED.into(),
                bool_env(s.heartbeat_enabled),
            ),
            (config::ENV_CHAT_ENABLED.into(), bool_env(s.chat_enabled)),
            (
                config::ENV_EXCEPTION_CMD.into(),
                s.exception_cmd.clone().unwrap_or_default(),
            ),
        ];
        env.extend(self.extra_env.iter().cloned());
        env
    }

    /// Niceness wrapper arguments for the job class named in the spec.
    /// Each wrapper needs both the class setting and a configured
    /// binary to appear.
    fn priority_args(&self, job_spec: &str) -> Result<Vec<String>> {
        let spec = JobSpec::parse(job_spec)?;
        let meta = registry::global().get(&spec.name)?.meta();
        let mut args = Vec::new();
        if let (Some(nice), Some(priority)) = (&self.settings.nice_cmd, meta.worker_cpu_priority) {
            args.extend([nice.clone(), "-n".into(), priority.to_string()]);
        }
        if let (Some(ionice), Some(priority)) =
            (&self.settings.ionice_cmd, meta.worker_io_priority)
        {
            args.extend([ionice.clone(), "-c".into(), priority.class.to_string()]);
            if let Some(data) = priority.data {
                args.extend(["-n".into(), data.to_string()]);
            }
        }
        Ok(args)
    }

    /// Full argv for the worker child, wrappers included.
    pub fn build_argv(&self, job_spec: &str) -> Result<Vec<String>> {
        let exe = std::env::current_exe()
            .map_err(|err| Error::Spawn(format!("cannot resolve current executable: {err}")))?;
        let mut argv = self.priority_args(job_spec)?;
        argv.extend([
            exe.display().to_string(),
            "worker".into(),
            "run".into(),
            job_spec.to_string(),
        ]);
        if let Some(wrapper) = &self.settings.exception_cmd {
            argv = vec![wrapper.clone(), "-c".into(), shell_words::join(&argv)];
        }
        Ok(argv)
    }

    /// Launch a detached worker for the given job spec. Returns the
    /// child PID, or `None` when memory pressure exhausted the retry.
    pub async fn start_worker(&mut self, job_spec: &str) -> Result<Option<u32>> {
        let argv = self.build_argv(job_spec)?;
        let mut tries = if self.memory_error_occurred { 1 } else { 2 };
        while tries > 0 {
            tries -= 1;
            match self.spawn(&argv) {
                Ok(pid) => return Ok(pid),
                Err(err) if is_enomem(&err) => {
                    self.memory_error_occurred = true;
                    if tries > 0 {
                        debug!(
                            job_spec,
                            "worker spawn hit out-of-memory, retrying in {WAIT_FOR_MEMORY:?}"
                        );
                        tokio::time::sleep(WAIT_FOR_MEMORY).await;
                    } else {
                        warn!(job_spec, "worker spawn failed with out-of-memory, giving up");
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(None)
    }

    fn spawn(&self, argv: &[String]) -> std::io::Result<Option<u32>> {
        let mut command = tokio::process::Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .envs(self.worker_env())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        command.process_group(0);
        let child = command.spawn()?;
        Ok(child.id())
    }
}

fn bool_env(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

fn is_enomem(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(Errno::ENOMEM as i32)
}

#[cfg(test)]
#[path = "spawner_tests.rs"]
mod tests;
