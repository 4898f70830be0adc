//! Built-in Sleep job family
//!
//! Small jobs that sleep for a configurable number of seconds and
//! optionally write a report file. They exist to exercise every lock
//! regime, priority and resume combination in tests and demos.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;

use crate::jobs::{cpu_priority, CronJob, IoPriority, JobMeta, JobRegistry, LockRegime};

async fn run_sleep(kwargs: &BTreeMap<String, String>) -> anyhow::Result<()> {
    let seconds: u64 = match kwargs.get("seconds") {
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid seconds value {value:?}"))?,
        None => 0,
    };
    tokio::time::sleep(Duration::from_secs(seconds)).await;

    if let Some(path) = kwargs.get("path") {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("cannot create report file {path}"))?;
        for (key, value) in kwargs {
            writeln!(file, "{key}={value}")?;
        }
        for (key, value) in std::env::vars() {
            writeln!(file, "{key}={value}")?;
        }
        writeln!(file, "Slept for {seconds} second(s).")?;
        writeln!(file, "Done.")?;
    }
    Ok(())
}

/// Sleeps for `seconds`. No lock, no resume; concurrent calls allowed.
pub struct Sleep;

#[async_trait]
impl CronJob for Sleep {
    fn meta(&self) -> JobMeta {
        JobMeta {
            lock_regime: LockRegime::None,
            can_resume: false,
            ..JobMeta::default()
        }
    }

    fn describe(&self) -> &'static str {
        "Sleeps for a given number of seconds; concurrent calls allowed."
    }

    async fn run(&self, _args: &[String], kwargs: &BTreeMap<String, String>) -> anyhow::Result<()> {
        run_sleep(kwargs).await
    }
}

/// Sleep locked per class: only one instance at a time.
pub struct ClassLockedSleep;

#[async_trait]
impl CronJob for ClassLockedSleep {
    fn meta(&self) -> JobMeta {
        JobMeta {
            lock_regime: LockRegime::Class,
            can_resume: false,
            ..JobMeta::default()
        }
    }

    fn describe(&self) -> &'static str {
        "Sleep with a class-wide lock."
    }

    async fn run(&self, _args: &[String], kwargs: &BTreeMap<String, String>) -> anyhow::Result<()> {
        run_sleep(kwargs).await
    }
}

/// Sleep locked per parameters: concurrent runs allowed only with
/// different arguments.
pub struct ParamsLockedSleep;

#[async_trait]
impl CronJob for ParamsLockedSleep {
    fn meta(&self) -> JobMeta {
        JobMeta {
            lock_regime: LockRegime::Params,
            can_resume: false,
            ..JobMeta::default()
        }
    }

    fn describe(&self) -> &'static str {
        "Sleep with a per-parameters lock."
    }

    async fn run(&self, _args: &[String], kwargs: &BTreeMap<String, String>) -> anyhow::Result<()> {
        run_sleep(kwargs).await
    }
}

/// Params-locked sleep that reports lock hits as silent warnings.
pub struct IgnoreLockErrorsSleep;

#[async_trait]
impl CronJob for IgnoreLockErrorsSleep {
    fn meta(&self) -> JobMeta {
        JobMeta {
            lock_regime: LockRegime::Params,
            lock_ignore_errors: true,
            can_resume: false,
            ..JobMeta::default()
        }
    }

    fn describe(&self) -> &'static str {
        "Sleep with a per-parameters lock, lock hits demoted to warnings."
    }

    async fn run(&self, _args: &[String], kwargs: &BTreeMap<String, String>) -> anyhow::Result<()> {
        run_sleep(kwargs).await
    }
}

/// Sleep that posts a chat notification when done.
pub struct ChatNotifyDoneSleep;

#[async_trait]
impl CronJob for ChatNotifyDoneSleep {
    fn meta(&self) -> JobMeta {
        JobMeta {
            lock_regime: LockRegime::None,
            chat_notify_done: true,
            can_resume: false,
            ..JobMeta::default()
        }
    }

    fn describe(&self) -> &'static str {
        "Sleep that announces completion on the chat sink."
    }

    async fn run(&self, _args: &[String], kwargs: &BTreeMap<String, String>) -> anyhow::Result<()> {
        run_sleep(kwargs).await
    }
}

/// Sleep running at low CPU priority (`nice -n 10`).
pub struct LowCpuSleep;

#[async_trait]
impl CronJob for LowCpuSleep {
    fn meta(&self) -> JobMeta {
        JobMeta {
            lock_regime: LockRegime::None,
            worker_cpu_priority: Some(cpu_priority::LOW),
            can_resume: false,
            ..JobMeta::default()
        }
    }

    fn describe(&self) -> &'static str {
        "Sleep at low CPU priority."
    }

    async fn run(&self, _args: &[String], kwargs: &BTreeMap<String, String>) -> anyhow::Result<()> {
        run_sleep(kwargs).await
    }
}

/// Sleep at lowest CPU and IO priority (`nice -n 19 ionice -c 2 -n 7`).
pub struct LowestCpuIoSleep;

#[async_trait]
impl CronJob for LowestCpuIoSleep {
    fn meta(&self) -> JobMeta {
        JobMeta {
            lock_regime: LockRegime::None,
            worker_cpu_priority: Some(cpu_priority::LOWEST),
            worker_io_priority: Some(IoPriority::BEST_EFFORT_LOWEST),
            can_resume: false,
            ..JobMeta::default()
        }
    }

    fn describe(&self) -> &'static str {
        "Sleep at lowest CPU and IO priority."
    }

    async fn run(&self, _args: &[String], kwargs: &BTreeMap<String, String>) -> anyhow::Result<()> {
        run_sleep(kwargs).await
    }
}

/// Sleep at idle IO priority.
pub struct IdleIoSleep;

#[async_trait]
impl CronJob for IdleIoSleep {
    fn meta(&self) -> JobMeta {
        JobMeta {
            lock_regime: LockRegime::None,
            worker_io_priority: Some(IoPriority::IDLE),
            can_resume: false,
            ..JobMeta::default()
        }
    }

    fn describe(&self) -> &'static str {
        "Sleep at idle IO priority."
    }

    async fn run(&self, _args: &[String], kwargs: &BTreeMap<String, String>) -> anyhow::Result<()> {
        run_sleep(kwargs).await
    }
}

/// Class-locked sleep that survives suspension and resumes later.
pub struct PersistentSleep;

#[async_trait]
impl CronJob for PersistentSleep {
    fn meta(&self) -> JobMeta {
        JobMeta {
            lock_regime: LockRegime::Class,
            can_resume: true,
            ..JobMeta::default()
        }
    }

    fn describe(&self) -> &'static str {
        "Sleep with a class lock and resume capability."
    }

    async fn run(&self, _args: &[String], kwargs: &BTreeMap<String, String>) -> anyhow::Result<()> {
        run_sleep(kwargs).await
    }
}

/// Params-locked sleep that survives suspension and resumes later.
pub struct PersistentSleep2;

#[async_trait]
impl CronJob for PersistentSleep2 {
    fn meta(&self) -> JobMeta {
        JobMeta {
            lock_regime: LockRegime::Params,
            can_resume: true,
            ..JobMeta::default()
        }
    }

    fn describe(&self) -> &'static str {
        "Sleep with a per-parameters lock and resume capability."
    }

    async fn run(&self, _args: &[String], kwargs: &BTreeMap<String, String>) -> anyhow::Result<()> {
        run_sleep(kwargs).await
    }
}

/// Registry holding the built-in job family and no crontab entries.
pub fn builtin_registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    register_builtin(&mut registry);
    registry
}

/// Register the built-in jobs into an existing registry.
pub fn register_builtin(registry: &mut JobRegistry) {
    // Registration failures here would mean duplicate built-in names,
    // which is a bug caught by the test below.
    let _ = registry.register("Sleep", Arc::new(Sleep));
    let _ = registry.register("ClassLockedSleep", Arc::new(ClassLockedSleep));
    let _ = registry.register("ParamsLockedSleep", Arc::new(ParamsLockedSleep));
    let _ = registry.register("IgnoreLockErrorsSleep", Arc::new(IgnoreLockErrorsSleep));
    let _ = registry.register("ChatNotifyDoneSleep", Arc::new(ChatNotifyDoneSleep));
    let _ = registry.register("LowCpuSleep", Arc::new(LowCpuSleep));
    let _ = registry.register("LowestCpuIoSleep", Arc::new(LowestCpuIoSleep));
    let _ = registry.register("IdleIoSleep", Arc::new(IdleIoSleep));
    let _ = registry.register("PersistentSleep", Arc::new(PersistentSleep));
    let _ = registry.register("PersistentSleep2", Arc::new(PersistentSleep2));
}
