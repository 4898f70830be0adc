//! Cron job classes
//!
//! A job class couples a callable with the static metadata the worker
//! and spawner need: lock regime, monitoring hooks, process priorities
//! and resume capability.

use std::collections::BTreeMap;

use async_trait::async_trait;

pub mod registry;
pub mod sleep;

pub use registry::JobRegistry;

/// Rule deciding which invocations of a job class may run concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockRegime {
    /// One lock per job class.
    Class,
    /// One lock per job class + hash of call parameters.
    Params,
    /// No lock; concurrent invocations allowed.
    None,
}

impl LockRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockRegime::Class => "class",
            LockRegime::Params => "params",
            LockRegime::None => "none",
        }
    }
}

/// CPU priority presets for worker processes (`nice`).
pub mod cpu_priority {
    pub const LOWEST: i32 = 19;
    pub const LOW: i32 = 10;
    pub const NORMAL: i32 = 0;
    // Higher priorities would need root and are deliberately absent.
}

/// IO priority for worker processes (`ionice`): scheduling class plus
/// optional class data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoPriority {
    pub class: u8,
    pub data: Option<u8>,
}

impl IoPriority {
    /// Receives IO access only when devices are otherwise free.
    pub const IDLE: IoPriority = IoPriority {
        class: 3,
        data: None,
    };
    pub const BEST_EFFORT_LOWEST: IoPriority = IoPriority {
        class: 2,
        data: Some(7),
    };
    pub const BEST_EFFORT_LOW: IoPriority = IoPriority {
        class: 2,
        data: Some(6),
    };
    pub const BEST_EFFORT_NORMAL: IoPriority = IoPriority {
        class: 2,
        data: Some(4),
    };
    pub const BEST_EFFORT_HIGH: IoPriority = IoPriority {
        class: 2,
        data: Some(2),
    };
    pub const BEST_EFFORT_HIGHEST: IoPriority = IoPriority {
        class: 2,
        data: Some(0),
    };
}

/// Static configuration of a job class.
#[derive(Debug, Clone)]
pub struct JobMeta {
    pub lock_regime: LockRegime,
    /// Overrides the registered name in lock filenames.
    pub lock_name: Option<String>,
    /// Lock check retries, spaced one second apart. Always at least 1.
    pub lock_check_attempts: u32,
    /// Report a lock hit as a silent warning instead of a loud one.
    pub lock_ignore_errors: bool,
    /// Heartbeat monitor token; may be overridden per invocation.
    pub heartbeat_id: Option<String>,
    pub heartbeat_ping_run: bool,
    pub heartbeat_ping_fail: bool,
    /// Post a chat message when the job finishes successfully.
    pub chat_notify_done: bool,
    pub worker_cpu_priority: Option<i32>,
    pub worker_io_priority: Option<IoPriority>,
    /// Snapshot the job spec to disk so a kill can be resumed later.
    pub can_resume: bool,
}

impl Default for JobMeta {
    fn default() -> Self {
        Self {
            lock_regime: LockRegime::Class,
            lock_name: None,
            lock_check_attempts: 1,
            lock_ignore_errors: false,
            heartbeat_id: None,
            heartbeat_ping_run: true,
            heartbeat_ping_fail: true,
            chat_notify_done: false,
            worker_cpu_priority: None,
            worker_io_priority: None,
            can_resume: true,
        }
    }
}

/// A registered cron job: metadata plus the job body.
///
/// Implementations are stateless values; one instance serves every
/// invocation of its class.
#[async_trait]
pub trait CronJob: Send + Sync {
    fn meta(&self) -> JobMeta {
        JobMeta::default()
    }

    /// Short human description shown by `worker info`.
    fn describe(&self) -> &'static str {
        ""
    }

    async fn run(&self, args: &[String], kwargs: &BTreeMap<String, String>) -> anyhow::Result<()>;
}
