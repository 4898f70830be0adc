use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("InvalidParams: {0}")]
    InvalidParams(String),

    #[error("Locked: {0}")]
    Locked(String),

    #[error("InvalidTaskStatus: {0}")]
    InvalidTaskStatus(String),

    #[error("JobNotRegistered: no cron job registered under name {0:?}")]
    JobNotRegistered(String),

    #[error("JobAlreadyRegistered: cron job {0:?} is already registered")]
    JobAlreadyRegistered(String),

    #[error("PidAccess: {0}")]
    PidAccess(String),

    #[error("SchedulerLocked: {0}")]
    SchedulerLocked(String),

    #[error("SchedulerUnlocked: {0}")]
    SchedulerUnlocked(String),

    #[error("NoJobs: {0}")]
    NoJobs(String),

    #[error("Spawn error: {0}")]
    Spawn(String),

    #[error("Cron expression error: {0}")]
    CronExpr(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
