//! cronherd - distributed cron management
//!
//! A tick-driven scheduler that decides which declared jobs must start,
//! spawns each as an isolated child worker, and supervises worker
//! lifecycles through on-disk state files; a worker runtime that wraps
//! job logic with locking, signal handling and status reporting; and a
//! remote control plane that lets an operator pause, resume or kill
//! schedulers across a fleet via a shared key-value store.

pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod monitor;
pub mod process;
pub mod remote;
pub mod scheduler;
pub mod spawner;
pub mod spec;
pub mod task;
pub mod worker;

pub use config::Settings;
pub use error::{Error, Result};
