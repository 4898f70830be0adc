//! CLI argument structures

use clap::{Parser, Subcommand};

/// Distributed cron management: scheduler, workers, remote control
#[derive(Parser)]
#[command(name = "cronherd")]
#[command(about = "cronherd - distributed cron scheduler and worker fleet", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scheduler tick and lock management
    Scheduler {
        #[command(subcommand)]
        action: SchedulerAction,
    },

    /// Run and manage worker processes on this host
    Worker {
        #[command(subcommand)]
        action: WorkerAction,
    },

    /// Control remote schedulers through the shared store
    Remote {
        /// One of: disable, enable, get_status, clear_status, kill:<spec>
        method: String,

        /// Target host name(s)
        #[arg(required = true)]
        hosts: Vec<String>,

        /// Sleep one full scheduler tick so the effect can be observed
        #[arg(long)]
        wait: bool,
    },
}

#[derive(Subcommand)]
pub enum SchedulerAction {
    /// Run one scheduler tick
    Run,

    /// Create the scheduler lock file so future ticks do nothing
    Disable {
        /// Also kill all running workers on this host
        #[arg(long)]
        workers: bool,
    },

    /// Remove the scheduler lock file
    Enable {
        /// Also resume killed workers at the next tick
        #[arg(long)]
        workers: bool,
    },
}

#[derive(Subcommand)]
pub enum WorkerAction {
    /// Run a single job given its job spec
    Run { spec: String },

    /// List worker processes, optionally filtered by job spec or PID
    Status { filter: Option<String> },

    /// Kill worker processes, optionally filtered by job spec or PID
    Kill { filter: Option<String> },

    /// Remove dead PID files and stalled JobSpec files
    Clean,

    /// Clean, then kill all running workers
    Suspend,

    /// Respawn killed resumable workers
    Resume { filter: Option<String> },

    /// List registered job classes, or show one class in detail
    Info { name: Option<String> },
}
