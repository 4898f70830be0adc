//! Command execution layer
//!
//! Routes parsed CLI commands to the scheduler, worker and remote
//! control components and prints their output. Refusals (lock hits,
//! already-disabled warnings) come back as printable messages and exit
//! zero; real failures propagate as errors after being reported to the
//! exception sink.

pub mod args;

use std::time::Duration;

use anyhow::Context;

pub use args::{Cli, Commands, SchedulerAction, WorkerAction};

use crate::config::Settings;
use crate::error::Error;
use crate::monitor::ExceptionSink;
use crate::remote::RemoteControl;
use crate::scheduler::{Scheduler, DEFAULT_INTERVAL_MINUTES};
use crate::spec::Selector;
use crate::worker::{info, WorkerFleet, WorkerRuntime};

pub async fn execute_command(command: Commands) -> anyhow::Result<()> {
    let settings = Settings::from_env();
    settings
        .ensure_data_dir()
        .with_context(|| format!("cannot create data directory {:?}", settings.data_dir))?;

    let result = dispatch(command, &settings).await;
    match result {
        Ok(output) => {
            print!("{output}");
            Ok(())
        }
        Err(err) => {
            // Top-level failures go to the exception sink, then
            // propagate so the exit code reflects them.
            ExceptionSink::new(&settings).capture("cronherd", &err);
            Err(err.into())
        }
    }
}

async fn dispatch(command: Commands, settings: &Settings) -> Result<String, Error> {
    match command {
        Commands::Scheduler { action } => {
            let scheduler = Scheduler::new(settings.clone());
            match action {
                SchedulerAction::Run => scheduler.run().await,
                SchedulerAction::Disable { workers } => scheduler.disable(workers).await,
                SchedulerAction::Enable { workers } => scheduler.enable(workers).await,
            }
        }
        Commands::Worker { action } => {
            let fleet = WorkerFleet::new(settings.clone());
            match action {
                WorkerAction::Run { spec } => {
                    WorkerRuntime::new(settings.clone()).run(&spec).await
                }
                WorkerAction::Status { filter } => {
                    Ok(fleet.status(parse_filter(filter)?.as_ref()))
                }
                WorkerAction::Kill { filter } => Ok(fleet.kill(parse_filter(filter)?.as_ref()).await),
                WorkerAction::Clean => fleet.clean(),
                WorkerAction::Suspend => fleet.suspend().await,
                WorkerAction::Resume { filter } => fleet.resume(parse_filter(filter)?.as_ref()).await,
                WorkerAction::Info { name } => info::info(name.as_deref()),
            }
        }
        Commands::Remote {
            method,
            hosts,
            wait,
        } => remote_command(settings, &method, &hosts, wait).await,
    }
}

fn parse_filter(filter: Option<String>) -> Result<Option<Selector>, Error> {
    filter.as_deref().map(Selector::parse).transpose()
}

async fn remote_command(
    settings: &Settings,
    method: &str,
    hosts: &[String],
    wait: bool,
) -> Result<String, Error> {
    let remote = RemoteControl::new(settings);
    let mut results = Vec::new();
    for host in hosts {
        let outcome = match method.split_once(':') {
            Some(("kill", job_spec)) => render_ack(remote.kill(job_spec, Some(host)).await),
            None => match method {
                "disable" => render_ack(remote.disable(Some(host)).await),
                "enable" => render_ack(remote.enable(Some(host)).await),
                "get_status" => match remote.get_status(Some(host)).await {
                    Some(status) => status.as_str().to_string(),
                    None => "None".to_string(),
                },
                "clear_status" => render_ack(remote.clear_status(Some(host)).await),
                other => {
                    return Err(Error::InvalidParams(format!(
                        "remote method {other:?} is not allowed"
                    )))
                }
            },
            Some((other, _)) => {
                return Err(Error::InvalidParams(format!(
                    "remote method {other:?} is not allowed"
                )))
            }
        };
        results.push(format!("{method} {host} -> {outcome}"));
    }
    if wait {
        tokio::time::sleep(Duration::from_secs(DEFAULT_INTERVAL_MINUTES as u64 * 60)).await;
    }
    Ok(results.join("\n") + "\n")
}

fn render_ack(result: Option<()>) -> String {
    match result {
        Some(()) => "OK".to_string(),
        None => "None".to_string(),
    }
}
