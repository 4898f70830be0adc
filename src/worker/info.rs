//! Job class listings for the `worker info` command.

use crate::error::Result;
use crate::jobs::registry;
use crate::worker::listing::{format_listing, format_vertical};

pub const NO_CRON_JOBS_MESSAGE: &str = "No cron job(s) found.";

/// Summary of all registered job classes, or detail for one of them.
pub fn info(name: Option<&str>) -> Result<String> {
    let reg = registry::global();
    match name {
        Some(name) => {
            let job = reg.get(name)?;
            let meta = job.meta();
            let mut fields = vec![
                ("name", name.to_string()),
                ("lock_regime", meta.lock_regime.as_str().to_string()),
                ("lock_check_attempts", meta.lock_check_attempts.to_string()),
                ("can_resume", meta.can_resume.to_string()),
            ];
            if let Some(lock_name) = &meta.lock_name {
                fields.push(("lock_name", lock_name.clone()));
            }
            if let Some(heartbeat_id) = &meta.heartbeat_id {
                fields.push(("heartbeat_id", heartbeat_id.clone()));
            }
            if let Some(priority) = meta.worker_cpu_priority {
                fields.push(("worker_cpu_priority", priority.to_string()));
            }
            if let Some(priority) = meta.worker_io_priority {
                fields.push((
                    "worker_io_priority",
                    match priority.data {
                        Some(data) => format!("class {} data {}", priority.class, data),
                        None => format!("class {}", priority.class),
                    },
                ));
            }
            let description = job.describe();
            if !description.is_empty() {
                fields.push(("description", description.to_string()));
            }
            Ok(format_vertical(&fields))
        }
        None => {
            let mut names: Vec<&String> = reg.names().iter().collect();
            names.sort();
            let rows: Vec<Vec<String>> = names
                .iter()
                .map(|name| {
                    let meta = reg
                        .get(name)
                        .map(|job| job.meta())
                        .unwrap_or_default();
                    vec![
                        name.to_string(),
                        meta.lock_regime.as_str().to_string(),
                        if meta.can_resume {
                            "resumable".to_string()
                        } else {
                            "-".to_string()
                        },
                    ]
                })
                .collect();
            let total = rows.len();
            Ok(format_listing(
                None,
                &rows,
                Some(&[("TOTAL", total)]),
                NO_CRON_JOBS_MESSAGE,
            ))
        }
    }
}
