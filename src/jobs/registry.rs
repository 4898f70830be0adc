//! Write-once job registry
//!
//! The registry maps job names to job classes and holds the crontab:
//! the ordered list of `(time expression, job spec)` pairs the
//! scheduler evaluates each tick. It is built during startup and
//! published once; publishing twice is a programming error.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{Error, Result};
use crate::jobs::CronJob;

#[derive(Default)]
pub struct JobRegistry {
    jobs: HashMap<String, Arc<dyn CronJob>>,
    /// Registration order, used by listings.
    names: Vec<String>,
    crontab: Vec<(String, String)>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, job: Arc<dyn CronJob>) -> Result<()> {
        if self.jobs.contains_key(name) {
            return Err(Error::JobAlreadyRegistered(name.to_string()));
        }
        self.jobs.insert(name.to_string(), job);
        self.names.push(name.to_string());
        Ok(())
    }

    /// Add a crontab entry. Entry order is preserved: it breaks ties
    /// between jobs due at the same instant.
    pub fn schedule(&mut self, time_expr: &str, job_spec: &str) {
        self.crontab
            .push((time_expr.to_string(), job_spec.to_string()));
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn CronJob>> {
        self.jobs
            .get(name)
            .cloned()
            .ok_or_else(|| Error::JobNotRegistered(name.to_string()))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn crontab(&self) -> &[(String, String)] {
        &self.crontab
    }
}

static REGISTRY: OnceCell<JobRegistry> = OnceCell::new();

/// Publish the process-global registry. Callable once, at startup.
pub fn publish(registry: JobRegistry) -> Result<()> {
    REGISTRY
        .set(registry)
        .map_err(|_| Error::Config("job registry has already been published".into()))
}

/// The process-global registry. Falls back to the built-in jobs with an
/// empty crontab when nothing was published.
pub fn global() -> &'static JobRegistry {
    REGISTRY.get_or_init(crate::jobs::sleep::builtin_registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::sleep::Sleep;

    #[test]
    fn register_rejects_duplicates() {
        let mut registry = JobRegistry::new();
        registry.register("Sleep", Arc::new(Sleep)).unwrap();
        let err = registry.register("Sleep", Arc::new(Sleep)).unwrap_err();
        assert!(matches!(err, Error::JobAlreadyRegistered(_)));
    }

    #[test]
    fn get_unknown_name_errors() {
        let registry = JobRegistry::new();
        assert!(matches!(
            registry.get("Nope"),
            Err(Error::JobNotRegistered(_))
        ));
    }

    #[test]
    fn crontab_preserves_registration_order() {
        let mut registry = JobRegistry::new();
        registry.schedule("*/2 * * * *", "B:seconds=2");
        registry.schedule("*/2 * * * *", "A:seconds=1");
        let specs: Vec<_> = registry.crontab().iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(specs, ["B:seconds=2", "A:seconds=1"]);
    }
}
