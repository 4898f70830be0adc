//! Remote control plane
//!
//! A non-authoritative request channel in a shared Redis store, polled
//! by each scheduler tick. Every call is advisory: when the store is
//! disabled in configuration or unreachable, calls log a warning and
//! return `None`, never an error.

use redis::AsyncCommands;
use tracing::{info, warn};

use crate::config::Settings;
use crate::monitor::host_name;

pub const STATUS_KEY_PREFIX: &str = "cron_scheduler:status";
pub const KILL_KEY_PREFIX: &str = "cron_scheduler:kill";

/// Host name under which a fleet-wide pinned status is stored.
pub const ALL_HOSTS: &str = "ALL";

/// Kill requests drained per tick.
pub const MAX_KILLS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    Enabled,
    Disabled,
}

impl SchedulerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerStatus::Enabled => "enabled",
            SchedulerStatus::Disabled => "disabled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "enabled" => Some(SchedulerStatus::Enabled),
            "disabled" => Some(SchedulerStatus::Disabled),
            _ => None,
        }
    }
}

pub struct RemoteControl {
    enabled: bool,
    redis_url: String,
    host_name: String,
}

impl RemoteControl {
    pub fn new(settings: &Settings) -> Self {
        Self::for_host(settings, &host_name())
    }

    pub fn for_host(settings: &Settings, host_name: &str) -> Self {
        Self {
            enabled: settings.remote_enabled,
            redis_url: settings.redis_url.clone(),
            host_name: host_name.to_string(),
        }
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    async fn connection(&self) -> Option<redis::aio::MultiplexedConnection> {
        let client = match redis::Client::open(self.redis_url.as_str()) {
            Ok(client) => client,
            Err(err) => {
                warn!(%err, "remote manager: cannot build Redis client");
                return None;
            }
        };
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => Some(conn),
            Err(err) => {
                warn!(%err, "remote manager: Redis connection failed");
                None
            }
        }
    }

    /// First half of the advisory adapter: bail out quietly when the
    /// channel is disabled or unreachable.
    async fn guard(&self, description: &str) -> Option<redis::aio::MultiplexedConnection> {
        if !self.enabled {
            warn!("remote manager: {description} CANCELLED: disabled in configuration");
            return None;
        }
        self.connection().await
    }

    /// Second half: map command outcome to `Option`, logging either way.
    fn finish<T>(&self, description: &str, result: redis::RedisResult<T>) -> Option<T> {
        match result {
            Ok(value) => {
                info!("remote manager: {description} OK");
                Some(value)
            }
            Err(err) => {
                warn!("remote manager: {description} FAILED: {err}");
                None
            }
        }
    }

    // Store primitives:

    pub async fn set(&self, key: &str, value: &str) -> Option<()> {
        let description = format!("SET {key}={value}");
        let mut conn = self.guard(&description).await?;
        self.finish(&description, conn.set(key, value).await)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let description = format!("GET {key}");
        let mut conn = self.guard(&description).await?;
        self.finish::<Option<String>>(&description, conn.get(key).await)
            .flatten()
    }

    pub async fn delete(&self, key: &str) -> Option<()> {
        let description = format!("DEL {key}");
        let mut conn = self.guard(&description).await?;
        self.finish(&description, conn.del(key).await)
    }

    pub async fn rpush(&self, key: &str, value: &str) -> Option<()> {
        let description = format!("RPUSH {key} {value}");
        let mut conn = self.guard(&description).await?;
        self.finish(&description, conn.rpush(key, value).await)
    }

    pub async fn lpop(&self, key: &str) -> Option<String> {
        let description = format!("LPOP {key}");
        let mut conn = self.guard(&description).await?;
        self.finish::<Option<String>>(&description, conn.lpop(key, None).await)
            .flatten()
    }

    // Keys:

    fn status_key(&self, host_name: Option<&str>) -> String {
        format!(
            "{STATUS_KEY_PREFIX}:{}",
            host_name.unwrap_or(&self.host_name)
        )
    }

    fn kill_key(&self, host_name: Option<&str>) -> String {
        format!("{KILL_KEY_PREFIX}:{}", host_name.unwrap_or(&self.host_name))
    }

    // Status operations:

    pub async fn set_status(&self, status: SchedulerStatus, host_name: Option<&str>) -> Option<()> {
        self.set(&self.status_key(host_name), status.as_str()).await
    }

    pub async fn get_status(&self, host_name: Option<&str>) -> Option<SchedulerStatus> {
        self.get(&self.status_key(host_name))
            .await
            .as_deref()
            .and_then(SchedulerStatus::parse)
    }

    pub async fn clear_status(&self, host_name: Option<&str>) -> Option<()> {
        self.delete(&self.status_key(host_name)).await
    }

    /// Retrieve and consume the status key.
    pub async fn pop_status(&self, host_name: Option<&str>) -> Option<SchedulerStatus> {
        let status = self.get_status(host_name).await?;
        self.clear_status(host_name).await;
        Some(status)
    }

    // Kill list operations:

    /// Ask the scheduler on `host_name` to kill a job spec or PID.
    pub async fn kill(&self, job_spec_or_pid: &str, host_name: Option<&str>) -> Option<()> {
        self.rpush(&self.kill_key(host_name), job_spec_or_pid).await
    }

    /// Drain up to [`MAX_KILLS`] kill requests, stopping at the first
    /// empty pop. Duplicates are collapsed.
    pub async fn pop_killed(&self, host_name: Option<&str>) -> Vec<String> {
        let key = self.kill_key(host_name);
        let mut job_specs = Vec::new();
        for _ in 0..MAX_KILLS {
            match self.lpop(&key).await {
                Some(spec) => {
                    if !job_specs.contains(&spec) {
                        job_specs.push(spec);
                    }
                }
                None => break,
            }
        }
        job_specs
    }

    // Shortcuts:

    /// Ask the scheduler to disable itself and kill running workers.
    pub async fn disable(&self, host_name: Option<&str>) -> Option<()> {
        self.set_status(SchedulerStatus::Disabled, host_name).await
    }

    /// Ask the scheduler to enable itself and resume killed workers.
    pub async fn enable(&self, host_name: Option<&str>) -> Option<()> {
        self.set_status(SchedulerStatus::Enabled, host_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled_remote() -> RemoteControl {
        let mut settings = Settings::from_env();
        settings.remote_enabled = false;
        RemoteControl::for_host(&settings, "worker-01")
    }

    #[test]
    fn status_literals_round_trip() {
        assert_eq!(SchedulerStatus::parse("enabled"), Some(SchedulerStatus::Enabled));
        assert_eq!(SchedulerStatus::parse("disabled"), Some(SchedulerStatus::Disabled));
        assert_eq!(SchedulerStatus::parse("paused"), None);
        assert_eq!(SchedulerStatus::Enabled.as_str(), "enabled");
    }

    #[tokio::test]
    async fn disabled_remote_returns_none_everywhere() {
        let remote = disabled_remote();
        assert_eq!(remote.set("k", "v").await, None);
        assert_eq!(remote.get("k").await, None);
        assert_eq!(remote.delete("k").await, None);
        assert_eq!(remote.get_status(None).await, None);
        assert_eq!(remote.pop_status(None).await, None);
        assert!(remote.pop_killed(None).await.is_empty());
        assert_eq!(remote.disable(Some("other")).await, None);
    }

    #[test]
    fn keys_are_host_scoped() {
        let remote = disabled_remote();
        assert_eq!(remote.status_key(None), "cron_scheduler:status:worker-01");
        assert_eq!(remote.status_key(Some(ALL_HOSTS)), "cron_scheduler:status:ALL");
        assert_eq!(remote.kill_key(Some("db-02")), "cron_scheduler:kill:db-02");
    }
}
