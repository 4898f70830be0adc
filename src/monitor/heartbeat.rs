//! Heartbeat monitor pings
//!
//! Fire-and-forget HTTP pings to an external heartbeat service at job
//! start, completion and failure. Failures are warnings, never errors.

use std::time::Duration;

use tracing::warn;

use crate::config::Settings;

const PING_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Heartbeat {
    enabled: bool,
    url_template: String,
    client: reqwest::Client,
}

impl Heartbeat {
    pub fn new(settings: &Settings) -> Self {
        Self {
            enabled: settings.heartbeat_enabled,
            url_template: settings.heartbeat_url.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn run(&self, heartbeat_id: &str) {
        self.ping(heartbeat_id, "run", None).await;
    }

    pub async fn complete(&self, heartbeat_id: &str) {
        self.ping(heartbeat_id, "complete", None).await;
    }

    pub async fn fail(&self, heartbeat_id: &str, msg: Option<&str>) {
        self.ping(heartbeat_id, "fail", msg).await;
    }

    async fn ping(&self, heartbeat_id: &str, endpoint: &str, msg: Option<&str>) {
        if !self.enabled {
            warn!("heartbeat ping ignored (disabled in settings)");
            return;
        }
        let url = self
            .url_template
            .replace("{id}", heartbeat_id)
            .replace("{endpoint}", endpoint);
        let mut request = self.client.head(&url).timeout(PING_TIMEOUT);
        if let Some(msg) = msg {
            request = request.query(&[("msg", msg)]);
        }
        match request.send().await.and_then(|r| r.error_for_status()) {
            Ok(_) => {}
            Err(error) => warn!(%url, %error, "heartbeat ping failed"),
        }
    }
}
