//! Chat webhook sink
//!
//! Posts operational messages (job done, worker killed, warnings) to a
//! chat channel webhook. Network failures are logged and swallowed.

use std::time::Duration;

use tracing::{error, warn};

use crate::config::Settings;

const POST_TIMEOUT: Duration = Duration::from_secs(7);
/// Long messages are split; oversized bodies get rejected upstream.
const CHUNK_CHARS: usize = 12_000;

pub struct Chat {
    enabled: bool,
    url: Option<String>,
    token: Option<String>,
    default_channel: Option<String>,
    client: reqwest::Client,
}

impl Chat {
    pub fn new(settings: &Settings) -> Self {
        Self {
            enabled: settings.chat_enabled,
            url: settings.chat_url.clone(),
            token: settings.chat_token.clone(),
            default_channel: settings.chat_channel.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn post(&self, message: &str) {
        self.post_to(message, None).await;
    }

    pub async fn post_to(&self, message: &str, channel: Option<&str>) {
        if !self.enabled {
            warn!("chat post ignored (disabled in settings)");
            return;
        }
        let Some(url) = &self.url else {
            warn!("chat post ignored (no webhook URL configured)");
            return;
        };
        let channel = format!(
            "#{}",
            channel
                .or(self.default_channel.as_deref())
                .unwrap_or_default()
        );
        let token = self.token.as_deref().unwrap_or_default();
        for chunk in chunk_chars(message, CHUNK_CHARS) {
            let request = self
                .client
                .post(url)
                .query(&[("token", token), ("channel", channel.as_str())])
                .timeout(POST_TIMEOUT)
                .json(&serde_json::json!({ "text": chunk }));
            if let Err(err) = request.send().await.and_then(|r| r.error_for_status()) {
                error!(%err, "chat post failed");
                return;
            }
        }
    }
}

fn chunk_chars(message: &str, size: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = message;
    while rest.chars().count() > size {
        let split = rest
            .char_indices()
            .nth(size)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (head, tail) = rest.split_at(split);
        chunks.push(head);
        rest = tail;
    }
    chunks.push(rest);
    chunks
}
