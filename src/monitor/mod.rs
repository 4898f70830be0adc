//! Monitoring sinks
//!
//! Heartbeat pings, chat notifications and exception capture. All
//! sinks are advisory: unreachable services degrade to warnings and
//! never fail the operation that triggered them.

pub mod chat;
pub mod exceptions;
pub mod heartbeat;

pub use chat::Chat;
pub use exceptions::ExceptionSink;
pub use heartbeat::Heartbeat;

use crate::config::Settings;
use crate::error::Error;

/// Bundle of the three sinks, shared by scheduler, worker and fleet.
pub struct Monitor {
    pub heartbeat: Heartbeat,
    pub chat: Chat,
    pub exceptions: ExceptionSink,
}

impl Monitor {
    pub fn new(settings: &Settings) -> Self {
        Self {
            heartbeat: Heartbeat::new(settings),
            chat: Chat::new(settings),
            exceptions: ExceptionSink::new(settings),
        }
    }

    /// Report a recoverable condition: log it, announce it on chat with
    /// a host prefix, and return the printable message. `silent` skips
    /// the log and the chat post but still returns the message.
    pub async fn warning(&self, error: &Error, silent: bool) -> String {
        let message = error.to_string();
        if !silent {
            tracing::warn!("{message}");
            let host = host_name();
            self.chat.post(&format!("[{host}] {message}")).await;
        }
        format!("{message}\n")
    }
}

/// This host's name, used for chat prefixes and remote-control keys.
pub fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
