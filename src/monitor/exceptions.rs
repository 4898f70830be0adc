//! Exception sink
//!
//! The exception service itself is an external collaborator; this side
//! only records failures locally and knows the wrapper command under
//! which workers should run so the sink can capture their crashes.

use std::fmt::Display;

use tracing::error;

use crate::config::Settings;

pub struct ExceptionSink {
    /// Wrapper command prepended to worker argv (see the spawner).
    wrapper_cmd: Option<String>,
}

impl ExceptionSink {
    pub fn new(settings: &Settings) -> Self {
        Self {
            wrapper_cmd: settings.exception_cmd.clone(),
        }
    }

    pub fn wrapper_cmd(&self) -> Option<&str> {
        self.wrapper_cmd.as_deref()
    }

    /// Record a captured failure. Reporting must never fail the caller.
    pub fn capture(&self, context: &str, err: &dyn Display) {
        error!(context, %err, "captured exception");
    }
}
