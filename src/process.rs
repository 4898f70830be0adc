//! Process liveness and signalling
//!
//! Wraps a (possibly absent) PID and communicates with the process it
//! names through signals. Every signal-sending operation returns a
//! tri-state: `Some(true)` delivered, `Some(false)` no such process,
//! `None` the process exists but access was denied.

use std::process::Command;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct ProcessManager {
    pid: Option<u32>,
}

impl ProcessManager {
    pub fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn send(&self, signal: Option<Signal>) -> Option<bool> {
        let pid = self.pid?;
        match kill(Pid::from_raw(pid as i32), signal) {
            Ok(()) => Some(true),
            Err(Errno::ESRCH) => Some(false),
            Err(_) => None,
        }
    }

    /// Check if the PID names an existing process.
    pub fn exists(&self) -> Option<bool> {
        if self.pid.is_none() {
            return Some(false);
        }
        self.send(None)
    }

    /// Process state code from `ps`. Empty string when the PID is
    /// absent or `ps` fails.
    pub fn status(&self) -> String {
        let Some(pid) = self.pid else {
            return String::new();
        };
        Command::new("ps")
            .args(["-p", &pid.to_string(), "-o", "stat="])
            .output()
            .ok()
            .filter(|out| out.status.success())
            .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string())
            .unwrap_or_default()
    }

    /// Check if the PID names an existing, non-zombie process.
    ///
    /// Zombies mean the child died but its parent has not reaped it yet;
    /// for lock purposes that process is gone.
    pub fn alive(&self) -> Option<bool> {
        match self.exists() {
            Some(true) => {
                if self.status().contains('Z') {
                    warn!(
                        pid = self.pid,
                        "PID belongs to a zombie process, treating it as dead"
                    );
                    Some(false)
                } else {
                    Some(true)
                }
            }
            other => other,
        }
    }

    pub fn terminate(&self) -> Option<bool> {
        self.send(Some(Signal::SIGTERM))
    }

    pub fn kill(&self) -> Option<bool> {
        self.send(Some(Signal::SIGKILL))
    }
}
