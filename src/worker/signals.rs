//! Signal notification scope
//!
//! While a job body runs, SIGINT and SIGTERM are intercepted so the
//! kill is logged and announced on the chat sink before the process
//! exits with the signal's number. The scope guard unregisters the
//! handlers on normal completion.

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use std::thread::JoinHandle;
use tracing::warn;

use crate::config::Settings;
use crate::monitor::Chat;

pub struct SignalNotifier {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalNotifier {
    /// Install the handlers. The returned guard keeps them active
    /// until it is dropped.
    pub fn install(job_spec: &str, settings: &Settings) -> std::io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        let handle = signals.handle();
        let job_spec = job_spec.to_string();
        let settings = settings.clone();

        let thread = std::thread::spawn(move || {
            for signal in signals.forever() {
                let name = match signal {
                    SIGINT => "SIGINT",
                    SIGTERM => "SIGTERM",
                    _ => continue,
                };
                let message = format!("Cron job {job_spec:?} killed by {name}.");
                warn!("{message}");
                // The async chat client needs a runtime; this thread has
                // none, so spin up a small one for the single post.
                if let Ok(rt) = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    rt.block_on(Chat::new(&settings).post(&message));
                }
                std::process::exit(signal);
            }
        });

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalNotifier {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
