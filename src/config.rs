//! Environment-driven settings
//!
//! Every knob is read from a `CRONHERD_*` environment variable with a
//! sensible default, so scheduler and spawned workers resolve identical
//! configuration regardless of how the parent process was launched.

use std::env;
use std::path::PathBuf;

/// Variables forwarded verbatim into worker child environments.
pub const ENV_DATA_DIR: &str = "CRONHERD_DATA_DIR";
pub const ENV_DEBUG: &str = "CRONHERD_DEBUG";
pub const ENV_JOBS_MODULE: &str = "CRONHERD_JOBS_MODULE";
pub const ENV_NICE_CMD: &str = "CRONHERD_NICE_CMD";
pub const ENV_IONICE_CMD: &str = "CRONHERD_IONICE_CMD";
pub const ENV_REMOTE_ENABLED: &str = "CRONHERD_REMOTE_ENABLED";
pub const ENV_REDIS_URL: &str = "CRONHERD_REDIS_URL";
pub const ENV_HEARTBEAT_ENABLED: &str = "CRONHERD_HEARTBEAT_ENABLED";
pub const ENV_HEARTBEAT_URL: &str = "CRONHERD_HEARTBEAT_URL";
pub const ENV_CHAT_ENABLED: &str = "CRONHERD_CHAT_ENABLED";
pub const ENV_CHAT_URL: &str = "CRONHERD_CHAT_URL";
pub const ENV_CHAT_TOKEN: &str = "CRONHERD_CHAT_TOKEN";
pub const ENV_CHAT_CHANNEL: &str = "CRONHERD_CHAT_CHANNEL";
pub const ENV_EXCEPTION_CMD: &str = "CRONHERD_EXCEPTION_CMD";

/// Crontab entries, `<time expr>|<job spec>` separated by `;` or newlines.
pub const ENV_CRONTAB: &str = "CRONHERD_CRONTAB";

/// Set on workers respawned from a surviving jobspec file.
pub const ENV_PROCESS_RESUMED: &str = "CRON_PROCESS_RESUMED";

/// Resolved configuration shared by scheduler, worker, spawner and
/// remote-control components.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub debug: bool,
    /// Opaque tag naming the job registration module; forwarded to
    /// children so both sides publish the same registry.
    pub jobs_module: String,
    pub nice_cmd: Option<String>,
    pub ionice_cmd: Option<String>,
    pub remote_enabled: bool,
    pub redis_url: String,
    pub heartbeat_enabled: bool,
    pub heartbeat_url: String,
    pub chat_enabled: bool,
    pub chat_url: Option<String>,
    pub chat_token: Option<String>,
    pub chat_channel: Option<String>,
    /// Wrapper command for the exception sink; when set, worker argv is
    /// passed to it as a single shell-quoted `-c` argument.
    pub exception_cmd: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            data_dir: env::var(ENV_DATA_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("cronherd")),
            debug: bool_param(env::var(ENV_DEBUG).ok().as_deref()).unwrap_or(false),
            jobs_module: env::var(ENV_JOBS_MODULE).unwrap_or_default(),
            nice_cmd: non_empty(env::var(ENV_NICE_CMD).unwrap_or_else(|_| "nice".into())),
            ionice_cmd: non_empty(env::var(ENV_IONICE_CMD).unwrap_or_else(|_| {
                if cfg!(target_os = "linux") {
                    "ionice".into()
                } else {
                    String::new()
                }
            })),
            remote_enabled: bool_param(env::var(ENV_REMOTE_ENABLED).ok().as_deref())
                .unwrap_or(false),
            redis_url: env::var(ENV_REDIS_URL)
                .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".into()),
            heartbeat_enabled: bool_param(env::var(ENV_HEARTBEAT_ENABLED).ok().as_deref())
                .unwrap_or(false),
            heartbeat_url: env::var(ENV_HEARTBEAT_URL)
                .unwrap_or_else(|_| "https://cronitor.link/{id}/{endpoint}".into()),
            chat_enabled: bool_param(env::var(ENV_CHAT_ENABLED).ok().as_deref()).unwrap_or(false),
            chat_url: env::var(ENV_CHAT_URL).ok().and_then(non_empty),
            chat_token: env::var(ENV_CHAT_TOKEN).ok().and_then(non_empty),
            chat_channel: env::var(ENV_CHAT_CHANNEL).ok().and_then(non_empty),
            exception_cmd: env::var(ENV_EXCEPTION_CMD).ok().and_then(non_empty),
        }
    }

    /// Ensure the data directory exists before any file primitive touches it.
    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}

/// Crontab entries declared in the environment. Each entry is
/// `<time expr>|<job spec>`; entries are separated by `;` or newlines.
pub fn crontab_from_env() -> Vec<(String, String)> {
    env::var(ENV_CRONTAB)
        .map(|raw| parse_crontab(&raw))
        .unwrap_or_default()
}

fn parse_crontab(raw: &str) -> Vec<(String, String)> {
    raw.split([';', '\n'])
        .filter_map(|entry| {
            let (expr, spec) = entry.split_once('|')?;
            let (expr, spec) = (expr.trim(), spec.trim());
            if expr.is_empty() || spec.is_empty() {
                None
            } else {
                Some((expr.to_string(), spec.to_string()))
            }
        })
        .collect()
}

/// True when the current process was respawned by a resume pass.
pub fn is_process_resumed() -> bool {
    bool_param(env::var(ENV_PROCESS_RESUMED).ok().as_deref()).unwrap_or(false)
}

/// Lenient boolean parsing shared with worker environment round-trips.
pub fn bool_param(value: Option<&str>) -> Option<bool> {
    match value?.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
