//! Worker state files
//!
//! Two on-disk value types share a base name: the PID file (lock marker
//! carrying the owner's PID) and the JobSpec file (spec snapshot for
//! resumable jobs). They are siblings, not owners of each other;
//! cross-lookup constructs the twin lazily from the shared base name.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::jobs::LockRegime;
use crate::process::ProcessManager;

pub const PID_EXTENSION: &str = "pid";
pub const JOB_SPEC_EXTENSION: &str = "jobspec";

/// Filename prefix filter used by enumeration.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    pub name: String,
    pub args: Vec<String>,
    pub kwargs: BTreeMap<String, String>,
}

impl NameFilter {
    fn prefix(&self) -> String {
        if self.args.is_empty() && self.kwargs.is_empty() {
            self.name.clone()
        } else {
            format!("{}_{}", self.name, params_hash(&self.args, &self.kwargs))
        }
    }
}

/// Build the base file name for a lock owner. The lock regime drives
/// the filename shape:
///
/// - class lock: `<name>`
/// - params lock: `<name>_<hash10>`
/// - no lock: `<name>_<hash10>_<rand10>`
pub fn lock_base_name(
    lock_name: &str,
    regime: LockRegime,
    args: &[String],
    kwargs: &BTreeMap<String, String>,
) -> String {
    match regime {
        LockRegime::Class => lock_name.to_string(),
        LockRegime::Params => format!("{lock_name}_{}", params_hash(args, kwargs)),
        LockRegime::None => format!(
            "{lock_name}_{}_{}",
            params_hash(args, kwargs),
            random_suffix()
        ),
    }
}

/// First 10 hex digits of MD5 over a canonical rendering of the call
/// parameters. Named arguments are sorted by key so the hash is stable.
fn params_hash(args: &[String], kwargs: &BTreeMap<String, String>) -> String {
    let canonical = canonical_params(args, kwargs);
    let digest = md5::compute(canonical.as_bytes());
    format!("{digest:x}")[..10].to_string()
}

fn canonical_params(args: &[String], kwargs: &BTreeMap<String, String>) -> String {
    let args_part = args
        .iter()
        .map(|a| format!("{a:?}"))
        .collect::<Vec<_>>()
        .join(", ");
    let kwargs_part = kwargs
        .iter()
        .map(|(k, v)| format!("{k:?}: {v:?}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("([{args_part}], {{{kwargs_part}}})")
}

fn random_suffix() -> String {
    format!("{:010x}", rand::random::<u64>() & 0xff_ffff_ffff)
}

/// Durable write: truncate, write, flush, then fsync before close.
fn write_durable(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    file.sync_all()
}

/// Tolerant read: a deleted or truncated file is "no value", not an error.
fn read_tolerant(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().filter(|s| !s.is_empty())
}

/// Idempotent delete: an already-absent file is success.
fn delete_idempotent(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// Walk the data directory for files with the given extension,
/// optionally narrowed to bases matching a lock-name prefix. Order is
/// whatever the filesystem yields; callers sort when it matters.
fn list_bases(data_dir: &Path, extension: &str, filter: Option<&NameFilter>) -> Vec<String> {
    let prefix = filter.map(|f| f.prefix());
    let Ok(entries) = fs::read_dir(data_dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                return None;
            }
            let base = path.file_stem()?.to_str()?.to_string();
            match &prefix {
                Some(p) if !base.starts_with(p.as_str()) => None,
                _ => Some(base),
            }
        })
        .collect()
}

/// PID file: lock marker owned by a single worker process.
#[derive(Debug, Clone)]
pub struct PidFile {
    data_dir: PathBuf,
    base: String,
}

impl PidFile {
    pub fn new(data_dir: &Path, base: &str) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            base: base.to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.{}", self.base, PID_EXTENSION))
    }

    /// Write the calling process's own PID.
    pub fn create(&self) -> Result<()> {
        self.write(std::process::id())
    }

    pub fn write(&self, pid: u32) -> Result<()> {
        write_durable(&self.path(), &pid.to_string())?;
        Ok(())
    }

    /// PID recorded in the file; `None` for deleted or garbled files.
    pub fn pid(&self) -> Option<u32> {
        read_tolerant(&self.path())?.trim().parse().ok()
    }

    pub fn process(&self) -> ProcessManager {
        ProcessManager::new(self.pid())
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    pub fn delete(&self) -> Result<()> {
        delete_idempotent(&self.path())?;
        Ok(())
    }

    /// Lock check with self-healing: true iff the file exists and its
    /// process is alive (or unreachable). A file naming a dead or
    /// unparseable PID is deleted on the spot.
    pub fn exists_with_alive_process(&self) -> bool {
        if !self.exists() {
            return false;
        }
        match self.pid() {
            None => {
                let _ = self.delete();
                false
            }
            Some(_) => {
                if self.process().alive() == Some(false) {
                    let _ = self.delete();
                    false
                } else {
                    // Alive, or access denied: assume the owner holds it.
                    true
                }
            }
        }
    }

    pub fn job_spec_file(&self) -> JobSpecFile {
        JobSpecFile::new(&self.data_dir, &self.base)
    }

    pub fn all(data_dir: &Path, filter: Option<&NameFilter>) -> Vec<PidFile> {
        list_bases(data_dir, PID_EXTENSION, filter)
            .into_iter()
            .map(|base| PidFile::new(data_dir, &base))
            .collect()
    }

    /// Linear scan for the first PID file recording the given PID.
    pub fn by_pid(data_dir: &Path, pid: u32) -> Option<PidFile> {
        PidFile::all(data_dir, None)
            .into_iter()
            .find(|f| f.pid() == Some(pid))
    }
}

/// JobSpec file: spec snapshot enabling resume after a kill.
#[derive(Debug, Clone)]
pub struct JobSpecFile {
    data_dir: PathBuf,
    base: String,
}

impl JobSpecFile {
    pub fn new(data_dir: &Path, base: &str) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            base: base.to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", self.base, JOB_SPEC_EXTENSION))
    }

    pub fn create(&self, job_spec: &str) -> Result<()> {
        write_durable(&self.path(), job_spec)?;
        Ok(())
    }

    pub fn job_spec(&self) -> Option<String> {
        read_tolerant(&self.path())
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    pub fn delete(&self) -> Result<()> {
        delete_idempotent(&self.path())?;
        Ok(())
    }

    /// Read the stored spec and delete the file. Deletion comes first
    /// so a retrying caller cannot double-spawn the same snapshot.
    pub fn take_spec(&self) -> Result<Option<String>> {
        let spec = self.job_spec();
        self.delete()?;
        Ok(spec)
    }

    pub fn pid_file(&self) -> PidFile {
        PidFile::new(&self.data_dir, &self.base)
    }

    pub fn all(data_dir: &Path, filter: Option<&NameFilter>) -> Vec<JobSpecFile> {
        list_bases(data_dir, JOB_SPEC_EXTENSION, filter)
            .into_iter()
            .map(|base| JobSpecFile::new(data_dir, &base))
            .collect()
    }

    /// JobSpec file owned by the process with the given PID, if both
    /// the PID file and its sibling exist.
    pub fn by_pid(data_dir: &Path, pid: u32) -> Option<JobSpecFile> {
        let pid_file = PidFile::by_pid(data_dir, pid)?;
        let job_spec_file = pid_file.job_spec_file();
        job_spec_file.exists().then_some(job_spec_file)
    }
}

#[cfg(test)]
#[path = "files_tests.rs"]
mod tests;
