//! Scheduler control files
//!
//! Presence-only markers in the data directory: the lock file disables
//! ticks, the resume file asks the next tick to respawn killed
//! workers. Contents are irrelevant. Only the scheduler touches them.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const LOCK_FILE_NAME: &str = "scheduler.lock";
pub const RESUME_FILE_NAME: &str = "scheduler.resume";

#[derive(Debug, Clone)]
pub struct MarkerFile {
    path: PathBuf,
}

impl MarkerFile {
    fn new(data_dir: &Path, name: &str) -> Self {
        Self {
            path: data_dir.join(name),
        }
    }

    pub fn lock(data_dir: &Path) -> Self {
        Self::new(data_dir, LOCK_FILE_NAME)
    }

    pub fn resume(data_dir: &Path) -> Self {
        Self::new(data_dir, RESUME_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn create(&self) -> Result<()> {
        fs::File::create(&self.path)?;
        Ok(())
    }

    pub fn delete(&self) -> Result<()> {
        fs::remove_file(&self.path)?;
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
