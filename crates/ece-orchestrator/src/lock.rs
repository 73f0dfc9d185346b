use ece_core::{EceError, EceResult};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the lock inside the data directory.
pub const LOCK_FILE_NAME: &str = "ece_instance.lock";

/// Exclusive per-data-directory lock, released on drop.
///
/// The file holds the owner's PID. A lock left behind by a crashed process
/// must be removed by hand.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    /// Take the lock in `data_dir`, creating the directory if needed.
    pub fn acquire(data_dir: &Path) -> EceResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(LOCK_FILE_NAME);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let owner = std::fs::read_to_string(&path).unwrap_or_default();
                return Err(EceError::Lock(format!(
                    "Another instance is running (pid {}); remove {} if it is stale",
                    owner.trim(),
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;

        info!(path = %path.display(), "Instance lock acquired");
        Ok(Self { path })
    }

    /// Location of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to release instance lock");
        }
    }
}
