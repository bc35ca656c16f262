//! On-disk world state
//!
//! The snapshot lives in a single JSON file. Every CLI invocation holds an
//! exclusive lock on a sibling lock file for its whole lifetime, so two
//! processes never interleave a load and a save.

use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use somnia_runtime::{Runtime, RuntimeConfig, SystemClock, WorldSnapshot};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub struct StateStore {
    path: PathBuf,
    _lock: StateLock,
}

impl StateStore {
    pub fn open(path: &Path) -> Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let lock = StateLock::acquire(&dir)?;
        Ok(Self {
            path: path.to_path_buf(),
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the persisted runtime, or start from genesis when no state has
    /// been written yet.
    pub fn load(&self, config: RuntimeConfig) -> Result<Runtime> {
        let clock = Arc::new(SystemClock);
        if !self.exists() {
            debug!(path = %self.path.display(), "no state file, starting from genesis");
            return Ok(Runtime::genesis(config, clock)?);
        }

        let data = fs::read(&self.path)
            .with_context(|| format!("Failed to read state {}", self.path.display()))?;
        let snapshot: WorldSnapshot = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse state {}", self.path.display()))?;
        Ok(Runtime::from_snapshot(config, snapshot, clock)?)
    }

    /// Persist the runtime's state. Written to a temporary file first, then
    /// renamed over the previous state.
    pub fn save(&self, runtime: &Runtime) -> Result<()> {
        let data = serde_json::to_vec_pretty(&runtime.snapshot())?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, data)
            .with_context(|| format!("Failed to write state {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to replace state {}", self.path.display()))?;
        info!(path = %self.path.display(), height = runtime.height(), "state saved");
        Ok(())
    }

    pub fn remove(&self) -> Result<()> {
        if self.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove state {}", self.path.display()))?;
        }
        Ok(())
    }
}

struct StateLock {
    path: PathBuf,
    file: File,
}

impl StateLock {
    fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create state directory {}", dir.display()))?;
        let lock_path = dir.join(".somnia.lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&lock_path)?;

        if let Err(err) = file.try_lock_exclusive() {
            return Err(anyhow!(
                "State directory {} is locked by another process ({}). \
                 Wait for it to finish or remove {} if you are sure it is stale.",
                dir.display(),
                err,
                lock_path.display()
            ));
        }

        file.set_len(0)?;
        writeln!(&file, "pid={}", std::process::id())?;

        Ok(Self {
            path: lock_path,
            file,
        })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = fs::remove_file(&self.path);
    }
}
