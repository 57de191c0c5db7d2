//! Local file backend for state storage
//!
//! State lives in a JSON file (default: carina.state.json). A `.lock` file
//! next to it marks an operation in progress.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::lock::LockInfo;
use crate::state::StateFile;

const LOCK_ATTEMPTS: usize = 2;

pub struct LocalBackend {
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl LocalBackend {
    pub const DEFAULT_STATE_FILE: &'static str = "carina.state.json";

    pub fn new() -> Self {
        Self::with_path(PathBuf::from(Self::DEFAULT_STATE_FILE))
    }

    pub fn with_path(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let lock_path = state_path.with_extension("lock");
        Self {
            state_path,
            lock_path,
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Read the current state; `None` if nothing has been written yet
    pub fn read_state(&self) -> StateResult<Option<StateFile>> {
        let content = match fs::read_to_string(&self.state_path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StateError::io(&self.state_path, e)),
        };

        let state: StateFile =
            serde_json::from_str(&content).map_err(|source| StateError::Parse {
                path: self.state_path.clone(),
                source,
            })?;
        if state.version > StateFile::CURRENT_VERSION {
            return Err(StateError::UnsupportedVersion {
                found: state.version,
                supported: StateFile::CURRENT_VERSION,
            });
        }
        Ok(Some(state))
    }

    /// Bump the serial and write the state
    ///
    /// Refuses to overwrite a file from another lineage or one written after
    /// `state` was read. The file is replaced atomically.
    pub fn write_state(&self, state: &mut StateFile) -> StateResult<()> {
        if let Some(on_disk) = self.read_state()? {
            if on_disk.lineage != state.lineage {
                return Err(StateError::LineageMismatch {
                    expected: on_disk.lineage,
                    actual: state.lineage.clone(),
                });
            }
            if on_disk.serial > state.serial {
                return Err(StateError::StaleSerial {
                    on_disk: on_disk.serial,
                    in_memory: state.serial,
                });
            }
        }

        state.increment_serial();
        let content = serde_json::to_string_pretty(state)?;
        let tmp_path = self.state_path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(|e| StateError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.state_path).map_err(|e| StateError::io(&self.state_path, e))?;
        debug!("wrote {} (serial {})", self.state_path.display(), state.serial);
        Ok(())
    }

    /// A lock file that does not parse is an error, never an absent lock
    fn read_lock(&self) -> StateResult<Option<LockInfo>> {
        match fs::read_to_string(&self.lock_path) {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|source| StateError::Parse {
                    path: self.lock_path.clone(),
                    source,
                }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StateError::io(&self.lock_path, e)),
        }
    }

    /// Create the lock file only if none exists; `false` if another one is there
    fn create_lock_file(&self, info: &LockInfo) -> StateResult<bool> {
        let content = serde_json::to_string_pretty(info)?;
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(StateError::io(&self.lock_path, e)),
        };
        if let Err(e) = file.write_all(content.as_bytes()).and_then(|()| file.sync_all()) {
            let _ = fs::remove_file(&self.lock_path);
            return Err(StateError::io(&self.lock_path, e));
        }
        Ok(true)
    }

    /// Take the lock for `operation`; it is released when the guard is dropped
    ///
    /// An expired lock is removed and creation retried once. If another
    /// process wins that retry, the state is reported as locked by it.
    pub fn lock(&self, operation: &str) -> StateResult<StateLock> {
        let info = LockInfo::new(operation);
        for attempt in 1..=LOCK_ATTEMPTS {
            if self.create_lock_file(&info)? {
                debug!("acquired lock {} for {}", info.id, operation);
                return Ok(StateLock {
                    path: self.lock_path.clone(),
                    info,
                });
            }
            // Released between our create and read
            let Some(existing) = self.read_lock()? else {
                continue;
            };
            if !existing.is_expired() || attempt == LOCK_ATTEMPTS {
                return Err(StateError::locked(&existing));
            }
            warn!(
                "taking over expired lock {} held by {}",
                existing.id, existing.who
            );
            match fs::remove_file(&self.lock_path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StateError::io(&self.lock_path, e)),
            }
        }
        Err(StateError::io(
            &self.lock_path,
            std::io::Error::new(ErrorKind::AlreadyExists, "lock file is being replaced concurrently"),
        ))
    }

    /// Remove a lock left behind by a crashed process
    pub fn force_unlock(&self, lock_id: &str) -> StateResult<()> {
        let existing = self
            .read_lock()?
            .ok_or_else(|| StateError::LockNotFound(lock_id.to_string()))?;
        if existing.id != lock_id {
            return Err(StateError::LockMismatch {
                expected: lock_id.to_string(),
                actual: existing.id,
            });
        }
        fs::remove_file(&self.lock_path).map_err(|e| StateError::io(&self.lock_path, e))
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Held lock on a state file
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
    info: LockInfo,
}

impl StateLock {
    pub fn info(&self) -> &LockInfo {
        &self.info
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to release lock {}: {}", self.info.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use carina_core::resource::{ResourceId, State};
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_read_write() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        assert!(backend.read_state().unwrap().is_none());

        let mut state = StateFile::new();
        state.record(
            &State::existing(ResourceId::new("cd_toolchain_tool_githubconsolidated", "gh"), Default::default())
                .with_identifier("tc/tool"),
            "ibm",
        );
        backend.write_state(&mut state).unwrap();
        assert_eq!(state.serial, 1);

        let read = backend.read_state().unwrap().unwrap();
        assert_eq!(read.serial, 1);
        assert_eq!(read.resources.len(), 1);
        assert!(!dir.path().join("test.state.json.tmp").exists());
    }

    #[test]
    fn test_rejects_foreign_lineage_and_stale_serial() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        let mut first = StateFile::new();
        backend.write_state(&mut first).unwrap();

        let mut other = StateFile::new();
        assert!(matches!(
            backend.write_state(&mut other),
            Err(StateError::LineageMismatch { .. })
        ));

        let mut stale = first.clone();
        backend.write_state(&mut first).unwrap();
        stale.serial = 0;
        assert!(matches!(
            backend.write_state(&mut stale),
            Err(StateError::StaleSerial { on_disk: 2, .. })
        ));
    }

    #[test]
    fn test_newer_version_is_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.state.json");
        let mut state = StateFile::new();
        state.version = StateFile::CURRENT_VERSION + 1;
        fs::write(&path, serde_json::to_string(&state).unwrap()).unwrap();

        let backend = LocalBackend::with_path(path);
        assert!(matches!(
            backend.read_state(),
            Err(StateError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_locking() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        let lock = backend.lock("apply").unwrap();
        assert_eq!(lock.info().operation, "apply");
        assert!(matches!(
            backend.lock("destroy"),
            Err(StateError::Locked { .. })
        ));

        drop(lock);
        let lock = backend.lock("destroy").unwrap();
        assert!(matches!(
            backend.force_unlock("wrong-id"),
            Err(StateError::LockMismatch { .. })
        ));
        backend.force_unlock(&lock.info().id).unwrap();
        assert!(backend.lock("import").is_ok());
    }

    #[test]
    fn test_expired_lock_is_taken_over() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        let stale = LockInfo::with_timeout("apply", chrono::Duration::seconds(-1));
        fs::write(
            dir.path().join("test.state.lock"),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        let lock = backend.lock("apply").unwrap();
        assert_ne!(lock.info().id, stale.id);
    }

    #[test]
    fn test_live_lock_file_is_left_alone() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        let lock_path = dir.path().join("test.state.lock");
        let holder = LockInfo::new("apply");
        let content = serde_json::to_string(&holder).unwrap();
        fs::write(&lock_path, &content).unwrap();

        match backend.lock("destroy") {
            Err(StateError::Locked { lock_id, .. }) => assert_eq!(lock_id, holder.id),
            other => panic!("expected Locked, got {:?}", other.map(|l| l.info().id.clone())),
        }
        assert_eq!(fs::read_to_string(&lock_path).unwrap(), content);
    }

    #[test]
    fn test_unreadable_lock_file_counts_as_held() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        let lock_path = dir.path().join("test.state.lock");
        fs::write(&lock_path, "").unwrap();

        assert!(matches!(
            backend.lock("apply"),
            Err(StateError::Parse { .. })
        ));
        assert!(lock_path.exists());
        assert_eq!(fs::read_to_string(&lock_path).unwrap(), "");
    }
}
