//! # Snapshot File I/O
//!
//! - **Atomic saves**: write `.tmp`, fsync, rename over the target
//! - **File locking**: an advisory `.lock` file plus an OS lock, so two
//!   transfers never write the same target model at once
//! - **Version validation**: snapshots from a newer schema are refused
//!
//! ## Example
//!
//! ```rust,no_run
//! use loadset_core::snapshot::{load_snapshot, save_snapshot, FileLock};
//! use std::path::Path;
//!
//! let path = Path::new("podium.model.json");
//! let lock = FileLock::acquire(path, "engineer@company.com")?;
//! let mut model = load_snapshot(path)?;
//! // ... transfer into `model` ...
//! save_snapshot(&mut model, path)?;
//! drop(lock);
//! # Ok::<(), loadset_core::errors::TransferError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::errors::{TransferError, TransferResult};

use super::{ModelSnapshot, SCHEMA_VERSION};

/// Hours after which a lock is considered abandoned
const STALE_LOCK_HOURS: i64 = 24;

/// Contents of a `.lock` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub user_id: String,
    pub machine: String,
    pub pid: u32,
    pub locked_at: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(user_id: impl Into<String>) -> Self {
        LockInfo {
            user_id: user_id.into(),
            machine: hostname().unwrap_or_else(|| "unknown".to_string()),
            pid: std::process::id(),
            locked_at: Utc::now(),
        }
    }

    fn holder(&self) -> String {
        format!("{} ({})", self.user_id, self.machine)
    }

    fn locked_error(&self, path: &Path) -> TransferError {
        TransferError::file_locked(path.display().to_string(), self.holder(), self.locked_at.to_rfc3339())
    }
}

fn hostname() -> Option<String> {
    #[cfg(windows)]
    {
        std::env::var("COMPUTERNAME").ok()
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOSTNAME").ok().or_else(|| std::env::var("HOST").ok())
    }
}

fn io_error(operation: &str, path: &Path, err: std::io::Error) -> TransferError {
    TransferError::file_error(operation, path.display().to_string(), err.to_string())
}

/// Exclusive hold on a snapshot file, released on drop
pub struct FileLock {
    snapshot_path: PathBuf,
    lock_path: PathBuf,
    _lock_file: File,
    pub info: LockInfo,
}

impl FileLock {
    /// Acquire the lock or fail with [`TransferError::FileLocked`] naming
    /// the current holder. Locks left by dead processes are taken over.
    pub fn acquire(path: &Path, user_id: impl Into<String>) -> TransferResult<Self> {
        if let Some(existing) = FileLock::check(path) {
            return Err(existing.locked_error(path));
        }

        let lock_path = lock_path_for(path);
        let info = LockInfo::new(user_id);

        let mut lock_file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| io_error("create lock", &lock_path, e))?;

        lock_file.try_lock_exclusive().map_err(|_| {
            TransferError::file_locked(path.display().to_string(), "another process", "unknown")
        })?;

        let json = serde_json::to_string_pretty(&info).map_err(|e| TransferError::serialization(e.to_string()))?;
        lock_file
            .write_all(json.as_bytes())
            .and_then(|_| lock_file.sync_all())
            .map_err(|e| io_error("write lock", &lock_path, e))?;

        tracing::debug!(path = %path.display(), "lock acquired");
        Ok(FileLock {
            snapshot_path: path.to_path_buf(),
            lock_path,
            _lock_file: lock_file,
            info,
        })
    }

    /// Current live holder of a snapshot, if any
    pub fn check(path: &Path) -> Option<LockInfo> {
        let lock_path = lock_path_for(path);
        if !lock_path.exists() {
            return None;
        }
        read_lock_info(&lock_path).ok().filter(|info| !is_lock_stale(info))
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

/// `model.json` → `model.json.lock`
fn lock_path_for(path: &Path) -> PathBuf {
    let mut lock_path = path.to_path_buf();
    let extension = lock_path
        .extension()
        .map(|e| format!("{}.lock", e.to_string_lossy()))
        .unwrap_or_else(|| "lock".to_string());
    lock_path.set_extension(extension);
    lock_path
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp_path = path.to_path_buf();
    let extension = tmp_path
        .extension()
        .map(|e| format!("{}.tmp", e.to_string_lossy()))
        .unwrap_or_else(|| "tmp".to_string());
    tmp_path.set_extension(extension);
    tmp_path
}

fn read_lock_info(lock_path: &Path) -> TransferResult<LockInfo> {
    let contents = fs::read_to_string(lock_path).map_err(|e| io_error("read lock", lock_path, e))?;
    serde_json::from_str(&contents).map_err(|e| TransferError::serialization(e.to_string()))
}

/// Stale when its process is gone from this machine, or when it is older
/// than a day
fn is_lock_stale(info: &LockInfo) -> bool {
    if hostname().as_deref() == Some(info.machine.as_str()) {
        #[cfg(unix)]
        {
            if fs::metadata(format!("/proc/{}", info.pid)).is_err() {
                return true;
            }
        }
    }
    (Utc::now() - info.locked_at).num_hours() > STALE_LOCK_HOURS
}

/// Save a snapshot atomically and remember `path` on it.
pub fn save_snapshot(model: &mut ModelSnapshot, path: &Path) -> TransferResult<()> {
    let json = serde_json::to_string_pretty(model).map_err(|e| TransferError::serialization(e.to_string()))?;
    let tmp_path = tmp_path_for(path);

    let mut tmp_file = File::create(&tmp_path).map_err(|e| io_error("create temp file", &tmp_path, e))?;
    tmp_file
        .write_all(json.as_bytes())
        .map_err(|e| io_error("write temp file", &tmp_path, e))?;
    tmp_file.sync_all().map_err(|e| io_error("sync temp file", &tmp_path, e))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        io_error("rename to final", path, e)
    })?;

    model.set_path(path.to_path_buf());
    tracing::info!(path = %path.display(), tables = model.tables.len(), "snapshot saved");
    Ok(())
}

/// Load and version-check a snapshot.
pub fn load_snapshot(path: &Path) -> TransferResult<ModelSnapshot> {
    let mut contents = String::new();
    File::open(path)
        .and_then(|mut file| file.read_to_string(&mut contents))
        .map_err(|e| io_error("read", path, e))?;

    let mut model: ModelSnapshot = serde_json::from_str(&contents)
        .map_err(|e| TransferError::serialization(format!("Invalid JSON in {}: {}", path.display(), e)))?;
    validate_version(&model.meta.version)?;

    model.set_path(path.to_path_buf());
    tracing::debug!(path = %path.display(), model = %model.meta.model_name, "snapshot loaded");
    Ok(model)
}

/// Load a snapshot that no live transfer is writing.
///
/// A live lock fails with [`TransferError::FileLocked`]; with `force` the
/// snapshot is read anyway and the holder is logged.
pub fn load_snapshot_with_lock_check(path: &Path, force: bool) -> TransferResult<ModelSnapshot> {
    if let Some(holder) = FileLock::check(path) {
        if !force {
            return Err(holder.locked_error(path));
        }
        tracing::warn!(path = %path.display(), holder = %holder.holder(), "reading a locked snapshot");
    }
    load_snapshot(path)
}

/// Same major version required; on 0.x a newer minor is refused.
fn validate_version(file_version: &str) -> TransferResult<()> {
    let mismatch = || TransferError::VersionMismatch {
        file_version: file_version.to_string(),
        expected_version: SCHEMA_VERSION.to_string(),
    };
    let parse = |v: &str| -> Vec<u32> { v.split('.').filter_map(|p| p.parse().ok()).collect() };

    let file = parse(file_version);
    let current = parse(SCHEMA_VERSION);
    match (file.as_slice(), current.as_slice()) {
        ([file_major, ..], [major, ..]) if file_major != major => Err(mismatch()),
        ([0, file_minor, ..], [0, minor, ..]) if file_minor > minor => Err(mismatch()),
        ([_, ..], [_, ..]) => Ok(()),
        _ => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::UnitSystem;

    fn sample() -> ModelSnapshot {
        ModelSnapshot::new("Podium", UnitSystem::new("kN", "m", "C")).with_table(
            "Shell Uniform Load Sets",
            &["Name", "LoadPattern", "Value"],
            &[&["S1", "Dead", "1.5"]],
        )
    }

    #[test]
    fn test_lock_path_generation() {
        assert_eq!(
            lock_path_for(Path::new("/models/podium.json")),
            Path::new("/models/podium.json.lock")
        );
        assert_eq!(tmp_path_for(Path::new("/models/podium")), Path::new("/models/podium.tmp"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("podium.json");

        let mut model = sample();
        save_snapshot(&mut model, &path).unwrap();
        assert_eq!(model.path(), Some(path.as_path()));
        assert!(!tmp_path_for(&path).exists());

        let loaded = load_snapshot(&path).unwrap();
        assert_eq!(loaded.meta.model_name, "Podium");
        assert_eq!(loaded.units, Some(UnitSystem::new("kN", "m", "C")));
        assert_eq!(loaded.table("Shell Uniform Load Sets").unwrap().rows.len(), 1);
        assert_eq!(loaded.path(), Some(path.as_path()));
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_snapshot(&path).unwrap_err().error_code(), "SERIALIZATION_ERROR");
    }

    #[test]
    fn test_missing_file_is_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_snapshot(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.error_code(), "FILE_ERROR");
    }

    #[test]
    fn test_lock_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("podium.json");
        File::create(&path).unwrap();

        let lock = FileLock::acquire(&path, "test@example.com").unwrap();
        assert_eq!(lock.info.user_id, "test@example.com");
        assert!(lock_path_for(&path).exists());

        drop(lock);
        assert!(!lock_path_for(&path).exists());
    }

    #[test]
    fn test_locked_snapshot_is_refused_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("podium.json");
        save_snapshot(&mut sample(), &path).unwrap();

        assert!(load_snapshot_with_lock_check(&path, false).is_ok());

        let lock = FileLock::acquire(&path, "other@example.com").unwrap();
        let err = load_snapshot_with_lock_check(&path, false).unwrap_err();
        assert_eq!(err.error_code(), "FILE_LOCKED");
        assert!(err.to_string().contains("other@example.com"));

        let forced = load_snapshot_with_lock_check(&path, true).unwrap();
        assert_eq!(forced.meta.model_name, "Podium");

        drop(lock);
        assert!(load_snapshot_with_lock_check(&path, false).is_ok());
    }

    #[test]
    fn test_old_lock_is_stale() {
        let mut info = LockInfo::new("someone");
        info.machine = "elsewhere".to_string();
        assert!(!is_lock_stale(&info));
        info.locked_at = Utc::now() - chrono::Duration::hours(STALE_LOCK_HOURS + 1);
        assert!(is_lock_stale(&info));
    }

    #[test]
    fn test_version_validation() {
        assert!(validate_version(SCHEMA_VERSION).is_ok());
        assert!(validate_version("0.1.7").is_ok());
        assert!(validate_version("0.0.9").is_ok());
        assert!(validate_version("0.2.0").is_err());
        assert!(validate_version("1.0.0").is_err());
        assert!(validate_version("").is_err());
    }

    #[test]
    fn test_newer_snapshot_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.json");
        let mut model = sample();
        model.meta.version = "0.9.0".to_string();
        save_snapshot(&mut model, &path).unwrap();

        let err = load_snapshot(&path).unwrap_err();
        assert_eq!(
            err,
            TransferError::VersionMismatch {
                file_version: "0.9.0".to_string(),
                expected_version: SCHEMA_VERSION.to_string(),
            }
        );
    }
}
