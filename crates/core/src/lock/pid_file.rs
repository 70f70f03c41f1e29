use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LockError {
    /// A live process holds the lock. Our own PID counts as live.
    #[error("lock is held by running process {pid}")]
    Held { pid: u32 },

    /// The lock file changed hands while a stale lock was being replaced.
    #[error("lock was taken over by another process during acquisition")]
    Contended,

    #[error("lock file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exclusive run lock backed by a file containing the holder's PID.
///
/// Released explicitly with [`ProcessLock::release`] or on drop. Release only
/// deletes the file while it still holds our PID.
#[derive(Debug)]
pub struct ProcessLock {
    path: PathBuf,
    pid: u32,
    released: bool,
}

impl ProcessLock {
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let pid = std::process::id();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        match create_exclusive(path, pid) {
            Ok(()) => return Ok(Self::held(path, pid)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        match read_pid(path) {
            Some(holder) if is_alive(holder) => return Err(LockError::Held { pid: holder }),
            Some(holder) => warn!(path = %path.display(), holder, "Replacing stale lock"),
            None => warn!(path = %path.display(), "Replacing unreadable lock file"),
        }

        replace_stale(path, pid)?;
        Ok(Self::held(path, pid))
    }

    fn held(path: &Path, pid: u32) -> Self {
        debug!(path = %path.display(), pid, "Lock acquired");
        Self {
            path: path.to_path_buf(),
            pid,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if read_pid(&self.path) == Some(self.pid) {
            if let Err(e) = std::fs::remove_file(&self.path) {
                debug!(path = %self.path.display(), error = %e, "Failed to remove lock file");
            }
        }
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        self.release_inner();
    }
}

fn create_exclusive(path: &Path, pid: u32) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(pid.to_string().as_bytes())?;
    file.sync_all()
}

/// Move the stale file aside and take the lock with `create_new`.
///
/// Every step is atomic, so of several processes replacing the same stale
/// file exactly one creates the new lock. A live holder found in the moved
/// file means someone else replaced it first; their file is put back.
fn replace_stale(path: &Path, pid: u32) -> Result<(), LockError> {
    let aside = path.with_extension(format!("stale.{}", pid));
    match std::fs::rename(path, &aside) {
        Ok(()) => {
            let live_holder = read_pid(&aside).filter(|holder| is_alive(*holder));
            if let Some(holder) = live_holder {
                restore(&aside, path);
                return Err(LockError::Held { pid: holder });
            }
            if let Err(e) = std::fs::remove_file(&aside) {
                debug!(path = %aside.display(), error = %e, "Failed to remove stale lock");
            }
        }
        // Already moved by a competing process.
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    match create_exclusive(path, pid) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => match read_pid(path) {
            Some(holder) if is_alive(holder) => Err(LockError::Held { pid: holder }),
            _ => Err(LockError::Contended),
        },
        Err(e) => Err(e.into()),
    }
}

/// Put a live holder's lock file back without clobbering a newer one.
fn restore(aside: &Path, path: &Path) {
    match std::fs::hard_link(aside, path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to restore live lock file");
        }
    }
    if let Err(e) = std::fs::remove_file(aside) {
        debug!(path = %aside.display(), error = %e, "Failed to remove moved lock file");
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()?
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|pid| *pid > 0)
}

/// Whether a process with this PID exists.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs only the existence and permission check.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Without a portable liveness check every recorded holder is assumed alive.
#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Above the default pid_max on every platform we run on.
    const DEAD_PID: u32 = 2_147_483_632;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.lock");

        let lock = ProcessLock::acquire(&path).unwrap();
        let err = ProcessLock::acquire(&path).unwrap_err();
        assert!(matches!(err, LockError::Held { pid } if pid == std::process::id()));

        lock.release();
        assert!(!path.exists());
        assert!(ProcessLock::acquire(&path).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_dead_holder_is_replaced_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.lock");
        std::fs::write(&path, DEAD_PID.to_string()).unwrap();

        let lock = ProcessLock::acquire(&path).unwrap();
        assert_eq!(read_pid(&path), Some(std::process::id()));
        assert!(ProcessLock::acquire(&path).is_err());
        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn test_garbage_content_is_stale() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.lock");
        std::fs::write(&path, "not a pid\n").unwrap();

        let _lock = ProcessLock::acquire(&path).unwrap();
        assert_eq!(read_pid(&path), Some(std::process::id()));
    }

    fn leftovers(dir: &TempDir) -> Vec<String> {
        std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name != "run.lock")
            .collect()
    }

    #[test]
    fn test_replacement_backs_off_from_live_holder() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.lock");
        // A competing process already swapped in its own lock.
        let holder = std::process::id();
        std::fs::write(&path, holder.to_string()).unwrap();

        let err = replace_stale(&path, 7).unwrap_err();
        assert!(matches!(err, LockError::Held { pid } if pid == holder));
        assert_eq!(read_pid(&path), Some(holder));
        assert!(leftovers(&dir).is_empty());
    }

    #[test]
    fn test_replacement_after_file_moved_away() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.lock");

        replace_stale(&path, std::process::id()).unwrap();
        assert_eq!(read_pid(&path), Some(std::process::id()));
        assert!(leftovers(&dir).is_empty());
    }

    #[test]
    fn test_replacement_clears_unreadable_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.lock");
        std::fs::write(&path, "not a pid\n").unwrap();

        // The garbage file is moved aside and a fresh lock takes its place.
        replace_stale(&path, std::process::id()).unwrap();
        assert_eq!(read_pid(&path), Some(std::process::id()));
        assert!(leftovers(&dir).is_empty());
    }

    #[test]
    fn test_release_leaves_foreign_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.lock");

        let lock = ProcessLock::acquire(&path).unwrap();
        std::fs::write(&path, "12345").unwrap();
        lock.release();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_is_alive() {
        assert!(is_alive(std::process::id()));
        assert!(!is_alive(DEAD_PID));
        assert!(!is_alive(0));
    }
}
