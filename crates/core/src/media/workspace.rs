//! Per-clip scratch directories.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

/// Prefix of every clip workspace directory under the temp root.
const WORKSPACE_PREFIX: &str = "clip-";

/// A scratch directory holding every intermediate artifact of one clip.
///
/// The directory and its contents are removed when the workspace is dropped,
/// so every exit path of a clip attempt cleans up after itself.
#[derive(Debug)]
pub struct ClipWorkspace {
    dir: PathBuf,
}

impl ClipWorkspace {
    /// Create `<root>/clip-<clip_id>-<pid>`, replacing any leftover with the same name.
    pub fn create(root: &Path, clip_id: &str) -> std::io::Result<Self> {
        let safe: String = clip_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let dir = root.join(format!(
            "{}{}-{}",
            WORKSPACE_PREFIX,
            safe,
            std::process::id()
        ));
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Remove one artifact early. Failures are left for the final cleanup.
    pub fn discard(&self, path: &Path) {
        if path.starts_with(&self.dir) {
            if let Err(e) = std::fs::remove_file(path) {
                debug!(path = %path.display(), error = %e, "Failed to discard artifact");
            }
        }
    }
}

impl Drop for ClipWorkspace {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %self.dir.display(), error = %e, "Failed to clean up clip workspace");
            }
        }
    }
}

/// Remove clip workspaces under `root` older than `max_age`. Returns how many
/// were removed. Best-effort: errors are logged and skipped.
pub fn sweep_stale(root: &Path, max_age: Duration) -> usize {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(root = %root.display(), error = %e, "Cannot sweep temp directory");
            }
            return 0;
        }
    };

    let now = SystemTime::now();
    let mut removed = 0;

    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(WORKSPACE_PREFIX) {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if !age.is_some_and(|a| a >= max_age) {
            continue;
        }

        let path = entry.path();
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match result {
            Ok(()) => {
                debug!(path = %path.display(), "Removed stale clip workspace");
                removed += 1;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale workspace"),
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_workspace_removed_on_drop() {
        let root = TempDir::new().unwrap();
        let dir = {
            let ws = ClipWorkspace::create(root.path(), "Clip/1").unwrap();
            std::fs::write(ws.path().join("raw.mp4"), b"data").unwrap();
            assert!(ws.path().starts_with(root.path()));
            ws.path().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_discard_only_inside_workspace() {
        let root = TempDir::new().unwrap();
        let outside = root.path().join("keep.txt");
        std::fs::write(&outside, b"x").unwrap();

        let ws = ClipWorkspace::create(root.path(), "c1").unwrap();
        let inside = ws.path().join("raw.mp4");
        std::fs::write(&inside, b"x").unwrap();

        ws.discard(&inside);
        ws.discard(&outside);
        assert!(!inside.exists());
        assert!(outside.exists());
    }

    #[test]
    fn test_sweep_stale() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("clip-old-1")).unwrap();
        std::fs::create_dir(root.path().join("unrelated")).unwrap();

        assert_eq!(sweep_stale(root.path(), Duration::from_secs(3600)), 0);
        assert_eq!(sweep_stale(root.path(), Duration::ZERO), 1);
        assert!(!root.path().join("clip-old-1").exists());
        assert!(root.path().join("unrelated").exists());
    }

    #[test]
    fn test_sweep_missing_root() {
        assert_eq!(
            sweep_stale(Path::new("/nonexistent/clipline"), Duration::ZERO),
            0
        );
    }
}
