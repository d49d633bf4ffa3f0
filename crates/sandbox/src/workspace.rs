//! Working area for staged artifacts.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const ARTIFACT_PREFIX: &str = "ConsoleApp_";
const ARTIFACT_EXTENSION: &str = "cbx";

/// Directory holding one artifact file per staged compilation.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) the store at `root`, made absolute.
    pub fn open(root: &Path) -> io::Result<Self> {
        let root = std::path::absolute(root)?;
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic artifact location for a session.
    pub fn artifact_path(&self, session_id: Uuid) -> PathBuf {
        self.root.join(format!(
            "{}{}.{}",
            ARTIFACT_PREFIX,
            session_id.simple(),
            ARTIFACT_EXTENSION
        ))
    }

    /// Delete a staged artifact. A file that is already gone is not an error.
    pub fn remove(&self, path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "artifact removed"),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => warn!(path = %path.display(), %error, "failed to remove artifact"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(&dir.path().join("nested")).unwrap();
        assert!(store.root().is_dir());

        let id = Uuid::new_v4();
        let path = store.artifact_path(id);
        assert_eq!(path, store.artifact_path(id));
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("ConsoleApp_{}.cbx", id.simple())
        );
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let path = store.artifact_path(Uuid::new_v4());
        std::fs::write(&path, b"{}").unwrap();

        store.remove(&path);
        assert!(!path.exists());
        store.remove(&path);
    }
}
