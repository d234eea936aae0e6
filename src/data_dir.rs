use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve the data directory from, in order of priority:
    /// 1. An explicit path (from --data-dir)
    /// 2. The ASKDOCS_DATA_DIR environment variable
    /// 3. The XDG data directory (~/.local/share/askdocs/)
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var("ASKDOCS_DATA_DIR") {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("askdocs")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Document-level index: vectors plus document metadata.
    pub fn documents_db(&self) -> PathBuf {
        self.root.join("documents.redb")
    }

    /// Chunk-level index: vectors plus chunk metadata.
    pub fn chunks_db(&self) -> PathBuf {
        self.root.join("chunks.redb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();

        assert_eq!(dir.root(), tmp.path());
        assert_eq!(dir.documents_db(), tmp.path().join("documents.redb"));
        assert_eq!(dir.chunks_db(), tmp.path().join("chunks.redb"));
    }

    #[test]
    fn resolve_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("deep").join("store");
        let dir = DataDir::resolve(Some(&nested)).unwrap();

        assert!(dir.root().exists());
    }
}
