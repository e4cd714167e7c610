//! Cover file storage

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use crate::domain::DomainError;

/// Files are addressed by a path relative to the storage root, the same
/// path served under `/storage`.
#[async_trait]
pub trait CoverStorage: Send + Sync {
    /// Writes `bytes` to `relative_path`, creating parent directories.
    async fn store(&self, relative_path: &str, bytes: &[u8]) -> Result<(), DomainError>;

    /// Removes a stored file; a missing file is not an error.
    async fn delete(&self, relative_path: &str) -> Result<(), DomainError>;
}

pub struct LocalCoverStorage {
    root: PathBuf,
}

impl LocalCoverStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, relative_path: &str) -> Result<PathBuf, DomainError> {
        let relative = Path::new(relative_path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if relative_path.is_empty() || escapes {
            return Err(DomainError::Validation(format!(
                "invalid storage path '{}'",
                relative_path
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl CoverStorage for LocalCoverStorage {
    async fn store(&self, relative_path: &str, bytes: &[u8]) -> Result<(), DomainError> {
        let path = self.resolve(relative_path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "cover stored");
        Ok(())
    }

    async fn delete(&self, relative_path: &str) -> Result<(), DomainError> {
        let path = self.resolve(relative_path)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_paths_leaving_the_root() {
        let storage = LocalCoverStorage::new("/srv/covers");
        assert!(storage.resolve("../etc/passwd").is_err());
        assert!(storage.resolve("/etc/passwd").is_err());
        assert!(storage.resolve("").is_err());
        assert_eq!(
            storage.resolve("covers/a.png").unwrap(),
            PathBuf::from("/srv/covers/covers/a.png")
        );
    }

    #[tokio::test]
    async fn store_then_delete() {
        let root = std::env::temp_dir().join(format!("pustaka-storage-{}", std::process::id()));
        let storage = LocalCoverStorage::new(&root);

        storage.store("covers/x.png", b"png").await.unwrap();
        assert_eq!(std::fs::read(root.join("covers/x.png")).unwrap(), b"png");

        storage.delete("covers/x.png").await.unwrap();
        assert!(!root.join("covers/x.png").exists());
        // second delete is a no-op
        storage.delete("covers/x.png").await.unwrap();

        let _ = std::fs::remove_dir_all(root);
    }
}
