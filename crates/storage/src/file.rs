use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::repository::{StateRepository, Storage, StorageError};

/// Stores the document as a single JSON file.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash mid-write leaves the previous document intact.
#[derive(Clone, Debug)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateRepository for JsonFileRepository {
    async fn load(&self) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, document: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, document).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), bytes = document.len(), "document written");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Storage {
    /// Build a `Storage` backed by a JSON file.
    #[must_use]
    pub fn json_file(path: impl Into<PathBuf>) -> Self {
        Self::from_repository(JsonFileRepository::new(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("absent.json"));
        assert_eq!(repo.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_creates_parents_and_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/progress.json");
        let repo = JsonFileRepository::new(&path);

        repo.save(r#"{"version":2}"#).await.unwrap();
        repo.save(r#"{"version":2,"items":null}"#).await.unwrap();

        assert_eq!(
            repo.load().await.unwrap().as_deref(),
            Some(r#"{"version":2,"items":null}"#)
        );
        assert!(!repo.temp_path().exists());
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("progress.json"));

        repo.save("{}").await.unwrap();
        repo.clear().await.unwrap();
        repo.clear().await.unwrap();
        assert_eq!(repo.load().await.unwrap(), None);
    }
}
