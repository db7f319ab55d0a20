use std::path::{Path, PathBuf};

use rocket::tokio::fs;
use tracing::{info, instrument, warn};

use crate::error::AppError;

const ARTIFACT_EXTENSION: &str = "pdf";

/// Durable storage for rendered certificates: one file per diploma, named by
/// the diploma id, under a single directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, diploma_id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", diploma_id, ARTIFACT_EXTENSION))
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn ensure_root(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Writes to a temporary sibling first and renames it into place, so a
    /// file under the final name is always complete.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn write(&self, diploma_id: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
        self.ensure_root().await?;

        let final_path = self.path_for(diploma_id);
        let partial_path = self
            .root
            .join(format!("{}.{}.partial", diploma_id, ARTIFACT_EXTENSION));

        fs::write(&partial_path, bytes).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to write artifact {}: {}",
                partial_path.display(),
                e
            ))
        })?;

        if let Err(e) = fs::rename(&partial_path, &final_path).await {
            let _ = fs::remove_file(&partial_path).await;
            return Err(AppError::Storage(format!(
                "Failed to move artifact into {}: {}",
                final_path.display(),
                e
            )));
        }

        info!(path = %final_path.display(), "Stored certificate artifact");
        Ok(final_path)
    }

    pub async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    #[instrument(skip(self))]
    pub async fn read(&self, path: &Path) -> Result<Vec<u8>, AppError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound(
                "Certificate file not found".to_string(),
            )),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to read artifact {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Best effort; a leftover file without a record is harmless.
    #[instrument(skip(self))]
    pub async fn remove(&self, diploma_id: &str) {
        let path = self.path_for(diploma_id);
        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove artifact");
            }
        }
    }
}
