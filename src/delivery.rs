use crate::{format_bytes, CaptureError, DeliveryPort, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Writes finished images into a directory.
pub struct FileDelivery {
    output_dir: PathBuf,
}

impl FileDelivery {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl DeliveryPort for FileDelivery {
    async fn deliver(&self, bytes: Vec<u8>, filename: &str) -> Result<()> {
        fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            CaptureError::DeliveryFailed(format!("{}: {}", self.output_dir.display(), e))
        })?;

        let path = self.output_dir.join(filename);
        fs::write(&path, &bytes)
            .await
            .map_err(|e| CaptureError::DeliveryFailed(format!("{}: {}", path.display(), e)))?;

        info!("Saved {} ({})", path.display(), format_bytes(bytes.len()));
        Ok(())
    }
}
