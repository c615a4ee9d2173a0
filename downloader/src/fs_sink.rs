//! Filesystem [`Sink`]: one `<name>.<ext>` file per macro.

use async_trait::async_trait;
use macrofetch_shared::{MacroImage, Sink, StorageError};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Extension given to every written image.
pub const DEFAULT_EXTENSION: &str = "gif";

const PROBE_FILE: &str = ".macrofetch-write-test";

pub struct FsSink {
    dir: PathBuf,
    extension: String,
}

impl FsSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Destination path for a macro, rejecting names that would escape `dir`.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0']);
        if invalid {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", name, self.extension)))
    }
}

/// Create or truncate `path`, readable only by the owner on Unix.
async fn write_private(path: &Path, body: &[u8]) -> Result<(), StorageError> {
    let write_err = |source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await.map_err(write_err)?;
    file.write_all(body).await.map_err(write_err)?;
    file.flush().await.map_err(write_err)?;
    Ok(())
}

#[async_trait]
impl Sink for FsSink {
    async fn probe_writable(&self) -> Result<(), StorageError> {
        let path = self.dir.join(PROBE_FILE);
        write_private(&path, b"test").await?;
        fs::remove_file(&path)
            .await
            .map_err(|source| StorageError::Remove { path, source })?;
        debug!(dir = %self.dir.display(), "Destination directory is writable");
        Ok(())
    }

    async fn persist(&mut self, image: &MacroImage) -> Result<(), StorageError> {
        let path = self.path_for(image.name())?;
        write_private(&path, &image.body).await
    }
}
