use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Prefix of the retrieval locators handed out for uploaded files
pub const LOCATOR_PREFIX: &str = "/files/";

/// Byte storage of uploaded room files. Only deletion is driven by the room core.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Delete the bytes behind one locator
    async fn delete(&self, locator: &str) -> Result<(), BlobError>;
    /// Delete every file uploaded to a room
    async fn delete_room(&self, code: &str) -> Result<(), BlobError>;
}

#[derive(Debug)]
pub enum BlobError {
    Io(std::io::Error),
    InvalidLocator(String),
}

impl std::fmt::Display for BlobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobError::Io(e) => write!(f, "Blob storage error: {}", e),
            BlobError::InvalidLocator(locator) => write!(f, "Invalid blob locator '{}'", locator),
        }
    }
}

impl std::error::Error for BlobError {}

impl From<std::io::Error> for BlobError {
    fn from(e: std::io::Error) -> Self {
        BlobError::Io(e)
    }
}

/// Files stored under `<root>/<room code>/<file name>`
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a relative path below the root, refusing anything that could escape it
    fn resolve(&self, relative: &str) -> Result<PathBuf, BlobError> {
        let path = Path::new(relative);
        let mut parts = 0;
        for component in path.components() {
            match component {
                Component::Normal(_) => parts += 1,
                _ => return Err(BlobError::InvalidLocator(relative.to_string())),
            }
        }
        if parts == 0 {
            return Err(BlobError::InvalidLocator(relative.to_string()));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn delete(&self, locator: &str) -> Result<(), BlobError> {
        let relative = locator
            .strip_prefix(LOCATOR_PREFIX)
            .ok_or_else(|| BlobError::InvalidLocator(locator.to_string()))?;
        let path = self.resolve(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted blob {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Blob {} already gone", path.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_room(&self, code: &str) -> Result<(), BlobError> {
        if code.contains('/') || code.contains('\\') {
            return Err(BlobError::InvalidLocator(code.to_string()));
        }
        let dir = self.resolve(code)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!("Deleted blob directory {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
