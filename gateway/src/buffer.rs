use std::path::Path;
use tracing::debug;

/// Local fragment buffer. Only the delete primitive is in scope here; the
/// upload pipeline owns creation and layout of the fragment files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileBuffer;

impl FileBuffer {
    pub fn new() -> Self {
        Self
    }

    /// Remove a fragment file. Already-absent files are not an error, so a
    /// settled slice can be swept more than once.
    pub async fn remove(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        match tokio::fs::remove_file(path.as_ref()).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("fragment {} already gone", path.as_ref().display());
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
