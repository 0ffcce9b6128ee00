use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::JudgeError;

/// Private working directory for a single execution, removed on drop
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    /// Create a fresh directory under `root`, creating `root` if needed
    pub fn create(root: &Path) -> Result<Self, JudgeError> {
        std::fs::create_dir_all(root).map_err(JudgeError::Scratch)?;
        let dir = tempfile::Builder::new()
            .prefix("judge-")
            .tempdir_in(root)
            .map_err(JudgeError::Scratch)?;
        debug!("Created scratch dir {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `content` to `name` inside the directory
    pub async fn write_file(&self, name: &str, content: &str) -> Result<PathBuf, JudgeError> {
        let path = self.dir.path().join(name);
        tokio::fs::write(&path, content)
            .await
            .map_err(JudgeError::Scratch)?;
        Ok(path)
    }
}
