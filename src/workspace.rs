use crate::errors::*;
use std::path::Path;
use tempfile::TempDir;

const TMP_PREFIX: &str = "clair-scanner-";

/// Scratch directory holding the exported image for the duration of one
/// scan. Removed when destroyed, or on drop if the scan unwinds early.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create() -> Result<Workspace> {
        let dir = tempfile::Builder::new()
            .prefix(TMP_PREFIX)
            .tempdir()
            .context("Failed to create scan workspace")?;
        debug!("Created workspace: {:?}", dir.path());
        Ok(Workspace { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory tree. Cleanup failures are logged, they never
    /// fail the run.
    pub fn destroy(self) {
        let path = self.dir.path().to_path_buf();
        debug!("Removing workspace: {:?}", path);
        if let Err(err) = self.dir.close() {
            warn!("Failed to remove workspace {:?}: {:#}", path, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_destroy_removes_tree() -> Result<()> {
        let workspace = Workspace::create()?;
        let path = workspace.path().to_path_buf();
        fs::write(path.join("layer.tar"), b"x")?;
        workspace.destroy();
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_drop_removes_tree() -> Result<()> {
        let path = {
            let workspace = Workspace::create()?;
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
        Ok(())
    }
}
