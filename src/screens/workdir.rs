use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};

pub const DIR_NAME: &str = ".screens";
const MAX_CANDIDATE_DIRS: usize = 500;

/// The scratch directory screenshots are captured into.
#[derive(Debug, Clone)]
pub struct ScreensDir {
    path: PathBuf,
}

impl ScreensDir {
    /// Picks the first of `.screens`, `.screens001`, … under `anchor` that
    /// is missing or an empty directory.
    pub fn locate(anchor: &Path) -> Result<Self> {
        for i in 0..MAX_CANDIDATE_DIRS {
            let name = if i == 0 {
                DIR_NAME.to_string()
            } else {
                format!("{}{:03}", DIR_NAME, i)
            };
            let path = anchor.join(name);

            if !path.exists() {
                return Ok(Self { path });
            }
            if path.is_dir() && fs::read_dir(&path)?.next().is_none() {
                return Ok(Self { path });
            }
        }

        Err(Error::InvalidArgument(format!(
            "failed to find a suitable screenshot directory under {:?}",
            anchor
        )))
    }

    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(&self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes captured files except `keep`, then removes the directory if
    /// nothing is left in it. Returns the number of files deleted.
    pub fn cleanup(&self, captured: &[PathBuf], keep: &[&Path]) -> Result<usize> {
        let mut removed = 0;
        for file in captured {
            if keep.contains(&file.as_path()) {
                continue;
            }
            match fs::remove_file(file) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        if self.path.is_dir() {
            if fs::read_dir(&self.path)?.next().is_none() {
                fs::remove_dir(&self.path)?;
                info!("removed {:?}", self.path);
            } else {
                warn!("keeping {:?}, it still holds files", self.path);
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_free_name_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let first = ScreensDir::locate(dir.path()).unwrap();
        assert_eq!(first.path(), dir.path().join(".screens"));

        first.create().unwrap();
        // empty directories are reused
        assert_eq!(ScreensDir::locate(dir.path()).unwrap().path(), first.path());

        fs::write(first.path().join("pre_001.png"), b"x").unwrap();
        fs::write(dir.path().join(".screens001"), b"a file").unwrap();
        assert_eq!(
            ScreensDir::locate(dir.path()).unwrap().path(),
            dir.path().join(".screens002")
        );
    }

    #[test]
    fn test_cleanup_keeps_selected_files() {
        let dir = tempfile::tempdir().unwrap();
        let screens = ScreensDir::locate(dir.path()).unwrap();
        screens.create().unwrap();

        let files: Vec<PathBuf> = (1..=3)
            .map(|i| screens.path().join(format!("pre_{:03}.png", i)))
            .collect();
        for file in &files {
            fs::write(file, b"x").unwrap();
        }

        let removed = screens.cleanup(&files, &[files[1].as_path()]).unwrap();
        assert_eq!(removed, 2);
        assert!(files[1].exists());
        assert!(screens.path().is_dir());

        let removed = screens.cleanup(&files, &[]).unwrap();
        assert_eq!(removed, 1);
        assert!(!screens.path().exists());
    }
}
