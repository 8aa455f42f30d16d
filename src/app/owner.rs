use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::storage::{StorageError, StorageResult};

#[derive(Debug, Default, Serialize, Deserialize)]
struct OwnerRecord {
    unlocked: bool,
}

/// Whether create/edit/delete controls are offered. Not a security boundary.
#[derive(Debug, Clone, Default)]
pub struct OwnerMode {
    unlocked: bool,
    path: Option<PathBuf>,
}

impl OwnerMode {
    pub fn in_memory(unlocked: bool) -> Self {
        Self {
            unlocked,
            path: None,
        }
    }

    pub fn load(path: &Path) -> StorageResult<Self> {
        let record = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str::<OwnerRecord>(&raw)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => OwnerRecord::default(),
            Err(source) => {
                return Err(StorageError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Self {
            unlocked: record.unlocked,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    /// Persists the flag first; the in-memory value changes only once the
    /// write succeeded.
    pub fn set(&mut self, unlocked: bool) -> StorageResult<()> {
        if let Some(path) = &self.path {
            let json = serde_json::to_string(&OwnerRecord { unlocked })?;
            fs::write(path, json).map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
        }
        self.unlocked = unlocked;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn flag_persists_across_loads() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("owner.json");

        let mut owner = OwnerMode::load(&path)?;
        assert!(!owner.is_unlocked());
        owner.set(true)?;

        assert!(OwnerMode::load(&path)?.is_unlocked());
        owner.set(false)?;
        assert!(!OwnerMode::load(&path)?.is_unlocked());
        Ok(())
    }

    #[test]
    fn failed_write_leaves_flag_unchanged() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("missing-dir").join("owner.json");

        let mut owner = OwnerMode::load(&path)?;
        assert_matches!(owner.set(true), Err(StorageError::Io { .. }));
        assert!(!owner.is_unlocked());
        Ok(())
    }
}
