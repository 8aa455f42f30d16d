use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::post::Post;

use super::{PostStore, StorageError, StorageResult};

const TMP_EXTENSION: &str = "json.tmp";

/// Posts kept as a pretty-printed JSON array in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, path: &Path, source: io::Error) -> StorageError {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl PostStore for JsonFileStore {
    fn load_all(&self) -> StorageResult<Option<Vec<Post>>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(&self.path, err)),
        };
        if raw.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }
        let posts = serde_json::from_str(&raw)?;
        Ok(Some(posts))
    }

    fn save_all(&mut self, posts: &[Post]) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| self.io_error(parent, err))?;
        }
        let json = serde_json::to_string_pretty(posts)?;
        let tmp_path = self.path.with_extension(TMP_EXTENSION);
        fs::write(&tmp_path, json).map_err(|err| self.io_error(&tmp_path, err))?;
        fs::rename(&tmp_path, &self.path).map_err(|err| self.io_error(&self.path, err))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::Hashtags;
    use assert_matches::assert_matches;
    use tempfile::TempDir;
    use time::macros::date;

    fn sample() -> Post {
        Post {
            id: 1_705_276_800_000,
            title: "Flexbox".into(),
            date: date!(2024 - 01 - 15),
            body: "justify-content and align-items".into(),
            hashtags: Hashtags::parse("css, flexbox"),
            category: None,
            items: Vec::new(),
        }
    }

    #[test]
    fn missing_file_loads_as_none() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = JsonFileStore::new(temp.path().join("posts.json"));
        assert!(store.load_all()?.is_none());
        Ok(())
    }

    #[test]
    fn save_then_load_creates_parent_and_leaves_no_tmp() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("data").join("posts.json");
        let mut store = JsonFileStore::new(&path);
        store.save_all(&[sample()])?;

        assert!(path.exists());
        assert!(!path.with_extension(TMP_EXTENSION).exists());
        let loaded = store.load_all()?.expect("posts present");
        assert_eq!(loaded, vec![sample()]);
        Ok(())
    }

    #[test]
    fn malformed_file_is_reported() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("posts.json");
        fs::write(&path, "[{\"id\": ")?;
        let store = JsonFileStore::new(&path);
        assert_matches!(store.load_all(), Err(StorageError::Malformed(_)));
        Ok(())
    }
}
