use crate::post::Post;

use super::{PostStore, StorageError, StorageResult};

/// Serialized blob with a byte quota, the way a browser key-value store
/// behaves.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blob: Option<String>,
    quota: Option<usize>,
}

impl MemoryStore {
    /// A quota of 0 means unlimited.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            blob: None,
            quota: (quota > 0).then_some(quota),
        }
    }

    pub fn blob(&self) -> Option<&str> {
        self.blob.as_deref()
    }
}

impl PostStore for MemoryStore {
    fn load_all(&self) -> StorageResult<Option<Vec<Post>>> {
        match &self.blob {
            Some(blob) => Ok(Some(serde_json::from_str(blob)?)),
            None => Ok(None),
        }
    }

    fn save_all(&mut self, posts: &[Post]) -> StorageResult<()> {
        let json = serde_json::to_string(posts)?;
        if let Some(quota) = self.quota {
            if json.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    needed: json.len(),
                    quota,
                });
            }
        }
        self.blob = Some(json);
        Ok(())
    }

    fn describe(&self) -> String {
        match self.quota {
            Some(quota) => format!("memory store ({quota} byte quota)"),
            None => "memory store".to_string(),
        }
    }
}
