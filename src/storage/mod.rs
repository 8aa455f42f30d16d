use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use thiserror::Error;
use time::macros::date;

use crate::config::{ConfigPaths, StorageBackend, StorageOptions};
use crate::content::{ContentItem, PostItem};
use crate::post::{Hashtags, Post, PostId};
use crate::search::SearchQuery;

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("stored posts are malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("post {0} not found")]
    NotFound(PostId),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Whole-document persistence for the post list.
pub trait PostStore: Send {
    /// Returns `None` when nothing has been stored yet.
    fn load_all(&self) -> StorageResult<Option<Vec<Post>>>;
    fn save_all(&mut self, posts: &[Post]) -> StorageResult<()>;
    fn describe(&self) -> String;
}

/// In-memory post list backed by a [`PostStore`], newest first.
///
/// [`insert`](Self::insert) and [`replace`](Self::replace) only touch memory,
/// so a failed [`save`](Self::save) keeps the change around for a retry.
/// `create`, `replace_by_id` and `delete_by_id` save immediately and undo the
/// change when the save fails.
pub struct PostRepository {
    store: Box<dyn PostStore>,
    posts: Vec<Post>,
    dirty: bool,
}

impl PostRepository {
    pub fn open(store: Box<dyn PostStore>, seed_samples: bool) -> StorageResult<Self> {
        let loaded = store.load_all()?;
        let mut repo = Self {
            store,
            posts: Vec::new(),
            dirty: false,
        };
        match loaded {
            Some(posts) => {
                tracing::debug!(count = posts.len(), store = %repo.store.describe(), "loaded posts");
                repo.posts = posts;
            }
            None if seed_samples => {
                tracing::info!(store = %repo.store.describe(), "seeding first-run posts");
                repo.posts = sample_posts();
                repo.save()?;
            }
            None => {}
        }
        Ok(repo)
    }

    pub fn list(&self) -> &[Post] {
        &self.posts
    }

    pub fn get(&self, id: PostId) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == id)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Inserts at the front without saving. Returns the id actually assigned.
    pub fn insert(&mut self, mut post: Post) -> PostId {
        if self.get(post.id).is_some() {
            let next = self.posts.iter().map(|p| p.id).max().unwrap_or(post.id) + 1;
            tracing::debug!(requested = post.id, assigned = next, "post id collision");
            post.id = next;
        }
        let id = post.id;
        self.posts.insert(0, post);
        self.dirty = true;
        id
    }

    /// Full-record replace without saving; the stored id is kept.
    pub fn replace(&mut self, id: PostId, mut post: Post) -> StorageResult<()> {
        let slot = self
            .posts
            .iter_mut()
            .find(|existing| existing.id == id)
            .ok_or(StorageError::NotFound(id))?;
        post.id = id;
        *slot = post;
        self.dirty = true;
        Ok(())
    }

    pub fn create(&mut self, post: Post) -> StorageResult<PostId> {
        self.commit(|repo| Ok(repo.insert(post)))
    }

    pub fn replace_by_id(&mut self, id: PostId, post: Post) -> StorageResult<()> {
        self.commit(|repo| repo.replace(id, post))
    }

    pub fn delete_by_id(&mut self, id: PostId) -> StorageResult<Post> {
        self.commit(|repo| {
            let index = repo
                .posts
                .iter()
                .position(|post| post.id == id)
                .ok_or(StorageError::NotFound(id))?;
            repo.dirty = true;
            Ok(repo.posts.remove(index))
        })
    }

    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut Self) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let before = self.posts.clone();
        let was_dirty = self.dirty;
        let result = change(self).and_then(|value| self.save().map(|()| value));
        if result.is_err() {
            self.posts = before;
            self.dirty = was_dirty;
        }
        result
    }

    pub fn search_by_hashtag(&self, fragment: &str) -> Vec<&Post> {
        self.posts
            .iter()
            .filter(|post| post.hashtags.matches_fragment(fragment))
            .collect()
    }

    pub fn search(&self, query: &SearchQuery, limit: usize) -> Vec<&Post> {
        self.posts
            .iter()
            .filter(|post| query.matches(post))
            .take(limit)
            .collect()
    }

    pub fn save(&mut self) -> StorageResult<()> {
        match self.store.save_all(&self.posts) {
            Ok(()) => {
                self.dirty = false;
                tracing::debug!(count = self.posts.len(), "saved posts");
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, store = %self.store.describe(), "saving posts failed");
                Err(err)
            }
        }
    }
}

pub fn init(paths: &ConfigPaths, options: &StorageOptions) -> Result<PostRepository> {
    let store: Box<dyn PostStore> = match options.backend {
        StorageBackend::JsonFile => {
            let path = if options.posts_file.as_os_str().is_empty() {
                paths.posts_file.clone()
            } else {
                options.posts_file.clone()
            };
            Box::new(JsonFileStore::new(path))
        }
        StorageBackend::Memory => {
            tracing::warn!("memory storage backend selected, posts are lost when the process exits");
            Box::new(MemoryStore::with_quota(options.quota_bytes))
        }
    };
    PostRepository::open(store, options.seed_samples).context("opening post storage")
}

fn sample_posts() -> Vec<Post> {
    vec![
        Post {
            id: 2,
            title: "CSS Grid vs Flexbox".into(),
            date: date!(2024 - 01 - 14),
            body: "Flexbox lays out one dimension, Grid lays out rows and columns together.".into(),
            hashtags: Hashtags::parse("css, grid, flexbox, layout"),
            category: Some("css".into()),
            items: vec![PostItem::new(
                ContentItem::text(
                    "Flexbox: alignment along one axis, dynamic content.\n\
                     Grid: fixed two-dimensional layouts.",
                ),
                "",
            )],
        },
        Post {
            id: 1,
            title: "JavaScript closures".into(),
            date: date!(2024 - 01 - 15),
            body: "A closure remembers the lexical scope it was declared in.".into(),
            hashtags: Hashtags::parse("javascript, closure, scope"),
            category: Some("javascript".into()),
            items: vec![PostItem::new(
                ContentItem::code(
                    "javascript",
                    "function counter() {\n  let n = 0;\n  return () => ++n;\n}",
                ),
                "state kept alive by the returned function",
            )],
        },
    ]
}
