use std::sync::Arc;

use thiserror::Error;

use crate::config::AppConfig;
use crate::content::ContentError;
use crate::post::{Clock, Post, PostId, SystemClock, ValidationError};
use crate::session::{ComposeSession, SessionMode};
use crate::storage::{PostRepository, StorageError};

mod actions;
mod owner;
pub mod state;

pub use actions::{ActionDispatcher, EditOp, EditOpParseError};
pub use owner::OwnerMode;
pub use state::{AppState, Notice, NoticeLevel, PostFilter};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("owner mode is locked")]
    OwnerLocked,
    #[error("incorrect owner password")]
    WrongPassword,
    #[error("no composition session is open")]
    NoSession,
    #[error("post {0} does not exist")]
    UnknownPost(PostId),
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Answers a yes/no question before a destructive action.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

pub struct App {
    pub config: Arc<AppConfig>,
    repo: PostRepository,
    state: AppState,
    clock: Box<dyn Clock + Send>,
}

impl App {
    pub fn new(config: Arc<AppConfig>, repo: PostRepository, owner: OwnerMode) -> Self {
        Self::with_clock(config, repo, owner, Box::new(SystemClock))
    }

    pub fn with_clock(
        config: Arc<AppConfig>,
        repo: PostRepository,
        owner: OwnerMode,
        clock: Box<dyn Clock + Send>,
    ) -> Self {
        Self {
            config,
            repo,
            state: AppState::new(owner),
            clock,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    pub fn repository(&self) -> &PostRepository {
        &self.repo
    }

    pub fn unlock_owner(&mut self, password: &str) -> Result<(), AppError> {
        if password != self.config.owner.password {
            self.state
                .notify(NoticeLevel::Error, "Incorrect owner password.");
            return Err(AppError::WrongPassword);
        }
        self.state.owner.set(true)?;
        self.state.notify(NoticeLevel::Success, "Owner mode enabled.");
        Ok(())
    }

    pub fn lock_owner(&mut self) -> Result<(), AppError> {
        self.state.owner.set(false)?;
        self.state.session = None;
        self.state.notify(NoticeLevel::Info, "Owner mode disabled.");
        Ok(())
    }

    pub fn set_filter(&mut self, filter: PostFilter) {
        self.state.filter = filter;
    }

    pub fn visible_posts(&self) -> Vec<&Post> {
        self.repo
            .list()
            .iter()
            .filter(|post| self.state.filter.accepts(post))
            .collect()
    }

    /// Opens a fresh composition session, discarding any open one.
    pub fn open_compose(&mut self) -> Result<&mut ComposeSession, AppError> {
        self.require_owner()?;
        Ok(self.state.session.insert(ComposeSession::compose()))
    }

    pub fn open_edit(&mut self, id: PostId) -> Result<&mut ComposeSession, AppError> {
        self.require_owner()?;
        let post = self.repo.get(id).ok_or(AppError::UnknownPost(id))?;
        let session = ComposeSession::edit(post);
        Ok(self.state.session.insert(session))
    }

    pub fn session_mut(&mut self) -> Result<&mut ComposeSession, AppError> {
        self.state.session.as_mut().ok_or(AppError::NoSession)
    }

    pub fn apply(&mut self, op: &EditOp) -> Result<(), AppError> {
        let session = self.session_mut()?;
        ActionDispatcher::new(session.content_mut()).apply(op)?;
        Ok(())
    }

    pub fn cancel_session(&mut self) {
        if self.state.session.take().is_some() {
            tracing::debug!("composition session cancelled");
        }
    }

    /// Validates and stores the open session. The session closes only when the
    /// post was written; after a storage failure it stays open and points at
    /// the in-memory post, so a retry does not duplicate it.
    pub fn submit_session(&mut self) -> Result<PostId, AppError> {
        self.require_owner()?;
        let session = self.state.session.as_mut().ok_or(AppError::NoSession)?;
        let post = match session.submit(self.config.compose, self.clock.as_ref()) {
            Ok(post) => post,
            Err(err) => {
                self.state.notify(NoticeLevel::Error, err.to_string());
                return Err(err.into());
            }
        };

        let id = match session.mode() {
            SessionMode::Compose => {
                let id = self.repo.insert(post);
                session.rebind(id);
                id
            }
            SessionMode::Edit { post_id } => {
                if let Err(err) = self.repo.replace(post_id, post) {
                    self.state.notify(NoticeLevel::Error, err.to_string());
                    return Err(err.into());
                }
                post_id
            }
        };

        if let Err(err) = self.repo.save() {
            self.state.notify(
                NoticeLevel::Error,
                format!("Saving failed, your post is kept so you can retry: {err}"),
            );
            return Err(err.into());
        }
        self.state.session = None;
        tracing::info!(post_id = id, "post saved");
        self.state.notify(NoticeLevel::Success, "Post published.");
        Ok(id)
    }

    pub fn retry_save(&mut self) -> Result<(), AppError> {
        self.repo.save()?;
        self.state.session = None;
        self.state.notify(NoticeLevel::Success, "Posts saved.");
        Ok(())
    }

    pub fn delete_post(&mut self, id: PostId, confirm: &mut dyn Confirm) -> Result<Post, AppError> {
        self.require_owner()?;
        let post = self.repo.get(id).ok_or(AppError::UnknownPost(id))?;
        if !confirm.confirm(&format!("Delete \"{}\"?", post.title)) {
            return Err(AppError::Cancelled);
        }
        let removed = match self.repo.delete_by_id(id) {
            Ok(removed) => removed,
            Err(err) => {
                self.state.notify(NoticeLevel::Error, err.to_string());
                return Err(err.into());
            }
        };
        if let Some(session) = &self.state.session {
            if session.mode() == (SessionMode::Edit { post_id: id }) {
                self.state.session = None;
            }
        }
        tracing::info!(post_id = id, "post deleted");
        self.state.notify(NoticeLevel::Success, "Post deleted.");
        Ok(removed)
    }

    fn require_owner(&self) -> Result<(), AppError> {
        if self.state.owner.is_unlocked() {
            Ok(())
        } else {
            Err(AppError::OwnerLocked)
        }
    }
}
