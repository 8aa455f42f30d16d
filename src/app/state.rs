use crate::post::Post;
use crate::session::ComposeSession;

use super::owner::OwnerMode;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PostFilter {
    #[default]
    All,
    Category(String),
    Hashtag(String),
}

impl PostFilter {
    pub fn accepts(&self, post: &Post) -> bool {
        match self {
            PostFilter::All => true,
            PostFilter::Category(category) => post
                .category
                .as_deref()
                .is_some_and(|existing| existing.eq_ignore_ascii_case(category)),
            PostFilter::Hashtag(fragment) => post.hashtags.matches_fragment(fragment),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct AppState {
    pub filter: PostFilter,
    pub session: Option<ComposeSession>,
    pub owner: OwnerMode,
    notice: Option<Notice>,
}

impl AppState {
    pub fn new(owner: OwnerMode) -> Self {
        Self {
            owner,
            ..Self::default()
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    pub fn notify<S: Into<String>>(&mut self, level: NoticeLevel, message: S) {
        let message = message.into();
        match level {
            NoticeLevel::Error => tracing::warn!(%message, "notice"),
            _ => tracing::debug!(%message, "notice"),
        }
        self.notice = Some(Notice { level, message });
    }
}
