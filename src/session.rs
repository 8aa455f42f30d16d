use crate::content::{ContentError, ContentItem, ContentList, MediaRef, UploadQueue, UploadTicket};
use crate::post::{Clock, ComposeRules, Post, PostDraft, PostId, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Compose,
    Edit { post_id: PostId },
}

/// One open composition or edit session.
///
/// Dropping the session discards the working content list.
#[derive(Debug)]
pub struct ComposeSession {
    mode: SessionMode,
    pub draft: PostDraft,
    content: ContentList,
    uploads: UploadQueue,
}

impl ComposeSession {
    pub fn compose() -> Self {
        Self {
            mode: SessionMode::Compose,
            draft: PostDraft::default(),
            content: ContentList::new(),
            uploads: UploadQueue::new(),
        }
    }

    pub fn edit(post: &Post) -> Self {
        let mut content = ContentList::new();
        content.load_for_edit(&post.items);
        Self {
            mode: SessionMode::Edit { post_id: post.id },
            draft: PostDraft::from_post(post),
            content,
            uploads: UploadQueue::new(),
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Points the session at a stored post so a later submit replaces it.
    pub fn rebind(&mut self, post_id: PostId) {
        self.mode = SessionMode::Edit { post_id };
    }

    pub fn content(&self) -> &ContentList {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut ContentList {
        &mut self.content
    }

    pub fn reserve_upload(&mut self) -> UploadTicket {
        self.uploads.reserve()
    }

    /// Appends every upload that is now ready in selection order. Returns how
    /// many items were appended.
    pub fn complete_upload(
        &mut self,
        ticket: UploadTicket,
        media: MediaRef,
        caption: impl Into<String>,
    ) -> Result<usize, ContentError> {
        let released = self.uploads.complete(ticket, media, caption);
        self.append_released(released)
    }

    pub fn abandon_upload(&mut self, ticket: UploadTicket) -> Result<usize, ContentError> {
        let released = self.uploads.abandon(ticket);
        self.append_released(released)
    }

    pub fn pending_uploads(&self) -> usize {
        self.uploads.pending()
    }

    /// Builds the post this session would save. Working state is untouched so
    /// a failed save can be retried.
    pub fn submit(&self, rules: ComposeRules, clock: &dyn Clock) -> Result<Post, ValidationError> {
        self.draft.validate(rules, self.content.len())?;
        let id = match self.mode {
            SessionMode::Compose => clock.post_id(),
            SessionMode::Edit { post_id } => post_id,
        };
        Ok(self
            .draft
            .clone()
            .into_post(id, clock.today(), self.content.snapshot()))
    }

    pub fn reset(&mut self) {
        self.draft = PostDraft::default();
        self.content.clear();
        self.uploads.reset();
    }

    fn append_released(&mut self, released: Vec<(MediaRef, String)>) -> Result<usize, ContentError> {
        let count = released.len();
        for (media, caption) in released {
            self.content.append(ContentItem::Media(media));
            let at = self.content.len() - 1;
            self.content.update_caption(at, caption)?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MediaKind;
    use crate::post::Hashtags;
    use assert_matches::assert_matches;
    use time::macros::{date, datetime};
    use time::OffsetDateTime;

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> OffsetDateTime {
            datetime!(2024-05-01 09:30 UTC)
        }
    }

    fn image(name: &str) -> MediaRef {
        MediaRef::from_bytes(name, b"png").expect("media")
    }

    #[test]
    fn compose_submit_assigns_clock_id_and_snapshot() -> anyhow::Result<()> {
        let mut session = ComposeSession::compose();
        session.draft.title = "Ownership".into();
        session.content_mut().append(ContentItem::text("moves"));
        session.content_mut().update_caption(0, "basics")?;

        let post = session.submit(ComposeRules::default(), &FixedClock)?;
        assert_eq!(post.id, 1_714_555_800_000);
        assert_eq!(post.date, date!(2024 - 05 - 01));
        assert_eq!(post.items.len(), 1);
        assert_eq!(post.items[0].caption, "basics");
        assert_eq!(session.content().len(), 1, "submit must not clear working state");
        Ok(())
    }

    #[test]
    fn edit_session_restores_and_keeps_id() -> anyhow::Result<()> {
        let mut original = ComposeSession::compose();
        original.draft.title = "Lifetimes".into();
        original.draft.hashtags = Hashtags::parse("rust");
        original.content_mut().append(ContentItem::text("a"));
        original.content_mut().append(ContentItem::text("b"));
        original.content_mut().update_caption(1, "second")?;
        let post = original.submit(ComposeRules::default(), &FixedClock)?;

        let mut session = ComposeSession::edit(&post);
        assert_eq!(session.mode(), SessionMode::Edit { post_id: post.id });
        assert_eq!(session.content().captions(), original.content().captions());

        session.content_mut().reorder(1, 0)?;
        let edited = session.submit(ComposeRules::default(), &FixedClock)?;
        assert_eq!(edited.id, post.id);
        assert_eq!(edited.items[0].caption, "second");
        Ok(())
    }

    #[test]
    fn submit_rejects_invalid_draft() {
        let session = ComposeSession::compose();
        assert_matches!(
            session.submit(ComposeRules::default(), &FixedClock),
            Err(ValidationError::MissingTitle)
        );
    }

    #[test]
    fn out_of_order_uploads_append_in_selection_order() -> anyhow::Result<()> {
        let mut session = ComposeSession::compose();
        let a = session.reserve_upload();
        let b = session.reserve_upload();

        assert_eq!(session.complete_upload(b, image("b.png"), "second")?, 0);
        assert_eq!(session.complete_upload(a, image("a.png"), "first")?, 2);

        let names: Vec<_> = session.content().items().map(ContentItem::plain_text).collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
        assert_eq!(session.content().caption(1), Some("second"));
        assert_matches!(
            session.content().get(0),
            Some(ContentItem::Media(MediaRef { kind: MediaKind::Image, .. }))
        );
        Ok(())
    }

    #[test]
    fn reset_discards_working_state() {
        let mut session = ComposeSession::compose();
        session.draft.title = "x".into();
        session.content_mut().append(ContentItem::text("y"));
        let _pending = session.reserve_upload();
        session.reset();
        assert!(session.content().is_empty());
        assert_eq!(session.draft, PostDraft::default());
        assert_eq!(session.pending_uploads(), 0);
    }
}
