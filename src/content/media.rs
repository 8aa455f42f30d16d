use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{ContentError, MediaKind};

/// Reference to an image or video, usually an embedded `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub uri: String,
    pub filename: String,
    pub kind: MediaKind,
}

impl MediaRef {
    pub fn from_bytes(filename: &str, bytes: &[u8]) -> Result<Self, ContentError> {
        let mime = mime_guess::from_path(filename).first_or_octet_stream();
        let kind = if mime.type_() == mime_guess::mime::IMAGE {
            MediaKind::Image
        } else if mime.type_() == mime_guess::mime::VIDEO {
            MediaKind::Video
        } else {
            return Err(ContentError::UnsupportedMedia {
                filename: filename.to_owned(),
                mime: mime.essence_str().to_owned(),
            });
        };
        let uri = format!("data:{};base64,{}", mime.essence_str(), STANDARD.encode(bytes));
        Ok(Self {
            uri,
            filename: filename.to_owned(),
            kind,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("reading media {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_bytes(&filename, &bytes)?)
    }

    pub fn encoded_len(&self) -> usize {
        self.uri.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UploadTicket(u64);

#[derive(Debug)]
enum Slot {
    Ready(MediaRef, String),
    Abandoned,
}

/// Releases completed uploads in the order they were selected, whatever
/// order the reads finish in.
#[derive(Debug, Default)]
pub struct UploadQueue {
    next_ticket: u64,
    next_release: u64,
    slots: BTreeMap<u64, Slot>,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self) -> UploadTicket {
        let ticket = UploadTicket(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }

    pub fn pending(&self) -> usize {
        (self.next_ticket - self.next_release) as usize - self.slots.len()
    }

    pub fn complete(
        &mut self,
        ticket: UploadTicket,
        media: MediaRef,
        caption: impl Into<String>,
    ) -> Vec<(MediaRef, String)> {
        if ticket.0 < self.next_release {
            tracing::warn!(ticket = ticket.0, "ignoring completion for released upload");
            return Vec::new();
        }
        self.slots.insert(ticket.0, Slot::Ready(media, caption.into()));
        self.release()
    }

    pub fn abandon(&mut self, ticket: UploadTicket) -> Vec<(MediaRef, String)> {
        if ticket.0 < self.next_release {
            return Vec::new();
        }
        self.slots.insert(ticket.0, Slot::Abandoned);
        self.release()
    }

    pub fn reset(&mut self) {
        self.next_release = self.next_ticket;
        self.slots.clear();
    }

    fn release(&mut self) -> Vec<(MediaRef, String)> {
        let mut released = Vec::new();
        while let Some(slot) = self.slots.remove(&self.next_release) {
            self.next_release += 1;
            if let Slot::Ready(media, caption) = slot {
                released.push((media, caption));
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn media(name: &str) -> MediaRef {
        MediaRef::from_bytes(name, b"bytes").expect("media")
    }

    #[test]
    fn from_bytes_builds_data_uri() -> anyhow::Result<()> {
        let media = MediaRef::from_bytes("cat.png", b"hi")?;
        assert_eq!(media.kind, MediaKind::Image);
        assert_eq!(media.uri, "data:image/png;base64,aGk=");
        assert_eq!(media.filename, "cat.png");

        let clip = MediaRef::from_bytes("clip.mp4", b"")?;
        assert_eq!(clip.kind, MediaKind::Video);
        Ok(())
    }

    #[test]
    fn from_bytes_rejects_non_media() {
        assert_matches!(
            MediaRef::from_bytes("notes.txt", b"text"),
            Err(ContentError::UnsupportedMedia { .. })
        );
    }

    #[test]
    fn completions_release_in_ticket_order() {
        let mut queue = UploadQueue::new();
        let first = queue.reserve();
        let second = queue.reserve();
        let third = queue.reserve();

        assert!(queue.complete(third, media("c.png"), "c").is_empty());
        assert!(queue.complete(second, media("b.png"), "b").is_empty());
        assert_eq!(queue.pending(), 1);

        let released = queue.complete(first, media("a.png"), "a");
        let names: Vec<_> = released.iter().map(|(m, c)| (m.filename.as_str(), c.as_str())).collect();
        assert_eq!(names, vec![("a.png", "a"), ("b.png", "b"), ("c.png", "c")]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn abandoned_upload_does_not_block_later_ones() {
        let mut queue = UploadQueue::new();
        let stalled = queue.reserve();
        let next = queue.reserve();

        assert!(queue.complete(next, media("b.png"), "").is_empty());
        let released = queue.abandon(stalled);
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].0.filename, "b.png");

        assert!(queue.complete(stalled, media("late.png"), "").is_empty());
    }
}
