use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

mod list;
pub mod media;

pub use list::{ContentList, Direction, ItemId};
pub use media::{MediaRef, UploadQueue, UploadTicket};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("position {at} is out of range for a list of {len} item(s)")]
    OutOfRange { at: usize, len: usize },
    #[error("unsupported media type {mime} for {filename}")]
    UnsupportedMedia { filename: String, mime: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// One block of a post body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text { content: String },
    Code { language: String, source: String },
    Media(MediaRef),
}

impl ContentItem {
    pub fn text(content: impl Into<String>) -> Self {
        ContentItem::Text {
            content: content.into(),
        }
    }

    pub fn code(language: impl Into<String>, source: impl Into<String>) -> Self {
        ContentItem::Code {
            language: language.into(),
            source: source.into(),
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            ContentItem::Text { .. } => "text",
            ContentItem::Code { .. } => "code",
            ContentItem::Media(media) => match media.kind {
                MediaKind::Image => "image",
                MediaKind::Video => "video",
            },
        }
    }

    /// Plain-text view used for summaries and search.
    pub fn plain_text(&self) -> &str {
        match self {
            ContentItem::Text { content } => content,
            ContentItem::Code { source, .. } => source,
            ContentItem::Media(media) => &media.filename,
        }
    }
}

/// A content item frozen into a post, caption inlined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostItem {
    #[serde(flatten)]
    pub item: ContentItem,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub caption: String,
}

impl PostItem {
    pub fn new(item: ContentItem, caption: impl Into<String>) -> Self {
        Self {
            item,
            caption: caption.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_item_serializes_flat_with_type_tag() -> anyhow::Result<()> {
        let item = PostItem::new(ContentItem::code("rust", "fn main() {}"), "entry point");
        let json = serde_json::to_value(&item)?;
        assert_eq!(json["type"], "code");
        assert_eq!(json["language"], "rust");
        assert_eq!(json["caption"], "entry point");

        let back: PostItem = serde_json::from_value(json)?;
        assert_eq!(back, item);
        Ok(())
    }

    #[test]
    fn missing_caption_defaults_to_empty() -> anyhow::Result<()> {
        let item: PostItem = serde_json::from_str(r#"{"type":"text","content":"hello"}"#)?;
        assert_eq!(item.caption, "");
        assert_eq!(item.item, ContentItem::text("hello"));
        Ok(())
    }

    #[test]
    fn media_kind_parses_from_lowercase() {
        assert_eq!("video".parse::<MediaKind>().ok(), Some(MediaKind::Video));
        assert_eq!(MediaKind::Image.to_string(), "image");
    }
}
