use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, OffsetDateTime};

use crate::content::PostItem;

time::serde::format_description!(post_date, Date, "[year]-[month]-[day]");

const DATE_FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day]");

pub type PostId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    #[serde(with = "post_date")]
    pub date: Date,
    #[serde(default, alias = "content")]
    pub body: String,
    #[serde(default)]
    pub hashtags: Hashtags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub items: Vec<PostItem>,
}

impl Post {
    /// Short single-line preview of the body or first text item.
    pub fn summary(&self) -> String {
        use unicode_segmentation::UnicodeSegmentation;

        const SUMMARY_GRAPHEMES: usize = 100;
        let source = if self.body.trim().is_empty() {
            self.items
                .iter()
                .map(|stored| stored.item.plain_text())
                .find(|text| !text.trim().is_empty())
                .unwrap_or_default()
        } else {
            self.body.as_str()
        };
        let flat = source.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut graphemes = flat.graphemes(true);
        let mut out: String = graphemes.by_ref().take(SUMMARY_GRAPHEMES).collect();
        if graphemes.next().is_some() {
            out.push_str("...");
        }
        out
    }
}

/// Ordered, duplicate-free hashtags. Comparison is case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hashtags(IndexSet<String>);

impl Hashtags {
    /// Parses comma separated input, dropping blanks, a leading `#` and repeats.
    pub fn parse(input: &str) -> Self {
        let mut tags = Self::default();
        for raw in input.split(',') {
            tags.insert(raw);
        }
        tags
    }

    pub fn insert(&mut self, raw: &str) -> bool {
        let tag = raw.trim().trim_start_matches('#').trim();
        if tag.is_empty() {
            return false;
        }
        self.0.insert(tag.to_owned())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    /// Case-insensitive substring match against any tag.
    pub fn matches_fragment(&self, fragment: &str) -> bool {
        let needle = fragment.to_lowercase();
        self.0.iter().any(|tag| tag.to_lowercase().contains(&needle))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Hashtags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = Self::default();
        for tag in iter {
            tags.insert(tag.as_ref());
        }
        tags
    }
}

impl fmt::Display for Hashtags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for tag in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "#{tag}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("a title is required")]
    MissingTitle,
    #[error("a body is required")]
    MissingBody,
    #[error("a date is required")]
    MissingDate,
    #[error("at least one content item is required")]
    MissingItems,
}

/// Which fields a submitted draft must carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeRules {
    pub require_body: bool,
    pub require_items: bool,
}

/// Form fields of a post being composed or edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub date: Option<Date>,
    pub body: String,
    pub hashtags: Hashtags,
    pub category: Option<String>,
}

impl PostDraft {
    pub fn from_post(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            date: Some(post.date),
            body: post.body.clone(),
            hashtags: post.hashtags.clone(),
            category: post.category.clone(),
        }
    }

    pub fn validate(&self, rules: ComposeRules, item_count: usize) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if rules.require_body && self.body.trim().is_empty() {
            return Err(ValidationError::MissingBody);
        }
        if rules.require_items && item_count == 0 {
            return Err(ValidationError::MissingItems);
        }
        Ok(())
    }

    pub fn into_post(self, id: PostId, today: Date, items: Vec<PostItem>) -> Post {
        let category = self
            .category
            .map(|category| category.trim().to_owned())
            .filter(|category| !category.is_empty());
        Post {
            id,
            title: self.title.trim().to_owned(),
            date: self.date.unwrap_or(today),
            body: self.body.trim().to_owned(),
            hashtags: self.hashtags,
            category,
            items,
        }
    }
}

/// Source of post ids and default dates.
pub trait Clock {
    fn now(&self) -> OffsetDateTime;

    fn post_id(&self) -> PostId {
        (self.now().unix_timestamp_nanos() / 1_000_000) as PostId
    }

    fn today(&self) -> Date {
        self.now().date()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

pub fn parse_date(input: &str) -> Option<Date> {
    Date::parse(input.trim(), DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentItem;
    use assert_matches::assert_matches;
    use time::macros::date;

    #[test]
    fn hashtags_parse_trims_and_drops_repeats() {
        let tags = Hashtags::parse(" rust, #serde ,, rust,Rust ");
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["rust", "serde", "Rust"]);
        assert_eq!(tags.to_string(), "#rust #serde #Rust");
        assert!(tags.matches_fragment("SER"));
        assert!(!tags.matches_fragment("tokio"));
    }

    #[test]
    fn legacy_record_with_content_field_loads() -> anyhow::Result<()> {
        let raw = r#"{
            "id": 1,
            "title": "JavaScript basics",
            "content": "variables and functions",
            "date": "2024-01-15",
            "hashtags": ["javascript", "basics"]
        }"#;
        let post: Post = serde_json::from_str(raw)?;
        assert_eq!(post.body, "variables and functions");
        assert_eq!(post.date, date!(2024 - 01 - 15));
        assert!(post.items.is_empty());
        assert_eq!(post.hashtags.len(), 2);

        let json = serde_json::to_value(&post)?;
        assert_eq!(json["date"], "2024-01-15");
        assert_eq!(json["body"], "variables and functions");
        Ok(())
    }

    #[test]
    fn draft_validation_respects_rules() {
        let mut draft = PostDraft::default();
        assert_matches!(
            draft.validate(ComposeRules::default(), 0),
            Err(ValidationError::MissingTitle)
        );

        draft.title = "Closures".into();
        assert!(draft.validate(ComposeRules::default(), 0).is_ok());

        let strict = ComposeRules {
            require_body: false,
            require_items: true,
        };
        assert_matches!(draft.validate(strict, 0), Err(ValidationError::MissingItems));
        assert!(draft.validate(strict, 1).is_ok());
    }

    #[test]
    fn into_post_defaults_date_and_trims() {
        let draft = PostDraft {
            title: "  Grid vs Flexbox ".into(),
            body: " one dimension ".into(),
            category: Some("  ".into()),
            ..PostDraft::default()
        };
        let post = draft.into_post(7, date!(2024 - 01 - 14), vec![]);
        assert_eq!(post.title, "Grid vs Flexbox");
        assert_eq!(post.body, "one dimension");
        assert_eq!(post.date, date!(2024 - 01 - 14));
        assert_eq!(post.category, None);
    }

    #[test]
    fn summary_falls_back_to_first_text_item() {
        let post = Post {
            id: 1,
            title: "t".into(),
            date: date!(2024 - 01 - 01),
            body: String::new(),
            hashtags: Hashtags::default(),
            category: None,
            items: vec![PostItem::new(ContentItem::text("first\nline"), "")],
        };
        assert_eq!(post.summary(), "first line");
    }

    #[test]
    fn parse_date_accepts_iso_dates_only() {
        assert_eq!(parse_date("2024-02-29"), Some(date!(2024 - 02 - 29)));
        assert_eq!(parse_date("29/02/2024"), None);
    }
}
