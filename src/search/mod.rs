use std::cmp::{max, min};

use regex::{Regex, RegexBuilder};
use time::Date;

use crate::post::{parse_date, Post};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<Date>,
    pub to: Option<Date>, // inclusive
}

impl DateRange {
    pub fn has_range(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    pub fn merge(&mut self, other: DateRange) {
        if let Some(from) = other.from {
            self.from = Some(match self.from {
                Some(existing) => max(existing, from),
                None => from,
            });
        }
        if let Some(to) = other.to {
            self.to = Some(match self.to {
                Some(existing) => min(existing, to),
                None => to,
            });
        }
    }

    pub fn contains(&self, date: Date) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub terms: Vec<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub date: DateRange,
    pub regex: Option<Regex>,
}

impl SearchQuery {
    pub fn has_terms(&self) -> bool {
        !self.terms.is_empty()
    }

    pub fn has_filters(&self) -> bool {
        !self.tags.is_empty() || self.category.is_some() || self.date.has_range()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_terms() && !self.has_filters() && self.regex.is_none()
    }

    pub fn matches(&self, post: &Post) -> bool {
        if let Some(category) = &self.category {
            let matches = post
                .category
                .as_deref()
                .is_some_and(|existing| existing.to_lowercase() == *category);
            if !matches {
                return false;
            }
        }
        if !self.date.contains(post.date) {
            return false;
        }
        if !self.tags.iter().all(|tag| post.hashtags.matches_fragment(tag)) {
            return false;
        }
        if let Some(regex) = &self.regex {
            if !regex.is_match(&post.title) && !regex.is_match(&post.body) {
                return false;
            }
        }
        let title = post.title.to_lowercase();
        let body = post.body.to_lowercase();
        self.terms.iter().all(|term| {
            title.contains(term.as_str())
                || body.contains(term.as_str())
                || post.hashtags.matches_fragment(term)
                || post
                    .items
                    .iter()
                    .any(|stored| stored.item.plain_text().to_lowercase().contains(term.as_str()))
        })
    }
}

/// Parses `tag:x`, `#x`, `category:x` and `date:` ranges; everything else is a
/// free term. Terms are lowercased.
pub fn parse_query(input: &str) -> SearchQuery {
    let mut query = SearchQuery::default();
    for raw in input.split_whitespace() {
        if let Some(tag) = raw.strip_prefix("tag:").or_else(|| raw.strip_prefix('#')) {
            if let Some(value) = sanitize_term(tag) {
                query.tags.push(value.to_lowercase());
            }
            continue;
        }
        if let Some(category) = raw.strip_prefix("category:") {
            if let Some(value) = sanitize_term(category) {
                query.category = Some(value.to_lowercase());
            }
            continue;
        }
        if let Some(range) = raw.strip_prefix("date:") {
            query.date.merge(parse_date_range(range));
            continue;
        }
        if let Some(value) = sanitize_term(raw) {
            query.terms.push(value.to_lowercase());
        }
    }
    query
}

/// Moves the free terms into a case-insensitive regex over title and body.
pub fn apply_regex(query: &mut SearchQuery, input: &str) -> Result<(), regex::Error> {
    let Some(pattern) = regex_pattern_from_input(input) else {
        return Ok(());
    };
    let regex = RegexBuilder::new(&pattern).case_insensitive(true).build()?;
    query.regex = Some(regex);
    query.terms.clear();
    Ok(())
}

pub fn regex_pattern_from_input(input: &str) -> Option<String> {
    let parts: Vec<&str> = input
        .split_whitespace()
        .filter(|raw| {
            !(raw.starts_with("tag:")
                || raw.starts_with('#')
                || raw.starts_with("category:")
                || raw.starts_with("date:"))
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn sanitize_term(raw: &str) -> Option<String> {
    let term: String = raw
        .chars()
        .filter(|ch| ch.is_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | '+'))
        .collect();
    if term.is_empty() {
        None
    } else {
        Some(term)
    }
}

fn parse_date_range(spec: &str) -> DateRange {
    let mut range = DateRange::default();
    let parts: Vec<&str> = spec.split("..").collect();
    match parts.as_slice() {
        [single] => {
            if let Some(date) = parse_date(single) {
                range.from = Some(date);
                range.to = Some(date);
            }
        }
        [from, to] => {
            range.from = parse_date(from);
            range.to = parse_date(to);
        }
        _ => {}
    }
    range
}
