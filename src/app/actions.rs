use std::str::FromStr;

use thiserror::Error;

use crate::content::{ContentError, ContentItem, ContentList, Direction};

/// A position-indexed intent against the open content list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    AppendText(String),
    AppendCode { language: String, source: String },
    SetText { at: usize, text: String },
    Delete(usize),
    Move { at: usize, direction: Direction },
    Reorder { from: usize, to: usize },
    Caption { at: usize, text: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid edit operation {input:?}: {reason}")]
pub struct EditOpParseError {
    input: String,
    reason: &'static str,
}

impl FromStr for EditOp {
    type Err = EditOpParseError;

    /// Accepts `text <content>`, `code <lang> <source>`, `set <n> <text>`,
    /// `delete <n>`, `move <n> up|down`, `reorder <from> <to>` and
    /// `caption <n> [text]`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let fail = |reason| EditOpParseError {
            input: input.to_owned(),
            reason,
        };
        let trimmed = input.trim();
        let (verb, rest) = trimmed.split_once(' ').unwrap_or((trimmed, ""));
        let rest = rest.trim_start();
        let position = |raw: &str| raw.parse::<usize>().map_err(|_| fail("expected a position"));
        let (first, tail) = rest.split_once(' ').unwrap_or((rest, ""));

        match verb {
            "text" => Ok(EditOp::AppendText(rest.to_owned())),
            "code" if !first.is_empty() => Ok(EditOp::AppendCode {
                language: first.to_owned(),
                source: tail.to_owned(),
            }),
            "code" => Err(fail("expected a language")),
            "set" => Ok(EditOp::SetText {
                at: position(first)?,
                text: tail.to_owned(),
            }),
            "delete" => Ok(EditOp::Delete(position(rest)?)),
            "move" => Ok(EditOp::Move {
                at: position(first)?,
                direction: tail
                    .trim()
                    .parse()
                    .map_err(|_| fail("expected up or down"))?,
            }),
            "reorder" => Ok(EditOp::Reorder {
                from: position(first)?,
                to: position(tail.trim())?,
            }),
            "caption" => Ok(EditOp::Caption {
                at: position(first)?,
                text: tail.to_owned(),
            }),
            _ => Err(fail("unknown verb")),
        }
    }
}

pub struct ActionDispatcher<'a> {
    content: &'a mut ContentList,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(content: &'a mut ContentList) -> Self {
        Self { content }
    }

    pub fn apply(&mut self, op: &EditOp) -> Result<(), ContentError> {
        match op {
            EditOp::AppendText(text) => {
                self.content.append(ContentItem::text(text.clone()));
            }
            EditOp::AppendCode { language, source } => {
                self.content
                    .append(ContentItem::code(language.clone(), source.clone()));
            }
            EditOp::SetText { at, text } => {
                let replacement = match self.content.get(*at) {
                    Some(ContentItem::Code { language, .. }) => {
                        ContentItem::code(language.clone(), text.clone())
                    }
                    _ => ContentItem::text(text.clone()),
                };
                self.content.replace(*at, replacement)?;
            }
            EditOp::Delete(at) => {
                self.content.delete(*at)?;
            }
            EditOp::Move { at, direction } => {
                self.content.move_one_step(*at, *direction)?;
            }
            EditOp::Reorder { from, to } => self.content.reorder(*from, *to)?,
            EditOp::Caption { at, text } => self.content.update_caption(*at, text.clone())?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_every_verb() {
        assert_eq!("text hello world".parse(), Ok(EditOp::AppendText("hello world".into())));
        assert_eq!(
            "code rust fn main() {}".parse(),
            Ok(EditOp::AppendCode {
                language: "rust".into(),
                source: "fn main() {}".into()
            })
        );
        assert_eq!("delete 2".parse(), Ok(EditOp::Delete(2)));
        assert_eq!(
            "move 1 up".parse(),
            Ok(EditOp::Move {
                at: 1,
                direction: Direction::Up
            })
        );
        assert_eq!("reorder 0 3".parse(), Ok(EditOp::Reorder { from: 0, to: 3 }));
        assert_eq!(
            "caption 1 a diagram".parse(),
            Ok(EditOp::Caption {
                at: 1,
                text: "a diagram".into()
            })
        );
        assert_eq!(
            "caption 1".parse(),
            Ok(EditOp::Caption {
                at: 1,
                text: String::new()
            })
        );
    }

    #[test]
    fn rejects_malformed_ops() {
        assert!("delete x".parse::<EditOp>().is_err());
        assert!("move 1 sideways".parse::<EditOp>().is_err());
        assert!("reorder 1".parse::<EditOp>().is_err());
        assert!("shuffle".parse::<EditOp>().is_err());
        assert!("code".parse::<EditOp>().is_err());
    }

    #[test]
    fn dispatcher_applies_ops_in_order() -> anyhow::Result<()> {
        let mut list = ContentList::new();
        let mut dispatcher = ActionDispatcher::new(&mut list);
        for raw in ["text one", "text two", "text three", "caption 1 middle", "delete 0"] {
            dispatcher.apply(&raw.parse()?)?;
        }
        assert_matches!(
            dispatcher.apply(&EditOp::Delete(9)),
            Err(ContentError::OutOfRange { at: 9, len: 2 })
        );
        dispatcher.apply(&"code sql select 1".parse()?)?;
        dispatcher.apply(&"set 2 select 2".parse()?)?;

        assert_eq!(list.caption(0), Some("middle"));
        assert_eq!(list.get(2), Some(&ContentItem::code("sql", "select 2")));
        Ok(())
    }
}
