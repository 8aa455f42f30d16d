use std::collections::{BTreeMap, HashMap};

use strum::{Display, EnumString};

use super::{ContentError, ContentItem, PostItem};

/// Stable identity of an item for as long as it stays in one list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone)]
struct Entry {
    id: ItemId,
    item: ContentItem,
}

/// Ordered content items of one composition session.
///
/// Callers address items by position. Captions are keyed by [`ItemId`], so a
/// caption stays with its item through every delete, swap and reorder; the
/// position-keyed map returned by [`ContentList::captions`] is derived on
/// demand.
#[derive(Debug, Clone, Default)]
pub struct ContentList {
    entries: Vec<Entry>,
    captions: HashMap<ItemId, String>,
    next_id: u64,
}

impl ContentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, at: usize) -> Option<&ContentItem> {
        self.entries.get(at).map(|entry| &entry.item)
    }

    pub fn items(&self) -> impl Iterator<Item = &ContentItem> {
        self.entries.iter().map(|entry| &entry.item)
    }

    pub fn id_at(&self, at: usize) -> Option<ItemId> {
        self.entries.get(at).map(|entry| entry.id)
    }

    pub fn append(&mut self, item: ContentItem) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry { id, item });
        id
    }

    pub fn delete(&mut self, at: usize) -> Result<ContentItem, ContentError> {
        self.check(at)?;
        let entry = self.entries.remove(at);
        self.captions.remove(&entry.id);
        tracing::debug!(at, remaining = self.entries.len(), "deleted content item");
        Ok(entry.item)
    }

    /// Swaps the item with its neighbour. Returns `false` at the boundary.
    pub fn move_one_step(&mut self, at: usize, direction: Direction) -> Result<bool, ContentError> {
        self.check(at)?;
        let neighbour = match direction {
            Direction::Up if at > 0 => at - 1,
            Direction::Down if at + 1 < self.entries.len() => at + 1,
            _ => return Ok(false),
        };
        self.entries.swap(at, neighbour);
        Ok(true)
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), ContentError> {
        self.check(from)?;
        self.check(to)?;
        if from == to {
            return Ok(());
        }
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        tracing::debug!(from, to, "reordered content item");
        Ok(())
    }

    pub fn update_caption(&mut self, at: usize, text: impl Into<String>) -> Result<(), ContentError> {
        self.check(at)?;
        let id = self.entries[at].id;
        let text = text.into();
        if text.is_empty() {
            self.captions.remove(&id);
        } else {
            self.captions.insert(id, text);
        }
        Ok(())
    }

    /// Replaces the payload at `at`; the caption stays attached.
    pub fn replace(&mut self, at: usize, item: ContentItem) -> Result<ContentItem, ContentError> {
        self.check(at)?;
        Ok(std::mem::replace(&mut self.entries[at].item, item))
    }

    pub fn caption(&self, at: usize) -> Option<&str> {
        let entry = self.entries.get(at)?;
        self.captions.get(&entry.id).map(String::as_str)
    }

    pub fn captions(&self) -> BTreeMap<usize, String> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(position, entry)| {
                self.captions
                    .get(&entry.id)
                    .map(|caption| (position, caption.clone()))
            })
            .collect()
    }

    pub fn snapshot(&self) -> Vec<PostItem> {
        self.entries
            .iter()
            .map(|entry| PostItem {
                item: entry.item.clone(),
                caption: self.captions.get(&entry.id).cloned().unwrap_or_default(),
            })
            .collect()
    }

    pub fn load_for_edit(&mut self, items: &[PostItem]) {
        self.clear();
        for stored in items {
            let id = self.append(stored.item.clone());
            if !stored.caption.is_empty() {
                self.captions.insert(id, stored.caption.clone());
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.captions.clear();
    }

    fn check(&self, at: usize) -> Result<(), ContentError> {
        if at < self.entries.len() {
            Ok(())
        } else {
            Err(ContentError::OutOfRange {
                at,
                len: self.entries.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn list_of(texts: &[&str]) -> ContentList {
        let mut list = ContentList::new();
        for text in texts {
            list.append(ContentItem::text(*text));
        }
        list
    }

    fn captions(pairs: &[(usize, &str)]) -> BTreeMap<usize, String> {
        pairs
            .iter()
            .map(|(k, v)| (*k, (*v).to_string()))
            .collect()
    }

    fn texts(list: &ContentList) -> Vec<&str> {
        list.items().map(ContentItem::plain_text).collect()
    }

    #[test]
    fn append_grows_without_caption() {
        let mut list = list_of(&["a"]);
        list.append(ContentItem::text("b"));
        assert_eq!(list.len(), 2);
        assert!(list.captions().is_empty());
        assert_eq!(list.caption(1), None);
    }

    #[test]
    fn delete_shifts_later_captions_down() -> anyhow::Result<()> {
        let mut list = list_of(&["A", "B", "C"]);
        list.update_caption(0, "a")?;
        list.update_caption(1, "b")?;
        list.update_caption(2, "c")?;

        list.delete(1)?;

        assert_eq!(texts(&list), vec!["A", "C"]);
        assert_eq!(list.captions(), captions(&[(0, "a"), (1, "c")]));
        Ok(())
    }

    #[test]
    fn delete_out_of_range_leaves_list_untouched() -> anyhow::Result<()> {
        let mut list = list_of(&["A", "B"]);
        list.update_caption(1, "b")?;
        assert_matches!(list.delete(2), Err(ContentError::OutOfRange { at: 2, len: 2 }));
        assert_eq!(texts(&list), vec!["A", "B"]);
        assert_eq!(list.captions(), captions(&[(1, "b")]));
        Ok(())
    }

    #[test]
    fn reorder_forward_moves_caption_with_item() -> anyhow::Result<()> {
        let mut list = list_of(&["X", "Y", "Z"]);
        list.update_caption(0, "x")?;
        list.update_caption(1, "y")?;
        list.update_caption(2, "z")?;

        list.reorder(0, 2)?;
        assert_eq!(texts(&list), vec!["Y", "Z", "X"]);
        assert_eq!(list.captions(), captions(&[(0, "y"), (1, "z"), (2, "x")]));

        list.reorder(2, 0)?;
        assert_eq!(texts(&list), vec!["X", "Y", "Z"]);
        assert_eq!(list.captions(), captions(&[(0, "x"), (1, "y"), (2, "z")]));
        Ok(())
    }

    #[test]
    fn reorder_backward_shifts_span_up() -> anyhow::Result<()> {
        let mut list = list_of(&["A", "B", "C", "D", "E"]);
        list.update_caption(1, "b")?;
        list.update_caption(3, "d")?;
        list.update_caption(4, "e")?;

        list.reorder(3, 1)?;

        assert_eq!(texts(&list), vec!["A", "D", "B", "C", "E"]);
        assert_eq!(list.captions(), captions(&[(1, "d"), (2, "b"), (4, "e")]));
        Ok(())
    }

    #[test]
    fn reorder_same_position_is_noop_and_range_checked() -> anyhow::Result<()> {
        let mut list = list_of(&["A", "B"]);
        list.reorder(1, 1)?;
        assert_eq!(texts(&list), vec!["A", "B"]);
        assert_matches!(list.reorder(0, 5), Err(ContentError::OutOfRange { at: 5, .. }));
        assert_matches!(list.reorder(7, 0), Err(ContentError::OutOfRange { at: 7, .. }));
        assert_eq!(texts(&list), vec!["A", "B"]);
        Ok(())
    }

    #[test]
    fn move_one_step_at_boundaries_is_noop() -> anyhow::Result<()> {
        let mut list = list_of(&["A", "B", "C"]);
        list.update_caption(0, "a")?;

        assert!(!list.move_one_step(0, Direction::Up)?);
        assert!(!list.move_one_step(2, Direction::Down)?);

        assert_eq!(texts(&list), vec!["A", "B", "C"]);
        assert_eq!(list.captions(), captions(&[(0, "a")]));
        Ok(())
    }

    #[test]
    fn move_one_step_carries_caption() -> anyhow::Result<()> {
        let mut list = list_of(&["A", "B", "C"]);
        list.update_caption(1, "b")?;

        assert!(list.move_one_step(1, Direction::Down)?);
        assert_eq!(texts(&list), vec!["A", "C", "B"]);
        assert_eq!(list.captions(), captions(&[(2, "b")]));

        assert!(list.move_one_step(2, Direction::Up)?);
        assert_eq!(list.captions(), captions(&[(1, "b")]));
        assert_matches!(
            list.move_one_step(3, Direction::Up),
            Err(ContentError::OutOfRange { .. })
        );
        Ok(())
    }

    #[test]
    fn update_caption_out_of_range_fails() -> anyhow::Result<()> {
        let mut list = list_of(&["A", "B", "C"]);
        list.update_caption(0, "keep")?;
        assert_matches!(
            list.update_caption(5, "x"),
            Err(ContentError::OutOfRange { at: 5, len: 3 })
        );
        assert_eq!(list.captions(), captions(&[(0, "keep")]));
        Ok(())
    }

    #[test]
    fn empty_caption_clears_entry() -> anyhow::Result<()> {
        let mut list = list_of(&["A"]);
        list.update_caption(0, "a")?;
        list.update_caption(0, "")?;
        assert!(list.captions().is_empty());
        Ok(())
    }

    #[test]
    fn caption_follows_item_after_leading_delete() -> anyhow::Result<()> {
        let mut list = list_of(&["one", "two", "three"]);
        list.update_caption(1, "middle")?;
        list.delete(0)?;
        assert_eq!(list.captions(), captions(&[(0, "middle")]));
        Ok(())
    }

    #[test]
    fn snapshot_round_trips_through_load_for_edit() -> anyhow::Result<()> {
        let mut list = list_of(&["A", "B"]);
        list.append(ContentItem::code("rust", "let x = 1;"));
        list.update_caption(0, "first")?;
        list.update_caption(2, "snippet")?;
        list.reorder(2, 0)?;

        let snapshot = list.snapshot();
        assert_eq!(snapshot[1].caption, "first");
        assert_eq!(snapshot[2].caption, "");

        let mut reloaded = ContentList::new();
        reloaded.append(ContentItem::text("stale"));
        reloaded.load_for_edit(&snapshot);

        assert_eq!(reloaded.items().collect::<Vec<_>>(), list.items().collect::<Vec<_>>());
        assert_eq!(reloaded.captions(), list.captions());
        Ok(())
    }

    #[test]
    fn replace_keeps_caption() -> anyhow::Result<()> {
        let mut list = list_of(&["draft"]);
        list.update_caption(0, "note")?;
        let old = list.replace(0, ContentItem::text("final"))?;
        assert_eq!(old, ContentItem::text("draft"));
        assert_eq!(list.caption(0), Some("note"));
        Ok(())
    }
}
