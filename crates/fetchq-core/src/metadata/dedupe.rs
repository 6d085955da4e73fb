//! Thumbnail deduplication at any depth of the metadata tree.

use std::collections::HashSet;

use super::MetaValue;

const THUMBNAILS_KEY: &str = "thumbnails";

static NULL: MetaValue = MetaValue::Null;

/// Identity of a thumbnail entry: `(id, url)` for maps, `(null, value)` otherwise.
fn thumbnail_key(entry: &MetaValue) -> String {
    let (id, url) = match entry {
        MetaValue::Map(_) => (
            entry.get("id").unwrap_or(&NULL),
            entry.get("url").unwrap_or(&NULL),
        ),
        other => (&NULL, other),
    };
    serde_json::to_string(&(id, url)).unwrap_or_else(|_| format!("{id:?}\u{0}{url:?}"))
}

fn dedupe_list(items: &mut Vec<MetaValue>) -> usize {
    let before = items.len();
    let mut seen = HashSet::with_capacity(before);
    items.retain(|entry| seen.insert(thumbnail_key(entry)));
    before - items.len()
}

/// Remove duplicate entries from every `thumbnails` sequence in the tree,
/// keeping the first occurrence in place. Returns how many entries were dropped.
pub fn dedupe_thumbnails(node: &mut MetaValue) -> usize {
    match node {
        MetaValue::Map(entries) => {
            let mut removed = 0;
            for (key, value) in entries.iter_mut() {
                if key == THUMBNAILS_KEY {
                    if let MetaValue::Seq(items) = value {
                        removed += dedupe_list(items);
                    }
                }
                removed += dedupe_thumbnails(value);
            }
            removed
        }
        MetaValue::Seq(items) => items.iter_mut().map(dedupe_thumbnails).sum(),
        _ => 0,
    }
}
