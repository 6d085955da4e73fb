//! Downloader metadata: a tagged-variant tree, thumbnail deduplication, and
//! lossless JSON output for `metadata.json`.

mod dedupe;
mod value;

pub use dedupe::dedupe_thumbnails;
pub use value::MetaValue;

/// Pretty-print (2-space indent) the tree as JSON. Binary payloads become
/// base64 text and non-finite floats their `Display` form, so this never drops values.
pub fn to_pretty_json(value: &MetaValue) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}
