//! Collection loader (§6 "Loader (consumed)" + ambient component M).
//!
//! The core treats loading as an opaque external collaborator: anything
//! implementing `CollectionLoader` may hand it an already-typed,
//! invariant-satisfying `Collection`. `JsonFileLoader` is the one concrete,
//! opt-in implementation shipped with this crate, reading a Postman
//! v2.0/v2.1-shaped JSON document from disk.

use super::model::Collection;
use crate::error::Error;
use crate::fs::FileSystem;
use std::path::Path;

/// Schema-version detection and structural validation happen here, before a
/// `Collection` is ever handed to the core — nothing downstream re-validates.
pub trait CollectionLoader {
    /// Loads and validates a collection from `source`.
    ///
    /// # Errors
    /// Returns `SchemaError` if the document's schema version is unrecognized
    /// or the structure violates a collection tree invariant (§3).
    fn load(&self, source: &Path) -> Result<Collection, Error>;
}

/// Reference loader reading a Postman-v2.0/v2.1-shaped JSON file from disk.
pub struct JsonFileLoader<FS> {
    fs: FS,
}

impl<FS: FileSystem> JsonFileLoader<FS> {
    pub const fn new(fs: FS) -> Self {
        Self { fs }
    }
}

impl<FS: FileSystem> CollectionLoader for JsonFileLoader<FS> {
    fn load(&self, source: &Path) -> Result<Collection, Error> {
        let contents = self.fs.read_to_string(source).map_err(Error::Io)?;
        parse_collection(&contents)
    }
}

/// Parses and structurally validates a collection document.
///
/// # Errors
/// Returns `SchemaError` on malformed JSON or an invariant violation (a
/// folder referencing itself is impossible by construction — the owned
/// `Vec<Item>` representation has no room for it — but an unrecognized
/// `schema_version` string is caught here).
pub fn parse_collection(contents: &str) -> Result<Collection, Error> {
    let mut collection: Collection =
        serde_json::from_str(contents).map_err(|e| Error::schema(format!("invalid collection document: {e}")))?;
    backfill_urls(&mut collection.items);
    validate(&collection)?;
    Ok(collection)
}

/// Backfills structured `host`/`path`/`query` fields from `raw` when a
/// document supplies only the raw URL string. `raw` is authoritative for
/// round-tripping, but the structured form drives resolution (§3), so a
/// raw-only URL must be parsed once here rather than left with an empty
/// `host` that would fail every downstream request.
fn backfill_urls(items: &mut [super::model::Item]) {
    for item in items {
        match item {
            super::model::Item::Request(r) => {
                if r.url.host.is_empty() && !r.url.raw.is_empty() {
                    r.url = super::model::Url::from_raw(&r.url.raw);
                }
            }
            super::model::Item::Folder(f) => backfill_urls(&mut f.items),
        }
    }
}

fn validate(collection: &Collection) -> Result<(), Error> {
    let mut seen_names = std::collections::HashSet::new();
    validate_items(&collection.items, &mut seen_names)
}

fn validate_items(
    items: &[super::model::Item],
    seen: &mut std::collections::HashSet<crate::collection::model::ItemId>,
) -> Result<(), Error> {
    for item in items {
        if !seen.insert(item.id()) {
            return Err(Error::schema(format!(
                "duplicate item id detected for '{}'; the tree must own each item exactly once",
                item.name()
            )));
        }
        if let super::model::Item::Folder(f) = item {
            validate_items(&f.items, seen)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_collection() {
        let doc = r#"{
            "info": { "name": "demo", "schema_version": "2.1.0" },
            "items": [
                { "name": "ping", "method": "GET", "url": { "raw": "https://api.x/ping" } }
            ]
        }"#;
        let collection = parse_collection(doc).unwrap();
        assert_eq!(collection.info.name, "demo");
        assert_eq!(collection.items.len(), 1);
    }

    #[test]
    fn rejects_malformed_document() {
        assert!(parse_collection("not json").is_err());
    }

    #[test]
    fn raw_only_url_is_backfilled_into_structured_fields() {
        let doc = r#"{
            "info": { "name": "demo", "schema_version": "2.1.0" },
            "items": [
                { "name": "ping", "method": "GET", "url": { "raw": "https://api.x/ping?limit=10" } }
            ]
        }"#;
        let collection = parse_collection(doc).unwrap();
        let super::model::Item::Request(request) = &collection.items[0] else {
            panic!("expected a request");
        };
        assert_eq!(request.url.host, vec!["api", "x"]);
        assert_eq!(request.url.path, vec!["ping"]);
        assert_eq!(request.url.query[0].key, "limit");
    }
}
