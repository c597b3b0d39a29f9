//! Metadata and tag catalog for post-filtering search candidates
//!
//! Pure predicate over metadata equality and tag membership, applied to
//! candidates the vector index already produced. Never the primary
//! candidate source: search cost does not depend on filter selectivity.

use std::collections::{BTreeSet, HashMap};

use dashmap::DashMap;
use uuid::Uuid;

/// Reserved filter key: the value must be a member of the record's tag set
/// rather than a metadata entry.
pub const TAG_FILTER_KEY: &str = "tag";

/// Filter criteria for search operations.
///
/// Every key must match for a record to pass (AND logic). An empty filter
/// matches everything.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    required: HashMap<String, String>,
}

impl MetadataFilter {
    /// Create an empty filter (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a raw key→value map, as received on the wire
    pub fn from_map(required: HashMap<String, String>) -> Self {
        Self { required }
    }

    /// Require a metadata key to equal a value
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.required.insert(key.into(), value.into());
        self
    }

    /// Require a tag to be present on the record
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.required
            .insert(TAG_FILTER_KEY.to_string(), tag.into());
        self
    }

    /// Whether any condition is set
    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.required.iter()
    }
}

struct CatalogEntry {
    metadata: HashMap<String, String>,
    tags: BTreeSet<String>,
}

/// id → (metadata, tags) lookup supporting filter predicates.
#[derive(Default)]
pub struct MetadataCatalog {
    entries: DashMap<Uuid, CatalogEntry>,
}

impl MetadataCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record's metadata and tags
    pub fn index(&self, id: Uuid, metadata: HashMap<String, String>, tags: BTreeSet<String>) {
        self.entries.insert(id, CatalogEntry { metadata, tags });
    }

    /// Whether the record passes every filter condition.
    ///
    /// Pure predicate with no side effects. Records unknown to the catalog
    /// fail any non-empty filter.
    pub fn matches(&self, id: Uuid, filter: &MetadataFilter) -> bool {
        if filter.is_empty() {
            return true;
        }

        let Some(entry) = self.entries.get(&id) else {
            return false;
        };

        filter.iter().all(|(key, value)| {
            if key == TAG_FILTER_KEY {
                entry.tags.contains(value)
            } else {
                entry.metadata.get(key).is_some_and(|have| have == value)
            }
        })
    }

    /// Number of cataloged records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with_entry(id: Uuid) -> MetadataCatalog {
        let catalog = MetadataCatalog::new();
        catalog.index(
            id,
            HashMap::from([
                ("user_id".to_string(), "user_123".to_string()),
                ("model".to_string(), "sonnet".to_string()),
            ]),
            BTreeSet::from(["chat".to_string(), "technical".to_string()]),
        );
        catalog
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let id = Uuid::new_v4();
        let catalog = catalog_with_entry(id);

        assert!(catalog.matches(id, &MetadataFilter::new()));
        // Even an id the catalog has never seen
        assert!(catalog.matches(Uuid::new_v4(), &MetadataFilter::new()));
    }

    #[test]
    fn test_single_key_equality() {
        let id = Uuid::new_v4();
        let catalog = catalog_with_entry(id);

        assert!(catalog.matches(id, &MetadataFilter::new().with("user_id", "user_123")));
        assert!(!catalog.matches(id, &MetadataFilter::new().with("user_id", "user_999")));
    }

    #[test]
    fn test_missing_key_fails() {
        let id = Uuid::new_v4();
        let catalog = catalog_with_entry(id);

        assert!(!catalog.matches(id, &MetadataFilter::new().with("session_id", "sess_1")));
    }

    #[test]
    fn test_all_keys_must_match() {
        let id = Uuid::new_v4();
        let catalog = catalog_with_entry(id);

        let filter = MetadataFilter::new()
            .with("user_id", "user_123")
            .with("model", "sonnet");
        assert!(catalog.matches(id, &filter));

        let filter = MetadataFilter::new()
            .with("user_id", "user_123")
            .with("model", "opus");
        assert!(!catalog.matches(id, &filter));
    }

    #[test]
    fn test_tag_filter_checks_membership() {
        let id = Uuid::new_v4();
        let catalog = catalog_with_entry(id);

        assert!(catalog.matches(id, &MetadataFilter::new().with_tag("chat")));
        assert!(!catalog.matches(id, &MetadataFilter::new().with_tag("billing")));
    }

    #[test]
    fn test_tag_filter_ignores_metadata_with_same_name() {
        let id = Uuid::new_v4();
        let catalog = MetadataCatalog::new();
        catalog.index(
            id,
            HashMap::from([(TAG_FILTER_KEY.to_string(), "sneaky".to_string())]),
            BTreeSet::new(),
        );

        assert!(!catalog.matches(id, &MetadataFilter::new().with_tag("sneaky")));
    }

    #[test]
    fn test_unknown_id_fails_non_empty_filter() {
        let catalog = MetadataCatalog::new();
        assert!(!catalog.matches(Uuid::new_v4(), &MetadataFilter::new().with("k", "v")));
    }

    #[test]
    fn test_from_map_round_trips_wire_filters() {
        let id = Uuid::new_v4();
        let catalog = catalog_with_entry(id);

        let wire = HashMap::from([
            ("user_id".to_string(), "user_123".to_string()),
            (TAG_FILTER_KEY.to_string(), "technical".to_string()),
        ]);
        assert!(catalog.matches(id, &MetadataFilter::from_map(wire)));
    }
}
