//! Derived in-memory indexes over the vault log
//!
//! All three structures hold only ids plus the minimum data their own
//! ordering needs; the vault remains the source of truth and every index
//! is rebuilt from it at startup.

pub mod catalog;
pub mod recency;
pub mod vector;

pub use catalog::{MetadataCatalog, MetadataFilter, TAG_FILTER_KEY};
pub use recency::RecencyLedger;
pub use vector::{LinearScanIndex, ScoredId, VectorSearch, cosine_similarity};
