//! Tariff schedule catalog
//!
//! - [`row`]: raw schedule rows and index entries
//! - [`enrich`]: hierarchy enrichment producing the short-code and full-code indexes
//! - [`index`]: read-only candidate queries over the built indexes
//! - [`snapshot`]: startup loading of the snapshot files

pub mod enrich;
pub mod index;
pub mod row;
pub mod snapshot;

pub use enrich::{enrich, enrich_rows, CatalogIndexes};
pub use index::{
    normalize_chapter, render_candidates, CandidateIndex, ChapterDescriptions, FullCodeIndex,
    ShortCodeIndex, CODE_NOT_FOUND,
};
pub use row::{
    code_digits, dotted_full_code, is_well_formed_code, CatalogRow, FullCodeEntry, ShortCodeEntry,
    DESCRIPTION_SEPARATOR, FULL_CODE_LEN, SHORT_CODE_LEN,
};
pub use snapshot::load_candidate_index;
