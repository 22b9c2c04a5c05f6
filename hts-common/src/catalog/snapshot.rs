//! Startup snapshot loading
//!
//! The catalog is rebuilt from static snapshot files on every process start:
//! the raw rows, the chapter titles and (optionally) the front-matter chapter
//! listing.

use super::enrich::enrich;
use super::index::{CandidateIndex, ChapterDescriptions};
use super::row::CatalogRow;
use crate::config::CatalogConfig;
use crate::Result;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Read the raw catalog rows (one JSON array of row objects)
pub fn load_catalog_rows(path: &Path) -> Result<Vec<CatalogRow>> {
    let content = std::fs::read_to_string(path)?;
    let rows: Vec<CatalogRow> = serde_json::from_str(&content)?;
    info!(rows = rows.len(), path = %path.display(), "Catalog rows loaded");
    Ok(rows)
}

/// Read the chapter titles (one JSON object, chapter code → title)
pub fn load_chapter_titles(path: &Path) -> Result<ChapterDescriptions> {
    let content = std::fs::read_to_string(path)?;
    let titles: BTreeMap<String, String> = serde_json::from_str(&content)?;
    info!(chapters = titles.len(), path = %path.display(), "Chapter titles loaded");
    Ok(ChapterDescriptions::new(titles))
}

/// Read the chapter listing text, dropping blank lines
pub fn load_chapter_listing(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Load every snapshot and build the candidate index.
///
/// Any failure here is fatal: the service must not start with a partial
/// catalog.
pub fn load_candidate_index(config: &CatalogConfig) -> Result<CandidateIndex> {
    let rows = load_catalog_rows(&config.rows_path)?;
    let indexes = enrich(rows, &config.excluded_chapters)?;
    let chapters = load_chapter_titles(&config.chapter_titles_path)?;

    let index = CandidateIndex::new(indexes, chapters);
    match &config.chapter_listing_path {
        Some(path) => Ok(index.with_chapter_listing(load_chapter_listing(path)?)),
        None => Ok(index),
    }
}
