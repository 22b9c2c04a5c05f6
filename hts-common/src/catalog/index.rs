//! Read-only candidate queries over the enriched catalog
//!
//! Every stage of the classification funnel narrows its candidates through
//! [`CandidateIndex`]. All lookups are synchronous and in-memory; the index
//! is shared behind an `Arc` and never mutated after startup.

use super::enrich::CatalogIndexes;
use super::row::{
    dotted_full_code, CatalogRow, FullCodeEntry, ShortCodeEntry, FULL_CODE_LEN, SHORT_CODE_LEN,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Description returned for codes absent from the full-code index
pub const CODE_NOT_FOUND: &str = "Code not found";

/// Short codes (4 characters) in catalog order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortCodeIndex {
    entries: Vec<ShortCodeEntry>,
}

impl ShortCodeIndex {
    pub fn from_rows(rows: &[CatalogRow]) -> Self {
        let entries = rows
            .iter()
            .filter(|row| row.code.len() == SHORT_CODE_LEN)
            .map(|row| ShortCodeEntry {
                code: row.code.clone(),
                description: row.description.clone(),
            })
            .collect();
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShortCodeEntry> {
        self.entries.iter()
    }

    pub fn get(&self, code: &str) -> Option<&ShortCodeEntry> {
        self.entries.iter().find(|entry| entry.code == code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Full codes (13 characters) in catalog order, with exact lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullCodeIndex {
    entries: Vec<FullCodeEntry>,
    positions: HashMap<String, usize>,
}

impl FullCodeIndex {
    pub fn from_rows(rows: &[CatalogRow]) -> Self {
        let mut index = Self::default();

        for row in rows.iter().filter(|row| row.code.len() == FULL_CODE_LEN) {
            if index.positions.contains_key(&row.code) {
                warn!(code = %row.code, "Duplicate full code in catalog, keeping first");
                continue;
            }
            index.positions.insert(row.code.clone(), index.entries.len());
            index.entries.push(FullCodeEntry {
                code: row.code.clone(),
                description: row.description.clone(),
                duty_rate: row.base_rate.clone(),
            });
        }

        index
    }

    pub fn iter(&self) -> impl Iterator<Item = &FullCodeEntry> {
        self.entries.iter()
    }

    /// Exact lookup; the undotted 10-digit form of a code is accepted too
    pub fn get(&self, code: &str) -> Option<&FullCodeEntry> {
        let code = code.trim();
        self.positions
            .get(code)
            .or_else(|| dotted_full_code(code).and_then(|dotted| self.positions.get(&dotted)))
            .map(|&position| &self.entries[position])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Chapter code → human-readable chapter title
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterDescriptions {
    titles: BTreeMap<String, String>,
}

impl ChapterDescriptions {
    /// Build from a raw mapping; single-digit chapter keys are zero-padded
    pub fn new(titles: impl IntoIterator<Item = (String, String)>) -> Self {
        let titles = titles
            .into_iter()
            .map(|(chapter, title)| (normalize_chapter(&chapter), title.trim().to_string()))
            .collect();
        Self { titles }
    }

    pub fn title(&self, chapter: &str) -> Option<&str> {
        self.titles.get(chapter).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.titles.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

/// Zero-pad a chapter code to two digits (`"1"` → `"01"`)
pub fn normalize_chapter(chapter: &str) -> String {
    let digits: String = chapter.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 1 {
        format!("0{}", digits)
    } else {
        digits
    }
}

/// Query surface shared by every funnel stage and the rate resolver
#[derive(Debug, Clone)]
pub struct CandidateIndex {
    indexes: CatalogIndexes,
    chapters: ChapterDescriptions,
    chapter_listing: Option<String>,
}

impl CandidateIndex {
    pub fn new(indexes: CatalogIndexes, chapters: ChapterDescriptions) -> Self {
        Self {
            indexes,
            chapters,
            chapter_listing: None,
        }
    }

    /// Use the catalog's front-matter listing for the chapter-select stage
    pub fn with_chapter_listing(mut self, listing: impl Into<String>) -> Self {
        self.chapter_listing = Some(listing.into());
        self
    }

    pub fn indexes(&self) -> &CatalogIndexes {
        &self.indexes
    }

    pub fn chapters(&self) -> &ChapterDescriptions {
        &self.chapters
    }

    /// Short codes whose chapter is in `chapters`, in index order
    pub fn short_codes_under_chapters<S: AsRef<str>>(&self, chapters: &[S]) -> Vec<&ShortCodeEntry> {
        let wanted: HashSet<&str> = chapters.iter().map(|c| c.as_ref()).collect();
        let matches: Vec<&ShortCodeEntry> = self
            .indexes
            .short_codes
            .iter()
            .filter(|entry| entry.code.get(..2).is_some_and(|c| wanted.contains(c)))
            .collect();

        debug!(chapters = wanted.len(), matches = matches.len(), "Short codes under chapters");
        matches
    }

    /// Full codes whose first four characters are in `short_codes`, in index order
    pub fn full_codes_under_short_codes<S: AsRef<str>>(&self, short_codes: &[S]) -> Vec<&FullCodeEntry> {
        let wanted: HashSet<&str> = short_codes.iter().map(|c| c.as_ref()).collect();
        let matches: Vec<&FullCodeEntry> = self
            .indexes
            .full_codes
            .iter()
            .filter(|entry| entry.code.get(..SHORT_CODE_LEN).is_some_and(|c| wanted.contains(c)))
            .collect();

        debug!(short_codes = wanted.len(), matches = matches.len(), "Full codes under short codes");
        matches
    }

    /// Exact lookups in request order.
    ///
    /// Absent codes are omitted, so callers may receive fewer entries than
    /// they asked for.
    pub fn full_codes_exact<S: AsRef<str>>(&self, codes: &[S]) -> Vec<&FullCodeEntry> {
        let mut seen: HashSet<String> = HashSet::new();
        codes
            .iter()
            .filter_map(|code| {
                let entry = self.indexes.full_codes.get(code.as_ref());
                if entry.is_none() {
                    debug!(code = code.as_ref(), "Requested full code not in catalog");
                }
                entry
            })
            .filter(|entry| seen.insert(entry.code.clone()))
            .collect()
    }

    pub fn full_code(&self, code: &str) -> Option<&FullCodeEntry> {
        self.indexes.full_codes.get(code)
    }

    /// `"<chapter title>:<br><description>"`, or [`CODE_NOT_FOUND`]
    pub fn description_of(&self, code: &str) -> String {
        let Some(entry) = self.indexes.full_codes.get(code) else {
            return CODE_NOT_FOUND.to_string();
        };

        match self.chapters.title(&entry.code[..2]) {
            Some(title) => format!("{}:<br>{}", title, entry.description),
            None => entry.description.clone(),
        }
    }

    /// Chapter list presented to the chapter-select stage
    pub fn chapter_listing(&self) -> String {
        if let Some(listing) = &self.chapter_listing {
            return listing.clone();
        }

        self.chapters
            .iter()
            .map(|(chapter, title)| format!("Chapter {}: {}", chapter, title))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// JSON rendering of candidate entries for oracle prompts
pub fn render_candidates<T: Serialize>(entries: &[T]) -> String {
    serde_json::to_string(entries).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to render candidates");
        "[]".to_string()
    })
}
