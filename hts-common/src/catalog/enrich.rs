//! Hierarchy enrichment
//!
//! Turns the flat, indent-encoded schedule into the short-code and full-code
//! indexes. Descriptions inherit the text of their section headers and code
//! ancestors; rates inherit from the nearest preceding rated ancestor.
//!
//! The build is all-or-nothing: one malformed code aborts it.

use super::index::{FullCodeIndex, ShortCodeIndex};
use super::row::{is_well_formed_code, prepend_fragment, CatalogRow};
use crate::{Error, Result};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

/// Indexes derived from one catalog snapshot. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogIndexes {
    pub short_codes: ShortCodeIndex,
    pub full_codes: FullCodeIndex,
}

/// Build both indexes from raw rows in catalog order
pub fn enrich(rows: Vec<CatalogRow>, excluded_chapters: &[String]) -> Result<CatalogIndexes> {
    let (short_codes, rows) = enrich_in_stages(rows, excluded_chapters)?;
    let full_codes = FullCodeIndex::from_rows(&rows);

    info!(
        short_codes = short_codes.len(),
        full_codes = full_codes.len(),
        "Catalog indexes built"
    );

    Ok(CatalogIndexes {
        short_codes,
        full_codes,
    })
}

/// Enriched rows (headers removed) without building the indexes
pub fn enrich_rows(rows: Vec<CatalogRow>, excluded_chapters: &[String]) -> Result<Vec<CatalogRow>> {
    Ok(enrich_in_stages(rows, excluded_chapters)?.1)
}

fn enrich_in_stages(
    rows: Vec<CatalogRow>,
    excluded_chapters: &[String],
) -> Result<(ShortCodeIndex, Vec<CatalogRow>)> {
    let total = rows.len();
    let mut rows = validate_codes(drop_excluded_chapters(rows, excluded_chapters))?;
    debug!(kept = rows.len(), total, "Excluded chapters dropped");

    propagate_section_headers(&mut rows);
    rows.retain(|row| !row.is_header());

    // Short codes carry header text only, not the level inheritance below
    let short_codes = ShortCodeIndex::from_rows(&rows);

    inherit_descriptions_by_level(&mut rows);
    inherit_rates(&mut rows);

    Ok((short_codes, rows))
}

/// Positions refer to the snapshot order, before exclusion
fn validate_codes(rows: Vec<(usize, CatalogRow)>) -> Result<Vec<CatalogRow>> {
    if let Some((position, row)) = rows
        .iter()
        .find(|(_, row)| !row.is_header() && !is_well_formed_code(&row.code))
    {
        return Err(Error::MalformedCatalogRow {
            position: *position,
            code: row.code.clone(),
        });
    }
    Ok(rows.into_iter().map(|(_, row)| row).collect())
}

fn drop_excluded_chapters(rows: Vec<CatalogRow>, excluded_chapters: &[String]) -> Vec<(usize, CatalogRow)> {
    rows.into_iter()
        .enumerate()
        .filter(|(_, row)| row.is_header() || !excluded_chapters.iter().any(|c| c == row.chapter()))
        .collect()
}

/// Prefix each header's text onto the rows one level beneath it.
///
/// The header closes at the first row at or above its own indent. Deeper
/// rows pick the text up from their parents during level inheritance.
fn propagate_section_headers(rows: &mut [CatalogRow]) {
    let mut open_header: Option<(u32, String)> = None;

    for row in rows.iter_mut() {
        let closes = match &open_header {
            Some((level, text)) => {
                if row.indent <= *level {
                    true
                } else {
                    if row.indent == level + 1 {
                        prepend_fragment(&mut row.description, text);
                    }
                    false
                }
            }
            None => false,
        };
        if closes {
            open_header = None;
        }

        if row.is_header() {
            open_header = Some((row.indent, row.description.clone()));
        }
    }
}

/// For every indent level, prefix each row's description onto its code
/// descendants, once per descendant grouping (`ancestor code + 3` chars).
fn inherit_descriptions_by_level(rows: &mut [CatalogRow]) {
    let levels: BTreeSet<u32> = rows.iter().map(|row| row.indent).collect();

    for level in levels {
        let mut ancestor: Option<(String, String)> = None;
        let mut amended: HashSet<String> = HashSet::new();

        for row in rows.iter_mut() {
            if row.indent == level {
                ancestor = Some((row.code.clone(), row.description.clone()));
                amended.clear();
                continue;
            }

            let Some((code, text)) = &ancestor else {
                continue;
            };

            if row.indent > level && row.code.starts_with(code.as_str()) {
                let grouping = row.code.get(..code.len() + 3).unwrap_or(&row.code);
                if amended.insert(grouping.to_string()) {
                    prepend_fragment(&mut row.description, text);
                }
            }
        }
    }
}

/// Back-fill empty rates from the last rated row whose code is a prefix
fn inherit_rates(rows: &mut [CatalogRow]) {
    let mut source: Option<(String, String)> = None;

    for row in rows.iter_mut() {
        if row.has_rate() {
            source = Some((row.code.clone(), row.base_rate.clone()));
        } else if let Some((code, rate)) = &source {
            if row.code.starts_with(code.as_str()) {
                row.base_rate = rate.clone();
            }
        }
    }
}
