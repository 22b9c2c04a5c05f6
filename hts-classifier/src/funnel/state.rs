//! Per-description classification state

use hts_common::catalog::CandidateIndex;
use serde::{Deserialize, Serialize};

/// Mutable record threaded through the four funnel stages.
///
/// Owned by exactly one funnel run and dropped once the final selection has
/// been copied out.
#[derive(Debug, Clone, Default)]
pub struct ClassificationState {
    pub description: String,
    /// Oracle answers, one per completed stage (append-only)
    pub prior_responses: Vec<String>,
    pub chapter_candidates: Vec<String>,
    pub short_code_candidates: Vec<String>,
    pub full_code_candidates: Vec<String>,
    pub final_selection: Option<FinalSelection>,
}

impl ClassificationState {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    /// Answer of the most recent stage, fed into the next prompt
    pub fn last_response(&self) -> &str {
        self.prior_responses.last().map(String::as_str).unwrap_or("")
    }
}

/// Output of the final-select stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSelection {
    /// Most likely code
    #[serde(rename = "most_likely_code")]
    pub best: String,
    /// Next most likely code with a strictly lower rate than `best`
    #[serde(rename = "most_likely_lower_rate_code")]
    pub lower_rate: String,
    /// Result of the local rate re-check; `None` when the rates could not
    /// be compared
    #[serde(skip)]
    pub lower_rate_verified: Option<bool>,
}

impl FinalSelection {
    pub fn new(best: impl Into<String>, lower_rate: impl Into<String>) -> Self {
        Self {
            best: best.into(),
            lower_rate: lower_rate.into(),
            lower_rate_verified: None,
        }
    }
}

/// Parse a plain ad-valorem rate (`"Free"`, `"6.8%"`) into a percentage.
///
/// Compound and specific rates (`"2.2¢/kg + 5%"`) are not comparable and
/// yield `None`.
pub fn parse_ad_valorem(rate: &str) -> Option<f64> {
    let rate = rate.trim();
    if rate.eq_ignore_ascii_case("free") {
        return Some(0.0);
    }
    rate.strip_suffix('%')?.trim().parse::<f64>().ok()
}

/// Compare the two selected codes' catalog rates.
///
/// `Some(true)` when the alternative is strictly cheaper, `Some(false)` when
/// it is not, `None` when either code or rate cannot be compared.
pub fn verify_lower_rate(index: &CandidateIndex, selection: &FinalSelection) -> Option<bool> {
    let best = parse_ad_valorem(&index.full_code(&selection.best)?.duty_rate)?;
    let lower = parse_ad_valorem(&index.full_code(&selection.lower_rate)?.duty_rate)?;
    Some(lower < best)
}
