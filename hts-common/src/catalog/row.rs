//! Raw catalog rows and index entries

use serde::{Deserialize, Deserializer, Serialize};

/// Separator placed between inherited description fragments
pub const DESCRIPTION_SEPARATOR: &str = "<br> ";

/// Code length of an addressable short code (e.g. `0101`)
pub const SHORT_CODE_LEN: usize = 4;

/// Code length of an addressable full code (e.g. `0101.21.00.10`)
pub const FULL_CODE_LEN: usize = 13;

/// One line of the tariff schedule as found in the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRow {
    /// Dotted digit string; empty for a section header
    #[serde(rename = "htsno", default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
    /// Nesting depth (the snapshot stores it as a string)
    #[serde(deserialize_with = "indent_from_snapshot", default)]
    pub indent: u32,
    /// General duty rate; empty means inherit from the nearest rated ancestor
    #[serde(rename = "general", default)]
    pub base_rate: String,
}

impl CatalogRow {
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        indent: u32,
        base_rate: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            indent,
            base_rate: base_rate.into(),
        }
    }

    /// Section headers carry no code and only contribute description text
    pub fn is_header(&self) -> bool {
        self.code.is_empty()
    }

    /// First two code characters (the chapter)
    pub fn chapter(&self) -> &str {
        self.code.get(..2).unwrap_or(&self.code)
    }

    pub fn has_rate(&self) -> bool {
        !self.base_rate.trim().is_empty()
    }
}

/// Entry of the short-code index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortCodeEntry {
    pub code: String,
    pub description: String,
}

/// Entry of the full-code index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullCodeEntry {
    pub code: String,
    pub description: String,
    /// Inherited general rate; empty means unknown, not zero
    pub duty_rate: String,
}

/// A code is well formed when it holds only ASCII digits and `.` separators
pub fn is_well_formed_code(code: &str) -> bool {
    !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit() || b == b'.')
}

/// Strip every non-digit character from a code
pub fn code_digits(code: &str) -> String {
    code.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Dotted catalog form of a 10-digit full code (`dddd.dd.dd.dd`)
pub fn dotted_full_code(code: &str) -> Option<String> {
    let digits = code_digits(code);
    (digits.len() == 10).then(|| {
        format!(
            "{}.{}.{}.{}",
            &digits[..4],
            &digits[4..6],
            &digits[6..8],
            &digits[8..]
        )
    })
}

/// Prepend an inherited fragment unless it is already the leading fragment.
///
/// Returns true when the description changed.
pub(crate) fn prepend_fragment(description: &mut String, fragment: &str) -> bool {
    let mut amended = String::with_capacity(fragment.len() + DESCRIPTION_SEPARATOR.len() + description.len());
    amended.push_str(fragment);
    amended.push_str(DESCRIPTION_SEPARATOR);

    if description.starts_with(&amended) {
        return false;
    }

    amended.push_str(description);
    *description = amended;
    true
}

fn indent_from_snapshot<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawIndent {
        Number(u32),
        Text(String),
    }

    match RawIndent::deserialize(deserializer)? {
        RawIndent::Number(n) => Ok(n),
        RawIndent::Text(s) if s.trim().is_empty() => Ok(0),
        RawIndent::Text(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|e| serde::de::Error::custom(format!("invalid indent {:?}: {}", s, e))),
    }
}
