//! Core Types and Trait Definitions
//!
//! Defines the capability seams between the classification core and its
//! external collaborators:
//! - **ClassificationOracle:** free-form ranking of candidates
//! - **ExtractionOracle:** code fragments out of free text
//! - **RateLookup:** remote duty-rate service
//! - **CodeSuggester:** remote catalog-suggestion service
//!
//! Implementations live in `services`; tests substitute scripted doubles.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Call context
// ============================================================================

/// Opaque diagnostic context carried alongside every external call.
///
/// Only ever attached to log records and spans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    tags: Vec<String>,
}

impl CallContext {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tags: vec![tag.into()],
        }
    }

    /// Child context with one more tag
    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        let mut tags = self.tags.clone();
        tags.push(tag.into());
        Self { tags }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl fmt::Display for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tags.join(" / "))
    }
}

// ============================================================================
// Funnel stages and prompts
// ============================================================================

/// The four narrowing stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunnelStage {
    ChapterSelect,
    ShortCodeSelect,
    FullCodeSelect,
    FinalSelect,
}

impl FunnelStage {
    pub const ALL: [FunnelStage; 4] = [
        FunnelStage::ChapterSelect,
        FunnelStage::ShortCodeSelect,
        FunnelStage::FullCodeSelect,
        FunnelStage::FinalSelect,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FunnelStage::ChapterSelect => "chapter-select",
            FunnelStage::ShortCodeSelect => "short-code-select",
            FunnelStage::FullCodeSelect => "full-code-select",
            FunnelStage::FinalSelect => "final-select",
        }
    }
}

impl fmt::Display for FunnelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Prompt handed to the classification oracle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Stage issuing the prompt; oracles may pick a model per stage
    pub stage: FunnelStage,
    pub system: Option<String>,
    pub user: String,
}

/// Shape of the code list an extraction must produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionKind {
    Chapters,
    ShortCodes,
    FullCodes,
}

impl ExtractionKind {
    /// JSON field holding the extracted list
    pub fn field_name(&self) -> &'static str {
        match self {
            ExtractionKind::Chapters => "chapters_list",
            ExtractionKind::ShortCodes | ExtractionKind::FullCodes => "code_list",
        }
    }

    /// Structured-output schema: `{ <field>: [string] }`
    pub fn response_schema(&self) -> Value {
        let field = self.field_name();
        json!({
            "type": "OBJECT",
            "properties": {
                field: { "type": "ARRAY", "items": { "type": "STRING" } }
            },
            "required": [field],
        })
    }

    /// Pull the declared list out of an oracle's JSON output.
    ///
    /// Any deviation from the declared shape fails the whole extraction.
    pub fn parse_output(&self, output: &Value) -> Result<Vec<String>, OracleError> {
        let field = self.field_name();
        let list = output.get(field).and_then(Value::as_array).ok_or_else(|| {
            OracleError::ExtractionSchemaViolation(format!("missing array field {:?}", field))
        })?;

        list.iter()
            .map(|item| {
                item.as_str().map(|s| s.trim().to_string()).ok_or_else(|| {
                    OracleError::ExtractionSchemaViolation(format!(
                        "non-string entry in {:?}: {}",
                        field, item
                    ))
                })
            })
            .collect()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Oracle errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    /// Transport, quota or upstream failure. Retryable.
    #[error("Oracle call failed: {0}")]
    CallFailed(String),

    /// Output did not match the declared structure. Not retried.
    #[error("Extraction schema violation: {0}")]
    ExtractionSchemaViolation(String),
}

impl OracleError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, OracleError::CallFailed(_))
    }
}

/// Remote lookup errors (duty rates and code suggestions)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteLookupError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Invalid code: {0}")]
    InvalidCode(String),
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Text-classification oracle
#[async_trait::async_trait]
pub trait ClassificationOracle: Send + Sync {
    /// Free-form natural-language answer
    async fn classify(&self, prompt: &Prompt, ctx: &CallContext) -> Result<String, OracleError>;

    /// Answer constrained to a JSON response schema
    async fn classify_structured(
        &self,
        prompt: &Prompt,
        schema: &Value,
        ctx: &CallContext,
    ) -> Result<Value, OracleError>;
}

/// Structured-extraction oracle
#[async_trait::async_trait]
pub trait ExtractionOracle: Send + Sync {
    async fn extract(
        &self,
        text: &str,
        kind: ExtractionKind,
        ctx: &CallContext,
    ) -> Result<Vec<String>, OracleError>;
}

/// Remote duty-rate service
#[async_trait::async_trait]
pub trait RateLookup: Send + Sync {
    async fn lookup_rate(
        &self,
        origin: &str,
        destination: &str,
        code: &str,
        ctx: &CallContext,
    ) -> Result<String, RemoteLookupError>;
}

/// One suggested code for one description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub description: String,
    pub code: String,
}

/// Remote catalog-suggestion service, an independent fourth candidate source
#[async_trait::async_trait]
pub trait CodeSuggester: Send + Sync {
    async fn suggest_codes(
        &self,
        descriptions: &[String],
        ctx: &CallContext,
    ) -> Result<Vec<Suggestion>, RemoteLookupError>;
}
