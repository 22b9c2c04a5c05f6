//! Narrowing Funnel
//!
//! Four dependent oracle-backed stages narrow a free-text description down
//! to a pair of full codes:
//!
//! 1. **chapter-select:** chapter listing → at least three chapters
//! 2. **short-code-select:** short codes under those chapters → up to six
//! 3. **full-code-select:** full codes under those short codes → up to six
//! 4. **final-select:** exact entries → most likely code plus lower-rate alternative
//!
//! Each stage reads the previous oracle answer from [`ClassificationState`]
//! and appends its own. A failing stage aborts the run for this description
//! only.

pub mod prompts;
pub mod state;

pub use state::{parse_ad_valorem, verify_lower_rate, ClassificationState, FinalSelection};

use crate::types::{
    CallContext, ClassificationOracle, ExtractionKind, ExtractionOracle, FunnelStage, OracleError, Prompt,
};
use crate::utils::{retry_oracle, RetryPolicy};
use hts_common::catalog::{code_digits, normalize_chapter, render_candidates, CandidateIndex, SHORT_CODE_LEN};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A stage failed; the description gets no selection
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{stage} failed: {source}")]
pub struct FunnelError {
    pub stage: FunnelStage,
    #[source]
    pub source: OracleError,
}

/// Structured-output schema of the final-select stage
pub fn final_selection_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "most_likely_code": { "type": "STRING" },
            "most_likely_lower_rate_code": { "type": "STRING" },
        },
        "required": ["most_likely_code", "most_likely_lower_rate_code"],
    })
}

/// First occurrence of each value, in input order
pub fn dedup_in_order(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values.into_iter().filter(|v| seen.insert(v.clone())).collect()
}

/// Four-digit short code out of an extracted fragment (`"101"`, `"01.01"`, `"0101"`)
pub fn normalize_short_code(fragment: &str) -> Option<String> {
    let digits = code_digits(fragment);
    match digits.len() {
        0..=2 => None,
        3 => Some(format!("0{}", digits)),
        _ => Some(digits[..SHORT_CODE_LEN].to_string()),
    }
}

/// Drives the four stages for one description at a time.
///
/// Cheap to clone; the index and oracles are shared.
#[derive(Clone)]
pub struct Funnel {
    index: Arc<CandidateIndex>,
    classifier: Arc<dyn ClassificationOracle>,
    extractor: Arc<dyn ExtractionOracle>,
    retry: RetryPolicy,
}

impl Funnel {
    pub fn new(
        index: Arc<CandidateIndex>,
        classifier: Arc<dyn ClassificationOracle>,
        extractor: Arc<dyn ExtractionOracle>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            index,
            classifier,
            extractor,
            retry,
        }
    }

    pub fn index(&self) -> &Arc<CandidateIndex> {
        &self.index
    }

    /// Run every stage in order and return the final selection
    pub async fn classify(&self, description: &str, ctx: &CallContext) -> Result<FinalSelection, FunnelError> {
        let mut state = ClassificationState::new(description);

        for stage in FunnelStage::ALL {
            let stage_ctx = ctx.with_tag(stage.name());
            self.run_stage(stage, &mut state, &stage_ctx)
                .await
                .map_err(|source| FunnelError { stage, source })?;
        }

        state.final_selection.take().ok_or(FunnelError {
            stage: FunnelStage::FinalSelect,
            source: OracleError::ExtractionSchemaViolation("no final selection produced".to_string()),
        })
    }

    async fn run_stage(
        &self,
        stage: FunnelStage,
        state: &mut ClassificationState,
        ctx: &CallContext,
    ) -> Result<(), OracleError> {
        match stage {
            FunnelStage::ChapterSelect => self.select_chapters(state, ctx).await,
            FunnelStage::ShortCodeSelect => self.select_short_codes(state, ctx).await,
            FunnelStage::FullCodeSelect => self.select_full_codes(state, ctx).await,
            FunnelStage::FinalSelect => self.select_final(state, ctx).await,
        }
    }

    async fn select_chapters(&self, state: &mut ClassificationState, ctx: &CallContext) -> Result<(), OracleError> {
        let prompt = prompts::chapter_select(&state.description, &self.index.chapter_listing());
        let response = self.ask(&prompt, ctx).await?;

        let chapters = self.extract(&response, ExtractionKind::Chapters, ctx).await?;
        let chapters = dedup_in_order(
            chapters
                .iter()
                .map(|c| normalize_chapter(c))
                .filter(|c| c.len() == 2),
        );

        info!(context = %ctx, chapters = ?chapters, "Chapters selected");
        state.prior_responses.push(response);
        state.chapter_candidates = chapters;
        Ok(())
    }

    async fn select_short_codes(&self, state: &mut ClassificationState, ctx: &CallContext) -> Result<(), OracleError> {
        let candidates = self.index.short_codes_under_chapters(&state.chapter_candidates);
        debug!(context = %ctx, candidates = candidates.len(), "Short-code candidates");

        let prompt = prompts::short_code_select(
            &state.description,
            state.last_response(),
            &render_candidates(&candidates),
        );
        let response = self.ask(&prompt, ctx).await?;

        let fragments = self.extract(&response, ExtractionKind::ShortCodes, ctx).await?;
        let short_codes = dedup_in_order(fragments.iter().filter_map(|f| normalize_short_code(f)));

        info!(context = %ctx, short_codes = ?short_codes, "Short codes selected");
        state.prior_responses.push(response);
        state.short_code_candidates = short_codes;
        Ok(())
    }

    async fn select_full_codes(&self, state: &mut ClassificationState, ctx: &CallContext) -> Result<(), OracleError> {
        let candidates = self.index.full_codes_under_short_codes(&state.short_code_candidates);
        debug!(context = %ctx, candidates = candidates.len(), "Full-code candidates");

        let prompt = prompts::full_code_select(
            &state.description,
            state.last_response(),
            &render_candidates(&candidates),
        );
        let response = self.ask(&prompt, ctx).await?;

        let full_codes = self.extract(&response, ExtractionKind::FullCodes, ctx).await?;

        info!(context = %ctx, full_codes = ?full_codes, "Full codes selected");
        state.prior_responses.push(response);
        state.full_code_candidates = full_codes;
        Ok(())
    }

    async fn select_final(&self, state: &mut ClassificationState, ctx: &CallContext) -> Result<(), OracleError> {
        let candidates = self.index.full_codes_exact(&state.full_code_candidates);
        let prompt = prompts::final_select(
            &state.description,
            state.last_response(),
            &render_candidates(&candidates),
        );
        let schema = final_selection_schema();

        let output = retry_oracle("classify_structured", &self.retry, ctx, || {
            self.classifier.classify_structured(&prompt, &schema, ctx)
        })
        .await?;

        let mut selection: FinalSelection = serde_json::from_value(output.clone())
            .map_err(|e| OracleError::ExtractionSchemaViolation(format!("final selection: {}", e)))?;

        // Canonical dotted form when the oracle answered with bare digits
        for code in [&mut selection.best, &mut selection.lower_rate] {
            if let Some(entry) = self.index.full_code(code.trim()) {
                *code = entry.code.clone();
            }
        }

        selection.lower_rate_verified = verify_lower_rate(&self.index, &selection);
        if selection.lower_rate_verified == Some(false) {
            warn!(
                context = %ctx,
                best = %selection.best,
                lower_rate = %selection.lower_rate,
                "Alternative code is not cheaper than the most likely code"
            );
        }

        info!(
            context = %ctx,
            best = %selection.best,
            lower_rate = %selection.lower_rate,
            "Final selection"
        );
        state.prior_responses.push(output.to_string());
        state.final_selection = Some(selection);
        Ok(())
    }

    async fn ask(&self, prompt: &Prompt, ctx: &CallContext) -> Result<String, OracleError> {
        retry_oracle("classify", &self.retry, ctx, || self.classifier.classify(prompt, ctx)).await
    }

    async fn extract(&self, text: &str, kind: ExtractionKind, ctx: &CallContext) -> Result<Vec<String>, OracleError> {
        retry_oracle("extract", &self.retry, ctx, || self.extractor.extract(text, kind, ctx)).await
    }
}
