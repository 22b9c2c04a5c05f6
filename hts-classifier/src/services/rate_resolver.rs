//! Rate Resolution Service
//!
//! Resolves description and duty rate for the three codes reported per item
//! (most likely, lower-rate alternative, suggested). Identical codes share
//! one remote lookup and distinct lookups run concurrently. A failed lookup
//! only affects its own code.

use crate::types::{CallContext, RateLookup};
use futures::future::join_all;
use hts_common::catalog::{is_well_formed_code, CandidateIndex};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Rate placeholder when the remote service cannot answer for a code
pub const RATE_UNAVAILABLE: &str = "unable to retrieve";

/// Code with its catalog description and duty rate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeDetail {
    pub code: String,
    pub description: String,
    pub duty_rate: String,
}

/// Resolved details keyed by role
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateResolution {
    pub best: CodeDetail,
    pub lower_rate: CodeDetail,
    pub suggested: CodeDetail,
}

pub struct RateResolver {
    index: Arc<CandidateIndex>,
    rates: Arc<dyn RateLookup>,
}

impl RateResolver {
    pub fn new(index: Arc<CandidateIndex>, rates: Arc<dyn RateLookup>) -> Self {
        Self { index, rates }
    }

    /// Never fails; unavailable values are replaced by sentinels
    pub async fn resolve(
        &self,
        origin: &str,
        destination: &str,
        best: &str,
        lower_rate: &str,
        suggested: &str,
        ctx: &CallContext,
    ) -> RateResolution {
        let mut unique: Vec<&str> = Vec::with_capacity(3);
        for code in [best, lower_rate, suggested] {
            if !unique.contains(&code) {
                unique.push(code);
            }
        }

        // Local descriptions first; they never wait on the remote service
        let descriptions: HashMap<&str, String> = unique
            .iter()
            .map(|code| (*code, self.index.description_of(code)))
            .collect();

        let lookups = unique.iter().map(|code| {
            let code = *code;
            async move {
                if !is_well_formed_code(code) {
                    debug!(code, context = %ctx, "Skipping rate lookup for non-catalog code");
                    return (code, RATE_UNAVAILABLE.to_string());
                }

                match self.rates.lookup_rate(origin, destination, code, ctx).await {
                    Ok(rate) => (code, rate),
                    Err(e) => {
                        warn!(code, context = %ctx, error = %e, "Duty rate lookup failed");
                        (code, RATE_UNAVAILABLE.to_string())
                    }
                }
            }
        });
        let rates: HashMap<&str, String> = join_all(lookups).await.into_iter().collect();

        let detail = |code: &str| CodeDetail {
            code: code.to_string(),
            description: descriptions.get(code).cloned().unwrap_or_default(),
            duty_rate: rates
                .get(code)
                .cloned()
                .unwrap_or_else(|| RATE_UNAVAILABLE.to_string()),
        };

        RateResolution {
            best: detail(best),
            lower_rate: detail(lower_rate),
            suggested: detail(suggested),
        }
    }
}
