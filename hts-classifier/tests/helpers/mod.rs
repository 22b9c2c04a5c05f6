//! Test Helper Utilities
//!
//! Shared utilities for testing hts-classifier

// Each test crate uses a different subset of the helpers
#![allow(dead_code, unused_imports)]

pub mod catalog;
pub mod doubles;

pub use catalog::{sample_index, BOLT, HORSE_MALE, HORSE_SLAUGHTER, SCREW_SELF_TAPPING, SCREW_STAINLESS};
pub use doubles::{CountingRates, ScriptedOracle, StaticSuggester, FAIL_MARKER, SCHEMA_MARKER, SLOW_MARKER};

use hts_classifier::funnel::Funnel;
use hts_classifier::services::{BatchOrchestrator, RateResolver};
use hts_classifier::utils::RetryPolicy;
use std::sync::Arc;

/// Funnel over the sample catalog with immediate retries
pub fn funnel(oracle: Arc<ScriptedOracle>, max_attempts: u32) -> Funnel {
    Funnel::new(
        Arc::new(sample_index()),
        oracle.clone(),
        oracle,
        RetryPolicy::immediate(max_attempts),
    )
}

/// Orchestrator over the sample catalog; destination is always "US"
pub fn orchestrator(
    oracle: Arc<ScriptedOracle>,
    rates: Arc<CountingRates>,
    suggester: Arc<StaticSuggester>,
    max_concurrent_items: usize,
) -> BatchOrchestrator {
    let funnel = funnel(oracle, 3);
    let resolver = Arc::new(RateResolver::new(funnel.index().clone(), rates));
    BatchOrchestrator::new(funnel, resolver, suggester, "US", max_concurrent_items)
}
