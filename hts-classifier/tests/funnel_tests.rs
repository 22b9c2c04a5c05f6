//! Narrowing funnel integration tests
//!
//! Runs the four stages against the sample catalog with a scripted oracle.

mod helpers;

use helpers::{funnel, ScriptedOracle, BOLT, FAIL_MARKER, HORSE_MALE, HORSE_SLAUGHTER, SCHEMA_MARKER, SCREW_SELF_TAPPING};
use hts_classifier::types::{CallContext, FunnelStage, OracleError};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_funnel_selects_codes_for_description() {
    let oracle = Arc::new(ScriptedOracle::new());
    let funnel = funnel(oracle.clone(), 3);

    let selection = funnel
        .classify("stainless self-tapping wood screws", &CallContext::new("INV-1"))
        .await
        .unwrap();

    assert_eq!(selection.best, SCREW_SELF_TAPPING);
    assert_eq!(selection.lower_rate, BOLT);
    // 6.2% vs Free
    assert_eq!(selection.lower_rate_verified, Some(true));

    // Three free-form stages, three extractions, one structured call
    assert_eq!(oracle.classify_calls(), 3);
    assert_eq!(oracle.extract_calls(), 3);
    assert_eq!(oracle.structured_calls(), 1);
}

#[tokio::test]
async fn test_stages_run_in_order_and_thread_prior_answer() {
    let oracle = Arc::new(ScriptedOracle::new());
    let funnel = funnel(oracle.clone(), 3);

    funnel
        .classify("purebred breeding horse", &CallContext::default())
        .await
        .unwrap();

    let stages: Vec<FunnelStage> = oracle.prompts().iter().map(|p| p.stage).collect();
    assert_eq!(stages, FunnelStage::ALL.to_vec());

    let short_code = oracle.prompt_for(FunnelStage::ShortCodeSelect).unwrap();
    let system = short_code.system.unwrap();
    assert!(system.contains("chapter-select answer (horse)"));
    // Candidates from the chapters the first stage picked
    assert!(system.contains("\"0101\""));
    assert!(!system.contains("7318"));

    let full_code = oracle.prompt_for(FunnelStage::FullCodeSelect).unwrap();
    let system = full_code.system.unwrap();
    assert!(system.contains("short-code-select answer (horse)"));
    assert!(system.contains(HORSE_MALE));
    assert!(system.contains("\"duty_rate\":\"Free\""));

    let final_select = oracle.prompt_for(FunnelStage::FinalSelect).unwrap();
    assert!(final_select.user.contains("full-code-select answer (horse)"));
    assert!(final_select.user.contains(HORSE_SLAUGHTER));
}

#[tokio::test]
async fn test_unknown_full_codes_omitted_from_final_candidates() {
    let oracle = Arc::new(ScriptedOracle::new());
    let funnel = funnel(oracle.clone(), 3);

    funnel.classify("hex bolts", &CallContext::default()).await.unwrap();

    let final_select = oracle.prompt_for(FunnelStage::FinalSelect).unwrap();
    assert!(final_select.user.contains(BOLT));
    assert!(!final_select.user.contains("7318.99.99.99"));
}

#[tokio::test]
async fn test_exhausted_retries_abort_at_first_stage() {
    let oracle = Arc::new(ScriptedOracle::new());
    let funnel = funnel(oracle.clone(), 3);

    let err = funnel
        .classify(&format!("widgets {}", FAIL_MARKER), &CallContext::default())
        .await
        .unwrap_err();

    assert_eq!(err.stage, FunnelStage::ChapterSelect);
    assert_eq!(err.source, OracleError::CallFailed("quota exhausted".to_string()));
    assert_eq!(oracle.classify_calls(), 3);
    assert_eq!(oracle.extract_calls(), 0);
}

#[tokio::test]
async fn test_schema_violation_not_retried() {
    let oracle = Arc::new(ScriptedOracle::new());
    let funnel = funnel(oracle.clone(), 3);

    let err = funnel
        .classify(&format!("screws {}", SCHEMA_MARKER), &CallContext::default())
        .await
        .unwrap_err();

    assert_eq!(err.stage, FunnelStage::FinalSelect);
    assert!(matches!(err.source, OracleError::ExtractionSchemaViolation(_)));
    assert_eq!(oracle.structured_calls(), 1);
}

#[tokio::test]
async fn test_lower_rate_not_cheaper_is_flagged_but_kept() {
    let oracle = Arc::new(ScriptedOracle::new().with_final_answer(json!({
        "most_likely_code": BOLT,
        "most_likely_lower_rate_code": SCREW_SELF_TAPPING,
    })));
    let funnel = funnel(oracle, 3);

    let selection = funnel.classify("bolts", &CallContext::default()).await.unwrap();

    assert_eq!(selection.best, BOLT);
    assert_eq!(selection.lower_rate, SCREW_SELF_TAPPING);
    assert_eq!(selection.lower_rate_verified, Some(false));
}

#[tokio::test]
async fn test_undotted_answer_mapped_to_catalog_form() {
    let oracle = Arc::new(ScriptedOracle::new().with_final_answer(json!({
        "most_likely_code": "7318141020",
        "most_likely_lower_rate_code": "no cheaper option",
    })));
    let funnel = funnel(oracle, 3);

    let selection = funnel.classify("screws", &CallContext::default()).await.unwrap();

    assert_eq!(selection.best, SCREW_SELF_TAPPING);
    assert_eq!(selection.lower_rate, "no cheaper option");
    assert_eq!(selection.lower_rate_verified, None);
}
