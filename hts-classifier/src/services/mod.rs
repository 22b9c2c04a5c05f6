//! Service modules for the classification workflow
//!
//! - Remote clients: Gemini oracle, SimplyDuty rates, Tariffy suggestions
//! - Rate resolution per reported code
//! - Batch orchestration and report delivery

pub mod batch_orchestrator;
pub mod duty_rate_client;
pub mod gemini_client;
pub mod rate_resolver;
pub mod report_sink;
pub mod suggestion_client;

pub use batch_orchestrator::{
    BatchInputError, BatchItem, BatchOrchestrator, BatchReport, BatchRequest, ClassificationRow,
    CLASSIFICATION_FAILED, SUGGESTION_UNAVAILABLE,
};
pub use duty_rate_client::{format_rate_code, DutyRateClient};
pub use gemini_client::GeminiClient;
pub use rate_resolver::{CodeDetail, RateResolution, RateResolver, RATE_UNAVAILABLE};
pub use report_sink::{JsonReportSink, ReportSink};
pub use suggestion_client::{format_suggested_code, SuggestionClient};
