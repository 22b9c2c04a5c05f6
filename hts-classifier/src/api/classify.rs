//! Classification API handler
//!
//! POST /classify accepts a job envelope, classifies every item of the
//! invoice, hands the report to the configured sink and returns the rows.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    services::{BatchRequest, ClassificationRow},
    AppState,
};

/// POST /classify request envelope
#[derive(Debug, Deserialize)]
pub struct IncomingRequest {
    pub id: String,
    pub job_uuid: String,
    pub created: i64,
    pub api_version: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

/// POST /classify response
#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    /// "success" or "partial"
    pub status: &'static str,
    pub batch_id: Uuid,
    pub invoice_number: String,
    pub classified: usize,
    pub failed: usize,
    pub items: Vec<ClassificationRow>,
}

/// POST /classify
pub async fn classify(
    State(state): State<AppState>,
    Json(request): Json<IncomingRequest>,
) -> ApiResult<Json<ClassifyResponse>> {
    let batch = BatchRequest::from_job_data(&request.data)?;
    if batch.items.is_empty() {
        return Err(ApiError::BadRequest("Items is empty".to_string()));
    }

    tracing::info!(
        job_id = %request.id,
        job_uuid = %request.job_uuid,
        job_type = %request.kind,
        invoice = %batch.invoice_number,
        items = batch.items.len(),
        "Classification request received"
    );

    let report = state.orchestrator.run(batch).await;

    if let Err(e) = state.report_sink.deliver(&report).await {
        tracing::error!(batch_id = %report.batch_id, error = %e, "Report delivery failed");
        *state.last_error.write().await = Some(format!("report delivery failed: {}", e));
        return Err(e.into());
    }

    if report.failed > 0 {
        *state.last_error.write().await = Some(format!(
            "batch {}: {} of {} items failed",
            report.batch_id,
            report.failed,
            report.rows.len()
        ));
    }

    Ok(Json(ClassifyResponse {
        status: report.status(),
        batch_id: report.batch_id,
        invoice_number: report.invoice_number,
        classified: report.succeeded,
        failed: report.failed,
        items: report.rows,
    }))
}

/// Build classification routes
pub fn classify_routes() -> Router<AppState> {
    Router::new().route("/classify", post(classify))
}
