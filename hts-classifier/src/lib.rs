//! hts-classifier library interface
//!
//! Exposes the funnel, services and router for the binary and for
//! integration testing.

pub mod api;
pub mod error;
pub mod funnel;
pub mod services;
pub mod types;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use services::{BatchOrchestrator, ReportSink};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<BatchOrchestrator>,
    pub report_sink: Arc<dyn ReportSink>,
    /// Size of the loaded full-code index, reported by /health
    pub catalog_full_codes: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<BatchOrchestrator>,
        report_sink: Arc<dyn ReportSink>,
        catalog_full_codes: usize,
    ) -> Self {
        Self {
            orchestrator,
            report_sink,
            catalog_full_codes,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::classify_routes())
        .merge(api::health_routes())
        .with_state(state)
}
