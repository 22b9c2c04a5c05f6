//! Batch Orchestrator
//!
//! Fans the funnel out over every item of a batch, runs the catalog
//! suggestion call alongside, then resolves rates and descriptions for the
//! three reported codes of each item.
//!
//! # Concurrency
//! - Funnels run via `futures::stream::buffer_unordered(max_concurrent_items)`
//! - The suggestion call runs concurrently with the funnels (`tokio::join!`)
//! - Rate resolution is bounded by the same limit
//! - Results carry their item index and are re-associated by index
//!
//! # Partial failure
//! A failed funnel marks its own row with [`CLASSIFICATION_FAILED`] and an
//! `error` message. Sibling items are unaffected.

use crate::funnel::{FinalSelection, Funnel, FunnelError};
use crate::services::rate_resolver::{RateResolution, RateResolver};
use crate::types::{CallContext, CodeSuggester};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use hts_common::catalog::is_well_formed_code;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Placed in both selected-code slots when an item's funnel fails
pub const CLASSIFICATION_FAILED: &str = "classification failed";

/// Suggested code placeholder when the suggestion service cannot answer
pub const SUGGESTION_UNAVAILABLE: &str = "unable to retrieve code";

/// Job payload that cannot be turned into a batch
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchInputError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("item {index} is missing {field:?}")]
    InvalidItem { index: usize, field: &'static str },
}

/// One line of the incoming invoice
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub description: String,
    pub origin_country: String,
    /// Every field of the item as received, echoed into the report
    pub fields: Map<String, Value>,
}

impl BatchItem {
    pub fn new(description: impl Into<String>, origin_country: impl Into<String>) -> Self {
        let description = description.into();
        let origin_country = origin_country.into();
        let mut fields = Map::new();
        fields.insert("Description".to_string(), Value::String(description.clone()));
        fields.insert("Country of Origin".to_string(), Value::String(origin_country.clone()));
        Self {
            description,
            origin_country,
            fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    pub invoice_number: String,
    pub requestor: Option<String>,
    pub items: Vec<BatchItem>,
}

impl BatchRequest {
    /// Read a batch out of the job envelope's `data` object:
    /// `caller.email`, `value["General Information"]["Invoice Number"]`
    /// and `value.Items[]` (`Description`, `Country of Origin`).
    pub fn from_job_data(data: &Value) -> Result<Self, BatchInputError> {
        let value = data.get("value").ok_or(BatchInputError::MissingField("value"))?;

        let items = value
            .get("Items")
            .and_then(Value::as_array)
            .ok_or(BatchInputError::MissingField("Items"))?;

        let items = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let fields = item
                    .as_object()
                    .cloned()
                    .ok_or(BatchInputError::InvalidItem { index, field: "Description" })?;
                let text = |field: &'static str| {
                    fields
                        .get(field)
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .ok_or(BatchInputError::InvalidItem { index, field })
                };
                Ok(BatchItem {
                    description: text("Description")?,
                    origin_country: text("Country of Origin")?,
                    fields: fields.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let invoice_number = value
            .get("General Information")
            .and_then(|g| g.get("Invoice Number"))
            .and_then(|n| match n {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_default();

        let requestor = data
            .get("caller")
            .and_then(|c| c.get("email"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            invoice_number,
            requestor,
            items,
        })
    }
}

/// One output row: the item's own fields followed by the classification columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationRow {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub most_likely_code: String,
    pub most_likely_code_desc: String,
    pub most_likely_code_duty_rate: String,
    pub most_likely_code_lower_rate_code: String,
    pub most_likely_code_lower_rate_desc: String,
    pub most_likely_code_lower_rate_duty_rate: String,
    pub tariffy_hts_code: String,
    pub tariffy_hts_code_desc: String,
    pub tariffy_hts_code_duty_rate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClassificationRow {
    fn new(item: &BatchItem, resolution: RateResolution, error: Option<String>) -> Self {
        Self {
            fields: item.fields.clone(),
            most_likely_code: resolution.best.code,
            most_likely_code_desc: resolution.best.description,
            most_likely_code_duty_rate: resolution.best.duty_rate,
            most_likely_code_lower_rate_code: resolution.lower_rate.code,
            most_likely_code_lower_rate_desc: resolution.lower_rate.description,
            most_likely_code_lower_rate_duty_rate: resolution.lower_rate.duty_rate,
            tariffy_hts_code: resolution.suggested.code,
            tariffy_hts_code_desc: resolution.suggested.description,
            tariffy_hts_code_duty_rate: resolution.suggested.duty_rate,
            error,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Finished batch, rows in input order
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub invoice_number: String,
    pub requestor: Option<String>,
    pub created_at: DateTime<Utc>,
    pub succeeded: usize,
    pub failed: usize,
    pub rows: Vec<ClassificationRow>,
}

impl BatchReport {
    pub fn new(invoice_number: String, requestor: Option<String>, rows: Vec<ClassificationRow>) -> Self {
        let failed = rows.iter().filter(|row| row.is_failed()).count();
        Self {
            batch_id: Uuid::new_v4(),
            invoice_number,
            requestor,
            created_at: Utc::now(),
            succeeded: rows.len() - failed,
            failed,
            rows,
        }
    }

    /// `"success"` when every item classified, otherwise `"partial"`
    pub fn status(&self) -> &'static str {
        if self.failed == 0 {
            "success"
        } else {
            "partial"
        }
    }
}

pub struct BatchOrchestrator {
    funnel: Funnel,
    resolver: Arc<RateResolver>,
    suggester: Arc<dyn CodeSuggester>,
    destination_country: String,
    max_concurrent_items: usize,
}

impl BatchOrchestrator {
    pub fn new(
        funnel: Funnel,
        resolver: Arc<RateResolver>,
        suggester: Arc<dyn CodeSuggester>,
        destination_country: impl Into<String>,
        max_concurrent_items: usize,
    ) -> Self {
        Self {
            funnel,
            resolver,
            suggester,
            destination_country: destination_country.into(),
            max_concurrent_items: max_concurrent_items.max(1),
        }
    }

    /// Classify every item. Never fails as a whole; item failures land in
    /// their own rows.
    pub async fn run(&self, request: BatchRequest) -> BatchReport {
        let ctx = CallContext::new(if request.invoice_number.is_empty() {
            "batch".to_string()
        } else {
            request.invoice_number.clone()
        });

        info!(
            context = %ctx,
            items = request.items.len(),
            max_concurrent = self.max_concurrent_items,
            "Classifying batch"
        );

        let descriptions: Vec<String> = request.items.iter().map(|item| item.description.clone()).collect();

        let funnels = stream::iter(request.items.iter().cloned().enumerate())
            .map(|(index, item)| {
                let funnel = self.funnel.clone();
                let item_ctx = ctx.with_tag(item.description.clone());
                let span = tracing::info_span!("classify_item", index, description = %item.description);
                async move {
                    let outcome = funnel.classify(&item.description, &item_ctx).await;
                    (index, outcome)
                }
                .instrument(span)
            })
            .buffer_unordered(self.max_concurrent_items)
            .collect::<Vec<(usize, Result<FinalSelection, FunnelError>)>>();

        let (mut outcomes, suggestions) = tokio::join!(funnels, self.suggest(&descriptions, &ctx));
        outcomes.sort_by_key(|(index, _)| *index);

        let mut rows: Vec<(usize, ClassificationRow)> = stream::iter(outcomes)
            .map(|(index, outcome)| {
                let item = request.items[index].clone();
                let suggested = suggestions
                    .get(&item.description)
                    .cloned()
                    .unwrap_or_else(|| SUGGESTION_UNAVAILABLE.to_string());
                let item_ctx = ctx.with_tag(item.description.clone());
                let resolver = self.resolver.clone();
                let destination = self.destination_country.clone();

                async move {
                    let (best, lower_rate, error) = match outcome {
                        Ok(selection) => (selection.best, selection.lower_rate, None),
                        Err(e) => {
                            warn!(context = %item_ctx, error = %e, "Item classification failed");
                            (
                                CLASSIFICATION_FAILED.to_string(),
                                CLASSIFICATION_FAILED.to_string(),
                                Some(e.to_string()),
                            )
                        }
                    };

                    let resolution = resolver
                        .resolve(
                            &item.origin_country,
                            &destination,
                            &best,
                            &lower_rate,
                            &suggested,
                            &item_ctx,
                        )
                        .await;
                    (index, ClassificationRow::new(&item, resolution, error))
                }
            })
            .buffer_unordered(self.max_concurrent_items)
            .collect()
            .await;
        rows.sort_by_key(|(index, _)| *index);

        let report = BatchReport::new(
            request.invoice_number,
            request.requestor,
            rows.into_iter().map(|(_, row)| row).collect(),
        );

        info!(
            context = %ctx,
            batch_id = %report.batch_id,
            succeeded = report.succeeded,
            failed = report.failed,
            "Batch classified"
        );
        report
    }

    /// Suggested code per description. Descriptions without a usable code
    /// fall back to the sentinel, as does every description when the service
    /// fails.
    async fn suggest(&self, descriptions: &[String], ctx: &CallContext) -> HashMap<String, String> {
        match self.suggester.suggest_codes(descriptions, ctx).await {
            Ok(suggestions) => suggestions
                .into_iter()
                .filter(|s| {
                    let usable = is_well_formed_code(&s.code);
                    if !usable {
                        debug!(context = %ctx, description = %s.description, code = %s.code, "Unusable suggested code");
                    }
                    usable
                })
                .map(|s| (s.description, s.code))
                .collect(),
            Err(e) => {
                warn!(context = %ctx, error = %e, "Code suggestion failed for whole batch");
                HashMap::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job_data() -> Value {
        json!({
            "caller": { "email": "broker@example.com" },
            "value": {
                "General Information": { "Invoice Number": "INV-42" },
                "Items": [
                    { "Description": "steel wood screws", "Country of Origin": "CN", "Quantity": 100 },
                    { "Description": " cotton t-shirts ", "Country of Origin": "VN" }
                ]
            }
        })
    }

    #[test]
    fn test_from_job_data() {
        let request = BatchRequest::from_job_data(&job_data()).unwrap();

        assert_eq!(request.invoice_number, "INV-42");
        assert_eq!(request.requestor.as_deref(), Some("broker@example.com"));
        assert_eq!(request.items.len(), 2);
        assert_eq!(request.items[1].description, "cotton t-shirts");
        assert_eq!(request.items[0].fields["Quantity"], 100);
    }

    #[test]
    fn test_from_job_data_requires_items() {
        let data = json!({ "value": { "General Information": {} } });
        assert_eq!(
            BatchRequest::from_job_data(&data),
            Err(BatchInputError::MissingField("Items"))
        );
    }

    #[test]
    fn test_from_job_data_requires_description() {
        let data = json!({ "value": { "Items": [{ "Country of Origin": "CN" }] } });
        assert_eq!(
            BatchRequest::from_job_data(&data),
            Err(BatchInputError::InvalidItem { index: 0, field: "Description" })
        );
    }

    #[test]
    fn test_row_serializes_item_fields_then_columns() {
        let item = BatchItem::new("bolts", "DE");
        let detail = |code: &str| crate::services::rate_resolver::CodeDetail {
            code: code.to_string(),
            description: "d".to_string(),
            duty_rate: "Free".to_string(),
        };
        let row = ClassificationRow::new(
            &item,
            RateResolution {
                best: detail("7318.15.20.65"),
                lower_rate: detail("7318.15.80.66"),
                suggested: detail("7318.15.20.65"),
            },
            None,
        );

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["Description"], "bolts");
        assert_eq!(value["most_likely_code_lower_rate_code"], "7318.15.80.66");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_report_status_counts_failures() {
        let item = BatchItem::new("bolts", "DE");
        let detail = crate::services::rate_resolver::CodeDetail {
            code: CLASSIFICATION_FAILED.to_string(),
            description: "Code not found".to_string(),
            duty_rate: "unable to retrieve".to_string(),
        };
        let resolution = RateResolution {
            best: detail.clone(),
            lower_rate: detail.clone(),
            suggested: detail,
        };
        let ok = ClassificationRow::new(&item, resolution.clone(), None);
        let failed = ClassificationRow::new(&item, resolution, Some("boom".to_string()));

        let report = BatchReport::new("INV".to_string(), None, vec![ok.clone(), failed]);
        assert_eq!((report.succeeded, report.failed), (1, 1));
        assert_eq!(report.status(), "partial");

        let report = BatchReport::new("INV".to_string(), None, vec![ok]);
        assert_eq!(report.status(), "success");
    }
}
