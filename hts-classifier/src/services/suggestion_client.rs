//! Tariffy catalog-suggestion client
//!
//! A single `POST /lookup-codes` call covers the whole batch. Returned codes
//! are rewritten into the catalog's dotted `dddd.dd.dd.rest` form.

use crate::types::{CallContext, CodeSuggester, RemoteLookupError, Suggestion};
use async_trait::async_trait;
use hts_common::catalog::code_digits;
use hts_common::config::SuggestionConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    organization_id: &'a str,
    api_key: &'a str,
    descriptions: &'a [String],
    region: &'a str,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct LookupItem {
    description: String,
    #[serde(default)]
    hs_code_usa: String,
}

/// Dotted catalog form of a suggested code.
///
/// Codes too short to split are returned unchanged.
pub fn format_suggested_code(code: &str) -> String {
    let digits = code_digits(code);
    if digits.len() < 8 {
        return code.trim().to_string();
    }
    let rest = &digits[8..];
    if rest.is_empty() {
        format!("{}.{}.{}", &digits[..4], &digits[4..6], &digits[6..8])
    } else {
        format!("{}.{}.{}.{}", &digits[..4], &digits[4..6], &digits[6..8], rest)
    }
}

pub struct SuggestionClient {
    client: Client,
    base_url: String,
    organization_id: Option<String>,
    api_key: Option<String>,
    region: String,
    language: String,
}

impl SuggestionClient {
    pub fn new(config: &SuggestionConfig) -> hts_common::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| hts_common::Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            organization_id: config.organization_id.clone(),
            api_key: config.api_key.clone(),
            region: config.region.clone(),
            language: config.language.clone(),
        })
    }
}

#[async_trait]
impl CodeSuggester for SuggestionClient {
    async fn suggest_codes(
        &self,
        descriptions: &[String],
        ctx: &CallContext,
    ) -> Result<Vec<Suggestion>, RemoteLookupError> {
        let (Some(organization_id), Some(api_key)) = (self.organization_id.as_deref(), self.api_key.as_deref())
        else {
            return Err(RemoteLookupError::NotConfigured("suggestion service credentials"));
        };

        tracing::info!(count = descriptions.len(), context = %ctx, "Requesting suggested codes");

        let response = self
            .client
            .post(format!("{}/lookup-codes", self.base_url))
            .json(&LookupRequest {
                organization_id,
                api_key,
                descriptions,
                region: &self.region,
                language: &self.language,
            })
            .send()
            .await
            .map_err(|e| RemoteLookupError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteLookupError::Api(status.as_u16(), body));
        }

        let items: Vec<LookupItem> = response
            .json()
            .await
            .map_err(|e| RemoteLookupError::Parse(e.to_string()))?;

        Ok(items
            .into_iter()
            .map(|item| Suggestion {
                description: item.description,
                code: format_suggested_code(&item.hs_code_usa),
            })
            .collect())
    }
}
