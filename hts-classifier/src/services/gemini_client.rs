//! Gemini oracle client
//!
//! Implements both oracle capabilities over the `generateContent` REST
//! endpoint. Each funnel stage may use its own model; extraction always runs
//! on the configured extraction model. Temperature is pinned to 0.
//!
//! API Documentation: https://ai.google.dev/api/generate-content

use crate::funnel::prompts;
use crate::types::{
    CallContext, ClassificationOracle, ExtractionKind, ExtractionOracle, FunnelStage, OracleError, Prompt,
};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use hts_common::config::{OracleConfig, StageModels};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;

type DirectLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

fn build_request<'a>(prompt: &'a Prompt, schema: Option<&'a Value>) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part { text: &prompt.user }],
        }],
        system_instruction: prompt.system.as_deref().map(|text| Content {
            role: None,
            parts: vec![Part { text }],
        }),
        generation_config: GenerationConfig {
            temperature: 0.0,
            response_mime_type: schema.map(|_| "application/json"),
            response_schema: schema,
        },
    }
}

/// Concatenated text of the first candidate
fn response_text(response: GenerateResponse) -> Result<String, OracleError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(OracleError::CallFailed("empty response from model".to_string()));
    }
    Ok(text)
}

fn model_for(models: &StageModels, stage: FunnelStage) -> &str {
    match stage {
        FunnelStage::ChapterSelect => &models.chapter,
        FunnelStage::ShortCodeSelect => &models.short_code,
        FunnelStage::FullCodeSelect => &models.full_code,
        FunnelStage::FinalSelect => &models.final_select,
    }
}

/// Gemini-backed classification and extraction oracle
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    models: StageModels,
    rate_limiter: DirectLimiter,
}

impl GeminiClient {
    pub fn new(config: &OracleConfig) -> hts_common::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| hts_common::Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            models: config.models.clone(),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateRequest<'_>,
        ctx: &CallContext,
    ) -> Result<String, OracleError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        tracing::debug!(model, context = %ctx, "Calling Gemini generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| OracleError::CallFailed(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::CallFailed(format!(
                "Gemini returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OracleError::CallFailed(format!("Failed to parse Gemini response: {}", e)))?;

        response_text(parsed)
    }

    async fn generate_json(
        &self,
        model: &str,
        prompt: &Prompt,
        schema: &Value,
        ctx: &CallContext,
    ) -> Result<Value, OracleError> {
        let text = self.generate(model, &build_request(prompt, Some(schema)), ctx).await?;
        serde_json::from_str(&text)
            .map_err(|e| OracleError::ExtractionSchemaViolation(format!("model returned invalid JSON: {}", e)))
    }
}

#[async_trait]
impl ClassificationOracle for GeminiClient {
    async fn classify(&self, prompt: &Prompt, ctx: &CallContext) -> Result<String, OracleError> {
        let model = model_for(&self.models, prompt.stage);
        self.generate(model, &build_request(prompt, None), ctx).await
    }

    async fn classify_structured(
        &self,
        prompt: &Prompt,
        schema: &Value,
        ctx: &CallContext,
    ) -> Result<Value, OracleError> {
        let model = model_for(&self.models, prompt.stage);
        self.generate_json(model, prompt, schema, ctx).await
    }
}

#[async_trait]
impl ExtractionOracle for GeminiClient {
    async fn extract(
        &self,
        text: &str,
        kind: ExtractionKind,
        ctx: &CallContext,
    ) -> Result<Vec<String>, OracleError> {
        // Stage only matters for model choice, which extraction overrides
        let prompt = Prompt {
            stage: FunnelStage::ChapterSelect,
            system: None,
            user: prompts::extraction(kind, text),
        };

        let output = self
            .generate_json(&self.models.extraction, &prompt, &kind.response_schema(), ctx)
            .await?;
        let codes = kind.parse_output(&output)?;

        tracing::info!(context = %ctx, field = kind.field_name(), codes = ?codes, "Extracted codes");
        Ok(codes)
    }
}
