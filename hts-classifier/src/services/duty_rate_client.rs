//! SimplyDuty duty-rate client
//!
//! One `POST /duty/getduty` per code. Codes are sent in the service's
//! `dddd.dd.rest` form; the returned `DutyRate` is passed through as text.

use crate::types::{CallContext, RateLookup, RemoteLookupError};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use hts_common::catalog::{code_digits, is_well_formed_code};
use hts_common::config::DutyRateConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;

/// Fewest digits a code needs before the service can rate it
const MIN_RATEABLE_DIGITS: usize = 6;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DutyRequest<'a> {
    #[serde(rename = "HSCode")]
    hs_code: &'a str,
    origin_country_code: &'a str,
    destination_country_code: &'a str,
    temp_tariff: bool,
}

#[derive(Debug, Deserialize)]
struct DutyResponse {
    duty: DutyBody,
}

#[derive(Debug, Deserialize)]
struct DutyBody {
    #[serde(rename = "DutyRate")]
    duty_rate: Value,
}

/// Service form of a catalog code: dots stripped, then `dddd.dd.rest`
pub fn format_rate_code(code: &str) -> Result<String, RemoteLookupError> {
    if !is_well_formed_code(code) {
        return Err(RemoteLookupError::InvalidCode(code.to_string()));
    }
    let digits = code_digits(code);
    if digits.len() < MIN_RATEABLE_DIGITS {
        return Err(RemoteLookupError::InvalidCode(code.to_string()));
    }
    Ok(format!("{}.{}.{}", &digits[..4], &digits[4..6], &digits[6..]))
}

/// Rate values arrive as numbers or strings
fn rate_text(value: &Value) -> Result<String, RemoteLookupError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(RemoteLookupError::Parse(format!("unexpected DutyRate value: {}", other))),
    }
}

pub struct DutyRateClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl DutyRateClient {
    pub fn new(config: &DutyRateConfig) -> hts_common::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| hts_common::Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }
}

#[async_trait]
impl RateLookup for DutyRateClient {
    async fn lookup_rate(
        &self,
        origin: &str,
        destination: &str,
        code: &str,
        ctx: &CallContext,
    ) -> Result<String, RemoteLookupError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(RemoteLookupError::NotConfigured("duty-rate API key"))?;
        let hs_code = format_rate_code(code)?;

        self.rate_limiter.until_ready().await;

        tracing::debug!(code = %hs_code, origin, destination, context = %ctx, "Querying duty rate");

        let response = self
            .client
            .post(format!("{}/duty/getduty", self.base_url))
            .header("x-api-key", api_key)
            .json(&DutyRequest {
                hs_code: &hs_code,
                origin_country_code: origin,
                destination_country_code: destination,
                temp_tariff: true,
            })
            .send()
            .await
            .map_err(|e| RemoteLookupError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteLookupError::Api(status.as_u16(), body));
        }

        let parsed: DutyResponse = response
            .json()
            .await
            .map_err(|e| RemoteLookupError::Parse(e.to_string()))?;

        rate_text(&parsed.duty.duty_rate)
    }
}
