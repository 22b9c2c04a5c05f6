//! Scripted collaborators: oracle, duty-rate service, suggestion service

use super::catalog::{BOLT, HORSE_MALE, HORSE_SLAUGHTER, SCREW_SELF_TAPPING};
use async_trait::async_trait;
use hts_classifier::types::{
    CallContext, ClassificationOracle, CodeSuggester, ExtractionKind, ExtractionOracle, FunnelStage,
    OracleError, Prompt, RateLookup, RemoteLookupError, Suggestion,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Descriptions containing this fail every oracle call
pub const FAIL_MARKER: &str = "FAIL-ORACLE";
/// Descriptions containing this get a final answer with the wrong shape
pub const SCHEMA_MARKER: &str = "BAD-SCHEMA";
/// Descriptions containing this are answered slowly
pub const SLOW_MARKER: &str = "SLOW";

/// Oracle that answers about horses when the prompt mentions one and about
/// screws otherwise.
pub struct ScriptedOracle {
    delay: Duration,
    slow_delay: Duration,
    final_answer: Option<Value>,
    prompts: Mutex<Vec<Prompt>>,
    classify_calls: AtomicUsize,
    structured_calls: AtomicUsize,
    extract_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            slow_delay: Duration::from_millis(60),
            final_answer: None,
            prompts: Mutex::new(Vec::new()),
            classify_calls: AtomicUsize::new(0),
            structured_calls: AtomicUsize::new(0),
            extract_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every free-form call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fixed structured answer for the final stage
    pub fn with_final_answer(mut self, answer: Value) -> Self {
        self.final_answer = Some(answer);
        self
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn prompt_for(&self, stage: FunnelStage) -> Option<Prompt> {
        self.prompts().into_iter().find(|p| p.stage == stage)
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }

    pub fn structured_calls(&self) -> usize {
        self.structured_calls.load(Ordering::SeqCst)
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    /// Most free-form calls observed at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn prompt_text(prompt: &Prompt) -> String {
        format!("{}\n{}", prompt.system.as_deref().unwrap_or(""), prompt.user)
    }

    fn about_horses(text: &str) -> bool {
        text.to_lowercase().contains("horse")
    }
}

impl Default for ScriptedOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClassificationOracle for ScriptedOracle {
    async fn classify(&self, prompt: &Prompt, _ctx: &CallContext) -> Result<String, OracleError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());

        if prompt.user.contains(FAIL_MARKER) {
            return Err(OracleError::CallFailed("quota exhausted".to_string()));
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = if prompt.user.contains(SLOW_MARKER) {
            self.slow_delay
        } else {
            self.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let topic = if Self::about_horses(&prompt.user) { "horse" } else { "screw" };
        Ok(format!("{} answer ({})", prompt.stage, topic))
    }

    async fn classify_structured(
        &self,
        prompt: &Prompt,
        _schema: &Value,
        _ctx: &CallContext,
    ) -> Result<Value, OracleError> {
        self.structured_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());

        if prompt.user.contains(FAIL_MARKER) {
            return Err(OracleError::CallFailed("quota exhausted".to_string()));
        }
        if prompt.user.contains(SCHEMA_MARKER) {
            return Ok(json!({ "code": "7318" }));
        }
        if let Some(answer) = &self.final_answer {
            return Ok(answer.clone());
        }

        let text = Self::prompt_text(prompt);
        Ok(if Self::about_horses(&text) {
            json!({ "most_likely_code": HORSE_MALE, "most_likely_lower_rate_code": HORSE_SLAUGHTER })
        } else {
            json!({ "most_likely_code": SCREW_SELF_TAPPING, "most_likely_lower_rate_code": BOLT })
        })
    }
}

#[async_trait]
impl ExtractionOracle for ScriptedOracle {
    async fn extract(
        &self,
        text: &str,
        kind: ExtractionKind,
        _ctx: &CallContext,
    ) -> Result<Vec<String>, OracleError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        let horses = Self::about_horses(text);

        let codes: Vec<&str> = match (kind, horses) {
            (ExtractionKind::Chapters, true) => vec!["1", "01", "02"],
            (ExtractionKind::Chapters, false) => vec!["73", "84", "39"],
            (ExtractionKind::ShortCodes, true) => vec!["0101"],
            (ExtractionKind::ShortCodes, false) => vec!["7318", "73.17"],
            (ExtractionKind::FullCodes, true) => vec![HORSE_MALE, HORSE_SLAUGHTER],
            (ExtractionKind::FullCodes, false) => vec![SCREW_SELF_TAPPING, BOLT, "7318.99.99.99"],
        };
        Ok(codes.into_iter().map(str::to_string).collect())
    }
}

/// Duty-rate double: `"rate:<code>"` for every code, counting calls
pub struct CountingRates {
    calls: Mutex<Vec<String>>,
    failing: Vec<String>,
}

impl CountingRates {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: Vec::new(),
        }
    }

    /// Fail lookups for `code`
    pub fn failing_for(mut self, code: &str) -> Self {
        self.failing.push(code.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for CountingRates {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLookup for CountingRates {
    async fn lookup_rate(
        &self,
        _origin: &str,
        _destination: &str,
        code: &str,
        _ctx: &CallContext,
    ) -> Result<String, RemoteLookupError> {
        self.calls.lock().unwrap().push(code.to_string());
        if self.failing.iter().any(|c| c == code) {
            return Err(RemoteLookupError::Api(500, "upstream error".to_string()));
        }
        Ok(format!("rate:{}", code))
    }
}

/// Suggestion double: the same code for every description, or a failure
pub struct StaticSuggester {
    code: Option<String>,
    calls: AtomicUsize,
}

impl StaticSuggester {
    pub fn suggesting(code: &str) -> Self {
        Self {
            code: Some(code.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            code: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodeSuggester for StaticSuggester {
    async fn suggest_codes(
        &self,
        descriptions: &[String],
        _ctx: &CallContext,
    ) -> Result<Vec<Suggestion>, RemoteLookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let code = self
            .code
            .clone()
            .ok_or_else(|| RemoteLookupError::Network("connection refused".to_string()))?;

        Ok(descriptions
            .iter()
            .map(|description| Suggestion {
                description: description.clone(),
                code: code.clone(),
            })
            .collect())
    }
}
