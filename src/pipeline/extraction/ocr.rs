use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::types::{OcrEngine, OcrOutcome, SupportedFormats};
use super::ExtractionError;
use crate::config::OcrServiceConfig;

/// OCR.space HTTP client.
///
/// Sends `data:image/<ext>;base64,<payload>` as a form field and returns the
/// first parsed result's text. Network errors, non-2xx statuses, timeouts and
/// error flags in the response body all become `OcrOutcome::Failed`.
pub struct OcrSpaceClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: String,
    timeout_secs: u64,
    formats: SupportedFormats,
}

impl OcrSpaceClient {
    /// Build a client whose every request is bounded by `config.timeout`.
    pub fn new(config: &OcrServiceConfig) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExtractionError::ClientSetup(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            language: config.language.clone(),
            timeout_secs: config.timeout.as_secs(),
            formats: SupportedFormats::default(),
        })
    }

    pub fn with_formats(mut self, formats: SupportedFormats) -> Self {
        self.formats = formats;
        self
    }

    async fn request_text(
        &self,
        base64_payload: &str,
        extension: &str,
    ) -> Result<Option<String>, ExtractionError> {
        let image_field = format!("data:image/{extension};base64,{base64_payload}");
        let form = [
            ("apikey", self.api_key.as_str()),
            ("base64Image", image_field.as_str()),
            ("language", self.language.as_str()),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractionError::Timeout(self.timeout_secs)
                } else {
                    ExtractionError::OcrService(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::OcrService(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate(&body, 200)
            )));
        }

        let parsed: OcrSpaceResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ExtractionError::Timeout(self.timeout_secs)
            } else {
                ExtractionError::OcrService(format!("Invalid response body: {e}"))
            }
        })?;

        if parsed.is_errored_on_processing {
            return Err(ExtractionError::OcrService(format!(
                "Service reported processing error: {}",
                error_message_text(parsed.error_message.as_ref())
            )));
        }

        Ok(parsed.first_text())
    }
}

#[async_trait]
impl OcrEngine for OcrSpaceClient {
    async fn recognize(
        &self,
        base64_payload: &str,
        extension: &str,
    ) -> Result<OcrOutcome, ExtractionError> {
        let extension = extension.to_lowercase();
        if !self.formats.contains(&extension) {
            return Err(ExtractionError::UnsupportedFormat { name: extension });
        }

        let start = std::time::Instant::now();

        match self.request_text(base64_payload, &extension).await {
            Ok(Some(text)) => {
                tracing::debug!(
                    extension = %extension,
                    payload_len = base64_payload.len(),
                    elapsed_ms = %start.elapsed().as_millis(),
                    text_len = text.len(),
                    "OCR request complete"
                );
                Ok(OcrOutcome::Text(text))
            }
            Ok(None) => Ok(OcrOutcome::NoText),
            Err(e) => Ok(OcrOutcome::Failed {
                reason: e.to_string(),
            }),
        }
    }
}

/// Response body of the OCR.space parse endpoint (fields we read).
#[derive(Debug, Deserialize)]
struct OcrSpaceResponse {
    #[serde(rename = "ParsedResults", default)]
    parsed_results: Option<Vec<OcrSpaceParsedResult>>,
    #[serde(rename = "IsErroredOnProcessing", default)]
    is_errored_on_processing: bool,
    #[serde(rename = "ErrorMessage", default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OcrSpaceParsedResult {
    #[serde(rename = "ParsedText", default)]
    parsed_text: Option<String>,
}

impl OcrSpaceResponse {
    /// Text of the first parsed result; blank text counts as none.
    fn first_text(self) -> Option<String> {
        self.parsed_results?
            .into_iter()
            .next()?
            .parsed_text
            .filter(|t| !t.trim().is_empty())
    }
}

/// OCR.space reports `ErrorMessage` as either a string or a list of strings.
fn error_message_text(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
        None => "unknown error".to_string(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Mock OCR engine for unit testing without network access.
///
/// Pops scripted responses in order, then repeats the fallback response.
/// Honours the extension allow-list like the real client and counts calls.
pub struct MockOcrEngine {
    scripted: Mutex<VecDeque<OcrOutcome>>,
    fallback: OcrOutcome,
    formats: SupportedFormats,
    delay: Duration,
    calls: AtomicUsize,
    payloads: Mutex<Vec<String>>,
}

impl MockOcrEngine {
    /// Every call returns `text`.
    pub fn new(text: &str) -> Self {
        Self::scripted(Vec::new(), Some(text.to_string()))
    }

    /// Every call returns no text.
    pub fn silent() -> Self {
        Self::scripted(Vec::new(), None)
    }

    /// Every call fails as if the service were unreachable.
    pub fn failing(reason: &str) -> Self {
        Self::from_outcomes(
            Vec::new(),
            OcrOutcome::Failed {
                reason: reason.to_string(),
            },
        )
    }

    /// Scripted texts (`None` means no text), then `fallback` forever.
    pub fn scripted(responses: Vec<Option<String>>, fallback: Option<String>) -> Self {
        let to_outcome = |text: Option<String>| text.map_or(OcrOutcome::NoText, OcrOutcome::Text);
        Self::from_outcomes(
            responses.into_iter().map(to_outcome).collect(),
            to_outcome(fallback),
        )
    }

    fn from_outcomes(responses: Vec<OcrOutcome>, fallback: OcrOutcome) -> Self {
        Self {
            scripted: Mutex::new(responses.into()),
            fallback,
            formats: SupportedFormats::default(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Sleep for `delay` inside every call, after it is counted.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Base64 payloads received, in call order.
    pub fn payloads(&self) -> Vec<String> {
        self.payloads
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl OcrEngine for MockOcrEngine {
    async fn recognize(
        &self,
        base64_payload: &str,
        extension: &str,
    ) -> Result<OcrOutcome, ExtractionError> {
        if !self.formats.contains(extension) {
            return Err(ExtractionError::UnsupportedFormat {
                name: extension.to_lowercase(),
            });
        }

        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut payloads) = self.payloads.lock() {
            payloads.push(base64_payload.to_string());
        }

        let next = self
            .scripted
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}
