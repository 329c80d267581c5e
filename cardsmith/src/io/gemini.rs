//! Google Gemini backend using structured JSON output.
//!
//! The output schema is sent as `responseJsonSchema` so the model answers with
//! a single JSON document, which is written to the request's output path like
//! any other backend.

use std::fs;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::io::executor::{ExecRequest, Executor, write_log};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
const MAX_ERROR_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct GeminiCredentials {
    pub api_key: String,
}

pub struct GeminiExecutor {
    http: Client,
    api_base: String,
    model: String,
    credentials: GeminiCredentials,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_json_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
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
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiExecutor {
    pub fn new(api_base: &str, model: Option<&str>, credentials: GeminiCredentials) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            credentials,
        }
    }

    fn endpoint(&self) -> String {
        let model = self.model.strip_prefix("models/").unwrap_or(&self.model);
        format!("{}/models/{model}:generateContent", self.api_base)
    }
}

impl Executor for GeminiExecutor {
    #[instrument(skip_all, fields(model = %self.model, timeout_secs = request.timeout.as_secs()))]
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        info!("calling gemini generateContent");
        let schema_raw = fs::read_to_string(&request.output_schema_path).with_context(|| {
            format!("read output schema {}", request.output_schema_path.display())
        })?;
        let schema: Value = serde_json::from_str(&schema_raw).context("parse output schema")?;

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_json_schema: schema,
            },
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.credentials.api_key)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .context("send gemini request")?;
        let status = response.status();
        let raw = response.text().context("read gemini response body")?;
        write_log(&request.log_path, &raw, request.output_limit_bytes)?;

        if !status.is_success() {
            warn!(%status, "gemini request failed");
            bail!("gemini API error ({status}): {}", truncate_chars(&raw, MAX_ERROR_CHARS));
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&raw).context("parse gemini response")?;
        let text = extract_text(&parsed)?;
        fs::write(&request.output_path, strip_json_fence(&text))
            .with_context(|| format!("write {}", request.output_path.display()))?;
        debug!(bytes = text.len(), "gemini output written");
        Ok(())
    }
}

fn extract_text(response: &GenerateContentResponse) -> Result<String> {
    let text: String = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(anyhow!("gemini returned no text candidates"));
    }
    Ok(text)
}

/// Models occasionally wrap JSON in a markdown fence despite the mime type.
fn strip_json_fence(text: &str) -> &str {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("fence regex is valid")
    });
    match FENCE_RE.captures(text).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
