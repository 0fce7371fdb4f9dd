use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::{ChatforestError, Result};

pub const PLACEHOLDER_SUMMARY: &str =
    "This is a placeholder summary as the API key is not configured.";
pub const FAILED_SUMMARY: &str = "API Call Failed";

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns thread text into a summary. The result is shown as-is, failures
/// included.
pub trait Summarizer {
    fn summarize(&self, thread_text: &str) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizerConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
}

impl SummarizerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        // Precedence:
        // 1) CHATFOREST_API_KEY
        // 2) GEMINI_API_KEY
        // 3) API_KEY
        let api_key = ["CHATFOREST_API_KEY", "GEMINI_API_KEY", "API_KEY"]
            .into_iter()
            .find_map(non_empty);

        let model = non_empty("CHATFOREST_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_base = non_empty("CHATFOREST_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Self {
            api_key,
            model,
            api_base,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderSummarizer;

impl Summarizer for PlaceholderSummarizer {
    fn summarize(&self, _thread_text: &str) -> String {
        PLACEHOLDER_SUMMARY.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct GeminiSummarizer {
    api_key: String,
    model: String,
    api_base: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
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
    text: Option<String>,
}

impl GeminiSummarizer {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            api_base: api_base.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    fn request(&self, prompt: &str) -> Result<String> {
        let summarizer_error = |err: reqwest::Error| ChatforestError::Summarizer(err.to_string());

        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(summarizer_error)?;

        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(summarizer_error)?
            .json::<GenerateResponse>()
            .map_err(summarizer_error)?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ChatforestError::Summarizer(
                "response carried no text".to_string(),
            ));
        }
        Ok(text)
    }
}

impl Summarizer for GeminiSummarizer {
    fn summarize(&self, thread_text: &str) -> String {
        match self.request(&build_summary_prompt(thread_text)) {
            Ok(text) => clean_summary(&text),
            Err(err) => {
                error!(model = %self.model, "summary request failed: {err}");
                FAILED_SUMMARY.to_string()
            }
        }
    }
}

pub fn summarizer_from_config(config: &SummarizerConfig) -> Box<dyn Summarizer> {
    match &config.api_key {
        Some(api_key) => Box::new(GeminiSummarizer::new(
            api_key.clone(),
            config.model.clone(),
            config.api_base.clone(),
        )),
        None => {
            warn!("no API key configured, returning placeholder summaries");
            Box::new(PlaceholderSummarizer)
        }
    }
}

pub fn build_summary_prompt(thread_text: &str) -> String {
    format!(
        "You are an expert in analyzing conversation histories. Please provide a concise, one-paragraph summary of the following chat thread. Focus on the main topic and the key information exchanged.

Conversation Thread:
---
{thread_text}
---

Summary:"
    )
}

/// Trims the model output and strips every quote character.
pub fn clean_summary(text: &str) -> String {
    text.trim().replace(['"', '\''], "")
}
