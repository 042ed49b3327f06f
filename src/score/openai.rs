//! OpenAI-compatible chat completions classifier.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Classification, Classifier, ScoringError};
use crate::config::Config;
use crate::db::Category;

const SYSTEM_PROMPT: &str = "You rate free online course offers for software engineers. \
Given a post, reply with a JSON object {\"usefulness\": <number between 0 and 1>, \
\"category\": <one label>} where usefulness says how much the course helps a \
software-engineering career and category is exactly one of: ";

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Judgement {
    usefulness: f64,
    category: String,
}

pub struct OpenAiClassifier {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    system_prompt: String,
    timeout: Duration,
}

impl OpenAiClassifier {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_base: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("course-scout/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build classifier HTTP client")?;

        let labels: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            system_prompt: format!("{SYSTEM_PROMPT}{}.", labels.join(", ")),
            timeout,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.ai_api_base,
            &config.ai_api_key,
            &config.ai_model,
            config.ai_timeout,
        )
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    fn name(&self) -> &str {
        &self.model
    }

    async fn classify(&self, text: &str) -> Result<Classification, ScoringError> {
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &self.system_prompt,
                },
                Msg {
                    role: "user",
                    content: text,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScoringError::Timeout(self.timeout)
                } else {
                    ScoringError::Transport(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            return Err(ScoringError::Status(resp.status().as_u16()));
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ScoringError::Malformed(format!("response body: {e}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ScoringError::Malformed("no completion content".to_string()))?;

        parse_judgement(&content)
    }
}

/// Parse the model's JSON answer, tolerating a Markdown code fence around it.
fn parse_judgement(content: &str) -> Result<Classification, ScoringError> {
    let trimmed = content.trim();
    let json = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let judgement: Judgement = serde_json::from_str(json)
        .map_err(|e| ScoringError::Malformed(format!("{e}: {json}")))?;

    Ok(Classification {
        usefulness: judgement.usefulness,
        category: judgement.category,
    })
}
