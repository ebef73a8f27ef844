//! Free-text replies for messages the classifier cannot place.

use crate::config::Config;
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system_prompt: &str, message: &str) -> Result<String, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenRouter,
    Gemini,
    OpenAi,
}

impl Provider {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "openrouter" => Ok(Self::OpenRouter),
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            other => Err(AppError::invalid_input(format!(
                "unknown llm provider '{other}', expected openrouter, gemini or openai"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }

    fn base_url_var(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_BASE_URL"),
            _ => None,
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Self::OpenRouter => "z-ai/glm-4.5-air:free",
            Self::Gemini => "gemini-2.5-flash",
            Self::OpenAi => "gpt-4o",
        }
    }

    fn model_var(&self) -> &'static str {
        match self {
            Self::OpenRouter => "OPENROUTER_DEFAULT_MODEL",
            Self::Gemini => "GEMINI_DEFAULT_MODEL",
            Self::OpenAi => "OPENAI_DEFAULT_MODEL",
        }
    }

    fn key_vars(&self) -> &'static [&'static str] {
        match self {
            Self::OpenRouter => &["OPENROUTER_API_KEY"],
            Self::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            Self::OpenAi => &["OPENAI_API_KEY"],
        }
    }
}

/// Chat-completions client for any OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleGenerator {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::invalid_input("llm api key is empty"));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::transport(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Builds the generator for the configured provider from the process
    /// environment. A missing API key means no generator.
    pub fn from_config(config: &Config) -> Result<Option<Self>, AppError> {
        Self::from_lookup(config, |name| std::env::var(name).ok())
    }

    fn from_lookup<F>(config: &Config, lookup: F) -> Result<Option<Self>, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = Provider::parse(config.llm_provider.as_deref().unwrap_or_default())?;
        let present = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let Some(api_key) = provider.key_vars().iter().find_map(|name| present(name)) else {
            debug!(provider = provider.as_str(), "no llm api key, free-text replies disabled");
            return Ok(None);
        };

        let base_url = provider
            .base_url_var()
            .and_then(|name| present(name))
            .unwrap_or_else(|| provider.default_base_url().to_string());
        let model = config
            .llm_model
            .clone()
            .filter(|model| !model.trim().is_empty())
            .or_else(|| present(provider.model_var()))
            .unwrap_or_else(|| provider.default_model().to_string());

        Self::new(&base_url, &api_key, &model, config.request_timeout()).map(Some)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleGenerator {
    async fn generate(&self, system_prompt: &str, message: &str) -> Result<String, AppError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, "requesting completion");

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": message }
            ]
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "completion request rejected");
            return Err(AppError::remote(status.as_u16(), body));
        }

        let parsed: CompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AppError::invalid_data("completion response had no content"))
    }
}
