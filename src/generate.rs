//! Answer generation clients.
//!
//! Implementations of the core [`AnswerGenerator`] trait. The assembled
//! instruction is sent as a single user message; the model's reply is the
//! answer text.
//!
//! Pipelines call [`generate_or_placeholder`], which never fails: any
//! provider error or empty reply becomes [`PLACEHOLDER_ANSWER`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use legal_lens_core::error::{GenerateError, Recovered};
use legal_lens_core::generate::{AnswerGenerator, PLACEHOLDER_ANSWER};

use crate::config::GenerationConfig;
use crate::http;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Generate an answer, substituting the placeholder on any failure.
pub async fn generate_or_placeholder(
    generator: &dyn AnswerGenerator,
    instruction: &str,
) -> Recovered<String> {
    let reason = match generator.generate(instruction).await {
        Ok(answer) if !answer.trim().is_empty() => return Recovered::ok(answer),
        Ok(_) => "generator returned an empty answer".to_string(),
        Err(e) => e.to_string(),
    };

    tracing::warn!(
        model = generator.model_name(),
        reason = %reason,
        "answer generation degraded to placeholder"
    );
    Recovered::degraded(PLACEHOLDER_ANSWER.to_string())
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

// ============ Disabled ============

pub struct DisabledGenerator;

#[async_trait]
impl AnswerGenerator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _instruction: &str) -> Result<String, GenerateError> {
        Err(GenerateError::Disabled)
    }
}

// ============ OpenAI chat completions ============

/// Calls `POST {url}/v1/chat/completions`. Requires `OPENAI_API_KEY`.
pub struct OpenAIChat {
    model: String,
    url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIChat {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(k) => k,
            Err(_) => bail!("OPENAI_API_KEY environment variable not set"),
        };

        Ok(Self {
            model,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OutMessage,
}

#[derive(Deserialize)]
struct OutMessage {
    #[serde(default)]
    content: Option<String>,
}

fn parse_openai_chat(json: serde_json::Value) -> Result<String, GenerateError> {
    let resp: OpenAIChatResponse =
        serde_json::from_value(json).map_err(|e| GenerateError::Malformed(e.to_string()))?;
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| GenerateError::Malformed("OpenAI response has no choices".into()))
}

#[async_trait]
impl AnswerGenerator for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, instruction: &str) -> Result<String, GenerateError> {
        let body = serde_json::to_value(OpenAIChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: instruction,
            }],
        })
        .map_err(|e| GenerateError::Request(e.to_string()))?;

        let endpoint = format!("{}/v1/chat/completions", self.url.trim_end_matches('/'));
        let json = http::post_json_with_retry(
            &self.client,
            &endpoint,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        parse_openai_chat(json)
    }
}

// ============ Ollama chat ============

/// Non-streaming `POST {url}/api/chat` against a running Ollama instance.
pub struct OllamaChat {
    model: String,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaChat {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for Ollama provider"))?;
        Ok(Self {
            model,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OutMessage>,
}

fn parse_ollama_chat(json: serde_json::Value) -> Result<String, GenerateError> {
    let resp: OllamaChatResponse =
        serde_json::from_value(json).map_err(|e| GenerateError::Malformed(e.to_string()))?;
    resp.message
        .and_then(|m| m.content)
        .ok_or_else(|| GenerateError::Malformed("Ollama response has no message".into()))
}

#[async_trait]
impl AnswerGenerator for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, instruction: &str) -> Result<String, GenerateError> {
        let body = serde_json::to_value(OllamaChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: instruction,
            }],
            stream: false,
        })
        .map_err(|e| GenerateError::Request(e.to_string()))?;

        let endpoint = format!("{}/api/chat", self.url.trim_end_matches('/'));
        let json = http::post_json_with_retry(
            &self.client,
            &endpoint,
            None,
            &body,
            self.max_retries,
            "Ollama",
        )
        .await?;
        parse_ollama_chat(json)
    }
}

/// Build the configured [`AnswerGenerator`].
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn AnswerGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "openai" => Ok(Box::new(OpenAIChat::new(config)?)),
        "ollama" => Ok(Box::new(OllamaChat::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(Result<String, ()>);

    #[async_trait]
    impl AnswerGenerator for Canned {
        fn model_name(&self) -> &str {
            "canned"
        }
        async fn generate(&self, _instruction: &str) -> Result<String, GenerateError> {
            self.0
                .clone()
                .map_err(|_| GenerateError::Request("boom".into()))
        }
    }

    #[tokio::test]
    async fn test_answer_passes_through() {
        let r = generate_or_placeholder(&Canned(Ok("**Repayment:** 12 months.".into())), "p").await;
        assert!(!r.degraded);
        assert_eq!(r.value, "**Repayment:** 12 months.");
    }

    #[tokio::test]
    async fn test_failure_becomes_placeholder() {
        let r = generate_or_placeholder(&Canned(Err(())), "p").await;
        assert!(r.degraded);
        assert_eq!(r.value, PLACEHOLDER_ANSWER);
    }

    #[tokio::test]
    async fn test_blank_answer_becomes_placeholder() {
        let r = generate_or_placeholder(&Canned(Ok("  \n".into())), "p").await;
        assert!(r.degraded);
    }

    #[tokio::test]
    async fn test_disabled_generator_degrades() {
        let r = generate_or_placeholder(&DisabledGenerator, "p").await;
        assert!(r.degraded);
        assert_eq!(r.value, PLACEHOLDER_ANSWER);
    }

    #[test]
    fn test_parse_openai_chat() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Answer." } }]
        });
        assert_eq!(parse_openai_chat(json).unwrap(), "Answer.");
        assert!(parse_openai_chat(serde_json::json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_parse_ollama_chat() {
        let json = serde_json::json!({
            "model": "llama3.1",
            "message": { "role": "assistant", "content": "Answer." },
            "done": true
        });
        assert_eq!(parse_ollama_chat(json).unwrap(), "Answer.");
        assert!(matches!(
            parse_ollama_chat(serde_json::json!({ "done": true })),
            Err(GenerateError::Malformed(_))
        ));
    }

    #[test]
    fn test_create_generator() {
        let g = create_generator(&GenerationConfig::default()).unwrap();
        assert_eq!(g.model_name(), "disabled");

        let cfg = GenerationConfig {
            provider: "ollama".into(),
            model: Some("llama3.1".into()),
            ..GenerationConfig::default()
        };
        assert_eq!(create_generator(&cfg).unwrap().model_name(), "llama3.1");
    }
}
