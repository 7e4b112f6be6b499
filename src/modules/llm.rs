use std::time::Duration;

use clap::ValueEnum;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::AgentError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Text generation backend. `None` means unavailable, timed out, or failed; callers
/// treat all of those the same way.
pub trait ModelService {
    fn generate(&self, prompt: &str) -> Option<String>;

    fn describe(&self) -> String {
        "model".to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LlmProvider {
    /// Local Ollama server, `/api/generate`
    Ollama,
    /// OpenAI-compatible `/v1/chat/completions`
    Openai,
}

impl LlmProvider {
    pub fn label(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "ollama",
            LlmProvider::Openai => "openai",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub host: String,
    pub model: String,
    pub provider: LlmProvider,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub temperature: f32,
    pub top_p: f32,
    pub attempts: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".into(),
            model: "llama2".into(),
            provider: LlmProvider::Ollama,
            api_key: None,
            timeout: Duration::from_secs(60),
            temperature: 0.7,
            top_p: 0.95,
            attempts: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    settings: LlmSettings,
    http: Client,
    probe: Client,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, AgentError> {
        let http = Client::builder().timeout(settings.timeout).build()?;
        let probe = Client::builder().timeout(PROBE_TIMEOUT).build()?;
        Ok(Self {
            settings,
            http,
            probe,
        })
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    fn base(&self) -> &str {
        self.settings.host.trim_end_matches('/')
    }

    /// Cheap reachability check so a dead server fails fast instead of waiting out
    /// the full generation timeout.
    pub fn is_available(&self) -> bool {
        self.probe.head(self.base()).send().is_ok()
    }

    fn call_once(&self, prompt: &str) -> Result<String, String> {
        match self.settings.provider {
            LlmProvider::Ollama => self.call_ollama(prompt),
            LlmProvider::Openai => self.call_openai(prompt),
        }
    }

    fn call_ollama(&self, prompt: &str) -> Result<String, String> {
        let url = format!("{}/api/generate", self.base());
        let body = GenerateRequest {
            model: &self.settings.model,
            prompt,
            stream: false,
            options: SamplingOptions {
                temperature: self.settings.temperature,
                top_p: self.settings.top_p,
            },
        };
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .map_err(describe_transport_error)?;
        let status = resp.status();
        let raw_body = resp.text().map_err(|e| format!("read body: {}", e))?;
        if status != StatusCode::OK {
            return Err(format!("http {}", status));
        }
        let parsed: GenerateResponse = serde_json::from_str(&raw_body)
            .map_err(|e| format!("decode: {}; body={}", e, raw_body))?;
        Ok(parsed.response)
    }

    fn call_openai(&self, prompt: &str) -> Result<String, String> {
        let url = {
            let trimmed = self.base();
            if trimmed.ends_with("/v1/chat/completions") {
                trimmed.to_string()
            } else {
                format!("{}/v1/chat/completions", trimmed)
            }
        };
        let key = self
            .settings
            .api_key
            .as_deref()
            .ok_or("missing LLM API key; set --llm-api-key or LLM_API_KEY")?;

        let body = ChatRequest {
            model: &self.settings.model,
            stream: false,
            temperature: self.settings.temperature,
            top_p: self.settings.top_p,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };
        let resp = self
            .http
            .post(&url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .map_err(describe_transport_error)?;
        let status = resp.status();
        let raw_body = resp.text().map_err(|e| format!("read body: {}", e))?;
        if status != StatusCode::OK {
            return Err(format!("http {}", status));
        }
        let parsed: ChatResponse = serde_json::from_str(&raw_body)
            .map_err(|e| format!("decode: {}; body={}", e, raw_body))?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }
}

fn describe_transport_error(err: reqwest::Error) -> String {
    if err.is_timeout() {
        "timeout, model took too long".to_string()
    } else if err.is_connect() {
        format!("connection refused: {}", err)
    } else {
        format!("http: {}", err)
    }
}

impl ModelService for LlmClient {
    fn generate(&self, prompt: &str) -> Option<String> {
        if self.settings.provider == LlmProvider::Ollama && !self.is_available() {
            warn!(host = %self.settings.host, "cannot reach model server");
            return None;
        }

        let max_attempts = self.settings.attempts.max(1);
        let mut attempts = 0;
        while attempts < max_attempts {
            attempts += 1;
            if attempts > 1 {
                // simple jitter: 50-150ms
                let jitter_ms = 50 + (rand::random::<u64>() % 100);
                std::thread::sleep(Duration::from_millis(jitter_ms));
            }
            info!(model = %self.settings.model, attempt = attempts, "calling model");
            match self.call_once(prompt) {
                Ok(text) => {
                    debug!(chars = text.len(), "model replied");
                    return Some(text);
                }
                Err(err) => warn!(attempt = attempts, error = %err, "model call failed"),
            }
        }
        None
    }

    fn describe(&self) -> String {
        format!("{} {}", self.settings.provider.label(), self.settings.model)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Debug, Serialize)]
struct SamplingOptions {
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    stream: bool,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}
