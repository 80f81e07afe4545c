// AI Provider Service
// HTTP clients for the text-generation and text-classification endpoints,
// exposed to the core through the RewriteService / ClassifierService traits.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use super::config_store::{AppConfig, CLASSIFIER_PROVIDER, REWRITE_PROVIDER};

const REWRITE_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const REWRITE_DEFAULT_MODEL: &str = "gpt-4o-mini";
const CLASSIFIER_DEFAULT_URL: &str =
    "https://api-inference.huggingface.co/models/openai-community/roberta-base-openai-detector";

/// Transport ceiling; per-call budgets are enforced by the callers with tokio timeouts
const HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured")]
    MissingApiKey,
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// One label of a classifier response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Network text generation
#[async_trait]
pub trait RewriteService: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, ProviderError>;
}

/// Network binary text classification (human vs. machine-generated)
#[async_trait]
pub trait ClassifierService: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ProviderError>;
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct ClassifyRequest<'a> {
    inputs: &'a str,
}

pub struct ProviderClient {
    client: Client,
    rewrite_url: String,
    rewrite_model: String,
    rewrite_api_key: Option<String>,
    classifier_url: String,
    classifier_api_key: Option<String>,
}

impl ProviderClient {
    /// Build from config, honoring env overrides and the optional proxy
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(HTTP_TIMEOUT_SECS));
        if let Some(proxy) = config.proxy.as_ref().filter(|p| p.enabled) {
            if let Some(url) = proxy.https.as_deref().or(proxy.http.as_deref()) {
                builder = builder.proxy(reqwest::Proxy::all(url)?);
            }
        }
        let client = builder.build()?;

        let rewrite_url = resolve_url(config, REWRITE_PROVIDER, "HUMNIZ_REWRITE_URL")
            .unwrap_or_else(|| REWRITE_DEFAULT_URL.to_string());
        let classifier_url = resolve_url(config, CLASSIFIER_PROVIDER, "HUMNIZ_CLASSIFIER_URL")
            .unwrap_or_else(|| CLASSIFIER_DEFAULT_URL.to_string());
        let rewrite_model = config
            .providers
            .get(REWRITE_PROVIDER)
            .and_then(|p| p.model.clone())
            .unwrap_or_else(|| REWRITE_DEFAULT_MODEL.to_string());

        Ok(Self {
            client,
            rewrite_url,
            rewrite_model,
            rewrite_api_key: get_api_key(REWRITE_PROVIDER, config),
            classifier_url,
            classifier_api_key: get_api_key(CLASSIFIER_PROVIDER, config),
        })
    }

    pub fn rewrite_url(&self) -> &str {
        &self.rewrite_url
    }

    pub fn classifier_url(&self) -> &str {
        &self.classifier_url
    }

    async fn call_chat_api(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<ChatResult, ProviderError> {
        let api_key = self
            .rewrite_api_key
            .as_deref()
            .ok_or(ProviderError::MissingApiKey)?;

        let request = ChatRequest {
            model: self.rewrite_model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_tokens,
            temperature,
        };

        let start = Instant::now();

        let response = self
            .client
            .post(&self.rewrite_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult {
            content,
            latency_ms,
        })
    }

    async fn call_classifier_api(&self, text: &str) -> Result<Vec<LabelScore>, ProviderError> {
        let mut request = self
            .client
            .post(&self.classifier_url)
            .header("Content-Type", "application/json")
            .json(&ClassifyRequest { inputs: text });
        if let Some(key) = self.classifier_api_key.as_deref() {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;
        debug!(
            latency_ms = start.elapsed().as_millis() as i64,
            "[CLASSIFIER] response received"
        );

        parse_label_scores(&data).ok_or(ProviderError::MissingContent)
    }
}

#[derive(Debug, Clone)]
struct ChatResult {
    content: String,
    latency_ms: i64,
}

#[async_trait]
impl RewriteService for ProviderClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let result = self.call_chat_api(system, user, temperature, max_tokens).await?;
        debug!(latency_ms = result.latency_ms, "[REWRITER] completion received");
        Ok(result.content)
    }
}

#[async_trait]
impl ClassifierService for ProviderClient {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ProviderError> {
        self.call_classifier_api(text).await
    }
}

/// Accepts `[{label, score}]` and the batched `[[{label, score}]]` shape
pub fn parse_label_scores(data: &Value) -> Option<Vec<LabelScore>> {
    let items = data.as_array()?;
    let flat: Vec<&Value> = match items.first() {
        Some(Value::Array(inner)) => inner.iter().collect(),
        _ => items.iter().collect(),
    };
    let labels: Vec<LabelScore> = flat
        .into_iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect();
    if labels.is_empty() {
        None
    } else {
        Some(labels)
    }
}

fn resolve_url(config: &AppConfig, provider: &str, env_key: &str) -> Option<String> {
    if let Ok(val) = env::var(env_key) {
        let v = val.trim();
        if !v.is_empty() {
            return Some(v.to_string());
        }
    }
    config
        .providers
        .get(provider)
        .and_then(|p| p.base_url.clone())
        .filter(|u| !u.trim().is_empty())
}

/// Get API key from environment or config file
pub fn get_api_key(provider: &str, config: &AppConfig) -> Option<String> {
    let env_keys: &[&str] = match provider {
        REWRITE_PROVIDER => &["OPENAI_API_KEY", "HUMNIZ_REWRITE_API_KEY"],
        CLASSIFIER_PROVIDER => &["HF_API_KEY", "HUMNIZ_CLASSIFIER_API_KEY"],
        _ => &[],
    };

    for key in env_keys {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    config
        .api_keys
        .get(provider)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_label_scores_nested() {
        let data = json!([[{"label": "Fake", "score": 0.91}, {"label": "Real", "score": 0.09}]]);
        let labels = parse_label_scores(&data).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].label, "Fake");
        assert!((labels[0].score - 0.91).abs() < 1e-9);
    }

    #[test]
    fn test_parse_label_scores_flat() {
        let data = json!([{"label": "LABEL_0", "score": 0.7}, {"label": "LABEL_1", "score": 0.3}]);
        let labels = parse_label_scores(&data).unwrap();
        assert_eq!(labels[1].label, "LABEL_1");
    }

    #[test]
    fn test_parse_label_scores_rejects_malformed() {
        assert!(parse_label_scores(&json!({"error": "loading"})).is_none());
        assert!(parse_label_scores(&json!([])).is_none());
        assert!(parse_label_scores(&json!([{"foo": 1}])).is_none());
    }

    #[test]
    fn test_api_key_from_config() {
        let mut config = AppConfig::default();
        config
            .api_keys
            .insert("unknown-service".to_string(), "  sk-test ".to_string());
        assert_eq!(
            get_api_key("unknown-service", &config).as_deref(),
            Some("sk-test")
        );
        assert!(get_api_key("missing", &config).is_none());
    }

    #[test]
    fn test_provider_client_creation() {
        let client = ProviderClient::from_config(&AppConfig::default()).unwrap();
        assert!(!client.rewrite_url().is_empty());
        assert!(!client.classifier_url().is_empty());
    }
}
