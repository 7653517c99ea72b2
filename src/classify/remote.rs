//! Chat-completions backend (OpenAI-compatible wire format).

use async_trait::async_trait;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{Classifier, ClassifyError};
use crate::config::ProviderProfile;
use crate::settings::ApiProvider;
use crate::util::{validate_endpoint, EndpointError};

/// Instruction sent as the system message with every request.
pub const SYSTEM_INSTRUCTION: &str = "You are a social media content classifier. Classify the following social media post into EXACTLY ONE of these categories: Technology, AI/ML, Science, Business, Startups, Crypto, Politics, World News, Health, Education, Art/Design, Gaming, Food, Travel, Entertainment. If the post appears to be engagement bait, memes, jokes, too short to classify, or doesn't fit into any specific category, classify it as Entertainment. Reply with ONLY the category name and nothing else.";

const MAX_RESPONSE_SIZE: usize = 1024 * 1024; // 1MB
const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 10;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Remote classifier for one provider profile.
///
/// The API key is held as a [`SecretString`] and only exposed while building
/// the `Authorization` header.
pub struct ChatClassifier {
    client: reqwest::Client,
    provider: ApiProvider,
    endpoint: Url,
    model: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl ChatClassifier {
    /// Build a backend for `profile`.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] when the endpoint is not HTTPS (loopback
    /// hosts excepted). A blank `api_key` is accepted here and reported as
    /// [`ClassifyError::CredentialMissing`] on each call.
    pub fn new(
        client: reqwest::Client,
        provider: ApiProvider,
        profile: &ProviderProfile,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, EndpointError> {
        let endpoint = validate_endpoint(&profile.base_url)?;
        let api_key = api_key.trim();
        Ok(Self {
            client,
            provider,
            endpoint,
            model: profile.model.clone(),
            api_key: (!api_key.is_empty()).then(|| SecretString::from(api_key.to_string())),
            timeout,
        })
    }

    async fn request_label(&self, key: &SecretString, text: &str) -> Result<String, ClassifyError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let body = serde_json::to_vec(&body)
            .map_err(|e| ClassifyError::MalformedResponse(format!("request encoding: {e}")))?;

        let request = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", key.expose_secret()))
            .body(body);

        // The deadline covers the body as well as the headers.
        let bytes = tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| ClassifyError::TimedOut(self.timeout.as_secs()))??;

        let parsed: ChatResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ClassifyError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ClassifyError::MalformedResponse("no choices[0].message.content".into()))
    }

    async fn exchange(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, ClassifyError> {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            if matches!(status.as_u16(), 401 | 403) {
                tracing::warn!(
                    provider = self.provider.as_str(),
                    status = status.as_u16(),
                    "Classification request rejected, check the API key"
                );
            }
            return Err(ClassifyError::NonSuccessStatus(status.as_u16()));
        }

        read_limited(response, MAX_RESPONSE_SIZE).await
    }
}

#[async_trait]
impl Classifier for ChatClassifier {
    fn name(&self) -> &'static str {
        self.provider.as_str()
    }

    async fn classify(&self, text: &str) -> Result<String, ClassifyError> {
        let Some(key) = &self.api_key else {
            return Err(ClassifyError::CredentialMissing);
        };
        tracing::trace!(provider = self.provider.as_str(), chars = text.chars().count(), "Sending classification request");
        self.request_label(key, text).await
    }
}

async fn read_limited(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, ClassifyError> {
    let too_large = || ClassifyError::MalformedResponse(format!("response exceeds {limit} bytes"));

    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(too_large());
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
