//! AI model boundary.
//!
//! The LLM call is an external collaborator; the classifier's own contract
//! is prompt construction plus parsing and validation of the returned JSON.
//! A single trait with a single method keeps the boundary testable.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ClassifierError;
use crate::response::parse_ai_response;
use crate::types::AiClassification;

/// Trait for tier-classification models.
#[async_trait]
pub trait TierModel: Send + Sync {
    /// Classify one ride, returning a validated classification.
    async fn classify(
        &self,
        park_name: &str,
        ride_name: &str,
    ) -> Result<AiClassification, ClassifierError>;
}

/// HTTP-backed model speaking the messages API shape.
pub struct HttpTierModel {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatRequestMessage>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequestMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    content: Vec<ChatContent>,
}

#[derive(Deserialize)]
struct ChatContent {
    text: String,
}

impl HttpTierModel {
    /// Create a new HTTP model client.
    #[must_use]
    pub fn new(api_key: SecretString, base_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    fn build_prompt(park_name: &str, ride_name: &str) -> String {
        format!(
            "Classify the theme park ride \"{ride_name}\" at \"{park_name}\".\n\
             Tier 1 = flagship attraction, tier 2 = standard, tier 3 = minor/kiddie.\n\
             Respond with ONLY a JSON object with keys: tier (1-3), category \
             (ATTRACTION, SHOW, MEET_AND_GREET, EXPERIENCE), confidence (0.50-1.00), \
             reasoning (string), research_sources (array of URLs)."
        )
    }
}

#[async_trait]
impl TierModel for HttpTierModel {
    async fn classify(
        &self,
        park_name: &str,
        ride_name: &str,
    ) -> Result<AiClassification, ClassifierError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatRequestMessage {
                role: "user".to_string(),
                content: Self::build_prompt(park_name, ride_name),
            }],
            max_tokens: 1024,
        };

        debug!(ride = %ride_name, "Requesting AI tier classification");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .timeout(Duration::from_secs(60))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ClassifierError::RateLimited);
            }
            return Err(ClassifierError::RequestFailed(format!(
                "{status}: {error_text}"
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;

        let text = chat_response
            .content
            .first()
            .map(|c| c.text.as_str())
            .ok_or_else(|| ClassifierError::InvalidResponse("empty response".into()))?;

        parse_ai_response(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_mentions_both_names() {
        let prompt = HttpTierModel::build_prompt("Magic Kingdom", "Space Mountain");
        assert!(prompt.contains("Space Mountain"));
        assert!(prompt.contains("Magic Kingdom"));
        assert!(prompt.contains("research_sources"));
    }
}
