use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

/// One turn of the conversation as sent over the wire, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatTurn>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    models: Vec<Model>,
}

#[derive(Deserialize)]
struct Model {
    name: String,
}

impl OllamaClient {
    pub fn new(base_url: String) -> Self {
        Self {
            // No request timeout: a completion blocks until the model answers.
            client: Client::new(),
            base_url,
        }
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?
            .json::<ModelsResponse>()
            .await?;

        Ok(response.models.into_iter().map(|m| m.name).collect())
    }

    /// Sends a full conversation to the OpenAI-compatible completion endpoint
    /// and returns the assistant's reply text.
    pub async fn chat_completion(&self, model: &str, messages: Vec<ChatTurn>) -> Result<String> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Completion failed with status: {}",
                response.status()
            ));
        }

        let completion = response.json::<ChatCompletionResponse>().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("Completion response contained no choices"))
    }
}
