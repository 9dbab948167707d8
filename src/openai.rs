use crate::llm::{CompletionModel, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str =
    "You are a code complexity analyst. Reply with a single JSON object and no markdown.";

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}
#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}
#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Any OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenAiModel {
    client: Client,
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAiModel {
    pub fn new(client: Client, model: String, api_key: String, base_url: Option<String>) -> Self {
        Self {
            client,
            model,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
        }
    }
}

#[async_trait]
impl CompletionModel for OpenAiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let endpoint = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        info!("sending completion request to {} (model {})", endpoint, self.model);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.2
        });
        let resp = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!("provider error response: {} {}", status, text);
            return Err(ProviderError::Status { status, body: text });
        }
        let chat_resp: ChatResponse = resp.json().await?;
        let content = chat_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ProviderError::MissingContent)?;
        debug!("completion content: {}", content);
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn model(server: &MockServer) -> OpenAiModel {
        OpenAiModel::new(
            Client::new(),
            "gpt-4o-mini".into(),
            "sk-test".into(),
            Some(format!("{}/v1/", server.uri())),
        )
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(bearer_token("sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"complexityScore\": 7}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = model(&server).complete("prompt").await.unwrap();
        assert_eq!(text, "{\"complexityScore\": 7}");
    }

    #[tokio::test]
    async fn maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        match model(&server).complete("prompt").await {
            Err(ProviderError::Status { status, body }) => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_are_missing_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        assert!(matches!(
            model(&server).complete("prompt").await,
            Err(ProviderError::MissingContent)
        ));
    }
}
