use std::env;

use serde::{Deserialize, Serialize};

use super::{
    extract_pairwise_response, pairwise_user_prompt, RankError, Ranker, Winner,
    PAIRWISE_SYSTEM_PROMPT,
};
use crate::document::Document;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

// The judgment is one digit, but max_tokens=1 comes back with an empty
// content array, so leave a little headroom.
const MAX_TOKENS: u32 = 10;

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

/// Judges document pairs through the Anthropic Messages API.
#[derive(Debug)]
pub struct AnthropicRanker {
    model: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl AnthropicRanker {
    /// Read the API key from `ANTHROPIC_API_KEY`. A missing key is a
    /// configuration error here rather than a network error on the first
    /// judgment.
    pub fn new(model: String) -> Result<Self, RankError> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| RankError::Config("ANTHROPIC_API_KEY is not set".to_string()))?;
        Ok(Self::with_api_key(model, api_key))
    }

    pub fn with_api_key(model: String, api_key: String) -> Self {
        Self {
            model,
            api_key,
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Ranker for AnthropicRanker {
    fn choose_better(
        &self,
        criteria: &str,
        first: &dyn Document,
        second: &dyn Document,
    ) -> Result<Winner, RankError> {
        let user_prompt = pairwise_user_prompt(criteria, first, second)?;
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: PAIRWISE_SYSTEM_PROMPT,
            messages: [UserMessage {
                role: "user",
                content: &user_prompt,
            }],
        };

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .map_err(|e| RankError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RankError::Api(format!(
                "anthropic returned {status}: {body}"
            )));
        }

        let messages: MessagesResponse = response
            .json()
            .map_err(|e| RankError::Api(format!("unparseable anthropic response: {e}")))?;
        // An empty content array parses as an empty answer and fails below
        // like any other malformed output.
        let answer = messages
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .unwrap_or_default();
        extract_pairwise_response(first, second, &answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_is_a_config_error() {
        env::remove_var("ANTHROPIC_API_KEY");
        let err = AnthropicRanker::new("claude-3-5-haiku-latest".to_string()).unwrap_err();
        assert!(matches!(err, RankError::Config(_)));
    }

    #[test]
    fn test_messages_request_serialization() {
        let request = MessagesRequest {
            model: "claude-3-5-haiku-latest",
            max_tokens: MAX_TOKENS,
            system: "sys",
            messages: [UserMessage {
                role: "user",
                content: "usr",
            }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "claude-3-5-haiku-latest");
        assert_eq!(value["max_tokens"], 10);
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn test_empty_content_is_an_invalid_response() {
        let parsed: MessagesResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        let answer = parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .unwrap_or_default();
        assert_eq!(answer, "");
    }
}
