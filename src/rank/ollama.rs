use std::env;

use serde::{Deserialize, Serialize};

use super::{
    extract_pairwise_response, pairwise_user_prompt, RankError, Ranker, Winner,
    PAIRWISE_SYSTEM_PROMPT,
};
use crate::document::Document;

const DEFAULT_HOST: &str = "http://localhost:11434";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    num_predict: i32,
    num_ctx: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Judges document pairs through a local Ollama server.
///
/// No timeout or retry is imposed here; a judgment takes as long as the
/// model takes, and transport failures abort the run.
pub struct OllamaRanker {
    model: String,
    host: String,
    client: reqwest::blocking::Client,
}

impl OllamaRanker {
    /// Connect to the host named by `OLLAMA_HOST`, or the local default.
    pub fn new(model: String) -> Self {
        let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        Self::with_host(model, host)
    }

    pub fn with_host(model: String, host: String) -> Self {
        Self {
            model,
            host: host.trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Ranker for OllamaRanker {
    fn choose_better(
        &self,
        criteria: &str,
        first: &dyn Document,
        second: &dyn Document,
    ) -> Result<Winner, RankError> {
        let user_prompt = pairwise_user_prompt(criteria, first, second)?;

        // Ollama quietly trims prompts that overflow the default context
        // window, which wrecks judgment quality. Two characters per token is
        // a conservative sizing, so num_ctx always holds the full request.
        // TODO Compute the real token count instead of this heuristic; see
        //      https://github.com/ollama/ollama/issues/3582
        let num_ctx = (PAIRWISE_SYSTEM_PROMPT.len() + user_prompt.len()) / 2;

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: PAIRWISE_SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            stream: false,
            options: ChatOptions {
                num_predict: 1,
                num_ctx,
                temperature: 0.0,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.host))
            .json(&request)
            .send()
            .map_err(|e| RankError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RankError::Api(format!("ollama returned {status}: {body}")));
        }

        let chat: ChatResponse = response
            .json()
            .map_err(|e| RankError::Api(format!("unparseable ollama response: {e}")))?;
        extract_pairwise_response(first, second, &chat.message.content)
    }
}
