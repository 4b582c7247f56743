use crate::api::{
    ChatCompletionResponse, ChatRequest, GeminiRequest, GeminiResponse, HfGeneration, HfRequest,
};
use crate::core::providers::error::AttemptError;
use crate::utils::url::construct_api_url;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The wire formats the client knows how to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    Gemini,
    Groq,
    #[serde(alias = "hf")]
    HuggingFace,
    DeepSeek,
}

impl ProviderFamily {
    pub const ALL: [ProviderFamily; 4] = [
        ProviderFamily::Gemini,
        ProviderFamily::Groq,
        ProviderFamily::HuggingFace,
        ProviderFamily::DeepSeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderFamily::Gemini => "gemini",
            ProviderFamily::Groq => "groq",
            ProviderFamily::HuggingFace => "huggingface",
            ProviderFamily::DeepSeek => "deepseek",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderFamily::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ProviderFamily::Groq => "https://api.groq.com/openai/v1",
            ProviderFamily::HuggingFace => "https://api-inference.huggingface.co",
            ProviderFamily::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    pub fn default_env_vars(&self) -> &'static [&'static str] {
        match self {
            ProviderFamily::Gemini => &["GEMINI_API_KEY", "GEMINI_API_KEY_2", "GEMINI_API_KEY_3"],
            ProviderFamily::Groq => &["GROQ_API_KEY", "GROQ_API_KEY_2", "GROQ_API_KEY_3"],
            ProviderFamily::HuggingFace => &[
                "HUGGINGFACE_API_KEY",
                "HUGGINGFACE_API_KEY_2",
                "HUGGINGFACE_API_KEY_3",
            ],
            ProviderFamily::DeepSeek => &[
                "DEEPSEEK_API_KEY",
                "DEEPSEEK_API_KEY_2",
                "DEEPSEEK_API_KEY_3",
            ],
        }
    }

    pub fn endpoint(&self, base_url: &str, model: &str) -> String {
        match self {
            ProviderFamily::Gemini => {
                construct_api_url(base_url, &format!("models/{model}:generateContent"))
            }
            ProviderFamily::Groq | ProviderFamily::DeepSeek => {
                construct_api_url(base_url, "chat/completions")
            }
            ProviderFamily::HuggingFace => construct_api_url(base_url, &format!("models/{model}")),
        }
    }

    /// Builds the single-prompt request for this family.
    pub fn build_request(
        &self,
        client: &reqwest::Client,
        base_url: &str,
        model: &str,
        api_key: &str,
        prompt: &str,
    ) -> reqwest::RequestBuilder {
        let url = self.endpoint(base_url, model);
        let builder = client.post(url).header("Content-Type", "application/json");
        match self {
            ProviderFamily::Gemini => builder
                .header("x-goog-api-key", api_key)
                .json(&GeminiRequest::single_turn(prompt)),
            ProviderFamily::Groq | ProviderFamily::DeepSeek => builder
                .bearer_auth(api_key)
                .json(&ChatRequest::single_turn(model, prompt)),
            ProviderFamily::HuggingFace => builder
                .bearer_auth(api_key)
                .json(&HfRequest::single_turn(prompt)),
        }
    }

    /// Pulls the completion text out of a successful response body. A body
    /// without a non-blank completion counts as a failed attempt.
    pub fn extract_completion(&self, body: &str) -> Result<String, AttemptError> {
        let text = match self {
            ProviderFamily::Gemini => {
                let parsed: GeminiResponse = serde_json::from_str(body)
                    .map_err(|err| AttemptError::MalformedResponse(err.to_string()))?;
                parsed
                    .candidates
                    .into_iter()
                    .next()
                    .and_then(|candidate| candidate.content)
                    .and_then(|content| content.parts.into_iter().next())
                    .and_then(|part| part.text)
            }
            ProviderFamily::Groq | ProviderFamily::DeepSeek => {
                let parsed: ChatCompletionResponse = serde_json::from_str(body)
                    .map_err(|err| AttemptError::MalformedResponse(err.to_string()))?;
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
            }
            ProviderFamily::HuggingFace => {
                let value: serde_json::Value = serde_json::from_str(body)
                    .map_err(|err| AttemptError::MalformedResponse(err.to_string()))?;
                let first = match value {
                    serde_json::Value::Array(items) => items.into_iter().next(),
                    other => Some(other),
                };
                first
                    .and_then(|item| serde_json::from_value::<HfGeneration>(item).ok())
                    .and_then(|generation| generation.generated_text)
            }
        };

        match text {
            Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            _ => Err(AttemptError::MalformedResponse(format!(
                "{} response did not contain a completion",
                self
            ))),
        }
    }
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProviderFamily::Gemini => "Gemini",
            ProviderFamily::Groq => "Groq",
            ProviderFamily::HuggingFace => "Hugging Face",
            ProviderFamily::DeepSeek => "DeepSeek",
        };
        f.write_str(label)
    }
}
