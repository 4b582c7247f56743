use std::error::Error;
use std::fmt;

/// Why a single HTTP attempt against one key failed.
#[derive(Debug)]
pub enum AttemptError {
    /// Non-2xx response, with the provider's error message when one could be
    /// pulled out of the body.
    Status {
        status: u16,
        summary: Option<String>,
    },
    Network(reqwest::Error),
    Timeout,
    MalformedResponse(String),
}

impl AttemptError {
    pub fn status(status: u16) -> Self {
        AttemptError::Status {
            status,
            summary: None,
        }
    }

    /// Classifies a transport failure, keeping timeouts distinct.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AttemptError::Timeout
        } else {
            AttemptError::Network(err)
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Status {
                status,
                summary: Some(summary),
            } => write!(f, "HTTP {status}: {summary}"),
            AttemptError::Status {
                status,
                summary: None,
            } => write!(f, "HTTP {status}"),
            AttemptError::Network(err) => write!(f, "network error: {err}"),
            AttemptError::Timeout => write!(f, "request timed out"),
            AttemptError::MalformedResponse(detail) => {
                write!(f, "malformed response: {detail}")
            }
        }
    }
}

impl Error for AttemptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AttemptError::Network(err) => Some(err),
            _ => None,
        }
    }
}

/// Failure of one provider after key-level rotation.
#[derive(Debug)]
pub enum ProviderError {
    /// The provider has no credentials; no request was made.
    NotConfigured { provider: String },
    /// Every key was tried once in this call.
    Exhausted {
        provider: String,
        attempts: usize,
        last: AttemptError,
    },
}

impl ProviderError {
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::NotConfigured { provider } | ProviderError::Exhausted { provider, .. } => {
                provider
            }
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::NotConfigured { provider } => {
                write!(f, "{provider} has no API keys configured")
            }
            ProviderError::Exhausted {
                provider,
                attempts,
                last,
            } => {
                let noun = if *attempts == 1 { "key" } else { "keys" };
                write!(f, "{provider} failed with all {attempts} {noun} (last: {last})")
            }
        }
    }
}

impl Error for ProviderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProviderError::Exhausted { last, .. } => Some(last),
            ProviderError::NotConfigured { .. } => None,
        }
    }
}

/// Failure surfaced by the service after provider-level fallback.
#[derive(Debug)]
pub enum GenerationError {
    NoProviderAvailable,
    GenerationFailed(ProviderError),
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationError::NoProviderAvailable => write!(
                f,
                "No AI providers available. Add an API key with `multichat auth set <provider>` or set a provider environment variable."
            ),
            GenerationError::GenerationFailed(cause) => {
                write!(f, "Failed to generate a response: {cause}")
            }
        }
    }
}

impl Error for GenerationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GenerationError::GenerationFailed(cause) => Some(cause),
            GenerationError::NoProviderAvailable => None,
        }
    }
}

/// Pull a one-line summary out of a provider error body.
///
/// JSON bodies are searched for `error.message`, a string `error`, or a
/// top-level `message`. Other bodies are collapsed and truncated.
pub fn summarize_api_error(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return extract_error_summary(&value).filter(|summary| !summary.is_empty());
    }

    let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
    const MAX_CHARS: usize = 200;
    if collapsed.chars().count() > MAX_CHARS {
        let truncated: String = collapsed.chars().take(MAX_CHARS).collect();
        Some(format!("{truncated}..."))
    } else {
        Some(collapsed)
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                serde_json::Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}
