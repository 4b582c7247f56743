//! Image generation through public prompt-to-image URLs.
//!
//! Nothing is rendered locally: a prompt becomes a URL and the URL is probed
//! to make sure the service answers. Candidates are tried in order and the
//! placeholder is returned when every probe fails.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use reqwest::Url;
use tracing::{debug, warn};

use crate::core::config::ImageConfig;
use crate::utils::url::append_path_segment;

/// Longest prompt sent to the seeded and placeholder services.
const SHORT_PROMPT_CHARS: usize = 100;
const PLACEHOLDER_BACKGROUNDS: &str = "4F46E5,7C3AED,EC4899";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    EmptyPrompt,
    InvalidBaseUrl(String),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::EmptyPrompt => write!(f, "image prompt is empty"),
            ImageError::InvalidBaseUrl(url) => write!(f, "invalid image service URL: {url}"),
        }
    }
}

impl StdError for ImageError {}

#[derive(Clone)]
pub struct ImageGenerator {
    http: reqwest::Client,
    config: ImageConfig,
}

impl ImageGenerator {
    pub fn new(http: reqwest::Client, config: ImageConfig) -> Self {
        Self { http, config }
    }

    /// Returns a URL for an image of `prompt`.
    ///
    /// Fails only when the prompt is blank or the configured services cannot
    /// form a URL; unreachable services fall through to the placeholder.
    pub async fn generate_image(&self, prompt: &str) -> Result<String, ImageError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ImageError::EmptyPrompt);
        }

        let candidates = self.candidate_urls(prompt, random_seed())?;
        for (index, url) in candidates.iter().enumerate() {
            match self.probe(url).await {
                Ok(()) => {
                    debug!(candidate = index, "image service answered");
                    return Ok(url.to_string());
                }
                Err(reason) => warn!(candidate = index, "image service failed: {reason}"),
            }
        }
        let placeholder = self.placeholder_url(&shorten(prompt))?;
        Ok(placeholder.to_string())
    }

    /// Primary, seeded and placeholder URLs in the order they are tried.
    pub fn candidate_urls(&self, prompt: &str, seed: u32) -> Result<Vec<Url>, ImageError> {
        let short_prompt = shorten(prompt);
        let width = self.config.width.to_string();
        let height = self.config.height.to_string();

        let mut primary = self.prompt_url(prompt)?;
        primary
            .query_pairs_mut()
            .append_pair("width", &width)
            .append_pair("height", &height)
            .append_pair("model", "flux")
            .append_pair("enhance", "true")
            .append_pair("nologo", "true");

        let mut seeded = self.prompt_url(&short_prompt)?;
        seeded
            .query_pairs_mut()
            .append_pair("width", &width)
            .append_pair("height", &height)
            .append_pair("seed", &seed.to_string());

        Ok(vec![primary, seeded, self.placeholder_url(&short_prompt)?])
    }

    fn prompt_url(&self, prompt: &str) -> Result<Url, ImageError> {
        append_path_segment(&self.config.base_url, prompt)
            .ok_or_else(|| ImageError::InvalidBaseUrl(self.config.base_url.clone()))
    }

    fn placeholder_url(&self, prompt: &str) -> Result<Url, ImageError> {
        let mut url = Url::parse(&self.config.placeholder_url)
            .map_err(|_| ImageError::InvalidBaseUrl(self.config.placeholder_url.clone()))?;
        url.query_pairs_mut()
            .append_pair("seed", prompt)
            .append_pair("backgroundColor", PLACEHOLDER_BACKGROUNDS)
            .append_pair("size", &self.config.width.to_string());
        Ok(url)
    }

    async fn probe(&self, url: &Url) -> Result<(), String> {
        let response = self
            .http
            .get(url.clone())
            .timeout(Duration::from_secs(self.config.probe_timeout_secs))
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    "timed out".to_string()
                } else {
                    err.to_string()
                }
            })?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("HTTP {}", status.as_u16()))
        }
    }
}

fn shorten(prompt: &str) -> String {
    prompt.chars().take(SHORT_PROMPT_CHARS).collect()
}

fn random_seed() -> u32 {
    let mut bytes = [0u8; 4];
    if getrandom::fill(&mut bytes).is_err() {
        return chrono::Utc::now().timestamp_subsec_nanos() % 1_000_000;
    }
    u32::from_le_bytes(bytes) % 1_000_000
}
