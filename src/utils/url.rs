//! URL helpers shared by the provider clients, the remote persistence backend
//! and the image service.

use reqwest::Url;

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use multichat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://api.groq.com/openai/v1/"), "https://api.groq.com/openai/v1");
/// assert_eq!(normalize_base_url("https://api.groq.com///"), "https://api.groq.com");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Construct a complete API endpoint URL from a base URL and endpoint path
///
/// # Examples
///
/// ```
/// use multichat::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.deepseek.com/", "/chat/completions"),
///     "https://api.deepseek.com/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// Append free text as a single percent-encoded path segment.
///
/// Returns `None` when the base cannot be parsed or cannot carry a path
/// (e.g. `mailto:` URLs).
pub fn append_path_segment(base_url: &str, segment: &str) -> Option<Url> {
    let mut url = Url::parse(&normalize_base_url(base_url)).ok()?;
    url.path_segments_mut().ok()?.pop_if_empty().push(segment);
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_every_trailing_slash() {
        assert_eq!(
            normalize_base_url("https://api.example.com/v1///"),
            "https://api.example.com/v1"
        );
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn construct_joins_without_double_slashes() {
        assert_eq!(
            construct_api_url("https://api.example.com/v1/", "/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            construct_api_url("http://127.0.0.1:8080", "api/conversations"),
            "http://127.0.0.1:8080/api/conversations"
        );
    }

    #[test]
    fn path_segment_is_percent_encoded() {
        let url = append_path_segment("https://image.example.com/prompt/", "cat in space")
            .expect("url");
        assert_eq!(url.as_str(), "https://image.example.com/prompt/cat%20in%20space");
    }

    #[test]
    fn path_segment_escapes_slashes() {
        let url = append_path_segment("https://image.example.com/prompt", "a/b").expect("url");
        assert_eq!(url.as_str(), "https://image.example.com/prompt/a%2Fb");
    }
}
