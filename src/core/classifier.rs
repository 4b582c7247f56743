//! Decides whether an outgoing message asks for an image rather than text.
//!
//! Matching is on leading imperative phrases only, so "how do artists draw
//! hands?" stays a text question while "draw hands" is an image request.

/// Longest phrases first so "generate an image of" wins over "generate".
const IMAGE_PREFIXES: &[&str] = &[
    "generate an image of",
    "generate a picture of",
    "generate a photo of",
    "generate image of",
    "generate an image",
    "generate image",
    "create an image of",
    "create a picture of",
    "create image of",
    "create artwork of",
    "create an image",
    "make a picture of",
    "make an image of",
    "show me a picture of",
    "show me an image of",
    "illustrate",
    "visualize",
    "sketch",
    "paint",
    "draw",
];

const POLITE_LEADERS: &[&str] = &["please", "can you", "could you", "would you"];

const ARTICLES: &[&str] = &["a", "an", "the"];

/// True when `text` opens with an image-generation phrase.
pub fn is_image_request(text: &str) -> bool {
    matched_prefix(&strip_polite_leader(text)).is_some()
}

/// The subject of an image request with the command phrase and a leading
/// article removed. Falls back to the trimmed input when nothing is left.
pub fn extract_image_prompt(text: &str) -> String {
    let body = strip_polite_leader(text);
    let rest = match matched_prefix(&body) {
        Some(prefix) => body[prefix.len()..].trim_start(),
        None => body.as_str(),
    };
    let rest = strip_leading_word(rest, ARTICLES);
    let rest = rest.trim().trim_end_matches(['.', '!', '?']).trim();

    if rest.is_empty() {
        text.trim().to_string()
    } else {
        rest.to_string()
    }
}

fn strip_polite_leader(text: &str) -> String {
    let trimmed = text.trim();
    strip_leading_word(trimmed, POLITE_LEADERS)
        .trim_start_matches([',', ' '])
        .to_string()
}

fn matched_prefix(text: &str) -> Option<&'static str> {
    IMAGE_PREFIXES
        .iter()
        .copied()
        .find(|prefix| starts_with_phrase(text, prefix))
}

fn strip_leading_word<'a>(text: &'a str, words: &[&str]) -> &'a str {
    words
        .iter()
        .find(|word| starts_with_phrase(text, word))
        .map(|word| text[word.len()..].trim_start())
        .unwrap_or(text)
}

/// Case-insensitive prefix match that ends on a word boundary.
fn starts_with_phrase(text: &str, phrase: &str) -> bool {
    let Some(head) = text.get(..phrase.len()) else {
        return false;
    };
    if !head.eq_ignore_ascii_case(phrase) {
        return false;
    }
    text[phrase.len()..]
        .chars()
        .next()
        .is_none_or(|c| !c.is_alphanumeric())
}
