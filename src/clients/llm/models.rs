use serde::{Deserialize, Serialize};

use crate::util::text::truncate_chars;

pub(crate) const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub temperature: f32,
    pub response_format: ResponseFormat,
    pub messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl ResponseFormat {
    #[must_use]
    pub const fn json_object() -> Self {
        Self {
            kind: "json_object",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Content of the first choice; `"{}"` when the provider sent none.
    #[must_use]
    pub fn into_content(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_else(|| "{}".to_string())
    }
}

/// Bounds an upstream error body before it lands in logs or errors.
pub(crate) fn truncate_error_body(body: &str) -> String {
    let truncated = truncate_chars(body, MAX_ERROR_BODY_CHARS);
    if truncated.len() == body.len() {
        return truncated;
    }
    format!("{truncated}... (truncated, {} chars)", body.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_content_defaults_to_empty_object() {
        let empty: ChatCompletionResponse = serde_json::from_str("{}").expect("decodes");
        assert_eq!(empty.into_content(), "{}");

        let null_content: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).expect("decodes");
        assert_eq!(null_content.into_content(), "{}");
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "e".repeat(MAX_ERROR_BODY_CHARS + 10);
        let truncated = truncate_error_body(&body);
        assert!(truncated.ends_with(&format!("(truncated, {} chars)", MAX_ERROR_BODY_CHARS + 10)));
        assert_eq!(truncate_error_body("short"), "short");
    }

    #[test]
    fn multibyte_bodies_are_cut_on_char_boundaries() {
        let body = "é".repeat(MAX_ERROR_BODY_CHARS + 1);
        let truncated = truncate_error_body(&body);
        assert!(truncated.starts_with(&"é".repeat(MAX_ERROR_BODY_CHARS)));
        assert!(!truncated.starts_with(&"é".repeat(MAX_ERROR_BODY_CHARS + 1)));

        let exact = "é".repeat(MAX_ERROR_BODY_CHARS);
        assert_eq!(truncate_error_body(&exact), exact);
    }
}
