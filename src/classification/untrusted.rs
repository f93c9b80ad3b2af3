//! Read-only view over model output whose shape is unknown.
//!
//! Every accessor answers "absent" instead of failing, so callers have to
//! choose a fallback for each field they read.
use serde_json::Value;

/// Decoded model output that has not been checked against any schema.
#[derive(Debug, Clone, PartialEq)]
pub struct UntrustedPayload(Value);

impl UntrustedPayload {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn view(&self) -> Untrusted<'_> {
        Untrusted(Some(&self.0))
    }

    #[must_use]
    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl From<Value> for UntrustedPayload {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// Cursor into an [`UntrustedPayload`]; may point at nothing.
#[derive(Debug, Clone, Copy)]
pub struct Untrusted<'a>(Option<&'a Value>);

impl<'a> Untrusted<'a> {
    /// Member `key` when this is an object, absent otherwise.
    #[must_use]
    pub fn field(self, key: &str) -> Self {
        Self(self.0.and_then(Value::as_object).and_then(|map| map.get(key)))
    }

    /// Trimmed, non-empty string content.
    #[must_use]
    pub fn text(self) -> Option<&'a str> {
        self.0
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Finite number, or a numeric string with an optional trailing `%`.
    #[must_use]
    pub fn number(self) -> Option<f64> {
        match self.0? {
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
            Value::String(s) => {
                let trimmed = s.trim();
                let digits = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
                digits.parse::<f64>().ok().filter(|v| v.is_finite())
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn boolean(self) -> Option<bool> {
        self.0.and_then(Value::as_bool)
    }

    /// Elements when this is an array; nothing otherwise.
    pub fn items(self) -> impl Iterator<Item = Untrusted<'a>> {
        self.0
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(|value| Untrusted(Some(value)))
    }

    #[must_use]
    pub fn is_present(self) -> bool {
        self.0.is_some_and(|v| !v.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_on_non_object_is_absent() {
        let payload = UntrustedPayload::new(json!(["a", "b"]));
        assert!(!payload.view().field("summary").is_present());
    }

    #[test]
    fn text_trims_and_rejects_blank() {
        let payload = UntrustedPayload::new(json!({"a": "  hi ", "b": "   ", "c": 3}));
        let view = payload.view();
        assert_eq!(view.field("a").text(), Some("hi"));
        assert_eq!(view.field("b").text(), None);
        assert_eq!(view.field("c").text(), None);
    }

    #[test]
    fn number_accepts_numeric_strings_and_percent() {
        let payload = UntrustedPayload::new(json!({
            "n": 12.5,
            "s": " 85% ",
            "bad": "eighty",
            "inf": "inf",
            "flag": true
        }));
        let view = payload.view();
        assert_eq!(view.field("n").number(), Some(12.5));
        assert_eq!(view.field("s").number(), Some(85.0));
        assert_eq!(view.field("bad").number(), None);
        assert_eq!(view.field("inf").number(), None);
        assert_eq!(view.field("flag").number(), None);
    }

    #[test]
    fn items_of_non_array_is_empty() {
        let payload = UntrustedPayload::new(json!({"list": {"not": "an array"}}));
        assert_eq!(payload.view().field("list").items().count(), 0);
    }
}
