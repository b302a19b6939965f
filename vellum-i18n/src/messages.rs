//! Message bundles
//!
//! A bundle is the parsed JSON message file of one language. Keys are looked
//! up by dot path (`"nav.home.title"`) and `{name}` placeholders are filled
//! from a parameter map.

use serde_json::{Map, Value};

/// Parsed messages for one language.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageBundle {
    root: Map<String, Value>,
}

impl MessageBundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON object. Anything else yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(root) => Some(Self { root }),
            _ => None,
        }
    }

    /// Check if the bundle has no messages.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// The raw JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Walk a dot-separated path.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

/// Replace `{name}` placeholders with values from `params`.
///
/// Unknown placeholders are left untouched. Only word characters are allowed
/// between the braces.
pub fn interpolate(message: &str, params: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(message.len());
    let mut rest = message;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}');
        match close {
            Some(close)
                if close > 0
                    && after[..close]
                        .chars()
                        .all(|c| c.is_alphanumeric() || c == '_') =>
            {
                let name = &after[..close];
                match params.get(name) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(other) => out.push_str(&other.to_string()),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_lookup() {
        let bundle = MessageBundle::from_value(json!({
            "nav": {"home": "Home", "deep": {"x": "X"}},
            "title": "Welcome"
        }))
        .unwrap();

        assert_eq!(bundle.lookup("title"), Some(&json!("Welcome")));
        assert_eq!(bundle.lookup("nav.deep.x"), Some(&json!("X")));
        assert_eq!(bundle.lookup("nav.missing"), None);
        assert_eq!(bundle.lookup("title.sub"), None);
    }

    #[test]
    fn test_interpolate() {
        let params = json!({"name": "Kim", "count": 3});
        let params = params.as_object().unwrap();
        assert_eq!(interpolate("Hi {name}, {count} new", params), "Hi Kim, 3 new");
        assert_eq!(interpolate("Keep {unknown}", params), "Keep {unknown}");
        assert_eq!(interpolate("Brace { alone } {}", params), "Brace { alone } {}");
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(MessageBundle::from_value(json!(["a"])).is_none());
    }
}
