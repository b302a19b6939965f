//! Query strings and navigation parameters.
//!
//! Query parameters come from the URL. Route parameters are passed
//! programmatically with a navigation call. Both are reset when the target
//! route changes; [`QueryManager::get_param`] prefers the query value.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A query value: plain, or accumulated from repeated `key[]` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Single(String),
    Multi(Vec<String>),
}

impl QueryValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Single(s) => Some(s),
            QueryValue::Multi(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            QueryValue::Single(s) => s.is_empty(),
            QueryValue::Multi(items) => items.is_empty(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            QueryValue::Single(s) => Value::String(s.clone()),
            QueryValue::Multi(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
        }
    }

    /// Convert a JSON value. `null` maps to an empty value, scalars to
    /// their string form, arrays to a multi value.
    pub fn from_json(value: &Value) -> QueryValue {
        fn scalar(value: &Value) -> String {
            match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }
        }
        match value {
            Value::Array(items) => QueryValue::Multi(items.iter().map(scalar).collect()),
            other => QueryValue::Single(scalar(other)),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Single(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Single(value)
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(value: Vec<String>) -> Self {
        QueryValue::Multi(value)
    }
}

pub type QueryParams = BTreeMap<String, QueryValue>;

/// Build a parameter map from key/value pairs.
pub fn params<I, K, V>(pairs: I) -> QueryParams
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<QueryValue>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// Convert a JSON object into parameters. Non-objects yield nothing.
pub fn params_from_json(value: &Value) -> QueryParams {
    match value {
        Value::Object(map) => {
            map.iter().map(|(k, v)| (k.clone(), QueryValue::from_json(v))).collect()
        }
        _ => QueryParams::new(),
    }
}

pub fn params_to_json(params: &QueryParams) -> Value {
    Value::Object(params.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

/// Parse `a=1&tags[]=x&tags[]=y`.
///
/// A literal `[]` suffix on the raw key accumulates values into an array;
/// other duplicate keys keep the last value. Pairs that fail to decode are
/// skipped.
pub fn parse_query_string(query: &str) -> QueryParams {
    let mut params = QueryParams::new();
    let query = query.strip_prefix('?').unwrap_or(query);

    for pair in query.split('&') {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        if raw_key.is_empty() {
            continue;
        }
        let (raw_key, is_array) = match raw_key.strip_suffix("[]") {
            Some(stripped) => (stripped, true),
            None => (raw_key, false),
        };
        let decoded = urlencoding::decode(raw_key)
            .and_then(|k| urlencoding::decode(raw_value).map(|v| (k, v)));
        let (key, value) = match decoded {
            Ok((k, v)) => (k.into_owned(), v.into_owned()),
            Err(err) => {
                warn!(pair, error = %err, "Failed to decode query parameter");
                continue;
            }
        };

        if is_array {
            match params.entry(key).or_insert_with(|| QueryValue::Multi(Vec::new())) {
                QueryValue::Multi(items) => items.push(value),
                single => *single = QueryValue::Multi(vec![value]),
            }
        } else {
            params.insert(key, QueryValue::Single(value));
        }
    }
    params
}

/// Inverse of [`parse_query_string`]. Arrays become repeated `key[]` pairs;
/// empty arrays are omitted.
pub fn build_query_string(params: &QueryParams) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params {
        let key = urlencoding::encode(key);
        match value {
            QueryValue::Single(v) => pairs.push(format!("{key}={}", urlencoding::encode(v))),
            QueryValue::Multi(items) => {
                pairs.extend(
                    items.iter().map(|item| format!("{key}[]={}", urlencoding::encode(item))),
                );
            }
        }
    }
    pairs.join("&")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStats {
    pub current_params: usize,
    pub current_query_string: String,
}

#[derive(Debug, Default)]
struct ParamState {
    query: QueryParams,
    route: QueryParams,
}

/// Current query and route parameters.
#[derive(Debug, Default)]
pub struct QueryManager {
    state: RwLock<ParamState>,
}

impl QueryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query_params(&self) -> QueryParams {
        self.state.read().query.clone()
    }

    pub fn get_query_param(&self, key: &str) -> Option<QueryValue> {
        self.state.read().query.get(key).cloned()
    }

    /// Merge (or with `replace`, substitute) query parameters. Empty values
    /// remove their key.
    pub fn set_query_params(&self, params: QueryParams, replace: bool) {
        let mut state = self.state.write();
        if replace {
            state.query.clear();
        }
        for (key, value) in params {
            if value.is_empty() {
                state.query.remove(&key);
            } else {
                state.query.insert(key, value);
            }
        }
    }

    pub fn remove_query_params<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.write();
        for key in keys {
            state.query.remove(key.as_ref());
        }
    }

    pub fn clear_query_params(&self) {
        self.state.write().query.clear();
    }

    /// Replace the query parameters with those parsed from the URL.
    pub fn set_current_query_params(&self, params: QueryParams) {
        self.state.write().query = params;
    }

    pub fn route_params(&self) -> QueryParams {
        self.state.read().route.clone()
    }

    pub fn get_route_param(&self, key: &str) -> Option<QueryValue> {
        self.state.read().route.get(key).cloned()
    }

    pub fn set_current_route_params(&self, params: Option<QueryParams>) {
        let params = params.unwrap_or_default();
        debug!(count = params.len(), "Route params set");
        self.state.write().route = params;
    }

    /// Query value if present, else route value.
    pub fn get_param(&self, key: &str) -> Option<QueryValue> {
        let state = self.state.read();
        state.query.get(key).or_else(|| state.route.get(key)).cloned()
    }

    /// Route parameters overlaid with query parameters.
    pub fn get_all_params(&self) -> QueryParams {
        let state = self.state.read();
        let mut all = state.route.clone();
        all.extend(state.query.iter().map(|(k, v)| (k.clone(), v.clone())));
        all
    }

    pub fn has_query_params_changed(&self, params: &QueryParams) -> bool {
        self.state.read().query != *params
    }

    pub fn query_string(&self) -> String {
        build_query_string(&self.state.read().query)
    }

    pub fn stats(&self) -> QueryStats {
        let state = self.state.read();
        QueryStats {
            current_params: state.query.len(),
            current_query_string: build_query_string(&state.query),
        }
    }

    pub fn reset(&self) {
        *self.state.write() = ParamState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_simple() {
        let parsed = parse_query_string("id=42&name=J%C3%BCrgen&flag");
        assert_eq!(parsed["id"], QueryValue::from("42"));
        assert_eq!(parsed["name"], QueryValue::from("Jürgen"));
        assert_eq!(parsed["flag"], QueryValue::from(""));
    }

    #[test]
    fn test_parse_arrays_and_last_wins() {
        let parsed = parse_query_string("?tag[]=a&tag[]=b&page=1&page=2");
        assert_eq!(parsed["tag"], QueryValue::Multi(vec!["a".into(), "b".into()]));
        assert_eq!(parsed["page"], QueryValue::from("2"));
    }

    #[test]
    fn test_parse_skips_bad_pairs() {
        let parsed = parse_query_string("ok=1&bad=%FF%FE&=novalue");
        assert_eq!(parsed.len(), 1);
        assert!(parsed.contains_key("ok"));
    }

    #[test]
    fn test_build() {
        let ids = QueryValue::from(vec!["1".to_string(), "2".to_string()]);
        let p = params([("q", QueryValue::from("a b&c")), ("ids", ids)]);
        assert_eq!(build_query_string(&p), "ids[]=1&ids[]=2&q=a%20b%26c");
        assert_eq!(build_query_string(&QueryParams::new()), "");
    }

    #[test]
    fn test_round_trip() {
        let cases = [
            params([("id", "42")]),
            params([("a=b", "c&d"), ("empty", ""), ("odd[]", "literal")]),
            params([("list", QueryValue::Multi(vec!["x".into(), "".into(), "ü".into()]))]),
        ];
        for case in cases {
            assert_eq!(parse_query_string(&build_query_string(&case)), case);
        }
    }

    #[test]
    fn test_set_query_params() {
        let qm = QueryManager::new();
        qm.set_current_query_params(params([("a", "1"), ("b", "2")]));
        qm.set_query_params(params([("b", ""), ("c", "3")]), false);
        assert_eq!(qm.query_params(), params([("a", "1"), ("c", "3")]));

        qm.set_query_params(params([("z", "9")]), true);
        assert_eq!(qm.query_params(), params([("z", "9")]));

        qm.remove_query_params(["z"]);
        assert!(qm.query_params().is_empty());
    }

    #[test]
    fn test_param_precedence() {
        let qm = QueryManager::new();
        qm.set_current_route_params(Some(params([("id", "route"), ("tab", "info")])));
        qm.set_current_query_params(params([("id", "query")]));

        assert_eq!(qm.get_param("id"), Some(QueryValue::from("query")));
        assert_eq!(qm.get_param("tab"), Some(QueryValue::from("info")));
        assert_eq!(qm.get_param("missing"), None);
        assert_eq!(qm.get_all_params(), params([("id", "query"), ("tab", "info")]));
        assert_eq!(qm.get_route_param("id"), Some(QueryValue::from("route")));
    }

    #[test]
    fn test_changed_and_stats() {
        let qm = QueryManager::new();
        qm.set_current_query_params(params([("id", "1")]));
        assert!(!qm.has_query_params_changed(&params([("id", "1")])));
        assert!(qm.has_query_params_changed(&params([("id", "2")])));
        assert_eq!(qm.stats().current_query_string, "id=1");
    }

    #[test]
    fn test_json_conversion() {
        let p = params_from_json(&json!({"page": 2, "tags": ["a", "b"], "gone": null}));
        assert_eq!(p["page"], QueryValue::from("2"));
        assert_eq!(p["tags"], QueryValue::Multi(vec!["a".into(), "b".into()]));
        assert!(p["gone"].is_empty());
        assert_eq!(params_to_json(&params([("id", "1")])), json!({"id": "1"}));
    }
}
