use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Number, Value};

/// Per-call structured input accepted by every synthesized operation.
/// Parsed from `tools/call` arguments; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationInput {
    /// Caller-supplied headers, merged into the request. The bearer header
    /// wins on conflict.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Arbitrary JSON body; only sent for body-bearing verbs.
    #[serde(default)]
    pub body: Option<Value>,
    /// Path-template parameters.
    #[serde(default)]
    pub params: BTreeMap<String, PathValue>,
    /// Query-string parameters.
    #[serde(default)]
    pub query: BTreeMap<String, QueryValue>,
}

/// Path parameters accept strings and numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PathValue {
    Text(String),
    Number(Number),
}

impl PathValue {
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
        }
    }
}

/// Query parameters additionally accept booleans and nulls; null entries are
/// omitted from the query string entirely.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
}

impl QueryValue {
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(flag) => Some(flag.to_string()),
            Self::Number(number) => Some(number.to_string()),
            Self::Text(text) => Some(text.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_input() {
        let input: OperationInput = serde_json::from_value(json!({
            "headers": { "X-Trace": "abc" },
            "body": { "name": "Ada" },
            "params": { "id": 7, "kind": "full" },
            "query": { "active": true, "limit": 25, "cursor": null }
        }))
        .unwrap();

        assert_eq!(input.headers["X-Trace"], "abc");
        assert_eq!(input.body, Some(json!({ "name": "Ada" })));
        assert_eq!(input.params["id"].render(), "7");
        assert_eq!(input.params["kind"].render(), "full");
        assert_eq!(input.query["active"].render().as_deref(), Some("true"));
        assert_eq!(input.query["limit"].render().as_deref(), Some("25"));
        assert_eq!(input.query["cursor"].render(), None);
    }

    #[test]
    fn empty_object_yields_defaults() {
        let input: OperationInput = serde_json::from_value(json!({})).unwrap();
        assert!(input.headers.is_empty());
        assert!(input.body.is_none());
        assert!(input.params.is_empty());
        assert!(input.query.is_empty());
    }

    #[test]
    fn rejects_unsupported_value_types() {
        // Booleans are valid in query but not in params.
        let err = serde_json::from_value::<OperationInput>(json!({
            "params": { "flag": true }
        }));
        assert!(err.is_err());

        let err = serde_json::from_value::<OperationInput>(json!({
            "query": { "nested": { "a": 1 } }
        }));
        assert!(err.is_err());
    }

    #[test]
    fn bool_query_values_render_literally() {
        let input: OperationInput = serde_json::from_value(json!({
            "query": { "yes": true, "no": false }
        }))
        .unwrap();
        assert_eq!(input.query["yes"].render().as_deref(), Some("true"));
        assert_eq!(input.query["no"].render().as_deref(), Some("false"));
    }
}
