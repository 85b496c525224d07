use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use ords_core::catalog::{Operation, Verb};
use ords_core::input::{OperationInput, PathValue, QueryValue};

use crate::auth::TokenManager;
use crate::error::ExecuteError;

/// Normalized result of one operation call. Non-2xx statuses are data, not
/// errors; the body is passed through as unparsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub status_code: u16,
    pub body: String,
}

/// Assembles and executes concrete requests for registry operations.
pub struct Executor {
    base_url: String,
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
}

impl Executor {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client, tokens: Arc<TokenManager>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            tokens,
        }
    }

    pub async fn execute(
        &self,
        operation: &Operation,
        input: &OperationInput,
    ) -> Result<CallOutcome, ExecuteError> {
        let path = render_path(&operation.path, &input.params);
        let raw_url = format!("{}{}", self.base_url, path);
        let mut url = reqwest::Url::parse(&raw_url).map_err(|source| ExecuteError::InvalidUrl {
            url: raw_url.clone(),
            source,
        })?;
        append_query(&mut url, &input.query);

        let mut headers = HeaderMap::new();
        for (name, value) in &input.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ExecuteError::InvalidHeader { name: name.clone() })?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| ExecuteError::InvalidHeader { name: name.clone() })?;
            headers.insert(header_name, header_value);
        }

        let mut request = self.http.request(method_for(operation.verb), url.clone());
        if operation.verb.accepts_body() {
            if let Some(body) = &input.body {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                request = request.body(body.to_string());
            }
        }

        // Attach auth last so the bearer header wins over caller headers.
        let token = self.tokens.bearer_token().await?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ExecuteError::InvalidHeader {
                name: "authorization".to_string(),
            })?;
        headers.insert(AUTHORIZATION, bearer);
        request = request.headers(headers);

        let response = request.send().await.map_err(|source| ExecuteError::Transport {
            url: url.to_string(),
            source,
        })?;
        let status_code = response.status().as_u16();
        let body = response.text().await.map_err(|source| ExecuteError::Transport {
            url: url.to_string(),
            source,
        })?;
        Ok(CallOutcome { status_code, body })
    }
}

fn method_for(verb: Verb) -> Method {
    match verb {
        Verb::Get => Method::GET,
        Verb::Post => Method::POST,
        Verb::Put => Method::PUT,
        Verb::Patch => Method::PATCH,
        Verb::Delete => Method::DELETE,
        Verb::Head => Method::HEAD,
        Verb::Options => Method::OPTIONS,
    }
}

/// Replaces the first occurrence of `{key}` for each supplied parameter.
/// Placeholders without a matching parameter are left verbatim — documented
/// fallback behavior, not an error.
pub fn render_path(template: &str, params: &BTreeMap<String, PathValue>) -> String {
    let mut path = template.to_string();
    for (key, value) in params {
        let placeholder = format!("{{{key}}}");
        path = path.replacen(&placeholder, &value.render(), 1);
    }
    path
}

fn append_query(url: &mut reqwest::Url, query: &BTreeMap<String, QueryValue>) {
    let rendered: Vec<(&str, String)> = query
        .iter()
        .filter_map(|(key, value)| value.render().map(|text| (key.as_str(), text)))
        .collect();
    if rendered.is_empty() {
        return;
    }
    let mut pairs = url.query_pairs_mut();
    for (key, text) in rendered {
        pairs.append_pair(key, &text);
    }
}
