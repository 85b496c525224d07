use thiserror::Error;

/// Token endpoint failures. Surfaced to the invoking call, never retried.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token endpoint returned status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token response is not a client-credentials grant payload: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Catalog or item-spec discovery failures. Fatal to a synthesis run; the
/// caller logs them and keeps serving with whatever registry it has.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("catalog fetch from {url} returned status {status}")]
    CatalogStatus { url: String, status: u16 },
    #[error("spec fetch for catalog item '{item}' returned status {status}")]
    ItemStatus { item: String, status: u16 },
    #[error("discovery request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to parse {context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Catalog(#[from] ords_core::catalog::CatalogError),
}

/// Per-invocation execution failures. Ordinary non-2xx responses are not
/// errors; they pass through as data.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid request URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid header '{name}'")]
    InvalidHeader { name: String },
}
