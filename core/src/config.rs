use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("client id or client secret not configured")]
    MissingCredentials,
}

/// Validated process configuration for the bridge.
///
/// URLs are normalized once here: the catalog URL always carries a trailing
/// slash (item spec URLs are formed by appending `{name}/`), while the base
/// and token URLs never do (operation paths start with `/`).
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// ORDS OpenAPI catalog (discovery) URL.
    pub openapi_url: String,
    /// Base URL every synthesized operation executes against.
    pub base_url: String,
    /// OAuth2 client-credentials token endpoint.
    pub token_url: String,
    /// Schema label embedded in every operation id.
    pub schema: String,
    pub client_id: String,
    pub client_secret: String,
    /// Catalog items skipped during synthesis.
    pub exclude: Vec<String>,
}

impl BridgeConfig {
    /// Absent or empty client credentials are a fatal startup condition.
    pub fn new(
        openapi_url: impl Into<String>,
        base_url: impl Into<String>,
        token_url: impl Into<String>,
        schema: impl Into<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
        exclude: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let client_id = client_id
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingCredentials)?;
        let client_secret = client_secret
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::MissingCredentials)?;

        let mut openapi_url = openapi_url.into();
        if !openapi_url.ends_with('/') {
            openapi_url.push('/');
        }

        Ok(Self {
            openapi_url,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_url: token_url.into().trim_end_matches('/').to_string(),
            schema: schema.into(),
            client_id,
            client_secret,
            exclude,
        })
    }
}
