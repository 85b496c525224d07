use ords_core::catalog::{self, Catalog, ItemSpec, OperationRegistry};

use crate::error::DiscoveryError;

/// Fetches the ORDS catalog, merges every item's path table, and builds a
/// fresh operation registry. Each call rebuilds the registry wholesale, so
/// re-synthesis against an unchanged catalog is idempotent.
pub struct Synthesizer {
    /// Always trailing-slash terminated; item spec URLs append `{name}/`.
    discovery_url: String,
    schema: String,
    exclude: Vec<String>,
    http: reqwest::Client,
}

impl Synthesizer {
    pub fn new(
        discovery_url: impl Into<String>,
        schema: impl Into<String>,
        exclude: Vec<String>,
        http: reqwest::Client,
    ) -> Self {
        let mut discovery_url = discovery_url.into();
        if !discovery_url.ends_with('/') {
            discovery_url.push('/');
        }
        Self {
            discovery_url,
            schema: schema.into(),
            exclude,
            http,
        }
    }

    /// Item spec fetches are strictly sequential in catalog order; the first
    /// failure aborts the run and the partial results are discarded.
    pub async fn synthesize(&self) -> Result<OperationRegistry, DiscoveryError> {
        let catalog = self.fetch_catalog().await?;

        let mut specs = Vec::with_capacity(catalog.items.len());
        for item in &catalog.items {
            if self.exclude.iter().any(|excluded| excluded == &item.name) {
                tracing::debug!(item = %item.name, "skipping excluded catalog item");
                continue;
            }
            specs.push(self.fetch_item_spec(&item.name).await?);
        }

        let table = catalog::merge_paths(&specs)?;
        let registry = catalog::build_registry(&table, &self.schema);
        tracing::info!(operations = registry.len(), "synthesized operation registry");
        Ok(registry)
    }

    async fn fetch_catalog(&self) -> Result<Catalog, DiscoveryError> {
        let url = self.discovery_url.clone();
        let response = self.http.get(&url).send().await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(DiscoveryError::CatalogStatus { url, status });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| DiscoveryError::Parse {
            context: format!("catalog from {url}"),
            source,
        })
    }

    async fn fetch_item_spec(&self, name: &str) -> Result<ItemSpec, DiscoveryError> {
        let url = format!("{}{}/", self.discovery_url, name);
        tracing::debug!(%url, "fetching item spec");
        let response = self.http.get(&url).send().await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(DiscoveryError::ItemStatus {
                item: name.to_string(),
                status,
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| DiscoveryError::Parse {
            context: format!("spec for catalog item '{name}'"),
            source,
        })
    }
}
