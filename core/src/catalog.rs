use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Root discovery document listing the sub-resources of the remote API.
/// Fetched once per synthesis run and discarded after the merge.
#[derive(Debug, Deserialize)]
pub struct Catalog {
    pub items: Vec<CatalogItem>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    #[serde(default)]
    pub links: Vec<CatalogLink>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogLink {
    #[serde(default)]
    pub rel: Option<String>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default, rename = "mediaType")]
    pub media_type: Option<String>,
}

/// Per-item OpenAPI-shaped document. Only `paths` is traversed; path items
/// are kept raw here and interpreted during the merge, where non-verb keys
/// (e.g. `parameters`) are dropped and verb values are validated.
#[derive(Debug, Default, Deserialize)]
pub struct ItemSpec {
    #[serde(default)]
    pub paths: BTreeMap<String, BTreeMap<String, Value>>,
}

/// Summary/description text attached to one (path, verb) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OperationMeta {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// The HTTP methods an ORDS path item may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Verb {
    pub fn parse(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "patch" => Some(Self::Patch),
            "delete" => Some(Self::Delete),
            "head" => Some(Self::Head),
            "options" => Some(Self::Options),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Head => "head",
            Self::Options => "options",
        }
    }

    pub fn upper(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Only these verbs carry a request body; others ignore any supplied one.
    pub fn accepts_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("path item for {verb} {path} is not an operation object: {source}")]
    InvalidOperation {
        path: String,
        verb: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Every path definition from every item spec, union-merged into one
/// namespace.
pub type PathTable = BTreeMap<String, BTreeMap<Verb, OperationMeta>>;

/// Union-merges the path tables of `specs` in order. Later items overwrite
/// earlier method entries on the same path (last-write-wins, order-dependent
/// by design). Keys that do not name an HTTP verb are ignored; verb entries
/// that are not operation objects fail the merge.
pub fn merge_paths(specs: &[ItemSpec]) -> Result<PathTable, CatalogError> {
    let mut merged = PathTable::new();
    for spec in specs {
        for (path, raw_item) in &spec.paths {
            let methods = merged.entry(path.clone()).or_default();
            for (key, raw_operation) in raw_item {
                let Some(verb) = Verb::parse(key) else {
                    continue;
                };
                let meta = serde_json::from_value(raw_operation.clone()).map_err(|source| {
                    CatalogError::InvalidOperation {
                        path: path.clone(),
                        verb: key.clone(),
                        source,
                    }
                })?;
                methods.insert(verb, meta);
            }
        }
    }
    Ok(merged)
}

/// One synthesized callable unit, bound to a fixed (path template, verb).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub id: String,
    pub path: String,
    pub verb: Verb,
    pub description: String,
}

/// Mapping from operation id to operation, built wholesale by synthesis.
/// Immutable once handed to the server; re-synthesis produces a fresh one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationRegistry {
    entries: BTreeMap<String, Operation>,
}

impl OperationRegistry {
    /// Same-id entries overwrite, mirroring the last-write-wins merge.
    pub fn insert(&mut self, operation: Operation) {
        self.entries.insert(operation.id.clone(), operation);
    }

    pub fn get(&self, id: &str) -> Option<&Operation> {
        self.entries.get(id)
    }

    /// Deterministic (sorted) iteration order.
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registers one operation per (path, verb) pair of the merged table.
pub fn build_registry(table: &PathTable, schema: &str) -> OperationRegistry {
    let mut registry = OperationRegistry::default();
    for (path, methods) in table {
        for (verb, meta) in methods {
            registry.insert(Operation {
                id: operation_id(*verb, schema, path),
                path: path.clone(),
                verb: *verb,
                description: describe(*verb, path, meta),
            });
        }
    }
    registry
}

/// Deterministic operation id: `{verb}_{schema}_{slug(path)}`.
pub fn operation_id(verb: Verb, schema: &str, path: &str) -> String {
    format!("{}_{}_{}", verb.as_str(), schema, slug_path(path))
}

/// Strips leading/trailing slashes and placeholder braces, and turns interior
/// slashes into underscores, so `/emp/{id}` becomes `emp_id`. Braces must go:
/// tool names are limited to `[a-zA-Z0-9_-]`.
fn slug_path(path: &str) -> String {
    path.trim_matches('/')
        .chars()
        .filter(|c| *c != '{' && *c != '}')
        .map(|c| if c == '/' { '_' } else { c })
        .collect()
}

/// Description precedence: operation description, then summary, then a
/// generated fallback. Empty strings count as absent.
pub fn describe(verb: Verb, path: &str, meta: &OperationMeta) -> String {
    meta.description
        .as_deref()
        .filter(|text| !text.is_empty())
        .or(meta.summary.as_deref().filter(|text| !text.is_empty()))
        .map(String::from)
        .unwrap_or_else(|| format!("Performs a {} request to {}", verb.upper(), path))
}
