//! In-memory catalog, optionally loaded from a JSON file
//!
//! File layout:
//!
//! ```json
//! {
//!   "datasources": {
//!     "warehouse": { "jdbc_url": "jdbc:postgresql://db:5432/analytics", "username": "reader", "password": "..." }
//!   },
//!   "datalenses": {
//!     "sales": { "datasource_id": "warehouse", "datalens_config": { "tables": [ ... ] } }
//!   }
//! }
//! ```

use crate::catalog::{CatalogError, LensCatalog};
use crate::schema::{DataLens, DataSourceCredentials, LensConfig};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    datasources: HashMap<String, DataSourceCredentials>,

    #[serde(default)]
    datalenses: HashMap<String, LensEntry>,
}

#[derive(Debug, Deserialize)]
struct LensEntry {
    #[serde(default)]
    datasource_id: Option<String>,
    datalens_config: LensConfig,
}

/// Catalog held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    lenses: HashMap<String, DataLens>,
    data_sources: HashMap<String, DataSourceCredentials>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog document
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(raw)?;

        let lenses = file
            .datalenses
            .into_iter()
            .map(|(id, entry)| {
                let lens = DataLens {
                    id: id.clone(),
                    datasource_id: entry.datasource_id,
                    tables: entry.datalens_config.into_tables(),
                };
                (id, lens)
            })
            .collect();

        Ok(Self {
            lenses,
            data_sources: file.datasources,
        })
    }

    /// Load a catalog document from disk
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let catalog = Self::from_json(&raw)?;
        info!(
            path = %path.display(),
            lenses = catalog.lenses.len(),
            data_sources = catalog.data_sources.len(),
            "loaded lens catalog"
        );
        Ok(catalog)
    }

    pub fn with_lens(mut self, lens: DataLens) -> Self {
        self.lenses.insert(lens.id.clone(), lens);
        self
    }

    pub fn with_data_source(mut self, id: impl Into<String>, credentials: DataSourceCredentials) -> Self {
        self.data_sources.insert(id.into(), credentials);
        self
    }
}

#[async_trait]
impl LensCatalog for InMemoryCatalog {
    async fn data_lens(&self, lens_id: &str) -> Result<Option<DataLens>, CatalogError> {
        Ok(self.lenses.get(lens_id).cloned())
    }

    async fn data_source(&self, data_source_id: &str) -> Result<Option<DataSourceCredentials>, CatalogError> {
        Ok(self.data_sources.get(data_source_id).cloned())
    }
}
