//! Lens and data source lookup
//!
//! The navigator does not own lens definitions or credentials; it asks a
//! [`LensCatalog`] for them on every request.

pub mod memory;

pub use memory::InMemoryCatalog;

use crate::schema::{DataLens, DataSourceCredentials};
use async_trait::async_trait;
use thiserror::Error;

/// Source of lens configurations and data source credentials
#[async_trait]
pub trait LensCatalog: Send + Sync + 'static {
    /// Look up a lens by id
    async fn data_lens(&self, lens_id: &str) -> Result<Option<DataLens>, CatalogError>;

    /// Look up the credentials of a registered data source
    async fn data_source(&self, data_source_id: &str) -> Result<Option<DataSourceCredentials>, CatalogError>;
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    /// Backing store could not be reached
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}
