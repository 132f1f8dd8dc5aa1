pub mod item;
pub mod rest;
pub mod source;
pub mod sqlite;

pub use item::{Catalog, Item};
pub use rest::RestCatalog;
pub use source::{CatalogError, CatalogSource, StaticCatalog};
pub use sqlite::SqliteCatalog;

use std::sync::Arc;

use crate::config::{CatalogConfig, ConfigError};

/// Build the catalog backend selected in the config. sqlite wins when
/// both are present.
pub async fn open_source(config: &CatalogConfig) -> Result<Arc<dyn CatalogSource>, CatalogError> {
    if let Some(ref sqlite) = config.sqlite {
        let source = SqliteCatalog::new(&sqlite.filename, &config.table).await?;
        return Ok(Arc::new(source));
    }
    if let Some(ref rest) = config.rest {
        let source = RestCatalog::new(rest, &config.table)?;
        return Ok(Arc::new(source));
    }
    Err(CatalogError::Config(ConfigError::NoCatalog))
}
