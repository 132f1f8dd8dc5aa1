use async_trait::async_trait;
use tracing::error;

use super::item::Item;
use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected status {0}: {1}")]
    Status(u16, String),
    #[error("Invalid table name: {0}")]
    InvalidTable(String),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Read-only access to the recommendable items.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch every item, ordered by id.
    async fn fetch_items(&self) -> CatalogResult<Vec<Item>>;

    /// Like `fetch_items`, but a failed fetch is logged and reported as an
    /// empty catalog. Callers cannot tell "unreachable" from "no rows".
    async fn list_items(&self) -> Vec<Item> {
        match self.fetch_items().await {
            Ok(items) => items,
            Err(e) => {
                error!("Error fetching movies: {}", e);
                Vec::new()
            }
        }
    }
}

/// Fixed in-memory catalog.
pub struct StaticCatalog {
    items: Vec<Item>,
}

impl StaticCatalog {
    pub fn new(mut items: Vec<Item>) -> Self {
        items.sort_by_key(|item| item.id);
        Self { items }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch_items(&self) -> CatalogResult<Vec<Item>> {
        Ok(self.items.clone())
    }
}

/// Table names are interpolated into queries and URLs, so only plain
/// identifiers are accepted.
pub(crate) fn validate_table(table: &str) -> CatalogResult<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CatalogError::InvalidTable(table.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::item::test_item;

    struct FailingCatalog;

    #[async_trait]
    impl CatalogSource for FailingCatalog {
        async fn fetch_items(&self) -> CatalogResult<Vec<Item>> {
            Err(CatalogError::Status(503, "unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_fetch_yields_empty() {
        assert!(FailingCatalog.list_items().await.is_empty());
    }

    #[tokio::test]
    async fn test_static_catalog_is_ordered_and_repeatable() {
        let source = StaticCatalog::new(vec![
            test_item(3, "C"),
            test_item(1, "A"),
            test_item(2, "B"),
        ]);
        let first = source.list_items().await;
        let second = source.list_items().await;
        let ids: Vec<i64> = first.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_validate_table() {
        assert!(validate_table("show_list").is_ok());
        assert!(validate_table("_t2").is_ok());
        assert!(validate_table("").is_err());
        assert!(validate_table("2shows").is_err());
        assert!(validate_table("shows; drop table x").is_err());
        assert!(validate_table("a.b").is_err());
    }
}
