use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use super::item::Item;
use super::source::{validate_table, CatalogResult, CatalogSource};

pub struct SqliteCatalog {
    pool: SqlitePool,
    query: String,
}

impl SqliteCatalog {
    pub async fn new(db_path: &str, table: &str) -> CatalogResult<Self> {
        validate_table(table)?;

        let options = SqliteConnectOptions::from_str(db_path)?.read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!("Catalog database opened at {} (table {})", db_path, table);

        Ok(Self::with_pool(pool, table))
    }

    fn with_pool(pool: SqlitePool, table: &str) -> Self {
        let query = format!(
            "SELECT id, show_title, show_director, show_description, show_poster_url FROM {} ORDER BY id",
            table
        );
        Self { pool, query }
    }
}

#[async_trait]
impl CatalogSource for SqliteCatalog {
    async fn fetch_items(&self) -> CatalogResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(&self.query)
            .fetch_all(&self.pool)
            .await?;
        debug!("Fetched {} items from sqlite", items.len());
        Ok(items)
    }
}
