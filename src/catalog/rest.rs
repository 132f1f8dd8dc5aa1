use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::item::Item;
use super::source::{validate_table, CatalogError, CatalogResult, CatalogSource};
use crate::config::RestConfig;

const COLUMNS: &str = "id,show_title,show_director,show_description,show_poster_url";

/// Catalog served by a PostgREST endpoint (Supabase and friends).
pub struct RestCatalog {
    client: reqwest::Client,
    endpoint: String,
    apikey: Option<String>,
}

impl RestCatalog {
    pub fn new(config: &RestConfig, table: &str) -> CatalogResult<Self> {
        validate_table(table)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let endpoint = build_endpoint(&config.url, table);
        info!("Catalog endpoint: {}", endpoint);

        Ok(Self {
            client,
            endpoint,
            apikey: config.apikey.clone(),
        })
    }
}

fn build_endpoint(base_url: &str, table: &str) -> String {
    format!(
        "{}/rest/v1/{}?select={}&order=id",
        base_url.trim_end_matches('/'),
        table,
        COLUMNS
    )
}

#[async_trait]
impl CatalogSource for RestCatalog {
    async fn fetch_items(&self) -> CatalogResult<Vec<Item>> {
        let mut request = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(ref key) = self.apikey {
            request = request.header("apikey", key).bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status(status.as_u16(), body));
        }

        let items: Vec<Item> = response.json().await?;
        debug!("Fetched {} items from {}", items.len(), self.endpoint);
        Ok(items)
    }
}
