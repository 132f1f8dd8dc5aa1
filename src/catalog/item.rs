use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// One recommendation as stored in the remote collection. Field names on
/// the wire follow the column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub id: i64,
    #[serde(rename = "show_title")]
    #[sqlx(rename = "show_title")]
    pub title: String,
    #[serde(rename = "show_director")]
    #[sqlx(rename = "show_director")]
    pub director: String,
    #[serde(rename = "show_description")]
    #[sqlx(rename = "show_description")]
    pub description: String,
    #[serde(rename = "show_poster_url")]
    #[sqlx(rename = "show_poster_url")]
    pub poster_url: String,
}

static EDGE_QUOTES: OnceLock<Regex> = OnceLock::new();

fn edge_quotes() -> &'static Regex {
    EDGE_QUOTES.get_or_init(|| Regex::new(r#"^["']|["']$"#).unwrap())
}

impl Item {
    /// Description with one leading and one trailing quote removed.
    pub fn display_description(&self) -> String {
        edge_quotes().replace_all(&self.description, "").into_owned()
    }
}

/// The full ordered set of items for one visit. Never mutated after load.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub items: Vec<Item>,
    pub fetched_at: DateTime<Utc>,
}

impl Catalog {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            fetched_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }
}

#[cfg(test)]
pub(crate) fn test_item(id: i64, title: &str) -> Item {
    Item {
        id,
        title: title.to_string(),
        director: format!("Director of {}", title),
        description: format!("\"About {}\"", title),
        poster_url: format!("https://posters.example.com/{}.jpg", id),
    }
}
