//! Notion persona database client
//!
//! Persona pages carry a `Name` title property and `Backstory`,
//! `Roast Style`, `Voice Vibe` and `Voice ID` rich-text properties.

use std::collections::HashMap;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::PersonaStore;
use crate::config::NotionConfig;
use crate::persona::Persona;
use crate::{Error, Result};

/// Notion API version sent with every request
const NOTION_VERSION: &str = "2022-06-28";

/// Max page size accepted by the search endpoint
const PAGE_SIZE: u32 = 100;

/// Persona store backed by a Notion database
pub struct NotionStore {
    client: reqwest::Client,
    api_key: String,
    database_id: Option<String>,
    base_url: String,
}

/// Search request body
#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
    filter: SearchFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_cursor: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_size: Option<u32>,
}

/// Restricts search results to pages
#[derive(Debug, Serialize)]
struct SearchFilter {
    property: &'static str,
    value: &'static str,
}

impl SearchFilter {
    const PAGES: Self = Self {
        property: "object",
        value: "page",
    };
}

/// Search response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Page>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

/// A page returned by search
#[derive(Debug, Deserialize)]
struct Page {
    parent: Option<Parent>,
    #[serde(default)]
    properties: HashMap<String, Property>,
}

/// Where a page lives
#[derive(Debug, Deserialize)]
struct Parent {
    #[serde(rename = "type")]
    kind: String,
    database_id: Option<String>,
}

/// A page property; only title and rich-text values are read
#[derive(Debug, Deserialize)]
struct Property {
    title: Option<Vec<RichText>>,
    rich_text: Option<Vec<RichText>>,
}

/// A rich-text item
#[derive(Debug, Deserialize)]
struct RichText {
    text: Option<TextContent>,
    plain_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    content: String,
}

impl RichText {
    fn content(&self) -> &str {
        self.text
            .as_ref()
            .map(|t| t.content.as_str())
            .or(self.plain_text.as_deref())
            .unwrap_or_default()
    }
}

impl Page {
    /// First text item of a title or rich-text property, or ""
    fn text(&self, property: &str) -> String {
        let Some(prop) = self.properties.get(property) else {
            return String::new();
        };

        prop.title
            .as_deref()
            .or(prop.rich_text.as_deref())
            .and_then(<[RichText]>::first)
            .map(|item| item.content().to_string())
            .unwrap_or_default()
    }

    fn to_persona(&self) -> Persona {
        Persona {
            name: self.text("Name"),
            backstory: self.text("Backstory"),
            roast_style: self.text("Roast Style"),
            voice_vibe: self.text("Voice Vibe"),
            voice_id: self.text("Voice ID"),
        }
    }

    /// Whether the page is a row of a database (of `database_id`, if given)
    fn in_database(&self, database_id: Option<&str>) -> bool {
        let Some(parent) = &self.parent else {
            return false;
        };
        if parent.kind != "database_id" {
            return false;
        }

        match (database_id, parent.database_id.as_deref()) {
            (Some(wanted), Some(actual)) => normalize_id(wanted) == normalize_id(actual),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

/// Notion ids appear both with and without dashes
fn normalize_id(id: &str) -> String {
    id.chars()
        .filter(|c| *c != '-')
        .collect::<String>()
        .to_lowercase()
}

impl NotionStore {
    /// Create a client for the public Notion API
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, database_id: Option<String>) -> Result<Self> {
        Self::with_base_url(api_key, database_id, "https://api.notion.com/v1".to_string())
    }

    /// Create a client for a custom API base URL
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn with_base_url(
        api_key: String,
        database_id: Option<String>,
        base_url: String,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Notion API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            database_id,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn from_config(config: &NotionConfig) -> Result<Self> {
        Self::with_base_url(
            config.api_key.expose_secret().to_string(),
            config.database_id.clone(),
            config.base_url.clone(),
        )
    }

    /// Run one search request
    async fn search(&self, request: &SearchRequest<'_>) -> Result<SearchResponse> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::PersonaStore(format!("Notion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::PersonaStore(format!("Notion search error {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| Error::PersonaStore(format!("invalid Notion response: {e}")))
    }
}

#[async_trait]
impl PersonaStore for NotionStore {
    fn name(&self) -> &'static str {
        "notion"
    }

    async fn find(&self, name: &str) -> Result<Option<Persona>> {
        let request = SearchRequest {
            query: Some(name),
            filter: SearchFilter::PAGES,
            start_cursor: None,
            page_size: None,
        };

        let response = self.search(&request).await?;
        tracing::debug!(query = name, results = response.results.len(), "notion search");

        Ok(response.results.first().map(Page::to_persona))
    }

    async fn list_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let request = SearchRequest {
                query: None,
                filter: SearchFilter::PAGES,
                start_cursor: cursor.as_deref(),
                page_size: Some(PAGE_SIZE),
            };
            let response = self.search(&request).await?;

            names.extend(
                response
                    .results
                    .iter()
                    .filter(|page| page.in_database(self.database_id.as_deref()))
                    .map(|page| page.text("Name"))
                    .filter(|name| !name.is_empty()),
            );

            match response.next_cursor {
                Some(next) if response.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(names)
    }
}
