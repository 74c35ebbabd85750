use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;
use crate::domain::BookId;
use crate::models::book::{Book, BookPage, SearchEnvelope};
use crate::query::error::CatalogError;
use crate::query::key::QueryKey;
use crate::query::transport::CatalogTransport;

/// REST client for the remote book catalog.
///
/// Talks to `{base}/Book/search` for listings and `{base}/Book/{id}` for single
/// records. Non-success statuses become [`CatalogError::Transport`] carrying
/// the status and body, except 404 on a record route which becomes
/// [`CatalogError::NotFound`].
#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: Url,
}

impl CatalogClient {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("API base URL cannot be used as a base: {}", config.base_url);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(config.user_agent.as_str())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self::with_client(client, base_url))
    }

    #[must_use]
    pub const fn with_client(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn search_url(&self, key: &QueryKey) -> Url {
        let mut url = self.endpoint(&["Book", "search"]);
        url.query_pairs_mut().extend_pairs(key.to_query_params());
        url
    }

    fn book_url(&self, id: BookId) -> Url {
        self.endpoint(&["Book", &id.to_string()])
    }

    async fn check(response: Response, id: Option<BookId>) -> Result<Response, CatalogError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND
            && let Some(id) = id
        {
            return Err(CatalogError::not_found("Book", id));
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body
        };
        Err(CatalogError::transport(Some(status.as_u16()), message))
    }

    /// Decodes a record body, falling back to `sent` when the server answers
    /// without one (e.g. 204 No Content).
    async fn record_or<T: DeserializeOwned>(response: Response, sent: T) -> Result<T, CatalogError> {
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(sent);
        }
        serde_json::from_str(&body)
            .map_err(|e| CatalogError::transport(None, format!("Invalid response body: {e}")))
    }
}

#[async_trait::async_trait]
impl CatalogTransport for CatalogClient {
    async fn search(&self, key: &QueryKey) -> Result<BookPage, CatalogError> {
        let url = self.search_url(key);
        debug!(url = %url, "Searching catalog");

        let response = self.client.get(url).send().await?;
        let response = Self::check(response, None).await?;
        let envelope: SearchEnvelope = response.json().await?;

        Ok(envelope.into())
    }

    async fn get(&self, id: BookId) -> Result<Book, CatalogError> {
        let response = self.client.get(self.book_url(id)).send().await?;
        let response = Self::check(response, Some(id)).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, id: BookId) -> Result<(), CatalogError> {
        debug!(id = %id, "Deleting book");
        let response = self.client.delete(self.book_url(id)).send().await?;
        Self::check(response, Some(id)).await?;
        Ok(())
    }

    async fn create(&self, book: &Book) -> Result<Book, CatalogError> {
        let response = self
            .client
            .post(self.endpoint(&["Book"]))
            .json(book)
            .send()
            .await?;
        let response = Self::check(response, None).await?;
        Self::record_or(response, book.clone()).await
    }

    async fn update(&self, book: &Book) -> Result<Book, CatalogError> {
        let response = self
            .client
            .put(self.book_url(book.id))
            .json(book)
            .send()
            .await?;
        let response = Self::check(response, Some(book.id)).await?;
        Self::record_or(response, book.clone()).await
    }
}
