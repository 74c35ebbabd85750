//! Boundary to the remote catalog API.

use crate::domain::BookId;
use crate::models::book::{Book, BookPage};
use crate::query::error::CatalogError;
use crate::query::key::QueryKey;

/// Asynchronous access to the remote catalog.
///
/// Implementations do not retry; a failed call is reported once and the engine
/// leaves re-attempting to the next user transition.
///
/// # Examples
///
/// ```rust,ignore
/// use libris::query::{CatalogTransport, QueryKey};
/// use std::sync::Arc;
///
/// async fn first_page(transport: Arc<dyn CatalogTransport>, key: QueryKey) {
///     let page = transport.search(&key).await?;
///     println!("{} of {}", page.items.len(), page.total_count);
/// }
/// ```
#[async_trait::async_trait]
pub trait CatalogTransport: Send + Sync {
    /// Fetches the page described by `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Transport`] on network or HTTP failures.
    async fn search(&self, key: &QueryKey) -> Result<BookPage, CatalogError>;

    /// Fetches one record.
    ///
    /// # Errors
    ///
    /// - Returns [`CatalogError::NotFound`] if the record does not exist
    /// - Returns [`CatalogError::Transport`] on network or HTTP failures
    async fn get(&self, id: BookId) -> Result<Book, CatalogError>;

    /// Deletes one record.
    ///
    /// # Errors
    ///
    /// - Returns [`CatalogError::NotFound`] if the record does not exist
    /// - Returns [`CatalogError::Transport`] on network or HTTP failures
    async fn delete(&self, id: BookId) -> Result<(), CatalogError>;

    /// Creates a record and returns it as stored by the server.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Transport`] on network or HTTP failures.
    async fn create(&self, book: &Book) -> Result<Book, CatalogError>;

    /// Replaces a record and returns it as stored by the server.
    ///
    /// # Errors
    ///
    /// - Returns [`CatalogError::NotFound`] if the record does not exist
    /// - Returns [`CatalogError::Transport`] on network or HTTP failures
    async fn update(&self, book: &Book) -> Result<Book, CatalogError>;
}
