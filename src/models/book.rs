use serde::{Deserialize, Serialize};

use crate::domain::BookId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,

    #[serde(default)]
    pub isbn: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub author: String,

    pub publisher: Option<String>,

    pub description: Option<String>,

    pub language: Option<String>,

    pub location: Option<String>,

    pub category: Option<String>,
}

/// One page of search results as the server reported it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookPage {
    pub items: Vec<Book>,

    pub total_count: u64,
}

impl BookPage {
    #[must_use]
    pub const fn new(items: Vec<Book>, total_count: u64) -> Self {
        Self { items, total_count }
    }

    #[must_use]
    pub fn position_of(&self, id: BookId) -> Option<usize> {
        self.items.iter().position(|book| book.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: BookId) -> bool {
        self.position_of(id).is_some()
    }

    #[must_use]
    pub fn find(&self, id: BookId) -> Option<&Book> {
        self.items.iter().find(|book| book.id == id)
    }

    /// `ceil(total_count / page_size)`, zero when nothing matched.
    #[must_use]
    pub fn page_count(&self, page_size: u32) -> u32 {
        page_count(self.total_count, page_size)
    }
}

#[must_use]
pub fn page_count(total_count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_count.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Envelope returned by `GET /Book/search`.
///
/// The listing pages of the web client disagree on the name of the count
/// field, so both `totalCount` and `total` are accepted.
#[derive(Debug, Deserialize)]
pub struct SearchEnvelope {
    #[serde(default)]
    pub data: Vec<Book>,

    #[serde(rename = "totalCount", alias = "total", default)]
    pub total_count: Option<u64>,
}

impl From<SearchEnvelope> for BookPage {
    fn from(envelope: SearchEnvelope) -> Self {
        let total_count = envelope
            .total_count
            .unwrap_or(envelope.data.len() as u64);
        Self::new(envelope.data, total_count)
    }
}
