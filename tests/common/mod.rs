//! In-memory catalog fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use libris::config::Config;
use libris::domain::events::NotificationEvent;
use libris::domain::{BookId, SortField, SortOrder};
use libris::models::book::{Book, BookPage};
use libris::query::{CatalogError, CatalogTransport, Notifier, QueryKey};
use libris::services::CatalogService;
use tokio::sync::{Notify, oneshot};

pub fn book(id: i64, title: &str, author: &str, language: &str) -> Book {
    Book {
        id: BookId::new(id),
        isbn: format!("978-0-00-00000{id}"),
        title: title.to_string(),
        author: author.to_string(),
        publisher: None,
        description: None,
        language: Some(language.to_string()),
        location: Some(format!("Shelf {}", (id - 1) / 3 + 1)),
        category: None,
    }
}

/// Nine books, ids 1..=9, titles deliberately out of id order.
pub fn library() -> Vec<Book> {
    vec![
        book(1, "Kindred", "Octavia Butler", "English"),
        book(2, "Dune", "Frank Herbert", "English"),
        book(3, "Solaris", "Stanislaw Lem", "Polish"),
        book(4, "Neuromancer", "William Gibson", "English"),
        book(5, "Hyperion", "Dan Simmons", "English"),
        book(6, "Aniara", "Harry Martinson", "Swedish"),
        book(7, "Foundation", "Isaac Asimov", "English"),
        book(8, "Roadside Picnic", "Arkady Strugatsky", "Russian"),
        book(9, "Babel-17", "Samuel Delany", "English"),
    ]
}

pub fn ids(items: &[Book]) -> Vec<i64> {
    items.iter().map(|book| book.id.value()).collect()
}

/// Answers immediately from an in-memory list and records every search.
pub struct FakeCatalog {
    books: Mutex<Vec<Book>>,
    searches: Mutex<Vec<QueryKey>>,
    fail_searches: AtomicBool,
    delete_error: Mutex<Option<CatalogError>>,
    gets: AtomicUsize,
}

impl FakeCatalog {
    pub fn new(books: Vec<Book>) -> Arc<Self> {
        Arc::new(Self {
            books: Mutex::new(books),
            searches: Mutex::new(Vec::new()),
            fail_searches: AtomicBool::new(false),
            delete_error: Mutex::new(None),
            gets: AtomicUsize::new(0),
        })
    }

    pub fn search_count(&self) -> usize {
        self.searches.lock().unwrap().len()
    }

    pub fn searched(&self) -> Vec<QueryKey> {
        self.searches.lock().unwrap().clone()
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn fail_searches(&self, fail: bool) {
        self.fail_searches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes_with(&self, err: CatalogError) {
        *self.delete_error.lock().unwrap() = Some(err);
    }
}

pub fn run_search(books: &[Book], key: &QueryKey) -> BookPage {
    let keyword = key.search_text().to_lowercase();
    let mut matching: Vec<Book> = books
        .iter()
        .filter(|book| {
            keyword.is_empty()
                || book.title.to_lowercase().contains(&keyword)
                || book.author.to_lowercase().contains(&keyword)
        })
        .filter(|book| {
            key.filters().iter().all(|(field, value)| match field.as_str() {
                "language" => book.language.as_deref() == Some(value.as_str()),
                "category" => book.category.as_deref() == Some(value.as_str()),
                _ => true,
            })
        })
        .cloned()
        .collect();

    matching.sort_by(|a, b| match key.sort_field() {
        SortField::Id => a.id.cmp(&b.id),
        SortField::Title => a.title.cmp(&b.title),
        SortField::Author => a.author.cmp(&b.author),
    });
    if key.sort_order() == SortOrder::Descending {
        matching.reverse();
    }

    let total = matching.len() as u64;
    let skip = ((key.page() - 1) * key.page_size()) as usize;
    let items = matching
        .into_iter()
        .skip(skip)
        .take(key.page_size() as usize)
        .collect();
    BookPage::new(items, total)
}

#[async_trait::async_trait]
impl CatalogTransport for FakeCatalog {
    async fn search(&self, key: &QueryKey) -> Result<BookPage, CatalogError> {
        self.searches.lock().unwrap().push(key.clone());
        if self.fail_searches.load(Ordering::SeqCst) {
            return Err(CatalogError::transport(Some(503), "Service Unavailable"));
        }
        Ok(run_search(&self.books.lock().unwrap(), key))
    }

    async fn get(&self, id: BookId) -> Result<Book, CatalogError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.books
            .lock()
            .unwrap()
            .iter()
            .find(|book| book.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found("Book", id))
    }

    async fn delete(&self, id: BookId) -> Result<(), CatalogError> {
        if let Some(err) = self.delete_error.lock().unwrap().clone() {
            return Err(err);
        }
        let mut books = self.books.lock().unwrap();
        let index = books
            .iter()
            .position(|book| book.id == id)
            .ok_or_else(|| CatalogError::not_found("Book", id))?;
        books.remove(index);
        Ok(())
    }

    async fn create(&self, book: &Book) -> Result<Book, CatalogError> {
        let mut books = self.books.lock().unwrap();
        let mut created = book.clone();
        created.id = BookId::new(books.iter().map(|b| b.id.value()).max().unwrap_or(0) + 1);
        books.push(created.clone());
        Ok(created)
    }

    async fn update(&self, book: &Book) -> Result<Book, CatalogError> {
        let mut books = self.books.lock().unwrap();
        let existing = books
            .iter_mut()
            .find(|b| b.id == book.id)
            .ok_or_else(|| CatalogError::not_found("Book", book.id))?;
        *existing = book.clone();
        Ok(book.clone())
    }
}

type SearchReply = oneshot::Sender<Result<BookPage, CatalogError>>;
type DeleteReply = oneshot::Sender<Result<(), CatalogError>>;

/// Holds every request until the test releases it, in whatever order it likes.
#[derive(Default)]
pub struct GatedTransport {
    searches: Mutex<VecDeque<(QueryKey, SearchReply)>>,
    deletes: Mutex<VecDeque<(BookId, DeleteReply)>>,
    arrived: Notify,
    completed: AtomicUsize,
}

impl GatedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Waits for the next search request to arrive and returns its gate.
    pub async fn next_search(&self) -> (QueryKey, SearchReply) {
        loop {
            if let Some(gate) = self.searches.lock().unwrap().pop_front() {
                return gate;
            }
            self.arrived.notified().await;
        }
    }

    pub async fn next_delete(&self) -> (BookId, DeleteReply) {
        loop {
            if let Some(gate) = self.deletes.lock().unwrap().pop_front() {
                return gate;
            }
            self.arrived.notified().await;
        }
    }

    /// Waits until `count` search responses have been handed back to the caller.
    ///
    /// The coordinator applies a response in the same poll that receives it, so
    /// once this returns those responses have reached the cache.
    pub async fn wait_completed(&self, count: usize) {
        while self.completed.load(Ordering::SeqCst) < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait::async_trait]
impl CatalogTransport for GatedTransport {
    async fn search(&self, key: &QueryKey) -> Result<BookPage, CatalogError> {
        let (tx, rx) = oneshot::channel();
        self.searches.lock().unwrap().push_back((key.clone(), tx));
        self.arrived.notify_one();

        let result = rx
            .await
            .unwrap_or_else(|_| Err(CatalogError::transport(None, "gate dropped")));
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn get(&self, id: BookId) -> Result<Book, CatalogError> {
        Err(CatalogError::not_found("Book", id))
    }

    async fn delete(&self, id: BookId) -> Result<(), CatalogError> {
        let (tx, rx) = oneshot::channel();
        self.deletes.lock().unwrap().push_back((id, tx));
        self.arrived.notify_one();

        rx.await
            .unwrap_or_else(|_| Err(CatalogError::transport(None, "gate dropped")))
    }

    async fn create(&self, book: &Book) -> Result<Book, CatalogError> {
        Ok(book.clone())
    }

    async fn update(&self, book: &Book) -> Result<Book, CatalogError> {
        Ok(book.clone())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: NotificationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn service(transport: Arc<dyn CatalogTransport>) -> (CatalogService, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let service = CatalogService::new(&Config::default(), transport, notifier.clone());
    (service, notifier)
}
