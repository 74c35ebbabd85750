//! Terminal rendering shared by the commands.

use tokio::sync::broadcast;

use crate::domain::events::NotificationEvent;
use crate::models::book::Book;
use crate::query::{CacheStatus, Snapshot};

pub fn print_snapshot(snapshot: &Snapshot) {
    let pages = snapshot
        .page_count
        .map_or_else(|| "?".to_string(), |count| count.max(1).to_string());

    println!(
        "Page {}/{} ({} per page, {} total)",
        snapshot.page, pages, snapshot.page_size, snapshot.total_count
    );
    println!("{:-<78}", "");

    if snapshot.items.is_empty() {
        match snapshot.status {
            CacheStatus::Pending => println!("Loading..."),
            CacheStatus::Success | CacheStatus::Error => println!("No books found."),
        }
    }

    for book in &snapshot.items {
        println!(
            "{:>5}  {:<38} {:<22} {}",
            book.id,
            truncate(&book.title, 38),
            truncate(&book.author, 22),
            book.isbn
        );
    }

    if snapshot.is_placeholder {
        println!();
        println!("(showing previous results while loading)");
    }

    if let Some(error) = &snapshot.error {
        println!();
        println!("✗ {error}");
    }
}

pub fn print_book(book: &Book) {
    println!("{}", book.title);
    println!("{:-<60}", "");
    println!("  ID:          {}", book.id);
    println!("  Author:      {}", book.author);
    println!("  ISBN:        {}", book.isbn);

    let optional = [
        ("Publisher", &book.publisher),
        ("Language", &book.language),
        ("Category", &book.category),
        ("Location", &book.location),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            println!("  {:<12} {value}", format!("{label}:"));
        }
    }

    if let Some(description) = &book.description {
        println!();
        println!("{description}");
    }
}

/// Prints every notification published since the last call.
pub fn print_events(events: &mut broadcast::Receiver<NotificationEvent>) {
    while let Ok(event) = events.try_recv() {
        let marker = if event.is_error() { "✗" } else { "✓" };
        println!("{marker} {}", event.message());
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}
