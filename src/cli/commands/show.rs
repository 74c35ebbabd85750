//! Book detail command handler

use crate::cli::display::print_book;
use crate::config::Config;
use crate::domain::BookId;

use super::open_catalog;

pub async fn cmd_show(config: &Config, id_str: &str) -> anyhow::Result<()> {
    let Ok(id) = id_str.parse::<BookId>() else {
        println!("Invalid book ID: {id_str}");
        println!("Use 'libris search' to see book IDs.");
        return Ok(());
    };

    let (catalog, _notifier) = open_catalog(config)?;

    match catalog.book(id).await {
        Ok(book) => print_book(&book),
        Err(err) if err.is_not_found() => println!("Book with ID {id} not found."),
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
