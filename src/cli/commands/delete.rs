//! Delete command handler

use crate::cli::display::print_events;
use crate::config::Config;
use crate::domain::BookId;

use super::open_catalog;

pub async fn cmd_delete(config: &Config, id_str: &str, yes: bool) -> anyhow::Result<()> {
    let Ok(id) = id_str.parse::<BookId>() else {
        println!("Invalid book ID: {id_str}");
        println!("Use 'libris search' to see book IDs.");
        return Ok(());
    };

    let (catalog, notifier) = open_catalog(config)?;
    let mut events = notifier.subscribe();

    let book = match catalog.book(id).await {
        Ok(book) => book,
        Err(err) if err.is_not_found() => {
            println!("Book with ID {id} not found.");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    if !yes {
        println!("Delete '{}' (ID: {})?", book.title, book.id);
        println!("Enter 'y' to confirm, anything else to cancel:");

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    catalog.delete_book(id).await?;
    print_events(&mut events);

    Ok(())
}
