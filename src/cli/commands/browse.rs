//! Interactive browse command handler

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use crate::cli::display::{print_book, print_events, print_snapshot};
use crate::config::Config;
use crate::domain::events::NotificationEvent;
use crate::domain::{BookId, SortField};
use crate::query::{CatalogError, CatalogView};

use super::open_catalog;

#[derive(Debug, PartialEq, Eq)]
enum BrowseCommand {
    Next,
    Previous,
    Page(u32),
    Size(u32),
    Sort(SortField),
    Filter(String, String),
    Search(String),
    Show(BookId),
    Delete(BookId),
    Reload,
    Help,
    Quit,
}

impl BrowseCommand {
    fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Err(String::new());
        };
        let rest: Vec<&str> = words.collect();

        let number = |what: &str| -> Result<u32, String> {
            rest.first()
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| format!("Usage: {command} <{what}>"))
        };
        let book_id = || -> Result<BookId, String> {
            rest.first()
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| format!("Usage: {command} <book id>"))
        };

        match command {
            "next" | "n" => Ok(Self::Next),
            "prev" | "p" => Ok(Self::Previous),
            "page" => number("page").map(Self::Page),
            "size" => number("page size").map(Self::Size),
            "sort" => rest
                .first()
                .ok_or_else(|| "Usage: sort <id|title|author>".to_string())?
                .parse()
                .map(Self::Sort),
            "filter" => {
                let (field, value) = rest
                    .split_first()
                    .ok_or_else(|| "Usage: filter <field> [value]".to_string())?;
                Ok(Self::Filter((*field).to_string(), value.join(" ")))
            }
            "search" | "s" => Ok(Self::Search(rest.join(" "))),
            "show" | "i" => book_id().map(Self::Show),
            "delete" | "rm" => book_id().map(Self::Delete),
            "reload" | "r" => Ok(Self::Reload),
            "help" | "?" => Ok(Self::Help),
            "quit" | "q" | "exit" => Ok(Self::Quit),
            other => Err(format!("Unknown command: {other}. Type 'help' for commands.")),
        }
    }
}

pub async fn cmd_browse(config: &Config) -> anyhow::Result<()> {
    let (catalog, notifier) = open_catalog(config)?;
    let mut events = notifier.subscribe();
    let mut view = catalog.open_view()?;

    render(&mut view).await;
    println!();
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match BrowseCommand::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                if !message.is_empty() {
                    println!("{message}");
                }
                continue;
            }
        };

        let transition: Result<(), CatalogError> = match command {
            BrowseCommand::Quit => break,
            BrowseCommand::Help => {
                print_help(view.allowed_page_sizes());
                continue;
            }
            BrowseCommand::Show(id) => {
                match catalog.book(id).await {
                    Ok(book) => print_book(&book),
                    Err(err) => println!("✗ {err}"),
                }
                continue;
            }
            BrowseCommand::Delete(id) => delete_in_view(&mut view, id, &mut events).await,
            BrowseCommand::Next => view.next_page().map(drop),
            BrowseCommand::Previous => view.previous_page().map(drop),
            BrowseCommand::Page(page) => view.set_page(page).map(drop),
            BrowseCommand::Size(size) => view.set_page_size(size).map(drop),
            BrowseCommand::Sort(field) => {
                view.set_sort(field);
                Ok(())
            }
            BrowseCommand::Filter(field, value) => view.set_filter(field, value).map(drop),
            BrowseCommand::Search(text) => {
                view.set_search(text);
                Ok(())
            }
            BrowseCommand::Reload => {
                view.reload();
                Ok(())
            }
        };

        if let Err(err) = transition {
            println!("✗ {err}");
            continue;
        }

        render(&mut view).await;
    }

    view.close();
    Ok(())
}

/// Deletes `id` and prints the resulting notifications. The view is refreshed
/// either way so the next render shows the restored or re-fetched page.
async fn delete_in_view(
    view: &mut CatalogView,
    id: BookId,
    events: &mut broadcast::Receiver<NotificationEvent>,
) -> Result<(), CatalogError> {
    let deleted = view.delete(id).await.map(drop);
    print_events(events);
    view.refresh();
    deleted
}

async fn render(view: &mut CatalogView) {
    let pending = view.snapshot();
    if pending.is_loading() && pending.is_placeholder {
        println!("Loading page {}...", pending.page);
    }

    // a failed fetch still renders: the snapshot carries the error and any older data
    let snapshot = match view.settled().await {
        Ok(snapshot) => snapshot,
        Err(_) => view.snapshot(),
    };
    println!();
    print_snapshot(&snapshot);
}

fn print_help(page_sizes: &[u32]) {
    let sizes: Vec<String> = page_sizes.iter().map(ToString::to_string).collect();
    println!("COMMANDS:");
    println!("  next, n               Next page");
    println!("  prev, p               Previous page");
    println!("  page <n>              Go to page n");
    println!("  size <n>              Page size ({})", sizes.join(", "));
    println!("  sort <field>          Sort by id, title or author (again to flip order)");
    println!("  filter <field> [val]  Filter a column; no value clears it");
    println!("  search [text]         Keyword search; no text clears it");
    println!("  show <id>             Show book details");
    println!("  delete <id>           Delete a book");
    println!("  reload, r             Re-fetch the current page");
    println!("  quit, q               Leave");
}
