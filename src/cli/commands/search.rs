//! Search command handler

use crate::cli::display::print_snapshot;
use crate::config::Config;
use crate::domain::{SortField, SortOrder};
use crate::query::ViewState;

use super::{open_catalog, parse_filter};

pub struct SearchArgs {
    pub query: Vec<String>,
    pub page: u32,
    pub page_size: Option<u32>,
    pub sort: Option<SortField>,
    pub desc: bool,
    pub filters: Vec<String>,
}

pub async fn cmd_search(config: &Config, args: SearchArgs) -> anyhow::Result<()> {
    let (catalog, _notifier) = open_catalog(config)?;

    let order = if args.desc {
        SortOrder::Descending
    } else {
        config.catalog.default_sort_order
    };
    let mut state = ViewState::new(args.page_size.unwrap_or(config.catalog.default_page_size))
        .with_page(args.page)
        .with_search(args.query.join(" "))
        .with_sort(args.sort.unwrap_or(config.catalog.default_sort_field), order);

    for raw in &args.filters {
        let (field, value) = parse_filter(raw)?;
        state = state.with_filter(field, value);
    }

    let mut view = catalog.open_view_at(state)?;
    let snapshot = view.settled().await?;

    if snapshot.items.is_empty() && snapshot.page > 1 {
        println!("Page {} is past the last page.", snapshot.page);
        return Ok(());
    }

    print_snapshot(&snapshot);
    Ok(())
}
