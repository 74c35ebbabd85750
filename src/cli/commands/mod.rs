mod browse;
mod delete;
mod search;
mod show;

pub use browse::cmd_browse;
pub use delete::cmd_delete;
pub use search::{SearchArgs, cmd_search};
pub use show::cmd_show;

use std::sync::Arc;

use crate::clients::CatalogClient;
use crate::config::Config;
use crate::query::BroadcastNotifier;
use crate::services::CatalogService;

/// Builds the catalog service against the configured API, with notifications
/// published on a bus the command can print from.
fn open_catalog(config: &Config) -> anyhow::Result<(CatalogService, BroadcastNotifier)> {
    let client = CatalogClient::new(&config.api)?;
    let notifier = BroadcastNotifier::with_capacity(config.notifications.event_bus_buffer_size);
    let service = CatalogService::new(config, Arc::new(client), Arc::new(notifier.clone()));
    Ok((service, notifier))
}

/// Splits a `FIELD=VALUE` filter argument.
fn parse_filter(raw: &str) -> anyhow::Result<(String, String)> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Invalid filter '{raw}', expected FIELD=VALUE"))?;
    Ok((field.trim().to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_argument_is_split_on_first_equals() {
        assert_eq!(
            parse_filter("category=Sci=Fi").unwrap(),
            ("category".to_string(), "Sci=Fi".to_string())
        );
        assert_eq!(
            parse_filter(" language = English ").unwrap(),
            ("language".to_string(), "English".to_string())
        );
        assert!(parse_filter("language").is_err());
    }
}
