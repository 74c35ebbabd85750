//! Client-side query/result synchronization engine.
//!
//! A [`CatalogView`] turns user interactions into [`QueryKey`]s through its
//! [`ViewStateMachine`], asks the [`FetchCoordinator`] for them and renders
//! whatever the shared [`ResultCache`] holds. Record mutations go through the
//! [`MutationHook`], which patches and invalidates cached pages.

pub mod cache;
pub mod coordinator;
pub mod error;
pub mod key;
pub mod mutation;
pub mod notifier;
pub mod state;
pub mod transport;
pub mod view;

pub use cache::{CacheEntry, CacheStatus, ResultCache};
pub use coordinator::{FetchCoordinator, FetchDisposition, Subscription};
pub use error::CatalogError;
pub use key::{QueryKey, build_key};
pub use mutation::{DeleteOutcome, MutationHook};
pub use notifier::{BroadcastNotifier, Notifier, TracingNotifier};
pub use state::{ViewState, ViewStateMachine};
pub use transport::CatalogTransport;
pub use view::{CatalogView, Snapshot};
