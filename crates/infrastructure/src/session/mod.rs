//! Session lifecycle adapters.

mod watch_notifier;

pub use watch_notifier::{DEFAULT_ENTRY_ROUTE, WatchSessionNotifier};
