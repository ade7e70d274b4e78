pub mod counter;
pub mod fanout;
pub mod hub;
pub mod reconciler;

pub use counter::UnreadCounter;
pub use fanout::{FanoutNotifier, HubEvent};
pub use hub::ConnectionHub;
pub use reconciler::ReadStateReconciler;
