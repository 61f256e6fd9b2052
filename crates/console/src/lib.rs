//! Console side of the stockroom: API client, change feed and the
//! reconciler that merges optimistic edits with server state.

pub use api::ApiClient;
pub use error::{ApiError, ConsoleError};
pub use feed::{FeedItem, spawn_event_feed};
pub use reconciler::{
    Notice, NoticeLevel, OpId, Overlay, PendingOp, Reconciler, Snapshot, StateSource, View,
};
pub use settings::ConsoleSettings;

mod api;
mod error;
pub mod feed;
mod reconciler;
pub mod settings;
