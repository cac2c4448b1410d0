//! Headless client runtime for server-rendered flyout panels.

pub mod dom;
pub mod error;
pub mod events;
pub mod form;
pub mod manager;
pub mod table_sync;
pub mod timings;
pub mod transport;
pub mod trigger;

pub use dom::{Document, NodeId, SharedDocument};
pub use error::ClientError;
pub use events::PanelEvent;
pub use manager::{ActionOutcome, NoticeKind, PanelManager, PanelPhase, REQUIRED_FIELDS_MESSAGE};
pub use table_sync::{TableSync, TableSyncConfig};
pub use timings::Timings;
pub use transport::{HttpTransport, Transport, TransportError};
pub use trigger::{TriggerAction, TriggerCommand};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
