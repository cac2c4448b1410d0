//! Remote-action surface for flyout panels.
//!
//! Hosts register [`Panel`](panel::Panel)s together with a [`PanelHandler`]
//! in a [`PanelRegistry`]. The [`Dispatcher`] resolves incoming action names,
//! runs the token and capability gate, and shapes every outcome into a
//! [`ResponseEnvelope`](shared::protocol::ResponseEnvelope).

mod dispatcher;
mod handler;
mod registry;
mod security;

pub use dispatcher::{Dispatcher, DELETED_MESSAGE, SAVED_MESSAGE};
pub use handler::PanelHandler;
pub use registry::{PanelRegistry, RegisteredPanel};
pub use security::{Caller, TokenIssuer};
