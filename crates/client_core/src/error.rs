use shared::domain::PanelId;
use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no panel registered with id '{0}'")]
    UnknownPanel(PanelId),
    #[error("panel '{0}' is not open")]
    NotOpen(PanelId),
    #[error("panel '{0}' does not wrap a form")]
    NotAForm(PanelId),
    #[error("delete for panel '{0}' carries no item id")]
    MissingItemId(PanelId),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
