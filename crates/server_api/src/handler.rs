use async_trait::async_trait;
use panel::{Markup, Panel};
use shared::{
    domain::ItemId,
    error::DomainError,
    protocol::{Payload, RequestEnvelope},
};

/// Host-side behaviour bound to one registered panel.
///
/// `on_load` fills a freshly cleared panel. `on_save` and `on_delete` persist
/// through the host and report business-rule rejections as [`DomainError`].
#[async_trait]
pub trait PanelHandler: Send + Sync {
    async fn on_load(&self, panel: &mut Panel, request: &RequestEnvelope)
        -> Result<(), DomainError>;

    async fn on_save(&self, _data: &Payload) -> Result<ItemId, DomainError> {
        Err(DomainError::new("Saving is not supported for this panel"))
    }

    async fn on_delete(&self, _id: ItemId) -> Result<(), DomainError> {
        Err(DomainError::new("Deleting is not supported for this panel"))
    }

    /// Fresh list-row markup for a saved item, if the host renders one.
    async fn row_markup(&self, _id: ItemId) -> Option<Markup> {
        None
    }
}
