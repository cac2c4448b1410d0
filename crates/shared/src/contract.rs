//! Attribute and class names shared by the server-rendered markup and the
//! client runtime that drives it.

pub const ATTR_PANEL_ID: &str = "data-flyout-id";
pub const ATTR_TRIGGER: &str = "data-flyout-trigger";
pub const ATTR_ACTION: &str = "data-flyout-action";
pub const ATTR_CLOSE: &str = "data-flyout-close";
pub const ATTR_CANCEL: &str = "data-flyout-cancel";
pub const ATTR_SUBMIT: &str = "data-flyout-submit";
pub const ATTR_DELETE: &str = "data-flyout-delete";
pub const ATTR_TAB: &str = "data-tab";
pub const ATTR_TAB_CONTENT: &str = "data-tab-content";
/// Row identity in the list display. Also carried by delete triggers.
pub const ATTR_ROW_ID: &str = "data-id";
pub const ATTR_NOTICE: &str = "data-flyout-notice";

pub const CLASS_PANEL: &str = "flyout";
pub const CLASS_ACTIVE: &str = "active";
pub const CLASS_DISABLED: &str = "disabled";
pub const CLASS_OVERLAY: &str = "flyout-overlay";
pub const CLASS_BODY: &str = "flyout-body";
pub const CLASS_FORM: &str = "flyout-form";
pub const CLASS_NOTICE: &str = "flyout-notice";
pub const CLASS_NOTICES: &str = "flyout-notices";
pub const CLASS_FIELD_INVALID: &str = "flyout-field-invalid";
pub const CLASS_ROW_HIGHLIGHT: &str = "flyout-row-highlight";
pub const CLASS_ROW_DELETING: &str = "flyout-row-deleting";
pub const CLASS_ROW_FADING: &str = "flyout-row-fading";
pub const CLASS_EMPTY_ROW: &str = "flyout-empty-row";

/// Payload key under which a trigger's enclosing row id is sent.
pub const ROW_ID_FIELD: &str = "row_id";
