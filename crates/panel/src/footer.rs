use std::fmt::Write as _;

use shared::contract::{ATTR_CANCEL, ATTR_DELETE, ATTR_ROW_ID, ATTR_SUBMIT};

use crate::markup::{escape, Markup, Renderable};

/// Standard footer button row: save, cancel and an optional delete.
#[derive(Debug, Clone)]
pub struct FooterActions {
    save_label: Option<String>,
    cancel_label: Option<String>,
    delete: Option<(u64, String)>,
}

impl Default for FooterActions {
    fn default() -> Self {
        Self {
            save_label: Some("Save".into()),
            cancel_label: Some("Cancel".into()),
            delete: None,
        }
    }
}

impl FooterActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_label(mut self, label: impl Into<String>) -> Self {
        self.save_label = Some(label.into());
        self
    }

    pub fn without_save(mut self) -> Self {
        self.save_label = None;
        self
    }

    pub fn cancel_label(mut self, label: impl Into<String>) -> Self {
        self.cancel_label = Some(label.into());
        self
    }

    /// Adds a delete button bound to `item_id`. Zero ids are ignored.
    pub fn with_delete(mut self, item_id: u64, label: impl Into<String>) -> Self {
        if item_id > 0 {
            self.delete = Some((item_id, label.into()));
        }
        self
    }
}

impl Renderable for FooterActions {
    fn render(&self) -> Markup {
        let mut out = String::from(r#"<div class="flyout-actions">"#);
        if let Some((item_id, label)) = &self.delete {
            let _ = write!(
                out,
                r#"<button type="button" class="button button-link-delete" {ATTR_DELETE} {ATTR_ROW_ID}="{item_id}">{}</button>"#,
                escape(label)
            );
        }
        if let Some(label) = &self.cancel_label {
            let _ = write!(
                out,
                r#"<button type="button" class="button" {ATTR_CANCEL}>{}</button>"#,
                escape(label)
            );
        }
        if let Some(label) = &self.save_label {
            let _ = write!(
                out,
                r#"<button type="submit" class="button button-primary" {ATTR_SUBMIT}>{}</button>"#,
                escape(label)
            );
        }
        out.push_str("</div>");
        Markup::new(out)
    }
}

impl From<FooterActions> for Markup {
    fn from(value: FooterActions) -> Self {
        value.render()
    }
}
