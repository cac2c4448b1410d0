use std::fmt::Write as _;

use shared::contract::{
    ATTR_CLOSE, ATTR_PANEL_ID, ATTR_TAB, ATTR_TAB_CONTENT, CLASS_ACTIVE, CLASS_BODY,
    CLASS_DISABLED, CLASS_FORM, CLASS_PANEL,
};

use crate::{
    content::ContentEntry,
    markup::{escape, Markup},
    model::{Panel, Tab, DEFAULT_CONTENT_KEY},
};

/// Rendered in place of a body block that has no entries.
pub const EMPTY_PLACEHOLDER: &str = r#"<div class="flyout-empty">No content available.</div>"#;

impl Panel {
    /// Assembles the full flyout markup. Pure with respect to panel state.
    pub fn render(&self) -> Markup {
        let id = escape(self.id.as_str());
        let mut out = String::new();

        let mut classes = vec![
            CLASS_PANEL.to_string(),
            format!("{CLASS_PANEL}-{}", self.width.as_str()),
        ];
        classes.extend(self.classes.iter().map(|class| escape(class)));
        let _ = write!(
            out,
            r#"<div class="{}" id="flyout-{id}" {ATTR_PANEL_ID}="{id}" role="dialog" aria-modal="true" aria-labelledby="flyout-{id}-title">"#,
            classes.join(" ")
        );

        self.render_header(&id, &mut out);
        if self.tabs_enabled && !self.tabs.is_empty() {
            self.render_tab_nav(&mut out);
        }

        let is_form = self.is_form();
        if is_form {
            let _ = write!(out, r#"<form class="{CLASS_FORM}" novalidate>"#);
        }
        self.render_body(&mut out);
        if let Some(footer) = &self.footer {
            let _ = write!(out, r#"<div class="flyout-footer">{footer}</div>"#);
        }
        if is_form {
            out.push_str("</form>");
        }

        out.push_str("</div>");
        Markup::new(out)
    }

    fn render_header(&self, id: &str, out: &mut String) {
        let _ = write!(
            out,
            r#"<div class="flyout-header"><h2 class="flyout-title" id="flyout-{id}-title">{}</h2><button type="button" class="flyout-close" {ATTR_CLOSE} aria-label="Close">&times;</button></div>"#,
            escape(&self.title)
        );
    }

    fn render_tab_nav(&self, out: &mut String) {
        out.push_str(r#"<nav class="flyout-tabs" role="tablist">"#);
        for tab in &self.tabs {
            self.render_tab_button(tab, out);
        }
        out.push_str("</nav>");
    }

    fn render_tab_button(&self, tab: &Tab, out: &mut String) {
        let active = self.active_tab.as_deref() == Some(tab.id.as_str());
        let mut class = String::from("flyout-tab");
        if active {
            let _ = write!(class, " {CLASS_ACTIVE}");
        }
        if tab.options.disabled {
            let _ = write!(class, " {CLASS_DISABLED}");
        }
        let _ = write!(
            out,
            r#"<button type="button" class="{class}" role="tab" {ATTR_TAB}="{}" aria-selected="{active}""#,
            escape(&tab.id)
        );
        if tab.options.disabled {
            out.push_str(r#" disabled aria-disabled="true""#);
        }
        out.push('>');
        if let Some(icon) = &tab.options.icon {
            let _ = write!(out, r#"<span class="dashicons {}"></span>"#, escape(icon));
        }
        out.push_str(&escape(&tab.label));
        if let Some(badge) = &tab.options.badge {
            let _ = write!(out, r#"<span class="flyout-tab-badge">{}</span>"#, escape(badge));
        }
        out.push_str("</button>");
    }

    fn render_body(&self, out: &mut String) {
        let _ = write!(out, r#"<div class="{CLASS_BODY}">"#);
        if self.tabs.is_empty() {
            out.push_str(r#"<div class="flyout-content">"#);
            render_entries(self.content.get(DEFAULT_CONTENT_KEY), out);
            out.push_str("</div>");
        } else {
            for tab in &self.tabs {
                let mut class = String::from("flyout-tab-content");
                if self.active_tab.as_deref() == Some(tab.id.as_str()) {
                    let _ = write!(class, " {CLASS_ACTIVE}");
                }
                let _ = write!(
                    out,
                    r#"<div class="{class}" {ATTR_TAB_CONTENT}="{}" role="tabpanel">"#,
                    escape(&tab.id)
                );
                render_entries(self.content.get(&tab.id), out);
                out.push_str("</div>");
            }
        }
        out.push_str("</div>");
    }
}

fn render_entries(entries: Option<&Vec<ContentEntry>>, out: &mut String) {
    let rendered: Vec<Markup> = entries
        .into_iter()
        .flatten()
        .map(ContentEntry::render)
        .filter(|markup| !markup.is_empty())
        .collect();
    if rendered.is_empty() {
        out.push_str(EMPTY_PLACEHOLDER);
        return;
    }
    for markup in rendered {
        out.push_str(markup.as_str());
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
