use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// Trusted markup fragment. Never escaped again when composed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Markup(String);

impl Markup {
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Markup {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Markup {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Anything that can produce a markup string. Leaf widgets live behind this.
pub trait Renderable: Send + Sync {
    fn render(&self) -> Markup;
}

impl Renderable for Markup {
    fn render(&self) -> Markup {
        self.clone()
    }
}

impl Renderable for String {
    fn render(&self) -> Markup {
        Markup(self.clone())
    }
}

impl<T: Renderable + ?Sized> Renderable for Arc<T> {
    fn render(&self) -> Markup {
        (**self).render()
    }
}

/// HTML-escapes text for element content and attribute values.
pub fn escape(text: &str) -> String {
    v_htmlescape::escape(text).to_string()
}
