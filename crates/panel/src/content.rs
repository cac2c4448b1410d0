use std::{fmt, sync::Arc};

use crate::markup::{Markup, Renderable};

type Producer = Arc<dyn Fn() -> Markup + Send + Sync>;

/// One piece of panel body content, consumed during markup assembly.
#[derive(Clone)]
pub enum ContentEntry {
    Markup(Markup),
    Renderable(Arc<dyn Renderable>),
    Producer(Producer),
    /// Form controls. Adding one marks the panel as a form.
    Fields(Markup),
}

impl ContentEntry {
    pub fn markup(markup: impl Into<Markup>) -> Self {
        Self::Markup(markup.into())
    }

    pub fn renderable(widget: impl Renderable + 'static) -> Self {
        Self::Renderable(Arc::new(widget))
    }

    pub fn producer(produce: impl Fn() -> Markup + Send + Sync + 'static) -> Self {
        Self::Producer(Arc::new(produce))
    }

    pub fn fields(markup: impl Into<Markup>) -> Self {
        Self::Fields(markup.into())
    }

    pub fn is_form_fields(&self) -> bool {
        matches!(self, Self::Fields(_))
    }

    pub fn render(&self) -> Markup {
        match self {
            Self::Markup(markup) | Self::Fields(markup) => markup.clone(),
            Self::Renderable(widget) => widget.render(),
            Self::Producer(produce) => produce(),
        }
    }
}

impl fmt::Debug for ContentEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Markup(markup) => f.debug_tuple("Markup").field(markup).finish(),
            Self::Renderable(_) => f.write_str("Renderable(..)"),
            Self::Producer(_) => f.write_str("Producer(..)"),
            Self::Fields(markup) => f.debug_tuple("Fields").field(markup).finish(),
        }
    }
}

impl From<Markup> for ContentEntry {
    fn from(value: Markup) -> Self {
        Self::Markup(value)
    }
}

impl From<&str> for ContentEntry {
    fn from(value: &str) -> Self {
        Self::Markup(value.into())
    }
}

impl From<String> for ContentEntry {
    fn from(value: String) -> Self {
        Self::Markup(value.into())
    }
}
