//! Server-side flyout panel model.
//!
//! A [`Panel`] is filled by host callbacks through its mutators and turned
//! into markup by [`Panel::render`]. Leaf widgets plug in through the
//! [`Renderable`] trait and are treated as opaque content.

mod content;
mod footer;
mod markup;
mod model;
mod render;

pub use content::ContentEntry;
pub use footer::FooterActions;
pub use markup::{escape, Markup, Renderable};
pub use model::{Panel, Tab, TabOptions, DEFAULT_CONTENT_KEY, DEFAULT_CAPABILITY};
pub use render::EMPTY_PLACEHOLDER;
