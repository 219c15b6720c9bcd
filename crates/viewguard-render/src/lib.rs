//! # Viewguard Render - Guarded View Rendering
//!
//! `viewguard-render` renders content beans through named views with
//! MiniJinja. Views can include other views with `include_view(...)`; every
//! render and include runs through a [`viewguard::RecursionGuard`] scoped to
//! the current request, so a template that includes itself, directly or
//! through other views, produces a short recursion error at that spot
//! instead of recursing forever.
//!
//! ## Core Concepts
//!
//! - [`ViewRenderer`]: templates plus a bean source; renders `(bean, view)` pairs
//! - [`Request`]: per-request handle owning the render chain
//! - [`Bean`] / [`BeanSource`]: the content model the renderer reads from
//! - [`Channel`]: where output goes (bytes, characters or markup events)
//! - [`RendererConfig`]: template directory and recursion error display
//!
//! ## Quick Start
//!
//! ```rust
//! use viewguard_render::{Bean, MemoryBeans, ViewRenderer};
//!
//! let article = Bean::new("Article#1", "article")
//!     .with_field("title", "Hello")
//!     .with_field("related", serde_json::json!(["Article#1"]));
//! let beans = MemoryBeans::new().with(article);
//!
//! let mut renderer = ViewRenderer::new(beans);
//! renderer.add_view("article", "full", concat!(
//!     "{{ bean.title }}:",
//!     "{% for id in bean.related %} {{ include_view(id, 'teaser') }}{% endfor %}",
//! )).unwrap();
//! renderer.add_view("article", "teaser", "<{{ bean.title }}>").unwrap();
//!
//! let request = renderer.request();
//! let page = renderer.render_to_string(&request, "Article#1", "full").unwrap();
//! assert_eq!(page, "Hello: <Hello>");
//! ```
//!
//! ## Error Display
//!
//! With the default [`ErrorDisplay::Verbose`], a recursive include renders
//! the template named by [`RendererConfig::error_view`] if there is one, and
//! the plain recursion message otherwise. [`ErrorDisplay::Hidden`] renders
//! nothing in its place.

mod bean;
mod channel;
mod config;
mod error;
mod renderer;

pub use bean::{Bean, BeanId, BeanSource, MemoryBeans};
pub use channel::{Channel, MarkupChannel, ResponseChannel, TextChannel, RECURSION_ELEMENT};
pub use config::{ErrorDisplay, RendererConfig, DEFAULT_ERROR_VIEW};
pub use error::RenderError;
pub use renderer::{template_name, Request, ViewRenderer, TEMPLATE_EXTENSION};

pub use viewguard::{RecursionDetected, Rendered};
