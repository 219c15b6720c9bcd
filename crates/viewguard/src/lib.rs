//! # Viewguard - Recursion Guard for Nested View Rendering
//!
//! `viewguard` stops template logic from rendering the same bean with the same
//! view inside itself. While a request is being rendered, every active
//! (bean, view) frame is recorded on a per-request [`RenderChain`]. When a
//! nested include asks for a pair that is already on the chain, that one
//! include is replaced by a recursion error and the rest of the page renders
//! normally.
//!
//! ## Core Concepts
//!
//! - [`BeanView`]: identity of one render frame, compared by value
//! - [`RenderChain`]: the active frames of one request, in call order
//! - [`ChainStore`]: get-or-create access to a request's chain
//! - [`RecursionGuard`]: wraps a render delegate with the detect/record/clear protocol
//! - [`RecursionDetected`]: the only condition the guard raises itself
//!
//! ## Quick Start
//!
//! ```rust
//! use viewguard::{RecursionGuard, RequestScope};
//!
//! // One scope per request, passed down to every nested render.
//! let scope = RequestScope::new();
//! let guard = RecursionGuard::new(&scope);
//!
//! let mut page = String::new();
//! let rendered = guard.wrap(
//!     "Article#1",
//!     "full",
//!     || {
//!         page.push_str("<article>");
//!         Ok::<_, std::fmt::Error>(())
//!     },
//!     |err| {
//!         eprintln!("{}", err);
//!         Ok::<_, std::fmt::Error>(())
//!     },
//! );
//!
//! assert!(rendered.is_ok());
//! assert_eq!(page, "<article>");
//! ```
//!
//! ## Scope
//!
//! Detection is per request and per exact pair. Different view names for the
//! same bean, or the same view name on different beans, are never confused,
//! and nothing is tracked across requests.

pub mod chain;
pub mod guard;
pub mod key;
pub mod prelude;
pub mod store;

pub use chain::RenderChain;
pub use guard::{Admission, RecursionDetected, RecursionGuard, Rendered};
pub use key::{BeanView, ByRef};
pub use store::{
    AttributeStore, Attributes, ChainHandle, ChainStore, RequestAttributes, RequestScope,
    SharedRequestScope, CHAIN_ATTRIBUTE,
};
