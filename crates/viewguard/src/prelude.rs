//! Convenient imports for code that wraps renderers.
//!
//! ```rust
//! use viewguard::prelude::*;
//!
//! let scope: RequestScope<u32> = RequestScope::new();
//! let guard = RecursionGuard::new(&scope);
//! assert_eq!(guard.enter(&BeanView::new(1, "full")), Admission::Proceed);
//! ```

pub use crate::chain::RenderChain;
pub use crate::guard::{Admission, RecursionDetected, RecursionGuard, Rendered};
pub use crate::key::{BeanView, ByRef};
pub use crate::store::{ChainStore, RequestScope, SharedRequestScope};
