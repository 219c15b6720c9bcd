//! Where a request keeps its render chain.
//!
//! Each request owns exactly one [`RenderChain`]. The [`ChainStore`] trait
//! gives the guard get-or-create access to it; the chain is created on first
//! access and the same instance serves every nested render for the rest of
//! the request.
//!
//! ## Implementations
//!
//! | Store | Use When |
//! |-------|----------|
//! | [`RequestScope`] | The host threads a per-request value through rendering |
//! | [`SharedRequestScope`] | The same, but rendering of one request may fan out to threads |
//! | [`AttributeStore`] | The host only offers a string-keyed request attribute bag |
//!
//! ## Scoping
//!
//! Stores are request-scoped values, not globals. Two requests never share a
//! store, so no cross-request locking is involved:
//!
//! ```rust
//! use viewguard::{BeanView, ChainStore, RequestScope};
//!
//! let first = RequestScope::new();
//! let second: RequestScope<i32> = RequestScope::new();
//!
//! first.with_chain(|chain| chain.push(BeanView::new(1, "full")));
//! assert_eq!(first.with_chain(|chain| chain.len()), 1);
//! assert_eq!(second.with_chain(|chain| chain.len()), 0);
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::{Mutex, PoisonError};

use once_cell::{sync, unsync};
use tracing::{trace, warn};

use crate::chain::RenderChain;

/// Reserved attribute name under which [`AttributeStore`] keeps the chain.
pub const CHAIN_ATTRIBUTE: &str = "viewstack";

/// Get-or-create access to the render chain of one request.
///
/// Implementations must hand out the same chain on every call for the
/// lifetime of the request and must never silently start a second chain.
///
/// `f` must not call back into the same store; the guard only runs short,
/// non-reentrant chain operations inside it.
pub trait ChainStore<B> {
    /// Runs `f` against this request's chain, creating the chain on first use.
    fn with_chain<R>(&self, f: impl FnOnce(&mut RenderChain<B>) -> R) -> R;
}

/// Explicit per-request chain holder for single-threaded rendering.
///
/// Create one at the start of a request and pass it by reference to every
/// render call of that request.
pub struct RequestScope<B> {
    chain: unsync::OnceCell<RefCell<RenderChain<B>>>,
}

impl<B> RequestScope<B> {
    pub fn new() -> Self {
        Self {
            chain: unsync::OnceCell::new(),
        }
    }

    /// Whether any render call has touched this request yet.
    pub fn is_started(&self) -> bool {
        self.chain.get().is_some()
    }

    /// Consumes the scope, returning the chain as it stands.
    pub fn into_chain(self) -> RenderChain<B> {
        self.chain
            .into_inner()
            .map(RefCell::into_inner)
            .unwrap_or_default()
    }
}

impl<B> ChainStore<B> for RequestScope<B> {
    fn with_chain<R>(&self, f: impl FnOnce(&mut RenderChain<B>) -> R) -> R {
        let cell = self.chain.get_or_init(|| {
            trace!("render chain created");
            RefCell::new(RenderChain::new())
        });
        let mut chain = cell.borrow_mut();
        f(&mut *chain)
    }
}

impl<B> Default for RequestScope<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: fmt::Debug> fmt::Debug for RequestScope<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("chain", &self.chain.get())
            .finish()
    }
}

/// Thread-safe per-request chain holder.
///
/// For hosts that render parts of a single request on several threads. The
/// mutex makes each chain operation, including the guard's contains-then-push,
/// one atomic step.
pub struct SharedRequestScope<B> {
    chain: sync::OnceCell<Mutex<RenderChain<B>>>,
}

impl<B> SharedRequestScope<B> {
    pub fn new() -> Self {
        Self {
            chain: sync::OnceCell::new(),
        }
    }

    /// Whether any render call has touched this request yet.
    pub fn is_started(&self) -> bool {
        self.chain.get().is_some()
    }

    /// Consumes the scope, returning the chain as it stands.
    pub fn into_chain(self) -> RenderChain<B> {
        self.chain
            .into_inner()
            .map(|lock| lock.into_inner().unwrap_or_else(PoisonError::into_inner))
            .unwrap_or_default()
    }
}

impl<B> ChainStore<B> for SharedRequestScope<B> {
    fn with_chain<R>(&self, f: impl FnOnce(&mut RenderChain<B>) -> R) -> R {
        let lock = self.chain.get_or_init(|| {
            trace!("render chain created");
            Mutex::new(RenderChain::new())
        });
        // A panicking render on another thread leaves the frames it pushed;
        // the chain itself stays consistent.
        let mut chain = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *chain)
    }
}

impl<B> Default for SharedRequestScope<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: fmt::Debug> fmt::Debug for SharedRequestScope<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRequestScope")
            .field("chain", &self.chain.get())
            .finish()
    }
}

/// A host request object that can carry arbitrary attributes.
///
/// Attributes live exactly as long as the request they are attached to.
pub trait Attributes {
    /// Returns the attribute stored under `name`.
    fn attribute(&self, name: &str) -> Option<Rc<dyn Any>>;

    /// Stores `value` under `name`, replacing any previous value.
    fn set_attribute(&self, name: &str, value: Rc<dyn Any>);
}

/// Shared handle to a chain kept in an attribute bag.
pub type ChainHandle<B> = Rc<RefCell<RenderChain<B>>>;

/// [`ChainStore`] adapter over a host attribute bag.
///
/// The chain is kept under [`CHAIN_ATTRIBUTE`].
///
/// ```rust
/// use viewguard::{AttributeStore, BeanView, ChainStore, RequestAttributes};
///
/// let request = RequestAttributes::new();
/// let store = AttributeStore::new(&request);
///
/// store.with_chain(|chain| chain.push(BeanView::new("Article#1", "full")));
///
/// // A second adapter over the same request sees the same chain.
/// let again = AttributeStore::new(&request);
/// assert_eq!(again.with_chain(|chain: &mut viewguard::RenderChain<&'static str>| chain.len()), 1);
/// ```
pub struct AttributeStore<'a, A: ?Sized> {
    attrs: &'a A,
}

impl<'a, A: Attributes + ?Sized> AttributeStore<'a, A> {
    pub fn new(attrs: &'a A) -> Self {
        Self { attrs }
    }

    /// Returns the request's chain if one is stored.
    ///
    /// A value of another type under the reserved name is reported and
    /// treated as absent.
    pub fn get<B: 'static>(&self) -> Option<ChainHandle<B>> {
        let value = self.attrs.attribute(CHAIN_ATTRIBUTE)?;
        match value.downcast::<RefCell<RenderChain<B>>>() {
            Ok(chain) => Some(chain),
            Err(_) => {
                warn!(
                    attribute = CHAIN_ATTRIBUTE,
                    "request attribute does not hold a render chain; replacing it"
                );
                None
            }
        }
    }

    /// Stores `chain` as the request's chain.
    pub fn set<B: 'static>(&self, chain: ChainHandle<B>) {
        self.attrs.set_attribute(CHAIN_ATTRIBUTE, chain);
    }

    fn get_or_create<B: 'static>(&self) -> ChainHandle<B> {
        if let Some(chain) = self.get() {
            return chain;
        }
        trace!(attribute = CHAIN_ATTRIBUTE, "render chain created");
        let chain: ChainHandle<B> = Rc::new(RefCell::new(RenderChain::new()));
        self.set(Rc::clone(&chain));
        chain
    }
}

impl<A: Attributes + ?Sized, B: 'static> ChainStore<B> for AttributeStore<'_, A> {
    fn with_chain<R>(&self, f: impl FnOnce(&mut RenderChain<B>) -> R) -> R {
        let chain = self.get_or_create::<B>();
        let mut chain = chain.borrow_mut();
        f(&mut *chain)
    }
}

/// In-memory request attribute bag.
#[derive(Default)]
pub struct RequestAttributes {
    values: RefCell<HashMap<String, Rc<dyn Any>>>,
}

impl RequestAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl Attributes for RequestAttributes {
    fn attribute(&self, name: &str) -> Option<Rc<dyn Any>> {
        self.values.borrow().get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: Rc<dyn Any>) {
        self.values.borrow_mut().insert(name.to_string(), value);
    }
}

impl fmt::Debug for RequestAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestAttributes")
            .field("names", &self.values.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}
