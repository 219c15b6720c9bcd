//! The detect/record/clear protocol around a render delegate.
//!
//! [`RecursionGuard::wrap`] is the one place recursion is detected. Every
//! output channel goes through it: the guard never looks at the channel, it
//! only decides whether the render delegate runs.
//!
//! ```text
//! wrap(bean, view)
//!   → chain contains (bean, view)?
//!       yes → on_recursion(RecursionDetected)        chain untouched
//!       no  → push → render() → remove               render() may re-enter wrap
//! ```
//!
//! ## Failure semantics
//!
//! - A detected recursion is recovered at the `wrap` boundary and reported as
//!   [`Rendered::Recursion`], never as an `Err`.
//! - A failure of the error render is logged and swallowed; there is no
//!   further fallback output.
//! - A failure of the render delegate is returned unchanged. The frame it
//!   pushed stays on the chain, so a later render of the same pair in the
//!   same request is reported as recursive.

use std::fmt;

use thiserror::Error;
use tracing::{trace, warn};

use crate::key::BeanView;
use crate::store::ChainStore;

/// A (bean, view) pair was about to be rendered inside its own active frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Recursion detected, bean {bean} with view {view} was included already.")]
pub struct RecursionDetected {
    bean: String,
    view: String,
}

impl RecursionDetected {
    /// Describes a recursion on `key`.
    pub fn new<B: fmt::Display>(key: &BeanView<B>) -> Self {
        Self {
            bean: key.bean().to_string(),
            view: key.view().to_string(),
        }
    }

    /// Display form of the offending bean.
    pub fn bean(&self) -> &str {
        &self.bean
    }

    /// The offending view name.
    pub fn view(&self) -> &str {
        &self.view
    }
}

/// Outcome of asking the chain whether a frame may start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The frame was pushed; it must be released with [`RecursionGuard::leave`].
    Proceed,
    /// The pair is an active ancestor; nothing was pushed.
    Recursion(RecursionDetected),
}

/// Outcome of a guarded render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<T> {
    /// The delegate ran and returned this value.
    Content(T),
    /// The delegate was skipped and the error render ran in its place.
    Recursion(RecursionDetected),
}

impl<T> Rendered<T> {
    pub fn is_recursion(&self) -> bool {
        matches!(self, Rendered::Recursion(_))
    }

    /// Returns the delegate's value, if it ran.
    pub fn content(self) -> Option<T> {
        match self {
            Rendered::Content(value) => Some(value),
            Rendered::Recursion(_) => None,
        }
    }

    /// Returns the detected recursion, if any.
    pub fn recursion(&self) -> Option<&RecursionDetected> {
        match self {
            Rendered::Content(_) => None,
            Rendered::Recursion(detected) => Some(detected),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Rendered<U> {
        match self {
            Rendered::Content(value) => Rendered::Content(f(value)),
            Rendered::Recursion(detected) => Rendered::Recursion(detected),
        }
    }
}

/// Guards render delegates against re-entering an active (bean, view) frame.
///
/// A guard borrows the [`ChainStore`] of one request; build one per request
/// (they are free to create) or share it by reference down nested calls.
///
/// # Example
///
/// ```rust
/// use viewguard::{RecursionGuard, Rendered, RequestScope};
///
/// let scope = RequestScope::new();
/// let guard = RecursionGuard::new(&scope);
///
/// let outer = guard.wrap(
///     "Article#1",
///     "full",
///     || {
///         // The template includes itself.
///         let inner = guard.wrap(
///             "Article#1",
///             "full",
///             || Ok::<_, std::fmt::Error>("never rendered".to_string()),
///             |_| Ok::<_, std::fmt::Error>(()),
///         )?;
///         assert!(inner.is_recursion());
///         Ok::<_, std::fmt::Error>("article".to_string())
///     },
///     |_| Ok::<_, std::fmt::Error>(()),
/// );
///
/// assert_eq!(outer, Ok(Rendered::Content("article".to_string())));
/// assert!(scope.into_chain().is_empty());
/// ```
pub struct RecursionGuard<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S: ?Sized> RecursionGuard<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// The store this guard records frames in.
    pub fn store(&self) -> &'s S {
        self.store
    }

    /// Checks `key` against the chain and pushes it when it is not active.
    ///
    /// The check and the push happen inside one [`ChainStore::with_chain`]
    /// call. Every [`Admission::Proceed`] must be paired with a
    /// [`leave`](Self::leave) once the frame returns normally.
    pub fn enter<B>(&self, key: &BeanView<B>) -> Admission
    where
        S: ChainStore<B>,
        B: Clone + PartialEq + fmt::Display,
    {
        self.store.with_chain(|chain| {
            if chain.contains(key) {
                Admission::Recursion(RecursionDetected::new(key))
            } else {
                chain.push(key.clone());
                trace!(bean = %key.bean(), view = key.view(), depth = chain.depth(), "enter view");
                Admission::Proceed
            }
        })
    }

    /// Removes the frame pushed by a successful [`enter`](Self::enter).
    ///
    /// Releasing a key that is not on the chain does nothing.
    pub fn leave<B>(&self, key: &BeanView<B>)
    where
        S: ChainStore<B>,
        B: PartialEq + fmt::Display,
    {
        self.store.with_chain(|chain| {
            if chain.remove(key) {
                trace!(bean = %key.bean(), view = key.view(), depth = chain.depth(), "leave view");
            }
        });
    }

    /// Runs `render` for (`bean`, `view`) unless that pair is already being
    /// rendered further up in this request.
    ///
    /// - Not active: the pair is pushed, `render` runs (it may call `wrap`
    ///   again for nested includes), and the pair is removed when `render`
    ///   returns `Ok`. Returns [`Rendered::Content`].
    /// - Active: `render` is skipped, the chain is left as is, and
    ///   `on_recursion` produces the error representation. A failure from
    ///   `on_recursion` is logged and dropped. Returns [`Rendered::Recursion`].
    ///
    /// # Errors
    ///
    /// Returns the error from `render` unchanged. The pushed pair is not
    /// removed in that case.
    pub fn wrap<B, T, E, X>(
        &self,
        bean: B,
        view: &str,
        render: impl FnOnce() -> Result<T, E>,
        on_recursion: impl FnOnce(&RecursionDetected) -> Result<(), X>,
    ) -> Result<Rendered<T>, E>
    where
        S: ChainStore<B>,
        B: Clone + PartialEq + fmt::Display,
        X: fmt::Display,
    {
        let key = BeanView::new(bean, view);
        match self.enter(&key) {
            Admission::Proceed => {
                let content = render()?;
                self.leave(&key);
                Ok(Rendered::Content(content))
            }
            Admission::Recursion(detected) => {
                warn!(bean = detected.bean(), view = detected.view(), "{}", detected);
                if let Err(err) = on_recursion(&detected) {
                    warn!(
                        bean = detected.bean(),
                        view = detected.view(),
                        error = %err,
                        "failed to render recursion error"
                    );
                }
                Ok(Rendered::Recursion(detected))
            }
        }
    }
}

impl<S: ?Sized> Clone for RecursionGuard<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized> Copy for RecursionGuard<'_, S> {}

impl<S: ?Sized> fmt::Debug for RecursionGuard<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecursionGuard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RequestScope;
    use std::cell::Cell;

    #[test]
    fn message_names_bean_and_view() {
        let detected = RecursionDetected::new(&BeanView::new("Article#1", "full"));
        assert_eq!(
            detected.to_string(),
            "Recursion detected, bean Article#1 with view full was included already."
        );
        assert_eq!(detected.bean(), "Article#1");
        assert_eq!(detected.view(), "full");
    }

    #[test]
    fn enter_pushes_and_leave_pops() {
        let scope = RequestScope::new();
        let guard = RecursionGuard::new(&scope);
        let key = BeanView::new(1, "full");

        assert_eq!(guard.enter(&key), Admission::Proceed);
        assert_eq!(scope.with_chain(|c| c.len()), 1);

        guard.leave(&key);
        assert_eq!(scope.with_chain(|c| c.len()), 0);
    }

    #[test]
    fn enter_on_active_pair_leaves_chain_alone() {
        let scope = RequestScope::new();
        let guard = RecursionGuard::new(&scope);
        let key = BeanView::new(1, "full");

        assert_eq!(guard.enter(&key), Admission::Proceed);
        assert!(matches!(guard.enter(&key), Admission::Recursion(_)));
        assert_eq!(scope.with_chain(|c| c.len()), 1);
    }

    #[test]
    fn leave_without_enter_is_noop() {
        let scope = RequestScope::new();
        let guard = RecursionGuard::new(&scope);
        guard.leave(&BeanView::new(1, "full"));
        assert!(scope.into_chain().is_empty());
    }

    #[test]
    fn failing_error_render_is_swallowed() {
        let scope = RequestScope::new();
        let guard = RecursionGuard::new(&scope);
        let attempts = Cell::new(0);

        let outer = guard.wrap(
            1,
            "full",
            || {
                guard.wrap(
                    1,
                    "full",
                    || Ok::<_, String>(()),
                    |_| {
                        attempts.set(attempts.get() + 1);
                        Err("broken pipe")
                    },
                )
            },
            |_| Ok::<_, String>(()),
        );

        let inner = outer.unwrap().content().unwrap();
        assert!(inner.is_recursion());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn delegate_failure_keeps_frame() {
        let scope = RequestScope::new();
        let guard = RecursionGuard::new(&scope);

        let result = guard.wrap(
            1,
            "full",
            || Err::<(), _>("write failed"),
            |_| Ok::<_, String>(()),
        );
        assert_eq!(result, Err("write failed"));
        assert!(scope.with_chain(|c| c.contains(&BeanView::new(1, "full"))));

        // The stale frame now flags an unrelated, non-nested render.
        let later = guard.wrap(1, "full", || Ok::<_, String>(()), |_| Ok::<_, String>(()));
        assert!(later.unwrap().is_recursion());
    }

    #[test]
    fn rendered_helpers() {
        let content: Rendered<u32> = Rendered::Content(3);
        assert!(!content.is_recursion());
        assert!(content.recursion().is_none());
        assert_eq!(content.map(|n| n * 2), Rendered::Content(6));

        let detected = RecursionDetected::new(&BeanView::new(1, "full"));
        let recursion: Rendered<u32> = Rendered::Recursion(detected.clone());
        assert_eq!(recursion.recursion(), Some(&detected));
        assert_eq!(recursion.map(|n| n * 2).content(), None);
    }
}
