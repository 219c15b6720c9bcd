//! The per-request render chain.

use std::fmt;

use crate::key::BeanView;

/// Ordered (bean, view) pairs of the render frames active in one request.
///
/// The chain is used as a stack, but membership and removal are by value:
/// nesting depth is bounded by template nesting, so a linear scan is enough.
///
/// ```rust
/// use viewguard::{BeanView, RenderChain};
///
/// let mut chain = RenderChain::new();
/// chain.push(BeanView::new("Article#1", "full"));
/// chain.push(BeanView::new("Article#1", "teaser"));
///
/// assert!(chain.contains(&BeanView::new("Article#1", "full")));
/// chain.remove(&BeanView::new("Article#1", "teaser"));
/// assert_eq!(chain.len(), 1);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct RenderChain<B> {
    frames: Vec<BeanView<B>>,
}

impl<B> RenderChain<B> {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Appends a frame.
    pub fn push(&mut self, key: BeanView<B>) {
        self.frames.push(key);
    }

    /// Number of active frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Same as [`len`](Self::len), read as nesting depth.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Iterates frames outermost first.
    pub fn iter(&self) -> impl Iterator<Item = &BeanView<B>> {
        self.frames.iter()
    }

    /// Drops every frame.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl<B: PartialEq> RenderChain<B> {
    /// Returns true if an equal frame is active.
    pub fn contains(&self, key: &BeanView<B>) -> bool {
        self.frames.iter().any(|frame| frame == key)
    }

    /// Removes the first frame equal to `key`.
    ///
    /// Returns whether a frame was removed. A missing key is not an error.
    pub fn remove(&mut self, key: &BeanView<B>) -> bool {
        match self.frames.iter().position(|frame| frame == key) {
            Some(index) => {
                self.frames.remove(index);
                true
            }
            None => false,
        }
    }
}

impl<B> Default for RenderChain<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: fmt::Debug> fmt::Debug for RenderChain<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.frames.iter()).finish()
    }
}
