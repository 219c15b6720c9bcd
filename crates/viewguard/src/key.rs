//! Identity of one render frame: a bean paired with a view name.
//!
//! [`BeanView`] compares by value. Whatever equality the bean type defines is
//! the identity the guard uses, so a bean type with structural equality makes
//! two structurally equal beans the same frame. Wrap a shared bean in
//! [`ByRef`] when frames should be told apart by reference instead.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A (bean, view) pair identifying one active render frame.
///
/// Two keys are equal iff their beans are equal and their view names match
/// exactly (no normalization, no case folding). An absent bean is modelled as
/// `BeanView<Option<B>>` and is equal only to another absent bean with the
/// same view.
///
/// # Example
///
/// ```rust
/// use viewguard::BeanView;
///
/// let full = BeanView::new("Article#1", "full");
/// assert_eq!(full, BeanView::new("Article#1", "full"));
/// assert_ne!(full, BeanView::new("Article#1", "teaser"));
/// assert_ne!(full, BeanView::new("Article#2", "full"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BeanView<B> {
    bean: B,
    view: String,
}

impl<B> BeanView<B> {
    /// Creates a key for rendering `bean` with `view`.
    pub fn new(bean: B, view: impl Into<String>) -> Self {
        Self {
            bean,
            view: view.into(),
        }
    }

    /// The bean half of the key.
    pub fn bean(&self) -> &B {
        &self.bean
    }

    /// The view name half of the key.
    pub fn view(&self) -> &str {
        &self.view
    }
}

impl<B: fmt::Display> fmt::Display for BeanView<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.bean, self.view)
    }
}

/// Reference-identity wrapper for shared beans.
///
/// Two `ByRef` values are equal only when they point at the same allocation,
/// regardless of what `T` itself considers equal. Hashing uses the pointer.
///
/// ```rust
/// use std::rc::Rc;
/// use viewguard::ByRef;
///
/// let a = Rc::new(String::from("teaser"));
/// let b = Rc::new(String::from("teaser"));
///
/// assert_eq!(ByRef::new(a.clone()), ByRef::new(a.clone()));
/// assert_ne!(ByRef::new(a), ByRef::new(b));
/// ```
#[derive(Debug)]
pub struct ByRef<T: ?Sized>(Rc<T>);

impl<T: ?Sized> ByRef<T> {
    /// Wraps a shared bean.
    pub fn new(bean: Rc<T>) -> Self {
        Self(bean)
    }

    /// Returns the shared bean.
    pub fn get(&self) -> &Rc<T> {
        &self.0
    }
}

impl<T: ?Sized> Clone for ByRef<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: ?Sized> PartialEq for ByRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Eq for ByRef<T> {}

impl<T: ?Sized> Hash for ByRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Rc::as_ptr(&self.0) as *const (), state);
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for ByRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equal_keys_hash_alike() {
        let a = BeanView::new(7u32, "full");
        let b = BeanView::new(7u32, String::from("full"));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn view_names_match_exactly() {
        assert_ne!(BeanView::new(1, "Full"), BeanView::new(1, "full"));
        assert_ne!(BeanView::new(1, "full "), BeanView::new(1, "full"));
    }

    #[test]
    fn absent_beans_compare_by_view() {
        let none: BeanView<Option<u32>> = BeanView::new(None, "full");
        assert_eq!(none, BeanView::new(None, "full"));
        assert_ne!(none, BeanView::new(None, "teaser"));
        assert_ne!(none, BeanView::new(Some(1), "full"));
    }

    #[test]
    fn by_ref_ignores_structural_equality() {
        let a = Rc::new(vec![1, 2, 3]);
        let b = Rc::new(vec![1, 2, 3]);

        let same = BeanView::new(ByRef::new(a.clone()), "full");
        assert_eq!(same, BeanView::new(ByRef::new(a), "full"));
        assert_ne!(same, BeanView::new(ByRef::new(b), "full"));
    }

    #[test]
    fn by_ref_hash_follows_pointer() {
        let a = Rc::new("x".to_string());
        assert_eq!(
            hash_of(&ByRef::new(a.clone())),
            hash_of(&ByRef::new(a.clone()))
        );
    }

    #[test]
    fn display_joins_bean_and_view() {
        assert_eq!(BeanView::new("Article#1", "full").to_string(), "Article#1#full");
    }

    #[test]
    fn accessors() {
        let key = BeanView::new("a", "teaser");
        assert_eq!(*key.bean(), "a");
        assert_eq!(key.view(), "teaser");
    }
}
