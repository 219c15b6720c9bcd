//! Content beans and where they come from.
//!
//! A [`Bean`] is an opaque content object with an id, a kind that selects
//! its templates, and free-form fields exposed to those templates. Beans are
//! equal when their ids are equal; that id is the identity the recursion
//! guard tracks.
//!
//! Beans are looked up through [`BeanSource`]. [`MemoryBeans`] is a simple
//! map-backed source that can also be loaded from YAML:
//!
//! ```rust
//! use viewguard_render::{BeanId, BeanSource, MemoryBeans};
//!
//! let beans = MemoryBeans::from_yaml(r#"
//! - id: "Article#1"
//!   kind: article
//!   fields:
//!     title: Hello
//!     related: ["Article#2"]
//! - id: "Article#2"
//!   kind: article
//! "#).unwrap();
//!
//! let first = beans.lookup(&BeanId::from("Article#1")).unwrap();
//! assert_eq!(first.kind(), "article");
//! assert_eq!(first.field("title"), Some(&serde_json::json!("Hello")));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Identity of a bean in the host content model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeanId(String);

impl BeanId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BeanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BeanId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BeanId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A content object rendered through views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bean {
    id: BeanId,
    kind: String,
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
}

impl Bean {
    pub fn new(id: impl Into<BeanId>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            fields: serde_json::Map::new(),
        }
    }

    /// Adds or replaces a field.
    pub fn with_field(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> &BeanId {
        &self.id
    }

    /// Kind of content; selects the template directory for the bean's views.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    /// The value templates see as `bean`: every field plus `id` and `kind`.
    ///
    /// `id` and `kind` win over fields of the same name.
    pub fn to_value(&self) -> serde_json::Value {
        let mut map = self.fields.clone();
        map.insert("id".into(), serde_json::Value::String(self.id.0.clone()));
        map.insert("kind".into(), serde_json::Value::String(self.kind.clone()));
        serde_json::Value::Object(map)
    }
}

impl PartialEq for Bean {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Bean {}

impl Hash for Bean {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Looks up beans by id.
///
/// Sources are shared across requests and threads.
pub trait BeanSource: Send + Sync {
    fn lookup(&self, id: &BeanId) -> Option<Bean>;
}

/// In-memory bean source.
#[derive(Debug, Clone, Default)]
pub struct MemoryBeans {
    beans: HashMap<BeanId, Bean>,
}

impl MemoryBeans {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a YAML list of beans.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::SerializationError`] if the YAML does not
    /// describe a list of beans.
    pub fn from_yaml(yaml: &str) -> Result<Self, RenderError> {
        let list: Vec<Bean> = serde_yaml::from_str(yaml)?;
        Ok(list.into_iter().collect())
    }

    /// Adds a bean, replacing any bean with the same id.
    pub fn insert(&mut self, bean: Bean) -> &mut Self {
        self.beans.insert(bean.id.clone(), bean);
        self
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, bean: Bean) -> Self {
        self.insert(bean);
        self
    }

    pub fn len(&self) -> usize {
        self.beans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }
}

impl FromIterator<Bean> for MemoryBeans {
    fn from_iter<I: IntoIterator<Item = Bean>>(iter: I) -> Self {
        let mut beans = MemoryBeans::new();
        for bean in iter {
            beans.insert(bean);
        }
        beans
    }
}

impl BeanSource for MemoryBeans {
    fn lookup(&self, id: &BeanId) -> Option<Bean> {
        self.beans.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn beans_compare_by_id() {
        let a = Bean::new("Article#1", "article").with_field("title", "A");
        let b = Bean::new("Article#1", "article").with_field("title", "B");
        let c = Bean::new("Article#2", "article").with_field("title", "A");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn to_value_exposes_id_and_kind() {
        let bean = Bean::new("Teaser#3", "teaser")
            .with_field("title", "Hi")
            .with_field("id", "shadowed");

        assert_eq!(
            bean.to_value(),
            json!({"id": "Teaser#3", "kind": "teaser", "title": "Hi"})
        );
    }

    #[test]
    fn memory_beans_replace_by_id() {
        let mut beans = MemoryBeans::new();
        beans.insert(Bean::new("a", "page").with_field("n", 1));
        beans.insert(Bean::new("a", "page").with_field("n", 2));

        assert_eq!(beans.len(), 1);
        let bean = beans.lookup(&BeanId::from("a")).unwrap();
        assert_eq!(bean.field("n"), Some(&json!(2)));
    }

    #[test]
    fn lookup_missing_is_none() {
        assert!(MemoryBeans::new().lookup(&BeanId::from("nope")).is_none());
    }

    #[test]
    fn from_yaml_defaults_fields() {
        let beans = MemoryBeans::from_yaml("- id: x\n  kind: page\n").unwrap();
        let bean = beans.lookup(&"x".into()).unwrap();
        assert_eq!(bean.to_value(), json!({"id": "x", "kind": "page"}));
    }

    #[test]
    fn from_yaml_rejects_non_list() {
        let err = MemoryBeans::from_yaml("id: x").unwrap_err();
        assert!(matches!(err, RenderError::SerializationError(_)));
    }

    #[test]
    fn bean_id_display() {
        assert_eq!(BeanId::new("Article#1").to_string(), "Article#1");
        assert_eq!(BeanId::from(String::from("x")).as_str(), "x");
    }
}
