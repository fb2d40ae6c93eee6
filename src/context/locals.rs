//! Request-scoped key/value storage.
//!
//! Values are a closed set of types so retrieval with the wrong type is an
//! explicit [`LocalError::WrongType`] rather than a silent default.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A value stored in the request locals.
#[derive(Clone)]
pub enum Local {
    Str(String),
    Int(i64),
    Bool(bool),
    /// Opaque shared handle, retrieved with [`Locals::get_handle`].
    Handle(Arc<dyn Any + Send + Sync>),
}

impl Local {
    /// Wrap any shareable value as an opaque handle.
    pub fn handle<T: Any + Send + Sync>(value: T) -> Self {
        Local::Handle(Arc::new(value))
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Local::Str(_) => "string",
            Local::Int(_) => "integer",
            Local::Bool(_) => "boolean",
            Local::Handle(_) => "handle",
        }
    }
}

impl fmt::Debug for Local {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Local::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Local::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Local::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Local::Handle(_) => f.write_str("Handle(..)"),
        }
    }
}

impl PartialEq for Local {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Local::Str(a), Local::Str(b)) => a == b,
            (Local::Int(a), Local::Int(b)) => a == b,
            (Local::Bool(a), Local::Bool(b)) => a == b,
            (Local::Handle(a), Local::Handle(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<String> for Local {
    fn from(s: String) -> Self {
        Local::Str(s)
    }
}

impl From<&str> for Local {
    fn from(s: &str) -> Self {
        Local::Str(s.to_string())
    }
}

impl From<i64> for Local {
    fn from(i: i64) -> Self {
        Local::Int(i)
    }
}

impl From<i32> for Local {
    fn from(i: i32) -> Self {
        Local::Int(i64::from(i))
    }
}

impl From<bool> for Local {
    fn from(b: bool) -> Self {
        Local::Bool(b)
    }
}

/// Failed typed lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalError {
    /// The key was never set, or was set to no value.
    Missing { key: String },
    /// The key holds a value of another type.
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl fmt::Display for LocalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalError::Missing { key } => write!(f, "local {key:?} is not set"),
            LocalError::WrongType {
                key,
                expected,
                found,
            } => write!(f, "local {key:?} holds a {found}, not a {expected}"),
        }
    }
}

impl std::error::Error for LocalError {}

/// Ordered key/value list with last-write-wins lookup.
///
/// A linear scan is faster than hashing for the handful of entries a request
/// carries, and `clear` keeps the allocation for the next pooled request.
#[derive(Debug, Default)]
pub struct Locals {
    entries: Vec<(String, Option<Local>)>,
}

impl Locals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`. `None` blanks an existing entry and installs nothing for a new key.
    pub fn set_opt(&mut self, key: &str, value: Option<Local>) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
            return;
        }
        if let Some(value) = value {
            self.entries.push((key.to_string(), Some(value)));
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Local>) {
        self.set_opt(key, Some(value.into()));
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Local> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_ref())
    }

    fn require(&self, key: &str) -> Result<&Local, LocalError> {
        self.get(key).ok_or_else(|| LocalError::Missing {
            key: key.to_string(),
        })
    }

    fn wrong_type(key: &str, expected: &'static str, found: &Local) -> LocalError {
        LocalError::WrongType {
            key: key.to_string(),
            expected,
            found: found.kind(),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<&str, LocalError> {
        match self.require(key)? {
            Local::Str(s) => Ok(s),
            other => Err(Self::wrong_type(key, "string", other)),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64, LocalError> {
        match self.require(key)? {
            Local::Int(i) => Ok(*i),
            other => Err(Self::wrong_type(key, "integer", other)),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, LocalError> {
        match self.require(key)? {
            Local::Bool(b) => Ok(*b),
            other => Err(Self::wrong_type(key, "boolean", other)),
        }
    }

    /// Downcast an opaque handle to `T`.
    pub fn get_handle<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>, LocalError> {
        match self.require(key)? {
            Local::Handle(h) => Arc::clone(h)
                .downcast::<T>()
                .map_err(|_| LocalError::WrongType {
                    key: key.to_string(),
                    expected: std::any::type_name::<T>(),
                    found: "handle",
                }),
            other => Err(Self::wrong_type(key, "handle", other)),
        }
    }

    /// Number of entries, including blanked ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_overwrite() {
        let mut locals = Locals::new();
        locals.set("user", "alice");
        locals.set("user", "bob");
        assert_eq!(locals.get_str("user"), Ok("bob"));
        assert_eq!(locals.len(), 1);
    }

    #[test]
    fn test_none_on_unseen_key_installs_nothing() {
        let mut locals = Locals::new();
        locals.set_opt("ghost", None);
        assert!(locals.is_empty());
        assert!(locals.get("ghost").is_none());
    }

    #[test]
    fn test_none_on_existing_key_blanks_value() {
        let mut locals = Locals::new();
        locals.set("token", "t");
        locals.set_opt("token", None);
        assert!(locals.get("token").is_none());
        assert_eq!(
            locals.get_str("token"),
            Err(LocalError::Missing {
                key: "token".to_string()
            })
        );
    }

    #[test]
    fn test_wrong_type_is_explicit() {
        let mut locals = Locals::new();
        locals.set("count", 3i64);
        let err = locals.get_str("count").unwrap_err();
        assert_eq!(
            err,
            LocalError::WrongType {
                key: "count".to_string(),
                expected: "string",
                found: "integer"
            }
        );
        assert_eq!(locals.get_int("count"), Ok(3));
        assert!(locals.get_bool("count").is_err());
    }

    #[test]
    fn test_handle_downcast() {
        #[derive(Debug, PartialEq)]
        struct User {
            id: u32,
        }
        let mut locals = Locals::new();
        locals.set("user", Local::handle(User { id: 7 }));
        assert_eq!(locals.get_handle::<User>("user").unwrap().id, 7);
        assert!(locals.get_handle::<String>("user").is_err());
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut locals = Locals::new();
        for i in 0..8 {
            locals.set(&format!("k{i}"), i64::from(i));
        }
        let cap = locals.capacity();
        locals.clear();
        assert!(locals.is_empty());
        assert_eq!(locals.capacity(), cap);
    }
}
