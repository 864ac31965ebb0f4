//! Tagged runtime values carried by resolved futures.
//!
//! Futures are untyped at the settlement boundary: a settler picks one of a
//! fixed set of scalar kinds, a list (used by [`crate::Future::all`]), or the
//! opaque boxed escape hatch for anything richer. Callers recover typed data
//! through the `as_*` accessors, treating the tag as a domain convention.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A value produced by a resolved future.
#[derive(Clone)]
pub enum Value {
    /// Boolean scalar.
    Bool(bool),
    /// 32-bit signed integer scalar.
    Int(i32),
    /// 64-bit signed integer scalar.
    Int64(i64),
    /// Double-precision float scalar.
    Double(f64),
    /// Immutable string.
    Str(Arc<str>),
    /// Ordered sequence of values.
    List(Arc<[Value]>),
    /// Opaque shared object for anything outside the scalar kinds.
    Boxed(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wraps a string slice or owned string.
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// Wraps a sequence of values.
    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        Value::List(values.into_iter().collect())
    }

    /// Boxes an arbitrary sendable object.
    pub fn boxed<T: Any + Send + Sync>(object: T) -> Self {
        Value::Boxed(Arc::new(object))
    }

    /// Wraps an already-shared object without another allocation.
    pub fn from_arc<T: Any + Send + Sync>(object: Arc<T>) -> Self {
        Value::Boxed(object)
    }

    /// Returns the boolean if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Int`.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a 64-bit integer for either integer kind.
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(i64::from(*i)),
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the float if this is a `Double`.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the string if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the element slice if this is a `List`.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Downcasts the boxed object to a concrete type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Value::Boxed(object) => object.clone().downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Value::Int64(i) => f.debug_tuple("Int64").field(i).finish(),
            Value::Double(d) => f.debug_tuple("Double").field(d).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Boxed(_) => f.debug_tuple("Boxed").field(&"<object>").finish(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int64(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_accessors() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(7).as_int(), Some(7));
        assert_eq!(Value::Int(7).as_int64(), Some(7));
        assert_eq!(Value::Int64(1 << 40).as_int64(), Some(1 << 40));
        assert_eq!(Value::Double(1.5).as_double(), Some(1.5));
        assert_eq!(Value::string("abc").as_str(), Some("abc"));
        assert_eq!(Value::Int(7).as_str(), None);
    }

    #[test]
    fn boxed_roundtrip() {
        let value = Value::boxed(vec![1u8, 2, 3]);
        let recovered = value.downcast::<Vec<u8>>().unwrap();
        assert_eq!(*recovered, vec![1, 2, 3]);
        assert!(value.downcast::<String>().is_none());
    }

    #[test]
    fn list_preserves_order() {
        let value = Value::list([Value::Int(1), Value::Int(2)]);
        let items = value.as_list().unwrap();
        assert_eq!(items[0].as_int(), Some(1));
        assert_eq!(items[1].as_int(), Some(2));
    }
}
