//! External settlers for futures.

use std::any::Any;
use std::sync::Arc;

use crate::error::Error;
use crate::future::Future;
use crate::value::Value;

/// The writable side of a future.
///
/// A promise hands out its future to consumers and settles it exactly once.
/// Settlement attempts after the first are silently ignored, which makes
/// racing settlers (a value against a timeout, say) safe by construction.
/// Promises are cheap to clone; clones settle the same future.
#[derive(Debug, Clone)]
pub struct Promise {
    future: Future,
}

impl Promise {
    /// Creates a new promise with a pending future.
    pub fn new() -> Self {
        Promise {
            future: Future::pending(),
        }
    }

    /// Returns a handle to the future this promise settles.
    pub fn future(&self) -> Future {
        self.future.clone()
    }

    /// True while nothing has settled the future yet.
    pub fn is_pending(&self) -> bool {
        self.future.is_pending()
    }

    /// Resolves the future with a value.
    pub fn resolve(&self, value: Value) {
        self.future.settle(Ok(value));
    }

    /// Resolves with a boolean.
    pub fn resolve_bool(&self, value: bool) {
        self.resolve(Value::Bool(value));
    }

    /// Resolves with a 32-bit integer.
    pub fn resolve_int(&self, value: i32) {
        self.resolve(Value::Int(value));
    }

    /// Resolves with a 64-bit integer.
    pub fn resolve_int64(&self, value: i64) {
        self.resolve(Value::Int64(value));
    }

    /// Resolves with a double.
    pub fn resolve_double(&self, value: f64) {
        self.resolve(Value::Double(value));
    }

    /// Resolves with a string.
    pub fn resolve_string(&self, value: impl AsRef<str>) {
        self.resolve(Value::string(value));
    }

    /// Resolves with an already-shared object.
    pub fn resolve_boxed<T: Any + Send + Sync>(&self, object: Arc<T>) {
        self.resolve(Value::from_arc(object));
    }

    /// Resolves by taking ownership of an object and boxing it.
    pub fn resolve_take_boxed<T: Any + Send + Sync>(&self, object: T) {
        self.resolve(Value::boxed(object));
    }

    /// Rejects the future with an error.
    pub fn reject(&self, error: Error) {
        self.future.settle(Err(error));
    }
}

impl Default for Promise {
    fn default() -> Self {
        Promise::new()
    }
}
