//! Invocation binder: the type oracle consulted while decoding.
//!
//! The codec decodes payload values generically and then asks the binder
//! what shape the application expects for each argument or result. The
//! binder answers with [`TypeHint`]s; it never sees the bytes.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

/// Expected shape of a payload value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TypeHint {
    /// No expectation; the value passes through as decoded.
    #[default]
    Dynamic,
    /// Boolean.
    Bool,
    /// Integer of any width.
    Int,
    /// Floating point number.
    Float,
    /// UTF-8 string.
    String,
    /// Raw bytes.
    Bytes,
    /// Sequence with elements of the given shape.
    List(Box<TypeHint>),
    /// Mapping with keys and values of the given shapes.
    Map(Box<TypeHint>, Box<TypeHint>),
}

impl TypeHint {
    /// Sequence of `element`.
    #[must_use]
    pub fn list(element: TypeHint) -> Self {
        Self::List(Box::new(element))
    }

    /// Mapping from `key` to `value`.
    #[must_use]
    pub fn map(key: TypeHint, value: TypeHint) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }
}

/// Resolves expected argument and return types for invocations.
///
/// Implementations must be cheap and side-effect free: the decoder may query
/// the same key any number of times, from any thread.
pub trait InvocationBinder: Send + Sync {
    /// Types expected for each positional argument of `target`.
    ///
    /// Returns an empty list for unknown targets.
    fn parameter_types(&self, target: &str) -> Vec<TypeHint>;

    /// Type the completion of `invocation_id` carries as its result.
    fn return_type(&self, invocation_id: &str) -> Option<TypeHint>;

    /// Type of each item of the stream `invocation_id`.
    fn stream_item_type(&self, invocation_id: &str) -> Option<TypeHint> {
        self.return_type(invocation_id)
    }
}

impl<T: InvocationBinder + ?Sized> InvocationBinder for &T {
    fn parameter_types(&self, target: &str) -> Vec<TypeHint> {
        (**self).parameter_types(target)
    }

    fn return_type(&self, invocation_id: &str) -> Option<TypeHint> {
        (**self).return_type(invocation_id)
    }

    fn stream_item_type(&self, invocation_id: &str) -> Option<TypeHint> {
        (**self).stream_item_type(invocation_id)
    }
}

impl<T: InvocationBinder + ?Sized> InvocationBinder for Arc<T> {
    fn parameter_types(&self, target: &str) -> Vec<TypeHint> {
        (**self).parameter_types(target)
    }

    fn return_type(&self, invocation_id: &str) -> Option<TypeHint> {
        (**self).return_type(invocation_id)
    }

    fn stream_item_type(&self, invocation_id: &str) -> Option<TypeHint> {
        (**self).stream_item_type(invocation_id)
    }
}

/// Binder that knows nothing. Every value decodes to its generic form.
#[derive(Debug, Clone, Copy, Default)]
pub struct UntypedBinder;

impl InvocationBinder for UntypedBinder {
    fn parameter_types(&self, _target: &str) -> Vec<TypeHint> {
        Vec::new()
    }

    fn return_type(&self, _invocation_id: &str) -> Option<TypeHint> {
        None
    }
}

/// Expected types of an invocation that is still in flight.
#[derive(Debug, Clone)]
struct PendingReturn {
    result: TypeHint,
    item: Option<TypeHint>,
}

/// Concurrent method table.
///
/// Targets are registered once when the hub is set up; invocations are
/// registered when sent and removed when their completion arrives.
///
/// ## Example
///
/// ```rust
/// use hubwire_core::{InvocationBinder, MethodTable, TypeHint};
///
/// let table = MethodTable::new();
/// table.register_target("add", vec![TypeHint::Int, TypeHint::Int]);
/// table.register_invocation("1", TypeHint::Int);
///
/// assert_eq!(table.parameter_types("add").len(), 2);
/// assert_eq!(table.return_type("1"), Some(TypeHint::Int));
///
/// table.complete_invocation("1");
/// assert!(table.return_type("1").is_none());
/// ```
#[derive(Debug, Default)]
pub struct MethodTable {
    targets: RwLock<HashMap<String, Arc<[TypeHint]>>>,
    pending: DashMap<String, PendingReturn>,
}

impl MethodTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the parameter types of a target.
    pub fn register_target(&self, target: impl Into<String>, parameters: Vec<TypeHint>) {
        self.targets
            .write()
            .insert(target.into(), Arc::from(parameters));
    }

    /// Remove a target. Returns `true` if it was registered.
    pub fn remove_target(&self, target: &str) -> bool {
        self.targets.write().remove(target).is_some()
    }

    /// Register an outgoing invocation expecting a result of `result`.
    pub fn register_invocation(&self, invocation_id: impl Into<String>, result: TypeHint) {
        self.pending.insert(
            invocation_id.into(),
            PendingReturn { result, item: None },
        );
    }

    /// Register an outgoing stream invocation yielding items of `item`.
    ///
    /// Its completion carries no result.
    pub fn register_stream(&self, invocation_id: impl Into<String>, item: TypeHint) {
        self.pending.insert(
            invocation_id.into(),
            PendingReturn {
                result: TypeHint::Dynamic,
                item: Some(item),
            },
        );
    }

    /// Forget an invocation once its completion has been handled.
    ///
    /// Returns `true` if the invocation was pending.
    pub fn complete_invocation(&self, invocation_id: &str) -> bool {
        let removed = self.pending.remove(invocation_id).is_some();
        if !removed {
            tracing::debug!(invocation_id, "completing unknown invocation");
        }
        removed
    }

    /// Number of invocations in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of registered targets.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.targets.read().len()
    }
}

impl InvocationBinder for MethodTable {
    fn parameter_types(&self, target: &str) -> Vec<TypeHint> {
        self.targets
            .read()
            .get(target)
            .map(|params| params.to_vec())
            .unwrap_or_default()
    }

    fn return_type(&self, invocation_id: &str) -> Option<TypeHint> {
        self.pending.get(invocation_id).map(|p| p.result.clone())
    }

    fn stream_item_type(&self, invocation_id: &str) -> Option<TypeHint> {
        self.pending
            .get(invocation_id)
            .map(|p| p.item.clone().unwrap_or_else(|| p.result.clone()))
    }
}
