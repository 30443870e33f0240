//! Binding generically decoded values to binder-reported types.
//!
//! Coercion is structural and best effort. A value that does not fit its
//! hint is passed through unchanged; so is every value the binder has no
//! hint for.

use hubwire_core::{TypeHint, Value};

/// Coerce `value` towards `hint`.
#[must_use]
pub fn coerce(value: Value, hint: &TypeHint) -> Value {
    match (hint, value) {
        (TypeHint::Dynamic, value) => value,
        (_, Value::Nil) => Value::Nil,

        (TypeHint::Bool, value @ Value::Bool(_)) => value,

        (TypeHint::Int, value @ (Value::Int(_) | Value::UInt(_))) => value,
        (TypeHint::Int, Value::Float(f)) if is_integral(f) => Value::Int(f as i64),

        (TypeHint::Float, value @ Value::Float(_)) => value,
        (TypeHint::Float, Value::Int(i)) => Value::Float(i as f64),
        (TypeHint::Float, Value::UInt(u)) => Value::Float(u as f64),

        (TypeHint::String, value @ Value::String(_)) => value,
        (TypeHint::String, Value::Bytes(bytes)) => match String::from_utf8(bytes) {
            Ok(s) => Value::String(s),
            Err(e) => Value::Bytes(e.into_bytes()),
        },

        (TypeHint::Bytes, value @ Value::Bytes(_)) => value,
        (TypeHint::Bytes, Value::String(s)) => Value::Bytes(s.into_bytes()),

        (TypeHint::List(element), Value::Array(items)) => Value::Array(
            items
                .into_iter()
                .map(|item| coerce(item, element))
                .collect(),
        ),

        (TypeHint::Map(key, val), Value::Map(entries)) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (coerce(k, key), coerce(v, val)))
                .collect(),
        ),

        (hint, value) => {
            tracing::trace!(
                expected = ?hint,
                found = value.kind(),
                "value does not match binder type, passing through"
            );
            value
        }
    }
}

/// Coerce positional arguments of `method` to `types`.
///
/// Arguments beyond the end of `types` pass through raw; missing arguments
/// are not an error here.
#[must_use]
pub fn bind_arguments(method: &str, arguments: Vec<Value>, types: &[TypeHint]) -> Vec<Value> {
    if types.len() < arguments.len() {
        tracing::trace!(
            method,
            expected = types.len(),
            received = arguments.len(),
            "binder reported fewer parameter types than arguments"
        );
    }

    arguments
        .into_iter()
        .enumerate()
        .map(|(i, arg)| match types.get(i) {
            Some(hint) => coerce(arg, hint),
            None => arg,
        })
        .collect()
}

fn is_integral(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}
