//! Shared test infrastructure.
//!
//! [`fixtures`] registers a small, fixed set of host types that unit tests across the crate
//! build on: a value type with a field constructor, a class hierarchy with virtual methods,
//! an abstract type, and static helper classes exercising overloads and generics.

pub mod fixtures;

use crate::{value::Value, Error, Result};

/// Reads an `i32` argument of a native body, failing like a cast would
pub fn int_arg(args: &[Value], index: usize) -> Result<i32> {
    args.get(index)
        .and_then(Value::as_i32)
        .ok_or_else(|| Error::InvalidCast {
            from: args
                .get(index)
                .map_or_else(|| "missing".to_string(), ToString::to_string),
            to: "System.Int32".to_string(),
        })
}
