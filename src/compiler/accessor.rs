//! The compiled accessor shapes.

use std::{fmt, sync::Arc};

use crate::{value::Value, Result};

/// The inputs of one accessor invocation, as seen by lowered nodes
pub struct Frame<'a> {
    /// The receiver; `null` for static members and creators
    pub instance: &'a Value,
    /// The argument list
    pub args: &'a [Value],
    /// The value a setter stores; `null` for every other shape
    pub value: &'a Value,
}

/// A lowered node
pub(crate) type Thunk = Arc<dyn Fn(&Frame<'_>) -> Result<Value> + Send + Sync>;

macro_rules! accessor {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            member: Arc<str>,
            thunk: Thunk,
        }

        impl $name {
            pub(crate) fn new(member: &str, thunk: Thunk) -> Self {
                $name {
                    member: Arc::from(member),
                    thunk,
                }
            }

            /// Display name of the member this accessor was compiled for
            #[must_use]
            pub fn member(&self) -> &str {
                &self.member
            }

            /// Returns true if both handles share the same compiled code
            #[must_use]
            pub fn ptr_eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.thunk, &other.thunk)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.member)
            }
        }
    };
}

accessor!(
    /// Creates instances through one constructor
    Creator
);
accessor!(
    /// Reads one field or property
    Getter
);
accessor!(
    /// Writes one field or property
    Setter
);
accessor!(
    /// Calls one method (or indexer accessor)
    Invoker
);

impl Creator {
    /// Allocates an instance and runs the constructor with `args`
    ///
    /// # Errors
    /// Returns [`crate::Error::ArgumentCount`] for an argument list that does not fit the
    /// constructor, conversion errors for arguments that do not fit their parameter, and any
    /// error raised by the constructor body.
    pub fn create(&self, args: &[Value]) -> Result<Value> {
        (self.thunk)(&Frame {
            instance: &Value::Null,
            args,
            value: &Value::Null,
        })
    }
}

impl Getter {
    /// Reads the current value from `instance` (`null` for static members)
    ///
    /// # Errors
    /// Returns [`crate::Error::NullReference`] or [`crate::Error::InvalidCast`] for an unusable
    /// receiver, and any error raised by a property getter body.
    pub fn get(&self, instance: &Value) -> Result<Value> {
        (self.thunk)(&Frame {
            instance,
            args: &[],
            value: &Value::Null,
        })
    }
}

impl Setter {
    /// Stores `value` into `instance` (`null` for static members)
    ///
    /// # Errors
    /// Returns receiver and conversion errors, and any error raised by a property setter body.
    pub fn set(&self, instance: &Value, value: Value) -> Result<()> {
        (self.thunk)(&Frame {
            instance,
            args: &[],
            value: &value,
        })?;
        Ok(())
    }
}

impl Invoker {
    /// Calls the method on `instance` (`null` for static methods) with `args`.
    ///
    /// Methods without a result return [`Value::Void`].
    ///
    /// # Errors
    /// Returns receiver, arity and conversion errors, and any error raised by the method body.
    pub fn invoke(&self, instance: &Value, args: &[Value]) -> Result<Value> {
        (self.thunk)(&Frame {
            instance,
            args,
            value: &Value::Null,
        })
    }
}
