//! The uniform boxed value model.
//!
//! Every accessor produced by this crate takes and returns [`Value`]s: the equivalent of a
//! boxed `object` in a managed runtime. Primitives are stored inline, strings are shared
//! `Arc<str>`, and instances of registered types live on the heap as [`Object`]s.
//!
//! # Key Types
//!
//! - [`Value`] - A boxed runtime value
//! - [`Object`] / [`ObjectRef`] - A heap instance of a registered class or value type
//! - [`Array`] / [`ArrayRef`] - A zero-based single-dimensional array
//! - [`Delegate`] - A (multicast) callable value, used for event handlers
//! - [`tuple`] - Packing of argument lists into nested tuples

mod object;
pub mod tuple;

use std::{fmt, sync::Arc};

pub use object::{Array, ArrayRef, Callable, Delegate, Object, ObjectRef};

/// A boxed runtime value.
///
/// `Null` is the null reference (and the empty value of a `Nullable<T>`); `Void` is the
/// "no value" sentinel returned by invokers of methods without a result.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// The null reference
    #[default]
    Null,
    /// No value - the result of a void method
    Void,
    /// `System.Boolean`
    Boolean(bool),
    /// `System.Char`
    Char(char),
    /// `System.SByte`
    I1(i8),
    /// `System.Byte`
    U1(u8),
    /// `System.Int16`
    I2(i16),
    /// `System.UInt16`
    U2(u16),
    /// `System.Int32`
    I4(i32),
    /// `System.UInt32`
    U4(u32),
    /// `System.Int64`
    I8(i64),
    /// `System.UInt64`
    U8(u64),
    /// `System.Single`
    R4(f32),
    /// `System.Double`
    R8(f64),
    /// `System.IntPtr`
    I(isize),
    /// `System.UIntPtr`
    U(usize),
    /// `System.String`
    String(Arc<str>),
    /// An instance of a registered class or a boxed value type
    Object(ObjectRef),
    /// An array
    Array(ArrayRef),
    /// A value tuple; see [`tuple`] for the nesting rules of long tuples
    Tuple(Arc<[Value]>),
    /// A delegate
    Delegate(Delegate),
}

impl Value {
    /// Returns true for the null reference
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for the void sentinel
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    /// Returns the value as a `bool`, if it is one
    #[must_use]
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as an `i32`, widening smaller integers
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I1(value) => Some(i32::from(*value)),
            Value::U1(value) => Some(i32::from(*value)),
            Value::I2(value) => Some(i32::from(*value)),
            Value::U2(value) => Some(i32::from(*value)),
            Value::I4(value) => Some(*value),
            Value::Char(value) => i32::try_from(u32::from(*value)).ok(),
            _ => None,
        }
    }

    /// Returns the value as an `i64`, widening smaller integers
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I8(value) => Some(*value),
            Value::U4(value) => Some(i64::from(*value)),
            Value::I(value) => i64::try_from(*value).ok(),
            _ => self.as_i32().map(i64::from),
        }
    }

    /// Returns the value as an `f64`
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::R4(value) => Some(f64::from(*value)),
            Value::R8(value) => Some(*value),
            _ => self.as_i32().map(f64::from),
        }
    }

    /// Returns the string contents, if this is a string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(&**value),
            _ => None,
        }
    }

    /// Returns the heap object, if this is one
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Returns the array, if this is one
    #[must_use]
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Returns the tuple items, if this is a tuple
    #[must_use]
    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(items) => Some(&**items),
            _ => None,
        }
    }

    /// Returns the delegate, if this is one
    #[must_use]
    pub fn as_delegate(&self) -> Option<&Delegate> {
        match self {
            Value::Delegate(delegate) => Some(delegate),
            _ => None,
        }
    }

    /// Packs `values` into tuple form, see [`tuple::pack`]
    #[must_use]
    pub fn tuple(values: Vec<Value>) -> Value {
        tuple::pack(values)
    }
}

impl PartialEq for Value {
    /// Primitives and strings compare by value, heap values by reference identity and
    /// tuples element-wise.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Void, Value::Void) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::I1(a), Value::I1(b)) => a == b,
            (Value::U1(a), Value::U1(b)) => a == b,
            (Value::I2(a), Value::I2(b)) => a == b,
            (Value::U2(a), Value::U2(b)) => a == b,
            (Value::I4(a), Value::I4(b)) => a == b,
            (Value::U4(a), Value::U4(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::R4(a), Value::R4(b)) => a == b,
            (Value::R8(a), Value::R8(b)) => a == b,
            (Value::I(a), Value::I(b)) => a == b,
            (Value::U(a), Value::U(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Delegate(a), Value::Delegate(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Void => write!(f, "void"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Char(value) => write!(f, "'{value}'"),
            Value::I1(value) => write!(f, "{value}"),
            Value::U1(value) => write!(f, "{value}"),
            Value::I2(value) => write!(f, "{value}"),
            Value::U2(value) => write!(f, "{value}"),
            Value::I4(value) => write!(f, "{value}"),
            Value::U4(value) => write!(f, "{value}"),
            Value::I8(value) => write!(f, "{value}"),
            Value::U8(value) => write!(f, "{value}"),
            Value::R4(value) => write!(f, "{value}"),
            Value::R8(value) => write!(f, "{value}"),
            Value::I(value) => write!(f, "{value}"),
            Value::U(value) => write!(f, "{value}"),
            Value::String(value) => write!(f, "\"{value}\""),
            Value::Object(object) => write!(f, "object<{}>", object.type_token()),
            Value::Array(array) => write!(f, "array<{}>", array.element_type()),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Value::Delegate(delegate) => write!(f, "delegate<{}>", delegate.handler_type()),
        }
    }
}

macro_rules! impl_value_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_value_from! {
    bool => Boolean,
    char => Char,
    i8 => I1,
    u8 => U1,
    i16 => I2,
    u16 => U2,
    i32 => I4,
    u32 => U4,
    i64 => I8,
    u64 => U8,
    f32 => R4,
    f64 => R8,
    isize => I,
    usize => U,
    ObjectRef => Object,
    ArrayRef => Array,
    Delegate => Delegate,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Arc::from(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::Token;

    #[test]
    fn test_primitive_equality() {
        assert_eq!(Value::from(3), Value::I4(3));
        assert_ne!(Value::I4(3), Value::I8(3));
        assert_ne!(Value::Null, Value::Void);
        assert_eq!(Value::from("a"), Value::from(String::from("a")));
    }

    #[test]
    fn test_object_identity_equality() {
        let a = Object::new(Token(0x02000001), vec![Value::I4(1)]);
        let b = Object::new(Token(0x02000001), vec![Value::I4(1)]);

        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn test_widening_accessors() {
        assert_eq!(Value::I2(7).as_i32(), Some(7));
        assert_eq!(Value::I4(7).as_i64(), Some(7));
        assert_eq!(Value::I4(7).as_f64(), Some(7.0));
        assert_eq!(Value::from("x").as_i32(), None);
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(Some(5)), Value::I4(5));
        assert_eq!(Value::from(None::<i32>), Value::Null);
    }

    #[test]
    fn test_display() {
        let tuple = Value::tuple(vec![Value::I4(1), Value::from("b")]);
        assert_eq!(tuple.to_string(), "(1, \"b\")");
        assert_eq!(Value::Null.to_string(), "null");
    }
}
