//! Built-in primitive types.
//!
//! Primitives are pre-registered by every [`crate::metadata::typesystem::TypeRegistry`] under
//! fixed tokens in the `0xF0` table, so their identities are stable across registries.

use strum::{Display, EnumIter, IntoEnumIterator};

use crate::{
    metadata::token::{Token, TokenKind},
    value::Value,
};

/// The kinds of built-in primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum PrimitiveKind {
    /// `System.Void` - the return type of methods without a result
    Void,
    /// `System.Boolean`
    Boolean,
    /// `System.Char`
    Char,
    /// `System.SByte`
    I1,
    /// `System.Byte`
    U1,
    /// `System.Int16`
    I2,
    /// `System.UInt16`
    U2,
    /// `System.Int32`
    I4,
    /// `System.UInt32`
    U4,
    /// `System.Int64`
    I8,
    /// `System.UInt64`
    U8,
    /// `System.Single`
    R4,
    /// `System.Double`
    R8,
    /// `System.IntPtr`
    I,
    /// `System.UIntPtr`
    U,
    /// `System.Object` - the root of the type hierarchy
    Object,
    /// `System.String`
    String,
    /// `System.ValueType` - the base of every value type
    ValueType,
}

impl PrimitiveKind {
    /// Returns the fixed token of this primitive
    #[must_use]
    pub fn token(self) -> Token {
        Token::from_parts(TokenKind::Primitive, self as u32 + 1)
    }

    /// Finds the primitive a token names, if any
    #[must_use]
    pub fn from_token(token: Token) -> Option<PrimitiveKind> {
        if token.kind() != Some(TokenKind::Primitive) {
            return None;
        }

        PrimitiveKind::iter().find(|kind| kind.token() == token)
    }

    /// The primitive a boxed value is an instance of, if it is a primitive at all
    #[must_use]
    pub fn of_value(value: &Value) -> Option<PrimitiveKind> {
        let kind = match value {
            Value::Boolean(_) => PrimitiveKind::Boolean,
            Value::Char(_) => PrimitiveKind::Char,
            Value::I1(_) => PrimitiveKind::I1,
            Value::U1(_) => PrimitiveKind::U1,
            Value::I2(_) => PrimitiveKind::I2,
            Value::U2(_) => PrimitiveKind::U2,
            Value::I4(_) => PrimitiveKind::I4,
            Value::U4(_) => PrimitiveKind::U4,
            Value::I8(_) => PrimitiveKind::I8,
            Value::U8(_) => PrimitiveKind::U8,
            Value::R4(_) => PrimitiveKind::R4,
            Value::R8(_) => PrimitiveKind::R8,
            Value::I(_) => PrimitiveKind::I,
            Value::U(_) => PrimitiveKind::U,
            Value::String(_) => PrimitiveKind::String,
            _ => return None,
        };
        Some(kind)
    }

    /// Implicit numeric conversions, in order of preference.
    ///
    /// The position of `target` in the list is the cost the resolver assigns to the conversion;
    /// `None` if no implicit conversion exists.
    #[must_use]
    pub fn widening_rank(self, target: PrimitiveKind) -> Option<u32> {
        use PrimitiveKind::{Char, I1, I2, I4, I8, R4, R8, U1, U2, U4, U8};

        let targets: &[PrimitiveKind] = match self {
            I1 => &[I2, I4, I8, R4, R8],
            U1 => &[I2, U2, I4, U4, I8, U8, R4, R8],
            I2 => &[I4, I8, R4, R8],
            U2 => &[I4, U4, I8, U8, R4, R8],
            I4 => &[I8, R4, R8],
            U4 => &[I8, U8, R4, R8],
            I8 | U8 => &[R4, R8],
            Char => &[U2, I4, U4, I8, U8, R4, R8],
            R4 => &[R8],
            _ => &[],
        };

        targets
            .iter()
            .position(|candidate| *candidate == target)
            .and_then(|position| u32::try_from(position).ok())
            .map(|position| position + 1)
    }

    /// The namespace all primitives live in
    #[must_use]
    pub fn namespace(self) -> &'static str {
        "System"
    }

    /// The simple type name of this primitive
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Void => "Void",
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Char => "Char",
            PrimitiveKind::I1 => "SByte",
            PrimitiveKind::U1 => "Byte",
            PrimitiveKind::I2 => "Int16",
            PrimitiveKind::U2 => "UInt16",
            PrimitiveKind::I4 => "Int32",
            PrimitiveKind::U4 => "UInt32",
            PrimitiveKind::I8 => "Int64",
            PrimitiveKind::U8 => "UInt64",
            PrimitiveKind::R4 => "Single",
            PrimitiveKind::R8 => "Double",
            PrimitiveKind::I => "IntPtr",
            PrimitiveKind::U => "UIntPtr",
            PrimitiveKind::Object => "Object",
            PrimitiveKind::String => "String",
            PrimitiveKind::ValueType => "ValueType",
        }
    }

    /// Returns true for primitives with value semantics.
    ///
    /// `Void` counts as a value type (as in the CLR), `ValueType` itself is the abstract
    /// reference-typed base class and does not.
    #[must_use]
    pub fn is_value_type(self) -> bool {
        !matches!(
            self,
            PrimitiveKind::Object | PrimitiveKind::String | PrimitiveKind::ValueType
        )
    }

    /// The value an uninitialised field or omitted argument of this primitive holds
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            PrimitiveKind::Void => Value::Void,
            PrimitiveKind::Boolean => Value::Boolean(false),
            PrimitiveKind::Char => Value::Char('\0'),
            PrimitiveKind::I1 => Value::I1(0),
            PrimitiveKind::U1 => Value::U1(0),
            PrimitiveKind::I2 => Value::I2(0),
            PrimitiveKind::U2 => Value::U2(0),
            PrimitiveKind::I4 => Value::I4(0),
            PrimitiveKind::U4 => Value::U4(0),
            PrimitiveKind::I8 => Value::I8(0),
            PrimitiveKind::U8 => Value::U8(0),
            PrimitiveKind::R4 => Value::R4(0.0),
            PrimitiveKind::R8 => Value::R8(0.0),
            PrimitiveKind::I => Value::I(0),
            PrimitiveKind::U => Value::U(0),
            PrimitiveKind::Object | PrimitiveKind::String | PrimitiveKind::ValueType => {
                Value::Null
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_tokens_roundtrip() {
        for kind in PrimitiveKind::iter() {
            assert_eq!(PrimitiveKind::from_token(kind.token()), Some(kind));
        }
    }

    #[test]
    fn test_primitive_tokens_unique() {
        let mut tokens: Vec<Token> = PrimitiveKind::iter().map(PrimitiveKind::token).collect();
        tokens.sort();
        tokens.dedup();
        assert_eq!(tokens.len(), PrimitiveKind::iter().count());
    }

    #[test]
    fn test_value_semantics() {
        assert!(PrimitiveKind::I4.is_value_type());
        assert!(PrimitiveKind::Boolean.is_value_type());
        assert!(!PrimitiveKind::String.is_value_type());
        assert!(!PrimitiveKind::Object.is_value_type());
        assert!(!PrimitiveKind::ValueType.is_value_type());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(PrimitiveKind::I4.default_value(), Value::I4(0));
        assert_eq!(PrimitiveKind::String.default_value(), Value::Null);
        assert_eq!(PrimitiveKind::Boolean.default_value(), Value::Boolean(false));
    }

    #[test]
    fn test_widening_rank() {
        assert_eq!(PrimitiveKind::I4.widening_rank(PrimitiveKind::I8), Some(1));
        assert_eq!(PrimitiveKind::I4.widening_rank(PrimitiveKind::R8), Some(3));
        assert_eq!(PrimitiveKind::I8.widening_rank(PrimitiveKind::I4), None);
        assert_eq!(PrimitiveKind::I4.widening_rank(PrimitiveKind::I4), None);
        assert_eq!(PrimitiveKind::String.widening_rank(PrimitiveKind::Object), None);
    }

    #[test]
    fn test_of_value() {
        assert_eq!(PrimitiveKind::of_value(&Value::I4(1)), Some(PrimitiveKind::I4));
        assert_eq!(PrimitiveKind::of_value(&Value::from("a")), Some(PrimitiveKind::String));
        assert_eq!(PrimitiveKind::of_value(&Value::Null), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(PrimitiveKind::I4.name(), "Int32");
        assert_eq!(PrimitiveKind::String.namespace(), "System");
    }
}
