//! Identity tokens for types and members.
//!
//! Every type and member known to a [`crate::metadata::typesystem::TypeRegistry`] is named by a
//! [`Token`]: a 32-bit value whose high byte selects a [`TokenKind`] and whose low 24 bits are a
//! row counter within that kind. Tokens are cheap to copy, totally ordered and hashable, which
//! makes them the key of every cache in this crate. A token never owns the metadata it names;
//! the registry re-resolves it on demand.

use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::atomic::{AtomicU32, Ordering},
};

use strum::{Display, EnumIter, FromRepr};

use crate::Result;

/// The table a [`Token`] belongs to, encoded in its high byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, FromRepr)]
#[repr(u8)]
pub enum TokenKind {
    /// A registered type definition (class, value type, interface, delegate)
    TypeDef = 0x02,
    /// A field definition
    Field = 0x04,
    /// A method or constructor definition
    Method = 0x06,
    /// A parameter definition
    Param = 0x08,
    /// An event definition
    Event = 0x14,
    /// A property definition
    Property = 0x17,
    /// A constructed type (nullable, array, tuple, pointer, by-ref, generic parameter)
    TypeSpec = 0x1B,
    /// A built-in primitive type
    Primitive = 0xF0,
}

/// A metadata token representing a reference to a type or member.
///
/// Tokens consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the [`TokenKind`]
/// - The low 24 bits (bits 0-23) indicate the row index within that kind
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Token(pub u32);

impl Token {
    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a kind and a row
    #[must_use]
    pub fn from_parts(kind: TokenKind, row: u32) -> Self {
        Token((u32::from(kind as u8) << 24) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Returns the [`TokenKind`] of this token, if the table byte is a known one
    #[must_use]
    pub fn kind(&self) -> Option<TokenKind> {
        TokenKind::from_repr(self.table())
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if this token names a type (definition, constructed or primitive)
    #[must_use]
    pub fn is_type(&self) -> bool {
        matches!(
            self.kind(),
            Some(TokenKind::TypeDef | TokenKind::TypeSpec | TokenKind::Primitive)
        )
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Hands out fresh tokens, one row counter per [`TokenKind`].
///
/// Primitive tokens are fixed and never allocated here.
pub(crate) struct TokenAllocator {
    types: AtomicU32,
    fields: AtomicU32,
    methods: AtomicU32,
    params: AtomicU32,
    events: AtomicU32,
    properties: AtomicU32,
    specs: AtomicU32,
}

impl TokenAllocator {
    /// Largest row a token can carry
    pub(crate) const MAX_ROW: u32 = 0x00FF_FFFF;

    pub(crate) fn new() -> Self {
        Self::starting_at(1)
    }

    fn starting_at(row: u32) -> Self {
        TokenAllocator {
            types: AtomicU32::new(row),
            fields: AtomicU32::new(row),
            methods: AtomicU32::new(row),
            params: AtomicU32::new(row),
            events: AtomicU32::new(row),
            properties: AtomicU32::new(row),
            specs: AtomicU32::new(row),
        }
    }

    /// Allocates the next token of `kind`
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] once the 24-bit rows of `kind` are used up.
    pub(crate) fn next(&self, kind: TokenKind) -> Result<Token> {
        let counter = match kind {
            TokenKind::TypeDef => &self.types,
            TokenKind::Field => &self.fields,
            TokenKind::Method => &self.methods,
            TokenKind::Param => &self.params,
            TokenKind::Event => &self.events,
            TokenKind::Property => &self.properties,
            TokenKind::TypeSpec | TokenKind::Primitive => &self.specs,
        };

        // the counter stops at the limit so exhaustion never wraps into live rows
        let row = counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |row| {
                (row <= Self::MAX_ROW).then_some(row + 1)
            })
            .map_err(|_| malformed_error!("token rows exhausted for {}", kind))?;

        let kind = if kind == TokenKind::Primitive {
            TokenKind::TypeSpec
        } else {
            kind
        };
        Ok(Token::from_parts(kind, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_token_parts() {
        let token = Token::from_parts(TokenKind::Method, 5);
        assert_eq!(token.value(), 0x06000005);
        assert_eq!(token.table(), 0x06);
        assert_eq!(token.row(), 5);
        assert_eq!(token.kind(), Some(TokenKind::Method));
    }

    #[test]
    fn test_token_is_type() {
        assert!(Token::from_parts(TokenKind::TypeDef, 1).is_type());
        assert!(Token::from_parts(TokenKind::TypeSpec, 1).is_type());
        assert!(Token::from_parts(TokenKind::Primitive, 1).is_type());
        assert!(!Token::from_parts(TokenKind::Field, 1).is_type());
        assert!(!Token::new(0x7700_0001).is_type());
    }

    #[test]
    fn test_token_is_null() {
        assert!(Token(0).is_null());
        assert!(!Token(0x02000001).is_null());
    }

    #[test]
    fn test_token_display_and_debug() {
        let token = Token(0x06000001);
        assert_eq!(format!("{}", token), "0x06000001");

        let debug_str = format!("{:?}", token);
        assert!(debug_str.contains("table: 0x06"));
        assert!(debug_str.contains("row: 1"));
    }

    #[test]
    fn test_token_as_key() {
        let mut map = HashMap::new();
        map.insert(Token(0x04000001), "field");
        map.insert(Token(0x06000001), "method");

        assert_eq!(map.get(&Token(0x04000001)), Some(&"field"));
        assert_eq!(map.get(&Token(0x06000001)), Some(&"method"));
    }

    #[test]
    fn test_allocator_counts_per_kind_raw_values() {
        let allocator = TokenAllocator::new();
        let a = allocator.next(TokenKind::Field).unwrap();
        let b = allocator.next(TokenKind::Field).unwrap();
        let c = allocator.next(TokenKind::Method).unwrap();

        assert_eq!(a, Token(0x04000001));
        assert_eq!(b, Token(0x04000002));
        assert_eq!(c, Token(0x06000001));
    }

    #[test]
    fn test_allocator_counts_per_kind() {
        let tokens = TokenAllocator::new();
        assert_eq!(tokens.next(TokenKind::Field).unwrap().row(), 1);
        assert_eq!(tokens.next(TokenKind::Field).unwrap().row(), 2);
        assert_eq!(tokens.next(TokenKind::Method).unwrap().row(), 1);

        let spec = tokens.next(TokenKind::Primitive).unwrap();
        assert_eq!(spec.kind(), Some(TokenKind::TypeSpec));
        assert_eq!(tokens.next(TokenKind::TypeSpec).unwrap().row(), 2);
    }

    #[test]
    fn test_allocator_exhaustion() {
        let tokens = TokenAllocator::starting_at(TokenAllocator::MAX_ROW);
        let last = tokens.next(TokenKind::TypeDef).unwrap();
        assert_eq!(last.row(), TokenAllocator::MAX_ROW);
        assert_eq!(last.kind(), Some(TokenKind::TypeDef));

        assert!(matches!(
            tokens.next(TokenKind::TypeDef),
            Err(crate::Error::Malformed { .. })
        ));
        assert!(matches!(
            tokens.next(TokenKind::TypeDef),
            Err(crate::Error::Malformed { .. })
        ));
        assert!(tokens.next(TokenKind::Field).is_ok());
    }
}
