//! Immutable member descriptors.
//!
//! Discovery wraps every raw member definition of a type into a descriptor: a normalized,
//! immutable record carrying the member's effective name (after rename annotations), its
//! attributes, visibility and typed shape, plus lazily filled slots for its compiled accessors.
//! Descriptors are shared behind `Arc`s, compared and hashed by [`MemberId`] only, and are the
//! unit every accessor request goes through.
//!
//! # Key Types
//!
//! - [`MemberId`] - Stable identity of a member: declaring type + member token
//! - [`Member`] - Common descriptor interface
//! - [`DataMember`] - Members with a value (fields and properties)
//! - [`Overload`] - Members with a parameter list (methods and constructors)
//! - [`FieldDescriptor`], [`PropertyDescriptor`], [`MethodDescriptor`],
//!   [`ConstructorDescriptor`], [`EventDescriptor`], [`ParameterDescriptor`]

mod constructor;
mod event;
mod field;
mod method;
mod parameter;
mod property;

use std::{fmt, sync::Arc};

use strum::Display;

pub use constructor::ConstructorDescriptor;
pub use event::EventDescriptor;
pub use field::FieldDescriptor;
pub use method::{GenericParameterDescriptor, MethodDescriptor, ReturnDescriptor};
pub use parameter::ParameterDescriptor;
pub use property::PropertyDescriptor;

use crate::{
    compiler::{AccessorCompiler, Getter, Setter},
    metadata::{
        customattributes::{effective_name, CustomAttribute, CustomAttributeList},
        members::MemberAccess,
        token::Token,
    },
    Result,
};

/// Stable identity of a member: its declaring type and its own token.
///
/// Inherited members keep the identity of their declaring type, so a base class field seen
/// through a derived type is the same member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId {
    /// The declaring type
    pub owner: Token,
    /// The member token
    pub member: Token,
}

impl MemberId {
    /// Creates a member identity
    #[must_use]
    pub fn new(owner: Token, member: Token) -> Self {
        MemberId { owner, member }
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner, self.member)
    }
}

/// The kinds of members a type exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum MemberKind {
    /// An instance constructor
    Constructor,
    /// A field
    Field,
    /// A property or indexer
    Property,
    /// A method
    Method,
    /// An event
    Event,
}

/// The common part of every descriptor
#[derive(Debug, Clone)]
pub struct MemberInfo {
    /// Identity
    pub id: MemberId,
    /// The name used by every by-name lookup (rename annotation applied)
    pub name: String,
    /// The name as declared
    pub declared_name: String,
    /// Full name of the declaring type, for diagnostics
    pub owner_name: String,
    /// Custom attributes, in declaration order with duplicates preserved
    pub attributes: CustomAttributeList,
    /// Access level
    pub access: MemberAccess,
    /// Static member
    pub is_static: bool,
}

impl MemberInfo {
    /// Creates the common descriptor part, applying the rename annotation
    #[must_use]
    pub fn new(
        id: MemberId,
        declared_name: &str,
        owner_name: &str,
        attributes: &[CustomAttribute],
        access: MemberAccess,
        is_static: bool,
    ) -> Self {
        MemberInfo {
            id,
            name: effective_name(declared_name, attributes),
            declared_name: declared_name.to_string(),
            owner_name: owner_name.to_string(),
            attributes: Arc::from(attributes),
            access,
            is_static,
        }
    }
}

/// The interface all descriptors share
pub trait Member {
    /// The common descriptor part
    fn info(&self) -> &MemberInfo;

    /// The member kind
    fn kind(&self) -> MemberKind;

    /// Identity
    fn id(&self) -> MemberId {
        self.info().id
    }

    /// Identity used for equality and hashing; closed generic methods add their type
    /// arguments
    fn identity(&self) -> (MemberId, &[Token]) {
        (self.info().id, &[])
    }

    /// The effective name
    fn name(&self) -> &str {
        &self.info().name
    }

    /// The declared name
    fn declared_name(&self) -> &str {
        &self.info().declared_name
    }

    /// The declaring type
    fn declaring_type(&self) -> Token {
        self.info().id.owner
    }

    /// Custom attributes
    fn attributes(&self) -> &[CustomAttribute] {
        &self.info().attributes
    }

    /// Returns true for public members
    fn is_public(&self) -> bool {
        self.info().access.is_public()
    }

    /// Returns true for assembly-visible members
    fn is_internal(&self) -> bool {
        self.info().access.is_internal()
    }

    /// Returns true for static members
    fn is_static(&self) -> bool {
        self.info().is_static
    }

    /// `Owner::Name`, for diagnostics
    fn display_name(&self) -> String {
        format!("{}::{}", self.info().owner_name, self.info().name)
    }
}

/// Members holding a value: fields and properties
pub trait DataMember: Member + Send + Sync {
    /// The type of the value
    fn member_type(&self) -> Token;

    /// Returns true if the value can be read through a [`Getter`]
    fn can_read(&self) -> bool;

    /// Returns true if the value can be written through a [`Setter`]
    fn can_write(&self) -> bool;

    /// The compiled getter, `None` if the member cannot be read this way
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] if the accessor cannot be compiled.
    fn read_accessor(&self, compiler: &AccessorCompiler) -> Result<Option<Getter>>;

    /// The compiled setter, `None` for read-only members
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] if the accessor cannot be compiled.
    fn write_accessor(&self, compiler: &AccessorCompiler) -> Result<Option<Setter>>;
}

/// Members with an ordered parameter list: methods, constructors and indexers
pub trait Overload: Member + Send + Sync {
    /// The parameters, in order
    fn parameters(&self) -> &[ParameterDescriptor];

    /// Number of leading arguments a call must provide
    fn required_parameters(&self) -> usize {
        required_count(self.parameters())
    }
}

/// Number of leading arguments a call must provide: everything up to the last parameter that
/// is neither optional nor defaulted
pub(crate) fn required_count(parameters: &[ParameterDescriptor]) -> usize {
    parameters
        .iter()
        .rposition(|parameter| !parameter.is_optional())
        .map_or(0, |position| position + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_info_rename() {
        let attributes = vec![CustomAttribute::rename("full_name")];
        let info = MemberInfo::new(
            MemberId::new(Token(0x02000001), Token(0x04000001)),
            "FullName",
            "Demo.Person",
            &attributes,
            MemberAccess::PUBLIC,
            false,
        );

        assert_eq!(info.name, "full_name");
        assert_eq!(info.declared_name, "FullName");
        assert_eq!(info.attributes.len(), 1);
    }

    #[test]
    fn test_member_id_ordering_and_display() {
        let a = MemberId::new(Token(0x02000001), Token(0x04000001));
        let b = MemberId::new(Token(0x02000001), Token(0x04000002));
        assert!(a < b);
        assert_eq!(a.to_string(), "0x02000001:0x04000001");
    }
}
