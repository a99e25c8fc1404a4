//! Attribute flags for types, members, parameters and generic parameters.
//!
//! The bit values follow the ECMA-335 encodings (§II.23.1) so registrations can be derived
//! mechanically from existing metadata.

use bitflags::bitflags;

/// Bitmask for member `ACCESS` extraction
pub const MEMBER_ACCESS_MASK: u32 = 0x0007;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Member access flags, shared by fields and methods
    pub struct MemberAccess: u32 {
        /// Member not referenceable
        const COMPILER_CONTROLLED = 0x0000;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessibly by anyone in the assembly
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessibly by sub-types anywhere, plus anyone in assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessibly by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
    }
}

impl MemberAccess {
    /// Extract access flags from raw field or method attributes
    #[must_use]
    pub fn from_flags(flags: u32) -> Self {
        Self::from_bits_truncate(flags & MEMBER_ACCESS_MASK)
    }

    /// Returns true if the member is public
    #[must_use]
    pub fn is_public(self) -> bool {
        self == MemberAccess::PUBLIC
    }

    /// Returns true if the member is visible assembly-wide without being public
    #[must_use]
    pub fn is_internal(self) -> bool {
        self == MemberAccess::ASSEM || self == MemberAccess::FAM_OR_ASSEM
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Field attributes (without the access bits)
    pub struct FieldAttributes: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written to after init
        const INIT_ONLY = 0x0020;
        /// Value is compile time constant
        const LITERAL = 0x0040;
        /// Field is special
        const SPECIAL_NAME = 0x0200;
        /// Field has a default value
        const HAS_DEFAULT = 0x8000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method and constructor attributes (without the access bits)
    pub struct MethodModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special (property and event accessors)
        const SPECIAL_NAME = 0x0800;
        /// Runtime-special name (constructors)
        const RTSPECIAL_NAME = 0x1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Parameter attributes
    pub struct ParamAttributes: u32 {
        /// Param is \[In\]
        const IN = 0x0001;
        /// Param is \[out\]
        const OUT = 0x0002;
        /// Param is optional
        const OPTIONAL = 0x0010;
        /// Param has default value
        const HAS_DEFAULT = 0x1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Generic parameter special constraints
    pub struct GenericParamAttributes: u32 {
        /// The generic parameter is covariant
        const COVARIANT = 0x0001;
        /// The generic parameter is contravariant
        const CONTRAVARIANT = 0x0002;
        /// The generic parameter has the class special constraint
        const REFERENCE_TYPE_CONSTRAINT = 0x0004;
        /// The generic parameter has the valuetype special constraint
        const NOT_NULLABLE_VALUE_TYPE_CONSTRAINT = 0x0008;
        /// The generic parameter has the .ctor special constraint
        const DEFAULT_CONSTRUCTOR_CONSTRAINT = 0x0010;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Type attributes relevant to member discovery and invocation
    pub struct TypeAttributes: u32 {
        /// Type is visible outside its assembly
        const PUBLIC = 0x0001;
        /// Type is an interface
        const INTERFACE = 0x0020;
        /// Type is abstract
        const ABSTRACT = 0x0080;
        /// Type cannot be derived from
        const SEALED = 0x0100;
        /// Stack-only type; cannot be boxed, so members using it are not uniformly accessible
        const BYREF_LIKE = 0x0001_0000;
        /// Awaitable type; methods returning it are reported as task-like
        const TASK_LIKE = 0x0002_0000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_extraction() {
        let flags = 0x0006 | 0x0010;
        assert!(MemberAccess::from_flags(flags).is_public());
        assert!(!MemberAccess::from_flags(flags).is_internal());
        assert!(MemberAccess::from_flags(0x0003).is_internal());
        assert!(MemberAccess::from_flags(0x0005).is_internal());
        assert!(!MemberAccess::from_flags(0x0001).is_public());
    }

    #[test]
    fn test_field_attribute_bits() {
        let flags = FieldAttributes::from_bits_truncate(0x0010 | 0x0020 | 0x0006);
        assert!(flags.contains(FieldAttributes::STATIC));
        assert!(flags.contains(FieldAttributes::INIT_ONLY));
        assert!(!flags.contains(FieldAttributes::LITERAL));
    }
}
