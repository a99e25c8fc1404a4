//! The host type system the engine reflects over.
//!
//! This module provides the representation of registered types: classes, value types,
//! interfaces and delegates declared through [`TypeBuilder`], the built-in primitives, and the
//! constructed types (nullable, array, tuple, pointer, by-ref, generic parameter placeholders)
//! the [`TypeRegistry`] creates on demand.
//!
//! # Key Components
//!
//! - [`TypeDef`]: A registered or constructed type, with its raw member lists
//! - [`TypeFlavor`]: The structural kind of a type
//! - [`TypeRegistry`]: Thread-safe registry for all types, assignability and conversions
//! - [`TypeBuilder`]: Fluent registration of new types and their members
//! - [`PrimitiveKind`]: Built-in primitive types (int32, string, object, etc.)
//!
//! # Examples
//!
//! ```rust
//! use reflectscope::metadata::typesystem::{FieldSpec, PrimitiveKind, TypeBuilder, TypeRegistry};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(TypeRegistry::new());
//! let point = TypeBuilder::new(registry.clone())
//!     .value_type("Geometry", "Point")
//!     .field(FieldSpec::new("X", PrimitiveKind::I4.token()))
//!     .field(FieldSpec::new("Y", PrimitiveKind::I4.token()))
//!     .build()?;
//!
//! assert_eq!(point.fullname(), "Geometry.Point");
//! assert!(registry.get_by_fullname("Geometry.Point").is_some());
//! # Ok::<(), reflectscope::Error>(())
//! ```

mod builder;
mod primitives;
mod registry;

use std::sync::{Arc, RwLock};

pub use builder::{
    ConstructorSpec, EventSpec, FieldSpec, GenericParamSpec, MethodSpec, ParamSpec, PropertySpec,
    TypeBuilder,
};
pub use primitives::PrimitiveKind;
pub use registry::{TypeRegistry, MAX_VALUE_DEPTH};

use crate::{
    metadata::{
        customattributes::CustomAttribute,
        members::{
            ConstructorRc, EventRc, FieldRc, MethodRc, PropertyRc, TypeAttributes,
        },
        token::Token,
    },
    value::Value,
    Error, Result,
};

/// Reference to a `TypeDef`
pub type TypeRc = Arc<TypeDef>;

/// The structural kind of a type.
///
/// Constructed flavors carry the tokens of their component types; two constructed types with
/// equal flavors are the same type, which is how the registry deduplicates them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeFlavor {
    /// A built-in primitive
    Primitive(PrimitiveKind),
    /// A reference type with fields and methods
    Class,
    /// A user-defined value type with copy semantics
    ValueType,
    /// An interface; only declares abstract members
    Interface,
    /// A delegate type; the handler type of events
    Delegate,
    /// `Nullable<T>` over a non-nullable value type
    Nullable(Token),
    /// A zero-based single-dimensional array of the element type
    Array(Token),
    /// A value tuple of the element types
    Tuple(Vec<Token>),
    /// An unmanaged pointer to the pointee type
    Pointer(Token),
    /// A managed reference to the referenced type
    ByRef(Token),
    /// The placeholder for the generic method parameter at the given position
    GenericParameter(usize),
}

/// A type known to a [`TypeRegistry`].
///
/// Member lists are append-only and filled once by [`TypeBuilder`] before the type is
/// published to the registry. Static field storage lives on the type itself; instance field
/// storage lives in the [`crate::value::Object`]s the registry allocates.
pub struct TypeDef {
    /// Token
    pub token: Token,
    /// `TypeNamespace` (empty for constructed types)
    pub namespace: String,
    /// `TypeName`
    pub name: String,
    /// The structural kind
    pub flavor: TypeFlavor,
    /// `TypeAttributes` flags
    pub flags: TypeAttributes,
    /// This types base aka 'extends'
    pub base: Option<Token>,
    /// All interfaces this type implements
    pub interfaces: boxcar::Vec<Token>,
    /// All fields this type declares
    pub fields: boxcar::Vec<FieldRc>,
    /// All methods this type declares, including property and event accessors
    pub methods: boxcar::Vec<MethodRc>,
    /// All instance constructors this type declares
    pub constructors: boxcar::Vec<ConstructorRc>,
    /// All properties this type declares
    pub properties: boxcar::Vec<PropertyRc>,
    /// All events this type declares
    pub events: boxcar::Vec<EventRc>,
    /// All custom attributes this type has
    pub custom_attributes: boxcar::Vec<CustomAttribute>,
    /// Number of instance field slots, including those of all base types
    pub instance_slots: usize,
    statics: RwLock<Vec<Value>>,
}

impl TypeDef {
    /// Create a new type without members
    ///
    /// ## Arguments
    /// * `token` - The token of this type
    /// * `namespace` - The namespace
    /// * `name` - The simple name
    /// * `flavor` - The structural kind
    /// * `flags` - The type attributes
    /// * `base` - The base type, if any
    /// * `instance_slots` - Total number of instance field slots
    /// * `statics` - Initial values of the static field slots
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        token: Token,
        namespace: String,
        name: String,
        flavor: TypeFlavor,
        flags: TypeAttributes,
        base: Option<Token>,
        instance_slots: usize,
        statics: Vec<Value>,
    ) -> Self {
        TypeDef {
            token,
            namespace,
            name,
            flavor,
            flags,
            base,
            interfaces: boxcar::Vec::new(),
            fields: boxcar::Vec::new(),
            methods: boxcar::Vec::new(),
            constructors: boxcar::Vec::new(),
            properties: boxcar::Vec::new(),
            events: boxcar::Vec::new(),
            custom_attributes: boxcar::Vec::new(),
            instance_slots,
            statics: RwLock::new(statics),
        }
    }

    /// The full name, `Namespace.Name`
    #[must_use]
    pub fn fullname(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Returns true for types with value semantics (primitives, value types, nullables and
    /// tuples)
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        match &self.flavor {
            TypeFlavor::Primitive(kind) => kind.is_value_type(),
            TypeFlavor::ValueType | TypeFlavor::Nullable(_) | TypeFlavor::Tuple(_) => true,
            _ => false,
        }
    }

    /// Returns true for interfaces
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flavor == TypeFlavor::Interface
    }

    /// Returns true if instances of this type cannot be created directly
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.is_interface() || self.flags.contains(TypeAttributes::ABSTRACT)
    }

    /// Returns true if this type is visible outside of its registration scope
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.flags.contains(TypeAttributes::PUBLIC)
    }

    /// Returns true for types values of which cannot be boxed into a [`Value`]
    #[must_use]
    pub fn is_byref_like(&self) -> bool {
        matches!(self.flavor, TypeFlavor::Pointer(_) | TypeFlavor::ByRef(_))
            || self.flags.contains(TypeAttributes::BYREF_LIKE)
    }

    /// Returns true for awaitable types
    #[must_use]
    pub fn is_task_like(&self) -> bool {
        self.flags.contains(TypeAttributes::TASK_LIKE)
    }

    /// Reads the static field slot `slot`
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfRange`] for an unknown slot, or [`Error::LockError`].
    pub fn load_static(&self, slot: usize) -> Result<Value> {
        let statics = read_lock!(self.statics)?;
        statics.get(slot).cloned().ok_or(Error::IndexOutOfRange {
            index: slot,
            len: statics.len(),
        })
    }

    /// Writes the static field slot `slot`
    ///
    /// # Errors
    /// Returns [`Error::IndexOutOfRange`] for an unknown slot, or [`Error::LockError`].
    pub fn store_static(&self, slot: usize, value: Value) -> Result<()> {
        let mut statics = write_lock!(self.statics)?;
        let len = statics.len();
        match statics.get_mut(slot) {
            Some(target) => {
                *target = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfRange { index: slot, len }),
        }
    }

    /// Finds a field declared directly on this type by its declared name
    #[must_use]
    pub fn declared_field(&self, name: &str) -> Option<FieldRc> {
        self.fields
            .iter()
            .find(|(_, field)| field.name == name)
            .map(|(_, field)| field.clone())
    }
}

impl std::fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDef")
            .field("token", &self.token)
            .field("fullname", &self.fullname())
            .field("flavor", &self.flavor)
            .field("base", &self.base)
            .field("fields", &self.fields.count())
            .field("methods", &self.methods.count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statics_storage() {
        let def = TypeDef::new(
            Token(0x02000001),
            "Demo".to_string(),
            "Counter".to_string(),
            TypeFlavor::Class,
            TypeAttributes::PUBLIC,
            None,
            0,
            vec![Value::I4(0)],
        );

        def.store_static(0, Value::I4(3)).unwrap();
        assert_eq!(def.load_static(0).unwrap(), Value::I4(3));
        assert!(def.store_static(1, Value::Null).is_err());
        assert_eq!(def.fullname(), "Demo.Counter");
    }

    #[test]
    fn test_flavor_predicates() {
        let nullable = TypeDef::new(
            Token(0x1B000001),
            String::new(),
            "System.Nullable<System.Int32>".to_string(),
            TypeFlavor::Nullable(PrimitiveKind::I4.token()),
            TypeAttributes::PUBLIC,
            None,
            0,
            Vec::new(),
        );

        assert!(nullable.is_value_type());
        assert!(!nullable.is_byref_like());
        assert_eq!(nullable.fullname(), "System.Nullable<System.Int32>");
    }
}
