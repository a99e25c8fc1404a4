//! Raw member definitions as registered by the host.
//!
//! These are the "reflection" inputs of the engine: plain records describing the fields,
//! methods, constructors, properties and events of a registered type, with native closures
//! implementing the methods and constructors. They are produced by
//! [`crate::metadata::typesystem::TypeBuilder`] and consumed by member discovery, which wraps
//! them into immutable descriptors.
//!
//! # Key Types
//!
//! - [`FieldDef`], [`MethodDef`], [`ConstructorDef`], [`PropertyDef`], [`EventDef`]
//! - [`ParamDef`], [`GenericParamDef`]
//! - [`CallFrame`] - what a native body receives when it runs
//! - [`NativeMethod`], [`NativeConstructor`] - native body signatures

mod flags;

use std::sync::Arc;

pub use flags::{
    FieldAttributes, GenericParamAttributes, MemberAccess, MethodModifiers, ParamAttributes,
    TypeAttributes, MEMBER_ACCESS_MASK,
};

use crate::{
    metadata::{customattributes::CustomAttribute, token::Token, typesystem::TypeRegistry},
    value::{ObjectRef, Value},
    Error, Result,
};

/// Reference to a `FieldDef`
pub type FieldRc = Arc<FieldDef>;
/// Reference to a `MethodDef`
pub type MethodRc = Arc<MethodDef>;
/// Reference to a `ConstructorDef`
pub type ConstructorRc = Arc<ConstructorDef>;
/// Reference to a `PropertyDef`
pub type PropertyRc = Arc<PropertyDef>;
/// Reference to an `EventDef`
pub type EventRc = Arc<EventDef>;

/// Native implementation of a method
pub type NativeMethod = Arc<dyn Fn(&CallFrame<'_>) -> Result<Value> + Send + Sync>;
/// Native implementation of a constructor; runs against the freshly allocated `this`
pub type NativeConstructor = Arc<dyn Fn(&CallFrame<'_>) -> Result<()> + Send + Sync>;

/// The activation record handed to a native body.
pub struct CallFrame<'a> {
    /// The receiver; `Value::Null` for static members
    pub this: &'a Value,
    /// Arguments, already converted to the declared parameter types
    pub args: &'a [Value],
    /// Bound generic arguments of a closed generic method, in declaration order
    pub type_args: &'a [Token],
    /// The registry the member belongs to
    pub types: &'a TypeRegistry,
}

impl CallFrame<'_> {
    /// The receiver as a heap object
    ///
    /// # Errors
    /// Returns [`Error::NullReference`] for static frames or non-object receivers.
    pub fn this_object(&self) -> Result<&ObjectRef> {
        self.this
            .as_object()
            .ok_or_else(|| Error::NullReference("receiver is not an object".to_string()))
    }

    /// The argument at `index`
    ///
    /// # Errors
    /// Returns [`Error::ArgumentCount`] if fewer arguments were passed.
    pub fn arg(&self, index: usize) -> Result<&Value> {
        self.args.get(index).ok_or(Error::ArgumentCount {
            expected: index + 1,
            provided: self.args.len(),
        })
    }

    /// Reads the instance field `name` (declared name, searched through the base types) of the
    /// receiver
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if the receiver's type has no such instance field.
    pub fn load_field(&self, name: &str) -> Result<Value> {
        let this = self.this_object()?;
        this.load(self.instance_field(this, name)?.slot)
    }

    /// Writes the instance field `name` of the receiver
    ///
    /// # Errors
    /// Returns [`Error::MissingMember`] if the receiver's type has no such instance field.
    pub fn store_field(&self, name: &str, value: Value) -> Result<()> {
        let this = self.this_object()?;
        this.store(self.instance_field(this, name)?.slot, value)
    }

    fn instance_field(&self, this: &ObjectRef, name: &str) -> Result<FieldRc> {
        self.types
            .field_by_name(this.type_token(), name)
            .filter(|field| !field.is_static() && field.constant.is_none())
            .ok_or_else(|| Error::MissingMember {
                owner: self.types.display_name(this.type_token()),
                name: name.to_string(),
            })
    }

    /// The bound generic argument at `index`
    ///
    /// # Errors
    /// Returns [`Error::TypeError`] if the method was not closed over that many arguments.
    pub fn type_arg(&self, index: usize) -> Result<Token> {
        self.type_args.get(index).copied().ok_or_else(|| {
            Error::TypeError(format!(
                "generic argument {} requested, {} bound",
                index,
                self.type_args.len()
            ))
        })
    }
}

/// A parameter of a method, constructor or indexer.
#[derive(Debug, Clone)]
pub struct ParamDef {
    /// Token
    pub token: Token,
    /// The parameter name
    pub name: String,
    /// Zero-based position in the parameter list
    pub sequence: usize,
    /// bitmask of `ParamAttributes`
    pub flags: u32,
    /// The declared parameter type
    pub param_type: Token,
    /// `flags.HAS_DEFAULT` -> This is the default value of this parameter
    pub default: Option<Value>,
    /// Custom attributes applied to this parameter
    pub custom_attributes: Vec<CustomAttribute>,
}

impl ParamDef {
    /// The typed attribute flags
    #[must_use]
    pub fn attributes(&self) -> ParamAttributes {
        ParamAttributes::from_bits_truncate(self.flags)
    }
}

/// A generic parameter of a generic method definition.
#[derive(Debug, Clone)]
pub struct GenericParamDef {
    /// The placeholder type that stands for this parameter in signatures
    pub token: Token,
    /// The parameter name, e.g. `T`
    pub name: String,
    /// Zero-based position in the generic parameter list
    pub index: usize,
    /// bitmask of `GenericParamAttributes`
    pub flags: u32,
    /// Types every argument must be assignable to
    pub constraints: Vec<Token>,
}

impl GenericParamDef {
    /// The typed special constraints
    #[must_use]
    pub fn attributes(&self) -> GenericParamAttributes {
        GenericParamAttributes::from_bits_truncate(self.flags)
    }
}

/// A field of a registered type.
pub struct FieldDef {
    /// Token
    pub token: Token,
    /// The type declaring this field
    pub declaring_type: Token,
    /// The declared name
    pub name: String,
    /// a 2-byte bitmask of access + `FieldAttributes`
    pub flags: u32,
    /// The field type
    pub field_type: Token,
    /// Storage slot: object slot for instance fields, static slot for static fields
    pub slot: usize,
    /// `flags.LITERAL` -> The constant value of this field
    pub constant: Option<Value>,
    /// Custom attributes applied to this field
    pub custom_attributes: Vec<CustomAttribute>,
}

impl FieldDef {
    /// The access flags
    #[must_use]
    pub fn access(&self) -> MemberAccess {
        MemberAccess::from_flags(self.flags)
    }

    /// The typed attribute flags
    #[must_use]
    pub fn attributes(&self) -> FieldAttributes {
        FieldAttributes::from_bits_truncate(self.flags)
    }

    /// Returns true for static fields
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.attributes().contains(FieldAttributes::STATIC)
    }
}

/// A method of a registered type, including property and event accessor methods.
pub struct MethodDef {
    /// Token
    pub token: Token,
    /// The type declaring this method
    pub declaring_type: Token,
    /// The declared name
    pub name: String,
    /// bitmask of access + `MethodModifiers`
    pub flags: u32,
    /// The parameters, in order
    pub params: Vec<ParamDef>,
    /// The return type (`System.Void` for methods without a result)
    pub return_type: Token,
    /// Generic parameters of a generic method definition
    pub generic_params: Vec<GenericParamDef>,
    /// Custom attributes applied to this method
    pub custom_attributes: Vec<CustomAttribute>,
    /// The implementation; `None` for abstract methods
    pub body: Option<NativeMethod>,
}

impl MethodDef {
    /// The access flags
    #[must_use]
    pub fn access(&self) -> MemberAccess {
        MemberAccess::from_flags(self.flags)
    }

    /// The typed modifiers
    #[must_use]
    pub fn modifiers(&self) -> MethodModifiers {
        MethodModifiers::from_bits_truncate(self.flags)
    }

    /// Returns true for static methods
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers().contains(MethodModifiers::STATIC)
    }

    /// Returns true for virtual (and abstract) methods
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.modifiers()
            .intersects(MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT)
    }

    /// Returns true for generic method definitions
    #[must_use]
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Returns true for property and event accessor methods
    #[must_use]
    pub fn is_special_name(&self) -> bool {
        self.modifiers().contains(MethodModifiers::SPECIAL_NAME)
    }

    /// Returns true if `other` has the same name, generic arity and parameter types, i.e. it
    /// overrides or hides this method
    #[must_use]
    pub fn signature_matches(&self, other: &MethodDef) -> bool {
        self.name == other.name
            && self.generic_params.len() == other.generic_params.len()
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(other.params.iter())
                .all(|(a, b)| a.param_type == b.param_type)
    }
}

/// An instance constructor of a registered type.
pub struct ConstructorDef {
    /// Token
    pub token: Token,
    /// The type this constructor creates
    pub declaring_type: Token,
    /// bitmask of access + `MethodModifiers`
    pub flags: u32,
    /// The parameters, in order
    pub params: Vec<ParamDef>,
    /// Custom attributes applied to this constructor
    pub custom_attributes: Vec<CustomAttribute>,
    /// The implementation, run against the newly allocated instance
    pub body: NativeConstructor,
}

impl ConstructorDef {
    /// The access flags
    #[must_use]
    pub fn access(&self) -> MemberAccess {
        MemberAccess::from_flags(self.flags)
    }
}

/// A property: sugar over an optional getter and setter method.
pub struct PropertyDef {
    /// Token
    pub token: Token,
    /// The type declaring this property
    pub declaring_type: Token,
    /// The declared name
    pub name: String,
    /// The property type
    pub property_type: Token,
    /// The `Method` that retrieves this property
    pub getter: Option<MethodRc>,
    /// The `Method` that sets this property
    pub setter: Option<MethodRc>,
    /// Index parameters; non-empty for indexers
    pub index_params: Vec<ParamDef>,
    /// Custom attributes applied to this property
    pub custom_attributes: Vec<CustomAttribute>,
}

impl PropertyDef {
    /// Returns true if any accessor is static
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.getter
            .iter()
            .chain(self.setter.iter())
            .any(|method| method.is_static())
    }

    /// The most visible access of the accessor methods
    #[must_use]
    pub fn access(&self) -> MemberAccess {
        self.getter
            .iter()
            .chain(self.setter.iter())
            .map(|method| method.access())
            .max_by_key(|access| access.bits())
            .unwrap_or(MemberAccess::PRIVATE)
    }
}

/// An event: an add/remove method pair plus an optional raise method.
pub struct EventDef {
    /// Token
    pub token: Token,
    /// The type declaring this event
    pub declaring_type: Token,
    /// The declared name
    pub name: String,
    /// The delegate type of handlers
    pub handler_type: Token,
    /// Subscribes a handler
    pub add: MethodRc,
    /// Unsubscribes a handler
    pub remove: MethodRc,
    /// Invokes all subscribed handlers
    pub raise: Option<MethodRc>,
    /// Custom attributes applied to this event
    pub custom_attributes: Vec<CustomAttribute>,
}

impl EventDef {
    /// Returns true for static events
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.add.is_static()
    }
}
