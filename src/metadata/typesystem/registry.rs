//! Central type registry.
//!
//! This module provides the `TypeRegistry`, a thread-safe registry for every type the engine
//! can reflect over. It is the host side of the engine: it stores registered types, constructs
//! derived types (nullable, array, tuple, pointer, by-ref, generic parameter placeholders) on
//! demand, answers assignability questions, converts boxed values between types and allocates
//! instances with default-initialised field storage.
//!
//! # Registry Architecture
//!
//! - **Token-based lookup**: Primary store keyed by [`Token`] (`SkipMap`)
//! - **Name-based lookup**: Secondary indices for full names and simple names (`DashMap`)
//! - **Constructed types**: Deduplicated by their [`TypeFlavor`], so `Nullable<Int32>` requested
//!   twice yields the same token
//!
//! # Thread Safety
//!
//! - Lock-free data structures for primary storage (`SkipMap`)
//! - Concurrent hash maps for indices (`DashMap`)
//! - Atomic operations for token generation
//!
//! # Examples
//!
//! ```rust
//! use reflectscope::metadata::typesystem::{PrimitiveKind, TypeRegistry};
//!
//! let registry = TypeRegistry::new();
//! let int = PrimitiveKind::I4.token();
//! let nullable = registry.nullable_of(int)?;
//!
//! assert!(registry.is_assignable(int, nullable));
//! assert!(!registry.is_assignable(nullable, int));
//! assert_eq!(registry.display_name(nullable), "System.Nullable<System.Int32>");
//! # Ok::<(), reflectscope::Error>(())
//! ```

use std::sync::Arc;

use crossbeam_skiplist::SkipMap;
use dashmap::{mapref::entry::Entry, DashMap};
use strum::IntoEnumIterator;

use crate::{
    metadata::{
        members::{FieldRc, MethodDef, MethodRc, TypeAttributes},
        token::{Token, TokenAllocator, TokenKind},
        typesystem::{PrimitiveKind, TypeDef, TypeFlavor, TypeRc},
    },
    value::{Object, ObjectRef, Value},
    Error::{self, InvalidCast, NullReference, RecursionLimit, TypeError, TypeNotFound},
    Result,
};

/// Maximum nesting of value types materialised by [`TypeRegistry::default_value`]
pub const MAX_VALUE_DEPTH: usize = 64;

/// Conversion cost of anything to `System.Object`; higher than any other conversion
const UNIVERSAL_COST: u32 = 1_000;

/// Central registry managing all types known to an engine
///
/// # Examples
///
/// ```rust
/// use reflectscope::metadata::typesystem::{PrimitiveKind, TypeRegistry};
///
/// let registry = TypeRegistry::new();
/// let string = registry.get_by_fullname("System.String").unwrap();
/// assert_eq!(string.token, PrimitiveKind::String.token());
/// ```
pub struct TypeRegistry {
    /// Primary type storage indexed by token
    types: SkipMap<Token, TypeRc>,
    /// Index mapping full type names to their token
    types_by_fullname: DashMap<String, Token>,
    /// Index mapping simple names to all types with that name
    types_by_name: DashMap<String, Vec<Token>>,
    /// Constructed types, deduplicated by structure
    constructed: DashMap<TypeFlavor, Token>,
    /// Token allocation for new types and members
    tokens: TokenAllocator,
}

impl TypeRegistry {
    /// Create a new registry that contains all primitive types
    #[must_use]
    pub fn new() -> Self {
        let registry = TypeRegistry {
            types: SkipMap::new(),
            types_by_fullname: DashMap::new(),
            types_by_name: DashMap::new(),
            constructed: DashMap::new(),
            tokens: TokenAllocator::new(),
        };

        registry.initialize_primitives();
        registry
    }

    fn initialize_primitives(&self) {
        for kind in PrimitiveKind::iter() {
            let base = match kind {
                PrimitiveKind::Object => None,
                PrimitiveKind::String | PrimitiveKind::ValueType => {
                    Some(PrimitiveKind::Object.token())
                }
                _ => Some(PrimitiveKind::ValueType.token()),
            };

            let flags = match kind {
                PrimitiveKind::Object => TypeAttributes::PUBLIC,
                PrimitiveKind::ValueType => TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
                _ => TypeAttributes::PUBLIC | TypeAttributes::SEALED,
            };

            self.insert(Arc::new(TypeDef::new(
                kind.token(),
                kind.namespace().to_string(),
                kind.name().to_string(),
                TypeFlavor::Primitive(kind),
                flags,
                base,
                0,
                Vec::new(),
            )));
        }
    }

    /// Insert a `TypeDef` into the registry and its name indices
    ///
    /// ## Arguments
    /// * `new_type` - The type to register
    pub fn insert(&self, new_type: TypeRc) {
        let token = new_type.token;

        self.types_by_fullname.insert(new_type.fullname(), token);
        self.types_by_name
            .entry(new_type.name.clone())
            .or_default()
            .push(token);
        self.types.insert(token, new_type);
    }

    /// Allocates the next free token of `kind`
    pub(crate) fn next_token(&self, kind: TokenKind) -> Result<Token> {
        self.tokens.next(kind)
    }

    /// Look up a type by its token
    ///
    /// # Arguments
    /// * `token` - The token to look up
    pub fn get(&self, token: &Token) -> Option<TypeRc> {
        self.types.get(token).map(|entry| entry.value().clone())
    }

    /// Look up a type by its token, failing with [`Error::TypeNotFound`] if it is unknown
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for tokens the registry does not know.
    pub fn resolve(&self, token: Token) -> Result<TypeRc> {
        self.get(&token).ok_or(TypeNotFound(token))
    }

    /// Look up a type by its full name, e.g. `System.Int32`
    pub fn get_by_fullname(&self, fullname: &str) -> Option<TypeRc> {
        self.types_by_fullname
            .get(fullname)
            .and_then(|token| self.get(token.value()))
    }

    /// All types sharing the simple name `name`
    pub fn get_by_name(&self, name: &str) -> Vec<TypeRc> {
        self.types_by_name
            .get(name)
            .map(|tokens| tokens.iter().filter_map(|token| self.get(token)).collect())
            .unwrap_or_default()
    }

    /// Get a primitive type by its kind
    ///
    /// # Errors
    /// Returns an error if the primitive type is not found in the registry.
    pub fn primitive(&self, primitive: PrimitiveKind) -> Result<TypeRc> {
        self.resolve(primitive.token())
    }

    /// Count of types in the registry
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Get all types in the registry, in token order
    pub fn all_types(&self) -> Vec<TypeRc> {
        self.types
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// `Nullable<T>` of a non-nullable value type
    ///
    /// # Errors
    /// Returns [`Error::TypeError`] if `underlying` is a reference type or already nullable.
    pub fn nullable_of(&self, underlying: Token) -> Result<Token> {
        let def = self.resolve(underlying)?;
        if !def.is_value_type() || matches!(def.flavor, TypeFlavor::Nullable(_)) {
            return Err(TypeError(format!(
                "Nullable<T> requires a non-nullable value type, got {}",
                def.fullname()
            )));
        }

        self.construct(TypeFlavor::Nullable(underlying))
    }

    /// The array type of `element`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if `element` is unknown.
    pub fn array_of(&self, element: Token) -> Result<Token> {
        self.construct(TypeFlavor::Array(element))
    }

    /// The value tuple type of `elements`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if an element type is unknown.
    pub fn tuple_of(&self, elements: &[Token]) -> Result<Token> {
        self.construct(TypeFlavor::Tuple(elements.to_vec()))
    }

    /// The unmanaged pointer type to `pointee`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if `pointee` is unknown.
    pub fn pointer_to(&self, pointee: Token) -> Result<Token> {
        self.construct(TypeFlavor::Pointer(pointee))
    }

    /// The managed reference type to `referent`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if `referent` is unknown.
    pub fn by_ref_to(&self, referent: Token) -> Result<Token> {
        self.construct(TypeFlavor::ByRef(referent))
    }

    /// The placeholder type for the generic method parameter at `index`
    ///
    /// # Errors
    /// Never fails for a fresh index; the `Result` matches the other constructors.
    pub fn generic_parameter(&self, index: usize) -> Result<Token> {
        self.construct(TypeFlavor::GenericParameter(index))
    }

    fn construct(&self, flavor: TypeFlavor) -> Result<Token> {
        if let Some(existing) = self.constructed.get(&flavor) {
            return Ok(*existing.value());
        }

        let name = self.constructed_name(&flavor)?;
        let entry = match self.constructed.entry(flavor.clone()) {
            Entry::Occupied(entry) => return Ok(*entry.get()),
            Entry::Vacant(entry) => entry,
        };
        let token = self.tokens.next(TokenKind::TypeSpec)?;
        self.insert(Arc::new(TypeDef::new(
            token,
            String::new(),
            name,
            flavor,
            TypeAttributes::PUBLIC | TypeAttributes::SEALED,
            None,
            0,
            Vec::new(),
        )));
        entry.insert(token);

        Ok(token)
    }

    fn constructed_name(&self, flavor: &TypeFlavor) -> Result<String> {
        let component = |token: Token| -> Result<String> { Ok(self.resolve(token)?.fullname()) };

        Ok(match flavor {
            TypeFlavor::Nullable(inner) => format!("System.Nullable<{}>", component(*inner)?),
            TypeFlavor::Array(element) => format!("{}[]", component(*element)?),
            TypeFlavor::Pointer(pointee) => format!("{}*", component(*pointee)?),
            TypeFlavor::ByRef(referent) => format!("{}&", component(*referent)?),
            TypeFlavor::GenericParameter(index) => format!("!!{index}"),
            TypeFlavor::Tuple(elements) => {
                let names = elements
                    .iter()
                    .map(|element| component(*element))
                    .collect::<Result<Vec<_>>>()?;
                format!("({})", names.join(", "))
            }
            other => {
                return Err(malformed_error!(
                    "{:?} is not a constructed type flavor",
                    other
                ))
            }
        })
    }

    /// Human-readable name of a type, for diagnostics
    pub fn display_name(&self, token: Token) -> String {
        self.get(&token)
            .map_or_else(|| token.to_string(), |def| def.fullname())
    }

    /// Returns true if `token` names a type with value semantics
    pub fn is_value_type(&self, token: Token) -> bool {
        self.get(&token).is_some_and(|def| def.is_value_type())
    }

    /// The underlying type of a `Nullable<T>`, or `None` for any other type
    pub fn nullable_underlying(&self, token: Token) -> Option<Token> {
        match self.get(&token)?.flavor {
            TypeFlavor::Nullable(inner) => Some(inner),
            _ => None,
        }
    }

    /// Returns true if a member typed `token` can be accessed through boxed values.
    ///
    /// Pointers, by-refs and stack-only types are not, recursively through the element types
    /// of nullables, arrays and tuples. Unknown tokens are not representable either.
    pub fn is_representable(&self, token: Token) -> bool {
        let Some(def) = self.get(&token) else {
            return false;
        };

        if def.is_byref_like() {
            return false;
        }

        match &def.flavor {
            TypeFlavor::Nullable(inner) | TypeFlavor::Array(inner) => {
                self.is_representable(*inner)
            }
            TypeFlavor::Tuple(elements) => elements
                .iter()
                .all(|element| self.is_representable(*element)),
            _ => true,
        }
    }

    /// Returns true if `token` mentions a generic parameter placeholder
    pub fn contains_generic_parameters(&self, token: Token) -> bool {
        let Some(def) = self.get(&token) else {
            return false;
        };

        match &def.flavor {
            TypeFlavor::GenericParameter(_) => true,
            TypeFlavor::Nullable(inner)
            | TypeFlavor::Array(inner)
            | TypeFlavor::Pointer(inner)
            | TypeFlavor::ByRef(inner) => self.contains_generic_parameters(*inner),
            TypeFlavor::Tuple(elements) => elements
                .iter()
                .any(|element| self.contains_generic_parameters(*element)),
            _ => false,
        }
    }

    /// Replaces generic parameter placeholders in `token` by `type_args`
    ///
    /// # Errors
    /// Returns [`Error::TypeError`] if a placeholder index has no argument, or if substitution
    /// produces an invalid constructed type.
    pub fn substitute(&self, token: Token, type_args: &[Token]) -> Result<Token> {
        let def = self.resolve(token)?;

        match &def.flavor {
            TypeFlavor::GenericParameter(index) => {
                type_args.get(*index).copied().ok_or_else(|| {
                    TypeError(format!(
                        "generic parameter !!{} has no argument ({} bound)",
                        index,
                        type_args.len()
                    ))
                })
            }
            TypeFlavor::Nullable(inner) => self.nullable_of(self.substitute(*inner, type_args)?),
            TypeFlavor::Array(element) => self.array_of(self.substitute(*element, type_args)?),
            TypeFlavor::Pointer(pointee) => self.pointer_to(self.substitute(*pointee, type_args)?),
            TypeFlavor::ByRef(referent) => {
                self.by_ref_to(self.substitute(*referent, type_args)?)
            }
            TypeFlavor::Tuple(elements) => {
                let substituted = elements
                    .iter()
                    .map(|element| self.substitute(*element, type_args))
                    .collect::<Result<Vec<_>>>()?;
                self.tuple_of(&substituted)
            }
            _ => Ok(token),
        }
    }

    /// `token` followed by all of its base types
    pub fn ancestors(&self, token: Token) -> Vec<TypeRc> {
        let mut chain = Vec::new();
        let mut current = self.get(&token);

        while let Some(def) = current {
            current = def.base.and_then(|base| self.get(&base));
            chain.push(def);
            if chain.len() > MAX_VALUE_DEPTH {
                break;
            }
        }

        chain
    }

    /// Returns true if `def` or one of the interfaces it extends is `interface`
    fn implements(&self, def: &TypeDef, interface: Token) -> bool {
        def.interfaces.iter().any(|(_, implemented)| {
            *implemented == interface
                || self
                    .get(implemented)
                    .is_some_and(|nested| self.implements(&nested, interface))
        })
    }

    /// The cost of implicitly converting a value of type `from` to type `to`.
    ///
    /// `Some(0)` is an identity conversion; larger values are less specific conversions
    /// (numeric widening by preference, nullable wrapping, reference conversions by
    /// inheritance distance, and finally boxing to `System.Object`). `None` if no implicit
    /// conversion exists.
    pub fn conversion_cost(&self, from: Token, to: Token) -> Option<u32> {
        if from == to {
            return Some(0);
        }

        let source = self.get(&from)?;
        let target = self.get(&to)?;
        if source.is_byref_like() || target.is_byref_like() {
            return None;
        }

        match (&source.flavor, &target.flavor) {
            (TypeFlavor::Primitive(from_kind), TypeFlavor::Primitive(to_kind))
                if from_kind.is_value_type() && to_kind.is_value_type() =>
            {
                return from_kind.widening_rank(*to_kind);
            }
            (_, TypeFlavor::Nullable(inner)) => {
                return self.conversion_cost(from, *inner).map(|cost| cost + 1);
            }
            (_, TypeFlavor::Primitive(PrimitiveKind::Object)) => return Some(UNIVERSAL_COST),
            (TypeFlavor::Array(from_element), TypeFlavor::Array(to_element)) => {
                if self.is_value_type(*from_element) {
                    return None;
                }
                return self.conversion_cost(*from_element, *to_element);
            }
            _ => {}
        }

        let target_is_interface = target.is_interface();
        for (distance, ancestor) in self.ancestors(from).iter().enumerate() {
            let distance = u32::try_from(distance).unwrap_or(u32::MAX);
            if ancestor.token == to {
                return Some(distance);
            }
            if target_is_interface && self.implements(ancestor, to) {
                return Some(distance + 1);
            }
        }

        None
    }

    /// Returns true if a value of type `from` may be used where `to` is expected
    pub fn is_assignable(&self, from: Token, to: Token) -> bool {
        self.conversion_cost(from, to).is_some()
    }

    /// The runtime type of a boxed value; `None` for `Null` and `Void`
    ///
    /// # Errors
    /// Returns an error if a tuple's element types cannot be constructed.
    pub fn runtime_type(&self, value: &Value) -> Result<Option<Token>> {
        if let Some(kind) = PrimitiveKind::of_value(value) {
            return Ok(Some(kind.token()));
        }

        Ok(match value {
            Value::Object(object) => Some(object.type_token()),
            Value::Array(array) => Some(array.type_token()),
            Value::Delegate(delegate) => Some(delegate.handler_type()),
            Value::Tuple(items) => {
                let elements = items
                    .iter()
                    .map(|item| {
                        Ok(self
                            .runtime_type(item)?
                            .unwrap_or(PrimitiveKind::Object.token()))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Some(self.tuple_of(&elements)?)
            }
            _ => None,
        })
    }

    /// The cost of passing `value` where type `to` is expected, see
    /// [`TypeRegistry::conversion_cost`]
    pub fn value_conversion_cost(&self, value: &Value, to: Token) -> Option<u32> {
        let target = self.get(&to)?;

        match value {
            Value::Void => None,
            Value::Null => {
                if target.is_byref_like() {
                    None
                } else if to == PrimitiveKind::Object.token() {
                    Some(UNIVERSAL_COST)
                } else if !target.is_value_type()
                    || matches!(target.flavor, TypeFlavor::Nullable(_))
                {
                    Some(1)
                } else {
                    None
                }
            }
            Value::Tuple(items) => match &target.flavor {
                TypeFlavor::Tuple(elements) if elements.len() == items.len() => items
                    .iter()
                    .zip(elements.iter())
                    .try_fold(0_u32, |total, (item, element)| {
                        self.value_conversion_cost(item, *element)
                            .map(|cost| total.saturating_add(cost))
                    }),
                TypeFlavor::Primitive(PrimitiveKind::Object) => Some(UNIVERSAL_COST),
                _ => None,
            },
            Value::Object(object) => self.conversion_cost(object.type_token(), to),
            Value::Array(array) => self.conversion_cost(array.type_token(), to),
            Value::Delegate(delegate) => self.conversion_cost(delegate.handler_type(), to),
            primitive => {
                let kind = PrimitiveKind::of_value(primitive)?;
                self.conversion_cost(kind.token(), to)
            }
        }
    }

    /// Converts a boxed value to the representation of type `target`.
    ///
    /// Reference conversions return the value unchanged, numeric widening produces the wider
    /// primitive, `Nullable<T>` targets convert to `T` and tuples convert element-wise.
    ///
    /// # Errors
    /// - [`Error::NullReference`] for `null` converted to a non-nullable value type
    /// - [`Error::InvalidCast`] if no implicit conversion exists
    /// - [`Error::TypeNotFound`] if `target` is unknown
    pub fn convert(&self, value: &Value, target: Token) -> Result<Value> {
        let target_def = self.resolve(target)?;

        match value {
            Value::Null => {
                if target_def.is_value_type()
                    && !matches!(target_def.flavor, TypeFlavor::Nullable(_))
                {
                    return Err(NullReference(format!(
                        "null cannot be converted to value type {}",
                        target_def.fullname()
                    )));
                }
                return Ok(Value::Null);
            }
            Value::Tuple(items) => {
                if let TypeFlavor::Tuple(elements) = &target_def.flavor {
                    if elements.len() == items.len() {
                        let converted = items
                            .iter()
                            .zip(elements.iter())
                            .map(|(item, element)| self.convert(item, *element))
                            .collect::<Result<Vec<_>>>()?;
                        return Ok(Value::Tuple(Arc::from(converted)));
                    }
                }
            }
            _ => {}
        }

        match &target_def.flavor {
            TypeFlavor::Nullable(inner) => return self.convert(value, *inner),
            TypeFlavor::Primitive(kind) => {
                if let Some(widened) = widen(value, *kind) {
                    return Ok(widened);
                }
            }
            _ => {}
        }

        if self.value_conversion_cost(value, target).is_some() {
            return Ok(value.clone());
        }

        let from = self
            .runtime_type(value)?
            .map_or_else(|| "void".to_string(), |token| self.display_name(token));
        Err(InvalidCast {
            from,
            to: target_def.fullname(),
        })
    }

    /// The default value of type `token`: zero for primitives, a zero-initialised instance for
    /// value types, `null` for reference and nullable types
    ///
    /// # Errors
    /// Returns [`Error::RecursionLimit`] for value types that (transitively) contain
    /// themselves, or [`Error::TypeNotFound`] for unknown types.
    pub fn default_value(&self, token: Token) -> Result<Value> {
        self.default_value_at(token, 0)
    }

    fn default_value_at(&self, token: Token, depth: usize) -> Result<Value> {
        if depth > MAX_VALUE_DEPTH {
            return Err(RecursionLimit(MAX_VALUE_DEPTH));
        }

        let def = self.resolve(token)?;
        match &def.flavor {
            TypeFlavor::Primitive(kind) => Ok(kind.default_value()),
            TypeFlavor::ValueType => Ok(Value::Object(self.allocate_at(&def, depth + 1)?)),
            TypeFlavor::Tuple(elements) => {
                let items = elements
                    .iter()
                    .map(|element| self.default_value_at(*element, depth + 1))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Tuple(Arc::from(items)))
            }
            _ => Ok(Value::Null),
        }
    }

    /// Allocates an instance of a class or value type with every instance field (including
    /// inherited ones) set to its default value. No constructor runs.
    ///
    /// # Errors
    /// Returns [`Error::TypeError`] for types that have no instances of their own (interfaces,
    /// delegates, primitives and constructed types).
    pub fn allocate(&self, token: Token) -> Result<ObjectRef> {
        let def = self.resolve(token)?;
        self.allocate_at(&def, 0)
    }

    fn allocate_at(&self, def: &TypeDef, depth: usize) -> Result<ObjectRef> {
        if !matches!(def.flavor, TypeFlavor::Class | TypeFlavor::ValueType) {
            return Err(TypeError(format!(
                "cannot allocate an instance of {}",
                def.fullname()
            )));
        }

        let mut slots = vec![Value::Null; def.instance_slots];
        for ancestor in self.ancestors(def.token) {
            for (_, field) in ancestor.fields.iter() {
                if field.is_static() || field.constant.is_some() {
                    continue;
                }

                let default = self.default_value_at(field.field_type, depth)?;
                let Some(slot) = slots.get_mut(field.slot) else {
                    return Err(malformed_error!(
                        "field {} of {} uses slot {} beyond the layout of {}",
                        field.name,
                        ancestor.fullname(),
                        field.slot,
                        def.fullname()
                    ));
                };
                *slot = default;
            }
        }

        Ok(Object::new(def.token, slots))
    }

    /// Finds a field by declared name on `token` or its base types
    pub fn field_by_name(&self, token: Token, name: &str) -> Option<FieldRc> {
        self.ancestors(token)
            .iter()
            .find_map(|def| def.declared_field(name))
    }

    /// Finds the implementation of the virtual `method` for an instance of `runtime_type`.
    ///
    /// Walks from `runtime_type` towards the declaring type of `method` and returns the first
    /// virtual method with an identical signature and a body. `None` means `method` itself is
    /// the most derived implementation.
    pub fn find_override(&self, runtime_type: Token, method: &MethodDef) -> Option<MethodRc> {
        for def in self.ancestors(runtime_type) {
            if def.token == method.declaring_type {
                return None;
            }

            let found = def.methods.iter().find_map(|(_, candidate)| {
                (!candidate.is_static()
                    && candidate.is_virtual()
                    && candidate.body.is_some()
                    && candidate.signature_matches(method))
                .then(|| candidate.clone())
            });
            if found.is_some() {
                return found;
            }
        }

        None
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Implicit numeric conversion of a primitive value to `target`
fn widen(value: &Value, target: PrimitiveKind) -> Option<Value> {
    let source = PrimitiveKind::of_value(value)?;
    source.widening_rank(target)?;

    let integral = || -> Option<i128> {
        match value {
            Value::Char(value) => Some(i128::from(u32::from(*value))),
            Value::I1(value) => Some(i128::from(*value)),
            Value::U1(value) => Some(i128::from(*value)),
            Value::I2(value) => Some(i128::from(*value)),
            Value::U2(value) => Some(i128::from(*value)),
            Value::I4(value) => Some(i128::from(*value)),
            Value::U4(value) => Some(i128::from(*value)),
            Value::I8(value) => Some(i128::from(*value)),
            Value::U8(value) => Some(i128::from(*value)),
            _ => None,
        }
    };

    #[allow(clippy::cast_precision_loss)]
    let floating = || -> Option<f64> {
        match value {
            Value::R4(value) => Some(f64::from(*value)),
            _ => integral().map(|value| value as f64),
        }
    };

    #[allow(clippy::cast_possible_truncation)]
    let widened = match target {
        PrimitiveKind::I2 => Value::I2(i16::try_from(integral()?).ok()?),
        PrimitiveKind::U2 => Value::U2(u16::try_from(integral()?).ok()?),
        PrimitiveKind::I4 => Value::I4(i32::try_from(integral()?).ok()?),
        PrimitiveKind::U4 => Value::U4(u32::try_from(integral()?).ok()?),
        PrimitiveKind::I8 => Value::I8(i64::try_from(integral()?).ok()?),
        PrimitiveKind::U8 => Value::U8(u64::try_from(integral()?).ok()?),
        PrimitiveKind::R4 => Value::R4(floating()? as f32),
        PrimitiveKind::R8 => Value::R8(floating()?),
        _ => return None,
    };

    Some(widened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::typesystem::{FieldSpec, TypeBuilder};

    fn int() -> Token {
        PrimitiveKind::I4.token()
    }

    #[test]
    fn test_primitives_registered() {
        let registry = TypeRegistry::new();
        for kind in PrimitiveKind::iter() {
            let def = registry.primitive(kind).unwrap();
            assert_eq!(def.fullname(), format!("System.{}", kind.name()));
        }
        assert_eq!(registry.len(), PrimitiveKind::iter().count());
        assert_eq!(registry.get_by_name("Int32").len(), 1);
    }

    #[test]
    fn test_constructed_types_are_deduplicated() {
        let registry = TypeRegistry::new();
        let first = registry.nullable_of(int()).unwrap();
        let second = registry.nullable_of(int()).unwrap();
        assert_eq!(first, second);

        let array = registry.array_of(int()).unwrap();
        assert_ne!(array, first);
        assert_eq!(registry.display_name(array), "System.Int32[]");

        let tuple = registry
            .tuple_of(&[int(), PrimitiveKind::String.token()])
            .unwrap();
        assert_eq!(registry.display_name(tuple), "(System.Int32, System.String)");
    }

    #[test]
    fn test_nullable_of_reference_type_fails() {
        let registry = TypeRegistry::new();
        assert!(matches!(
            registry.nullable_of(PrimitiveKind::String.token()),
            Err(Error::TypeError(_))
        ));

        let nullable = registry.nullable_of(int()).unwrap();
        assert!(registry.nullable_of(nullable).is_err());
    }

    #[test]
    fn test_conversion_costs() {
        let registry = TypeRegistry::new();
        let object = PrimitiveKind::Object.token();
        let long = PrimitiveKind::I8.token();
        let nullable = registry.nullable_of(int()).unwrap();

        assert_eq!(registry.conversion_cost(int(), int()), Some(0));
        assert_eq!(registry.conversion_cost(int(), long), Some(1));
        assert_eq!(registry.conversion_cost(int(), nullable), Some(1));
        assert_eq!(registry.conversion_cost(int(), object), Some(UNIVERSAL_COST));
        assert_eq!(registry.conversion_cost(long, int()), None);
        assert_eq!(registry.conversion_cost(nullable, int()), None);
    }

    #[test]
    fn test_unrepresentable_types() {
        let registry = TypeRegistry::new();
        let pointer = registry.pointer_to(int()).unwrap();
        let by_ref = registry.by_ref_to(int()).unwrap();
        let array_of_pointers = registry.array_of(pointer).unwrap();

        assert!(registry.is_representable(int()));
        assert!(!registry.is_representable(pointer));
        assert!(!registry.is_representable(by_ref));
        assert!(!registry.is_representable(array_of_pointers));
        assert!(!registry.is_representable(Token(0x0200_FFFF)));
    }

    #[test]
    fn test_convert_values() {
        let registry = TypeRegistry::new();
        let nullable = registry.nullable_of(int()).unwrap();

        assert_eq!(
            registry.convert(&Value::I4(5), PrimitiveKind::I8.token()).unwrap(),
            Value::I8(5)
        );
        assert_eq!(registry.convert(&Value::Null, nullable).unwrap(), Value::Null);
        assert_eq!(registry.convert(&Value::I4(5), nullable).unwrap(), Value::I4(5));
        assert!(matches!(
            registry.convert(&Value::Null, int()),
            Err(Error::NullReference(_))
        ));
        assert!(matches!(
            registry.convert(&Value::from("x"), int()),
            Err(Error::InvalidCast { .. })
        ));
    }

    #[test]
    fn test_substitute() {
        let registry = TypeRegistry::new();
        let placeholder = registry.generic_parameter(0).unwrap();
        let array = registry.array_of(placeholder).unwrap();

        assert!(registry.contains_generic_parameters(array));
        let closed = registry.substitute(array, &[int()]).unwrap();
        assert_eq!(closed, registry.array_of(int()).unwrap());
        assert!(registry.substitute(placeholder, &[]).is_err());
    }

    #[test]
    fn test_allocate_with_defaults() {
        let registry = Arc::new(TypeRegistry::new());
        let holder = TypeBuilder::new(registry.clone())
            .class("Demo", "Holder")
            .field(FieldSpec::new("count", int()))
            .field(FieldSpec::new("name", PrimitiveKind::String.token()))
            .build()
            .unwrap();

        let object = registry.allocate(holder.token).unwrap();
        assert_eq!(object.snapshot().unwrap(), vec![Value::I4(0), Value::Null]);
        assert!(registry.allocate(int()).is_err());
    }

    #[test]
    fn test_inheritance_distance() {
        let registry = Arc::new(TypeRegistry::new());
        let base = TypeBuilder::new(registry.clone())
            .class("Demo", "Base")
            .build()
            .unwrap();
        let derived = TypeBuilder::new(registry.clone())
            .class("Demo", "Derived")
            .extends(base.token)
            .build()
            .unwrap();

        assert_eq!(registry.conversion_cost(derived.token, base.token), Some(1));
        assert_eq!(registry.conversion_cost(base.token, derived.token), None);
        assert!(registry.is_assignable(derived.token, PrimitiveKind::Object.token()));
    }
}
