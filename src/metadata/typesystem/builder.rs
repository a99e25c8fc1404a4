//! Fluent registration of host types.
//!
//! This module provides the [`TypeBuilder`] struct, which offers a fluent API for declaring
//! classes, value types, interfaces and delegates together with their fields, constructors,
//! methods, properties and events, and publishing them to a [`TypeRegistry`]. Member
//! implementations are native closures; auto-implemented properties and events get their
//! backing fields and accessor methods generated.
//!
//! # Example
//!
//! ```rust
//! use reflectscope::metadata::typesystem::{
//!     MethodSpec, ParamSpec, PrimitiveKind, PropertySpec, TypeBuilder, TypeRegistry,
//! };
//! use reflectscope::Value;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(TypeRegistry::new());
//! let string = PrimitiveKind::String.token();
//!
//! let greeter = TypeBuilder::new(registry.clone())
//!     .class("Demo", "Greeter")
//!     .property(PropertySpec::new("Name", string).auto())
//!     .method(
//!         MethodSpec::new("Greet")
//!             .param(ParamSpec::new("greeting", string).default(Value::from("Hello")))
//!             .returns(string)
//!             .body(|frame| {
//!                 let greeting = frame.arg(0)?.as_str().unwrap_or_default().to_string();
//!                 Ok(Value::from(format!("{greeting}!")))
//!             }),
//!     )
//!     .build()?;
//!
//! assert_eq!(greeter.properties.count(), 1);
//! # Ok::<(), reflectscope::Error>(())
//! ```

use std::{collections::HashSet, sync::Arc};

use crate::{
    metadata::{
        customattributes::CustomAttribute,
        members::{
            CallFrame, ConstructorDef, EventDef, FieldAttributes, FieldDef, FieldRc,
            GenericParamAttributes, GenericParamDef, MemberAccess, MethodDef, MethodModifiers,
            MethodRc, NativeConstructor, NativeMethod, ParamAttributes, ParamDef, PropertyDef,
            TypeAttributes,
        },
        token::{Token, TokenKind},
        typesystem::{PrimitiveKind, TypeDef, TypeFlavor, TypeRc, TypeRegistry},
    },
    value::Value,
    Result,
};

/// Describes a parameter of a method, constructor, indexer or event
#[derive(Debug, Clone)]
pub struct ParamSpec {
    name: String,
    param_type: Token,
    flags: ParamAttributes,
    default: Option<Value>,
    attributes: Vec<CustomAttribute>,
}

impl ParamSpec {
    /// A required parameter
    pub fn new(name: impl Into<String>, param_type: Token) -> Self {
        ParamSpec {
            name: name.into(),
            param_type,
            flags: ParamAttributes::empty(),
            default: None,
            attributes: Vec::new(),
        }
    }

    /// Gives the parameter a default value; callers may then omit it
    #[must_use]
    pub fn default(mut self, value: Value) -> Self {
        self.flags |= ParamAttributes::HAS_DEFAULT | ParamAttributes::OPTIONAL;
        self.default = Some(value);
        self
    }

    /// Marks the parameter optional without a default; omitted arguments receive the default
    /// value of the parameter type
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.flags |= ParamAttributes::OPTIONAL;
        self
    }

    /// Marks the parameter as an output parameter
    #[must_use]
    pub fn out(mut self) -> Self {
        self.flags |= ParamAttributes::OUT;
        self
    }

    /// Attaches a custom attribute
    #[must_use]
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }
}

/// Describes a generic parameter of a generic method
#[derive(Debug, Clone)]
pub struct GenericParamSpec {
    name: String,
    flags: GenericParamAttributes,
    constraints: Vec<Token>,
}

impl GenericParamSpec {
    /// An unconstrained generic parameter
    pub fn new(name: impl Into<String>) -> Self {
        GenericParamSpec {
            name: name.into(),
            flags: GenericParamAttributes::empty(),
            constraints: Vec::new(),
        }
    }

    /// Requires a reference type argument (`where T : class`)
    #[must_use]
    pub fn reference_type(mut self) -> Self {
        self.flags |= GenericParamAttributes::REFERENCE_TYPE_CONSTRAINT;
        self
    }

    /// Requires a non-nullable value type argument (`where T : struct`)
    #[must_use]
    pub fn value_type(mut self) -> Self {
        self.flags |= GenericParamAttributes::NOT_NULLABLE_VALUE_TYPE_CONSTRAINT;
        self
    }

    /// Requires an argument with a public parameterless constructor (`where T : new()`)
    #[must_use]
    pub fn default_constructor(mut self) -> Self {
        self.flags |= GenericParamAttributes::DEFAULT_CONSTRUCTOR_CONSTRAINT;
        self
    }

    /// Requires an argument assignable to `constraint`
    #[must_use]
    pub fn constraint(mut self, constraint: Token) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// Describes a field
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    field_type: Token,
    access: MemberAccess,
    flags: FieldAttributes,
    constant: Option<Value>,
    initial: Option<Value>,
    attributes: Vec<CustomAttribute>,
}

impl FieldSpec {
    /// A public instance field
    pub fn new(name: impl Into<String>, field_type: Token) -> Self {
        FieldSpec {
            name: name.into(),
            field_type,
            access: MemberAccess::PUBLIC,
            flags: FieldAttributes::empty(),
            constant: None,
            initial: None,
            attributes: Vec::new(),
        }
    }

    /// Sets the access level
    #[must_use]
    pub fn access(mut self, access: MemberAccess) -> Self {
        self.access = access;
        self
    }

    /// Shorthand for private access
    #[must_use]
    pub fn private(self) -> Self {
        self.access(MemberAccess::PRIVATE)
    }

    /// Makes the field static
    #[must_use]
    pub fn set_static(mut self) -> Self {
        self.flags |= FieldAttributes::STATIC;
        self
    }

    /// Makes the field read-only after construction
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.flags |= FieldAttributes::INIT_ONLY;
        self
    }

    /// Makes the field a compile-time constant with `value`
    #[must_use]
    pub fn constant(mut self, value: Value) -> Self {
        self.flags |=
            FieldAttributes::LITERAL | FieldAttributes::STATIC | FieldAttributes::HAS_DEFAULT;
        self.constant = Some(value);
        self
    }

    /// Initial value of a static field (instead of the type's default value)
    #[must_use]
    pub fn initial(mut self, value: Value) -> Self {
        self.initial = Some(value);
        self
    }

    /// Attaches a custom attribute
    #[must_use]
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    fn is_static(&self) -> bool {
        self.flags.contains(FieldAttributes::STATIC)
    }
}

/// Describes a method
#[derive(Clone)]
pub struct MethodSpec {
    name: String,
    return_type: Token,
    access: MemberAccess,
    modifiers: MethodModifiers,
    params: Vec<ParamSpec>,
    generic_params: Vec<GenericParamSpec>,
    attributes: Vec<CustomAttribute>,
    body: Option<NativeMethod>,
}

impl MethodSpec {
    /// A public instance method returning `System.Void`
    pub fn new(name: impl Into<String>) -> Self {
        MethodSpec {
            name: name.into(),
            return_type: PrimitiveKind::Void.token(),
            access: MemberAccess::PUBLIC,
            modifiers: MethodModifiers::HIDE_BY_SIG,
            params: Vec::new(),
            generic_params: Vec::new(),
            attributes: Vec::new(),
            body: None,
        }
    }

    /// Sets the return type
    #[must_use]
    pub fn returns(mut self, return_type: Token) -> Self {
        self.return_type = return_type;
        self
    }

    /// Appends a parameter
    #[must_use]
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Appends a generic parameter; use [`TypeRegistry::generic_parameter`] to refer to it
    /// in parameter and return types
    #[must_use]
    pub fn generic(mut self, param: GenericParamSpec) -> Self {
        self.generic_params.push(param);
        self
    }

    /// Sets the access level
    #[must_use]
    pub fn access(mut self, access: MemberAccess) -> Self {
        self.access = access;
        self
    }

    /// Shorthand for private access
    #[must_use]
    pub fn private(self) -> Self {
        self.access(MemberAccess::PRIVATE)
    }

    /// Makes the method static
    #[must_use]
    pub fn set_static(mut self) -> Self {
        self.modifiers |= MethodModifiers::STATIC;
        self
    }

    /// Makes the method virtual; derived types may override it by declaring a virtual method
    /// with the same signature
    #[must_use]
    pub fn set_virtual(mut self) -> Self {
        self.modifiers |= MethodModifiers::VIRTUAL;
        self
    }

    /// Makes the method abstract; it must not have a body
    #[must_use]
    pub fn set_abstract(mut self) -> Self {
        self.modifiers |= MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT;
        self
    }

    /// Attaches a custom attribute
    #[must_use]
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Sets the native implementation
    #[must_use]
    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(&CallFrame<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(body));
        self
    }
}

/// Describes an instance constructor
#[derive(Clone)]
pub struct ConstructorSpec {
    access: MemberAccess,
    params: Vec<ParamSpec>,
    attributes: Vec<CustomAttribute>,
    body: Option<NativeConstructor>,
}

impl ConstructorSpec {
    /// A public parameterless constructor that leaves all fields at their defaults
    #[must_use]
    pub fn new() -> Self {
        ConstructorSpec {
            access: MemberAccess::PUBLIC,
            params: Vec::new(),
            attributes: Vec::new(),
            body: None,
        }
    }

    /// Appends a parameter
    #[must_use]
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Sets the access level
    #[must_use]
    pub fn access(mut self, access: MemberAccess) -> Self {
        self.access = access;
        self
    }

    /// Shorthand for private access
    #[must_use]
    pub fn private(self) -> Self {
        self.access(MemberAccess::PRIVATE)
    }

    /// Attaches a custom attribute
    #[must_use]
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Sets the native implementation; it runs against the freshly allocated instance
    #[must_use]
    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(&CallFrame<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.body = Some(Arc::new(body));
        self
    }
}

impl Default for ConstructorSpec {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
enum AccessorSpec {
    Missing,
    Auto,
    Native(NativeMethod),
}

/// Describes a property or an indexer
#[derive(Clone)]
pub struct PropertySpec {
    name: String,
    property_type: Token,
    access: MemberAccess,
    setter_access: Option<MemberAccess>,
    is_static: bool,
    index_params: Vec<ParamSpec>,
    getter: AccessorSpec,
    setter: AccessorSpec,
    attributes: Vec<CustomAttribute>,
}

impl PropertySpec {
    /// A public instance property without accessors
    pub fn new(name: impl Into<String>, property_type: Token) -> Self {
        PropertySpec {
            name: name.into(),
            property_type,
            access: MemberAccess::PUBLIC,
            setter_access: None,
            is_static: false,
            index_params: Vec::new(),
            getter: AccessorSpec::Missing,
            setter: AccessorSpec::Missing,
            attributes: Vec::new(),
        }
    }

    /// Auto-implements a getter and a setter over a generated backing field
    #[must_use]
    pub fn auto(mut self) -> Self {
        self.getter = AccessorSpec::Auto;
        self.setter = AccessorSpec::Auto;
        self
    }

    /// Auto-implements only a getter; the backing field can be assigned by constructors
    #[must_use]
    pub fn auto_read_only(mut self) -> Self {
        self.getter = AccessorSpec::Auto;
        self.setter = AccessorSpec::Missing;
        self
    }

    /// Native getter; receives the index arguments of indexers
    #[must_use]
    pub fn getter<F>(mut self, body: F) -> Self
    where
        F: Fn(&CallFrame<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.getter = AccessorSpec::Native(Arc::new(body));
        self
    }

    /// Native setter; receives the index arguments of indexers followed by the new value
    #[must_use]
    pub fn setter<F>(mut self, body: F) -> Self
    where
        F: Fn(&CallFrame<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.setter = AccessorSpec::Native(Arc::new(move |frame: &CallFrame<'_>| {
            body(frame)?;
            Ok(Value::Void)
        }));
        self
    }

    /// Appends an index parameter, turning the property into an indexer
    #[must_use]
    pub fn index(mut self, param: ParamSpec) -> Self {
        self.index_params.push(param);
        self
    }

    /// Sets the access level of both accessors
    #[must_use]
    pub fn access(mut self, access: MemberAccess) -> Self {
        self.access = access;
        self
    }

    /// Sets a separate access level for the setter
    #[must_use]
    pub fn setter_access(mut self, access: MemberAccess) -> Self {
        self.setter_access = Some(access);
        self
    }

    /// Makes the property static
    #[must_use]
    pub fn set_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Attaches a custom attribute
    #[must_use]
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    fn backing_field(&self) -> Option<FieldSpec> {
        if !matches!(self.getter, AccessorSpec::Auto) && !matches!(self.setter, AccessorSpec::Auto)
        {
            return None;
        }

        let mut field = FieldSpec::new(backing_field_name(&self.name), self.property_type).private();
        field.flags |= FieldAttributes::SPECIAL_NAME;
        if self.is_static {
            field = field.set_static();
        }
        Some(field)
    }
}

/// Describes an auto-implemented event backed by a multicast delegate field
#[derive(Clone)]
pub struct EventSpec {
    name: String,
    handler_type: Token,
    access: MemberAccess,
    is_static: bool,
    args: Vec<ParamSpec>,
    attributes: Vec<CustomAttribute>,
}

impl EventSpec {
    /// A public instance event with handlers of the delegate type `handler_type`
    pub fn new(name: impl Into<String>, handler_type: Token) -> Self {
        EventSpec {
            name: name.into(),
            handler_type,
            access: MemberAccess::PUBLIC,
            is_static: false,
            args: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Appends a parameter of the raise method; the arguments are forwarded to every handler
    #[must_use]
    pub fn arg(mut self, param: ParamSpec) -> Self {
        self.args.push(param);
        self
    }

    /// Sets the access level
    #[must_use]
    pub fn access(mut self, access: MemberAccess) -> Self {
        self.access = access;
        self
    }

    /// Makes the event static
    #[must_use]
    pub fn set_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Attaches a custom attribute
    #[must_use]
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    fn backing_field(&self) -> FieldSpec {
        let mut field = FieldSpec::new(backing_field_name(&self.name), self.handler_type).private();
        field.flags |= FieldAttributes::SPECIAL_NAME;
        if self.is_static {
            field = field.set_static();
        }
        field
    }
}

fn backing_field_name(member: &str) -> String {
    format!("<{member}>k__BackingField")
}

/// Where a field lives once the layout is computed
#[derive(Clone, Copy)]
enum FieldStorage {
    Instance(usize),
    Static(usize),
}

/// Provides a fluent API for registering types
pub struct TypeBuilder {
    /// Type registry receiving the type
    registry: Arc<TypeRegistry>,
    /// Flavor, namespace and name of the type being built
    kind: Option<(TypeFlavor, String, String)>,
    flags: TypeAttributes,
    base: Option<Token>,
    interfaces: Vec<Token>,
    fields: Vec<FieldSpec>,
    constructors: Vec<ConstructorSpec>,
    field_constructors: Vec<Vec<String>>,
    methods: Vec<MethodSpec>,
    properties: Vec<PropertySpec>,
    events: Vec<EventSpec>,
    attributes: Vec<CustomAttribute>,
}

impl TypeBuilder {
    /// Create a new builder with the given registry
    ///
    /// ## Arguments
    /// * 'registry' - The type registry to use
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        TypeBuilder {
            registry,
            kind: None,
            flags: TypeAttributes::PUBLIC,
            base: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            constructors: Vec::new(),
            field_constructors: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            attributes: Vec::new(),
        }
    }

    fn start(mut self, flavor: TypeFlavor, namespace: &str, name: &str) -> Self {
        self.kind = Some((flavor, namespace.to_string(), name.to_string()));
        self
    }

    /// Start building a class
    #[must_use]
    pub fn class(self, namespace: &str, name: &str) -> Self {
        self.start(TypeFlavor::Class, namespace, name)
    }

    /// Start building a value type
    #[must_use]
    pub fn value_type(mut self, namespace: &str, name: &str) -> Self {
        self.flags |= TypeAttributes::SEALED;
        self.start(TypeFlavor::ValueType, namespace, name)
    }

    /// Start building an interface
    #[must_use]
    pub fn interface(mut self, namespace: &str, name: &str) -> Self {
        self.flags |= TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT;
        self.start(TypeFlavor::Interface, namespace, name)
    }

    /// Start building a delegate type
    #[must_use]
    pub fn delegate(mut self, namespace: &str, name: &str) -> Self {
        self.flags |= TypeAttributes::SEALED;
        self.start(TypeFlavor::Delegate, namespace, name)
    }

    /// Adds type attribute flags (e.g. `ABSTRACT`, `BYREF_LIKE`)
    #[must_use]
    pub fn flags(mut self, flags: TypeAttributes) -> Self {
        self.flags |= flags;
        self
    }

    /// Sets the base type
    #[must_use]
    pub fn extends(mut self, base: Token) -> Self {
        self.base = Some(base);
        self
    }

    /// Adds an implemented interface
    #[must_use]
    pub fn implements(mut self, interface: Token) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Adds a field
    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a constructor
    #[must_use]
    pub fn constructor(mut self, constructor: ConstructorSpec) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Adds a public constructor taking one parameter per named field (declared or
    /// inherited) and assigning it
    #[must_use]
    pub fn field_constructor(mut self, fields: &[&str]) -> Self {
        self.field_constructors
            .push(fields.iter().map(ToString::to_string).collect());
        self
    }

    /// Adds a method
    #[must_use]
    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    /// Adds a property
    #[must_use]
    pub fn property(mut self, property: PropertySpec) -> Self {
        self.properties.push(property);
        self
    }

    /// Adds an event
    #[must_use]
    pub fn event(mut self, event: EventSpec) -> Self {
        self.events.push(event);
        self
    }

    /// Attaches a custom attribute to the type
    #[must_use]
    pub fn attribute(mut self, attribute: CustomAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Validates the declaration, lays out the fields, creates all member definitions and
    /// publishes the type to the registry.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for inconsistent declarations (duplicate type
    /// names, abstract members without an abstract type, invalid defaults, ...) and
    /// [`crate::Error::TypeNotFound`] for references to unknown types.
    pub fn build(self) -> Result<TypeRc> {
        let Some((flavor, namespace, name)) = self.kind.clone() else {
            return Err(malformed_error!(
                "TypeBuilder::build called before choosing class, value_type, interface or delegate"
            ));
        };

        let fullname = if namespace.is_empty() {
            name.clone()
        } else {
            format!("{namespace}.{name}")
        };
        if self.registry.get_by_fullname(&fullname).is_some() {
            return Err(malformed_error!("type {} is already registered", fullname));
        }

        self.check_member_names(&fullname)?;

        let base = self.resolve_base(&flavor, &fullname)?;
        let base_slots = match base {
            Some(base) => self.registry.resolve(base)?.instance_slots,
            None => 0,
        };
        for interface in &self.interfaces {
            if !self.registry.resolve(*interface)?.is_interface() {
                return Err(malformed_error!(
                    "{} implements {} which is not an interface",
                    fullname,
                    self.registry.display_name(*interface)
                ));
            }
        }

        let mut layout = self.fields.clone();
        layout.extend(self.properties.iter().filter_map(PropertySpec::backing_field));
        layout.extend(self.events.iter().map(EventSpec::backing_field));

        if matches!(flavor, TypeFlavor::Interface | TypeFlavor::Delegate)
            && layout.iter().any(|field| !field.is_static())
        {
            return Err(malformed_error!(
                "{} cannot declare instance fields",
                fullname
            ));
        }

        let mut storage = Vec::with_capacity(layout.len());
        let mut statics = Vec::new();
        let mut instance_slots = base_slots;
        for field in &layout {
            self.registry.resolve(field.field_type)?;
            if field.constant.is_some() {
                storage.push(FieldStorage::Static(usize::MAX));
            } else if field.is_static() {
                let initial = match &field.initial {
                    Some(initial) => initial.clone(),
                    None => self.registry.default_value(field.field_type)?,
                };
                storage.push(FieldStorage::Static(statics.len()));
                statics.push(initial);
            } else {
                storage.push(FieldStorage::Instance(instance_slots));
                instance_slots += 1;
            }
        }

        let token = self.registry.next_token(TokenKind::TypeDef)?;
        let type_def = Arc::new(TypeDef::new(
            token,
            namespace,
            name,
            flavor.clone(),
            self.flags,
            base,
            instance_slots,
            statics,
        ));
        for interface in &self.interfaces {
            type_def.interfaces.push(*interface);
        }
        for attribute in &self.attributes {
            type_def.custom_attributes.push(attribute.clone());
        }

        let mut fields: Vec<(FieldRc, FieldStorage)> = Vec::with_capacity(layout.len());
        for (field, storage) in layout.iter().zip(storage) {
            let slot = match storage {
                FieldStorage::Instance(slot) | FieldStorage::Static(slot) => slot,
            };
            let def = Arc::new(FieldDef {
                token: self.registry.next_token(TokenKind::Field)?,
                declaring_type: token,
                name: field.name.clone(),
                flags: field.access.bits() | field.flags.bits(),
                field_type: field.field_type,
                slot,
                constant: field.constant.clone(),
                custom_attributes: field.attributes.clone(),
            });
            type_def.fields.push(def.clone());
            fields.push((def, storage));
        }

        for method in &self.methods {
            let def = self.method_def(&type_def, method)?;
            type_def.methods.push(def);
        }

        self.build_constructors(&type_def, &fields)?;

        for property in &self.properties {
            self.build_property(&type_def, property, &fields)?;
        }

        for event in &self.events {
            self.build_event(&type_def, event, &fields)?;
        }

        self.registry.insert(type_def.clone());
        Ok(type_def)
    }

    /// Fields, plain properties and events share one namespace; indexers may overload each
    /// other but must differ in their index parameter types
    fn check_member_names(&self, fullname: &str) -> Result<()> {
        let mut names = HashSet::new();
        let data_members = self
            .fields
            .iter()
            .map(|field| field.name.as_str())
            .chain(
                self.properties
                    .iter()
                    .filter(|property| property.index_params.is_empty())
                    .map(|property| property.name.as_str()),
            )
            .chain(self.events.iter().map(|event| event.name.as_str()));
        for name in data_members {
            if !names.insert(name) {
                return Err(malformed_error!(
                    "{} declares more than one member named {}",
                    fullname,
                    name
                ));
            }
        }

        let mut indexers = HashSet::new();
        for indexer in self
            .properties
            .iter()
            .filter(|property| !property.index_params.is_empty())
        {
            if names.contains(indexer.name.as_str()) {
                return Err(malformed_error!(
                    "{} declares indexer {} over a member of the same name",
                    fullname,
                    indexer.name
                ));
            }
            let signature: Vec<Token> = indexer
                .index_params
                .iter()
                .map(|param| param.param_type)
                .collect();
            if !indexers.insert((indexer.name.as_str(), signature)) {
                return Err(malformed_error!(
                    "{} declares indexer {} twice with the same index types",
                    fullname,
                    indexer.name
                ));
            }
        }

        Ok(())
    }

    fn resolve_base(&self, flavor: &TypeFlavor, fullname: &str) -> Result<Option<Token>> {
        let object = PrimitiveKind::Object.token();

        match flavor {
            TypeFlavor::Interface => {
                if self.base.is_some() {
                    return Err(malformed_error!(
                        "interface {} cannot extend a class",
                        fullname
                    ));
                }
                Ok(None)
            }
            TypeFlavor::ValueType => {
                if self.base.is_some() {
                    return Err(malformed_error!(
                        "value type {} cannot extend another type",
                        fullname
                    ));
                }
                Ok(Some(PrimitiveKind::ValueType.token()))
            }
            TypeFlavor::Delegate => Ok(Some(object)),
            _ => {
                let Some(base) = self.base else {
                    return Ok(Some(object));
                };

                let base_def = self.registry.resolve(base)?;
                let derivable = base_def.flavor == TypeFlavor::Class || base == object;
                if !derivable || base_def.flags.contains(TypeAttributes::SEALED) {
                    return Err(malformed_error!(
                        "{} cannot derive from {}",
                        fullname,
                        base_def.fullname()
                    ));
                }
                Ok(Some(base))
            }
        }
    }

    fn param_defs(&self, params: &[ParamSpec], owner: &str) -> Result<Vec<ParamDef>> {
        params
            .iter()
            .enumerate()
            .map(|(sequence, param)| {
                self.registry.resolve(param.param_type)?;
                if let Some(default) = &param.default {
                    let generic = self.registry.contains_generic_parameters(param.param_type);
                    if !generic
                        && self
                            .registry
                            .value_conversion_cost(default, param.param_type)
                            .is_none()
                    {
                        return Err(malformed_error!(
                            "default value {} of parameter {} of {} does not fit {}",
                            default,
                            param.name,
                            owner,
                            self.registry.display_name(param.param_type)
                        ));
                    }
                }

                Ok(ParamDef {
                    token: self.registry.next_token(TokenKind::Param)?,
                    name: param.name.clone(),
                    sequence,
                    flags: param.flags.bits(),
                    param_type: param.param_type,
                    default: param.default.clone(),
                    custom_attributes: param.attributes.clone(),
                })
            })
            .collect()
    }

    fn method_def(&self, type_def: &TypeDef, spec: &MethodSpec) -> Result<MethodRc> {
        let owner = format!("{}::{}", type_def.fullname(), spec.name);
        let mut modifiers = spec.modifiers;
        if type_def.is_interface() {
            if spec.body.is_some() {
                return Err(malformed_error!("interface method {} cannot have a body", owner));
            }
            modifiers |= MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT;
        }

        let is_abstract = modifiers.contains(MethodModifiers::ABSTRACT);
        if is_abstract && spec.body.is_some() {
            return Err(malformed_error!("abstract method {} cannot have a body", owner));
        }
        if is_abstract && !type_def.is_abstract() {
            return Err(malformed_error!(
                "abstract method {} requires an abstract type",
                owner
            ));
        }
        if !is_abstract && spec.body.is_none() {
            return Err(malformed_error!("method {} has no body", owner));
        }
        if is_abstract && modifiers.contains(MethodModifiers::STATIC) {
            return Err(malformed_error!("static method {} cannot be abstract", owner));
        }

        self.registry.resolve(spec.return_type)?;
        let generic_params = spec
            .generic_params
            .iter()
            .enumerate()
            .map(|(index, param)| {
                for constraint in &param.constraints {
                    self.registry.resolve(*constraint)?;
                }
                Ok(GenericParamDef {
                    token: self.registry.generic_parameter(index)?,
                    name: param.name.clone(),
                    index,
                    flags: param.flags.bits(),
                    constraints: param.constraints.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Arc::new(MethodDef {
            token: self.registry.next_token(TokenKind::Method)?,
            declaring_type: type_def.token,
            name: spec.name.clone(),
            flags: spec.access.bits() | modifiers.bits(),
            params: self.param_defs(&spec.params, &owner)?,
            return_type: spec.return_type,
            generic_params,
            custom_attributes: spec.attributes.clone(),
            body: spec.body.clone(),
        }))
    }

    fn build_constructors(
        &self,
        type_def: &TypeDef,
        fields: &[(FieldRc, FieldStorage)],
    ) -> Result<()> {
        if !matches!(type_def.flavor, TypeFlavor::Class | TypeFlavor::ValueType) {
            if self.constructors.is_empty() && self.field_constructors.is_empty() {
                return Ok(());
            }
            return Err(malformed_error!(
                "{} cannot declare constructors",
                type_def.fullname()
            ));
        }

        let mut constructors = self.constructors.clone();
        for names in &self.field_constructors {
            constructors.push(self.field_constructor_spec(type_def, names, fields)?);
        }

        let has_parameterless = constructors.iter().any(|ctor| ctor.params.is_empty());
        let implicit = match type_def.flavor {
            TypeFlavor::ValueType => !has_parameterless,
            _ => constructors.is_empty(),
        };
        if implicit {
            let access = if type_def.is_abstract() {
                MemberAccess::FAMILY
            } else {
                MemberAccess::PUBLIC
            };
            constructors.push(ConstructorSpec::new().access(access));
        }

        let owner = format!("{}::.ctor", type_def.fullname());
        for spec in constructors {
            let body: NativeConstructor = match spec.body {
                Some(body) => body,
                None => Arc::new(|_: &CallFrame<'_>| Ok(())),
            };

            type_def.constructors.push(Arc::new(ConstructorDef {
                token: self.registry.next_token(TokenKind::Method)?,
                declaring_type: type_def.token,
                flags: spec.access.bits()
                    | (MethodModifiers::SPECIAL_NAME
                        | MethodModifiers::RTSPECIAL_NAME
                        | MethodModifiers::HIDE_BY_SIG)
                        .bits(),
                params: self.param_defs(&spec.params, &owner)?,
                custom_attributes: spec.attributes,
                body,
            }));
        }

        Ok(())
    }

    fn field_constructor_spec(
        &self,
        type_def: &TypeDef,
        names: &[String],
        fields: &[(FieldRc, FieldStorage)],
    ) -> Result<ConstructorSpec> {
        let mut spec = ConstructorSpec::new();
        let mut slots = Vec::with_capacity(names.len());

        for name in names {
            let declared = fields
                .iter()
                .find(|(field, _)| &field.name == name)
                .and_then(|(field, storage)| match storage {
                    FieldStorage::Instance(slot) => Some((field.field_type, *slot)),
                    FieldStorage::Static(_) => None,
                });
            let inherited = || {
                type_def
                    .base
                    .and_then(|base| self.registry.field_by_name(base, name))
                    .filter(|field| !field.is_static() && field.constant.is_none())
                    .map(|field| (field.field_type, field.slot))
            };

            let Some((field_type, slot)) = declared.or_else(inherited) else {
                return Err(malformed_error!(
                    "field constructor of {} names unknown instance field {}",
                    type_def.fullname(),
                    name
                ));
            };

            spec = spec.param(ParamSpec::new(parameter_name(name), field_type));
            slots.push(slot);
        }

        Ok(spec.body(move |frame| {
            let this = frame.this_object()?;
            for (index, slot) in slots.iter().enumerate() {
                this.store(*slot, frame.arg(index)?.clone())?;
            }
            Ok(())
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn accessor_def(
        &self,
        type_def: &TypeDef,
        name: String,
        access: MemberAccess,
        is_static: bool,
        params: Vec<ParamDef>,
        return_type: Token,
        body: NativeMethod,
    ) -> Result<MethodRc> {
        let mut modifiers = MethodModifiers::SPECIAL_NAME | MethodModifiers::HIDE_BY_SIG;
        if is_static {
            modifiers |= MethodModifiers::STATIC;
        }

        let method = Arc::new(MethodDef {
            token: self.registry.next_token(TokenKind::Method)?,
            declaring_type: type_def.token,
            name,
            flags: access.bits() | modifiers.bits(),
            params,
            return_type,
            generic_params: Vec::new(),
            custom_attributes: Vec::new(),
            body: Some(body),
        });
        type_def.methods.push(method.clone());
        Ok(method)
    }

    fn build_property(
        &self,
        type_def: &TypeDef,
        spec: &PropertySpec,
        fields: &[(FieldRc, FieldStorage)],
    ) -> Result<()> {
        let owner = format!("{}::{}", type_def.fullname(), spec.name);
        self.registry.resolve(spec.property_type)?;

        let backing = backing_field_name(&spec.name);
        let backing_storage = fields
            .iter()
            .find(|(field, _)| field.name == backing)
            .map(|(_, storage)| *storage);
        let is_auto = matches!(spec.getter, AccessorSpec::Auto)
            || matches!(spec.setter, AccessorSpec::Auto);
        if is_auto && !spec.index_params.is_empty() {
            return Err(malformed_error!("indexer {} cannot be auto-implemented", owner));
        }
        if matches!(spec.getter, AccessorSpec::Missing) && matches!(spec.setter, AccessorSpec::Missing)
        {
            return Err(malformed_error!("property {} has no accessors", owner));
        }

        let getter = match &spec.getter {
            AccessorSpec::Missing => None,
            accessor => {
                let body = match accessor {
                    AccessorSpec::Native(body) => body.clone(),
                    _ => load_field_body(type_def.token, backing_storage, &owner)?,
                };
                Some(self.accessor_def(
                    type_def,
                    format!("get_{}", spec.name),
                    spec.access,
                    spec.is_static,
                    self.param_defs(&spec.index_params, &owner)?,
                    spec.property_type,
                    body,
                )?)
            }
        };

        let setter = match &spec.setter {
            AccessorSpec::Missing => None,
            accessor => {
                let body = match accessor {
                    AccessorSpec::Native(body) => body.clone(),
                    _ => store_field_body(type_def.token, backing_storage, &owner)?,
                };
                let mut params = spec.index_params.clone();
                params.push(ParamSpec::new("value", spec.property_type));
                Some(self.accessor_def(
                    type_def,
                    format!("set_{}", spec.name),
                    spec.setter_access.unwrap_or(spec.access),
                    spec.is_static,
                    self.param_defs(&params, &owner)?,
                    PrimitiveKind::Void.token(),
                    body,
                )?)
            }
        };

        type_def.properties.push(Arc::new(PropertyDef {
            token: self.registry.next_token(TokenKind::Property)?,
            declaring_type: type_def.token,
            name: spec.name.clone(),
            property_type: spec.property_type,
            getter,
            setter,
            index_params: self.param_defs(&spec.index_params, &owner)?,
            custom_attributes: spec.attributes.clone(),
        }));

        Ok(())
    }

    fn build_event(
        &self,
        type_def: &TypeDef,
        spec: &EventSpec,
        fields: &[(FieldRc, FieldStorage)],
    ) -> Result<()> {
        let owner = format!("{}::{}", type_def.fullname(), spec.name);
        let handler_def = self.registry.resolve(spec.handler_type)?;
        if handler_def.flavor != TypeFlavor::Delegate {
            return Err(malformed_error!(
                "event {} has non-delegate handler type {}",
                owner,
                handler_def.fullname()
            ));
        }

        let backing = backing_field_name(&spec.name);
        let storage = fields
            .iter()
            .find(|(field, _)| field.name == backing)
            .map(|(_, storage)| *storage);
        let load = load_field_body(type_def.token, storage, &owner)?;
        let store = store_field_body(type_def.token, storage, &owner)?;
        let void = PrimitiveKind::Void.token();

        let add_body: NativeMethod = {
            let (load, store) = (load.clone(), store.clone());
            Arc::new(move |frame: &CallFrame<'_>| {
                let Value::Delegate(handler) = frame.arg(0)? else {
                    return Ok(Value::Void);
                };
                let combined = match load(frame)? {
                    Value::Delegate(current) => current.combine(handler),
                    _ => handler.clone(),
                };
                let args = [Value::Delegate(combined)];
                store(&CallFrame { args: &args, ..*frame })
            })
        };

        let remove_body: NativeMethod = {
            let (load, store) = (load.clone(), store.clone());
            Arc::new(move |frame: &CallFrame<'_>| {
                let (Value::Delegate(handler), Value::Delegate(current)) =
                    (frame.arg(0)?, load(frame)?)
                else {
                    return Ok(Value::Void);
                };
                let args = [current.remove(handler).map_or(Value::Null, Value::Delegate)];
                store(&CallFrame { args: &args, ..*frame })
            })
        };

        let raise_body: NativeMethod = Arc::new(move |frame: &CallFrame<'_>| {
            if let Value::Delegate(current) = load(frame)? {
                current.invoke(frame.args)?;
            }
            Ok(Value::Void)
        });

        let handler_param = [ParamSpec::new("value", spec.handler_type)];
        let add = self.accessor_def(
            type_def,
            format!("add_{}", spec.name),
            spec.access,
            spec.is_static,
            self.param_defs(&handler_param, &owner)?,
            void,
            add_body,
        )?;
        let remove = self.accessor_def(
            type_def,
            format!("remove_{}", spec.name),
            spec.access,
            spec.is_static,
            self.param_defs(&handler_param, &owner)?,
            void,
            remove_body,
        )?;
        let raise = self.accessor_def(
            type_def,
            format!("raise_{}", spec.name),
            spec.access,
            spec.is_static,
            self.param_defs(&spec.args, &owner)?,
            void,
            raise_body,
        )?;

        type_def.events.push(Arc::new(EventDef {
            token: self.registry.next_token(TokenKind::Event)?,
            declaring_type: type_def.token,
            name: spec.name.clone(),
            handler_type: spec.handler_type,
            add,
            remove,
            raise: Some(raise),
            custom_attributes: spec.attributes.clone(),
        }));

        Ok(())
    }
}

/// `FirstName` -> `firstName`
fn parameter_name(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn load_field_body(
    declaring_type: Token,
    storage: Option<FieldStorage>,
    owner: &str,
) -> Result<NativeMethod> {
    match storage {
        Some(FieldStorage::Instance(slot)) => Ok(Arc::new(move |frame: &CallFrame<'_>| {
            frame.this_object()?.load(slot)
        })),
        Some(FieldStorage::Static(slot)) => Ok(Arc::new(move |frame: &CallFrame<'_>| {
            frame.types.resolve(declaring_type)?.load_static(slot)
        })),
        None => Err(malformed_error!("{} has no backing field", owner)),
    }
}

fn store_field_body(
    declaring_type: Token,
    storage: Option<FieldStorage>,
    owner: &str,
) -> Result<NativeMethod> {
    match storage {
        Some(FieldStorage::Instance(slot)) => Ok(Arc::new(move |frame: &CallFrame<'_>| {
            frame.this_object()?.store(slot, frame.arg(0)?.clone())?;
            Ok(Value::Void)
        })),
        Some(FieldStorage::Static(slot)) => Ok(Arc::new(move |frame: &CallFrame<'_>| {
            frame
                .types
                .resolve(declaring_type)?
                .store_static(slot, frame.arg(0)?.clone())?;
            Ok(Value::Void)
        })),
        None => Err(malformed_error!("{} has no backing field", owner)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn registry() -> Arc<TypeRegistry> {
        Arc::new(TypeRegistry::new())
    }

    fn int() -> Token {
        PrimitiveKind::I4.token()
    }

    #[test]
    fn test_build_requires_kind() {
        let result = TypeBuilder::new(registry()).build();
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let registry = registry();
        TypeBuilder::new(registry.clone())
            .class("Demo", "Twice")
            .build()
            .unwrap();
        let second = TypeBuilder::new(registry).class("Demo", "Twice").build();
        assert!(matches!(second, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_duplicate_member_names_rejected() {
        let fields = TypeBuilder::new(registry())
            .class("Demo", "TwoFields")
            .field(FieldSpec::new("Count", int()))
            .field(FieldSpec::new("Count", int()))
            .build();
        assert!(matches!(fields, Err(Error::Malformed { .. })));

        let mixed = TypeBuilder::new(registry())
            .class("Demo", "FieldAndProperty")
            .field(FieldSpec::new("Count", int()))
            .property(PropertySpec::new("Count", int()).auto())
            .build();
        assert!(matches!(mixed, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_indexer_overloads() {
        let string = PrimitiveKind::String.token();
        let by_row = || {
            PropertySpec::new("Item", string)
                .index(ParamSpec::new("row", int()))
                .getter(|_| Ok(Value::Null))
        };

        let same_signature = TypeBuilder::new(registry())
            .class("Demo", "SameIndex")
            .property(by_row())
            .property(by_row())
            .build();
        assert!(matches!(same_signature, Err(Error::Malformed { .. })));

        let overloaded = TypeBuilder::new(registry())
            .class("Demo", "TwoIndexes")
            .property(by_row())
            .property(
                PropertySpec::new("Item", string)
                    .index(ParamSpec::new("key", string))
                    .getter(|_| Ok(Value::Null)),
            )
            .build()
            .unwrap();
        assert_eq!(overloaded.properties.count(), 2);
    }

    #[test]
    fn test_field_layout_follows_base() {
        let registry = registry();
        let base = TypeBuilder::new(registry.clone())
            .class("Demo", "Base")
            .field(FieldSpec::new("a", int()))
            .field(FieldSpec::new("shared", int()).set_static())
            .build()
            .unwrap();
        let derived = TypeBuilder::new(registry.clone())
            .class("Demo", "Derived")
            .extends(base.token)
            .field(FieldSpec::new("b", int()))
            .field(FieldSpec::new("Max", int()).constant(Value::I4(9)))
            .build()
            .unwrap();

        assert_eq!(base.instance_slots, 1);
        assert_eq!(derived.instance_slots, 2);
        assert_eq!(derived.declared_field("b").unwrap().slot, 1);
        assert_eq!(base.load_static(0).unwrap(), Value::I4(0));
        assert!(derived.declared_field("Max").unwrap().constant.is_some());
    }

    #[test]
    fn test_implicit_constructors() {
        let registry = registry();
        let class = TypeBuilder::new(registry.clone())
            .class("Demo", "Plain")
            .build()
            .unwrap();
        assert_eq!(class.constructors.count(), 1);

        let point = TypeBuilder::new(registry.clone())
            .value_type("Demo", "Pair")
            .field(FieldSpec::new("X", int()))
            .field_constructor(&["X"])
            .build()
            .unwrap();
        assert_eq!(point.constructors.count(), 2);

        let interface = TypeBuilder::new(registry)
            .interface("Demo", "IShape")
            .build()
            .unwrap();
        assert_eq!(interface.constructors.count(), 0);
    }

    #[test]
    fn test_auto_property_generates_accessors() {
        let registry = registry();
        let def = TypeBuilder::new(registry)
            .class("Demo", "Named")
            .property(PropertySpec::new("Name", PrimitiveKind::String.token()).auto())
            .build()
            .unwrap();

        let property = def.properties.iter().next().unwrap().1.clone();
        assert!(property.getter.as_ref().unwrap().is_special_name());
        assert_eq!(property.setter.as_ref().unwrap().params.len(), 1);
        assert!(def.declared_field("<Name>k__BackingField").is_some());
        assert_eq!(def.instance_slots, 1);
    }

    #[test]
    fn test_abstract_method_requires_abstract_type() {
        let result = TypeBuilder::new(registry())
            .class("Demo", "Concrete")
            .method(MethodSpec::new("Run").set_abstract())
            .build();
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_method_without_body_rejected() {
        let result = TypeBuilder::new(registry())
            .class("Demo", "Empty")
            .method(MethodSpec::new("Run"))
            .build();
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_invalid_default_rejected() {
        let result = TypeBuilder::new(registry())
            .class("Demo", "Defaults")
            .method(
                MethodSpec::new("Run")
                    .param(ParamSpec::new("count", int()).default(Value::from("ten")))
                    .body(|_| Ok(Value::Void)),
            )
            .build();
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_sealed_base_rejected() {
        let registry = registry();
        let result = TypeBuilder::new(registry)
            .class("Demo", "MyString")
            .extends(PrimitiveKind::String.token())
            .build();
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_parameter_name() {
        assert_eq!(parameter_name("FirstName"), "firstName");
        assert_eq!(parameter_name("x"), "x");
    }
}
