//! The engine: the single root object of the crate.
//!
//! An [`Engine`] owns a handle to the [`TypeRegistry`], the [`MemberCache`] and the
//! [`AccessorCompiler`]. Everything it hands out (descriptors, accessors, mappers) is
//! `Send + Sync` and remains valid independently of the engine. Engines do not share state;
//! two engines over the same registry discover and compile separately.
//!
//! # Operations
//!
//! - **Discovery**: [`Engine::members`] and the `*_of` listings
//! - **Descriptor-based access**: [`Engine::create`], [`Engine::get`], [`Engine::set`],
//!   [`Engine::invoke`] and their tuple/indexed variants
//! - **Resolution**: [`Engine::find_constructor`], [`Engine::find_method`],
//!   [`Engine::find_generic_method`] and friends; `Ok(None)` when nothing applies
//! - **By-name convenience**: [`Engine::new_instance`], [`Engine::call`],
//!   [`Engine::get_member`], [`Engine::set_member`]; [`Error::MissingMember`] when nothing
//!   applies
//! - **Events**: [`Engine::add_handler`], [`Engine::remove_handler`], [`Engine::raise`]
//! - **Mapping**: [`Engine::build_mapper`], [`Engine::mapper`]
//!
//! # Examples
//!
//! ```rust
//! use reflectscope::metadata::typesystem::{FieldSpec, MethodSpec, PrimitiveKind, TypeBuilder};
//! use reflectscope::{Engine, TypeRegistry, Value};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(TypeRegistry::new());
//! let int = PrimitiveKind::I4.token();
//! let counter = TypeBuilder::new(registry.clone())
//!     .class("Demo", "Counter")
//!     .field(FieldSpec::new("Count", int))
//!     .method(MethodSpec::new("Increment").returns(int).body(|frame| {
//!         let next = frame.load_field("Count")?.as_i32().unwrap_or(0) + 1;
//!         frame.store_field("Count", Value::I4(next))?;
//!         Ok(Value::I4(next))
//!     }))
//!     .build()?;
//!
//! let engine = Engine::new(registry);
//! let instance = engine.new_instance(counter.token, &[])?;
//! engine.call(&instance, "Increment", &[])?;
//! assert_eq!(engine.call(&instance, "Increment", &[])?, Value::I4(2));
//! assert_eq!(engine.get_member(&instance, "Count")?, Value::I4(2));
//! # Ok::<(), reflectscope::Error>(())
//! ```

use std::sync::Arc;

use rayon::prelude::*;

use crate::{
    cache::{MemberCache, TypeMembers},
    compiler::{AccessorCompiler, Creator, Getter, Invoker, Setter},
    config::EngineConfig,
    descriptor::{
        ConstructorDescriptor, DataMember, EventDescriptor, FieldDescriptor, Member,
        MethodDescriptor, PropertyDescriptor,
    },
    ir::AccessorKind,
    mapper::{Mapper, MapperOptions},
    metadata::{token::Token, typesystem::TypeRegistry},
    resolver::{CallShape, GenericBinder, OverloadResolver},
    value::{Delegate, Value},
    Error, Result,
};

/// Counters describing what an engine has built so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Types whose members were discovered
    pub types_discovered: usize,
    /// Closed generic method descriptors
    pub closed_generics: usize,
    /// Cached default mappers
    pub mappers: usize,
    /// Operation trees compiled into accessors
    pub compilations: usize,
}

/// Member cache and accessor compiler over one type registry
pub struct Engine {
    types: Arc<TypeRegistry>,
    cache: MemberCache,
    compiler: AccessorCompiler,
}

impl Engine {
    /// Creates an engine with the default configuration
    #[must_use]
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self::with_config(types, EngineConfig::default())
    }

    /// Creates an engine with `config`
    #[must_use]
    pub fn with_config(types: Arc<TypeRegistry>, config: EngineConfig) -> Self {
        Engine {
            cache: MemberCache::new(types.clone(), config),
            compiler: AccessorCompiler::new(types.clone()),
            types,
        }
    }

    /// The discovery configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        self.cache.config()
    }

    /// The registry this engine reflects over
    #[must_use]
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// The accessor compiler
    #[must_use]
    pub fn compiler(&self) -> &AccessorCompiler {
        &self.compiler
    }

    /// Current cache and compilation counters
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            types_discovered: self.cache.type_count(),
            closed_generics: self.cache.closed_count(),
            mappers: self.cache.mapper_count(),
            compilations: self.compiler.compilations(),
        }
    }

    /// Discovers the members of every type in `tokens` in parallel
    ///
    /// # Errors
    /// Returns the first discovery error encountered.
    pub fn preload(&self, tokens: &[Token]) -> Result<()> {
        tokens
            .par_iter()
            .try_for_each(|token| self.cache.members(*token).map(|_| ()))
    }

    // Discovery

    /// Everything discovery found on `token`, discovered once per engine
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn members(&self, token: Token) -> Result<Arc<TypeMembers>> {
        self.cache.members(token)
    }

    /// The constructors of `token`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn constructors_of(&self, token: Token) -> Result<Vec<Arc<ConstructorDescriptor>>> {
        Ok(self.members(token)?.constructors.clone())
    }

    /// The instance fields of `token`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn fields_of(&self, token: Token) -> Result<Vec<Arc<FieldDescriptor>>> {
        Ok(self.members(token)?.fields.iter().cloned().collect())
    }

    /// The static fields and constants of `token`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn static_fields_of(&self, token: Token) -> Result<Vec<Arc<FieldDescriptor>>> {
        Ok(self.members(token)?.static_fields.iter().cloned().collect())
    }

    /// The instance properties of `token`, without indexers
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn properties_of(&self, token: Token) -> Result<Vec<Arc<PropertyDescriptor>>> {
        Ok(self.members(token)?.properties.iter().cloned().collect())
    }

    /// The indexer groups of `token`, as `(name, overloads)`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn indexers_of(&self, token: Token) -> Result<Vec<(String, Vec<Arc<PropertyDescriptor>>)>> {
        Ok(self
            .members(token)?
            .indexers
            .iter()
            .map(|(name, overloads)| (name.to_string(), overloads.to_vec()))
            .collect())
    }

    /// The static properties of `token`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn static_properties_of(&self, token: Token) -> Result<Vec<Arc<PropertyDescriptor>>> {
        Ok(self
            .members(token)?
            .static_properties
            .iter()
            .cloned()
            .collect())
    }

    /// The instance method groups of `token`, as `(name, overloads)`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn methods_of(&self, token: Token) -> Result<Vec<(String, Vec<Arc<MethodDescriptor>>)>> {
        Ok(self
            .members(token)?
            .methods
            .iter()
            .map(|(name, overloads)| (name.to_string(), overloads.to_vec()))
            .collect())
    }

    /// The static method groups of `token`, as `(name, overloads)`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn static_methods_of(
        &self,
        token: Token,
    ) -> Result<Vec<(String, Vec<Arc<MethodDescriptor>>)>> {
        Ok(self
            .members(token)?
            .static_methods
            .iter()
            .map(|(name, overloads)| (name.to_string(), overloads.to_vec()))
            .collect())
    }

    /// The events of `token`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn events_of(&self, token: Token) -> Result<Vec<Arc<EventDescriptor>>> {
        Ok(self.members(token)?.events.iter().cloned().collect())
    }

    // Accessors

    /// The compiled creator of `constructor`
    ///
    /// # Errors
    /// Returns [`Error::Compilation`] if the creator cannot be compiled.
    pub fn creator(&self, constructor: &ConstructorDescriptor) -> Result<Creator> {
        constructor.creator(&self.compiler)
    }

    /// The compiled getter of a field or property; `None` if it cannot be read
    ///
    /// # Errors
    /// Returns [`Error::Compilation`] if the getter cannot be compiled.
    pub fn getter(&self, member: &dyn DataMember) -> Result<Option<Getter>> {
        member.read_accessor(&self.compiler)
    }

    /// The compiled setter of a field or property; `None` if it cannot be written
    ///
    /// # Errors
    /// Returns [`Error::Compilation`] if the setter cannot be compiled.
    pub fn setter(&self, member: &dyn DataMember) -> Result<Option<Setter>> {
        member.write_accessor(&self.compiler)
    }

    /// The compiled invoker of `method`
    ///
    /// # Errors
    /// - [`Error::OpenGeneric`] for generic definitions
    /// - [`Error::Compilation`] if the invoker cannot be compiled
    pub fn invoker(&self, method: &MethodDescriptor) -> Result<Invoker> {
        method.invoker(&self.compiler)
    }

    // Descriptor-based access

    /// Creates an instance through `constructor`
    ///
    /// # Errors
    /// Returns arity and conversion errors, and any error raised by the constructor body.
    pub fn create(&self, constructor: &ConstructorDescriptor, args: &[Value]) -> Result<Value> {
        constructor.creator(&self.compiler)?.create(args)
    }

    /// Creates an instance through `constructor` from a packed argument tuple
    ///
    /// # Errors
    /// Returns arity and conversion errors, and any error raised by the constructor body.
    pub fn create_tuple(&self, constructor: &ConstructorDescriptor, args: &Value) -> Result<Value> {
        constructor
            .tuple_creator(&self.compiler)?
            .create(std::slice::from_ref(args))
    }

    /// Reads `member` from `instance` (`null` for statics)
    ///
    /// # Errors
    /// - [`Error::NoAccessor`] for write-only properties and indexers
    /// - receiver errors, and any error raised by a getter body
    pub fn get(&self, member: &dyn DataMember, instance: &Value) -> Result<Value> {
        let getter = member
            .read_accessor(&self.compiler)?
            .ok_or_else(|| Error::NoAccessor {
                member: member.display_name(),
                kind: AccessorKind::Get,
            })?;
        getter.get(instance)
    }

    /// Writes `value` to `member` of `instance` (`null` for statics)
    ///
    /// # Errors
    /// - [`Error::NoAccessor`] for read-only members and indexers
    /// - receiver and conversion errors, and any error raised by a setter body
    pub fn set(&self, member: &dyn DataMember, instance: &Value, value: Value) -> Result<()> {
        let setter = member
            .write_accessor(&self.compiler)?
            .ok_or_else(|| Error::NoAccessor {
                member: member.display_name(),
                kind: AccessorKind::Set,
            })?;
        setter.set(instance, value)
    }

    /// Reads the indexer `property` of `instance` at `indices`
    ///
    /// # Errors
    /// - [`Error::NoAccessor`] unless `property` is a readable indexer
    /// - arity, receiver and conversion errors, and any error raised by the getter body
    pub fn get_indexed(
        &self,
        property: &PropertyDescriptor,
        instance: &Value,
        indices: &[Value],
    ) -> Result<Value> {
        let invoker = property
            .indexed_getter(&self.compiler)?
            .ok_or_else(|| Error::NoAccessor {
                member: property.display_name(),
                kind: AccessorKind::Get,
            })?;
        invoker.invoke(instance, indices)
    }

    /// Writes `value` to the indexer `property` of `instance` at `indices`
    ///
    /// # Errors
    /// - [`Error::NoAccessor`] unless `property` is a writable indexer
    /// - arity, receiver and conversion errors, and any error raised by the setter body
    pub fn set_indexed(
        &self,
        property: &PropertyDescriptor,
        instance: &Value,
        indices: &[Value],
        value: Value,
    ) -> Result<()> {
        let invoker = property
            .indexed_setter(&self.compiler)?
            .ok_or_else(|| Error::NoAccessor {
                member: property.display_name(),
                kind: AccessorKind::Set,
            })?;
        let mut args = indices.to_vec();
        args.push(value);
        invoker.invoke(instance, &args)?;
        Ok(())
    }

    /// Calls `method` on `instance` (`null` for statics)
    ///
    /// # Errors
    /// - [`Error::OpenGeneric`] for generic definitions
    /// - arity, receiver and conversion errors, and any error raised by the method body
    pub fn invoke(&self, method: &MethodDescriptor, instance: &Value, args: &[Value]) -> Result<Value> {
        method.invoker(&self.compiler)?.invoke(instance, args)
    }

    /// Calls `method` on `instance` with a packed argument tuple
    ///
    /// # Errors
    /// See [`Engine::invoke`].
    pub fn invoke_tuple(
        &self,
        method: &MethodDescriptor,
        instance: &Value,
        args: &Value,
    ) -> Result<Value> {
        method
            .tuple_invoker(&self.compiler)?
            .invoke(instance, std::slice::from_ref(args))
    }

    // Resolution

    /// The constructor of `token` best matching `args`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn find_constructor(
        &self,
        token: Token,
        args: &[Value],
    ) -> Result<Option<Arc<ConstructorDescriptor>>> {
        let members = self.members(token)?;
        Ok(self.resolver().select(&members.constructors, CallShape::Values(args)))
    }

    /// The constructor of `token` best matching the argument types `arg_types`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn find_constructor_by_types(
        &self,
        token: Token,
        arg_types: &[Token],
    ) -> Result<Option<Arc<ConstructorDescriptor>>> {
        let members = self.members(token)?;
        Ok(self
            .resolver()
            .select(&members.constructors, CallShape::Types(arg_types)))
    }

    /// The indexer `name` of `token` best matching the index values `indices`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn find_indexer(
        &self,
        token: Token,
        name: &str,
        indices: &[Value],
    ) -> Result<Option<Arc<PropertyDescriptor>>> {
        let members = self.members(token)?;
        Ok(self
            .resolver()
            .select(members.indexers.get(name), CallShape::Values(indices)))
    }

    /// The instance method `name` of `token` best matching `args`.
    ///
    /// Non-generic overloads are considered first; if none applies, generic definitions are
    /// closed over type arguments inferred from `args`.
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn find_method(
        &self,
        token: Token,
        name: &str,
        args: &[Value],
    ) -> Result<Option<Arc<MethodDescriptor>>> {
        let members = self.members(token)?;
        self.select_method(members.methods.get(name), args)
    }

    /// The static method `name` of `token` best matching `args`, see [`Engine::find_method`]
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn find_static_method(
        &self,
        token: Token,
        name: &str,
        args: &[Value],
    ) -> Result<Option<Arc<MethodDescriptor>>> {
        let members = self.members(token)?;
        self.select_method(members.static_methods.get(name), args)
    }

    /// The non-generic method `name` of `token` best matching the argument types
    /// `arg_types`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn find_method_by_types(
        &self,
        token: Token,
        name: &str,
        is_static: bool,
        arg_types: &[Token],
    ) -> Result<Option<Arc<MethodDescriptor>>> {
        let members = self.members(token)?;
        let group = if is_static {
            members.static_methods.get(name)
        } else {
            members.methods.get(name)
        };

        Ok(self.resolver().select(
            group.iter().filter(|method| !method.is_generic_definition()),
            CallShape::Types(arg_types),
        ))
    }

    /// The generic instance method `name` of `token`, closed over `type_args` and best
    /// matching `shape`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types, or a type error if
    /// substitution produces an invalid type.
    pub fn find_generic_method(
        &self,
        token: Token,
        name: &str,
        type_args: &[Token],
        shape: CallShape<'_>,
    ) -> Result<Option<Arc<MethodDescriptor>>> {
        let members = self.members(token)?;
        self.select_generic(members.methods.get(name), type_args, shape)
    }

    /// The generic static method `name` of `token`, see [`Engine::find_generic_method`]
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types, or a type error if
    /// substitution produces an invalid type.
    pub fn find_static_generic_method(
        &self,
        token: Token,
        name: &str,
        type_args: &[Token],
        shape: CallShape<'_>,
    ) -> Result<Option<Arc<MethodDescriptor>>> {
        let members = self.members(token)?;
        self.select_generic(members.static_methods.get(name), type_args, shape)
    }

    fn resolver(&self) -> OverloadResolver<'_> {
        OverloadResolver::new(&self.types)
    }

    fn binder(&self) -> GenericBinder<'_> {
        GenericBinder::new(&self.types, &self.cache)
    }

    fn select_method(
        &self,
        group: &[Arc<MethodDescriptor>],
        args: &[Value],
    ) -> Result<Option<Arc<MethodDescriptor>>> {
        let resolver = self.resolver();
        let shape = CallShape::Values(args);

        let plain = resolver.select(
            group.iter().filter(|method| !method.is_generic_definition()),
            shape,
        );
        if plain.is_some() {
            return Ok(plain);
        }

        let binder = self.binder();
        let mut closed = Vec::new();
        for definition in group.iter().filter(|method| method.is_generic_definition()) {
            if let Some(method) = binder.bind_inferred(definition, args)? {
                closed.push(method);
            }
        }
        Ok(resolver.select(&closed, shape))
    }

    fn select_generic(
        &self,
        group: &[Arc<MethodDescriptor>],
        type_args: &[Token],
        shape: CallShape<'_>,
    ) -> Result<Option<Arc<MethodDescriptor>>> {
        let binder = self.binder();
        let mut closed = Vec::new();
        for definition in group
            .iter()
            .filter(|method| method.generic_type_count() == type_args.len())
        {
            if let Some(method) = binder.bind(definition, type_args)? {
                closed.push(method);
            }
        }
        Ok(self.resolver().select(&closed, shape))
    }

    // By-name convenience

    /// Creates an instance of `token` through the constructor best matching `args`
    ///
    /// # Errors
    /// - [`Error::MissingMember`] if no constructor applies
    /// - any error raised while creating the instance
    pub fn new_instance(&self, token: Token, args: &[Value]) -> Result<Value> {
        let constructor = self
            .find_constructor(token, args)?
            .ok_or_else(|| self.missing(token, ".ctor"))?;
        self.create(&constructor, args)
    }

    /// Calls the instance method `name` of `instance` best matching `args`, looked up on the
    /// runtime type of `instance`
    ///
    /// # Errors
    /// - [`Error::NullReference`] if `instance` is null
    /// - [`Error::MissingMember`] if no method applies
    /// - any error raised by the call
    pub fn call(&self, instance: &Value, name: &str, args: &[Value]) -> Result<Value> {
        let token = self.runtime_type(instance, name)?;
        let method = self
            .find_method(token, name, args)?
            .ok_or_else(|| self.missing(token, name))?;
        self.invoke(&method, instance, args)
    }

    /// Calls the static method `name` of `token` best matching `args`
    ///
    /// # Errors
    /// - [`Error::MissingMember`] if no method applies
    /// - any error raised by the call
    pub fn call_static(&self, token: Token, name: &str, args: &[Value]) -> Result<Value> {
        let method = self
            .find_static_method(token, name, args)?
            .ok_or_else(|| self.missing(token, name))?;
        self.invoke(&method, &Value::Null, args)
    }

    /// Reads the instance field or property `name` of `instance`
    ///
    /// # Errors
    /// - [`Error::NullReference`] if `instance` is null
    /// - [`Error::MissingMember`] if there is no such field or property
    /// - [`Error::NoAccessor`] for write-only properties
    pub fn get_member(&self, instance: &Value, name: &str) -> Result<Value> {
        let token = self.runtime_type(instance, name)?;
        let member = self.data_member(token, name)?;
        self.get(&*member, instance)
    }

    /// Writes the instance field or property `name` of `instance`
    ///
    /// # Errors
    /// - [`Error::NullReference`] if `instance` is null
    /// - [`Error::MissingMember`] if there is no such field or property
    /// - [`Error::NoAccessor`] for read-only members
    pub fn set_member(&self, instance: &Value, name: &str, value: Value) -> Result<()> {
        let token = self.runtime_type(instance, name)?;
        let member = self.data_member(token, name)?;
        self.set(&*member, instance, value)
    }

    /// Reads the indexer `name` of `instance` through the overload best matching `indices`
    ///
    /// # Errors
    /// - [`Error::NullReference`] if `instance` is null
    /// - [`Error::MissingMember`] if no indexer applies
    /// - see [`Engine::get_indexed`]
    pub fn get_index(&self, instance: &Value, name: &str, indices: &[Value]) -> Result<Value> {
        let token = self.runtime_type(instance, name)?;
        let indexer = self
            .find_indexer(token, name, indices)?
            .ok_or_else(|| self.missing(token, name))?;
        self.get_indexed(&indexer, instance, indices)
    }

    /// Writes `value` through the indexer `name` of `instance` best matching `indices`
    ///
    /// # Errors
    /// - [`Error::NullReference`] if `instance` is null
    /// - [`Error::MissingMember`] if no indexer applies
    /// - see [`Engine::set_indexed`]
    pub fn set_index(
        &self,
        instance: &Value,
        name: &str,
        indices: &[Value],
        value: Value,
    ) -> Result<()> {
        let token = self.runtime_type(instance, name)?;
        let indexer = self
            .find_indexer(token, name, indices)?
            .ok_or_else(|| self.missing(token, name))?;
        self.set_indexed(&indexer, instance, indices, value)
    }

    fn runtime_type(&self, instance: &Value, name: &str) -> Result<Token> {
        self.types.runtime_type(instance)?.ok_or_else(|| {
            Error::NullReference(format!("cannot access member '{name}' of a null instance"))
        })
    }

    fn data_member(&self, token: Token, name: &str) -> Result<Arc<dyn DataMember>> {
        let members = self.members(token)?;
        if let Some(field) = members.fields.get(name) {
            return Ok(field.clone());
        }
        if let Some(property) = members.properties.get(name) {
            return Ok(property.clone());
        }
        Err(self.missing(token, name))
    }

    fn missing(&self, token: Token, name: &str) -> Error {
        Error::MissingMember {
            owner: self.types.display_name(token),
            name: name.to_string(),
        }
    }

    // Events

    /// Subscribes `handler` to `event` of `instance` (`null` for static events)
    ///
    /// # Errors
    /// Returns receiver and conversion errors, and any error raised by the add method.
    pub fn add_handler(
        &self,
        event: &EventDescriptor,
        instance: &Value,
        handler: Delegate,
    ) -> Result<()> {
        self.invoke(event.add(), instance, &[Value::Delegate(handler)])?;
        Ok(())
    }

    /// Unsubscribes `handler` from `event` of `instance`
    ///
    /// # Errors
    /// Returns receiver and conversion errors, and any error raised by the remove method.
    pub fn remove_handler(
        &self,
        event: &EventDescriptor,
        instance: &Value,
        handler: Delegate,
    ) -> Result<()> {
        self.invoke(event.remove(), instance, &[Value::Delegate(handler)])?;
        Ok(())
    }

    /// Invokes every handler subscribed to `event` of `instance` with `args`
    ///
    /// # Errors
    /// - [`Error::NoAccessor`] if the event has no raise method
    /// - any error raised by a handler
    pub fn raise(&self, event: &EventDescriptor, instance: &Value, args: &[Value]) -> Result<()> {
        let raise = event.raise().ok_or_else(|| Error::NoAccessor {
            member: event.display_name(),
            kind: AccessorKind::Invoke,
        })?;
        self.invoke(raise, instance, args)?;
        Ok(())
    }

    // Mapping

    /// Builds a mapper copying the members of `from` into those of `to`
    ///
    /// # Errors
    /// - [`Error::InvalidOverride`] or [`Error::AmbiguousOverride`] for bad overrides
    /// - [`Error::TypeNotFound`] for unregistered types
    pub fn build_mapper(&self, from: Token, to: Token, options: &MapperOptions) -> Result<Mapper> {
        Mapper::build(
            &self.compiler,
            &*self.members(from)?,
            &*self.members(to)?,
            options,
        )
    }

    /// The override-free mapper from `from` to `to`, built once per engine
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] for unregistered types.
    pub fn mapper(&self, from: Token, to: Token, ignore_case: bool) -> Result<Arc<Mapper>> {
        self.cache.mapper((from, to, ignore_case), || {
            let options = MapperOptions {
                ignore_case,
                overrides: Vec::new(),
            };
            self.build_mapper(from, to, &options)
        })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", self.cache.config())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::fixtures;

    #[test]
    fn test_point_scenario() {
        let registry = fixtures::registry();
        let point = fixtures::point(&registry);
        let engine = Engine::new(registry);

        let fields = engine.fields_of(point.token).unwrap();
        assert_eq!(
            fields.iter().map(|field| field.name()).collect::<Vec<_>>(),
            vec!["x", "y"]
        );

        let constructor = engine
            .find_constructor(point.token, &[Value::I4(3), Value::I4(4)])
            .unwrap()
            .unwrap();
        let instance = engine
            .create(&constructor, &[Value::I4(3), Value::I4(4)])
            .unwrap();
        assert_eq!(engine.get(&*fields[0], &instance).unwrap(), Value::I4(3));

        engine.set(&*fields[1], &instance, Value::I4(10)).unwrap();
        assert_eq!(engine.get_member(&instance, "y").unwrap(), Value::I4(10));
    }

    #[test]
    fn test_stats_track_compilations() {
        let registry = fixtures::registry();
        let point = fixtures::point(&registry);
        let engine = Engine::new(registry);
        assert_eq!(engine.stats(), EngineStats::default());

        let instance = engine.new_instance(point.token, &[]).unwrap();
        engine.get_member(&instance, "x").unwrap();
        engine.get_member(&instance, "x").unwrap();

        let stats = engine.stats();
        assert_eq!(stats.types_discovered, 2);
        assert_eq!(stats.compilations, 2);
    }

    #[test]
    fn test_missing_members() {
        let registry = fixtures::registry();
        let point = fixtures::point(&registry);
        let engine = Engine::new(registry);
        let instance = engine.new_instance(point.token, &[]).unwrap();

        assert!(matches!(
            engine.call(&instance, "Nope", &[]),
            Err(Error::MissingMember { .. })
        ));
        assert!(matches!(
            engine.get_member(&instance, "z"),
            Err(Error::MissingMember { .. })
        ));
        assert!(matches!(
            engine.get_member(&Value::Null, "x"),
            Err(Error::NullReference(_))
        ));
        assert!(matches!(
            engine.new_instance(point.token, &[Value::from("a")]),
            Err(Error::MissingMember { .. })
        ));
    }

    #[test]
    fn test_preload() {
        let registry = fixtures::registry();
        let point = fixtures::point(&registry);
        let person = fixtures::person(&registry);
        let engine = Engine::new(registry);

        engine.preload(&[point.token, person.token]).unwrap();
        assert!(engine.stats().types_discovered >= 2);
        assert!(engine.preload(&[Token(0x0200_0999)]).is_err());
    }
}
