// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::too_many_arguments)]

//! # reflectscope
//!
//! A member cache and compiled accessor engine for a runtime type system. Hosts register
//! their types once; `reflectscope` discovers their constructors, fields, properties,
//! methods and events, and turns each member into a directly callable accessor the first
//! time it is used.
//!
//! ## Features
//!
//! - **Cached discovery** - Member collections are built once per type and shared, with
//!   inherited members reusing the base type's descriptors
//! - **Compiled accessors** - Creators, getters, setters and invokers are lowered from a small
//!   operation tree to closures, once per descriptor
//! - **Overload resolution** - Picks the cheapest applicable overload for argument values,
//!   argument types or a packed tuple, honouring defaulted parameters
//! - **Generic methods** - Closes generic definitions over explicit or inferred type
//!   arguments, checking every constraint
//! - **Mapping** - Pairs and copies data members between unrelated types by name
//! - **Thread safe** - Every cache tolerates concurrent first access; accessors are
//!   `Send + Sync`
//!
//! ## Quick Start
//!
//! ```rust
//! use reflectscope::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(TypeRegistry::new());
//! let int = PrimitiveKind::I4.token();
//! let point = TypeBuilder::new(registry.clone())
//!     .value_type("Geometry", "Point")
//!     .field(FieldSpec::new("x", int))
//!     .field(FieldSpec::new("y", int))
//!     .field_constructor(&["x", "y"])
//!     .build()?;
//!
//! let engine = Engine::new(registry);
//! let p = engine.new_instance(point.token, &[Value::I4(3), Value::I4(4)])?;
//! assert_eq!(engine.get_member(&p, "y")?, Value::I4(4));
//! # Ok::<(), reflectscope::Error>(())
//! ```
//!
//! ### Descriptor-based Access
//!
//! The by-name calls resolve a member on every call. Holding on to a descriptor, or to the
//! accessor it compiled, skips resolution entirely:
//!
//! ```rust
//! use reflectscope::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(TypeRegistry::new());
//! let string = PrimitiveKind::String.token();
//! let person = TypeBuilder::new(registry.clone())
//!     .class("Demo", "Person")
//!     .property(PropertySpec::new("Name", string).auto())
//!     .build()?;
//!
//! let engine = Engine::new(registry);
//! let name = engine.members(person.token)?.properties.get("Name").unwrap().clone();
//! let getter = engine.getter(&*name)?.expect("readable");
//! let setter = engine.setter(&*name)?.expect("writable");
//!
//! let instance = engine.new_instance(person.token, &[])?;
//! setter.set(&instance, Value::from("Ada"))?;
//! assert_eq!(getter.get(&instance)?, Value::from("Ada"));
//! # Ok::<(), reflectscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - Host type registry, member definitions and the registration builder
//! - [`value`] - Dynamic values, heap objects, delegates and tuple packing
//! - [`descriptor`] - Member descriptors, each caching its compiled accessors
//! - [`cache`] - Per-type member discovery and the engine-wide caches
//! - [`ir`] - Accessor operation trees
//! - [`compiler`] - Lowering of operation trees to accessors
//! - [`resolver`] - Overload and generic method resolution
//! - [`mapper`] - Member-to-member copying between types
//! - [`Engine`] - The root tying everything together
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. Lookup operations that may legitimately find
//! nothing return `Ok(None)`; by-name convenience calls report [`Error::MissingMember`]
//! instead. Errors raised by native member bodies pass through accessors unchanged.
//!
//! ## Logging
//!
//! Discovery, compilation, generic binding and mapper construction log through the [`log`]
//! facade at `debug` and `trace` level. No logger is installed by the crate.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use reflectscope::prelude::*;
/// use std::sync::Arc;
///
/// let engine = Engine::new(Arc::new(TypeRegistry::new()));
/// assert_eq!(engine.stats(), EngineStats::default());
/// ```
pub mod prelude;

/// Per-type member discovery and the caches shared by an engine
pub mod cache;

/// Compilation of operation trees into accessors
pub mod compiler;

/// Engine configuration
pub mod config;

/// Member descriptors.
///
/// Descriptors are the immutable, shareable description of one member: its identity, its
/// signature and its annotations. Each descriptor lazily compiles and then caches the
/// accessors for its member.
///
/// # Key Types
///
/// - [`descriptor::ConstructorDescriptor`] - A constructor, compiled to a [`compiler::Creator`]
/// - [`descriptor::FieldDescriptor`] - A field, compiled to a getter and a setter
/// - [`descriptor::PropertyDescriptor`] - A property, possibly indexed
/// - [`descriptor::MethodDescriptor`] - A method or closed generic method
/// - [`descriptor::EventDescriptor`] - An event with its add, remove and raise methods
pub mod descriptor;

/// The engine root object
pub mod engine;

/// Accessor operation trees
pub mod ir;

/// Copying data members between unrelated types
pub mod mapper;

/// Host metadata: identity tokens, the type system and member definitions.
///
/// # Key Components
///
/// - [`metadata::typesystem::TypeRegistry`] - Owns every registered type
/// - [`metadata::typesystem::TypeBuilder`] - Registers host types and their members
/// - [`metadata::token`] - Identity tokens for types and members
/// - [`metadata::customattributes`] - Annotations such as the rename annotation
///
/// # Examples
///
/// ```rust
/// use reflectscope::metadata::typesystem::{PrimitiveKind, TypeBuilder, TypeRegistry};
/// use std::sync::Arc;
///
/// let registry = Arc::new(TypeRegistry::new());
/// let shape = TypeBuilder::new(registry.clone())
///     .class("Geometry", "Shape")
///     .build()?;
/// assert_eq!(registry.display_name(shape.token), "Geometry.Shape");
/// assert_eq!(registry.display_name(PrimitiveKind::I4.token()), "System.Int32");
/// # Ok::<(), reflectscope::Error>(())
/// ```
pub mod metadata;

/// Overload and generic method resolution
pub mod resolver;

/// Dynamic values
pub mod value;

/// `reflectscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `reflectscope` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust
/// use reflectscope::{Engine, Error, TypeRegistry, Value};
/// use std::sync::Arc;
///
/// let engine = Engine::new(Arc::new(TypeRegistry::new()));
/// match engine.call(&Value::Null, "ToString", &[]) {
///     Err(Error::NullReference(_)) => {}
///     other => panic!("unexpected: {:?}", other),
/// }
/// ```
pub use error::Error;

/// The engine and its counters.
///
/// See [`engine`] for an overview of the operations.
pub use engine::{Engine, EngineStats};

/// Member discovery settings
pub use config::EngineConfig;

/// The registry every engine reflects over
pub use metadata::typesystem::TypeRegistry;

/// Identity of a type or member
pub use metadata::token::Token;

/// A dynamic value
pub use value::Value;

/// Compiled accessors
pub use compiler::{Creator, Getter, Invoker, Setter};

/// Member descriptors and the traits they share
pub use descriptor::{
    ConstructorDescriptor, DataMember, EventDescriptor, FieldDescriptor, Member,
    MethodDescriptor, Overload, PropertyDescriptor,
};

/// Call shapes accepted by overload resolution
pub use resolver::CallShape;

/// Member mapping between types
pub use mapper::{MapOverride, Mapper, MapperOptions};
