//! # reflectscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the reflectscope library. Import this module to get quick access to the essential
//! types for registering host types and working with their members.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all reflectscope operations
pub use crate::Error;

/// The result type used throughout reflectscope
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The engine root and its counters
pub use crate::{Engine, EngineStats};

/// Member discovery settings
pub use crate::EngineConfig;

// ================================================================================================
// Type System
// ================================================================================================

/// Identity tokens
pub use crate::metadata::token::Token;

/// Registry, type definitions and the registration builder
pub use crate::metadata::typesystem::{
    ConstructorSpec, EventSpec, FieldSpec, GenericParamSpec, MethodSpec, ParamSpec,
    PrimitiveKind, PropertySpec, TypeBuilder, TypeDef, TypeFlavor, TypeRc, TypeRegistry,
};

/// Member flags and the native call frame
pub use crate::metadata::members::{CallFrame, MemberAccess, TypeAttributes};

/// Annotations
pub use crate::metadata::customattributes::CustomAttribute;

// ================================================================================================
// Values
// ================================================================================================

/// Dynamic values and heap objects
pub use crate::value::{Array, ArrayRef, Delegate, Object, ObjectRef, Value};

// ================================================================================================
// Descriptors and Accessors
// ================================================================================================

/// Member descriptors
pub use crate::descriptor::{
    ConstructorDescriptor, EventDescriptor, FieldDescriptor, MemberId, MemberKind,
    MethodDescriptor, ParameterDescriptor, PropertyDescriptor,
};

/// Traits shared by descriptors
pub use crate::descriptor::{DataMember, Member, Overload};

/// Compiled accessors
pub use crate::compiler::{Creator, Getter, Invoker, Setter};

// ================================================================================================
// Resolution and Mapping
// ================================================================================================

/// Call shapes accepted by overload resolution
pub use crate::resolver::CallShape;

/// Member mapping between types
pub use crate::mapper::{MapOverride, Mapper, MapperOptions};
