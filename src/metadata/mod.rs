//! Host metadata: identities, the type system and raw member definitions.
//!
//! This module contains everything the engine reflects over. Hosts register their types
//! through [`typesystem::TypeBuilder`]; the engine never mutates metadata, it only reads it to
//! build descriptors and compile accessors.
//!
//! # Key Components
//!
//! - [`token`] - Identity tokens for types and members
//! - [`typesystem`] - The type registry, type definitions and the registration builder
//! - [`members`] - Raw field, method, constructor, property and event definitions
//! - [`customattributes`] - Annotations, including the rename annotation

/// Custom attributes and the rename annotation
pub mod customattributes;
/// Raw member definitions and native body signatures
pub mod members;
/// Identity tokens shared by every cache
pub mod token;
/// The host type system
pub mod typesystem;
