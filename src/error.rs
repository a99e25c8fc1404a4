use thiserror::Error;

use crate::{ir::AccessorKind, metadata::token::Token};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! compilation_error {
    ($member:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
        crate::Error::Compilation {
            member: $member.to_string(),
            message: format!($fmt $(, $arg)*),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Lookups that simply find nothing (no such member, no applicable overload) are not errors:
/// they surface as `Ok(None)`. The variants below cover the remaining failure classes:
///
/// ## Registration Errors
/// - [`Error::Malformed`] - A host type registration is internally inconsistent
/// - [`Error::TypeNotFound`] - A token does not name a registered type
/// - [`Error::TypeError`] - A constructed type request is invalid (e.g. `Nullable<string>`)
/// - [`Error::RecursionLimit`] - Value-type nesting exceeded the configured depth
///
/// ## Construction-Time Errors
/// - [`Error::Compilation`] - An operation tree could not be lowered into an accessor
/// - [`Error::InvalidOverride`] - A mapper override names an unknown member
/// - [`Error::AmbiguousOverride`] - A mapper override pairs incompatible member types
///
/// ## Invocation Errors
/// - [`Error::MissingMember`] - A by-name convenience call found no matching member
/// - [`Error::NoAccessor`] - The member does not support the requested operation
/// - [`Error::OpenGeneric`] - An unbound generic method definition was invoked
/// - [`Error::ArgumentCount`] - Too few arguments reached a compiled accessor
/// - [`Error::InvalidCast`] - A receiver or argument is not assignable to the target type
/// - [`Error::NullReference`] - A null receiver or a null for a non-nullable value type
/// - [`Error::IndexOutOfRange`] - An array or tuple index is out of bounds
///
/// ## Member Errors
/// - [`Error::Exception`] - Raised by a host member body; propagated unchanged
///
/// # Examples
///
/// ```rust
/// use reflectscope::{Engine, Error, TypeRegistry, Value};
/// use std::sync::Arc;
///
/// let engine = Engine::new(Arc::new(TypeRegistry::new()));
/// match engine.call(&Value::Null, "Missing", &[]) {
///     Err(Error::NullReference(_)) => {}
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A host registration is damaged or internally inconsistent.
    ///
    /// The error includes the source location where the inconsistency was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Failed to find type in the `TypeRegistry`.
    ///
    /// The associated [`Token`] identifies which type was not found.
    #[error("Failed to find type in TypeRegistry - {0}")]
    TypeNotFound(Token),

    /// General error during `TypeRegistry` usage.
    #[error("{0}")]
    TypeError(String),

    /// Recursion limit reached while materialising default values of nested value types.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Failed to lock target.
    #[error("Failed to lock target")]
    LockError,

    /// An operation tree could not be lowered into an accessor.
    ///
    /// This indicates a member shape that slipped past discovery filtering and is a
    /// defect in the caller or the host registration, never a runtime condition.
    #[error("Failed to compile accessor for {member}: {message}")]
    Compilation {
        /// Display name of the member being compiled
        member: String,
        /// What could not be lowered
        message: String,
    },

    /// A by-name convenience path found no member matching the request.
    #[error("Member '{name}' not found on type {owner}")]
    MissingMember {
        /// Full name of the searched type
        owner: String,
        /// The requested member name
        name: String,
    },

    /// The member exists but does not provide the requested accessor (e.g. setting a
    /// read-only property).
    #[error("Member '{member}' has no {kind} accessor")]
    NoAccessor {
        /// Display name of the member
        member: String,
        /// The accessor shape that was requested
        kind: AccessorKind,
    },

    /// An open generic method definition was invoked without binding its type arguments.
    #[error("Cannot invoke open generic method '{0}' - bind its type arguments first")]
    OpenGeneric(String),

    /// A compiled accessor received fewer arguments than the member requires.
    #[error("Expected {expected} argument(s), {provided} provided")]
    ArgumentCount {
        /// Number of parameters without a default value
        expected: usize,
        /// Number of arguments passed to the accessor
        provided: usize,
    },

    /// A value is not assignable to the type an accessor requires.
    #[error("Unable to cast value of type '{from}' to type '{to}'")]
    InvalidCast {
        /// Runtime type name of the value
        from: String,
        /// Required type name
        to: String,
    },

    /// A null receiver was dereferenced, or a null was supplied for a non-nullable value type.
    #[error("Null reference: {0}")]
    NullReference(String),

    /// An array or tuple index lies outside of its bounds.
    #[error("Index {index} is out of range for length {len}")]
    IndexOutOfRange {
        /// The requested index
        index: usize,
        /// The length of the indexed value
        len: usize,
    },

    /// A mapper override names a member that does not exist on the respective type.
    #[error("Invalid mapper override - {0}")]
    InvalidOverride(String),

    /// A mapper override pairs two members whose types cannot be copied into each other.
    #[error("Mapper override '{target}' ({target_type}) <- '{from_member}' ({from_type}) pairs incompatible types")]
    AmbiguousOverride {
        /// Target member name
        target: String,
        /// Target member type name
        target_type: String,
        /// Source member name
        from_member: String,
        /// Source member type name
        from_type: String,
    },

    /// An exception raised by a host member body.
    ///
    /// The engine never produces this variant on its own; it exists so host bodies have a
    /// structured way to fail, and it is propagated to the invoking caller unchanged.
    #[error("{type_name}: {message}")]
    Exception {
        /// Name of the exception type
        type_name: String,
        /// The exception message
        message: String,
    },
}

impl Error {
    /// Convenience constructor for [`Error::Exception`].
    pub fn exception(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Exception {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}
