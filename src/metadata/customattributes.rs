//! Custom attributes (annotations) attached to types and members.
//!
//! Attributes are opaque to the engine with one exception: the rename annotation
//! ([`RENAME_ATTRIBUTE`]) replaces a member's declared name during discovery, so every
//! by-name lookup (resolver, mapper, convenience calls) sees the annotated name instead.

use std::sync::Arc;

use crate::value::Value;

/// Name of the annotation that renames a member for by-name lookups
pub const RENAME_ATTRIBUTE: &str = "Rename";

/// An ordered, duplicate-preserving list of attributes as exposed by descriptors
pub type CustomAttributeList = Arc<[CustomAttribute]>;

/// A single annotation: its name plus positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttribute {
    /// The attribute type name, e.g. `Obsolete`
    pub name: String,
    /// Positional constructor arguments
    pub args: Vec<Value>,
}

impl CustomAttribute {
    /// Creates an attribute without arguments
    pub fn new(name: impl Into<String>) -> Self {
        CustomAttribute {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Creates an attribute with positional arguments
    pub fn with_args(name: impl Into<String>, args: Vec<Value>) -> Self {
        CustomAttribute {
            name: name.into(),
            args,
        }
    }

    /// Creates the rename annotation
    ///
    /// ```rust
    /// use reflectscope::metadata::customattributes::CustomAttribute;
    ///
    /// let attribute = CustomAttribute::rename("full_name");
    /// assert_eq!(attribute.renamed_to(), Some("full_name"));
    /// ```
    pub fn rename(name: impl Into<String>) -> Self {
        CustomAttribute {
            name: RENAME_ATTRIBUTE.to_string(),
            args: vec![Value::from(name.into())],
        }
    }

    /// If this is a rename annotation, the name it assigns
    #[must_use]
    pub fn renamed_to(&self) -> Option<&str> {
        if self.name != RENAME_ATTRIBUTE {
            return None;
        }

        self.args.first().and_then(Value::as_str)
    }
}

/// Applies the first rename annotation in `attributes` to `declared`
#[must_use]
pub fn effective_name(declared: &str, attributes: &[CustomAttribute]) -> String {
    attributes
        .iter()
        .find_map(CustomAttribute::renamed_to)
        .unwrap_or(declared)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_name_without_rename() {
        let attributes = vec![CustomAttribute::new("Obsolete")];
        assert_eq!(effective_name("Name", &attributes), "Name");
    }

    #[test]
    fn test_effective_name_first_rename_wins() {
        let attributes = vec![
            CustomAttribute::new("Obsolete"),
            CustomAttribute::rename("first"),
            CustomAttribute::rename("second"),
        ];
        assert_eq!(effective_name("Name", &attributes), "first");
    }

    #[test]
    fn test_malformed_rename_is_ignored() {
        let attributes = vec![CustomAttribute::with_args(RENAME_ATTRIBUTE, vec![Value::I4(1)])];
        assert_eq!(effective_name("Name", &attributes), "Name");
    }
}
