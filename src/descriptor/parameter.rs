use std::sync::Arc;

use crate::{
    descriptor::MemberId,
    metadata::{
        customattributes::{effective_name, CustomAttributeList},
        members::{ParamAttributes, ParamDef},
        token::Token,
    },
    value::Value,
};

/// A parameter of a constructor, method or indexer.
///
/// For closed generic methods `param_type` is the substituted type, never a placeholder.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    /// The member this parameter belongs to
    pub member: MemberId,
    /// Token
    pub token: Token,
    /// The parameter name (rename annotation applied)
    pub name: String,
    /// Zero-based position in the parameter list
    pub position: usize,
    /// The parameter type
    pub param_type: Token,
    /// The value passed when the argument is omitted
    pub default_value: Option<Value>,
    /// Raw parameter flags
    pub flags: ParamAttributes,
    /// Custom attributes applied to this parameter
    pub attributes: CustomAttributeList,
}

impl ParameterDescriptor {
    /// Creates the descriptor of `def`, typed as `param_type`
    #[must_use]
    pub fn new(member: MemberId, def: &ParamDef, param_type: Token) -> Self {
        ParameterDescriptor {
            member,
            token: def.token,
            name: effective_name(&def.name, &def.custom_attributes),
            position: def.sequence,
            param_type,
            default_value: def.default.clone(),
            flags: def.attributes(),
            attributes: Arc::from(def.custom_attributes.as_slice()),
        }
    }

    /// Returns true if the parameter declares a default value
    #[must_use]
    pub fn has_default_value(&self) -> bool {
        self.default_value.is_some()
    }

    /// Returns true if the argument may be omitted
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.has_default_value() || self.flags.contains(ParamAttributes::OPTIONAL)
    }

    /// Returns true for `out` parameters
    #[must_use]
    pub fn is_out(&self) -> bool {
        self.flags.contains(ParamAttributes::OUT)
    }
}
