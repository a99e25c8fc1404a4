//! Overload and generic method resolution.
//!
//! Given a group of overloads sharing one name and the shape of a call, the resolver picks
//! the single member the call binds to, or reports that none applies (`None`, never an
//! error). Generic method definitions are handled by [`GenericBinder`], which checks
//! constraints, infers type arguments from argument values and closes definitions through
//! the member cache.
//!
//! # Ranking
//!
//! A candidate applies when the argument count fits its parameter list (missing trailing
//! arguments must be optional) and every argument converts implicitly to its parameter type.
//! Among applicable candidates the one with the lowest total conversion cost wins; ties go
//! to the candidate whose parameter count equals the argument count, then to declaration
//! order.

mod generic;

use std::sync::Arc;

pub use generic::GenericBinder;

use crate::{
    descriptor::{Overload, ParameterDescriptor},
    metadata::{token::Token, typesystem::TypeRegistry},
    value::{tuple, Value},
};

/// The arguments of a call, as the resolver sees them.
#[derive(Debug, Clone, Copy)]
pub enum CallShape<'a> {
    /// Actual argument values; runtime types decide applicability
    Values(&'a [Value]),
    /// Declared argument types, for call-site validation ahead of any call
    Types(&'a [Token]),
    /// A packed argument tuple, see [`crate::value::tuple`]
    Tuple(&'a Value),
}

impl CallShape<'_> {
    /// Number of arguments; `None` if a tuple shape holds no tuple
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            CallShape::Values(values) => Some(values.len()),
            CallShape::Types(types) => Some(types.len()),
            CallShape::Tuple(packed) => tuple::unpack(packed).map(|values| values.len()),
        }
    }
}

/// Argument lists the resolver compares against parameters
enum Arguments<'a> {
    Values(std::borrow::Cow<'a, [Value]>),
    Types(&'a [Token]),
}

impl<'a> Arguments<'a> {
    fn from_shape(shape: CallShape<'a>) -> Option<Self> {
        Some(match shape {
            CallShape::Values(values) => Arguments::Values(values.into()),
            CallShape::Types(types) => Arguments::Types(types),
            CallShape::Tuple(packed) => Arguments::Values(tuple::unpack(packed)?.into()),
        })
    }

    fn len(&self) -> usize {
        match self {
            Arguments::Values(values) => values.len(),
            Arguments::Types(types) => types.len(),
        }
    }
}

/// Picks the best overload for a call.
pub struct OverloadResolver<'a> {
    types: &'a TypeRegistry,
}

impl<'a> OverloadResolver<'a> {
    /// Creates a resolver checking conversions against `types`
    #[must_use]
    pub fn new(types: &'a TypeRegistry) -> Self {
        OverloadResolver { types }
    }

    /// Selects the best applicable candidate for `shape`.
    ///
    /// ## Arguments
    /// * `candidates` - The overloads, in declaration order
    /// * `shape` - The arguments of the call
    ///
    /// Returns `None` if no candidate applies.
    pub fn select<'c, T, I>(&self, candidates: I, shape: CallShape<'_>) -> Option<Arc<T>>
    where
        T: Overload + 'c,
        I: IntoIterator<Item = &'c Arc<T>>,
    {
        let arguments = Arguments::from_shape(shape)?;

        candidates
            .into_iter()
            .enumerate()
            .filter_map(|(order, candidate)| {
                let cost = self.cost(&**candidate, &arguments)?;
                let inexact = usize::from(candidate.parameters().len() != arguments.len());
                Some(((cost, inexact, order), candidate))
            })
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, candidate)| candidate.clone())
    }

    /// Returns true if `candidate` accepts `shape`
    #[must_use]
    pub fn applies<T: Overload>(&self, candidate: &T, shape: CallShape<'_>) -> bool {
        Arguments::from_shape(shape)
            .is_some_and(|arguments| self.cost(candidate, &arguments).is_some())
    }

    /// Total conversion cost of binding `arguments` to the parameters of `candidate`
    fn cost<T: Overload + ?Sized>(&self, candidate: &T, arguments: &Arguments<'_>) -> Option<u32> {
        let parameters = candidate.parameters();
        if arguments.len() > parameters.len() || arguments.len() < candidate.required_parameters()
        {
            return None;
        }

        match arguments {
            Arguments::Values(values) => {
                if parameters.iter().any(ParameterDescriptor::is_out) {
                    return None;
                }
                values
                    .iter()
                    .zip(parameters)
                    .try_fold(0_u32, |total, (value, parameter)| {
                        let cost = self
                            .types
                            .value_conversion_cost(value, parameter.param_type)?;
                        Some(total.saturating_add(cost))
                    })
            }
            Arguments::Types(types) => {
                types
                    .iter()
                    .zip(parameters)
                    .try_fold(0_u32, |total, (token, parameter)| {
                        let cost = self.types.conversion_cost(*token, parameter.param_type)?;
                        Some(total.saturating_add(cost))
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::MemberCache,
        config::EngineConfig,
        metadata::typesystem::PrimitiveKind,
        test::fixtures,
    };

    #[test]
    fn test_exact_match_preferred_over_widening() {
        let registry = fixtures::registry();
        let calculator = fixtures::calculator(&registry);
        let cache = MemberCache::new(registry.clone(), EngineConfig::default());
        let members = cache.members(calculator.token).unwrap();
        let resolver = OverloadResolver::new(&registry);

        let group = members.static_methods.get("Add");
        let ints = resolver
            .select(group, CallShape::Values(&[Value::I4(1), Value::I4(2)]))
            .unwrap();
        assert_eq!(ints.parameters()[0].param_type, PrimitiveKind::I4.token());

        let doubles = resolver
            .select(group, CallShape::Values(&[Value::R8(1.0), Value::I4(2)]))
            .unwrap();
        assert_eq!(doubles.parameters()[0].param_type, PrimitiveKind::R8.token());
    }

    #[test]
    fn test_no_applicable_overload() {
        let registry = fixtures::registry();
        let calculator = fixtures::calculator(&registry);
        let cache = MemberCache::new(registry.clone(), EngineConfig::default());
        let members = cache.members(calculator.token).unwrap();
        let resolver = OverloadResolver::new(&registry);

        let group = members.static_methods.get("Add");
        assert!(resolver
            .select(group, CallShape::Values(&[Value::from("one"), Value::I4(2)]))
            .is_none());
        assert!(resolver
            .select(group, CallShape::Values(&[Value::I4(1)]))
            .is_none());
    }

    #[test]
    fn test_defaults_fill_missing_arguments() {
        let registry = fixtures::registry();
        let calculator = fixtures::calculator(&registry);
        let cache = MemberCache::new(registry.clone(), EngineConfig::default());
        let members = cache.members(calculator.token).unwrap();
        let resolver = OverloadResolver::new(&registry);

        let group = members.static_methods.get("Offset");
        let one = resolver.select(group, CallShape::Values(&[Value::I4(1)]));
        assert!(one.is_some());

        let none = resolver.select(group, CallShape::Values(&[]));
        assert!(none.is_none());
    }

    #[test]
    fn test_exact_arity_breaks_ties() {
        let registry = fixtures::registry();
        let calculator = fixtures::calculator(&registry);
        let cache = MemberCache::new(registry.clone(), EngineConfig::default());
        let members = cache.members(calculator.token).unwrap();
        let resolver = OverloadResolver::new(&registry);

        let group = members.static_methods.get("Scale");
        let chosen = resolver
            .select(group, CallShape::Values(&[Value::I4(3)]))
            .unwrap();
        assert_eq!(chosen.parameters().len(), 1);
    }

    #[test]
    fn test_type_shape_and_out_parameters() {
        let registry = fixtures::registry();
        let calculator = fixtures::calculator(&registry);
        let cache = MemberCache::new(registry.clone(), EngineConfig::default());
        let members = cache.members(calculator.token).unwrap();
        let resolver = OverloadResolver::new(&registry);

        let parse = members.static_methods.get("TryParse");
        let string = PrimitiveKind::String.token();
        let int = PrimitiveKind::I4.token();

        assert!(resolver
            .select(parse, CallShape::Values(&[Value::from("1"), Value::I4(0)]))
            .is_none());
        assert!(resolver
            .select(parse, CallShape::Types(&[string, int]))
            .is_some());
    }

    #[test]
    fn test_tuple_shape_unpacks() {
        let registry = fixtures::registry();
        let calculator = fixtures::calculator(&registry);
        let cache = MemberCache::new(registry.clone(), EngineConfig::default());
        let members = cache.members(calculator.token).unwrap();
        let resolver = OverloadResolver::new(&registry);

        let packed = tuple::pack(vec![Value::I4(1), Value::I4(2)]);
        assert_eq!(CallShape::Tuple(&packed).len(), Some(2));
        assert!(resolver
            .select(members.static_methods.get("Add"), CallShape::Tuple(&packed))
            .is_some());
        assert!(resolver
            .select(
                members.static_methods.get("Add"),
                CallShape::Tuple(&Value::I4(1))
            )
            .is_none());
    }
}
