use std::sync::Arc;

use crate::{
    cache::MemberCache,
    descriptor::{GenericParameterDescriptor, Member, MethodDescriptor},
    metadata::{
        members::{GenericParamAttributes, MemberAccess},
        token::Token,
        typesystem::{TypeFlavor, TypeRegistry},
    },
    value::Value,
    Result,
};

/// Maximum nesting depth walked while inferring type arguments
const MAX_INFERENCE_DEPTH: usize = 32;

/// Binds type arguments to generic method definitions.
///
/// Closed descriptors are served from the [`MemberCache`], so binding the same definition to
/// the same arguments twice yields the same descriptor and its invoker compiles once.
pub struct GenericBinder<'a> {
    types: &'a TypeRegistry,
    cache: &'a MemberCache,
}

impl<'a> GenericBinder<'a> {
    /// Creates a binder closing definitions through `cache`
    #[must_use]
    pub fn new(types: &'a TypeRegistry, cache: &'a MemberCache) -> Self {
        GenericBinder { types, cache }
    }

    /// Closes `definition` over `type_args`.
    ///
    /// Returns `Ok(None)` if `definition` is not a generic definition, if the argument count
    /// differs from its generic arity, or if an argument violates a constraint.
    ///
    /// # Errors
    /// Returns a type error if substitution produces an invalid type.
    pub fn bind(
        &self,
        definition: &Arc<MethodDescriptor>,
        type_args: &[Token],
    ) -> Result<Option<Arc<MethodDescriptor>>> {
        if !definition.is_generic_definition()
            || type_args.len() != definition.generic_type_count()
        {
            return Ok(None);
        }

        for (parameter, argument) in definition.generic_parameters().iter().zip(type_args) {
            if !self.satisfies(parameter, *argument, type_args)? {
                log::debug!(
                    "{} rejects {} for {}",
                    definition.display_name(),
                    self.types.display_name(*argument),
                    parameter.name
                );
                return Ok(None);
            }
        }

        self.cache.closed_method(definition, type_args).map(Some)
    }

    /// Infers the type arguments of `definition` from argument values, then binds them.
    ///
    /// Every generic parameter must appear in a parameter type matched by a non-null
    /// argument; conflicting inferences fail.
    ///
    /// # Errors
    /// Returns a type error if substitution produces an invalid type.
    pub fn bind_inferred(
        &self,
        definition: &Arc<MethodDescriptor>,
        args: &[Value],
    ) -> Result<Option<Arc<MethodDescriptor>>> {
        match self.infer(definition, args)? {
            Some(type_args) => self.bind(definition, &type_args),
            None => Ok(None),
        }
    }

    /// Type arguments of `definition` implied by `args`; `None` if some stay unbound
    ///
    /// # Errors
    /// Returns an error if a tuple argument's runtime type cannot be constructed.
    pub fn infer(
        &self,
        definition: &MethodDescriptor,
        args: &[Value],
    ) -> Result<Option<Vec<Token>>> {
        if !definition.is_generic_definition() || args.len() > definition.def().params.len() {
            return Ok(None);
        }

        let mut bound: Vec<Option<Token>> = vec![None; definition.generic_type_count()];
        for (param, arg) in definition.def().params.iter().zip(args) {
            let Some(actual) = self.types.runtime_type(arg)? else {
                continue;
            };
            if !self.unify(param.param_type, actual, &mut bound, 0) {
                return Ok(None);
            }
        }

        Ok(bound.into_iter().collect())
    }

    /// Matches the declared `formal` type against the runtime type `actual`, recording
    /// placeholder bindings. Returns false on a conflicting binding.
    fn unify(
        &self,
        formal: Token,
        actual: Token,
        bound: &mut [Option<Token>],
        depth: usize,
    ) -> bool {
        if depth > MAX_INFERENCE_DEPTH {
            return false;
        }
        let (Some(formal_def), Some(actual_def)) = (self.types.get(&formal), self.types.get(&actual))
        else {
            return true;
        };

        match (&formal_def.flavor, &actual_def.flavor) {
            (TypeFlavor::GenericParameter(index), _) => match bound.get_mut(*index) {
                Some(slot) => {
                    if let Some(existing) = *slot {
                        existing == actual
                    } else {
                        *slot = Some(actual);
                        true
                    }
                }
                None => false,
            },
            (TypeFlavor::Array(formal_element), TypeFlavor::Array(actual_element)) => {
                self.unify(*formal_element, *actual_element, bound, depth + 1)
            }
            (TypeFlavor::Nullable(formal_inner), TypeFlavor::Nullable(actual_inner)) => {
                self.unify(*formal_inner, *actual_inner, bound, depth + 1)
            }
            (TypeFlavor::Nullable(formal_inner), _) => {
                self.unify(*formal_inner, actual, bound, depth + 1)
            }
            (TypeFlavor::Tuple(formal_items), TypeFlavor::Tuple(actual_items))
                if formal_items.len() == actual_items.len() =>
            {
                formal_items
                    .iter()
                    .zip(actual_items.iter())
                    .all(|(formal, actual)| self.unify(*formal, *actual, bound, depth + 1))
            }
            _ => true,
        }
    }

    /// Returns true if `argument` satisfies every constraint of `parameter`
    fn satisfies(
        &self,
        parameter: &GenericParameterDescriptor,
        argument: Token,
        type_args: &[Token],
    ) -> Result<bool> {
        let def = self.types.resolve(argument)?;
        let flags = parameter.flags;

        if matches!(
            def.flavor,
            TypeFlavor::Pointer(_) | TypeFlavor::ByRef(_) | TypeFlavor::GenericParameter(_)
        ) || def.is_byref_like()
        {
            return Ok(false);
        }

        if flags.contains(GenericParamAttributes::REFERENCE_TYPE_CONSTRAINT) && def.is_value_type()
        {
            return Ok(false);
        }

        if flags.contains(GenericParamAttributes::NOT_NULLABLE_VALUE_TYPE_CONSTRAINT)
            && (!def.is_value_type() || matches!(def.flavor, TypeFlavor::Nullable(_)))
        {
            return Ok(false);
        }

        if flags.contains(GenericParamAttributes::DEFAULT_CONSTRUCTOR_CONSTRAINT)
            && !def.is_value_type()
        {
            let constructible = def.flavor == TypeFlavor::Class
                && !def.is_abstract()
                && def.constructors.iter().any(|(_, constructor)| {
                    constructor.params.is_empty() && constructor.access() == MemberAccess::PUBLIC
                });
            if !constructible {
                return Ok(false);
            }
        }

        for constraint in &parameter.constraints {
            let constraint = self.types.substitute(*constraint, type_args)?;
            if !self.types.is_assignable(argument, constraint) {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::EngineConfig, descriptor::Overload, metadata::typesystem::PrimitiveKind,
        test::fixtures,
    };

    fn generic(
        cache: &MemberCache,
        token: Token,
        name: &str,
    ) -> Arc<MethodDescriptor> {
        cache.members(token).unwrap().static_methods.get(name)[0].clone()
    }

    #[test]
    fn test_bind_checks_arity() {
        let registry = fixtures::registry();
        let utility = fixtures::utility(&registry);
        let cache = MemberCache::new(registry.clone(), EngineConfig::default());
        let binder = GenericBinder::new(&registry, &cache);
        let identity = generic(&cache, utility.token, "Identity");
        let int = PrimitiveKind::I4.token();

        assert!(binder.bind(&identity, &[]).unwrap().is_none());
        assert!(binder.bind(&identity, &[int, int]).unwrap().is_none());

        let closed = binder.bind(&identity, &[int]).unwrap().unwrap();
        assert!(!closed.is_generic_definition());
        assert_eq!(closed.parameters()[0].param_type, int);
        assert!(Arc::ptr_eq(closed.definition().unwrap(), &identity));
    }

    #[test]
    fn test_constraints() {
        let registry = fixtures::registry();
        let utility = fixtures::utility(&registry);
        let point = fixtures::point(&registry);
        let shape = fixtures::shape(&registry);
        let cache = MemberCache::new(registry.clone(), EngineConfig::default());
        let binder = GenericBinder::new(&registry, &cache);

        let reference_only = generic(&cache, utility.token, "Reference");
        let string = PrimitiveKind::String.token();
        let int = PrimitiveKind::I4.token();
        assert!(binder.bind(&reference_only, &[string]).unwrap().is_some());
        assert!(binder.bind(&reference_only, &[int]).unwrap().is_none());

        let value_only = generic(&cache, utility.token, "Zero");
        assert!(binder.bind(&value_only, &[point.token]).unwrap().is_some());
        let nullable = registry.nullable_of(int).unwrap();
        assert!(binder.bind(&value_only, &[nullable]).unwrap().is_none());

        let constructible = generic(&cache, utility.token, "Make");
        assert!(binder.bind(&constructible, &[shape.token]).unwrap().is_none());
        assert!(binder.bind(&constructible, &[point.token]).unwrap().is_some());
    }

    #[test]
    fn test_infer_from_arguments() {
        let registry = fixtures::registry();
        let utility = fixtures::utility(&registry);
        let cache = MemberCache::new(registry.clone(), EngineConfig::default());
        let binder = GenericBinder::new(&registry, &cache);
        let identity = generic(&cache, utility.token, "Identity");

        assert_eq!(
            binder.infer(&identity, &[Value::from("x")]).unwrap(),
            Some(vec![PrimitiveKind::String.token()])
        );
        assert_eq!(binder.infer(&identity, &[Value::Null]).unwrap(), None);

        let pair = generic(&cache, utility.token, "Same");
        assert_eq!(
            binder
                .infer(&pair, &[Value::I4(1), Value::from("two")])
                .unwrap(),
            None
        );
        assert!(binder
            .bind_inferred(&pair, &[Value::I4(1), Value::I4(2)])
            .unwrap()
            .is_some());
    }
}
