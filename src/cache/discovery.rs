//! Member discovery: raw type definitions to descriptor collections.
//!
//! Discovery of one type walks its declared members once, drops the ones callers must not or
//! cannot reach, and wraps the rest into descriptors:
//!
//! 1. **Visibility**: public members only, unless non-public members are configured
//! 2. **Representability**: members typed with pointers, by-refs or stack-only types are
//!    skipped, recursively through nullable, array and tuple element types
//! 3. **Accessor methods**: `get_X`/`set_X`/`add_X`/... are left out of method groups unless
//!    configured; they stay reachable through their property or event
//! 4. **Inheritance**: instance members of the base type are appended after the declared
//!    ones, sharing the base type's descriptors. Fields and properties hide each other by
//!    name, events hide by name, methods and indexers by name and signature. Private base
//!    members and static members are not inherited.
//! 5. **Constructors**: abstract types and interfaces report none
//!
//! Indexers are grouped by name like method overloads. Any other declared member whose
//! effective name is already taken (two members renamed to the same name) is logged and
//! left out.

use std::sync::Arc;

use crate::{
    cache::members::{MemberMap, TypeMembers},
    config::EngineConfig,
    descriptor::{
        ConstructorDescriptor, EventDescriptor, FieldDescriptor, Member, MethodDescriptor,
        ParameterDescriptor, PropertyDescriptor,
    },
    metadata::{
        members::{MemberAccess, MethodDef, ParamDef},
        token::Token,
        typesystem::{TypeDef, TypeRegistry},
    },
    Result,
};

/// Discovers the members of `token`.
///
/// `base` holds the members of the base type, discovered under the same configuration, when
/// inherited members are requested.
///
/// # Errors
/// Returns [`crate::Error::TypeNotFound`] if `token` is not registered.
pub(crate) fn discover(
    types: &TypeRegistry,
    token: Token,
    config: &EngineConfig,
    base: Option<&TypeMembers>,
) -> Result<TypeMembers> {
    let def = types.resolve(token)?;
    let owner = def.fullname();
    let visible = |access: MemberAccess| config.include_non_public || access.is_public();
    let mut members = TypeMembers::new(token);

    if !def.is_abstract() && !def.is_interface() {
        for (_, constructor) in def.constructors.iter() {
            if visible(constructor.access()) && params_representable(types, &constructor.params)
            {
                members
                    .constructors
                    .push(Arc::new(ConstructorDescriptor::new(constructor.clone(), &owner)));
            }
        }
    }

    for (_, field) in def.fields.iter() {
        if !visible(field.access()) || !types.is_representable(field.field_type) {
            continue;
        }

        let descriptor = Arc::new(FieldDescriptor::new(field.clone(), &owner));
        if descriptor.is_static() {
            declare(&mut members.static_fields, descriptor);
        } else {
            declare(&mut members.fields, descriptor);
        }
    }

    for (_, property) in def.properties.iter() {
        if !visible(property.access())
            || !types.is_representable(property.property_type)
            || !params_representable(types, &property.index_params)
        {
            continue;
        }

        let descriptor = Arc::new(PropertyDescriptor::new(
            property.clone(),
            &owner,
            types,
            config.include_non_public,
        ));
        if descriptor.is_indexer() {
            members.indexers.insert(descriptor);
        } else if descriptor.is_static() {
            declare(&mut members.static_properties, descriptor);
        } else {
            declare(&mut members.properties, descriptor);
        }
    }

    for (_, method) in def.methods.iter() {
        if !visible(method.access())
            || (method.is_special_name() && !config.include_special_methods)
            || !method_representable(types, method)
        {
            continue;
        }

        let descriptor = Arc::new(MethodDescriptor::new(method.clone(), &owner, types));
        if descriptor.is_static() {
            members.static_methods.insert(descriptor);
        } else {
            members.methods.insert(descriptor);
        }
    }

    for (_, event) in def.events.iter() {
        if visible(event.add.access()) && types.is_representable(event.handler_type) {
            declare(
                &mut members.events,
                Arc::new(EventDescriptor::new(event.clone(), &owner, types)),
            );
        }
    }

    if let Some(base) = base {
        inherit(&def, &mut members, base);
    }

    log::debug!(
        "discovered {} member(s) of {} ({} constructor(s), {} field(s), {} propert(ies), {} indexer group(s), {} method group(s))",
        members.count(),
        owner,
        members.constructors.len(),
        members.fields.len() + members.static_fields.len(),
        members.properties.len() + members.static_properties.len(),
        members.indexers.len(),
        members.methods.len() + members.static_methods.len()
    );

    Ok(members)
}

fn inherit(def: &TypeDef, members: &mut TypeMembers, base: &TypeMembers) {
    // fields and properties share one namespace, so either kind hides the other
    for field in base.fields.iter() {
        if inheritable(field) && !members.properties.contains(field.name()) {
            members.fields.insert(field.clone());
        }
    }

    for property in base.properties.iter() {
        if inheritable(property) && !members.fields.contains(property.name()) {
            members.properties.insert(property.clone());
        }
    }

    for indexer in base.indexers.all() {
        let hidden = members
            .indexers
            .get(indexer.name())
            .iter()
            .any(|declared| same_parameter_types(declared.parameters(), indexer.parameters()));
        if !hidden && !indexer.is_static() && inheritable(indexer) {
            members.indexers.insert(indexer.clone());
        }
    }

    for event in base.events.iter() {
        if !event.is_static() && inheritable(event) {
            members.events.insert(event.clone());
        }
    }

    for method in base.methods.all() {
        let hidden = def
            .methods
            .iter()
            .any(|(_, declared)| !declared.is_static() && declared.signature_matches(method.def()));
        if !hidden && inheritable(method) {
            members.methods.insert(method.clone());
        }
    }
}

/// Inserts a declared member, reporting a name already taken by another declared member
fn declare<M: Member>(map: &mut MemberMap<M>, member: Arc<M>) {
    if !map.contains(member.name()) {
        map.insert(member);
        return;
    }

    log::warn!(
        "{} is not reachable by name: {} already declares a member named {}",
        member.display_name(),
        member.info().owner_name,
        member.name()
    );
}

fn same_parameter_types(left: &[ParameterDescriptor], right: &[ParameterDescriptor]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .all(|(left, right)| left.param_type == right.param_type)
}

fn inheritable<M: Member>(member: &Arc<M>) -> bool {
    member.info().access != MemberAccess::PRIVATE
}

fn params_representable(types: &TypeRegistry, params: &[ParamDef]) -> bool {
    params
        .iter()
        .all(|param| types.is_representable(param.param_type))
}

fn method_representable(types: &TypeRegistry, method: &MethodDef) -> bool {
    types.is_representable(method.return_type) && params_representable(types, &method.params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            customattributes::CustomAttribute,
            typesystem::{
                FieldSpec, MethodSpec, ParamSpec, PrimitiveKind, PropertySpec, TypeBuilder,
            },
        },
        test::fixtures,
        value::Value,
    };

    #[test]
    fn test_point_members() {
        let registry = fixtures::registry();
        let point = fixtures::point(&registry);

        let members = discover(&registry, point.token, &EngineConfig::default(), None).unwrap();
        assert_eq!(members.fields.names().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(members.constructors.len(), 2);
        assert!(members.methods.contains("Length"));
    }

    #[test]
    fn test_unrepresentable_members_filtered() {
        let registry = Arc::new(TypeRegistry::new());
        let int = PrimitiveKind::I4.token();
        let pointer = registry.pointer_to(int).unwrap();
        let by_ref = registry.by_ref_to(int).unwrap();
        let pointer_array = registry.array_of(pointer).unwrap();

        let native = TypeBuilder::new(registry.clone())
            .class("Interop", "Native")
            .field(FieldSpec::new("Handle", pointer))
            .field(FieldSpec::new("Handles", pointer_array))
            .field(FieldSpec::new("Size", int))
            .method(
                MethodSpec::new("Swap")
                    .param(ParamSpec::new("value", by_ref))
                    .body(|_| Ok(Value::Void)),
            )
            .build()
            .unwrap();

        let members = discover(&registry, native.token, &EngineConfig::default(), None).unwrap();
        assert_eq!(members.fields.names().collect::<Vec<_>>(), vec!["Size"]);
        assert!(!members.methods.contains("Swap"));
    }

    #[test]
    fn test_non_public_members_configurable() {
        let registry = Arc::new(TypeRegistry::new());
        let int = PrimitiveKind::I4.token();
        let secret = TypeBuilder::new(registry.clone())
            .class("Demo", "Secret")
            .field(FieldSpec::new("hidden", int).private())
            .field(FieldSpec::new("Shown", int))
            .build()
            .unwrap();

        let public = discover(&registry, secret.token, &EngineConfig::default(), None).unwrap();
        assert_eq!(public.fields.len(), 1);

        let all = discover(&registry, secret.token, &EngineConfig::everything(), None).unwrap();
        assert_eq!(all.fields.len(), 2);
        assert!(all.fields.contains("hidden"));
    }

    #[test]
    fn test_accessor_methods_hidden_by_default() {
        let registry = fixtures::registry();
        let person = fixtures::person(&registry);

        let members = discover(&registry, person.token, &EngineConfig::default(), None).unwrap();
        assert!(members.properties.contains("Name"));
        assert!(!members.methods.contains("get_Name"));

        let everything =
            discover(&registry, person.token, &EngineConfig::everything(), None).unwrap();
        assert!(everything.methods.contains("get_Name"));
        assert!(everything.methods.contains("set_Name"));
    }

    #[test]
    fn test_abstract_type_has_no_constructors() {
        let registry = fixtures::registry();
        let shape = fixtures::shape(&registry);

        let members = discover(&registry, shape.token, &EngineConfig::everything(), None).unwrap();
        assert!(members.constructors.is_empty());
        assert!(members.methods.contains("Area"));
    }

    #[test]
    fn test_indexers_grouped_by_name() {
        let registry = Arc::new(TypeRegistry::new());
        let int = PrimitiveKind::I4.token();
        let string = PrimitiveKind::String.token();
        let table = TypeBuilder::new(registry.clone())
            .class("Demo", "Table")
            .property(
                PropertySpec::new("Item", string)
                    .index(ParamSpec::new("row", int))
                    .getter(|_| Ok(Value::from("by row"))),
            )
            .property(
                PropertySpec::new("Item", string)
                    .index(ParamSpec::new("key", string))
                    .getter(|_| Ok(Value::from("by key"))),
            )
            .build()
            .unwrap();

        let members = discover(&registry, table.token, &EngineConfig::default(), None).unwrap();
        let items = members.indexers.get("Item");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].parameters()[0].param_type, int);
        assert_eq!(items[1].parameters()[0].param_type, string);
        assert!(!members.properties.contains("Item"));
    }

    #[test]
    fn test_renamed_collision_keeps_first() {
        let registry = Arc::new(TypeRegistry::new());
        let int = PrimitiveKind::I4.token();
        let renamed = TypeBuilder::new(registry.clone())
            .class("Demo", "Renamed")
            .field(FieldSpec::new("Total", int))
            .field(FieldSpec::new("sum", int).attribute(CustomAttribute::rename("Total")))
            .build()
            .unwrap();

        let members =
            discover(&registry, renamed.token, &EngineConfig::default(), None).unwrap();
        assert_eq!(members.fields.len(), 1);
        assert_eq!(members.fields.get("Total").unwrap().declared_name(), "Total");
    }

    #[test]
    fn test_property_hides_base_field() {
        let registry = Arc::new(TypeRegistry::new());
        let string = PrimitiveKind::String.token();
        let base = TypeBuilder::new(registry.clone())
            .class("Demo", "Named")
            .field(FieldSpec::new("Name", string))
            .field(FieldSpec::new("Label", string))
            .build()
            .unwrap();
        let derived = TypeBuilder::new(registry.clone())
            .class("Demo", "Titled")
            .extends(base.token)
            .property(PropertySpec::new("Name", string).auto())
            .build()
            .unwrap();

        let config = EngineConfig::default();
        let base_members = discover(&registry, base.token, &config, None).unwrap();
        let members = discover(&registry, derived.token, &config, Some(&base_members)).unwrap();

        assert!(members.properties.contains("Name"));
        assert!(!members.fields.contains("Name"));
        assert!(members.fields.contains("Label"));
    }

    #[test]
    fn test_indexer_overrides_base_signature_only() {
        let registry = Arc::new(TypeRegistry::new());
        let int = PrimitiveKind::I4.token();
        let string = PrimitiveKind::String.token();
        let base = TypeBuilder::new(registry.clone())
            .class("Demo", "Lookup")
            .property(
                PropertySpec::new("Item", string)
                    .index(ParamSpec::new("row", int))
                    .getter(|_| Ok(Value::from("base row"))),
            )
            .property(
                PropertySpec::new("Item", string)
                    .index(ParamSpec::new("key", string))
                    .getter(|_| Ok(Value::from("base key"))),
            )
            .build()
            .unwrap();
        let derived = TypeBuilder::new(registry.clone())
            .class("Demo", "CachedLookup")
            .extends(base.token)
            .property(
                PropertySpec::new("Item", string)
                    .index(ParamSpec::new("row", int))
                    .getter(|_| Ok(Value::from("derived row"))),
            )
            .build()
            .unwrap();

        let config = EngineConfig::default();
        let base_members = discover(&registry, base.token, &config, None).unwrap();
        let members = discover(&registry, derived.token, &config, Some(&base_members)).unwrap();

        let items = members.indexers.get("Item");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].declaring_type(), derived.token);
        assert!(Arc::ptr_eq(&items[1], &base_members.indexers.get("Item")[1]));
    }
}
