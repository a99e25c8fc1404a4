//! Bulk copying between the data members of two unrelated types.
//!
//! A [`Mapper`] pairs the readable members of a source type with the writable members of a
//! target type by name and copies every pair in one pass. Pairing happens once, when the
//! mapper is built; [`Mapper::copy`] only runs the compiled getters and setters.
//!
//! Only public instance fields and non-indexer properties take part. Paired members must have
//! the same type, or differ by one level of `Nullable<T>`:
//!
//! | Source         | Target         | Copy                                   |
//! |----------------|----------------|----------------------------------------|
//! | `T`            | `T`            | always                                 |
//! | `V`            | `Nullable<V>`  | always                                 |
//! | `Nullable<V>`  | `V`            | skipped when the source value is null  |
//!
//! Name-matched members of other types are left unpaired. Overrides can pair differently
//! named members or drop a name-matched pair; they are checked when the mapper is built.
//!
//! # Examples
//!
//! ```rust
//! use reflectscope::metadata::typesystem::{PrimitiveKind, PropertySpec, TypeBuilder};
//! use reflectscope::mapper::{MapOverride, MapperOptions};
//! use reflectscope::{Engine, TypeRegistry, Value};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(TypeRegistry::new());
//! let string = PrimitiveKind::String.token();
//! let src = TypeBuilder::new(registry.clone())
//!     .class("Demo", "Src")
//!     .property(PropertySpec::new("Name", string).auto())
//!     .build()?;
//! let dst = TypeBuilder::new(registry.clone())
//!     .class("Demo", "Dst")
//!     .property(PropertySpec::new("FullName", string).auto())
//!     .build()?;
//!
//! let engine = Engine::new(registry);
//! let options = MapperOptions::default().with(MapOverride::remap("FullName", "Name"));
//! let mapper = engine.build_mapper(src.token, dst.token, &options)?;
//!
//! let from = engine.new_instance(src.token, &[])?;
//! let to = engine.new_instance(dst.token, &[])?;
//! engine.set_member(&from, "Name", Value::from("Ada"))?;
//! mapper.copy(&from, &to)?;
//! assert_eq!(engine.get_member(&to, "FullName")?, Value::from("Ada"));
//! # Ok::<(), reflectscope::Error>(())
//! ```

use std::{collections::HashSet, sync::Arc};

use crate::{
    cache::{MemberMap, TypeMembers},
    compiler::{AccessorCompiler, Getter, Setter},
    descriptor::{DataMember, Member},
    metadata::{token::Token, typesystem::TypeRegistry},
    value::Value,
    Error, Result,
};

/// A per-member adjustment of the default name-based pairing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapOverride {
    /// Fill target member `to` from source member `from`
    Remap {
        /// Target member name
        to: String,
        /// Source member name
        from: String,
    },
    /// Leave target member `to` untouched
    Ignore {
        /// Target member name
        to: String,
    },
}

impl MapOverride {
    /// Fill target member `to` from source member `from`
    #[must_use]
    pub fn remap(to: &str, from: &str) -> Self {
        MapOverride::Remap {
            to: to.to_string(),
            from: from.to_string(),
        }
    }

    /// Leave target member `to` untouched
    #[must_use]
    pub fn ignore(to: &str) -> Self {
        MapOverride::Ignore { to: to.to_string() }
    }

    fn target(&self) -> &str {
        match self {
            MapOverride::Remap { to, .. } | MapOverride::Ignore { to } => to,
        }
    }
}

/// Settings of [`crate::Engine::build_mapper`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapperOptions {
    /// Match member names ignoring ASCII case
    pub ignore_case: bool,
    /// Overrides, applied in order; a later override of the same target wins
    pub overrides: Vec<MapOverride>,
}

impl MapperOptions {
    /// Options matching names ignoring ASCII case
    #[must_use]
    pub fn ignore_case() -> Self {
        MapperOptions {
            ignore_case: true,
            overrides: Vec::new(),
        }
    }

    /// Adds an override
    #[must_use]
    pub fn with(mut self, entry: MapOverride) -> Self {
        self.overrides.push(entry);
        self
    }
}

/// One copied member
#[derive(Debug, Clone)]
pub struct MemberPair {
    /// Target member name
    pub target: String,
    /// Source member name
    pub source: String,
    /// The source value is `Nullable<V>` and the target is `V`; null values are not copied
    pub skip_null: bool,
    getter: Getter,
    setter: Setter,
}

/// A compiled bulk copy from one type to another
#[derive(Debug)]
pub struct Mapper {
    from: Token,
    to: Token,
    pairs: Vec<MemberPair>,
}

impl Mapper {
    /// Pairs the members of `from` with those of `to`
    ///
    /// # Errors
    /// - [`Error::InvalidOverride`] if an override names an unknown or inaccessible member
    /// - [`Error::AmbiguousOverride`] if a remap pairs members of incompatible types
    /// - [`Error::Compilation`] if an accessor cannot be compiled
    pub(crate) fn build(
        compiler: &AccessorCompiler,
        from: &TypeMembers,
        to: &TypeMembers,
        options: &MapperOptions,
    ) -> Result<Mapper> {
        let types = compiler.types();
        let sources = Candidates::readable(from);
        let targets = Candidates::writable(to);

        let mut resolved = Vec::with_capacity(options.overrides.len());
        for entry in &options.overrides {
            let target = targets.find(entry.target(), options.ignore_case).ok_or_else(|| {
                Error::InvalidOverride(format!(
                    "{} has no writable member '{}'",
                    types.display_name(to.token),
                    entry.target()
                ))
            })?;

            if let MapOverride::Remap { from: name, .. } = entry {
                let source = sources.find(name, options.ignore_case).ok_or_else(|| {
                    Error::InvalidOverride(format!(
                        "{} has no readable member '{}'",
                        types.display_name(from.token),
                        name
                    ))
                })?;
                if compatibility(types, source.member_type(), target.member_type()).is_none() {
                    return Err(Error::AmbiguousOverride {
                        target: target.name().to_string(),
                        target_type: types.display_name(target.member_type()),
                        from_member: source.name().to_string(),
                        from_type: types.display_name(source.member_type()),
                    });
                }
                resolved.push((target, Some(source)));
            } else {
                resolved.push((target, None));
            }
        }

        // the last override of a target wins
        let mut overridden = HashSet::new();
        let mut remaps: Vec<(Arc<dyn DataMember>, Arc<dyn DataMember>)> = Vec::new();
        for (target, source) in resolved.into_iter().rev() {
            if !overridden.insert(target.name().to_string()) {
                continue;
            }
            if let Some(source) = source {
                remaps.push((source, target));
            }
        }
        remaps.reverse();

        let mut pairs = Vec::new();
        for target in &targets.members {
            let name = target.name();
            if overridden.contains(name) {
                continue;
            }

            let Some(source) = sources.find(name, options.ignore_case) else {
                continue;
            };
            if let Some(skip_null) =
                compatibility(types, source.member_type(), target.member_type())
            {
                pairs.push(pair(compiler, &source, target, skip_null)?);
            }
        }
        for (source, target) in &remaps {
            let skip_null = compatibility(types, source.member_type(), target.member_type())
                .unwrap_or(false);
            pairs.push(pair(compiler, source, target, skip_null)?);
        }

        log::debug!(
            "built mapper {} -> {} with {} pair(s)",
            types.display_name(from.token),
            types.display_name(to.token),
            pairs.len()
        );

        Ok(Mapper {
            from: from.token,
            to: to.token,
            pairs,
        })
    }

    /// Copies every paired member of `from` into `to`.
    ///
    /// # Errors
    /// - [`Error::NullReference`] if either instance is null
    /// - [`Error::InvalidCast`] if an instance is not of the mapped type
    /// - any error raised by a property body
    pub fn copy(&self, from: &Value, to: &Value) -> Result<()> {
        if from.is_null() || to.is_null() {
            return Err(Error::NullReference(
                "mapper source and target must not be null".to_string(),
            ));
        }

        for pair in &self.pairs {
            let value = pair.getter.get(from)?;
            if pair.skip_null && value.is_null() {
                continue;
            }
            pair.setter.set(to, value)?;
        }

        Ok(())
    }

    /// The source type
    #[must_use]
    pub fn source_type(&self) -> Token {
        self.from
    }

    /// The target type
    #[must_use]
    pub fn target_type(&self) -> Token {
        self.to
    }

    /// The copied pairs, name-matched ones first, then remapped ones
    #[must_use]
    pub fn pairs(&self) -> &[MemberPair] {
        &self.pairs
    }
}

/// Public instance data members of one side, fields before properties
struct Candidates {
    members: Vec<Arc<dyn DataMember>>,
}

impl Candidates {
    fn readable(members: &TypeMembers) -> Self {
        Self::collect(members, |member| member.can_read())
    }

    fn writable(members: &TypeMembers) -> Self {
        Self::collect(members, |member| member.can_write())
    }

    fn collect(members: &TypeMembers, usable: impl Fn(&dyn DataMember) -> bool) -> Self {
        fn public<T: DataMember + 'static>(
            map: &MemberMap<T>,
        ) -> impl Iterator<Item = Arc<dyn DataMember>> + '_ {
            map.iter()
                .filter(|member| member.is_public())
                .map(|member| member.clone() as Arc<dyn DataMember>)
        }

        Candidates {
            members: public(&members.fields)
                .chain(public(&members.properties))
                .filter(|member| usable(&**member))
                .collect(),
        }
    }

    fn find(&self, name: &str, ignore_case: bool) -> Option<Arc<dyn DataMember>> {
        self.members
            .iter()
            .find(|member| member.name() == name)
            .or_else(|| {
                ignore_case
                    .then(|| {
                        self.members
                            .iter()
                            .find(|member| member.name().eq_ignore_ascii_case(name))
                    })
                    .flatten()
            })
            .cloned()
    }
}

/// `Some(skip_null)` if a `from` value can be copied into a `to` member
fn compatibility(types: &TypeRegistry, from: Token, to: Token) -> Option<bool> {
    if from == to {
        return Some(false);
    }
    if types.nullable_underlying(to) == Some(from) {
        return Some(false);
    }
    if types.nullable_underlying(from) == Some(to) {
        return Some(true);
    }
    None
}

fn pair(
    compiler: &AccessorCompiler,
    source: &Arc<dyn DataMember>,
    target: &Arc<dyn DataMember>,
    skip_null: bool,
) -> Result<MemberPair> {
    let getter = source.read_accessor(compiler)?.ok_or_else(|| Error::NoAccessor {
        member: source.display_name(),
        kind: crate::ir::AccessorKind::Get,
    })?;
    let setter = target.write_accessor(compiler)?.ok_or_else(|| Error::NoAccessor {
        member: target.display_name(),
        kind: crate::ir::AccessorKind::Set,
    })?;

    Ok(MemberPair {
        target: target.name().to_string(),
        source: source.name().to_string(),
        skip_null,
        getter,
        setter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::EngineConfig,
        metadata::typesystem::{FieldSpec, PrimitiveKind, TypeBuilder},
        cache::MemberCache,
    };

    fn types_with(
        registry: &Arc<TypeRegistry>,
        source: &[(&str, Token)],
        target: &[(&str, Token)],
    ) -> (Token, Token) {
        let mut from = TypeBuilder::new(registry.clone()).class("Map", "From");
        for (name, field_type) in source {
            from = from.field(FieldSpec::new(*name, *field_type));
        }
        let mut to = TypeBuilder::new(registry.clone()).class("Map", "To");
        for (name, field_type) in target {
            to = to.field(FieldSpec::new(*name, *field_type));
        }
        (from.build().unwrap().token, to.build().unwrap().token)
    }

    fn build(
        registry: &Arc<TypeRegistry>,
        from: Token,
        to: Token,
        options: &MapperOptions,
    ) -> Result<Mapper> {
        let cache = MemberCache::new(registry.clone(), EngineConfig::default());
        let compiler = AccessorCompiler::new(registry.clone());
        Mapper::build(
            &compiler,
            &cache.members(from).unwrap(),
            &cache.members(to).unwrap(),
            options,
        )
    }

    #[test]
    fn test_nullable_widening_and_skip_null() {
        let registry = Arc::new(TypeRegistry::new());
        let int = PrimitiveKind::I4.token();
        let nullable = registry.nullable_of(int).unwrap();
        let (from, to) = types_with(
            &registry,
            &[("Count", int), ("Limit", nullable)],
            &[("Count", nullable), ("Limit", int)],
        );

        let mapper = build(&registry, from, to, &MapperOptions::default()).unwrap();
        assert_eq!(mapper.pairs().len(), 2);
        assert!(!mapper.pairs()[0].skip_null);
        assert!(mapper.pairs()[1].skip_null);

        let source = registry.allocate(from).unwrap();
        let target = registry.allocate(to).unwrap();
        source.store(0, Value::I4(5)).unwrap();
        source.store(1, Value::Null).unwrap();
        target.store(1, Value::I4(77)).unwrap();

        mapper
            .copy(&Value::Object(source.clone()), &Value::Object(target.clone()))
            .unwrap();
        assert_eq!(target.load(0).unwrap(), Value::I4(5));
        assert_eq!(target.load(1).unwrap(), Value::I4(77));

        source.store(1, Value::I4(9)).unwrap();
        mapper
            .copy(&Value::Object(source), &Value::Object(target.clone()))
            .unwrap();
        assert_eq!(target.load(1).unwrap(), Value::I4(9));
    }

    #[test]
    fn test_mismatched_types_not_paired() {
        let registry = Arc::new(TypeRegistry::new());
        let (from, to) = types_with(
            &registry,
            &[("Id", PrimitiveKind::I4.token())],
            &[("Id", PrimitiveKind::I8.token())],
        );

        let mapper = build(&registry, from, to, &MapperOptions::default()).unwrap();
        assert!(mapper.pairs().is_empty());
    }

    #[test]
    fn test_ignore_case() {
        let registry = Arc::new(TypeRegistry::new());
        let string = PrimitiveKind::String.token();
        let (from, to) = types_with(&registry, &[("name", string)], &[("Name", string)]);

        let strict = build(&registry, from, to, &MapperOptions::default()).unwrap();
        assert!(strict.pairs().is_empty());

        let relaxed = build(&registry, from, to, &MapperOptions::ignore_case()).unwrap();
        assert_eq!(relaxed.pairs().len(), 1);
    }

    #[test]
    fn test_override_validation() {
        let registry = Arc::new(TypeRegistry::new());
        let string = PrimitiveKind::String.token();
        let int = PrimitiveKind::I4.token();
        let (from, to) = types_with(
            &registry,
            &[("Name", string), ("Age", int)],
            &[("FullName", string), ("Name", string)],
        );

        let unknown_target = MapperOptions::default().with(MapOverride::ignore("Missing"));
        assert!(matches!(
            build(&registry, from, to, &unknown_target),
            Err(Error::InvalidOverride(_))
        ));

        let unknown_source =
            MapperOptions::default().with(MapOverride::remap("FullName", "Missing"));
        assert!(matches!(
            build(&registry, from, to, &unknown_source),
            Err(Error::InvalidOverride(_))
        ));

        let incompatible = MapperOptions::default().with(MapOverride::remap("FullName", "Age"));
        match build(&registry, from, to, &incompatible) {
            Err(Error::AmbiguousOverride {
                target_type,
                from_type,
                ..
            }) => {
                assert_eq!(target_type, "System.String");
                assert_eq!(from_type, "System.Int32");
            }
            other => panic!("unexpected {other:?}"),
        }

        let shadowed_unknown = MapperOptions::default()
            .with(MapOverride::remap("FullName", "DoesNotExist"))
            .with(MapOverride::remap("FullName", "Name"));
        assert!(matches!(
            build(&registry, from, to, &shadowed_unknown),
            Err(Error::InvalidOverride(_))
        ));

        let shadowed_incompatible = MapperOptions::default()
            .with(MapOverride::remap("FullName", "Age"))
            .with(MapOverride::ignore("FullName"));
        assert!(matches!(
            build(&registry, from, to, &shadowed_incompatible),
            Err(Error::AmbiguousOverride { .. })
        ));

        let ignored = MapperOptions::default().with(MapOverride::ignore("Name"));
        assert!(build(&registry, from, to, &ignored)
            .unwrap()
            .pairs()
            .is_empty());
    }

    #[test]
    fn test_last_override_of_a_target_wins() {
        let registry = Arc::new(TypeRegistry::new());
        let string = PrimitiveKind::String.token();
        let (from, to) = types_with(
            &registry,
            &[("Name", string), ("Nick", string)],
            &[("FullName", string)],
        );

        let options = MapperOptions::default()
            .with(MapOverride::remap("FullName", "Name"))
            .with(MapOverride::remap("FullName", "Nick"));
        let mapper = build(&registry, from, to, &options).unwrap();
        assert_eq!(mapper.pairs().len(), 1);
        assert_eq!(mapper.pairs()[0].source, "Nick");

        let dropped = MapperOptions::default()
            .with(MapOverride::remap("FullName", "Name"))
            .with(MapOverride::ignore("FullName"));
        assert!(build(&registry, from, to, &dropped)
            .unwrap()
            .pairs()
            .is_empty());
    }
}
