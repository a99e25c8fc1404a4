//! The member cache.
//!
//! Every expensive artifact of the engine is built at most once and then served from one of
//! three memo tables owned by [`MemberCache`]:
//!
//! | Table     | Key                                   | Value                    |
//! |-----------|---------------------------------------|--------------------------|
//! | `members` | type token                            | [`TypeMembers`]          |
//! | `closed`  | open method identity + type arguments | closed method descriptor |
//! | `mappers` | source type, target type, ignore case | default [`Mapper`]       |
//!
//! Compiled accessors are not stored here: each descriptor owns lazy slots for its own
//! accessors, so an accessor lives exactly as long as the descriptor that produced it.
//!
//! Entries are never evicted. A failed build (an unknown token, a registration defect) is not
//! cached; the next request retries it.

pub mod memo;

mod discovery;
mod members;

use std::sync::Arc;

pub use members::{MemberGroups, MemberMap, MethodGroups, TypeMembers};

use crate::{
    cache::memo::Memo,
    config::EngineConfig,
    descriptor::{Member, MemberId, MethodDescriptor},
    mapper::Mapper,
    metadata::{
        token::Token,
        typesystem::{TypeFlavor, TypeRegistry},
    },
    Result,
};

/// Memoized member discovery, generic closing and mapper construction.
pub struct MemberCache {
    types: Arc<TypeRegistry>,
    config: EngineConfig,
    members: Memo<Token, Arc<TypeMembers>>,
    closed: Memo<(MemberId, Vec<Token>), Arc<MethodDescriptor>>,
    mappers: Memo<(Token, Token, bool), Arc<Mapper>>,
}

impl MemberCache {
    /// Creates an empty cache over `types`
    #[must_use]
    pub fn new(types: Arc<TypeRegistry>, config: EngineConfig) -> Self {
        MemberCache {
            types,
            config,
            members: Memo::new(),
            closed: Memo::new(),
            mappers: Memo::new(),
        }
    }

    /// The configuration every cached collection was discovered under
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The members of `token`, discovered on first request.
    ///
    /// With inherited members enabled the base type is discovered first, so inherited
    /// descriptors are the base type's own instances.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeNotFound`] if `token` or one of its base types is not
    /// registered.
    pub fn members(&self, token: Token) -> Result<Arc<TypeMembers>> {
        self.members.get_or_try_insert_with(&token, || {
            let base = match self.types.resolve(token)? {
                def if self.config.include_inherited
                    && matches!(def.flavor, TypeFlavor::Class | TypeFlavor::ValueType) =>
                {
                    def.base.map(|base| self.members(base)).transpose()?
                }
                _ => None,
            };

            discovery::discover(&self.types, token, &self.config, base.as_deref())
                .map(Arc::new)
        })
    }

    /// Returns true if `token` has been discovered
    #[must_use]
    pub fn is_discovered(&self, token: Token) -> bool {
        self.members.contains(&token)
    }

    /// The closed descriptor of `definition` over `type_args`, built on first request.
    ///
    /// Constraints are not checked here; see [`crate::resolver::GenericBinder`].
    ///
    /// # Errors
    /// Returns a type error if substituting `type_args` produces an invalid type.
    pub fn closed_method(
        &self,
        definition: &Arc<MethodDescriptor>,
        type_args: &[Token],
    ) -> Result<Arc<MethodDescriptor>> {
        let key = (definition.id(), type_args.to_vec());
        self.closed.get_or_try_insert_with(&key, || {
            let closed = MethodDescriptor::closed(definition, type_args.to_vec(), &self.types)?;
            log::debug!(
                "closed generic method {} over {} type argument(s)",
                closed.display_name(),
                type_args.len()
            );
            Ok(Arc::new(closed))
        })
    }

    /// The mapper for `key`, built with `build` on first request
    ///
    /// # Errors
    /// Returns the error of `build`; nothing is cached in that case.
    pub fn mapper<F>(&self, key: (Token, Token, bool), build: F) -> Result<Arc<Mapper>>
    where
        F: FnOnce() -> Result<Mapper>,
    {
        self.mappers
            .get_or_try_insert_with(&key, || build().map(Arc::new))
    }

    /// Number of discovered types
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.members.len()
    }

    /// Number of closed generic methods
    #[must_use]
    pub fn closed_count(&self) -> usize {
        self.closed.len()
    }

    /// Number of cached mappers
    #[must_use]
    pub fn mapper_count(&self) -> usize {
        self.mappers.len()
    }
}
