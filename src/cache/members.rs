//! Ordered name-indexed member collections.

use std::{collections::HashMap, sync::Arc};

use crate::{
    descriptor::{
        ConstructorDescriptor, EventDescriptor, FieldDescriptor, Member, MethodDescriptor,
        PropertyDescriptor,
    },
    metadata::token::Token,
};

/// Members by effective name, in discovery order.
///
/// Discovery visits declared members before inherited ones and never replaces an entry, so a
/// derived member hides a base member of the same name.
pub struct MemberMap<T> {
    entries: Vec<Arc<T>>,
    index: HashMap<String, usize>,
}

impl<T: Member> MemberMap<T> {
    pub(crate) fn new() -> Self {
        MemberMap {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Adds `member` unless the name is taken; returns true if it was added
    pub(crate) fn insert(&mut self, member: Arc<T>) -> bool {
        if self.index.contains_key(member.name()) {
            return false;
        }

        self.index.insert(member.name().to_string(), self.entries.len());
        self.entries.push(member);
        true
    }

    /// Returns true if a member is registered under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The member named `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<T>> {
        self.index.get(name).map(|position| &self.entries[*position])
    }

    /// The first member whose name equals `name` ignoring ASCII case
    #[must_use]
    pub fn get_ignore_case(&self, name: &str) -> Option<&Arc<T>> {
        self.get(name).or_else(|| {
            self.entries
                .iter()
                .find(|member| member.name().eq_ignore_ascii_case(name))
        })
    }

    /// Members in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.entries.iter()
    }

    /// Names in discovery order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|member| member.name())
    }

    /// Number of members
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no members
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Overloads grouped by effective name, groups and overloads in discovery order.
///
/// Used for methods and for indexers, which may both be overloaded on their parameter types.
pub struct MemberGroups<T> {
    groups: Vec<(String, Vec<Arc<T>>)>,
    index: HashMap<String, usize>,
}

/// Method overloads by name
pub type MethodGroups = MemberGroups<MethodDescriptor>;

impl<T: Member> MemberGroups<T> {
    pub(crate) fn new() -> Self {
        MemberGroups {
            groups: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, member: Arc<T>) {
        match self.index.get(member.name()) {
            Some(position) => self.groups[*position].1.push(member),
            None => {
                self.index
                    .insert(member.name().to_string(), self.groups.len());
                self.groups.push((member.name().to_string(), vec![member]));
            }
        }
    }

    /// The overloads named `name`; empty if there are none
    #[must_use]
    pub fn get(&self, name: &str) -> &[Arc<T>] {
        match self.index.get(name) {
            Some(position) => self.groups[*position].1.as_slice(),
            None => &[],
        }
    }

    /// Returns true if a group named `name` exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// `(name, overloads)` pairs in discovery order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Arc<T>])> {
        self.groups
            .iter()
            .map(|(name, overloads)| (name.as_str(), overloads.as_slice()))
    }

    /// Every overload of every group
    pub fn all(&self) -> impl Iterator<Item = &Arc<T>> {
        self.groups.iter().flat_map(|(_, overloads)| overloads.iter())
    }

    /// Number of groups
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if there are no members
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Everything discovery found on one type.
pub struct TypeMembers {
    /// The type these members belong to
    pub token: Token,
    /// Instance constructors; empty for abstract types and interfaces
    pub constructors: Vec<Arc<ConstructorDescriptor>>,
    /// Instance fields
    pub fields: MemberMap<FieldDescriptor>,
    /// Static fields and constants
    pub static_fields: MemberMap<FieldDescriptor>,
    /// Instance properties without index parameters
    pub properties: MemberMap<PropertyDescriptor>,
    /// Static properties
    pub static_properties: MemberMap<PropertyDescriptor>,
    /// Indexers, instance and static, grouped by name and overloaded on their index types
    pub indexers: MemberGroups<PropertyDescriptor>,
    /// Instance methods
    pub methods: MethodGroups,
    /// Static methods
    pub static_methods: MethodGroups,
    /// Events, instance and static
    pub events: MemberMap<EventDescriptor>,
}

impl TypeMembers {
    pub(crate) fn new(token: Token) -> Self {
        TypeMembers {
            token,
            constructors: Vec::new(),
            fields: MemberMap::new(),
            static_fields: MemberMap::new(),
            properties: MemberMap::new(),
            static_properties: MemberMap::new(),
            indexers: MemberGroups::new(),
            methods: MethodGroups::new(),
            static_methods: MethodGroups::new(),
            events: MemberMap::new(),
        }
    }

    /// Total number of descriptors, overloads counted individually
    #[must_use]
    pub fn count(&self) -> usize {
        self.constructors.len()
            + self.fields.len()
            + self.static_fields.len()
            + self.properties.len()
            + self.static_properties.len()
            + self.indexers.all().count()
            + self.methods.all().count()
            + self.static_methods.all().count()
            + self.events.len()
    }
}

impl std::fmt::Debug for TypeMembers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeMembers")
            .field("token", &self.token)
            .field("constructors", &self.constructors.len())
            .field("fields", &self.fields.names().collect::<Vec<_>>())
            .field("static_fields", &self.static_fields.names().collect::<Vec<_>>())
            .field("properties", &self.properties.names().collect::<Vec<_>>())
            .field(
                "static_properties",
                &self.static_properties.names().collect::<Vec<_>>(),
            )
            .field(
                "indexers",
                &self.indexers.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .field(
                "methods",
                &self.methods.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .field(
                "static_methods",
                &self
                    .static_methods
                    .iter()
                    .map(|(name, _)| name)
                    .collect::<Vec<_>>(),
            )
            .field("events", &self.events.names().collect::<Vec<_>>())
            .finish()
    }
}
