use std::sync::Arc;

use crate::{
    cache::memo::LazySlot,
    compiler::{AccessorCompiler, Getter, Invoker, Setter},
    descriptor::{
        DataMember, Member, MemberId, MemberInfo, MemberKind, MethodDescriptor, Overload,
        ParameterDescriptor,
    },
    ir::OperationBuilder,
    metadata::{
        members::{MethodRc, PropertyRc},
        token::Token,
        typesystem::TypeRegistry,
    },
    Result,
};

/// A property or indexer of a type.
///
/// Plain properties compile into [`Getter`]/[`Setter`] accessors. Indexers take their index
/// arguments like method parameters, so they compile into [`Invoker`]s instead: the indexed
/// getter takes the indices, the indexed setter the indices followed by the value.
pub struct PropertyDescriptor {
    info: MemberInfo,
    def: PropertyRc,
    getter_method: Option<Arc<MethodDescriptor>>,
    setter_method: Option<Arc<MethodDescriptor>>,
    parameters: Vec<ParameterDescriptor>,
    getter: LazySlot<Getter>,
    setter: LazySlot<Setter>,
    indexed_getter: LazySlot<Invoker>,
    indexed_setter: LazySlot<Invoker>,
}

impl PropertyDescriptor {
    /// Creates the descriptor of `def`.
    ///
    /// Non-public accessor methods are dropped unless `include_non_public` is set, so a
    /// property with a private setter is read-only to callers that only see public members.
    #[must_use]
    pub fn new(
        def: PropertyRc,
        owner_name: &str,
        types: &TypeRegistry,
        include_non_public: bool,
    ) -> Self {
        let id = MemberId::new(def.declaring_type, def.token);
        let accessor = |method: Option<&MethodRc>| {
            method
                .filter(|method| include_non_public || method.access().is_public())
                .map(|method| Arc::new(MethodDescriptor::new(method.clone(), owner_name, types)))
        };
        let parameters = def
            .index_params
            .iter()
            .map(|param| ParameterDescriptor::new(id, param, param.param_type))
            .collect();

        PropertyDescriptor {
            info: MemberInfo::new(
                id,
                &def.name,
                owner_name,
                &def.custom_attributes,
                def.access(),
                def.is_static(),
            ),
            getter_method: accessor(def.getter.as_ref()),
            setter_method: accessor(def.setter.as_ref()),
            parameters,
            def,
            getter: LazySlot::new(),
            setter: LazySlot::new(),
            indexed_getter: LazySlot::new(),
            indexed_setter: LazySlot::new(),
        }
    }

    /// The raw property definition
    #[must_use]
    pub fn def(&self) -> &PropertyRc {
        &self.def
    }

    /// The property type
    #[must_use]
    pub fn property_type(&self) -> Token {
        self.def.property_type
    }

    /// The getter method, if the property is readable
    #[must_use]
    pub fn getter_method(&self) -> Option<&Arc<MethodDescriptor>> {
        self.getter_method.as_ref()
    }

    /// The setter method, if the property is writable
    #[must_use]
    pub fn setter_method(&self) -> Option<&Arc<MethodDescriptor>> {
        self.setter_method.as_ref()
    }

    /// Returns true for indexers
    #[must_use]
    pub fn is_indexer(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// The index parameters of an indexer
    #[must_use]
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// The compiled getter; `None` for write-only properties and indexers
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] if the getter cannot be compiled.
    pub fn getter(&self, compiler: &AccessorCompiler) -> Result<Option<Getter>> {
        if self.getter_method.is_none() || self.is_indexer() {
            return Ok(None);
        }

        self.getter
            .get_or_try_init(|| {
                let tree = OperationBuilder::new(compiler.types()).property_getter(self)?;
                compiler.getter(&tree)
            })
            .cloned()
            .map(Some)
    }

    /// The compiled setter; `None` for read-only properties and indexers
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] if the setter cannot be compiled.
    pub fn setter(&self, compiler: &AccessorCompiler) -> Result<Option<Setter>> {
        if self.setter_method.is_none() || self.is_indexer() {
            return Ok(None);
        }

        self.setter
            .get_or_try_init(|| {
                let tree = OperationBuilder::new(compiler.types()).property_setter(self)?;
                compiler.setter(&tree)
            })
            .cloned()
            .map(Some)
    }

    /// The compiled indexed getter taking the index arguments; `None` unless this is a
    /// readable indexer
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] if the accessor cannot be compiled.
    pub fn indexed_getter(&self, compiler: &AccessorCompiler) -> Result<Option<Invoker>> {
        if self.getter_method.is_none() || !self.is_indexer() {
            return Ok(None);
        }

        self.indexed_getter
            .get_or_try_init(|| {
                let tree = OperationBuilder::new(compiler.types()).indexed_getter(self)?;
                compiler.invoker(&tree)
            })
            .cloned()
            .map(Some)
    }

    /// The compiled indexed setter taking the index arguments followed by the value; `None`
    /// unless this is a writable indexer
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] if the accessor cannot be compiled.
    pub fn indexed_setter(&self, compiler: &AccessorCompiler) -> Result<Option<Invoker>> {
        if self.setter_method.is_none() || !self.is_indexer() {
            return Ok(None);
        }

        self.indexed_setter
            .get_or_try_init(|| {
                let tree = OperationBuilder::new(compiler.types()).indexed_setter(self)?;
                compiler.invoker(&tree)
            })
            .cloned()
            .map(Some)
    }
}

impl Member for PropertyDescriptor {
    fn info(&self) -> &MemberInfo {
        &self.info
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Property
    }
}

/// Indexers overload on their index parameters
impl Overload for PropertyDescriptor {
    fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }
}

impl DataMember for PropertyDescriptor {
    fn member_type(&self) -> Token {
        self.property_type()
    }

    fn can_read(&self) -> bool {
        self.getter_method.is_some() && !self.is_indexer()
    }

    fn can_write(&self) -> bool {
        self.setter_method.is_some() && !self.is_indexer()
    }

    fn read_accessor(&self, compiler: &AccessorCompiler) -> Result<Option<Getter>> {
        self.getter(compiler)
    }

    fn write_accessor(&self, compiler: &AccessorCompiler) -> Result<Option<Setter>> {
        self.setter(compiler)
    }
}

impl std::fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("id", &self.info.id)
            .field("name", &self.info.name)
            .field("property_type", &self.def.property_type)
            .field("can_read", &self.getter_method.is_some())
            .field("can_write", &self.setter_method.is_some())
            .field("is_indexer", &self.is_indexer())
            .finish_non_exhaustive()
    }
}

impl_member_identity!(PropertyDescriptor);
