use crate::{
    cache::memo::LazySlot,
    compiler::{AccessorCompiler, Getter, Setter},
    descriptor::{DataMember, Member, MemberId, MemberInfo, MemberKind},
    ir::OperationBuilder,
    metadata::{
        members::{FieldAttributes, FieldRc},
        token::Token,
    },
    value::Value,
    Result,
};

/// A field of a type, with lazily compiled getter and setter.
pub struct FieldDescriptor {
    info: MemberInfo,
    def: FieldRc,
    getter: LazySlot<Getter>,
    setter: LazySlot<Setter>,
}

impl FieldDescriptor {
    /// Creates the descriptor of `def`; `owner_name` is the full name of the declaring type
    #[must_use]
    pub fn new(def: FieldRc, owner_name: &str) -> Self {
        FieldDescriptor {
            info: MemberInfo::new(
                MemberId::new(def.declaring_type, def.token),
                &def.name,
                owner_name,
                &def.custom_attributes,
                def.access(),
                def.is_static(),
            ),
            def,
            getter: LazySlot::new(),
            setter: LazySlot::new(),
        }
    }

    /// The raw field definition
    #[must_use]
    pub fn def(&self) -> &FieldRc {
        &self.def
    }

    /// The field type
    #[must_use]
    pub fn field_type(&self) -> Token {
        self.def.field_type
    }

    /// Returns true for fields that can only be assigned during construction
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.def.attributes().contains(FieldAttributes::INIT_ONLY)
    }

    /// Returns true for compile-time constants
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.def.constant.is_some()
    }

    /// The value of a constant field
    #[must_use]
    pub fn constant_value(&self) -> Option<&Value> {
        self.def.constant.as_ref()
    }

    /// The compiled getter, built on first request
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] if the getter cannot be compiled.
    pub fn getter(&self, compiler: &AccessorCompiler) -> Result<Getter> {
        self.getter
            .get_or_try_init(|| {
                let tree = OperationBuilder::new(compiler.types()).field_getter(self)?;
                compiler.getter(&tree)
            })
            .cloned()
    }

    /// The compiled setter, `None` for read-only and constant fields
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] if the setter cannot be compiled.
    pub fn setter(&self, compiler: &AccessorCompiler) -> Result<Option<Setter>> {
        if self.is_readonly() || self.is_constant() {
            return Ok(None);
        }

        self.setter
            .get_or_try_init(|| {
                let tree = OperationBuilder::new(compiler.types()).field_setter(self)?;
                compiler.setter(&tree)
            })
            .cloned()
            .map(Some)
    }
}

impl Member for FieldDescriptor {
    fn info(&self) -> &MemberInfo {
        &self.info
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Field
    }
}

impl DataMember for FieldDescriptor {
    fn member_type(&self) -> Token {
        self.field_type()
    }

    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        !self.is_readonly() && !self.is_constant()
    }

    fn read_accessor(&self, compiler: &AccessorCompiler) -> Result<Option<Getter>> {
        self.getter(compiler).map(Some)
    }

    fn write_accessor(&self, compiler: &AccessorCompiler) -> Result<Option<Setter>> {
        self.setter(compiler)
    }
}

impl std::fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("id", &self.info.id)
            .field("name", &self.info.name)
            .field("field_type", &self.def.field_type)
            .field("is_static", &self.info.is_static)
            .finish_non_exhaustive()
    }
}

impl_member_identity!(FieldDescriptor);
