use crate::{
    cache::memo::LazySlot,
    compiler::{AccessorCompiler, Creator},
    descriptor::{Member, MemberId, MemberInfo, MemberKind, Overload, ParameterDescriptor},
    ir::{ArgumentPacking, OperationBuilder},
    metadata::members::ConstructorRc,
    Result,
};

/// An instance constructor of a type.
pub struct ConstructorDescriptor {
    info: MemberInfo,
    def: ConstructorRc,
    parameters: Vec<ParameterDescriptor>,
    creator: LazySlot<Creator>,
    tuple_creator: LazySlot<Creator>,
}

impl ConstructorDescriptor {
    /// Creates the descriptor of `def`
    #[must_use]
    pub fn new(def: ConstructorRc, owner_name: &str) -> Self {
        let id = MemberId::new(def.declaring_type, def.token);
        let parameters = def
            .params
            .iter()
            .map(|param| ParameterDescriptor::new(id, param, param.param_type))
            .collect();

        ConstructorDescriptor {
            info: MemberInfo::new(
                id,
                ".ctor",
                owner_name,
                &def.custom_attributes,
                def.access(),
                false,
            ),
            def,
            parameters,
            creator: LazySlot::new(),
            tuple_creator: LazySlot::new(),
        }
    }

    /// The raw constructor definition
    #[must_use]
    pub fn def(&self) -> &ConstructorRc {
        &self.def
    }

    /// The compiled creator taking a flat argument list, built on first request
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] if the creator cannot be compiled.
    pub fn creator(&self, compiler: &AccessorCompiler) -> Result<Creator> {
        self.compiled(compiler, &self.creator, ArgumentPacking::Array)
    }

    /// The compiled creator taking a single packed tuple argument
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] if the creator cannot be compiled.
    pub fn tuple_creator(&self, compiler: &AccessorCompiler) -> Result<Creator> {
        self.compiled(compiler, &self.tuple_creator, ArgumentPacking::Tuple)
    }

    fn compiled(
        &self,
        compiler: &AccessorCompiler,
        slot: &LazySlot<Creator>,
        packing: ArgumentPacking,
    ) -> Result<Creator> {
        slot.get_or_try_init(|| {
            let tree = OperationBuilder::new(compiler.types()).creator(self, packing)?;
            compiler.creator(&tree)
        })
        .cloned()
    }
}

impl Member for ConstructorDescriptor {
    fn info(&self) -> &MemberInfo {
        &self.info
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Constructor
    }
}

impl Overload for ConstructorDescriptor {
    fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }
}

impl std::fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstructorDescriptor")
            .field("id", &self.info.id)
            .field("owner", &self.info.owner_name)
            .field("parameters", &self.parameters.len())
            .finish_non_exhaustive()
    }
}

impl_member_identity!(ConstructorDescriptor);
