use std::sync::Arc;

use crate::{
    cache::memo::LazySlot,
    compiler::{AccessorCompiler, Invoker},
    descriptor::{Member, MemberId, MemberInfo, MemberKind, Overload, ParameterDescriptor},
    ir::{ArgumentPacking, OperationBuilder},
    metadata::{
        members::{GenericParamAttributes, MethodModifiers, MethodRc},
        token::Token,
        typesystem::{PrimitiveKind, TypeRegistry},
    },
    Error, Result,
};

/// The result shape of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnDescriptor {
    /// The return type (substituted for closed generic methods)
    pub return_type: Token,
    /// The method returns nothing; invokers yield [`crate::Value::Void`]
    pub is_void: bool,
    /// The return type is awaitable
    pub is_task_like: bool,
}

/// A generic parameter of a generic method definition
#[derive(Debug, Clone)]
pub struct GenericParameterDescriptor {
    /// The parameter name, e.g. `T`
    pub name: String,
    /// Zero-based position in the generic parameter list
    pub position: usize,
    /// Special constraints
    pub flags: GenericParamAttributes,
    /// Types every argument must be assignable to
    pub constraints: Vec<Token>,
}

/// A method of a type.
///
/// Generic method definitions are "open": they describe the method but cannot be invoked.
/// Binding type arguments through the resolver yields a distinct "closed" descriptor whose
/// parameter and return types are substituted and whose `definition` points back to the open
/// one.
pub struct MethodDescriptor {
    info: MemberInfo,
    def: MethodRc,
    parameters: Vec<ParameterDescriptor>,
    returns: ReturnDescriptor,
    generic_parameters: Vec<GenericParameterDescriptor>,
    generic_arguments: Vec<Token>,
    definition: Option<Arc<MethodDescriptor>>,
    invoker: LazySlot<Invoker>,
    tuple_invoker: LazySlot<Invoker>,
}

impl MethodDescriptor {
    /// Creates the descriptor of a non-generic method or of an open generic definition
    #[must_use]
    pub fn new(def: MethodRc, owner_name: &str, types: &TypeRegistry) -> Self {
        let id = MemberId::new(def.declaring_type, def.token);
        let parameters = def
            .params
            .iter()
            .map(|param| ParameterDescriptor::new(id, param, param.param_type))
            .collect();
        let generic_parameters = def
            .generic_params
            .iter()
            .map(|param| GenericParameterDescriptor {
                name: param.name.clone(),
                position: param.index,
                flags: param.attributes(),
                constraints: param.constraints.clone(),
            })
            .collect();

        MethodDescriptor {
            info: MemberInfo::new(
                id,
                &def.name,
                owner_name,
                &def.custom_attributes,
                def.access(),
                def.is_static(),
            ),
            returns: return_descriptor(def.return_type, types),
            parameters,
            generic_parameters,
            generic_arguments: Vec::new(),
            definition: None,
            def,
            invoker: LazySlot::new(),
            tuple_invoker: LazySlot::new(),
        }
    }

    /// Closes the generic `definition` over `type_args`, substituting parameter and return
    /// types. Constraints are checked by the caller.
    pub(crate) fn closed(
        definition: &Arc<MethodDescriptor>,
        type_args: Vec<Token>,
        types: &TypeRegistry,
    ) -> Result<Self> {
        let id = definition.id();
        let parameters = definition
            .def
            .params
            .iter()
            .map(|param| {
                let closed = types.substitute(param.param_type, &type_args)?;
                Ok(ParameterDescriptor::new(id, param, closed))
            })
            .collect::<Result<Vec<_>>>()?;
        let return_type = types.substitute(definition.def.return_type, &type_args)?;

        Ok(MethodDescriptor {
            info: definition.info.clone(),
            def: definition.def.clone(),
            parameters,
            returns: return_descriptor(return_type, types),
            generic_parameters: definition.generic_parameters.clone(),
            generic_arguments: type_args,
            definition: Some(definition.clone()),
            invoker: LazySlot::new(),
            tuple_invoker: LazySlot::new(),
        })
    }

    /// The raw method definition
    #[must_use]
    pub fn def(&self) -> &MethodRc {
        &self.def
    }

    /// The result shape
    #[must_use]
    pub fn returns(&self) -> &ReturnDescriptor {
        &self.returns
    }

    /// Returns true for virtual and abstract methods
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.def.is_virtual()
    }

    /// Returns true for methods without an implementation of their own
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.def.modifiers().contains(MethodModifiers::ABSTRACT)
    }

    /// Returns true for property and event accessor methods
    #[must_use]
    pub fn is_special_name(&self) -> bool {
        self.def.is_special_name()
    }

    /// Returns true for generic methods, open or closed
    #[must_use]
    pub fn is_generic(&self) -> bool {
        self.def.is_generic()
    }

    /// Returns true for a generic definition with unbound type arguments
    #[must_use]
    pub fn is_generic_definition(&self) -> bool {
        self.is_generic() && self.generic_arguments.is_empty()
    }

    /// Number of generic parameters
    #[must_use]
    pub fn generic_type_count(&self) -> usize {
        self.generic_parameters.len()
    }

    /// The generic parameters of the definition
    #[must_use]
    pub fn generic_parameters(&self) -> &[GenericParameterDescriptor] {
        &self.generic_parameters
    }

    /// The bound type arguments; empty unless closed
    #[must_use]
    pub fn generic_arguments(&self) -> &[Token] {
        &self.generic_arguments
    }

    /// The open definition this method was closed from
    #[must_use]
    pub fn definition(&self) -> Option<&Arc<MethodDescriptor>> {
        self.definition.as_ref()
    }

    /// The compiled invoker taking a flat argument list, built on first request
    ///
    /// # Errors
    /// - [`Error::OpenGeneric`] for generic definitions
    /// - [`Error::Compilation`] if the invoker cannot be compiled
    pub fn invoker(&self, compiler: &AccessorCompiler) -> Result<Invoker> {
        self.compiled(compiler, &self.invoker, ArgumentPacking::Array)
    }

    /// The compiled invoker taking a single packed tuple argument
    ///
    /// # Errors
    /// - [`Error::OpenGeneric`] for generic definitions
    /// - [`Error::Compilation`] if the invoker cannot be compiled
    pub fn tuple_invoker(&self, compiler: &AccessorCompiler) -> Result<Invoker> {
        self.compiled(compiler, &self.tuple_invoker, ArgumentPacking::Tuple)
    }

    fn compiled(
        &self,
        compiler: &AccessorCompiler,
        slot: &LazySlot<Invoker>,
        packing: ArgumentPacking,
    ) -> Result<Invoker> {
        if self.is_generic_definition() {
            return Err(Error::OpenGeneric(self.display_name()));
        }

        slot.get_or_try_init(|| {
            let tree = OperationBuilder::new(compiler.types()).invoker(self, packing)?;
            compiler.invoker(&tree)
        })
        .cloned()
    }
}

fn return_descriptor(return_type: Token, types: &TypeRegistry) -> ReturnDescriptor {
    ReturnDescriptor {
        return_type,
        is_void: return_type == PrimitiveKind::Void.token(),
        is_task_like: types.get(&return_type).is_some_and(|def| def.is_task_like()),
    }
}

impl Member for MethodDescriptor {
    fn info(&self) -> &MemberInfo {
        &self.info
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Method
    }

    fn identity(&self) -> (MemberId, &[Token]) {
        (self.info.id, &self.generic_arguments)
    }

    fn display_name(&self) -> String {
        if self.generic_arguments.is_empty() {
            return format!("{}::{}", self.info.owner_name, self.info.name);
        }

        let args: Vec<String> = self.generic_arguments.iter().map(ToString::to_string).collect();
        format!(
            "{}::{}<{}>",
            self.info.owner_name,
            self.info.name,
            args.join(", ")
        )
    }
}

impl Overload for MethodDescriptor {
    fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("id", &self.info.id)
            .field("name", &self.info.name)
            .field("parameters", &self.parameters.len())
            .field("returns", &self.returns)
            .field("generic_arguments", &self.generic_arguments)
            .finish_non_exhaustive()
    }
}

impl_member_identity!(MethodDescriptor);
