//! Lowering of operation tree nodes into closures.

use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    compiler::accessor::{Frame, Thunk},
    ir::{AccessorKind, Node, ParamSlot},
    metadata::{
        members::{
            CallFrame, ConstructorRc, FieldAttributes, FieldRc, MethodRc, NativeMethod,
        },
        token::Token,
        typesystem::{PrimitiveKind, TypeFlavor, TypeRegistry},
    },
    value::{Object, Value},
    Error, Result,
};

/// Lowers the nodes of one operation tree.
pub(crate) struct Lowering<'a> {
    types: &'a Arc<TypeRegistry>,
    member: &'a str,
}

impl<'a> Lowering<'a> {
    pub(crate) fn new(types: &'a Arc<TypeRegistry>, member: &'a str) -> Self {
        Lowering { types, member }
    }

    pub(crate) fn lower(&self, node: &Node) -> Result<Thunk> {
        match node {
            Node::Parameter(slot) => Ok(parameter(*slot)),
            Node::Constant(value) => {
                let value = value.clone();
                Ok(Arc::new(move |_: &Frame<'_>| Ok(value.clone())))
            }
            Node::ArrayIndex {
                array,
                index,
                default,
            } => self.array_index(array, *index, default.clone()),
            Node::TupleField {
                tuple,
                index,
                default,
            } => self.tuple_field(tuple, *index, default.clone()),
            Node::Convert { operand, target } => self.convert(operand, *target),
            Node::Box(operand) => {
                let operand = self.lower(operand)?;
                let types = self.types.clone();
                Ok(Arc::new(move |frame: &Frame<'_>| {
                    copy_value(&types, operand(frame)?)
                }))
            }
            Node::FieldAccess { target, field } => self.load_field(target.as_deref(), field),
            Node::PropertyAccess {
                target,
                property,
                indices,
            } => {
                let Some(getter) = &property.getter else {
                    return Err(compilation_error!(
                        self.member,
                        "property {} has no getter",
                        property.name
                    ));
                };
                let args = self.lower_all(indices)?;
                self.call(target.as_deref(), getter, &[], args)
            }
            Node::Call {
                target,
                method,
                type_args,
                args,
            } => {
                let args = self.lower_all(args)?;
                self.call(target.as_deref(), method, type_args, args)
            }
            Node::New { constructor, args } => self.new_instance(constructor, args),
            Node::Assign { place, value } => self.assign(place, value),
        }
    }

    fn lower_all(&self, nodes: &[Node]) -> Result<Vec<Thunk>> {
        nodes.iter().map(|node| self.lower(node)).collect()
    }

    fn array_index(&self, array: &Node, index: usize, default: Option<Value>) -> Result<Thunk> {
        if matches!(array, Node::Parameter(ParamSlot::Arguments)) {
            return Ok(Arc::new(move |frame: &Frame<'_>| {
                match frame.args.get(index) {
                    Some(value) => Ok(value.clone()),
                    None => default.clone().ok_or(Error::ArgumentCount {
                        expected: index + 1,
                        provided: frame.args.len(),
                    }),
                }
            }));
        }

        let array = self.lower(array)?;
        let types = self.types.clone();
        Ok(Arc::new(move |frame: &Frame<'_>| {
            let (item, len) = match array(frame)? {
                Value::Array(array) => {
                    let len = array.len()?;
                    let item = if index < len {
                        Some(array.get(index)?)
                    } else {
                        None
                    };
                    (item, len)
                }
                Value::Tuple(items) => (items.get(index).cloned(), items.len()),
                other => {
                    return Err(Error::InvalidCast {
                        from: type_name(&types, &other),
                        to: "System.Array".to_string(),
                    })
                }
            };

            item.or_else(|| default.clone())
                .ok_or(Error::IndexOutOfRange { index, len })
        }))
    }

    fn tuple_field(&self, tuple: &Node, index: usize, default: Option<Value>) -> Result<Thunk> {
        let tuple = self.lower(tuple)?;
        let types = self.types.clone();

        Ok(Arc::new(move |frame: &Frame<'_>| match tuple(frame)? {
            Value::Tuple(items) => items
                .get(index)
                .cloned()
                .or_else(|| default.clone())
                .ok_or(Error::IndexOutOfRange {
                    index,
                    len: items.len(),
                }),
            other => Err(Error::InvalidCast {
                from: type_name(&types, &other),
                to: "System.ValueTuple".to_string(),
            }),
        }))
    }

    fn convert(&self, operand: &Node, target: Token) -> Result<Thunk> {
        if self.types.get(&target).is_none() {
            return Err(compilation_error!(
                self.member,
                "conversion to unknown type {}",
                target
            ));
        }

        let operand = self.lower(operand)?;
        if target == PrimitiveKind::Object.token() {
            return Ok(operand);
        }

        let types = self.types.clone();
        Ok(Arc::new(move |frame: &Frame<'_>| {
            types.convert(&operand(frame)?, target)
        }))
    }

    fn load_field(&self, target: Option<&Node>, field: &FieldRc) -> Result<Thunk> {
        if let Some(constant) = &field.constant {
            let constant = constant.clone();
            return Ok(Arc::new(move |_: &Frame<'_>| Ok(constant.clone())));
        }

        let owner = self.types.resolve(field.declaring_type)?;
        let slot = field.slot;
        match (field.is_static(), target) {
            (true, None) => Ok(Arc::new(move |_: &Frame<'_>| owner.load_static(slot))),
            (false, Some(target)) => {
                let receiver = self.lower(target)?;
                let (types, member) = (self.types.clone(), self.member.to_string());
                Ok(Arc::new(move |frame: &Frame<'_>| {
                    match receiver(frame)? {
                        Value::Object(object) => object.load(slot),
                        Value::Null => Err(Error::NullReference(format!(
                            "{member} read from a null receiver"
                        ))),
                        other => Err(Error::InvalidCast {
                            from: type_name(&types, &other),
                            to: owner.fullname(),
                        }),
                    }
                }))
            }
            _ => Err(compilation_error!(
                self.member,
                "receiver does not match staticness of field {}",
                field.name
            )),
        }
    }

    fn store_field(&self, target: Option<&Node>, field: &FieldRc, value: Thunk) -> Result<Thunk> {
        if field.constant.is_some() || field.attributes().contains(FieldAttributes::INIT_ONLY) {
            return Err(compilation_error!(
                self.member,
                "field {} is not assignable",
                field.name
            ));
        }

        let owner = self.types.resolve(field.declaring_type)?;
        let slot = field.slot;
        match (field.is_static(), target) {
            (true, None) => Ok(Arc::new(move |frame: &Frame<'_>| {
                owner.store_static(slot, value(frame)?)?;
                Ok(Value::Void)
            })),
            (false, Some(target)) => {
                let receiver = self.lower(target)?;
                let (types, member) = (self.types.clone(), self.member.to_string());
                Ok(Arc::new(move |frame: &Frame<'_>| {
                    match receiver(frame)? {
                        Value::Object(object) => object.store(slot, value(frame)?)?,
                        Value::Null => {
                            return Err(Error::NullReference(format!(
                                "{member} written to a null receiver"
                            )))
                        }
                        other => {
                            return Err(Error::InvalidCast {
                                from: type_name(&types, &other),
                                to: owner.fullname(),
                            })
                        }
                    }
                    Ok(Value::Void)
                }))
            }
            _ => Err(compilation_error!(
                self.member,
                "receiver does not match staticness of field {}",
                field.name
            )),
        }
    }

    fn assign(&self, place: &Node, value: &Node) -> Result<Thunk> {
        let value = self.lower(value)?;

        match place {
            Node::FieldAccess { target, field } => {
                self.store_field(target.as_deref(), field, value)
            }
            Node::PropertyAccess {
                target,
                property,
                indices,
            } => {
                let Some(setter) = &property.setter else {
                    return Err(compilation_error!(
                        self.member,
                        "property {} has no setter",
                        property.name
                    ));
                };
                let mut args = self.lower_all(indices)?;
                args.push(value);
                self.call(target.as_deref(), setter, &[], args)
            }
            other => Err(compilation_error!(
                self.member,
                "{:?} is not assignable",
                other
            )),
        }
    }

    fn call(
        &self,
        target: Option<&Node>,
        method: &MethodRc,
        type_args: &[Token],
        args: Vec<Thunk>,
    ) -> Result<Thunk> {
        if method.is_static() == target.is_some() {
            return Err(compilation_error!(
                self.member,
                "receiver does not match staticness of method {}",
                method.name
            ));
        }
        if args.len() != method.params.len() {
            return Err(compilation_error!(
                self.member,
                "method {} takes {} argument(s), {} supplied",
                method.name,
                method.params.len(),
                args.len()
            ));
        }
        if type_args.len() != method.generic_params.len() {
            return Err(compilation_error!(
                self.member,
                "method {} takes {} generic argument(s), {} bound",
                method.name,
                method.generic_params.len(),
                type_args.len()
            ));
        }

        let receiver = target.map(|target| self.lower(target)).transpose()?;
        let dispatch = Dispatch::new(method.clone(), self.types.clone(), self.member);
        let types = self.types.clone();
        let type_args: Arc<[Token]> = Arc::from(type_args);
        let is_void = method.return_type == PrimitiveKind::Void.token();
        let member = self.member.to_string();

        Ok(Arc::new(move |frame: &Frame<'_>| {
            let this = match &receiver {
                Some(receiver) => {
                    let this = receiver(frame)?;
                    if this.is_null() {
                        return Err(Error::NullReference(format!(
                            "{member} invoked on a null receiver"
                        )));
                    }
                    this
                }
                None => Value::Null,
            };
            let values = args
                .iter()
                .map(|arg| arg(frame))
                .collect::<Result<Vec<_>>>()?;

            let body = dispatch.resolve(&this)?;
            let result = body(&CallFrame {
                this: &this,
                args: &values,
                type_args: &type_args,
                types: &types,
            })?;

            Ok(if is_void { Value::Void } else { result })
        }))
    }

    fn new_instance(&self, constructor: &ConstructorRc, args: &[Node]) -> Result<Thunk> {
        let owner = self.types.resolve(constructor.declaring_type)?;
        if !matches!(owner.flavor, TypeFlavor::Class | TypeFlavor::ValueType)
            || owner.is_abstract()
        {
            return Err(compilation_error!(
                self.member,
                "{} cannot be instantiated",
                owner.fullname()
            ));
        }
        if args.len() != constructor.params.len() {
            return Err(compilation_error!(
                self.member,
                "constructor takes {} argument(s), {} supplied",
                constructor.params.len(),
                args.len()
            ));
        }

        let args = self.lower_all(args)?;
        let types = self.types.clone();
        let body = constructor.body.clone();
        let token = owner.token;

        Ok(Arc::new(move |frame: &Frame<'_>| {
            let values = args
                .iter()
                .map(|arg| arg(frame))
                .collect::<Result<Vec<_>>>()?;
            let this = Value::Object(types.allocate(token)?);
            body(&CallFrame {
                this: &this,
                args: &values,
                type_args: &[],
                types: &types,
            })?;
            Ok(this)
        }))
    }
}

/// Resolves the body to run for a call, following overrides of virtual methods.
///
/// Resolved overrides are cached per runtime type.
struct Dispatch {
    method: MethodRc,
    types: Arc<TypeRegistry>,
    member: String,
    overrides: DashMap<Token, Option<NativeMethod>>,
}

impl Dispatch {
    fn new(method: MethodRc, types: Arc<TypeRegistry>, member: &str) -> Self {
        Dispatch {
            method,
            types,
            member: member.to_string(),
            overrides: DashMap::new(),
        }
    }

    fn resolve(&self, this: &Value) -> Result<NativeMethod> {
        let resolved = if self.method.is_virtual() && !this.is_null() {
            match self.types.runtime_type(this)? {
                Some(runtime_type) => self.override_for(runtime_type),
                None => None,
            }
        } else {
            None
        };

        resolved
            .or_else(|| self.method.body.clone())
            .ok_or_else(|| Error::NoAccessor {
                member: self.member.clone(),
                kind: AccessorKind::Invoke,
            })
    }

    fn override_for(&self, runtime_type: Token) -> Option<NativeMethod> {
        if let Some(cached) = self.overrides.get(&runtime_type) {
            return cached.value().clone();
        }

        let found = self
            .types
            .find_override(runtime_type, &self.method)
            .and_then(|method| method.body.clone());
        self.overrides.insert(runtime_type, found.clone());
        found
    }
}

fn parameter(slot: ParamSlot) -> Thunk {
    match slot {
        ParamSlot::Instance => Arc::new(|frame: &Frame<'_>| Ok(frame.instance.clone())),
        ParamSlot::Value => Arc::new(|frame: &Frame<'_>| Ok(frame.value.clone())),
        ParamSlot::Arguments => {
            Arc::new(|frame: &Frame<'_>| Ok(Value::Tuple(Arc::from(frame.args))))
        }
    }
}

/// Value-semantics copy: instances of value types are duplicated (recursively through their
/// value type fields and tuple items), everything else is shared.
pub(crate) fn copy_value(types: &TypeRegistry, value: Value) -> Result<Value> {
    match value {
        Value::Object(object) if types.is_value_type(object.type_token()) => {
            let slots = object
                .snapshot()?
                .into_iter()
                .map(|slot| copy_value(types, slot))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Object(Object::new(object.type_token(), slots)))
        }
        Value::Tuple(items) => {
            let items = items
                .iter()
                .map(|item| copy_value(types, item.clone()))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Tuple(Arc::from(items)))
        }
        other => Ok(other),
    }
}

/// Name of the runtime type of `value`, for diagnostics
pub(crate) fn type_name(types: &TypeRegistry, value: &Value) -> String {
    match types.runtime_type(value) {
        Ok(Some(token)) => types.display_name(token),
        _ if value.is_null() => "null".to_string(),
        _ => "void".to_string(),
    }
}
