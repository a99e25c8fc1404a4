use std::sync::Arc;

use crate::{
    descriptor::{
        required_count, ConstructorDescriptor, FieldDescriptor, Member, MethodDescriptor,
        Overload, ParameterDescriptor, PropertyDescriptor,
    },
    ir::{AccessorKind, ArgumentPacking, Node, OperationTree, ParamSlot},
    metadata::{token::Token, typesystem::TypeRegistry},
    value::{tuple, Value},
    Result,
};

/// Derives operation trees from descriptors.
///
/// The builder only reads the registry (to find value types and default values); it never
/// compiles anything. Every tree it returns reads its arguments through `ArrayIndex` or
/// `TupleField` nodes, converts each to the declared parameter type, converts the receiver to
/// the declaring type, and copies value type instances crossing the accessor boundary.
pub struct OperationBuilder<'a> {
    types: &'a TypeRegistry,
}

impl<'a> OperationBuilder<'a> {
    /// Creates a builder over `types`
    #[must_use]
    pub fn new(types: &'a TypeRegistry) -> Self {
        OperationBuilder { types }
    }

    /// The tree of a creator: allocate, run the constructor, return the instance
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] for constructors of abstract types and interfaces.
    pub fn creator(
        &self,
        constructor: &ConstructorDescriptor,
        packing: ArgumentPacking,
    ) -> Result<OperationTree> {
        let owner = self.types.resolve(constructor.declaring_type())?;
        if owner.is_abstract() || owner.is_interface() {
            return Err(compilation_error!(
                constructor.display_name(),
                "cannot create an instance of abstract type {}",
                owner.fullname()
            ));
        }

        let body = self.copy_if_value_type(
            Node::New {
                constructor: constructor.def().clone(),
                args: self.arguments(constructor.parameters(), packing)?,
            },
            owner.token,
        );

        Ok(OperationTree {
            kind: AccessorKind::Create,
            packing,
            parameters: vec![ParamSlot::Arguments],
            required: constructor.required_parameters(),
            total: constructor.parameters().len(),
            body,
            name: constructor.display_name(),
        })
    }

    /// The tree of a field getter; constants become a `Constant` body
    ///
    /// # Errors
    /// Infallible for well-formed fields; the `Result` mirrors the other builders.
    pub fn field_getter(&self, field: &FieldDescriptor) -> Result<OperationTree> {
        let body = match field.constant_value() {
            Some(constant) => Node::Constant(constant.clone()),
            None => self.copy_if_value_type(
                Node::FieldAccess {
                    target: self.receiver(field),
                    field: field.def().clone(),
                },
                field.field_type(),
            ),
        };

        Ok(self.data_tree(AccessorKind::Get, field, body))
    }

    /// The tree of a field setter
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] for read-only and constant fields.
    pub fn field_setter(&self, field: &FieldDescriptor) -> Result<OperationTree> {
        if field.is_readonly() || field.is_constant() {
            return Err(compilation_error!(
                field.display_name(),
                "field is not assignable"
            ));
        }

        let body = Node::Assign {
            place: Box::new(Node::FieldAccess {
                target: self.receiver(field),
                field: field.def().clone(),
            }),
            value: Box::new(self.incoming_value(field.field_type())),
        };

        Ok(self.data_tree(AccessorKind::Set, field, body))
    }

    /// The tree of a property getter
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] for write-only properties and indexers.
    pub fn property_getter(&self, property: &PropertyDescriptor) -> Result<OperationTree> {
        if property.getter_method().is_none() || property.is_indexer() {
            return Err(compilation_error!(
                property.display_name(),
                "property has no plain getter"
            ));
        }

        let body = self.copy_if_value_type(
            Node::PropertyAccess {
                target: self.receiver(property),
                property: property.def().clone(),
                indices: Vec::new(),
            },
            property.property_type(),
        );

        Ok(self.data_tree(AccessorKind::Get, property, body))
    }

    /// The tree of a property setter
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] for read-only properties and indexers.
    pub fn property_setter(&self, property: &PropertyDescriptor) -> Result<OperationTree> {
        if property.setter_method().is_none() || property.is_indexer() {
            return Err(compilation_error!(
                property.display_name(),
                "property has no plain setter"
            ));
        }

        let body = Node::Assign {
            place: Box::new(Node::PropertyAccess {
                target: self.receiver(property),
                property: property.def().clone(),
                indices: Vec::new(),
            }),
            value: Box::new(self.incoming_value(property.property_type())),
        };

        Ok(self.data_tree(AccessorKind::Set, property, body))
    }

    /// The tree of an indexer read, taking the indices as arguments
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] unless `property` is a readable indexer.
    pub fn indexed_getter(&self, property: &PropertyDescriptor) -> Result<OperationTree> {
        if property.getter_method().is_none() || !property.is_indexer() {
            return Err(compilation_error!(
                property.display_name(),
                "property is not a readable indexer"
            ));
        }

        let body = self.copy_if_value_type(
            Node::PropertyAccess {
                target: self.receiver(property),
                property: property.def().clone(),
                indices: self.arguments(property.parameters(), ArgumentPacking::Array)?,
            },
            property.property_type(),
        );

        Ok(OperationTree {
            kind: AccessorKind::Invoke,
            packing: ArgumentPacking::Array,
            parameters: self.slots(property, &[ParamSlot::Arguments]),
            required: required_count(property.parameters()),
            total: property.parameters().len(),
            body,
            name: property.display_name(),
        })
    }

    /// The tree of an indexer write, taking the indices followed by the value
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] unless `property` is a writable indexer.
    pub fn indexed_setter(&self, property: &PropertyDescriptor) -> Result<OperationTree> {
        if property.setter_method().is_none() || !property.is_indexer() {
            return Err(compilation_error!(
                property.display_name(),
                "property is not a writable indexer"
            ));
        }

        let indices = self.arguments(property.parameters(), ArgumentPacking::Array)?;
        let position = indices.len();
        let value = self.copy_if_value_type(
            Node::convert(
                Node::ArrayIndex {
                    array: Box::new(Node::Parameter(ParamSlot::Arguments)),
                    index: position,
                    default: None,
                },
                property.property_type(),
            ),
            property.property_type(),
        );

        Ok(OperationTree {
            kind: AccessorKind::Invoke,
            packing: ArgumentPacking::Array,
            parameters: self.slots(property, &[ParamSlot::Arguments]),
            required: position + 1,
            total: position + 1,
            body: Node::Assign {
                place: Box::new(Node::PropertyAccess {
                    target: self.receiver(property),
                    property: property.def().clone(),
                    indices,
                }),
                value: Box::new(value),
            },
            name: property.display_name(),
        })
    }

    /// The tree of a method invoker
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] for open generic definitions and for
    /// non-virtual methods without a body.
    pub fn invoker(
        &self,
        method: &MethodDescriptor,
        packing: ArgumentPacking,
    ) -> Result<OperationTree> {
        if method.is_generic_definition() {
            return Err(compilation_error!(
                method.display_name(),
                "generic arguments are unbound"
            ));
        }
        if method.def().body.is_none() && !method.is_virtual() {
            return Err(compilation_error!(
                method.display_name(),
                "method has no implementation"
            ));
        }

        let call = Node::Call {
            target: self.receiver(method),
            method: method.def().clone(),
            type_args: method.generic_arguments().to_vec(),
            args: self.arguments(method.parameters(), packing)?,
        };
        let returns = method.returns();
        let body = if returns.is_void {
            call
        } else {
            self.copy_if_value_type(call, returns.return_type)
        };

        Ok(OperationTree {
            kind: AccessorKind::Invoke,
            packing,
            parameters: self.slots(method, &[ParamSlot::Arguments]),
            required: method.required_parameters(),
            total: method.parameters().len(),
            body,
            name: method.display_name(),
        })
    }

    /// One converted argument read per parameter
    fn arguments(
        &self,
        parameters: &[ParameterDescriptor],
        packing: ArgumentPacking,
    ) -> Result<Vec<Node>> {
        parameters
            .iter()
            .enumerate()
            .map(|(position, parameter)| {
                let default = match &parameter.default_value {
                    Some(default) => Some(default.clone()),
                    None if parameter.is_optional() => {
                        Some(self.types.default_value(parameter.param_type)?)
                    }
                    None => None,
                };

                let read = match packing {
                    ArgumentPacking::Array => Node::ArrayIndex {
                        array: Box::new(Node::Parameter(ParamSlot::Arguments)),
                        index: position,
                        default,
                    },
                    ArgumentPacking::Tuple => tuple_read(position, default),
                };

                Ok(self.copy_if_value_type(
                    Node::convert(read, parameter.param_type),
                    parameter.param_type,
                ))
            })
            .collect()
    }

    fn receiver(&self, member: &dyn Member) -> Option<Box<Node>> {
        (!member.is_static()).then(|| {
            Box::new(Node::convert(
                Node::Parameter(ParamSlot::Instance),
                member.declaring_type(),
            ))
        })
    }

    fn incoming_value(&self, value_type: Token) -> Node {
        self.copy_if_value_type(
            Node::convert(Node::Parameter(ParamSlot::Value), value_type),
            value_type,
        )
    }

    fn copy_if_value_type(&self, node: Node, value_type: Token) -> Node {
        if self.types.is_value_type(value_type) {
            Node::boxed(node)
        } else {
            node
        }
    }

    fn slots(&self, member: &dyn Member, inputs: &[ParamSlot]) -> Vec<ParamSlot> {
        let mut slots = Vec::with_capacity(inputs.len() + 1);
        if !member.is_static() {
            slots.push(ParamSlot::Instance);
        }
        slots.extend_from_slice(inputs);
        slots
    }

    fn data_tree(&self, kind: AccessorKind, member: &dyn Member, body: Node) -> OperationTree {
        let inputs: &[ParamSlot] = match kind {
            AccessorKind::Set => &[ParamSlot::Value],
            _ => &[],
        };

        OperationTree {
            kind,
            packing: ArgumentPacking::Array,
            parameters: self.slots(member, inputs),
            required: 0,
            total: 0,
            body,
            name: member.display_name(),
        }
    }
}

/// Reads flat argument `position` out of the packed tuple passed as the single argument.
///
/// Rest tuples on the way fall back to an empty tuple when the leaf has a default, so omitted
/// trailing arguments resolve to their defaults at any nesting depth.
fn tuple_read(position: usize, default: Option<Value>) -> Node {
    let empty = || Value::Tuple(Arc::from(Vec::new()));
    let mut node = Node::ArrayIndex {
        array: Box::new(Node::Parameter(ParamSlot::Arguments)),
        index: 0,
        default: default.as_ref().map(|_| empty()),
    };

    let path = tuple::path(position);
    let last = path.len() - 1;
    for (depth, index) in path.into_iter().enumerate() {
        let fallback = if depth == last {
            default.clone()
        } else {
            default.as_ref().map(|_| empty())
        };
        node = Node::TupleField {
            tuple: Box::new(node),
            index,
            default: fallback,
        };
    }

    node
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_read_nests_after_seven() {
        let node = tuple_read(9, None);
        let Node::TupleField { tuple, index, .. } = node else {
            panic!("expected tuple field");
        };
        assert_eq!(index, 2);

        let Node::TupleField { index: rest, .. } = *tuple else {
            panic!("expected rest tuple");
        };
        assert_eq!(rest, tuple::TUPLE_CHUNK);
    }

    #[test]
    fn test_tuple_read_defaults_propagate() {
        let node = tuple_read(8, Some(Value::I4(10)));
        let Node::TupleField { tuple, default, .. } = node else {
            panic!("expected tuple field");
        };
        assert_eq!(default, Some(Value::I4(10)));

        let Node::TupleField { default: rest, .. } = *tuple else {
            panic!("expected rest tuple");
        };
        assert!(matches!(rest, Some(Value::Tuple(items)) if items.is_empty()));
    }
}
