//! Accessor compilation: operation trees to directly callable closures.
//!
//! This module provides the last stage of the accessor pipeline:
//!
//! - [`crate::ir`]: descriptors → operation trees
//! - [`compiler`](self): operation trees → accessors
//! - [`crate::descriptor`]: accessors cached once per descriptor
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      AccessorCompiler                            │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  validate        kind matches the requested shape,               │
//! │                  referenced inputs declared by the tree          │
//! │                                                                  │
//! │  lower           one closure per node, composed bottom-up        │
//! │    ├─ Convert     implicit conversions, receiver casts           │
//! │    ├─ Box         value-semantics copies                         │
//! │    ├─ Call        virtual dispatch cached per runtime type       │
//! │    └─ New         allocate + constructor body                    │
//! │                                                                  │
//! │  guard           argument count check for Create / Invoke        │
//! │                                                                  │
//! │  wrap            Creator / Getter / Setter / Invoker             │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Compilation has no side effects besides the produced closure and the compile counter
//! exposed through [`AccessorCompiler::compilations`], which tests and
//! [`crate::Engine::stats`] use to observe caching.

mod accessor;
mod lower;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

pub use accessor::{Creator, Frame, Getter, Invoker, Setter};

pub(crate) use lower::{copy_value, type_name};

use crate::{
    compiler::{accessor::Thunk, lower::Lowering},
    ir::{AccessorKind, ArgumentPacking, Node, OperationTree, ParamSlot},
    metadata::typesystem::TypeRegistry,
    value::tuple,
    Error, Result,
};

/// Lowers operation trees into accessors.
pub struct AccessorCompiler {
    types: Arc<TypeRegistry>,
    compilations: AtomicUsize,
}

impl AccessorCompiler {
    /// Creates a compiler over `types`
    #[must_use]
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        AccessorCompiler {
            types,
            compilations: AtomicUsize::new(0),
        }
    }

    /// The registry accessors resolve types against
    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Number of trees compiled so far
    #[must_use]
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::Relaxed)
    }

    /// Compiles a `Create` tree
    ///
    /// # Errors
    /// Returns [`Error::Compilation`] if the tree cannot be lowered.
    pub fn creator(&self, tree: &OperationTree) -> Result<Creator> {
        Ok(Creator::new(
            &tree.name,
            self.compile(tree, AccessorKind::Create)?,
        ))
    }

    /// Compiles a `Get` tree
    ///
    /// # Errors
    /// Returns [`Error::Compilation`] if the tree cannot be lowered.
    pub fn getter(&self, tree: &OperationTree) -> Result<Getter> {
        Ok(Getter::new(&tree.name, self.compile(tree, AccessorKind::Get)?))
    }

    /// Compiles a `Set` tree
    ///
    /// # Errors
    /// Returns [`Error::Compilation`] if the tree cannot be lowered.
    pub fn setter(&self, tree: &OperationTree) -> Result<Setter> {
        Ok(Setter::new(&tree.name, self.compile(tree, AccessorKind::Set)?))
    }

    /// Compiles an `Invoke` tree
    ///
    /// # Errors
    /// Returns [`Error::Compilation`] if the tree cannot be lowered.
    pub fn invoker(&self, tree: &OperationTree) -> Result<Invoker> {
        Ok(Invoker::new(
            &tree.name,
            self.compile(tree, AccessorKind::Invoke)?,
        ))
    }

    fn compile(&self, tree: &OperationTree, expected: AccessorKind) -> Result<Thunk> {
        if tree.kind != expected {
            return Err(compilation_error!(
                tree.name,
                "expected a {} tree, got {}",
                expected,
                tree.kind
            ));
        }
        if tree.required > tree.total {
            return Err(compilation_error!(
                tree.name,
                "{} required argument(s) exceed {} parameter(s)",
                tree.required,
                tree.total
            ));
        }

        let mut referenced = Vec::new();
        referenced_slots(&tree.body, &mut referenced);
        if let Some(undeclared) = referenced
            .iter()
            .find(|slot| !tree.parameters.contains(slot))
        {
            return Err(compilation_error!(
                tree.name,
                "body reads undeclared input {}",
                undeclared
            ));
        }

        let body = Lowering::new(&self.types, &tree.name).lower(&tree.body)?;
        let thunk = match tree.kind {
            AccessorKind::Create | AccessorKind::Invoke => self.guard(tree, body),
            AccessorKind::Get | AccessorKind::Set => body,
        };

        self.compilations.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "compiled {} accessor for {} ({:?} packing, {}..={} args)",
            tree.kind,
            tree.name,
            tree.packing,
            tree.required,
            tree.total
        );
        Ok(thunk)
    }

    /// Wraps `body` into the argument count check
    fn guard(&self, tree: &OperationTree, body: Thunk) -> Thunk {
        let (required, total, packing) = (tree.required, tree.total, tree.packing);
        let types = self.types.clone();

        Arc::new(move |frame: &Frame<'_>| {
            let provided = match packing {
                ArgumentPacking::Array => frame.args.len(),
                ArgumentPacking::Tuple => match frame.args {
                    [] => 0,
                    [packed] => tuple::unpack(packed)
                        .ok_or_else(|| Error::InvalidCast {
                            from: type_name(&types, packed),
                            to: "System.ValueTuple".to_string(),
                        })?
                        .len(),
                    _ => {
                        return Err(Error::ArgumentCount {
                            expected: 1,
                            provided: frame.args.len(),
                        })
                    }
                },
            };

            if provided < required || provided > total {
                return Err(Error::ArgumentCount {
                    expected: if provided < required { required } else { total },
                    provided,
                });
            }

            body(frame)
        })
    }
}

fn referenced_slots(node: &Node, slots: &mut Vec<ParamSlot>) {
    if let Node::Parameter(slot) = node {
        if !slots.contains(slot) {
            slots.push(*slot);
        }
        return;
    }

    let mut visit = |child: &Node| referenced_slots(child, slots);
    match node {
        Node::Parameter(_) | Node::Constant(_) => {}
        Node::ArrayIndex { array: inner, .. }
        | Node::TupleField { tuple: inner, .. }
        | Node::Convert { operand: inner, .. }
        | Node::Box(inner) => visit(inner),
        Node::FieldAccess { target, .. } => {
            if let Some(target) = target {
                visit(target);
            }
        }
        Node::PropertyAccess {
            target,
            indices: args,
            ..
        }
        | Node::Call { target, args, .. } => {
            if let Some(target) = target {
                visit(target);
            }
            args.iter().for_each(&mut visit);
        }
        Node::New { args, .. } => args.iter().for_each(&mut visit),
        Node::Assign { place, value } => {
            visit(place);
            visit(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{metadata::token::Token, test::fixtures, value::Value};

    fn constant_tree(kind: AccessorKind) -> OperationTree {
        OperationTree {
            kind,
            packing: ArgumentPacking::Array,
            parameters: Vec::new(),
            required: 0,
            total: 0,
            body: Node::Constant(Value::I4(42)),
            name: "Demo::Answer".to_string(),
        }
    }

    #[test]
    fn test_constant_getter() {
        let compiler = AccessorCompiler::new(Arc::new(TypeRegistry::new()));
        let getter = compiler.getter(&constant_tree(AccessorKind::Get)).unwrap();

        assert_eq!(getter.get(&Value::Null).unwrap(), Value::I4(42));
        assert_eq!(compiler.compilations(), 1);
    }

    #[test]
    fn test_kind_mismatch_is_compilation_error() {
        let compiler = AccessorCompiler::new(Arc::new(TypeRegistry::new()));
        let result = compiler.setter(&constant_tree(AccessorKind::Get));

        assert!(matches!(result, Err(Error::Compilation { .. })));
        assert_eq!(compiler.compilations(), 0);
    }

    #[test]
    fn test_undeclared_input_rejected() {
        let compiler = AccessorCompiler::new(Arc::new(TypeRegistry::new()));
        let mut tree = constant_tree(AccessorKind::Get);
        tree.body = Node::Parameter(ParamSlot::Instance);

        assert!(matches!(
            compiler.getter(&tree),
            Err(Error::Compilation { .. })
        ));
    }

    #[test]
    fn test_unknown_conversion_target_rejected() {
        let compiler = AccessorCompiler::new(Arc::new(TypeRegistry::new()));
        let mut tree = constant_tree(AccessorKind::Get);
        tree.body = Node::convert(Node::Constant(Value::I4(1)), Token(0x0200_0999));

        assert!(matches!(
            compiler.getter(&tree),
            Err(Error::Compilation { .. })
        ));
    }

    #[test]
    fn test_argument_count_guard() {
        let compiler = AccessorCompiler::new(Arc::new(TypeRegistry::new()));
        let tree = OperationTree {
            kind: AccessorKind::Invoke,
            packing: ArgumentPacking::Array,
            parameters: vec![ParamSlot::Arguments],
            required: 1,
            total: 2,
            body: Node::ArrayIndex {
                array: Box::new(Node::Parameter(ParamSlot::Arguments)),
                index: 0,
                default: None,
            },
            name: "Demo::First".to_string(),
        };
        let invoker = compiler.invoker(&tree).unwrap();

        assert_eq!(
            invoker.invoke(&Value::Null, &[Value::I4(7)]).unwrap(),
            Value::I4(7)
        );
        assert!(matches!(
            invoker.invoke(&Value::Null, &[]),
            Err(Error::ArgumentCount {
                expected: 1,
                provided: 0
            })
        ));
        assert!(matches!(
            invoker.invoke(&Value::Null, &[Value::I4(1), Value::I4(2), Value::I4(3)]),
            Err(Error::ArgumentCount {
                expected: 2,
                provided: 3
            })
        ));
    }

    #[test]
    fn test_boxed_value_type_is_copied() {
        let registry = fixtures::registry();
        let point = fixtures::point(&registry);
        let compiler = AccessorCompiler::new(registry.clone());

        let original = registry.allocate(point.token).unwrap();
        let tree = OperationTree {
            kind: AccessorKind::Get,
            packing: ArgumentPacking::Array,
            parameters: vec![ParamSlot::Instance],
            required: 0,
            total: 0,
            body: Node::boxed(Node::Parameter(ParamSlot::Instance)),
            name: "Geometry.Point::Copy".to_string(),
        };
        let copy = compiler
            .getter(&tree)
            .unwrap()
            .get(&Value::Object(original.clone()))
            .unwrap();

        let copy = copy.as_object().unwrap();
        assert!(!Arc::ptr_eq(copy, &original));
        copy.store(0, Value::I4(99)).unwrap();
        assert_eq!(original.load(0).unwrap(), Value::I4(0));
    }
}
