//! Operation trees: the declarative description of one member access.
//!
//! Before anything is compiled, every accessor request is expressed as a small tree of
//! [`Node`]s: read the boxed arguments, convert them to the declared parameter types, perform
//! the access or call, and box the result. [`OperationBuilder`] derives these trees from
//! descriptors; [`crate::compiler::AccessorCompiler`] lowers them into closures.
//!
//! # Architecture
//!
//! ```text
//! descriptor ──► OperationBuilder ──► OperationTree ──► AccessorCompiler ──► accessor
//!                 (argument unpack,     { kind,           (closure per
//!                  conversions, box)      packing,          node, arity
//!                                         body }            check)
//! ```
//!
//! # Key Types
//!
//! - [`Node`] - One operation of the tree
//! - [`OperationTree`] - A complete accessor body with its argument contract
//! - [`AccessorKind`] - The four accessor shapes
//! - [`ArgumentPacking`] - How arguments reach the accessor: flat or as a packed tuple

mod builder;

use std::fmt;

use strum::Display;

pub use builder::OperationBuilder;

use crate::{
    metadata::{
        members::{ConstructorRc, FieldRc, MethodRc, PropertyRc},
        token::Token,
    },
    value::Value,
};

/// The accessor shapes an operation tree can describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum AccessorKind {
    /// `create(args) -> instance`
    Create,
    /// `get(instance) -> value`
    Get,
    /// `set(instance, value)`
    Set,
    /// `invoke(instance, args) -> value`
    Invoke,
}

/// How the argument list reaches an accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ArgumentPacking {
    /// A flat slice, one value per parameter
    Array,
    /// A single (nested) tuple holding all arguments, see [`crate::value::tuple`]
    Tuple,
}

/// The accessor inputs a [`Node::Parameter`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ParamSlot {
    /// The receiver; `null` for static members
    Instance,
    /// The argument list
    Arguments,
    /// The value a setter stores
    Value,
}

/// One operation of an operation tree
#[derive(Clone)]
pub enum Node {
    /// An accessor input
    Parameter(ParamSlot),
    /// A constant
    Constant(Value),
    /// Element `index` of an array-shaped input; `default` stands in for a missing element
    ArrayIndex {
        /// The array
        array: Box<Node>,
        /// The element position
        index: usize,
        /// The value used when the array is too short
        default: Option<Value>,
    },
    /// Item `index` of a tuple; `default` stands in for a missing item
    TupleField {
        /// The tuple
        tuple: Box<Node>,
        /// The item position
        index: usize,
        /// The value used when the tuple is too short
        default: Option<Value>,
    },
    /// Implicit conversion to `target`
    Convert {
        /// The value to convert
        operand: Box<Node>,
        /// The target type
        target: Token,
    },
    /// Value-semantics copy of a value type instance
    Box(Box<Node>),
    /// A field; `target` is `None` for static fields
    FieldAccess {
        /// The receiver
        target: Option<Box<Node>>,
        /// The field
        field: FieldRc,
    },
    /// A property or indexer; `target` is `None` for static properties
    PropertyAccess {
        /// The receiver
        target: Option<Box<Node>>,
        /// The property
        property: PropertyRc,
        /// Index arguments of an indexer
        indices: Vec<Node>,
    },
    /// A method call; `target` is `None` for static methods
    Call {
        /// The receiver
        target: Option<Box<Node>>,
        /// The method
        method: MethodRc,
        /// Bound generic arguments
        type_args: Vec<Token>,
        /// The arguments, one per parameter
        args: Vec<Node>,
    },
    /// Allocation of a new instance followed by a constructor call
    New {
        /// The constructor
        constructor: ConstructorRc,
        /// The arguments, one per parameter
        args: Vec<Node>,
    },
    /// Store `value` into `place` (a field or property access)
    Assign {
        /// Where to store
        place: Box<Node>,
        /// What to store
        value: Box<Node>,
    },
}

impl Node {
    /// Wraps `operand` into a conversion to `target`
    #[must_use]
    pub fn convert(operand: Node, target: Token) -> Node {
        Node::Convert {
            operand: Box::new(operand),
            target,
        }
    }

    /// Wraps `operand` into a value-semantics copy
    #[must_use]
    pub fn boxed(operand: Node) -> Node {
        Node::Box(Box::new(operand))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Parameter(slot) => write!(f, "Parameter({slot})"),
            Node::Constant(value) => write!(f, "Constant({value})"),
            Node::ArrayIndex {
                array,
                index,
                default,
            } => match default {
                Some(default) => write!(f, "{array:?}[{index}] ?? {default}"),
                None => write!(f, "{array:?}[{index}]"),
            },
            Node::TupleField {
                tuple,
                index,
                default,
            } => match default {
                Some(default) => write!(f, "{tuple:?}.Item{index} ?? {default}"),
                None => write!(f, "{tuple:?}.Item{index}"),
            },
            Node::Convert { operand, target } => write!(f, "Convert({operand:?}, {target})"),
            Node::Box(operand) => write!(f, "Box({operand:?})"),
            Node::FieldAccess { target, field } => match target {
                Some(target) => write!(f, "{target:?}.{}", field.name),
                None => write!(f, "{}.{}", field.declaring_type, field.name),
            },
            Node::PropertyAccess {
                target,
                property,
                indices,
            } => {
                match target {
                    Some(target) => write!(f, "{target:?}.{}", property.name)?,
                    None => write!(f, "{}.{}", property.declaring_type, property.name)?,
                }
                if !indices.is_empty() {
                    write!(f, "{indices:?}")?;
                }
                Ok(())
            }
            Node::Call {
                target,
                method,
                type_args,
                args,
            } => {
                match target {
                    Some(target) => write!(f, "{target:?}.{}", method.name)?,
                    None => write!(f, "{}.{}", method.declaring_type, method.name)?,
                }
                if !type_args.is_empty() {
                    write!(f, "<{type_args:?}>")?;
                }
                write!(f, "({args:?})")
            }
            Node::New { constructor, args } => {
                write!(f, "new {}({args:?})", constructor.declaring_type)
            }
            Node::Assign { place, value } => write!(f, "{place:?} = {value:?}"),
        }
    }
}

/// A complete accessor body together with its argument contract.
#[derive(Debug, Clone)]
pub struct OperationTree {
    /// The accessor shape
    pub kind: AccessorKind,
    /// How arguments are passed; only meaningful for `Create` and `Invoke`
    pub packing: ArgumentPacking,
    /// The inputs the body reads
    pub parameters: Vec<ParamSlot>,
    /// Minimum number of arguments (parameters without a default)
    pub required: usize,
    /// Maximum number of arguments
    pub total: usize,
    /// The body
    pub body: Node,
    /// Display name of the member, for diagnostics
    pub name: String,
}
