//! Host types shared by unit tests.
//!
//! Every fixture registers its type into the given registry and panics on registration
//! errors; each may be registered at most once per registry.

use std::sync::Arc;

use crate::{
    metadata::{
        members::TypeAttributes,
        token::Token,
        typesystem::{
            ConstructorSpec, EventSpec, FieldSpec, GenericParamSpec, MethodSpec, ParamSpec,
            PrimitiveKind, PropertySpec, TypeBuilder, TypeRc, TypeRegistry,
        },
    },
    test::int_arg,
    value::Value,
};

fn int() -> Token {
    PrimitiveKind::I4.token()
}

fn double() -> Token {
    PrimitiveKind::R8.token()
}

fn string() -> Token {
    PrimitiveKind::String.token()
}

/// A fresh registry holding only the primitives
pub fn registry() -> Arc<TypeRegistry> {
    Arc::new(TypeRegistry::new())
}

/// `Geometry.Point { x: int, y: int }`, a value type with a field constructor and `Length()`
pub fn point(registry: &Arc<TypeRegistry>) -> TypeRc {
    TypeBuilder::new(registry.clone())
        .value_type("Geometry", "Point")
        .field(FieldSpec::new("x", int()))
        .field(FieldSpec::new("y", int()))
        .field_constructor(&["x", "y"])
        .method(MethodSpec::new("Length").returns(double()).body(|frame| {
            let x = frame.load_field("x")?.as_f64().unwrap_or_default();
            let y = frame.load_field("y")?.as_f64().unwrap_or_default();
            Ok(Value::R8(x.hypot(y)))
        }))
        .build()
        .unwrap()
}

/// `Demo.Person` with auto properties `Name` and `Age`, a virtual `Greet()` and a `Renamed`
/// event raised with the new name
pub fn person(registry: &Arc<TypeRegistry>) -> TypeRc {
    let handler = TypeBuilder::new(registry.clone())
        .delegate("Demo", "NameChanged")
        .build()
        .unwrap();

    TypeBuilder::new(registry.clone())
        .class("Demo", "Person")
        .property(PropertySpec::new("Name", string()).auto())
        .property(PropertySpec::new("Age", int()).auto())
        .constructor(ConstructorSpec::new())
        .constructor(
            ConstructorSpec::new()
                .param(ParamSpec::new("name", string()))
                .body(|frame| frame.store_field("<Name>k__BackingField", frame.arg(0)?.clone())),
        )
        .method(
            MethodSpec::new("Greet")
                .returns(string())
                .set_virtual()
                .body(|frame| {
                    let name = frame.load_field("<Name>k__BackingField")?;
                    Ok(Value::from(format!(
                        "Hello, {}",
                        name.as_str().unwrap_or("nobody")
                    )))
                }),
        )
        .event(
            EventSpec::new("Renamed", handler.token).arg(ParamSpec::new("name", string())),
        )
        .build()
        .unwrap()
}

/// `Demo.Employee : Demo.Person` adding `Salary` and overriding `Greet()`
pub fn employee(registry: &Arc<TypeRegistry>, person: &TypeRc) -> TypeRc {
    TypeBuilder::new(registry.clone())
        .class("Demo", "Employee")
        .extends(person.token)
        .property(PropertySpec::new("Salary", double()).auto())
        .method(
            MethodSpec::new("Greet")
                .returns(string())
                .set_virtual()
                .body(|frame| {
                    let name = frame.load_field("<Name>k__BackingField")?;
                    Ok(Value::from(format!(
                        "Welcome back, {}",
                        name.as_str().unwrap_or("nobody")
                    )))
                }),
        )
        .build()
        .unwrap()
}

/// The abstract `Geometry.Shape` declaring `abstract double Area()`
pub fn shape(registry: &Arc<TypeRegistry>) -> TypeRc {
    TypeBuilder::new(registry.clone())
        .class("Geometry", "Shape")
        .flags(TypeAttributes::ABSTRACT)
        .method(
            MethodSpec::new("Area")
                .returns(double())
                .set_virtual()
                .set_abstract(),
        )
        .build()
        .unwrap()
}

/// `Geometry.Circle : Geometry.Shape` with a `Radius` field and an `Area()` override
pub fn circle(registry: &Arc<TypeRegistry>, shape: &TypeRc) -> TypeRc {
    TypeBuilder::new(registry.clone())
        .class("Geometry", "Circle")
        .extends(shape.token)
        .field(FieldSpec::new("Radius", double()))
        .field_constructor(&["Radius"])
        .method(
            MethodSpec::new("Area")
                .returns(double())
                .set_virtual()
                .body(|frame| {
                    let radius = frame.load_field("Radius")?.as_f64().unwrap_or_default();
                    Ok(Value::R8(std::f64::consts::PI * radius * radius))
                }),
        )
        .build()
        .unwrap()
}

/// `Demo.Calculator` with static overload sets:
///
/// - `Add(int, int)`, `Add(double, double)`
/// - `Offset(int a, int b = 10)`
/// - `Scale(int value, int factor = 2)`, then `Scale(int value)` tripling
/// - `TryParse(string text, out int result)`
pub fn calculator(registry: &Arc<TypeRegistry>) -> TypeRc {
    TypeBuilder::new(registry.clone())
        .class("Demo", "Calculator")
        .method(
            MethodSpec::new("Add")
                .set_static()
                .returns(int())
                .param(ParamSpec::new("a", int()))
                .param(ParamSpec::new("b", int()))
                .body(|frame| Ok(Value::I4(int_arg(frame.args, 0)? + int_arg(frame.args, 1)?))),
        )
        .method(
            MethodSpec::new("Add")
                .set_static()
                .returns(double())
                .param(ParamSpec::new("a", double()))
                .param(ParamSpec::new("b", double()))
                .body(|frame| {
                    let a = frame.arg(0)?.as_f64().unwrap_or_default();
                    let b = frame.arg(1)?.as_f64().unwrap_or_default();
                    Ok(Value::R8(a + b))
                }),
        )
        .method(
            MethodSpec::new("Offset")
                .set_static()
                .returns(int())
                .param(ParamSpec::new("a", int()))
                .param(ParamSpec::new("b", int()).default(Value::I4(10)))
                .body(|frame| Ok(Value::I4(int_arg(frame.args, 0)? + int_arg(frame.args, 1)?))),
        )
        .method(
            MethodSpec::new("Scale")
                .set_static()
                .returns(int())
                .param(ParamSpec::new("value", int()))
                .param(ParamSpec::new("factor", int()).default(Value::I4(2)))
                .body(|frame| Ok(Value::I4(int_arg(frame.args, 0)? * int_arg(frame.args, 1)?))),
        )
        .method(
            MethodSpec::new("Scale")
                .set_static()
                .returns(int())
                .param(ParamSpec::new("value", int()))
                .body(|frame| Ok(Value::I4(int_arg(frame.args, 0)? * 3))),
        )
        .method(
            MethodSpec::new("TryParse")
                .set_static()
                .returns(PrimitiveKind::Boolean.token())
                .param(ParamSpec::new("text", string()))
                .param(ParamSpec::new("result", int()).out())
                .body(|frame| {
                    Ok(Value::Boolean(
                        frame
                            .arg(0)?
                            .as_str()
                            .is_some_and(|text| text.parse::<i32>().is_ok()),
                    ))
                }),
        )
        .build()
        .unwrap()
}

/// `Demo.Utility` with static generic methods:
///
/// - `T Identity<T>(T value)`
/// - `T Reference<T>() where T : class`
/// - `T Zero<T>() where T : struct`
/// - `T Make<T>() where T : new()`
/// - `bool Same<T>(T a, T b)`
/// - `T First<T>(T[] items)`
pub fn utility(registry: &Arc<TypeRegistry>) -> TypeRc {
    let t = registry.generic_parameter(0).unwrap();
    let items = registry.array_of(t).unwrap();

    TypeBuilder::new(registry.clone())
        .class("Demo", "Utility")
        .method(
            MethodSpec::new("Identity")
                .set_static()
                .generic(GenericParamSpec::new("T"))
                .returns(t)
                .param(ParamSpec::new("value", t))
                .body(|frame| Ok(frame.arg(0)?.clone())),
        )
        .method(
            MethodSpec::new("Reference")
                .set_static()
                .generic(GenericParamSpec::new("T").reference_type())
                .returns(t)
                .body(|_| Ok(Value::Null)),
        )
        .method(
            MethodSpec::new("Zero")
                .set_static()
                .generic(GenericParamSpec::new("T").value_type())
                .returns(t)
                .body(|frame| frame.types.default_value(frame.type_arg(0)?)),
        )
        .method(
            MethodSpec::new("Make")
                .set_static()
                .generic(GenericParamSpec::new("T").default_constructor())
                .returns(t)
                .body(|frame| {
                    let target = frame.type_arg(0)?;
                    if frame.types.is_value_type(target) {
                        frame.types.default_value(target)
                    } else {
                        Ok(Value::Object(frame.types.allocate(target)?))
                    }
                }),
        )
        .method(
            MethodSpec::new("Same")
                .set_static()
                .generic(GenericParamSpec::new("T"))
                .returns(PrimitiveKind::Boolean.token())
                .param(ParamSpec::new("a", t))
                .param(ParamSpec::new("b", t))
                .body(|frame| Ok(Value::Boolean(frame.arg(0)? == frame.arg(1)?))),
        )
        .method(
            MethodSpec::new("First")
                .set_static()
                .generic(GenericParamSpec::new("T"))
                .returns(t)
                .param(ParamSpec::new("items", items))
                .body(|frame| match frame.arg(0)? {
                    Value::Array(array) => array.get(0),
                    _ => Ok(Value::Null),
                }),
        )
        .build()
        .unwrap()
}
