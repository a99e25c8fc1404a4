#![allow(unused)]
extern crate reflectscope;

use criterion::{criterion_group, criterion_main, Criterion};
use reflectscope::prelude::*;
use std::{hint::black_box, sync::Arc};

fn setup() -> (Engine, TypeRc) {
    let registry = Arc::new(TypeRegistry::new());
    let int = PrimitiveKind::I4.token();
    let point = TypeBuilder::new(registry.clone())
        .value_type("Geometry", "Point")
        .field(FieldSpec::new("x", int))
        .field(FieldSpec::new("y", int))
        .field_constructor(&["x", "y"])
        .method(
            MethodSpec::new("Sum")
                .returns(int)
                .param(ParamSpec::new("offset", int))
                .body(|frame| {
                    let x = frame.load_field("x")?.as_i32().unwrap_or_default();
                    let y = frame.load_field("y")?.as_i32().unwrap_or_default();
                    let offset = frame.arg(0)?.as_i32().unwrap_or_default();
                    Ok(Value::I4(x + y + offset))
                }),
        )
        .build()
        .expect("Failed to register Point");

    (Engine::new(registry), point)
}

/// Compiled accessors against by-name calls that resolve the member every time
fn bench_field_access(c: &mut Criterion) {
    let (engine, point) = setup();
    let instance = engine
        .new_instance(point.token, &[Value::I4(3), Value::I4(4)])
        .unwrap();
    let x = engine
        .members(point.token)
        .unwrap()
        .fields
        .get("x")
        .unwrap()
        .clone();
    let getter = engine.getter(&*x).unwrap().unwrap();
    let setter = engine.setter(&*x).unwrap().unwrap();

    let mut group = c.benchmark_group("field_access");
    group.bench_function("getter", |b| {
        b.iter(|| black_box(getter.get(black_box(&instance)).unwrap()));
    });
    group.bench_function("setter", |b| {
        b.iter(|| setter.set(black_box(&instance), Value::I4(7)).unwrap());
    });
    group.bench_function("get_member", |b| {
        b.iter(|| black_box(engine.get_member(black_box(&instance), "x").unwrap()));
    });
    group.finish();
}

fn bench_invocation(c: &mut Criterion) {
    let (engine, point) = setup();
    let instance = engine
        .new_instance(point.token, &[Value::I4(3), Value::I4(4)])
        .unwrap();
    let args = [Value::I4(1)];
    let method = engine
        .find_method(point.token, "Sum", &args)
        .unwrap()
        .unwrap();
    let invoker = engine.invoker(&method).unwrap();
    let constructor = engine
        .find_constructor(point.token, &[Value::I4(0), Value::I4(0)])
        .unwrap()
        .unwrap();
    let creator = engine.creator(&constructor).unwrap();

    let mut group = c.benchmark_group("invocation");
    group.bench_function("invoker", |b| {
        b.iter(|| black_box(invoker.invoke(black_box(&instance), &args).unwrap()));
    });
    group.bench_function("call", |b| {
        b.iter(|| black_box(engine.call(black_box(&instance), "Sum", &args).unwrap()));
    });
    group.bench_function("creator", |b| {
        b.iter(|| black_box(creator.create(&[Value::I4(1), Value::I4(2)]).unwrap()));
    });
    group.finish();
}

/// Cold discovery of a type on a fresh engine
fn bench_discovery(c: &mut Criterion) {
    c.bench_function("discover_point", |b| {
        b.iter_with_setup(setup, |(engine, point)| {
            black_box(engine.members(point.token).unwrap())
        });
    });
}

criterion_group!(benches, bench_field_access, bench_invocation, bench_discovery);
criterion_main!(benches);
