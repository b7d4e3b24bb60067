// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(missing_docs, reason = "Test code")]

mod util;

use solder_gen::DiagnosticKind;
use util::{assert_contains, run, run_clean};

const PROVIDERS: &str = r#"
#[derive(Clone)]
pub struct Foo {
    pub x: i32,
}

#[derive(Clone)]
pub struct Bar {
    pub x: i32,
}

pub struct FooBar {
    pub foo: Foo,
    pub bar: Bar,
}

pub fn provide_foo() -> Foo {
    Foo { x: 1 }
}

pub fn provide_bar() -> Bar {
    Bar { x: 2 }
}
"#;

#[test]
fn struct_literal_is_filled_in_field_declaration_order() {
    let inject = r#"
#![cfg(wireinject)]

use super::*;

fn initialize_foo_bar() -> FooBar {
    solder::build!(provide_foo, provide_bar, FooBar {})
}
"#;
    let file = run_clean(&[("providers.rs", PROVIDERS), ("inject.rs", inject)]);
    assert_contains(
        &file,
        r"
        fn initialize_foo_bar() -> FooBar {
            let foo = provide_foo();
            let bar = provide_bar();
            let foo_bar = FooBar { foo, bar };
            foo_bar
        }
        ",
    );
}

#[test]
fn boxed_request_wraps_the_literal() {
    let inject = r#"
#![cfg(wireinject)]

use super::*;

fn initialize_boxed() -> Box<FooBar> {
    solder::build!(provide_foo, provide_bar, FooBar {})
}
"#;
    let file = run_clean(&[("providers.rs", PROVIDERS), ("inject.rs", inject)]);
    assert_contains(&file, "let foo_bar = Box::new(FooBar { foo, bar });");
    assert_contains(&file, "foo_bar\n}");
}

#[test]
fn shared_dependencies_clone_for_every_use_but_the_last() {
    let providers = r#"
#[derive(Clone)]
pub struct Foo {
    pub x: i32,
}

#[derive(Clone)]
pub struct Bar {
    pub x: i32,
}

pub struct FooBar {
    pub foo: Foo,
    pub bar: Bar,
}

pub fn provide_foo() -> Foo {
    Foo { x: 1 }
}

pub fn provide_bar(foo: Foo) -> Bar {
    Bar { x: foo.x + 1 }
}
"#;
    let inject = r#"
#![cfg(wireinject)]

use super::*;

fn initialize_foo_bar() -> FooBar {
    solder::build!(provide_foo, provide_bar, FooBar {})
}
"#;
    let file = run_clean(&[("providers.rs", providers), ("inject.rs", inject)]);
    assert_contains(
        &file,
        r"
        let foo = provide_foo();
        let bar = provide_bar(foo.clone());
        let foo_bar = FooBar { foo, bar };
        ",
    );
}

#[test]
fn struct_provider_literals_must_be_empty() {
    let inject = r#"
#![cfg(wireinject)]

use super::*;

fn initialize_foo_bar() -> FooBar {
    solder::build!(provide_foo, provide_bar, FooBar { foo: Foo { x: 3 } })
}
"#;
    let generated = run(&[("providers.rs", PROVIDERS), ("inject.rs", inject)]);
    assert!(generated.file.is_none());
    assert!(generated.diagnostics.iter().any(|diagnostic| matches!(
        diagnostic.kind,
        DiagnosticKind::DslMisuse { .. }
    )));
}

#[test]
fn tuple_structs_cannot_back_struct_providers() {
    let providers = r#"
#[derive(Clone)]
pub struct Foo(pub i32);

pub fn provide_unused() -> i32 {
    3
}
"#;
    let inject = r#"
#![cfg(wireinject)]

use super::*;

fn initialize_foo() -> Foo {
    solder::build!(Foo {})
}
"#;
    let generated = run(&[("providers.rs", providers), ("inject.rs", inject)]);
    assert!(generated.file.is_none());
    assert!(generated.diagnostics.iter().any(|diagnostic| {
        diagnostic.kind.to_string().contains("cannot back a struct provider")
    }));
}
