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
pub struct Timeout {
    pub millis: u64,
}

pub const DEFAULT_TIMEOUT: Timeout = Timeout { millis: 250 };

pub fn make_foo() -> Foo {
    Foo { x: 0 }
}
"#;

#[test]
fn struct_literal_values_are_lifted_verbatim() {
    let inject = r#"
#![cfg(wireinject)]

use super::*;

static VALUES: solder::ProviderSet = solder::set![solder::value(Foo { x: 42 })];

fn initialize_foo() -> Foo {
    solder::build!(VALUES)
}
"#;
    let file = run_clean(&[("providers.rs", PROVIDERS), ("inject.rs", inject)]);
    assert_contains(
        &file,
        r"
        fn initialize_foo() -> Foo {
            let foo = Foo { x: 42 };
            foo
        }
        ",
    );
}

#[test]
fn turbofish_values_may_reference_package_constants() {
    let inject = r#"
#![cfg(wireinject)]

use super::*;

fn initialize_timeout() -> Timeout {
    solder::build!(solder::value::<Timeout>(DEFAULT_TIMEOUT))
}
"#;
    let file = run_clean(&[("providers.rs", PROVIDERS), ("inject.rs", inject)]);
    assert_contains(&file, "let timeout: Timeout = DEFAULT_TIMEOUT;");
}

#[test]
fn value_expressions_may_not_contain_calls() {
    let inject = r#"
#![cfg(wireinject)]

use super::*;

fn initialize_foo() -> Foo {
    solder::build!(solder::value(make_foo()))
}
"#;
    let generated = run(&[("providers.rs", PROVIDERS), ("inject.rs", inject)]);
    assert!(generated.file.is_none());
    assert_eq!(generated.diagnostics.len(), 1);
    assert!(matches!(
        generated.diagnostics[0].kind,
        DiagnosticKind::BadValueExpr { .. }
    ));
}

#[test]
fn value_expressions_may_not_hide_calls_in_macros() {
    let inject = r#"
#![cfg(wireinject)]

use super::*;

fn initialize_foo() -> Foo {
    solder::build!(solder::value::<Foo>(make_default!()))
}
"#;
    let generated = run(&[("providers.rs", PROVIDERS), ("inject.rs", inject)]);
    assert!(generated.file.is_none());
    assert!(matches!(
        generated.diagnostics[0].kind,
        DiagnosticKind::BadValueExpr { .. }
    ));
}

#[test]
fn untyped_non_literal_values_are_rejected() {
    let inject = r#"
#![cfg(wireinject)]

use super::*;

fn initialize_timeout() -> Timeout {
    solder::build!(solder::value(DEFAULT_TIMEOUT))
}
"#;
    let generated = run(&[("providers.rs", PROVIDERS), ("inject.rs", inject)]);
    assert!(generated.file.is_none());
    assert!(generated.diagnostics.iter().any(|diagnostic| {
        diagnostic.kind.to_string().contains("value::<T>")
    }));
}
