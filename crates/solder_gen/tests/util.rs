// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(dead_code, reason = "shared fixture helpers; each test file uses a subset")]

use solder_gen::{Generated, Options, Package, generate};

/// Runs the generator over `(name, text)` fixtures with default options.
pub fn run(files: &[(&str, &str)]) -> Generated {
    run_with(files, &Options::default())
}

/// Same as [`run`], with explicit options.
pub fn run_with(files: &[(&str, &str)], options: &Options) -> Generated {
    let package = Package::parse(files.iter().copied()).expect("fixture sources parse");
    generate(&package, options).expect("generation completes")
}

/// Runs the generator and insists on a clean, single-file result.
pub fn run_clean(files: &[(&str, &str)]) -> String {
    let generated = run(files);
    assert!(
        generated.diagnostics.is_empty(),
        "unexpected diagnostics: {:#?}",
        generated.diagnostics
    );
    generated.file.expect("a file was generated")
}

/// Collapses all whitespace to single spaces, so assertions survive
/// formatting-only differences.
pub fn flat(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Asserts `haystack` contains `needle` modulo whitespace.
pub fn assert_contains(haystack: &str, needle: &str) {
    assert!(
        flat(haystack).contains(&flat(needle)),
        "expected output to contain:\n{needle}\n\nactual output:\n{haystack}"
    );
}
