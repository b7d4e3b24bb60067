// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core resolver and code generator behind the `solder` dependency-injection
//! markers.
//!
//! The pipeline is a pure function from parsed source to generated source:
//! the *reader* recognizes the marker DSL and injector stubs, the
//! *flattener* expands nested provider sets, the *resolver* builds one
//! acyclic graph per injector, and the *emitter* synthesizes straight-line
//! constructor code. All problems are accumulated as [`Diagnostic`]s; one
//! pass reports everything it finds.
//!
//! File discovery, writing the output, and the command-line surface are the
//! caller's concern. This crate never touches the filesystem.
//!
//! # Quick Start
//!
//! ```rust
//! use solder_gen::{Options, Package, SourceFile, generate};
//!
//! let providers = SourceFile::parse(
//!     "providers.rs",
//!     r#"
//!     #[derive(Clone)]
//!     pub struct Config { pub verbose: bool }
//!     pub struct Logger { pub verbose: bool }
//!
//!     pub fn provide_config() -> Config { Config { verbose: false } }
//!     pub fn provide_logger(config: Config) -> Logger { Logger { verbose: config.verbose } }
//!     "#,
//! )
//! .unwrap();
//! let stubs = SourceFile::parse(
//!     "inject.rs",
//!     r#"
//!     #![cfg(wireinject)]
//!     use super::*;
//!
//!     fn initialize_logger() -> Logger {
//!         solder::build!(provide_config, provide_logger)
//!     }
//!     "#,
//! )
//! .unwrap();
//!
//! let generated = generate(&Package::new(vec![providers, stubs]), &Options::default()).unwrap();
//! let file = generated.file.expect("one injector emitted");
//! assert!(file.starts_with("// Code generated by solder. DO NOT EDIT."));
//! assert!(file.contains("let logger = provide_logger(config);"));
//! ```
//!
//! # Determinism
//!
//! Given the same inputs, [`generate`] yields byte-identical output and
//! identically ordered diagnostics. Variable names, import order, and
//! topological tie-breaks all derive from source order, never from map
//! iteration or pointer identity.

mod diag;
mod emit;
mod flatten;
mod index;
mod model;
mod reader;
mod resolve;

pub use diag::{Diagnostic, DiagnosticKind, GenerateError, Location, Related};

use tracing::debug;

use crate::diag::Diagnostics;

/// One already-parsed source file of the package under generation.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub(crate) name: String,
    pub(crate) text: String,
    pub(crate) ast: syn::File,
}

impl SourceFile {
    /// Parses `text` as a Rust source file.
    pub fn parse(name: impl Into<String>, text: impl Into<String>) -> Result<Self, GenerateError> {
        let name = name.into();
        let text = text.into();
        let ast = syn::parse_file(&text).map_err(|source| GenerateError::Parse {
            file: name.clone(),
            source,
        })?;
        Ok(Self { name, text, ast })
    }

    /// The file name this source was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The set of files making up one package: provider declarations plus any
/// number of `#![cfg(wireinject)]` stub files.
#[derive(Clone, Debug, Default)]
pub struct Package {
    pub(crate) files: Vec<SourceFile>,
}

impl Package {
    /// Builds a package from already-parsed files, in order.
    #[must_use]
    pub fn new(files: Vec<SourceFile>) -> Self {
        Self { files }
    }

    /// Convenience constructor parsing `(name, text)` pairs in order.
    pub fn parse<'a>(
        sources: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, GenerateError> {
        let files = sources
            .into_iter()
            .map(|(name, text)| SourceFile::parse(name, text))
            .collect::<Result<_, _>>()?;
        Ok(Self { files })
    }
}

/// Generation options.
#[derive(Clone, Debug)]
pub struct Options {
    context_types: Vec<String>,
    strict: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            context_types: vec!["Context".to_owned(), "solder::Context".to_owned()],
            strict: false,
        }
    }
}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// In strict mode, [`generate`] fails when stubs exist but none could be
    /// generated.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Registers an additional type token to treat as the cancellation
    /// context: resolved exclusively against injector inputs, never against
    /// providers.
    #[must_use]
    pub fn with_context_type(mut self, ty: impl Into<String>) -> Self {
        self.context_types.push(ty.into());
        self
    }

    pub(crate) fn is_context(&self, key: &str) -> bool {
        self.context_types.iter().any(|ty| ty == key)
    }
}

/// The outcome of one generation invocation.
#[derive(Clone, Debug)]
pub struct Generated {
    /// The complete generated file, or `None` when no injector could be
    /// emitted (or the package has no stubs).
    pub file: Option<String>,
    /// Names of the injectors present in `file`, in emission order.
    pub injectors: Vec<String>,
    /// Everything that went wrong, in discovery order. Failing injectors are
    /// skipped without affecting the others.
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs the full pipeline over one package.
///
/// Injectors whose resolution produced errors are skipped; unrelated
/// injectors in the same package are still emitted. With
/// [`Options::with_strict`], an error is returned only when at least one
/// stub exists and none could be generated.
pub fn generate(package: &Package, options: &Options) -> Result<Generated, GenerateError> {
    let mut diags = Diagnostics::default();
    let model = reader::read_package(package, &mut diags);

    let mut emitted = Vec::new();
    let mut injectors = Vec::new();
    for stub in &model.stubs {
        if stub.poisoned {
            continue;
        }
        let before = diags.len();
        let effective = flatten::flatten(&stub.set, &model.sets, &mut diags);
        let graph = resolve::resolve(stub, &effective, &model.index, options, &mut diags);
        match graph {
            Some(graph) if diags.len() == before => {
                emitted.push(emit::emit_injector(stub, &graph));
                injectors.push(stub.name.clone());
            }
            _ => {
                debug!(injector = %stub.name, "skipping injector with errors");
            }
        }
    }

    let file = (!emitted.is_empty())
        .then(|| emit::emit_file(&emitted, &model.imports, &model.copy_through));
    let diagnostics = diags.into_vec();

    if options.strict && model.stub_attempts > 0 && file.is_none() {
        return Err(GenerateError::NoInjectorsGenerated { diagnostics });
    }

    debug!(
        injectors = injectors.len(),
        diagnostics = diagnostics.len(),
        "generation finished"
    );
    Ok(Generated {
        file,
        injectors,
        diagnostics,
    })
}
