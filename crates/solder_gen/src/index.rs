// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Package-local type information: function signatures, struct field lists,
//! trait implementations, and raw set declarations.
//!
//! This plays the role of the host type-checker's output for the single
//! package being generated: enough nominal information to classify provider
//! shapes, fill struct literals, and judge interface satisfaction.

use std::collections::{HashMap, HashSet};

use proc_macro2::TokenStream;

use crate::diag::Location;
use crate::model::{FnShape, TypeToken};
use crate::reader::{ImportMap, ParsedFile, classify_signature, stub_body};

/// A top-level function declaration, shape-classified lazily: the error is
/// only reported if a set actually references the function.
#[derive(Clone, Debug)]
pub(crate) struct FnDecl {
    pub shape: Result<FnShape, String>,
    pub location: Location,
}

/// A top-level struct declaration.
#[derive(Clone, Debug)]
pub(crate) struct StructDecl {
    /// Field name and type in declaration order, or why the struct cannot
    /// back a struct provider.
    pub fields: Result<Vec<(syn::Ident, TypeToken)>, String>,
    pub location: Location,
}

/// An unparsed `set!` declaration: the macro tokens plus the file context
/// needed to parse them later.
#[derive(Clone, Debug)]
pub(crate) struct RawSet {
    pub name: String,
    pub tokens: TokenStream,
    /// Index of the declaring file within the package.
    pub file: usize,
    pub location: Location,
}

/// Everything the resolver needs to know about the package's declarations.
#[derive(Debug, Default)]
pub(crate) struct PackageIndex {
    pub fns: HashMap<String, FnDecl>,
    pub structs: HashMap<String, StructDecl>,
    /// `(trait name, concrete type key)` pairs from `impl Trait for Type`.
    pub impls: HashSet<(String, String)>,
    pub raw_sets: Vec<RawSet>,
    pub set_names: HashSet<String>,
}

impl PackageIndex {
    /// Scans every file of the package. Injector stubs are excluded from the
    /// function index; every other top-level declaration is recorded.
    pub(crate) fn build(files: &[ParsedFile]) -> Self {
        let mut index = Self::default();
        for (file_idx, file) in files.iter().enumerate() {
            index.collect_file(file_idx, file);
        }
        tracing::debug!(
            functions = index.fns.len(),
            structs = index.structs.len(),
            impls = index.impls.len(),
            sets = index.raw_sets.len(),
            "package index built"
        );
        index
    }

    fn collect_file(&mut self, file_idx: usize, file: &ParsedFile) {
        for item in &file.ast.items {
            match item {
                syn::Item::Fn(item_fn) => {
                    if file.wireinject && stub_body(item_fn, &file.imports).is_some() {
                        continue;
                    }
                    self.fns.insert(
                        item_fn.sig.ident.to_string(),
                        FnDecl {
                            shape: classify_signature(&item_fn.sig, &file.imports),
                            location: Location::from_span(&file.name, item_fn.sig.ident.span()),
                        },
                    );
                }
                syn::Item::Struct(item_struct) => {
                    self.structs.insert(
                        item_struct.ident.to_string(),
                        StructDecl {
                            fields: struct_fields(item_struct),
                            location: Location::from_span(&file.name, item_struct.ident.span()),
                        },
                    );
                }
                syn::Item::Impl(item_impl) => {
                    if let Some((None, trait_path, _)) = &item_impl.trait_
                        && let Some(segment) = trait_path.segments.last()
                    {
                        let concrete = TypeToken::of(&item_impl.self_ty);
                        self.impls
                            .insert((segment.ident.to_string(), concrete.key().to_owned()));
                    }
                }
                syn::Item::Static(item_static) => {
                    self.collect_set(
                        file_idx,
                        file,
                        &item_static.ident,
                        &item_static.expr,
                    );
                }
                syn::Item::Const(item_const) => {
                    self.collect_set(file_idx, file, &item_const.ident, &item_const.expr);
                }
                _ => {}
            }
        }
    }

    fn collect_set(
        &mut self,
        file_idx: usize,
        file: &ParsedFile,
        ident: &syn::Ident,
        expr: &syn::Expr,
    ) {
        let syn::Expr::Macro(expr_macro) = expr else {
            return;
        };
        if file.imports.resolve(&expr_macro.mac.path).as_deref() != Some("solder::set") {
            return;
        }
        let name = ident.to_string();
        self.set_names.insert(name.clone());
        self.raw_sets.push(RawSet {
            name,
            tokens: expr_macro.mac.tokens.clone(),
            file: file_idx,
            location: Location::from_span(&file.name, ident.span()),
        });
    }
}

fn struct_fields(item: &syn::ItemStruct) -> Result<Vec<(syn::Ident, TypeToken)>, String> {
    match &item.fields {
        syn::Fields::Named(named) => Ok(named
            .named
            .iter()
            .map(|field| {
                let ident = field
                    .ident
                    .clone()
                    .expect("internal error: named field without identifier");
                (ident, TypeToken::of(&field.ty))
            })
            .collect()),
        syn::Fields::Unnamed(_) => {
            Err("tuple structs cannot back a struct provider".to_owned())
        }
        syn::Fields::Unit => Ok(Vec::new()),
    }
}
