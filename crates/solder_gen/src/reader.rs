// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recognizes the marker DSL in parsed source and produces the provider
//! model.
//!
//! Marker forms are matched by fully-qualified symbol identity, not by bare
//! name: each file's `use` declarations are folded into an [`ImportMap`] so
//! aliased imports (`use solder::set as s;`, `use solder as di;`) and glob
//! imports are honored.

use std::collections::BTreeMap;

use proc_macro2::{Span, TokenStream};
use syn::parse::Parser;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::visit::Visit;
use syn::{Expr, Token, parse_quote};
use tracing::debug;

use crate::Package;
use crate::diag::{Diagnostic, DiagnosticKind, Diagnostics, Location, Related};
use crate::index::PackageIndex;
use crate::model::{
    Binding, FnShape, FunctionProvider, InjectorStub, InstanceProvider, Provider, ProviderSetDef,
    SetItem, StructProvider, TypeToken, ValueProvider,
};

/// Every name the `solder` marker crate exports; used to resolve glob
/// imports.
const MARKER_NAMES: &[&str] = &[
    "set", "build", "bind", "value", "instance", "ProviderSet", "Binding", "Cleanup", "Context",
];

/// Resolves paths appearing in one file to fully-qualified `solder` marker
/// names.
#[derive(Debug, Default)]
pub(crate) struct ImportMap {
    names: BTreeMap<String, String>,
    glob: bool,
}

impl ImportMap {
    pub(crate) fn of(file: &syn::File) -> Self {
        let mut map = Self::default();
        for item in &file.items {
            if let syn::Item::Use(item_use) = item {
                map.add_tree(&mut Vec::new(), &item_use.tree);
            }
        }
        map
    }

    fn add_tree(&mut self, prefix: &mut Vec<String>, tree: &syn::UseTree) {
        match tree {
            syn::UseTree::Path(path) => {
                prefix.push(path.ident.to_string());
                self.add_tree(prefix, &path.tree);
                prefix.pop();
            }
            syn::UseTree::Name(name) => {
                let ident = name.ident.to_string();
                self.record(prefix, &ident, &ident);
            }
            syn::UseTree::Rename(rename) => {
                self.record(prefix, &rename.ident.to_string(), &rename.rename.to_string());
            }
            syn::UseTree::Glob(_) => {
                if prefix.len() == 1 && prefix[0] == "solder" {
                    self.glob = true;
                }
            }
            syn::UseTree::Group(group) => {
                for tree in &group.items {
                    self.add_tree(prefix, tree);
                }
            }
        }
    }

    fn record(&mut self, prefix: &[String], last: &str, local: &str) {
        if prefix.is_empty() {
            if last == "solder" {
                self.names.insert(local.to_owned(), "solder".to_owned());
            }
        } else if prefix[0] == "solder" {
            self.names.insert(local.to_owned(), format!("solder::{last}"));
        }
    }

    /// The fully-qualified marker this path denotes, if any.
    pub(crate) fn resolve(&self, path: &syn::Path) -> Option<String> {
        let mut segments: Vec<String> =
            path.segments.iter().map(|s| s.ident.to_string()).collect();
        let first = segments.first()?.clone();
        if let Some(target) = self.names.get(&first) {
            if target == "solder" {
                segments[0] = "solder".to_owned();
            } else if segments.len() == 1 {
                return Some(target.clone());
            }
        }
        if segments.len() >= 2 && segments[0] == "solder" {
            let last = segments.last().expect("segments is non-empty");
            return Some(format!("solder::{last}"));
        }
        if segments.len() == 1 && self.glob && MARKER_NAMES.contains(&first.as_str()) {
            return Some(format!("solder::{first}"));
        }
        None
    }
}

/// One package file plus its derived per-file context.
#[derive(Debug)]
pub(crate) struct ParsedFile {
    pub name: String,
    pub text: String,
    pub ast: syn::File,
    pub imports: ImportMap,
    pub wireinject: bool,
}

/// Everything extracted from one package: the declaration index, parsed
/// named sets, injector stubs, and the copy-through material from
/// stub-bearing files.
#[derive(Debug)]
pub(crate) struct PackageModel {
    pub index: PackageIndex,
    pub sets: BTreeMap<String, ProviderSetDef>,
    pub stubs: Vec<InjectorStub>,
    /// Stub-shaped functions detected, including ones whose parsing failed;
    /// feeds the strict-mode decision.
    pub stub_attempts: usize,
    pub copy_through: Vec<String>,
    pub imports: Vec<syn::ItemUse>,
}

pub(crate) fn read_package(package: &Package, diags: &mut Diagnostics) -> PackageModel {
    let files: Vec<ParsedFile> = package
        .files
        .iter()
        .map(|file| ParsedFile {
            name: file.name.clone(),
            text: file.text.clone(),
            ast: file.ast.clone(),
            imports: ImportMap::of(&file.ast),
            wireinject: is_wireinject(&file.ast),
        })
        .collect();

    let index = PackageIndex::build(&files);

    let mut sets = BTreeMap::new();
    for raw in &index.raw_sets {
        let file = &files[raw.file];
        let def = parse_set_args(
            &raw.tokens,
            Some(raw.name.clone()),
            raw.location.clone(),
            file,
            &index,
            diags,
        );
        sets.insert(raw.name.clone(), def);
    }

    let mut stubs = Vec::new();
    let mut stub_attempts = 0;
    let mut copy_through = Vec::new();
    let mut imports = Vec::new();

    for file in &files {
        if !file.wireinject {
            continue;
        }
        for item in &file.ast.items {
            match item {
                syn::Item::Use(item_use) => imports.push(item_use.clone()),
                syn::Item::Fn(item_fn) => {
                    if let Some((tokens, span)) = stub_body(item_fn, &file.imports) {
                        stub_attempts += 1;
                        if let Some(stub) = parse_stub(item_fn, &tokens, span, file, &index, diags)
                        {
                            debug!(injector = %stub.name, file = %file.name, "found injector stub");
                            stubs.push(stub);
                        }
                    } else {
                        copy_through.push(item_text(&file.text, item));
                    }
                }
                other => copy_through.push(item_text(&file.text, other)),
            }
        }
    }

    debug!(
        files = files.len(),
        sets = sets.len(),
        stubs = stubs.len(),
        copied = copy_through.len(),
        "package read"
    );

    PackageModel {
        index,
        sets,
        stubs,
        stub_attempts,
        copy_through,
        imports,
    }
}

fn is_wireinject(file: &syn::File) -> bool {
    file.attrs.iter().any(|attr| {
        matches!(attr.style, syn::AttrStyle::Inner(_))
            && attr.path().is_ident("cfg")
            && attr
                .parse_args::<syn::Path>()
                .is_ok_and(|path| path.is_ident("wireinject"))
    })
}

/// Matches the two accepted stub bodies: a lone `build!` tail, or a `build!`
/// statement followed by a discarding panic-style macro.
pub(crate) fn stub_body(
    item_fn: &syn::ItemFn,
    imports: &ImportMap,
) -> Option<(TokenStream, Span)> {
    fn stmt_macro(stmt: &syn::Stmt) -> Option<&syn::Macro> {
        match stmt {
            syn::Stmt::Macro(stmt_macro) => Some(&stmt_macro.mac),
            syn::Stmt::Expr(Expr::Macro(expr_macro), _) => Some(&expr_macro.mac),
            _ => None,
        }
    }

    let build = |mac: &syn::Macro| -> Option<(TokenStream, Span)> {
        (imports.resolve(&mac.path).as_deref() == Some("solder::build"))
            .then(|| (mac.tokens.clone(), mac.span()))
    };

    match item_fn.block.stmts.as_slice() {
        [only] => build(stmt_macro(only)?),
        [first, last] => {
            let tokens = build(stmt_macro(first)?)?;
            let discard = stmt_macro(last)?;
            let name = discard.path.segments.last()?.ident.to_string();
            matches!(name.as_str(), "unreachable" | "todo" | "unimplemented" | "panic")
                .then_some(tokens)
        }
        _ => None,
    }
}

/// Classifies a function or injector signature into one of the four
/// permitted shapes.
pub(crate) fn classify_signature(
    sig: &syn::Signature,
    imports: &ImportMap,
) -> Result<FnShape, String> {
    if sig.asyncness.is_some() {
        return Err("async functions are not supported".to_owned());
    }
    if !sig.generics.params.is_empty() {
        return Err("generic functions are not supported".to_owned());
    }
    if sig.variadic.is_some() {
        return Err("variadic functions are not supported".to_owned());
    }

    let mut inputs = Vec::new();
    for arg in &sig.inputs {
        match arg {
            syn::FnArg::Receiver(_) => return Err("methods cannot be providers".to_owned()),
            syn::FnArg::Typed(typed) => {
                let name = match &*typed.pat {
                    syn::Pat::Ident(pat) => Some(pat.ident.to_string()),
                    _ => None,
                };
                inputs.push((name, TypeToken::of(&typed.ty)));
            }
        }
    }

    let syn::ReturnType::Type(_, ty) = &sig.output else {
        return Err("a value must be returned".to_owned());
    };
    let (payload, error) = match split_result(ty) {
        Some((ok, err)) => (ok, Some(TypeToken::of(err))),
        None => (&**ty, None),
    };
    let (output, cleanup) = match payload {
        syn::Type::Tuple(tuple) if tuple.elems.is_empty() => {
            return Err("a value must be returned".to_owned());
        }
        syn::Type::Tuple(tuple) => {
            if tuple.elems.len() == 2 && is_cleanup_type(&tuple.elems[1], imports) {
                (TypeToken::of(&tuple.elems[0]), Some(tuple.elems[1].clone()))
            } else {
                return Err("a tuple return must be `(T, Cleanup)`".to_owned());
            }
        }
        other => (TypeToken::of(other), None),
    };

    Ok(FnShape {
        inputs,
        output,
        cleanup,
        error,
    })
}

fn split_result(ty: &syn::Type) -> Option<(&syn::Type, &syn::Type)> {
    let syn::Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    let mut types = args.args.iter().filter_map(|arg| match arg {
        syn::GenericArgument::Type(ty) => Some(ty),
        _ => None,
    });
    let ok = types.next()?;
    let err = types.next()?;
    if types.next().is_some() {
        return None;
    }
    Some((ok, err))
}

fn is_cleanup_type(ty: &syn::Type, imports: &ImportMap) -> bool {
    match ty {
        syn::Type::Path(path) if path.qself.is_none() => {
            imports.resolve(&path.path).as_deref() == Some("solder::Cleanup")
        }
        _ => false,
    }
}

fn parse_stub(
    item_fn: &syn::ItemFn,
    tokens: &TokenStream,
    build_span: Span,
    file: &ParsedFile,
    index: &PackageIndex,
    diags: &mut Diagnostics,
) -> Option<InjectorStub> {
    let name = item_fn.sig.ident.to_string();
    let location = Location::from_span(&file.name, item_fn.sig.ident.span());

    let shape = match classify_signature(&item_fn.sig, &file.imports) {
        Ok(shape) => shape,
        Err(reason) => {
            diags.push(Diagnostic::new(
                DiagnosticKind::DslMisuse {
                    reason: format!("injector `{name}` has an unsupported signature: {reason}"),
                },
                location,
            ));
            return None;
        }
    };
    if shape.inputs.iter().any(|(name, _)| name.is_none()) {
        diags.push(Diagnostic::new(
            DiagnosticKind::DslMisuse {
                reason: format!("injector `{name}` parameters must be plain identifiers"),
            },
            location,
        ));
        return None;
    }

    let before = diags.len();
    let set = parse_set_args(
        tokens,
        None,
        Location::from_span(&file.name, build_span),
        file,
        index,
        diags,
    );
    Some(InjectorStub {
        name,
        attrs: item_fn.attrs.clone(),
        vis: item_fn.vis.clone(),
        sig: item_fn.sig.clone(),
        shape,
        set,
        poisoned: diags.len() > before,
        location,
    })
}

/// Slices the declaration's exact source text for verbatim copy-through,
/// falling back to re-rendering when span information is unavailable.
fn item_text(text: &str, item: &syn::Item) -> String {
    let range = item.span().byte_range();
    if range.start < range.end && range.end <= text.len() {
        text[range].trim_end().to_owned()
    } else {
        let file = syn::File {
            shebang: None,
            attrs: Vec::new(),
            items: vec![item.clone()],
        };
        prettyplease::unparse(&file).trim_end().to_owned()
    }
}

pub(crate) fn parse_set_args(
    tokens: &TokenStream,
    name: Option<String>,
    location: Location,
    file: &ParsedFile,
    index: &PackageIndex,
    diags: &mut Diagnostics,
) -> ProviderSetDef {
    let parser = Punctuated::<Expr, Token![,]>::parse_terminated;
    let args = match parser.parse2(tokens.clone()) {
        Ok(args) => args,
        Err(error) => {
            diags.push(Diagnostic::new(
                DiagnosticKind::DslMisuse {
                    reason: format!("malformed set arguments: {error}"),
                },
                location.clone(),
            ));
            Punctuated::new()
        }
    };

    let mut items = Vec::new();
    for expr in &args {
        if let Some(item) = parse_set_item(expr, file, index, diags) {
            items.push(item);
        }
    }
    ProviderSetDef {
        name,
        items,
        location,
    }
}

fn parse_set_item(
    expr: &Expr,
    file: &ParsedFile,
    index: &PackageIndex,
    diags: &mut Diagnostics,
) -> Option<SetItem> {
    let location = Location::from_span(&file.name, expr.span());
    match expr {
        Expr::Paren(paren) => parse_set_item(&paren.expr, file, index, diags),
        Expr::Path(path_expr) => {
            parse_provider_reference(path_expr, location, index, diags)
        }
        Expr::Struct(struct_expr) => parse_struct_provider(struct_expr, location, index, diags),
        Expr::Call(call) => parse_marker_call(call, location, file, diags),
        Expr::Macro(expr_macro) => {
            if file.imports.resolve(&expr_macro.mac.path).as_deref() == Some("solder::set") {
                Some(SetItem::Nested(parse_set_args(
                    &expr_macro.mac.tokens,
                    None,
                    location,
                    file,
                    index,
                    diags,
                )))
            } else {
                diags.push(Diagnostic::new(
                    DiagnosticKind::DslMisuse {
                        reason: "only `set!` macro invocations may appear in a set".to_owned(),
                    },
                    location,
                ));
                None
            }
        }
        _ => {
            diags.push(Diagnostic::new(
                DiagnosticKind::DslMisuse {
                    reason: "set arguments must be provider references, struct literals, \
                             bindings, values, instances, or sets"
                        .to_owned(),
                },
                location,
            ));
            None
        }
    }
}

fn parse_provider_reference(
    path_expr: &syn::ExprPath,
    location: Location,
    index: &PackageIndex,
    diags: &mut Diagnostics,
) -> Option<SetItem> {
    let segment = path_expr.path.segments.last()?;
    let ident = segment.ident.to_string();

    if index.set_names.contains(&ident) {
        return Some(SetItem::SetRef {
            name: ident,
            location,
        });
    }
    let Some(decl) = index.fns.get(&ident) else {
        diags.push(Diagnostic::new(
            DiagnosticKind::DslMisuse {
                reason: format!(
                    "`{ident}` does not name a provider function or provider set in this package"
                ),
            },
            location,
        ));
        return None;
    };
    match &decl.shape {
        Ok(shape) => Some(SetItem::Provider(Provider::Function(FunctionProvider {
            path: path_expr.path.clone(),
            name: ident,
            shape: shape.clone(),
            location: decl.location.clone(),
        }))),
        Err(reason) => {
            diags.push(
                Diagnostic::new(
                    DiagnosticKind::BadShape {
                        name: ident,
                        reason: reason.clone(),
                    },
                    decl.location.clone(),
                )
                .with_related(vec![Related {
                    location,
                    note: "referenced by this set".to_owned(),
                }]),
            );
            None
        }
    }
}

fn parse_struct_provider(
    struct_expr: &syn::ExprStruct,
    location: Location,
    index: &PackageIndex,
    diags: &mut Diagnostics,
) -> Option<SetItem> {
    if !struct_expr.fields.is_empty() || struct_expr.rest.is_some() {
        diags.push(Diagnostic::new(
            DiagnosticKind::DslMisuse {
                reason: "a struct provider literal must be empty; its fields are filled from \
                         providers"
                    .to_owned(),
            },
            location,
        ));
        return None;
    }
    let segment = struct_expr.path.segments.last()?;
    let ident = segment.ident.to_string();
    let Some(decl) = index.structs.get(&ident) else {
        diags.push(Diagnostic::new(
            DiagnosticKind::DslMisuse {
                reason: format!("`{ident}` does not name a struct in this package"),
            },
            location,
        ));
        return None;
    };
    match &decl.fields {
        Ok(fields) => {
            let ty = syn::Type::Path(syn::TypePath {
                qself: None,
                path: struct_expr.path.clone(),
            });
            Some(SetItem::Provider(Provider::Struct(StructProvider {
                path: struct_expr.path.clone(),
                ty: TypeToken::of(&ty),
                fields: fields.clone(),
                location: decl.location.clone(),
            })))
        }
        Err(reason) => {
            diags.push(
                Diagnostic::new(
                    DiagnosticKind::DslMisuse {
                        reason: format!("`{ident}` cannot back a struct provider: {reason}"),
                    },
                    location,
                )
                .with_related(vec![Related {
                    location: decl.location.clone(),
                    note: "declared here".to_owned(),
                }]),
            );
            None
        }
    }
}

fn parse_marker_call(
    call: &syn::ExprCall,
    location: Location,
    file: &ParsedFile,
    diags: &mut Diagnostics,
) -> Option<SetItem> {
    let misuse = |diags: &mut Diagnostics, reason: String, location: Location| {
        diags.push(Diagnostic::new(DiagnosticKind::DslMisuse { reason }, location));
    };

    let Expr::Path(func) = &*call.func else {
        misuse(
            diags,
            "set arguments may only call the `bind`, `value`, and `instance` markers".to_owned(),
            location,
        );
        return None;
    };
    let Some(marker) = file.imports.resolve(&func.path) else {
        misuse(
            diags,
            "set arguments may only call the `bind`, `value`, and `instance` markers".to_owned(),
            location,
        );
        return None;
    };
    match marker.as_str() {
        "solder::bind" => parse_binding(call, func, location, diags),
        "solder::value" => parse_value(call, func, location, diags),
        "solder::instance" => parse_instance(call, func, location, diags),
        other => {
            misuse(diags, format!("`{other}` cannot appear in a set"), location);
            None
        }
    }
}

fn type_arguments(func: &syn::ExprPath) -> Vec<&syn::Type> {
    let Some(segment) = func.path.segments.last() else {
        return Vec::new();
    };
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_binding(
    call: &syn::ExprCall,
    func: &syn::ExprPath,
    location: Location,
    diags: &mut Diagnostics,
) -> Option<SetItem> {
    let types = type_arguments(func);
    if types.len() != 2 || !call.args.is_empty() {
        diags.push(Diagnostic::new(
            DiagnosticKind::DslMisuse {
                reason: "a binding is declared as `bind::<dyn Iface, Concrete>()`".to_owned(),
            },
            location,
        ));
        return None;
    }
    let iface = TypeToken::of(types[0]);
    if iface.trait_name().is_none() {
        diags.push(Diagnostic::new(
            DiagnosticKind::BadBinding {
                reason: format!("`{iface}` is not an interface; bind a trait object (`dyn Iface`)"),
            },
            location,
        ));
        return None;
    }
    let concrete = TypeToken::of(types[1]);
    Some(SetItem::Binding(Binding {
        iface,
        concrete,
        location,
    }))
}

fn parse_value(
    call: &syn::ExprCall,
    func: &syn::ExprPath,
    location: Location,
    diags: &mut Diagnostics,
) -> Option<SetItem> {
    if call.args.len() != 1 {
        diags.push(Diagnostic::new(
            DiagnosticKind::DslMisuse {
                reason: "`value` takes exactly one expression".to_owned(),
            },
            location,
        ));
        return None;
    }
    let expr = call.args.first().expect("length checked above").clone();
    if let Some(what) = find_call(&expr) {
        diags.push(Diagnostic::new(
            DiagnosticKind::BadValueExpr {
                reason: format!("the expression contains {what}"),
            },
            location,
        ));
        return None;
    }
    let types = type_arguments(func);
    let output = if let Some(ty) = types.first() {
        TypeToken::of(ty)
    } else if let Expr::Struct(struct_expr) = &expr {
        let ty = syn::Type::Path(syn::TypePath {
            qself: None,
            path: struct_expr.path.clone(),
        });
        TypeToken::of(&ty)
    } else {
        diags.push(Diagnostic::new(
            DiagnosticKind::DslMisuse {
                reason: "cannot determine the value's type; spell it with `value::<T>(…)`"
                    .to_owned(),
            },
            location,
        ));
        return None;
    };
    Some(SetItem::Provider(Provider::Value(ValueProvider {
        output,
        expr,
        location,
    })))
}

fn parse_instance(
    call: &syn::ExprCall,
    func: &syn::ExprPath,
    location: Location,
    diags: &mut Diagnostics,
) -> Option<SetItem> {
    let types = type_arguments(func);
    let iface_ty = match types.first() {
        Some(ty) if TypeToken::of(ty).trait_name().is_some() => (*ty).clone(),
        _ => {
            diags.push(Diagnostic::new(
                DiagnosticKind::DslMisuse {
                    reason: "an instance is declared as `instance::<dyn Iface, _>(concrete)`"
                        .to_owned(),
                },
                location,
            ));
            return None;
        }
    };
    if call.args.len() != 1 {
        diags.push(Diagnostic::new(
            DiagnosticKind::DslMisuse {
                reason: "`instance` takes exactly one expression".to_owned(),
            },
            location,
        ));
        return None;
    }
    let expr = call.args.first().expect("length checked above").clone();
    if let Some(what) = find_call(&expr) {
        diags.push(Diagnostic::new(
            DiagnosticKind::BadValueExpr {
                reason: format!("the expression contains {what}"),
            },
            location,
        ));
        return None;
    }
    let boxed: syn::Type = parse_quote!(Box<#iface_ty>);
    Some(SetItem::Provider(Provider::Instance(InstanceProvider {
        output: TypeToken::of(&boxed),
        expr,
        location,
    })))
}

/// Finds the first call-like construct in a value expression, if any.
fn find_call(expr: &Expr) -> Option<&'static str> {
    struct CallFinder {
        found: Option<&'static str>,
    }
    impl<'ast> Visit<'ast> for CallFinder {
        fn visit_expr_call(&mut self, node: &'ast syn::ExprCall) {
            self.found.get_or_insert("a call");
            syn::visit::visit_expr_call(self, node);
        }
        fn visit_expr_method_call(&mut self, node: &'ast syn::ExprMethodCall) {
            self.found.get_or_insert("a method call");
            syn::visit::visit_expr_method_call(self, node);
        }
        fn visit_macro(&mut self, node: &'ast syn::Macro) {
            self.found.get_or_insert("a macro invocation");
            syn::visit::visit_macro(self, node);
        }
    }

    let mut finder = CallFinder { found: None };
    finder.visit_expr(expr);
    finder.found
}

#[cfg(test)]
mod tests {
    use syn::parse_quote;

    use super::*;

    fn imports_of(file: syn::File) -> ImportMap {
        ImportMap::of(&file)
    }

    #[test]
    fn direct_paths_resolve_without_imports() {
        let imports = imports_of(parse_quote! {});
        let path: syn::Path = parse_quote!(solder::set);
        assert_eq!(imports.resolve(&path).as_deref(), Some("solder::set"));
    }

    #[test]
    fn named_imports_and_renames_resolve() {
        let imports = imports_of(parse_quote! {
            use solder::set;
            use solder::{bind, value as val};
        });
        assert_eq!(
            imports.resolve(&parse_quote!(set)).as_deref(),
            Some("solder::set")
        );
        assert_eq!(
            imports.resolve(&parse_quote!(bind)).as_deref(),
            Some("solder::bind")
        );
        assert_eq!(
            imports.resolve(&parse_quote!(val)).as_deref(),
            Some("solder::value")
        );
        assert_eq!(imports.resolve(&parse_quote!(value)), None);
    }

    #[test]
    fn crate_alias_resolves() {
        let imports = imports_of(parse_quote! {
            use solder as di;
        });
        assert_eq!(
            imports.resolve(&parse_quote!(di::build)).as_deref(),
            Some("solder::build")
        );
    }

    #[test]
    fn glob_imports_resolve_marker_names_only() {
        let imports = imports_of(parse_quote! {
            use solder::*;
        });
        assert_eq!(
            imports.resolve(&parse_quote!(build)).as_deref(),
            Some("solder::build")
        );
        assert_eq!(imports.resolve(&parse_quote!(provide_foo)), None);
    }

    #[test]
    fn foreign_names_do_not_resolve() {
        let imports = imports_of(parse_quote! {
            use other::set;
        });
        assert_eq!(imports.resolve(&parse_quote!(set)), None);
    }

    #[test]
    fn classify_accepts_the_four_shapes() {
        let imports = imports_of(parse_quote! {
            use solder::Cleanup;
        });

        let plain: syn::Signature = parse_quote!(fn provide_foo() -> Foo);
        let shape = classify_signature(&plain, &imports).expect("plain shape");
        assert!(shape.error.is_none() && shape.cleanup.is_none());
        assert_eq!(shape.output.key(), "Foo");

        let fallible: syn::Signature = parse_quote!(fn provide_bar(foo: Foo) -> Result<Bar, Error>);
        let shape = classify_signature(&fallible, &imports).expect("fallible shape");
        assert_eq!(shape.error.expect("error").key(), "Error");

        let cleanup: syn::Signature = parse_quote!(fn provide_file() -> (File, Cleanup));
        let shape = classify_signature(&cleanup, &imports).expect("cleanup shape");
        assert!(shape.cleanup.is_some());

        let both: syn::Signature =
            parse_quote!(fn provide_conn() -> Result<(Conn, Cleanup), Error>);
        let shape = classify_signature(&both, &imports).expect("full shape");
        assert!(shape.cleanup.is_some() && shape.error.is_some());
        assert_eq!(shape.output.key(), "Conn");
    }

    #[test]
    fn classify_rejects_other_shapes() {
        let imports = imports_of(parse_quote! {
            use solder::Cleanup;
        });

        let no_return: syn::Signature = parse_quote!(fn side_effect());
        assert!(classify_signature(&no_return, &imports).is_err());

        let bad_tuple: syn::Signature = parse_quote!(fn pair() -> (Foo, Bar));
        assert!(
            classify_signature(&bad_tuple, &imports)
                .unwrap_err()
                .contains("(T, Cleanup)")
        );

        let asynchronous: syn::Signature = parse_quote!(async fn provide() -> Foo);
        assert!(classify_signature(&asynchronous, &imports).is_err());

        let generic: syn::Signature = parse_quote!(fn provide<T>() -> T);
        assert!(classify_signature(&generic, &imports).is_err());
    }

    #[test]
    fn cleanup_recognition_respects_imports() {
        let without: syn::Signature = parse_quote!(fn provide_file() -> (File, Cleanup));
        let imports = imports_of(parse_quote! {});
        // `Cleanup` does not resolve to the marker crate, so the tuple is
        // rejected rather than treated as a cleanup shape.
        assert!(classify_signature(&without, &imports).is_err());
    }

    #[test]
    fn value_expressions_reject_calls() {
        assert_eq!(find_call(&parse_quote!(Foo { x: 42 })), None);
        assert_eq!(find_call(&parse_quote!(make_foo())), Some("a call"));
        assert_eq!(find_call(&parse_quote!(foo.bar())), Some("a method call"));
        assert_eq!(
            find_call(&parse_quote!(vec![1, 2])),
            Some("a macro invocation")
        );
        assert_eq!(find_call(&parse_quote!(Foo { x: CONFIG_X })), None);
    }

    #[test]
    fn stub_bodies_match_both_accepted_forms() {
        let imports = imports_of(parse_quote! {});

        let tail: syn::ItemFn = parse_quote! {
            fn init() -> Foo {
                solder::build!(APP_SET)
            }
        };
        assert!(stub_body(&tail, &imports).is_some());

        let discarding: syn::ItemFn = parse_quote! {
            fn init() -> Foo {
                solder::build!(APP_SET);
                unreachable!()
            }
        };
        assert!(stub_body(&discarding, &imports).is_some());

        let ordinary: syn::ItemFn = parse_quote! {
            fn init() -> Foo {
                Foo { x: 1 }
            }
        };
        assert!(stub_body(&ordinary, &imports).is_none());
    }
}
