// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Walks a resolved graph in topological order and synthesizes the injector
//! body, then assembles the complete generated file.
//!
//! Everything here is deterministic: variable names come from the
//! topological traversal order, imports are sorted by their rendering, and
//! no map iteration feeds the output.

use std::collections::BTreeSet;

use proc_macro2::{Ident, Span, TokenStream};
use quote::{ToTokens, quote};
use syn::parse_quote;
use tracing::debug;

use crate::model::{InjectorStub, TypeToken, tighten};
use crate::resolve::{Graph, Node, NodeId, NodeKind};

/// Exact first line of every generated file.
pub(crate) const GENERATED_HEADER: &str = "// Code generated by solder. DO NOT EDIT.";

/// Allocates collision-free variable names in traversal order.
struct Namer {
    used: BTreeSet<String>,
}

impl Namer {
    fn new() -> Self {
        Self {
            used: BTreeSet::new(),
        }
    }

    fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_owned());
    }

    /// `base`, then `base2`, `base3`, … — the numbering also steps over
    /// keywords, which fail the identifier parse.
    fn fresh(&mut self, base: &str) -> Ident {
        let base = if base.is_empty() { "value" } else { base };
        let mut n = 1usize;
        loop {
            let candidate = if n == 1 {
                base.to_owned()
            } else {
                format!("{base}{n}")
            };
            if !self.used.contains(&candidate)
                && syn::parse_str::<syn::Ident>(&candidate).is_ok()
            {
                self.used.insert(candidate.clone());
                return Ident::new(&candidate, Span::call_site());
            }
            n += 1;
        }
    }
}

fn snake_case(name: &str) -> String {
    let mut out = String::new();
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn deps_of(kind: &NodeKind) -> &[NodeId] {
    match kind {
        NodeKind::Function { deps, .. } | NodeKind::Struct { deps, .. } => deps,
        NodeKind::Coercion { inner } => std::slice::from_ref(inner),
        NodeKind::Argument { .. } | NodeKind::Value { .. } | NodeKind::Instance { .. } => &[],
    }
}

/// Consumes one use of a node's variable. Every use but the last clones, so
/// shared values reach each consumer; the final use moves.
fn use_var(names: &[Ident], remaining: &mut [usize], id: NodeId) -> syn::Expr {
    remaining[id] -= 1;
    let ident = &names[id];
    if remaining[id] > 0 {
        parse_quote!(#ident.clone())
    } else {
        parse_quote!(#ident)
    }
}

/// Synthesizes the finished injector function for one resolved graph.
pub(crate) fn emit_injector(stub: &InjectorStub, graph: &Graph) -> syn::ItemFn {
    let mut namer = Namer::new();
    for (name, _) in &stub.shape.inputs {
        namer.reserve(name.as_deref().expect("stub inputs are named by the reader"));
    }

    let names: Vec<Ident> = graph
        .nodes
        .iter()
        .map(|node| match &node.kind {
            NodeKind::Argument { name } => Ident::new(name, Span::call_site()),
            _ => namer.fresh(&snake_case(&node.output.name_hint())),
        })
        .collect();

    let mut remaining = vec![0usize; graph.nodes.len()];
    for node in &graph.nodes {
        for &dep in deps_of(&node.kind) {
            remaining[dep] += 1;
        }
    }
    remaining[graph.root] += 1;

    let mut stmts: Vec<syn::Stmt> = Vec::new();
    let mut cleanups: Vec<Ident> = Vec::new();

    for (id, node) in graph.nodes.iter().enumerate() {
        emit_node(
            stub,
            node,
            id,
            &names,
            &mut remaining,
            &mut namer,
            &mut stmts,
            &mut cleanups,
        );
    }

    let root_expr = use_var(&names, &mut remaining, graph.root);
    let tail: syn::Expr = match &stub.shape.cleanup {
        Some(cleanup_ty) => {
            let aggregated = namer.fresh("cleanup");
            let stmt: syn::Stmt = if cleanups.is_empty() {
                parse_quote! { let #aggregated = #cleanup_ty::noop(); }
            } else {
                let calls: Vec<syn::Stmt> = cleanups
                    .iter()
                    .rev()
                    .map(|cleanup| parse_quote! { #cleanup.call(); })
                    .collect();
                parse_quote! { let #aggregated = #cleanup_ty::new(move || { #(#calls)* }); }
            };
            stmts.push(stmt);
            if stub.shape.error.is_some() {
                parse_quote!(Ok((#root_expr, #aggregated)))
            } else {
                parse_quote!((#root_expr, #aggregated))
            }
        }
        None => {
            if stub.shape.error.is_some() {
                parse_quote!(Ok(#root_expr))
            } else {
                root_expr
            }
        }
    };

    let block: syn::Block = parse_quote!({ #(#stmts)* #tail });
    debug!(injector = %stub.name, statements = block.stmts.len(), "injector body emitted");
    syn::ItemFn {
        attrs: stub.attrs.clone(),
        vis: stub.vis.clone(),
        sig: stub.sig.clone(),
        block: Box::new(block),
    }
}

#[expect(clippy::too_many_arguments, reason = "all of it is one emission state")]
fn emit_node(
    stub: &InjectorStub,
    node: &Node,
    id: NodeId,
    names: &[Ident],
    remaining: &mut [usize],
    namer: &mut Namer,
    stmts: &mut Vec<syn::Stmt>,
    cleanups: &mut Vec<Ident>,
) {
    let var = names[id].clone();
    match &node.kind {
        NodeKind::Argument { .. } => {}
        NodeKind::Function { provider, deps } => {
            let path = &provider.path;
            let args: Vec<syn::Expr> = deps
                .iter()
                .map(|&dep| use_var(names, remaining, dep))
                .collect();
            let call: syn::Expr = parse_quote!(#path(#(#args),*));

            let cleanup_var = provider
                .shape
                .cleanup
                .is_some()
                .then(|| namer.fresh(&format!("{var}_cleanup")));

            let stmt: syn::Stmt = if provider.shape.error.is_some() {
                if cleanups.is_empty() {
                    // `?` performs the conversion into the injector's error.
                    match &cleanup_var {
                        None => parse_quote! { let #var = #call?; },
                        Some(cleanup) => parse_quote! { let (#var, #cleanup) = #call?; },
                    }
                } else {
                    let unwind: Vec<syn::Stmt> = cleanups
                        .iter()
                        .rev()
                        .map(|cleanup| parse_quote! { #cleanup.call(); })
                        .collect();
                    let same_error = provider.shape.error.as_ref().map(TypeToken::key)
                        == stub.shape.error.as_ref().map(TypeToken::key);
                    let err: syn::Expr = if same_error {
                        parse_quote!(err)
                    } else {
                        parse_quote!(err.into())
                    };
                    match &cleanup_var {
                        None => parse_quote! {
                            let #var = match #call {
                                Ok(value) => value,
                                Err(err) => {
                                    #(#unwind)*
                                    return Err(#err);
                                }
                            };
                        },
                        Some(cleanup) => parse_quote! {
                            let (#var, #cleanup) = match #call {
                                Ok(value) => value,
                                Err(err) => {
                                    #(#unwind)*
                                    return Err(#err);
                                }
                            };
                        },
                    }
                }
            } else {
                match &cleanup_var {
                    None => parse_quote! { let #var = #call; },
                    Some(cleanup) => parse_quote! { let (#var, #cleanup) = #call; },
                }
            };
            stmts.push(stmt);
            if let Some(cleanup) = cleanup_var {
                cleanups.push(cleanup);
            }
        }
        NodeKind::Struct {
            provider,
            boxed,
            deps,
        } => {
            let path = &provider.path;
            let fields: Vec<TokenStream> = provider
                .fields
                .iter()
                .zip(deps)
                .map(|((field, _), &dep)| {
                    let expr = use_var(names, remaining, dep);
                    if let syn::Expr::Path(path) = &expr
                        && path.path.is_ident(field)
                    {
                        quote!(#field)
                    } else {
                        quote!(#field: #expr)
                    }
                })
                .collect();
            let literal: syn::Expr = parse_quote!(#path { #(#fields),* });
            let stmt: syn::Stmt = if *boxed {
                parse_quote! { let #var = Box::new(#literal); }
            } else {
                parse_quote! { let #var = #literal; }
            };
            stmts.push(stmt);
        }
        NodeKind::Value { provider } => {
            let expr = &provider.expr;
            let stmt: syn::Stmt = if matches!(expr, syn::Expr::Struct(_)) {
                parse_quote! { let #var = #expr; }
            } else {
                let ty = node.output.ty();
                parse_quote! { let #var: #ty = #expr; }
            };
            stmts.push(stmt);
        }
        NodeKind::Instance { provider } => {
            let ty = node.output.ty();
            let expr = &provider.expr;
            stmts.push(parse_quote! { let #var: #ty = Box::new(#expr); });
        }
        NodeKind::Coercion { inner } => {
            let ty = node.output.ty();
            let expr = use_var(names, remaining, *inner);
            stmts.push(parse_quote! { let #var: #ty = Box::new(#expr); });
        }
    }
}

/// Assembles the generated file: header, inverse build directive, the import
/// block actually needed by the output, the injectors, and the copy-through
/// declarations spliced verbatim.
pub(crate) fn emit_file(
    fns: &[syn::ItemFn],
    imports: &[syn::ItemUse],
    copy_through: &[String],
) -> String {
    let mut used_idents = BTreeSet::new();
    for item in fns {
        collect_idents(&item.to_token_stream().to_string(), &mut used_idents);
    }
    for text in copy_through {
        collect_idents(text, &mut used_idents);
    }

    let mut kept: Vec<(String, syn::ItemUse)> = Vec::new();
    for import in imports {
        let mut names = Vec::new();
        let mut glob = false;
        bound_names(&import.tree, &mut names, &mut glob);
        if glob || names.iter().any(|name| used_idents.contains(name)) {
            let rendered = tighten(&import.to_token_stream().to_string());
            kept.push((rendered, import.clone()));
        }
    }
    kept.sort_by(|a, b| a.0.cmp(&b.0));
    kept.dedup_by(|a, b| a.0 == b.0);

    let file = syn::File {
        shebang: None,
        attrs: Vec::new(),
        items: kept
            .into_iter()
            .map(|(_, import)| syn::Item::Use(import))
            .chain(fns.iter().cloned().map(syn::Item::Fn))
            .collect(),
    };
    let body = prettyplease::unparse(&file);

    let mut out = String::with_capacity(body.len() + 256);
    out.push_str(GENERATED_HEADER);
    out.push('\n');
    out.push_str("#![cfg(not(wireinject))]\n\n");
    out.push_str(&body);
    for text in copy_through {
        out.push('\n');
        out.push_str(text);
        out.push('\n');
    }
    out
}

fn collect_idents(text: &str, out: &mut BTreeSet<String>) {
    for word in text.split(|ch: char| !(ch.is_alphanumeric() || ch == '_')) {
        if word
            .chars()
            .next()
            .is_some_and(|ch| ch.is_alphabetic() || ch == '_')
        {
            out.insert(word.to_owned());
        }
    }
}

fn bound_names(tree: &syn::UseTree, names: &mut Vec<String>, glob: &mut bool) {
    match tree {
        syn::UseTree::Path(path) => bound_names(&path.tree, names, glob),
        syn::UseTree::Name(name) => names.push(name.ident.to_string()),
        syn::UseTree::Rename(rename) => names.push(rename.rename.to_string()),
        syn::UseTree::Glob(_) => *glob = true,
        syn::UseTree::Group(group) => {
            for tree in &group.items {
                bound_names(tree, names, glob);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_splits_on_uppercase() {
        assert_eq!(snake_case("Foo"), "foo");
        assert_eq!(snake_case("FooBar"), "foo_bar");
        assert_eq!(snake_case("Parser2"), "parser2");
    }

    #[test]
    fn namer_disambiguates_with_numeric_suffixes() {
        let mut namer = Namer::new();
        namer.reserve("foo");
        assert_eq!(namer.fresh("foo").to_string(), "foo2");
        assert_eq!(namer.fresh("foo").to_string(), "foo3");
        assert_eq!(namer.fresh("bar").to_string(), "bar");
    }

    #[test]
    fn namer_steps_over_keywords() {
        let mut namer = Namer::new();
        assert_eq!(namer.fresh("type").to_string(), "type2");
    }

    #[test]
    fn ident_collection_skips_numbers() {
        let mut out = BTreeSet::new();
        collect_idents("let foo = Foo { x: 42 };", &mut out);
        assert!(out.contains("foo"));
        assert!(out.contains("Foo"));
        assert!(out.contains("x"));
        assert!(!out.contains("42"));
    }
}
