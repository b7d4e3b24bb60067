// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Typed in-memory representation of providers, sets, bindings, values, and
//! injector stubs, as extracted by the reader.

use std::fmt;
use std::hash::{Hash, Hasher};

use quote::ToTokens;
use syn::Type;

use crate::diag::Location;

/// Canonical identifier for a host type.
///
/// Equality is nominal on the rendered form: a named type is distinct from
/// its underlying structure, and `Box<dyn Store>` is distinct from `Store`.
/// The original `syn::Type` is kept alongside the key so the emitter can
/// render the type back into source.
#[derive(Clone, Debug)]
pub(crate) struct TypeToken {
    key: String,
    ty: Type,
}

impl TypeToken {
    pub(crate) fn of(ty: &Type) -> Self {
        Self {
            key: tighten(&ty.to_token_stream().to_string()),
            ty: ty.clone(),
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn ty(&self) -> &Type {
        &self.ty
    }

    /// For `Box<T>`, the token for `T`.
    pub(crate) fn boxed_inner(&self) -> Option<TypeToken> {
        let Type::Path(path) = &self.ty else {
            return None;
        };
        if path.qself.is_some() {
            return None;
        }
        let segment = path.path.segments.last()?;
        if segment.ident != "Box" {
            return None;
        }
        let syn::PathArguments::AngleBracketed(args) = &segment.arguments else {
            return None;
        };
        if args.args.len() != 1 {
            return None;
        }
        match args.args.first()? {
            syn::GenericArgument::Type(inner) => Some(TypeToken::of(inner)),
            _ => None,
        }
    }

    /// For `dyn Trait` (possibly with marker bounds), the trait's name.
    pub(crate) fn trait_name(&self) -> Option<String> {
        let Type::TraitObject(object) = &self.ty else {
            return None;
        };
        object.bounds.iter().find_map(|bound| match bound {
            syn::TypeParamBound::Trait(bound) => {
                Some(bound.path.segments.last()?.ident.to_string())
            }
            _ => None,
        })
    }

    /// For `Box<dyn Trait>`, the `dyn Trait` token: an interface request that
    /// bindings may rewrite.
    pub(crate) fn interface_request(&self) -> Option<TypeToken> {
        let inner = self.boxed_inner()?;
        inner.trait_name().is_some().then_some(inner)
    }

    /// A short name suitable for deriving a variable name.
    pub(crate) fn name_hint(&self) -> String {
        hint_of(&self.ty)
    }
}

impl PartialEq for TypeToken {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TypeToken {}

impl Hash for TypeToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

fn hint_of(ty: &Type) -> String {
    match ty {
        Type::Path(path) => {
            let Some(segment) = path.path.segments.last() else {
                return "value".to_owned();
            };
            if segment.ident == "Box"
                && let syn::PathArguments::AngleBracketed(args) = &segment.arguments
                && let Some(syn::GenericArgument::Type(inner)) = args.args.first()
            {
                return hint_of(inner);
            }
            segment.ident.to_string()
        }
        Type::TraitObject(object) => object
            .bounds
            .iter()
            .find_map(|bound| match bound {
                syn::TypeParamBound::Trait(bound) => {
                    Some(bound.path.segments.last()?.ident.to_string())
                }
                _ => None,
            })
            .unwrap_or_else(|| "value".to_owned()),
        Type::Reference(reference) => hint_of(&reference.elem),
        Type::Paren(paren) => hint_of(&paren.elem),
        Type::Group(group) => hint_of(&group.elem),
        _ => "value".to_owned(),
    }
}

/// Collapses the whitespace `TokenStream::to_string` scatters between
/// punctuation, yielding a stable, readable rendering for type keys and
/// diagnostics.
pub(crate) fn tighten(tokens: &str) -> String {
    let mut out = tokens.replace(" :: ", "::");
    for (from, to) in [
        (" < ", "<"),
        ("< ", "<"),
        (" >", ">"),
        (" ,", ","),
        ("( ", "("),
        (" )", ")"),
        ("[ ", "["),
        (" ]", "]"),
        (" ;", ";"),
        ("& ", "&"),
        (" !", "!"),
        ("! ", "!"),
        (" . ", "."),
    ] {
        out = out.replace(from, to);
    }
    out
}

/// The classified signature of a provider function or injector stub: one
/// primary output, optional cleanup, optional error.
#[derive(Clone, Debug)]
pub(crate) struct FnShape {
    pub inputs: Vec<(Option<String>, TypeToken)>,
    pub output: TypeToken,
    /// The `Cleanup` type as written in the signature, when present.
    pub cleanup: Option<Type>,
    pub error: Option<TypeToken>,
}

/// A provider backed by a named function.
#[derive(Clone, Debug)]
pub(crate) struct FunctionProvider {
    /// The path used to reference the function in the set, reused verbatim
    /// for the emitted call.
    pub path: syn::Path,
    /// The function's bare name.
    pub name: String,
    pub shape: FnShape,
    pub location: Location,
}

/// A provider backed by a struct literal; satisfies both `T` and `Box<T>`.
#[derive(Clone, Debug)]
pub(crate) struct StructProvider {
    pub path: syn::Path,
    pub ty: TypeToken,
    /// Field name and type, in declaration order.
    pub fields: Vec<(syn::Ident, TypeToken)>,
    pub location: Location,
}

/// A provider backed by a verbatim expression.
#[derive(Clone, Debug)]
pub(crate) struct ValueProvider {
    pub output: TypeToken,
    pub expr: syn::Expr,
    pub location: Location,
}

/// An interface value provider: satisfies `Box<dyn Iface>` by boxing a
/// verbatim concrete expression.
#[derive(Clone, Debug)]
pub(crate) struct InstanceProvider {
    /// The `Box<dyn Iface>` token this provider satisfies.
    pub output: TypeToken,
    pub expr: syn::Expr,
    pub location: Location,
}

/// Any producer of a value for exactly one output type (two for struct
/// providers, which also offer their boxed form).
#[derive(Clone, Debug)]
pub(crate) enum Provider {
    Function(FunctionProvider),
    Struct(StructProvider),
    Value(ValueProvider),
    Instance(InstanceProvider),
}

impl Provider {
    /// Stable identity used to collapse duplicate references to the same
    /// provider reached through different sets.
    pub(crate) fn identity(&self) -> String {
        match self {
            Provider::Function(function) => format!("fn {}", function.name),
            Provider::Struct(strukt) => format!("struct {}", strukt.ty),
            Provider::Value(value) => {
                format!("value {} = {}", value.output, value.expr.to_token_stream())
            }
            Provider::Instance(instance) => {
                format!("instance {} = {}", instance.output, instance.expr.to_token_stream())
            }
        }
    }

    /// The types this provider can satisfy.
    pub(crate) fn outputs(&self) -> Vec<TypeToken> {
        match self {
            Provider::Function(function) => vec![function.shape.output.clone()],
            Provider::Struct(strukt) => {
                let boxed: Type = {
                    let inner = strukt.ty.ty();
                    syn::parse_quote!(Box<#inner>)
                };
                vec![strukt.ty.clone(), TypeToken::of(&boxed)]
            }
            Provider::Value(value) => vec![value.output.clone()],
            Provider::Instance(instance) => vec![instance.output.clone()],
        }
    }

    pub(crate) fn location(&self) -> &Location {
        match self {
            Provider::Function(function) => &function.location,
            Provider::Struct(strukt) => &strukt.location,
            Provider::Value(value) => &value.location,
            Provider::Instance(instance) => &instance.location,
        }
    }

    /// Human-readable description for diagnostics.
    pub(crate) fn describe(&self) -> String {
        match self {
            Provider::Function(function) => format!("function provider `{}`", function.name),
            Provider::Struct(strukt) => format!("struct provider `{}`", strukt.ty),
            Provider::Value(value) => format!("value provider for `{}`", value.output),
            Provider::Instance(instance) => format!("instance provider for `{}`", instance.output),
        }
    }
}

/// A declaration that requests for `dyn Iface` are satisfied by a concrete
/// type within the enclosing set.
#[derive(Clone, Debug)]
pub(crate) struct Binding {
    /// The `dyn Iface` token.
    pub iface: TypeToken,
    pub concrete: TypeToken,
    pub location: Location,
}

/// One argument of a `set!` or `build!` constructor.
#[derive(Clone, Debug)]
pub(crate) enum SetItem {
    Provider(Provider),
    Binding(Binding),
    /// Reference to a named set declared elsewhere in the package.
    SetRef { name: String, location: Location },
    /// An inline, anonymous `set![…]`.
    Nested(ProviderSetDef),
}

/// A parsed set constructor: the arguments of one `set!` or `build!` call.
#[derive(Clone, Debug)]
pub(crate) struct ProviderSetDef {
    /// `None` for the implicit set of a `build!` call or an inline `set!`.
    pub name: Option<String>,
    pub items: Vec<SetItem>,
    pub location: Location,
}

/// A user-written injector signature paired with the set its `build!` call
/// names.
#[derive(Clone, Debug)]
pub(crate) struct InjectorStub {
    pub name: String,
    /// The original function item, minus its body; reused verbatim when the
    /// generated injector is emitted.
    pub attrs: Vec<syn::Attribute>,
    pub vis: syn::Visibility,
    pub sig: syn::Signature,
    pub shape: FnShape,
    pub set: ProviderSetDef,
    /// Whether parsing the stub's own `build!` arguments already produced
    /// diagnostics; a poisoned stub is never emitted.
    pub poisoned: bool,
    pub location: Location,
}

#[cfg(test)]
mod tests {
    use syn::parse_quote;

    use super::*;

    fn token(ty: Type) -> TypeToken {
        TypeToken::of(&ty)
    }

    #[test]
    fn keys_are_tightened() {
        assert_eq!(token(parse_quote!(Box<dyn Store>)).key(), "Box<dyn Store>");
        assert_eq!(token(parse_quote!(Result<Baz, AppError>)).key(), "Result<Baz, AppError>");
        assert_eq!(token(parse_quote!(std::path::PathBuf)).key(), "std::path::PathBuf");
    }

    #[test]
    fn equality_is_nominal_on_the_rendering() {
        assert_eq!(token(parse_quote!(Foo)), token(parse_quote!(Foo)));
        assert_ne!(token(parse_quote!(Foo)), token(parse_quote!(Box<Foo>)));
        assert_ne!(token(parse_quote!(dyn Store)), token(parse_quote!(Store)));
    }

    #[test]
    fn interface_requests_unwrap_to_the_trait_object() {
        let request = token(parse_quote!(Box<dyn Store>));
        let iface = request.interface_request().expect("interface request");
        assert_eq!(iface.key(), "dyn Store");
        assert_eq!(iface.trait_name().as_deref(), Some("Store"));

        assert!(token(parse_quote!(Box<Postgres>)).interface_request().is_none());
        assert!(token(parse_quote!(Postgres)).interface_request().is_none());
    }

    #[test]
    fn name_hints_follow_the_innermost_type() {
        assert_eq!(token(parse_quote!(FooBar)).name_hint(), "FooBar");
        assert_eq!(token(parse_quote!(Box<FooBar>)).name_hint(), "FooBar");
        assert_eq!(token(parse_quote!(Box<dyn Store>)).name_hint(), "Store");
        assert_eq!(token(parse_quote!(crate::db::Pool)).name_hint(), "Pool");
    }
}
