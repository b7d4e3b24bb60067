// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-injector dependency resolution: builds an acyclic graph from the
//! injector's declared output back to its inputs, selecting exactly one
//! provider per required type.
//!
//! Resolution does not short-circuit: every reachable problem is reported in
//! one pass. Node ids are assigned in completion order, so the `nodes`
//! vector is already a deterministic topological order (dependencies before
//! dependents, ties broken by the order each type was first required).

use std::collections::HashMap;

use tracing::trace;

use crate::Options;
use crate::diag::{Diagnostic, DiagnosticKind, Diagnostics, Location, Related};
use crate::flatten::Effective;
use crate::index::PackageIndex;
use crate::model::{
    FunctionProvider, InjectorStub, InstanceProvider, Provider, StructProvider, TypeToken,
    ValueProvider,
};

pub(crate) type NodeId = usize;

/// One resolved step of the injector body.
#[derive(Debug)]
pub(crate) enum NodeKind {
    /// An injector input, referenced by parameter name.
    Argument { name: String },
    Function {
        provider: FunctionProvider,
        deps: Vec<NodeId>,
    },
    Struct {
        provider: StructProvider,
        /// Whether the request was for the boxed form.
        boxed: bool,
        deps: Vec<NodeId>,
    },
    Value { provider: ValueProvider },
    Instance { provider: InstanceProvider },
    /// An interface request satisfied through a binding: boxes the concrete
    /// node's value as the trait object.
    Coercion { inner: NodeId },
}

#[derive(Debug)]
pub(crate) struct Node {
    pub output: TypeToken,
    pub kind: NodeKind,
}

/// The resolved graph for one injector: nodes in topological order plus the
/// node satisfying the declared output.
#[derive(Debug)]
pub(crate) struct Graph {
    pub nodes: Vec<Node>,
    pub root: NodeId,
}

pub(crate) fn resolve(
    stub: &InjectorStub,
    effective: &Effective,
    index: &PackageIndex,
    options: &Options,
    diags: &mut Diagnostics,
) -> Option<Graph> {
    let mut by_output: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, flat) in effective.providers.iter().enumerate() {
        for output in flat.provider.outputs() {
            by_output.entry(output.key().to_owned()).or_default().push(idx);
        }
    }

    let mut bindings: HashMap<String, usize> = HashMap::new();
    for (idx, flat) in effective.bindings.iter().enumerate() {
        bindings.entry(flat.binding.iface.key().to_owned()).or_insert(idx);
    }

    let mut inputs: HashMap<String, String> = HashMap::new();
    for (name, token) in &stub.shape.inputs {
        let name = name.clone().expect("stub inputs are named by the reader");
        inputs.entry(token.key().to_owned()).or_insert(name);
    }

    let mut resolver = Resolver {
        stub,
        effective,
        by_output,
        bindings,
        inputs,
        index,
        options,
        diags,
        nodes: Vec::new(),
        memo: HashMap::new(),
        stack: vec![Frame {
            key: String::new(),
            location: stub.set.location.clone(),
            what: format!("injector `{}`", stub.name),
        }],
    };

    let root = resolver.request(&stub.shape.output);
    let nodes = resolver.nodes;
    root.map(|root| {
        trace!(injector = %stub.name, nodes = nodes.len(), "injector resolved");
        Graph { nodes, root }
    })
}

struct Frame {
    /// The request token under resolution; empty for the injector itself.
    key: String,
    location: Location,
    what: String,
}

struct Resolver<'a> {
    stub: &'a InjectorStub,
    effective: &'a Effective,
    by_output: HashMap<String, Vec<usize>>,
    bindings: HashMap<String, usize>,
    inputs: HashMap<String, String>,
    index: &'a PackageIndex,
    options: &'a Options,
    diags: &'a mut Diagnostics,
    nodes: Vec<Node>,
    memo: HashMap<String, Option<NodeId>>,
    stack: Vec<Frame>,
}

impl Resolver<'_> {
    fn request(&mut self, token: &TypeToken) -> Option<NodeId> {
        if let Some(hit) = self.memo.get(token.key()) {
            return *hit;
        }
        if let Some(pos) = self.stack.iter().position(|frame| frame.key == token.key()) {
            self.report_cycle(pos, token);
            return None;
        }
        let id = self.resolve_request(token);
        self.memo.insert(token.key().to_owned(), id);
        id
    }

    fn resolve_request(&mut self, token: &TypeToken) -> Option<NodeId> {
        trace!(ty = %token, "resolving request");

        // The context type never has a provider; it must arrive as an input.
        let input = self.inputs.get(token.key()).cloned();
        if self.options.is_context(token.key()) {
            return match input {
                Some(name) => Some(self.push_argument(token, name)),
                None => {
                    self.report(DiagnosticKind::MissingContextInput {
                        ty: token.key().to_owned(),
                    });
                    None
                }
            };
        }
        if let Some(name) = input {
            return Some(self.push_argument(token, name));
        }

        let providers = self
            .by_output
            .get(token.key())
            .cloned()
            .unwrap_or_default();
        let binding = token
            .interface_request()
            .and_then(|iface| self.bindings.get(iface.key()).copied());

        match (providers.as_slice(), binding) {
            ([], None) => {
                self.report(DiagnosticKind::MissingProvider {
                    ty: token.key().to_owned(),
                });
                None
            }
            ([only], None) => self.build_provider_node(token, *only),
            ([], Some(binding)) => self.build_binding_node(token, binding),
            _ => {
                self.report_conflict(token, &providers, binding);
                None
            }
        }
    }

    fn push_argument(&mut self, token: &TypeToken, name: String) -> NodeId {
        self.push_node(Node {
            output: token.clone(),
            kind: NodeKind::Argument { name },
        })
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn build_provider_node(&mut self, token: &TypeToken, idx: usize) -> Option<NodeId> {
        let flat = &self.effective.providers[idx];
        match &flat.provider {
            Provider::Function(function) => {
                let function = function.clone();
                if !self.check_propagation(&function) {
                    return None;
                }
                let deps = self.resolve_deps(
                    token,
                    function.location.clone(),
                    format!("function provider `{}`", function.name),
                    function.shape.inputs.iter().map(|(_, ty)| ty.clone()),
                )?;
                Some(self.push_node(Node {
                    output: token.clone(),
                    kind: NodeKind::Function { provider: function, deps },
                }))
            }
            Provider::Struct(strukt) => {
                let strukt = strukt.clone();
                let boxed = *token != strukt.ty;
                let deps = self.resolve_deps(
                    token,
                    strukt.location.clone(),
                    format!("struct provider `{}`", strukt.ty),
                    strukt.fields.iter().map(|(_, ty)| ty.clone()),
                )?;
                Some(self.push_node(Node {
                    output: token.clone(),
                    kind: NodeKind::Struct { provider: strukt, boxed, deps },
                }))
            }
            Provider::Value(value) => {
                let value = value.clone();
                Some(self.push_node(Node {
                    output: token.clone(),
                    kind: NodeKind::Value { provider: value },
                }))
            }
            Provider::Instance(instance) => {
                let instance = instance.clone();
                Some(self.push_node(Node {
                    output: token.clone(),
                    kind: NodeKind::Instance { provider: instance },
                }))
            }
        }
    }

    /// A provider may only be fallible, or contribute a cleanup, if the
    /// injector can hand the result to its caller.
    fn check_propagation(&mut self, function: &FunctionProvider) -> bool {
        let mut ok = true;
        if function.shape.error.is_some() && self.stub.shape.error.is_none() {
            self.diags.push(
                Diagnostic::new(
                    DiagnosticKind::BadInjectorReturn {
                        reason: format!(
                            "provider `{}` returns an error, but injector `{}` cannot propagate one",
                            function.name, self.stub.name
                        ),
                    },
                    function.location.clone(),
                )
                .with_related(vec![Related {
                    location: self.stub.location.clone(),
                    note: "injector declared here".to_owned(),
                }]),
            );
            ok = false;
        }
        if function.shape.cleanup.is_some() && self.stub.shape.cleanup.is_none() {
            self.diags.push(
                Diagnostic::new(
                    DiagnosticKind::BadInjectorReturn {
                        reason: format!(
                            "provider `{}` returns a cleanup, but injector `{}` does not return one",
                            function.name, self.stub.name
                        ),
                    },
                    function.location.clone(),
                )
                .with_related(vec![Related {
                    location: self.stub.location.clone(),
                    note: "injector declared here".to_owned(),
                }]),
            );
            ok = false;
        }
        ok
    }

    fn build_binding_node(&mut self, token: &TypeToken, idx: usize) -> Option<NodeId> {
        let flat = &self.effective.bindings[idx];
        let binding = flat.binding.clone();

        let trait_name = binding
            .iface
            .trait_name()
            .expect("bindings always carry a trait object interface");
        let satisfied = self
            .index
            .impls
            .contains(&(trait_name.clone(), binding.concrete.key().to_owned()));
        if !satisfied {
            self.diags.push(
                Diagnostic::new(
                    DiagnosticKind::BadBinding {
                        reason: format!(
                            "`{}` does not implement `{trait_name}`",
                            binding.concrete
                        ),
                    },
                    binding.location.clone(),
                )
                .with_related(self.requirement_chain()),
            );
            return None;
        }

        let deps = self.resolve_deps(
            token,
            binding.location.clone(),
            format!("binding `{}` -> `{}`", binding.iface, binding.concrete),
            std::iter::once(binding.concrete.clone()),
        )?;
        let inner = deps[0];
        Some(self.push_node(Node {
            output: token.clone(),
            kind: NodeKind::Coercion { inner },
        }))
    }

    /// Resolves a provider's requirements with the provider on the
    /// resolution stack; all requirements are attempted even after one
    /// fails, so one pass surfaces every problem.
    fn resolve_deps(
        &mut self,
        token: &TypeToken,
        location: Location,
        what: String,
        requirements: impl Iterator<Item = TypeToken>,
    ) -> Option<Vec<NodeId>> {
        self.stack.push(Frame {
            key: token.key().to_owned(),
            location,
            what,
        });
        let mut deps = Vec::new();
        let mut failed = false;
        for requirement in requirements {
            match self.request(&requirement) {
                Some(id) => deps.push(id),
                None => failed = true,
            }
        }
        self.stack.pop();
        (!failed).then_some(deps)
    }

    fn report(&mut self, kind: DiagnosticKind) {
        let location = self
            .stack
            .last()
            .expect("the injector frame is always present")
            .location
            .clone();
        let related = self.requirement_chain();
        self.diags.push(Diagnostic::new(kind, location).with_related(related));
    }

    /// The resolution stack rendered innermost-first, ending at the
    /// injector's `build!` call.
    fn requirement_chain(&self) -> Vec<Related> {
        self.stack
            .iter()
            .rev()
            .map(|frame| Related {
                location: frame.location.clone(),
                note: format!("required by {}", frame.what),
            })
            .collect()
    }

    fn report_cycle(&mut self, pos: usize, token: &TypeToken) {
        let mut path: Vec<&str> = self.stack[pos..]
            .iter()
            .map(|frame| frame.key.as_str())
            .collect();
        path.push(token.key());
        let related = self.stack[pos..]
            .iter()
            .map(|frame| Related {
                location: frame.location.clone(),
                note: format!("{} participates in the cycle", frame.what),
            })
            .collect();
        let location = self
            .stack
            .last()
            .expect("cycles are detected below the injector frame")
            .location
            .clone();
        self.diags.push(
            Diagnostic::new(
                DiagnosticKind::Cycle {
                    path: path.join(" -> "),
                },
                location,
            )
            .with_related(related),
        );
    }

    fn report_conflict(&mut self, token: &TypeToken, providers: &[usize], binding: Option<usize>) {
        let mut related: Vec<Related> = providers
            .iter()
            .map(|&idx| {
                let flat = &self.effective.providers[idx];
                Related {
                    location: flat.provider.location().clone(),
                    note: format!(
                        "{} provided via {}",
                        flat.provider.describe(),
                        flat.chain_display()
                    ),
                }
            })
            .collect();
        if let Some(idx) = binding {
            let flat = &self.effective.bindings[idx];
            related.push(Related {
                location: flat.binding.location.clone(),
                note: format!(
                    "bound to `{}` via {}",
                    flat.binding.concrete,
                    flat.chain.join(" -> ")
                ),
            });
        }
        let location = self
            .stack
            .last()
            .expect("the injector frame is always present")
            .location
            .clone();
        self.diags.push(
            Diagnostic::new(
                DiagnosticKind::ConflictingProviders {
                    ty: token.key().to_owned(),
                },
                location,
            )
            .with_related(related),
        );
    }
}
