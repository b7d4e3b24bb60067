// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Expands a root set into the effective provider list: nested sets inlined
//! depth-first, identical provider references collapsed, provenance recorded
//! for diagnostics.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::trace;

use crate::diag::{Diagnostic, DiagnosticKind, Diagnostics, Location, Related};
use crate::model::{Binding, Provider, ProviderSetDef, SetItem};

/// A provider together with the chain of sets it was reached through,
/// outermost first. The first element is the root (`build!` or the root
/// set's name).
#[derive(Clone, Debug)]
pub(crate) struct FlatProvider {
    pub provider: Provider,
    pub chain: Vec<String>,
}

#[derive(Clone, Debug)]
pub(crate) struct FlatBinding {
    pub binding: Binding,
    pub chain: Vec<String>,
}

/// The flattened, deduplicated contents reachable from one root set.
#[derive(Debug, Default)]
pub(crate) struct Effective {
    pub providers: Vec<FlatProvider>,
    pub bindings: Vec<FlatBinding>,
}

impl FlatProvider {
    /// Renders the provenance chain, e.g. `build! -> APP_SET -> DB_SET`.
    pub(crate) fn chain_display(&self) -> String {
        self.chain.join(" -> ")
    }
}

pub(crate) fn flatten(
    root: &ProviderSetDef,
    sets: &BTreeMap<String, ProviderSetDef>,
    diags: &mut Diagnostics,
) -> Effective {
    let mut walker = Walker {
        sets,
        diags,
        effective: Effective::default(),
        seen_providers: HashSet::new(),
        seen_bindings: HashMap::new(),
        visiting: Vec::new(),
    };
    let root_label = root
        .name
        .clone()
        .unwrap_or_else(|| "build!".to_owned());
    walker.walk(root, &[root_label]);
    trace!(
        providers = walker.effective.providers.len(),
        bindings = walker.effective.bindings.len(),
        "set flattened"
    );
    walker.effective
}

struct Walker<'a> {
    sets: &'a BTreeMap<String, ProviderSetDef>,
    diags: &'a mut Diagnostics,
    effective: Effective,
    seen_providers: HashSet<String>,
    /// Interface key -> (concrete key, location of the first binding).
    seen_bindings: HashMap<String, (String, Location)>,
    visiting: Vec<String>,
}

impl Walker<'_> {
    fn walk(&mut self, def: &ProviderSetDef, chain: &[String]) {
        for item in &def.items {
            match item {
                SetItem::Provider(provider) => {
                    if self.seen_providers.insert(provider.identity()) {
                        self.effective.providers.push(FlatProvider {
                            provider: provider.clone(),
                            chain: chain.to_vec(),
                        });
                    }
                }
                SetItem::Binding(binding) => self.add_binding(binding, chain),
                SetItem::SetRef { name, location } => {
                    self.enter_named(name, location, chain);
                }
                SetItem::Nested(nested) => {
                    let mut chain = chain.to_vec();
                    chain.push("set!".to_owned());
                    self.walk(nested, &chain);
                }
            }
        }
    }

    fn add_binding(&mut self, binding: &Binding, chain: &[String]) {
        let iface = binding.iface.key().to_owned();
        let concrete = binding.concrete.key().to_owned();
        match self.seen_bindings.get(&iface) {
            None => {
                self.seen_bindings
                    .insert(iface, (concrete, binding.location.clone()));
                self.effective.bindings.push(FlatBinding {
                    binding: binding.clone(),
                    chain: chain.to_vec(),
                });
            }
            Some((existing, _)) if *existing == concrete => {}
            Some((existing, first)) => {
                self.diags.push(
                    Diagnostic::new(
                        DiagnosticKind::BadBinding {
                            reason: format!(
                                "`{}` is bound to both `{existing}` and `{concrete}`",
                                binding.iface
                            ),
                        },
                        binding.location.clone(),
                    )
                    .with_related(vec![Related {
                        location: first.clone(),
                        note: "first bound here".to_owned(),
                    }]),
                );
            }
        }
    }

    fn enter_named(&mut self, name: &str, location: &Location, chain: &[String]) {
        if let Some(pos) = self.visiting.iter().position(|entry| entry == name) {
            let mut path: Vec<&str> =
                self.visiting[pos..].iter().map(String::as_str).collect();
            path.push(name);
            self.diags.push(Diagnostic::new(
                DiagnosticKind::Cycle {
                    path: path.join(" -> "),
                },
                location.clone(),
            ));
            return;
        }
        let Some(def) = self.sets.get(name) else {
            self.diags.push(Diagnostic::new(
                DiagnosticKind::DslMisuse {
                    reason: format!("`{name}` does not name a provider set"),
                },
                location.clone(),
            ));
            return;
        };
        self.visiting.push(name.to_owned());
        let mut chain = chain.to_vec();
        chain.push(name.to_owned());
        self.walk(def, &chain);
        self.visiting.pop();
    }
}
