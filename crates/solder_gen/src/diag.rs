// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use proc_macro2::Span;
use thiserror::Error;

/// A position within a package source file, 1-based line and column.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Location {
    /// Name of the source file as given to [`crate::Package`].
    pub file: String,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
}

impl Location {
    pub(crate) fn from_span(file: &str, span: Span) -> Self {
        let start = span.start();
        Self {
            file: file.to_owned(),
            line: start.line,
            column: start.column + 1,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// The category of a generation problem.
///
/// One generation pass may report many diagnostics; resolution keeps going
/// after the first error so that every problem in a package surfaces at once.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum DiagnosticKind {
    /// A required type has no provider and no matching injector input.
    #[error("no provider found for `{ty}`")]
    MissingProvider {
        /// The unsatisfied type.
        ty: String,
    },

    /// Two or more providers in the effective set produce the same type.
    #[error("multiple providers found for `{ty}`")]
    ConflictingProviders {
        /// The multiply-provided type.
        ty: String,
    },

    /// The dependency graph (or the set nesting) contains a cycle.
    #[error("dependency cycle: {path}")]
    Cycle {
        /// The cycle rendered as `A -> B -> A`.
        path: String,
    },

    /// A provider function's signature is not one of the four permitted
    /// shapes.
    #[error("provider `{name}` has an unsupported signature: {reason}")]
    BadShape {
        /// The provider function name.
        name: String,
        /// Why the signature was rejected.
        reason: String,
    },

    /// A value expression contains a call or is otherwise not liftable.
    #[error("invalid value expression: {reason}")]
    BadValueExpr {
        /// Why the expression was rejected.
        reason: String,
    },

    /// A binding's concrete type does not implement the interface, or has no
    /// provider in the set.
    #[error("invalid binding: {reason}")]
    BadBinding {
        /// Why the binding was rejected.
        reason: String,
    },

    /// A provider produces an error or cleanup the injector cannot return.
    #[error("{reason}")]
    BadInjectorReturn {
        /// Which output the injector cannot propagate.
        reason: String,
    },

    /// A provider requires the context type but the injector accepts no such
    /// input.
    #[error("no injector input provides the context type `{ty}`")]
    MissingContextInput {
        /// The context type.
        ty: String,
    },

    /// A `set!`, `bind`, `value`, `instance`, or `build!` form is
    /// structurally invalid.
    #[error("{reason}")]
    DslMisuse {
        /// What was malformed.
        reason: String,
    },
}

/// A note attached to a [`Diagnostic`], pointing at a second location such as
/// a conflicting provider or a step in a set provenance chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Related {
    /// Where the related declaration lives.
    pub location: Location,
    /// What the location contributes to the diagnostic.
    pub note: String,
}

/// A single user-facing generation problem.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    /// What went wrong.
    pub kind: DiagnosticKind,
    /// The primary source location.
    pub location: Location,
    /// Secondary locations: conflicting candidates, provenance chains,
    /// cycle participants.
    pub related: Vec<Related>,
}

impl Diagnostic {
    pub(crate) fn new(kind: DiagnosticKind, location: Location) -> Self {
        Self {
            kind,
            location,
            related: Vec::new(),
        }
    }

    pub(crate) fn with_related(mut self, related: Vec<Related>) -> Self {
        self.related = related;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.kind)?;
        for related in &self.related {
            write!(f, "\n  {}: {}", related.location, related.note)?;
        }
        Ok(())
    }
}

/// Accumulating sink for diagnostics; any pipeline stage may write to it.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

/// Package-level failure of a generation invocation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerateError {
    /// A source file is not parseable Rust.
    #[error("failed to parse `{file}`: {source}")]
    Parse {
        /// The offending file name.
        file: String,
        /// The underlying parse error.
        source: syn::Error,
    },

    /// Strict mode was requested and no injector could be generated.
    #[error("no injectors could be generated ({} diagnostic(s))", diagnostics.len())]
    NoInjectorsGenerated {
        /// Everything that went wrong, per injector.
        diagnostics: Vec<Diagnostic>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(line: usize, column: usize) -> Location {
        Location {
            file: "app.rs".to_owned(),
            line,
            column,
        }
    }

    #[test]
    fn diagnostic_renders_compiler_style() {
        let diagnostic = Diagnostic::new(
            DiagnosticKind::MissingProvider { ty: "Baz".to_owned() },
            location(4, 9),
        );

        assert_eq!(diagnostic.to_string(), "app.rs:4:9: no provider found for `Baz`");
    }

    #[test]
    fn related_locations_render_indented() {
        let diagnostic = Diagnostic::new(
            DiagnosticKind::ConflictingProviders { ty: "Foo".to_owned() },
            location(2, 1),
        )
        .with_related(vec![Related {
            location: location(7, 5),
            note: "also provided here".to_owned(),
        }]);

        let rendered = diagnostic.to_string();
        assert!(rendered.contains("app.rs:2:1: multiple providers found for `Foo`"));
        assert!(rendered.contains("\n  app.rs:7:5: also provided here"));
    }
}
