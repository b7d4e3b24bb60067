// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Compile-time dependency injection for Rust, driven by code generation.
//!
//! Solder connects components without runtime containers, reflection, or
//! virtual dispatch: you declare *providers* (ordinary functions that build
//! one value each), group them into *provider sets*, and write an *injector
//! stub* — a function signature whose body is a single [`build!`] call. The
//! `solder_gen` generator then replaces the stub with straight-line code that
//! calls your providers in dependency order, threads return values, and
//! propagates errors and cleanups.
//!
//! This crate is the marker surface the generator recognizes. Everything in
//! it is inert: [`set!`] discards its arguments and produces an empty
//! [`ProviderSet`], and [`build!`] panics if it is ever reached, which it
//! never is in a regular build. The real work happens at generation time.
//!
//! # Quick Start
//!
//! Providers are plain functions:
//!
//! ```rust
//! #[derive(Clone)]
//! pub struct Config { pub verbose: bool }
//! pub struct Logger { pub verbose: bool }
//!
//! pub fn provide_config() -> Config {
//!     Config { verbose: false }
//! }
//!
//! pub fn provide_logger(config: Config) -> Logger {
//!     Logger { verbose: config.verbose }
//! }
//! ```
//!
//! An injector stub lives in a file guarded by `#![cfg(wireinject)]`, so it
//! is excluded from regular builds:
//!
//! ```rust,ignore
//! #![cfg(wireinject)]
//! use super::*;
//!
//! static APP_SET: solder::ProviderSet = solder::set![provide_config, provide_logger];
//!
//! fn initialize_logger() -> Logger {
//!     solder::build!(APP_SET)
//! }
//! ```
//!
//! The generator emits a sibling file guarded by `#![cfg(not(wireinject))]`
//! containing the finished injector:
//!
//! ```rust,ignore
//! fn initialize_logger() -> Logger {
//!     let config = provide_config();
//!     let logger = provide_logger(config);
//!     logger
//! }
//! ```
//!
//! # Provider shapes
//!
//! A provider may be infallible or fallible, and may hand back a [`Cleanup`]
//! to run when its value is no longer needed:
//!
//! - `fn(params…) -> T`
//! - `fn(params…) -> Result<T, E>`
//! - `fn(params…) -> (T, Cleanup)`
//! - `fn(params…) -> Result<(T, Cleanup), E>`
//!
//! Injector stubs use the same four shapes. Cleanups compose: the generated
//! injector returns a single aggregated [`Cleanup`] that invokes each
//! provider cleanup in reverse creation order, and any error path invokes
//! the cleanups recorded so far before returning.
//!
//! # Sharing values
//!
//! When one provider output feeds several consumers, the generated code
//! clones it for every consumer except the last, so shared types must
//! implement [`Clone`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// An opaque, nestable collection of providers and bindings.
///
/// Build one with [`set!`]; reference it from other sets or from a
/// [`build!`] call by name. The value itself carries no information — the
/// generator reads the `set!` arguments from source.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProviderSet(());

impl ProviderSet {
    /// Creates an empty provider set.
    #[must_use]
    pub const fn new() -> Self {
        Self(())
    }
}

/// The inert result of a [`bind`] declaration.
#[derive(Clone, Copy, Debug)]
pub struct Binding(());

/// Declares that requests for the interface type `I` are satisfied by the
/// concrete type `C` within the enclosing set.
///
/// Use inside a [`set!`] with explicit type parameters:
///
/// ```rust,ignore
/// solder::set![provide_postgres, solder::bind::<dyn Store, Postgres>()]
/// ```
///
/// The concrete type must have a provider in the same set and must implement
/// the trait. Injector outputs and provider parameters request the interface
/// as `Box<dyn I>`.
#[must_use]
pub fn bind<I: ?Sized, C>() -> Binding {
    Binding(())
}

/// Declares a value provider: the expression is lifted verbatim into the
/// generated injector.
///
/// The expression must not contain calls (including method calls and macro
/// invocations). Its output type is taken from a struct-literal path, or
/// from an explicit turbofish: `value::<Timeout>(DEFAULT_TIMEOUT)`.
#[must_use]
pub fn value<T>(value: T) -> ProviderSet {
    let _ = value;
    ProviderSet::new()
}

/// Declares an interface value provider: requests for `Box<dyn I>` are
/// satisfied by boxing the given concrete expression.
///
/// ```rust,ignore
/// solder::set![solder::instance::<dyn Clock, _>(FixedClock { at: EPOCH })]
/// ```
///
/// The same no-call restriction as [`value`] applies to the expression.
#[must_use]
pub fn instance<I: ?Sized, C>(concrete: C) -> ProviderSet {
    let _ = concrete;
    ProviderSet::new()
}

/// Constructs a [`ProviderSet`] from providers, bindings, values, and other
/// sets.
///
/// Arguments are read by the generator; the expansion discards them, so set
/// declarations copied into generated files compile in regular builds.
#[macro_export]
macro_rules! set {
    ($($arg:tt)*) => {
        $crate::ProviderSet::new()
    };
}

/// Marks the enclosing function as an injector stub and names the providers
/// available to it.
///
/// The argument list is an implicit [`set!`]. The stub body must be either
/// the `build!` call alone, or the call followed by a discarding
/// `unreachable!()`. Stubs live in `#![cfg(wireinject)]` files and are
/// replaced wholesale by generated code.
#[macro_export]
macro_rules! build {
    ($($arg:tt)*) => {
        ::core::panic!(
            "this injector stub was not replaced by generated code; run the solder generator"
        )
    };
}

/// A deferred teardown action returned by a provider.
///
/// A cleanup runs exactly once: either on a later provider's error path, or
/// through the aggregated cleanup the injector returns. The generator
/// guarantees reverse creation order in both cases.
pub struct Cleanup(Box<dyn FnOnce()>);

impl Cleanup {
    /// Wraps a teardown closure.
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Box::new(f))
    }

    /// A cleanup that does nothing, returned by injectors whose providers
    /// recorded no teardown work.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Runs the teardown action, consuming the handle.
    pub fn call(self) {
        (self.0)();
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup")
    }
}

/// A lightweight cancellation context threaded through injectors.
///
/// The generator never looks for a provider of this type: it must arrive as
/// an injector input. Clones share the same cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct Context {
    canceled: Arc<AtomicBool>,
}

impl Context {
    /// Creates a context that has not been canceled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation to every clone of this context.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    /// Reports whether [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}
