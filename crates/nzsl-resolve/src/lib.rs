// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Semantic analysis and optimization passes for NZSL.
//!
//! This crate hosts the passes between parsing and code generation:
//!
//! - [`sanitize`] — name resolution, type checking, canonicalization and
//!   module linking; produces the canonical AST every backend consumes.
//! - [`propagate_constants`] — compile-time folding of constant
//!   expressions and statically decided branches.
//! - [`DependencyChecker`] / [`eliminate_unused`] — reachability from entry
//!   points and removal of everything unreachable.
//!
//! All passes take a module by reference and return a new owned module;
//! the first error aborts the pass.

pub mod dependency;
pub mod eliminate;
pub mod propagate;
pub mod sanitize;

pub use dependency::{collect_usage, DependencyChecker, DependencyConfig, UsageSet};
pub use eliminate::{eliminate_unused, eliminate_unused_with};
pub use propagate::{propagate_constants, propagate_constants_with, PropagationOptions};
pub use sanitize::{sanitize, SanitizeOptions};
