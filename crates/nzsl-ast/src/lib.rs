// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! AST types for the NZSL shader language.
//!
//! This crate contains the node definitions, the type system, constant
//! values with their compile-time evaluation, the visitor and cloner
//! abstractions every pass is built on, and the module/resolver model.
//! Passes themselves live in `nzsl-resolve`; the binary module format in
//! `nzsl-serializer`.

pub mod ast;
pub mod builder;
pub mod cloner;
pub mod error;
pub mod foundation;
pub mod module;
pub mod types;
pub mod value;
pub mod visitor;

// Re-export commonly used types
pub use ast::*;
pub use cloner::{Cloner, DeepCloner};
pub use error::{CompilerError, ErrorCategory, ErrorKind};
pub use foundation::SourceLocation;
pub use module::{ImportedModule, InMemoryModuleResolver, Module, ModuleMetadata, ModuleResolver};
pub use types::{resolve_alias, ExpressionType, PrimitiveType};
pub use value::ConstantValue;
pub use visitor::{ExpressionVisitor, StatementVisitor};
