//! Statement nodes.
//!
//! Same representation strategy as expressions: a closed [`Statement`] sum
//! over named payload structs, every payload carrying its source location.
//! Declaration statements carry their module-scoped index as
//! `Option<usize>`, `None` until the sanitizer assigns it.

use crate::ast::enums::{
    BuiltinEntry, DepthWriteMode, LoopUnroll, MemoryLayout, NodeKind, ShaderStage,
};
use crate::ast::expr::{Expression, ExpressionValue};
use crate::foundation::SourceLocation;
use crate::types::ExpressionType;
use serde::{Deserialize, Serialize};

/// One `(condition, body)` arm of a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalBranch {
    pub condition: Expression,
    pub statement: Statement,
}

/// `if / else if / else` chain. `is_const` marks the `const if` form the
/// constant-propagation pass is required to collapse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchStatement {
    pub cond_statements: Vec<ConditionalBranch>,
    pub else_statement: Option<Box<Statement>>,
    pub is_const: bool,
    pub source_location: SourceLocation,
}

/// `break`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakStatement {
    pub source_location: SourceLocation,
}

/// Compile-time conditional wrapper produced by the `cond` attribute on a
/// statement; the body only survives sanitization when the condition holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalStatement {
    pub condition: Expression,
    pub statement: Box<Statement>,
    pub source_location: SourceLocation,
}

/// `continue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinueStatement {
    pub source_location: SourceLocation,
}

/// `alias A = T;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclareAliasStatement {
    pub alias_index: Option<usize>,
    pub name: String,
    pub expression: Box<Expression>,
    pub source_location: SourceLocation,
}

/// `const NAME[: T] = expr;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclareConstStatement {
    pub const_index: Option<usize>,
    pub name: String,
    pub const_type: ExpressionValue<ExpressionType>,
    pub expression: Box<Expression>,
    pub source_location: SourceLocation,
}

/// One variable of an `external { ... }` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalVar {
    pub var_index: Option<usize>,
    pub name: String,
    pub var_type: ExpressionValue<ExpressionType>,
    pub binding_index: ExpressionValue<u32>,
    pub binding_set: ExpressionValue<u32>,
    pub source_location: SourceLocation,
}

/// `external { [binding(i)] name: T, ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclareExternalStatement {
    pub binding_set: ExpressionValue<u32>,
    pub external_vars: Vec<ExternalVar>,
    pub source_location: SourceLocation,
}

/// One parameter of a function declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub var_index: Option<usize>,
    pub name: String,
    pub param_type: ExpressionValue<ExpressionType>,
    pub source_location: SourceLocation,
}

/// `[entry(stage)] fn name(params) -> T { ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclareFunctionStatement {
    pub func_index: Option<usize>,
    pub name: String,
    pub parameters: Vec<FunctionParameter>,
    pub statements: Vec<Statement>,
    pub return_type: ExpressionValue<ExpressionType>,
    pub entry_stage: ExpressionValue<ShaderStage>,
    pub depth_write: ExpressionValue<DepthWriteMode>,
    pub early_fragment_tests: ExpressionValue<bool>,
    pub is_exported: ExpressionValue<bool>,
    pub source_location: SourceLocation,
}

/// `option name: T = default;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclareOptionStatement {
    pub opt_index: Option<usize>,
    pub opt_name: String,
    pub opt_type: ExpressionValue<ExpressionType>,
    pub default_value: Option<Box<Expression>>,
    pub source_location: SourceLocation,
}

/// One member of a struct declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructMember {
    pub name: String,
    pub member_type: ExpressionValue<ExpressionType>,
    pub builtin: ExpressionValue<BuiltinEntry>,
    pub cond: ExpressionValue<bool>,
    pub location_index: ExpressionValue<u32>,
    pub source_location: SourceLocation,
}

/// Name, layout and members of a struct declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDescription {
    pub name: String,
    pub layout: ExpressionValue<MemoryLayout>,
    pub members: Vec<StructMember>,
}

/// `struct Name { [attr] member: T, ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclareStructStatement {
    pub struct_index: Option<usize>,
    pub is_exported: ExpressionValue<bool>,
    pub description: StructDescription,
    pub source_location: SourceLocation,
}

/// `let name[: T] [= expr];`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclareVariableStatement {
    pub var_index: Option<usize>,
    pub var_name: String,
    pub var_type: ExpressionValue<ExpressionType>,
    pub initial_expression: Option<Box<Expression>>,
    pub source_location: SourceLocation,
}

/// `discard;` (fragment stage only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscardStatement {
    pub source_location: SourceLocation,
}

/// An expression in statement position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionStatement {
    pub expression: Expression,
    pub source_location: SourceLocation,
}

/// `for i in from -> to [: step] { ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStatement {
    pub var_index: Option<usize>,
    pub var_name: String,
    pub from_expr: Box<Expression>,
    pub to_expr: Box<Expression>,
    pub step_expr: Option<Box<Expression>>,
    pub unroll: ExpressionValue<LoopUnroll>,
    pub statement: Box<Statement>,
    pub source_location: SourceLocation,
}

/// `for v in array { ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForEachStatement {
    pub var_index: Option<usize>,
    pub var_name: String,
    pub expression: Box<Expression>,
    pub unroll: ExpressionValue<LoopUnroll>,
    pub statement: Box<Statement>,
    pub source_location: SourceLocation,
}

/// One name brought into scope by an import directive. An empty
/// `identifier` is the wildcard (`*`); `rename` applies `as` clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportIdentifier {
    pub identifier: String,
    pub rename: String,
    pub source_location: SourceLocation,
}

impl ImportIdentifier {
    /// Whether this entry is the `*` wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.identifier.is_empty()
    }
}

/// `import Module.Name;` / `import X, Y as Z from Module;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportStatement {
    pub module_name: String,
    pub identifiers: Vec<ImportIdentifier>,
    pub source_location: SourceLocation,
}

/// A statement sequence (function bodies, module roots).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MultiStatement {
    pub statements: Vec<Statement>,
    pub source_location: SourceLocation,
}

/// Nothing. Left behind by passes that remove statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoOpStatement {
    pub source_location: SourceLocation,
}

/// `return [expr];`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatement {
    pub returned_expr: Option<Box<Expression>>,
    pub source_location: SourceLocation,
}

/// `{ ... }` — introduces a lexical scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedStatement {
    pub statement: Box<Statement>,
    pub source_location: SourceLocation,
}

/// `while (cond) { ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStatement {
    pub condition: Box<Expression>,
    pub unroll: ExpressionValue<LoopUnroll>,
    pub body: Box<Statement>,
    pub source_location: SourceLocation,
}

/// The sum of all statement variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Branch(BranchStatement),
    Break(BreakStatement),
    Conditional(ConditionalStatement),
    Continue(ContinueStatement),
    DeclareAlias(DeclareAliasStatement),
    DeclareConst(DeclareConstStatement),
    DeclareExternal(DeclareExternalStatement),
    DeclareFunction(DeclareFunctionStatement),
    DeclareOption(DeclareOptionStatement),
    DeclareStruct(DeclareStructStatement),
    DeclareVariable(DeclareVariableStatement),
    Discard(DiscardStatement),
    Expression(ExpressionStatement),
    For(ForStatement),
    ForEach(ForEachStatement),
    Import(ImportStatement),
    Multi(MultiStatement),
    NoOp(NoOpStatement),
    Return(ReturnStatement),
    Scoped(ScopedStatement),
    While(WhileStatement),
}

macro_rules! for_each_statement {
    ($self:expr, $node:ident => $body:expr) => {
        match $self {
            Statement::Branch($node) => $body,
            Statement::Break($node) => $body,
            Statement::Conditional($node) => $body,
            Statement::Continue($node) => $body,
            Statement::DeclareAlias($node) => $body,
            Statement::DeclareConst($node) => $body,
            Statement::DeclareExternal($node) => $body,
            Statement::DeclareFunction($node) => $body,
            Statement::DeclareOption($node) => $body,
            Statement::DeclareStruct($node) => $body,
            Statement::DeclareVariable($node) => $body,
            Statement::Discard($node) => $body,
            Statement::Expression($node) => $body,
            Statement::For($node) => $body,
            Statement::ForEach($node) => $body,
            Statement::Import($node) => $body,
            Statement::Multi($node) => $body,
            Statement::NoOp($node) => $body,
            Statement::Return($node) => $body,
            Statement::Scoped($node) => $body,
            Statement::While($node) => $body,
        }
    };
}

impl Statement {
    /// Tag of the concrete variant.
    pub fn node_kind(&self) -> NodeKind {
        match self {
            Statement::Branch(_) => NodeKind::BranchStatement,
            Statement::Break(_) => NodeKind::BreakStatement,
            Statement::Conditional(_) => NodeKind::ConditionalStatement,
            Statement::Continue(_) => NodeKind::ContinueStatement,
            Statement::DeclareAlias(_) => NodeKind::DeclareAliasStatement,
            Statement::DeclareConst(_) => NodeKind::DeclareConstStatement,
            Statement::DeclareExternal(_) => NodeKind::DeclareExternalStatement,
            Statement::DeclareFunction(_) => NodeKind::DeclareFunctionStatement,
            Statement::DeclareOption(_) => NodeKind::DeclareOptionStatement,
            Statement::DeclareStruct(_) => NodeKind::DeclareStructStatement,
            Statement::DeclareVariable(_) => NodeKind::DeclareVariableStatement,
            Statement::Discard(_) => NodeKind::DiscardStatement,
            Statement::Expression(_) => NodeKind::ExpressionStatement,
            Statement::For(_) => NodeKind::ForStatement,
            Statement::ForEach(_) => NodeKind::ForEachStatement,
            Statement::Import(_) => NodeKind::ImportStatement,
            Statement::Multi(_) => NodeKind::MultiStatement,
            Statement::NoOp(_) => NodeKind::NoOpStatement,
            Statement::Return(_) => NodeKind::ReturnStatement,
            Statement::Scoped(_) => NodeKind::ScopedStatement,
            Statement::While(_) => NodeKind::WhileStatement,
        }
    }

    pub fn source_location(&self) -> &SourceLocation {
        for_each_statement!(self, node => &node.source_location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind() {
        let noop = Statement::NoOp(NoOpStatement {
            source_location: SourceLocation::unknown(),
        });
        assert_eq!(noop.node_kind(), NodeKind::NoOpStatement);
        assert!(noop.node_kind().is_statement());
    }

    #[test]
    fn test_import_wildcard() {
        let wildcard = ImportIdentifier {
            identifier: String::new(),
            rename: String::new(),
            source_location: SourceLocation::unknown(),
        };
        assert!(wildcard.is_wildcard());

        let named = ImportIdentifier {
            identifier: "Color".to_string(),
            rename: String::new(),
            source_location: SourceLocation::unknown(),
        };
        assert!(!named.is_wildcard());
    }
}
