//! Compilation errors.
//!
//! Every error a pass can raise is a variant of [`ErrorKind`]; a
//! [`CompilerError`] pairs the kind with the source location of the
//! offending node. The first error aborts the pass — there is no recovery
//! and no diagnostic accumulation.
//!
//! Rendering follows the classic diagnostic form
//! `"(L,C -> C): <code> error: <prose>"`; the Visual Studio form lives in
//! the compiler crate next to the other log plumbing.

use crate::foundation::SourceLocation;
use std::fmt;
use thiserror::Error;

/// Diagnostic category, rendered as a one-letter prefix on error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Tokenization errors (`L` prefix)
    Lexer,
    /// Parsing errors (`P` prefix)
    Parser,
    /// Sanitization / constant folding errors (`C` prefix)
    Compiler,
}

impl ErrorCategory {
    /// One-letter code prefix.
    pub fn prefix(self) -> char {
        match self {
            ErrorCategory::Lexer => 'L',
            ErrorCategory::Parser => 'P',
            ErrorCategory::Compiler => 'C',
        }
    }
}

/// Every error kind the core passes can surface.
///
/// Message prose is part of the compiler's contract (tests assert on it);
/// the variants carry exactly the data their message needs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    #[error("array length is required in this context")]
    ArrayLengthRequired,

    #[error("cannot assign to this expression")]
    AssignTemporary,

    #[error("invalid parameter {parameter} for attribute {attribute}")]
    AttributeInvalidParameter {
        attribute: String,
        parameter: String,
    },

    #[error("attribute {attribute} requires a parameter")]
    AttributeMissingParameter { attribute: String },

    #[error("attribute {attribute} can only be present once")]
    AttributeMultipleUnique { attribute: String },

    #[error("binary operation {op} between types {left} and {right} is not supported")]
    BinaryUnsupported {
        op: String,
        left: String,
        right: String,
    },

    #[error("builtin {builtin} expected type {expected}, got type {got}")]
    BuiltinUnexpectedType {
        builtin: String,
        expected: String,
        got: String,
    },

    #[error("builtin {builtin} is not available in {stage} stage")]
    BuiltinUnsupportedStage { builtin: String, stage: String },

    #[error("component count ({got}) doesn't match required component count ({expected})")]
    CastComponentMismatch { got: u32, expected: u32 },

    #[error("vector component count ({got}) doesn't match target matrix row count ({expected})")]
    CastMatrixVectorComponentMismatch { got: u32, expected: u32 },

    #[error("cannot cast {from} to {to}")]
    CastIncompatibleTypes { from: String, to: String },

    #[error("circular import detected involving module {module}")]
    CircularImport { module: String },

    #[error("condition must be a bool, got {got}")]
    ConditionExpectedBool { got: String },

    #[error("a constant expression is required in this context")]
    ConstantExpressionRequired,

    #[error("entry functions can only have one struct parameter")]
    EntryFunctionParameter,

    #[error("expected a function, got {got}")]
    ExpectedFunction { got: String },

    #[error("external variable {name} has unauthorized type ({ty}): only samplers and uniform buffers (and primitives, vectors and matrices if primitive external feature is enabled) are allowed in external blocks")]
    ExtTypeNotAllowed { name: String, ty: String },

    #[error("for-each is not supported on type {ty}")]
    ForEachUnsupportedType { ty: String },

    #[error("function {function} expects {expected} parameter(s), but got {got}")]
    FunctionCallUnmatchingParameterCount {
        function: String,
        expected: u32,
        got: u32,
    },

    #[error("function {function} parameter #{index} expects type {expected}, but got {got}")]
    FunctionCallUnmatchingParameterType {
        function: String,
        index: u32,
        expected: String,
        got: String,
    },

    #[error("{identifier} identifier was already imported")]
    ImportIdentifierAlreadyPresent { identifier: String },

    #[error("only one wildcard can be present in an import directive")]
    ImportMultipleWildcard,

    #[error("wildcard cannot be renamed")]
    ImportWildcardRename,

    #[error("integral division by zero in expression {expression}")]
    IntegralDivisionByZero { expression: String },

    #[error("integral modulo by zero in expression {expression}")]
    IntegralModuloByZero { expression: String },

    #[error("index must be an integer, got {got}")]
    InvalidIndexType { got: String },

    #[error("invalid swizzle {swizzle}")]
    InvalidSwizzle { swizzle: String },

    #[error("expected type {expected} for parameter #{index}, got {got}")]
    IntrinsicExpectedType {
        index: u32,
        expected: String,
        got: String,
    },

    #[error("this is only valid in the {requested} stage but this function gets called in the {caller} stage")]
    InvalidStageDependency { requested: String, caller: String },

    #[error("loop control instruction {instruction} found outside of loop")]
    LoopControlOutsideOfLoop { instruction: String },

    #[error("module {module} requires feature {feature}")]
    ModuleFeatureMismatch { module: String, feature: String },

    #[error("module feature {feature} has already been specified")]
    ModuleFeatureMultipleUnique { feature: String },

    #[error("unary operation {op} is not supported on type {operand}")]
    UnaryUnsupported { op: String, operand: String },

    #[error("unexpected attribute {attribute}")]
    UnexpectedAttribute { attribute: String },

    #[error("unknown method {method} on type {ty}")]
    UnknownMethod { method: String, ty: String },

    #[error("unexpected token {token}")]
    UnexpectedToken { token: String },

    #[error("unknown identifier {identifier}")]
    UnknownIdentifier { identifier: String },

    #[error("variable declaration needs either a type or an initial value")]
    VarDeclarationMissingTypeAndValue,

    #[error("initial expression type ({got}) doesn't match specified type ({expected})")]
    VarDeclarationTypeUnmatching { got: String, expected: String },
}

impl ErrorKind {
    /// Short identifier of this error kind (the code without its category
    /// prefix).
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::ArrayLengthRequired => "ArrayLengthRequired",
            ErrorKind::AssignTemporary => "AssignTemporary",
            ErrorKind::AttributeInvalidParameter { .. } => "AttributeInvalidParameter",
            ErrorKind::BinaryUnsupported { .. } => "BinaryUnsupported",
            ErrorKind::AttributeMissingParameter { .. } => "AttributeMissingParameter",
            ErrorKind::AttributeMultipleUnique { .. } => "AttributeMultipleUnique",
            ErrorKind::BuiltinUnexpectedType { .. } => "BuiltinUnexpectedType",
            ErrorKind::BuiltinUnsupportedStage { .. } => "BuiltinUnsupportedStage",
            ErrorKind::CastComponentMismatch { .. } => "CastComponentMismatch",
            ErrorKind::CastMatrixVectorComponentMismatch { .. } => {
                "CastMatrixVectorComponentMismatch"
            }
            ErrorKind::CastIncompatibleTypes { .. } => "CastIncompatibleTypes",
            ErrorKind::CircularImport { .. } => "CircularImport",
            ErrorKind::ConditionExpectedBool { .. } => "ConditionExpectedBool",
            ErrorKind::ConstantExpressionRequired => "ConstantExpressionRequired",
            ErrorKind::EntryFunctionParameter => "EntryFunctionParameter",
            ErrorKind::ExpectedFunction { .. } => "ExpectedFunction",
            ErrorKind::ExtTypeNotAllowed { .. } => "ExtTypeNotAllowed",
            ErrorKind::ForEachUnsupportedType { .. } => "ForEachUnsupportedType",
            ErrorKind::FunctionCallUnmatchingParameterCount { .. } => {
                "FunctionCallUnmatchingParameterCount"
            }
            ErrorKind::FunctionCallUnmatchingParameterType { .. } => {
                "FunctionCallUnmatchingParameterType"
            }
            ErrorKind::ImportIdentifierAlreadyPresent { .. } => "ImportIdentifierAlreadyPresent",
            ErrorKind::ImportMultipleWildcard => "ImportMultipleWildcard",
            ErrorKind::ImportWildcardRename => "ImportWildcardRename",
            ErrorKind::IntegralDivisionByZero { .. } => "IntegralDivisionByZero",
            ErrorKind::IntegralModuloByZero { .. } => "IntegralModuloByZero",
            ErrorKind::InvalidIndexType { .. } => "InvalidIndexType",
            ErrorKind::InvalidSwizzle { .. } => "InvalidSwizzle",
            ErrorKind::IntrinsicExpectedType { .. } => "IntrinsicExpectedType",
            ErrorKind::InvalidStageDependency { .. } => "InvalidStageDependency",
            ErrorKind::LoopControlOutsideOfLoop { .. } => "LoopControlOutsideOfLoop",
            ErrorKind::ModuleFeatureMismatch { .. } => "ModuleFeatureMismatch",
            ErrorKind::ModuleFeatureMultipleUnique { .. } => "ModuleFeatureMultipleUnique",
            ErrorKind::UnaryUnsupported { .. } => "UnaryUnsupported",
            ErrorKind::UnexpectedAttribute { .. } => "UnexpectedAttribute",
            ErrorKind::UnexpectedToken { .. } => "UnexpectedToken",
            ErrorKind::UnknownMethod { .. } => "UnknownMethod",
            ErrorKind::UnknownIdentifier { .. } => "UnknownIdentifier",
            ErrorKind::VarDeclarationMissingTypeAndValue => "VarDeclarationMissingTypeAndValue",
            ErrorKind::VarDeclarationTypeUnmatching { .. } => "VarDeclarationTypeUnmatching",
        }
    }

    /// The category all core errors belong to.
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Compiler
    }

    /// Attach a source location, producing a throwable error.
    pub fn at(self, location: SourceLocation) -> CompilerError {
        CompilerError {
            kind: self,
            location,
        }
    }
}

/// An error kind anchored to the source range that triggered it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerError {
    pub kind: ErrorKind,
    pub location: SourceLocation,
}

impl std::error::Error for CompilerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl fmt::Display for CompilerError {
    /// Classic diagnostic form:
    /// `(5,11 -> 30): CIntegralDivisionByZero error: integral division by zero in expression (42 / 0)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}{} error: {}",
            self.location,
            self.kind.category().prefix(),
            self.kind.code(),
            self.kind
        )
    }
}

/// Result alias used by every pass.
pub type Result<T> = std::result::Result<T, CompilerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_rendering() {
        let error = ErrorKind::IntegralDivisionByZero {
            expression: "(42 / 0)".to_string(),
        }
        .at(SourceLocation::new(5, 11, 5, 30));

        assert_eq!(
            error.to_string(),
            "(5,11 -> 30): CIntegralDivisionByZero error: integral division by zero in expression (42 / 0)"
        );
    }

    #[test]
    fn test_point_location_rendering() {
        let error = ErrorKind::ImportMultipleWildcard.at(SourceLocation::new(5, 11, 5, 11));

        assert_eq!(
            error.to_string(),
            "(5, 11): CImportMultipleWildcard error: only one wildcard can be present in an import directive"
        );
    }

    #[test]
    fn test_code_matches_variant() {
        let kind = ErrorKind::UnknownIdentifier {
            identifier: "foo".to_string(),
        };
        assert_eq!(kind.code(), "UnknownIdentifier");
        assert_eq!(kind.category().prefix(), 'C');
        assert_eq!(kind.to_string(), "unknown identifier foo");
    }
}
