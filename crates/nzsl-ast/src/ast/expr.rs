//! Expression nodes.
//!
//! [`Expression`] is the closed sum of every expression variant; each
//! variant wraps a named payload struct so passes can take and return the
//! concrete node they rewrite. Every payload carries its source location,
//! and every expression carries the `cached_type` the sanitizer computed
//! for it (`None` before sanitization).

use crate::ast::enums::{AssignOp, BinaryOp, IntrinsicType, NodeKind, UnaryOp};
use crate::foundation::SourceLocation;
use crate::types::ExpressionType;
use crate::value::ConstantValue;
use serde::{Deserialize, Serialize};

/// A value that is either absent, already resolved, or still an expression
/// to be evaluated by the sanitizer.
///
/// Attributes are the main producer: `[cond(UseInt)]` parses to
/// `Expression(...)` and sanitization bottoms it out into `Value(...)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ExpressionValue<T> {
    /// No value was provided
    #[default]
    Unset,
    /// Fully resolved value
    Value(T),
    /// Unevaluated expression producing the value
    Expression(Box<Expression>),
}

impl<T> ExpressionValue<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, ExpressionValue::Unset)
    }

    pub fn has_value(&self) -> bool {
        !self.is_unset()
    }

    /// The resolved value, if this has bottomed out.
    pub fn value(&self) -> Option<&T> {
        match self {
            ExpressionValue::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The unevaluated expression, if any.
    pub fn expression(&self) -> Option<&Expression> {
        match self {
            ExpressionValue::Expression(expr) => Some(expr),
            _ => None,
        }
    }
}

impl<T> From<T> for ExpressionValue<T> {
    fn from(value: T) -> Self {
        ExpressionValue::Value(value)
    }
}

/// One entry of an identifier access chain (`a.b.c`), with its own location
/// for precise member-access diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessIdentifierEntry {
    pub identifier: String,
    pub source_location: SourceLocation,
}

/// `expr.a.b` — member access by name, pre-sanitization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessIdentifierExpression {
    pub expr: Box<Expression>,
    pub identifiers: Vec<AccessIdentifierEntry>,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// `expr[i][j]` — access by index (also member access post-sanitization,
/// with constant indices into struct fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessIndexExpression {
    pub expr: Box<Expression>,
    pub indices: Vec<Expression>,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// Resolved reference to an alias declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasValueExpression {
    pub alias_id: usize,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// `a = b` and compound forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignExpression {
    pub op: AssignOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// `lhs <op> rhs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpression {
    pub op: BinaryOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// `target(args...)` where target is a function value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallFunctionExpression {
    pub target_function: Box<Expression>,
    pub parameters: Vec<Expression>,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// `object.method(args...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallMethodExpression {
    pub object: Box<Expression>,
    pub method_name: String,
    pub parameters: Vec<Expression>,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// `T(e1, e2, ...)` — explicit cast or literal construction. Scalar and
/// reshaping casts carry a single operand; vector construction carries up
/// to four; array literals carry one operand per element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastExpression {
    pub target_type: ExpressionValue<ExpressionType>,
    pub expressions: Vec<Expression>,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// `cond ? true_path : false_path` (compile-time selected when `cond`
/// folds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalExpression {
    pub condition: Box<Expression>,
    pub true_path: Box<Expression>,
    pub false_path: Box<Expression>,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// Resolved reference to a `const` declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantExpression {
    pub constant_id: usize,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantValueExpression {
    pub value: ConstantValue,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// Resolved reference to a function declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionExpression {
    pub func_id: usize,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// An unresolved name. Never survives sanitization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierExpression {
    pub identifier: String,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// A built-in operation call (`dot(a, b)`, `texture.Sample(uv)`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicExpression {
    pub intrinsic: IntrinsicType,
    pub parameters: Vec<Expression>,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// Resolved reference to an intrinsic by registry index (before the call is
/// materialized into an [`IntrinsicExpression`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicFunctionExpression {
    pub intrinsic_id: usize,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// Resolved reference to a struct declaration used as a type value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructTypeExpression {
    pub struct_type_id: usize,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// `expr.xyzw` — projection and rearrangement of vector components.
///
/// `components` holds component indices (0 = x .. 3 = w); only the first
/// `component_count` entries are meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwizzleExpression {
    pub expression: Box<Expression>,
    pub components: [u32; 4],
    pub component_count: usize,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

impl SwizzleExpression {
    /// The meaningful component indices.
    pub fn active_components(&self) -> &[u32] {
        &self.components[..self.component_count]
    }
}

/// Resolved reference to a named type by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeExpression {
    pub type_id: usize,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// `<op> expr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpression {
    pub op: UnaryOp,
    pub expression: Box<Expression>,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// Resolved reference to a variable declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableValueExpression {
    pub variable_id: usize,
    pub cached_type: Option<ExpressionType>,
    pub source_location: SourceLocation,
}

/// The sum of all expression variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    AccessIdentifier(AccessIdentifierExpression),
    AccessIndex(AccessIndexExpression),
    AliasValue(AliasValueExpression),
    Assign(AssignExpression),
    Binary(BinaryExpression),
    CallFunction(CallFunctionExpression),
    CallMethod(CallMethodExpression),
    Cast(CastExpression),
    Conditional(ConditionalExpression),
    Constant(ConstantExpression),
    ConstantValue(ConstantValueExpression),
    Function(FunctionExpression),
    Identifier(IdentifierExpression),
    Intrinsic(IntrinsicExpression),
    IntrinsicFunction(IntrinsicFunctionExpression),
    StructType(StructTypeExpression),
    Swizzle(SwizzleExpression),
    Type(TypeExpression),
    Unary(UnaryExpression),
    VariableValue(VariableValueExpression),
}

macro_rules! for_each_expression {
    ($self:expr, $node:ident => $body:expr) => {
        match $self {
            Expression::AccessIdentifier($node) => $body,
            Expression::AccessIndex($node) => $body,
            Expression::AliasValue($node) => $body,
            Expression::Assign($node) => $body,
            Expression::Binary($node) => $body,
            Expression::CallFunction($node) => $body,
            Expression::CallMethod($node) => $body,
            Expression::Cast($node) => $body,
            Expression::Conditional($node) => $body,
            Expression::Constant($node) => $body,
            Expression::ConstantValue($node) => $body,
            Expression::Function($node) => $body,
            Expression::Identifier($node) => $body,
            Expression::Intrinsic($node) => $body,
            Expression::IntrinsicFunction($node) => $body,
            Expression::StructType($node) => $body,
            Expression::Swizzle($node) => $body,
            Expression::Type($node) => $body,
            Expression::Unary($node) => $body,
            Expression::VariableValue($node) => $body,
        }
    };
}

impl Expression {
    /// Tag of the concrete variant.
    pub fn node_kind(&self) -> NodeKind {
        match self {
            Expression::AccessIdentifier(_) => NodeKind::AccessIdentifierExpression,
            Expression::AccessIndex(_) => NodeKind::AccessIndexExpression,
            Expression::AliasValue(_) => NodeKind::AliasValueExpression,
            Expression::Assign(_) => NodeKind::AssignExpression,
            Expression::Binary(_) => NodeKind::BinaryExpression,
            Expression::CallFunction(_) => NodeKind::CallFunctionExpression,
            Expression::CallMethod(_) => NodeKind::CallMethodExpression,
            Expression::Cast(_) => NodeKind::CastExpression,
            Expression::Conditional(_) => NodeKind::ConditionalExpression,
            Expression::Constant(_) => NodeKind::ConstantExpression,
            Expression::ConstantValue(_) => NodeKind::ConstantValueExpression,
            Expression::Function(_) => NodeKind::FunctionExpression,
            Expression::Identifier(_) => NodeKind::IdentifierExpression,
            Expression::Intrinsic(_) => NodeKind::IntrinsicExpression,
            Expression::IntrinsicFunction(_) => NodeKind::IntrinsicFunctionExpression,
            Expression::StructType(_) => NodeKind::StructTypeExpression,
            Expression::Swizzle(_) => NodeKind::SwizzleExpression,
            Expression::Type(_) => NodeKind::TypeExpression,
            Expression::Unary(_) => NodeKind::UnaryExpression,
            Expression::VariableValue(_) => NodeKind::VariableValueExpression,
        }
    }

    /// Type computed by the sanitizer, if any.
    pub fn cached_type(&self) -> Option<&ExpressionType> {
        for_each_expression!(self, node => node.cached_type.as_ref())
    }

    /// Mutable access to the cached type slot.
    pub fn cached_type_mut(&mut self) -> &mut Option<ExpressionType> {
        for_each_expression!(self, node => &mut node.cached_type)
    }

    pub fn source_location(&self) -> &SourceLocation {
        for_each_expression!(self, node => &node.source_location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder;

    #[test]
    fn test_node_kind_and_cached_type() {
        let mut expr = builder::constant(ConstantValue::I32(1));
        assert_eq!(expr.node_kind(), NodeKind::ConstantValueExpression);
        assert!(expr.cached_type().is_some()); // builder caches literal types

        *expr.cached_type_mut() = None;
        assert!(expr.cached_type().is_none());
    }

    #[test]
    fn test_expression_value_states() {
        let unset: ExpressionValue<u32> = ExpressionValue::Unset;
        assert!(unset.is_unset());
        assert!(!unset.has_value());

        let value = ExpressionValue::from(3u32);
        assert_eq!(value.value(), Some(&3));
        assert!(value.expression().is_none());

        let expr = ExpressionValue::<u32>::Expression(Box::new(builder::constant(
            ConstantValue::U32(3),
        )));
        assert!(expr.has_value());
        assert!(expr.value().is_none());
        assert!(expr.expression().is_some());
    }

    #[test]
    fn test_swizzle_active_components() {
        let swizzle = SwizzleExpression {
            expression: Box::new(builder::constant(ConstantValue::F32(0.0))),
            components: [1, 2, 0, 0],
            component_count: 2,
            cached_type: None,
            source_location: SourceLocation::unknown(),
        };
        assert_eq!(swizzle.active_components(), &[1, 2]);
    }
}
