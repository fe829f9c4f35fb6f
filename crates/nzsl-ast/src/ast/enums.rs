//! Closed enums of the AST: operators, intrinsics, attributes parameters,
//! shader stages and the node-kind tag.
//!
//! Wire-visible discriminants are explicit and frozen: the binary module
//! format stores them as-is, so reordering a variant is a format break.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Assignment operators.
///
/// The compound logical forms are representable but never produced by the
/// surface language; the sanitizer only ever lowers them away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AssignOp {
    /// `a = b`
    Simple = 0,
    /// `a += b`
    CompoundAdd = 1,
    /// `a /= b`
    CompoundDivide = 2,
    /// `a *= b`
    CompoundMultiply = 3,
    /// `a &&= b`
    CompoundLogicalAnd = 4,
    /// `a ||= b`
    CompoundLogicalOr = 5,
    /// `a -= b`
    CompoundSubtract = 6,
    /// `a %= b`
    CompoundModulo = 7,
}

impl AssignOp {
    /// The binary operator a compound assignment lowers to, if any.
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Simple => None,
            AssignOp::CompoundAdd => Some(BinaryOp::Add),
            AssignOp::CompoundDivide => Some(BinaryOp::Divide),
            AssignOp::CompoundMultiply => Some(BinaryOp::Multiply),
            AssignOp::CompoundLogicalAnd => Some(BinaryOp::LogicalAnd),
            AssignOp::CompoundLogicalOr => Some(BinaryOp::LogicalOr),
            AssignOp::CompoundSubtract => Some(BinaryOp::Subtract),
            AssignOp::CompoundModulo => Some(BinaryOp::Modulo),
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BinaryOp {
    /// `+`
    Add = 0,
    /// `==`
    CompEq = 1,
    /// `>=`
    CompGe = 2,
    /// `>`
    CompGt = 3,
    /// `<=`
    CompLe = 4,
    /// `<`
    CompLt = 5,
    /// `!=`
    CompNe = 6,
    /// `/`
    Divide = 7,
    /// `*`
    Multiply = 8,
    /// `&&`
    LogicalAnd = 9,
    /// `||`
    LogicalOr = 10,
    /// `-`
    Subtract = 11,
    /// `%`
    Modulo = 12,
}

impl BinaryOp {
    /// Source-syntax token.
    pub fn token(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::CompEq => "==",
            BinaryOp::CompGe => ">=",
            BinaryOp::CompGt => ">",
            BinaryOp::CompLe => "<=",
            BinaryOp::CompLt => "<",
            BinaryOp::CompNe => "!=",
            BinaryOp::Divide => "/",
            BinaryOp::Multiply => "*",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::Subtract => "-",
            BinaryOp::Modulo => "%",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum UnaryOp {
    /// `!v`
    LogicalNot = 0,
    /// `-v`
    Minus = 1,
    /// `+v`
    Plus = 2,
}

/// Built-in callable operations.
///
/// Discriminants are wire-visible (serialized) and host-visible (SPIR-V
/// mapping tables index on them); they are frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum IntrinsicType {
    CrossProduct = 0,
    DotProduct = 1,
    SampleTexture = 2,
    Length = 3,
    Max = 4,
    Min = 5,
    Pow = 6,
    Exp = 7,
    Reflect = 8,
    Normalize = 9,
    Inverse = 10,
    Transpose = 11,
}

impl IntrinsicType {
    /// Source-level name of this intrinsic.
    pub fn name(self) -> &'static str {
        match self {
            IntrinsicType::CrossProduct => "cross",
            IntrinsicType::DotProduct => "dot",
            IntrinsicType::SampleTexture => "Sample",
            IntrinsicType::Length => "length",
            IntrinsicType::Max => "max",
            IntrinsicType::Min => "min",
            IntrinsicType::Pow => "pow",
            IntrinsicType::Exp => "exp",
            IntrinsicType::Reflect => "reflect",
            IntrinsicType::Normalize => "normalize",
            IntrinsicType::Inverse => "inverse",
            IntrinsicType::Transpose => "transpose",
        }
    }
}

/// Values an identifier can be declared `builtin` for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BuiltinEntry {
    /// `gl_Position` (vertex output)
    VertexPosition = 0,
    /// `gl_FragCoord` (fragment input)
    FragCoord = 1,
    /// `gl_FragDepth` (fragment output)
    FragDepth = 2,
}

impl BuiltinEntry {
    /// Source-level attribute parameter name.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinEntry::VertexPosition => "position",
            BuiltinEntry::FragCoord => "fragcoord",
            BuiltinEntry::FragDepth => "fragdepth",
        }
    }
}

/// Pipeline stages an entry point can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShaderStage {
    Vertex = 0,
    Fragment = 1,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Fragment];

    /// Human-readable stage name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

/// Set of shader stages, used to scope stage-restricted operations and to
/// pick dead-code-elimination roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ShaderStageFlags(u8);

impl ShaderStageFlags {
    pub const NONE: ShaderStageFlags = ShaderStageFlags(0);
    pub const VERTEX: ShaderStageFlags = ShaderStageFlags(1 << ShaderStage::Vertex as u8);
    pub const FRAGMENT: ShaderStageFlags = ShaderStageFlags(1 << ShaderStage::Fragment as u8);
    pub const ALL: ShaderStageFlags = ShaderStageFlags(
        (1 << ShaderStage::Vertex as u8) | (1 << ShaderStage::Fragment as u8),
    );

    pub fn from_stage(stage: ShaderStage) -> Self {
        ShaderStageFlags(1 << stage as u8)
    }

    pub fn contains(self, stage: ShaderStage) -> bool {
        (self.0 & (1 << stage as u8)) != 0
    }

    pub fn insert(&mut self, stage: ShaderStage) {
        self.0 |= 1 << stage as u8;
    }

    /// Intersection of two stage sets.
    pub fn intersection(self, other: ShaderStageFlags) -> ShaderStageFlags {
        ShaderStageFlags(self.0 & other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Stages present in this set, in declaration order.
    pub fn iter(self) -> impl Iterator<Item = ShaderStage> {
        ShaderStage::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

/// Fragment depth write modes (`depth_write` attribute parameters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DepthWriteMode {
    Greater = 0,
    Less = 1,
    Replace = 2,
    Unchanged = 3,
}

/// Loop unrolling modes (`unroll` attribute parameters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LoopUnroll {
    Always = 0,
    Hint = 1,
    Never = 2,
}

/// Struct memory layouts (`layout` attribute parameters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MemoryLayout {
    Std140 = 0,
}

/// Opt-in module feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ModuleFeature {
    /// Allows primitives, vectors and matrices in external blocks
    PrimitiveExternals = 0,
}

impl ModuleFeature {
    /// Source-level feature flag name.
    pub fn name(self) -> &'static str {
        match self {
            ModuleFeature::PrimitiveExternals => "primitive_externals",
        }
    }
}

impl fmt::Display for ModuleFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tag identifying each concrete node variant.
///
/// Expression tags come first, statement tags second; the serializer writes
/// these as single bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeKind {
    // expressions
    AccessIdentifierExpression = 0,
    AccessIndexExpression = 1,
    AliasValueExpression = 2,
    AssignExpression = 3,
    BinaryExpression = 4,
    CallFunctionExpression = 5,
    CallMethodExpression = 6,
    CastExpression = 7,
    ConditionalExpression = 8,
    ConstantExpression = 9,
    ConstantValueExpression = 10,
    FunctionExpression = 11,
    IdentifierExpression = 12,
    IntrinsicExpression = 13,
    IntrinsicFunctionExpression = 14,
    StructTypeExpression = 15,
    SwizzleExpression = 16,
    TypeExpression = 17,
    UnaryExpression = 18,
    VariableValueExpression = 19,

    // statements
    BranchStatement = 20,
    BreakStatement = 21,
    ConditionalStatement = 22,
    ContinueStatement = 23,
    DeclareAliasStatement = 24,
    DeclareConstStatement = 25,
    DeclareExternalStatement = 26,
    DeclareFunctionStatement = 27,
    DeclareOptionStatement = 28,
    DeclareStructStatement = 29,
    DeclareVariableStatement = 30,
    DiscardStatement = 31,
    ExpressionStatement = 32,
    ForStatement = 33,
    ForEachStatement = 34,
    ImportStatement = 35,
    MultiStatement = 36,
    NoOpStatement = 37,
    ReturnStatement = 38,
    ScopedStatement = 39,
    WhileStatement = 40,
}

impl NodeKind {
    /// Whether this tag names an expression variant.
    pub fn is_expression(self) -> bool {
        (self as u8) <= (NodeKind::VariableValueExpression as u8)
    }

    /// Whether this tag names a statement variant.
    pub fn is_statement(self) -> bool {
        !self.is_expression()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_partition() {
        assert!(NodeKind::BinaryExpression.is_expression());
        assert!(!NodeKind::BinaryExpression.is_statement());
        assert!(NodeKind::BranchStatement.is_statement());
        assert!(NodeKind::WhileStatement.is_statement());
    }

    #[test]
    fn test_compound_assign_lowering() {
        assert_eq!(AssignOp::CompoundAdd.binary_op(), Some(BinaryOp::Add));
        assert_eq!(AssignOp::Simple.binary_op(), None);
        assert_eq!(
            AssignOp::CompoundLogicalOr.binary_op(),
            Some(BinaryOp::LogicalOr)
        );
    }

    #[test]
    fn test_stage_flags() {
        let mut flags = ShaderStageFlags::NONE;
        assert!(flags.is_empty());

        flags.insert(ShaderStage::Fragment);
        assert!(flags.contains(ShaderStage::Fragment));
        assert!(!flags.contains(ShaderStage::Vertex));

        assert_eq!(
            ShaderStageFlags::ALL.intersection(ShaderStageFlags::VERTEX),
            ShaderStageFlags::VERTEX
        );
        assert_eq!(
            ShaderStageFlags::ALL.iter().collect::<Vec<_>>(),
            vec![ShaderStage::Vertex, ShaderStage::Fragment]
        );
    }

    #[test]
    fn test_comp_ne_is_distinct_from_comp_le() {
        // != and <= are distinct operators with distinct tokens
        assert_ne!(BinaryOp::CompNe, BinaryOp::CompLe);
        assert_eq!(BinaryOp::CompNe.token(), "!=");
        assert_eq!(BinaryOp::CompLe.token(), "<=");
    }
}
