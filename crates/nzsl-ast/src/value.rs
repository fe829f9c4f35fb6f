//! Constant values and their compile-time evaluation.
//!
//! [`ConstantValue`] is the payload of a folded expression: scalars, 2/3/4
//! component vectors and square `f32` matrices. The [`ops`] module evaluates
//! operators over these values; it is the single place arithmetic semantics
//! live, shared by the sanitizer (const declarations, options, array sizes)
//! and the constant-propagation pass.
//!
//! Unsupported operand combinations are not errors: evaluation returns
//! `None` and the caller keeps the original expression tree. Integer
//! division or modulo by zero is an error, with both folded operands
//! rendered in source syntax.

use crate::error::ErrorKind;
use crate::foundation::{Matrix2, Matrix3, Matrix4, Vector2, Vector3, Vector4};
use crate::types::{ExpressionType, MatrixType, PrimitiveType, VectorType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A compile-time value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    /// Absence of a value (unset option defaults and the like)
    NoValue,
    Bool(bool),
    F32(f32),
    I32(i32),
    U32(u32),
    String(String),
    Vec2F32(Vector2<f32>),
    Vec3F32(Vector3<f32>),
    Vec4F32(Vector4<f32>),
    Vec2I32(Vector2<i32>),
    Vec3I32(Vector3<i32>),
    Vec4I32(Vector4<i32>),
    Vec2U32(Vector2<u32>),
    Vec3U32(Vector3<u32>),
    Vec4U32(Vector4<u32>),
    Vec2Bool(Vector2<bool>),
    Vec3Bool(Vector3<bool>),
    Vec4Bool(Vector4<bool>),
    Mat2F32(Matrix2),
    Mat3F32(Matrix3),
    Mat4F32(Matrix4),
}

impl ConstantValue {
    /// The static type of this value.
    pub fn type_of(&self) -> ExpressionType {
        let vector = |count, component_type| {
            ExpressionType::Vector(VectorType {
                component_count: count,
                component_type,
            })
        };
        let matrix = |dim| {
            ExpressionType::Matrix(MatrixType {
                column_count: dim,
                row_count: dim,
                component_type: PrimitiveType::Float32,
            })
        };

        match self {
            ConstantValue::NoValue => ExpressionType::NoType,
            ConstantValue::Bool(_) => ExpressionType::Primitive(PrimitiveType::Boolean),
            ConstantValue::F32(_) => ExpressionType::Primitive(PrimitiveType::Float32),
            ConstantValue::I32(_) => ExpressionType::Primitive(PrimitiveType::Int32),
            ConstantValue::U32(_) => ExpressionType::Primitive(PrimitiveType::UInt32),
            ConstantValue::String(_) => ExpressionType::Primitive(PrimitiveType::String),
            ConstantValue::Vec2F32(_) => vector(2, PrimitiveType::Float32),
            ConstantValue::Vec3F32(_) => vector(3, PrimitiveType::Float32),
            ConstantValue::Vec4F32(_) => vector(4, PrimitiveType::Float32),
            ConstantValue::Vec2I32(_) => vector(2, PrimitiveType::Int32),
            ConstantValue::Vec3I32(_) => vector(3, PrimitiveType::Int32),
            ConstantValue::Vec4I32(_) => vector(4, PrimitiveType::Int32),
            ConstantValue::Vec2U32(_) => vector(2, PrimitiveType::UInt32),
            ConstantValue::Vec3U32(_) => vector(3, PrimitiveType::UInt32),
            ConstantValue::Vec4U32(_) => vector(4, PrimitiveType::UInt32),
            ConstantValue::Vec2Bool(_) => vector(2, PrimitiveType::Boolean),
            ConstantValue::Vec3Bool(_) => vector(3, PrimitiveType::Boolean),
            ConstantValue::Vec4Bool(_) => vector(4, PrimitiveType::Boolean),
            ConstantValue::Mat2F32(_) => matrix(2),
            ConstantValue::Mat3F32(_) => matrix(3),
            ConstantValue::Mat4F32(_) => matrix(4),
        }
    }

    /// Extract a boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstantValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Extract a `u32`, accepting non-negative `i32` values as well (array
    /// lengths and binding indices are written as plain integer literals).
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ConstantValue::U32(value) => Some(*value),
            ConstantValue::I32(value) if *value >= 0 => Some(*value as u32),
            _ => None,
        }
    }
}

fn write_f32(f: &mut fmt::Formatter<'_>, value: f32) -> fmt::Result {
    if value.is_finite() {
        write!(f, "{:.6}", value)
    } else {
        write!(f, "{}", value)
    }
}

macro_rules! write_vector {
    ($f:expr, $count:literal, $name:literal, $v:expr) => {{
        write!($f, concat!("vec", $count, "[", $name, "]("))?;
        for (i, component) in $v.components().iter().enumerate() {
            if i != 0 {
                write!($f, ", ")?;
            }
            write!($f, "{}", component)?;
        }
        write!($f, ")")
    }};
}

macro_rules! write_vector_f32 {
    ($f:expr, $count:literal, $v:expr) => {{
        write!($f, concat!("vec", $count, "[f32]("))?;
        for (i, component) in $v.components().iter().enumerate() {
            if i != 0 {
                write!($f, ", ")?;
            }
            write_f32($f, *component)?;
        }
        write!($f, ")")
    }};
}

impl fmt::Display for ConstantValue {
    /// Renders the source-syntax literal form, used verbatim in error
    /// messages (`42`, `3.000000`, `vec4[i32](7, 6, 5, 4)`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::NoValue => write!(f, "<no value>"),
            ConstantValue::Bool(v) => write!(f, "{}", v),
            ConstantValue::F32(v) => write_f32(f, *v),
            ConstantValue::I32(v) => write!(f, "{}", v),
            ConstantValue::U32(v) => write!(f, "{}", v),
            ConstantValue::String(v) => write!(f, "\"{}\"", v),
            ConstantValue::Vec2F32(v) => write_vector_f32!(f, 2, v),
            ConstantValue::Vec3F32(v) => write_vector_f32!(f, 3, v),
            ConstantValue::Vec4F32(v) => write_vector_f32!(f, 4, v),
            ConstantValue::Vec2I32(v) => write_vector!(f, 2, "i32", v),
            ConstantValue::Vec3I32(v) => write_vector!(f, 3, "i32", v),
            ConstantValue::Vec4I32(v) => write_vector!(f, 4, "i32", v),
            ConstantValue::Vec2U32(v) => write_vector!(f, 2, "u32", v),
            ConstantValue::Vec3U32(v) => write_vector!(f, 3, "u32", v),
            ConstantValue::Vec4U32(v) => write_vector!(f, 4, "u32", v),
            ConstantValue::Vec2Bool(v) => write_vector!(f, 2, "bool", v),
            ConstantValue::Vec3Bool(v) => write_vector!(f, 3, "bool", v),
            ConstantValue::Vec4Bool(v) => write_vector!(f, 4, "bool", v),
            ConstantValue::Mat2F32(m) => {
                write!(f, "mat2[f32](")?;
                write_matrix_components(f, &m.columns.iter().flat_map(|c| c.components()).collect::<Vec<_>>())?;
                write!(f, ")")
            }
            ConstantValue::Mat3F32(m) => {
                write!(f, "mat3[f32](")?;
                write_matrix_components(f, &m.columns.iter().flat_map(|c| c.components()).collect::<Vec<_>>())?;
                write!(f, ")")
            }
            ConstantValue::Mat4F32(m) => {
                write!(f, "mat4[f32](")?;
                write_matrix_components(f, &m.columns.iter().flat_map(|c| c.components()).collect::<Vec<_>>())?;
                write!(f, ")")
            }
        }
    }
}

fn write_matrix_components(f: &mut fmt::Formatter<'_>, components: &[f32]) -> fmt::Result {
    for (i, component) in components.iter().enumerate() {
        if i != 0 {
            write!(f, ", ")?;
        }
        write_f32(f, *component)?;
    }
    Ok(())
}

/// Operator evaluation over [`ConstantValue`]s.
pub mod ops {
    use super::*;
    use crate::ast::{BinaryOp, UnaryOp};

    type FoldResult = Result<Option<ConstantValue>, ErrorKind>;

    fn division_by_zero(lhs: &ConstantValue, rhs: &ConstantValue) -> ErrorKind {
        ErrorKind::IntegralDivisionByZero {
            expression: format!("({} / {})", lhs, rhs),
        }
    }

    fn modulo_by_zero(lhs: &ConstantValue, rhs: &ConstantValue) -> ErrorKind {
        ErrorKind::IntegralModuloByZero {
            expression: format!("({} % {})", lhs, rhs),
        }
    }

    macro_rules! arithmetic {
        ($op:ident, $lhs:ident, $rhs:ident,
         float: $float:expr, int: $int:expr, uint: $uint:expr) => {
            match ($lhs, $rhs) {
                (ConstantValue::F32(a), ConstantValue::F32(b)) => {
                    Some(ConstantValue::F32($float(*a, *b)))
                }
                (ConstantValue::I32(a), ConstantValue::I32(b)) => {
                    Some(ConstantValue::I32($int(*a, *b)))
                }
                (ConstantValue::U32(a), ConstantValue::U32(b)) => {
                    Some(ConstantValue::U32($uint(*a, *b)))
                }
                (ConstantValue::Vec2F32(a), ConstantValue::Vec2F32(b)) => {
                    Some(ConstantValue::Vec2F32(a.zip_with(*b, $float)))
                }
                (ConstantValue::Vec3F32(a), ConstantValue::Vec3F32(b)) => {
                    Some(ConstantValue::Vec3F32(a.zip_with(*b, $float)))
                }
                (ConstantValue::Vec4F32(a), ConstantValue::Vec4F32(b)) => {
                    Some(ConstantValue::Vec4F32(a.zip_with(*b, $float)))
                }
                (ConstantValue::Vec2I32(a), ConstantValue::Vec2I32(b)) => {
                    Some(ConstantValue::Vec2I32(a.zip_with(*b, $int)))
                }
                (ConstantValue::Vec3I32(a), ConstantValue::Vec3I32(b)) => {
                    Some(ConstantValue::Vec3I32(a.zip_with(*b, $int)))
                }
                (ConstantValue::Vec4I32(a), ConstantValue::Vec4I32(b)) => {
                    Some(ConstantValue::Vec4I32(a.zip_with(*b, $int)))
                }
                (ConstantValue::Vec2U32(a), ConstantValue::Vec2U32(b)) => {
                    Some(ConstantValue::Vec2U32(a.zip_with(*b, $uint)))
                }
                (ConstantValue::Vec3U32(a), ConstantValue::Vec3U32(b)) => {
                    Some(ConstantValue::Vec3U32(a.zip_with(*b, $uint)))
                }
                (ConstantValue::Vec4U32(a), ConstantValue::Vec4U32(b)) => {
                    Some(ConstantValue::Vec4U32(a.zip_with(*b, $uint)))
                }
                _ => None,
            }
        };
    }

    /// Whether any integer lane of the divisor is zero.
    fn has_zero_integer_lane(value: &ConstantValue) -> bool {
        match value {
            ConstantValue::I32(v) => *v == 0,
            ConstantValue::U32(v) => *v == 0,
            ConstantValue::Vec2I32(v) => v.components().contains(&0),
            ConstantValue::Vec3I32(v) => v.components().contains(&0),
            ConstantValue::Vec4I32(v) => v.components().contains(&0),
            ConstantValue::Vec2U32(v) => v.components().contains(&0),
            ConstantValue::Vec3U32(v) => v.components().contains(&0),
            ConstantValue::Vec4U32(v) => v.components().contains(&0),
            _ => false,
        }
    }

    fn add(lhs: &ConstantValue, rhs: &ConstantValue) -> Option<ConstantValue> {
        match (lhs, rhs) {
            (ConstantValue::Mat2F32(a), ConstantValue::Mat2F32(b)) => {
                Some(ConstantValue::Mat2F32(*a + *b))
            }
            (ConstantValue::Mat3F32(a), ConstantValue::Mat3F32(b)) => {
                Some(ConstantValue::Mat3F32(*a + *b))
            }
            (ConstantValue::Mat4F32(a), ConstantValue::Mat4F32(b)) => {
                Some(ConstantValue::Mat4F32(*a + *b))
            }
            _ => arithmetic!(Add, lhs, rhs,
                float: |a: f32, b: f32| a + b,
                int: |a: i32, b: i32| a.wrapping_add(b),
                uint: |a: u32, b: u32| a.wrapping_add(b)),
        }
    }

    fn sub(lhs: &ConstantValue, rhs: &ConstantValue) -> Option<ConstantValue> {
        match (lhs, rhs) {
            (ConstantValue::Mat2F32(a), ConstantValue::Mat2F32(b)) => {
                Some(ConstantValue::Mat2F32(*a - *b))
            }
            (ConstantValue::Mat3F32(a), ConstantValue::Mat3F32(b)) => {
                Some(ConstantValue::Mat3F32(*a - *b))
            }
            (ConstantValue::Mat4F32(a), ConstantValue::Mat4F32(b)) => {
                Some(ConstantValue::Mat4F32(*a - *b))
            }
            _ => arithmetic!(Sub, lhs, rhs,
                float: |a: f32, b: f32| a - b,
                int: |a: i32, b: i32| a.wrapping_sub(b),
                uint: |a: u32, b: u32| a.wrapping_sub(b)),
        }
    }

    fn mul(lhs: &ConstantValue, rhs: &ConstantValue) -> Option<ConstantValue> {
        match (lhs, rhs) {
            // linear algebra
            (ConstantValue::Mat2F32(a), ConstantValue::Mat2F32(b)) => {
                Some(ConstantValue::Mat2F32(*a * *b))
            }
            (ConstantValue::Mat3F32(a), ConstantValue::Mat3F32(b)) => {
                Some(ConstantValue::Mat3F32(*a * *b))
            }
            (ConstantValue::Mat4F32(a), ConstantValue::Mat4F32(b)) => {
                Some(ConstantValue::Mat4F32(*a * *b))
            }
            (ConstantValue::Mat2F32(m), ConstantValue::Vec2F32(v)) => {
                Some(ConstantValue::Vec2F32(m.transform(*v)))
            }
            (ConstantValue::Mat3F32(m), ConstantValue::Vec3F32(v)) => {
                Some(ConstantValue::Vec3F32(m.transform(*v)))
            }
            (ConstantValue::Mat4F32(m), ConstantValue::Vec4F32(v)) => {
                Some(ConstantValue::Vec4F32(m.transform(*v)))
            }
            // scalar * vector / vector * scalar
            (ConstantValue::F32(s), ConstantValue::Vec2F32(v))
            | (ConstantValue::Vec2F32(v), ConstantValue::F32(s)) => {
                Some(ConstantValue::Vec2F32(v.map(|c| c * s)))
            }
            (ConstantValue::F32(s), ConstantValue::Vec3F32(v))
            | (ConstantValue::Vec3F32(v), ConstantValue::F32(s)) => {
                Some(ConstantValue::Vec3F32(v.map(|c| c * s)))
            }
            (ConstantValue::F32(s), ConstantValue::Vec4F32(v))
            | (ConstantValue::Vec4F32(v), ConstantValue::F32(s)) => {
                Some(ConstantValue::Vec4F32(v.map(|c| c * s)))
            }
            (ConstantValue::I32(s), ConstantValue::Vec2I32(v))
            | (ConstantValue::Vec2I32(v), ConstantValue::I32(s)) => {
                Some(ConstantValue::Vec2I32(v.map(|c| c.wrapping_mul(*s))))
            }
            (ConstantValue::I32(s), ConstantValue::Vec3I32(v))
            | (ConstantValue::Vec3I32(v), ConstantValue::I32(s)) => {
                Some(ConstantValue::Vec3I32(v.map(|c| c.wrapping_mul(*s))))
            }
            (ConstantValue::I32(s), ConstantValue::Vec4I32(v))
            | (ConstantValue::Vec4I32(v), ConstantValue::I32(s)) => {
                Some(ConstantValue::Vec4I32(v.map(|c| c.wrapping_mul(*s))))
            }
            (ConstantValue::U32(s), ConstantValue::Vec2U32(v))
            | (ConstantValue::Vec2U32(v), ConstantValue::U32(s)) => {
                Some(ConstantValue::Vec2U32(v.map(|c| c.wrapping_mul(*s))))
            }
            (ConstantValue::U32(s), ConstantValue::Vec3U32(v))
            | (ConstantValue::Vec3U32(v), ConstantValue::U32(s)) => {
                Some(ConstantValue::Vec3U32(v.map(|c| c.wrapping_mul(*s))))
            }
            (ConstantValue::U32(s), ConstantValue::Vec4U32(v))
            | (ConstantValue::Vec4U32(v), ConstantValue::U32(s)) => {
                Some(ConstantValue::Vec4U32(v.map(|c| c.wrapping_mul(*s))))
            }
            _ => arithmetic!(Mul, lhs, rhs,
                float: |a: f32, b: f32| a * b,
                int: |a: i32, b: i32| a.wrapping_mul(b),
                uint: |a: u32, b: u32| a.wrapping_mul(b)),
        }
    }

    fn div(lhs: &ConstantValue, rhs: &ConstantValue) -> FoldResult {
        if has_zero_integer_lane(rhs) {
            return Err(division_by_zero(lhs, rhs));
        }

        Ok(arithmetic!(Div, lhs, rhs,
            float: |a: f32, b: f32| a / b,
            int: |a: i32, b: i32| a.wrapping_div(b),
            uint: |a: u32, b: u32| a / b))
    }

    fn rem(lhs: &ConstantValue, rhs: &ConstantValue) -> FoldResult {
        if has_zero_integer_lane(rhs) {
            return Err(modulo_by_zero(lhs, rhs));
        }

        Ok(arithmetic!(Rem, lhs, rhs,
            float: |a: f32, b: f32| a % b,
            int: |a: i32, b: i32| a.wrapping_rem(b),
            uint: |a: u32, b: u32| a % b))
    }

    fn compare_eq(lhs: &ConstantValue, rhs: &ConstantValue) -> Option<bool> {
        match (lhs, rhs) {
            (ConstantValue::Bool(a), ConstantValue::Bool(b)) => Some(a == b),
            (ConstantValue::F32(a), ConstantValue::F32(b)) => Some(a == b),
            (ConstantValue::I32(a), ConstantValue::I32(b)) => Some(a == b),
            (ConstantValue::U32(a), ConstantValue::U32(b)) => Some(a == b),
            (ConstantValue::String(a), ConstantValue::String(b)) => Some(a == b),
            (ConstantValue::Vec2F32(a), ConstantValue::Vec2F32(b)) => Some(a == b),
            (ConstantValue::Vec3F32(a), ConstantValue::Vec3F32(b)) => Some(a == b),
            (ConstantValue::Vec4F32(a), ConstantValue::Vec4F32(b)) => Some(a == b),
            (ConstantValue::Vec2I32(a), ConstantValue::Vec2I32(b)) => Some(a == b),
            (ConstantValue::Vec3I32(a), ConstantValue::Vec3I32(b)) => Some(a == b),
            (ConstantValue::Vec4I32(a), ConstantValue::Vec4I32(b)) => Some(a == b),
            (ConstantValue::Vec2U32(a), ConstantValue::Vec2U32(b)) => Some(a == b),
            (ConstantValue::Vec3U32(a), ConstantValue::Vec3U32(b)) => Some(a == b),
            (ConstantValue::Vec4U32(a), ConstantValue::Vec4U32(b)) => Some(a == b),
            (ConstantValue::Vec2Bool(a), ConstantValue::Vec2Bool(b)) => Some(a == b),
            (ConstantValue::Vec3Bool(a), ConstantValue::Vec3Bool(b)) => Some(a == b),
            (ConstantValue::Vec4Bool(a), ConstantValue::Vec4Bool(b)) => Some(a == b),
            _ => None,
        }
    }

    fn compare_order(lhs: &ConstantValue, rhs: &ConstantValue) -> Option<std::cmp::Ordering> {
        match (lhs, rhs) {
            (ConstantValue::F32(a), ConstantValue::F32(b)) => a.partial_cmp(b),
            (ConstantValue::I32(a), ConstantValue::I32(b)) => Some(a.cmp(b)),
            (ConstantValue::U32(a), ConstantValue::U32(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Evaluate a binary operator over two constants.
    ///
    /// `Ok(None)` means the combination is not foldable (the caller keeps
    /// the unfolded expression); `Err` carries a zero-division/modulo kind.
    pub fn binary(op: BinaryOp, lhs: &ConstantValue, rhs: &ConstantValue) -> FoldResult {
        use std::cmp::Ordering;

        match op {
            BinaryOp::Add => Ok(add(lhs, rhs)),
            BinaryOp::Subtract => Ok(sub(lhs, rhs)),
            BinaryOp::Multiply => Ok(mul(lhs, rhs)),
            BinaryOp::Divide => div(lhs, rhs),
            BinaryOp::Modulo => rem(lhs, rhs),
            BinaryOp::CompEq => Ok(compare_eq(lhs, rhs).map(ConstantValue::Bool)),
            BinaryOp::CompNe => Ok(compare_eq(lhs, rhs).map(|eq| ConstantValue::Bool(!eq))),
            BinaryOp::CompLt => Ok(compare_order(lhs, rhs)
                .map(|ord| ConstantValue::Bool(ord == Ordering::Less))),
            BinaryOp::CompLe => Ok(compare_order(lhs, rhs)
                .map(|ord| ConstantValue::Bool(ord != Ordering::Greater))),
            BinaryOp::CompGt => Ok(compare_order(lhs, rhs)
                .map(|ord| ConstantValue::Bool(ord == Ordering::Greater))),
            BinaryOp::CompGe => Ok(compare_order(lhs, rhs)
                .map(|ord| ConstantValue::Bool(ord != Ordering::Less))),
            BinaryOp::LogicalAnd => Ok(match (lhs, rhs) {
                (ConstantValue::Bool(a), ConstantValue::Bool(b)) => {
                    Some(ConstantValue::Bool(*a && *b))
                }
                _ => None,
            }),
            BinaryOp::LogicalOr => Ok(match (lhs, rhs) {
                (ConstantValue::Bool(a), ConstantValue::Bool(b)) => {
                    Some(ConstantValue::Bool(*a || *b))
                }
                _ => None,
            }),
        }
    }

    /// Evaluate a unary operator over a constant.
    pub fn unary(op: UnaryOp, operand: &ConstantValue) -> Option<ConstantValue> {
        match op {
            UnaryOp::LogicalNot => match operand {
                ConstantValue::Bool(v) => Some(ConstantValue::Bool(!v)),
                ConstantValue::Vec2Bool(v) => Some(ConstantValue::Vec2Bool(v.map(|c| !c))),
                ConstantValue::Vec3Bool(v) => Some(ConstantValue::Vec3Bool(v.map(|c| !c))),
                ConstantValue::Vec4Bool(v) => Some(ConstantValue::Vec4Bool(v.map(|c| !c))),
                _ => None,
            },
            UnaryOp::Minus => match operand {
                ConstantValue::F32(v) => Some(ConstantValue::F32(-v)),
                ConstantValue::I32(v) => Some(ConstantValue::I32(v.wrapping_neg())),
                ConstantValue::Vec2F32(v) => Some(ConstantValue::Vec2F32(v.map(|c| -c))),
                ConstantValue::Vec3F32(v) => Some(ConstantValue::Vec3F32(v.map(|c| -c))),
                ConstantValue::Vec4F32(v) => Some(ConstantValue::Vec4F32(v.map(|c| -c))),
                ConstantValue::Vec2I32(v) => {
                    Some(ConstantValue::Vec2I32(v.map(|c| c.wrapping_neg())))
                }
                ConstantValue::Vec3I32(v) => {
                    Some(ConstantValue::Vec3I32(v.map(|c| c.wrapping_neg())))
                }
                ConstantValue::Vec4I32(v) => {
                    Some(ConstantValue::Vec4I32(v.map(|c| c.wrapping_neg())))
                }
                ConstantValue::Mat2F32(m) => {
                    Some(ConstantValue::Mat2F32(m.zip_with(Matrix2::default(), |a, _| -a)))
                }
                ConstantValue::Mat3F32(m) => {
                    Some(ConstantValue::Mat3F32(m.zip_with(Matrix3::default(), |a, _| -a)))
                }
                ConstantValue::Mat4F32(m) => {
                    Some(ConstantValue::Mat4F32(m.zip_with(Matrix4::default(), |a, _| -a)))
                }
                _ => None,
            },
            UnaryOp::Plus => match operand {
                ConstantValue::F32(_)
                | ConstantValue::I32(_)
                | ConstantValue::U32(_)
                | ConstantValue::Vec2F32(_)
                | ConstantValue::Vec3F32(_)
                | ConstantValue::Vec4F32(_)
                | ConstantValue::Vec2I32(_)
                | ConstantValue::Vec3I32(_)
                | ConstantValue::Vec4I32(_)
                | ConstantValue::Vec2U32(_)
                | ConstantValue::Vec3U32(_)
                | ConstantValue::Vec4U32(_) => Some(operand.clone()),
                _ => None,
            },
        }
    }

    /// Scalar components of a value, in declaration order, as `f64`
    /// together with the source primitive type. Used to flatten cast
    /// operand lists.
    fn scalar_components(value: &ConstantValue) -> Option<(Vec<f64>, PrimitiveType)> {
        let floats = |v: &[f32]| v.iter().map(|c| *c as f64).collect::<Vec<_>>();
        let ints = |v: &[i32]| v.iter().map(|c| *c as f64).collect::<Vec<_>>();
        let uints = |v: &[u32]| v.iter().map(|c| *c as f64).collect::<Vec<_>>();

        match value {
            ConstantValue::F32(v) => Some((vec![*v as f64], PrimitiveType::Float32)),
            ConstantValue::I32(v) => Some((vec![*v as f64], PrimitiveType::Int32)),
            ConstantValue::U32(v) => Some((vec![*v as f64], PrimitiveType::UInt32)),
            ConstantValue::Vec2F32(v) => Some((floats(&v.components()), PrimitiveType::Float32)),
            ConstantValue::Vec3F32(v) => Some((floats(&v.components()), PrimitiveType::Float32)),
            ConstantValue::Vec4F32(v) => Some((floats(&v.components()), PrimitiveType::Float32)),
            ConstantValue::Vec2I32(v) => Some((ints(&v.components()), PrimitiveType::Int32)),
            ConstantValue::Vec3I32(v) => Some((ints(&v.components()), PrimitiveType::Int32)),
            ConstantValue::Vec4I32(v) => Some((ints(&v.components()), PrimitiveType::Int32)),
            ConstantValue::Vec2U32(v) => Some((uints(&v.components()), PrimitiveType::UInt32)),
            ConstantValue::Vec3U32(v) => Some((uints(&v.components()), PrimitiveType::UInt32)),
            ConstantValue::Vec4U32(v) => Some((uints(&v.components()), PrimitiveType::UInt32)),
            _ => None,
        }
    }

    fn build_scalar(component_type: PrimitiveType, value: f64) -> Option<ConstantValue> {
        match component_type {
            PrimitiveType::Float32 => Some(ConstantValue::F32(value as f32)),
            PrimitiveType::Int32 => Some(ConstantValue::I32(value as i32)),
            PrimitiveType::UInt32 => Some(ConstantValue::U32(value as u32)),
            _ => None,
        }
    }

    fn build_vector(component_type: PrimitiveType, components: &[f64]) -> Option<ConstantValue> {
        macro_rules! build {
            ($variant2:ident, $variant3:ident, $variant4:ident, $conv:expr) => {{
                let converted: Vec<_> = components.iter().map(|c| $conv(*c)).collect();
                match converted.len() {
                    2 => Some(ConstantValue::$variant2(Vector2::from_slice(&converted))),
                    3 => Some(ConstantValue::$variant3(Vector3::from_slice(&converted))),
                    4 => Some(ConstantValue::$variant4(Vector4::from_slice(&converted))),
                    _ => None,
                }
            }};
        }

        match component_type {
            PrimitiveType::Float32 => build!(Vec2F32, Vec3F32, Vec4F32, |c: f64| c as f32),
            PrimitiveType::Int32 => build!(Vec2I32, Vec3I32, Vec4I32, |c: f64| c as i32),
            PrimitiveType::UInt32 => build!(Vec2U32, Vec3U32, Vec4U32, |c: f64| c as u32),
            _ => None,
        }
    }

    /// Evaluate an explicit cast over constant operands.
    ///
    /// Handles numeric scalar conversions, scalar-to-vector replication,
    /// vector conversions and flattened component lists (`vec4(vec3, 1.0)`).
    /// Returns `None` for target shapes that have no constant form.
    pub fn cast(target: &ExpressionType, operands: &[ConstantValue]) -> Option<ConstantValue> {
        match target {
            ExpressionType::Primitive(p) => {
                if operands.len() != 1 {
                    return None;
                }

                let (components, _) = scalar_components(&operands[0])?;
                if components.len() != 1 {
                    return None;
                }

                build_scalar(*p, components[0])
            }
            ExpressionType::Vector(v) => {
                let mut components = Vec::new();
                for operand in operands {
                    let (mut operand_components, _) = scalar_components(operand)?;
                    components.append(&mut operand_components);
                }

                // single scalar replicates to the full width
                if components.len() == 1 {
                    components = vec![components[0]; v.component_count as usize];
                }

                if components.len() != v.component_count as usize {
                    return None;
                }

                build_vector(v.component_type, &components)
            }
            _ => None,
        }
    }

    /// Evaluate a swizzle over a constant vector (or scalar).
    ///
    /// Selecting one component yields a scalar; selecting several yields a
    /// vector of that many components.
    pub fn swizzle(operand: &ConstantValue, components: &[u32]) -> Option<ConstantValue> {
        let (source, component_type) = scalar_components(operand)?;

        let selected: Option<Vec<f64>> = components
            .iter()
            .map(|&index| source.get(index as usize).copied())
            .collect();
        let selected = selected?;

        if selected.len() == 1 {
            build_scalar(component_type, selected[0])
        } else {
            build_vector(component_type, &selected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, UnaryOp};

    #[test]
    fn test_integer_wrap() {
        let folded = ops::binary(
            BinaryOp::Add,
            &ConstantValue::I32(i32::MAX),
            &ConstantValue::I32(1),
        )
        .unwrap()
        .unwrap();
        assert_eq!(folded, ConstantValue::I32(i32::MIN));
    }

    #[test]
    fn test_integer_division_by_zero() {
        let error = ops::binary(
            BinaryOp::Divide,
            &ConstantValue::I32(42),
            &ConstantValue::I32(0),
        )
        .unwrap_err();

        assert_eq!(
            error,
            ErrorKind::IntegralDivisionByZero {
                expression: "(42 / 0)".to_string()
            }
        );
    }

    #[test]
    fn test_vector_division_by_zero_lane() {
        let lhs = ConstantValue::Vec4I32(Vector4::new(7, 6, 5, 4));
        let rhs = ConstantValue::Vec4I32(Vector4::new(3, 2, 1, 0));
        let error = ops::binary(BinaryOp::Divide, &lhs, &rhs).unwrap_err();

        assert_eq!(
            error,
            ErrorKind::IntegralDivisionByZero {
                expression: "(vec4[i32](7, 6, 5, 4) / vec4[i32](3, 2, 1, 0))".to_string()
            }
        );
    }

    #[test]
    fn test_modulo_by_zero() {
        let error = ops::binary(
            BinaryOp::Modulo,
            &ConstantValue::I32(42),
            &ConstantValue::I32(0),
        )
        .unwrap_err();
        assert_eq!(error.code(), "IntegralModuloByZero");
    }

    #[test]
    fn test_float_division_by_zero_is_silent() {
        let folded = ops::binary(
            BinaryOp::Divide,
            &ConstantValue::F32(1.0),
            &ConstantValue::F32(0.0),
        )
        .unwrap()
        .unwrap();
        assert_eq!(folded, ConstantValue::F32(f32::INFINITY));
    }

    #[test]
    fn test_matrix_vector_product() {
        let m = ConstantValue::Mat2F32(Matrix2::identity());
        let v = ConstantValue::Vec2F32(Vector2::new(4.0, 5.0));
        let folded = ops::binary(BinaryOp::Multiply, &m, &v).unwrap().unwrap();
        assert_eq!(folded, v);
    }

    #[test]
    fn test_comparisons() {
        let folded = ops::binary(
            BinaryOp::CompLe,
            &ConstantValue::U32(2),
            &ConstantValue::U32(3),
        )
        .unwrap()
        .unwrap();
        assert_eq!(folded, ConstantValue::Bool(true));

        let folded = ops::binary(
            BinaryOp::CompNe,
            &ConstantValue::I32(1),
            &ConstantValue::I32(1),
        )
        .unwrap()
        .unwrap();
        assert_eq!(folded, ConstantValue::Bool(false));
    }

    #[test]
    fn test_unary_minus() {
        let folded = ops::unary(UnaryOp::Minus, &ConstantValue::I32(i32::MIN)).unwrap();
        assert_eq!(folded, ConstantValue::I32(i32::MIN)); // wraps
    }

    #[test]
    fn test_cast_scalar_conversion() {
        let target = ExpressionType::Primitive(PrimitiveType::Int32);
        let folded = ops::cast(&target, &[ConstantValue::F32(3.7)]).unwrap();
        assert_eq!(folded, ConstantValue::I32(3));
    }

    #[test]
    fn test_cast_scalar_replication() {
        let target = ExpressionType::Vector(VectorType {
            component_count: 3,
            component_type: PrimitiveType::Float32,
        });
        let folded = ops::cast(&target, &[ConstantValue::F32(1.5)]).unwrap();
        assert_eq!(folded, ConstantValue::Vec3F32(Vector3::new(1.5, 1.5, 1.5)));
    }

    #[test]
    fn test_cast_component_list() {
        let target = ExpressionType::Vector(VectorType {
            component_count: 4,
            component_type: PrimitiveType::Float32,
        });
        let folded = ops::cast(
            &target,
            &[
                ConstantValue::Vec3F32(Vector3::new(1.0, 2.0, 3.0)),
                ConstantValue::F32(4.0),
            ],
        )
        .unwrap();
        assert_eq!(
            folded,
            ConstantValue::Vec4F32(Vector4::new(1.0, 2.0, 3.0, 4.0))
        );
    }

    #[test]
    fn test_swizzle_reorders() {
        let source = ConstantValue::Vec4F32(Vector4::new(3.0, 0.0, 1.0, 2.0));
        let folded = ops::swizzle(&source, &[1, 2, 3, 0]).unwrap();
        assert_eq!(
            folded,
            ConstantValue::Vec4F32(Vector4::new(0.0, 1.0, 2.0, 3.0))
        );
    }

    #[test]
    fn test_swizzle_single_component_is_scalar() {
        let source = ConstantValue::Vec3I32(Vector3::new(7, 8, 9));
        let folded = ops::swizzle(&source, &[2]).unwrap();
        assert_eq!(folded, ConstantValue::I32(9));
    }

    #[test]
    fn test_display_rendering() {
        assert_eq!(ConstantValue::I32(42).to_string(), "42");
        assert_eq!(ConstantValue::F32(3.0).to_string(), "3.000000");
        assert_eq!(
            ConstantValue::Vec4I32(Vector4::new(7, 6, 5, 4)).to_string(),
            "vec4[i32](7, 6, 5, 4)"
        );
    }
}
