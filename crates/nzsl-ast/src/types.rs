//! The shader type system.
//!
//! [`ExpressionType`] is the type attached to every expression by the
//! sanitizer. Structs, functions and aliases are referenced by their
//! module-scoped index, never by pointer, so types stay cheap to clone,
//! trivially comparable and serializable (two struct types are equal exactly
//! when their indices are equal).
//!
//! Alias types keep their resolved target inline: `resolve_alias` walks the
//! chain without needing module context.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar base types of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    /// `bool`
    Boolean,
    /// `f32`
    Float32,
    /// `i32`
    Int32,
    /// `u32`
    UInt32,
    /// `str` (compile-time only)
    String,
}

impl PrimitiveType {
    /// Whether arithmetic is defined on this type.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            PrimitiveType::Float32 | PrimitiveType::Int32 | PrimitiveType::UInt32
        )
    }

    /// Whether this is an integer type (wrap-around arithmetic, zero checks).
    pub fn is_integer(self) -> bool {
        matches!(self, PrimitiveType::Int32 | PrimitiveType::UInt32)
    }

    /// Source-syntax name.
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "bool",
            PrimitiveType::Float32 => "f32",
            PrimitiveType::Int32 => "i32",
            PrimitiveType::UInt32 => "u32",
            PrimitiveType::String => "str",
        }
    }
}

/// `vecN[T]` with N in 2..=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorType {
    pub component_count: u32,
    pub component_type: PrimitiveType,
}

/// `matCxR[T]` (square matrices render as `matN[T]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatrixType {
    pub column_count: u32,
    pub row_count: u32,
    pub component_type: PrimitiveType,
}

impl MatrixType {
    /// Whether column and row counts agree.
    pub fn is_square(self) -> bool {
        self.column_count == self.row_count
    }

    /// The type of one column: a vector of `row_count` components.
    pub fn column_type(self) -> VectorType {
        VectorType {
            component_count: self.row_count,
            component_type: self.component_type,
        }
    }
}

/// `array[T, N]`; `length == 0` means "unsized, must be inferred from the
/// initializer" and is only legal in the positions the sanitizer allows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayType {
    pub contained_type: Box<ExpressionType>,
    pub length: u32,
}

/// Reference to a struct declaration by module-scoped index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructType {
    pub struct_index: usize,
}

/// Texture sampler dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplerDimension {
    Dim1D,
    Dim1DArray,
    Dim2D,
    Dim2DArray,
    Dim3D,
    Cube,
}

impl SamplerDimension {
    /// Number of coordinates required to sample this dimension.
    pub fn coordinate_count(self) -> u32 {
        match self {
            SamplerDimension::Dim1D => 1,
            SamplerDimension::Dim1DArray | SamplerDimension::Dim2D => 2,
            SamplerDimension::Dim2DArray | SamplerDimension::Dim3D | SamplerDimension::Cube => 3,
        }
    }

    fn name(self) -> &'static str {
        match self {
            SamplerDimension::Dim1D => "sampler1D",
            SamplerDimension::Dim1DArray => "sampler1D_array",
            SamplerDimension::Dim2D => "sampler2D",
            SamplerDimension::Dim2DArray => "sampler2D_array",
            SamplerDimension::Dim3D => "sampler3D",
            SamplerDimension::Cube => "sampler_cube",
        }
    }
}

/// `samplerXX[T]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplerType {
    pub dimension: SamplerDimension,
    pub sampled_type: PrimitiveType,
}

/// `uniform[S]` where `S` is a struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniformType {
    pub contained_type: StructType,
}

/// An alias reference: the index identifies the alias declaration, the
/// target is the fully resolved type it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AliasType {
    pub alias_index: usize,
    pub target_type: Box<ExpressionType>,
}

/// Reference to a function declaration by module-scoped index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub func_index: usize,
}

/// Reference to a registered intrinsic by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntrinsicFunctionType {
    pub intrinsic_index: usize,
}

/// Method resolved against a receiver type (e.g. `texture.Sample`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodType {
    pub object_type: Box<ExpressionType>,
    pub method_index: usize,
}

/// The type of every expression after sanitization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpressionType {
    /// Absence of a type (e.g. the "return type" of a procedure)
    NoType,
    Primitive(PrimitiveType),
    Vector(VectorType),
    Matrix(MatrixType),
    Array(ArrayType),
    Struct(StructType),
    Sampler(SamplerType),
    Uniform(UniformType),
    Alias(AliasType),
    Function(FunctionType),
    IntrinsicFunction(IntrinsicFunctionType),
    Method(MethodType),
    /// The type of a type-level expression (a struct name used as a value)
    Type(Box<ExpressionType>),
}

impl ExpressionType {
    pub fn is_no_type(&self) -> bool {
        matches!(self, ExpressionType::NoType)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, ExpressionType::Primitive(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, ExpressionType::Vector(_))
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, ExpressionType::Matrix(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ExpressionType::Array(_))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, ExpressionType::Struct(_))
    }

    pub fn is_sampler(&self) -> bool {
        matches!(self, ExpressionType::Sampler(_))
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self, ExpressionType::Uniform(_))
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, ExpressionType::Alias(_))
    }

    /// Element type of an array, if this is one.
    pub fn array_element(&self) -> Option<&ExpressionType> {
        match self {
            ExpressionType::Array(array) => Some(&array.contained_type),
            _ => None,
        }
    }

    /// Column vector type of a matrix, if this is one.
    pub fn matrix_column_type(&self) -> Option<VectorType> {
        match self {
            ExpressionType::Matrix(matrix) => Some(matrix.column_type()),
            _ => None,
        }
    }
}

/// Follow alias chains down to the aliased type.
///
/// Non-alias types are returned as-is; `Alias(a) -> Alias(b) -> T` yields
/// `T`. The returned reference borrows from the input.
pub fn resolve_alias(expression_type: &ExpressionType) -> &ExpressionType {
    let mut current = expression_type;
    while let ExpressionType::Alias(alias) = current {
        current = &alias.target_type;
    }

    current
}

/// Whether an explicit single-operand cast from `from` to `to` is legal.
///
/// Multi-operand casts (component lists, array literals) are validated
/// against the operand list by the sanitizer; this table only covers the
/// reshaping casts: numeric conversions, scalar-to-vector replication,
/// same-size vector conversions and matrix resizing.
pub fn is_cast_allowed(from: &ExpressionType, to: &ExpressionType) -> bool {
    match (resolve_alias(from), resolve_alias(to)) {
        (ExpressionType::Primitive(a), ExpressionType::Primitive(b)) => {
            a.is_numeric() && b.is_numeric()
        }
        (ExpressionType::Primitive(a), ExpressionType::Vector(b)) => {
            a.is_numeric() && b.component_type.is_numeric()
        }
        (ExpressionType::Vector(a), ExpressionType::Vector(b)) => {
            a.component_count == b.component_count
                && a.component_type.is_numeric()
                && b.component_type.is_numeric()
        }
        (ExpressionType::Matrix(a), ExpressionType::Matrix(b)) => {
            a.component_type == b.component_type
        }
        _ => false,
    }
}

/// std140 base alignment of a type, when derivable without module context.
///
/// Structs and arrays depend on member layout and therefore return `None`.
pub fn std140_alignment(expression_type: &ExpressionType) -> Option<u32> {
    match resolve_alias(expression_type) {
        ExpressionType::Primitive(p) if p.is_numeric() || *p == PrimitiveType::Boolean => Some(4),
        ExpressionType::Vector(v) => match v.component_count {
            2 => Some(8),
            3 | 4 => Some(16),
            _ => None,
        },
        ExpressionType::Matrix(_) => Some(16),
        _ => None,
    }
}

/// std140 size of a type, when derivable without module context.
pub fn std140_size(expression_type: &ExpressionType) -> Option<u32> {
    match resolve_alias(expression_type) {
        ExpressionType::Primitive(p) if p.is_numeric() || *p == PrimitiveType::Boolean => Some(4),
        ExpressionType::Vector(v) => Some(4 * v.component_count),
        ExpressionType::Matrix(m) => Some(16 * m.column_count),
        _ => None,
    }
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionType::NoType => write!(f, "()"),
            ExpressionType::Primitive(p) => f.write_str(p.name()),
            ExpressionType::Vector(v) => {
                write!(f, "vec{}[{}]", v.component_count, v.component_type.name())
            }
            ExpressionType::Matrix(m) if m.is_square() => {
                write!(f, "mat{}[{}]", m.column_count, m.component_type.name())
            }
            ExpressionType::Matrix(m) => write!(
                f,
                "mat{}x{}[{}]",
                m.column_count,
                m.row_count,
                m.component_type.name()
            ),
            ExpressionType::Array(a) if a.length == 0 => {
                write!(f, "array[{}]", a.contained_type)
            }
            ExpressionType::Array(a) => write!(f, "array[{}, {}]", a.contained_type, a.length),
            ExpressionType::Struct(s) => write!(f, "<struct #{}>", s.struct_index),
            ExpressionType::Sampler(s) => {
                write!(f, "{}[{}]", s.dimension.name(), s.sampled_type.name())
            }
            ExpressionType::Uniform(u) => {
                write!(f, "uniform[<struct #{}>]", u.contained_type.struct_index)
            }
            ExpressionType::Alias(a) => a.target_type.fmt(f),
            ExpressionType::Function(_) => write!(f, "<function>"),
            ExpressionType::IntrinsicFunction(_) => write!(f, "<intrinsic function>"),
            ExpressionType::Method(_) => write!(f, "<method>"),
            ExpressionType::Type(_) => write!(f, "<type>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_type(count: u32, component: PrimitiveType) -> ExpressionType {
        ExpressionType::Vector(VectorType {
            component_count: count,
            component_type: component,
        })
    }

    fn mat_type(cols: u32, rows: u32) -> ExpressionType {
        ExpressionType::Matrix(MatrixType {
            column_count: cols,
            row_count: rows,
            component_type: PrimitiveType::Float32,
        })
    }

    #[test]
    fn test_resolve_alias_chain() {
        let target = vec_type(3, PrimitiveType::Float32);
        let inner = ExpressionType::Alias(AliasType {
            alias_index: 1,
            target_type: Box::new(target.clone()),
        });
        let outer = ExpressionType::Alias(AliasType {
            alias_index: 0,
            target_type: Box::new(inner),
        });

        assert_eq!(resolve_alias(&outer), &target);
    }

    #[test]
    fn test_struct_equality_is_by_index() {
        let a = ExpressionType::Struct(StructType { struct_index: 1 });
        let b = ExpressionType::Struct(StructType { struct_index: 1 });
        let c = ExpressionType::Struct(StructType { struct_index: 2 });

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cast_legality() {
        let f32_ty = ExpressionType::Primitive(PrimitiveType::Float32);
        let i32_ty = ExpressionType::Primitive(PrimitiveType::Int32);
        let bool_ty = ExpressionType::Primitive(PrimitiveType::Boolean);

        assert!(is_cast_allowed(&i32_ty, &f32_ty));
        assert!(!is_cast_allowed(&bool_ty, &f32_ty));

        // scalar replication
        assert!(is_cast_allowed(&f32_ty, &vec_type(4, PrimitiveType::Float32)));

        // same-size vector conversion
        assert!(is_cast_allowed(
            &vec_type(3, PrimitiveType::Int32),
            &vec_type(3, PrimitiveType::Float32)
        ));
        assert!(!is_cast_allowed(
            &vec_type(2, PrimitiveType::Int32),
            &vec_type(3, PrimitiveType::Float32)
        ));

        // matrix resizing
        assert!(is_cast_allowed(&mat_type(3, 3), &mat_type(4, 4)));
    }

    #[test]
    fn test_display_matches_source_syntax() {
        assert_eq!(vec_type(4, PrimitiveType::Int32).to_string(), "vec4[i32]");
        assert_eq!(mat_type(4, 4).to_string(), "mat4[f32]");
        assert_eq!(mat_type(2, 3).to_string(), "mat2x3[f32]");

        let array = ExpressionType::Array(ArrayType {
            contained_type: Box::new(ExpressionType::Primitive(PrimitiveType::Float32)),
            length: 10,
        });
        assert_eq!(array.to_string(), "array[f32, 10]");
    }

    #[test]
    fn test_matrix_column_type() {
        let column = mat_type(2, 3).matrix_column_type().unwrap();
        assert_eq!(column.component_count, 3);
        assert_eq!(column.component_type, PrimitiveType::Float32);
    }
}
