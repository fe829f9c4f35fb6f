//! Foundation types shared by every layer: source locations, small vector
//! and matrix values, and stable hashing.

pub mod span;
pub mod stable_hash;
pub mod vector;

pub use span::SourceLocation;
pub use vector::{Matrix2, Matrix3, Matrix4, Vector2, Vector3, Vector4};
