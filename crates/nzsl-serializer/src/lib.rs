// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Binary serialization of sanitized NZSL modules.
//!
//! The `.nzslb` format is a little-endian, self-delimited byte stream:
//! magic `NZSLB`, a `u16` format version, module metadata, the imported
//! modules (identifier + recursive module each) and the root statement
//! tree. Nodes carry a one-byte tag followed by their fields in
//! declaration order; expressions append their cached type and source
//! location, so a round trip is bit-exact.
//!
//! Serializer and deserializer share one walk (see [`ast::AstSerializer`]);
//! the stream direction decides whether a field is written out or read
//! back into the same place.

pub mod ast;
pub mod stream;

pub use ast::{AstSerializer, FORMAT_VERSION, MAGIC};
pub use stream::{AstStream, ReadStream, SerializationError, WriteStream};

use nzsl_ast::module::Module;

/// Serialize a (sanitized) module into `.nzslb` bytes.
pub fn serialize_module(module: &Module) -> Vec<u8> {
    let mut module = module.clone();
    let mut stream = WriteStream::new();

    AstSerializer::new(&mut stream)
        .module_envelope(&mut module)
        .expect("writing to a byte buffer cannot fail");

    stream.into_bytes()
}

/// Deserialize a module from `.nzslb` bytes.
///
/// The whole input must be consumed; trailing bytes are an error.
pub fn deserialize_module(bytes: &[u8]) -> Result<Module, SerializationError> {
    let mut stream = ReadStream::new(bytes);
    let mut module = Module::new(nzsl_ast::module::ModuleMetadata::new(""));

    AstSerializer::new(&mut stream).module_envelope(&mut module)?;

    if !stream.is_at_end() {
        return Err(SerializationError::TrailingBytes);
    }

    Ok(module)
}
