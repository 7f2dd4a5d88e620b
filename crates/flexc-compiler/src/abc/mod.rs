//! AVM2 bytecode blocks.
//!
//! [`AbcFile`] mirrors the on-disk layout. [`AbcFile::decode`] and
//! [`AbcFile::encode`] convert between it and bytes; method bodies are carried
//! as opaque code. [`AbcBuilder`] synthesizes blocks from class descriptions.

mod decode;
mod encode;
mod error;
pub mod file;
mod reader;

pub use encode::{AbcBuilder, ClassSpec, Literal, Visibility};
pub use error::DecodeError;
pub use file::AbcFile;
pub use reader::{AbcReader, AbcWriter};
