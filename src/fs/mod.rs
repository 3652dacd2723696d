//! Polymorphic file/handle objects.

pub mod file;

pub use file::{File, FileKind, FileObject, FileTable};
