//! Type resolution over scanned Go declarations
//!
//! This module turns declarations into `Type` descriptors by:
//! 1. Matching type expressions recursively against the directory index
//! 2. Following imports into other directories of the same module
//! 3. Delegating everything else to a pluggable `TypeLookup`

mod dir;
mod error;
mod matcher;
mod options;

pub use dir::{DirTypes, parse, parse_types};
pub use error::ResolveError;
pub use options::{FieldHook, LookupHook, LookupOptions, ParseOptions, StructHook, TypeLookup};
