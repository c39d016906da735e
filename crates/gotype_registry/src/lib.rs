//! Registry of resolved type descriptors
//!
//! Descriptors are keyed by package and name. Packages backed by a source
//! directory are scanned lazily on first lookup; misses fall back to the
//! parent registry and finally to the built-in table.

mod package;
mod registry;
mod type_ref;

pub use gotype_resolve::{LookupOptions, ResolveError};
pub use package::Package;
pub use registry::{Registry, RegistryOptions};
pub use type_ref::TypeRef;
