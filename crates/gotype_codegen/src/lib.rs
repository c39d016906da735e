//! Go source generation from type descriptors
//!
//! The inverse of resolution: descriptors are rendered back into gofmt-shaped
//! declarations, with unnamed nested structs extracted into their own named
//! types and imports synthesized for referenced external types.

mod generate;
mod options;
mod stringify;

pub use generate::generate_struct;
pub use options::{GenerateOptions, GeneratedField, SkipFieldHook, StructFieldHook};
pub use stringify::{body, declaration, stringify};
