//! Resolved type descriptors
//!
//! A `Type` mirrors what Go's `reflect.Type` reports for a declaration:
//! its kind, its composition and, for structs, the ordered field list with
//! tags. `Display` renders the same text as `reflect.Type.String()`.

mod builtin;
mod tag;
mod types;

pub use builtin::{BuiltinTable, json_raw_message_type, time_type};
pub use tag::{StructTag, TAG_TYPE_NAME, append_tag, remove_tag};
pub use types::*;
