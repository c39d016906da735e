//! Immutable table of built-in types

use crate::types::{Field, NamedType, Type};
use rustc_hash::FxHashMap;
use std::sync::LazyLock;

static TIME: LazyLock<Type> = LazyLock::new(|| {
    let location = Type::named(NamedType::new("Location", "time", "time"));
    Type::named(NamedType::new("Time", "time", "time").with_underlying(Type::Struct(vec![
        Field::new("wall", Type::Uint64).with_pkg_path("time"),
        Field::new("ext", Type::Int64).with_pkg_path("time"),
        Field::new("loc", Type::pointer_to(location)).with_pkg_path("time"),
    ])))
});

static JSON_RAW_MESSAGE: LazyLock<Type> = LazyLock::new(|| {
    Type::named(
        NamedType::new("RawMessage", "json", "encoding/json").with_underlying(Type::slice_of(Type::Uint8)),
    )
});

static BUILTINS: LazyLock<BuiltinTable> = LazyLock::new(BuiltinTable::build);

/// `time.Time`
pub fn time_type() -> Type {
    TIME.clone()
}

/// `json.RawMessage`
pub fn json_raw_message_type() -> Type {
    JSON_RAW_MESSAGE.clone()
}

/// Built-in types keyed by qualified name (`int`, `time.Time`,
/// `encoding/json.RawMessage`). Built once and never mutated; registries
/// consult it after every other fallback.
#[derive(Debug)]
pub struct BuiltinTable {
    types: FxHashMap<String, Type>,
}

impl BuiltinTable {
    pub fn get() -> &'static BuiltinTable {
        &BUILTINS
    }

    fn build() -> Self {
        let mut types = FxHashMap::default();
        for name in [
            "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16", "uint32", "uint64", "byte", "rune",
            "float32", "float64", "string", "bool", "interface", "any",
        ] {
            if let Some(ty) = Self::primitive(name) {
                types.insert(name.to_string(), ty);
            }
        }
        for (key, ty) in [
            ("time.Time", time_type()),
            ("json.RawMessage", json_raw_message_type()),
            ("encoding/json.RawMessage", json_raw_message_type()),
        ] {
            types.insert(key.to_string(), ty);
        }
        Self { types }
    }

    /// Keyword table for bare identifiers
    pub fn primitive(name: &str) -> Option<Type> {
        Some(match name {
            "int" => Type::Int,
            "int8" => Type::Int8,
            "int16" => Type::Int16,
            "int32" | "rune" => Type::Int32,
            "int64" => Type::Int64,
            "uint" => Type::Uint,
            "uint8" | "byte" => Type::Uint8,
            "uint16" => Type::Uint16,
            "uint32" => Type::Uint32,
            "uint64" => Type::Uint64,
            "float32" => Type::Float32,
            "float64" => Type::Float64,
            "string" => Type::String,
            "bool" => Type::Bool,
            "interface" | "any" => Type::Interface,
            "time.Time" => time_type(),
            _ => return None,
        })
    }

    /// Well-known standard types reachable through a package qualifier
    pub fn standard(package: &str, name: &str) -> Option<Type> {
        match (package, name) {
            ("time", "Time") => Some(time_type()),
            ("json", "RawMessage") => Some(json_raw_message_type()),
            _ => None,
        }
    }

    /// Lookup by package name or import path; an empty package means a
    /// predeclared identifier
    pub fn lookup(&self, package: &str, name: &str) -> Option<Type> {
        let key = if package.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", package, name)
        };
        self.types.get(&key).cloned()
    }

    pub fn contains(&self, package: &str, name: &str) -> bool {
        self.lookup(package, name).is_some()
    }
}
