//! Type representation

use gotype_lexer::quote;
use std::sync::Arc;

/// Package marker used for unexported fields when no package is known
pub const AUTOGEN_PACKAGE: &str = "autogen";

/// Kind of a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
    Pointer,
    Slice,
    Map,
    Struct,
    Interface,
}

/// A resolved type descriptor.
///
/// Composites built from source are unnamed, so two declarations with the
/// same structure compare equal. Named types only appear for built-in
/// standard types, host-registered descriptors and forward references.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Struct(Vec<Field>),
    /// The empty interface; method sets are not modeled
    Interface,
    Named(Arc<NamedType>),
}

impl Type {
    pub fn pointer_to(elem: Type) -> Type {
        Type::Pointer(Box::new(elem))
    }

    pub fn slice_of(elem: Type) -> Type {
        Type::Slice(Box::new(elem))
    }

    pub fn map_of(key: Type, value: Type) -> Type {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn named(named: NamedType) -> Type {
        Type::Named(Arc::new(named))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Type::Bool => Kind::Bool,
            Type::Int => Kind::Int,
            Type::Int8 => Kind::Int8,
            Type::Int16 => Kind::Int16,
            Type::Int32 => Kind::Int32,
            Type::Int64 => Kind::Int64,
            Type::Uint => Kind::Uint,
            Type::Uint8 => Kind::Uint8,
            Type::Uint16 => Kind::Uint16,
            Type::Uint32 => Kind::Uint32,
            Type::Uint64 => Kind::Uint64,
            Type::Float32 => Kind::Float32,
            Type::Float64 => Kind::Float64,
            Type::String => Kind::String,
            Type::Pointer(_) => Kind::Pointer,
            Type::Slice(_) => Kind::Slice,
            Type::Map(..) => Kind::Map,
            Type::Struct(_) => Kind::Struct,
            Type::Interface => Kind::Interface,
            Type::Named(named) => named.underlying.as_ref().map_or(Kind::Struct, Type::kind),
        }
    }

    /// Declared name; empty for unnamed types. Primitives report their keyword.
    pub fn name(&self) -> &str {
        match self {
            Type::Named(named) => &named.name,
            Type::Pointer(_) | Type::Slice(_) | Type::Map(..) | Type::Struct(_) | Type::Interface => "",
            primitive => primitive.primitive_name().unwrap_or_default(),
        }
    }

    fn primitive_name(&self) -> Option<&'static str> {
        Some(match self {
            Type::Bool => "bool",
            Type::Int => "int",
            Type::Int8 => "int8",
            Type::Int16 => "int16",
            Type::Int32 => "int32",
            Type::Int64 => "int64",
            Type::Uint => "uint",
            Type::Uint8 => "uint8",
            Type::Uint16 => "uint16",
            Type::Uint32 => "uint32",
            Type::Uint64 => "uint64",
            Type::Float32 => "float32",
            Type::Float64 => "float64",
            Type::String => "string",
            _ => return None,
        })
    }

    pub fn is_named(&self) -> bool {
        matches!(self, Type::Named(_))
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive_name().is_some()
    }

    /// Import path of a named type; empty otherwise
    pub fn pkg_path(&self) -> &str {
        match self {
            Type::Named(named) => &named.pkg_path,
            _ => "",
        }
    }

    /// Element of a pointer or slice, value of a map
    pub fn elem(&self) -> Option<&Type> {
        match self {
            Type::Pointer(elem) | Type::Slice(elem) | Type::Map(_, elem) => Some(elem),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&Type> {
        match self {
            Type::Map(key, _) => Some(key),
            _ => None,
        }
    }

    /// Struct fields, looking through named types
    pub fn fields(&self) -> &[Field] {
        match self {
            Type::Struct(fields) => fields,
            Type::Named(named) => match &named.underlying {
                Some(underlying) => underlying.fields(),
                None => &[],
            },
            _ => &[],
        }
    }

    /// Strip pointers
    pub fn deref(&self) -> &Type {
        match self {
            Type::Pointer(elem) => elem.deref(),
            other => other,
        }
    }

    /// Strip pointers and slices
    pub fn base(&self) -> &Type {
        match self {
            Type::Pointer(elem) | Type::Slice(elem) => elem.base(),
            other => other,
        }
    }

    /// Whether an interface is reachable through pointers and slices
    pub fn has_interface(&self) -> bool {
        match self {
            Type::Interface => true,
            Type::Pointer(elem) | Type::Slice(elem) => elem.has_interface(),
            _ => false,
        }
    }
}

/// Renders like Go's `reflect.Type.String()`
impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Pointer(elem) => write!(f, "*{}", elem),
            Type::Slice(elem) => write!(f, "[]{}", elem),
            Type::Map(key, value) => write!(f, "map[{}]{}", key, value),
            Type::Interface => write!(f, "interface {{}}"),
            Type::Named(named) => write!(f, "{}", named),
            Type::Struct(fields) => {
                if fields.is_empty() {
                    return write!(f, "struct {{}}");
                }
                write!(f, "struct {{")?;
                for (i, field) in fields.iter().enumerate() {
                    if !field.is_embedded_named() {
                        write!(f, " {}", field.name)?;
                    }
                    write!(f, " {}", field.ty)?;
                    if !field.tag.is_empty() {
                        write!(f, " {}", quote(&field.tag))?;
                    }
                    if i + 1 < fields.len() {
                        write!(f, ";")?;
                    }
                }
                write!(f, " }}")
            }
            primitive => write!(f, "{}", primitive.primitive_name().unwrap_or_default()),
        }
    }
}

/// A named type: identity is its package path and name
#[derive(Debug, Clone)]
pub struct NamedType {
    pub name: String,
    /// Package name used when rendering, e.g. `json`
    pub package: String,
    /// Full import path, e.g. `encoding/json`
    pub pkg_path: String,
    /// `None` for forward references
    pub underlying: Option<Type>,
}

impl NamedType {
    pub fn new(name: impl Into<String>, package: impl Into<String>, pkg_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            pkg_path: pkg_path.into(),
            underlying: None,
        }
    }

    pub fn with_underlying(mut self, underlying: Type) -> Self {
        self.underlying = Some(underlying);
        self
    }

    /// `package.Name`, or the bare name without a package
    pub fn qualified_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }
}

impl PartialEq for NamedType {
    fn eq(&self, other: &Self) -> bool {
        self.pkg_path == other.pkg_path && self.name == other.name
    }
}

impl Eq for NamedType {}

impl std::hash::Hash for NamedType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.pkg_path.hash(state);
        self.name.hash(state);
    }
}

impl std::fmt::Display for NamedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.package.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.package, self.name)
        }
    }
}

/// Struct field descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    /// Tag content without the surrounding quotes
    pub tag: String,
    pub anonymous: bool,
    /// Owning package of an unexported field; empty when exported
    pub pkg_path: String,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        let name = name.into();
        let pkg_path = field_pkg_path(&name, "");
        Self { name, ty, tag: String::new(), anonymous: false, pkg_path }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_anonymous(mut self, anonymous: bool) -> Self {
        self.anonymous = anonymous;
        self
    }

    pub fn with_pkg_path(mut self, package: &str) -> Self {
        self.pkg_path = field_pkg_path(&self.name, package);
        self
    }

    pub fn is_exported(&self) -> bool {
        self.pkg_path.is_empty()
    }

    fn is_embedded_named(&self) -> bool {
        self.anonymous && self.ty.deref().is_named()
    }
}

/// Package marker for a field: empty when the name is exported, otherwise
/// `package` or `autogen` when no package is known
pub fn field_pkg_path(field_name: &str, package: &str) -> String {
    match field_name.chars().next() {
        Some(first) if !first.is_ascii_uppercase() => {
            if package.is_empty() {
                AUTOGEN_PACKAGE.to_string()
            } else {
                package.to_string()
            }
        }
        _ => String::new(),
    }
}

/// Strip one leading `[]` and then one leading `*`
pub fn component_type(name: &str) -> &str {
    let name = name.strip_prefix("[]").unwrap_or(name);
    name.strip_prefix('*').unwrap_or(name)
}

/// Component type without its package qualifier
pub fn raw_name(name: &str) -> &str {
    let name = component_type(name);
    match name.rfind('.') {
        Some(index) => &name[index + 1..],
        None => name,
    }
}

/// Split `pkg.Name` into its package and name; the package is empty when
/// the name is unqualified
pub fn split_package(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) => (&name[..index], &name[index + 1..]),
        None => ("", name),
    }
}
