//! Declaration-level syntax tree for Go source files.
//!
//! Only what is needed to describe types is kept: the package clause, import
//! specs, type specs, method receivers and literal values of `const`/`var`
//! specs. Function bodies are skipped by the parser.

use gotype_lexer::{Comment, Span};

/// A complete Go source file
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub package: Ident,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
}

impl SourceFile {
    pub fn type_specs(&self) -> impl Iterator<Item = &TypeSpec> {
        self.decls.iter().filter_map(|decl| match decl {
            Decl::Type(spec) => Some(spec),
            _ => None,
        })
    }

    pub fn value_specs(&self) -> impl Iterator<Item = &ValueSpec> {
        self.decls.iter().filter_map(|decl| match decl {
            Decl::Value(spec) => Some(spec),
            _ => None,
        })
    }

    pub fn funcs(&self) -> impl Iterator<Item = &FuncDecl> {
        self.decls.iter().filter_map(|decl| match decl {
            Decl::Func(func) => Some(func),
            _ => None,
        })
    }

    pub fn pretty_print(&self) -> String {
        let mut out = format!("File(package {})\n", self.package.name);
        for import in &self.imports {
            match &import.name {
                Some(name) => out.push_str(&format!("  Import {} {:?}\n", name.name, import.path)),
                None => out.push_str(&format!("  Import {:?}\n", import.path)),
            }
        }
        for decl in &self.decls {
            out.push_str(&decl.pretty_print(1));
        }
        out
    }
}

/// Import declaration: `import alias "path"`
#[derive(Debug, Clone)]
pub struct ImportSpec {
    /// Explicit alias, including `_` and `.`
    pub name: Option<Ident>,
    /// Unquoted import path
    pub path: String,
    pub span: Span,
}

/// Top-level declarations (grouped `type ( ... )` forms are flattened)
#[derive(Debug, Clone)]
pub enum Decl {
    Type(TypeSpec),
    Func(FuncDecl),
    Value(ValueSpec),
}

impl Decl {
    pub fn pretty_print(&self, indent: usize) -> String {
        let ind = "  ".repeat(indent);
        match self {
            Decl::Type(spec) => {
                let assign = if spec.is_alias { "= " } else { "" };
                format!("{}Type {} {}{}\n", ind, spec.name.name, assign, spec.ty)
            }
            Decl::Func(func) => match &func.recv {
                Some(recv) => format!("{}Method ({}) {}\n", ind, recv.ty, func.name.name),
                None => format!("{}Func {}\n", ind, func.name.name),
            },
            Decl::Value(spec) => {
                let names: Vec<_> = spec.names.iter().map(|n| n.name.as_str()).collect();
                let values: Vec<_> = spec.values.iter().map(|v| v.to_string()).collect();
                format!("{}{:?} {} = {}\n", ind, spec.kind, names.join(", "), values.join(", "))
            }
        }
    }
}

/// A comment group (consecutive comments with no blank line between them)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentGroup {
    pub list: Vec<Comment>,
}

impl CommentGroup {
    pub fn from_comments(list: Vec<Comment>) -> Option<Self> {
        if list.is_empty() { None } else { Some(Self { list }) }
    }

    /// Concatenated raw text, delimiters included
    pub fn raw_text(&self) -> String {
        self.list.iter().map(|c| c.text.as_str()).collect()
    }

    /// Text with comment markers removed, one line per source line
    pub fn text(&self) -> String {
        let mut lines = Vec::new();
        for comment in &self.list {
            let body = if let Some(line) = comment.text.strip_prefix("//") {
                line
            } else {
                comment
                    .text
                    .strip_prefix("/*")
                    .and_then(|c| c.strip_suffix("*/"))
                    .unwrap_or(&comment.text)
            };
            for line in body.lines() {
                lines.push(line.trim());
            }
        }
        let text = lines.join("\n");
        text.trim().to_string()
    }
}

/// `type Name T` / `type Name = T` / `type Name[P any] T`
#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub name: Ident,
    pub type_params: Vec<Field>,
    pub is_alias: bool,
    pub ty: TypeExpr,
    pub doc: Option<CommentGroup>,
    pub comment: Option<CommentGroup>,
    pub span: Span,
}

/// Method receiver: `(f *Foo)`
#[derive(Debug, Clone)]
pub struct Receiver {
    pub name: Option<Ident>,
    pub ty: TypeExpr,
}

impl Receiver {
    /// Receiver base type name with pointers and type arguments removed
    pub fn base_name(&self) -> Option<&str> {
        let mut ty = &self.ty;
        loop {
            match &ty.kind {
                TypeKind::Pointer(inner) | TypeKind::Paren(inner) => ty = inner,
                TypeKind::Generic(base, _) => ty = base,
                TypeKind::Ident(name) => return Some(name),
                _ => return None,
            }
        }
    }
}

/// Function or method declaration (signature only)
#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: Ident,
    pub recv: Option<Receiver>,
    pub doc: Option<CommentGroup>,
    pub has_body: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Const,
    Var,
}

/// `const A, B = 1, "x"` / `var C T`
#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub kind: ValueKind,
    pub names: Vec<Ident>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<ValueExpr>,
    pub doc: Option<CommentGroup>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Char,
    String,
}

/// A literal token as written in source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicLit {
    pub kind: LitKind,
    pub raw: String,
    pub span: Span,
}

/// Initializer of a value spec. Only literals are evaluated; everything
/// else is kept as source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueExpr {
    Lit(BasicLit),
    Ident(String),
    Other(String),
}

impl std::fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueExpr::Lit(lit) => write!(f, "{}", lit.raw),
            ValueExpr::Ident(name) => write!(f, "{}", name),
            ValueExpr::Other(text) => write!(f, "{}", text),
        }
    }
}

/// Type expressions
#[derive(Debug, Clone)]
pub struct TypeExpr {
    pub kind: TypeKind,
    pub span: Span,
}

impl TypeExpr {
    pub fn new(kind: TypeKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    /// `Foo`, `int`
    Ident(String),
    /// `pkg.Foo`
    Qualified { package: String, name: String },
    /// `*T`
    Pointer(Box<TypeExpr>),
    /// `[]T`
    Slice(Box<TypeExpr>),
    /// `[N]T`, the length kept as written
    Array(String, Box<TypeExpr>),
    /// `map[K]V`
    Map(Box<TypeExpr>, Box<TypeExpr>),
    /// `struct { ... }`
    Struct(StructType),
    /// `interface { ... }`, method set kept as source text
    Interface(Vec<String>),
    /// `func(...) ...`, signature kept as source text
    Func(String),
    /// `chan T`, `<-chan T`, `chan<- T`
    Chan(Box<TypeExpr>),
    /// `T[A, B]`
    Generic(Box<TypeExpr>, Vec<TypeExpr>),
    /// `(T)`
    Paren(Box<TypeExpr>),
    /// `...T` (variadic parameter)
    Ellipsis(Box<TypeExpr>),
}

impl TypeKind {
    /// Short variant name used in diagnostics
    pub fn variant_name(&self) -> &'static str {
        match self {
            TypeKind::Ident(_) => "identifier",
            TypeKind::Qualified { .. } => "qualified identifier",
            TypeKind::Pointer(_) => "pointer",
            TypeKind::Slice(_) => "slice",
            TypeKind::Array(..) => "array",
            TypeKind::Map(..) => "map",
            TypeKind::Struct(_) => "struct",
            TypeKind::Interface(_) => "interface",
            TypeKind::Func(_) => "func",
            TypeKind::Chan(_) => "chan",
            TypeKind::Generic(..) => "generic instantiation",
            TypeKind::Paren(_) => "parenthesized type",
            TypeKind::Ellipsis(_) => "variadic",
        }
    }
}

/// Struct type body
#[derive(Debug, Clone, Default)]
pub struct StructType {
    pub fields: Vec<Field>,
}

/// Struct field; `names` is empty for embedded fields
#[derive(Debug, Clone)]
pub struct Field {
    pub names: Vec<Ident>,
    pub ty: TypeExpr,
    pub tag: Option<BasicLit>,
    pub doc: Option<CommentGroup>,
    pub comment: Option<CommentGroup>,
    pub span: Span,
}

/// Renders the expression the way it is spelled in source
impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TypeKind::Ident(name) => write!(f, "{}", name),
            TypeKind::Qualified { package, name } => write!(f, "{}.{}", package, name),
            TypeKind::Pointer(inner) => write!(f, "*{}", inner),
            TypeKind::Slice(elem) => write!(f, "[]{}", elem),
            TypeKind::Array(len, elem) => write!(f, "[{}]{}", len, elem),
            TypeKind::Map(key, value) => write!(f, "map[{}]{}", key, value),
            TypeKind::Struct(st) => {
                write!(f, "struct{{")?;
                for (i, field) in st.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    let names: Vec<_> = field.names.iter().map(|n| n.name.as_str()).collect();
                    if !names.is_empty() {
                        write!(f, "{} ", names.join(", "))?;
                    }
                    write!(f, "{}", field.ty)?;
                    if let Some(tag) = &field.tag {
                        write!(f, " {}", tag.raw)?;
                    }
                }
                write!(f, "}}")
            }
            TypeKind::Interface(methods) => write!(f, "interface{{{}}}", methods.join("; ")),
            TypeKind::Func(signature) => write!(f, "func{}", signature),
            TypeKind::Chan(elem) => write!(f, "chan {}", elem),
            TypeKind::Generic(base, args) => {
                let args: Vec<_> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}[{}]", base, args.join(", "))
            }
            TypeKind::Paren(inner) => write!(f, "({})", inner),
            TypeKind::Ellipsis(elem) => write!(f, "...{}", elem),
        }
    }
}

/// An identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: String, span: Span) -> Self {
        Self { name, span }
    }

    /// Go exports identifiers starting with an upper-case letter
    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(char::is_uppercase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ty(kind: TypeKind) -> TypeExpr {
        TypeExpr::new(kind, Span::default())
    }

    #[test]
    fn test_display_nested_type() {
        let inner = ty(TypeKind::Qualified { package: "time".into(), name: "Time".into() });
        let expr = ty(TypeKind::Slice(Box::new(ty(TypeKind::Pointer(Box::new(inner))))));
        assert_eq!(expr.to_string(), "[]*time.Time");

        let map = ty(TypeKind::Map(
            Box::new(ty(TypeKind::Ident("string".into()))),
            Box::new(ty(TypeKind::Ident("int".into()))),
        ));
        assert_eq!(map.to_string(), "map[string]int");
    }

    #[test]
    fn test_receiver_base_name() {
        let recv = Receiver {
            name: None,
            ty: ty(TypeKind::Pointer(Box::new(ty(TypeKind::Generic(
                Box::new(ty(TypeKind::Ident("List".into()))),
                vec![ty(TypeKind::Ident("T".into()))],
            ))))),
        };
        assert_eq!(recv.base_name(), Some("List"));
    }

    #[test]
    fn test_comment_group_text() {
        let group = CommentGroup {
            list: vec![Comment { text: "/*\n\t\tSELECT 1\n\t*/".into(), span: Span::default() }],
        };
        assert_eq!(group.text(), "SELECT 1");
        assert_eq!(group.raw_text(), "/*\n\t\tSELECT 1\n\t*/");
    }
}
