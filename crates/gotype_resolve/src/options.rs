use crate::ResolveError;
use gotype_ast::{Field, StructType, TypeSpec};
use gotype_index::{GoImports, ModuleInfo};
use gotype_parser::ParseMode;
use gotype_types::Type;
use std::sync::Arc;

/// Per-request arguments of a type lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupOptions {
    /// Package name or import path qualifying the requested name
    pub package: String,
    /// Directory to load the package from when it is not known yet
    pub package_path: String,
    /// Type definition to parse when the name is not known
    pub definition: String,
    /// Descriptor to register under the requested name
    pub ty: Option<Type>,
}

impl LookupOptions {
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    pub fn with_package_path(mut self, package_path: impl Into<String>) -> Self {
        self.package_path = package_path.into();
        self
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = definition.into();
        self
    }

    pub fn with_type(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }
}

/// Resolves names the scanned sources cannot answer
pub trait TypeLookup: Send + Sync {
    fn lookup(&self, name: &str, options: &LookupOptions) -> Result<Type, ResolveError>;
}

impl<F> TypeLookup for F
where
    F: Fn(&str, &LookupOptions) -> Result<Type, ResolveError> + Send + Sync,
{
    fn lookup(&self, name: &str, options: &LookupOptions) -> Result<Type, ResolveError> {
        self(name, options)
    }
}

/// Called for every struct field before it is resolved. Receives the
/// enclosing type name (empty for inline definitions) and may rewrite the
/// decoded tag.
pub type FieldHook = Arc<dyn Fn(&str, &Field, &GoImports, &mut String) -> Result<(), ResolveError> + Send + Sync>;

/// Called for every struct type before its fields are resolved
pub type StructHook = Arc<dyn Fn(Option<&TypeSpec>, &StructType) -> Result<(), ResolveError> + Send + Sync>;

/// Observes successful lookups: `(package_path, package, name, type)`
pub type LookupHook = Arc<dyn Fn(&str, &str, &str, &Type) + Send + Sync>;

/// Resolution settings shared by a directory and the sub-directories it
/// reaches through imports
#[derive(Clone)]
pub struct ParseOptions {
    pub lookup: Option<Arc<dyn TypeLookup>>,
    pub mode: ParseMode,
    /// Package name used for inline definitions
    pub package: String,
    /// Module used for cross-directory resolution instead of the detected one
    pub module: Option<ModuleInfo>,
    /// Detect the enclosing module from `go.mod`
    pub module_aware: bool,
    pub on_field: Option<FieldHook>,
    pub on_struct: Option<StructHook>,
    pub on_lookup: Option<LookupHook>,
    /// Import table used when a file declares none
    pub imports: GoImports,
    /// Append field doc comments as a `doc` tag
    pub doc_tags: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            lookup: None,
            mode: ParseMode::Plain,
            package: String::new(),
            module: None,
            module_aware: true,
            on_field: None,
            on_struct: None,
            on_lookup: None,
            imports: GoImports::default(),
            doc_tags: false,
        }
    }
}

impl std::fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseOptions")
            .field("lookup", &self.lookup.is_some())
            .field("mode", &self.mode)
            .field("package", &self.package)
            .field("module", &self.module)
            .field("module_aware", &self.module_aware)
            .field("on_field", &self.on_field.is_some())
            .field("on_struct", &self.on_struct.is_some())
            .field("on_lookup", &self.on_lookup.is_some())
            .field("imports", &self.imports)
            .field("doc_tags", &self.doc_tags)
            .finish()
    }
}

impl ParseOptions {
    pub fn with_lookup(mut self, lookup: Arc<dyn TypeLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn with_mode(mut self, mode: ParseMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    pub fn with_module(mut self, module: ModuleInfo) -> Self {
        self.module = Some(module);
        self
    }

    pub fn with_module_aware(mut self, module_aware: bool) -> Self {
        self.module_aware = module_aware;
        self
    }

    pub fn with_on_field<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &Field, &GoImports, &mut String) -> Result<(), ResolveError> + Send + Sync + 'static,
    {
        self.on_field = Some(Arc::new(hook));
        self
    }

    pub fn with_on_struct<F>(mut self, hook: F) -> Self
    where
        F: Fn(Option<&TypeSpec>, &StructType) -> Result<(), ResolveError> + Send + Sync + 'static,
    {
        self.on_struct = Some(Arc::new(hook));
        self
    }

    pub fn with_on_lookup<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &str, &str, &Type) + Send + Sync + 'static,
    {
        self.on_lookup = Some(Arc::new(hook));
        self
    }

    pub fn with_imports(mut self, imports: GoImports) -> Self {
        self.imports = imports;
        self
    }

    /// Doc tags need comments, so enabling them also switches to
    /// `ParseMode::Comments`
    pub fn with_doc_tags(mut self, doc_tags: bool) -> Self {
        self.doc_tags = doc_tags;
        if doc_tags {
            self.mode = ParseMode::Comments;
        }
        self
    }
}
