use gotype_registry::{LookupOptions, Registry, TypeRef};
use gotype_types::{Field, Type};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Package clause used when none is configured
pub(crate) const DEFAULT_PACKAGE: &str = "generated";

/// A struct field about to be rendered; hooks may rewrite any part of it
#[derive(Debug, Clone)]
pub struct GeneratedField {
    pub name: String,
    pub ty: Type,
    /// Tag content without quotes
    pub tag: String,
    /// Name used for an extracted nested struct
    pub type_name: String,
    /// Comment line emitted above the field
    pub doc: String,
    pub anonymous: bool,
}

pub type StructFieldHook = Arc<dyn Fn(&mut GeneratedField) + Send + Sync>;

/// Returns true when the nested struct of a field must not be emitted
pub type SkipFieldHook = Arc<dyn Fn(&Field) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct GenerateOptions {
    pub package: String,
    /// Imports emitted before any synthesized one
    pub imports: Vec<String>,
    pub snippet_before: String,
    pub snippet_after: String,
    /// Types living in another package, referenced as `pkg.Name`
    pub package_types: Vec<TypeRef>,
    /// Additional types emitted after the main one
    pub with_types: Vec<TypeRef>,
    /// Import path -> module prefix prepended to it
    pub import_module: FxHashMap<String, String>,
    /// Source of registration records naming otherwise unnamed field types
    pub registry: Option<Arc<Registry>>,
    pub on_struct_field: Option<StructFieldHook>,
    pub skip_field_type: Option<SkipFieldHook>,
    /// Tag keys removed from every emitted field
    pub omit_tags: Vec<String>,
}

impl std::fmt::Debug for GenerateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerateOptions")
            .field("package", &self.package)
            .field("imports", &self.imports)
            .field("package_types", &self.package_types.iter().map(TypeRef::type_name).collect::<Vec<_>>())
            .field("with_types", &self.with_types.iter().map(TypeRef::type_name).collect::<Vec<_>>())
            .field("import_module", &self.import_module)
            .field("omit_tags", &self.omit_tags)
            .finish_non_exhaustive()
    }
}

impl GenerateOptions {
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    pub fn with_imports<I, S>(mut self, imports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.imports = imports.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_snippet_before(mut self, snippet: impl Into<String>) -> Self {
        self.snippet_before = snippet.into();
        self
    }

    pub fn with_snippet_after(mut self, snippet: impl Into<String>) -> Self {
        self.snippet_after = snippet.into();
        self
    }

    /// Reference nested structs called `name` as `package.name`
    pub fn with_package_type(mut self, package: &str, name: &str) -> Self {
        self.package_types.push(TypeRef::parse(name, &LookupOptions::default().with_package(package)));
        self
    }

    pub fn with_type(mut self, name: &str, ty: Type) -> Self {
        self.with_types.push(TypeRef::parse(name, &LookupOptions::default().with_type(ty)));
        self
    }

    pub fn with_import_module(mut self, import_path: impl Into<String>, module: impl Into<String>) -> Self {
        self.import_module.insert(import_path.into(), module.into());
        self
    }

    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_on_struct_field<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut GeneratedField) + Send + Sync + 'static,
    {
        self.on_struct_field = Some(Arc::new(hook));
        self
    }

    pub fn with_skip_field_type<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Field) -> bool + Send + Sync + 'static,
    {
        self.skip_field_type = Some(Arc::new(hook));
        self
    }

    pub fn with_omit_tags<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.omit_tags = keys.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn package_name(&self) -> &str {
        if self.package.is_empty() { DEFAULT_PACKAGE } else { &self.package }
    }

    pub(crate) fn package_type(&self, name: &str) -> Option<&TypeRef> {
        self.package_types.iter().find(|candidate| candidate.name == name)
    }
}
