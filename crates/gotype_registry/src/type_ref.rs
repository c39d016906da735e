use gotype_ast::FuncDecl;
use gotype_resolve::LookupOptions;
use gotype_types::Type;

/// A lookup or registration request, decomposed from a name such as
/// `map[string]*shop.Order`
#[derive(Debug, Clone, Default)]
pub struct TypeRef {
    /// Directory holding the package sources
    pub package_path: String,
    pub module_path: String,
    pub package: String,
    /// Component name without `[]`, `*` or package qualifier
    pub name: String,
    /// Key of a `map[K]` prefix
    pub key_name: String,
    /// Inline definition to parse when the name is unknown
    pub definition: String,
    pub ty: Option<Type>,
    /// Methods found while loading from source
    pub methods: Vec<FuncDecl>,
    pub is_ptr: bool,
    pub is_slice: bool,
}

impl TypeRef {
    pub fn parse(name: &str, options: &LookupOptions) -> Self {
        let mut name = name.trim();
        let mut key_name = String::new();
        if let Some(rest) = name.strip_prefix("map[") {
            if let Some(index) = rest.find(']') {
                key_name = rest[..index].to_string();
                name = &rest[index + 1..];
            }
        }
        let is_slice = match name.strip_prefix("[]") {
            Some(rest) => {
                name = rest;
                true
            }
            None => false,
        };
        let is_ptr = match name.strip_prefix('*') {
            Some(rest) => {
                name = rest;
                true
            }
            None => false,
        };

        let mut package = options.package.clone();
        if !name.contains([' ', '{']) {
            if let Some(index) = name.rfind('.') {
                package = name[..index].to_string();
                name = &name[index + 1..];
            }
        }
        let mut definition = options.definition.clone();
        if definition.is_empty() && name.contains(['{', '[', ' ', '*']) {
            definition = name.to_string();
        }
        Self {
            package_path: options.package_path.clone(),
            package,
            name: name.to_string(),
            key_name,
            definition,
            ty: options.ty.clone(),
            is_ptr,
            is_slice,
            ..Default::default()
        }
    }

    /// Package qualified name
    pub fn type_name(&self) -> String {
        if self.package.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package, self.name)
        }
    }

    /// Whether the descriptor can be built from sources or a definition
    pub fn is_loadable(&self) -> bool {
        !self.definition.is_empty() || !self.package_path.is_empty()
    }
}
