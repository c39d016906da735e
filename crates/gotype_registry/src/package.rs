use gotype_ast::FuncDecl;
use gotype_resolve::{DirTypes, ResolveError};
use gotype_types::Type;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Descriptors registered under one package name
#[derive(Debug)]
pub struct Package {
    name: String,
    /// Source directory; empty for packages populated by registration only
    path: String,
    dir_types: RwLock<Option<Arc<DirTypes>>>,
    types: RwLock<FxHashMap<String, Type>>,
    methods: RwLock<FxHashMap<String, Vec<FuncDecl>>>,
    /// Source directory -> declared package name, for directories whose
    /// declared name differs from this entry's name
    package_paths: RwLock<FxHashMap<String, String>>,
}

impl Package {
    pub(crate) fn new(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            dir_types: RwLock::new(None),
            types: RwLock::new(FxHashMap::default()),
            methods: RwLock::new(FxHashMap::default()),
            package_paths: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered descriptor; a leading `*` asks for a pointer to it
    pub fn lookup(&self, name: &str) -> Result<Type, ResolveError> {
        let types = self.types.read();
        if let Some(ty) = types.get(name) {
            return Ok(ty.clone());
        }
        if let Some(ty) = name.strip_prefix('*').and_then(|base| types.get(base)) {
            return Ok(Type::pointer_to(ty.clone()));
        }
        Err(ResolveError::type_not_found(&self.name, name))
    }

    pub fn methods(&self, name: &str) -> Vec<FuncDecl> {
        self.methods.read().get(name).cloned().unwrap_or_default()
    }

    pub fn dir_types(&self) -> Option<Arc<DirTypes>> {
        self.dir_types.read().clone()
    }

    /// Declared package name recorded for a source directory
    pub fn corrected_name(&self, path: &str) -> Option<String> {
        self.package_paths.read().get(path).cloned()
    }

    /// Store a descriptor, pointers stripped. A named descriptor is never
    /// replaced by an unnamed one; returns whether the entry was written.
    pub(crate) fn register(&self, name: &str, ty: Type) -> bool {
        let ty = match ty {
            Type::Pointer(elem) => *elem,
            ty => ty,
        };
        let mut types = self.types.write();
        if let Some(prev) = types.get(name) {
            if prev.is_named() && !ty.is_named() {
                tracing::debug!(package = %self.name, name, "keeping named descriptor");
                return false;
            }
        }
        types.insert(name.to_string(), ty);
        true
    }

    /// Install the directory resolver unless one is already present, and
    /// return the one in use
    pub(crate) fn set_dir_types(&self, dir: Arc<DirTypes>) -> Arc<DirTypes> {
        self.dir_types.write().get_or_insert(dir).clone()
    }

    pub(crate) fn set_methods(&self, name: &str, methods: Vec<FuncDecl>) {
        self.methods.write().insert(name.to_string(), methods);
    }

    pub(crate) fn set_corrected_name(&self, path: &str, name: &str) {
        self.package_paths.write().insert(path.to_string(), name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gotype_types::{Field, NamedType};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_pointer_prefix() {
        let package = Package::new("shop", "");
        let order = Type::Struct(vec![Field::new("ID", Type::Int)]);
        assert!(package.register("Order", Type::pointer_to(order.clone())));
        assert_eq!(package.lookup("Order").unwrap(), order);
        assert_eq!(package.lookup("*Order").unwrap(), Type::pointer_to(order));
        let err = package.lookup("Item").unwrap_err();
        assert_eq!(err.to_string(), "type not found: shop.Item");
    }

    #[test]
    fn test_named_wins_over_unnamed() {
        let package = Package::new("shop", "");
        let named = Type::named(NamedType::new("Order", "shop", "example.com/shop"));
        assert!(package.register("Order", named.clone()));
        assert!(!package.register("Order", Type::Struct(vec![])));
        assert_eq!(package.lookup("Order").unwrap(), named);
        assert_eq!(package.type_names(), vec!["Order".to_string()]);
    }
}
