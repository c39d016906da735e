use crate::{Package, TypeRef};
use gotype_ast::{FuncDecl, LitKind, ValueExpr};
use gotype_lexer::unquote;
use gotype_resolve::{DirTypes, LookupOptions, ParseOptions, ResolveError, TypeLookup, parse, parse_types};
use gotype_types::{BuiltinTable, Type, raw_name};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Weak};

/// String constant overriding a directory's package name
const PACKAGE_NAME_CONSTANT: &str = "PackageName";

#[derive(Default, Clone)]
pub struct RegistryOptions {
    pub parent: Option<Arc<Registry>>,
    /// Descriptors registered on construction
    pub types: Vec<TypeRef>,
}

impl RegistryOptions {
    pub fn with_parent(mut self, parent: Arc<Registry>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Register `ty` under a possibly qualified name such as `shop.Order`
    pub fn with_type(mut self, name: &str, ty: Type) -> Self {
        self.types.push(TypeRef::parse(name, &LookupOptions::default().with_type(ty)));
        self
    }

    /// Register the inline `definition` under `name`
    pub fn with_definition(mut self, name: &str, definition: &str) -> Self {
        self.types.push(TypeRef::parse(name, &LookupOptions::default().with_definition(definition)));
        self
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    packages: FxHashMap<String, Arc<Package>>,
    /// Descriptor -> registration record
    info: FxHashMap<Type, TypeRef>,
}

/// Catalog of descriptors keyed by package and name.
///
/// Safe for concurrent use: the package table sits behind a single
/// reader/writer lock and every package guards its own maps. No lock is held
/// while sources are scanned or resolved, so resolution may re-enter the
/// registry through its `TypeLookup` implementation.
#[derive(Debug)]
pub struct Registry {
    this: Weak<Registry>,
    state: RwLock<RegistryState>,
    parent: RwLock<Option<Arc<Registry>>>,
}

/// Lookup handle given to resolvers owned by the registry; weak so that
/// cached resolvers do not keep their registry alive
struct RegistryLookup(Weak<Registry>);

impl TypeLookup for RegistryLookup {
    fn lookup(&self, name: &str, options: &LookupOptions) -> Result<Type, ResolveError> {
        match self.0.upgrade() {
            Some(registry) => registry.lookup(name, options),
            None => Err(ResolveError::type_not_found(&options.package, name)),
        }
    }
}

impl TypeLookup for Registry {
    fn lookup(&self, name: &str, options: &LookupOptions) -> Result<Type, ResolveError> {
        Registry::lookup(self, name, options)
    }
}

impl Registry {
    pub fn new(options: RegistryOptions) -> Arc<Self> {
        let registry = Arc::new_cyclic(|this| Self {
            this: this.clone(),
            state: RwLock::new(RegistryState::default()),
            parent: RwLock::new(options.parent),
        });
        for type_ref in options.types {
            let type_name = type_ref.type_name();
            if let Err(err) = registry.register_ref(type_ref) {
                tracing::warn!(name = %type_name, %err, "failed to register type");
            }
        }
        registry
    }

    pub fn set_parent(&self, parent: Arc<Registry>) {
        *self.parent.write() = Some(parent);
    }

    pub fn parent(&self) -> Option<Arc<Registry>> {
        self.parent.read().clone()
    }

    pub fn package(&self, name: &str) -> Option<Arc<Package>> {
        self.state.read().packages.get(name).cloned()
    }

    pub fn package_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.state.read().packages.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registration record of a descriptor
    pub fn info(&self, ty: &Type) -> Option<TypeRef> {
        self.state.read().info.get(ty).cloned()
    }

    /// Whether `name` is registered locally, without loading or fallback
    pub fn has(&self, name: &str) -> bool {
        let type_ref = TypeRef::parse(name, &LookupOptions::default());
        self.package(&type_ref.package)
            .is_some_and(|package| package.lookup(&type_ref.name).is_ok())
    }

    /// Resolve `name`: local packages first (loading sources or a definition
    /// when the request carries one), then the parent chain, then built-ins
    #[tracing::instrument(level = "trace", skip(self, options), fields(package = %options.package))]
    pub fn lookup(&self, name: &str, options: &LookupOptions) -> Result<Type, ResolveError> {
        self.lookup_ref(&TypeRef::parse(name, options))
    }

    pub fn lookup_ref(&self, type_ref: &TypeRef) -> Result<Type, ResolveError> {
        let mut ty = self.lookup_base(type_ref)?;
        if type_ref.is_ptr {
            ty = Type::pointer_to(ty);
        }
        if type_ref.is_slice {
            ty = Type::slice_of(ty);
        }
        if !type_ref.key_name.is_empty() {
            let key = self.lookup(&type_ref.key_name, &LookupOptions::default())?;
            ty = Type::map_of(key, ty);
        }
        Ok(ty)
    }

    fn lookup_base(&self, type_ref: &TypeRef) -> Result<Type, ResolveError> {
        let err = match self.lookup_local(type_ref) {
            Ok(ty) => return Ok(ty),
            Err(err) => err,
        };
        if let Some(parent) = self.parent() {
            match parent.lookup_base(type_ref) {
                Ok(ty) => return Ok(ty),
                Err(parent_err) if !parent_err.is_not_found() => return Err(parent_err),
                Err(_) => {}
            }
        }
        if let Some(ty) = BuiltinTable::get().lookup(&type_ref.package, &type_ref.name) {
            return Ok(ty);
        }
        Err(err)
    }

    fn lookup_local(&self, type_ref: &TypeRef) -> Result<Type, ResolveError> {
        let package = match self.package(&type_ref.package) {
            Some(package) => package,
            None if type_ref.is_loadable() => self.ensure_package(&type_ref.package, &type_ref.package_path),
            None => return Err(ResolveError::type_not_found(&type_ref.package, &type_ref.name)),
        };
        let package = self.owning_package(&package, &type_ref.package_path);
        let err = match package.lookup(&type_ref.name) {
            Ok(ty) => return Ok(ty),
            Err(err) if type_ref.is_loadable() => err,
            Err(err) => return Err(err),
        };
        if let Err(load_err) = self.register_ref(type_ref.clone()) {
            tracing::debug!(name = %type_ref.type_name(), %load_err, "failed to load type");
            return Err(if load_err.is_not_found() { err } else { load_err });
        }
        self.owning_package(&package, &type_ref.package_path).lookup(&type_ref.name)
    }

    /// Package now holding the sources of `path`, following re-keying
    fn owning_package(&self, package: &Arc<Package>, path: &str) -> Arc<Package> {
        package
            .corrected_name(path)
            .and_then(|name| self.package(&name))
            .unwrap_or_else(|| package.clone())
    }

    fn ensure_package(&self, name: &str, path: &str) -> Arc<Package> {
        if let Some(package) = self.state.read().packages.get(name) {
            return package.clone();
        }
        let mut state = self.state.write();
        state
            .packages
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::trace!(name, path, "created package");
                Arc::new(Package::new(name, path))
            })
            .clone()
    }

    /// Register a descriptor, an inline definition (`options.definition`) or
    /// a type loaded from `options.package_path`
    pub fn register(&self, name: &str, options: &LookupOptions) -> Result<(), ResolveError> {
        self.register_ref(TypeRef::parse(name, options))
    }

    /// Register named descriptors under their own names
    pub fn register_types(&self, types: &[Type], options: &LookupOptions) -> Result<(), ResolveError> {
        for ty in types {
            let name = ty.deref().name();
            if name.is_empty() {
                return Err(ResolveError::unsupported("unnamed descriptor", ty.to_string()));
            }
            self.register(name, &options.clone().with_type(ty.clone()))?;
        }
        Ok(())
    }

    fn register_ref(&self, mut type_ref: TypeRef) -> Result<(), ResolveError> {
        self.ensure_package(&type_ref.package, &type_ref.package_path);
        let ty = match type_ref.ty.take() {
            Some(ty) => ty,
            None if type_ref.is_loadable() => self.load_type(&mut type_ref)?,
            None => {
                return Err(ResolveError::NotFound { kind: "descriptor", name: type_ref.type_name() });
            }
        };
        let package = self.ensure_package(&type_ref.package, &type_ref.package_path);
        let name = type_ref.name.clone();
        type_ref.ty = Some(ty.clone());
        if package.register(&name, ty.clone()) {
            self.state.write().info.insert(ty, type_ref);
        }
        Ok(())
    }

    fn load_type(&self, type_ref: &mut TypeRef) -> Result<Type, ResolveError> {
        if !type_ref.package_path.is_empty() {
            return self.load_from_dir(type_ref);
        }
        let options = self.parse_options().with_package(type_ref.package.as_str());
        parse(&type_ref.definition, options)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(path = %type_ref.package_path, name = %type_ref.name))]
    fn load_from_dir(&self, type_ref: &mut TypeRef) -> Result<Type, ResolveError> {
        let name = raw_name(&type_ref.name).to_string();
        let path = type_ref.package_path.clone();
        let mut package = self.owning_package(&self.ensure_package(&type_ref.package, &path), &path);
        let dir = match package.dir_types() {
            Some(dir) => dir,
            None => {
                let dir = Arc::new(parse_types(&path, self.parse_options())?);
                if let Some(declared) = declared_package_name(&dir) {
                    if declared != package.name() {
                        tracing::debug!(from = package.name(), to = %declared, "re-keying package");
                        package.set_corrected_name(&path, &declared);
                        package = self.ensure_package(&declared, &path);
                    }
                }
                package.set_dir_types(dir)
            }
        };
        let ty = dir.type_of(&name)?;
        type_ref.module_path = dir.index().module_path().to_string();
        type_ref.package = package.name().to_string();
        let methods = dir.methods(&name).to_vec();
        if !methods.is_empty() {
            package.set_methods(&type_ref.name, methods.clone());
        }
        type_ref.methods = methods;
        Ok(ty)
    }

    fn parse_options(&self) -> ParseOptions {
        ParseOptions::default().with_lookup(Arc::new(RegistryLookup(self.this.clone())))
    }

    /// Methods declared on the receiver `name`, loading its package if needed
    pub fn methods(&self, name: &str, options: &LookupOptions) -> Result<Vec<FuncDecl>, ResolveError> {
        let type_ref = TypeRef::parse(name, options);
        match self.local_methods(&type_ref) {
            Ok(methods) => Ok(methods),
            Err(err) => match self.parent() {
                Some(parent) => parent.methods(name, options),
                None => Err(err),
            },
        }
    }

    fn local_methods(&self, type_ref: &TypeRef) -> Result<Vec<FuncDecl>, ResolveError> {
        self.lookup_local(type_ref)?;
        let package = self
            .package(&type_ref.package)
            .ok_or_else(|| ResolveError::type_not_found(&type_ref.package, &type_ref.name))?;
        Ok(self.owning_package(&package, &type_ref.package_path).methods(&type_ref.name))
    }

    /// Literal value of a top-level constant or variable of the package
    /// selected by `options`; string literals are unquoted
    pub fn symbol(&self, symbol: &str, options: &LookupOptions) -> Result<String, ResolveError> {
        let type_ref = TypeRef::parse("", options);
        let package = self.ensure_package(&type_ref.package, &type_ref.package_path);
        let package = self.owning_package(&package, &type_ref.package_path);
        let dir = self.package_dir(&package, &type_ref.package_path)?;
        match dir.value(symbol)? {
            ValueExpr::Lit(lit) if lit.kind == LitKind::String => unquote(&lit.raw)
                .map_err(|source| ResolveError::TagDecode { tag: lit.raw.clone(), source }),
            ValueExpr::Lit(lit) => Ok(lit.raw),
            other => Err(ResolveError::unsupported("value", other.to_string())),
        }
    }

    fn package_dir(&self, package: &Package, path: &str) -> Result<Arc<DirTypes>, ResolveError> {
        if let Some(dir) = package.dir_types() {
            return Ok(dir);
        }
        let path = if path.is_empty() { package.path() } else { path };
        if path.is_empty() {
            return Err(ResolveError::NotFound { kind: "package", name: package.name().to_string() });
        }
        let dir = Arc::new(parse_types(path, self.parse_options())?);
        Ok(package.set_dir_types(dir))
    }

    /// Copy every registered descriptor of `other` into this registry
    pub fn merge_from(&self, other: &Registry) -> Result<(), ResolveError> {
        for name in other.package_names() {
            let Some(source) = other.package(&name) else {
                continue;
            };
            let dest = self.ensure_package(source.name(), source.path());
            for type_name in source.type_names() {
                dest.register(&type_name, source.lookup(&type_name)?);
            }
        }
        Ok(())
    }
}

/// Package name a directory declares, overridden by a `PackageName` constant
fn declared_package_name(dir: &DirTypes) -> Option<String> {
    if let Ok(ValueExpr::Lit(lit)) = dir.value(PACKAGE_NAME_CONSTANT) {
        if lit.kind == LitKind::String {
            if let Ok(name) = unquote(&lit.raw) {
                if !name.is_empty() {
                    return Some(name);
                }
            }
        }
    }
    dir.package_name().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gotype_types::{Field, Kind, NamedType};
    use pretty_assertions::assert_eq;
    use std::path::{Path, PathBuf};

    fn testdata(dir: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join(dir)
    }

    fn order() -> Type {
        Type::named(
            NamedType::new("Order", "shop", "example.com/shop")
                .with_underlying(Type::Struct(vec![Field::new("ID", Type::Int)])),
        )
    }

    #[test]
    fn test_primitives() {
        let registry = Registry::new(RegistryOptions::default());
        for (name, ty) in [("int", Type::Int), ("byte", Type::Uint8), ("string", Type::String), ("any", Type::Interface)] {
            assert_eq!(registry.lookup(name, &LookupOptions::default()).unwrap(), ty);
        }
        let time = registry.lookup("time.Time", &LookupOptions::default()).unwrap();
        assert_eq!(time.to_string(), "time.Time");
        let times = registry.lookup("[]*time.Time", &LookupOptions::default()).unwrap();
        assert_eq!(times.to_string(), "[]*time.Time");
    }

    #[test]
    fn test_register_and_decompose() {
        let registry = Registry::new(RegistryOptions::default().with_type("shop.Order", order()));
        let options = LookupOptions::default();
        assert_eq!(registry.lookup("shop.Order", &options).unwrap(), order());
        assert_eq!(registry.lookup("*shop.Order", &options).unwrap(), Type::pointer_to(order()));
        assert_eq!(registry.lookup("[]shop.Order", &options).unwrap(), Type::slice_of(order()));
        assert_eq!(
            registry.lookup("map[string]*shop.Order", &options).unwrap().to_string(),
            "map[string]*shop.Order"
        );
        assert_eq!(registry.lookup("Order", &options.clone().with_package("shop")).unwrap(), order());
        assert!(registry.has("shop.Order"));
        assert!(!registry.has("shop.Item"));
        assert_eq!(registry.info(&order()).map(|r| r.type_name()), Some("shop.Order".to_string()));
    }

    #[test]
    fn test_register_definition() {
        let registry = Registry::new(RegistryOptions::default().with_type("shop.Order", order()));
        registry
            .register("shop.Line", &LookupOptions::default().with_definition("struct{ Order *Order; Qty int }"))
            .unwrap();
        let line = registry.lookup("shop.Line", &LookupOptions::default()).unwrap();
        assert_eq!(line.to_string(), "struct { Order *shop.Order; Qty int }");

        let inline = registry.lookup("[]struct{ ID int }", &LookupOptions::default()).unwrap();
        assert_eq!(inline.to_string(), "[]struct { ID int }");
    }

    #[test]
    fn test_named_descriptor_is_kept() {
        let registry = Registry::new(RegistryOptions::default().with_type("shop.Order", order()));
        registry
            .register("shop.Order", &LookupOptions::default().with_type(Type::Struct(vec![])))
            .unwrap();
        assert_eq!(registry.lookup("shop.Order", &LookupOptions::default()).unwrap(), order());
    }

    #[test]
    fn test_register_types() {
        let registry = Registry::new(RegistryOptions::default());
        registry
            .register_types(&[order(), Type::pointer_to(order())], &LookupOptions::default().with_package("shop"))
            .unwrap();
        assert_eq!(registry.lookup("shop.Order", &LookupOptions::default()).unwrap(), order());
        let err = registry
            .register_types(&[Type::Struct(vec![])], &LookupOptions::default())
            .unwrap_err();
        assert!(matches!(err, ResolveError::Unsupported { .. }));
    }

    #[test]
    fn test_parent_fallback() {
        let parent = Registry::new(RegistryOptions::default().with_type("shop.Order", order()));
        let child = Registry::new(RegistryOptions::default().with_parent(parent.clone()));
        assert_eq!(child.lookup("shop.Order", &LookupOptions::default()).unwrap(), order());
        assert!(!child.has("shop.Order"));

        let orphan = Registry::new(RegistryOptions::default());
        assert!(orphan.lookup("shop.Order", &LookupOptions::default()).unwrap_err().is_not_found());
        orphan.set_parent(parent);
        assert!(orphan.lookup("shop.Order", &LookupOptions::default()).is_ok());
    }

    #[test]
    fn test_parent_load_error_is_surfaced() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("broken.go"), "package shop\n\ntype Broken struct {\n\tA int \"\\q\"\n}\n")
            .unwrap();
        let parent = Registry::new(RegistryOptions::default());
        let child = Registry::new(RegistryOptions::default().with_parent(parent));
        // the child's shop package is bound to another directory, so only the parent can load Broken
        let shop = LookupOptions::default().with_package("shop");
        child
            .lookup("Order", &shop.clone().with_package_path(testdata("shop").display().to_string()))
            .unwrap();

        let broken = shop.with_package_path(tmp.path().display().to_string());
        let err = child.lookup("Broken", &broken).unwrap_err();
        assert!(matches!(err, ResolveError::TagDecode { .. }), "unexpected error {:?}", err);
    }

    #[test]
    fn test_not_found_is_deterministic() {
        let registry = Registry::new(RegistryOptions::default());
        for _ in 0..2 {
            let err = registry.lookup("shop.Missing", &LookupOptions::default()).unwrap_err();
            assert_eq!(err.to_string(), "type not found: shop.Missing");
        }
    }

    #[test]
    fn test_load_from_directory() {
        let registry = Registry::new(RegistryOptions::default());
        let path = testdata("shop");
        let options = LookupOptions::default().with_package_path(path.display().to_string());
        let order = registry.lookup("Order", &options).unwrap();
        assert_eq!(
            order.to_string(),
            "struct { ID int; Lines []*struct { SKU string; Qty int }; Customer *struct { Name string } }"
        );
        // the entry created without a name is re-keyed under the declared package
        assert_eq!(registry.package_names(), vec!["".to_string(), "shop".to_string()]);
        let package = registry.package("shop").unwrap();
        assert_eq!(package.type_names(), vec!["Order".to_string()]);
        assert_eq!(
            registry.package("").unwrap().corrected_name(&path.display().to_string()),
            Some("shop".to_string())
        );
        assert_eq!(registry.lookup("shop.Order", &LookupOptions::default()).unwrap(), order);

        let methods = registry.methods("Order", &options).unwrap();
        let names: Vec<_> = methods.iter().map(|m| m.name.name.as_str()).collect();
        assert_eq!(names, vec!["Total", "Validate"]);
        let info = registry.info(&order).unwrap();
        assert_eq!(info.package, "shop");
        assert_eq!(info.methods.len(), 2);
    }

    #[test]
    fn test_package_name_constant() {
        let registry = Registry::new(RegistryOptions::default());
        let path = testdata("legacy").display().to_string();
        let options = LookupOptions::default().with_package("legacy").with_package_path(path.as_str());
        let invoice = registry.lookup("Invoice", &options).unwrap();
        assert_eq!(invoice.kind(), Kind::Struct);
        assert!(registry.package("billing").is_some_and(|p| p.lookup("Invoice").is_ok()));
        assert_eq!(registry.symbol("PackageName", &options).unwrap(), "billing");
        assert_eq!(registry.symbol("Version", &options).unwrap(), "3");
        assert!(registry.symbol("Missing", &options).unwrap_err().is_not_found());
    }

    #[test]
    fn test_symbol_needs_source() {
        let registry = Registry::new(RegistryOptions::default());
        let err = registry.symbol("PackageName", &LookupOptions::default().with_package("nowhere")).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { kind: "package", .. }));
    }

    #[test]
    fn test_registry_as_lookup() {
        let registry = Registry::new(RegistryOptions::default().with_type("shop.Order", order()));
        let ty = parse(
            "struct { Orders []*shop.Order; Count int }",
            ParseOptions::default().with_lookup(registry.clone()),
        )
        .unwrap();
        assert_eq!(ty.to_string(), "struct { Orders []*shop.Order; Count int }");
    }

    #[test]
    fn test_merge_from() {
        let source = Registry::new(RegistryOptions::default().with_type("shop.Order", order()));
        let dest = Registry::new(RegistryOptions::default());
        dest.merge_from(&source).unwrap();
        assert!(dest.has("shop.Order"));
        assert_eq!(dest.package_names(), vec!["shop".to_string()]);
    }

    #[test]
    fn test_concurrent_lookups() {
        let registry = Registry::new(RegistryOptions::default());
        let path = testdata("shop").display().to_string();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let registry = registry.clone();
                let path = path.clone();
                scope.spawn(move || {
                    let options = LookupOptions::default().with_package_path(path);
                    let order = registry.lookup("Order", &options).unwrap();
                    assert_eq!(order.fields().len(), 3);
                });
            }
        });
        assert!(registry.has("shop.Order"));
    }
}
