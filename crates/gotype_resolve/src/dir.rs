use crate::matcher::Matcher;
use crate::{ParseOptions, ResolveError};
use gotype_ast::{FuncDecl, ValueExpr};
use gotype_index::{DeclIndex, ModuleInfo, scan_dir};
use gotype_parser::Parser;
use gotype_types::{NamedType, Type};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolved view over one scanned directory.
///
/// Descriptors are built lazily and memoized per name. Directories reached
/// through imports of the same module are scanned once and cached by their
/// folder below the module root.
#[derive(Debug)]
pub struct DirTypes {
    index: DeclIndex,
    options: ParseOptions,
    module: Option<ModuleInfo>,
    types: RwLock<FxHashMap<String, Type>>,
    sub_dirs: RwLock<FxHashMap<String, Arc<DirTypes>>>,
}

/// Scan `path` and prepare it for resolution
#[tracing::instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
pub fn parse_types(path: impl AsRef<Path>, options: ParseOptions) -> Result<DirTypes, ResolveError> {
    let index = scan_dir(path.as_ref(), options.mode)?;
    Ok(DirTypes::new(index, options))
}

/// Resolve an inline type definition such as `[]*struct{ID int}`
pub fn parse(definition: &str, options: ParseOptions) -> Result<Type, ResolveError> {
    let expr = Parser::parse_type_definition(definition)
        .map_err(|error| ResolveError::Parse { definition: definition.to_string(), error })?;
    let dir = DirTypes::new(DeclIndex::default(), options);
    let mut stack = Vec::new();
    let package = dir.options.package.clone();
    Matcher::new(&dir, None, package, &mut stack).match_type(None, &expr)
}

impl DirTypes {
    fn new(index: DeclIndex, options: ParseOptions) -> Self {
        let module = match &options.module {
            Some(module) => Some(module.clone()),
            None if options.module_aware => index.module().cloned(),
            None => None,
        };
        Self {
            index,
            options,
            module,
            types: RwLock::new(FxHashMap::default()),
            sub_dirs: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn index(&self) -> &DeclIndex {
        &self.index
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn dir(&self) -> &Path {
        self.index.dir()
    }

    /// Module used for cross-directory resolution
    pub fn module(&self) -> Option<&ModuleInfo> {
        self.module.as_ref()
    }

    /// Declared package name of the directory
    pub fn package_name(&self) -> Option<&str> {
        self.index.package_name()
    }

    pub fn type_names(&self) -> Vec<String> {
        self.index.type_names()
    }

    pub fn type_names_in_file(&self, file: &Path) -> Vec<String> {
        self.index.type_names_in_file(file)
    }

    pub fn files(&self) -> &[PathBuf] {
        self.index.files()
    }

    /// Descriptor of the type declared as `name`. A declaration reaching
    /// itself holds a forward reference at the point of recursion.
    pub fn type_of(&self, name: &str) -> Result<Type, ResolveError> {
        self.resolve_named(name, &mut Vec::new())
    }

    pub(crate) fn resolve_named(&self, name: &str, stack: &mut Vec<String>) -> Result<Type, ResolveError> {
        if let Some(ty) = self.types.read().get(name) {
            tracing::trace!(name, "memoized type");
            return Ok(ty.clone());
        }
        let Some(indexed) = self.index.spec(name) else {
            return Err(ResolveError::type_not_found("", name));
        };
        if stack.iter().any(|pending| pending == name) {
            tracing::debug!(name, "self reference, using forward reference");
            let forward = NamedType::new(name, indexed.package.as_str(), self.index.module_path());
            return Ok(Type::named(forward));
        }

        stack.push(name.to_string());
        let imports = self.index.file_imports(&indexed.file);
        let result = Matcher::new(self, imports, indexed.package.clone(), stack).resolve_spec(indexed);
        stack.pop();
        let ty = result?;
        if has_pending_reference(&ty, stack, self.index.module_path()) {
            tracing::trace!(name, "not memoized, refers to a pending declaration");
            return Ok(ty);
        }

        let mut types = self.types.write();
        Ok(types.entry(name.to_string()).or_insert(ty).clone())
    }

    /// Initializer of a top-level constant or variable
    pub fn value(&self, symbol: &str) -> Result<ValueExpr, ResolveError> {
        self.index
            .value(symbol)
            .cloned()
            .ok_or_else(|| ResolveError::value_not_found(symbol))
    }

    /// Initializer of a top-level constant or variable declared in `file`
    pub fn value_in_file(&self, file: &Path, symbol: &str) -> Result<ValueExpr, ResolveError> {
        if !self.index.has_file(file) {
            return Err(ResolveError::file_not_found(&file.display().to_string()));
        }
        self.index
            .value_in_file(file, symbol)
            .cloned()
            .ok_or_else(|| ResolveError::value_not_found(symbol))
    }

    /// Method declarations whose receiver base type is `receiver`
    pub fn methods(&self, receiver: &str) -> &[FuncDecl] {
        self.index.methods(receiver)
    }

    /// Import paths used by the directory; a trailing `*` matches by prefix
    pub fn imports(&self, path: &str) -> Vec<String> {
        self.index.imports(path)
    }

    /// Directory previously reached through an import, by folder
    pub fn sub_dir(&self, folder: &str) -> Option<Arc<DirTypes>> {
        self.sub_dirs.read().get(folder).cloned()
    }

    /// Type names of a directory previously reached through an import
    pub fn types_in_folder(&self, folder: &str) -> Vec<String> {
        self.sub_dir(folder).map(|dir| dir.type_names()).unwrap_or_default()
    }

    /// Scan (or reuse) the module directory behind an import path. Returns
    /// `None` when the import is outside the module or cannot be scanned.
    pub(crate) fn sub_dir_for_import(&self, import_path: &str) -> Option<Arc<DirTypes>> {
        let module = self.module.as_ref()?;
        let folder = module.folder(import_path)?;
        if let Some(dir) = self.sub_dir(folder) {
            return Some(dir);
        }
        let path = module.dir_of(import_path)?;
        if path == self.index.dir() {
            return None;
        }
        let options = ParseOptions {
            package: String::new(),
            module: Some(module.clone()),
            ..self.options.clone()
        };
        let dir = match parse_types(&path, options) {
            Ok(dir) => Arc::new(dir),
            Err(err) => {
                tracing::warn!(import = import_path, %err, "failed to scan imported directory");
                return None;
            }
        };
        let mut sub_dirs = self.sub_dirs.write();
        Some(sub_dirs.entry(folder.to_string()).or_insert(dir).clone())
    }
}

/// Whether `ty` holds a forward reference to a declaration that is still
/// being resolved further up the stack
fn has_pending_reference(ty: &Type, stack: &[String], pkg_path: &str) -> bool {
    match ty {
        Type::Named(named) => {
            named.underlying.is_none() && named.pkg_path == pkg_path && stack.iter().any(|pending| *pending == named.name)
        }
        Type::Pointer(elem) | Type::Slice(elem) => has_pending_reference(elem, stack, pkg_path),
        Type::Map(key, value) => {
            has_pending_reference(key, stack, pkg_path) || has_pending_reference(value, stack, pkg_path)
        }
        Type::Struct(fields) => fields.iter().any(|field| has_pending_reference(&field.ty, stack, pkg_path)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LookupOptions;
    use gotype_ast::LitKind;
    use gotype_index::{GoImport, GoImports};
    use gotype_parser::ParseMode;
    use gotype_types::{Field, Kind, StructTag, TAG_TYPE_NAME, append_tag};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn testdata() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata")
    }

    fn write_files(dir: &Path, files: &[(&str, &str)]) {
        for (name, content) in files {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
    }

    const STATE: &str = r#"struct { Records []*struct { Id int; Name string } "xdatly:\"kind:data_view\" doc:\"SELECT * FROM MY_TABLE WHERE USER_ID = $Jwt.UserID\""; Auth *struct { UserID int } "xdatly:\"kind:header,name=Authorization,codec=JwtClaim,statusCode:401\"" }"#;

    #[test]
    fn test_resolve_foo() {
        let dir = parse_types(testdata(), ParseOptions::default()).unwrap();
        let foo = dir.type_of("Foo").unwrap();
        assert_eq!(foo.to_string(), "struct { ID string; Name string; Price float64 }");
        assert_eq!(foo.fields().len(), 3);
        assert_eq!(dir.methods("Foo").len(), 1);
        assert_eq!(dir.methods("Foo")[0].name.name, "Validate");
        assert_eq!(dir.package_name(), Some("testdata"));
    }

    #[test]
    fn test_resolve_embedded_struct() {
        let dir = parse_types(testdata(), ParseOptions::default()).unwrap();
        let boo = dir.type_of("Boo").unwrap();
        assert_eq!(
            boo.to_string(),
            "struct { ID int; Name string; Foo struct { ID string; Name string; Price float64 } }"
        );
        let embedded = &boo.fields()[2];
        assert_eq!(embedded.name, "Foo");
        assert!(embedded.anonymous);
        assert!(embedded.is_exported());
    }

    #[test]
    fn test_doc_tags() {
        let dir = parse_types(testdata(), ParseOptions::default().with_doc_tags(true)).unwrap();
        assert_eq!(dir.type_of("State").unwrap().to_string(), STATE);
    }

    #[test]
    fn test_doc_tags_disabled() {
        let dir = parse_types(testdata(), ParseOptions::default()).unwrap();
        assert_eq!(
            dir.type_of("State").unwrap().to_string(),
            r#"struct { Records []*struct { Id int; Name string } "xdatly:\"kind:data_view\""; Auth *struct { UserID int } "xdatly:\"kind:header,name=Authorization,codec=JwtClaim,statusCode:401\"" }"#
        );
    }

    #[test]
    fn test_field_hook_rewrites_tag() {
        let options = ParseOptions::default()
            .with_mode(ParseMode::Comments)
            .with_on_field(|type_name, field, _, tag| {
                if type_name != "State" {
                    return Ok(());
                }
                if let Some(doc) = &field.doc {
                    *tag = append_tag(tag, "doc", &doc.text());
                }
                Ok(())
            });
        let dir = parse_types(testdata(), options).unwrap();
        assert_eq!(dir.type_of("State").unwrap().to_string(), STATE);
        let record = dir.type_of("Record").unwrap();
        assert_eq!(record.to_string(), "struct { Id int; Name string }");
    }

    #[test]
    fn test_struct_hook_sees_declaration() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = ParseOptions::default().with_on_struct(move |spec, body| {
            let name = spec.map(|s| s.name.name.clone()).unwrap_or_default();
            sink.lock().push((name, body.fields.len()));
            Ok(())
        });
        let dir = parse_types(testdata(), options).unwrap();
        dir.type_of("Foo").unwrap();
        assert_eq!(*seen.lock(), vec![("Foo".to_string(), 3)]);
    }

    #[test]
    fn test_value() {
        let dir = parse_types(testdata(), ParseOptions::default()).unwrap();
        match dir.value("PackageName").unwrap() {
            ValueExpr::Lit(lit) => {
                assert_eq!(lit.kind, LitKind::String);
                assert_eq!(lit.raw, "\"abc\"");
            }
            other => panic!("unexpected value {:?}", other),
        }
        assert!(dir.value("Missing").unwrap_err().is_not_found());

        let foo = testdata().join("foo.go");
        assert!(dir.value_in_file(&foo, "PackageName").is_ok());
        let err = dir.value_in_file(&testdata().join("nope.go"), "PackageName").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { kind: "file", .. }));
    }

    #[test]
    fn test_not_found_is_deterministic() {
        let dir = parse_types(testdata(), ParseOptions::default()).unwrap();
        for _ in 0..2 {
            let err = dir.type_of("Missing").unwrap_err();
            assert_eq!(err.to_string(), "type not found: Missing");
        }
        let err = parse("[]Unknown", ParseOptions::default()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_parse_definitions() {
        for definition in [
            "int",
            "*string",
            "[]*[]struct { Name string; Price float64 }",
            "map[string]interface {}",
            "*time.Time",
            "struct {}",
            r#"struct { ID int "json:\"id,omitempty\""; Raw json.RawMessage }"#,
        ] {
            let ty = parse(definition, ParseOptions::default()).unwrap();
            assert_eq!(ty.to_string(), definition);
        }
        let ty = parse("[4]byte", ParseOptions::default()).unwrap();
        assert_eq!(ty, Type::slice_of(Type::Uint8));
        let ty = parse("interface{ Close() error }", ParseOptions::default()).unwrap();
        assert_eq!(ty.kind(), Kind::Interface);
    }

    #[test]
    fn test_parse_with_lookup() {
        let lookup = |name: &str, options: &LookupOptions| match (options.package.as_str(), name) {
            ("xreflect", "Boo") => Ok(Type::named(
                NamedType::new("Boo", "xreflect", "github.com/viant/xreflect")
                    .with_underlying(Type::Struct(vec![Field::new("ID", Type::Int)])),
            )),
            ("", "Money") => Ok(Type::Float64),
            _ => Err(ResolveError::type_not_found(&options.package, name)),
        };
        let options = ParseOptions::default().with_lookup(Arc::new(lookup));
        let ty = parse("struct { Name string; Price xreflect.Boo; Total Money }", options).unwrap();
        assert_eq!(ty.to_string(), "struct { Name string; Price xreflect.Boo; Total float64 }");
        assert_eq!(ty.fields()[1].ty.pkg_path(), "github.com/viant/xreflect");
    }

    #[test]
    fn test_qualified_retry_with_import_path() {
        let lookup = |name: &str, options: &LookupOptions| match (options.package.as_str(), name) {
            ("github.com/acme/model", "Order") => Ok(Type::Struct(vec![Field::new("ID", Type::Int)])),
            _ => Err(ResolveError::type_not_found(&options.package, name)),
        };
        let options = ParseOptions::default()
            .with_lookup(Arc::new(lookup))
            .with_imports(GoImports::new(vec![GoImport::new(Some("m"), "github.com/acme/model")]));
        let ty = parse("[]m.Order", options).unwrap();
        assert_eq!(ty.to_string(), "[]struct { ID int }");
    }

    #[test]
    fn test_anonymous_named_field() {
        let lookup = |name: &str, _: &LookupOptions| {
            Ok::<_, ResolveError>(Type::named(NamedType::new(name, "xreflect", "github.com/viant/xreflect")))
        };
        let options = ParseOptions::default().with_lookup(Arc::new(lookup));
        let ty = parse(
            r#"struct { Boo xreflect.Boo `json:",anonymous"`; Other xreflect.Boo; xreflect.Embedded }"#,
            options,
        )
        .unwrap();
        let fields = ty.fields();
        assert!(fields[0].anonymous);
        assert!(!fields[1].anonymous);
        assert_eq!(fields[2].name, "Embedded");
        assert!(fields[2].anonymous);
    }

    #[test]
    fn test_unexported_fields_carry_package() {
        let ty = parse("struct { id int; Name string }", ParseOptions::default().with_package("shop")).unwrap();
        assert_eq!(ty.fields()[0].pkg_path, "shop");
        assert_eq!(ty.fields()[1].pkg_path, "");
        let ty = parse("struct { id int }", ParseOptions::default()).unwrap();
        assert_eq!(ty.fields()[0].pkg_path, "autogen");
    }

    #[test]
    fn test_unsupported_constructs() {
        for (definition, construct) in [("chan int", "chan"), ("func(a int) error", "func"), ("List[int]", "generic instantiation")] {
            let err = parse(definition, ParseOptions::default()).unwrap_err();
            match err {
                ResolveError::Unsupported { construct: got, .. } => assert_eq!(got, construct),
                other => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[test]
    fn test_invalid_tag() {
        let err = parse(r#"struct { A int "\q" }"#, ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ResolveError::TagDecode { .. }));
    }

    #[test]
    fn test_parse_error() {
        let err = parse("struct {", ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ResolveError::Parse { .. }));
    }

    #[test]
    fn test_type_name_tag_is_rewritten() {
        let tmp = tempfile::tempdir().unwrap();
        write_files(
            tmp.path(),
            &[(
                "model.go",
                "package model\n\ntype BarType struct {\n\tBarName string\n}\n\ntype Foo struct {\n\tBar *BarType `json:\"bar\" typeName:\"Other\"`\n\tBaz struct{ ID int } `typeName:\"Baz\"`\n}\n",
            )],
        );
        let dir = parse_types(tmp.path(), ParseOptions::default()).unwrap();
        let foo = dir.type_of("Foo").unwrap();
        let fields = foo.fields();
        assert_eq!(fields[0].tag, r#"json:"bar" typeName:"BarType""#);
        assert_eq!(StructTag(&fields[1].tag).get(TAG_TYPE_NAME), "Baz");
    }

    #[test]
    fn test_self_reference() {
        let tmp = tempfile::tempdir().unwrap();
        write_files(
            tmp.path(),
            &[("list.go", "package list\n\ntype Node struct {\n\tValue int\n\tNext  *Node\n}\n")],
        );
        let dir = parse_types(tmp.path(), ParseOptions::default().with_module_aware(false)).unwrap();
        let node = dir.type_of("Node").unwrap();
        assert_eq!(node.to_string(), "struct { Value int; Next *list.Node }");
        assert!(node.fields()[1].ty.deref().is_named());
    }

    #[test]
    fn test_mutual_reference_terminates() {
        let tmp = tempfile::tempdir().unwrap();
        write_files(
            tmp.path(),
            &[(
                "tree.go",
                "package tree\n\ntype Parent struct {\n\tChildren []*Child\n}\n\ntype Child struct {\n\tParent *Parent\n}\n",
            )],
        );
        let dir = parse_types(tmp.path(), ParseOptions::default()).unwrap();
        let parent = dir.type_of("Parent").unwrap();
        assert_eq!(parent.to_string(), "struct { Children []*struct { Parent *tree.Parent } }");

        // Child resolved inside Parent is not cached with Parent's forward reference
        let child = dir.type_of("Child").unwrap();
        assert_eq!(child.to_string(), "struct { Parent *struct { Children []*tree.Child } }");
        let fresh = parse_types(tmp.path(), ParseOptions::default()).unwrap();
        assert_eq!(fresh.type_of("Child").unwrap(), child);
    }

    #[test]
    fn test_local_declaration_wins_over_lookup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let lookup = move |_: &str, _: &LookupOptions| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ResolveError>(Type::Int)
        };
        let dir = parse_types(testdata(), ParseOptions::default().with_lookup(Arc::new(lookup))).unwrap();
        let boo = dir.type_of("Boo").unwrap();
        assert_eq!(boo.fields()[2].ty.kind(), Kind::Struct);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_lookup_hook() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = ParseOptions::default().with_on_lookup(move |_, package, name, _| {
            sink.lock().push(format!("{}:{}", package, name));
        });
        let dir = parse_types(testdata(), options).unwrap();
        dir.type_of("State").unwrap();
        assert_eq!(*seen.lock(), vec!["testdata:Record".to_string(), "testdata:Authentication".to_string()]);
    }

    #[test]
    fn test_cross_directory_resolution() {
        let tmp = tempfile::tempdir().unwrap();
        write_files(
            tmp.path(),
            &[
                ("go.mod", "module example.com/app\n\ngo 1.21\n"),
                ("model/order.go", "package model\n\ntype Order struct {\n\tID    int\n\tnote  string\n\tItems []Item\n}\n\ntype Item struct {\n\tSKU string\n}\n"),
                (
                    "api/handler.go",
                    "package api\n\nimport (\n\tm \"example.com/app/model\"\n)\n\ntype Request struct {\n\tOrder *m.Order\n}\n",
                ),
                (
                    "web/page.go",
                    "package web\n\nimport \"example.com/app/model\"\n\ntype Page struct {\n\tItems []model.Item\n}\n",
                ),
            ],
        );
        let api = parse_types(tmp.path().join("api"), ParseOptions::default()).unwrap();
        let model = parse_types(tmp.path().join("model"), ParseOptions::default()).unwrap();
        let request = api.type_of("Request").unwrap();
        assert_eq!(request.fields()[0].ty, Type::pointer_to(model.type_of("Order").unwrap()));
        assert_eq!(request.fields()[0].ty.deref().fields()[1].pkg_path, "model");
        assert!(api.sub_dir("model").is_some());
        assert_eq!(api.types_in_folder("model"), vec!["Item".to_string(), "Order".to_string()]);

        let web = parse_types(tmp.path().join("web"), ParseOptions::default()).unwrap();
        let page = web.type_of("Page").unwrap();
        assert_eq!(page.fields()[0].ty, Type::slice_of(model.type_of("Item").unwrap()));
    }

    #[test]
    fn test_cross_directory_needs_module() {
        let tmp = tempfile::tempdir().unwrap();
        write_files(
            tmp.path(),
            &[
                ("go.mod", "module example.com/app\n"),
                ("model/order.go", "package model\n\ntype Order struct {\n\tID int\n}\n"),
                ("api/handler.go", "package api\n\nimport \"example.com/app/model\"\n\ntype Request struct {\n\tOrder model.Order\n}\n"),
            ],
        );
        let api = parse_types(tmp.path().join("api"), ParseOptions::default().with_module_aware(false)).unwrap();
        assert!(api.type_of("Request").unwrap_err().is_not_found());
    }
}
