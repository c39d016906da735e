//! Per-directory declaration index

use crate::imports::{GoImports, ModuleInfo, find_module};
use gotype_ast::{Decl, FuncDecl, SourceFile, TypeSpec, ValueExpr};
use gotype_parser::{ParseError, ParseMode, Parser};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// Errors while scanning a directory
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {error}", file.display())]
    Parse {
        file: PathBuf,
        error: ParseError,
        /// Annotated source report
        report: String,
    },
}

/// A type declaration and the file that declared it
#[derive(Debug, Clone)]
pub struct IndexedSpec {
    pub file: PathBuf,
    pub package: String,
    pub spec: TypeSpec,
}

/// Top-level symbols of one file
#[derive(Debug, Default)]
struct FileScope {
    /// Type names in declaration order
    type_names: Vec<String>,
    /// Constants and variables with an initializer
    values: FxHashMap<String, ValueExpr>,
}

/// Declarations found in one directory.
///
/// Type names are unique per directory: when two files declare the same
/// name, the file sorting later wins and both files are kept in
/// `occurrences`.
#[derive(Debug, Default)]
pub struct DeclIndex {
    dir: PathBuf,
    files: Vec<PathBuf>,
    specs: FxHashMap<String, IndexedSpec>,
    methods: FxHashMap<String, Vec<FuncDecl>>,
    imports: FxHashMap<PathBuf, GoImports>,
    scopes: FxHashMap<PathBuf, FileScope>,
    occurrences: FxHashMap<String, Vec<PathBuf>>,
    packages: FxHashMap<PathBuf, String>,
    module: Option<ModuleInfo>,
    module_path: String,
}

/// Parse every `.go` file of `dir` (not recursively, `_test.go` excluded)
/// and index its declarations. Any parse failure aborts the whole directory.
#[tracing::instrument(level = "debug", skip_all, fields(dir = %dir.display()))]
pub fn scan_dir(dir: &Path, mode: ParseMode) -> Result<DeclIndex, ScanError> {
    let mut index = DeclIndex::new(dir);
    for path in source_files(dir)? {
        let source = std::fs::read_to_string(&path)
            .map_err(|source| ScanError::Io { path: path.clone(), source })?;
        let file = Parser::parse_file(&source, mode).map_err(|error| {
            let report = error.render(&path.display().to_string(), &source);
            tracing::warn!(file = %path.display(), "failed to parse source file\n{}", report);
            ScanError::Parse { file: path.clone(), error, report }
        })?;
        index.add_file(path, &file);
    }
    index.detect_module();
    tracing::debug!(
        types = index.specs.len(),
        files = index.files.len(),
        module = %index.module_path,
        "indexed directory"
    );
    Ok(index)
}

fn source_files(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let io_error = |source| ScanError::Io { path: dir.to_path_buf(), source };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.ends_with(".go") && !name.ends_with("_test.go") && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl DeclIndex {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf(), ..Default::default() }
    }

    /// Index an already parsed file
    pub fn add_file(&mut self, path: PathBuf, file: &SourceFile) {
        let package = file.package.name.clone();
        self.packages.insert(path.clone(), package.clone());
        if let Some(parent) = path.parent() {
            self.packages.insert(parent.to_path_buf(), package.clone());
        }
        self.imports.insert(path.clone(), GoImports::from_specs(&file.imports));

        let mut scope = FileScope::default();
        for decl in &file.decls {
            match decl {
                Decl::Type(spec) => {
                    let name = spec.name.name.clone();
                    scope.type_names.push(name.clone());
                    self.occurrences.entry(name.clone()).or_default().push(path.clone());
                    self.specs.insert(
                        name,
                        IndexedSpec { file: path.clone(), package: package.clone(), spec: spec.clone() },
                    );
                }
                Decl::Func(func) => {
                    if let Some(receiver) = func.recv.as_ref().and_then(|r| r.base_name()) {
                        self.methods.entry(receiver.to_string()).or_default().push(func.clone());
                    }
                }
                Decl::Value(spec) => {
                    for (name, value) in spec.names.iter().zip(&spec.values) {
                        scope.values.insert(name.name.clone(), value.clone());
                    }
                }
            }
        }
        self.scopes.insert(path.clone(), scope);
        self.files.push(path);
        self.files.sort();
    }

    fn detect_module(&mut self) {
        self.module = find_module(&self.dir);
        let dir = self.dir.canonicalize().unwrap_or_else(|_| self.dir.clone());
        self.module_path = self
            .module
            .as_ref()
            .and_then(|module| module.import_path(&dir))
            .unwrap_or_default();
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Indexed files in file-name order
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn has_file(&self, path: &Path) -> bool {
        self.scopes.contains_key(path)
    }

    pub fn module(&self) -> Option<&ModuleInfo> {
        self.module.as_ref()
    }

    /// Import path of the directory itself; empty outside a module
    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    pub fn spec(&self, name: &str) -> Option<&IndexedSpec> {
        self.specs.get(name)
    }

    /// All declared type names, sorted
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.specs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Type names declared in one file, in declaration order
    pub fn type_names_in_file(&self, path: &Path) -> Vec<String> {
        self.scopes
            .get(path)
            .map(|scope| scope.type_names.clone())
            .unwrap_or_default()
    }

    /// First type of the file whose trailing comment contains `fragment`
    /// (case-insensitive)
    pub fn match_type_name_in_file(&self, path: &Path, fragment: &str) -> Option<String> {
        let fragment = fragment.to_lowercase();
        self.type_names_in_file(path).into_iter().find(|name| {
            self.specs
                .get(name)
                .and_then(|indexed| indexed.spec.comment.as_ref())
                .is_some_and(|comment| comment.raw_text().to_lowercase().contains(&fragment))
        })
    }

    /// Import paths of a file. A leading `*` matches every file whose path
    /// ends with the rest of the argument.
    pub fn imports(&self, path: &str) -> Vec<String> {
        if let Some(suffix) = path.strip_prefix('*') {
            return self
                .files
                .iter()
                .filter(|file| file.to_string_lossy().ends_with(suffix))
                .filter_map(|file| self.imports.get(file))
                .flat_map(|imports| imports.paths().map(str::to_string))
                .collect();
        }
        self.imports
            .get(Path::new(path))
            .map(|imports| imports.paths().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Import table of one file
    pub fn file_imports(&self, path: &Path) -> Option<&GoImports> {
        self.imports.get(path)
    }

    /// Initializer of a top-level constant or variable, searching files in order
    pub fn value(&self, symbol: &str) -> Option<&ValueExpr> {
        self.files
            .iter()
            .filter_map(|file| self.scopes.get(file))
            .find_map(|scope| scope.values.get(symbol))
    }

    pub fn value_in_file(&self, path: &Path, symbol: &str) -> Option<&ValueExpr> {
        self.scopes.get(path).and_then(|scope| scope.values.get(symbol))
    }

    /// Files declaring `name`; more than one entry means a duplicate
    pub fn occurrences(&self, name: &str) -> &[PathBuf] {
        self.occurrences.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Methods declared on a receiver type (pointer and generic receivers included)
    pub fn methods(&self, receiver: &str) -> &[FuncDecl] {
        self.methods.get(receiver).map(Vec::as_slice).unwrap_or_default()
    }

    /// Declared package of a file or of the directory
    pub fn package_of(&self, path: &Path) -> Option<&str> {
        self.packages.get(path).map(String::as_str)
    }

    /// Declared package of the scanned directory
    pub fn package_name(&self) -> Option<&str> {
        self.package_of(&self.dir)
    }
}
