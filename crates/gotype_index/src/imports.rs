//! Import tables and module detection

use gotype_ast::ImportSpec;
use std::path::{Component, Path, PathBuf};

/// Module declared by a `go.mod` manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Declared module path, e.g. `github.com/acme/shop`
    pub path: String,
    /// Directory holding the manifest
    pub root: PathBuf,
}

impl ModuleInfo {
    pub fn new(path: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), root: root.into() }
    }

    /// Import path of a directory below the module root
    pub fn import_path(&self, dir: &Path) -> Option<String> {
        let relative = dir.strip_prefix(&self.root).ok()?;
        let mut path = self.path.clone();
        for component in relative.components() {
            if let Component::Normal(segment) = component {
                path.push('/');
                path.push_str(&segment.to_string_lossy());
            }
        }
        Some(path)
    }

    /// Directory suffix of an import path inside this module
    pub fn folder<'a>(&self, import_path: &'a str) -> Option<&'a str> {
        let rest = import_path.strip_prefix(self.path.as_str())?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        Some(rest.trim_matches('/'))
    }

    /// Filesystem directory of an import path inside this module
    pub fn dir_of(&self, import_path: &str) -> Option<PathBuf> {
        let folder = self.folder(import_path)?;
        if folder.is_empty() {
            Some(self.root.clone())
        } else {
            Some(self.root.join(folder))
        }
    }
}

/// Extract the `module` directive from a `go.mod` manifest
pub fn parse_module_path(manifest: &str) -> Option<String> {
    for line in manifest.lines() {
        let line = line.split("//").next().unwrap_or_default().trim();
        let Some(rest) = line.strip_prefix("module") else {
            continue;
        };
        if !rest.starts_with(char::is_whitespace) {
            continue;
        }
        let path = rest.trim().trim_matches('"');
        if !path.is_empty() {
            return Some(path.to_string());
        }
    }
    None
}

/// Walk from `dir` up through its parents to the first `go.mod` that
/// declares a module path
#[tracing::instrument(level = "trace", skip_all, fields(dir = %dir.display()))]
pub fn find_module(dir: &Path) -> Option<ModuleInfo> {
    let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    for candidate in dir.ancestors() {
        let Ok(manifest) = std::fs::read_to_string(candidate.join("go.mod")) else {
            continue;
        };
        if let Some(path) = parse_module_path(&manifest) {
            tracing::trace!(module = %path, root = %candidate.display(), "found go.mod");
            return Some(ModuleInfo::new(path, candidate));
        }
    }
    None
}

/// One import of a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoImport {
    /// Explicit alias, if any
    pub name: Option<String>,
    pub path: String,
}

impl GoImport {
    pub fn new(name: Option<&str>, path: impl Into<String>) -> Self {
        Self { name: name.map(str::to_string), path: path.into() }
    }

    pub fn from_spec(spec: &ImportSpec) -> Self {
        Self {
            name: spec.name.as_ref().map(|n| n.name.clone()),
            path: spec.path.clone(),
        }
    }

    /// Last segment of the import path
    pub fn base_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Ordered import table of one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoImports(Vec<GoImport>);

impl GoImports {
    pub fn new(imports: Vec<GoImport>) -> Self {
        Self(imports)
    }

    pub fn from_specs(specs: &[ImportSpec]) -> Self {
        Self(specs.iter().map(GoImport::from_spec).collect())
    }

    /// Find the import bound to a package qualifier.
    ///
    /// An explicit alias wins; otherwise the first import whose final path
    /// segment equals the qualifier is used. Two imports sharing a final
    /// segment cannot be told apart this way and the earlier one is returned.
    pub fn lookup(&self, alias: &str) -> Option<&GoImport> {
        if alias.is_empty() {
            return None;
        }
        self.0
            .iter()
            .find(|import| import.name.as_deref() == Some(alias))
            .or_else(|| self.0.iter().find(|import| import.base_name() == alias))
    }

    /// Import path owning a package qualifier
    pub fn owner_pkg_path(&self, alias: &str) -> Option<&str> {
        self.lookup(alias).map(|import| import.path.as_str())
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|import| import.path.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GoImport> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<GoImport> for GoImports {
    fn from_iter<I: IntoIterator<Item = GoImport>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
