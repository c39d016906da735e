//! Declaration scanning for Go source directories
//!
//! This module turns a directory of `.go` files into a `DeclIndex` by:
//! 1. Parsing every non-test source file in file-name order
//! 2. Indexing type specs, methods (by receiver), imports and top-level values
//! 3. Locating the enclosing module through its `go.mod` manifest

mod imports;
mod index;

pub use imports::{GoImport, GoImports, ModuleInfo, find_module, parse_module_path};
pub use index::{DeclIndex, IndexedSpec, ScanError, scan_dir};
