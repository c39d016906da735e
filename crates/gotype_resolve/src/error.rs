use gotype_index::ScanError;
use gotype_lexer::UnquoteError;
use gotype_parser::ParseError;

/// Errors raised while resolving declarations into descriptors
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("failed to parse type definition `{definition}`: {error}")]
    Parse { definition: String, error: ParseError },

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("unsupported {construct}: {text}")]
    Unsupported { construct: &'static str, text: String },

    #[error("invalid struct tag {tag}: {source}")]
    TagDecode {
        tag: String,
        #[source]
        source: UnquoteError,
    },
}

impl ResolveError {
    pub fn type_not_found(package: &str, name: &str) -> Self {
        let name = if package.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", package, name)
        };
        ResolveError::NotFound { kind: "type", name }
    }

    pub fn value_not_found(symbol: &str) -> Self {
        ResolveError::NotFound { kind: "value", name: symbol.to_string() }
    }

    pub fn file_not_found(file: &str) -> Self {
        ResolveError::NotFound { kind: "file", name: file.to_string() }
    }

    pub fn unsupported(construct: &'static str, text: impl Into<String>) -> Self {
        ResolveError::Unsupported { construct, text: text.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }
}
