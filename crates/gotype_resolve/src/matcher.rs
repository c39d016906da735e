//! Recursive matching of type expressions to descriptors

use crate::{DirTypes, LookupOptions, ResolveError};
use gotype_ast::{CommentGroup, StructType, TypeExpr, TypeKind, TypeSpec};
use gotype_index::{GoImports, IndexedSpec};
use gotype_lexer::unquote;
use gotype_types::{
    BuiltinTable, Field, TAG_TYPE_NAME, Type, append_tag, component_type, field_pkg_path, raw_name, remove_tag,
};

/// Resolves the type expressions of one declaration.
///
/// `stack` holds the names of the declarations currently being resolved in
/// the owning directory; meeting one of them again yields a forward
/// reference instead of recursing.
pub(crate) struct Matcher<'a> {
    dir: &'a DirTypes,
    package: String,
    imports: GoImports,
    stack: &'a mut Vec<String>,
}

impl<'a> Matcher<'a> {
    pub(crate) fn new(dir: &'a DirTypes, file_imports: Option<&GoImports>, package: String, stack: &'a mut Vec<String>) -> Self {
        let imports = match file_imports {
            Some(imports) if !imports.is_empty() => imports.clone(),
            _ => dir.options().imports.clone(),
        };
        Self { dir, package, imports, stack }
    }

    pub(crate) fn resolve_spec(&mut self, indexed: &IndexedSpec) -> Result<Type, ResolveError> {
        let spec = &indexed.spec;
        if !spec.type_params.is_empty() {
            return Err(ResolveError::unsupported("generic type declaration", spec.name.name.clone()));
        }
        self.match_type(Some(spec), &spec.ty)
    }

    pub(crate) fn match_type(&mut self, spec: Option<&TypeSpec>, expr: &TypeExpr) -> Result<Type, ResolveError> {
        match &expr.kind {
            TypeKind::Ident(name) => self.match_ident(name),
            TypeKind::Qualified { package, name } => self.match_qualified(package, name),
            TypeKind::Pointer(elem) => Ok(Type::pointer_to(self.match_type(spec, elem)?)),
            // arrays degrade to slices
            TypeKind::Slice(elem) | TypeKind::Array(_, elem) => Ok(Type::slice_of(self.match_type(spec, elem)?)),
            TypeKind::Map(key, value) => {
                let key = self.match_type(spec, key)?;
                Ok(Type::map_of(key, self.match_type(spec, value)?))
            }
            TypeKind::Struct(body) => self.match_struct(spec, body),
            TypeKind::Interface(_) => Ok(Type::Interface),
            TypeKind::Paren(inner) => self.match_type(spec, inner),
            TypeKind::Func(_) | TypeKind::Chan(_) | TypeKind::Generic(..) | TypeKind::Ellipsis(_) => {
                Err(ResolveError::unsupported(expr.kind.variant_name(), expr.to_string()))
            }
        }
    }

    fn match_ident(&mut self, name: &str) -> Result<Type, ResolveError> {
        if let Some(ty) = BuiltinTable::primitive(name) {
            return Ok(ty);
        }
        let package = self.package.clone();
        match self.lookup("", &package, name) {
            Err(err) if err.is_not_found() && !package.is_empty() => self.lookup("", "", name),
            result => result,
        }
    }

    fn match_qualified(&mut self, package: &str, name: &str) -> Result<Type, ResolveError> {
        if let Some(ty) = BuiltinTable::standard(package, name) {
            return Ok(ty);
        }
        match self.lookup("", package, name) {
            Err(err) if err.is_not_found() => {
                let Some(owner) = self.imports.owner_pkg_path(package).map(str::to_string) else {
                    return Err(err);
                };
                if owner == package {
                    return Err(err);
                }
                self.lookup("", &owner, name)
            }
            result => result,
        }
    }

    fn lookup(&mut self, package_path: &str, package: &str, name: &str) -> Result<Type, ResolveError> {
        let ty = self.lookup_type(package_path, package, name)?;
        if let Some(hook) = &self.dir.options().on_lookup {
            hook(package_path, package, name, &ty);
        }
        Ok(ty)
    }

    /// Local index, then the module directory the qualifier imports, then
    /// the lookup override
    fn lookup_type(&mut self, package_path: &str, package: &str, name: &str) -> Result<Type, ResolveError> {
        let local = package.is_empty() || package == self.package;
        if local && self.dir.index().spec(name).is_some() {
            return self.dir.resolve_named(name, self.stack);
        }
        if !local {
            if let Some(ty) = self.match_imported(package, name)? {
                return Ok(ty);
            }
        }
        if let Some(lookup) = &self.dir.options().lookup {
            let options = LookupOptions::default()
                .with_package(package)
                .with_package_path(package_path);
            match lookup.lookup(name, &options) {
                Ok(ty) => return Ok(ty),
                Err(err) => tracing::trace!(%err, package, name, "lookup override failed"),
            }
        }
        Err(ResolveError::type_not_found(package, name))
    }

    /// Resolve `alias.name` in a directory of the current module
    fn match_imported(&mut self, alias: &str, name: &str) -> Result<Option<Type>, ResolveError> {
        let Some(import) = self.imports.lookup(alias) else {
            return Ok(None);
        };
        let Some(sub_dir) = self.dir.sub_dir_for_import(&import.path) else {
            return Ok(None);
        };
        match sub_dir.type_of(name) {
            Ok(ty) => Ok(Some(ty)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn match_struct(&mut self, spec: Option<&TypeSpec>, body: &StructType) -> Result<Type, ResolveError> {
        let dir = self.dir;
        let options = dir.options();
        if let Some(hook) = &options.on_struct {
            hook(spec, body)?;
        }
        let type_name = spec.map(|s| s.name.name.as_str()).unwrap_or_default();
        let mut fields = Vec::with_capacity(body.fields.len());
        for field in &body.fields {
            let mut tag = match &field.tag {
                Some(lit) => unquote(&lit.raw).map_err(|source| ResolveError::TagDecode { tag: lit.raw.clone(), source })?,
                None => String::new(),
            };
            if options.doc_tags {
                if let Some(doc) = &field.doc {
                    tag = append_tag(&tag, "doc", &doc_tag_text(doc));
                }
            }
            if let Some(hook) = &options.on_field {
                hook(type_name, field, &self.imports, &mut tag)?;
            }
            let (mut tag, declared_type_name) = remove_tag(&tag, TAG_TYPE_NAME);
            let field_type = self.match_type(spec, &field.ty)?;
            if !declared_type_name.is_empty() {
                let source_name = source_type_name(&field.ty).unwrap_or(declared_type_name);
                tag = append_tag(&tag, TAG_TYPE_NAME, component_type(&source_name));
            }

            if field.names.is_empty() {
                let name = match field_type.name() {
                    "" => raw_name(&field.ty.to_string()).to_string(),
                    name => name.to_string(),
                };
                let pkg_path = field_pkg_path(&name, &self.package);
                fields.push(Field { name, ty: field_type, tag, anonymous: true, pkg_path });
                continue;
            }
            for ident in &field.names {
                let anonymous = ident.name == field_type.name() && tag.contains("anonymous");
                fields.push(Field {
                    name: ident.name.clone(),
                    ty: field_type.clone(),
                    tag: tag.clone(),
                    anonymous,
                    pkg_path: field_pkg_path(&ident.name, &self.package),
                });
            }
        }
        Ok(Type::Struct(fields))
    }
}

/// Source spelling of a field type when it names a type, e.g. `*BarType`
fn source_type_name(expr: &TypeExpr) -> Option<String> {
    let mut base = expr;
    while let TypeKind::Pointer(elem) | TypeKind::Slice(elem) | TypeKind::Array(_, elem) = &base.kind {
        base = elem.as_ref();
    }
    match base.kind {
        TypeKind::Ident(_) | TypeKind::Qualified { .. } => Some(expr.to_string()),
        _ => None,
    }
}

/// Doc comment folded into a single line for the `doc` tag
fn doc_tag_text(doc: &CommentGroup) -> String {
    let text = doc
        .list
        .iter()
        .map(|comment| {
            let text = comment.text.as_str();
            let body = match text.strip_prefix("//") {
                Some(line) => line,
                None => text
                    .strip_prefix("/*")
                    .map(|block| block.strip_suffix("*/").unwrap_or(block))
                    .unwrap_or(text),
            };
            body.trim()
        })
        .collect::<Vec<_>>()
        .join(" ");
    text.replace('\t', "  ").replace('\n', " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gotype_lexer::{Comment, Span};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_doc_tag_text() {
        let doc = CommentGroup {
            list: vec![Comment {
                text: "/*\n\t\tSELECT * FROM MY_TABLE WHERE USER_ID = $Jwt.UserID\n\t*/".to_string(),
                span: Span::default(),
            }],
        };
        assert_eq!(doc_tag_text(&doc), "SELECT * FROM MY_TABLE WHERE USER_ID = $Jwt.UserID");

        let doc = CommentGroup {
            list: vec![Comment { text: "// Price in \"cents\"".to_string(), span: Span::default() }],
        };
        assert_eq!(doc_tag_text(&doc), "Price in \"cents\"");

        let doc = CommentGroup {
            list: vec![
                Comment { text: "// Total in \"cents\",".to_string(), span: Span::default() },
                Comment { text: "// rounded *down*".to_string(), span: Span::default() },
            ],
        };
        assert_eq!(doc_tag_text(&doc), "Total in \"cents\", rounded *down*");
    }
}
