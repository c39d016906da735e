use crate::options::{GenerateOptions, GeneratedField};
use gotype_lexer::quote;
use gotype_types::{Field, Kind, StructTag, TAG_TYPE_NAME, Type, append_tag, component_type, remove_tag, split_package};
use rustc_hash::FxHashSet;

/// Render `ty` as Go source declaring type `name`.
///
/// Unnamed nested structs are extracted into their own declarations, named
/// after the field's `typeName` tag or the field itself, and emitted after
/// the main declaration. Imports are collected from every referenced named
/// type in first-seen order.
#[tracing::instrument(level = "debug", skip(ty, options))]
pub fn generate_struct(name: &str, ty: &Type, options: &GenerateOptions) -> String {
    let ty = match ty {
        Type::Pointer(elem) if elem.kind() == Kind::Struct => elem.as_ref(),
        ty => ty,
    };
    let mut generator = Generator::new(options);
    generator.built.insert(name.to_string());

    let mut decls = vec![];
    let mut nested = vec![];
    decls.push(generator.declaration(name, ty, true, &mut nested));
    decls.append(&mut nested);

    for extra in &options.with_types {
        let Some(ty) = &extra.ty else {
            continue;
        };
        if !generator.built.insert(extra.type_name()) {
            continue;
        }
        decls.push(generator.declaration(&extra.name, ty, true, &mut nested));
        decls.append(&mut nested);
    }
    tracing::trace!(decls = decls.len(), imports = generator.imports.len(), "generated");

    let mut out = format!("package {}\n\n", options.package_name());
    if !generator.imports.is_empty() {
        out.push_str("import (\n");
        for import in &generator.imports {
            out.push_str(&format!("\t\"{}\"\n", import));
        }
        out.push_str(")\n\n");
    }
    if !options.snippet_before.trim().is_empty() {
        out.push_str(options.snippet_before.trim_end());
        out.push_str("\n\n");
    }
    out.push_str(&decls.join("\n\n"));
    out.push('\n');
    if !options.snippet_after.trim().is_empty() {
        out.push('\n');
        out.push_str(options.snippet_after.trim());
        out.push('\n');
    }
    out
}

struct Generator<'a> {
    options: &'a GenerateOptions,
    imports: Vec<String>,
    seen_imports: FxHashSet<String>,
    /// Names of emitted declarations
    built: FxHashSet<String>,
}

impl<'a> Generator<'a> {
    fn new(options: &'a GenerateOptions) -> Self {
        let mut seen_imports = FxHashSet::default();
        let mut imports = vec![];
        for import in &options.imports {
            if seen_imports.insert(import.clone()) {
                imports.push(import.clone());
            }
        }
        Self { options, imports, seen_imports, built: FxHashSet::default() }
    }

    fn import(&mut self, pkg_path: &str) {
        if pkg_path.is_empty() || !self.seen_imports.insert(pkg_path.to_string()) {
            return;
        }
        let import = match self.options.import_module.get(pkg_path) {
            Some(module) => format!("{}/{}", module, pkg_path),
            None => pkg_path.to_string(),
        };
        self.imports.push(import);
    }

    /// `type Name ...`; declarations of extracted structs are appended to `nested`
    fn declaration(&mut self, name: &str, ty: &Type, is_main: bool, nested: &mut Vec<String>) -> String {
        let mut out = format!("type {} ", name);
        let base = write_prefix(&mut out, ty);
        if !is_main {
            self.import(base.pkg_path());
        }
        match base {
            Type::Struct(fields) => self.write_struct(&mut out, fields, nested),
            Type::Named(named) if matches!(named.underlying, Some(Type::Struct(_))) => {
                self.write_struct(&mut out, base.fields(), nested)
            }
            other => {
                let expr = self.type_expr(other);
                out.push_str(&expr);
            }
        }
        out
    }

    fn write_struct(&mut self, out: &mut String, fields: &[Field], nested: &mut Vec<String>) {
        let mut lines = vec![];
        for field in fields {
            let (doc, cells) = self.field_cells(field, nested);
            if !doc.is_empty() {
                lines.push(vec![format!("// {}", doc)]);
            }
            lines.push(cells);
        }
        out.push_str("struct {\n");
        out.push_str(&align(&lines));
        out.push('}');
    }

    /// Doc text and the aligned cells of one field line
    fn field_cells(&mut self, field: &Field, nested: &mut Vec<String>) -> (String, Vec<String>) {
        let mut generated = GeneratedField {
            name: field.name.clone(),
            ty: field.ty.clone(),
            tag: field.tag.clone(),
            type_name: StructTag(&field.tag).get(TAG_TYPE_NAME),
            doc: String::new(),
            anonymous: field.anonymous,
        };
        if generated.ty.name().is_empty() && generated.type_name.is_empty() {
            self.annotate(&mut generated);
        }
        if let Some(hook) = &self.options.on_struct_field {
            hook(&mut generated);
        }
        for key in &self.options.omit_tags {
            generated.tag = remove_tag(&generated.tag, key).0;
        }

        let mut expr = String::new();
        let base = write_prefix(&mut expr, &generated.ty);
        match base {
            Type::Struct(_) => {
                let type_name = if generated.type_name.is_empty() {
                    generated.name.clone()
                } else {
                    generated.type_name.clone()
                };
                if let Some(package_type) = self.options.package_type(&type_name) {
                    let package = package_type.package.clone();
                    self.import(&package);
                    expr.push_str(&format!("{}.{}", package, type_name));
                } else {
                    expr.push_str(&type_name);
                    let skip = self.options.skip_field_type.as_ref().is_some_and(|skip| {
                        skip(&Field {
                            name: generated.name.clone(),
                            ty: generated.ty.clone(),
                            tag: generated.tag.clone(),
                            anonymous: generated.anonymous,
                            pkg_path: field.pkg_path.clone(),
                        })
                    });
                    if !skip && !type_name.contains('.') && self.built.insert(type_name.clone()) {
                        let slot = nested.len();
                        nested.push(String::new());
                        let decl = self.declaration(&type_name, base, false, nested);
                        nested[slot] = decl;
                    }
                }
            }
            other => {
                let rendered = self.type_expr(other);
                expr.push_str(&rendered);
            }
        }

        let mut cells = vec![];
        let embedded = generated.anonymous && !matches!(generated.ty, Type::Slice(_) | Type::Map(..));
        if !embedded {
            cells.push(generated.name);
        }
        cells.push(expr);
        if !generated.tag.is_empty() {
            cells.push(render_tag(&generated.tag));
        }
        (generated.doc.trim().to_string(), cells)
    }

    /// Name an unnamed field type after its registration record
    fn annotate(&mut self, generated: &mut GeneratedField) {
        let options = self.options;
        let Some(registry) = &options.registry else {
            return;
        };
        let component = match &generated.ty {
            Type::Slice(elem) => elem.as_ref(),
            ty => ty,
        };
        let component = match component {
            Type::Pointer(elem) => elem.as_ref(),
            ty => ty,
        };
        let Some(info) = registry.info(component) else {
            return;
        };
        let type_name = if info.package == self.options.package_name() {
            info.name.clone()
        } else {
            info.type_name()
        };
        if type_name.is_empty() {
            return;
        }
        generated.tag = append_tag(&generated.tag, TAG_TYPE_NAME, &type_name);
        let (package, _) = split_package(component_type(&type_name));
        if !package.is_empty() && package != self.options.package_name() && !info.module_path.is_empty() {
            self.import(&info.module_path);
        }
        generated.type_name = type_name;
    }

    /// Type expression of a field or alias, importing referenced packages
    fn type_expr(&mut self, ty: &Type) -> String {
        match ty {
            Type::Named(named) => {
                self.import(&named.pkg_path);
                if named.package.is_empty() || named.package == self.options.package_name() {
                    named.name.clone()
                } else {
                    named.qualified_name()
                }
            }
            Type::Pointer(elem) => format!("*{}", self.type_expr(elem)),
            Type::Slice(elem) => format!("[]{}", self.type_expr(elem)),
            Type::Map(key, value) => format!("map[{}]{}", self.type_expr(key), self.type_expr(value)),
            Type::Interface => "interface{}".to_string(),
            Type::Struct(fields) => {
                for field in fields {
                    self.collect_imports(&field.ty);
                }
                ty.to_string()
            }
            primitive => primitive.to_string(),
        }
    }

    fn collect_imports(&mut self, ty: &Type) {
        match ty {
            Type::Named(named) => self.import(&named.pkg_path),
            Type::Pointer(elem) | Type::Slice(elem) => self.collect_imports(elem),
            Type::Map(key, value) => {
                self.collect_imports(key);
                self.collect_imports(value);
            }
            Type::Struct(fields) => {
                for field in fields {
                    self.collect_imports(&field.ty);
                }
            }
            _ => {}
        }
    }
}

/// Write the `*` and `[]` prefixes of unnamed pointers and slices and
/// return the remaining type
fn write_prefix<'t>(out: &mut String, mut ty: &'t Type) -> &'t Type {
    loop {
        match ty {
            Type::Pointer(elem) => {
                out.push('*');
                ty = elem.as_ref();
            }
            Type::Slice(elem) => {
                out.push_str("[]");
                ty = elem.as_ref();
            }
            other => return other,
        }
    }
}

/// Tag literal: back-quoted, or an interpreted string when the tag holds a back-quote
pub(crate) fn render_tag(tag: &str) -> String {
    if tag.contains('`') { quote(tag) } else { format!("`{}`", tag) }
}

/// Lay out cells in columns the way gofmt's tabwriter does: every cell but
/// the last of a line is padded to the widest cell of its column across the
/// consecutive lines that share that column, plus one space.
fn align(lines: &[Vec<String>]) -> String {
    let mut widths: Vec<Vec<usize>> = lines.iter().map(|cells| vec![0; cells.len().saturating_sub(1)]).collect();
    let columns = lines.iter().map(Vec::len).max().unwrap_or(0);
    for column in 0..columns {
        let mut start = 0;
        while start < lines.len() {
            if lines[start].len() <= column + 1 {
                start += 1;
                continue;
            }
            let mut end = start;
            while end < lines.len() && lines[end].len() > column + 1 {
                end += 1;
            }
            let width = lines[start..end]
                .iter()
                .map(|cells| cells[column].chars().count())
                .max()
                .unwrap_or(0)
                + 1;
            for line_widths in &mut widths[start..end] {
                line_widths[column] = width;
            }
            start = end;
        }
    }

    let mut out = String::new();
    for (cells, widths) in lines.iter().zip(&widths) {
        out.push('\t');
        for (i, cell) in cells.iter().enumerate() {
            out.push_str(cell);
            if let Some(&width) = widths.get(i) {
                let padding = width.saturating_sub(cell.chars().count());
                out.extend(std::iter::repeat_n(' ', padding));
            }
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gotype_registry::{Registry, RegistryOptions};
    use gotype_resolve::{ParseOptions, parse_types};
    use gotype_types::{NamedType, time_type};
    use pretty_assertions::assert_eq;

    fn bar() -> Type {
        Type::Struct(vec![Field::new("BarId", Type::Int), Field::new("Price", Type::Float64)])
    }

    fn generate(ty: &Type) -> String {
        generate_struct("Foo", ty, &GenerateOptions::default())
    }

    #[test]
    fn test_primitive() {
        assert_eq!(generate(&Type::Int), "package generated\n\ntype Foo int\n");
        assert_eq!(generate(&Type::pointer_to(Type::Int)), "package generated\n\ntype Foo *int\n");
    }

    #[test]
    fn test_struct_columns() {
        let foo = Type::Struct(vec![
            Field::new("Id", Type::Int),
            Field::new("Name", Type::String),
            Field::new("Active", Type::Bool),
        ]);
        assert_eq!(
            generate(&foo),
            "package generated\n\ntype Foo struct {\n\tId     int\n\tName   string\n\tActive bool\n}\n"
        );
        assert_eq!(generate(&Type::pointer_to(foo.clone())), generate(&foo));
    }

    #[test]
    fn test_nested_struct_extracted() {
        let foo = Type::Struct(vec![
            Field::new("Id", Type::Int),
            Field::new("Name", Type::String),
            Field::new("Bar", bar()),
        ]);
        assert_eq!(
            generate(&foo),
            "package generated\n\ntype Foo struct {\n\tId   int\n\tName string\n\tBar  Bar\n}\n\ntype Bar struct {\n\tBarId int\n\tPrice float64\n}\n"
        );
    }

    #[test]
    fn test_tags_aligned() {
        let foo = Type::Struct(vec![
            Field::new("Id", Type::Int).with_tag(r#"json:",omitempty""#),
            Field::new("Name", Type::String).with_tag(r#"json:",omitempty""#),
            Field::new("Bar", bar()),
        ]);
        assert_eq!(
            generate(&foo),
            "package generated\n\ntype Foo struct {\n\tId   int    `json:\",omitempty\"`\n\tName string `json:\",omitempty\"`\n\tBar  Bar\n}\n\ntype Bar struct {\n\tBarId int\n\tPrice float64\n}\n"
        );
    }

    #[test]
    fn test_external_named_type_imported() {
        let external = Type::named(NamedType::new("Bar", "xreflect", "github.com/viant/xreflect").with_underlying(
            Type::Struct(vec![Field::new("ID", Type::Int), Field::new("Name", Type::String)]),
        ));
        let foo = Type::Struct(vec![
            Field::new("Id", Type::Int).with_tag(r#"json:",omitempty""#),
            Field::new("Name", Type::String).with_tag(r#"json:",omitempty""#),
            Field::new("Bar", external),
        ]);
        assert_eq!(
            generate(&foo),
            "package generated\n\nimport (\n\t\"github.com/viant/xreflect\"\n)\n\ntype Foo struct {\n\tId   int    `json:\",omitempty\"`\n\tName string `json:\",omitempty\"`\n\tBar  xreflect.Bar\n}\n"
        );
    }

    #[test]
    fn test_type_name_tag_renames_nested() {
        let bar_type = Type::Struct(vec![Field::new("BarName", Type::String), Field::new("BarID", Type::Int64)]);
        let foo = Type::Struct(vec![
            Field::new("Id", Type::Int).with_tag(r#"json:",omitempty""#),
            Field::new("Name", Type::String).with_tag(r#"json:",omitempty""#),
            Field::new("Bar", Type::pointer_to(bar_type)).with_tag(r#"typeName:"BarType""#),
        ]);
        assert_eq!(
            generate(&foo),
            "package generated\n\ntype Foo struct {\n\tId   int      `json:\",omitempty\"`\n\tName string   `json:\",omitempty\"`\n\tBar  *BarType `typeName:\"BarType\"`\n}\n\ntype BarType struct {\n\tBarName string\n\tBarID   int64\n}\n"
        );
    }

    #[test]
    fn test_time_import() {
        let foo = Type::Struct(vec![
            Field::new("ID", Type::pointer_to(Type::Int)),
            Field::new("Name", Type::pointer_to(Type::String)),
            Field::new("Time", Type::pointer_to(time_type())),
        ]);
        assert_eq!(
            generate(&foo),
            "package generated\n\nimport (\n\t\"time\"\n)\n\ntype Foo struct {\n\tID   *int\n\tName *string\n\tTime *time.Time\n}\n"
        );
    }

    #[test]
    fn test_nested_names_deduplicated() {
        let foo = Type::Struct(vec![
            Field::new("Left", bar()).with_tag(r#"typeName:"Bar""#),
            Field::new("Right", Type::slice_of(bar())).with_tag(r#"typeName:"Bar""#),
        ]);
        let generated = generate(&foo);
        assert_eq!(generated.matches("type Bar struct").count(), 1);
        assert!(generated.contains("\tRight []Bar `typeName:\"Bar\"`\n"));
    }

    #[test]
    fn test_backquote_in_tag_is_quoted() {
        let foo = Type::Struct(vec![Field::new("Id", Type::Int).with_tag("doc:\"a `b`\"")]);
        assert_eq!(
            generate(&foo),
            "package generated\n\ntype Foo struct {\n\tId int \"doc:\\\"a `b`\\\"\"\n}\n"
        );
    }

    #[test]
    fn test_options() {
        let foo = Type::Struct(vec![
            Field::new("Id", Type::Int).with_tag(r#"json:"id" sqlx:"ID""#),
            Field::new("Bar", bar()),
            Field::new("Info", Type::Struct(vec![Field::new("Text", Type::String)])),
        ]);
        let options = GenerateOptions::default()
            .with_package("model")
            .with_imports(["fmt"])
            .with_snippet_before("// Code generated. DO NOT EDIT.\n")
            .with_snippet_after("\nvar _ = fmt.Sprint\n")
            .with_omit_tags(["sqlx"])
            .with_package_type("shared", "Bar")
            .with_skip_field_type(|field| field.name == "Info")
            .with_on_struct_field(|field| {
                if field.name == "Id" {
                    field.doc = "Id identifies the record".to_string();
                }
            });
        assert_eq!(
            generate_struct("Foo", &foo, &options),
            "package model\n\nimport (\n\t\"fmt\"\n\t\"shared\"\n)\n\n// Code generated. DO NOT EDIT.\n\ntype Foo struct {\n\t// Id identifies the record\n\tId   int `json:\"id\"`\n\tBar  shared.Bar\n\tInfo Info\n}\n\nvar _ = fmt.Sprint\n"
        );
    }

    #[test]
    fn test_import_module_and_with_types() {
        let money = Type::named(NamedType::new("Money", "money", "pkg/money").with_underlying(Type::Int64));
        let foo = Type::Struct(vec![Field::new("Price", money)]);
        let options = GenerateOptions::default()
            .with_import_module("pkg/money", "github.com/acme")
            .with_type("Extra", Type::Struct(vec![Field::new("Note", Type::String)]))
            .with_type("Extra", Type::Struct(vec![]));
        assert_eq!(
            generate_struct("Foo", &foo, &options),
            "package generated\n\nimport (\n\t\"github.com/acme/pkg/money\"\n)\n\ntype Foo struct {\n\tPrice money.Money\n}\n\ntype Extra struct {\n\tNote string\n}\n"
        );
    }

    #[test]
    fn test_registry_annotates_unnamed_fields() {
        let line = Type::Struct(vec![Field::new("SKU", Type::String)]);
        let registry = Registry::new(RegistryOptions::default().with_type("shop.Line", line.clone()));
        assert!(registry.info(&line).is_some());
        let order = Type::Struct(vec![Field::new("Lines", Type::slice_of(Type::pointer_to(line)))]);
        let options = GenerateOptions::default().with_package("shop").with_registry(registry);
        assert_eq!(
            generate_struct("Order", &order, &options),
            "package shop\n\ntype Order struct {\n\tLines []*Line `typeName:\"Line\"`\n}\n\ntype Line struct {\n\tSKU string\n}\n"
        );
    }

    #[test]
    fn test_embedded_field() {
        let base = Type::named(
            NamedType::new("Base", "model", "example.com/model")
                .with_underlying(Type::Struct(vec![Field::new("ID", Type::Int)])),
        );
        let foo = Type::Struct(vec![
            Field::new("Base", base).with_anonymous(true),
            Field::new("Name", Type::String).with_tag(r#"json:"name""#),
        ]);
        assert_eq!(
            generate(&foo),
            "package generated\n\nimport (\n\t\"example.com/model\"\n)\n\ntype Foo struct {\n\tmodel.Base\n\tName string `json:\"name\"`\n}\n"
        );
    }

    #[test]
    fn test_align_breaks_on_single_cell_lines() {
        let lines = vec![
            vec!["A".to_string(), "int".to_string(), "`x`".to_string()],
            vec!["// doc".to_string()],
            vec!["LongName".to_string(), "string".to_string()],
        ];
        assert_eq!(align(&lines), "\tA int `x`\n\t// doc\n\tLongName string\n");
    }

    #[test]
    fn test_round_trip() {
        let foo = Type::Struct(vec![
            Field::new("Id", Type::Int).with_tag(r#"json:"id,omitempty""#),
            Field::new("Tags", Type::slice_of(Type::String)),
            Field::new("Attrs", Type::map_of(Type::String, Type::pointer_to(Type::Float64))),
            Field::new("Bar", Type::pointer_to(bar())),
        ]);
        let generated = generate(&foo);
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("foo.go"), &generated).unwrap();
        let dir = parse_types(tmp.path(), ParseOptions::default().with_module_aware(false)).unwrap();
        let resolved = dir.type_of("Foo").unwrap();
        assert_eq!(resolved.to_string(), foo.to_string());
        assert_eq!(generate(&resolved), generated);
    }
}
