use crate::generate::render_tag;
use gotype_registry::TypeRef;
use gotype_types::{StructTag, TAG_TYPE_NAME, Type, remove_tag};

/// Render a type expression, substituting the `typeName` alias of `tag` for
/// the component type: `[]*struct{...}` tagged `typeName:"Foo"` becomes
/// `[]*Foo`
pub fn stringify(ty: &Type, tag: &str) -> String {
    let alias = StructTag(tag).get(TAG_TYPE_NAME);
    if alias.is_empty() {
        return ty.to_string();
    }
    let mut out = String::new();
    let mut ty = ty;
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
            _ => {
                out.push_str(&alias);
                return out;
            }
        }
    }
}

/// Inline body of a registered type, e.g. `struct{A int; B string; }`.
///
/// Fields referring to named or aliased types are written by name relative
/// to the type's package, so the result can be registered back as a
/// definition once those names are known. Empty without a descriptor.
pub fn body(type_ref: &TypeRef) -> String {
    let Some(ty) = &type_ref.ty else {
        return String::new();
    };
    let mut writer = BodyWriter { package: &type_ref.package, out: String::new() };
    match ty.base() {
        Type::Struct(_) | Type::Interface => writer.write_body(ty),
        _ => writer.write_type_name(ty, ""),
    }
    writer.out
}

/// `type Name body`
pub fn declaration(type_ref: &TypeRef) -> String {
    format!("type {} {}", type_ref.name, body(type_ref))
}

struct BodyWriter<'a> {
    package: &'a str,
    out: String,
}

impl BodyWriter<'_> {
    fn write_body(&mut self, ty: &Type) {
        match ty.base() {
            Type::Interface => self.out.push_str("interface{}"),
            Type::Struct(fields) => {
                self.out.push_str("struct{");
                for field in fields {
                    let alias = StructTag(&field.tag).get(TAG_TYPE_NAME);
                    // interface fields keep the alias naming their implementation
                    let tag = if field.ty.has_interface() {
                        field.tag.clone()
                    } else {
                        remove_tag(&field.tag, TAG_TYPE_NAME).0
                    };
                    let is_named = !field.ty.name().is_empty() || !alias.is_empty();
                    let embedded = field.anonymous && (field.ty.deref().is_named() || !alias.is_empty());
                    if !embedded {
                        self.out.push_str(&field.name);
                        self.out.push(' ');
                    }
                    self.write_type_name(&field.ty, &alias);
                    if !is_named {
                        self.write_body(&field.ty);
                    }
                    if !tag.is_empty() {
                        self.out.push(' ');
                        self.out.push_str(&render_tag(&tag));
                    }
                    self.out.push_str("; ");
                }
                self.out.push('}');
            }
            _ => {}
        }
    }

    /// Named types and aliases by name; unnamed structs and interfaces
    /// write only their `*`/`[]` prefix
    fn write_type_name(&mut self, ty: &Type, alias: &str) {
        let mut ty = ty;
        loop {
            match ty {
                Type::Named(_) => {
                    let name = self.named_type(ty);
                    self.out.push_str(&name);
                    return;
                }
                Type::Pointer(elem) => {
                    self.out.push('*');
                    ty = elem.as_ref();
                }
                Type::Slice(elem) => {
                    self.out.push_str("[]");
                    ty = elem.as_ref();
                }
                _ if !alias.is_empty() => {
                    self.out.push_str(alias);
                    return;
                }
                Type::Struct(_) | Type::Interface => return,
                Type::Map(key, value) => {
                    self.out.push_str("map[");
                    self.write_inline(key);
                    self.out.push(']');
                    self.write_inline(value);
                    return;
                }
                primitive => {
                    self.out.push_str(&primitive.to_string());
                    return;
                }
            }
        }
    }

    /// Type expression of a map key or value, unnamed structs spelled out
    fn write_inline(&mut self, ty: &Type) {
        self.write_type_name(ty, "");
        if matches!(ty.base(), Type::Struct(_) | Type::Interface) {
            self.write_body(ty);
        }
    }

    fn named_type(&self, ty: &Type) -> String {
        let Type::Named(named) = ty else {
            return ty.to_string();
        };
        if named.package.is_empty() || named.package == self.package {
            named.name.clone()
        } else {
            named.qualified_name()
        }
    }
}
