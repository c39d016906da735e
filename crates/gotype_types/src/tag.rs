//! Struct tag helpers following Go's `key:"value"` convention

use gotype_lexer::{quote, unquote};
use std::ops::Range;

/// Tag key overriding the source-level type name of a field
pub const TAG_TYPE_NAME: &str = "typeName";

/// Read-only view over a struct tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructTag<'a>(pub &'a str);

struct Entry<'a> {
    key: &'a str,
    /// Quoted value as written
    raw: &'a str,
    range: Range<usize>,
}

impl<'a> StructTag<'a> {
    /// Well-formed entries in order; parsing stops at the first malformed one
    fn entries(&self) -> Vec<Entry<'a>> {
        let tag = self.0;
        let bytes = tag.as_bytes();
        let mut entries = Vec::new();
        let mut i = 0;
        loop {
            while i < bytes.len() && bytes[i] == b' ' {
                i += 1;
            }
            if i >= bytes.len() {
                break;
            }
            let start = i;
            while i < bytes.len() && bytes[i] > b' ' && bytes[i] != b':' && bytes[i] != b'"' && bytes[i] != 0x7f {
                i += 1;
            }
            if i == start || i + 1 >= bytes.len() || bytes[i] != b':' || bytes[i + 1] != b'"' {
                break;
            }
            let key = &tag[start..i];
            i += 1;
            let value_start = i;
            i += 1;
            while i < bytes.len() && bytes[i] != b'"' {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            if i >= bytes.len() {
                break;
            }
            i += 1;
            entries.push(Entry { key, raw: &tag[value_start..i], range: start..i });
        }
        entries
    }

    /// Value of `key`, if present and well formed
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.entries()
            .into_iter()
            .find(|entry| entry.key == key)
            .and_then(|entry| unquote(entry.raw).ok())
    }

    /// Value of `key`, empty when absent
    pub fn get(&self, key: &str) -> String {
        self.lookup(key).unwrap_or_default()
    }

    pub fn keys(&self) -> Vec<&'a str> {
        self.entries().into_iter().map(|entry| entry.key).collect()
    }
}

/// Remove `key` from a tag, returning the remaining tag and the removed
/// value (empty when the key is absent). Surrounding back-quotes are dropped.
pub fn remove_tag(tag: &str, key: &str) -> (String, String) {
    let tag = tag.trim();
    let tag = tag
        .strip_prefix('`')
        .and_then(|t| t.strip_suffix('`'))
        .unwrap_or(tag);
    let found = StructTag(tag).entries().into_iter().find(|entry| entry.key == key);
    let Some(entry) = found else {
        return (tag.to_string(), String::new());
    };
    let value = unquote(entry.raw).unwrap_or_else(|_| entry.raw.trim_matches('"').to_string());
    let rest = format!(
        "{} {}",
        tag[..entry.range.start].trim_end(),
        tag[entry.range.end..].trim_start()
    );
    (rest.trim().to_string(), value)
}

/// Append `key:"value"` to a tag
pub fn append_tag(tag: &str, key: &str, value: &str) -> String {
    let entry = format!("{}:{}", key, quote(value));
    let tag = tag.trim();
    if tag.is_empty() {
        entry
    } else {
        format!("{} {}", tag, entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup() {
        let tag = StructTag(r#"json:"id,omitempty" sqlx:"name=ID" doc:"a \"quoted\" text""#);
        assert_eq!(tag.lookup("json"), Some("id,omitempty".to_string()));
        assert_eq!(tag.get("doc"), "a \"quoted\" text");
        assert_eq!(tag.lookup("xml"), None);
        assert_eq!(tag.keys(), vec!["json", "sqlx", "doc"]);
    }

    #[test]
    fn test_malformed_tag_stops_parsing() {
        let tag = StructTag(r#"json:"id" broken sqlx:"x""#);
        assert_eq!(tag.keys(), vec!["json"]);
    }

    #[test]
    fn test_remove_tag() {
        assert_eq!(
            remove_tag(r#"json:"id" typeName:"Bar" sqlx:"x""#, TAG_TYPE_NAME),
            (r#"json:"id" sqlx:"x""#.to_string(), "Bar".to_string())
        );
        assert_eq!(
            remove_tag(r#"`typeName:"Bar"`"#, TAG_TYPE_NAME),
            (String::new(), "Bar".to_string())
        );
        assert_eq!(
            remove_tag(r#"json:"id""#, TAG_TYPE_NAME),
            (r#"json:"id""#.to_string(), String::new())
        );
    }

    #[test]
    fn test_append_tag() {
        assert_eq!(append_tag("", TAG_TYPE_NAME, "Bar"), r#"typeName:"Bar""#);
        assert_eq!(
            append_tag(r#"xdatly:"kind:data_view""#, "doc", "SELECT \"x\""),
            r#"xdatly:"kind:data_view" doc:"SELECT \"x\"""#
        );
    }
}
