//! Reusable JOIN / WHERE text applied to SELECT statements.
//!
//! A scope is resolved against the statement's FROM text. The result is split
//! at its first top-level `WHERE`: the part before it (typically joins) is
//! written after FROM, the part after it becomes one more AND-ed condition.

use crate::error::{ComposeError, ComposeResult};
use crate::fragment::Fragment;
use crate::param::Param;
use indexmap::IndexMap;
use std::fmt;
use tokio_postgres::types::ToSql;

/// Something that produces scope text for a given FROM target.
pub trait Scope: Send + Sync + fmt::Debug {
    fn resolve(&self, table: &str) -> ComposeResult<Fragment>;
}

/// Scope text used as given.
#[derive(Debug, Clone)]
pub struct RawScope(pub Fragment);

impl Scope for RawScope {
    fn resolve(&self, _table: &str) -> ComposeResult<Fragment> {
        Ok(self.0.clone())
    }
}

/// Scope text with `:TABLE` and `:name` markers.
///
/// `:TABLE` is replaced with the FROM text; every other `:name` becomes a
/// positional placeholder bound to the named value. Defaults given here can be
/// overridden per statement.
///
/// ```
/// use pgcompose::{MapScope, Param, Scope};
///
/// let scope = MapScope::new("WHERE :TABLE.id = :id AND name = :name")
///     .default("id", 1_i64)
///     .default("name", "foo");
/// let f = scope.merged([("name", Param::new("mario"))]).resolve("b").unwrap();
/// assert_eq!(f.text(), "WHERE b.id = $1 AND name = $2");
/// assert_eq!(format!("{:?}", f.params()), r#"[1, "mario"]"#);
/// ```
#[derive(Debug, Clone)]
pub struct MapScope {
    template: String,
    values: IndexMap<String, Param>,
}

impl MapScope {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            values: IndexMap::new(),
        }
    }

    pub fn default<T: ToSql + Send + Sync + 'static>(
        mut self,
        name: impl Into<String>,
        value: T,
    ) -> Self {
        self.values.insert(name.into(), Param::new(value));
        self
    }

    /// A copy with `overrides` replacing (or adding to) the defaults.
    pub fn merged<K: Into<String>>(&self, overrides: impl IntoIterator<Item = (K, Param)>) -> Self {
        let mut scope = self.clone();
        for (name, value) in overrides {
            scope.values.insert(name.into(), value);
        }
        scope
    }
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl Scope for MapScope {
    fn resolve(&self, table: &str) -> ComposeResult<Fragment> {
        let text = self.template.as_str();
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len() + table.len());
        let mut used: IndexMap<&str, usize> = IndexMap::new();
        let mut params = Vec::new();

        let mut copied = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b':' {
                i += 1;
                continue;
            }
            // `::type` casts are not markers.
            if i + 1 < bytes.len() && bytes[i + 1] == b':' {
                i += 2;
                continue;
            }
            let start = i + 1;
            if start >= bytes.len() || !is_name_start(bytes[start]) {
                i += 1;
                continue;
            }
            let mut end = start;
            while end < bytes.len() && is_name_char(bytes[end]) {
                end += 1;
            }
            let name = &text[start..end];
            out.push_str(&text[copied..i]);
            if name == "TABLE" {
                out.push_str(table);
            } else {
                let n = match used.get(name) {
                    Some(n) => *n,
                    None => {
                        let value = self.values.get(name).ok_or_else(|| {
                            ComposeError::validation(format!("scope parameter :{name} has no value"))
                        })?;
                        params.push(value.clone());
                        used.insert(name, params.len());
                        params.len()
                    }
                };
                out.push('$');
                out.push_str(&n.to_string());
            }
            copied = end;
            i = end;
        }
        out.push_str(&text[copied..]);

        Ok(Fragment::with_params(out, params))
    }
}

/// Split resolved scope text at its first top-level `WHERE`.
///
/// Returns the trimmed text before it and, if present, the trimmed condition
/// after it. Matching is case-insensitive, word-bounded and ignores anything
/// inside parentheses.
pub(crate) fn split_where(text: &str) -> (&str, Option<&str>) {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'w' | b'W' if depth == 0 => {
                let end = i + 5;
                let word_start = i == 0 || !is_name_char(bytes[i - 1]);
                let word_end = end >= bytes.len() || !is_name_char(bytes[end]);
                if end <= bytes.len()
                    && word_start
                    && word_end
                    && bytes[i..end].eq_ignore_ascii_case(b"where")
                {
                    return (text[..i].trim(), Some(text[end..].trim()));
                }
            }
            _ => {}
        }
        i += 1;
    }
    (text.trim(), None)
}
