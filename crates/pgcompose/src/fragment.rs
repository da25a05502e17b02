//! SQL fragments with locally numbered placeholders.
//!
//! Every piece of SQL handed to a builder is a [`Fragment`]: text whose
//! placeholders start at `$1`, plus the values they bind. When a statement is
//! rendered the fragments are written one after another and each one's
//! placeholders are shifted onto the window that follows the arguments
//! already emitted. Nested builders resolve to fragments too, so the same
//! shift applies at any depth.

use crate::param::Param;
use crate::query::BuiltQuery;
use tokio_postgres::types::ToSql;

/// SQL text with relative `$k` placeholders and the values they bind.
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    text: String,
    params: Vec<Param>,
}

impl Fragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(text: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }

    /// Bind the value for the next placeholder.
    pub fn bind<T: ToSql + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.params.push(Param::new(value));
        self
    }

    /// Bind an already wrapped value for the next placeholder.
    pub fn bind_param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// True when there is neither text nor anything bound.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.text.trim().is_empty()
    }

    /// Write the text into `out`, rewriting each `$k` to `$(cursor + k - 1)`,
    /// append the bound values to `args` and advance `cursor` past them.
    ///
    /// `cursor` is the number the fragment's `$1` maps to. A `$` that is not
    /// followed by a digit is copied verbatim.
    pub fn compile(&self, out: &mut String, args: &mut Vec<Param>, cursor: &mut usize) {
        let text = self.text.as_str();
        let bytes = text.as_bytes();
        out.reserve(text.len());

        let mut copied = 0;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'$' {
                i += 1;
                continue;
            }
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end == start {
                i += 1;
                continue;
            }
            // `$0` and numbers too large to parse or shift are left alone.
            let shifted = text[start..end]
                .parse::<usize>()
                .ok()
                .filter(|k| *k >= 1)
                .and_then(|k| cursor.checked_add(k - 1));
            if let Some(n) = shifted {
                out.push_str(&text[copied..i]);
                push_placeholder(out, n);
                copied = end;
            }
            i = end;
        }
        out.push_str(&text[copied..]);

        args.extend(self.params.iter().cloned());
        *cursor += self.params.len();
    }

    /// Render this fragment on its own.
    pub fn to_query(&self) -> BuiltQuery {
        let mut w = SqlWriter::new();
        w.fragment(self);
        w.finish()
    }
}

impl From<&str> for Fragment {
    fn from(text: &str) -> Self {
        Fragment::new(text)
    }
}

impl From<String> for Fragment {
    fn from(text: String) -> Self {
        Fragment::new(text)
    }
}

impl From<&String> for Fragment {
    fn from(text: &String) -> Self {
        Fragment::new(text.as_str())
    }
}

/// Build a [`Fragment`] from text and the values for its placeholders.
///
/// ```
/// use pgcompose::expr;
/// let f = expr!("id = $1 AND kind = $2", 7_i64, "admin");
/// assert_eq!(f.text(), "id = $1 AND kind = $2");
/// assert_eq!(f.params().len(), 2);
/// ```
#[macro_export]
macro_rules! expr {
    ($text:expr $(,)?) => {
        $crate::Fragment::new($text)
    };
    ($text:expr, $($value:expr),+ $(,)?) => {
        $crate::Fragment::with_params($text, $crate::params![$($value),+])
    };
}

// Write `$n` without going through fmt.
fn push_placeholder(out: &mut String, mut n: usize) {
    out.push('$');
    if n < 10 {
        out.push((b'0' + n as u8) as char);
        return;
    }
    let mut buf = [0u8; 20];
    let mut pos = buf.len();
    while n > 0 {
        pos -= 1;
        buf[pos] = b'0' + (n % 10) as u8;
        n /= 10;
    }
    for &digit in &buf[pos..] {
        out.push(digit as char);
    }
}

/// Output buffer for one statement: text, arguments and the next free
/// placeholder number, kept in step.
#[derive(Debug)]
pub(crate) struct SqlWriter {
    sql: String,
    params: Vec<Param>,
    cursor: usize,
}

impl SqlWriter {
    pub(crate) fn new() -> Self {
        Self {
            sql: String::with_capacity(128),
            params: Vec::new(),
            cursor: 1,
        }
    }

    pub(crate) fn push_str(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    pub(crate) fn buf(&mut self) -> &mut String {
        &mut self.sql
    }

    /// Bind one value at the next placeholder.
    pub(crate) fn bind(&mut self, param: Param) {
        push_placeholder(&mut self.sql, self.cursor);
        self.params.push(param);
        self.cursor += 1;
    }

    pub(crate) fn fragment(&mut self, fragment: &Fragment) {
        fragment.compile(&mut self.sql, &mut self.params, &mut self.cursor);
    }

    /// `a, b, c`
    pub(crate) fn comma(&mut self, fragments: &[Fragment]) {
        for (i, f) in fragments.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.fragment(f);
        }
    }

    /// `(a) AND (b)`
    pub(crate) fn and(&mut self, fragments: &[Fragment]) {
        for (i, f) in fragments.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(" AND ");
            }
            self.sql.push('(');
            self.fragment(f);
            self.sql.push(')');
        }
    }

    /// ` a b`, each fragment preceded by a space.
    pub(crate) fn concat(&mut self, fragments: &[Fragment]) {
        for f in fragments {
            self.sql.push(' ');
            self.fragment(f);
        }
    }

    pub(crate) fn finish(self) -> BuiltQuery {
        BuiltQuery {
            sql: self.sql,
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_at(f: &Fragment, cursor: usize) -> (String, usize, usize) {
        let mut out = String::new();
        let mut args: Vec<Param> = (1..cursor).map(|_| Param::new(0_i32)).collect();
        let mut c = cursor;
        f.compile(&mut out, &mut args, &mut c);
        (out, args.len(), c)
    }

    #[test]
    fn shifts_placeholders_onto_cursor() {
        let f = expr!("a = $1 AND b = $2", 1_i32, 2_i32);
        let (sql, nargs, cursor) = compile_at(&f, 4);
        assert_eq!(sql, "a = $4 AND b = $5");
        assert_eq!(nargs, 5);
        assert_eq!(cursor, 6);
    }

    #[test]
    fn multi_digit_placeholders() {
        let f = expr!("x IN ($1, $2)", 1_i32, 2_i32);
        let (sql, _, cursor) = compile_at(&f, 99);
        assert_eq!(sql, "x IN ($99, $100)");
        assert_eq!(cursor, 101);
    }

    #[test]
    fn bare_dollar_is_copied() {
        let f = expr!("price > $1 AND body = $$ $tag$ $", 5_i32);
        let (sql, _, _) = compile_at(&f, 3);
        assert_eq!(sql, "price > $3 AND body = $$ $tag$ $");
    }

    #[test]
    fn zero_marker_is_left_alone() {
        let f = Fragment::new("a = $0");
        let (sql, _, cursor) = compile_at(&f, 7);
        assert_eq!(sql, "a = $0");
        assert_eq!(cursor, 7);
    }

    #[test]
    fn marker_that_would_overflow_is_left_alone() {
        let f = Fragment::new("SELECT '$18446744073709551615', $1").bind(1_i32);
        let (sql, nargs, cursor) = compile_at(&f, 2);
        assert_eq!(sql, "SELECT '$18446744073709551615', $2");
        assert_eq!(nargs, 2);
        assert_eq!(cursor, 3);
    }

    #[test]
    fn non_ascii_text_survives() {
        let f = expr!("naïve = $1 -- ✓", "x");
        let (sql, _, _) = compile_at(&f, 2);
        assert_eq!(sql, "naïve = $2 -- ✓");
    }

    #[test]
    fn writer_joins() {
        let mut w = SqlWriter::new();
        w.and(&[expr!("a = $1", 1_i32), expr!("b = $1 OR c = $2", 2_i32, 3_i32)]);
        w.push_str(" | ");
        w.comma(&[Fragment::new("x"), expr!("y + $1", 4_i32)]);
        w.concat(&[Fragment::new("JOIN t ON true")]);
        let q = w.finish();
        assert_eq!(
            q.sql,
            "(a = $1) AND (b = $2 OR c = $3) | x, y + $4 JOIN t ON true"
        );
        assert_eq!(format!("{:?}", q.params), "[1, 2, 3, 4]");
    }

    #[test]
    fn fragment_round_trips_through_built_query() {
        let inner = expr!("SELECT $1, $2", 1_i32, 2_i32).to_query();
        let f: Fragment = inner.into();
        let (sql, _, _) = compile_at(&f, 3);
        assert_eq!(sql, "SELECT $3, $4");
    }
}
