//! Identifier quoting and type spelling.

use std::fmt;

/// How the target database spells identifiers and array types.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Write a (possibly dotted) identifier into `buf`.
    fn write_identifier(&self, buf: &mut String, name: &str);

    /// Write the array type whose elements are `element`, e.g. `bigint[]`.
    fn write_array_type(&self, buf: &mut String, element: &str);
}

/// PostgreSQL.
///
/// By default identifiers are quoted only when PostgreSQL would otherwise
/// misread them (upper case, unusual characters, reserved words).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Postgres {
    always_quote: bool,
}

impl Postgres {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quote every identifier.
    pub fn always_quote() -> Self {
        Self { always_quote: true }
    }
}

// Reserved words that cannot appear unquoted as column or table names.
const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both", "case",
    "cast", "check", "collate", "column", "constraint", "create", "current_date", "current_role",
    "current_time", "current_timestamp", "current_user", "default", "deferrable", "desc",
    "distinct", "do", "else", "end", "except", "false", "fetch", "for", "foreign", "from",
    "grant", "group", "having", "in", "initially", "intersect", "into", "lateral", "leading",
    "limit", "localtime", "localtimestamp", "not", "null", "offset", "on", "only", "or", "order",
    "placing", "primary", "references", "returning", "select", "session_user", "some",
    "symmetric", "table", "then", "to", "trailing", "true", "union", "unique", "user", "using",
    "variadic", "when", "where", "window", "with",
];

fn needs_quote(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return true,
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$') {
        return true;
    }
    RESERVED.contains(&part)
}

fn push_quoted(buf: &mut String, part: &str) {
    buf.push('"');
    for c in part.chars() {
        if c == '"' {
            buf.push('"');
        }
        buf.push(c);
    }
    buf.push('"');
}

impl Dialect for Postgres {
    fn write_identifier(&self, buf: &mut String, name: &str) {
        for (i, part) in name.split('.').enumerate() {
            if i > 0 {
                buf.push('.');
            }
            let already_quoted = part.len() >= 2 && part.starts_with('"') && part.ends_with('"');
            if part == "*" || already_quoted {
                buf.push_str(part);
            } else if self.always_quote || needs_quote(part) {
                push_quoted(buf, part);
            } else {
                buf.push_str(part);
            }
        }
    }

    fn write_array_type(&self, buf: &mut String, element: &str) {
        buf.push_str(element);
        buf.push_str("[]");
    }
}

/// Maps a Rust type to the PostgreSQL type of its values.
///
/// Used to cast the arrays of a virtual table. Implement it for your own
/// types when the default spelling does not fit:
///
/// ```
/// use pgcompose::PgType;
///
/// struct Money(i64);
///
/// impl PgType for Money {
///     fn pg_type() -> &'static str {
///         "numeric(17,2)"
///     }
/// }
/// assert_eq!(Money::pg_type(), "numeric(17,2)");
/// ```
pub trait PgType {
    /// The element type name (e.g. "text", "bigint").
    fn pg_type() -> &'static str;
}

macro_rules! impl_pg_type {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl PgType for $ty {
                fn pg_type() -> &'static str {
                    $name
                }
            }
        )*
    };
}

impl_pg_type! {
    bool => "boolean",
    i8 => "\"char\"",
    i16 => "smallint",
    i32 => "integer",
    i64 => "bigint",
    u32 => "oid",
    f32 => "real",
    f64 => "double precision",
    String => "text",
    &str => "text",
    Vec<u8> => "bytea",
    serde_json::Value => "jsonb",
    uuid::Uuid => "uuid",
    std::net::IpAddr => "inet",
    std::time::SystemTime => "timestamptz",
    chrono::NaiveDate => "date",
    chrono::NaiveTime => "time",
    chrono::NaiveDateTime => "timestamp",
    chrono::DateTime<chrono::Utc> => "timestamptz",
    chrono::DateTime<chrono::FixedOffset> => "timestamptz",
    chrono::DateTime<chrono::Local> => "timestamptz",
}

impl<T> PgType for tokio_postgres::types::Json<T> {
    fn pg_type() -> &'static str {
        "jsonb"
    }
}

impl<T: PgType> PgType for Option<T> {
    fn pg_type() -> &'static str {
        T::pg_type()
    }
}
