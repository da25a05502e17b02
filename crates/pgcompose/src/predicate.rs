//! WHERE / HAVING predicates.
//!
//! A predicate is either raw SQL with its arguments or an [`Eq`] map of
//! column conditions. Both are turned into fragments as soon as a builder
//! receives them, one fragment per condition.

use crate::dialect::Dialect;
use crate::fragment::Fragment;
use crate::param::Param;
use indexmap::IndexMap;
use tokio_postgres::types::ToSql;

/// Column → value conditions, rendered in insertion order.
///
/// ```
/// use pgcompose::{Eq, Postgres};
///
/// let eq = Eq::new().eq("id", 1_i64).null("deleted_at").any("kind", vec!["a", "b"]);
/// let texts: Vec<String> = eq
///     .into_fragments(&Postgres::default())
///     .iter()
///     .map(|f| f.text().to_string())
///     .collect();
/// assert_eq!(texts, ["id = $1", "deleted_at IS NULL", "kind IN $1"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Eq {
    entries: IndexMap<String, EqValue>,
}

#[derive(Debug, Clone)]
enum EqValue {
    Null,
    Value(Param),
    In(Param),
    Nothing,
}

impl Eq {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`. Re-using a column replaces its condition.
    pub fn eq<T: ToSql + Send + Sync + 'static>(self, column: impl Into<String>, value: T) -> Self {
        self.insert(column, EqValue::Value(Param::new(value)))
    }

    /// `column IS NULL`.
    pub fn null(self, column: impl Into<String>) -> Self {
        self.insert(column, EqValue::Null)
    }

    /// `column = value`, or `column IS NULL` for `None`.
    pub fn opt<T: ToSql + Send + Sync + 'static>(
        self,
        column: impl Into<String>,
        value: Option<T>,
    ) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self.null(column),
        }
    }

    /// Membership in a list.
    ///
    /// Two or more values bind the whole list as one argument (`col IN $1`),
    /// a single value is compared directly, and an empty list matches
    /// nothing (`1=0`).
    pub fn any<T>(self, column: impl Into<String>, mut values: Vec<T>) -> Self
    where
        T: ToSql + Send + Sync + 'static,
    {
        let value = match values.len() {
            0 => EqValue::Nothing,
            1 => match values.pop() {
                Some(v) => EqValue::Value(Param::new(v)),
                None => EqValue::Nothing,
            },
            _ => EqValue::In(Param::new(values)),
        };
        self.insert(column, value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(mut self, column: impl Into<String>, value: EqValue) -> Self {
        self.entries.insert(column.into(), value);
        self
    }

    /// One fragment per entry.
    pub fn into_fragments(self, dialect: &dyn Dialect) -> Vec<Fragment> {
        self.entries
            .into_iter()
            .map(|(column, value)| {
                let mut text = String::with_capacity(column.len() + 8);
                match value {
                    EqValue::Nothing => Fragment::new("1=0"),
                    EqValue::Null => {
                        dialect.write_identifier(&mut text, &column);
                        text.push_str(" IS NULL");
                        Fragment::new(text)
                    }
                    EqValue::Value(p) => {
                        dialect.write_identifier(&mut text, &column);
                        text.push_str(" = $1");
                        Fragment::new(text).bind_param(p)
                    }
                    EqValue::In(p) => {
                        dialect.write_identifier(&mut text, &column);
                        text.push_str(" IN $1");
                        Fragment::new(text).bind_param(p)
                    }
                }
            })
            .collect()
    }
}

/// Anything a WHERE or HAVING clause accepts.
#[derive(Debug, Clone)]
pub enum Predicate {
    Raw(Fragment),
    Equality(Eq),
}

impl Predicate {
    /// Normalize to fragments. Blank raw text and empty maps produce none.
    pub fn into_fragments(self, dialect: &dyn Dialect) -> Vec<Fragment> {
        match self {
            Predicate::Raw(f) if f.is_empty() => Vec::new(),
            Predicate::Raw(f) => vec![f],
            Predicate::Equality(eq) => eq.into_fragments(dialect),
        }
    }
}

impl From<Fragment> for Predicate {
    fn from(f: Fragment) -> Self {
        Predicate::Raw(f)
    }
}

impl From<&str> for Predicate {
    fn from(s: &str) -> Self {
        Predicate::Raw(Fragment::new(s))
    }
}

impl From<String> for Predicate {
    fn from(s: String) -> Self {
        Predicate::Raw(Fragment::new(s))
    }
}

impl From<Eq> for Predicate {
    fn from(eq: Eq) -> Self {
        Predicate::Equality(eq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Postgres;
    use crate::expr;

    fn render(p: impl Into<Predicate>) -> Vec<(String, String)> {
        let p: Predicate = p.into();
        p.into_fragments(&Postgres::default())
            .into_iter()
            .map(|f| (f.text().to_string(), format!("{:?}", f.params())))
            .collect()
    }

    #[test]
    fn scalar_and_null() {
        let got = render(Eq::new().eq("a", 1_i32).opt("b", None::<i32>).opt("c", Some("x")));
        assert_eq!(
            got,
            [
                ("a = $1".to_string(), "[1]".to_string()),
                ("b IS NULL".to_string(), "[]".to_string()),
                ("c = $1".to_string(), r#"["x"]"#.to_string()),
            ]
        );
    }

    #[test]
    fn list_shapes() {
        let got = render(
            Eq::new()
                .any("many", vec![1_i64, 2, 3])
                .any("one", vec![9_i64])
                .any("none", Vec::<i64>::new()),
        );
        assert_eq!(
            got,
            [
                ("many IN $1".to_string(), "[[1, 2, 3]]".to_string()),
                ("one = $1".to_string(), "[9]".to_string()),
                ("1=0".to_string(), "[]".to_string()),
            ]
        );
    }

    #[test]
    fn reinserting_a_column_replaces_in_place() {
        let got = render(Eq::new().eq("a", 1_i32).eq("b", 2_i32).eq("a", 3_i32));
        assert_eq!(got[0], ("a = $1".to_string(), "[3]".to_string()));
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn columns_go_through_the_dialect() {
        let got = render(Eq::new().eq("user", 1_i32));
        assert_eq!(got[0].0, "\"user\" = $1");
    }

    #[test]
    fn raw_passes_through() {
        let got = render(expr!("d = $1 OR e = $2", 1_i32, 2_i32));
        assert_eq!(got, [("d = $1 OR e = $2".to_string(), "[1, 2]".to_string())]);
        assert!(render("  ").is_empty());
        assert!(render(Eq::new()).is_empty());
    }
}
