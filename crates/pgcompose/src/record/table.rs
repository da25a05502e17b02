//! Inline tables built from in-memory values with `UNNEST`.

use super::Record;
use crate::dialect::{Dialect, PgType, Postgres};
use crate::error::{ComposeError, ComposeResult};
use crate::fragment::{Fragment, SqlWriter};
use crate::param::Param;
use crate::query::BuiltQuery;
use tokio_postgres::types::ToSql;

/// Rows of values rendered as a SELECT over parallel `UNNEST` arrays.
///
/// ```
/// use pgcompose::VirtualTable;
///
/// let q = VirtualTable::nullable_scalars(&[Some(1_i64), None, Some(3)]).to_sql().unwrap();
/// assert_eq!(q.sql, "SELECT UNNEST(ARRAY[$1, NULL, $2]::bigint[]) AS data");
/// assert_eq!(format!("{:?}", q.params), "[1, 3]");
/// ```
#[derive(Debug, Clone)]
pub struct VirtualTable {
    columns: Vec<Column>,
}

#[derive(Debug, Clone)]
struct Column {
    name: &'static str,
    pg_type: Option<&'static str>,
    values: Vec<Option<Param>>,
}

const SCALAR_COLUMN: &str = "data";

impl VirtualTable {
    /// One column per mapped field, one row per record.
    pub fn records<R: Record>(rows: &[R]) -> Self {
        Self::from_rows(rows.iter().map(Some))
    }

    /// Like [`records`](Self::records); `None` rows become all-NULL rows.
    pub fn nullable_records<R: Record>(rows: &[Option<R>]) -> Self {
        Self::from_rows(rows.iter().map(Option::as_ref))
    }

    fn from_rows<'a, R: Record>(rows: impl Iterator<Item = Option<&'a R>> + Clone) -> Self {
        let columns = R::fields()
            .iter()
            .map(|field| Column {
                name: field.column(),
                pg_type: field.pg_type(),
                values: rows.clone().map(|r| r.map(|r| field.value(r))).collect(),
            })
            .collect();
        Self { columns }
    }

    /// A single `data` column.
    pub fn scalars<T>(values: &[T]) -> Self
    where
        T: ToSql + PgType + Clone + Send + Sync + 'static,
    {
        Self::scalar_column(T::pg_type(), values.iter().map(|v| Some(Param::new(v.clone()))))
    }

    /// A single `data` column; `None` becomes NULL.
    pub fn nullable_scalars<T>(values: &[Option<T>]) -> Self
    where
        T: ToSql + PgType + Clone + Send + Sync + 'static,
    {
        Self::scalar_column(
            T::pg_type(),
            values.iter().map(|v| v.as_ref().map(|v| Param::new(v.clone()))),
        )
    }

    fn scalar_column(pg_type: &'static str, values: impl Iterator<Item = Option<Param>>) -> Self {
        Self {
            columns: vec![Column {
                name: SCALAR_COLUMN,
                pg_type: Some(pg_type),
                values: values.collect(),
            }],
        }
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Resolve into a fragment whose placeholders start at `$1`.
    pub fn to_fragment(&self, dialect: &dyn Dialect) -> ComposeResult<Fragment> {
        self.render(dialect).map(Fragment::from)
    }

    pub fn to_sql(&self) -> ComposeResult<BuiltQuery> {
        self.render(&Postgres::default())
    }

    fn render(&self, dialect: &dyn Dialect) -> ComposeResult<BuiltQuery> {
        if self.columns.is_empty() {
            return Err(ComposeError::schema_mismatch(
                "virtual table has no columns",
            ));
        }

        let mut w = SqlWriter::new();
        w.push_str("SELECT ");
        for (i, column) in self.columns.iter().enumerate() {
            let pg_type = column.pg_type.ok_or_else(|| {
                ComposeError::schema_mismatch(format!(
                    "field {} has no SQL type and cannot be used in a virtual table",
                    column.name
                ))
            })?;
            if i > 0 {
                w.push_str(", ");
            }
            w.push_str("UNNEST(ARRAY[");
            for (j, value) in column.values.iter().enumerate() {
                if j > 0 {
                    w.push_str(", ");
                }
                match value {
                    Some(p) => w.bind(p.clone()),
                    None => w.push_str("NULL"),
                }
            }
            w.push_str("]::");
            dialect.write_array_type(w.buf(), pg_type);
            w.push_str(") AS ");
            dialect.write_identifier(w.buf(), column.name);
        }
        Ok(w.finish())
    }
}
