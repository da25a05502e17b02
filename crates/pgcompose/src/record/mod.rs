//! Field mapper: static column descriptors for user structs.
//!
//! A [`Record`] lists its columns once, in declaration order, through a
//! [`Fields`] builder (usually generated by `#[derive(Record)]`). Builders use
//! that list to resolve `"*"` and blacklists, to read values for INSERT rows
//! and to lay out virtual tables.

mod table;

pub use table::VirtualTable;

use crate::dialect::PgType;
use crate::error::{ComposeError, ComposeResult};
use crate::param::Param;
use tokio_postgres::types::ToSql;

type Getter<R> = Box<dyn Fn(&R) -> Param + Send + Sync>;

/// A struct whose fields map to columns.
///
/// ```
/// use pgcompose::{Fields, Record};
///
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// impl Record for User {
///     fn fields() -> Fields<Self> {
///         Fields::new().field("id", |u: &User| &u.id).field("name", |u: &User| &u.name)
///     }
/// }
///
/// assert_eq!(User::fields().columns(), ["id", "name"]);
/// ```
pub trait Record: Sized + Send + Sync + 'static {
    fn fields() -> Fields<Self>;
}

/// One mapped column of `R`.
pub struct Field<R> {
    column: &'static str,
    value: Getter<R>,
    pg_type: Option<fn() -> &'static str>,
    embedded: bool,
}

impl<R> Field<R> {
    pub fn column(&self) -> &'static str {
        self.column
    }

    /// The element SQL type, if the field was registered with one.
    pub fn pg_type(&self) -> Option<&'static str> {
        self.pg_type.map(|f| f())
    }

    pub fn value(&self, record: &R) -> Param {
        (self.value)(record)
    }
}

impl<R> std::fmt::Debug for Field<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("column", &self.column)
            .field("pg_type", &self.pg_type())
            .field("embedded", &self.embedded)
            .finish()
    }
}

/// Ordered column descriptors of `R`.
///
/// A field declared directly on `R` shadows a field of the same column
/// coming from an embedded record; the outer one is kept at the position the
/// column first appeared.
pub struct Fields<R> {
    fields: Vec<Field<R>>,
}

impl<R: 'static> Default for Fields<R> {
    fn default() -> Self {
        Self { fields: Vec::new() }
    }
}

impl<R: 'static> Fields<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `column` to a typed field.
    pub fn field<T>(self, column: &'static str, get: fn(&R) -> &T) -> Self
    where
        T: ToSql + PgType + Clone + Send + Sync + 'static,
    {
        self.outer(Field {
            column,
            value: Box::new(move |r: &R| Param::new(get(r).clone())),
            pg_type: Some(T::pg_type),
            embedded: false,
        })
    }

    /// Map `column` to a field that has no SQL type of its own.
    ///
    /// Such fields can be inserted but not laid out in a virtual table.
    pub fn untyped<T>(self, column: &'static str, get: fn(&R) -> &T) -> Self
    where
        T: ToSql + Clone + Send + Sync + 'static,
    {
        self.outer(Field {
            column,
            value: Box::new(move |r: &R| Param::new(get(r).clone())),
            pg_type: None,
            embedded: false,
        })
    }

    /// Flatten the columns of an embedded record into this one.
    pub fn embed<E: Record>(mut self, get: fn(&R) -> &E) -> Self {
        for inner in E::fields().fields {
            if self.position(inner.column).is_some() {
                continue;
            }
            let value = inner.value;
            self.fields.push(Field {
                column: inner.column,
                value: Box::new(move |r: &R| value(get(r))),
                pg_type: inner.pg_type,
                embedded: true,
            });
        }
        self
    }

    fn outer(mut self, field: Field<R>) -> Self {
        match self.position(field.column) {
            Some(i) => self.fields[i] = field,
            None => self.fields.push(field),
        }
        self
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.column == column)
    }

    pub fn get(&self, column: &str) -> Option<&Field<R>> {
        self.position(column).map(|i| &self.fields[i])
    }

    pub fn columns(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.column).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field<R>> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All columns, minus the blacklisted ones.
    pub fn without(&self, blacklist: &[String]) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| !blacklist.iter().any(|b| b == f.column))
            .map(|f| f.column.to_string())
            .collect()
    }

    /// Read `record`'s values for `columns`, in that order.
    pub fn values_for(&self, record: &R, columns: &[String]) -> ComposeResult<Vec<Param>> {
        columns
            .iter()
            .map(|column| match self.get(column) {
                Some(field) => Ok(field.value(record)),
                None => Err(ComposeError::schema_mismatch(format!(
                    "could not find field with name {} in {}",
                    column,
                    std::any::type_name::<R>()
                ))),
            })
            .collect()
    }
}

/// A record whose concrete type has been erased, as INSERT builders hold it.
pub(crate) trait RecordRow: Send + Sync {
    fn columns(&self) -> Vec<String>;
    fn values_for(&self, columns: &[String]) -> ComposeResult<Vec<Param>>;
    fn without(&self, blacklist: &[String]) -> Vec<String>;
}

pub(crate) struct Reflected<R>(pub(crate) R);

impl<R: Record> RecordRow for Reflected<R> {
    fn columns(&self) -> Vec<String> {
        R::fields().iter().map(|f| f.column.to_string()).collect()
    }

    fn values_for(&self, columns: &[String]) -> ComposeResult<Vec<Param>> {
        R::fields().values_for(&self.0, columns)
    }

    fn without(&self, blacklist: &[String]) -> Vec<String> {
        R::fields().without(blacklist)
    }
}
