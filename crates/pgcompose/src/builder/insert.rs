//! INSERT builder with upsert support.

use super::{record_error, recorded, trace_built};
use crate::dialect::{Dialect, Postgres};
use crate::error::{ComposeError, ComposeResult};
use crate::fragment::{Fragment, SqlWriter};
use crate::param::Param;
use crate::predicate::Predicate;
use crate::query::BuiltQuery;
use crate::record::{Record, RecordRow, Reflected};
use indexmap::IndexMap;
use std::any::Any;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// What `ON CONFLICT` matches on.
#[derive(Debug, Clone)]
pub enum ConflictTarget {
    /// `ON CONFLICT (column)[ WHERE index_predicate]`
    Column {
        column: String,
        predicate: Option<Fragment>,
    },
    /// `ON CONFLICT ON CONSTRAINT name`
    Constraint(String),
}

/// The value of one `DO UPDATE SET column = ..` assignment.
#[derive(Debug, Clone)]
pub enum SetValue {
    /// A fresh placeholder.
    Bind(Param),
    /// `EXCLUDED.column`, unquoted and unbound.
    Excluded,
    /// An expression, which may bind values of its own.
    Expr(Fragment),
}

impl From<Param> for SetValue {
    fn from(p: Param) -> Self {
        SetValue::Bind(p)
    }
}

impl From<Fragment> for SetValue {
    fn from(f: Fragment) -> Self {
        SetValue::Expr(f)
    }
}

/// What happens on conflict.
#[derive(Debug, Clone, Default)]
pub enum ConflictAction {
    #[default]
    DoNothing,
    DoUpdate {
        sets: IndexMap<String, SetValue>,
        wheres: Vec<Fragment>,
    },
}

#[derive(Debug, Clone)]
enum ColumnSelection {
    Listed(Vec<String>),
    /// `"*"`: every field of the first record.
    All,
    /// Every field of the first record except these.
    Except(Vec<String>),
}

/// INSERT statement builder.
///
/// ```
/// use pgcompose::{insert_into, params};
///
/// let q = insert_into("a")
///     .columns(["b", "c"])
///     .values(params![1_i64, 2_i64])
///     .on_conflict_column("b")
///     .to_sql()
///     .unwrap();
/// assert_eq!(q.sql, "INSERT INTO a (b, c) VALUES ($1, $2) ON CONFLICT (b) DO NOTHING");
/// ```
pub struct InsertBuilder {
    table: String,
    columns: ColumnSelection,
    rows: Vec<Vec<Param>>,
    records: Vec<Arc<dyn RecordRow>>,
    conflict_target: Option<ConflictTarget>,
    conflict_action: ConflictAction,
    returning: Vec<String>,
    dialect: Arc<dyn Dialect>,
    error: Option<ComposeError>,
}

impl std::fmt::Debug for InsertBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsertBuilder")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("rows", &self.rows)
            .field("records", &self.records.len())
            .field("conflict_target", &self.conflict_target)
            .field("conflict_action", &self.conflict_action)
            .field("returning", &self.returning)
            .field("error", &self.error)
            .finish()
    }
}

/// Start an INSERT into `table`.
pub fn insert_into(table: impl Into<String>) -> InsertBuilder {
    InsertBuilder {
        table: table.into(),
        columns: ColumnSelection::Listed(Vec::new()),
        rows: Vec::new(),
        records: Vec::new(),
        conflict_target: None,
        conflict_action: ConflictAction::DoNothing,
        returning: Vec::new(),
        dialect: Arc::new(Postgres::default()),
        error: None,
    }
}

impl InsertBuilder {
    /// Set the column list. `["*"]` means every field of the first record.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.columns = if columns.len() == 1 && columns[0] == "*" {
            ColumnSelection::All
        } else {
            ColumnSelection::Listed(columns)
        };
        self
    }

    /// Same as [`columns`](Self::columns).
    pub fn whitelist<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns(columns)
    }

    /// Insert every field of the first record except these.
    pub fn blacklist<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = ColumnSelection::Except(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Add one row of literal values, in column order.
    pub fn values(mut self, row: Vec<Param>) -> Self {
        self.rows.push(row);
        self
    }

    /// Add one row read from a record.
    pub fn record<R: Record>(mut self, record: R) -> Self {
        self.records.push(Arc::new(Reflected(record)));
        self
    }

    /// Add a column and its value to the single literal row.
    pub fn pair<T: ToSql + Send + Sync + 'static>(
        mut self,
        column: impl Into<String>,
        value: T,
    ) -> Self {
        if self.rows.len() > 1 {
            self.record_error(ComposeError::validation(
                "pair only allows you to specify 1 record to insert",
            ));
            return self;
        }
        let ColumnSelection::Listed(columns) = &mut self.columns else {
            self.record_error(ComposeError::validation(
                "pair cannot be combined with \"*\" or Blacklist",
            ));
            return self;
        };
        columns.push(column.into());
        match self.rows.first_mut() {
            Some(row) => row.push(Param::new(value)),
            None => self.rows.push(vec![Param::new(value)]),
        }
        self
    }

    /// `ON CONFLICT (column)`.
    pub fn on_conflict_column(mut self, column: impl Into<String>) -> Self {
        self.conflict_target = Some(ConflictTarget::Column {
            column: column.into(),
            predicate: None,
        });
        self
    }

    /// `ON CONFLICT ON CONSTRAINT name`.
    pub fn on_conflict_constraint(mut self, name: impl Into<String>) -> Self {
        self.conflict_target = Some(ConflictTarget::Constraint(name.into()));
        self
    }

    /// `ON CONFLICT (column) WHERE index_predicate`.
    pub fn on_conflict_where(
        mut self,
        column: impl Into<String>,
        predicate: impl Into<Fragment>,
    ) -> Self {
        self.conflict_target = Some(ConflictTarget::Column {
            column: column.into(),
            predicate: Some(predicate.into()),
        });
        self
    }

    /// `DO UPDATE SET column = value`.
    ///
    /// A string equal to `EXCLUDED.column` is written as is; anything else is
    /// bound.
    pub fn set<T: ToSql + Send + Sync + 'static>(self, column: impl Into<String>, value: T) -> Self {
        let column = column.into();
        let value = if refers_to_excluded(&column, &value) {
            SetValue::Excluded
        } else {
            SetValue::Bind(Param::new(value))
        };
        self.set_value(column, value)
    }

    /// `DO UPDATE SET column = EXCLUDED.column`.
    pub fn set_excluded(self, column: impl Into<String>) -> Self {
        self.set_value(column.into(), SetValue::Excluded)
    }

    /// `DO UPDATE SET column = <expression>`.
    pub fn set_expr(self, column: impl Into<String>, expr: impl Into<Fragment>) -> Self {
        self.set_value(column.into(), SetValue::Expr(expr.into()))
    }

    /// Several assignments at once, in iteration order.
    pub fn set_map<K, V>(mut self, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<SetValue>,
    {
        for (column, value) in values {
            self = self.set_value(column.into(), value.into());
        }
        self
    }

    fn set_value(mut self, column: String, value: SetValue) -> Self {
        if self.conflict_target.is_none() {
            self.record_error(ComposeError::validation(
                "A conflict_target must be provided for ON CONFLICT DO UPDATE",
            ));
            return self;
        }
        if let ConflictAction::DoNothing = self.conflict_action {
            self.conflict_action = ConflictAction::DoUpdate {
                sets: IndexMap::new(),
                wheres: Vec::new(),
            };
        }
        if let ConflictAction::DoUpdate { sets, .. } = &mut self.conflict_action {
            sets.insert(column, value);
        }
        self
    }

    /// Restrict `DO UPDATE` with a condition.
    pub fn where_(mut self, predicate: impl Into<Predicate>) -> Self {
        let predicate: Predicate = predicate.into();
        let fragments = predicate.into_fragments(&*self.dialect);
        if let ConflictAction::DoUpdate { wheres, .. } = &mut self.conflict_action {
            wheres.extend(fragments);
        } else {
            self.record_error(ComposeError::validation(
                "conflict_action must be equal to UPDATE",
            ));
        }
        self
    }

    /// `RETURNING` columns; replaces an earlier list.
    pub fn returning<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returning = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialect = dialect;
        self
    }

    fn record_error(&mut self, err: ComposeError) {
        record_error(&mut self.error, err);
    }

    fn resolve_columns(&self) -> ComposeResult<Vec<String>> {
        recorded(&self.error)?;
        if self.table.is_empty() {
            return Err(ComposeError::validation("no table specified"));
        }
        if matches!(
            &self.columns,
            ColumnSelection::Listed(c) | ColumnSelection::Except(c) if c.is_empty()
        ) {
            return Err(ComposeError::validation("no columns specified"));
        }
        if self.rows.is_empty() && self.records.is_empty() {
            return Err(ComposeError::validation("no values or records specified"));
        }

        let first = self.records.first();
        let columns = match (&self.columns, first) {
            (ColumnSelection::Listed(columns), _) => columns.clone(),
            (ColumnSelection::All, Some(record)) => record.columns(),
            (ColumnSelection::All, None) => {
                return Err(ComposeError::validation(
                    "\"*\" can only be used in conjunction with Record",
                ));
            }
            (ColumnSelection::Except(blacklist), Some(record)) => record.without(blacklist),
            (ColumnSelection::Except(_), None) => {
                return Err(ComposeError::validation(
                    "Blacklist can only be used in conjunction with Record",
                ));
            }
        };
        if columns.is_empty() {
            return Err(ComposeError::validation("no columns specified"));
        }

        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ComposeError::validation(format!(
                    "row {} has {} values but {} columns were specified",
                    i + 1,
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(columns)
    }

    pub fn to_sql(&self) -> ComposeResult<BuiltQuery> {
        let columns = self.resolve_columns()?;
        let dialect = &*self.dialect;

        let mut w = SqlWriter::new();
        w.push_str("INSERT INTO ");
        w.push_str(&self.table);
        w.push_str(" (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                w.push_str(", ");
            }
            dialect.write_identifier(w.buf(), column);
        }
        w.push_str(") VALUES ");

        let mut first_row = true;
        let mut write_row = |w: &mut SqlWriter, values: Vec<Param>| {
            if !first_row {
                w.push_str(", ");
            }
            first_row = false;
            w.push_str("(");
            for (i, value) in values.into_iter().enumerate() {
                if i > 0 {
                    w.push_str(", ");
                }
                w.bind(value);
            }
            w.push_str(")");
        };
        for row in &self.rows {
            write_row(&mut w, row.clone());
        }
        for record in &self.records {
            write_row(&mut w, record.values_for(&columns)?);
        }

        if let Some(target) = &self.conflict_target {
            self.write_conflict(&mut w, target);
        } else if matches!(self.conflict_action, ConflictAction::DoUpdate { .. }) {
            return Err(ComposeError::validation(
                "A conflict_target must be provided for ON CONFLICT DO UPDATE",
            ));
        }

        if !self.returning.is_empty() {
            w.push_str(" RETURNING ");
            for (i, column) in self.returning.iter().enumerate() {
                if i > 0 {
                    w.push_str(", ");
                }
                dialect.write_identifier(w.buf(), column);
            }
        }

        let query = w.finish();
        trace_built("insert", &query);
        Ok(query)
    }

    fn write_conflict(&self, w: &mut SqlWriter, target: &ConflictTarget) {
        w.push_str(" ON CONFLICT ");
        match target {
            ConflictTarget::Column { column, predicate } => {
                w.push_str("(");
                w.push_str(column);
                w.push_str(")");
                if let Some(predicate) = predicate {
                    w.push_str(" WHERE ");
                    w.fragment(predicate);
                }
            }
            ConflictTarget::Constraint(name) => {
                w.push_str("ON CONSTRAINT ");
                w.push_str(name);
            }
        }

        match &self.conflict_action {
            ConflictAction::DoNothing => w.push_str(" DO NOTHING"),
            ConflictAction::DoUpdate { sets, wheres } => {
                w.push_str(" DO UPDATE SET ");
                for (i, (column, value)) in sets.iter().enumerate() {
                    if i > 0 {
                        w.push_str(", ");
                    }
                    self.dialect.write_identifier(w.buf(), column);
                    w.push_str(" = ");
                    match value {
                        SetValue::Bind(p) => w.bind(p.clone()),
                        SetValue::Excluded => {
                            w.push_str("EXCLUDED.");
                            self.dialect.write_identifier(w.buf(), column);
                        }
                        SetValue::Expr(f) => w.fragment(f),
                    }
                }
                if !wheres.is_empty() {
                    w.push_str(" WHERE ");
                    w.and(wheres);
                }
            }
        }
    }
}

fn refers_to_excluded(column: &str, value: &dyn Any) -> bool {
    let text = value
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| value.downcast_ref::<String>().map(String::as_str));
    match text.and_then(|t| t.strip_prefix("EXCLUDED.")) {
        Some(rest) => rest == column,
        None => false,
    }
}
