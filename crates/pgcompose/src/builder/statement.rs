//! Clause state shared by the SELECT and document builders.

use super::{recorded, record_error};
use crate::dialect::{Dialect, Postgres};
use crate::error::{ComposeError, ComposeResult};
use crate::fragment::{Fragment, SqlWriter};
use crate::scope::{Scope, split_where};
use std::sync::Arc;

/// Everything a SELECT-family statement accumulates before rendering.
#[derive(Debug)]
pub(crate) struct StatementState {
    pub(crate) distinct: bool,
    pub(crate) distinct_on: Vec<String>,
    pub(crate) columns: Vec<String>,
    pub(crate) tables: Vec<Fragment>,
    pub(crate) joins: Vec<Fragment>,
    pub(crate) wheres: Vec<Fragment>,
    pub(crate) group_bys: Vec<String>,
    pub(crate) havings: Vec<Fragment>,
    pub(crate) order_bys: Vec<Fragment>,
    pub(crate) fors: Vec<String>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) scope: Option<Box<dyn Scope>>,
    pub(crate) dialect: Arc<dyn Dialect>,
    pub(crate) error: Option<ComposeError>,
}

/// A scope split into the text that follows FROM and an extra condition.
#[derive(Debug, Default)]
pub(crate) struct ResolvedScope {
    pub(crate) prefix: String,
    pub(crate) condition: Option<Fragment>,
}

impl StatementState {
    pub(crate) fn new() -> Self {
        Self {
            distinct: false,
            distinct_on: Vec::new(),
            columns: Vec::new(),
            tables: Vec::new(),
            joins: Vec::new(),
            wheres: Vec::new(),
            group_bys: Vec::new(),
            havings: Vec::new(),
            order_bys: Vec::new(),
            fors: Vec::new(),
            limit: None,
            offset: None,
            scope: None,
            dialect: Arc::new(Postgres::default()),
            error: None,
        }
    }

    pub(crate) fn record_error(&mut self, err: ComposeError) {
        record_error(&mut self.error, err);
    }

    /// Append projected columns; an empty list is an error.
    pub(crate) fn add_columns<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.columns.len();
        self.columns.extend(columns.into_iter().map(Into::into));
        if self.columns.len() == before {
            self.record_error(ComposeError::validation(
                "Select requires 1 or more columns",
            ));
        }
    }

    /// Recorded error, then an empty projection, then joins without a FROM
    /// target.
    pub(crate) fn check(&self, has_projection: bool) -> ComposeResult<()> {
        recorded(&self.error)?;
        if !has_projection {
            return Err(ComposeError::validation(
                "Select requires 1 or more columns",
            ));
        }
        if !self.joins.is_empty() && self.tables.is_empty() {
            return Err(ComposeError::validation(
                "joins may only be attached if a from target is specified",
            ));
        }
        Ok(())
    }

    fn from_text(&self) -> String {
        self.tables
            .iter()
            .map(Fragment::text)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn resolve_scope(&self) -> ComposeResult<ResolvedScope> {
        let Some(scope) = &self.scope else {
            return Ok(ResolvedScope::default());
        };
        let resolved = scope.resolve(&self.from_text())?;
        let (prefix, condition) = split_where(resolved.text());

        if !prefix.is_empty() && self.tables.is_empty() {
            return Err(ComposeError::validation(
                "scope joins may only be used if a from target is specified",
            ));
        }
        if has_placeholder(prefix) {
            return Err(ComposeError::validation(
                "scope placeholders are only allowed after WHERE",
            ));
        }
        let condition = match condition {
            Some(c) if !c.is_empty() => Some(Fragment::with_params(c, resolved.params().to_vec())),
            _ if !resolved.params().is_empty() => {
                return Err(ComposeError::validation(
                    "scope has arguments but no WHERE condition",
                ));
            }
            _ => None,
        };

        Ok(ResolvedScope {
            prefix: prefix.to_string(),
            condition,
        })
    }

    /// `SELECT [DISTINCT | DISTINCT ON (..) ]cols`
    pub(crate) fn write_select(&self, w: &mut SqlWriter) {
        w.push_str("SELECT ");
        if !self.distinct_on.is_empty() {
            w.push_str("DISTINCT ON (");
            w.push_str(&self.distinct_on.join(", "));
            w.push_str(") ");
        } else if self.distinct {
            w.push_str("DISTINCT ");
        }
        w.push_str(&self.columns.join(", "));
    }

    /// ` FROM tables joins scope-prefix`
    pub(crate) fn write_from(&self, w: &mut SqlWriter, scope: &ResolvedScope) {
        if self.tables.is_empty() {
            return;
        }
        w.push_str(" FROM ");
        w.comma(&self.tables);
        w.concat(&self.joins);
        if !scope.prefix.is_empty() {
            w.push_str(" ");
            w.push_str(&scope.prefix);
        }
    }

    /// ` WHERE (..) AND (..)`, the scope condition last.
    pub(crate) fn write_where(&self, w: &mut SqlWriter, scope: &ResolvedScope) {
        if self.wheres.is_empty() && scope.condition.is_none() {
            return;
        }
        w.push_str(" WHERE ");
        w.and(&self.wheres);
        if let Some(condition) = &scope.condition {
            if !self.wheres.is_empty() {
                w.push_str(" AND ");
            }
            w.push_str("(");
            w.fragment(condition);
            w.push_str(")");
        }
    }

    /// ` GROUP BY ..` and ` HAVING ..`
    pub(crate) fn write_grouping(&self, w: &mut SqlWriter) {
        if !self.group_bys.is_empty() {
            w.push_str(" GROUP BY ");
            w.push_str(&self.group_bys.join(", "));
        }
        if !self.havings.is_empty() {
            w.push_str(" HAVING ");
            w.and(&self.havings);
        }
    }

    /// ` ORDER BY ..`, ` LIMIT n`, ` OFFSET n`, ` FOR ..`
    pub(crate) fn write_tail(&self, w: &mut SqlWriter) {
        if !self.order_bys.is_empty() {
            w.push_str(" ORDER BY ");
            w.comma(&self.order_bys);
        }
        if let Some(limit) = self.limit {
            w.push_str(" LIMIT ");
            w.push_str(&limit.to_string());
        }
        if let Some(offset) = self.offset {
            w.push_str(" OFFSET ");
            w.push_str(&offset.to_string());
        }
        if !self.fors.is_empty() {
            w.push_str(" FOR ");
            w.push_str(&self.fors.join(" "));
        }
    }
}

fn has_placeholder(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes
        .windows(2)
        .any(|pair| pair[0] == b'$' && pair[1].is_ascii_digit())
}

/// Chain methods common to every SELECT-family builder. The target type must
/// hold its clause state in a `state: StatementState` field.
macro_rules! impl_statement_chain {
    () => {
        /// `SELECT DISTINCT`.
        pub fn distinct(mut self) -> Self {
            self.state.distinct = true;
            self
        }

        /// `SELECT DISTINCT ON (..)`.
        pub fn distinct_on<I, S>(mut self, columns: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.state.distinct_on.extend(columns.into_iter().map(Into::into));
            self
        }

        /// Append projected columns.
        pub fn columns<I, S>(mut self, columns: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.state.add_columns(columns);
            self
        }

        /// Add a FROM target; several are comma-joined.
        pub fn from(mut self, table: impl Into<$crate::Fragment>) -> Self {
            self.state.tables.push(table.into());
            self
        }

        /// `INNER JOIN table ON condition`.
        pub fn join(self, table: &str, on: impl Into<$crate::Fragment>) -> Self {
            self.push_join("INNER JOIN", table, on.into())
        }

        /// `LEFT JOIN table ON condition`.
        pub fn left_join(self, table: &str, on: impl Into<$crate::Fragment>) -> Self {
            self.push_join("LEFT JOIN", table, on.into())
        }

        /// `RIGHT JOIN table ON condition`.
        pub fn right_join(self, table: &str, on: impl Into<$crate::Fragment>) -> Self {
            self.push_join("RIGHT JOIN", table, on.into())
        }

        /// `FULL OUTER JOIN table ON condition`.
        pub fn full_outer_join(self, table: &str, on: impl Into<$crate::Fragment>) -> Self {
            self.push_join("FULL OUTER JOIN", table, on.into())
        }

        fn push_join(mut self, keyword: &str, table: &str, on: $crate::Fragment) -> Self {
            let text = format!("{} {} ON {}", keyword, table, on.text());
            self.state
                .joins
                .push($crate::Fragment::with_params(text, on.params().to_vec()));
            self
        }

        /// Add a WHERE condition. Conditions are AND-ed, each in parentheses.
        ///
        /// `Eq` columns are written with the dialect current at this call.
        pub fn where_(mut self, predicate: impl Into<$crate::Predicate>) -> Self {
            let predicate: $crate::Predicate = predicate.into();
            let fragments = predicate.into_fragments(&*self.state.dialect);
            self.state.wheres.extend(fragments);
            self
        }

        /// Add a GROUP BY expression.
        pub fn group_by(mut self, expr: impl Into<String>) -> Self {
            self.state.group_bys.push(expr.into());
            self
        }

        /// Add a HAVING condition.
        pub fn having(mut self, predicate: impl Into<$crate::Predicate>) -> Self {
            let predicate: $crate::Predicate = predicate.into();
            let fragments = predicate.into_fragments(&*self.state.dialect);
            self.state.havings.extend(fragments);
            self
        }

        /// Add an ORDER BY expression, which may bind values.
        pub fn order_by(mut self, expr: impl Into<$crate::Fragment>) -> Self {
            self.state.order_bys.push(expr.into());
            self
        }

        pub fn limit(mut self, n: u64) -> Self {
            self.state.limit = Some(n);
            self
        }

        pub fn offset(mut self, n: u64) -> Self {
            self.state.offset = Some(n);
            self
        }

        /// `page` is 1-based (clamped to >= 1).
        pub fn paginate(mut self, page: u64, per_page: u64) -> Self {
            let page = page.max(1);
            self.state.limit = Some(per_page);
            self.state.offset = Some((page - 1).saturating_mul(per_page));
            self
        }

        /// `FOR ..` locking options, e.g. `["UPDATE", "SKIP LOCKED"]`. Replaces
        /// earlier options.
        pub fn for_<I, S>(mut self, options: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.state.fors = options.into_iter().map(Into::into).collect();
            self
        }

        /// Apply a scope given as raw text and arguments.
        pub fn scope(mut self, scope: impl Into<$crate::Fragment>) -> Self {
            self.state.scope = Some(Box::new($crate::RawScope(scope.into())));
            self
        }

        /// Apply a named-parameter scope, overriding some of its defaults.
        pub fn scope_map<K: Into<String>>(
            mut self,
            scope: &$crate::MapScope,
            overrides: impl IntoIterator<Item = (K, $crate::Param)>,
        ) -> Self {
            self.state.scope = Some(Box::new(scope.merged(overrides)));
            self
        }

        /// Set the dialect. Call it before conditions that name columns.
        pub fn dialect(mut self, dialect: ::std::sync::Arc<dyn $crate::Dialect>) -> Self {
            self.state.dialect = dialect;
            self
        }
    };
}

pub(crate) use impl_statement_chain;
