//! Statement builders.
//!
//! Every builder is a plain value driven by consuming chain calls and
//! rendered with `to_sql(&self)`. Chain calls never fail: an invalid
//! combination is recorded (the first one wins) and reported by `to_sql`.

mod doc;
mod insert;
mod select;
mod statement;


pub use doc::{DocBuilder, select_doc};
pub use insert::{ConflictAction, ConflictTarget, InsertBuilder, SetValue, insert_into};
pub use select::{SelectBuilder, select};

use crate::dialect::Dialect;
use crate::error::{ComposeError, ComposeResult};
use crate::fragment::Fragment;
use crate::query::BuiltQuery;
use crate::record::VirtualTable;

pub(crate) fn record_error(slot: &mut Option<ComposeError>, err: ComposeError) {
    match slot {
        Some(first) => {
            tracing::debug!(
                target: "pgcompose",
                error = %err,
                first = %first,
                "ignoring builder error, one is already recorded"
            );
        }
        None => {
            tracing::debug!(target: "pgcompose", error = %err, "builder recorded error");
            *slot = Some(err);
        }
    }
}

pub(crate) fn recorded(slot: &Option<ComposeError>) -> ComposeResult<()> {
    match slot {
        Some(err) => Err(err.replay()),
        None => Ok(()),
    }
}

pub(crate) fn trace_built(kind: &'static str, query: &BuiltQuery) {
    tracing::trace!(
        target: "pgcompose",
        kind,
        sql_len = query.sql.len(),
        param_count = query.params.len(),
        "statement built"
    );
}

/// Anything that can be embedded in another statement: raw SQL, fragments,
/// virtual tables and other builders.
///
/// Builders are rendered when they are handed over; the parent keeps only
/// the resulting fragment.
pub trait IntoSubQuery {
    fn into_sub_query(self, dialect: &dyn Dialect) -> ComposeResult<Fragment>;
}

impl IntoSubQuery for &str {
    fn into_sub_query(self, _dialect: &dyn Dialect) -> ComposeResult<Fragment> {
        Ok(Fragment::new(self))
    }
}

impl IntoSubQuery for String {
    fn into_sub_query(self, _dialect: &dyn Dialect) -> ComposeResult<Fragment> {
        Ok(Fragment::new(self))
    }
}

impl IntoSubQuery for Fragment {
    fn into_sub_query(self, _dialect: &dyn Dialect) -> ComposeResult<Fragment> {
        Ok(self)
    }
}

impl IntoSubQuery for BuiltQuery {
    fn into_sub_query(self, _dialect: &dyn Dialect) -> ComposeResult<Fragment> {
        Ok(self.into())
    }
}

impl IntoSubQuery for &VirtualTable {
    fn into_sub_query(self, dialect: &dyn Dialect) -> ComposeResult<Fragment> {
        self.to_fragment(dialect)
    }
}

impl IntoSubQuery for VirtualTable {
    fn into_sub_query(self, dialect: &dyn Dialect) -> ComposeResult<Fragment> {
        self.to_fragment(dialect)
    }
}

impl IntoSubQuery for &SelectBuilder {
    fn into_sub_query(self, _dialect: &dyn Dialect) -> ComposeResult<Fragment> {
        self.to_sql().map(Fragment::from)
    }
}

impl IntoSubQuery for SelectBuilder {
    fn into_sub_query(self, dialect: &dyn Dialect) -> ComposeResult<Fragment> {
        (&self).into_sub_query(dialect)
    }
}

impl IntoSubQuery for &InsertBuilder {
    fn into_sub_query(self, _dialect: &dyn Dialect) -> ComposeResult<Fragment> {
        self.to_sql().map(Fragment::from)
    }
}

impl IntoSubQuery for InsertBuilder {
    fn into_sub_query(self, dialect: &dyn Dialect) -> ComposeResult<Fragment> {
        (&self).into_sub_query(dialect)
    }
}

/// Embedded documents render without the `row_to_json` wrapper.
impl IntoSubQuery for &DocBuilder {
    fn into_sub_query(self, _dialect: &dyn Dialect) -> ComposeResult<Fragment> {
        self.to_nested_sql().map(Fragment::from)
    }
}

impl IntoSubQuery for DocBuilder {
    fn into_sub_query(self, dialect: &dyn Dialect) -> ComposeResult<Fragment> {
        (&self).into_sub_query(dialect)
    }
}
