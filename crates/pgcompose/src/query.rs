//! The output of every builder.

use crate::fragment::Fragment;
use crate::param::Param;
use tokio_postgres::types::ToSql;

/// SQL text plus its ordered arguments; `params[i - 1]` binds `$i`.
#[derive(Debug, Clone, Default)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Param>,
}

impl BuiltQuery {
    /// Parameters as references compatible with tokio-postgres.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(Param::as_sql).collect()
    }

    pub fn into_parts(self) -> (String, Vec<Param>) {
        (self.sql, self.params)
    }
}

/// A built statement numbers its placeholders from `$1`, which is exactly
/// what a fragment is, so it can be embedded again.
impl From<BuiltQuery> for Fragment {
    fn from(query: BuiltQuery) -> Self {
        Fragment::with_params(query.sql, query.params)
    }
}
