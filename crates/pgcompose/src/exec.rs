//! Running built statements on tokio-postgres connections.

use crate::error::ComposeResult;
use crate::query::BuiltQuery;
use tokio_postgres::Row;

/// A connection (or transaction) that can run a [`BuiltQuery`].
pub trait Execer: Send + Sync {
    /// Run the statement and return the number of affected rows.
    fn exec(&self, query: &BuiltQuery) -> impl std::future::Future<Output = ComposeResult<u64>> + Send;

    /// Run the statement and return all rows.
    fn fetch(
        &self,
        query: &BuiltQuery,
    ) -> impl std::future::Future<Output = ComposeResult<Vec<Row>>> + Send;

    /// Run a document statement and return the JSON value in the first
    /// column of each row.
    fn fetch_json(
        &self,
        query: &BuiltQuery,
    ) -> impl std::future::Future<Output = ComposeResult<Vec<serde_json::Value>>> + Send {
        async move {
            let rows = self.fetch(query).await?;
            rows.iter()
                .map(|row| row.try_get::<_, serde_json::Value>(0).map_err(Into::into))
                .collect()
        }
    }
}

fn log_exec(query: &BuiltQuery) {
    tracing::debug!(
        target: "pgcompose",
        param_count = query.params.len(),
        sql = %query.sql,
        "executing statement"
    );
}

impl Execer for tokio_postgres::Client {
    async fn exec(&self, query: &BuiltQuery) -> ComposeResult<u64> {
        log_exec(query);
        Ok(tokio_postgres::Client::execute(self, query.sql.as_str(), &query.params_ref()).await?)
    }

    async fn fetch(&self, query: &BuiltQuery) -> ComposeResult<Vec<Row>> {
        log_exec(query);
        Ok(tokio_postgres::Client::query(self, query.sql.as_str(), &query.params_ref()).await?)
    }
}

impl Execer for tokio_postgres::Transaction<'_> {
    async fn exec(&self, query: &BuiltQuery) -> ComposeResult<u64> {
        log_exec(query);
        Ok(tokio_postgres::Transaction::execute(self, query.sql.as_str(), &query.params_ref()).await?)
    }

    async fn fetch(&self, query: &BuiltQuery) -> ComposeResult<Vec<Row>> {
        log_exec(query);
        Ok(tokio_postgres::Transaction::query(self, query.sql.as_str(), &query.params_ref()).await?)
    }
}
