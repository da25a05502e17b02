//! SELECT builder.

use super::statement::{StatementState, impl_statement_chain};
use super::trace_built;
use crate::error::ComposeResult;
use crate::fragment::SqlWriter;
use crate::query::BuiltQuery;

/// SELECT statement builder.
///
/// ```
/// use pgcompose::{expr, select};
///
/// let q = select(["a", "b"]).from("c").where_(expr!("id = $1", 1_i64)).to_sql().unwrap();
/// assert_eq!(q.sql, "SELECT a, b FROM c WHERE (id = $1)");
/// assert_eq!(format!("{:?}", q.params), "[1]");
/// ```
#[derive(Debug)]
pub struct SelectBuilder {
    pub(crate) state: StatementState,
}

/// Start a SELECT with the given columns.
pub fn select<I, S>(columns: I) -> SelectBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut state = StatementState::new();
    state.add_columns(columns);
    SelectBuilder { state }
}

impl SelectBuilder {
    impl_statement_chain!();

    pub fn to_sql(&self) -> ComposeResult<BuiltQuery> {
        self.state.check(!self.state.columns.is_empty())?;
        let scope = self.state.resolve_scope()?;

        let mut w = SqlWriter::new();
        self.state.write_select(&mut w);
        self.state.write_from(&mut w, &scope);
        self.state.write_where(&mut w, &scope);
        self.state.write_grouping(&mut w);
        self.state.write_tail(&mut w);

        let query = w.finish();
        trace_built("select", &query);
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Eq, MapScope, Param, expr};

    #[test]
    fn basic_select() {
        let q = select(["a", "b"])
            .from("c")
            .where_(expr!("id = $1", 1_i64))
            .to_sql()
            .unwrap();
        assert_eq!(q.sql, "SELECT a, b FROM c WHERE (id = $1)");
        assert_eq!(format!("{:?}", q.params), "[1]");
    }

    #[test]
    fn all_clauses_in_order() {
        let q = select(["a", "b"])
            .distinct()
            .from("c")
            .where_(expr!("d = $1 OR e = $2", 1_i64, "wat"))
            .where_(Eq::new().eq("f", 2_i64).any("h", vec![1_i64, 2]))
            .group_by("i")
            .group_by("ii")
            .having(expr!("j = k"))
            .having(expr!("jj = $1", 1_i64))
            .order_by("l")
            .order_by(expr!("l <-> $1", 5_i64))
            .limit(7)
            .offset(8)
            .for_(["UPDATE", "SKIP LOCKED"])
            .to_sql()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT DISTINCT a, b FROM c \
             WHERE (d = $1 OR e = $2) AND (f = $3) AND (h IN $4) \
             GROUP BY i, ii HAVING (j = k) AND (jj = $5) \
             ORDER BY l, l <-> $6 LIMIT 7 OFFSET 8 FOR UPDATE SKIP LOCKED"
        );
        assert_eq!(format!("{:?}", q.params), r#"[1, "wat", 2, [1, 2], 1, 5]"#);
    }

    #[test]
    fn paginate_sets_limit_and_offset() {
        let q = select(["*"]).from("users").paginate(3, 30).to_sql().unwrap();
        assert_eq!(q.sql, "SELECT * FROM users LIMIT 30 OFFSET 60");

        let q = select(["*"]).from("users").paginate(0, 10).to_sql().unwrap();
        assert_eq!(q.sql, "SELECT * FROM users LIMIT 10 OFFSET 0");
    }

    #[test]
    fn columns_append() {
        let q = select(["id", "user_name"]).from("users").columns(["created_at"]).to_sql().unwrap();
        assert_eq!(q.sql, "SELECT id, user_name, created_at FROM users");
        assert!(q.params.is_empty());
    }

    #[test]
    fn joins() {
        let q = select(["u.*", "p.*"])
            .from("users u")
            .join("posts p", "p.author_id = u.id")
            .left_join("tags t", expr!("t.post_id = p.id AND t.kind = $1", "x"))
            .where_(expr!("u.id = $1", 1_i64))
            .to_sql()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT u.*, p.* FROM users u INNER JOIN posts p ON p.author_id = u.id \
             LEFT JOIN tags t ON t.post_id = p.id AND t.kind = $1 WHERE (u.id = $2)"
        );
        assert_eq!(format!("{:?}", q.params), r#"["x", 1]"#);
    }

    #[test]
    fn join_without_from_fails() {
        let err = select(["a"]).join("b", "true").to_sql().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn scope_join_without_from_fails() {
        let err = select(["a"])
            .scope(expr!("INNER JOIN posts p ON p.id = 1 WHERE p.x = $1", 1_i32))
            .to_sql()
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("from target"));
    }

    #[test]
    fn empty_columns_fail() {
        let err = select(Vec::<String>::new()).from("t").to_sql().unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Select requires 1 or more columns");
    }

    #[test]
    fn scope_join_and_where() {
        let published = expr!(
            "
                INNER JOIN posts p on (p.author_id = u.id)
                WHERE
                    p.state = $1
            ",
            "published"
        );
        let q = select(["u.*", "p.*"])
            .from("users u")
            .scope(published)
            .where_(expr!("u.id = $1", 1_i64))
            .to_sql()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT u.*, p.* FROM users u INNER JOIN posts p on (p.author_id = u.id) \
             WHERE (u.id = $1) AND (p.state = $2)"
        );
        assert_eq!(format!("{:?}", q.params), r#"[1, "published"]"#);
    }

    #[test]
    fn scope_join_only_with_distinct_on() {
        let q = select(["u.*", "p.*"])
            .distinct_on(["foo", "bar"])
            .from("users u")
            .scope("INNER JOIN posts p on (p.author_id = u.id)")
            .where_(expr!("u.id = $1", 1_i64))
            .to_sql()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT DISTINCT ON (foo, bar) u.*, p.* FROM users u \
             INNER JOIN posts p on (p.author_id = u.id) WHERE (u.id = $1)"
        );
    }

    #[test]
    fn map_scope() {
        let scope = MapScope::new("WHERE :TABLE.id = :id and name = :name")
            .default("id", 1_i64)
            .default("name", "foo");
        let q = select(["a"])
            .from("b")
            .scope_map(&scope, [("name", Param::new("mario"))])
            .to_sql()
            .unwrap();
        assert_eq!(q.sql, "SELECT a FROM b WHERE (b.id = $1 and name = $2)");
        assert_eq!(format!("{:?}", q.params), r#"[1, "mario"]"#);
    }

    #[test]
    fn to_sql_is_repeatable() {
        let b = select(["a"]).from("t").where_(Eq::new().eq("x", 1_i64));
        let first = b.to_sql().unwrap();
        let second = b.to_sql().unwrap();
        assert_eq!(first.sql, second.sql);
        assert_eq!(format!("{:?}", first.params), format!("{:?}", second.params));
    }
}
