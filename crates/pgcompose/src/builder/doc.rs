//! SELECT builder that shapes each row as one JSON document.
//!
//! The statement base is the inner row source. Sub-queries are attached
//! under an alias and rendered as extra projected columns (`many`, `vector`,
//! `one`, `scalar`), as CTEs (`with`) or as UNION members. At the top level
//! the whole thing is wrapped in `SELECT row_to_json(item.*) FROM (..) AS item`.

use super::statement::{StatementState, impl_statement_chain};
use super::{IntoSubQuery, trace_built};
use crate::error::{ComposeError, ComposeResult};
use crate::fragment::{Fragment, SqlWriter};
use crate::query::BuiltQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    With,
    Many,
    Vector,
    One,
    Scalar,
    Union,
    UnionAll,
}

impl Role {
    fn projects(self) -> bool {
        matches!(self, Role::Many | Role::Vector | Role::One | Role::Scalar)
    }
}

#[derive(Debug)]
struct SubQueryBinding {
    alias: String,
    role: Role,
    fragment: Fragment,
    pruned: bool,
}

/// JSON document builder.
///
/// ```
/// use pgcompose::{expr, select, select_doc};
///
/// let posts = select(["id", "title"]).from("posts").where_("posts.user_id = people.id");
/// let q = select_doc(["id", "name"])
///     .many("posts", posts)
///     .from("people")
///     .where_(expr!("id = $1", 1_i64))
///     .to_sql()
///     .unwrap();
/// assert_eq!(
///     q.sql,
///     "SELECT row_to_json(item.*) FROM ( SELECT id, name, \
///      (SELECT array_agg(x.*) FROM (SELECT id, title FROM posts WHERE (posts.user_id = people.id)) AS x) AS posts \
///      FROM people WHERE (id = $1) ) AS item"
/// );
/// ```
#[derive(Debug)]
pub struct DocBuilder {
    pub(crate) state: StatementState,
    bindings: Vec<SubQueryBinding>,
}

/// Start a document SELECT. The column list may be empty when sub-queries
/// supply the projection.
pub fn select_doc<I, S>(columns: I) -> DocBuilder
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut state = StatementState::new();
    state.columns.extend(columns.into_iter().map(Into::into));
    DocBuilder {
        state,
        bindings: Vec::new(),
    }
}

impl DocBuilder {
    impl_statement_chain!();

    /// `WITH alias AS ( sub )` before the outer SELECT.
    pub fn with(self, alias: impl Into<String>, sub: impl IntoSubQuery) -> Self {
        self.bind(Role::With, alias.into(), sub)
    }

    /// A JSON array of the sub-query's rows.
    pub fn many(self, alias: impl Into<String>, sub: impl IntoSubQuery) -> Self {
        self.bind(Role::Many, alias.into(), sub)
    }

    /// A JSON array of the sub-query's single column.
    pub fn vector(self, alias: impl Into<String>, sub: impl IntoSubQuery) -> Self {
        self.bind(Role::Vector, alias.into(), sub)
    }

    /// The sub-query's first row as a JSON object.
    pub fn one(self, alias: impl Into<String>, sub: impl IntoSubQuery) -> Self {
        self.bind(Role::One, alias.into(), sub)
    }

    /// The sub-query's first value, inlined.
    pub fn scalar(self, alias: impl Into<String>, sub: impl IntoSubQuery) -> Self {
        self.bind(Role::Scalar, alias.into(), sub)
    }

    /// `UNION sub`.
    pub fn union(self, sub: impl IntoSubQuery) -> Self {
        self.bind(Role::Union, "union".to_string(), sub)
    }

    /// `UNION ALL sub`.
    pub fn union_all(self, sub: impl IntoSubQuery) -> Self {
        self.bind(Role::UnionAll, "union all".to_string(), sub)
    }

    fn bind(mut self, role: Role, alias: String, sub: impl IntoSubQuery) -> Self {
        match sub.into_sub_query(&*self.state.dialect) {
            Ok(fragment) => self.bindings.push(SubQueryBinding {
                alias,
                role,
                fragment,
                pruned: false,
            }),
            Err(err) => self.state.record_error(ComposeError::composition(alias, err)),
        }
        self
    }

    /// Keep only the sub-query columns named here.
    ///
    /// A name ending in `*` keeps every alias with that prefix. `"*"` or no
    /// names keeps everything. CTEs and unions are never removed, and only
    /// sub-queries attached before this call are affected.
    pub fn whitelist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<S> = names.into_iter().collect();
        let names: Vec<&str> = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() || names.contains(&"*") {
            return self;
        }

        for binding in self.bindings.iter_mut().filter(|b| b.role.projects()) {
            let keep = names.iter().any(|name| match name.strip_suffix('*') {
                Some(prefix) => binding.alias.starts_with(prefix),
                None => binding.alias == *name,
            });
            if !keep {
                binding.pruned = true;
            }
        }
        self
    }

    fn live(&self, role: Role) -> impl Iterator<Item = &SubQueryBinding> {
        self.bindings
            .iter()
            .filter(move |b| b.role == role && !b.pruned)
    }

    fn render(&self, wrap: bool) -> ComposeResult<BuiltQuery> {
        let projects = !self.state.columns.is_empty()
            || self.bindings.iter().any(|b| b.role.projects() && !b.pruned);
        self.state.check(projects)?;
        let scope = self.state.resolve_scope()?;
        let dialect = &*self.state.dialect;

        let mut w = SqlWriter::new();

        for (i, with) in self.live(Role::With).enumerate() {
            w.push_str(if i == 0 { "WITH " } else { ", " });
            dialect.write_identifier(w.buf(), &with.alias);
            w.push_str(" AS ( ");
            w.fragment(&with.fragment);
            w.push_str(" )");
        }
        if self.live(Role::With).next().is_some() {
            w.push_str(" ");
        }

        if wrap {
            w.push_str("SELECT row_to_json(item.*) FROM ( ");
        }

        self.state.write_select(&mut w);
        let mut first = self.state.columns.is_empty();
        for role in [Role::Many, Role::Vector, Role::One, Role::Scalar] {
            for sub in self.live(role) {
                if !first {
                    w.push_str(", ");
                }
                first = false;
                let (open, close) = match role {
                    Role::Many => ("(SELECT array_agg(x.*) FROM (", ") AS x) AS "),
                    Role::Vector => ("(SELECT array_agg(x.v) FROM (", ") AS x(v)) AS "),
                    Role::One => ("(SELECT row_to_json(x.*) FROM (", ") AS x) AS "),
                    _ => ("(SELECT x.v FROM (", ") AS x(v) LIMIT 1) AS "),
                };
                w.push_str(open);
                w.fragment(&sub.fragment);
                w.push_str(close);
                dialect.write_identifier(w.buf(), &sub.alias);
            }
        }

        self.state.write_from(&mut w, &scope);
        self.state.write_where(&mut w, &scope);
        self.state.write_grouping(&mut w);

        for sub in self
            .bindings
            .iter()
            .filter(|b| matches!(b.role, Role::Union | Role::UnionAll))
        {
            w.push_str(if sub.role == Role::Union { " UNION " } else { " UNION ALL " });
            w.fragment(&sub.fragment);
        }

        self.state.write_tail(&mut w);

        if wrap {
            w.push_str(" ) AS item");
        }
        Ok(w.finish())
    }

    /// Top-level form, wrapped in `row_to_json`.
    pub fn to_sql(&self) -> ComposeResult<BuiltQuery> {
        let query = self.render(true)?;
        trace_built("doc", &query);
        Ok(query)
    }

    /// The inner statement without the `row_to_json` wrapper, as it is
    /// rendered when embedded in another document.
    pub fn to_nested_sql(&self) -> ComposeResult<BuiltQuery> {
        let query = self.render(false)?;
        trace_built("doc.nested", &query);
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{VirtualTable, expr, insert_into, params, select};

    #[test]
    fn top_level_wraps_once() {
        let q = select_doc(["b", "c"]).from("a").where_(expr!("d = $1", 4_i64)).to_sql().unwrap();
        assert_eq!(
            q.sql,
            "SELECT row_to_json(item.*) FROM ( SELECT b, c FROM a WHERE (d = $1) ) AS item"
        );
        assert_eq!(format!("{:?}", q.params), "[4]");
    }

    #[test]
    fn roles_render_in_fixed_order_with_args_in_text_order() {
        let q = select_doc(["b", "c"])
            .one("f", select(["g", "h"]).from("f").where_(expr!("id = $1", 1_i64)))
            .many("x", expr!("SELECT id, y FROM x WHERE k = $1", 2_i64))
            .scalar("total", "SELECT count(*) FROM z")
            .vector("ids", select(["id"]).from("w").where_(expr!("w.a = $1", 3_i64)))
            .from("a")
            .where_(expr!("d = $1", 4_i64))
            .to_sql()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT row_to_json(item.*) FROM ( SELECT b, c, \
             (SELECT array_agg(x.*) FROM (SELECT id, y FROM x WHERE k = $1) AS x) AS x, \
             (SELECT array_agg(x.v) FROM (SELECT id FROM w WHERE (w.a = $2)) AS x(v)) AS ids, \
             (SELECT row_to_json(x.*) FROM (SELECT g, h FROM f WHERE (id = $3)) AS x) AS f, \
             (SELECT x.v FROM (SELECT count(*) FROM z) AS x(v) LIMIT 1) AS total \
             FROM a WHERE (d = $4) ) AS item"
        );
        assert_eq!(format!("{:?}", q.params), "[2, 3, 1, 4]");
    }

    #[test]
    fn with_clauses_precede_the_wrapper() {
        let q = select_doc(["id"])
            .with("recent", select(["id"]).from("posts").where_(expr!("age < $1", 7_i64)))
            .with(
                "created",
                insert_into("log").columns(["msg"]).values(params!["hi"]).returning(["id"]),
            )
            .from("recent")
            .to_sql()
            .unwrap();
        assert_eq!(
            q.sql,
            "WITH recent AS ( SELECT id FROM posts WHERE (age < $1) ), \
             created AS ( INSERT INTO log (msg) VALUES ($2) RETURNING id ) \
             SELECT row_to_json(item.*) FROM ( SELECT id FROM recent ) AS item"
        );
        assert_eq!(format!("{:?}", q.params), r#"[7, "hi"]"#);
    }

    #[test]
    fn unions_follow_having() {
        let q = select_doc(["id"])
            .from("a")
            .where_(expr!("x = $1", 1_i64))
            .union(expr!("SELECT id FROM b WHERE y = $1", 2_i64))
            .union_all("SELECT id FROM c")
            .order_by("id")
            .limit(5)
            .to_sql()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT row_to_json(item.*) FROM ( SELECT id FROM a WHERE (x = $1) \
             UNION SELECT id FROM b WHERE y = $2 UNION ALL SELECT id FROM c \
             ORDER BY id LIMIT 5 ) AS item"
        );
    }

    #[test]
    fn nested_document_renders_unwrapped() {
        let comments = select_doc(["id", "body"])
            .from("comments")
            .where_(expr!("comments.post_id = posts.id AND comments.flag = $1", true));
        let posts = select_doc(["id", "title"])
            .many("comments", &comments)
            .from("posts")
            .where_(expr!("posts.user_id = people.id AND posts.kind = $1", "x"));
        let q = select_doc(["id"])
            .many("posts", &posts)
            .from("people")
            .where_(expr!("id = $1", 9_i64))
            .to_sql()
            .unwrap();
        assert_eq!(q.sql.matches("row_to_json(item.*)").count(), 1);
        assert_eq!(q.sql.matches("AS item").count(), 1);
        assert!(q.sql.contains("comments.flag = $1"));
        assert!(q.sql.contains("posts.kind = $2"));
        assert!(q.sql.contains("WHERE (id = $3)"));
        assert_eq!(format!("{:?}", q.params), r#"[true, "x", 9]"#);

        // the embedded builders still wrap on their own
        let own = posts.to_sql().unwrap();
        assert!(own.sql.starts_with("SELECT row_to_json(item.*) FROM ( SELECT id, title, "));
        assert_eq!(own.sql.matches("AS item").count(), 1);
    }

    #[test]
    fn virtual_table_as_many() {
        let q = select_doc(Vec::<String>::new())
            .many("ids", VirtualTable::scalars(&[1_i64, 2]))
            .to_sql()
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT row_to_json(item.*) FROM ( SELECT \
             (SELECT array_agg(x.*) FROM (SELECT UNNEST(ARRAY[$1, $2]::bigint[]) AS data) AS x) AS ids \
             ) AS item"
        );
    }

    #[test]
    fn whitelist_prunes_projected_sub_queries_only() {
        let q = select_doc(["id"])
            .with("w", "SELECT 1")
            .many("foo", "SELECT 1")
            .one("far", "SELECT 2")
            .scalar("x", "SELECT 3")
            .vector("y", "SELECT 4")
            .union("SELECT 5")
            .whitelist(["f*", "x", ""])
            .from("t")
            .to_sql()
            .unwrap();
        assert!(q.sql.starts_with("WITH w AS ( SELECT 1 ) "));
        assert!(q.sql.contains("AS foo"));
        assert!(q.sql.contains("AS far"));
        assert!(q.sql.contains("AS x"));
        assert!(!q.sql.contains("AS y"));
        assert!(q.sql.contains("UNION SELECT 5"));
    }

    #[test]
    fn whitelist_star_or_empty_is_a_no_op() {
        let build = |names: Vec<&str>| {
            select_doc(["id"])
                .many("a", "SELECT 1")
                .whitelist(names)
                .from("t")
                .to_sql()
                .unwrap()
                .sql
        };
        assert!(build(vec!["*"]).contains("AS a"));
        assert!(build(vec![]).contains("AS a"));
        assert!(!build(vec!["b"]).contains("AS a"));
    }

    #[test]
    fn nothing_projected_is_an_error() {
        let err = select_doc(Vec::<String>::new())
            .many("a", "SELECT 1")
            .whitelist(["b"])
            .from("t")
            .to_sql()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn sub_query_failure_is_wrapped_with_alias() {
        let broken = select(Vec::<String>::new()).from("x");
        let err = select_doc(["id"]).one("thing", &broken).from("t").to_sql().unwrap_err();
        match &err {
            ComposeError::Composition { alias, .. } => assert_eq!(alias, "thing"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.root_cause().is_validation());
    }
}
