//! # pgcompose
//!
//! Composable PostgreSQL statement builders.
//!
//! Builders produce SQL text with positional placeholders plus the ordered
//! argument list. Any builder can be embedded in another one (as a CTE, a
//! JSON sub-document, a UNION member or an upsert expression); placeholders of
//! the embedded statement are renumbered so the final statement is consistent.
//!
//! ```
//! use pgcompose::{Eq, expr, select, select_doc};
//!
//! let posts = select(["id", "title"])
//!     .from("posts")
//!     .where_("posts.user_id = people.id")
//!     .where_(Eq::new().eq("posts.state", "published"));
//!
//! let q = select_doc(["id", "name"])
//!     .many("posts", posts)
//!     .from("people")
//!     .where_(expr!("id = $1", 42_i64))
//!     .to_sql()
//!     .unwrap();
//!
//! assert!(q.sql.contains("posts.state = $1"));
//! assert!(q.sql.contains("WHERE (id = $2)"));
//! assert_eq!(format!("{:?}", q.params), r#"["published", 42]"#);
//! ```
//!
//! ## Records
//!
//! Structs map to columns through [`Record`], usually derived:
//!
//! ```ignore
//! #[derive(pgcompose::Record)]
//! struct Person {
//!     id: i64,
//!     #[record(column = "full_name")]
//!     name: String,
//! }
//!
//! let q = insert_into("people").columns(["*"]).record(person).to_sql()?;
//! ```

// Lets `#[derive(Record)]` output (which names `::pgcompose`) work inside this crate.
extern crate self as pgcompose;

pub mod builder;
pub mod dialect;
pub mod error;
pub mod exec;
pub mod fragment;
pub mod param;
pub mod predicate;
pub mod prelude;
pub mod query;
pub mod record;
pub mod scope;

pub use builder::{
    ConflictAction, ConflictTarget, DocBuilder, InsertBuilder, IntoSubQuery, SelectBuilder,
    SetValue, insert_into, select, select_doc,
};
pub use dialect::{Dialect, PgType, Postgres};
pub use error::{ComposeError, ComposeResult};
pub use exec::Execer;
pub use fragment::Fragment;
pub use param::Param;
pub use predicate::{Eq, Predicate};
pub use query::BuiltQuery;
pub use record::{Field, Fields, Record, VirtualTable};
pub use scope::{MapScope, RawScope, Scope};

#[cfg(feature = "derive")]
pub use pgcompose_derive::Record;
