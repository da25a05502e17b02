//! Common imports.
//!
//! ```ignore
//! use pgcompose::prelude::*;
//! ```
//!
//! [`Eq`](crate::Eq) is left out so it does not shadow `std::cmp::Eq`.

pub use crate::{
    BuiltQuery, ComposeError, ComposeResult, Execer, Fragment, IntoSubQuery, MapScope, Param,
    Record, VirtualTable, expr, insert_into, params, select, select_doc,
};
