//! Derive macro for pgcompose
//!
//! Provides `#[derive(Record)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod record;

/// Derive `Record` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use pgcompose::Record;
///
/// #[derive(Record)]
/// struct User {
///     id: i64,
///     #[record(column = "email_address")]
///     email: Option<String>,
///     #[record(embed)]
///     audit: Audit,
///     #[record(skip)]
///     cached: bool,
/// }
/// ```
///
/// # Attributes
///
/// - `#[record(column = "name")]` - Map field to a different column name
/// - `#[record(skip)]` - Leave the field out
/// - `#[record(embed)]` - Flatten the columns of a nested `Record`
/// - `#[record(untyped)]` - Field type has no `PgType`; insertable only
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
