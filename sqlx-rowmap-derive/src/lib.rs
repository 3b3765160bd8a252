//! Derive macros for sqlx-rowmap
//!
//! Provides `#[derive(Record)]`.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod record;

/// Derive `Record` and `Target` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use sqlx_rowmap::Record;
///
/// #[derive(Default, Record)]
/// struct Audit {
///     #[rowmap(cols = "creator, author")]
///     created_by: String,
/// }
///
/// #[derive(Default, Record)]
/// struct User {
///     #[rowmap(col = "user_id")]
///     id: i64,
///     name: String,
///     #[rowmap(embed)]
///     audit: Option<Audit>,
///     #[rowmap(skip)]
///     cache: Vec<u8>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[rowmap(col = "name")]` - Match this exact column first
/// - `#[rowmap(cols = "a, b")]` - Comma separated alias columns
/// - `#[rowmap(embed)]` - Flatten the fields of an inner record (`T` or `Option<T>`)
/// - `#[rowmap(skip)]` - Never mapped
#[proc_macro_derive(Record, attributes(rowmap))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
