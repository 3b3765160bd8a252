//! Per-backend policy: quoting, bind syntax, scan targets and coercion.

pub mod mysql;

use crate::builder::{compile_named_query, BindStyle, CompiledQuery};
use crate::driver::{ColumnType, ScanCell};
use crate::error::{Error, Result};
use crate::options::Options;
use crate::value::{Value, ValueType};
use std::fmt;
use std::sync::Arc;

pub use mysql::MySqlDialect;

/// Identifier quote character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    Single,
    Double,
    Back,
}

impl QuoteStyle {
    fn char(self) -> char {
        match self {
            QuoteStyle::Single => '\'',
            QuoteStyle::Double => '"',
            QuoteStyle::Back => '`',
        }
    }
}

/// Backend policy object, chosen once per connection.
///
/// The provided methods implement the base behaviour; a backend overrides
/// what its type system needs.
pub trait Dialect: Send + Sync + fmt::Debug {
    fn driver_name(&self) -> &'static str;

    fn bind_style(&self) -> BindStyle;

    fn quote_style(&self) -> QuoteStyle;

    /// Quotes an identifier. Already quoted identifiers are returned as is.
    fn quote(&self, ident: &str, _opts: &Options) -> String {
        quote(ident, self.quote_style())
    }

    fn compile_named_query(&self, query: &str, _opts: &Options) -> Result<CompiledQuery> {
        compile_named_query(query, self.bind_style())
    }

    /// Creates the intermediate holder the driver scans `column` into.
    fn new_scan_target(&self, column: &ColumnType, opts: &Options) -> ScanCell;

    /// Whether the backend stores `column` as text, so untyped destinations
    /// get strings instead of raw bytes.
    fn is_text_column(&self, _column: &ColumnType) -> bool {
        false
    }

    fn coerce(
        &self,
        column: &ColumnType,
        scanned: Value,
        to: ValueType,
        opts: &Options,
    ) -> Result<Value> {
        coerce_value(self, column, scanned, to, opts)
    }
}

/// Looks up the dialect registered for `driver_name`.
pub fn dialect_of(driver_name: &str) -> Option<Arc<dyn Dialect>> {
    match driver_name {
        "mysql" => Some(Arc::new(MySqlDialect)),
        _ => None,
    }
}

/// Wraps `ident` in the quote character unless it is already wrapped.
pub fn quote(ident: &str, style: QuoteStyle) -> String {
    let ident = ident.trim();
    if ident.is_empty() {
        return String::new();
    }
    let q = style.char();
    if ident.len() >= 2 && ident.starts_with(q) && ident.ends_with(q) {
        ident.to_owned()
    } else {
        format!("{q}{ident}{q}")
    }
}

/// Decodes text bytes in `charset`.
pub fn decode_text(bytes: Vec<u8>, charset: &str) -> std::result::Result<String, String> {
    match charset.to_ascii_lowercase().as_str() {
        "" | "utf8" | "utf-8" | "utf8mb4" => {
            String::from_utf8(bytes).map_err(|e| format!("invalid utf-8 text: {e}"))
        }
        "latin1" | "iso-8859-1" => Ok(bytes.into_iter().map(char::from).collect()),
        other => Err(format!("unsupported text charset '{other}'")),
    }
}

/// Base coercion rules shared by every dialect.
///
/// NULL is typeless and passes through. A value already of the requested type
/// is returned unchanged; `Any` passes through except that text columns are
/// decoded; `Text` accepts raw bytes. Everything else is an error.
pub fn coerce_value<D>(
    dialect: &D,
    column: &ColumnType,
    scanned: Value,
    to: ValueType,
    opts: &Options,
) -> Result<Value>
where
    D: Dialect + ?Sized,
{
    if scanned.is_null() || scanned.value_type() == Some(to) {
        return Ok(scanned);
    }
    match (to, scanned) {
        (ValueType::Any, Value::Bytes(b)) if dialect.is_text_column(column) => {
            decode_text(b, &opts.text_charset)
                .map(Value::Text)
                .map_err(|msg| Error::coerce(&column.name, msg))
        }
        (ValueType::Any, v) => Ok(v),
        (ValueType::Text, Value::Bytes(b)) => decode_text(b, &opts.text_charset)
            .map(Value::Text)
            .map_err(|msg| Error::coerce(&column.name, msg)),
        (to, v) => Err(Error::coerce(
            &column.name,
            format!("cannot convert {} to {to}", v.kind_name()),
        )),
    }
}
