//! The driver boundary: what this crate needs from a database connection.
//!
//! [`Driver`] executes bound queries; [`Cursor`] walks the rows of one query.
//! `sqlx::MySqlPool` and [`mysql::MySqlTx`] implement both for MySQL.

pub mod mysql;

use crate::error::Result;
use crate::value::Value;
use async_trait::async_trait;

pub use mysql::MySqlTx;

/// Summary of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub last_insert_id: u64,
    pub rows_affected: u64,
}

/// Column metadata reported by a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnType {
    pub name: String,
    /// Backend type name, upper case (e.g. `VARCHAR`, `INT UNSIGNED`)
    pub database_type_name: String,
    pub nullable: Option<bool>,
}

impl ColumnType {
    pub fn new(name: impl Into<String>, database_type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database_type_name: database_type_name.into(),
            nullable: None,
        }
    }
}

/// How a driver should decode one column before coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Bool,
    Int,
    UInt,
    F32,
    F64,
    /// Raw payload; text columns arrive this way and are decoded by the dialect
    Bytes,
    Date,
    Time,
    DateTime,
}

/// Intermediate holder a cursor scans one column into.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanCell {
    kind: ScanKind,
    value: Value,
}

impl ScanCell {
    pub fn new(kind: ScanKind) -> Self {
        Self {
            kind,
            value: Value::Null,
        }
    }

    pub fn kind(&self) -> ScanKind {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn set(&mut self, value: Value) {
        self.value = value;
    }

    pub fn take(&mut self) -> Value {
        std::mem::replace(&mut self.value, Value::Null)
    }
}

/// Row cursor over the result of one query.
///
/// Implementations must release their resources on `close` and on drop.
#[async_trait]
pub trait Cursor: Send {
    /// Advances to the next row of the current result set.
    async fn next(&mut self) -> Result<bool>;

    /// Moves to the next result set, if any.
    async fn next_result_set(&mut self) -> Result<bool>;

    fn columns(&self) -> Result<Vec<String>>;

    fn column_types(&self) -> Result<Vec<ColumnType>>;

    /// Fills `cells` from the current row; `cells` has one entry per column.
    fn scan(&mut self, cells: &mut [ScanCell]) -> Result<()>;

    /// Error that ended iteration early, checked after the last row.
    fn err(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()>;
}

/// A connection, pool or transaction that can run bound queries.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Name used to pick the dialect (e.g. `"mysql"`).
    fn driver_name(&self) -> &'static str;

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<ExecResult>;

    async fn query(&self, sql: &str, args: &[Value]) -> Result<Box<dyn Cursor>>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
