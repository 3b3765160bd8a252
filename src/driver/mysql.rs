//! SQLx MySQL implementation of the driver boundary.

use super::{ColumnType, Cursor, Driver, ExecResult, ScanCell, ScanKind};
use crate::error::{Error, Result};
use crate::value::Value;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::TryStreamExt;
use sqlx::mysql::{MySqlArguments, MySqlQueryResult, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Either, Executor, MySql, MySqlPool, Row, Transaction, TypeInfo};
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Type alias for SQLx Query with MySQL arguments
pub type Q<'q> = Query<'q, MySql, MySqlArguments>;

/// Binds positional values in order.
pub fn bind_values<'q>(mut q: Q<'q>, args: &[Value]) -> Q<'q> {
    for value in args {
        q = match value.clone() {
            Value::Null => q.bind(None::<String>),
            Value::Bool(v) => q.bind(v),
            Value::Int(v) => q.bind(v),
            Value::UInt(v) => q.bind(v),
            Value::Float(v) => q.bind(v),
            Value::Text(v) => q.bind(v),
            Value::Bytes(v) => q.bind(v),
            Value::Date(v) => q.bind(v),
            Value::Time(v) => q.bind(v),
            Value::DateTime(v) => q.bind(v),
        };
    }
    q
}

fn exec_result(res: &MySqlQueryResult) -> ExecResult {
    ExecResult {
        last_insert_id: res.last_insert_id(),
        rows_affected: res.rows_affected(),
    }
}

struct ResultSet {
    columns: Vec<ColumnType>,
    rows: VecDeque<MySqlRow>,
}

impl ResultSet {
    fn new(rows: Vec<MySqlRow>) -> Self {
        let columns = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|c| ColumnType::new(c.name(), c.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            columns,
            rows: rows.into(),
        }
    }
}

/// Cursor over rows buffered from `Executor::fetch_many`.
///
/// Every query result reported by the server closes one result set.
///
/// The whole response is read before the cursor is returned, including rows a
/// `query_one` never looks at. The connection (or the transaction lock) is
/// released at that point, so a cursor never holds one while rows are
/// mapped. Put a `LIMIT` on queries whose result would not fit in memory.
pub struct MySqlCursor {
    current: Option<ResultSet>,
    pending: VecDeque<ResultSet>,
    row: Option<MySqlRow>,
}

impl MySqlCursor {
    fn new(items: Vec<Either<MySqlQueryResult, MySqlRow>>) -> Self {
        let mut pending = VecDeque::new();
        let mut rows = Vec::new();
        for item in items {
            match item {
                Either::Right(row) => rows.push(row),
                Either::Left(_) => pending.push_back(ResultSet::new(std::mem::take(&mut rows))),
            }
        }
        if !rows.is_empty() || pending.is_empty() {
            pending.push_back(ResultSet::new(rows));
        }
        let current = pending.pop_front();
        Self {
            current,
            pending,
            row: None,
        }
    }

    fn current_columns(&self) -> &[ColumnType] {
        self.current
            .as_ref()
            .map(|set| set.columns.as_slice())
            .unwrap_or_default()
    }
}

fn decode_cell(row: &MySqlRow, index: usize, kind: ScanKind) -> Result<Value> {
    let value = match kind {
        ScanKind::Bool => row
            .try_get_unchecked::<Option<bool>, _>(index)?
            .map(Value::Bool),
        ScanKind::Int => row
            .try_get_unchecked::<Option<i64>, _>(index)?
            .map(Value::Int),
        ScanKind::UInt => row
            .try_get_unchecked::<Option<u64>, _>(index)?
            .map(Value::UInt),
        ScanKind::F32 => row
            .try_get_unchecked::<Option<f32>, _>(index)?
            .map(|v| Value::Float(v.into())),
        ScanKind::F64 => row
            .try_get_unchecked::<Option<f64>, _>(index)?
            .map(Value::Float),
        ScanKind::Bytes => row
            .try_get_unchecked::<Option<Vec<u8>>, _>(index)?
            .map(Value::Bytes),
        ScanKind::Date => row
            .try_get_unchecked::<Option<NaiveDate>, _>(index)?
            .map(Value::Date),
        ScanKind::Time => row
            .try_get_unchecked::<Option<NaiveTime>, _>(index)?
            .map(Value::Time),
        ScanKind::DateTime => row
            .try_get_unchecked::<Option<NaiveDateTime>, _>(index)?
            .map(Value::DateTime),
    };
    Ok(value.unwrap_or(Value::Null))
}

#[async_trait]
impl Cursor for MySqlCursor {
    async fn next(&mut self) -> Result<bool> {
        self.row = self.current.as_mut().and_then(|set| set.rows.pop_front());
        Ok(self.row.is_some())
    }

    async fn next_result_set(&mut self) -> Result<bool> {
        self.row = None;
        self.current = self.pending.pop_front();
        Ok(self.current.is_some())
    }

    fn columns(&self) -> Result<Vec<String>> {
        Ok(self
            .current_columns()
            .iter()
            .map(|c| c.name.clone())
            .collect())
    }

    fn column_types(&self) -> Result<Vec<ColumnType>> {
        Ok(self.current_columns().to_vec())
    }

    fn scan(&mut self, cells: &mut [ScanCell]) -> Result<()> {
        let row = self
            .row
            .as_ref()
            .ok_or_else(|| Error::driver("scan called without a current row"))?;
        if cells.len() != row.len() {
            return Err(Error::driver(format!(
                "expected {} scan targets, got {}",
                row.len(),
                cells.len()
            )));
        }
        for (index, cell) in cells.iter_mut().enumerate() {
            let value = decode_cell(row, index, cell.kind())?;
            cell.set(value);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.row = None;
        self.current = None;
        self.pending.clear();
        Ok(())
    }
}

#[async_trait]
impl Driver for MySqlPool {
    fn driver_name(&self) -> &'static str {
        "mysql"
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        let res = bind_values(sqlx::query(sql), args).execute(self).await?;
        Ok(exec_result(&res))
    }

    async fn query(&self, sql: &str, args: &[Value]) -> Result<Box<dyn Cursor>> {
        let items = self
            .fetch_many(bind_values(sqlx::query(sql), args))
            .try_collect::<Vec<_>>()
            .await?;
        Ok(Box::new(MySqlCursor::new(items)))
    }

    async fn close(&self) -> Result<()> {
        sqlx::Pool::close(self).await;
        Ok(())
    }
}

/// A MySQL transaction usable as a [`Driver`].
///
/// Dropped without `commit`, the transaction is rolled back.
pub struct MySqlTx {
    inner: Mutex<Option<Transaction<'static, MySql>>>,
}

fn finished() -> Error {
    Error::driver("transaction already committed or rolled back")
}

impl MySqlTx {
    pub async fn begin(pool: &MySqlPool) -> Result<Self> {
        let tx = pool.begin().await?;
        Ok(Self {
            inner: Mutex::new(Some(tx)),
        })
    }

    pub async fn commit(&self) -> Result<()> {
        let tx = self.inner.lock().await.take().ok_or_else(finished)?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(&self) -> Result<()> {
        let tx = self.inner.lock().await.take().ok_or_else(finished)?;
        tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Driver for MySqlTx {
    fn driver_name(&self) -> &'static str {
        "mysql"
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or_else(finished)?;
        let res = bind_values(sqlx::query(sql), args)
            .execute(&mut **tx)
            .await?;
        Ok(exec_result(&res))
    }

    async fn query(&self, sql: &str, args: &[Value]) -> Result<Box<dyn Cursor>> {
        let mut guard = self.inner.lock().await;
        let tx = guard.as_mut().ok_or_else(finished)?;
        let items = (&mut **tx)
            .fetch_many(bind_values(sqlx::query(sql), args))
            .try_collect::<Vec<_>>()
            .await?;
        Ok(Box::new(MySqlCursor::new(items)))
    }
}
