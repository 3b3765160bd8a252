//! In-memory driver and cursor for exercising the crate without a database.

use crate::driver::{ColumnType, Cursor, Driver, ExecResult, ScanCell};
use crate::error::{Error, Result};
use crate::value::Value;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One result set: column `(name, type)` pairs and rows.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockSet {
    columns: Vec<ColumnType>,
    rows: VecDeque<Vec<Value>>,
}

impl MockSet {
    pub(crate) fn new(columns: &[(&str, &str)], rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|(name, ty)| ColumnType::new(*name, *ty))
                .collect(),
            rows: rows.into(),
        }
    }
}

pub(crate) struct MockCursor {
    current: Option<MockSet>,
    pending: VecDeque<MockSet>,
    row: Option<Vec<Value>>,
    iteration_error: Option<String>,
    closed: Arc<AtomicUsize>,
}

impl MockCursor {
    pub(crate) fn new(sets: Vec<MockSet>) -> Self {
        let mut pending: VecDeque<MockSet> = sets.into();
        Self {
            current: pending.pop_front(),
            pending,
            row: None,
            iteration_error: None,
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Cursor for MockCursor {
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
            .current
            .iter()
            .flat_map(|set| set.columns.iter().map(|c| c.name.clone()))
            .collect())
    }

    fn column_types(&self) -> Result<Vec<ColumnType>> {
        Ok(self
            .current
            .as_ref()
            .map(|set| set.columns.clone())
            .unwrap_or_default())
    }

    fn scan(&mut self, cells: &mut [ScanCell]) -> Result<()> {
        let row = self
            .row
            .as_ref()
            .ok_or_else(|| Error::driver("scan called without a current row"))?;
        if row.len() != cells.len() {
            return Err(Error::driver(format!(
                "expected {} scan targets, got {}",
                row.len(),
                cells.len()
            )));
        }
        for (cell, value) in cells.iter_mut().zip(row) {
            cell.set(value.clone());
        }
        Ok(())
    }

    fn err(&self) -> Result<()> {
        match &self.iteration_error {
            Some(msg) if self.row.is_none() => Err(Error::driver(msg.clone())),
            _ => Ok(()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.current = None;
        self.pending.clear();
        Ok(())
    }
}

/// A driver that answers each `query` with the next scripted result and
/// records every statement it receives.
#[derive(Default)]
pub(crate) struct MockDriver {
    results: Mutex<VecDeque<Vec<MockSet>>>,
    exec_result: ExecResult,
    failure: Option<String>,
    iteration_error: Option<String>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    cursors_closed: Arc<AtomicUsize>,
}

impl MockDriver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Scripts the result of the next `query` call.
    pub(crate) fn with_result(self, sets: Vec<MockSet>) -> Self {
        self.results.lock().unwrap().push_back(sets);
        self
    }

    pub(crate) fn with_exec_result(mut self, result: ExecResult) -> Self {
        self.exec_result = result;
        self
    }

    /// Makes every `execute` and `query` call fail.
    pub(crate) fn failing(mut self, msg: &str) -> Self {
        self.failure = Some(msg.to_owned());
        self
    }

    /// Makes cursors report `msg` once their rows run out.
    pub(crate) fn with_iteration_error(mut self, msg: &str) -> Self {
        self.iteration_error = Some(msg.to_owned());
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn cursors_closed(&self) -> usize {
        self.cursors_closed.load(Ordering::SeqCst)
    }

    fn record(&self, sql: &str, args: &[Value]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_owned(), args.to_vec()));
        match &self.failure {
            Some(msg) => Err(Error::driver(msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn driver_name(&self) -> &'static str {
        "mysql"
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        self.record(sql, args)?;
        Ok(self.exec_result)
    }

    async fn query(&self, sql: &str, args: &[Value]) -> Result<Box<dyn Cursor>> {
        self.record(sql, args)?;
        let sets = self.results.lock().unwrap().pop_front().unwrap_or_default();
        let mut cursor = MockCursor::new(sets);
        cursor.iteration_error = self.iteration_error.clone();
        cursor.closed = self.cursors_closed.clone();
        Ok(Box::new(cursor))
    }
}
