//! Row mapping: scanning cursor rows into resolved destinations.

use crate::dest::{Dest, StructTarget, Target};
use crate::driver::{ColumnType, Cursor, ScanCell};
use crate::error::{Error, Result};
use crate::options::{NameResolver, Options};
use crate::schema::StructField;
use crate::value::Value;
use std::sync::Arc;

/// A row mapping strategy, replacing [`default_mapper`] when set in [`Options`].
///
/// It is called once per row with the cursor already positioned on that row.
pub type Mapper = Arc<dyn Fn(&mut Src<'_>, &mut Dest<'_>, &Options) -> Result<()> + Send + Sync>;

/// Result-set state for one query: the cursor and its column metadata.
pub struct Src<'c> {
    cursor: &'c mut dyn Cursor,
    columns: Vec<String>,
    column_types: Vec<ColumnType>,
}

impl<'c> Src<'c> {
    pub fn new(cursor: &'c mut dyn Cursor) -> Self {
        Self {
            cursor,
            columns: Vec::new(),
            column_types: Vec::new(),
        }
    }

    pub fn cursor(&mut self) -> &mut dyn Cursor {
        &mut *self.cursor
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_types(&self) -> &[ColumnType] {
        &self.column_types
    }

    /// Loads column metadata, unless already loaded and `force` is false.
    pub fn fetch_columns(&mut self, force: bool) -> Result<()> {
        if force || self.columns.is_empty() {
            self.columns = self.cursor.columns()?;
        }
        if force || self.column_types.is_empty() {
            self.column_types = self.cursor.column_types()?;
        }
        if self.columns.len() != self.column_types.len() {
            return Err(Error::driver(format!(
                "cursor reported {} columns but {} column types",
                self.columns.len(),
                self.column_types.len()
            )));
        }
        Ok(())
    }

    /// Moves to the next result set and reloads its columns.
    pub async fn next_result_set(&mut self) -> Result<bool> {
        if self.cursor.next_result_set().await? {
            self.fetch_columns(true)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// One dialect-chosen scan cell per column.
    pub fn new_scan_cells(&self, opts: &Options) -> Result<Vec<ScanCell>> {
        let dialect = opts.dialect()?;
        Ok(self
            .column_types
            .iter()
            .map(|ct| dialect.new_scan_target(ct, opts))
            .collect())
    }

    /// Scans the current row into fresh cells.
    pub fn scan_row(&mut self, opts: &Options) -> Result<Vec<ScanCell>> {
        let mut cells = self.new_scan_cells(opts)?;
        self.cursor.scan(&mut cells)?;
        Ok(cells)
    }
}

/// Scans the current row and assembles it into `dest` by shape.
pub fn default_mapper(src: &mut Src<'_>, dest: &mut Dest<'_>, opts: &Options) -> Result<()> {
    let dialect = opts.dialect()?;
    let mut cells = src.scan_row(opts)?;
    let coerce = |i: usize, value: Value, to| {
        dialect
            .coerce(&src.column_types[i], value, to, opts)
            .map_err(|e| with_column(e, &src.columns[i]))
    };

    match dest {
        Dest::Map(map) => {
            let to = map.value_type();
            for (i, cell) in cells.iter_mut().enumerate() {
                let value = coerce(i, cell.take(), to)?;
                map.insert_value(src.columns[i].clone(), value)
                    .map_err(|e| with_column(e, &src.columns[i]))?;
            }
            Ok(())
        }
        Dest::Primitive(slot) => {
            let cell = cells
                .first_mut()
                .ok_or_else(|| Error::invalid_dest("primitive destination needs at least one column"))?;
            let value = coerce(0, cell.take(), slot.value_type())?;
            slot.put(value).map_err(|e| with_column(e, &src.columns[0]))
        }
        Dest::Slice(seq) => {
            let to = seq.element_type();
            seq.clear_values();
            for (i, cell) in cells.iter_mut().enumerate() {
                let value = coerce(i, cell.take(), to)?;
                seq.push_value(value)
                    .map_err(|e| with_column(e, &src.columns[i]))?;
            }
            Ok(())
        }
        Dest::Struct(target) => map_struct(src, target, cells, opts),
    }
}

fn map_struct(
    src: &Src<'_>,
    target: &mut StructTarget<'_>,
    cells: Vec<ScanCell>,
    opts: &Options,
) -> Result<()> {
    let dialect = opts.dialect()?;
    let resolver = opts.name_resolver();
    let values: Vec<Value> = cells.into_iter().map(|mut c| c.take()).collect();
    let schema = target.schema.clone();

    for field in &schema.fields {
        let Some(i) = match_column(&src.columns, field, schema.type_name, resolver) else {
            continue;
        };
        let raw = values[i].clone();
        let value = dialect
            .coerce(&src.column_types[i], raw, field.ty, opts)
            .map_err(|e| with_column(e, &src.columns[i]))?;
        target
            .record
            .assign(&field.indexes(), value)
            .map_err(|e| with_column(e, &src.columns[i]))?;
    }
    Ok(())
}

/// Index of the column feeding `field`: explicit column, then aliases, then
/// the resolved field name ignoring case. The last matching column wins.
fn match_column(
    columns: &[String],
    field: &StructField,
    type_name: &str,
    resolver: &dyn NameResolver,
) -> Option<usize> {
    if let Some(col) = &field.column {
        if let Some(i) = columns.iter().rposition(|c| c == col) {
            return Some(i);
        }
    }
    for alias in &field.aliases {
        if let Some(i) = columns.iter().rposition(|c| c == alias) {
            return Some(i);
        }
    }
    let resolved = resolver.resolve_column_name(type_name, field.name());
    columns.iter().rposition(|c| c.eq_ignore_ascii_case(&resolved))
}

fn with_column(err: Error, column: &str) -> Error {
    match err {
        Error::CoerceDest { column: c, message } if c.is_empty() => Error::CoerceDest {
            column: column.to_owned(),
            message,
        },
        other => other,
    }
}

fn run_mapper(src: &mut Src<'_>, dest: &mut Dest<'_>, opts: &Options) -> Result<()> {
    match &opts.mapper {
        Some(mapper) => mapper(src, dest, opts),
        None => default_mapper(src, dest, opts),
    }
}

/// Maps the first row into `dest`; zero rows is [`Error::NoRows`].
///
/// `dest` is only resolved once a row is there, so an `Option` destination
/// stays `None` when nothing matched.
pub async fn map_one(cursor: &mut dyn Cursor, dest: &mut dyn Target, opts: &Options) -> Result<()> {
    let mut src = Src::new(cursor);
    if !src.cursor.next().await? {
        src.cursor.err()?;
        return Err(Error::NoRows);
    }
    src.fetch_columns(false)?;
    let mut dest = dest.resolve()?;
    run_mapper(&mut src, &mut dest, opts)?;
    src.cursor.err()
}

/// Maps every row into a fresh element appended to `dest`.
///
/// Rows are collected first, so on error `dest` is left as it was. Zero rows
/// is a success.
pub async fn map_all<E>(cursor: &mut dyn Cursor, dest: &mut Vec<E>, opts: &Options) -> Result<()>
where
    E: Target + Default,
{
    let mut src = Src::new(cursor);
    let mut rows: Vec<E> = Vec::new();
    while src.cursor.next().await? {
        src.fetch_columns(false)?;
        let mut elem = E::default();
        {
            let mut elem_dest = elem.resolve()?;
            run_mapper(&mut src, &mut elem_dest, opts)?;
        }
        rows.push(elem);
    }
    src.cursor.err()?;
    dest.append(&mut rows);
    Ok(())
}

/// Calls `f` on the first row; zero rows is [`Error::NoRows`].
pub async fn visit_one<F>(cursor: &mut dyn Cursor, mut f: F) -> Result<()>
where
    F: FnMut(&mut dyn Cursor) -> Result<()> + Send,
{
    if !cursor.next().await? {
        cursor.err()?;
        return Err(Error::NoRows);
    }
    f(&mut *cursor)?;
    cursor.err()
}

/// Calls `f` on every row.
pub async fn visit_all<F>(cursor: &mut dyn Cursor, mut f: F) -> Result<()>
where
    F: FnMut(&mut dyn Cursor) -> Result<()> + Send,
{
    while cursor.next().await? {
        f(&mut *cursor)?;
    }
    cursor.err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::MySqlDialect;
    use crate::mock::{MockCursor, MockSet};
    use crate::schema::Record;
    use crate::value::ValueType;
    use std::collections::HashMap;

    fn opts() -> Options {
        Options::new().with_dialect(Arc::new(MySqlDialect)).without_logger()
    }

    fn users() -> MockCursor {
        MockCursor::new(vec![MockSet::new(
            &[("id", "BIGINT"), ("name", "VARCHAR")],
            vec![
                vec![Value::Int(7), Value::Bytes(b"a".to_vec())],
                vec![Value::Int(8), Value::Bytes(b"b".to_vec())],
            ],
        )])
    }

    // Declared out of column order; fields are routed by name, not position.
    #[derive(Debug, Default, PartialEq, Record)]
    struct Account {
        email: Option<String>,
        #[rowmap(cols = "user_name, name")]
        login: String,
        untouched: i32,
        #[rowmap(col = "account_id")]
        id: i64,
    }

    #[tokio::test]
    async fn test_map_into_map() {
        let mut cursor = users();
        let mut row: HashMap<String, Value> = HashMap::new();
        map_one(&mut cursor, &mut row, &opts()).await.unwrap();
        assert_eq!(row.len(), 2);
        assert_eq!(row["id"], Value::Int(7));
        assert_eq!(row["name"], Value::Text("a".into()));
    }

    #[tokio::test]
    async fn test_map_into_typed_map_coerces_values() {
        let mut cursor = MockCursor::new(vec![MockSet::new(
            &[("a", "INT"), ("b", "INT UNSIGNED")],
            vec![vec![Value::Int(1), Value::UInt(2)]],
        )]);
        let mut row: HashMap<String, i32> = HashMap::new();
        map_one(&mut cursor, &mut row, &opts()).await.unwrap();
        assert_eq!(row["a"], 1);
        assert_eq!(row["b"], 2);
    }

    #[tokio::test]
    async fn test_duplicate_columns_later_wins_in_map() {
        let mut cursor = MockCursor::new(vec![MockSet::new(
            &[("x", "BIGINT"), ("x", "BIGINT")],
            vec![vec![Value::Int(1), Value::Int(2)]],
        )]);
        let mut row: HashMap<String, i64> = HashMap::new();
        map_one(&mut cursor, &mut row, &opts()).await.unwrap();
        assert_eq!(row["x"], 2);
    }

    #[tokio::test]
    async fn test_primitive_uses_first_column() {
        let mut cursor = users();
        let mut id = 0i64;
        map_one(&mut cursor, &mut id, &opts()).await.unwrap();
        assert_eq!(id, 7);
    }

    #[tokio::test]
    async fn test_row_as_sequence() {
        let mut cursor = users();
        let mut row: Vec<Value> = vec![Value::Null; 5];
        map_one(&mut cursor, &mut row, &opts()).await.unwrap();
        assert_eq!(row, vec![Value::Int(7), Value::Text("a".into())]);
    }

    #[tokio::test]
    async fn test_struct_mapping_priority() {
        let mut cursor = MockCursor::new(vec![MockSet::new(
            &[
                ("ID", "BIGINT"),
                ("account_id", "BIGINT"),
                ("name", "VARCHAR"),
                ("EMAIL", "VARCHAR"),
                ("extra", "VARCHAR"),
            ],
            vec![vec![
                Value::Int(1),
                Value::Int(2),
                Value::Bytes(b"neo".to_vec()),
                Value::Null,
                Value::Bytes(b"ignored".to_vec()),
            ]],
        )]);
        let mut account = Account {
            untouched: 9,
            ..Default::default()
        };
        map_one(&mut cursor, &mut account, &opts()).await.unwrap();
        assert_eq!(
            account,
            Account {
                id: 2,
                login: "neo".into(),
                email: None,
                untouched: 9,
            }
        );
    }

    #[tokio::test]
    async fn test_map_all_structs_and_empty_result() {
        let mut cursor = users();
        let mut accounts: Vec<Option<Account>> = Vec::new();
        map_all(&mut cursor, &mut accounts, &opts()).await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[1].as_ref().unwrap().login, "b");

        let mut cursor = MockCursor::new(vec![MockSet::new(&[("id", "BIGINT")], vec![])]);
        let mut ids: Vec<i64> = Vec::new();
        map_all(&mut cursor, &mut ids, &opts()).await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_map_one_without_rows() {
        let mut cursor = MockCursor::new(vec![MockSet::new(&[("id", "BIGINT")], vec![])]);
        let mut id = 0i64;
        let err = map_one(&mut cursor, &mut id, &opts()).await.unwrap_err();
        assert!(err.is_no_rows());

        let mut cursor = MockCursor::new(vec![MockSet::new(&[("id", "BIGINT")], vec![])]);
        let mut account: Option<Account> = None;
        let err = map_one(&mut cursor, &mut account, &opts()).await.unwrap_err();
        assert!(err.is_no_rows());
        assert!(account.is_none());
    }

    #[tokio::test]
    async fn test_coerce_failure_keeps_destination() {
        let mut cursor = MockCursor::new(vec![MockSet::new(
            &[("n", "BIGINT")],
            vec![vec![Value::Int(1)], vec![Value::Int(100_000)]],
        )]);
        let mut out: Vec<i8> = vec![3];
        let err = map_all(&mut cursor, &mut out, &opts()).await.unwrap_err();
        match err {
            Error::CoerceDest { column, .. } => assert_eq!(column, "n"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(out, vec![3]);
    }

    #[tokio::test]
    async fn test_custom_mapper_replaces_default() {
        let mapper: Mapper = Arc::new(|src: &mut Src<'_>, dest: &mut Dest<'_>, _opts: &Options| {
            let n = src.columns().len() as i64;
            match dest {
                Dest::Primitive(slot) => slot.put(Value::Int(n)),
                _ => Err(Error::invalid_dest("expected primitive")),
            }
        });
        let opts = opts().with_mapper(mapper);
        let mut cursor = users();
        let mut out: Vec<i64> = Vec::new();
        map_all(&mut cursor, &mut out, &opts).await.unwrap();
        assert_eq!(out, vec![2, 2]);
    }

    #[tokio::test]
    async fn test_next_result_set_refreshes_columns() {
        let mut cursor = MockCursor::new(vec![
            MockSet::new(&[("a", "BIGINT")], vec![vec![Value::Int(1)]]),
            MockSet::new(
                &[("b", "VARCHAR"), ("c", "DOUBLE")],
                vec![vec![Value::Bytes(b"x".to_vec()), Value::Float(0.5)]],
            ),
        ]);
        let opts = opts();
        let mut src = Src::new(&mut cursor);
        assert!(src.cursor().next().await.unwrap());
        src.fetch_columns(false).unwrap();
        assert_eq!(src.columns(), ["a"]);

        assert!(src.next_result_set().await.unwrap());
        assert_eq!(src.columns(), ["b", "c"]);
        assert!(src.cursor().next().await.unwrap());
        let mut row: Vec<Value> = Vec::new();
        let mut dest = Dest::Slice(&mut row);
        default_mapper(&mut src, &mut dest, &opts).unwrap();
        assert_eq!(row, vec![Value::Text("x".into()), Value::Float(0.5)]);
        assert!(!src.next_result_set().await.unwrap());
    }

    #[tokio::test]
    async fn test_visit_callbacks() {
        let mut cursor = users();
        let mut seen = 0;
        visit_all(&mut cursor, |c| {
            assert_eq!(c.columns()?.len(), 2);
            seen += 1;
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(seen, 2);

        let mut cursor = MockCursor::new(vec![MockSet::new(&[("id", "BIGINT")], vec![])]);
        let err = visit_one(&mut cursor, |_| Ok(())).await.unwrap_err();
        assert!(err.is_no_rows());
    }

    #[test]
    fn test_element_type_for_untyped_sequence() {
        let mut row: Vec<Value> = Vec::new();
        let dest = Dest::Slice(&mut row);
        assert_eq!(dest.element_type(), Some(ValueType::Any));
    }
}
