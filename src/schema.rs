//! Struct schemas: how an aggregate type's fields line up with result columns.
//!
//! A type describes its fields once through [`Record::fields`]; the analysis
//! (flattening embedded records, splitting alias tags) runs on first use and
//! is cached for the life of the process.

use crate::error::{Error, Result};
use crate::value::{FromValue, Value, ValueType};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// How one declared field takes part in mapping.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Mapped from a column, coerced into the given type
    Column(ValueType),
    /// An embedded record whose fields are flattened into the parent
    Embedded(fn() -> Vec<FieldDef>),
    /// Not mapped
    Skipped,
}

/// Declaration of one struct field, in declaration order.
///
/// The position of a `FieldDef` in the list returned by [`Record::fields`] is
/// its structural index, which is what [`Record::assign`] receives.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub type_name: &'static str,
    /// Explicit column name
    pub col: Option<&'static str>,
    /// Comma separated alias column names
    pub cols: Option<&'static str>,
}

impl FieldDef {
    /// A field mapped from a column of the type `T` requests.
    pub fn column<T: FromValue>(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Column(T::value_type()),
            type_name: std::any::type_name::<T>(),
            col: None,
            cols: None,
        }
    }

    /// An embedded record, flattened into the parent's schema.
    pub fn embedded(name: &'static str, fields: fn() -> Vec<FieldDef>) -> Self {
        Self {
            name,
            kind: FieldKind::Embedded(fields),
            type_name: "",
            col: None,
            cols: None,
        }
    }

    pub fn skipped(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Skipped,
            type_name: "",
            col: None,
            cols: None,
        }
    }

    /// Match this field against exactly this column name first.
    pub fn col(mut self, column: &'static str) -> Self {
        self.col = Some(column);
        self
    }

    /// Accept any of these comma separated column names.
    pub fn cols(mut self, aliases: &'static str) -> Self {
        self.cols = Some(aliases);
        self
    }
}

/// An aggregate destination.
///
/// Usually derived; the derive also registers the type as a [`Target`](crate::Target):
///
/// ```
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
/// A hand-written implementation lists its fields in declaration order and
/// routes each structural index in `assign`:
///
/// ```
/// use sqlx_rowmap::schema::{assign_field, FieldDef, Record};
/// use sqlx_rowmap::{Error, Result, Value};
///
/// #[derive(Default)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// impl Record for User {
///     fn fields() -> Vec<FieldDef> {
///         vec![
///             FieldDef::column::<i64>("id").col("user_id"),
///             FieldDef::column::<String>("name"),
///         ]
///     }
///
///     fn assign(&mut self, path: &[usize], value: Value) -> Result<()> {
///         match path {
///             [0] => assign_field(&mut self.id, value),
///             [1] => assign_field(&mut self.name, value),
///             _ => Err(Error::invalid_dest(format!("User has no field at {path:?}"))),
///         }
///     }
/// }
/// ```
pub trait Record: Send {
    fn fields() -> Vec<FieldDef>
    where
        Self: Sized;

    /// Stores `value` into the field at `path` (structural indexes, outermost
    /// first; longer than one for fields of embedded records).
    fn assign(&mut self, path: &[usize], value: Value) -> Result<()>;

    fn type_name() -> &'static str
    where
        Self: Sized,
    {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

pub use sqlx_rowmap_derive::Record;

impl<T: Record> Record for Box<T> {
    fn fields() -> Vec<FieldDef> {
        T::fields()
    }

    fn assign(&mut self, path: &[usize], value: Value) -> Result<()> {
        (**self).assign(path, value)
    }

    fn type_name() -> &'static str {
        T::type_name()
    }
}

/// Converts `value` and stores it into `slot`; for use in [`Record::assign`].
pub fn assign_field<T: FromValue>(slot: &mut T, value: Value) -> Result<()> {
    *slot = T::from_value(value)?;
    Ok(())
}

/// One step of a field's access path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    pub name: &'static str,
    pub index: usize,
}

/// A mappable field after flattening.
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub path: Vec<FieldPath>,
    pub ty: ValueType,
    pub type_name: &'static str,
    pub column: Option<String>,
    pub aliases: Vec<String>,
}

impl StructField {
    /// Name of the innermost field.
    pub fn name(&self) -> &'static str {
        self.path.last().map(|p| p.name).unwrap_or_default()
    }

    pub fn indexes(&self) -> Vec<usize> {
        self.path.iter().map(|p| p.index).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructSchema {
    pub type_name: &'static str,
    pub fields: Vec<StructField>,
}

type SchemaCache = RwLock<HashMap<TypeId, Arc<StructSchema>>>;

fn cache() -> &'static SchemaCache {
    static CACHE: OnceLock<SchemaCache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// The cached schema of `T`, analysed on first use.
pub fn schema_of<T: Record + 'static>() -> Arc<StructSchema> {
    let key = TypeId::of::<T>();
    {
        let read = cache().read().unwrap_or_else(PoisonError::into_inner);
        if let Some(schema) = read.get(&key) {
            return schema.clone();
        }
    }

    let mut write = cache().write().unwrap_or_else(PoisonError::into_inner);
    if let Some(schema) = write.get(&key) {
        return schema.clone();
    }
    let schema = Arc::new(analyze(T::type_name(), T::fields()));
    tracing::debug!(
        target: "sqlx_rowmap::schema",
        type_name = schema.type_name,
        fields = schema.fields.len(),
        "analyzed struct schema"
    );
    write.insert(key, schema.clone());
    schema
}

/// Flattens field declarations into a schema without touching the cache.
pub fn analyze(type_name: &'static str, fields: Vec<FieldDef>) -> StructSchema {
    let mut schema = StructSchema {
        type_name,
        fields: Vec::new(),
    };
    analyze_into(&fields, &[], &mut schema.fields);
    schema
}

fn analyze_into(fields: &[FieldDef], prefix: &[FieldPath], out: &mut Vec<StructField>) {
    for (index, def) in fields.iter().enumerate() {
        let step = FieldPath {
            name: def.name,
            index,
        };
        match &def.kind {
            FieldKind::Skipped => {}
            FieldKind::Embedded(inner) => {
                let mut path = prefix.to_vec();
                path.push(step);
                analyze_into(&inner(), &path, out);
            }
            FieldKind::Column(ty) => {
                let mut path = prefix.to_vec();
                path.push(step);
                out.push(StructField {
                    path,
                    ty: *ty,
                    type_name: def.type_name,
                    column: def.col.map(str::trim).filter(|c| !c.is_empty()).map(String::from),
                    aliases: split_non_empty(def.cols.unwrap_or_default(), ','),
                });
            }
        }
    }
}

fn split_non_empty(s: &str, sep: char) -> Vec<String> {
    s.split(sep)
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(String::from)
        .collect()
}

/// Error for an assign path a record does not know.
pub fn unknown_field(type_name: &str, path: &[usize]) -> Error {
    Error::invalid_dest(format!("{type_name} has no field at {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default, Record)]
    struct Audit {
        #[rowmap(cols = "creator, author,")]
        created_by: String,
    }

    #[derive(Debug, Default, Record)]
    struct Base {
        #[rowmap(col = "base_id")]
        id: i64,
        #[rowmap(embed)]
        audit: Option<Box<Audit>>,
    }

    #[derive(Debug, Default, Record)]
    struct Post {
        #[rowmap(embed)]
        base: Base,
        #[rowmap(skip)]
        cache: Vec<u8>,
        title: Option<String>,
    }

    #[test]
    fn test_embedded_fields_are_flattened() {
        let schema = schema_of::<Post>();
        assert_eq!(schema.type_name, "Post");
        let names: Vec<_> = schema.fields.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["id", "created_by", "title"]);

        let created_by = &schema.fields[1];
        assert_eq!(created_by.indexes(), vec![0, 1, 0]);
        assert_eq!(created_by.path[1].name, "audit");
        assert_eq!(created_by.aliases, vec!["creator", "author"]);
        assert_eq!(created_by.ty, ValueType::Text);

        assert_eq!(schema.fields[0].column.as_deref(), Some("base_id"));
        assert_eq!(schema.fields[2].indexes(), vec![2]);
    }

    #[test]
    fn test_assign_through_embedded_path() {
        let mut post = Post::default();
        let schema = schema_of::<Post>();
        post.assign(&schema.fields[1].indexes(), Value::Text("ann".into()))
            .unwrap();
        assert_eq!(post.base.audit.as_ref().unwrap().created_by, "ann");
        assert!(post.assign(&[1], Value::Null).is_err());
        assert!(post.cache.is_empty());
    }

    static COUNTED_ANALYSES: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct Counted;

    impl Record for Counted {
        fn fields() -> Vec<FieldDef> {
            COUNTED_ANALYSES.fetch_add(1, Ordering::SeqCst);
            vec![FieldDef::column::<i32>("n")]
        }

        fn assign(&mut self, path: &[usize], _value: Value) -> Result<()> {
            Err(unknown_field("Counted", path))
        }
    }

    #[test]
    fn test_schema_is_analyzed_once_under_concurrency() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(schema_of::<Counted>))
            .collect();
        let schemas: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for schema in &schemas {
            assert_eq!(**schema, *schemas[0]);
            assert!(Arc::ptr_eq(schema, &schemas[0]));
        }
        assert_eq!(COUNTED_ANALYSES.load(Ordering::SeqCst), 1);
    }
}
