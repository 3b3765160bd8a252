//! Destination resolution: turning a caller's value into a mapping [`Dest`].

use crate::error::Result;
use crate::schema::{schema_of, Record, StructSchema};
use crate::value::{FromValue, Value, ValueType};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Discriminant of a resolved destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Struct,
    Map,
    Primitive,
    Slice,
}

/// A single typed slot, filled from the first column.
pub trait Slot: Send {
    fn value_type(&self) -> ValueType;

    fn put(&mut self, value: Value) -> Result<()>;
}

impl<T: FromValue> Slot for T {
    fn value_type(&self) -> ValueType {
        T::value_type()
    }

    fn put(&mut self, value: Value) -> Result<()> {
        *self = T::from_value(value)?;
        Ok(())
    }
}

/// A string-keyed map, filled with one entry per column.
pub trait MapTarget: Send {
    fn value_type(&self) -> ValueType;

    fn insert_value(&mut self, column: String, value: Value) -> Result<()>;
}

impl<V: FromValue> MapTarget for HashMap<String, V> {
    fn value_type(&self) -> ValueType {
        V::value_type()
    }

    fn insert_value(&mut self, column: String, value: Value) -> Result<()> {
        self.insert(column, V::from_value(value)?);
        Ok(())
    }
}

impl<V: FromValue> MapTarget for BTreeMap<String, V> {
    fn value_type(&self) -> ValueType {
        V::value_type()
    }

    fn insert_value(&mut self, column: String, value: Value) -> Result<()> {
        self.insert(column, V::from_value(value)?);
        Ok(())
    }
}

/// A sequence receiving one value per column, in column order.
pub trait SeqTarget: Send {
    fn element_type(&self) -> ValueType;

    fn clear_values(&mut self);

    fn push_value(&mut self, value: Value) -> Result<()>;
}

impl<T: FromValue> SeqTarget for Vec<T> {
    fn element_type(&self) -> ValueType {
        T::value_type()
    }

    fn clear_values(&mut self) {
        self.clear();
    }

    fn push_value(&mut self, value: Value) -> Result<()> {
        self.push(T::from_value(value)?);
        Ok(())
    }
}

/// A record together with its cached schema.
pub struct StructTarget<'a> {
    pub record: &'a mut dyn Record,
    pub schema: Arc<StructSchema>,
}

/// A resolved destination for one row.
pub enum Dest<'a> {
    Struct(StructTarget<'a>),
    Map(&'a mut dyn MapTarget),
    Primitive(&'a mut dyn Slot),
    Slice(&'a mut dyn SeqTarget),
}

impl<'a> Dest<'a> {
    /// A struct destination, resolving `T`'s schema through the cache.
    pub fn record<T: Record + 'static>(record: &'a mut T) -> Result<Self> {
        Ok(Dest::Struct(StructTarget {
            schema: schema_of::<T>(),
            record,
        }))
    }

    pub fn shape(&self) -> Shape {
        match self {
            Dest::Struct(_) => Shape::Struct,
            Dest::Map(_) => Shape::Map,
            Dest::Primitive(_) => Shape::Primitive,
            Dest::Slice(_) => Shape::Slice,
        }
    }

    /// The type values are coerced into; `None` for structs, whose fields
    /// each declare their own.
    pub fn element_type(&self) -> Option<ValueType> {
        match self {
            Dest::Struct(_) => None,
            Dest::Map(m) => Some(m.value_type()),
            Dest::Primitive(s) => Some(s.value_type()),
            Dest::Slice(s) => Some(s.element_type()),
        }
    }
}

impl fmt::Debug for Dest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Dest");
        d.field("shape", &self.shape());
        match self {
            Dest::Struct(t) => d.field("type_name", &t.schema.type_name),
            other => d.field("element_type", &other.element_type()),
        };
        d.finish()
    }
}

/// Anything a row can be mapped into.
///
/// Records opt in through `#[derive(Record)]`, or with
/// [`impl_target!`](crate::impl_target) for a hand-written [`Record`]; maps,
/// scalars, `Vec`s of scalars, `Option` and `Box` are covered here.
pub trait Target: Send {
    fn resolve(&mut self) -> Result<Dest<'_>>;

    /// Resolves an `Option<Self>` destination, allocating the inner value
    /// when it is `None`.
    fn resolve_option(slot: &mut Option<Self>) -> Result<Dest<'_>>
    where
        Self: Sized + Default,
    {
        slot.get_or_insert_with(Self::default).resolve()
    }
}

/// The shape a fresh `T` resolves to.
pub fn shape_of<T: Target + Default>() -> Result<Shape> {
    let mut fresh = T::default();
    let shape = fresh.resolve()?.shape();
    Ok(shape)
}

impl<T: Target + Default> Target for Option<T> {
    fn resolve(&mut self) -> Result<Dest<'_>> {
        T::resolve_option(self)
    }
}

impl<T: Target> Target for Box<T> {
    fn resolve(&mut self) -> Result<Dest<'_>> {
        (**self).resolve()
    }
}

impl<V: FromValue> Target for HashMap<String, V> {
    fn resolve(&mut self) -> Result<Dest<'_>> {
        Ok(Dest::Map(self))
    }
}

impl<V: FromValue> Target for BTreeMap<String, V> {
    fn resolve(&mut self) -> Result<Dest<'_>> {
        Ok(Dest::Map(self))
    }
}

impl<T: FromValue> Target for Vec<T> {
    fn resolve(&mut self) -> Result<Dest<'_>> {
        Ok(Dest::Slice(self))
    }
}

macro_rules! impl_primitive_target {
    ($($t:ty),* $(,)?) => {
        $(
            impl Target for $t {
                fn resolve(&mut self) -> Result<Dest<'_>> {
                    Ok(Dest::Primitive(self))
                }

                // `Option<scalar>` is a nullable slot, not an allocation
                fn resolve_option(slot: &mut Option<Self>) -> Result<Dest<'_>> {
                    Ok(Dest::Primitive(slot))
                }
            }
        )*
    };
}

impl_primitive_target!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    String,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    Value,
);

/// Registers record types with hand-written [`Record`] impls as mapping
/// targets. Derived records are registered by the derive.
///
/// ```
/// use sqlx_rowmap::schema::{assign_field, unknown_field, FieldDef, Record};
/// use sqlx_rowmap::{impl_target, Result, Value};
///
/// #[derive(Default)]
/// struct Tag {
///     label: String,
/// }
///
/// impl Record for Tag {
///     fn fields() -> Vec<FieldDef> {
///         vec![FieldDef::column::<String>("label")]
///     }
///
///     fn assign(&mut self, path: &[usize], value: Value) -> Result<()> {
///         match path {
///             [0] => assign_field(&mut self.label, value),
///             _ => Err(unknown_field("Tag", path)),
///         }
///     }
/// }
///
/// impl_target!(Tag);
/// ```
#[macro_export]
macro_rules! impl_target {
    ($($t:ty),+ $(,)?) => {
        $(
            impl $crate::Target for $t {
                fn resolve(&mut self) -> $crate::Result<$crate::Dest<'_>> {
                    $crate::Dest::record(self)
                }
            }
        )+
    };
}
