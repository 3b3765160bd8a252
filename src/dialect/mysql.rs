//! MySQL dialect.

use super::{coerce_value, decode_text, Dialect, QuoteStyle};
use crate::builder::BindStyle;
use crate::driver::{ColumnType, ScanCell, ScanKind};
use crate::error::{Error, Result};
use crate::options::Options;
use crate::value::{Value, ValueType};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// MySQL / MariaDB: backtick quoting and `?` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

const TEXT_TYPES: &[&str] = &[
    "CHAR",
    "VARCHAR",
    "TEXT",
    "TINYTEXT",
    "MEDIUMTEXT",
    "LONGTEXT",
    "ENUM",
    "SET",
];

/// Scan kind for a MySQL type name as reported by the server.
pub fn scan_kind(database_type_name: &str) -> ScanKind {
    let name = database_type_name.trim().to_ascii_uppercase();
    if name.ends_with(" UNSIGNED") {
        return ScanKind::UInt;
    }
    match name.as_str() {
        "BOOLEAN" | "BOOL" => ScanKind::Bool,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" => ScanKind::Int,
        "YEAR" => ScanKind::UInt,
        "FLOAT" => ScanKind::F32,
        "DOUBLE" | "REAL" => ScanKind::F64,
        "DATE" => ScanKind::Date,
        "TIME" => ScanKind::Time,
        "DATETIME" | "TIMESTAMP" => ScanKind::DateTime,
        _ => ScanKind::Bytes,
    }
}

impl Dialect for MySqlDialect {
    fn driver_name(&self) -> &'static str {
        "mysql"
    }

    fn bind_style(&self) -> BindStyle {
        BindStyle::Question
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Back
    }

    fn new_scan_target(&self, column: &ColumnType, _opts: &Options) -> ScanCell {
        ScanCell::new(scan_kind(&column.database_type_name))
    }

    fn is_text_column(&self, column: &ColumnType) -> bool {
        let name = column.database_type_name.trim().to_ascii_uppercase();
        TEXT_TYPES.contains(&name.as_str())
    }

    fn coerce(
        &self,
        column: &ColumnType,
        scanned: Value,
        to: ValueType,
        opts: &Options,
    ) -> Result<Value> {
        if scanned.is_null() || scanned.value_type() == Some(to) {
            return Ok(scanned);
        }
        let fail = |msg: String| Error::coerce(&column.name, msg);

        match (scanned, to) {
            (Value::Int(n), to) if is_int(to) => int_in_range(n.into(), to).ok_or_else(|| {
                fail(format!("{n} out of range for {to}"))
            }),
            (Value::UInt(n), to) if is_int(to) => int_in_range(n.into(), to).ok_or_else(|| {
                fail(format!("{n} out of range for {to}"))
            }),
            (Value::Int(n), to) if to.is_float() => int_to_float(n.into(), to)
                .ok_or_else(|| fail(format!("{n} is not exactly representable as {to}"))),
            (Value::UInt(n), to) if to.is_float() => int_to_float(n.into(), to)
                .ok_or_else(|| fail(format!("{n} is not exactly representable as {to}"))),
            (Value::Float(v), ValueType::F32) => narrow_to_f32(v)
                .ok_or_else(|| fail(format!("{v} is not exactly representable as f32"))),
            (Value::Int(n), ValueType::Bool) => Ok(Value::Bool(n != 0)),
            (Value::UInt(n), ValueType::Bool) => Ok(Value::Bool(n != 0)),
            (Value::Bool(b), to) if is_int(to) => {
                int_in_range(b.into(), to).ok_or_else(|| fail(format!("{b} out of range for {to}")))
            }
            (Value::Bytes(b), to) if to != ValueType::Any && to != ValueType::Text && to != ValueType::Bytes => {
                let text = decode_text(b, &opts.text_charset).map_err(&fail)?;
                parse_text(text.trim(), to).ok_or_else(|| fail(format!("cannot parse {text:?} as {to}")))
            }
            (scanned, to) => coerce_value(self, column, scanned, to, opts),
        }
    }
}

fn is_int(ty: ValueType) -> bool {
    ty.is_signed_int() || ty.is_unsigned_int()
}

fn int_range(ty: ValueType) -> (i128, i128) {
    match ty {
        ValueType::I8 => (i8::MIN.into(), i8::MAX.into()),
        ValueType::I16 => (i16::MIN.into(), i16::MAX.into()),
        ValueType::I32 => (i32::MIN.into(), i32::MAX.into()),
        ValueType::I64 => (i64::MIN.into(), i64::MAX.into()),
        ValueType::U8 => (0, u8::MAX.into()),
        ValueType::U16 => (0, u16::MAX.into()),
        ValueType::U32 => (0, u32::MAX.into()),
        _ => (0, u64::MAX.into()),
    }
}

/// `n` as a float of type `to`, if the conversion is exact.
fn int_to_float(n: i128, to: ValueType) -> Option<Value> {
    let exact = if to == ValueType::F32 {
        n as f32 as i128 == n
    } else {
        n as f64 as i128 == n
    };
    exact.then(|| Value::Float(n as f64))
}

/// `v` if it survives a round trip through `f32`.
fn narrow_to_f32(v: f64) -> Option<Value> {
    (v.is_nan() || f64::from(v as f32) == v).then_some(Value::Float(v))
}

/// `n` as the value variant for `ty`, if it fits.
fn int_in_range(n: i128, ty: ValueType) -> Option<Value> {
    let (min, max) = int_range(ty);
    if n < min || n > max {
        return None;
    }
    if ty.is_signed_int() {
        i64::try_from(n).ok().map(Value::Int)
    } else {
        u64::try_from(n).ok().map(Value::UInt)
    }
}

fn parse_text(text: &str, to: ValueType) -> Option<Value> {
    match to {
        to if is_int(to) => text.parse::<i128>().ok().and_then(|n| int_in_range(n, to)),
        ValueType::F32 => text
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| Value::Float(v.into())),
        ValueType::F64 => text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Value::Float),
        ValueType::Bool => match text.to_ascii_lowercase().as_str() {
            "1" | "true" => Some(Value::Bool(true)),
            "0" | "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ValueType::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(Value::Date),
        ValueType::Time => NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
            .ok()
            .map(Value::Time),
        ValueType::DateTime => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .map(Value::DateTime),
        _ => None,
    }
}
