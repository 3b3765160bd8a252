//! Argument unification: every call-time argument bundle is merged into one
//! [`UnitedArgs`] before the query is bound.

use crate::options::{Options, OptionsModifier};
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Arguments filed by name.
pub type NamedArgs = HashMap<String, Value>;

/// A single `name => value` argument. An empty name makes it positional.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArg {
    pub name: String,
    pub value: Value,
}

/// Creates a named argument.
///
/// ```
/// use sqlx_rowmap::{args, named};
///
/// let args = args![named("id", 42), named("name", "Alice")];
/// assert_eq!(args.len(), 2);
/// ```
pub fn named(name: impl Into<String>, value: impl Into<Value>) -> NamedArg {
    NamedArg {
        name: name.into(),
        value: value.into(),
    }
}

/// Positional and named arguments of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitedArgs {
    pub unnamed: Vec<Value>,
    pub named: NamedArgs,
}

impl UnitedArgs {
    pub fn is_empty(&self) -> bool {
        self.unnamed.is_empty() && self.named.is_empty()
    }

    pub fn has_unnamed(&self) -> bool {
        !self.unnamed.is_empty()
    }

    pub fn has_named(&self) -> bool {
        !self.named.is_empty()
    }

    fn push_named(&mut self, arg: NamedArg) {
        if arg.name.is_empty() {
            self.unnamed.push(arg.value);
        } else {
            self.named.insert(arg.name, arg.value);
        }
    }

    fn merge(&mut self, other: UnitedArgs) {
        self.unnamed.extend(other.unnamed);
        self.named.extend(other.named);
    }
}

/// One call-time argument.
#[derive(Clone)]
pub enum Arg {
    /// A positional value
    Value(Value),
    Named(NamedArg),
    /// Named values merged key by key
    Map(NamedArgs),
    /// A previously unified bundle
    United(UnitedArgs),
    /// An override of the connection's options for this call only
    Options(OptionsModifier),
}

impl Arg {
    /// Per-call options override.
    ///
    /// ```
    /// use sqlx_rowmap::{args, Arg};
    ///
    /// let args = args![1, Arg::options(|o| o.log_success = true)];
    /// assert_eq!(args.len(), 2);
    /// ```
    pub fn options<F>(modifier: F) -> Arg
    where
        F: Fn(&mut Options) + Send + Sync + 'static,
    {
        Arg::Options(Arc::new(modifier))
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Arg::Named(v) => f.debug_tuple("Named").field(v).finish(),
            Arg::Map(v) => f.debug_tuple("Map").field(v).finish(),
            Arg::United(v) => f.debug_tuple("United").field(v).finish(),
            Arg::Options(_) => f.write_str("Options(..)"),
        }
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Value(v)
    }
}

impl From<NamedArg> for Arg {
    fn from(v: NamedArg) -> Self {
        Arg::Named(v)
    }
}

impl From<UnitedArgs> for Arg {
    fn from(v: UnitedArgs) -> Self {
        Arg::United(v)
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Arg {
    fn from(map: HashMap<String, V>) -> Self {
        Arg::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<V: Into<Value>> From<HashMap<&str, V>> for Arg {
    fn from(map: HashMap<&str, V>) -> Self {
        Arg::Map(
            map.into_iter()
                .map(|(k, v)| (k.to_owned(), v.into()))
                .collect(),
        )
    }
}

macro_rules! impl_arg_from_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Arg {
                fn from(v: $t) -> Self {
                    Arg::Value(v.into())
                }
            }

            impl From<Option<$t>> for Arg {
                fn from(v: Option<$t>) -> Self {
                    Arg::Value(v.into())
                }
            }
        )*
    };
}

impl_arg_from_value!(
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
    &str,
    Vec<u8>,
    &[u8],
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
);

/// Builds a `Vec<Arg>` from anything convertible into [`Arg`].
///
/// ```
/// use sqlx_rowmap::{args, named, unite};
///
/// let (united, _) = unite(args![5, named("x", 1)]);
/// assert_eq!(united.unnamed.len(), 1);
/// assert_eq!(united.named.len(), 1);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Arg>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Arg::from($arg)),+]
    };
}

/// Merges arguments in order; on a name collision the later value wins.
///
/// All option overrides are composed into one that applies them in the order
/// they were supplied.
pub fn unite<I>(args: I) -> (UnitedArgs, Option<OptionsModifier>)
where
    I: IntoIterator<Item = Arg>,
{
    let mut target = UnitedArgs::default();
    let mut modifiers: Vec<OptionsModifier> = Vec::new();

    for arg in args {
        match arg {
            Arg::Value(v) => target.unnamed.push(v),
            Arg::Named(a) => target.push_named(a),
            Arg::Map(m) => target.named.extend(m),
            Arg::United(u) => target.merge(u),
            Arg::Options(m) => modifiers.push(m),
        }
    }

    let modifier: Option<OptionsModifier> = match modifiers.len() {
        0 => None,
        1 => modifiers.pop(),
        _ => Some(Arc::new(move |opts: &mut Options| {
            for m in &modifiers {
                m(opts);
            }
        })),
    };
    (target, modifier)
}
