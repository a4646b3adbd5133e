//! Loggable value model.
//!
//! Arguments and results are converted into a closed `LogValue` tree before
//! they reach the sanitizer, so traversal never needs runtime type inspection.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Closed set of variants the sanitizer knows how to visit.
#[derive(Debug, Clone)]
pub enum LogValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<LogValue>),
    /// Free-form mapping; no rules apply to its keys.
    Map(Vec<(String, LogValue)>),
    /// Instance of a declared data shape; rules are looked up by `name`.
    Shape {
        name: String,
        fields: Vec<(String, LogValue)>,
    },
    /// Binary buffer, stream handle or anything else that must not be
    /// serialized; only its kind and size are kept.
    Opaque { kind: &'static str, len: usize },
    /// Node reachable through shared ownership; may form a cycle.
    Shared(Arc<Mutex<LogValue>>),
    /// Output of a masking rule, never masked again.
    Masked(String),
}

impl LogValue {
    pub fn opaque(kind: &'static str, len: usize) -> Self {
        LogValue::Opaque { kind, len }
    }

    pub fn shared(value: LogValue) -> Self {
        LogValue::Shared(Arc::new(Mutex::new(value)))
    }

    /// Text of a `Str` or `Masked` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LogValue::Str(s) | LogValue::Masked(s) => Some(s),
            _ => None,
        }
    }

    /// Field or entry `key` of a `Shape` or `Map`.
    pub fn get(&self, key: &str) -> Option<&LogValue> {
        match self {
            LogValue::Map(entries) | LogValue::Shape { fields: entries, .. } => {
                entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// JSON rendering, as it appears in emitted records.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl PartialEq for LogValue {
    fn eq(&self, other: &Self) -> bool {
        use LogValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Str(a), Str(b)) | (Masked(a), Masked(b)) => a == b,
            (Seq(a), Seq(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (Shape { name: na, fields: fa }, Shape { name: nb, fields: fb }) => {
                na == nb && fa == fb
            }
            (Opaque { kind: ka, len: la }, Opaque { kind: kb, len: lb }) => ka == kb && la == lb,
            (Shared(a), Shared(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for LogValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => f.write_str("null"),
        }
    }
}

impl Serialize for LogValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LogValue::Null => serializer.serialize_unit(),
            LogValue::Bool(b) => serializer.serialize_bool(*b),
            LogValue::Int(i) => serializer.serialize_i64(*i),
            LogValue::Float(x) => serializer.serialize_f64(*x),
            LogValue::Str(s) | LogValue::Masked(s) => serializer.serialize_str(s),
            LogValue::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            LogValue::Map(entries) | LogValue::Shape { fields: entries, .. } => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            LogValue::Opaque { kind, len } => {
                serializer.serialize_str(&opaque_placeholder(kind, *len))
            }
            // Shared nodes may be cyclic; only the sanitizer resolves them.
            LogValue::Shared(_) => serializer.serialize_str("[Shared]"),
        }
    }
}

pub(crate) fn opaque_placeholder(kind: &str, len: usize) -> String {
    format!("[Opaque {kind}: {len} bytes]")
}

/// Conversion of domain values into the loggable model.
pub trait Loggable {
    fn to_log_value(&self) -> LogValue;
}

/// Declare a struct as a named data shape whose fields can carry sanitize rules.
///
/// ```
/// use tenant_pipeline::loggable_shape;
///
/// struct Login {
///     username: String,
///     password: String,
/// }
///
/// loggable_shape!(Login { username, password });
/// ```
#[macro_export]
macro_rules! loggable_shape {
    ($ty:ident { $($field:ident),* $(,)? }) => {
        impl $crate::observability::value::Loggable for $ty {
            fn to_log_value(&self) -> $crate::observability::value::LogValue {
                $crate::observability::value::LogValue::Shape {
                    name: stringify!($ty).to_string(),
                    fields: vec![
                        $((
                            stringify!($field).to_string(),
                            $crate::observability::value::Loggable::to_log_value(&self.$field),
                        )),*
                    ],
                }
            }
        }
    };
}

/// Borrowed byte buffer logged by size only.
pub struct Binary<'a>(pub &'a [u8]);

impl Loggable for Binary<'_> {
    fn to_log_value(&self) -> LogValue {
        LogValue::opaque("binary", self.0.len())
    }
}

impl Loggable for LogValue {
    fn to_log_value(&self) -> LogValue {
        self.clone()
    }
}

impl Loggable for () {
    fn to_log_value(&self) -> LogValue {
        LogValue::Null
    }
}

impl Loggable for bool {
    fn to_log_value(&self) -> LogValue {
        LogValue::Bool(*self)
    }
}

impl Loggable for str {
    fn to_log_value(&self) -> LogValue {
        LogValue::Str(self.to_string())
    }
}

impl Loggable for String {
    fn to_log_value(&self) -> LogValue {
        LogValue::Str(self.clone())
    }
}

macro_rules! loggable_int {
    ($($ty:ty),*) => {
        $(impl Loggable for $ty {
            fn to_log_value(&self) -> LogValue {
                LogValue::Int(i64::from(*self))
            }
        })*
    };
}

loggable_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! loggable_wide_int {
    ($($ty:ty),*) => {
        $(impl Loggable for $ty {
            fn to_log_value(&self) -> LogValue {
                i64::try_from(*self).map_or_else(|_| LogValue::Str(self.to_string()), LogValue::Int)
            }
        })*
    };
}

loggable_wide_int!(u64, usize, i128, u128);

impl Loggable for f32 {
    fn to_log_value(&self) -> LogValue {
        LogValue::Float(f64::from(*self))
    }
}

impl Loggable for f64 {
    fn to_log_value(&self) -> LogValue {
        LogValue::Float(*self)
    }
}

impl<T: Loggable + ?Sized> Loggable for &T {
    fn to_log_value(&self) -> LogValue {
        (**self).to_log_value()
    }
}

impl<T: Loggable + ?Sized> Loggable for Box<T> {
    fn to_log_value(&self) -> LogValue {
        (**self).to_log_value()
    }
}

impl<T: Loggable + ?Sized> Loggable for Arc<T> {
    fn to_log_value(&self) -> LogValue {
        (**self).to_log_value()
    }
}

impl<T: Loggable> Loggable for Option<T> {
    fn to_log_value(&self) -> LogValue {
        match self {
            Some(value) => value.to_log_value(),
            None => LogValue::Null,
        }
    }
}

impl<T: Loggable> Loggable for [T] {
    fn to_log_value(&self) -> LogValue {
        LogValue::Seq(self.iter().map(Loggable::to_log_value).collect())
    }
}

impl<T: Loggable> Loggable for Vec<T> {
    fn to_log_value(&self) -> LogValue {
        self.as_slice().to_log_value()
    }
}

impl<T: Loggable> Loggable for BTreeMap<String, T> {
    fn to_log_value(&self) -> LogValue {
        LogValue::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_log_value()))
                .collect(),
        )
    }
}

impl<T: Loggable, S> Loggable for HashMap<String, T, S> {
    fn to_log_value(&self) -> LogValue {
        let mut entries: Vec<(String, LogValue)> = self
            .iter()
            .map(|(k, v)| (k.clone(), v.to_log_value()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        LogValue::Map(entries)
    }
}

impl Loggable for serde_json::Value {
    fn to_log_value(&self) -> LogValue {
        use serde_json::Value;
        match self {
            Value::Null => LogValue::Null,
            Value::Bool(b) => LogValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => LogValue::Int(i),
                None => n
                    .as_f64()
                    .map_or_else(|| LogValue::Str(n.to_string()), LogValue::Float),
            },
            Value::String(s) => LogValue::Str(s.clone()),
            Value::Array(items) => LogValue::Seq(items.iter().map(Loggable::to_log_value).collect()),
            Value::Object(map) => LogValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_log_value()))
                    .collect(),
            ),
        }
    }
}

macro_rules! loggable_tuple {
    ($($name:ident),+) => {
        impl<$($name: Loggable),+> Loggable for ($($name,)+) {
            #[allow(non_snake_case)]
            fn to_log_value(&self) -> LogValue {
                let ($($name,)+) = self;
                LogValue::Seq(vec![$($name.to_log_value()),+])
            }
        }
    };
}

loggable_tuple!(A);
loggable_tuple!(A, B);
loggable_tuple!(A, B, C);
loggable_tuple!(A, B, C, D);
