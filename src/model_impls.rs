//! Field value trait implementations for standard and `chrono` types.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

use crate::codec::{CodecContext, CodecError, TimeFormat};
use crate::model::{Attribute, IdKind, Identifier, ValueKind};

/// Wire format of `iso8601` timestamps.
const ISO8601_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

// --- IDENTIFIERS ---

impl Identifier for String {
    const KIND: IdKind = IdKind::String;

    fn to_id(&self) -> Option<String> {
        (!self.is_empty()).then(|| self.clone())
    }

    fn from_id(id: &str) -> Option<Self> {
        Some(id.to_owned())
    }
}

macro_rules! impl_integer_identifier {
    ($kind:expr => $($t:ty),*) => {
        $(
            impl Identifier for $t {
                const KIND: IdKind = $kind;

                fn to_id(&self) -> Option<String> {
                    Some(self.to_string())
                }

                fn from_id(id: &str) -> Option<Self> {
                    id.parse().ok()
                }
            }
        )*
    }
}

impl_integer_identifier!(IdKind::Signed => i8, i16, i32, i64, isize);
impl_integer_identifier!(IdKind::Unsigned => u8, u16, u32, u64, usize);

macro_rules! impl_float_identifier {
    ($($t:ty),*) => {
        $(
            // Rejected with `BadPrimaryKeyType` when the layout is extracted.
            impl Identifier for $t {
                const KIND: IdKind = IdKind::Float;

                fn to_id(&self) -> Option<String> {
                    None
                }

                fn from_id(_id: &str) -> Option<Self> {
                    None
                }
            }
        )*
    }
}

impl_float_identifier!(f32, f64);

impl<T: Identifier> Identifier for Option<T> {
    const KIND: IdKind = T::KIND;
    const NULLABLE: bool = true;

    fn to_id(&self) -> Option<String> {
        self.as_ref().and_then(Identifier::to_id)
    }

    fn from_id(id: &str) -> Option<Self> {
        T::from_id(id).map(Some)
    }
}

// --- SCALAR ATTRIBUTES ---

impl Attribute for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn is_empty(&self) -> bool {
        !*self
    }

    fn encode(&self, _cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        Ok(Value::Bool(*self))
    }

    fn decode(value: &Value, _cx: &CodecContext<'_>) -> Result<Self, CodecError> {
        value
            .as_bool()
            .ok_or_else(|| CodecError::mismatch("a boolean", value))
    }
}

impl Attribute for String {
    const KIND: ValueKind = ValueKind::String;

    fn is_empty(&self) -> bool {
        String::is_empty(self)
    }

    fn encode(&self, _cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        Ok(Value::String(self.clone()))
    }

    fn decode(value: &Value, _cx: &CodecContext<'_>) -> Result<Self, CodecError> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| CodecError::mismatch("a string", value))
    }
}

/// Reads a JSON number as `i64`, accepting integral floats.
fn signed(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

/// Reads a JSON number as `u64`, accepting integral floats.
fn unsigned(value: &Value) -> Option<u64> {
    let Value::Number(number) = value else {
        return None;
    };
    number.as_u64().or_else(|| {
        number
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f < u64::MAX as f64)
            .map(|f| f as u64)
    })
}

macro_rules! impl_integer_attribute {
    ($kind:expr, $read:ident, $wide:ty => $($t:ty),*) => {
        $(
            impl Attribute for $t {
                const KIND: ValueKind = $kind;

                fn is_empty(&self) -> bool {
                    *self == 0
                }

                fn encode(&self, _cx: &CodecContext<'_>) -> Result<Value, CodecError> {
                    Ok(Value::from(<$wide>::try_from(*self).map_err(CodecError::custom)?))
                }

                fn decode(value: &Value, _cx: &CodecContext<'_>) -> Result<Self, CodecError> {
                    $read(value)
                        .and_then(|wide| <$t>::try_from(wide).ok())
                        .ok_or_else(|| CodecError::mismatch(stringify!($t), value))
                }
            }
        )*
    }
}

impl_integer_attribute!(ValueKind::Signed, signed, i64 => i8, i16, i32, i64, isize);
impl_integer_attribute!(ValueKind::Unsigned, unsigned, u64 => u8, u16, u32, u64, usize);

impl Attribute for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn is_empty(&self) -> bool {
        *self == 0.0
    }

    fn encode(&self, _cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        Number::from_f64(*self)
            .map(Value::Number)
            .ok_or_else(|| CodecError::custom(format_args!("{self} is not a finite number")))
    }

    fn decode(value: &Value, _cx: &CodecContext<'_>) -> Result<Self, CodecError> {
        value
            .as_f64()
            .ok_or_else(|| CodecError::mismatch("f64", value))
    }
}

// Widened to f64 on the way out; narrowing the same f64 back is exact.
impl Attribute for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn is_empty(&self) -> bool {
        *self == 0.0
    }

    fn encode(&self, cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        f64::from(*self).encode(cx)
    }

    fn decode(value: &Value, _cx: &CodecContext<'_>) -> Result<Self, CodecError> {
        value
            .as_f64()
            .filter(|f| f.abs() <= f64::from(f32::MAX))
            .map(|f| f as f32)
            .ok_or_else(|| CodecError::mismatch("f32", value))
    }
}

impl Attribute for Value {
    const KIND: ValueKind = ValueKind::Json;

    fn is_empty(&self) -> bool {
        self.is_null()
    }

    fn encode(&self, _cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        Ok(self.clone())
    }

    fn decode(value: &Value, _cx: &CodecContext<'_>) -> Result<Self, CodecError> {
        Ok(value.clone())
    }
}

// --- TIMESTAMPS ---

/// The zero timestamp is `DateTime::<Utc>::default()`, the Unix epoch.
impl Attribute for DateTime<Utc> {
    const KIND: ValueKind = ValueKind::Time;

    fn is_empty(&self) -> bool {
        self.is_zero_time()
    }

    fn is_zero_time(&self) -> bool {
        *self == DateTime::<Utc>::default()
    }

    fn encode(&self, cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        Ok(match cx.time_format() {
            TimeFormat::Unix => Value::from(self.timestamp()),
            TimeFormat::Iso8601 => Value::String(self.format(ISO8601_FORMAT).to_string()),
            TimeFormat::Rfc3339 => Value::String(self.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        })
    }

    fn decode(value: &Value, cx: &CodecContext<'_>) -> Result<Self, CodecError> {
        match cx.time_format() {
            TimeFormat::Unix => {
                let Value::Number(number) = value else {
                    return Err(CodecError::InvalidTime(format!(
                        "expected seconds since the epoch, found {}",
                        crate::codec::describe(value)
                    )));
                };
                let parts = match number.as_i64() {
                    Some(seconds) => Some((seconds, 0)),
                    None => number.as_f64().and_then(split_seconds),
                };
                parts
                    .and_then(|(seconds, nanos)| DateTime::from_timestamp(seconds, nanos))
                    .ok_or_else(|| {
                        CodecError::InvalidTime(format!("{number} is out of the representable range"))
                    })
            }
            TimeFormat::Iso8601 => {
                let text = time_text(value)?;
                NaiveDateTime::parse_from_str(text, ISO8601_FORMAT)
                    .map(|naive| naive.and_utc())
                    .map_err(|e| CodecError::InvalidTime(format!("{text:?} is not ISO 8601: {e}")))
            }
            TimeFormat::Rfc3339 => {
                let text = time_text(value)?;
                DateTime::parse_from_rfc3339(text)
                    .map(|parsed| parsed.with_timezone(&Utc))
                    .map_err(|e| CodecError::InvalidTime(format!("{text:?} is not RFC 3339: {e}")))
            }
        }
    }
}

/// Splits fractional epoch seconds into whole seconds and nanoseconds.
fn split_seconds(seconds: f64) -> Option<(i64, u32)> {
    let whole = seconds.floor();
    if !whole.is_finite() || whole < i64::MIN as f64 || whole >= i64::MAX as f64 {
        return None;
    }
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    Some((whole as i64, nanos))
}

fn time_text(value: &Value) -> Result<&str, CodecError> {
    value.as_str().ok_or_else(|| {
        CodecError::InvalidTime(format!(
            "expected a timestamp string, found {}",
            crate::codec::describe(value)
        ))
    })
}

// --- WRAPPERS & COLLECTIONS ---

impl<T: Attribute> Attribute for Option<T> {
    const KIND: ValueKind = T::KIND;
    const NULLABLE: bool = true;

    fn is_empty(&self) -> bool {
        self.is_none()
    }

    fn is_zero_time(&self) -> bool {
        self.as_ref().is_some_and(Attribute::is_zero_time)
    }

    fn encode(&self, cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        match self {
            Some(value) => cx.encode(value),
            None => Ok(Value::Null),
        }
    }

    fn decode(value: &Value, cx: &CodecContext<'_>) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(None),
            other => cx.decode(other).map(Some),
        }
    }
}

impl<T: Attribute> Attribute for Vec<T> {
    const KIND: ValueKind = ValueKind::Sequence;

    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }

    fn encode(&self, cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        self.iter()
            .map(|item| cx.encode(item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    fn decode(value: &Value, cx: &CodecContext<'_>) -> Result<Self, CodecError> {
        value
            .as_array()
            .ok_or_else(|| CodecError::mismatch("an array", value))?
            .iter()
            .map(|item| cx.decode(item))
            .collect()
    }
}

fn encode_entries<'v, T: Attribute>(
    entries: impl Iterator<Item = (&'v String, &'v T)>,
    cx: &CodecContext<'_>,
) -> Result<Value, CodecError> {
    let mut object = Map::new();
    for (key, item) in entries {
        object.insert(key.clone(), cx.encode(item)?);
    }
    Ok(Value::Object(object))
}

fn decode_entries<T: Attribute, C: FromIterator<(String, T)>>(
    value: &Value,
    cx: &CodecContext<'_>,
) -> Result<C, CodecError> {
    value
        .as_object()
        .ok_or_else(|| CodecError::mismatch("an object", value))?
        .iter()
        .map(|(key, item)| cx.decode(item).map(|decoded| (key.clone(), decoded)))
        .collect()
}

impl<T: Attribute> Attribute for BTreeMap<String, T> {
    const KIND: ValueKind = ValueKind::Map;

    fn is_empty(&self) -> bool {
        BTreeMap::is_empty(self)
    }

    fn encode(&self, cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        encode_entries(self.iter(), cx)
    }

    fn decode(value: &Value, cx: &CodecContext<'_>) -> Result<Self, CodecError> {
        decode_entries(value, cx)
    }
}

impl<T: Attribute> Attribute for HashMap<String, T> {
    const KIND: ValueKind = ValueKind::Map;

    fn is_empty(&self) -> bool {
        HashMap::is_empty(self)
    }

    fn encode(&self, cx: &CodecContext<'_>) -> Result<Value, CodecError> {
        encode_entries(self.iter(), cx)
    }

    fn decode(value: &Value, cx: &CodecContext<'_>) -> Result<Self, CodecError> {
        decode_entries(value, cx)
    }
}
