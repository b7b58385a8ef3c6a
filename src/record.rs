//! # Records
//!
//! Values that cross the store boundary. A [`Record`] is a set of named fields,
//! each holding one [`Scalar`] from a small closed set of kinds, so the write
//! adapter's column mapping can be checked value by value.

use crate::error::AdapterError;
use crate::time::{NanoTime, Timestamped};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Scalar {
  /// Interned-style short string.
  Symbol(String),
  /// 64-bit float.
  Float(f64),
  /// 64-bit integer.
  Long(i64),
  /// 32-bit integer.
  Int(i32),
  /// Boolean.
  Bool(bool),
  /// Nanosecond timestamp.
  Timestamp(NanoTime),
}

/// Integers up to this magnitude have an exact `f64`.
const MAX_EXACT_FLOAT_INT: u64 = 1 << 53;

impl Scalar {
  /// Kind of the value.
  pub fn kind(&self) -> ColumnType {
    match self {
      Scalar::Symbol(_) => ColumnType::Symbol,
      Scalar::Float(_) => ColumnType::Float,
      Scalar::Long(_) => ColumnType::Long,
      Scalar::Int(_) => ColumnType::Int,
      Scalar::Bool(_) => ColumnType::Bool,
      Scalar::Timestamp(_) => ColumnType::Timestamp,
    }
  }

  /// Interprets the value as a time, for use as a time column.
  pub fn as_time(&self) -> Option<NanoTime> {
    match self {
      Scalar::Timestamp(t) => Some(*t),
      Scalar::Long(n) => u64::try_from(*n).ok().map(NanoTime::new),
      _ => None,
    }
  }

  fn as_f64(&self) -> Option<f64> {
    match self {
      Scalar::Float(x) => Some(*x),
      Scalar::Long(n) => Some(*n as f64),
      Scalar::Int(n) => Some(f64::from(*n)),
      _ => None,
    }
  }

  /// Converts the value to `kind`, allowing only lossless widenings
  /// (`int` to `long`, integers to `float`). A `long` converts to `float` only
  /// within ±2^53, where every integer has an exact `f64`.
  pub fn coerce(&self, kind: ColumnType) -> Result<Scalar, AdapterError> {
    let coerced = match (self, kind) {
      (value, kind) if value.kind() == kind => Some(value.clone()),
      (Scalar::Int(n), ColumnType::Long) => Some(Scalar::Long(i64::from(*n))),
      (Scalar::Int(n), ColumnType::Float) => Some(Scalar::Float(f64::from(*n))),
      (Scalar::Long(n), ColumnType::Float) if n.unsigned_abs() <= MAX_EXACT_FLOAT_INT => {
        Some(Scalar::Float(*n as f64))
      }
      _ => None,
    };
    coerced.ok_or_else(|| {
      AdapterError::Schema(format!("cannot store {} value {self} as {kind}", self.kind()))
    })
  }

  /// Equality across numeric kinds, used by store filters.
  pub fn loosely_eq(&self, other: &Scalar) -> bool {
    match (self.as_f64(), other.as_f64()) {
      (Some(a), Some(b)) => a == b,
      _ => self == other,
    }
  }
}

impl fmt::Display for Scalar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Scalar::Symbol(s) => write!(f, "`{s}"),
      Scalar::Float(x) => write!(f, "{x}"),
      Scalar::Long(n) => write!(f, "{n}"),
      Scalar::Int(n) => write!(f, "{n}i"),
      Scalar::Bool(b) => write!(f, "{b}"),
      Scalar::Timestamp(t) => write!(f, "{t}"),
    }
  }
}

impl From<&str> for Scalar {
  fn from(value: &str) -> Self {
    Scalar::Symbol(value.to_string())
  }
}

impl From<String> for Scalar {
  fn from(value: String) -> Self {
    Scalar::Symbol(value)
  }
}

impl From<f64> for Scalar {
  fn from(value: f64) -> Self {
    Scalar::Float(value)
  }
}

impl From<i64> for Scalar {
  fn from(value: i64) -> Self {
    Scalar::Long(value)
  }
}

impl From<i32> for Scalar {
  fn from(value: i32) -> Self {
    Scalar::Int(value)
  }
}

impl From<bool> for Scalar {
  fn from(value: bool) -> Self {
    Scalar::Bool(value)
  }
}

impl From<NanoTime> for Scalar {
  fn from(value: NanoTime) -> Self {
    Scalar::Timestamp(value)
  }
}

/// Target type of a stored column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
  /// See [`Scalar::Symbol`].
  Symbol,
  /// See [`Scalar::Float`].
  Float,
  /// See [`Scalar::Long`].
  Long,
  /// See [`Scalar::Int`].
  Int,
  /// See [`Scalar::Bool`].
  Bool,
  /// See [`Scalar::Timestamp`].
  Timestamp,
}

impl ColumnType {
  /// Lower-case name, as accepted by [`FromStr`].
  pub fn name(self) -> &'static str {
    match self {
      ColumnType::Symbol => "symbol",
      ColumnType::Float => "float",
      ColumnType::Long => "long",
      ColumnType::Int => "int",
      ColumnType::Bool => "bool",
      ColumnType::Timestamp => "timestamp",
    }
  }
}

impl fmt::Display for ColumnType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for ColumnType {
  type Err = AdapterError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "symbol" | "sym" => Ok(ColumnType::Symbol),
      "float" => Ok(ColumnType::Float),
      "long" => Ok(ColumnType::Long),
      "int" => Ok(ColumnType::Int),
      "bool" | "boolean" => Ok(ColumnType::Bool),
      "timestamp" => Ok(ColumnType::Timestamp),
      other => Err(AdapterError::Schema(format!("unknown column type {other:?}"))),
    }
  }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
  /// Field and column name.
  pub name: String,
  /// Stored type.
  pub kind: ColumnType,
}

impl ColumnSpec {
  /// Creates a column mapping.
  pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
    Self {
      name: name.into(),
      kind,
    }
  }

  /// Parses a `(name, type-name)` pair such as `("price", "float")`.
  pub fn parse(name: impl Into<String>, kind: &str) -> Result<Self, AdapterError> {
    Ok(Self::new(name, kind.parse()?))
  }
}

/// A row of named fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
  fields: BTreeMap<String, Scalar>,
}

impl Record {
  /// An empty record.
  pub fn new() -> Self {
    Self::default()
  }

  /// Builder-style field insertion.
  #[must_use]
  pub fn with(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
    self.insert(name, value);
    self
  }

  /// Sets a field, returning the previous value.
  pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Option<Scalar> {
    self.fields.insert(name.into(), value.into())
  }

  /// Reads a field.
  pub fn get(&self, name: &str) -> Option<&Scalar> {
    self.fields.get(name)
  }

  /// Removes a field.
  pub fn remove(&mut self, name: &str) -> Option<Scalar> {
    self.fields.remove(name)
  }

  /// Fields in name order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
    self.fields.iter().map(|(name, value)| (name.as_str(), value))
  }

  /// Number of fields.
  pub fn len(&self) -> usize {
    self.fields.len()
  }

  /// Whether the record has no fields.
  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for Record {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self {
      fields: iter
        .into_iter()
        .map(|(name, value)| (name.into(), value.into()))
        .collect(),
    }
  }
}

/// Values the write adapter can store.
pub trait AsRecord {
  /// The fields to map onto columns.
  fn as_record(&self) -> &Record;
}

impl AsRecord for Record {
  fn as_record(&self) -> &Record {
    self
  }
}

impl AsRecord for Timestamped<Record> {
  fn as_record(&self) -> &Record {
    &self.payload
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_column_type_names() {
    assert_eq!("symbol".parse::<ColumnType>().unwrap(), ColumnType::Symbol);
    assert_eq!("Float".parse::<ColumnType>().unwrap(), ColumnType::Float);
    assert!("decimal".parse::<ColumnType>().is_err());
  }

  #[test]
  fn coerces_only_lossless_widenings() {
    assert_eq!(Scalar::Int(3).coerce(ColumnType::Long).unwrap(), Scalar::Long(3));
    assert_eq!(Scalar::Long(3).coerce(ColumnType::Float).unwrap(), Scalar::Float(3.0));
    assert!(Scalar::Float(3.5).coerce(ColumnType::Long).is_err());
    assert!(Scalar::from("abc").coerce(ColumnType::Bool).is_err());
  }

  #[test]
  fn longs_beyond_float_precision_are_rejected() {
    let exact = 1i64 << 53;
    assert_eq!(
      Scalar::Long(-exact).coerce(ColumnType::Float).unwrap(),
      Scalar::Float(-(exact as f64))
    );
    assert!(matches!(
      Scalar::Long(exact + 1).coerce(ColumnType::Float),
      Err(AdapterError::Schema(_))
    ));
    assert!(Scalar::Long(i64::MIN).coerce(ColumnType::Float).is_err());
  }

  #[test]
  fn scalar_wire_format_is_tagged() {
    let json = serde_json::to_string(&Scalar::Long(7)).unwrap();
    assert_eq!(json, r#"{"type":"long","value":7}"#);
    let record = Record::new().with("sym", "AAPL").with("qty", 10i64);
    let back: Record = serde_json::from_str(&serde_json::to_string(&record).unwrap()).unwrap();
    assert_eq!(back, record);
  }
}
