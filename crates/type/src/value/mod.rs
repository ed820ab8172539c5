// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

mod r#type;

pub use r#type::Type;

/// A single positional value, represented as a native Rust type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
	/// Value is not defined (null)
	Undefined,
	/// A boolean: true or false.
	Boolean(bool),
	/// A 1-byte signed integer
	Int1(i8),
	/// A 2-byte signed integer
	Int2(i16),
	/// A 4-byte signed integer
	Int4(i32),
	/// An 8-byte signed integer
	Int8(i64),
	/// An 8-byte floating point
	Float8(f64),
	/// A UTF-8 encoded text
	Utf8(String),
	/// Ordered key/value entries
	Map(Vec<(Value, Value)>),
	/// Field values of one row
	Row(Vec<Value>),
}

impl Value {
	pub fn undefined() -> Self {
		Value::Undefined
	}

	pub fn bool(v: impl Into<bool>) -> Self {
		Value::Boolean(v.into())
	}

	pub fn int1(v: impl Into<i8>) -> Self {
		Value::Int1(v.into())
	}

	pub fn int2(v: impl Into<i16>) -> Self {
		Value::Int2(v.into())
	}

	pub fn int4(v: impl Into<i32>) -> Self {
		Value::Int4(v.into())
	}

	pub fn int8(v: impl Into<i64>) -> Self {
		Value::Int8(v.into())
	}

	pub fn float8(v: impl Into<f64>) -> Self {
		Value::Float8(v.into())
	}

	pub fn utf8(v: impl Into<String>) -> Self {
		Value::Utf8(v.into())
	}

	pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
		Value::Map(entries.into_iter().collect())
	}

	pub fn row(fields: impl IntoIterator<Item = Value>) -> Self {
		Value::Row(fields.into_iter().collect())
	}

	pub fn is_undefined(&self) -> bool {
		matches!(self, Value::Undefined)
	}

	/// Whether this value can be stored in a block of type `ty`.
	pub fn is_compatible_with(&self, ty: &Type) -> bool {
		match (self, ty) {
			(Value::Undefined, _) => true,
			(Value::Boolean(_), Type::Boolean)
			| (Value::Int1(_), Type::Int1)
			| (Value::Int2(_), Type::Int2)
			| (Value::Int4(_), Type::Int4)
			| (Value::Int8(_), Type::Int8)
			| (Value::Float8(_), Type::Float8)
			| (Value::Utf8(_), Type::Utf8) => true,
			(
				Value::Map(entries),
				Type::Map {
					key,
					value,
				},
			) => entries.iter().all(|(k, v)| !k.is_undefined() && k.is_compatible_with(key) && v.is_compatible_with(value)),
			(Value::Row(values), Type::Row(fields)) => {
				values.len() == fields.len() && values.iter().zip(fields).all(|(v, f)| v.is_compatible_with(f))
			}
			_ => false,
		}
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Undefined => f.write_str("undefined"),
			Value::Boolean(v) => write!(f, "{}", v),
			Value::Int1(v) => write!(f, "{}", v),
			Value::Int2(v) => write!(f, "{}", v),
			Value::Int4(v) => write!(f, "{}", v),
			Value::Int8(v) => write!(f, "{}", v),
			Value::Float8(v) => write!(f, "{}", v),
			Value::Utf8(v) => write!(f, "\"{}\"", v),
			Value::Map(entries) => {
				f.write_str("{")?;
				for (i, (k, v)) in entries.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}: {}", k, v)?;
				}
				f.write_str("}")
			}
			Value::Row(fields) => {
				f.write_str("(")?;
				for (i, v) in fields.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}", v)?;
				}
				f.write_str(")")
			}
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Boolean(v)
	}
}

impl From<i8> for Value {
	fn from(v: i8) -> Self {
		Value::Int1(v)
	}
}

impl From<i16> for Value {
	fn from(v: i16) -> Self {
		Value::Int2(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Int4(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int8(v)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Float8(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Utf8(v.to_string())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::Utf8(v)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(v: Option<T>) -> Self {
		match v {
			Some(v) => v.into(),
			None => Value::Undefined,
		}
	}
}
