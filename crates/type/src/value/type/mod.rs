// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Logical type tag of the values held by a block.
///
/// The block layer never interprets values; the tag only selects which
/// builder and accessor family carries them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
	/// A boolean, stored as one byte per position
	Boolean,
	/// A 1-byte signed integer
	Int1,
	/// A 2-byte signed integer
	Int2,
	/// A 4-byte signed integer
	Int4,
	/// An 8-byte signed integer
	Int8,
	/// An 8-byte floating point, stored by its bit pattern
	Float8,
	/// UTF-8 text of arbitrary length
	Utf8,
	/// Key/value entries per row
	Map {
		key: Box<Type>,
		value: Box<Type>,
	},
	/// Fixed list of typed fields per row
	Row(Vec<Type>),
}

impl Type {
	pub fn map(key: Type, value: Type) -> Self {
		Type::Map {
			key: Box::new(key),
			value: Box::new(value),
		}
	}

	pub fn row(fields: impl IntoIterator<Item = Type>) -> Self {
		Type::Row(fields.into_iter().collect())
	}

	/// Width in bytes of one value, for fixed-width types.
	pub fn fixed_size(&self) -> Option<usize> {
		match self {
			Type::Boolean | Type::Int1 => Some(1),
			Type::Int2 => Some(2),
			Type::Int4 => Some(4),
			Type::Int8 | Type::Float8 => Some(8),
			Type::Utf8 | Type::Map { .. } | Type::Row(_) => None,
		}
	}

	pub fn is_nested(&self) -> bool {
		matches!(self, Type::Map { .. } | Type::Row(_))
	}
}

impl Display for Type {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Type::Boolean => f.write_str("BOOLEAN"),
			Type::Int1 => f.write_str("INT1"),
			Type::Int2 => f.write_str("INT2"),
			Type::Int4 => f.write_str("INT4"),
			Type::Int8 => f.write_str("INT8"),
			Type::Float8 => f.write_str("FLOAT8"),
			Type::Utf8 => f.write_str("UTF8"),
			Type::Map {
				key,
				value,
			} => write!(f, "MAP({}, {})", key, value),
			Type::Row(fields) => {
				f.write_str("ROW(")?;
				for (i, field) in fields.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}", field)?;
				}
				f.write_str(")")
			}
		}
	}
}
