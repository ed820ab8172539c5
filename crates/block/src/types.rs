// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Bridges logical [`Type`]s and [`Value`]s to blocks and builders.
//!
//! `Boolean` and `Int1` ride on byte blocks, `Float8` on long blocks by its
//! bit pattern, `Utf8` on variable-width blocks.

use tessera_type::{Result, Type, Value, invalid_argument, unsupported};

use crate::{
	Block, BlockBuilder, BlockBuilderStatus, BlockRef, ByteArrayBlockBuilder, IntArrayBlockBuilder, LongArrayBlockBuilder,
	MapBlockBuilder, RowBlockBuilder, ShortArrayBlockBuilder, SingleMapBlock, VariableWidthBlockBuilder,
};

/// Empty builder for values of `ty`. Nested builders share `status` with
/// their children.
pub fn create_block_builder(
	ty: &Type,
	status: Option<BlockBuilderStatus>,
	expected_entries: usize,
) -> Result<Box<dyn BlockBuilder>> {
	let builder: Box<dyn BlockBuilder> = match ty {
		Type::Boolean | Type::Int1 => Box::new(ByteArrayBlockBuilder::new(status, expected_entries)),
		Type::Int2 => Box::new(ShortArrayBlockBuilder::new(status, expected_entries)),
		Type::Int4 => Box::new(IntArrayBlockBuilder::new(status, expected_entries)),
		Type::Int8 | Type::Float8 => Box::new(LongArrayBlockBuilder::new(status, expected_entries)),
		Type::Utf8 => Box::new(VariableWidthBlockBuilder::with_expected_entries(status, expected_entries)),
		Type::Map {
			key,
			value,
		} => {
			let key_builder = create_block_builder(key, status.clone(), expected_entries)?;
			let value_builder = create_block_builder(value, status.clone(), expected_entries)?;
			Box::new(MapBlockBuilder::new(key_builder, value_builder, status, expected_entries))
		}
		Type::Row(fields) => {
			let field_builders = fields
				.iter()
				.map(|field| create_block_builder(field, status.clone(), expected_entries))
				.collect::<Result<Vec<_>>>()?;
			Box::new(RowBlockBuilder::new(field_builders, status, expected_entries)?)
		}
	};
	Ok(builder)
}

/// Copies position `position` of `block` into `builder`.
pub fn append_to(block: &dyn Block, position: usize, builder: &mut dyn BlockBuilder) -> Result<()> {
	block.write_position_to(position, builder)
}

/// Appends `value` as one position of type `ty`.
pub fn write_value(ty: &Type, builder: &mut dyn BlockBuilder, value: &Value) -> Result<()> {
	match (ty, value) {
		(_, Value::Undefined) => builder.push_null(),
		(Type::Boolean, Value::Boolean(v)) => {
			builder.write_byte(i8::from(*v))?;
			builder.close_entry()
		}
		(Type::Int1, Value::Int1(v)) => {
			builder.write_byte(*v)?;
			builder.close_entry()
		}
		(Type::Int2, Value::Int2(v)) => {
			builder.write_short(*v)?;
			builder.close_entry()
		}
		(Type::Int4, Value::Int4(v)) => {
			builder.write_int(*v)?;
			builder.close_entry()
		}
		(Type::Int8, Value::Int8(v)) => {
			builder.write_long(*v)?;
			builder.close_entry()
		}
		(Type::Float8, Value::Float8(v)) => {
			builder.write_long(v.to_bits() as i64)?;
			builder.close_entry()
		}
		(Type::Utf8, Value::Utf8(v)) => {
			builder.write_bytes(v.as_bytes())?;
			builder.close_entry()
		}
		(
			Type::Map {
				key: key_type,
				value: value_type,
			},
			Value::Map(entries),
		) => {
			if entries.iter().any(|(key, _)| key.is_undefined()) {
				return Err(invalid_argument!("map key cannot be null"));
			}
			builder.begin_entry()?;
			for (key, value) in entries {
				write_value(key_type, builder.entry_builder(0)?, key)?;
				write_value(value_type, builder.entry_builder(1)?, value)?;
			}
			builder.close_entry()
		}
		(Type::Row(fields), Value::Row(values)) => {
			if fields.len() != values.len() {
				return Err(invalid_argument!("row of {} fields given {} values", fields.len(), values.len()));
			}
			builder.begin_entry()?;
			for (index, (field, value)) in fields.iter().zip(values).enumerate() {
				write_value(field, builder.entry_builder(index)?, value)?;
			}
			builder.close_entry()
		}
		(ty, value) => Err(invalid_argument!("value {} is not of type {}", value, ty)),
	}
}

/// Reads position `position` of `block` as a value of type `ty`.
pub fn read_value(ty: &Type, block: &dyn Block, position: usize) -> Result<Value> {
	if block.is_null(position)? {
		return Ok(Value::Undefined);
	}
	let value = match ty {
		Type::Boolean => Value::Boolean(block.get_byte(position)? != 0),
		Type::Int1 => Value::Int1(block.get_byte(position)?),
		Type::Int2 => Value::Int2(block.get_short(position)?),
		Type::Int4 => Value::Int4(block.get_int(position)?),
		Type::Int8 => Value::Int8(block.get_long(position)?),
		Type::Float8 => Value::Float8(f64::from_bits(block.get_long(position)? as u64)),
		Type::Utf8 => {
			let bytes = block.get_slice(position)?;
			let text = std::str::from_utf8(bytes)
				.map_err(|_| invalid_argument!("position {} does not hold valid utf-8", position))?;
			Value::Utf8(text.to_string())
		}
		Type::Map {
			key,
			value,
		} => {
			let entries = block.get_block(position)?;
			let mut map = Vec::with_capacity(entries.position_count() / 2);
			for entry in (0..entries.position_count()).step_by(2) {
				map.push((read_value(key, entries.as_ref(), entry)?, read_value(value, entries.as_ref(), entry + 1)?));
			}
			Value::Map(map)
		}
		Type::Row(fields) => {
			let row = block.get_block(position)?;
			if row.position_count() != fields.len() {
				return Err(invalid_argument!(
					"row has {} fields but type has {}",
					row.position_count(),
					fields.len()
				));
			}
			let values = fields
				.iter()
				.enumerate()
				.map(|(index, field)| read_value(field, row.as_ref(), index))
				.collect::<Result<Vec<_>>>()?;
			Value::Row(values)
		}
	};
	Ok(value)
}

/// Builds a block of type `ty` holding `values` in order.
pub fn block_from_values(ty: &Type, values: &[Value]) -> Result<BlockRef> {
	let mut builder = create_block_builder(ty, None, values.len())?;
	for value in values {
		write_value(ty, builder.as_mut(), value)?;
	}
	builder.build()
}

/// Every position of `block` as a value of type `ty`.
pub fn block_values(ty: &Type, block: &dyn Block) -> Result<Vec<Value>> {
	(0..block.position_count()).map(|position| read_value(ty, block, position)).collect()
}

/// Looks up `key` in the map at `position` through the map's hash tables.
///
/// `None` when the map row is null or has no such key.
pub fn seek_map_value(ty: &Type, block: &dyn Block, position: usize, key: &Value) -> Result<Option<Value>> {
	let Type::Map {
		key: key_type,
		value: value_type,
	} = ty
	else {
		return Err(invalid_argument!("{} is not a map type", ty));
	};
	if block.is_null(position)? || key.is_undefined() {
		return Ok(None);
	}

	let entries = block.get_block(position)?;
	let single = entries
		.as_any()
		.downcast_ref::<SingleMapBlock>()
		.ok_or_else(|| unsupported!("{} entries do not support key lookup", entries.encoding_name()))?;
	let key_block: BlockRef = block_from_values(key_type, std::slice::from_ref(key))?;
	match single.seek_key(key_block.as_ref(), 0)? {
		Some(value_position) => Ok(Some(read_value(value_type, single, value_position)?)),
		None => Ok(None),
	}
}
