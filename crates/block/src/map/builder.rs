// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{any::Any, sync::Arc};

use bytes::{Buf, Bytes, BytesMut};
use tessera_type::{
	DecodeError, Result, corrupt, invalid_argument,
	util::{BitVec, CowVec},
};
use tracing::trace;

use super::{EMPTY_SLOT, HASH_MULTIPLIER, HashTables, MapBlock, build_hash_table};
use crate::{
	Block, BlockBuilder, BlockBuilderStatus, BlockRef, RunLengthEncodedBlock,
	size::{SIZE_OF_INT, SIZE_OF_OFFSET_AND_NULL, instance_size},
	util::{calculate_block_reset_size, check_valid_position},
};

/// Builder for [`MapBlock`].
///
/// An entry is opened with `begin_entry`, filled through `entry_builder(0)`
/// for keys and `entry_builder(1)` for values, and finished with
/// `close_entry`, which requires as many keys as values.
#[derive(Debug)]
pub struct MapBlockBuilder {
	status: Option<BlockBuilderStatus>,
	key_builder: Box<dyn BlockBuilder>,
	value_builder: Box<dyn BlockBuilder>,
	position_count: usize,
	has_null_value: bool,
	has_non_null_value: bool,
	map_is_null: BitVec,
	offsets: Vec<usize>,
	current_entry_opened: bool,
}

impl MapBlockBuilder {
	pub fn new(
		key_builder: Box<dyn BlockBuilder>,
		value_builder: Box<dyn BlockBuilder>,
		status: Option<BlockBuilderStatus>,
		expected_entries: usize,
	) -> Self {
		let mut offsets = Vec::with_capacity(expected_entries + 1);
		offsets.push(0);
		Self {
			status,
			key_builder,
			value_builder,
			position_count: 0,
			has_null_value: false,
			has_non_null_value: false,
			map_is_null: BitVec::with_capacity(expected_entries),
			offsets,
			current_entry_opened: false,
		}
	}

	pub fn key_builder(&self) -> &dyn BlockBuilder {
		self.key_builder.as_ref()
	}

	pub fn value_builder(&self) -> &dyn BlockBuilder {
		self.value_builder.as_ref()
	}

	/// Closes the open entry after checking that none of its keys repeat.
	pub fn close_entry_strict(&mut self) -> Result<()> {
		self.check_entry_opened()?;
		self.check_entry_sizes()?;
		let key_offset = self.offsets[self.position_count];
		let key_count = self.key_builder.position_count() - key_offset;
		let mut table = vec![EMPTY_SLOT; key_count * HASH_MULTIPLIER];
		let keys: &dyn Block = self.key_builder.as_ref();
		build_hash_table(keys, key_offset, key_count, &mut table, true)?;
		self.entry_added(false);
		Ok(())
	}

	fn check_entry_opened(&self) -> Result<()> {
		if !self.current_entry_opened {
			return Err(invalid_argument!("Expected entry to be opened but was closed"));
		}
		Ok(())
	}

	fn check_entry_sizes(&self) -> Result<()> {
		if self.key_builder.position_count() != self.value_builder.position_count() {
			return Err(invalid_argument!(
				"Map key and value builders have different sizes: {} {}",
				self.key_builder.position_count(),
				self.value_builder.position_count()
			));
		}
		Ok(())
	}

	fn entry_added(&mut self, is_null: bool) {
		self.current_entry_opened = false;
		self.offsets.push(self.key_builder.position_count());
		self.map_is_null.push(is_null);
		self.position_count += 1;
		if is_null {
			self.has_null_value = true;
		} else {
			self.has_non_null_value = true;
		}
		if let Some(status) = &self.status {
			status.add_bytes(SIZE_OF_OFFSET_AND_NULL);
		}
	}

	fn entry_count(&self) -> usize {
		self.offsets[self.position_count]
	}

	fn snapshot(&self) -> Result<MapBlock> {
		let nulls = self.has_null_value.then(|| self.map_is_null.clone());
		MapBlock::create_internal(
			0,
			self.position_count,
			nulls,
			CowVec::new(self.offsets.clone()),
			self.key_builder.build()?,
			self.value_builder.build()?,
			Arc::new(HashTables::new(self.position_count)),
		)
	}

	fn null_value_block(&self) -> Result<MapBlock> {
		MapBlock::create_internal(
			0,
			1,
			Some(BitVec::repeat(1, true)),
			CowVec::new(vec![0, 0]),
			self.key_builder.new_block_builder_like(None).build()?,
			self.value_builder.new_block_builder_like(None).build()?,
			Arc::new(HashTables::new(1)),
		)
	}
}

impl Block for MapBlockBuilder {
	fn encoding_name(&self) -> &'static str {
		"MAP"
	}

	fn position_count(&self) -> usize {
		self.position_count
	}

	fn is_null(&self, position: usize) -> Result<bool> {
		check_valid_position(position, self.position_count)?;
		Ok(self.map_is_null.get(position))
	}

	fn may_have_null(&self) -> bool {
		self.has_null_value
	}

	fn get_block(&self, position: usize) -> Result<BlockRef> {
		self.snapshot()?.get_block(position)
	}

	fn get_single_value_block(&self, position: usize) -> Result<BlockRef> {
		self.snapshot()?.get_single_value_block(position)
	}

	fn get_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		self.build()?.get_region(offset, length)
	}

	fn copy_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		self.build()?.copy_region(offset, length)
	}

	fn copy_positions(&self, positions: &[usize], offset: usize, length: usize) -> Result<BlockRef> {
		self.build()?.copy_positions(positions, offset, length)
	}

	fn size_in_bytes(&self) -> u64 {
		self.key_builder.size_in_bytes()
			+ self.value_builder.size_in_bytes()
			+ SIZE_OF_OFFSET_AND_NULL * self.position_count as u64
			+ SIZE_OF_INT * (self.entry_count() * HASH_MULTIPLIER) as u64
	}

	fn region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		self.snapshot()?.region_size_in_bytes(offset, length)
	}

	fn positions_size_in_bytes(&self, selected: &[bool], selected_count: usize) -> Result<u64> {
		self.snapshot()?.positions_size_in_bytes(selected, selected_count)
	}

	fn retained_size_in_bytes(&self) -> u64 {
		instance_size::<Self>()
			+ self.key_builder.retained_size_in_bytes()
			+ self.value_builder.retained_size_in_bytes()
			+ (self.offsets.capacity() * size_of::<usize>()) as u64
			+ self.map_is_null.retained_size_in_bytes()
	}

	fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
		self.snapshot()?.estimated_data_size_for_stats(position)
	}

	fn append_null(&self) -> Result<BlockRef> {
		self.build()?.append_null()
	}

	fn write_position_to(&self, position: usize, builder: &mut dyn BlockBuilder) -> Result<()> {
		self.snapshot()?.write_position_to(position, builder)
	}

	fn write_position_to_output(&self, position: usize, output: &mut BytesMut) -> Result<()> {
		self.snapshot()?.write_position_to_output(position, output)
	}

	fn to_block(&self) -> Result<BlockRef> {
		self.build()
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

impl BlockBuilder for MapBlockBuilder {
	fn begin_entry(&mut self) -> Result<()> {
		if self.current_entry_opened {
			return Err(invalid_argument!("Expected current entry to be closed but was opened"));
		}
		self.current_entry_opened = true;
		Ok(())
	}

	fn entry_builder(&mut self, index: usize) -> Result<&mut dyn BlockBuilder> {
		self.check_entry_opened()?;
		match index {
			0 => Ok(self.key_builder.as_mut()),
			1 => Ok(self.value_builder.as_mut()),
			_ => Err(invalid_argument!("map entry has no part {}", index)),
		}
	}

	fn close_entry(&mut self) -> Result<()> {
		self.check_entry_opened()?;
		self.check_entry_sizes()?;
		self.entry_added(false);
		Ok(())
	}

	fn push_null(&mut self) -> Result<()> {
		if self.current_entry_opened {
			return Err(invalid_argument!("Current entry must be closed before a null can be written"));
		}
		self.entry_added(true);
		Ok(())
	}

	fn append_structure(&mut self, block: &dyn Block, position: usize) -> Result<()> {
		if self.current_entry_opened {
			return Err(invalid_argument!("Current entry must be closed before a structure can be appended"));
		}
		if block.is_null(position)? {
			return self.push_null();
		}
		let entry = block.get_block(position)?;
		self.begin_entry()?;
		for key in (0..entry.position_count()).step_by(2) {
			entry.write_position_to(key, self.key_builder.as_mut())?;
			entry.write_position_to(key + 1, self.value_builder.as_mut())?;
		}
		self.close_entry()
	}

	fn read_position_from(&mut self, input: &mut Bytes) -> Result<()> {
		if !input.has_remaining() {
			return Err(DecodeError::UnexpectedEof {
				needed: 1,
				remaining: 0,
			}
			.into());
		}
		match input.get_u8() {
			0 => self.push_null(),
			1 => {
				if input.remaining() < 4 {
					return Err(DecodeError::UnexpectedEof {
						needed: 4,
						remaining: input.remaining(),
					}
					.into());
				}
				let entry_count = input.get_i32_le();
				if entry_count < 0 {
					return Err(DecodeError::NegativeLength {
						what: "map entry count",
						value: entry_count,
					}
					.into());
				}
				self.begin_entry()?;
				for _ in 0..entry_count {
					self.key_builder.read_position_from(input)?;
					self.value_builder.read_position_from(input)?;
				}
				self.close_entry()
			}
			tag => Err(corrupt!("invalid null tag {}", tag)),
		}
	}

	fn build(&self) -> Result<BlockRef> {
		if self.current_entry_opened {
			return Err(invalid_argument!("Current entry must be closed before the block can be built"));
		}
		if !self.has_non_null_value {
			trace!(positions = self.position_count, "building all-null map block");
			return Ok(Arc::new(RunLengthEncodedBlock::new(Arc::new(self.null_value_block()?), self.position_count)?));
		}
		Ok(Arc::new(self.snapshot()?))
	}

	fn new_block_builder_like(&self, status: Option<BlockBuilderStatus>) -> Box<dyn BlockBuilder> {
		Box::new(Self::new(
			self.key_builder.new_block_builder_like(status.clone()),
			self.value_builder.new_block_builder_like(status.clone()),
			status,
			calculate_block_reset_size(self.position_count),
		))
	}
}

#[cfg(test)]
pub mod tests {
	use tessera_type::Error;

	use super::*;
	use crate::{IntArrayBlockBuilder, LongArrayBlockBuilder, PageBuilderStatus, VariableWidthBlockBuilder};

	fn int_to_string_builder() -> MapBlockBuilder {
		MapBlockBuilder::new(
			Box::new(IntArrayBlockBuilder::new(None, 4)),
			Box::new(VariableWidthBlockBuilder::new(None, 4, 16)),
			None,
			4,
		)
	}

	fn write_entry(builder: &mut MapBlockBuilder, entries: &[(i32, &str)]) {
		builder.begin_entry().unwrap();
		for (key, value) in entries {
			builder.entry_builder(0).unwrap().write_int(*key).unwrap();
			let values = builder.entry_builder(1).unwrap();
			values.write_bytes(value.as_bytes()).unwrap();
			values.close_entry().unwrap();
		}
		builder.close_entry().unwrap();
	}

	#[test]
	fn test_build() {
		let mut builder = int_to_string_builder();
		write_entry(&mut builder, &[(1, "a"), (2, "b")]);
		builder.push_null().unwrap();
		write_entry(&mut builder, &[]);

		let block = builder.build().unwrap();
		assert_eq!(block.encoding_name(), "MAP");
		assert_eq!(block.position_count(), 3);
		assert!(block.is_null(1).unwrap());
		assert!(!block.is_null(2).unwrap());

		let entry = block.get_block(0).unwrap();
		assert_eq!(entry.position_count(), 4);
		assert_eq!(entry.get_int(2).unwrap(), 2);
		assert_eq!(entry.get_slice(3).unwrap(), b"b");
		assert_eq!(block.get_block(2).unwrap().position_count(), 0);
	}

	#[test]
	fn test_entry_state_errors() {
		let mut builder = int_to_string_builder();
		assert!(builder.entry_builder(0).is_err());
		assert!(builder.close_entry().is_err());

		builder.begin_entry().unwrap();
		assert!(builder.begin_entry().is_err());
		assert!(builder.push_null().is_err());
		assert!(builder.build().is_err());
		assert!(builder.entry_builder(2).is_err());

		builder.entry_builder(0).unwrap().write_int(1).unwrap();
		let err = builder.close_entry().unwrap_err();
		assert!(matches!(err, Error::InvalidArgument(msg) if msg.starts_with("Map key and value builders have different sizes")));
	}

	#[test]
	fn test_close_entry_strict() {
		let mut builder = int_to_string_builder();
		builder.begin_entry().unwrap();
		for key in [1, 2, 1] {
			builder.entry_builder(0).unwrap().write_int(key).unwrap();
			let values = builder.entry_builder(1).unwrap();
			values.write_bytes(b"v").unwrap();
			values.close_entry().unwrap();
		}
		let err = builder.close_entry_strict().unwrap_err();
		assert_eq!(err, invalid_argument!("Duplicate map keys are not allowed"));
		assert_eq!(builder.position_count(), 0);
	}

	#[test]
	fn test_close_entry_strict_accepts_distinct_keys() {
		let mut builder = int_to_string_builder();
		write_entry(&mut builder, &[(1, "a")]);
		builder.begin_entry().unwrap();
		builder.entry_builder(0).unwrap().write_int(1).unwrap();
		let values = builder.entry_builder(1).unwrap();
		values.write_bytes(b"x").unwrap();
		values.close_entry().unwrap();
		builder.close_entry_strict().unwrap();
		assert_eq!(builder.position_count(), 2);
	}

	#[test]
	fn test_all_null_collapses() {
		let mut builder = int_to_string_builder();
		builder.push_null().unwrap();
		builder.push_null().unwrap();
		let block = builder.build().unwrap();
		assert_eq!(block.encoding_name(), "RLE");
		assert_eq!(block.position_count(), 2);
		assert!(block.is_null(0).unwrap());
		assert!(block.is_null(1).unwrap());
	}

	#[test]
	fn test_read_before_build() {
		let mut builder = int_to_string_builder();
		write_entry(&mut builder, &[(7, "seven")]);
		assert_eq!(builder.get_block(0).unwrap().get_int(0).unwrap(), 7);
		// key 5, value 5 + 5, row 5, hash slots 8
		assert_eq!(builder.size_in_bytes(), 28);
		assert_eq!(builder.estimated_data_size_for_stats(0).unwrap(), 4 + 5);
	}

	#[test]
	fn test_read_position_from() {
		let mut builder = MapBlockBuilder::new(
			Box::new(IntArrayBlockBuilder::new(None, 4)),
			Box::new(LongArrayBlockBuilder::new(None, 4)),
			None,
			4,
		);
		let mut input = Bytes::from_static(&[
			1, 1, 0, 0, 0, // one entry
			1, 3, 0, 0, 0, // key 3
			0, // null value
			0, // null map
		]);
		builder.read_position_from(&mut input).unwrap();
		builder.read_position_from(&mut input).unwrap();
		assert!(!input.has_remaining());

		let block = builder.build().unwrap();
		let entry = block.get_block(0).unwrap();
		assert_eq!(entry.get_int(0).unwrap(), 3);
		assert!(entry.is_null(1).unwrap());
		assert!(block.is_null(1).unwrap());

		let mut negative = Bytes::from_static(&[1, 0xFF, 0xFF, 0xFF, 0xFF]);
		let err = builder.read_position_from(&mut negative).unwrap_err();
		assert!(matches!(err, Error::Decode(DecodeError::NegativeLength { .. })));
	}

	#[test]
	fn test_status_accounting() {
		let page = PageBuilderStatus::new(1024, 1024);
		let status = page.create_block_builder_status();
		let mut builder = MapBlockBuilder::new(
			Box::new(IntArrayBlockBuilder::new(Some(status.clone()), 4)),
			Box::new(IntArrayBlockBuilder::new(Some(status.clone()), 4)),
			Some(status),
			4,
		);
		builder.begin_entry().unwrap();
		builder.entry_builder(0).unwrap().write_int(1).unwrap();
		builder.entry_builder(1).unwrap().write_int(2).unwrap();
		builder.close_entry().unwrap();
		assert_eq!(page.size_in_bytes(), 5 + 5 + 5);
	}

	#[test]
	fn test_new_block_builder_like() {
		let mut builder = int_to_string_builder();
		write_entry(&mut builder, &[(1, "a")]);
		let mut fresh = builder.new_block_builder_like(None);
		assert_eq!(fresh.position_count(), 0);
		fresh.begin_entry().unwrap();
		fresh.entry_builder(0).unwrap().write_int(9).unwrap();
		let values = fresh.entry_builder(1).unwrap();
		values.write_bytes(b"z").unwrap();
		values.close_entry().unwrap();
		fresh.close_entry().unwrap();
		assert_eq!(fresh.build().unwrap().get_block(0).unwrap().get_int(0).unwrap(), 9);
	}
}
