// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{any::Any, sync::Arc};

use bytes::BytesMut;
use tessera_type::{Result, invalid_argument};

use crate::{
	Block, BlockBuilder, BlockRef, DictionaryBlock,
	size::instance_size,
	util::{check_array_range, check_valid_position, check_valid_positions, check_valid_region, check_valid_selection},
};

/// One value repeated `position_count` times.
#[derive(Clone, Debug)]
pub struct RunLengthEncodedBlock {
	value: BlockRef,
	position_count: usize,
}

impl RunLengthEncodedBlock {
	/// `value` must hold exactly one position. A run-length value is unwrapped.
	pub fn new(value: BlockRef, position_count: usize) -> Result<Self> {
		let value = match value.as_any().downcast_ref::<RunLengthEncodedBlock>() {
			Some(rle) => rle.value.clone(),
			None => value,
		};
		if value.position_count() != 1 {
			return Err(invalid_argument!(
				"Expected value to contain a single position but has {} positions",
				value.position_count()
			));
		}
		Ok(Self {
			value,
			position_count,
		})
	}

	/// Repeats the value at `position` of `block`.
	pub fn create(block: &dyn Block, position: usize, position_count: usize) -> Result<Self> {
		Self::new(block.get_single_value_block(position)?, position_count)
	}

	pub fn value(&self) -> &BlockRef {
		&self.value
	}
}

impl Block for RunLengthEncodedBlock {
	fn encoding_name(&self) -> &'static str {
		"RLE"
	}

	fn position_count(&self) -> usize {
		self.position_count
	}

	fn is_null(&self, position: usize) -> Result<bool> {
		check_valid_position(position, self.position_count)?;
		self.value.is_null(0)
	}

	fn may_have_null(&self) -> bool {
		self.position_count > 0 && self.value.is_null(0).unwrap_or(false)
	}

	fn get_byte(&self, position: usize) -> Result<i8> {
		check_valid_position(position, self.position_count)?;
		self.value.get_byte(0)
	}

	fn get_short(&self, position: usize) -> Result<i16> {
		check_valid_position(position, self.position_count)?;
		self.value.get_short(0)
	}

	fn get_int(&self, position: usize) -> Result<i32> {
		check_valid_position(position, self.position_count)?;
		self.value.get_int(0)
	}

	fn get_long(&self, position: usize) -> Result<i64> {
		check_valid_position(position, self.position_count)?;
		self.value.get_long(0)
	}

	fn get_slice(&self, position: usize) -> Result<&[u8]> {
		check_valid_position(position, self.position_count)?;
		self.value.get_slice(0)
	}

	fn get_block(&self, position: usize) -> Result<BlockRef> {
		check_valid_position(position, self.position_count)?;
		self.value.get_block(0)
	}

	fn get_single_value_block(&self, position: usize) -> Result<BlockRef> {
		check_valid_position(position, self.position_count)?;
		Ok(self.value.clone())
	}

	fn get_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		check_valid_region(self.position_count, offset, length)?;
		Ok(Arc::new(Self {
			value: self.value.clone(),
			position_count: length,
		}))
	}

	fn copy_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		check_valid_region(self.position_count, offset, length)?;
		Ok(Arc::new(Self::new(self.value.copy_region(0, 1)?, length)?))
	}

	fn copy_positions(&self, positions: &[usize], offset: usize, length: usize) -> Result<BlockRef> {
		check_array_range(positions.len(), offset, length)?;
		check_valid_positions(&positions[offset..offset + length], self.position_count)?;
		Ok(Arc::new(Self::new(self.value.copy_region(0, 1)?, length)?))
	}

	fn get_positions(&self, positions: &[usize], offset: usize, length: usize) -> Result<BlockRef> {
		check_array_range(positions.len(), offset, length)?;
		check_valid_positions(&positions[offset..offset + length], self.position_count)?;
		Ok(Arc::new(Self {
			value: self.value.clone(),
			position_count: length,
		}))
	}

	fn size_in_bytes(&self) -> u64 {
		self.value.size_in_bytes()
	}

	fn region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		check_valid_region(self.position_count, offset, length)?;
		Ok(self.value.size_in_bytes())
	}

	fn positions_size_in_bytes(&self, selected: &[bool], selected_count: usize) -> Result<u64> {
		check_valid_selection(selected, selected_count, self.position_count)?;
		Ok(self.value.size_in_bytes())
	}

	fn retained_size_in_bytes(&self) -> u64 {
		instance_size::<Self>() + self.value.retained_size_in_bytes()
	}

	fn logical_size_in_bytes(&self) -> u64 {
		self.value.logical_size_in_bytes() * self.position_count as u64
	}

	fn region_logical_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		check_valid_region(self.position_count, offset, length)?;
		Ok(self.value.logical_size_in_bytes() * length as u64)
	}

	fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
		check_valid_position(position, self.position_count)?;
		self.value.estimated_data_size_for_stats(0)
	}

	fn append_null(&self) -> Result<BlockRef> {
		if self.value.is_null(0)? {
			return Ok(Arc::new(Self {
				value: self.value.clone(),
				position_count: self.position_count + 1,
			}));
		}
		let dictionary = self.value.append_null()?;
		let mut ids = vec![0; self.position_count + 1];
		ids[self.position_count] = 1;
		Ok(Arc::new(DictionaryBlock::new(dictionary, ids)?))
	}

	fn write_position_to(&self, position: usize, builder: &mut dyn BlockBuilder) -> Result<()> {
		check_valid_position(position, self.position_count)?;
		self.value.write_position_to(0, builder)
	}

	fn write_position_to_output(&self, position: usize, output: &mut BytesMut) -> Result<()> {
		check_valid_position(position, self.position_count)?;
		self.value.write_position_to_output(0, output)
	}

	fn to_block(&self) -> Result<BlockRef> {
		Ok(Arc::new(self.clone()))
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;
	use crate::{IntArrayBlock, VariableWidthBlock};

	fn rle_of(value: i32, count: usize) -> RunLengthEncodedBlock {
		RunLengthEncodedBlock::new(Arc::new(IntArrayBlock::from_values(vec![value])), count).unwrap()
	}

	#[test]
	fn test_requires_single_position() {
		let value: BlockRef = Arc::new(IntArrayBlock::from_values(vec![1, 2]));
		assert!(RunLengthEncodedBlock::new(value, 3).is_err());
	}

	#[test]
	fn test_nested_rle_is_unwrapped() {
		let inner: BlockRef = Arc::new(rle_of(5, 1));
		let outer = RunLengthEncodedBlock::new(inner, 4).unwrap();
		assert_eq!(outer.value().encoding_name(), "INT_ARRAY");
	}

	#[test]
	fn test_reads() {
		let block = rle_of(7, 3);
		assert_eq!(block.get_int(2).unwrap(), 7);
		assert!(!block.is_null(0).unwrap());
		assert!(!block.may_have_null());
		assert!(block.get_int(3).is_err());
	}

	#[test]
	fn test_create_from_position() {
		let source = VariableWidthBlock::from_strs(&[Some("x"), Some("yz")]);
		let block = RunLengthEncodedBlock::create(&source, 1, 2).unwrap();
		assert_eq!(block.get_slice(1).unwrap(), b"yz");
	}

	#[test]
	fn test_regions_and_copies() {
		let block = rle_of(7, 10);
		let region = block.get_region(2, 5).unwrap();
		assert_eq!(region.position_count(), 5);
		assert_eq!(region.encoding_name(), "RLE");

		let copy = block.copy_positions(&[1, 9, 9], 0, 3).unwrap();
		assert_eq!(copy.position_count(), 3);
		assert_eq!(copy.get_int(2).unwrap(), 7);
		assert!(block.copy_positions(&[10], 0, 1).is_err());

		let view = block.get_positions(&[0, 0, 0, 0], 1, 2).unwrap();
		assert_eq!(view.position_count(), 2);
	}

	#[test]
	fn test_sizes() {
		let block = rle_of(7, 10);
		assert_eq!(block.size_in_bytes(), 5);
		assert_eq!(block.region_size_in_bytes(0, 10).unwrap(), block.size_in_bytes());
		assert_eq!(block.logical_size_in_bytes(), 50);
		assert_eq!(block.region_logical_size_in_bytes(0, 4).unwrap(), 20);
	}

	#[test]
	fn test_append_null_to_null_run() {
		let null: BlockRef = Arc::new(IntArrayBlock::from_options(&[None]));
		let block = RunLengthEncodedBlock::new(null, 3).unwrap();
		assert!(block.may_have_null());
		let appended = block.append_null().unwrap();
		assert_eq!(appended.encoding_name(), "RLE");
		assert_eq!(appended.position_count(), 4);
		assert!(appended.is_null(3).unwrap());
	}

	#[test]
	fn test_append_null_to_value_run() {
		let block = rle_of(7, 2);
		let appended = block.append_null().unwrap();
		assert_eq!(appended.encoding_name(), "DICTIONARY");
		assert_eq!(appended.position_count(), 3);
		assert_eq!(appended.get_int(0).unwrap(), 7);
		assert_eq!(appended.get_int(1).unwrap(), 7);
		assert!(appended.is_null(2).unwrap());
	}
}
