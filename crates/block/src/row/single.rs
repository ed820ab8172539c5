// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{any::Any, sync::Arc};

use bytes::BytesMut;
use tessera_type::{Result, unsupported};

use crate::{
	Block, BlockBuilder, BlockRef,
	size::instance_size,
	util::check_valid_position,
};

/// One row of a [`RowBlock`](super::RowBlock); position `i` is field `i`.
#[derive(Clone, Debug)]
pub struct SingleRowBlock {
	row_index: usize,
	field_blocks: Arc<[BlockRef]>,
}

impl SingleRowBlock {
	pub(crate) fn new(row_index: usize, field_blocks: Arc<[BlockRef]>) -> Self {
		Self {
			row_index,
			field_blocks,
		}
	}

	/// Position of this row inside the field blocks.
	pub fn row_index(&self) -> usize {
		self.row_index
	}

	pub fn raw_field_block(&self, index: usize) -> Result<&BlockRef> {
		check_valid_position(index, self.field_blocks.len())?;
		Ok(&self.field_blocks[index])
	}
}

impl Block for SingleRowBlock {
	fn encoding_name(&self) -> &'static str {
		"ROW_ELEMENT"
	}

	fn position_count(&self) -> usize {
		self.field_blocks.len()
	}

	fn is_null(&self, position: usize) -> Result<bool> {
		self.raw_field_block(position)?.is_null(self.row_index)
	}

	fn may_have_null(&self) -> bool {
		self.field_blocks.iter().any(|f| f.may_have_null())
	}

	fn get_byte(&self, position: usize) -> Result<i8> {
		self.raw_field_block(position)?.get_byte(self.row_index)
	}

	fn get_short(&self, position: usize) -> Result<i16> {
		self.raw_field_block(position)?.get_short(self.row_index)
	}

	fn get_int(&self, position: usize) -> Result<i32> {
		self.raw_field_block(position)?.get_int(self.row_index)
	}

	fn get_long(&self, position: usize) -> Result<i64> {
		self.raw_field_block(position)?.get_long(self.row_index)
	}

	fn get_slice(&self, position: usize) -> Result<&[u8]> {
		self.raw_field_block(position)?.get_slice(self.row_index)
	}

	fn get_block(&self, position: usize) -> Result<BlockRef> {
		self.raw_field_block(position)?.get_block(self.row_index)
	}

	fn get_single_value_block(&self, position: usize) -> Result<BlockRef> {
		self.raw_field_block(position)?.get_single_value_block(self.row_index)
	}

	fn get_region(&self, _offset: usize, _length: usize) -> Result<BlockRef> {
		Err(unsupported!("{} does not support get_region", self.encoding_name()))
	}

	fn copy_region(&self, _offset: usize, _length: usize) -> Result<BlockRef> {
		Err(unsupported!("{} does not support copy_region", self.encoding_name()))
	}

	fn copy_positions(&self, _positions: &[usize], _offset: usize, _length: usize) -> Result<BlockRef> {
		Err(unsupported!("{} does not support copy_positions", self.encoding_name()))
	}

	fn get_positions(&self, _positions: &[usize], _offset: usize, _length: usize) -> Result<BlockRef> {
		Err(unsupported!("{} does not support get_positions", self.encoding_name()))
	}

	fn size_in_bytes(&self) -> u64 {
		self.field_blocks.iter().map(|f| f.region_size_in_bytes(self.row_index, 1).unwrap_or(0)).sum()
	}

	fn region_size_in_bytes(&self, _offset: usize, _length: usize) -> Result<u64> {
		Err(unsupported!("{} does not support region_size_in_bytes", self.encoding_name()))
	}

	fn positions_size_in_bytes(&self, _selected: &[bool], _selected_count: usize) -> Result<u64> {
		Err(unsupported!("{} does not support positions_size_in_bytes", self.encoding_name()))
	}

	fn retained_size_in_bytes(&self) -> u64 {
		instance_size::<Self>() + self.field_blocks.iter().map(|f| f.retained_size_in_bytes()).sum::<u64>()
	}

	fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
		self.raw_field_block(position)?.estimated_data_size_for_stats(self.row_index)
	}

	fn append_null(&self) -> Result<BlockRef> {
		Err(unsupported!("{} does not support append_null", self.encoding_name()))
	}

	fn write_position_to(&self, position: usize, builder: &mut dyn BlockBuilder) -> Result<()> {
		self.raw_field_block(position)?.write_position_to(self.row_index, builder)
	}

	fn write_position_to_output(&self, position: usize, output: &mut BytesMut) -> Result<()> {
		self.raw_field_block(position)?.write_position_to_output(self.row_index, output)
	}

	fn is_loaded(&self) -> bool {
		self.field_blocks.iter().all(|f| f.is_loaded())
	}

	fn to_block(&self) -> Result<BlockRef> {
		if self.is_loaded() {
			return Ok(Arc::new(self.clone()));
		}
		let field_blocks = self.field_blocks.iter().map(|f| f.to_block()).collect::<Result<Vec<_>>>()?;
		Ok(Arc::new(Self::new(self.row_index, field_blocks.into())))
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

#[cfg(test)]
pub mod tests {
	use tessera_type::Error;

	use super::*;
	use crate::{ByteArrayBlock, IntArrayBlock, RowBlock};

	fn sample() -> BlockRef {
		let rows = RowBlock::from_field_blocks(
			2,
			None,
			vec![
				Arc::new(IntArrayBlock::from_options(&[Some(1), None])),
				Arc::new(ByteArrayBlock::from_values(vec![7, 8])),
			],
		)
		.unwrap();
		rows.get_block(1).unwrap()
	}

	#[test]
	fn test_reads() {
		let row = sample();
		assert_eq!(row.encoding_name(), "ROW_ELEMENT");
		assert_eq!(row.position_count(), 2);
		assert!(row.is_null(0).unwrap());
		assert_eq!(row.get_byte(1).unwrap(), 8);
		assert!(row.get_byte(2).is_err());
		assert!(row.may_have_null());
		assert_eq!(row.as_any().downcast_ref::<SingleRowBlock>().unwrap().row_index(), 1);
	}

	#[test]
	fn test_append_null_unsupported() {
		let err = sample().append_null().unwrap_err();
		assert_eq!(err, Error::Unsupported("ROW_ELEMENT does not support append_null".to_string()));
	}

	#[test]
	fn test_structural_operations_unsupported() {
		let row = sample();
		assert!(matches!(row.get_region(0, 1), Err(Error::Unsupported(_))));
		assert!(matches!(row.copy_positions(&[0], 0, 1), Err(Error::Unsupported(_))));
		assert!(matches!(row.region_size_in_bytes(0, 1), Err(Error::Unsupported(_))));
	}

	#[test]
	fn test_size() {
		// int 4 + 1, byte 1 + 1
		assert_eq!(sample().size_in_bytes(), 7);
	}

	#[test]
	fn test_single_value_block() {
		let row = sample();
		let value = row.get_single_value_block(1).unwrap();
		assert_eq!(value.position_count(), 1);
		assert_eq!(value.get_byte(0).unwrap(), 8);
	}
}
