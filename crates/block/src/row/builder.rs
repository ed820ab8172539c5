// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{any::Any, sync::Arc};

use bytes::{Buf, Bytes, BytesMut};
use tessera_type::{
	DecodeError, Result, corrupt, invalid_argument,
	util::{BitVec, CowVec},
};
use tracing::trace;

use super::RowBlock;
use crate::{
	Block, BlockBuilder, BlockBuilderStatus, BlockRef, RunLengthEncodedBlock,
	size::{SIZE_OF_OFFSET_AND_NULL, instance_size},
	util::{calculate_block_reset_size, check_valid_position},
};

/// Builder for [`RowBlock`].
///
/// A row is opened with `begin_entry`, one value is written to every
/// `entry_builder(field)`, and `close_entry` checks that each field received
/// exactly one position.
#[derive(Debug)]
pub struct RowBlockBuilder {
	status: Option<BlockBuilderStatus>,
	field_builders: Vec<Box<dyn BlockBuilder>>,
	position_count: usize,
	has_null_value: bool,
	has_non_null_value: bool,
	row_is_null: BitVec,
	field_block_offsets: Vec<usize>,
	current_entry_opened: bool,
}

impl RowBlockBuilder {
	pub fn new(
		field_builders: Vec<Box<dyn BlockBuilder>>,
		status: Option<BlockBuilderStatus>,
		expected_entries: usize,
	) -> Result<Self> {
		if field_builders.is_empty() {
			return Err(invalid_argument!("Number of fields in RowBlock must be positive"));
		}
		let mut field_block_offsets = Vec::with_capacity(expected_entries + 1);
		field_block_offsets.push(0);
		Ok(Self {
			status,
			field_builders,
			position_count: 0,
			has_null_value: false,
			has_non_null_value: false,
			row_is_null: BitVec::with_capacity(expected_entries),
			field_block_offsets,
			current_entry_opened: false,
		})
	}

	pub fn field_count(&self) -> usize {
		self.field_builders.len()
	}

	fn check_entry_opened(&self) -> Result<()> {
		if !self.current_entry_opened {
			return Err(invalid_argument!("Expected entry to be opened but was closed"));
		}
		Ok(())
	}

	fn entry_added(&mut self, is_null: bool) {
		let next = self.field_block_offsets[self.position_count] + usize::from(!is_null);
		self.current_entry_opened = false;
		self.field_block_offsets.push(next);
		self.row_is_null.push(is_null);
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

	fn build_fields(&self) -> Result<Vec<BlockRef>> {
		self.field_builders.iter().map(|f| f.build()).collect()
	}

	fn snapshot(&self) -> Result<RowBlock> {
		let nulls = self.has_null_value.then(|| self.row_is_null.clone());
		RowBlock::create_internal(
			0,
			self.position_count,
			nulls,
			CowVec::new(self.field_block_offsets.clone()),
			self.build_fields()?.into(),
		)
	}

	fn null_value_block(&self) -> Result<RowBlock> {
		let field_blocks =
			self.field_builders.iter().map(|f| f.new_block_builder_like(None).build()).collect::<Result<Vec<_>>>()?;
		RowBlock::create_internal(
			0,
			1,
			Some(BitVec::repeat(1, true)),
			CowVec::new(vec![0, 0]),
			field_blocks.into(),
		)
	}
}

impl Block for RowBlockBuilder {
	fn encoding_name(&self) -> &'static str {
		"ROW"
	}

	fn position_count(&self) -> usize {
		self.position_count
	}

	fn is_null(&self, position: usize) -> Result<bool> {
		check_valid_position(position, self.position_count)?;
		Ok(self.row_is_null.get(position))
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
		SIZE_OF_OFFSET_AND_NULL * self.position_count as u64
			+ self.field_builders.iter().map(|f| f.size_in_bytes()).sum::<u64>()
	}

	fn region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		self.snapshot()?.region_size_in_bytes(offset, length)
	}

	fn positions_size_in_bytes(&self, selected: &[bool], selected_count: usize) -> Result<u64> {
		self.snapshot()?.positions_size_in_bytes(selected, selected_count)
	}

	fn retained_size_in_bytes(&self) -> u64 {
		instance_size::<Self>()
			+ (self.field_block_offsets.capacity() * size_of::<usize>()) as u64
			+ self.row_is_null.retained_size_in_bytes()
			+ self.field_builders.iter().map(|f| f.retained_size_in_bytes()).sum::<u64>()
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

impl BlockBuilder for RowBlockBuilder {
	fn begin_entry(&mut self) -> Result<()> {
		if self.current_entry_opened {
			return Err(invalid_argument!("Expected current entry to be closed but was opened"));
		}
		self.current_entry_opened = true;
		Ok(())
	}

	fn entry_builder(&mut self, index: usize) -> Result<&mut dyn BlockBuilder> {
		self.check_entry_opened()?;
		let field_count = self.field_builders.len();
		match self.field_builders.get_mut(index) {
			Some(builder) => Ok(builder.as_mut()),
			None => Err(invalid_argument!("field {} does not exist, row has {} fields", index, field_count)),
		}
	}

	fn close_entry(&mut self) -> Result<()> {
		self.check_entry_opened()?;
		let expected = self.field_block_offsets[self.position_count] + 1;
		for (index, field) in self.field_builders.iter().enumerate() {
			if field.position_count() != expected {
				return Err(invalid_argument!(
					"field {} has {} positions, expected {}",
					index,
					field.position_count(),
					expected
				));
			}
		}
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
		let row = block.get_block(position)?;
		if row.position_count() != self.field_builders.len() {
			return Err(invalid_argument!(
				"row has {} fields, builder has {}",
				row.position_count(),
				self.field_builders.len()
			));
		}
		self.begin_entry()?;
		for (field, builder) in self.field_builders.iter_mut().enumerate() {
			row.write_position_to(field, builder.as_mut())?;
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
				self.begin_entry()?;
				for builder in self.field_builders.iter_mut() {
					builder.read_position_from(input)?;
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
			trace!(positions = self.position_count, "building all-null row block");
			return Ok(Arc::new(RunLengthEncodedBlock::new(Arc::new(self.null_value_block()?), self.position_count)?));
		}
		Ok(Arc::new(self.snapshot()?))
	}

	fn new_block_builder_like(&self, status: Option<BlockBuilderStatus>) -> Box<dyn BlockBuilder> {
		let expected_entries = calculate_block_reset_size(self.position_count);
		let mut field_block_offsets = Vec::with_capacity(expected_entries + 1);
		field_block_offsets.push(0);
		Box::new(Self {
			field_builders: self.field_builders.iter().map(|f| f.new_block_builder_like(status.clone())).collect(),
			status,
			position_count: 0,
			has_null_value: false,
			has_non_null_value: false,
			row_is_null: BitVec::with_capacity(expected_entries),
			field_block_offsets,
			current_entry_opened: false,
		})
	}
}
