// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{any::Any, sync::Arc};

use bytes::{Buf, Bytes, BytesMut};
use tessera_type::{
	DecodeError, Result, corrupt, invalid_argument,
	util::{BitVec, CowVec},
};
use tracing::trace;

use super::VariableWidthBlock;
use crate::{
	Block, BlockBuilder, BlockBuilderStatus, BlockRef, RunLengthEncodedBlock,
	size::{SIZE_OF_OFFSET_AND_NULL, instance_size},
	util::{calculate_block_reset_size, calculate_new_array_size, check_valid_position},
};

/// Bytes reserved per expected entry when no better estimate exists.
pub const EXPECTED_BYTES_PER_ENTRY: usize = 32;

/// Builder for [`VariableWidthBlock`].
///
/// Bytes written with `write_*` accumulate into the open entry until
/// `close_entry`; a null cannot be pushed while an entry is open.
#[derive(Debug)]
pub struct VariableWidthBlockBuilder {
	status: Option<BlockBuilderStatus>,
	initialized: bool,
	initial_entry_count: usize,
	initial_slice_size: usize,
	position_count: usize,
	has_null_value: bool,
	has_non_null_value: bool,
	value_is_null: BitVec,
	offsets: CowVec<usize>,
	slice: CowVec<u8>,
	current_entry_size: usize,
}

impl VariableWidthBlockBuilder {
	pub fn new(status: Option<BlockBuilderStatus>, expected_entries: usize, expected_bytes: usize) -> Self {
		Self {
			status,
			initialized: false,
			initial_entry_count: expected_entries.max(1),
			initial_slice_size: expected_bytes,
			position_count: 0,
			has_null_value: false,
			has_non_null_value: false,
			value_is_null: BitVec::new(),
			offsets: CowVec::new(vec![0]),
			slice: CowVec::default(),
			current_entry_size: 0,
		}
	}

	/// Presizes the byte buffer from the entry count, bounded by the block
	/// size the status allows.
	pub fn with_expected_entries(status: Option<BlockBuilderStatus>, expected_entries: usize) -> Self {
		let mut expected_bytes = expected_entries.saturating_mul(EXPECTED_BYTES_PER_ENTRY);
		if let Some(status) = &status {
			expected_bytes = expected_bytes.min(status.max_block_size_in_bytes() as usize);
		}
		Self::new(status, expected_entries, expected_bytes)
	}

	fn initialize(&mut self) {
		if self.initialized {
			return;
		}
		self.initialized = true;
		self.offsets.reserve_exact(self.initial_entry_count + 1);
		self.value_is_null.reserve(self.initial_entry_count);
		self.slice.reserve_exact(self.initial_slice_size);
	}

	fn ensure_slice_capacity(&mut self, additional: usize) -> Result<()> {
		self.initialize();
		let needed = self.slice.len() + additional;
		if needed > self.slice.capacity() {
			let new_size = calculate_new_array_size(self.slice.capacity())?.max(needed);
			self.slice.reserve_exact(new_size - self.slice.len());
		}
		Ok(())
	}

	fn ensure_position_capacity(&mut self) -> Result<()> {
		self.initialize();
		if self.offsets.len() >= self.offsets.capacity() {
			let new_size = calculate_new_array_size(self.offsets.capacity())?;
			self.offsets.reserve_exact(new_size - self.offsets.len());
			self.value_is_null.reserve(new_size - self.position_count);
		}
		Ok(())
	}

	fn append(&mut self, bytes: &[u8]) -> Result<()> {
		self.ensure_slice_capacity(bytes.len())?;
		self.slice.extend_from_slice(bytes);
		self.current_entry_size += bytes.len();
		Ok(())
	}

	fn entry_added(&mut self, bytes_written: usize, is_null: bool) -> Result<()> {
		self.ensure_position_capacity()?;
		self.offsets.push(self.slice.len());
		self.value_is_null.push(is_null);
		self.position_count += 1;
		if is_null {
			self.has_null_value = true;
		} else {
			self.has_non_null_value = true;
		}
		if let Some(status) = &self.status {
			status.add_bytes(SIZE_OF_OFFSET_AND_NULL + bytes_written as u64);
		}
		Ok(())
	}

	fn check_no_open_entry(&self, action: &str) -> Result<()> {
		if self.current_entry_size > 0 {
			return Err(invalid_argument!("Current entry must be closed before {}", action));
		}
		Ok(())
	}

	fn snapshot(&self) -> Result<VariableWidthBlock> {
		let nulls = self.has_null_value.then(|| self.value_is_null.clone());
		VariableWidthBlock::from_parts(0, self.position_count, self.slice.clone(), self.offsets.clone(), nulls)
	}

	fn written_bytes(&self) -> usize {
		self.offsets[self.position_count]
	}
}

impl Block for VariableWidthBlockBuilder {
	fn encoding_name(&self) -> &'static str {
		"VARIABLE_WIDTH"
	}

	fn position_count(&self) -> usize {
		self.position_count
	}

	fn is_null(&self, position: usize) -> Result<bool> {
		check_valid_position(position, self.position_count)?;
		Ok(self.value_is_null.get(position))
	}

	fn may_have_null(&self) -> bool {
		self.has_null_value
	}

	fn get_slice(&self, position: usize) -> Result<&[u8]> {
		check_valid_position(position, self.position_count)?;
		Ok(&self.slice[self.offsets[position]..self.offsets[position + 1]])
	}

	fn get_single_value_block(&self, position: usize) -> Result<BlockRef> {
		self.snapshot()?.get_single_value_block(position)
	}

	fn get_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		self.snapshot()?.get_region(offset, length)
	}

	fn copy_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		self.snapshot()?.copy_region(offset, length)
	}

	fn copy_positions(&self, positions: &[usize], offset: usize, length: usize) -> Result<BlockRef> {
		self.snapshot()?.copy_positions(positions, offset, length)
	}

	fn size_in_bytes(&self) -> u64 {
		self.written_bytes() as u64 + SIZE_OF_OFFSET_AND_NULL * self.position_count as u64
	}

	fn region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		self.snapshot()?.region_size_in_bytes(offset, length)
	}

	fn positions_size_in_bytes(&self, selected: &[bool], selected_count: usize) -> Result<u64> {
		self.snapshot()?.positions_size_in_bytes(selected, selected_count)
	}

	fn retained_size_in_bytes(&self) -> u64 {
		instance_size::<Self>()
			+ self.slice.retained_size_in_bytes()
			+ self.offsets.retained_size_in_bytes()
			+ self.value_is_null.retained_size_in_bytes()
	}

	fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
		Ok(if self.is_null(position)? {
			0
		} else {
			(self.offsets[position + 1] - self.offsets[position]) as u64
		})
	}

	fn append_null(&self) -> Result<BlockRef> {
		self.build()?.append_null()
	}

	fn write_position_to(&self, position: usize, builder: &mut dyn BlockBuilder) -> Result<()> {
		if self.is_null(position)? {
			return builder.push_null();
		}
		builder.write_bytes(self.get_slice(position)?)?;
		builder.close_entry()
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

impl BlockBuilder for VariableWidthBlockBuilder {
	fn write_byte(&mut self, value: i8) -> Result<()> {
		self.append(&value.to_le_bytes())
	}

	fn write_short(&mut self, value: i16) -> Result<()> {
		self.append(&value.to_le_bytes())
	}

	fn write_int(&mut self, value: i32) -> Result<()> {
		self.append(&value.to_le_bytes())
	}

	fn write_long(&mut self, value: i64) -> Result<()> {
		self.append(&value.to_le_bytes())
	}

	fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
		self.append(bytes)
	}

	fn close_entry(&mut self) -> Result<()> {
		let bytes_written = self.current_entry_size;
		self.entry_added(bytes_written, false)?;
		self.current_entry_size = 0;
		Ok(())
	}

	fn push_null(&mut self) -> Result<()> {
		self.check_no_open_entry("a null can be written")?;
		self.entry_added(0, true)
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
				let length = input.get_i32_le();
				let length = usize::try_from(length).map_err(|_| DecodeError::NegativeLength {
					what: "slice length",
					value: length,
				})?;
				if input.remaining() < length {
					return Err(DecodeError::UnexpectedEof {
						needed: length,
						remaining: input.remaining(),
					}
					.into());
				}
				let bytes = input.split_to(length);
				self.write_bytes(&bytes)?;
				self.close_entry()
			}
			tag => Err(corrupt!("invalid null tag {}", tag)),
		}
	}

	fn build(&self) -> Result<BlockRef> {
		self.check_no_open_entry("the block can be built")?;
		if !self.has_non_null_value {
			trace!(positions = self.position_count, "building all-null variable width block");
			return Ok(Arc::new(RunLengthEncodedBlock::new(
				Arc::new(VariableWidthBlock::null_value_block()),
				self.position_count,
			)?));
		}
		Ok(Arc::new(self.snapshot()?))
	}

	fn new_block_builder_like(&self, status: Option<BlockBuilderStatus>) -> Box<dyn BlockBuilder> {
		Box::new(Self::new(
			status,
			calculate_block_reset_size(self.position_count),
			calculate_block_reset_size(self.written_bytes()),
		))
	}
}
