// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

mod builder;

use std::{any::Any, sync::Arc};

pub use builder::{EXPECTED_BYTES_PER_ENTRY, VariableWidthBlockBuilder};
use bytes::{BufMut, BytesMut};
use tessera_type::{
	Result, invalid_argument,
	util::{BitVec, CowVec},
};

use crate::{
	Block, BlockBuilder, BlockRef,
	size::{SIZE_OF_OFFSET_AND_NULL, instance_size},
	util::{
		append_null_to_nulls, append_null_to_offsets, check_array_range, check_valid_position, check_valid_region,
		check_valid_selection, compact_nulls, compact_offsets, is_null_at,
	},
};

/// Variable-length byte values in one shared buffer.
///
/// Position `p` spans `slice[offsets[array_offset + p]..offsets[array_offset + p + 1]]`.
/// Null positions span zero bytes.
#[derive(Clone, Debug)]
pub struct VariableWidthBlock {
	array_offset: usize,
	position_count: usize,
	slice: CowVec<u8>,
	offsets: CowVec<usize>,
	value_is_null: Option<BitVec>,
	retained_size_in_bytes: u64,
}

impl VariableWidthBlock {
	pub fn new(position_count: usize, slice: Vec<u8>, offsets: Vec<usize>, value_is_null: Option<BitVec>) -> Result<Self> {
		Self::from_parts(0, position_count, CowVec::new(slice), CowVec::new(offsets), value_is_null)
	}

	pub fn from_strs(values: &[Option<&str>]) -> Self {
		let values: Vec<Option<&[u8]>> = values.iter().map(|v| v.map(str::as_bytes)).collect();
		Self::from_slices(&values)
	}

	pub fn from_slices(values: &[Option<&[u8]>]) -> Self {
		let mut slice = Vec::new();
		let mut offsets = Vec::with_capacity(values.len() + 1);
		offsets.push(0);
		for value in values {
			if let Some(bytes) = value {
				slice.extend_from_slice(bytes);
			}
			offsets.push(slice.len());
		}
		let nulls = values.iter().any(Option::is_none).then(|| BitVec::from_fn(values.len(), |i| values[i].is_none()));
		Self::build_unchecked(0, values.len(), CowVec::new(slice), CowVec::new(offsets), nulls)
	}

	pub(crate) fn from_parts(
		array_offset: usize,
		position_count: usize,
		slice: CowVec<u8>,
		offsets: CowVec<usize>,
		value_is_null: Option<BitVec>,
	) -> Result<Self> {
		if offsets.len().saturating_sub(array_offset) < position_count + 1 {
			return Err(invalid_argument!("offsets length is less than positionCount"));
		}
		if let Some(nulls) = &value_is_null {
			if nulls.len().saturating_sub(array_offset) < position_count {
				return Err(invalid_argument!("isNull length is less than positionCount"));
			}
		}
		let window = &offsets[array_offset..=array_offset + position_count];
		if window.windows(2).any(|w| w[0] > w[1]) {
			return Err(invalid_argument!("offsets must be non-decreasing"));
		}
		if window[position_count] > slice.len() {
			return Err(invalid_argument!(
				"last offset {} exceeds slice length {}",
				window[position_count],
				slice.len()
			));
		}
		Ok(Self::build_unchecked(array_offset, position_count, slice, offsets, value_is_null))
	}

	fn build_unchecked(
		array_offset: usize,
		position_count: usize,
		slice: CowVec<u8>,
		offsets: CowVec<usize>,
		value_is_null: Option<BitVec>,
	) -> Self {
		let retained_size_in_bytes = instance_size::<Self>()
			+ slice.retained_size_in_bytes()
			+ offsets.retained_size_in_bytes()
			+ value_is_null.as_ref().map_or(0, |n| n.retained_size_in_bytes());
		Self {
			array_offset,
			position_count,
			slice,
			offsets,
			value_is_null,
			retained_size_in_bytes,
		}
	}

	pub(crate) fn null_value_block() -> Self {
		Self::build_unchecked(0, 1, CowVec::default(), CowVec::new(vec![0, 0]), Some(BitVec::repeat(1, true)))
	}

	pub fn slice_length(&self, position: usize) -> Result<usize> {
		check_valid_position(position, self.position_count)?;
		Ok(self.length_unchecked(position))
	}

	/// Bytes of all live positions.
	pub fn raw_slice(&self) -> &[u8] {
		&self.slice[self.offset_of(0)..self.offset_of(self.position_count)]
	}

	fn offset_of(&self, position: usize) -> usize {
		self.offsets[self.array_offset + position]
	}

	fn length_unchecked(&self, position: usize) -> usize {
		self.offset_of(position + 1) - self.offset_of(position)
	}

	fn is_null_unchecked(&self, position: usize) -> bool {
		is_null_at(self.value_is_null.as_ref(), self.array_offset + position)
	}

	fn bytes_unchecked(&self, position: usize) -> &[u8] {
		&self.slice[self.offset_of(position)..self.offset_of(position + 1)]
	}

	fn spans_backing_arrays(&self) -> bool {
		self.array_offset == 0
			&& self.offsets.len() == self.position_count + 1
			&& self.slice.len() == self.offset_of(self.position_count)
			&& self.value_is_null.as_ref().is_none_or(|n| n.len() == self.position_count)
	}
}

impl Block for VariableWidthBlock {
	fn encoding_name(&self) -> &'static str {
		"VARIABLE_WIDTH"
	}

	fn position_count(&self) -> usize {
		self.position_count
	}

	fn offset_base(&self) -> usize {
		self.array_offset
	}

	fn is_null(&self, position: usize) -> Result<bool> {
		check_valid_position(position, self.position_count)?;
		Ok(self.is_null_unchecked(position))
	}

	fn may_have_null(&self) -> bool {
		self.value_is_null.is_some()
	}

	fn get_slice(&self, position: usize) -> Result<&[u8]> {
		check_valid_position(position, self.position_count)?;
		Ok(self.bytes_unchecked(position))
	}

	fn get_single_value_block(&self, position: usize) -> Result<BlockRef> {
		check_valid_position(position, self.position_count)?;
		if self.is_null_unchecked(position) {
			return Ok(Arc::new(Self::null_value_block()));
		}
		let bytes = self.bytes_unchecked(position).to_vec();
		let length = bytes.len();
		Ok(Arc::new(Self::build_unchecked(0, 1, CowVec::new(bytes), CowVec::new(vec![0, length]), None)))
	}

	fn get_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		check_valid_region(self.position_count, offset, length)?;
		Ok(Arc::new(Self::build_unchecked(
			self.array_offset + offset,
			length,
			self.slice.clone(),
			self.offsets.clone(),
			self.value_is_null.clone(),
		)))
	}

	fn copy_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		check_valid_region(self.position_count, offset, length)?;
		if offset == 0 && length == self.position_count && self.spans_backing_arrays() {
			return Ok(Arc::new(self.clone()));
		}
		let start = self.array_offset + offset;
		let offsets = compact_offsets(&self.offsets, start, length);
		let slice = self.slice[self.offsets[start]..self.offsets[start + length]].to_vec();
		let nulls = compact_nulls(self.value_is_null.as_ref(), start, length);
		Ok(Arc::new(Self::build_unchecked(0, length, CowVec::new(slice), CowVec::new(offsets), nulls)))
	}

	fn copy_positions(&self, positions: &[usize], offset: usize, length: usize) -> Result<BlockRef> {
		check_array_range(positions.len(), offset, length)?;
		let positions = &positions[offset..offset + length];
		let mut total = 0;
		for &position in positions {
			check_valid_position(position, self.position_count)?;
			total += self.length_unchecked(position);
		}
		let mut slice = Vec::with_capacity(total);
		let mut offsets = Vec::with_capacity(length + 1);
		offsets.push(0);
		for &position in positions {
			slice.extend_from_slice(self.bytes_unchecked(position));
			offsets.push(slice.len());
		}
		let nulls =
			self.value_is_null.as_ref().map(|_| BitVec::from_fn(length, |i| self.is_null_unchecked(positions[i])));
		Ok(Arc::new(Self::build_unchecked(0, length, CowVec::new(slice), CowVec::new(offsets), nulls)))
	}

	fn size_in_bytes(&self) -> u64 {
		(self.offset_of(self.position_count) - self.offset_of(0)) as u64
			+ SIZE_OF_OFFSET_AND_NULL * self.position_count as u64
	}

	fn region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		check_valid_region(self.position_count, offset, length)?;
		Ok((self.offset_of(offset + length) - self.offset_of(offset)) as u64 + SIZE_OF_OFFSET_AND_NULL * length as u64)
	}

	fn positions_size_in_bytes(&self, selected: &[bool], selected_count: usize) -> Result<u64> {
		check_valid_selection(selected, selected_count, self.position_count)?;
		let bytes: usize =
			(0..self.position_count).filter(|&p| selected[p]).map(|p| self.length_unchecked(p)).sum();
		Ok(bytes as u64 + SIZE_OF_OFFSET_AND_NULL * selected_count as u64)
	}

	fn retained_size_in_bytes(&self) -> u64 {
		self.retained_size_in_bytes
	}

	fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
		Ok(if self.is_null(position)? {
			0
		} else {
			self.length_unchecked(position) as u64
		})
	}

	fn append_null(&self) -> Result<BlockRef> {
		let offsets = append_null_to_offsets(&self.offsets, self.array_offset, self.position_count);
		let nulls = append_null_to_nulls(self.value_is_null.as_ref(), self.array_offset, self.position_count);
		Ok(Arc::new(Self::build_unchecked(
			self.array_offset,
			self.position_count + 1,
			self.slice.clone(),
			CowVec::new(offsets),
			Some(nulls),
		)))
	}

	fn write_position_to(&self, position: usize, builder: &mut dyn BlockBuilder) -> Result<()> {
		if self.is_null(position)? {
			return builder.push_null();
		}
		builder.write_bytes(self.bytes_unchecked(position))?;
		builder.close_entry()
	}

	fn write_position_to_output(&self, position: usize, output: &mut BytesMut) -> Result<()> {
		if self.is_null(position)? {
			output.put_u8(0);
			return Ok(());
		}
		let bytes = self.bytes_unchecked(position);
		let length = i32::try_from(bytes.len()).map_err(|_| invalid_argument!("slice too large: {}", bytes.len()))?;
		output.put_u8(1);
		output.put_i32_le(length);
		output.put_slice(bytes);
		Ok(())
	}

	fn to_block(&self) -> Result<BlockRef> {
		Ok(Arc::new(self.clone()))
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}
