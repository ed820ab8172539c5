// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

mod builder;
mod single;

use std::{any::Any, sync::Arc};

pub use builder::RowBlockBuilder;
use bytes::{BufMut, BytesMut};
pub use single::SingleRowBlock;
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

/// Rows of a fixed number of fields.
///
/// Null rows take no position in the field blocks: the field position of
/// row `i` is `field_block_offsets[start_offset + i]`, and a null row repeats
/// the offset of the row after it.
#[derive(Clone, Debug)]
pub struct RowBlock {
	start_offset: usize,
	position_count: usize,
	row_is_null: Option<BitVec>,
	field_block_offsets: CowVec<usize>,
	field_blocks: Arc<[BlockRef]>,
	retained_size_in_bytes: u64,
}

impl RowBlock {
	/// Rows over `field_blocks`, which hold one position per non-null row.
	pub fn from_field_blocks(
		position_count: usize,
		row_is_null: Option<BitVec>,
		field_blocks: Vec<BlockRef>,
	) -> Result<Self> {
		if field_blocks.is_empty() {
			return Err(invalid_argument!("Number of fields in RowBlock must be positive"));
		}
		if let Some(nulls) = &row_is_null {
			if nulls.len() < position_count {
				return Err(invalid_argument!("rowIsNull length is less than positionCount"));
			}
		}

		let mut offsets = Vec::with_capacity(position_count + 1);
		offsets.push(0);
		let mut next = 0;
		for row in 0..position_count {
			if !is_null_at(row_is_null.as_ref(), row) {
				next += 1;
			}
			offsets.push(next);
		}
		for (index, field) in field_blocks.iter().enumerate() {
			if field.position_count() != next {
				return Err(invalid_argument!(
					"field block {} has {} positions but {} rows are not null",
					index,
					field.position_count(),
					next
				));
			}
		}
		let row_is_null = row_is_null.filter(|nulls| nulls.any_in(0, position_count));
		Self::create_internal(0, position_count, row_is_null, CowVec::new(offsets), field_blocks.into())
	}

	/// Builds a row block with the cheap structural checks only; callers pass
	/// offsets that already step by one per non-null row.
	pub(crate) fn create_internal(
		start_offset: usize,
		position_count: usize,
		row_is_null: Option<BitVec>,
		field_block_offsets: CowVec<usize>,
		field_blocks: Arc<[BlockRef]>,
	) -> Result<Self> {
		if let Some(nulls) = &row_is_null {
			if nulls.len().saturating_sub(start_offset) < position_count {
				return Err(invalid_argument!("rowIsNull length is less than positionCount"));
			}
		}
		if field_block_offsets.len().saturating_sub(start_offset) < position_count + 1 {
			return Err(invalid_argument!("fieldBlockOffsets length is less than positionCount"));
		}
		let last = field_block_offsets[start_offset + position_count];
		for field in field_blocks.iter() {
			if field.position_count() < last {
				return Err(invalid_argument!(
					"field block has {} positions but rows reference {}",
					field.position_count(),
					last
				));
			}
		}
		let retained_size_in_bytes = instance_size::<Self>()
			+ field_block_offsets.retained_size_in_bytes()
			+ row_is_null.as_ref().map_or(0, |n| n.retained_size_in_bytes())
			+ field_blocks.iter().map(|f| f.retained_size_in_bytes()).sum::<u64>();
		Ok(Self {
			start_offset,
			position_count,
			row_is_null,
			field_block_offsets,
			field_blocks,
			retained_size_in_bytes,
		})
	}

	pub fn field_count(&self) -> usize {
		self.field_blocks.len()
	}

	/// Field `index` as stored, covering every row of the backing storage.
	pub fn raw_field_block(&self, index: usize) -> Result<&BlockRef> {
		self.field_blocks
			.get(index)
			.ok_or_else(|| invalid_argument!("field {} does not exist, row has {} fields", index, self.field_blocks.len()))
	}

	/// Position of the row at `position` inside the field blocks.
	pub fn field_block_offset(&self, position: usize) -> Result<usize> {
		check_valid_position(position, self.position_count)?;
		Ok(self.field_block_offsets[self.start_offset + position])
	}

	/// Field positions of the live rows, `position_count + 1` entries.
	pub fn field_block_offsets(&self) -> &[usize] {
		&self.field_block_offsets[self.start_offset..=self.start_offset + self.position_count]
	}

	/// Field blocks cut to the rows of this block, nulls excluded.
	pub fn field_blocks(&self) -> Result<Vec<BlockRef>> {
		let (start, end) = self.field_range(0, self.position_count);
		self.field_blocks.iter().map(|f| f.get_region(start, end - start)).collect()
	}

	fn field_range(&self, offset: usize, length: usize) -> (usize, usize) {
		let start = self.field_block_offsets[self.start_offset + offset];
		let end = self.field_block_offsets[self.start_offset + offset + length];
		(start, end)
	}

	fn is_null_unchecked(&self, position: usize) -> bool {
		is_null_at(self.row_is_null.as_ref(), self.start_offset + position)
	}

	fn fields_size(&self, start: usize, count: usize, row_count: usize, logical: bool) -> Result<u64> {
		let mut size = SIZE_OF_OFFSET_AND_NULL * row_count as u64;
		for field in self.field_blocks.iter() {
			size += if logical {
				field.region_logical_size_in_bytes(start, count)?
			} else {
				field.region_size_in_bytes(start, count)?
			};
		}
		Ok(size)
	}
}

impl PartialEq for RowBlock {
	fn eq(&self, other: &Self) -> bool {
		self.start_offset == other.start_offset
			&& self.position_count == other.position_count
			&& self.row_is_null == other.row_is_null
			&& self.field_block_offsets == other.field_block_offsets
			&& self.field_blocks.len() == other.field_blocks.len()
			&& self.field_blocks.iter().zip(other.field_blocks.iter()).all(|(a, b)| Arc::ptr_eq(a, b))
	}
}

impl Block for RowBlock {
	fn encoding_name(&self) -> &'static str {
		"ROW"
	}

	fn position_count(&self) -> usize {
		self.position_count
	}

	fn offset_base(&self) -> usize {
		self.start_offset
	}

	fn is_null(&self, position: usize) -> Result<bool> {
		check_valid_position(position, self.position_count)?;
		Ok(self.is_null_unchecked(position))
	}

	fn may_have_null(&self) -> bool {
		self.row_is_null.is_some()
	}

	/// Fields of the row at `position`, addressed by field index.
	fn get_block(&self, position: usize) -> Result<BlockRef> {
		if self.is_null(position)? {
			return Err(invalid_argument!("row at position {} is null", position));
		}
		let row_index = self.field_block_offset(position)?;
		Ok(Arc::new(SingleRowBlock::new(row_index, self.field_blocks.clone())))
	}

	fn get_single_value_block(&self, position: usize) -> Result<BlockRef> {
		self.copy_region(position, 1)
	}

	fn get_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		check_valid_region(self.position_count, offset, length)?;
		Ok(Arc::new(Self::create_internal(
			self.start_offset + offset,
			length,
			self.row_is_null.clone(),
			self.field_block_offsets.clone(),
			self.field_blocks.clone(),
		)?))
	}

	fn copy_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		check_valid_region(self.position_count, offset, length)?;
		let (start, end) = self.field_range(offset, length);
		let spans_backing_arrays = self.start_offset == 0
			&& offset == 0
			&& length == self.position_count
			&& self.field_block_offsets.len() == length + 1
			&& self.row_is_null.as_ref().is_none_or(|n| n.len() == length)
			&& self.field_blocks.iter().all(|f| f.offset_base() == 0 && f.position_count() == end - start);
		if spans_backing_arrays {
			return Ok(Arc::new(self.clone()));
		}

		let field_blocks = self
			.field_blocks
			.iter()
			.map(|f| f.copy_region(start, end - start))
			.collect::<Result<Vec<_>>>()?;
		let offsets = compact_offsets(&self.field_block_offsets, self.start_offset + offset, length);
		let nulls = compact_nulls(self.row_is_null.as_ref(), self.start_offset + offset, length);
		Ok(Arc::new(Self::create_internal(0, length, nulls, CowVec::new(offsets), field_blocks.into())?))
	}

	fn copy_positions(&self, positions: &[usize], offset: usize, length: usize) -> Result<BlockRef> {
		check_array_range(positions.len(), offset, length)?;
		let mut offsets = Vec::with_capacity(length + 1);
		offsets.push(0);
		let mut nulls = BitVec::with_capacity(length);
		let mut field_positions = Vec::with_capacity(length);
		for &position in &positions[offset..offset + length] {
			check_valid_position(position, self.position_count)?;
			if self.is_null_unchecked(position) {
				nulls.push(true);
			} else {
				nulls.push(false);
				field_positions.push(self.field_block_offsets[self.start_offset + position]);
			}
			offsets.push(field_positions.len());
		}
		let field_blocks = self
			.field_blocks
			.iter()
			.map(|f| f.copy_positions(&field_positions, 0, field_positions.len()))
			.collect::<Result<Vec<_>>>()?;
		let nulls = (nulls.count_ones() > 0).then_some(nulls);
		Ok(Arc::new(Self::create_internal(0, length, nulls, CowVec::new(offsets), field_blocks.into())?))
	}

	fn size_in_bytes(&self) -> u64 {
		self.region_size_in_bytes(0, self.position_count).unwrap_or(0)
	}

	fn region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		check_valid_region(self.position_count, offset, length)?;
		let (start, end) = self.field_range(offset, length);
		self.fields_size(start, end - start, length, false)
	}

	fn positions_size_in_bytes(&self, selected: &[bool], selected_count: usize) -> Result<u64> {
		check_valid_selection(selected, selected_count, self.position_count)?;
		if selected_count == 0 {
			return Ok(0);
		}
		if selected_count == self.position_count {
			return Ok(self.size_in_bytes());
		}
		let field_position_count = self.field_blocks[0].position_count();
		let mut field_selected = vec![false; field_position_count];
		let mut field_selected_count = 0;
		for position in (0..self.position_count).filter(|&p| selected[p]) {
			if !self.is_null_unchecked(position) {
				field_selected[self.field_block_offsets[self.start_offset + position]] = true;
				field_selected_count += 1;
			}
		}
		let mut size = SIZE_OF_OFFSET_AND_NULL * selected_count as u64;
		for field in self.field_blocks.iter() {
			size += field.positions_size_in_bytes(&field_selected, field_selected_count)?;
		}
		Ok(size)
	}

	fn retained_size_in_bytes(&self) -> u64 {
		self.retained_size_in_bytes
	}

	fn logical_size_in_bytes(&self) -> u64 {
		self.region_logical_size_in_bytes(0, self.position_count).unwrap_or(0)
	}

	fn region_logical_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		check_valid_region(self.position_count, offset, length)?;
		let (start, end) = self.field_range(offset, length);
		self.fields_size(start, end - start, length, true)
	}

	fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
		if self.is_null(position)? {
			return Ok(0);
		}
		let row_index = self.field_block_offset(position)?;
		let mut size = 0;
		for field in self.field_blocks.iter() {
			size += field.estimated_data_size_for_stats(row_index)?;
		}
		Ok(size)
	}

	fn append_null(&self) -> Result<BlockRef> {
		let nulls = append_null_to_nulls(self.row_is_null.as_ref(), self.start_offset, self.position_count);
		let offsets = append_null_to_offsets(&self.field_block_offsets, self.start_offset, self.position_count);
		Ok(Arc::new(Self::create_internal(
			self.start_offset,
			self.position_count + 1,
			Some(nulls),
			CowVec::new(offsets),
			self.field_blocks.clone(),
		)?))
	}

	fn write_position_to(&self, position: usize, builder: &mut dyn BlockBuilder) -> Result<()> {
		check_valid_position(position, self.position_count)?;
		builder.append_structure(self, position)
	}

	/// `1` followed by each field in its own position format.
	fn write_position_to_output(&self, position: usize, output: &mut BytesMut) -> Result<()> {
		if self.is_null(position)? {
			output.put_u8(0);
			return Ok(());
		}
		let row_index = self.field_block_offset(position)?;
		output.put_u8(1);
		for field in self.field_blocks.iter() {
			field.write_position_to_output(row_index, output)?;
		}
		Ok(())
	}

	fn is_loaded(&self) -> bool {
		self.field_blocks.iter().all(|f| f.is_loaded())
	}

	fn to_block(&self) -> Result<BlockRef> {
		if self.is_loaded() {
			return Ok(Arc::new(self.clone()));
		}
		let field_blocks = self.field_blocks.iter().map(|f| f.to_block()).collect::<Result<Vec<_>>>()?;
		Ok(Arc::new(Self::create_internal(
			self.start_offset,
			self.position_count,
			self.row_is_null.clone(),
			self.field_block_offsets.clone(),
			field_blocks.into(),
		)?))
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}
