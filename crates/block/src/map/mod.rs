// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

mod builder;
mod hash_tables;
mod single;

use std::{any::Any, sync::Arc};

pub use builder::MapBlockBuilder;
use bytes::{BufMut, BytesMut};
pub use hash_tables::{EMPTY_SLOT, HASH_MULTIPLIER, HashTables};
pub(crate) use hash_tables::{build_hash_table, hash_slot};
use once_cell::sync::OnceCell;
pub use single::SingleMapBlock;
use tessera_type::{
	Result, invalid_argument,
	util::{BitVec, CowVec},
};

use crate::{
	Block, BlockBuilder, BlockRef,
	size::{SIZE_OF_INT, SIZE_OF_OFFSET_AND_NULL, instance_size},
	util::{
		append_null_to_nulls, append_null_to_offsets, check_array_range, check_valid_position, check_valid_region,
		check_valid_selection, compact_nulls, compact_offsets, is_null_at,
	},
};

const HASH_SLOT_SIZE: u64 = SIZE_OF_INT * HASH_MULTIPLIER as u64;

/// Rows of key/value entries.
///
/// Row `i` holds the entries `offsets[start_offset + i]..offsets[start_offset + i + 1]`
/// of `key_block` and `value_block`. A null row holds no entries.
#[derive(Clone, Debug)]
pub struct MapBlock {
	start_offset: usize,
	position_count: usize,
	map_is_null: Option<BitVec>,
	offsets: CowVec<usize>,
	key_block: BlockRef,
	value_block: BlockRef,
	hash_tables: Arc<HashTables>,
	retained_size_except_hash_tables: u64,
	size_in_bytes: OnceCell<u64>,
	logical_size_in_bytes: OnceCell<u64>,
}

impl MapBlock {
	/// Validates every row and builds a map block over `offsets`.
	pub fn from_key_value_block(
		position_count: usize,
		map_is_null: Option<BitVec>,
		offsets: Vec<usize>,
		key_block: BlockRef,
		value_block: BlockRef,
	) -> Result<Self> {
		validate_constructor_arguments(0, position_count, map_is_null.as_ref(), &offsets, &key_block, &value_block)?;
		validate_entries(position_count, map_is_null.as_ref(), &offsets, key_block.position_count())?;
		Self::create_internal(
			0,
			position_count,
			map_is_null,
			CowVec::new(offsets),
			key_block,
			value_block,
			Arc::new(HashTables::new(position_count)),
		)
	}

	/// Builds a map block with the cheap structural checks only; callers
	/// pass rows already checked by `validate_entries`.
	pub(crate) fn create_internal(
		start_offset: usize,
		position_count: usize,
		map_is_null: Option<BitVec>,
		offsets: CowVec<usize>,
		key_block: BlockRef,
		value_block: BlockRef,
		hash_tables: Arc<HashTables>,
	) -> Result<Self> {
		validate_constructor_arguments(
			start_offset,
			position_count,
			map_is_null.as_ref(),
			&offsets,
			&key_block,
			&value_block,
		)?;
		if let Some(tables) = hash_tables.get() {
			if tables.len() < key_block.position_count() * HASH_MULTIPLIER {
				return Err(invalid_argument!(
					"keyBlock/valueBlock size does not match hash table size: {} {}",
					key_block.position_count(),
					tables.len()
				));
			}
		}
		let retained_size_except_hash_tables = instance_size::<Self>()
			+ key_block.retained_size_in_bytes()
			+ value_block.retained_size_in_bytes()
			+ offsets.retained_size_in_bytes()
			+ map_is_null.as_ref().map_or(0, |n| n.retained_size_in_bytes());
		Ok(Self {
			start_offset,
			position_count,
			map_is_null,
			offsets,
			key_block,
			value_block,
			hash_tables,
			retained_size_except_hash_tables,
			size_in_bytes: OnceCell::new(),
			logical_size_in_bytes: OnceCell::new(),
		})
	}

	pub fn key_block(&self) -> &BlockRef {
		&self.key_block
	}

	pub fn value_block(&self) -> &BlockRef {
		&self.value_block
	}

	pub fn hash_tables(&self) -> &Arc<HashTables> {
		&self.hash_tables
	}

	/// Offsets of the live rows, `position_count + 1` entries.
	pub fn offsets(&self) -> &[usize] {
		&self.offsets[self.start_offset..=self.start_offset + self.position_count]
	}

	pub fn is_hash_tables_present(&self) -> bool {
		self.hash_tables.is_loaded()
	}

	/// Builds the shared key tables unless some reader already did.
	pub fn ensure_hash_table_loaded(&self) -> Result<&CowVec<u32>> {
		self.hash_tables.get_or_load(&self.offsets, self.map_is_null.as_ref(), self.key_block.as_ref())
	}

	/// Entry range of the row at `position`, as key block positions.
	pub fn entry_range(&self, position: usize) -> Result<(usize, usize)> {
		check_valid_position(position, self.position_count)?;
		Ok((self.offset_of(position), self.offset_of(position + 1)))
	}

	fn offset_of(&self, position: usize) -> usize {
		self.offsets[self.start_offset + position]
	}

	fn is_null_unchecked(&self, position: usize) -> bool {
		is_null_at(self.map_is_null.as_ref(), self.start_offset + position)
	}

	fn entries_size(&self, entries_start: usize, entry_count: usize, row_count: usize) -> Result<u64> {
		Ok(self.key_block.region_size_in_bytes(entries_start, entry_count)?
			+ self.value_block.region_size_in_bytes(entries_start, entry_count)?
			+ SIZE_OF_OFFSET_AND_NULL * row_count as u64
			+ HASH_SLOT_SIZE * entry_count as u64)
	}

	fn entries_logical_size(&self, entries_start: usize, entry_count: usize, row_count: usize) -> Result<u64> {
		Ok(self.key_block.region_logical_size_in_bytes(entries_start, entry_count)?
			+ self.value_block.region_logical_size_in_bytes(entries_start, entry_count)?
			+ SIZE_OF_OFFSET_AND_NULL * row_count as u64
			+ HASH_SLOT_SIZE * entry_count as u64)
	}

	fn key_and_value_fixed_size(&self) -> Option<u64> {
		Some(self.key_block.fixed_size_in_bytes_per_position()? + self.value_block.fixed_size_in_bytes_per_position()?)
	}

	/// Copies the hash slots of `start..end` entries when the tables are built.
	fn copy_hash_slots(&self, ranges: impl Iterator<Item = (usize, usize)>) -> Option<CowVec<u32>> {
		let tables = self.hash_tables.get()?;
		let mut copy = Vec::new();
		for (start, end) in ranges {
			copy.extend_from_slice(&tables[start * HASH_MULTIPLIER..end * HASH_MULTIPLIER]);
		}
		Some(CowVec::new(copy))
	}
}

/// Checks every row of a map: ascending offsets, empty null rows and
/// entries inside the key block.
pub(crate) fn validate_entries(
	position_count: usize,
	map_is_null: Option<&BitVec>,
	offsets: &[usize],
	key_count: usize,
) -> Result<()> {
	for row in 0..position_count {
		let (start, end) = (offsets[row], offsets[row + 1]);
		if end < start {
			return Err(invalid_argument!(
				"Offset is not monotonically ascending. offsets[{}]={}, offsets[{}]={}",
				row,
				start,
				row + 1,
				end
			));
		}
		if is_null_at(map_is_null, row) && end != start {
			return Err(invalid_argument!("A null map must have zero entries"));
		}
	}
	if offsets[position_count] > key_count {
		return Err(invalid_argument!("last offset {} exceeds key block size {}", offsets[position_count], key_count));
	}
	Ok(())
}

fn validate_constructor_arguments(
	start_offset: usize,
	position_count: usize,
	map_is_null: Option<&BitVec>,
	offsets: &[usize],
	key_block: &BlockRef,
	value_block: &BlockRef,
) -> Result<()> {
	if let Some(nulls) = map_is_null {
		if nulls.len().saturating_sub(start_offset) < position_count {
			return Err(invalid_argument!("isNull length is less than positionCount"));
		}
	}
	if offsets.len().saturating_sub(start_offset) < position_count + 1 {
		return Err(invalid_argument!("offsets length is less than positionCount"));
	}
	if key_block.position_count() != value_block.position_count() {
		return Err(invalid_argument!(
			"keyBlock and valueBlock has different size: {} {}",
			key_block.position_count(),
			value_block.position_count()
		));
	}
	Ok(())
}

/// Equality over content; the derived hash tables are ignored.
impl PartialEq for MapBlock {
	fn eq(&self, other: &Self) -> bool {
		self.start_offset == other.start_offset
			&& self.position_count == other.position_count
			&& self.map_is_null == other.map_is_null
			&& self.offsets == other.offsets
			&& Arc::ptr_eq(&self.key_block, &other.key_block)
			&& Arc::ptr_eq(&self.value_block, &other.value_block)
			&& self.retained_size_except_hash_tables == other.retained_size_except_hash_tables
	}
}

impl Block for MapBlock {
	fn encoding_name(&self) -> &'static str {
		"MAP"
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
		self.map_is_null.is_some()
	}

	/// Interleaved key/value view of the row at `position`.
	fn get_block(&self, position: usize) -> Result<BlockRef> {
		let (start, end) = self.entry_range(position)?;
		if self.is_null_unchecked(position) {
			return Err(invalid_argument!("map at position {} is null", position));
		}
		Ok(Arc::new(SingleMapBlock::new(self.clone(), position, start * 2, (end - start) * 2)))
	}

	fn get_single_value_block(&self, position: usize) -> Result<BlockRef> {
		let (start, end) = self.entry_range(position)?;
		let entry_count = end - start;
		let key_block = self.key_block.copy_region(start, entry_count)?;
		let value_block = self.value_block.copy_region(start, entry_count)?;
		let hash_tables = self.copy_hash_slots(std::iter::once((start, end)));
		let nulls = self.is_null_unchecked(position).then(|| BitVec::repeat(1, true));
		Ok(Arc::new(Self::create_internal(
			0,
			1,
			nulls,
			CowVec::new(vec![0, entry_count]),
			key_block,
			value_block,
			Arc::new(HashTables::with_tables(hash_tables, 1)),
		)?))
	}

	fn get_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		check_valid_region(self.position_count, offset, length)?;
		Ok(Arc::new(Self::create_internal(
			self.start_offset + offset,
			length,
			self.map_is_null.clone(),
			self.offsets.clone(),
			self.key_block.clone(),
			self.value_block.clone(),
			self.hash_tables.clone(),
		)?))
	}

	fn copy_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		check_valid_region(self.position_count, offset, length)?;
		let start = self.offset_of(offset);
		let end = self.offset_of(offset + length);
		let spans_backing_arrays = self.start_offset == 0
			&& offset == 0
			&& length == self.position_count
			&& self.offsets.len() == length + 1
			&& start == 0
			&& end == self.key_block.position_count()
			&& self.map_is_null.as_ref().is_none_or(|n| n.len() == length);
		if spans_backing_arrays {
			return Ok(Arc::new(self.clone()));
		}

		let key_block = self.key_block.copy_region(start, end - start)?;
		let value_block = self.value_block.copy_region(start, end - start)?;
		let offsets = compact_offsets(&self.offsets, self.start_offset + offset, length);
		let nulls = compact_nulls(self.map_is_null.as_ref(), self.start_offset + offset, length);
		let hash_tables = self.copy_hash_slots(std::iter::once((start, end)));
		Ok(Arc::new(Self::create_internal(
			0,
			length,
			nulls,
			CowVec::new(offsets),
			key_block,
			value_block,
			Arc::new(HashTables::with_tables(hash_tables, length)),
		)?))
	}

	fn copy_positions(&self, positions: &[usize], offset: usize, length: usize) -> Result<BlockRef> {
		check_array_range(positions.len(), offset, length)?;
		let positions = &positions[offset..offset + length];
		let mut offsets = Vec::with_capacity(length + 1);
		offsets.push(0);
		let mut nulls = BitVec::with_capacity(length);
		let mut entry_positions = Vec::new();
		let mut ranges = Vec::with_capacity(length);
		for &position in positions {
			let (start, end) = self.entry_range(position)?;
			nulls.push(self.is_null_unchecked(position));
			entry_positions.extend(start..end);
			ranges.push((start, end));
			offsets.push(entry_positions.len());
		}

		let hash_tables = self.copy_hash_slots(ranges.into_iter());
		let key_block = self.key_block.copy_positions(&entry_positions, 0, entry_positions.len())?;
		let value_block = self.value_block.copy_positions(&entry_positions, 0, entry_positions.len())?;
		let nulls = (nulls.count_ones() > 0).then_some(nulls);
		Ok(Arc::new(Self::create_internal(
			0,
			length,
			nulls,
			CowVec::new(offsets),
			key_block,
			value_block,
			Arc::new(HashTables::with_tables(hash_tables, length)),
		)?))
	}

	fn size_in_bytes(&self) -> u64 {
		*self.size_in_bytes.get_or_init(|| {
			let start = self.offset_of(0);
			let end = self.offset_of(self.position_count);
			self.entries_size(start, end - start, self.position_count).unwrap_or(0)
		})
	}

	fn region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		check_valid_region(self.position_count, offset, length)?;
		let start = self.offset_of(offset);
		let end = self.offset_of(offset + length);
		self.entries_size(start, end - start, length)
	}

	fn positions_size_in_bytes(&self, selected: &[bool], selected_count: usize) -> Result<u64> {
		check_valid_selection(selected, selected_count, self.position_count)?;
		if selected_count == 0 {
			return Ok(0);
		}
		if selected_count == self.position_count {
			return Ok(self.size_in_bytes());
		}

		let (entry_count, entries_size) = match self.key_and_value_fixed_size() {
			Some(fixed) => {
				let entry_count: usize = (0..self.position_count)
					.filter(|&p| selected[p])
					.map(|p| self.offset_of(p + 1) - self.offset_of(p))
					.sum();
				(entry_count, fixed * entry_count as u64)
			}
			None => {
				let mut entries = vec![false; self.key_block.position_count()];
				let mut entry_count = 0;
				for position in (0..self.position_count).filter(|&p| selected[p]) {
					for entry in self.offset_of(position)..self.offset_of(position + 1) {
						entries[entry] = true;
						entry_count += 1;
					}
				}
				let size = self.key_block.positions_size_in_bytes(&entries, entry_count)?
					+ self.value_block.positions_size_in_bytes(&entries, entry_count)?;
				(entry_count, size)
			}
		};
		Ok(entries_size + SIZE_OF_OFFSET_AND_NULL * selected_count as u64 + HASH_SLOT_SIZE * entry_count as u64)
	}

	fn retained_size_in_bytes(&self) -> u64 {
		self.retained_size_except_hash_tables + self.hash_tables.retained_size_in_bytes()
	}

	fn logical_size_in_bytes(&self) -> u64 {
		*self.logical_size_in_bytes.get_or_init(|| {
			let start = self.offset_of(0);
			let end = self.offset_of(self.position_count);
			self.entries_logical_size(start, end - start, self.position_count).unwrap_or(0)
		})
	}

	fn region_logical_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		check_valid_region(self.position_count, offset, length)?;
		let start = self.offset_of(offset);
		let end = self.offset_of(offset + length);
		self.entries_logical_size(start, end - start, length)
	}

	fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
		if self.is_null(position)? {
			return Ok(0);
		}
		let (start, end) = self.entry_range(position)?;
		let mut size = 0;
		for entry in start..end {
			size += self.key_block.estimated_data_size_for_stats(entry)?;
			size += self.value_block.estimated_data_size_for_stats(entry)?;
		}
		Ok(size)
	}

	/// The appended row has no entries; built hash tables stay shared.
	fn append_null(&self) -> Result<BlockRef> {
		let nulls = append_null_to_nulls(self.map_is_null.as_ref(), self.start_offset, self.position_count);
		let offsets = append_null_to_offsets(&self.offsets, self.start_offset, self.position_count);
		let hash_tables = if self.hash_tables.is_loaded() {
			self.hash_tables.clone()
		} else {
			Arc::new(HashTables::new(self.start_offset + self.position_count + 1))
		};
		Ok(Arc::new(Self::create_internal(
			self.start_offset,
			self.position_count + 1,
			Some(nulls),
			CowVec::new(offsets),
			self.key_block.clone(),
			self.value_block.clone(),
			hash_tables,
		)?))
	}

	fn write_position_to(&self, position: usize, builder: &mut dyn BlockBuilder) -> Result<()> {
		check_valid_position(position, self.position_count)?;
		builder.append_structure(self, position)
	}

	/// `1`, the entry count, then each key and value in their own position format.
	fn write_position_to_output(&self, position: usize, output: &mut BytesMut) -> Result<()> {
		if self.is_null(position)? {
			output.put_u8(0);
			return Ok(());
		}
		let (start, end) = self.entry_range(position)?;
		let entry_count = i32::try_from(end - start).map_err(|_| invalid_argument!("too many map entries"))?;
		output.put_u8(1);
		output.put_i32_le(entry_count);
		for entry in start..end {
			self.key_block.write_position_to_output(entry, output)?;
			self.value_block.write_position_to_output(entry, output)?;
		}
		Ok(())
	}

	fn is_loaded(&self) -> bool {
		self.key_block.is_loaded() && self.value_block.is_loaded()
	}

	fn to_block(&self) -> Result<BlockRef> {
		if self.is_loaded() {
			return Ok(Arc::new(self.clone()));
		}
		Ok(Arc::new(Self::create_internal(
			self.start_offset,
			self.position_count,
			self.map_is_null.clone(),
			self.offsets.clone(),
			self.key_block.to_block()?,
			self.value_block.to_block()?,
			self.hash_tables.clone(),
		)?))
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}
