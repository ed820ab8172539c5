// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

mod id;

use std::{any::Any, sync::Arc};

use bytes::BytesMut;
pub use id::DictionaryId;
use once_cell::sync::OnceCell;
use tessera_type::{Result, invalid_argument, util::CowVec};
use tracing::{debug, instrument};

use crate::{
	Block, BlockBuilder, BlockRef,
	size::{SIZE_OF_INT, instance_size},
	util::{check_array_range, check_valid_position, check_valid_region, check_valid_selection},
};

#[derive(Clone, Copy, Debug)]
struct CompactSize {
	unique_ids: usize,
	size_in_bytes: u64,
}

/// Positions that map through an id array into a shared dictionary block.
///
/// The dictionary is never copied or mutated. Ids are not validated when the
/// block is built; reading a position whose id falls outside the dictionary
/// fails at read time.
#[derive(Clone, Debug)]
pub struct DictionaryBlock {
	ids_offset: usize,
	position_count: usize,
	dictionary: BlockRef,
	ids: CowVec<usize>,
	retained_size_in_bytes: u64,
	compact_size: OnceCell<CompactSize>,
	logical_size_in_bytes: OnceCell<u64>,
	dictionary_source_id: DictionaryId,
}

impl DictionaryBlock {
	/// Dictionary block with one position per id and a fresh source id.
	pub fn new(dictionary: BlockRef, ids: Vec<usize>) -> Result<Self> {
		let position_count = ids.len();
		Self::with_source_id(0, position_count, dictionary, ids, false, DictionaryId::random())
	}

	pub fn with_source_id(
		ids_offset: usize,
		position_count: usize,
		dictionary: BlockRef,
		ids: impl Into<CowVec<usize>>,
		dictionary_is_compacted: bool,
		dictionary_source_id: DictionaryId,
	) -> Result<Self> {
		let ids = ids.into();
		if ids.len().saturating_sub(ids_offset) < position_count {
			return Err(invalid_argument!("ids length is less than positionCount"));
		}
		let retained_size_in_bytes =
			instance_size::<Self>() + dictionary.retained_size_in_bytes() + ids.retained_size_in_bytes();
		let compact_size = OnceCell::new();
		if dictionary_is_compacted {
			let _ = compact_size.set(CompactSize {
				unique_ids: dictionary.position_count(),
				size_in_bytes: dictionary.size_in_bytes() + SIZE_OF_INT * position_count as u64,
			});
		}
		Ok(Self {
			ids_offset,
			position_count,
			dictionary,
			ids,
			retained_size_in_bytes,
			compact_size,
			logical_size_in_bytes: OnceCell::new(),
			dictionary_source_id,
		})
	}

	pub fn dictionary(&self) -> &BlockRef {
		&self.dictionary
	}

	pub fn dictionary_source_id(&self) -> DictionaryId {
		self.dictionary_source_id
	}

	/// Ids of the live positions.
	pub fn ids(&self) -> &[usize] {
		&self.ids[self.ids_offset..self.ids_offset + self.position_count]
	}

	pub fn id(&self, position: usize) -> Result<usize> {
		check_valid_position(position, self.position_count)?;
		Ok(self.id_unchecked(position))
	}

	fn id_unchecked(&self, position: usize) -> usize {
		self.ids[self.ids_offset + position]
	}

	/// Whether every dictionary entry is referenced by some position.
	pub fn is_compact(&self) -> bool {
		self.compact_size().unique_ids == self.dictionary.position_count()
	}

	pub fn unique_ids(&self) -> usize {
		self.compact_size().unique_ids
	}

	fn compact_size(&self) -> CompactSize {
		*self.compact_size.get_or_init(|| {
			let (used, unique_ids) = self.mark_used(0..self.position_count);
			CompactSize {
				unique_ids,
				size_in_bytes: self.dictionary_size_for(&used, unique_ids)
					+ SIZE_OF_INT * self.position_count as u64,
			}
		})
	}

	/// Marks the dictionary entries referenced by `positions`. Ids outside the
	/// dictionary are ignored.
	fn mark_used(&self, positions: impl Iterator<Item = usize>) -> (Vec<bool>, usize) {
		let mut used = vec![false; self.dictionary.position_count()];
		let mut unique_ids = 0;
		for position in positions {
			if let Some(slot) = used.get_mut(self.id_unchecked(position)) {
				if !*slot {
					*slot = true;
					unique_ids += 1;
				}
			}
		}
		(used, unique_ids)
	}

	fn dictionary_size_for(&self, used: &[bool], unique_ids: usize) -> u64 {
		if unique_ids == self.dictionary.position_count() {
			return self.dictionary.size_in_bytes();
		}
		// dictionaries without per-position sizes are charged in full
		self.dictionary
			.positions_size_in_bytes(used, unique_ids)
			.unwrap_or_else(|_| self.dictionary.size_in_bytes())
	}

	fn logical_size_for(&self, offset: usize, length: usize) -> u64 {
		let mut seen: Vec<Option<u64>> = vec![None; self.dictionary.position_count()];
		let mut size = 0;
		for position in offset..offset + length {
			let Some(slot) = seen.get_mut(self.id_unchecked(position)) else {
				continue;
			};
			let id = self.id_unchecked(position);
			// id is inside the dictionary here; only single-element views lack region sizes
			size += *slot.get_or_insert_with(|| {
				self.dictionary
					.region_logical_size_in_bytes(id, 1)
					.unwrap_or_else(|_| self.dictionary.estimated_data_size_for_stats(id).unwrap_or(0))
			});
		}
		size
	}

	/// Rewrites the dictionary to the referenced entries, in first-reference
	/// order, under a new source id. A compact block is returned unchanged.
	#[instrument(name = "block::dictionary::compact", level = "trace", skip_all, fields(positions = self.position_count))]
	pub fn compact(&self) -> Result<DictionaryBlock> {
		if self.is_compact() {
			return Ok(self.clone());
		}

		let dictionary_count = self.dictionary.position_count();
		let mut remap: Vec<Option<usize>> = vec![None; dictionary_count];
		let mut dictionary_positions = Vec::new();
		let mut ids = Vec::with_capacity(self.position_count);
		for position in 0..self.position_count {
			let id = self.id_unchecked(position);
			check_valid_position(id, dictionary_count)?;
			let new_id = *remap[id].get_or_insert_with(|| {
				dictionary_positions.push(id);
				dictionary_positions.len() - 1
			});
			ids.push(new_id);
		}

		let dictionary = self.dictionary.copy_positions(&dictionary_positions, 0, dictionary_positions.len())?;
		debug!(before = dictionary_count, after = dictionary_positions.len(), "compacted dictionary");
		Self::with_source_id(0, self.position_count, dictionary, ids, true, DictionaryId::random())
	}

	/// The positions as a block of the dictionary's own encoding.
	pub fn flatten(&self) -> Result<BlockRef> {
		self.dictionary.copy_positions(&self.ids, self.ids_offset, self.position_count)
	}
}

impl Block for DictionaryBlock {
	fn encoding_name(&self) -> &'static str {
		"DICTIONARY"
	}

	fn position_count(&self) -> usize {
		self.position_count
	}

	fn offset_base(&self) -> usize {
		self.ids_offset
	}

	fn is_null(&self, position: usize) -> Result<bool> {
		self.dictionary.is_null(self.id(position)?)
	}

	fn may_have_null(&self) -> bool {
		self.dictionary.may_have_null()
	}

	fn get_byte(&self, position: usize) -> Result<i8> {
		self.dictionary.get_byte(self.id(position)?)
	}

	fn get_short(&self, position: usize) -> Result<i16> {
		self.dictionary.get_short(self.id(position)?)
	}

	fn get_int(&self, position: usize) -> Result<i32> {
		self.dictionary.get_int(self.id(position)?)
	}

	fn get_long(&self, position: usize) -> Result<i64> {
		self.dictionary.get_long(self.id(position)?)
	}

	fn get_slice(&self, position: usize) -> Result<&[u8]> {
		self.dictionary.get_slice(self.id(position)?)
	}

	fn get_block(&self, position: usize) -> Result<BlockRef> {
		self.dictionary.get_block(self.id(position)?)
	}

	fn get_single_value_block(&self, position: usize) -> Result<BlockRef> {
		self.dictionary.get_single_value_block(self.id(position)?)
	}

	fn get_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		check_valid_region(self.position_count, offset, length)?;
		Ok(Arc::new(Self::with_source_id(
			self.ids_offset + offset,
			length,
			self.dictionary.clone(),
			self.ids.clone(),
			false,
			self.dictionary_source_id,
		)?))
	}

	fn copy_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		check_valid_region(self.position_count, offset, length)?;
		if offset == 0 && length == self.position_count && self.is_compact() {
			return Ok(Arc::new(self.clone()));
		}
		let start = self.ids_offset + offset;
		let ids = self.ids[start..start + length].to_vec();
		Ok(Arc::new(DictionaryBlock::new(self.dictionary.clone(), ids)?.compact()?))
	}

	fn copy_positions(&self, positions: &[usize], offset: usize, length: usize) -> Result<BlockRef> {
		check_array_range(positions.len(), offset, length)?;
		let dictionary_count = self.dictionary.position_count();
		let mut remap: Vec<Option<usize>> = vec![None; dictionary_count];
		let mut dictionary_positions = Vec::new();
		let mut ids = Vec::with_capacity(length);
		for &position in &positions[offset..offset + length] {
			let id = self.id(position)?;
			check_valid_position(id, dictionary_count)?;
			let new_id = *remap[id].get_or_insert_with(|| {
				dictionary_positions.push(id);
				dictionary_positions.len() - 1
			});
			ids.push(new_id);
		}
		let dictionary = self.dictionary.copy_positions(&dictionary_positions, 0, dictionary_positions.len())?;
		Ok(Arc::new(Self::with_source_id(0, length, dictionary, ids, true, DictionaryId::random())?))
	}

	/// Composes `positions` with the id array; the result keeps this block's
	/// dictionary and source id.
	fn get_positions(&self, positions: &[usize], offset: usize, length: usize) -> Result<BlockRef> {
		check_array_range(positions.len(), offset, length)?;
		let dictionary_count = self.dictionary.position_count();
		let track_usage = length >= dictionary_count && self.is_compact();
		let mut used = if track_usage {
			vec![false; dictionary_count]
		} else {
			Vec::new()
		};
		let mut unique_ids = 0;
		let mut ids = Vec::with_capacity(length);
		for &position in &positions[offset..offset + length] {
			let id = self.id(position)?;
			ids.push(id);
			if let Some(slot) = used.get_mut(id) {
				if !*slot {
					*slot = true;
					unique_ids += 1;
				}
			}
		}

		let is_compact = track_usage && unique_ids == dictionary_count;
		let result = Self::with_source_id(
			0,
			length,
			self.dictionary.clone(),
			ids,
			is_compact,
			self.dictionary_source_id,
		)?;
		if track_usage && !is_compact {
			let _ = result.compact_size.set(CompactSize {
				unique_ids,
				size_in_bytes: self.dictionary_size_for(&used, unique_ids) + SIZE_OF_INT * length as u64,
			});
		}
		Ok(Arc::new(result))
	}

	fn size_in_bytes(&self) -> u64 {
		self.compact_size().size_in_bytes
	}

	fn region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		check_valid_region(self.position_count, offset, length)?;
		if offset == 0 && length == self.position_count {
			return Ok(self.size_in_bytes());
		}
		let (used, unique_ids) = self.mark_used(offset..offset + length);
		Ok(self.dictionary_size_for(&used, unique_ids) + SIZE_OF_INT * length as u64)
	}

	fn positions_size_in_bytes(&self, selected: &[bool], selected_count: usize) -> Result<u64> {
		check_valid_selection(selected, selected_count, self.position_count)?;
		if selected_count == self.position_count {
			return Ok(self.size_in_bytes());
		}
		let (used, unique_ids) = self.mark_used((0..self.position_count).filter(|&p| selected[p]));
		Ok(self.dictionary_size_for(&used, unique_ids) + SIZE_OF_INT * selected_count as u64)
	}

	fn retained_size_in_bytes(&self) -> u64 {
		self.retained_size_in_bytes
	}

	fn logical_size_in_bytes(&self) -> u64 {
		*self.logical_size_in_bytes.get_or_init(|| self.logical_size_for(0, self.position_count))
	}

	fn region_logical_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		check_valid_region(self.position_count, offset, length)?;
		if offset == 0 && length == self.position_count {
			return Ok(self.logical_size_in_bytes());
		}
		Ok(self.logical_size_for(offset, length))
	}

	fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
		self.dictionary.estimated_data_size_for_stats(self.id(position)?)
	}

	/// Appends a null entry to the dictionary and a position referencing it.
	/// The dictionary changes, so the result gets a new source id.
	fn append_null(&self) -> Result<BlockRef> {
		let end = self.ids_offset + self.position_count;
		let mut ids = Vec::with_capacity(end + 1);
		ids.extend_from_slice(&self.ids[..end]);
		ids.push(self.dictionary.position_count());
		let dictionary = self.dictionary.append_null()?;
		Ok(Arc::new(Self::with_source_id(
			self.ids_offset,
			self.position_count + 1,
			dictionary,
			ids,
			self.is_compact(),
			DictionaryId::random(),
		)?))
	}

	fn write_position_to(&self, position: usize, builder: &mut dyn BlockBuilder) -> Result<()> {
		self.dictionary.write_position_to(self.id(position)?, builder)
	}

	fn write_position_to_output(&self, position: usize, output: &mut BytesMut) -> Result<()> {
		self.dictionary.write_position_to_output(self.id(position)?, output)
	}

	fn is_loaded(&self) -> bool {
		self.dictionary.is_loaded()
	}

	fn to_block(&self) -> Result<BlockRef> {
		if self.dictionary.is_loaded() {
			return Ok(Arc::new(self.clone()));
		}
		Ok(Arc::new(Self::with_source_id(
			self.ids_offset,
			self.position_count,
			self.dictionary.to_block()?,
			self.ids.clone(),
			false,
			self.dictionary_source_id,
		)?))
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}
