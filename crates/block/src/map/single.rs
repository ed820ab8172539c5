// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{any::Any, sync::Arc};

use bytes::BytesMut;
use tessera_type::{Result, unsupported};
use xxhash_rust::xxh3::xxh3_64;

use super::{EMPTY_SLOT, HASH_MULTIPLIER, MapBlock, hash_slot};
use crate::{
	Block, BlockBuilder, BlockRef,
	size::{SIZE_OF_INT, instance_size},
	util::{check_valid_position, position_bytes},
};

/// One row of a [`MapBlock`], seen as `key0, value0, key1, value1, ...`.
///
/// `offset` and `position_count` are in interleaved units, so the view covers
/// the entries `offset / 2..(offset + position_count) / 2` of the parent.
#[derive(Clone, Debug)]
pub struct SingleMapBlock {
	map: MapBlock,
	position: usize,
	offset: usize,
	position_count: usize,
}

impl SingleMapBlock {
	pub(crate) fn new(map: MapBlock, position: usize, offset: usize, position_count: usize) -> Self {
		Self {
			map,
			position,
			offset,
			position_count,
		}
	}

	/// Row of the parent map this view exposes.
	pub fn map_position(&self) -> usize {
		self.position
	}

	pub fn entry_count(&self) -> usize {
		self.position_count / 2
	}

	pub(crate) fn map(&self) -> &MapBlock {
		&self.map
	}

	/// First key block position of this row.
	pub(crate) fn first_entry(&self) -> usize {
		self.offset / 2
	}

	/// Key and value blocks and the entry index for an interleaved position.
	fn resolve(&self, position: usize) -> Result<(&BlockRef, usize)> {
		check_valid_position(position, self.position_count)?;
		let entry = (self.offset + position) / 2;
		if position % 2 == 0 {
			Ok((self.map.key_block(), entry))
		} else {
			Ok((self.map.value_block(), entry))
		}
	}

	/// Interleaved position of the value stored under the key equal to
	/// `key_block[key_position]`, or `None` when the row has no such key.
	pub fn seek_key(&self, key_block: &dyn Block, key_position: usize) -> Result<Option<usize>> {
		let entry_count = self.entry_count();
		if entry_count == 0 {
			return Ok(None);
		}
		if key_block.is_null(key_position)? {
			return Ok(None);
		}
		let tables = self.map.ensure_hash_table_loaded()?;
		let key = position_bytes(key_block, key_position)?;
		let keys = self.map.key_block();
		let first_entry = self.offset / 2;
		let table = &tables[first_entry * HASH_MULTIPLIER..(first_entry + entry_count) * HASH_MULTIPLIER];

		let mut slot = hash_slot(xxh3_64(&key), table.len());
		for _ in 0..table.len() {
			let entry = table[slot];
			if entry == EMPTY_SLOT {
				return Ok(None);
			}
			let entry = entry as usize;
			if entry < entry_count && position_bytes(keys.as_ref(), first_entry + entry)? == key {
				return Ok(Some(entry * 2 + 1));
			}
			slot += 1;
			if slot == table.len() {
				slot = 0;
			}
		}
		Ok(None)
	}
}

impl Block for SingleMapBlock {
	fn encoding_name(&self) -> &'static str {
		"MAP_ELEMENT"
	}

	fn position_count(&self) -> usize {
		self.position_count
	}

	fn offset_base(&self) -> usize {
		self.offset
	}

	fn is_null(&self, position: usize) -> Result<bool> {
		let (block, entry) = self.resolve(position)?;
		block.is_null(entry)
	}

	fn may_have_null(&self) -> bool {
		self.map.value_block().may_have_null()
	}

	fn get_byte(&self, position: usize) -> Result<i8> {
		let (block, entry) = self.resolve(position)?;
		block.get_byte(entry)
	}

	fn get_short(&self, position: usize) -> Result<i16> {
		let (block, entry) = self.resolve(position)?;
		block.get_short(entry)
	}

	fn get_int(&self, position: usize) -> Result<i32> {
		let (block, entry) = self.resolve(position)?;
		block.get_int(entry)
	}

	fn get_long(&self, position: usize) -> Result<i64> {
		let (block, entry) = self.resolve(position)?;
		block.get_long(entry)
	}

	fn get_slice(&self, position: usize) -> Result<&[u8]> {
		let (block, entry) = self.resolve(position)?;
		block.get_slice(entry)
	}

	fn get_block(&self, position: usize) -> Result<BlockRef> {
		let (block, entry) = self.resolve(position)?;
		block.get_block(entry)
	}

	fn get_single_value_block(&self, position: usize) -> Result<BlockRef> {
		let (block, entry) = self.resolve(position)?;
		block.get_single_value_block(entry)
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
		let first_entry = self.offset / 2;
		let entry_count = self.entry_count();
		// the entry range lies inside both blocks by construction
		let keys = self.map.key_block().region_size_in_bytes(first_entry, entry_count).unwrap_or(0);
		let values = self.map.value_block().region_size_in_bytes(first_entry, entry_count).unwrap_or(0);
		keys + values + SIZE_OF_INT * (entry_count * HASH_MULTIPLIER) as u64
	}

	fn region_size_in_bytes(&self, _offset: usize, _length: usize) -> Result<u64> {
		Err(unsupported!("{} does not support region_size_in_bytes", self.encoding_name()))
	}

	fn positions_size_in_bytes(&self, _selected: &[bool], _selected_count: usize) -> Result<u64> {
		Err(unsupported!("{} does not support positions_size_in_bytes", self.encoding_name()))
	}

	fn retained_size_in_bytes(&self) -> u64 {
		instance_size::<Self>() + self.map.retained_size_in_bytes()
	}

	fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
		let (block, entry) = self.resolve(position)?;
		block.estimated_data_size_for_stats(entry)
	}

	fn append_null(&self) -> Result<BlockRef> {
		Err(unsupported!("{} does not support append_null", self.encoding_name()))
	}

	fn write_position_to(&self, position: usize, builder: &mut dyn BlockBuilder) -> Result<()> {
		let (block, entry) = self.resolve(position)?;
		block.write_position_to(entry, builder)
	}

	fn write_position_to_output(&self, position: usize, output: &mut BytesMut) -> Result<()> {
		let (block, entry) = self.resolve(position)?;
		block.write_position_to_output(entry, output)
	}

	fn is_loaded(&self) -> bool {
		self.map.is_loaded()
	}

	fn to_block(&self) -> Result<BlockRef> {
		Ok(Arc::new(self.clone()))
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}
