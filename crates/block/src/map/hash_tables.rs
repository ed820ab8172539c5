// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use once_cell::sync::OnceCell;
use tessera_type::{
	Result, invalid_argument,
	util::{BitVec, CowVec},
};
use tracing::{debug, instrument};
use xxhash_rust::xxh3::xxh3_64;

use crate::{
	Block,
	size::instance_size,
	util::{is_null_at, position_bytes},
};

/// Inverse of the hash table fill ratio.
pub const HASH_MULTIPLIER: usize = 2;

/// Marks a hash slot without an entry.
pub const EMPTY_SLOT: u32 = u32::MAX;

/// Per-row open-addressed key tables of a map block.
///
/// The table of the row whose entries start at `k` occupies
/// `k * HASH_MULTIPLIER..(k + entries) * HASH_MULTIPLIER` and stores entry
/// indexes relative to `k`. Tables are built at most once and shared by every
/// map block derived from the same storage.
#[derive(Debug, Default)]
pub struct HashTables {
	tables: OnceCell<CowVec<u32>>,
	expected_hash_table_count: usize,
}

impl HashTables {
	pub fn new(expected_hash_table_count: usize) -> Self {
		Self {
			tables: OnceCell::new(),
			expected_hash_table_count,
		}
	}

	/// Hash tables that were already built, e.g. decoded from the wire.
	pub fn with_tables(tables: Option<CowVec<u32>>, expected_hash_table_count: usize) -> Self {
		let cell = OnceCell::new();
		if let Some(tables) = tables {
			let _ = cell.set(tables);
		}
		Self {
			tables: cell,
			expected_hash_table_count,
		}
	}

	pub fn get(&self) -> Option<&CowVec<u32>> {
		self.tables.get()
	}

	pub fn is_loaded(&self) -> bool {
		self.tables.get().is_some()
	}

	pub fn expected_hash_table_count(&self) -> usize {
		self.expected_hash_table_count
	}

	pub fn retained_size_in_bytes(&self) -> u64 {
		instance_size::<Self>() + self.tables.get().map_or(0, |t| t.retained_size_in_bytes())
	}

	/// Returns the tables, building them first if no thread has yet.
	///
	/// Concurrent callers block until the single build finishes.
	pub fn get_or_load(&self, offsets: &[usize], map_is_null: Option<&BitVec>, key_block: &dyn Block) -> Result<&CowVec<u32>> {
		self.tables.get_or_try_init(|| self.load(offsets, map_is_null, key_block))
	}

	#[instrument(name = "block::map::load_hash_tables", level = "trace", skip_all, fields(rows = self.expected_hash_table_count))]
	fn load(&self, offsets: &[usize], map_is_null: Option<&BitVec>, key_block: &dyn Block) -> Result<CowVec<u32>> {
		let row_count = self.expected_hash_table_count;
		if row_count >= offsets.len() {
			return Err(invalid_argument!("incorrect offsets size"));
		}

		let mut tables = vec![EMPTY_SLOT; key_block.position_count() * HASH_MULTIPLIER];
		for row in 0..row_count {
			let key_offset = offsets[row];
			let key_count = offsets[row + 1].checked_sub(key_offset).ok_or_else(|| {
				invalid_argument!(
					"Offset is not monotonically ascending. offsets[{}]={}, offsets[{}]={}",
					row,
					offsets[row],
					row + 1,
					offsets[row + 1]
				)
			})?;
			if is_null_at(map_is_null, row) && key_count != 0 {
				return Err(invalid_argument!("A null map must have zero entries"));
			}
			let start = key_offset * HASH_MULTIPLIER;
			let end = start + key_count * HASH_MULTIPLIER;
			if end > tables.len() {
				return Err(invalid_argument!("map entries exceed key block size {}", key_block.position_count()));
			}
			build_hash_table(key_block, key_offset, key_count, &mut tables[start..end], false)?;
		}
		debug!(rows = row_count, slots = tables.len(), "built map hash tables");
		Ok(CowVec::new(tables))
	}
}

/// Slot for `hash` in a table of `size` slots.
pub(crate) fn hash_slot(hash: u64, size: usize) -> usize {
	((hash as u128 * size as u128) >> 64) as usize
}

/// Fills `table` with the keys `key_offset..key_offset + key_count`.
///
/// With `strict` set, a key equal to an earlier key of the same row is an error.
pub(crate) fn build_hash_table(
	key_block: &dyn Block,
	key_offset: usize,
	key_count: usize,
	table: &mut [u32],
	strict: bool,
) -> Result<()> {
	let size = table.len();
	for entry in 0..key_count {
		let key_position = key_offset + entry;
		if key_block.is_null(key_position)? {
			return Err(invalid_argument!("map key cannot be null"));
		}
		let key = position_bytes(key_block, key_position)?;
		let mut slot = hash_slot(xxh3_64(&key), size);
		loop {
			let existing = table[slot];
			if existing == EMPTY_SLOT {
				table[slot] = entry as u32;
				break;
			}
			if strict && position_bytes(key_block, key_offset + existing as usize)? == key {
				return Err(invalid_argument!("Duplicate map keys are not allowed"));
			}
			slot += 1;
			if slot == size {
				slot = 0;
			}
		}
	}
	Ok(())
}
