// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tessera_type::{DecodeError, Result, corrupt, invalid_argument, util::CowVec};

use super::{
	BlockEncoding, BlockEncodingSerde,
	io::{ensure_entries, read_i32, read_length, write_length},
	nulls::{decode_null_bits, encode_nulls_as_bits},
};
use crate::{
	Block, BlockRef, HASH_MULTIPLIER, HashTables, MapBlock, SingleMapBlock,
	map::{EMPTY_SLOT, validate_entries},
};

/// `-1` when the tables were never built.
fn write_hash_tables(output: &mut BytesMut, tables: Option<&[u32]>) -> Result<()> {
	match tables {
		Some(tables) => {
			write_length(output, tables.len())?;
			for &slot in tables {
				output.put_u32_le(slot);
			}
		}
		None => output.put_i32_le(-1),
	}
	Ok(())
}

fn read_hash_tables(input: &mut Bytes, key_count: usize) -> Result<Option<CowVec<u32>>> {
	let length = match read_i32(input)? {
		-1 => return Ok(None),
		length => usize::try_from(length).map_err(|_| DecodeError::NegativeLength {
			what: "hash table length",
			value: length,
		})?,
	};
	if length != key_count * HASH_MULTIPLIER {
		return Err(corrupt!(
			"hash table length {} does not match {} keys",
			length,
			key_count
		));
	}
	ensure_entries(input, length, 4)?;
	Ok(Some((0..length).map(|_| input.get_u32_le()).collect()))
}

/// Checks that the table of every row holds each entry of that row exactly once.
///
/// `offsets` must already be validated against the key block.
fn validate_hash_tables(tables: &[u32], offsets: &[usize]) -> Result<()> {
	for (row, window) in offsets.windows(2).enumerate() {
		let entry_count = window[1] - window[0];
		let table = &tables[window[0] * HASH_MULTIPLIER..window[1] * HASH_MULTIPLIER];
		let mut seen = vec![false; entry_count];
		for &slot in table {
			if slot == EMPTY_SLOT {
				continue;
			}
			match seen.get_mut(slot as usize) {
				Some(seen) if !*seen => *seen = true,
				_ => return Err(corrupt!("hash table of row {} holds invalid slot {}", row, slot)),
			}
		}
		if seen.contains(&false) {
			return Err(corrupt!("hash table of row {} is missing entries", row));
		}
	}
	Ok(())
}

fn hash_slice(map: &MapBlock, first_entry: usize, entry_count: usize) -> Option<&[u32]> {
	let tables = map.hash_tables().get()?;
	Some(&tables[first_entry * HASH_MULTIPLIER..(first_entry + entry_count) * HASH_MULTIPLIER])
}

/// `[key block][value block][hash tables][position count][offsets][null bits]`
///
/// Keys and values are cut to the entries of the written rows and the
/// offsets rebased to start at zero. Built hash tables travel with the
/// block so readers need not rebuild them.
pub struct MapBlockEncoding;

impl BlockEncoding for MapBlockEncoding {
	fn name(&self) -> &'static str {
		"MAP"
	}

	fn write_block(&self, serde: &BlockEncodingSerde, output: &mut BytesMut, block: &dyn Block) -> Result<()> {
		let map = block
			.as_any()
			.downcast_ref::<MapBlock>()
			.ok_or_else(|| invalid_argument!("MAP cannot write {} block", block.encoding_name()))?;
		let position_count = map.position_count();
		let offsets = map.offsets();
		let entries_start = offsets[0];
		let entry_count = offsets[position_count] - entries_start;

		serde.write_block(output, map.key_block().get_region(entries_start, entry_count)?.as_ref())?;
		serde.write_block(output, map.value_block().get_region(entries_start, entry_count)?.as_ref())?;
		write_hash_tables(output, hash_slice(map, entries_start, entry_count))?;

		write_length(output, position_count)?;
		for &offset in offsets {
			write_length(output, offset - entries_start)?;
		}
		encode_nulls_as_bits(output, map)
	}

	fn read_block(&self, serde: &BlockEncodingSerde, input: &mut Bytes) -> Result<BlockRef> {
		let key_block = serde.read_block(input)?;
		let value_block = serde.read_block(input)?;
		if key_block.position_count() != value_block.position_count() {
			return Err(corrupt!(
				"map has {} keys but {} values",
				key_block.position_count(),
				value_block.position_count()
			));
		}
		let tables = read_hash_tables(input, key_block.position_count())?;

		let position_count = read_length(input, "position count")?;
		ensure_entries(input, position_count + 1, 4)?;
		let mut offsets = Vec::with_capacity(position_count + 1);
		for _ in 0..=position_count {
			offsets.push(read_length(input, "map offset")?);
		}
		let map_is_null = decode_null_bits(input, position_count)?;
		validate_entries(position_count, map_is_null.as_ref(), &offsets, key_block.position_count())
			.map_err(|err| corrupt!("{}", err))?;
		if let Some(tables) = &tables {
			validate_hash_tables(tables, &offsets)?;
		}

		Ok(Arc::new(MapBlock::create_internal(
			0,
			position_count,
			map_is_null,
			CowVec::new(offsets),
			key_block,
			value_block,
			Arc::new(HashTables::with_tables(tables, position_count)),
		)?))
	}
}

/// `[key block][value block][hash tables]` of a single map row.
pub struct SingleMapBlockEncoding;

impl BlockEncoding for SingleMapBlockEncoding {
	fn name(&self) -> &'static str {
		"MAP_ELEMENT"
	}

	fn write_block(&self, serde: &BlockEncodingSerde, output: &mut BytesMut, block: &dyn Block) -> Result<()> {
		let single = block
			.as_any()
			.downcast_ref::<SingleMapBlock>()
			.ok_or_else(|| invalid_argument!("MAP_ELEMENT cannot write {} block", block.encoding_name()))?;
		let map = single.map();
		let first_entry = single.first_entry();
		let entry_count = single.entry_count();

		serde.write_block(output, map.key_block().get_region(first_entry, entry_count)?.as_ref())?;
		serde.write_block(output, map.value_block().get_region(first_entry, entry_count)?.as_ref())?;
		write_hash_tables(output, hash_slice(map, first_entry, entry_count))
	}

	fn read_block(&self, serde: &BlockEncodingSerde, input: &mut Bytes) -> Result<BlockRef> {
		let key_block = serde.read_block(input)?;
		let value_block = serde.read_block(input)?;
		let entry_count = key_block.position_count();
		if entry_count != value_block.position_count() {
			return Err(corrupt!("map has {} keys but {} values", entry_count, value_block.position_count()));
		}
		let tables = read_hash_tables(input, entry_count)?;
		if let Some(tables) = &tables {
			validate_hash_tables(tables, &[0, entry_count])?;
		}

		let map = MapBlock::create_internal(
			0,
			1,
			None,
			CowVec::new(vec![0, entry_count]),
			key_block,
			value_block,
			Arc::new(HashTables::with_tables(tables, 1)),
		)?;
		Ok(Arc::new(SingleMapBlock::new(map, 0, 0, entry_count * 2)))
	}
}
