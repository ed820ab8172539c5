// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{any::Any, fmt::Debug, sync::Arc};

use bytes::BytesMut;
use tessera_type::{Result, unsupported};

use crate::{BlockBuilder, DictionaryBlock, util::check_array_range};

/// Shared handle to an immutable block.
pub type BlockRef = Arc<dyn Block>;

/// Read contract of a positional, null-aware columnar container.
///
/// Positions are addressed `0..position_count()`. Reads outside that range
/// fail with [`Error::PositionOutOfBounds`](tessera_type::Error::PositionOutOfBounds);
/// `(offset, length)` pairs that do not fit fail with
/// [`Error::RegionOutOfBounds`](tessera_type::Error::RegionOutOfBounds).
/// Value accessors that make no sense for a variant fail with
/// [`Error::Unsupported`](tessera_type::Error::Unsupported).
///
/// Implemented by immutable blocks and by builders, so a builder can be read
/// before it is built.
pub trait Block: Debug + Send + Sync + 'static {
	/// Name of the wire encoding for this variant.
	fn encoding_name(&self) -> &'static str;

	fn position_count(&self) -> usize;

	/// Absolute index of position 0 in the backing storage.
	fn offset_base(&self) -> usize {
		0
	}

	fn is_null(&self, position: usize) -> Result<bool>;

	/// `false` guarantees that no position is null.
	fn may_have_null(&self) -> bool;

	fn get_byte(&self, _position: usize) -> Result<i8> {
		Err(unsupported!("{} does not support get_byte", self.encoding_name()))
	}

	fn get_short(&self, _position: usize) -> Result<i16> {
		Err(unsupported!("{} does not support get_short", self.encoding_name()))
	}

	fn get_int(&self, _position: usize) -> Result<i32> {
		Err(unsupported!("{} does not support get_int", self.encoding_name()))
	}

	fn get_long(&self, _position: usize) -> Result<i64> {
		Err(unsupported!("{} does not support get_long", self.encoding_name()))
	}

	fn get_slice(&self, _position: usize) -> Result<&[u8]> {
		Err(unsupported!("{} does not support get_slice", self.encoding_name()))
	}

	/// Nested value at `position`, as a view over this block's storage.
	fn get_block(&self, _position: usize) -> Result<BlockRef> {
		Err(unsupported!("{} does not support get_block", self.encoding_name()))
	}

	/// A compact block holding only the value at `position`.
	fn get_single_value_block(&self, position: usize) -> Result<BlockRef>;

	/// Zero-copy view of `length` positions starting at `offset`.
	fn get_region(&self, offset: usize, length: usize) -> Result<BlockRef>;

	/// Compact copy of `length` positions starting at `offset`. Returns a block
	/// sharing this block's storage when nothing needs compacting.
	fn copy_region(&self, offset: usize, length: usize) -> Result<BlockRef>;

	/// Compact copy of `positions[offset..offset + length]`, which may repeat
	/// and need not be ordered.
	fn copy_positions(&self, positions: &[usize], offset: usize, length: usize) -> Result<BlockRef>;

	/// View of `positions[offset..offset + length]` without copying values.
	///
	/// Position values are checked lazily, when the returned block is read.
	fn get_positions(&self, positions: &[usize], offset: usize, length: usize) -> Result<BlockRef> {
		check_array_range(positions.len(), offset, length)?;
		let ids = positions[offset..offset + length].to_vec();
		Ok(Arc::new(DictionaryBlock::new(self.to_block()?, ids)?))
	}

	/// Bytes of live content.
	fn size_in_bytes(&self) -> u64;

	fn region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64>;

	/// Bytes of the positions set in `selected`; `selected` must have one entry per position.
	fn positions_size_in_bytes(&self, selected: &[bool], selected_count: usize) -> Result<u64>;

	/// Per-position size when every position costs the same.
	fn fixed_size_in_bytes_per_position(&self) -> Option<u64> {
		None
	}

	/// Bytes of all memory reachable from this block, shared or not.
	fn retained_size_in_bytes(&self) -> u64;

	/// Size of the fully expanded form, e.g. a dictionary block as if flattened.
	fn logical_size_in_bytes(&self) -> u64 {
		self.size_in_bytes()
	}

	fn region_logical_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		self.region_size_in_bytes(offset, length)
	}

	/// Size of the value at `position` as seen by column statistics.
	fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64>;

	/// A new block with one extra null position at the end.
	fn append_null(&self) -> Result<BlockRef>;

	/// Appends the value (or null) at `position` to `builder`.
	fn write_position_to(&self, position: usize, builder: &mut dyn BlockBuilder) -> Result<()>;

	/// Serializes one position: a `0` byte for null, otherwise `1` followed by the value.
	fn write_position_to_output(&self, position: usize, output: &mut BytesMut) -> Result<()>;

	fn is_loaded(&self) -> bool {
		true
	}

	/// Immutable, fully loaded block with the same positions.
	///
	/// Blocks return a cheap clone, builders build and lazy blocks load.
	fn to_block(&self) -> Result<BlockRef>;

	fn as_any(&self) -> &dyn Any;
}
