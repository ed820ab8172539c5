// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use bytes::Bytes;
use tessera_type::{Result, unsupported};

use crate::{Block, BlockBuilderStatus, BlockRef};

/// Append-only accumulator that finalizes into an immutable block.
///
/// Flat builders take one `write_*` call per position; `close_entry` is a
/// no-op for them. Variable-width builders accumulate bytes until
/// `close_entry`. Nested builders open an entry with `begin_entry`, write
/// through `entry_builder` and finish with `close_entry`.
///
/// Builders are single-writer.
pub trait BlockBuilder: Block {
	fn write_byte(&mut self, _value: i8) -> Result<()> {
		Err(unsupported!("{} builder does not support write_byte", self.encoding_name()))
	}

	fn write_short(&mut self, _value: i16) -> Result<()> {
		Err(unsupported!("{} builder does not support write_short", self.encoding_name()))
	}

	fn write_int(&mut self, _value: i32) -> Result<()> {
		Err(unsupported!("{} builder does not support write_int", self.encoding_name()))
	}

	fn write_long(&mut self, _value: i64) -> Result<()> {
		Err(unsupported!("{} builder does not support write_long", self.encoding_name()))
	}

	fn write_bytes(&mut self, _bytes: &[u8]) -> Result<()> {
		Err(unsupported!("{} builder does not support write_bytes", self.encoding_name()))
	}

	fn close_entry(&mut self) -> Result<()>;

	/// Appends a null position.
	fn push_null(&mut self) -> Result<()>;

	fn begin_entry(&mut self) -> Result<()> {
		Err(unsupported!("{} builder does not support nested entries", self.encoding_name()))
	}

	/// Builder for part `index` of the open entry: key (0) or value (1) of a
	/// map, or a row field.
	fn entry_builder(&mut self, _index: usize) -> Result<&mut dyn BlockBuilder> {
		Err(unsupported!("{} builder does not support nested entries", self.encoding_name()))
	}

	/// Copies the nested value at `position` of `block` as one new entry.
	fn append_structure(&mut self, _block: &dyn Block, _position: usize) -> Result<()> {
		Err(unsupported!("{} builder does not support append_structure", self.encoding_name()))
	}

	/// Appends one position serialized by [`Block::write_position_to_output`].
	fn read_position_from(&mut self, input: &mut Bytes) -> Result<()>;

	/// Finalizes the positions written so far. A builder that never received a
	/// non-null value yields a run-length encoded null block.
	fn build(&self) -> Result<BlockRef>;

	/// Empty builder of the same shape, presized from this builder's position count.
	fn new_block_builder_like(&self, status: Option<BlockBuilderStatus>) -> Box<dyn BlockBuilder>;
}
