// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tessera_type::{Result, corrupt, invalid_argument};

use super::{
	BlockEncoding, BlockEncodingSerde,
	io::{ensure_entries, ensure_remaining, read_length, write_length},
	nulls::{decode_null_bits, encode_nulls_as_bits},
};
use crate::{Block, BlockRef, VariableWidthBlock};

/// `[position count][end offset per position][null bits][slice length][slice]`
///
/// End offsets are relative to the first written byte.
pub struct VariableWidthBlockEncoding;

impl BlockEncoding for VariableWidthBlockEncoding {
	fn name(&self) -> &'static str {
		"VARIABLE_WIDTH"
	}

	fn write_block(&self, _serde: &BlockEncodingSerde, output: &mut BytesMut, block: &dyn Block) -> Result<()> {
		let block = block
			.as_any()
			.downcast_ref::<VariableWidthBlock>()
			.ok_or_else(|| invalid_argument!("VARIABLE_WIDTH cannot write {} block", block.encoding_name()))?;
		let position_count = block.position_count();
		write_length(output, position_count)?;

		let mut end = 0;
		for position in 0..position_count {
			end += block.slice_length(position)?;
			write_length(output, end)?;
		}

		encode_nulls_as_bits(output, block)?;

		let slice = block.raw_slice();
		write_length(output, slice.len())?;
		output.put_slice(slice);
		Ok(())
	}

	fn read_block(&self, _serde: &BlockEncodingSerde, input: &mut Bytes) -> Result<BlockRef> {
		let position_count = read_length(input, "position count")?;
		ensure_entries(input, position_count, 4)?;

		let mut offsets = Vec::with_capacity(position_count + 1);
		offsets.push(0);
		for _ in 0..position_count {
			let end = read_length(input, "variable width offset")?;
			if let Some(&previous) = offsets.last() {
				if end < previous {
					return Err(corrupt!("variable width offsets decrease from {} to {}", previous, end));
				}
			}
			offsets.push(end);
		}

		let value_is_null = decode_null_bits(input, position_count)?;

		let slice_length = read_length(input, "slice length")?;
		if offsets[position_count] > slice_length {
			return Err(corrupt!("last offset {} exceeds slice length {}", offsets[position_count], slice_length));
		}
		ensure_remaining(input, slice_length)?;
		let slice = input.split_to(slice_length).to_vec();

		Ok(Arc::new(VariableWidthBlock::new(position_count, slice, offsets, value_is_null)?))
	}
}
