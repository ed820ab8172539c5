// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use bytes::{BufMut, Bytes, BytesMut};
use tessera_type::{Result, corrupt, util::BitVec};

use super::io::{ensure_remaining, read_u8};
use crate::Block;

/// Writes a `may_have_null` flag byte and, when set, one bit per position,
/// most significant bit first.
pub fn encode_nulls_as_bits(output: &mut BytesMut, block: &dyn Block) -> Result<()> {
	let may_have_null = block.may_have_null();
	output.put_u8(u8::from(may_have_null));
	if !may_have_null {
		return Ok(());
	}

	let position_count = block.position_count();
	let mut byte = 0u8;
	for position in 0..position_count {
		if block.is_null(position)? {
			byte |= 0b1000_0000 >> (position % 8);
		}
		if position % 8 == 7 {
			output.put_u8(byte);
			byte = 0;
		}
	}
	if position_count % 8 != 0 {
		output.put_u8(byte);
	}
	Ok(())
}

/// Reads what [`encode_nulls_as_bits`] wrote; `None` when no position is null.
pub fn decode_null_bits(input: &mut Bytes, position_count: usize) -> Result<Option<BitVec>> {
	match read_u8(input)? {
		0 => return Ok(None),
		1 => {}
		flag => return Err(corrupt!("invalid may-have-null flag {}", flag)),
	}

	let byte_count = position_count.div_ceil(8);
	ensure_remaining(input, byte_count)?;
	let bytes = input.split_to(byte_count);
	let nulls = BitVec::from_fn(position_count, |position| bytes[position / 8] & (0b1000_0000 >> (position % 8)) != 0);
	Ok((nulls.count_ones() > 0).then_some(nulls))
}
