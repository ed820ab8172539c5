// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Checked little-endian primitives shared by the block encodings.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tessera_type::{DecodeError, Result, corrupt, invalid_argument};

pub(crate) fn ensure_remaining(input: &Bytes, needed: usize) -> Result<()> {
	if input.remaining() < needed {
		return Err(DecodeError::UnexpectedEof {
			needed,
			remaining: input.remaining(),
		}
		.into());
	}
	Ok(())
}

/// Fails unless `count` entries of `width` bytes each remain.
///
/// Decoders call this before sizing anything from a count read off the wire.
pub(crate) fn ensure_entries(input: &Bytes, count: usize, width: usize) -> Result<()> {
	let needed = count.checked_mul(width).ok_or_else(|| corrupt!("{} entries of {} bytes overflow", count, width))?;
	ensure_remaining(input, needed)
}

pub(crate) fn read_u8(input: &mut Bytes) -> Result<u8> {
	ensure_remaining(input, 1)?;
	Ok(input.get_u8())
}

pub(crate) fn read_i32(input: &mut Bytes) -> Result<i32> {
	ensure_remaining(input, 4)?;
	Ok(input.get_i32_le())
}

pub(crate) fn read_u32(input: &mut Bytes) -> Result<u32> {
	ensure_remaining(input, 4)?;
	Ok(input.get_u32_le())
}

pub(crate) fn read_u64(input: &mut Bytes) -> Result<u64> {
	ensure_remaining(input, 8)?;
	Ok(input.get_u64_le())
}

pub(crate) fn read_u128(input: &mut Bytes) -> Result<u128> {
	ensure_remaining(input, 16)?;
	Ok(input.get_u128_le())
}

/// Reads a non-negative `i32` count or length.
pub(crate) fn read_length(input: &mut Bytes, what: &'static str) -> Result<usize> {
	let value = read_i32(input)?;
	usize::try_from(value).map_err(|_| {
		DecodeError::NegativeLength {
			what,
			value,
		}
		.into()
	})
}

/// Writes a count or length as `i32`.
pub(crate) fn write_length(output: &mut BytesMut, value: usize) -> Result<()> {
	let value = i32::try_from(value).map_err(|_| invalid_argument!("length {} does not fit the wire format", value))?;
	output.put_i32_le(value);
	Ok(())
}

/// `[length: i32][utf-8 bytes]`
pub fn write_length_prefixed_string(output: &mut BytesMut, value: &str) -> Result<()> {
	write_length(output, value.len())?;
	output.put_slice(value.as_bytes());
	Ok(())
}

pub fn read_length_prefixed_string(input: &mut Bytes) -> Result<String> {
	let length = read_length(input, "string length")?;
	ensure_remaining(input, length)?;
	let bytes = input.split_to(length);
	String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidName.into())
}
