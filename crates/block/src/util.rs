// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Bounds checks, array growth and mask helpers shared by all block variants.

use bytes::BytesMut;
use tessera_type::{Error, Result, invalid_argument, util::BitVec};
use xxhash_rust::xxh3::xxh3_64;

use crate::Block;

/// Largest array a builder will grow to.
pub const MAX_ARRAY_SIZE: usize = i32::MAX as usize - 8;

const DEFAULT_CAPACITY: usize = 64;
const BLOCK_RESET_SKEW: f64 = 1.25;

pub fn check_valid_region(position_count: usize, offset: usize, length: usize) -> Result<()> {
	match offset.checked_add(length) {
		Some(end) if end <= position_count => Ok(()),
		_ => Err(Error::RegionOutOfBounds {
			offset,
			length,
			position_count,
		}),
	}
}

/// Validates that `offset..offset + length` lies inside an array of `array_length`.
pub fn check_array_range(array_length: usize, offset: usize, length: usize) -> Result<()> {
	check_valid_region(array_length, offset, length)
}

pub fn check_valid_position(position: usize, position_count: usize) -> Result<()> {
	if position >= position_count {
		return Err(Error::PositionOutOfBounds {
			position,
			position_count,
		});
	}
	Ok(())
}

pub fn check_valid_positions(positions: &[usize], position_count: usize) -> Result<()> {
	for &position in positions {
		check_valid_position(position, position_count)?;
	}
	Ok(())
}

/// Validates a selection mask against the block it selects from.
pub fn check_valid_selection(selected: &[bool], selected_count: usize, position_count: usize) -> Result<()> {
	if selected.len() != position_count {
		return Err(invalid_argument!(
			"Invalid positions array size {}, actual position count is {}",
			selected.len(),
			position_count
		));
	}
	if selected_count > position_count {
		return Err(invalid_argument!(
			"Selected position count {} exceeds position count {}",
			selected_count,
			position_count
		));
	}
	Ok(())
}

/// Next capacity for a full builder array: 1.5x, at least 64, capped at [`MAX_ARRAY_SIZE`].
pub fn calculate_new_array_size(current_size: usize) -> Result<usize> {
	let new_size = current_size.saturating_add(current_size >> 1);
	if new_size < DEFAULT_CAPACITY {
		return Ok(DEFAULT_CAPACITY);
	}
	if new_size > MAX_ARRAY_SIZE {
		if current_size >= MAX_ARRAY_SIZE {
			return Err(invalid_argument!("Cannot grow array beyond '{}'", MAX_ARRAY_SIZE));
		}
		return Ok(MAX_ARRAY_SIZE);
	}
	Ok(new_size)
}

/// Expected entries for a fresh builder replacing one that held `current_size` positions.
pub fn calculate_block_reset_size(current_size: usize) -> usize {
	let new_size = (current_size as f64 * BLOCK_RESET_SKEW).ceil() as usize;
	new_size.clamp(DEFAULT_CAPACITY, MAX_ARRAY_SIZE)
}

pub(crate) fn is_null_at(nulls: Option<&BitVec>, index: usize) -> bool {
	match nulls {
		Some(nulls) => index < nulls.len() && nulls.get(index),
		None => false,
	}
}

/// Copies the mask bits for `offset..offset + length`.
pub(crate) fn compact_nulls(nulls: Option<&BitVec>, offset: usize, length: usize) -> Option<BitVec> {
	nulls.map(|nulls| BitVec::from_fn(length, |i| is_null_at(Some(nulls), offset + i)))
}

/// Copies the mask of the `offset..offset + count` window and appends a set bit.
pub(crate) fn append_null_to_nulls(nulls: Option<&BitVec>, offset: usize, count: usize) -> BitVec {
	let mut result = BitVec::from_fn(offset + count, |i| is_null_at(nulls, i));
	result.push(true);
	result
}

/// Copies `offsets[..offset + count + 1]` and repeats the last offset, giving the
/// appended position zero entries.
pub(crate) fn append_null_to_offsets(offsets: &[usize], offset: usize, count: usize) -> Vec<usize> {
	let end = offset + count;
	let mut result = Vec::with_capacity(end + 2);
	result.extend_from_slice(&offsets[..=end]);
	result.push(offsets[end]);
	result
}

/// Rebases `offsets[offset..=offset + length]` so the first entry is zero.
pub(crate) fn compact_offsets(offsets: &[usize], offset: usize, length: usize) -> Vec<usize> {
	let base = offsets[offset];
	offsets[offset..=offset + length].iter().map(|o| o - base).collect()
}

/// Serialized form of one position, as written by `write_position_to_output`.
pub fn position_bytes(block: &dyn Block, position: usize) -> Result<BytesMut> {
	let mut output = BytesMut::new();
	block.write_position_to_output(position, &mut output)?;
	Ok(output)
}

/// Hash of one position over its serialized form.
pub fn hash_position(block: &dyn Block, position: usize) -> Result<u64> {
	Ok(xxh3_64(&position_bytes(block, position)?))
}

/// Whether two positions hold the same value (or are both null).
pub fn positions_equal(left: &dyn Block, left_position: usize, right: &dyn Block, right_position: usize) -> Result<bool> {
	Ok(position_bytes(left, left_position)? == position_bytes(right, right_position)?)
}

/// Pointwise equality of two blocks, regardless of their representation.
pub fn blocks_equal(left: &dyn Block, right: &dyn Block) -> Result<bool> {
	if left.position_count() != right.position_count() {
		return Ok(false);
	}
	for position in 0..left.position_count() {
		if !positions_equal(left, position, right, position)? {
			return Ok(false);
		}
	}
	Ok(true)
}

#[cfg(test)]
pub mod tests {
	use super::*;

	mod check_valid_region {
		use super::*;

		#[test]
		fn test_inside() {
			assert!(check_valid_region(10, 0, 10).is_ok());
			assert!(check_valid_region(10, 3, 4).is_ok());
			assert!(check_valid_region(10, 10, 0).is_ok());
		}

		#[test]
		fn test_outside() {
			let err = check_valid_region(10, 8, 3).unwrap_err();
			assert_eq!(
				err,
				Error::RegionOutOfBounds {
					offset: 8,
					length: 3,
					position_count: 10
				}
			);
			assert!(check_valid_region(10, 11, 0).is_err());
			assert!(check_valid_region(10, usize::MAX, 2).is_err());
		}
	}

	mod check_valid_position {
		use super::*;

		#[test]
		fn test_bounds() {
			assert!(check_valid_position(0, 1).is_ok());
			assert!(matches!(check_valid_position(1, 1), Err(Error::PositionOutOfBounds { .. })));
			assert!(check_valid_position(0, 0).is_err());
		}

		#[test]
		fn test_many() {
			assert!(check_valid_positions(&[0, 4, 2, 4], 5).is_ok());
			assert!(check_valid_positions(&[0, 5], 5).is_err());
		}
	}

	mod calculate_new_array_size {
		use super::*;

		#[test]
		fn test_minimum_capacity() {
			assert_eq!(calculate_new_array_size(0).unwrap(), 64);
			assert_eq!(calculate_new_array_size(1).unwrap(), 64);
			assert_eq!(calculate_new_array_size(42).unwrap(), 64);
		}

		#[test]
		fn test_grows_by_half() {
			assert_eq!(calculate_new_array_size(64).unwrap(), 96);
			assert_eq!(calculate_new_array_size(1000).unwrap(), 1500);
		}

		#[test]
		fn test_monotonic() {
			let mut size = 1;
			for _ in 0..40 {
				let next = calculate_new_array_size(size).unwrap();
				assert!(next > size);
				size = next;
				if size == MAX_ARRAY_SIZE {
					break;
				}
			}
		}

		#[test]
		fn test_capped() {
			assert_eq!(calculate_new_array_size(MAX_ARRAY_SIZE - 1).unwrap(), MAX_ARRAY_SIZE);
			assert!(calculate_new_array_size(MAX_ARRAY_SIZE).is_err());
		}
	}

	#[test]
	fn test_calculate_block_reset_size() {
		assert_eq!(calculate_block_reset_size(0), 64);
		assert_eq!(calculate_block_reset_size(100), 125);
	}

	#[test]
	fn test_append_null_to_offsets() {
		assert_eq!(append_null_to_offsets(&[0, 2, 2, 4, 9], 1, 2), vec![0, 2, 2, 4, 4]);
	}

	#[test]
	fn test_compact_offsets() {
		assert_eq!(compact_offsets(&[0, 2, 2, 4, 9], 1, 3), vec![0, 0, 2, 7]);
	}

	#[test]
	fn test_append_null_to_nulls() {
		let nulls = BitVec::from_slice(&[false, true, false]);
		let result = append_null_to_nulls(Some(&nulls), 1, 2);
		assert_eq!(result, BitVec::from_slice(&[false, true, false, true]));

		let result = append_null_to_nulls(None, 0, 2);
		assert_eq!(result, BitVec::from_slice(&[false, false, true]));
	}
}
