// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{marker::PhantomData, sync::Arc};

use bytes::{Bytes, BytesMut};
use tessera_type::{Result, invalid_argument};

use super::{
	BlockEncoding, BlockEncodingSerde,
	io::{ensure_entries, read_length, write_length},
	nulls::{decode_null_bits, encode_nulls_as_bits},
};
use crate::{Block, BlockRef, Primitive, PrimitiveBlock};

/// `[position count][null bits][one value per position]`
///
/// Null positions still carry a value slot.
pub struct PrimitiveBlockEncoding<T: Primitive> {
	_marker: PhantomData<fn() -> T>,
}

impl<T: Primitive> PrimitiveBlockEncoding<T> {
	pub fn new() -> Self {
		Self {
			_marker: PhantomData,
		}
	}
}

impl<T: Primitive> Default for PrimitiveBlockEncoding<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Primitive> BlockEncoding for PrimitiveBlockEncoding<T> {
	fn name(&self) -> &'static str {
		T::ENCODING_NAME
	}

	fn write_block(&self, _serde: &BlockEncodingSerde, output: &mut BytesMut, block: &dyn Block) -> Result<()> {
		let block = block
			.as_any()
			.downcast_ref::<PrimitiveBlock<T>>()
			.ok_or_else(|| invalid_argument!("{} cannot write {} block", T::ENCODING_NAME, block.encoding_name()))?;
		let position_count = block.position_count();
		write_length(output, position_count)?;
		encode_nulls_as_bits(output, block)?;
		for position in 0..position_count {
			block.value(position)?.put(output);
		}
		Ok(())
	}

	fn read_block(&self, _serde: &BlockEncodingSerde, input: &mut Bytes) -> Result<BlockRef> {
		let position_count = read_length(input, "position count")?;
		let value_is_null = decode_null_bits(input, position_count)?;
		ensure_entries(input, position_count, T::SIZE)?;
		let values: Vec<T> = (0..position_count).map(|_| T::take(input)).collect();
		Ok(Arc::new(PrimitiveBlock::new(position_count, value_is_null, values)?))
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;
	use crate::{ByteArrayBlock, IntArrayBlock, LongArrayBlock, ShortArrayBlock, util::blocks_equal};

	#[test]
	fn test_int_layout() {
		let serde = BlockEncodingSerde::default();
		let block = IntArrayBlock::from_options(&[Some(1), None]);
		let mut output = BytesMut::new();
		PrimitiveBlockEncoding::<i32>::new().write_block(&serde, &mut output, &block).unwrap();
		assert_eq!(&output[..], &[2, 0, 0, 0, 1, 0b0100_0000, 1, 0, 0, 0, 0, 0, 0, 0]);
	}

	#[test]
	fn test_round_trip_every_width() {
		let serde = BlockEncodingSerde::default();
		let blocks: Vec<BlockRef> = vec![
			Arc::new(ByteArrayBlock::from_options(&[Some(-1), None, Some(3)])),
			Arc::new(ShortArrayBlock::from_values(vec![i16::MIN, 0, i16::MAX])),
			Arc::new(IntArrayBlock::from_options(&[None, None, Some(42)])),
			Arc::new(LongArrayBlock::from_values(vec![i64::MIN, 7, i64::MAX])),
		];
		for block in blocks {
			let decoded = serde.deserialize(serde.serialize(block.as_ref()).unwrap()).unwrap();
			assert_eq!(decoded.encoding_name(), block.encoding_name());
			assert!(blocks_equal(decoded.as_ref(), block.as_ref()).unwrap());
		}
	}

	#[test]
	fn test_region_is_written_from_its_offset() {
		let serde = BlockEncodingSerde::default();
		let block = LongArrayBlock::from_values(vec![10, 20, 30, 40]);
		let region = block.get_region(1, 2).unwrap();
		let decoded = serde.deserialize(serde.serialize(region.as_ref()).unwrap()).unwrap();
		assert_eq!(decoded.position_count(), 2);
		assert_eq!(decoded.get_long(0).unwrap(), 20);
		assert_eq!(decoded.get_long(1).unwrap(), 30);
	}

	#[test]
	fn test_truncated_values() {
		let serde = BlockEncodingSerde::default();
		let mut input = Bytes::from_static(&[2, 0, 0, 0, 0, 1, 0, 0, 0]);
		let err = PrimitiveBlockEncoding::<i32>::new().read_block(&serde, &mut input).unwrap_err();
		assert!(err.is_decode());
	}
}
