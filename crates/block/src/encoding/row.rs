// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tessera_type::{Result, corrupt, invalid_argument, util::CowVec};

use super::{
	BlockEncoding, BlockEncodingSerde,
	io::{ensure_entries, read_length, write_length},
	nulls::{decode_null_bits, encode_nulls_as_bits},
};
use crate::{Block, BlockRef, RowBlock, SingleRowBlock, util::is_null_at};

fn read_fields(serde: &BlockEncodingSerde, input: &mut Bytes) -> Result<Vec<BlockRef>> {
	let field_count = read_length(input, "field count")?;
	if field_count == 0 {
		return Err(corrupt!("row has no fields"));
	}
	// every field block starts with its encoding name length
	ensure_entries(input, field_count, 4)?;
	(0..field_count).map(|_| serde.read_block(input)).collect()
}

/// `[field count][field blocks][position count][field offsets][null bits]`
///
/// Field blocks are cut to the written rows and the offsets rebased to zero.
pub struct RowBlockEncoding;

impl BlockEncoding for RowBlockEncoding {
	fn name(&self) -> &'static str {
		"ROW"
	}

	fn write_block(&self, serde: &BlockEncodingSerde, output: &mut BytesMut, block: &dyn Block) -> Result<()> {
		let row = block
			.as_any()
			.downcast_ref::<RowBlock>()
			.ok_or_else(|| invalid_argument!("ROW cannot write {} block", block.encoding_name()))?;
		let fields = row.field_blocks()?;
		write_length(output, fields.len())?;
		for field in &fields {
			serde.write_block(output, field.as_ref())?;
		}

		let offsets = row.field_block_offsets();
		write_length(output, row.position_count())?;
		for &offset in offsets {
			write_length(output, offset - offsets[0])?;
		}
		encode_nulls_as_bits(output, row)
	}

	fn read_block(&self, serde: &BlockEncodingSerde, input: &mut Bytes) -> Result<BlockRef> {
		let fields = read_fields(serde, input)?;

		let position_count = read_length(input, "position count")?;
		ensure_entries(input, position_count + 1, 4)?;
		let mut offsets = Vec::with_capacity(position_count + 1);
		for _ in 0..=position_count {
			offsets.push(read_length(input, "field block offset")?);
		}
		let row_is_null = decode_null_bits(input, position_count)?;

		if offsets[0] != 0 {
			return Err(corrupt!("first field block offset is {}", offsets[0]));
		}
		for row in 0..position_count {
			let step = usize::from(!is_null_at(row_is_null.as_ref(), row));
			if offsets[row + 1] != offsets[row] + step {
				return Err(corrupt!(
					"field block offset {} of row {} does not follow {}",
					offsets[row + 1],
					row,
					offsets[row]
				));
			}
		}
		let referenced = offsets[position_count];
		if let Some(field) = fields.iter().find(|f| f.position_count() != referenced) {
			return Err(corrupt!("field block has {} positions but rows reference {}", field.position_count(), referenced));
		}

		Ok(Arc::new(RowBlock::create_internal(0, position_count, row_is_null, CowVec::new(offsets), fields.into())?))
	}
}

/// `[field count][one-position block per field]`
pub struct SingleRowBlockEncoding;

impl BlockEncoding for SingleRowBlockEncoding {
	fn name(&self) -> &'static str {
		"ROW_ELEMENT"
	}

	fn write_block(&self, serde: &BlockEncodingSerde, output: &mut BytesMut, block: &dyn Block) -> Result<()> {
		let single = block
			.as_any()
			.downcast_ref::<SingleRowBlock>()
			.ok_or_else(|| invalid_argument!("ROW_ELEMENT cannot write {} block", block.encoding_name()))?;
		write_length(output, single.position_count())?;
		for index in 0..single.position_count() {
			let field = single.raw_field_block(index)?.get_region(single.row_index(), 1)?;
			serde.write_block(output, field.as_ref())?;
		}
		Ok(())
	}

	fn read_block(&self, serde: &BlockEncodingSerde, input: &mut Bytes) -> Result<BlockRef> {
		let fields = read_fields(serde, input)?;
		if let Some(field) = fields.iter().find(|f| f.position_count() != 1) {
			return Err(corrupt!("row element field has {} positions", field.position_count()));
		}
		Ok(Arc::new(SingleRowBlock::new(0, fields.into())))
	}
}

#[cfg(test)]
pub mod tests {
	use bytes::BufMut;
	use tessera_type::util::BitVec;

	use super::*;
	use crate::{ByteArrayBlock, IntArrayBlock, VariableWidthBlock, util::blocks_equal};

	/// `(1, "a")`, null, `(null, "c")`
	fn sample() -> RowBlock {
		RowBlock::from_field_blocks(
			3,
			Some(BitVec::from_slice(&[false, true, false])),
			vec![
				Arc::new(IntArrayBlock::from_options(&[Some(1), None])),
				Arc::new(VariableWidthBlock::from_strs(&[Some("a"), Some("c")])),
			],
		)
		.unwrap()
	}

	#[test]
	fn test_round_trip() {
		let serde = BlockEncodingSerde::default();
		let row = sample();
		let decoded = serde.deserialize(serde.serialize(&row).unwrap()).unwrap();
		let decoded_row = decoded.as_any().downcast_ref::<RowBlock>().unwrap();
		assert_eq!(decoded_row.field_count(), 2);
		assert_eq!(decoded_row.field_block_offsets(), &[0, 1, 1, 2]);
		assert!(decoded.is_null(1).unwrap());
		assert!(blocks_equal(decoded.as_ref(), &row).unwrap());
	}

	#[test]
	fn test_region_is_rebased() {
		let serde = BlockEncodingSerde::default();
		let region = sample().get_region(1, 2).unwrap();
		let decoded = serde.deserialize(serde.serialize(region.as_ref()).unwrap()).unwrap();
		let decoded_row = decoded.as_any().downcast_ref::<RowBlock>().unwrap();
		assert_eq!(decoded_row.field_block_offsets(), &[0, 0, 1]);
		assert_eq!(decoded_row.raw_field_block(1).unwrap().position_count(), 1);
		let fields = decoded.get_block(1).unwrap();
		assert!(fields.is_null(0).unwrap());
		assert_eq!(fields.get_slice(1).unwrap(), b"c");
	}

	#[test]
	fn test_single_row_round_trip() {
		let serde = BlockEncodingSerde::default();
		let fields = sample().get_block(2).unwrap();
		let decoded = serde.deserialize(serde.serialize(fields.as_ref()).unwrap()).unwrap();
		assert_eq!(decoded.encoding_name(), "ROW_ELEMENT");
		assert_eq!(decoded.position_count(), 2);
		assert!(decoded.is_null(0).unwrap());
		assert_eq!(decoded.get_slice(1).unwrap(), b"c");
	}

	#[test]
	fn test_offsets_must_follow_nulls() {
		let serde = BlockEncodingSerde::default();
		let mut output = BytesMut::new();
		write_length(&mut output, 1).unwrap();
		serde.write_block(&mut output, &ByteArrayBlock::from_values(vec![1, 2])).unwrap();
		write_length(&mut output, 2).unwrap();
		for offset in [0, 2, 2] {
			write_length(&mut output, offset).unwrap();
		}
		encode_nulls_as_bits(&mut output, &ByteArrayBlock::from_values(vec![0, 0])).unwrap();

		let err = RowBlockEncoding.read_block(&serde, &mut output.freeze()).unwrap_err();
		assert!(err.is_decode());
	}

	#[test]
	fn test_zero_fields() {
		let serde = BlockEncodingSerde::default();
		let mut input = Bytes::from_static(&[0, 0, 0, 0]);
		assert!(SingleRowBlockEncoding.read_block(&serde, &mut input).unwrap_err().is_decode());
	}

	#[test]
	fn test_oversized_position_count() {
		let serde = BlockEncodingSerde::default();
		let mut output = BytesMut::new();
		write_length(&mut output, 1).unwrap();
		serde.write_block(&mut output, &ByteArrayBlock::from_values(vec![1])).unwrap();
		write_length(&mut output, i32::MAX as usize).unwrap();
		write_length(&mut output, 0).unwrap();
		let err = RowBlockEncoding.read_block(&serde, &mut output.freeze()).unwrap_err();
		assert!(err.is_decode());
	}

	#[test]
	fn test_oversized_field_count() {
		let serde = BlockEncodingSerde::default();
		let mut input = Bytes::from_static(&[0xFF, 0xFF, 0xFF, 0x7F, 0, 0, 0, 0]);
		assert!(RowBlockEncoding.read_block(&serde, &mut input).unwrap_err().is_decode());
	}

	#[test]
	fn test_descending_offsets_are_corrupt() {
		let serde = BlockEncodingSerde::default();
		let mut output = BytesMut::new();
		write_length(&mut output, 1).unwrap();
		serde.write_block(&mut output, &ByteArrayBlock::from_values(vec![1])).unwrap();
		write_length(&mut output, 2).unwrap();
		for offset in [0, 1, 0] {
			write_length(&mut output, offset).unwrap();
		}
		output.put_u8(0);
		let err = RowBlockEncoding.read_block(&serde, &mut output.freeze()).unwrap_err();
		assert!(err.is_decode());
	}
}
