// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tessera_block::{
	Block, BlockConfig, BlockEncodingSerde, BlockRef, DictionaryBlock, DictionaryEncodingPolicy, IntArrayBlock,
	LazyBlock, RunLengthEncodedBlock, Type, Value, VariableWidthBlock,
	encoding::{
		stream::{read_positions, write_positions},
		write_length_prefixed_string,
	},
	types::{block_from_values, block_values, create_block_builder},
	util::blocks_equal,
};

fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::TRACE).try_init();
}

fn serde(policy: DictionaryEncodingPolicy) -> BlockEncodingSerde {
	BlockEncodingSerde::new(BlockConfig::default().with_dictionary_encoding(policy))
}

const POLICIES: [DictionaryEncodingPolicy; 3] =
	[DictionaryEncodingPolicy::Preserve, DictionaryEncodingPolicy::Compact, DictionaryEncodingPolicy::Flatten];

/// One block of every shape, with nulls and nesting.
fn samples() -> Vec<(Type, BlockRef)> {
	let strings = block_from_values(&Type::Utf8, &[Value::utf8("x"), Value::Undefined, Value::utf8("yy")]).unwrap();
	let map_type = Type::map(Type::Utf8, Type::Int4);
	let row_type = Type::row([Type::Boolean, Type::map(Type::Int2, Type::Float8)]);

	vec![
		(Type::Int1, block_from_values(&Type::Int1, &[Value::int1(1), Value::Undefined]).unwrap()),
		(Type::Int2, block_from_values(&Type::Int2, &[Value::int2(-2i16)]).unwrap()),
		(Type::Int4, block_from_values(&Type::Int4, &[Value::Undefined, Value::int4(4)]).unwrap()),
		(Type::Float8, block_from_values(&Type::Float8, &[Value::float8(0.5)]).unwrap()),
		(Type::Utf8, strings.clone()),
		(Type::Utf8, Arc::new(DictionaryBlock::new(strings, vec![2, 2, 1, 2]).unwrap())),
		(
			Type::Int8,
			Arc::new(
				RunLengthEncodedBlock::new(block_from_values(&Type::Int8, &[Value::int8(9)]).unwrap(), 5).unwrap(),
			),
		),
		(
			map_type.clone(),
			block_from_values(
				&map_type,
				&[
					Value::map([(Value::utf8("a"), Value::int4(1)), (Value::utf8("b"), Value::Undefined)]),
					Value::Undefined,
					Value::map([]),
				],
			)
			.unwrap(),
		),
		(
			row_type.clone(),
			block_from_values(
				&row_type,
				&[
					Value::row([Value::bool(true), Value::map([(Value::int2(1i16), Value::float8(1.25))])]),
					Value::Undefined,
					Value::row([Value::Undefined, Value::Undefined]),
				],
			)
			.unwrap(),
		),
		(Type::Int4, block_from_values(&Type::Int4, &[Value::Undefined, Value::Undefined]).unwrap()),
	]
}

#[test]
fn test_round_trip_under_every_policy() {
	init_tracing();
	for policy in POLICIES {
		let serde = serde(policy);
		for (ty, block) in samples() {
			let decoded = serde.deserialize(serde.serialize(block.as_ref()).unwrap()).unwrap();
			assert!(blocks_equal(decoded.as_ref(), block.as_ref()).unwrap(), "{:?} {}", policy, block.encoding_name());
			assert_eq!(block_values(&ty, decoded.as_ref()).unwrap(), block_values(&ty, block.as_ref()).unwrap());
		}
	}
}

#[test]
fn test_regions_round_trip() {
	let serde = BlockEncodingSerde::default();
	for (ty, block) in samples() {
		let count = block.position_count();
		if count < 2 {
			continue;
		}
		let region = block.get_region(1, count - 1).unwrap();
		let decoded = serde.deserialize(serde.serialize(region.as_ref()).unwrap()).unwrap();
		assert_eq!(block_values(&ty, decoded.as_ref()).unwrap(), block_values(&ty, region.as_ref()).unwrap());
	}
}

#[test]
fn test_dictionary_representation_follows_policy() {
	let dictionary = block_from_values(&Type::Int4, &[Value::int4(10), Value::int4(20), Value::int4(30)]).unwrap();
	let block = DictionaryBlock::new(dictionary, vec![1, 1]).unwrap();

	let preserved = serde(DictionaryEncodingPolicy::Preserve).serialize(&block).unwrap();
	let compacted = serde(DictionaryEncodingPolicy::Compact).serialize(&block).unwrap();
	let flattened = serde(DictionaryEncodingPolicy::Flatten).serialize(&block).unwrap();
	assert!(compacted.len() < preserved.len());

	let decoded = BlockEncodingSerde::default().deserialize(flattened).unwrap();
	assert_eq!(decoded.encoding_name(), "INT_ARRAY");
	assert_eq!(decoded.get_int(1).unwrap(), 20);
}

#[test]
fn test_nested_dictionary_is_flattened() {
	let keys = block_from_values(&Type::Int4, &[Value::int4(1), Value::int4(2)]).unwrap();
	let keys: BlockRef = Arc::new(DictionaryBlock::new(keys, vec![0, 1]).unwrap());
	let values = block_from_values(&Type::Utf8, &[Value::utf8("a"), Value::utf8("b")]).unwrap();
	let map = tessera_block::MapBlock::from_key_value_block(1, None, vec![0, 2], keys, values).unwrap();

	let serde = serde(DictionaryEncodingPolicy::Flatten);
	let bytes = serde.serialize(&map).unwrap();
	assert!(!bytes.windows(10).any(|w| w == b"DICTIONARY"));
	let decoded = serde.deserialize(bytes).unwrap();
	assert!(blocks_equal(decoded.as_ref(), &map).unwrap());
}

#[test]
fn test_lazy_blocks_serialize_loaded() {
	let serde = BlockEncodingSerde::default();
	let lazy = LazyBlock::new(2, || block_from_values(&Type::Utf8, &[Value::utf8("p"), Value::utf8("q")]));
	let decoded = serde.deserialize(serde.serialize(&lazy).unwrap()).unwrap();
	assert_eq!(decoded.encoding_name(), "VARIABLE_WIDTH");
	assert!(lazy.is_loaded());
}

#[test]
fn test_truncated_input_never_yields_a_block() {
	let serde = BlockEncodingSerde::default();
	for (_, block) in samples() {
		let bytes = serde.serialize(block.as_ref()).unwrap();
		for cut in [1, bytes.len() / 2, bytes.len() - 1] {
			let err = serde.deserialize(bytes.slice(..cut)).unwrap_err();
			assert!(err.is_decode(), "{} cut at {}: {}", block.encoding_name(), cut, err);
		}
	}
}

#[test]
fn test_stream_positions_into_builders() {
	for (ty, block) in samples() {
		let mut output = BytesMut::new();
		write_positions(&mut output, block.as_ref()).unwrap();

		let mut builder = create_block_builder(&ty, None, block.position_count()).unwrap();
		let mut input = output.freeze();
		assert_eq!(read_positions(&mut input, builder.as_mut()).unwrap(), block.position_count());
		assert!(input.is_empty());

		let built = builder.build().unwrap();
		assert_eq!(block_values(&ty, built.as_ref()).unwrap(), block_values(&ty, block.as_ref()).unwrap());
	}
}

fn map_bytes(tables: Option<&[u32]>, offsets: &[i32]) -> Bytes {
	let serde = BlockEncodingSerde::default();
	let mut output = BytesMut::new();
	write_length_prefixed_string(&mut output, "MAP").unwrap();
	serde.write_block(&mut output, &IntArrayBlock::from_values(vec![1, 2])).unwrap();
	serde.write_block(&mut output, &IntArrayBlock::from_values(vec![10, 20])).unwrap();
	match tables {
		Some(tables) => {
			output.put_i32_le(tables.len() as i32);
			for &slot in tables {
				output.put_u32_le(slot);
			}
		}
		None => output.put_i32_le(-1),
	}
	output.put_i32_le(offsets.len() as i32 - 1);
	for &offset in offsets {
		output.put_i32_le(offset);
	}
	output.put_u8(0);
	output.freeze()
}

#[test]
fn test_oversized_counts_are_rejected() {
	let serde = BlockEncodingSerde::default();
	let small = IntArrayBlock::from_values(vec![1]);

	let mut variable_width = BytesMut::new();
	write_length_prefixed_string(&mut variable_width, "VARIABLE_WIDTH").unwrap();
	variable_width.put_i32_le(i32::MAX);
	variable_width.put_i32_le(0);

	let mut map = BytesMut::new();
	write_length_prefixed_string(&mut map, "MAP").unwrap();
	serde.write_block(&mut map, &small).unwrap();
	serde.write_block(&mut map, &small).unwrap();
	map.put_i32_le(-1);
	map.put_i32_le(i32::MAX);

	let mut row_fields = BytesMut::new();
	write_length_prefixed_string(&mut row_fields, "ROW").unwrap();
	row_fields.put_i32_le(i32::MAX);

	let mut row_positions = BytesMut::new();
	write_length_prefixed_string(&mut row_positions, "ROW").unwrap();
	row_positions.put_i32_le(1);
	serde.write_block(&mut row_positions, &small).unwrap();
	row_positions.put_i32_le(i32::MAX);

	let mut dictionary = BytesMut::new();
	write_length_prefixed_string(&mut dictionary, "DICTIONARY").unwrap();
	dictionary.put_i32_le(i32::MAX);
	serde.write_block(&mut dictionary, &small).unwrap();

	for input in [variable_width, map, row_fields, row_positions, dictionary] {
		let err = serde.deserialize(input.freeze()).unwrap_err();
		assert!(err.is_decode(), "{}", err);
	}
}

#[test]
fn test_corrupt_hash_slots_are_rejected() {
	let serde = BlockEncodingSerde::default();
	let empty = u32::MAX;
	let decoded = serde.deserialize(map_bytes(Some(&[0, empty, empty, 0][..]), &[0, 1, 2])).unwrap();
	assert_eq!(decoded.encoding_name(), "MAP");

	for tables in [[0, 0, 0, 0], [5, empty, empty, 0], [0, empty, empty, empty], [0, 0, empty, 0]] {
		let err = serde.deserialize(map_bytes(Some(&tables[..]), &[0, 1, 2])).unwrap_err();
		assert!(err.is_decode(), "{:?}: {}", tables, err);
	}
}

#[test]
fn test_descending_offsets_are_rejected() {
	let serde = BlockEncodingSerde::default();
	let err = serde.deserialize(map_bytes(None, &[0, 2, 1])).unwrap_err();
	assert!(err.is_decode(), "{}", err);

	let mut row = BytesMut::new();
	write_length_prefixed_string(&mut row, "ROW").unwrap();
	row.put_i32_le(1);
	serde.write_block(&mut row, &IntArrayBlock::from_values(vec![7, 8])).unwrap();
	row.put_i32_le(2);
	for offset in [0, 1, 0] {
		row.put_i32_le(offset);
	}
	row.put_u8(0);
	let err = serde.deserialize(row.freeze()).unwrap_err();
	assert!(err.is_decode(), "{}", err);
}

#[test]
fn test_dictionary_compact_flag_is_checked() {
	let serde = serde(DictionaryEncodingPolicy::Preserve);
	let dictionary: BlockRef = Arc::new(VariableWidthBlock::from_strs(&[Some("a"), Some("b"), Some("c")]));
	let sparse = DictionaryBlock::new(dictionary.clone(), vec![0, 0]).unwrap();
	let full = DictionaryBlock::new(dictionary, vec![2, 0, 1]).unwrap();

	for (block, flag) in [(sparse, 0u8), (full, 1u8)] {
		let bytes = serde.serialize(&block).unwrap();
		let last = bytes.len() - 1;
		assert_eq!(bytes[last], flag);
		assert!(serde.deserialize(bytes.clone()).is_ok());

		for tampered in [flag ^ 1, 2] {
			let mut input = BytesMut::from(&bytes[..]);
			input[last] = tampered;
			let err = serde.deserialize(input.freeze()).unwrap_err();
			assert!(err.is_decode(), "flag {}: {}", tampered, err);
		}
	}
}

