// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tessera_type::{Result, corrupt, invalid_argument};
use uuid::Uuid;

use super::{
	BlockEncoding, BlockEncodingSerde,
	io::{ensure_entries, read_length, read_u8, read_u64, read_u128, write_length},
};
use crate::{Block, BlockRef, DictionaryBlock, DictionaryEncodingPolicy, DictionaryId};

/// `[position count][dictionary block][id per position][source id][sequence][compact flag]`
///
/// Under [`DictionaryEncodingPolicy::Compact`] the dictionary is compacted
/// before it is written.
pub struct DictionaryBlockEncoding;

impl BlockEncoding for DictionaryBlockEncoding {
	fn name(&self) -> &'static str {
		"DICTIONARY"
	}

	fn write_block(&self, serde: &BlockEncodingSerde, output: &mut BytesMut, block: &dyn Block) -> Result<()> {
		let block = block
			.as_any()
			.downcast_ref::<DictionaryBlock>()
			.ok_or_else(|| invalid_argument!("DICTIONARY cannot write {} block", block.encoding_name()))?;
		let compacted;
		let block = if serde.config().dictionary_encoding == DictionaryEncodingPolicy::Compact {
			compacted = block.compact()?;
			&compacted
		} else {
			block
		};

		write_length(output, block.position_count())?;
		serde.write_block(output, block.dictionary().as_ref())?;
		for &id in block.ids() {
			write_length(output, id)?;
		}
		let source_id = block.dictionary_source_id();
		output.put_u128_le(source_id.source().as_u128());
		output.put_u64_le(source_id.sequence());
		output.put_u8(u8::from(block.is_compact()));
		Ok(())
	}

	fn read_block(&self, serde: &BlockEncodingSerde, input: &mut Bytes) -> Result<BlockRef> {
		let position_count = read_length(input, "position count")?;
		let dictionary = serde.read_block(input)?;
		let dictionary_count = dictionary.position_count();

		ensure_entries(input, position_count, 4)?;
		// fewer positions than entries can never reference every entry
		let mut used = if position_count >= dictionary_count {
			vec![false; dictionary_count]
		} else {
			Vec::new()
		};
		let mut unique_ids = 0;
		let mut ids = Vec::with_capacity(position_count);
		for _ in 0..position_count {
			let id = read_length(input, "dictionary id")?;
			if id >= dictionary_count {
				return Err(corrupt!("dictionary id {} is outside dictionary of {} entries", id, dictionary_count));
			}
			if let Some(slot) = used.get_mut(id) {
				if !*slot {
					*slot = true;
					unique_ids += 1;
				}
			}
			ids.push(id);
		}
		let is_compact = position_count >= dictionary_count && unique_ids == dictionary_count;

		let source = Uuid::from_u128(read_u128(input)?);
		let sequence = read_u64(input)?;
		let compacted = match read_u8(input)? {
			0 => false,
			1 => true,
			flag => return Err(corrupt!("invalid dictionary compact flag {}", flag)),
		};
		if compacted != is_compact {
			return Err(corrupt!(
				"compact flag is {} but ids reference {} of {} dictionary entries",
				compacted,
				unique_ids,
				dictionary_count
			));
		}
		Ok(Arc::new(DictionaryBlock::with_source_id(
			0,
			position_count,
			dictionary,
			ids,
			compacted,
			DictionaryId::new(source, sequence),
		)?))
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;
	use crate::{BlockConfig, IntArrayBlock, VariableWidthBlock, util::blocks_equal};

	fn sample() -> DictionaryBlock {
		let dictionary: BlockRef = Arc::new(VariableWidthBlock::from_strs(&[Some("a"), Some("b"), Some("c"), None]));
		DictionaryBlock::new(dictionary, vec![2, 0, 2, 2]).unwrap()
	}

	fn serde(policy: DictionaryEncodingPolicy) -> BlockEncodingSerde {
		BlockEncodingSerde::new(BlockConfig::default().with_dictionary_encoding(policy))
	}

	#[test]
	fn test_compact_policy_shrinks_dictionary() {
		let serde = serde(DictionaryEncodingPolicy::Compact);
		let block = sample();
		let decoded = serde.deserialize(serde.serialize(&block).unwrap()).unwrap();
		let decoded_dictionary = decoded.as_any().downcast_ref::<DictionaryBlock>().unwrap();
		assert_eq!(decoded_dictionary.dictionary().position_count(), 2);
		assert_eq!(decoded_dictionary.ids(), &[0, 1, 0, 0]);
		assert!(decoded_dictionary.is_compact());
		assert!(blocks_equal(decoded.as_ref(), &block).unwrap());
	}

	#[test]
	fn test_preserve_policy_keeps_dictionary_and_source() {
		let serde = serde(DictionaryEncodingPolicy::Preserve);
		let block = sample();
		let decoded = serde.deserialize(serde.serialize(&block).unwrap()).unwrap();
		let decoded_dictionary = decoded.as_any().downcast_ref::<DictionaryBlock>().unwrap();
		assert_eq!(decoded_dictionary.dictionary().position_count(), 4);
		assert_eq!(decoded_dictionary.ids(), block.ids());
		assert_eq!(decoded_dictionary.dictionary_source_id(), block.dictionary_source_id());
		assert!(!decoded_dictionary.is_compact());
	}

	#[test]
	fn test_flatten_policy_writes_values() {
		let serde = serde(DictionaryEncodingPolicy::Flatten);
		let block = sample();
		let decoded = serde.deserialize(serde.serialize(&block).unwrap()).unwrap();
		assert_eq!(decoded.encoding_name(), "VARIABLE_WIDTH");
		assert!(blocks_equal(decoded.as_ref(), &block).unwrap());
	}

	#[test]
	fn test_region_ids_are_rebased() {
		let serde = serde(DictionaryEncodingPolicy::Preserve);
		let block = sample();
		let region = block.get_region(1, 2).unwrap();
		let decoded = serde.deserialize(serde.serialize(region.as_ref()).unwrap()).unwrap();
		assert_eq!(decoded.position_count(), 2);
		assert_eq!(decoded.get_slice(0).unwrap(), b"a");
		assert_eq!(decoded.get_slice(1).unwrap(), b"c");
	}

	#[test]
	fn test_id_outside_dictionary() {
		let serde = serde(DictionaryEncodingPolicy::Preserve);
		let block = DictionaryBlock::new(Arc::new(IntArrayBlock::from_values(vec![1])), vec![0, 3]).unwrap();
		let bytes = serde.serialize(&block).unwrap();
		assert!(serde.deserialize(bytes).unwrap_err().is_decode());
	}

	#[test]
	fn test_compact_flag_must_match_ids() {
		let serde = serde(DictionaryEncodingPolicy::Preserve);
		let dictionary: BlockRef = Arc::new(VariableWidthBlock::from_strs(&[Some("a"), Some("b"), Some("c")]));
		let block = DictionaryBlock::new(dictionary, vec![0, 0]).unwrap();
		let mut bytes = BytesMut::from(&serde.serialize(&block).unwrap()[..]);
		let flag = bytes.len() - 1;
		assert_eq!(bytes[flag], 0);
		bytes[flag] = 1;
		assert!(serde.deserialize(bytes.freeze()).unwrap_err().is_decode());

		let compacted = block.compact().unwrap();
		let mut bytes = BytesMut::from(&serde.serialize(&compacted).unwrap()[..]);
		let flag = bytes.len() - 1;
		assert_eq!(bytes[flag], 1);
		bytes[flag] = 0;
		assert!(serde.deserialize(bytes.freeze()).unwrap_err().is_decode());
	}

	#[test]
	fn test_oversized_position_count() {
		let serde = serde(DictionaryEncodingPolicy::Preserve);
		let mut output = BytesMut::new();
		output.put_i32_le(i32::MAX);
		serde.write_block(&mut output, &IntArrayBlock::from_values(vec![1])).unwrap();
		output.put_i32_le(0);
		let err = DictionaryBlockEncoding.read_block(&serde, &mut output.freeze()).unwrap_err();
		assert!(err.is_decode());
	}
}
