// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Binary block encodings.
//!
//! A serialized block is its encoding name as a length-prefixed string
//! followed by the body of that encoding. Nested blocks (dictionaries, map
//! keys and values, row fields) are written recursively through the same
//! [`BlockEncodingSerde`]. All integers are little-endian.

mod dictionary;
mod io;
mod lazy;
mod map;
pub mod nulls;
mod primitive;
mod rle;
mod row;
pub mod stream;
mod variable_width;

use std::{
	collections::HashMap,
	fmt::{self, Debug, Formatter},
	sync::Arc,
};

use bytes::{Buf, Bytes, BytesMut};
pub use dictionary::DictionaryBlockEncoding;
pub use io::{read_length_prefixed_string, write_length_prefixed_string};
pub use lazy::LazyBlockEncoding;
pub use map::{MapBlockEncoding, SingleMapBlockEncoding};
pub use primitive::PrimitiveBlockEncoding;
pub use rle::RunLengthBlockEncoding;
pub use row::{RowBlockEncoding, SingleRowBlockEncoding};
use tessera_type::{DecodeError, Result, corrupt};
use tracing::{instrument, trace};
pub use variable_width::VariableWidthBlockEncoding;

use crate::{Block, BlockConfig, BlockRef, DictionaryBlock, DictionaryEncodingPolicy};

/// Reads and writes the body of one block variant.
pub trait BlockEncoding: Send + Sync {
	/// Name written in front of every block of this encoding.
	fn name(&self) -> &'static str;

	fn write_block(&self, serde: &BlockEncodingSerde, output: &mut BytesMut, block: &dyn Block) -> Result<()>;

	fn read_block(&self, serde: &BlockEncodingSerde, input: &mut Bytes) -> Result<BlockRef>;
}

/// Registry of block encodings keyed by name.
pub struct BlockEncodingSerde {
	encodings: HashMap<&'static str, Arc<dyn BlockEncoding>>,
	config: BlockConfig,
}

impl BlockEncodingSerde {
	/// Registry holding every built-in encoding.
	pub fn new(config: BlockConfig) -> Self {
		let mut serde = Self {
			encodings: HashMap::new(),
			config,
		};
		serde.register(Arc::new(PrimitiveBlockEncoding::<i8>::new()));
		serde.register(Arc::new(PrimitiveBlockEncoding::<i16>::new()));
		serde.register(Arc::new(PrimitiveBlockEncoding::<i32>::new()));
		serde.register(Arc::new(PrimitiveBlockEncoding::<i64>::new()));
		serde.register(Arc::new(VariableWidthBlockEncoding));
		serde.register(Arc::new(RunLengthBlockEncoding));
		serde.register(Arc::new(DictionaryBlockEncoding));
		serde.register(Arc::new(MapBlockEncoding));
		serde.register(Arc::new(SingleMapBlockEncoding));
		serde.register(Arc::new(RowBlockEncoding));
		serde.register(Arc::new(SingleRowBlockEncoding));
		serde.register(Arc::new(LazyBlockEncoding));
		serde
	}

	/// Adds `encoding`, returning the one it replaces.
	pub fn register(&mut self, encoding: Arc<dyn BlockEncoding>) -> Option<Arc<dyn BlockEncoding>> {
		self.encodings.insert(encoding.name(), encoding)
	}

	pub fn encoding(&self, name: &str) -> Option<&Arc<dyn BlockEncoding>> {
		self.encodings.get(name)
	}

	pub fn config(&self) -> &BlockConfig {
		&self.config
	}

	/// Writes the encoding name and body of `block`.
	///
	/// Lazy blocks are loaded first. Under
	/// [`DictionaryEncodingPolicy::Flatten`] dictionary blocks are written as
	/// their flattened values.
	#[instrument(
		name = "block::encoding::write_block",
		level = "trace",
		skip_all,
		fields(encoding = block.encoding_name(), positions = block.position_count())
	)]
	pub fn write_block(&self, output: &mut BytesMut, block: &dyn Block) -> Result<()> {
		let mut block = block.to_block()?;
		if self.config.dictionary_encoding == DictionaryEncodingPolicy::Flatten {
			loop {
				let Some(dictionary) = block.as_any().downcast_ref::<DictionaryBlock>() else {
					break;
				};
				let flattened = dictionary.flatten()?;
				block = flattened;
			}
		}

		let name = block.encoding_name();
		let encoding = self.encoding(name).ok_or_else(|| DecodeError::UnknownEncoding(name.to_string()))?;
		write_length_prefixed_string(output, name)?;
		encoding.write_block(self, output, block.as_ref())
	}

	pub fn read_block(&self, input: &mut Bytes) -> Result<BlockRef> {
		let name = read_length_prefixed_string(input)?;
		let encoding = self.encoding(&name).ok_or(DecodeError::UnknownEncoding(name))?;
		let block = encoding.read_block(self, input)?;
		trace!(encoding = encoding.name(), positions = block.position_count(), "read block");
		Ok(block)
	}

	pub fn serialize(&self, block: &dyn Block) -> Result<Bytes> {
		let mut output = BytesMut::new();
		self.write_block(&mut output, block)?;
		Ok(output.freeze())
	}

	/// Reads exactly one block; trailing bytes are an error.
	pub fn deserialize(&self, mut input: Bytes) -> Result<BlockRef> {
		let block = self.read_block(&mut input)?;
		if input.has_remaining() {
			return Err(corrupt!("{} trailing bytes after block", input.remaining()));
		}
		Ok(block)
	}
}

impl Default for BlockEncodingSerde {
	fn default() -> Self {
		Self::new(BlockConfig::default())
	}
}

impl Debug for BlockEncodingSerde {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let mut names: Vec<_> = self.encodings.keys().collect();
		names.sort();
		f.debug_struct("BlockEncodingSerde").field("encodings", &names).field("config", &self.config).finish()
	}
}

#[cfg(test)]
pub mod tests {
	use tessera_type::Error;

	use super::*;
	use crate::{IntArrayBlock, LazyBlock, VariableWidthBlock, util::blocks_equal};

	#[test]
	fn test_registers_builtin_encodings() {
		let serde = BlockEncodingSerde::default();
		for name in [
			"BYTE_ARRAY",
			"SHORT_ARRAY",
			"INT_ARRAY",
			"LONG_ARRAY",
			"VARIABLE_WIDTH",
			"RLE",
			"DICTIONARY",
			"MAP",
			"MAP_ELEMENT",
			"ROW",
			"ROW_ELEMENT",
			"LAZY",
		] {
			assert_eq!(serde.encoding(name).unwrap().name(), name);
		}
		assert!(serde.encoding("ARRAY").is_none());
	}

	#[test]
	fn test_serialize_writes_name_first() {
		let serde = BlockEncodingSerde::default();
		let bytes = serde.serialize(&IntArrayBlock::from_values(vec![7])).unwrap();
		assert_eq!(&bytes[..4], &[9, 0, 0, 0]);
		assert_eq!(&bytes[4..13], b"INT_ARRAY");
	}

	#[test]
	fn test_unknown_encoding() {
		let serde = BlockEncodingSerde::default();
		let mut output = BytesMut::new();
		write_length_prefixed_string(&mut output, "ARRAY").unwrap();
		let err = serde.deserialize(output.freeze()).unwrap_err();
		assert_eq!(err, Error::Decode(DecodeError::UnknownEncoding("ARRAY".to_string())));
	}

	#[test]
	fn test_trailing_bytes() {
		let serde = BlockEncodingSerde::default();
		let mut output = BytesMut::from(&serde.serialize(&IntArrayBlock::from_values(vec![1])).unwrap()[..]);
		output.extend_from_slice(&[0]);
		assert!(serde.deserialize(output.freeze()).unwrap_err().is_decode());
	}

	#[test]
	fn test_lazy_block_is_loaded_before_writing() {
		let serde = BlockEncodingSerde::default();
		let lazy = LazyBlock::new(2, || Ok(Arc::new(VariableWidthBlock::from_strs(&[Some("a"), None])) as BlockRef));
		let bytes = serde.serialize(&lazy).unwrap();
		let decoded = serde.deserialize(bytes).unwrap();
		assert_eq!(decoded.encoding_name(), "VARIABLE_WIDTH");
		assert!(blocks_equal(decoded.as_ref(), &lazy).unwrap());
	}

	#[test]
	fn test_register_replaces() {
		let mut serde = BlockEncodingSerde::default();
		let previous = serde.register(Arc::new(RunLengthBlockEncoding));
		assert_eq!(previous.unwrap().name(), "RLE");
	}
}
