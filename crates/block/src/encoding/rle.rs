// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tessera_type::{Result, corrupt, invalid_argument};

use super::{
	BlockEncoding, BlockEncodingSerde,
	io::{read_length, write_length},
};
use crate::{Block, BlockRef, RunLengthEncodedBlock};

/// `[position count][single value block]`
pub struct RunLengthBlockEncoding;

impl BlockEncoding for RunLengthBlockEncoding {
	fn name(&self) -> &'static str {
		"RLE"
	}

	fn write_block(&self, serde: &BlockEncodingSerde, output: &mut BytesMut, block: &dyn Block) -> Result<()> {
		let block = block
			.as_any()
			.downcast_ref::<RunLengthEncodedBlock>()
			.ok_or_else(|| invalid_argument!("RLE cannot write {} block", block.encoding_name()))?;
		write_length(output, block.position_count())?;
		serde.write_block(output, block.value().as_ref())
	}

	fn read_block(&self, serde: &BlockEncodingSerde, input: &mut Bytes) -> Result<BlockRef> {
		let position_count = read_length(input, "position count")?;
		let value = serde.read_block(input)?;
		if value.position_count() != 1 {
			return Err(corrupt!("run-length value has {} positions", value.position_count()));
		}
		Ok(Arc::new(RunLengthEncodedBlock::new(value, position_count)?))
	}
}
