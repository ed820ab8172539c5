// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use bytes::{Bytes, BytesMut};
use tessera_type::{Result, unsupported};

use super::{BlockEncoding, BlockEncodingSerde};
use crate::{Block, BlockRef};

/// Lazy blocks have no wire form of their own; [`BlockEncodingSerde`] loads
/// them and writes the loaded block instead.
pub struct LazyBlockEncoding;

impl BlockEncoding for LazyBlockEncoding {
	fn name(&self) -> &'static str {
		"LAZY"
	}

	fn write_block(&self, _serde: &BlockEncodingSerde, _output: &mut BytesMut, _block: &dyn Block) -> Result<()> {
		Err(unsupported!("LAZY blocks must be loaded before they are written"))
	}

	fn read_block(&self, _serde: &BlockEncodingSerde, _input: &mut Bytes) -> Result<BlockRef> {
		Err(unsupported!("LAZY blocks cannot be read"))
	}
}
