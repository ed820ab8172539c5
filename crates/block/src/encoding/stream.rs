// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Position-at-a-time transport.
//!
//! `[position count: i32]` followed by one tagged record per position as
//! written by [`Block::write_position_to_output`]. Readers append the records
//! to any builder of a compatible shape, so a consumer can decode straight
//! into the builder it is filling.

use bytes::{Bytes, BytesMut};
use tessera_type::Result;
use tracing::instrument;

use super::io::{read_length, write_length};
use crate::{Block, BlockBuilder};

#[instrument(name = "block::encoding::write_positions", level = "trace", skip_all, fields(positions = block.position_count()))]
pub fn write_positions(output: &mut BytesMut, block: &dyn Block) -> Result<()> {
	write_length(output, block.position_count())?;
	for position in 0..block.position_count() {
		block.write_position_to_output(position, output)?;
	}
	Ok(())
}

/// Appends every streamed position to `builder` and returns how many were read.
#[instrument(name = "block::encoding::read_positions", level = "trace", skip_all)]
pub fn read_positions(input: &mut Bytes, builder: &mut dyn BlockBuilder) -> Result<usize> {
	let position_count = read_length(input, "position count")?;
	for _ in 0..position_count {
		builder.read_position_from(input)?;
	}
	Ok(position_count)
}
