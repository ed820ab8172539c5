// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	any::Any,
	fmt::{self, Debug, Formatter},
	sync::Arc,
};

use bytes::BytesMut;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tessera_type::{Result, invalid_argument};
use tracing::trace;

use crate::{Block, BlockBuilder, BlockRef, size::instance_size};

type Loader = Box<dyn FnOnce() -> Result<BlockRef> + Send>;

/// A block whose content is produced on first access.
///
/// The position count is known up front. The loader runs at most once, even
/// under concurrent readers; clones share the loaded block.
#[derive(Clone)]
pub struct LazyBlock {
	position_count: usize,
	state: Arc<LazyState>,
}

struct LazyState {
	loader: Mutex<Option<Loader>>,
	block: OnceCell<BlockRef>,
}

impl LazyBlock {
	pub fn new(position_count: usize, loader: impl FnOnce() -> Result<BlockRef> + Send + 'static) -> Self {
		Self {
			position_count,
			state: Arc::new(LazyState {
				loader: Mutex::new(Some(Box::new(loader))),
				block: OnceCell::new(),
			}),
		}
	}

	/// The loaded block, running the loader if no reader has yet.
	pub fn block(&self) -> Result<&BlockRef> {
		self.state.block.get_or_try_init(|| {
			let loader = self
				.state
				.loader
				.lock()
				.take()
				.ok_or_else(|| invalid_argument!("lazy block loader already failed"))?;
			trace!(positions = self.position_count, "loading lazy block");
			let block = loader()?;
			if block.position_count() != self.position_count {
				return Err(invalid_argument!(
					"loaded block has {} positions, expected {}",
					block.position_count(),
					self.position_count
				));
			}
			Ok(block)
		})
	}
}

impl Debug for LazyBlock {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("LazyBlock")
			.field("position_count", &self.position_count)
			.field("loaded", &self.state.block.get().is_some())
			.finish()
	}
}

impl Block for LazyBlock {
	fn encoding_name(&self) -> &'static str {
		"LAZY"
	}

	fn position_count(&self) -> usize {
		self.position_count
	}

	fn is_null(&self, position: usize) -> Result<bool> {
		self.block()?.is_null(position)
	}

	fn may_have_null(&self) -> bool {
		self.block().map_or(true, |b| b.may_have_null())
	}

	fn get_byte(&self, position: usize) -> Result<i8> {
		self.block()?.get_byte(position)
	}

	fn get_short(&self, position: usize) -> Result<i16> {
		self.block()?.get_short(position)
	}

	fn get_int(&self, position: usize) -> Result<i32> {
		self.block()?.get_int(position)
	}

	fn get_long(&self, position: usize) -> Result<i64> {
		self.block()?.get_long(position)
	}

	fn get_slice(&self, position: usize) -> Result<&[u8]> {
		self.block()?.get_slice(position)
	}

	fn get_block(&self, position: usize) -> Result<BlockRef> {
		self.block()?.get_block(position)
	}

	fn get_single_value_block(&self, position: usize) -> Result<BlockRef> {
		self.block()?.get_single_value_block(position)
	}

	fn get_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		self.block()?.get_region(offset, length)
	}

	fn copy_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		self.block()?.copy_region(offset, length)
	}

	fn copy_positions(&self, positions: &[usize], offset: usize, length: usize) -> Result<BlockRef> {
		self.block()?.copy_positions(positions, offset, length)
	}

	fn get_positions(&self, positions: &[usize], offset: usize, length: usize) -> Result<BlockRef> {
		self.block()?.get_positions(positions, offset, length)
	}

	/// Zero until loaded.
	fn size_in_bytes(&self) -> u64 {
		self.state.block.get().map_or(0, |b| b.size_in_bytes())
	}

	fn region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		self.block()?.region_size_in_bytes(offset, length)
	}

	fn positions_size_in_bytes(&self, selected: &[bool], selected_count: usize) -> Result<u64> {
		self.block()?.positions_size_in_bytes(selected, selected_count)
	}

	fn retained_size_in_bytes(&self) -> u64 {
		instance_size::<Self>() + self.state.block.get().map_or(0, |b| b.retained_size_in_bytes())
	}

	fn logical_size_in_bytes(&self) -> u64 {
		self.state.block.get().map_or(0, |b| b.logical_size_in_bytes())
	}

	fn region_logical_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		self.block()?.region_logical_size_in_bytes(offset, length)
	}

	fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
		self.block()?.estimated_data_size_for_stats(position)
	}

	fn append_null(&self) -> Result<BlockRef> {
		self.block()?.append_null()
	}

	fn write_position_to(&self, position: usize, builder: &mut dyn BlockBuilder) -> Result<()> {
		self.block()?.write_position_to(position, builder)
	}

	fn write_position_to_output(&self, position: usize, output: &mut BytesMut) -> Result<()> {
		self.block()?.write_position_to_output(position, output)
	}

	fn is_loaded(&self) -> bool {
		self.state.block.get().is_some_and(|b| b.is_loaded())
	}

	fn to_block(&self) -> Result<BlockRef> {
		self.block()?.to_block()
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}
