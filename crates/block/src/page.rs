// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use tessera_type::{Result, Type, Value, invalid_argument};
use tracing::{debug, instrument};

use crate::{
	BlockBuilder, BlockConfig, BlockRef, PageBuilderStatus,
	types::{create_block_builder, write_value},
};

/// One block builder per column, all reporting to one page status.
///
/// Callers write a value to every column builder and then declare the
/// position. [`PageBuilder::is_full`] tells them when to cut the page.
#[derive(Debug)]
pub struct PageBuilder {
	types: Vec<Type>,
	config: BlockConfig,
	status: PageBuilderStatus,
	block_builders: Vec<Box<dyn BlockBuilder>>,
	declared_positions: usize,
}

impl PageBuilder {
	pub fn new(types: Vec<Type>, config: BlockConfig) -> Result<Self> {
		config.validate()?;
		let status = PageBuilderStatus::from_config(&config);
		let block_builders = types
			.iter()
			.map(|ty| create_block_builder(ty, Some(status.create_block_builder_status()), config.expected_entries))
			.collect::<Result<Vec<_>>>()?;
		Ok(Self {
			types,
			config,
			status,
			block_builders,
			declared_positions: 0,
		})
	}

	pub fn types(&self) -> &[Type] {
		&self.types
	}

	pub fn channel_count(&self) -> usize {
		self.block_builders.len()
	}

	pub fn block_builder(&mut self, channel: usize) -> Result<&mut dyn BlockBuilder> {
		let channel_count = self.block_builders.len();
		match self.block_builders.get_mut(channel) {
			Some(builder) => Ok(builder.as_mut()),
			None => Err(invalid_argument!("channel {} does not exist, page has {} channels", channel, channel_count)),
		}
	}

	pub fn declare_position(&mut self) {
		self.declared_positions += 1;
	}

	pub fn declare_positions(&mut self, positions: usize) {
		self.declared_positions += positions;
	}

	/// Writes one value per column and declares the position.
	pub fn append_row(&mut self, values: &[Value]) -> Result<()> {
		if values.len() != self.types.len() {
			return Err(invalid_argument!("page has {} channels but row has {} values", self.types.len(), values.len()));
		}
		for ((ty, builder), value) in self.types.iter().zip(self.block_builders.iter_mut()).zip(values) {
			write_value(ty, builder.as_mut(), value)?;
		}
		self.declare_position();
		Ok(())
	}

	pub fn is_full(&self) -> bool {
		self.declared_positions >= i32::MAX as usize || self.status.is_full()
	}

	pub fn is_empty(&self) -> bool {
		self.declared_positions == 0
	}

	pub fn position_count(&self) -> usize {
		self.declared_positions
	}

	/// Bytes reported by the column builders since the last reset.
	pub fn size_in_bytes(&self) -> u64 {
		self.status.size_in_bytes()
	}

	pub fn retained_size_in_bytes(&self) -> u64 {
		self.block_builders.iter().map(|b| b.retained_size_in_bytes()).sum()
	}

	/// Finalizes one block per column and resets the builders for the next page.
	///
	/// Every column must hold exactly the declared number of positions.
	#[instrument(name = "block::page::build", level = "trace", skip_all, fields(positions = self.declared_positions))]
	pub fn build(&mut self) -> Result<Vec<BlockRef>> {
		for (channel, builder) in self.block_builders.iter().enumerate() {
			if builder.position_count() != self.declared_positions {
				return Err(invalid_argument!(
					"Declared positions ({}) does not match block {}'s number of entries ({})",
					self.declared_positions,
					channel,
					builder.position_count()
				));
			}
		}
		let blocks = self.block_builders.iter().map(|b| b.build()).collect::<Result<Vec<_>>>()?;
		debug!(positions = self.declared_positions, bytes = self.status.size_in_bytes(), "built page");
		self.reset();
		Ok(blocks)
	}

	pub fn reset(&mut self) {
		if self.is_empty() {
			return;
		}
		self.status = PageBuilderStatus::from_config(&self.config);
		self.declared_positions = 0;
		for builder in &mut self.block_builders {
			*builder = builder.new_block_builder_like(Some(self.status.create_block_builder_status()));
		}
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;
	use crate::{types::block_values, util::blocks_equal};

	fn columns() -> Vec<Type> {
		vec![Type::Int8, Type::Utf8, Type::map(Type::Int4, Type::Boolean)]
	}

	#[test]
	fn test_append_rows_and_build() {
		let mut page = PageBuilder::new(columns(), BlockConfig::default()).unwrap();
		assert!(page.is_empty());
		page.append_row(&[Value::int8(1), Value::utf8("a"), Value::map([(Value::int4(1), Value::bool(true))])]).unwrap();
		page.append_row(&[Value::Undefined, Value::utf8("b"), Value::Undefined]).unwrap();
		assert_eq!(page.position_count(), 2);
		assert!(page.size_in_bytes() > 0);

		let blocks = page.build().unwrap();
		assert_eq!(blocks.len(), 3);
		assert_eq!(block_values(&Type::Int8, blocks[0].as_ref()).unwrap(), vec![Value::int8(1), Value::Undefined]);
		assert_eq!(blocks[1].get_slice(1).unwrap(), b"b");
		assert!(blocks[2].is_null(1).unwrap());

		assert!(page.is_empty());
		assert_eq!(page.size_in_bytes(), 0);
		assert_eq!(page.block_builder(0).unwrap().position_count(), 0);
	}

	#[test]
	fn test_manual_channel_writes() {
		let mut page = PageBuilder::new(vec![Type::Int4, Type::Int4], BlockConfig::default()).unwrap();
		page.block_builder(0).unwrap().write_int(5).unwrap();
		page.block_builder(1).unwrap().push_null().unwrap();
		page.declare_position();
		let blocks = page.build().unwrap();
		assert_eq!(blocks[0].get_int(0).unwrap(), 5);
		assert!(blocks[1].is_null(0).unwrap());
		assert!(page.block_builder(2).is_err());
	}

	#[test]
	fn test_declared_positions_must_match() {
		let mut page = PageBuilder::new(vec![Type::Int4], BlockConfig::default()).unwrap();
		page.declare_positions(2);
		page.block_builder(0).unwrap().write_int(1).unwrap();
		assert!(page.build().is_err());
	}

	#[test]
	fn test_is_full_at_page_limit() {
		let config = BlockConfig {
			max_page_size_in_bytes: 32,
			max_block_size_in_bytes: 16,
			..BlockConfig::default()
		};
		let mut page = PageBuilder::new(vec![Type::Int8], config).unwrap();
		let mut rows = 0;
		while !page.is_full() {
			page.append_row(&[Value::int8(rows)]).unwrap();
			rows += 1;
		}
		// 9 bytes per long position
		assert_eq!(rows, 4);
		page.build().unwrap();
		assert!(!page.is_full());
	}

	#[test]
	fn test_row_width_mismatch() {
		let mut page = PageBuilder::new(columns(), BlockConfig::default()).unwrap();
		assert!(page.append_row(&[Value::int8(1)]).is_err());
	}

	#[test]
	fn test_pages_are_independent() {
		let mut page = PageBuilder::new(vec![Type::Utf8], BlockConfig::default()).unwrap();
		page.append_row(&[Value::utf8("first")]).unwrap();
		let first = page.build().unwrap();
		page.append_row(&[Value::utf8("second")]).unwrap();
		let second = page.build().unwrap();
		assert_eq!(first[0].get_slice(0).unwrap(), b"first");
		assert_eq!(second[0].get_slice(0).unwrap(), b"second");
		assert!(!blocks_equal(first[0].as_ref(), second[0].as_ref()).unwrap());
	}
}
