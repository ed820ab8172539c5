// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{any::Any, sync::Arc};

use bytes::{Buf, Bytes, BytesMut};
use tessera_type::{
	DecodeError, Result, corrupt, invalid_argument,
	util::{BitVec, CowVec},
};
use tracing::trace;

use super::{Primitive, PrimitiveBlock};
use crate::{
	Block, BlockBuilder, BlockBuilderStatus, BlockRef, RunLengthEncodedBlock,
	size::instance_size,
	util::{calculate_block_reset_size, calculate_new_array_size, check_valid_position, check_valid_selection},
};

/// Growable builder for [`PrimitiveBlock`].
///
/// Capacity is allocated on the first write, sized from the expected entry
/// count, and afterwards grows by [`calculate_new_array_size`].
#[derive(Debug)]
pub struct PrimitiveBlockBuilder<T: Primitive> {
	status: Option<BlockBuilderStatus>,
	initialized: bool,
	initial_entry_count: usize,
	position_count: usize,
	has_null_value: bool,
	has_non_null_value: bool,
	value_is_null: BitVec,
	values: CowVec<T>,
}

impl<T: Primitive> PrimitiveBlockBuilder<T> {
	pub fn new(status: Option<BlockBuilderStatus>, expected_entries: usize) -> Self {
		Self {
			status,
			initialized: false,
			initial_entry_count: expected_entries.max(1),
			position_count: 0,
			has_null_value: false,
			has_non_null_value: false,
			value_is_null: BitVec::new(),
			values: CowVec::default(),
		}
	}

	pub fn capacity(&self) -> usize {
		self.values.capacity()
	}

	/// Appends a non-null value.
	pub fn push(&mut self, value: T) -> Result<()> {
		self.ensure_capacity()?;
		self.values.push(value);
		self.value_is_null.push(false);
		self.has_non_null_value = true;
		self.entry_added();
		Ok(())
	}

	fn ensure_capacity(&mut self) -> Result<()> {
		if self.initialized && self.position_count < self.values.capacity() {
			return Ok(());
		}
		let new_size = if self.initialized {
			calculate_new_array_size(self.values.capacity())?
		} else {
			self.initialized = true;
			self.initial_entry_count
		};
		let additional = new_size.saturating_sub(self.position_count);
		self.values.reserve_exact(additional);
		self.value_is_null.reserve(additional);
		Ok(())
	}

	fn entry_added(&mut self) {
		self.position_count += 1;
		if let Some(status) = &self.status {
			status.add_bytes(PrimitiveBlock::<T>::SIZE_IN_BYTES_PER_POSITION);
		}
	}

	fn snapshot(&self) -> Result<PrimitiveBlock<T>> {
		let nulls = self.has_null_value.then(|| self.value_is_null.clone());
		PrimitiveBlock::from_parts(0, self.position_count, nulls, self.values.clone())
	}

	fn value(&self, position: usize) -> Result<T> {
		check_valid_position(position, self.position_count)?;
		Ok(self.values[position])
	}
}

impl<T: Primitive> Block for PrimitiveBlockBuilder<T> {
	fn encoding_name(&self) -> &'static str {
		T::ENCODING_NAME
	}

	fn position_count(&self) -> usize {
		self.position_count
	}

	fn is_null(&self, position: usize) -> Result<bool> {
		check_valid_position(position, self.position_count)?;
		Ok(self.value_is_null.get(position))
	}

	fn may_have_null(&self) -> bool {
		self.has_null_value
	}

	fn get_byte(&self, position: usize) -> Result<i8> {
		self.snapshot()?.get_byte(position)
	}

	fn get_short(&self, position: usize) -> Result<i16> {
		self.snapshot()?.get_short(position)
	}

	fn get_int(&self, position: usize) -> Result<i32> {
		self.snapshot()?.get_int(position)
	}

	fn get_long(&self, position: usize) -> Result<i64> {
		self.snapshot()?.get_long(position)
	}

	fn get_single_value_block(&self, position: usize) -> Result<BlockRef> {
		self.snapshot()?.get_single_value_block(position)
	}

	fn get_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		self.build()?.get_region(offset, length)
	}

	fn copy_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		self.build()?.copy_region(offset, length)
	}

	fn copy_positions(&self, positions: &[usize], offset: usize, length: usize) -> Result<BlockRef> {
		self.build()?.copy_positions(positions, offset, length)
	}

	fn size_in_bytes(&self) -> u64 {
		PrimitiveBlock::<T>::SIZE_IN_BYTES_PER_POSITION * self.position_count as u64
	}

	fn region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		crate::util::check_valid_region(self.position_count, offset, length)?;
		Ok(PrimitiveBlock::<T>::SIZE_IN_BYTES_PER_POSITION * length as u64)
	}

	fn positions_size_in_bytes(&self, selected: &[bool], selected_count: usize) -> Result<u64> {
		check_valid_selection(selected, selected_count, self.position_count)?;
		Ok(PrimitiveBlock::<T>::SIZE_IN_BYTES_PER_POSITION * selected_count as u64)
	}

	fn fixed_size_in_bytes_per_position(&self) -> Option<u64> {
		Some(PrimitiveBlock::<T>::SIZE_IN_BYTES_PER_POSITION)
	}

	fn retained_size_in_bytes(&self) -> u64 {
		instance_size::<Self>() + self.values.retained_size_in_bytes() + self.value_is_null.retained_size_in_bytes()
	}

	fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
		Ok(if self.is_null(position)? {
			0
		} else {
			T::SIZE as u64
		})
	}

	fn append_null(&self) -> Result<BlockRef> {
		self.build()?.append_null()
	}

	fn write_position_to(&self, position: usize, builder: &mut dyn BlockBuilder) -> Result<()> {
		if self.is_null(position)? {
			return builder.push_null();
		}
		self.value(position)?.write_to(builder)?;
		builder.close_entry()
	}

	fn write_position_to_output(&self, position: usize, output: &mut BytesMut) -> Result<()> {
		self.snapshot()?.write_position_to_output(position, output)
	}

	fn to_block(&self) -> Result<BlockRef> {
		self.build()
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

impl<T: Primitive> BlockBuilder for PrimitiveBlockBuilder<T> {
	fn write_byte(&mut self, value: i8) -> Result<()> {
		let value = T::from_i8(value).ok_or_else(|| invalid_argument!("{} cannot hold a byte", T::ENCODING_NAME))?;
		self.push(value)
	}

	fn write_short(&mut self, value: i16) -> Result<()> {
		let value = T::from_i16(value).ok_or_else(|| invalid_argument!("{} cannot hold a short", T::ENCODING_NAME))?;
		self.push(value)
	}

	fn write_int(&mut self, value: i32) -> Result<()> {
		let value = T::from_i32(value).ok_or_else(|| invalid_argument!("{} cannot hold an int", T::ENCODING_NAME))?;
		self.push(value)
	}

	fn write_long(&mut self, value: i64) -> Result<()> {
		let value = T::from_i64(value).ok_or_else(|| invalid_argument!("{} cannot hold a long", T::ENCODING_NAME))?;
		self.push(value)
	}

	fn close_entry(&mut self) -> Result<()> {
		Ok(())
	}

	fn push_null(&mut self) -> Result<()> {
		self.ensure_capacity()?;
		self.values.push(T::default());
		self.value_is_null.push(true);
		self.has_null_value = true;
		self.entry_added();
		Ok(())
	}

	fn read_position_from(&mut self, input: &mut Bytes) -> Result<()> {
		if !input.has_remaining() {
			return Err(DecodeError::UnexpectedEof {
				needed: 1,
				remaining: 0,
			}
			.into());
		}
		match input.get_u8() {
			0 => self.push_null(),
			1 => {
				if input.remaining() < T::SIZE {
					return Err(DecodeError::UnexpectedEof {
						needed: T::SIZE,
						remaining: input.remaining(),
					}
					.into());
				}
				self.push(T::take(input))
			}
			tag => Err(corrupt!("invalid null tag {}", tag)),
		}
	}

	fn build(&self) -> Result<BlockRef> {
		if !self.has_non_null_value {
			trace!(positions = self.position_count, encoding = T::ENCODING_NAME, "building all-null block");
			return Ok(Arc::new(RunLengthEncodedBlock::new(
				Arc::new(PrimitiveBlock::<T>::null_value_block()),
				self.position_count,
			)?));
		}
		Ok(Arc::new(self.snapshot()?))
	}

	fn new_block_builder_like(&self, status: Option<BlockBuilderStatus>) -> Box<dyn BlockBuilder> {
		Box::new(Self::new(status, calculate_block_reset_size(self.position_count)))
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;
	use crate::{PageBuilderStatus, ShortArrayBlockBuilder};

	#[test]
	fn test_build() {
		let mut builder = ShortArrayBlockBuilder::new(None, 4);
		builder.write_short(1).unwrap();
		builder.push_null().unwrap();
		builder.write_short(3).unwrap();

		let block = builder.build().unwrap();
		assert_eq!(block.encoding_name(), "SHORT_ARRAY");
		assert_eq!(block.position_count(), 3);
		assert_eq!(block.get_short(0).unwrap(), 1);
		assert!(block.is_null(1).unwrap());
		assert_eq!(block.get_short(2).unwrap(), 3);
	}

	#[test]
	fn test_all_null_collapses() {
		let mut builder = ShortArrayBlockBuilder::new(None, 4);
		for _ in 0..100 {
			builder.push_null().unwrap();
		}
		let block = builder.build().unwrap();
		assert_eq!(block.encoding_name(), "RLE");
		assert_eq!(block.position_count(), 100);
		assert!(block.may_have_null());
		assert!((0..100).all(|p| block.is_null(p).unwrap()));
		assert!(block.retained_size_in_bytes() < 1000);
	}

	#[test]
	fn test_no_nulls_built_without_mask() {
		let mut builder = ShortArrayBlockBuilder::new(None, 1);
		builder.write_short(7).unwrap();
		let block = builder.build().unwrap();
		assert!(!block.may_have_null());
	}

	#[test]
	fn test_initial_capacity() {
		let mut builder = ShortArrayBlockBuilder::new(None, 0);
		assert_eq!(builder.capacity(), 0);
		builder.write_short(1).unwrap();
		assert!(builder.capacity() >= 1);

		let mut builder = ShortArrayBlockBuilder::new(None, 500);
		builder.write_short(1).unwrap();
		assert!(builder.capacity() >= 500);
	}

	#[test]
	fn test_growth() {
		let mut builder = ShortArrayBlockBuilder::new(None, 1);
		for i in 0..1000 {
			builder.write_short(i).unwrap();
		}
		assert_eq!(builder.position_count(), 1000);
		assert!(builder.capacity() >= 1000);
		let block = builder.build().unwrap();
		for i in 0..1000 {
			assert_eq!(block.get_short(i as usize).unwrap(), i);
		}
	}

	#[test]
	fn test_read_before_build() {
		let mut builder = ShortArrayBlockBuilder::new(None, 4);
		builder.write_short(5).unwrap();
		builder.push_null().unwrap();
		assert_eq!(builder.get_short(0).unwrap(), 5);
		assert!(builder.is_null(1).unwrap());
		assert!(builder.is_null(2).is_err());
		assert_eq!(builder.size_in_bytes(), 6);

		let region = builder.get_region(0, 1).unwrap();
		assert_eq!(region.get_short(0).unwrap(), 5);
	}

	#[test]
	fn test_builder_keeps_writing_after_build() {
		let mut builder = ShortArrayBlockBuilder::new(None, 4);
		builder.write_short(1).unwrap();
		let first = builder.build().unwrap();
		builder.write_short(2).unwrap();
		let second = builder.build().unwrap();
		assert_eq!(first.position_count(), 1);
		assert_eq!(second.position_count(), 2);
		assert_eq!(second.get_short(1).unwrap(), 2);
	}

	#[test]
	fn test_wrong_width_rejected() {
		let mut builder = ShortArrayBlockBuilder::new(None, 4);
		assert!(builder.write_int(1).is_err());
		assert!(builder.write_bytes(b"x").is_err());
		assert_eq!(builder.position_count(), 0);
	}

	#[test]
	fn test_status_accounting() {
		let page = PageBuilderStatus::new(30, 30);
		let mut builder = ShortArrayBlockBuilder::new(Some(page.create_block_builder_status()), 4);
		for i in 0..9 {
			builder.write_short(i).unwrap();
		}
		assert_eq!(page.size_in_bytes(), 27);
		assert!(!page.is_full());
		builder.push_null().unwrap();
		assert!(page.is_full());
	}

	#[test]
	fn test_read_position_from() {
		let mut builder = ShortArrayBlockBuilder::new(None, 4);
		let mut input = Bytes::from_static(&[1, 0x2A, 0x00, 0, 2]);
		builder.read_position_from(&mut input).unwrap();
		builder.read_position_from(&mut input).unwrap();
		assert!(builder.read_position_from(&mut input).is_err());
		assert_eq!(builder.get_short(0).unwrap(), 42);
		assert!(builder.is_null(1).unwrap());

		let mut truncated = Bytes::from_static(&[1, 0x2A]);
		assert!(builder.read_position_from(&mut truncated).unwrap_err().is_decode());
	}

	#[test]
	fn test_new_block_builder_like() {
		let mut builder = ShortArrayBlockBuilder::new(None, 4);
		builder.write_short(1).unwrap();
		let fresh = builder.new_block_builder_like(None);
		assert_eq!(fresh.position_count(), 0);
		assert_eq!(fresh.encoding_name(), "SHORT_ARRAY");
	}
}
