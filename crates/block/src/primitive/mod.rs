// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

mod builder;

use std::{any::Any, fmt::Debug, mem::size_of, sync::Arc};

pub use builder::PrimitiveBlockBuilder;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tessera_type::{
	Result, invalid_argument, unsupported,
	util::{BitVec, CowVec},
};

use crate::{
	Block, BlockBuilder, BlockRef,
	size::{SIZE_OF_BYTE, instance_size},
	util::{
		append_null_to_nulls, check_array_range, check_valid_position, check_valid_region, check_valid_selection,
		compact_nulls, is_null_at,
	},
};

/// Fixed-width value stored by [`PrimitiveBlock`].
pub trait Primitive: Copy + Default + PartialEq + Debug + Send + Sync + 'static {
	/// Width of one value in bytes.
	const SIZE: usize;
	const ENCODING_NAME: &'static str;

	/// Appends the little-endian bytes of `self`.
	fn put(self, output: &mut BytesMut);

	/// Reads one value; the caller guarantees `SIZE` bytes remain.
	fn take(input: &mut Bytes) -> Self;

	fn write_to(self, builder: &mut dyn BlockBuilder) -> Result<()>;

	fn as_i8(self) -> Option<i8> {
		None
	}

	fn as_i16(self) -> Option<i16> {
		None
	}

	fn as_i32(self) -> Option<i32> {
		None
	}

	fn as_i64(self) -> Option<i64> {
		None
	}

	fn from_i8(_value: i8) -> Option<Self> {
		None
	}

	fn from_i16(_value: i16) -> Option<Self> {
		None
	}

	fn from_i32(_value: i32) -> Option<Self> {
		None
	}

	fn from_i64(_value: i64) -> Option<Self> {
		None
	}
}

macro_rules! impl_primitive {
	($t:ty, $name:literal, $put:ident, $get:ident, $write:ident, $as:ident, $from:ident) => {
		impl Primitive for $t {
			const SIZE: usize = size_of::<$t>();
			const ENCODING_NAME: &'static str = $name;

			fn put(self, output: &mut BytesMut) {
				output.$put(self);
			}

			fn take(input: &mut Bytes) -> Self {
				input.$get()
			}

			fn write_to(self, builder: &mut dyn BlockBuilder) -> Result<()> {
				builder.$write(self)
			}

			fn $as(self) -> Option<$t> {
				Some(self)
			}

			fn $from(value: $t) -> Option<Self> {
				Some(value)
			}
		}
	};
}

impl_primitive!(i8, "BYTE_ARRAY", put_i8, get_i8, write_byte, as_i8, from_i8);
impl_primitive!(i16, "SHORT_ARRAY", put_i16_le, get_i16_le, write_short, as_i16, from_i16);
impl_primitive!(i32, "INT_ARRAY", put_i32_le, get_i32_le, write_int, as_i32, from_i32);
impl_primitive!(i64, "LONG_ARRAY", put_i64_le, get_i64_le, write_long, as_i64, from_i64);

pub type ByteArrayBlock = PrimitiveBlock<i8>;
pub type ShortArrayBlock = PrimitiveBlock<i16>;
pub type IntArrayBlock = PrimitiveBlock<i32>;
pub type LongArrayBlock = PrimitiveBlock<i64>;

pub type ByteArrayBlockBuilder = PrimitiveBlockBuilder<i8>;
pub type ShortArrayBlockBuilder = PrimitiveBlockBuilder<i16>;
pub type IntArrayBlockBuilder = PrimitiveBlockBuilder<i32>;
pub type LongArrayBlockBuilder = PrimitiveBlockBuilder<i64>;

/// Fixed-width values plus an optional null mask.
///
/// Region views share `values` and `value_is_null` with their parent and read
/// them starting at `array_offset`.
#[derive(Clone, Debug)]
pub struct PrimitiveBlock<T: Primitive> {
	array_offset: usize,
	position_count: usize,
	value_is_null: Option<BitVec>,
	values: CowVec<T>,
	retained_size_in_bytes: u64,
}

impl<T: Primitive> PrimitiveBlock<T> {
	/// One value plus one null flag.
	pub const SIZE_IN_BYTES_PER_POSITION: u64 = T::SIZE as u64 + SIZE_OF_BYTE;

	pub fn new(position_count: usize, value_is_null: Option<BitVec>, values: Vec<T>) -> Result<Self> {
		Self::from_parts(0, position_count, value_is_null, CowVec::new(values))
	}

	pub fn from_values(values: Vec<T>) -> Self {
		let position_count = values.len();
		Self::build_unchecked(0, position_count, None, CowVec::new(values))
	}

	pub fn from_options(values: &[Option<T>]) -> Self {
		let nulls = BitVec::from_fn(values.len(), |i| values[i].is_none());
		let values: Vec<T> = values.iter().map(|v| v.unwrap_or_default()).collect();
		let nulls = (nulls.count_ones() > 0).then_some(nulls);
		Self::build_unchecked(0, values.len(), nulls, CowVec::new(values))
	}

	pub(crate) fn from_parts(
		array_offset: usize,
		position_count: usize,
		value_is_null: Option<BitVec>,
		values: CowVec<T>,
	) -> Result<Self> {
		if values.len().saturating_sub(array_offset) < position_count {
			return Err(invalid_argument!("values length is less than positionCount"));
		}
		if let Some(nulls) = &value_is_null {
			if nulls.len().saturating_sub(array_offset) < position_count {
				return Err(invalid_argument!("isNull length is less than positionCount"));
			}
		}
		Ok(Self::build_unchecked(array_offset, position_count, value_is_null, values))
	}

	fn build_unchecked(
		array_offset: usize,
		position_count: usize,
		value_is_null: Option<BitVec>,
		values: CowVec<T>,
	) -> Self {
		let retained_size_in_bytes = instance_size::<Self>()
			+ values.retained_size_in_bytes()
			+ value_is_null.as_ref().map_or(0, |n| n.retained_size_in_bytes());
		Self {
			array_offset,
			position_count,
			value_is_null,
			values,
			retained_size_in_bytes,
		}
	}

	/// Block with a single null position.
	pub(crate) fn null_value_block() -> Self {
		Self::build_unchecked(0, 1, Some(BitVec::repeat(1, true)), CowVec::new(vec![T::default()]))
	}

	/// Stored value at `position`; undefined content for null positions.
	pub fn value(&self, position: usize) -> Result<T> {
		check_valid_position(position, self.position_count)?;
		Ok(self.values[self.array_offset + position])
	}

	pub fn get(&self, position: usize) -> Result<Option<T>> {
		check_valid_position(position, self.position_count)?;
		if self.is_null_unchecked(position) {
			return Ok(None);
		}
		Ok(Some(self.values[self.array_offset + position]))
	}

	/// Values of the live window, nulls included.
	pub fn values(&self) -> &[T] {
		&self.values[self.array_offset..self.array_offset + self.position_count]
	}

	fn is_null_unchecked(&self, position: usize) -> bool {
		is_null_at(self.value_is_null.as_ref(), self.array_offset + position)
	}

	fn spans_backing_arrays(&self) -> bool {
		self.array_offset == 0
			&& self.values.len() == self.position_count
			&& self.value_is_null.as_ref().is_none_or(|n| n.len() == self.position_count)
	}
}

impl<T: Primitive> Block for PrimitiveBlock<T> {
	fn encoding_name(&self) -> &'static str {
		T::ENCODING_NAME
	}

	fn position_count(&self) -> usize {
		self.position_count
	}

	fn offset_base(&self) -> usize {
		self.array_offset
	}

	fn is_null(&self, position: usize) -> Result<bool> {
		check_valid_position(position, self.position_count)?;
		Ok(self.is_null_unchecked(position))
	}

	fn may_have_null(&self) -> bool {
		self.value_is_null.is_some()
	}

	fn get_byte(&self, position: usize) -> Result<i8> {
		self.value(position)?.as_i8().ok_or_else(|| unsupported!("{} does not support get_byte", T::ENCODING_NAME))
	}

	fn get_short(&self, position: usize) -> Result<i16> {
		self.value(position)?.as_i16().ok_or_else(|| unsupported!("{} does not support get_short", T::ENCODING_NAME))
	}

	fn get_int(&self, position: usize) -> Result<i32> {
		self.value(position)?.as_i32().ok_or_else(|| unsupported!("{} does not support get_int", T::ENCODING_NAME))
	}

	fn get_long(&self, position: usize) -> Result<i64> {
		self.value(position)?.as_i64().ok_or_else(|| unsupported!("{} does not support get_long", T::ENCODING_NAME))
	}

	fn get_single_value_block(&self, position: usize) -> Result<BlockRef> {
		check_valid_position(position, self.position_count)?;
		let nulls = self.is_null_unchecked(position).then(|| BitVec::repeat(1, true));
		let value = self.values[self.array_offset + position];
		Ok(Arc::new(Self::build_unchecked(0, 1, nulls, CowVec::new(vec![value]))))
	}

	fn get_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		check_valid_region(self.position_count, offset, length)?;
		if offset == 0 && length == self.position_count {
			return Ok(Arc::new(self.clone()));
		}
		Ok(Arc::new(Self::build_unchecked(
			self.array_offset + offset,
			length,
			self.value_is_null.clone(),
			self.values.clone(),
		)))
	}

	fn copy_region(&self, offset: usize, length: usize) -> Result<BlockRef> {
		check_valid_region(self.position_count, offset, length)?;
		if offset == 0 && length == self.position_count && self.spans_backing_arrays() {
			return Ok(Arc::new(self.clone()));
		}
		let start = self.array_offset + offset;
		let values = CowVec::new(self.values[start..start + length].to_vec());
		let nulls = compact_nulls(self.value_is_null.as_ref(), start, length);
		Ok(Arc::new(Self::build_unchecked(0, length, nulls, values)))
	}

	fn copy_positions(&self, positions: &[usize], offset: usize, length: usize) -> Result<BlockRef> {
		check_array_range(positions.len(), offset, length)?;
		let positions = &positions[offset..offset + length];
		let mut values = Vec::with_capacity(length);
		for &position in positions {
			check_valid_position(position, self.position_count)?;
			values.push(self.values[self.array_offset + position]);
		}
		let nulls = self
			.value_is_null
			.as_ref()
			.map(|_| BitVec::from_fn(length, |i| self.is_null_unchecked(positions[i])));
		Ok(Arc::new(Self::build_unchecked(0, length, nulls, CowVec::new(values))))
	}

	fn size_in_bytes(&self) -> u64 {
		Self::SIZE_IN_BYTES_PER_POSITION * self.position_count as u64
	}

	fn region_size_in_bytes(&self, offset: usize, length: usize) -> Result<u64> {
		check_valid_region(self.position_count, offset, length)?;
		Ok(Self::SIZE_IN_BYTES_PER_POSITION * length as u64)
	}

	fn positions_size_in_bytes(&self, selected: &[bool], selected_count: usize) -> Result<u64> {
		check_valid_selection(selected, selected_count, self.position_count)?;
		Ok(Self::SIZE_IN_BYTES_PER_POSITION * selected_count as u64)
	}

	fn fixed_size_in_bytes_per_position(&self) -> Option<u64> {
		Some(Self::SIZE_IN_BYTES_PER_POSITION)
	}

	fn retained_size_in_bytes(&self) -> u64 {
		self.retained_size_in_bytes
	}

	fn estimated_data_size_for_stats(&self, position: usize) -> Result<u64> {
		Ok(if self.is_null(position)? {
			0
		} else {
			T::SIZE as u64
		})
	}

	fn append_null(&self) -> Result<BlockRef> {
		let start = self.array_offset;
		let mut values = Vec::with_capacity(start + self.position_count + 1);
		values.extend_from_slice(&self.values[..start + self.position_count]);
		values.push(T::default());
		let nulls = append_null_to_nulls(self.value_is_null.as_ref(), start, self.position_count);
		Ok(Arc::new(Self::build_unchecked(start, self.position_count + 1, Some(nulls), CowVec::new(values))))
	}

	fn write_position_to(&self, position: usize, builder: &mut dyn BlockBuilder) -> Result<()> {
		if self.is_null(position)? {
			return builder.push_null();
		}
		self.values[self.array_offset + position].write_to(builder)?;
		builder.close_entry()
	}

	fn write_position_to_output(&self, position: usize, output: &mut BytesMut) -> Result<()> {
		if self.is_null(position)? {
			output.put_u8(0);
			return Ok(());
		}
		output.put_u8(1);
		self.values[self.array_offset + position].put(output);
		Ok(())
	}

	fn to_block(&self) -> Result<BlockRef> {
		Ok(Arc::new(self.clone()))
	}

	fn as_any(&self) -> &dyn Any {
		self
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;

	fn sample() -> ShortArrayBlock {
		ShortArrayBlock::from_options(&[Some(10), None, Some(30), Some(40), None])
	}

	#[test]
	fn test_new_validates_lengths() {
		assert!(ShortArrayBlock::new(3, None, vec![1, 2]).is_err());
		assert!(ShortArrayBlock::new(3, Some(BitVec::repeat(2, false)), vec![1, 2, 3]).is_err());
		assert!(ShortArrayBlock::new(2, None, vec![1, 2, 3]).is_ok());
	}

	#[test]
	fn test_accessors() {
		let block = sample();
		assert_eq!(block.encoding_name(), "SHORT_ARRAY");
		assert_eq!(block.position_count(), 5);
		assert!(block.may_have_null());
		assert_eq!(block.get_short(0).unwrap(), 10);
		assert!(block.is_null(1).unwrap());
		assert_eq!(block.get(1).unwrap(), None);
		assert_eq!(block.get(3).unwrap(), Some(40));
		assert!(block.is_null(5).is_err());
		assert!(block.get_short(5).is_err());
		assert!(matches!(block.get_int(0), Err(tessera_type::Error::Unsupported(_))));
	}

	#[test]
	fn test_no_nulls() {
		let block = LongArrayBlock::from_values(vec![1, 2, 3]);
		assert!(!block.may_have_null());
		assert!(!block.is_null(2).unwrap());
		assert_eq!(block.get_long(2).unwrap(), 3);
	}

	#[test]
	fn test_get_region_shares_storage() {
		let block = sample();
		let region = block.get_region(2, 3).unwrap();
		assert_eq!(region.position_count(), 3);
		assert_eq!(region.offset_base(), 2);
		assert_eq!(region.get_short(0).unwrap(), 30);
		assert!(region.is_null(2).unwrap());

		let region = region.as_any().downcast_ref::<ShortArrayBlock>().unwrap();
		assert!(region.values.ptr_eq(&block.values));
		assert!(block.get_region(3, 3).is_err());
	}

	#[test]
	fn test_copy_region_compacts() {
		let block = sample();
		let copy = block.copy_region(1, 3).unwrap();
		let copy = copy.as_any().downcast_ref::<ShortArrayBlock>().unwrap();
		assert_eq!(copy.offset_base(), 0);
		assert_eq!(copy.values(), &[0, 30, 40]);
		assert!(copy.is_null(0).unwrap());
		assert!(!copy.values.ptr_eq(&block.values));
	}

	#[test]
	fn test_copy_region_of_whole_block_shares_storage() {
		let block = sample();
		let copy = block.copy_region(0, 5).unwrap();
		let copy = copy.as_any().downcast_ref::<ShortArrayBlock>().unwrap();
		assert!(copy.values.ptr_eq(&block.values));
	}

	#[test]
	fn test_copy_positions() {
		let block = sample();
		let copy = block.copy_positions(&[9, 3, 1, 3, 0], 1, 4).unwrap();
		assert_eq!(copy.position_count(), 4);
		assert_eq!(copy.get_short(0).unwrap(), 40);
		assert!(copy.is_null(1).unwrap());
		assert_eq!(copy.get_short(2).unwrap(), 40);
		assert_eq!(copy.get_short(3).unwrap(), 10);

		assert!(block.copy_positions(&[0, 7], 0, 2).is_err());
		assert!(block.copy_positions(&[0, 1], 1, 2).is_err());
	}

	#[test]
	fn test_sizes() {
		let block = sample();
		assert_eq!(ShortArrayBlock::SIZE_IN_BYTES_PER_POSITION, 3);
		assert_eq!(block.size_in_bytes(), 15);
		assert_eq!(block.region_size_in_bytes(0, 5).unwrap(), block.size_in_bytes());
		assert_eq!(block.region_size_in_bytes(1, 2).unwrap(), 6);
		assert_eq!(block.positions_size_in_bytes(&[true, false, true, false, false], 2).unwrap(), 6);
		assert!(block.positions_size_in_bytes(&[true], 1).is_err());
		assert_eq!(block.fixed_size_in_bytes_per_position(), Some(3));
		assert_eq!(block.logical_size_in_bytes(), 15);
		assert!(block.retained_size_in_bytes() >= block.size_in_bytes());
		assert_eq!(block.estimated_data_size_for_stats(0).unwrap(), 2);
		assert_eq!(block.estimated_data_size_for_stats(1).unwrap(), 0);
	}

	#[test]
	fn test_append_null() {
		let block = IntArrayBlock::from_values(vec![1, 2, 3]);
		let region = block.get_region(1, 2).unwrap();
		let appended = region.append_null().unwrap();
		assert_eq!(appended.position_count(), 3);
		assert_eq!(appended.get_int(0).unwrap(), 2);
		assert_eq!(appended.get_int(1).unwrap(), 3);
		assert!(appended.is_null(2).unwrap());
		assert!(!appended.is_null(0).unwrap());
		assert_eq!(block.position_count(), 3);
	}

	#[test]
	fn test_single_value_block() {
		let block = sample();
		let single = block.get_single_value_block(1).unwrap();
		assert_eq!(single.position_count(), 1);
		assert!(single.is_null(0).unwrap());

		let single = block.get_single_value_block(2).unwrap();
		assert_eq!(single.get_short(0).unwrap(), 30);
		assert!(!single.may_have_null());
	}

	#[test]
	fn test_write_position_to_output() {
		let block = sample();
		let mut output = BytesMut::new();
		block.write_position_to_output(0, &mut output).unwrap();
		block.write_position_to_output(1, &mut output).unwrap();
		assert_eq!(&output[..], &[1, 10, 0, 0]);
	}

	#[test]
	fn test_get_positions_is_lazy() {
		let block = sample();
		let view = block.get_positions(&[4, 0, 17], 0, 3).unwrap();
		assert_eq!(view.position_count(), 3);
		assert!(view.is_null(0).unwrap());
		assert_eq!(view.get_short(1).unwrap(), 10);
		assert!(view.get_short(2).is_err());
	}
}
