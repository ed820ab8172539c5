// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

use std::{
	fmt::{self, Debug},
	mem::size_of,
	sync::Arc,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Copy-on-write bit vector.
///
/// Clones share the underlying bytes; the first mutation of a shared
/// instance copies them.
#[derive(Clone, Default)]
pub struct BitVec {
	inner: Arc<BitVecInner>,
}

#[derive(Clone, Default)]
pub struct BitVecInner {
	bits: Vec<u8>,
	len: usize,
}

impl BitVec {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			inner: Arc::new(BitVecInner {
				bits: Vec::with_capacity(capacity.div_ceil(8)),
				len: 0,
			}),
		}
	}

	pub fn repeat(len: usize, bit: bool) -> Self {
		let fill = if bit {
			0xFF
		} else {
			0x00
		};
		let mut bits = vec![fill; len.div_ceil(8)];
		if bit && len % 8 != 0 {
			if let Some(last) = bits.last_mut() {
				*last = (1u8 << (len % 8)) - 1;
			}
		}
		Self {
			inner: Arc::new(BitVecInner {
				bits,
				len,
			}),
		}
	}

	pub fn from_slice(slice: &[bool]) -> Self {
		Self::from_fn(slice.len(), |i| slice[i])
	}

	pub fn from_fn(len: usize, mut f: impl FnMut(usize) -> bool) -> Self {
		let mut bits = vec![0u8; len.div_ceil(8)];
		for i in 0..len {
			if f(i) {
				bits[i / 8] |= 1 << (i % 8);
			}
		}
		Self {
			inner: Arc::new(BitVecInner {
				bits,
				len,
			}),
		}
	}

	/// Reconstruct from raw bytes previously obtained via `try_into_raw`.
	pub fn from_raw(mut bits: Vec<u8>, len: usize) -> Self {
		bits.resize(len.div_ceil(8), 0);
		if len % 8 != 0 {
			if let Some(last) = bits.last_mut() {
				*last &= (1u8 << (len % 8)) - 1;
			}
		}
		Self {
			inner: Arc::new(BitVecInner {
				bits,
				len,
			}),
		}
	}

	/// Try to decompose into raw bytes. Returns `Err(self)` if shared.
	pub fn try_into_raw(self) -> Result<(Vec<u8>, usize), Self> {
		match Arc::try_unwrap(self.inner) {
			Ok(inner) => Ok((inner.bits, inner.len)),
			Err(inner) => Err(Self {
				inner,
			}),
		}
	}

	pub fn len(&self) -> usize {
		self.inner.len
	}

	pub fn is_empty(&self) -> bool {
		self.inner.len == 0
	}

	pub fn capacity(&self) -> usize {
		self.inner.bits.capacity() * 8
	}

	pub fn get(&self, idx: usize) -> bool {
		assert!(idx < self.inner.len, "bit index {} out of range for length {}", idx, self.inner.len);
		self.inner.bits[idx / 8] & (1 << (idx % 8)) != 0
	}

	pub fn set(&mut self, idx: usize, value: bool) {
		assert!(idx < self.inner.len, "bit index {} out of range for length {}", idx, self.inner.len);
		let inner = Arc::make_mut(&mut self.inner);
		if value {
			inner.bits[idx / 8] |= 1 << (idx % 8);
		} else {
			inner.bits[idx / 8] &= !(1 << (idx % 8));
		}
	}

	pub fn push(&mut self, bit: bool) {
		let inner = Arc::make_mut(&mut self.inner);
		let idx = inner.len;
		if idx % 8 == 0 {
			inner.bits.push(0);
		}
		if bit {
			inner.bits[idx / 8] |= 1 << (idx % 8);
		}
		inner.len += 1;
	}

	pub fn reserve(&mut self, additional: usize) {
		let inner = Arc::make_mut(&mut self.inner);
		let needed = (inner.len + additional).div_ceil(8);
		inner.bits.reserve(needed.saturating_sub(inner.bits.len()));
	}

	pub fn extend_from(&mut self, other: &BitVec) {
		for bit in other.iter() {
			self.push(bit);
		}
	}

	/// Copies `len` bits starting at `offset` into a new, unshared bit vector.
	pub fn slice(&self, offset: usize, len: usize) -> BitVec {
		assert!(offset + len <= self.inner.len);
		BitVec::from_fn(len, |i| self.get(offset + i))
	}

	pub fn count_ones(&self) -> usize {
		self.inner.bits.iter().map(|b| b.count_ones() as usize).sum()
	}

	pub fn count_zeros(&self) -> usize {
		self.len() - self.count_ones()
	}

	/// Whether any bit in `offset..offset + len` is set.
	pub fn any_in(&self, offset: usize, len: usize) -> bool {
		(offset..offset + len).any(|i| self.get(i))
	}

	pub fn iter(&self) -> BitVecIter<'_> {
		BitVecIter {
			bitvec: self,
			pos: 0,
		}
	}

	pub fn ptr_eq(&self, other: &BitVec) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	/// Heap bytes held by the backing buffer, shared or not.
	pub fn retained_size_in_bytes(&self) -> u64 {
		(self.inner.bits.capacity() * size_of::<u8>()) as u64
	}
}

pub struct BitVecIter<'a> {
	bitvec: &'a BitVec,
	pos: usize,
}

impl Iterator for BitVecIter<'_> {
	type Item = bool;

	fn next(&mut self) -> Option<Self::Item> {
		if self.pos >= self.bitvec.len() {
			return None;
		}
		let bit = self.bitvec.get(self.pos);
		self.pos += 1;
		Some(bit)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		let remaining = self.bitvec.len() - self.pos;
		(remaining, Some(remaining))
	}
}

impl ExactSizeIterator for BitVecIter<'_> {}

impl PartialEq for BitVec {
	fn eq(&self, other: &Self) -> bool {
		self.len() == other.len() && (self.ptr_eq(other) || self.iter().eq(other.iter()))
	}
}

impl Eq for BitVec {}

impl Debug for BitVec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "BitVec[")?;
		for bit in self.iter() {
			write!(
				f,
				"{}",
				if bit {
					'1'
				} else {
					'0'
				}
			)?;
		}
		write!(f, "]")
	}
}

impl From<&[bool]> for BitVec {
	fn from(slice: &[bool]) -> Self {
		BitVec::from_slice(slice)
	}
}

impl From<Vec<bool>> for BitVec {
	fn from(v: Vec<bool>) -> Self {
		BitVec::from_slice(&v)
	}
}

impl FromIterator<bool> for BitVec {
	fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
		let mut result = BitVec::new();
		for bit in iter {
			result.push(bit);
		}
		result
	}
}

impl Serialize for BitVec {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		#[derive(Serialize)]
		struct Helper<'a> {
			bits: &'a [u8],
			len: usize,
		}
		Helper {
			bits: &self.inner.bits,
			len: self.inner.len,
		}
		.serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for BitVec {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		#[derive(Deserialize)]
		struct Helper {
			bits: Vec<u8>,
			len: usize,
		}
		let h = Helper::deserialize(deserializer)?;
		Ok(BitVec::from_raw(h.bits, h.len))
	}
}
