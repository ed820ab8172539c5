// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

use std::{
	fmt::{self, Debug},
	mem::size_of,
	ops::Deref,
	sync::Arc,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Arc-backed copy-on-write vector.
///
/// Clones are O(1) and share storage. Mutating a shared instance copies the
/// elements first, so readers holding an earlier clone never observe a write.
pub struct CowVec<T> {
	inner: Arc<Vec<T>>,
}

impl<T> CowVec<T> {
	pub fn new(vec: Vec<T>) -> Self {
		Self {
			inner: Arc::new(vec),
		}
	}

	pub fn with_capacity(capacity: usize) -> Self {
		Self::new(Vec::with_capacity(capacity))
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.inner.capacity()
	}

	pub fn as_slice(&self) -> &[T] {
		self.inner.as_slice()
	}

	pub fn get(&self, idx: usize) -> Option<&T> {
		self.inner.get(idx)
	}

	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	pub fn is_shared(&self) -> bool {
		Arc::strong_count(&self.inner) > 1
	}

	/// Heap bytes held by the backing allocation, shared or not.
	pub fn retained_size_in_bytes(&self) -> u64 {
		(self.inner.capacity() * size_of::<T>()) as u64
	}

	/// Try to take the vector out. Returns `Err(self)` if shared.
	pub fn try_into_vec(self) -> Result<Vec<T>, Self> {
		match Arc::try_unwrap(self.inner) {
			Ok(vec) => Ok(vec),
			Err(inner) => Err(Self {
				inner,
			}),
		}
	}
}

impl<T: Clone> CowVec<T> {
	pub fn make_mut(&mut self) -> &mut Vec<T> {
		Arc::make_mut(&mut self.inner)
	}

	pub fn push(&mut self, value: T) {
		self.make_mut().push(value);
	}

	pub fn extend_from_slice(&mut self, other: &[T]) {
		self.make_mut().extend_from_slice(other);
	}

	pub fn extend(&mut self, iter: impl IntoIterator<Item = T>) {
		self.make_mut().extend(iter);
	}

	pub fn reserve_exact(&mut self, additional: usize) {
		self.make_mut().reserve_exact(additional);
	}

	pub fn truncate(&mut self, len: usize) {
		self.make_mut().truncate(len);
	}

	pub fn into_vec(self) -> Vec<T> {
		match Arc::try_unwrap(self.inner) {
			Ok(vec) => vec,
			Err(shared) => shared.as_ref().clone(),
		}
	}
}

impl<T> Clone for CowVec<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> Default for CowVec<T> {
	fn default() -> Self {
		Self::new(Vec::new())
	}
}

impl<T> Deref for CowVec<T> {
	type Target = [T];

	fn deref(&self) -> &Self::Target {
		self.inner.as_slice()
	}
}

impl<T: Debug> Debug for CowVec<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.inner.iter()).finish()
	}
}

impl<T: PartialEq> PartialEq for CowVec<T> {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
	}
}

impl<T: Eq> Eq for CowVec<T> {}

impl<T> From<Vec<T>> for CowVec<T> {
	fn from(vec: Vec<T>) -> Self {
		Self::new(vec)
	}
}

impl<T: Clone> From<&[T]> for CowVec<T> {
	fn from(slice: &[T]) -> Self {
		Self::new(slice.to_vec())
	}
}

impl<T> FromIterator<T> for CowVec<T> {
	fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
		Self::new(iter.into_iter().collect())
	}
}

impl<T: Serialize> Serialize for CowVec<T> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.inner.as_slice().serialize(serializer)
	}
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for CowVec<T> {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		Ok(CowVec::new(Vec::<T>::deserialize(deserializer)?))
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;

	#[test]
	fn test_clone_shares_storage() {
		let a = CowVec::new(vec![1, 2, 3]);
		let b = a.clone();
		assert!(a.ptr_eq(&b));
		assert!(a.is_shared());
	}

	#[test]
	fn test_push_copies_when_shared() {
		let a = CowVec::new(vec![1, 2, 3]);
		let mut b = a.clone();
		b.push(4);
		assert!(!a.ptr_eq(&b));
		assert_eq!(a.as_slice(), &[1, 2, 3]);
		assert_eq!(b.as_slice(), &[1, 2, 3, 4]);
	}

	#[test]
	fn test_push_in_place_when_unique() {
		let mut a = CowVec::with_capacity(8);
		a.push(1);
		a.push(2);
		assert!(!a.is_shared());
		assert_eq!(a.len(), 2);
		assert!(a.capacity() >= 8);
	}

	#[test]
	fn test_try_into_vec() {
		let a = CowVec::new(vec![1u8, 2]);
		let b = a.clone();
		let a = a.try_into_vec().unwrap_err();
		drop(b);
		assert_eq!(a.try_into_vec().unwrap(), vec![1, 2]);
	}

	#[test]
	fn test_retained_size() {
		let a: CowVec<i32> = CowVec::with_capacity(10);
		assert_eq!(a.retained_size_in_bytes(), 40);
	}

	#[test]
	fn test_equality_is_by_content() {
		let a = CowVec::new(vec![1, 2]);
		let b = CowVec::new(vec![1, 2]);
		assert!(!a.ptr_eq(&b));
		assert_eq!(a, b);
	}
}
