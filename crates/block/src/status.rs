// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::sync::{
	Arc,
	atomic::{AtomicBool, AtomicU64, Ordering},
};

use crate::config::{BlockConfig, DEFAULT_MAX_BLOCK_SIZE_IN_BYTES, DEFAULT_MAX_PAGE_SIZE_IN_BYTES};

/// Byte accounting shared by all builders of one page.
#[derive(Clone, Debug)]
pub struct PageBuilderStatus {
	inner: Arc<PageBuilderState>,
}

#[derive(Debug)]
struct PageBuilderState {
	max_page_size_in_bytes: u64,
	max_block_size_in_bytes: u64,
	current_size: AtomicU64,
	full: AtomicBool,
}

impl Default for PageBuilderStatus {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_PAGE_SIZE_IN_BYTES, DEFAULT_MAX_BLOCK_SIZE_IN_BYTES)
	}
}

impl PageBuilderStatus {
	pub fn new(max_page_size_in_bytes: u64, max_block_size_in_bytes: u64) -> Self {
		Self {
			inner: Arc::new(PageBuilderState {
				max_page_size_in_bytes,
				max_block_size_in_bytes,
				current_size: AtomicU64::new(0),
				full: AtomicBool::new(false),
			}),
		}
	}

	pub fn from_config(config: &BlockConfig) -> Self {
		Self::new(config.max_page_size_in_bytes, config.max_block_size_in_bytes)
	}

	pub fn create_block_builder_status(&self) -> BlockBuilderStatus {
		BlockBuilderStatus {
			page: self.clone(),
		}
	}

	pub fn max_page_size_in_bytes(&self) -> u64 {
		self.inner.max_page_size_in_bytes
	}

	pub fn is_empty(&self) -> bool {
		self.size_in_bytes() == 0
	}

	pub fn is_full(&self) -> bool {
		self.inner.full.load(Ordering::Acquire) || self.size_in_bytes() >= self.inner.max_page_size_in_bytes
	}

	pub fn size_in_bytes(&self) -> u64 {
		self.inner.current_size.load(Ordering::Acquire)
	}

	fn add_bytes(&self, bytes: u64) {
		let size = self.inner.current_size.fetch_add(bytes, Ordering::AcqRel) + bytes;
		if size >= self.inner.max_page_size_in_bytes {
			self.inner.full.store(true, Ordering::Release);
		}
	}
}

/// Handle through which one block builder reports the bytes it writes.
#[derive(Clone, Debug)]
pub struct BlockBuilderStatus {
	page: PageBuilderStatus,
}

impl BlockBuilderStatus {
	pub fn max_page_size_in_bytes(&self) -> u64 {
		self.page.inner.max_page_size_in_bytes
	}

	pub fn max_block_size_in_bytes(&self) -> u64 {
		self.page.inner.max_block_size_in_bytes
	}

	pub fn add_bytes(&self, bytes: u64) {
		self.page.add_bytes(bytes);
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;

	#[test]
	fn test_add_bytes_marks_full() {
		let page = PageBuilderStatus::new(10, 5);
		let status = page.create_block_builder_status();
		assert!(page.is_empty());

		status.add_bytes(4);
		assert_eq!(page.size_in_bytes(), 4);
		assert!(!page.is_full());

		status.add_bytes(6);
		assert!(page.is_full());
	}

	#[test]
	fn test_block_statuses_share_page() {
		let page = PageBuilderStatus::new(100, 50);
		let a = page.create_block_builder_status();
		let b = page.create_block_builder_status();
		a.add_bytes(30);
		b.add_bytes(30);
		assert_eq!(page.size_in_bytes(), 60);
		assert_eq!(a.max_block_size_in_bytes(), 50);
	}
}
