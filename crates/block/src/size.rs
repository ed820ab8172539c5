// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Widths used for size accounting.
//!
//! Offsets, dictionary ids and hash-table slots are accounted at their wire
//! width (four bytes) regardless of the in-memory index type.

use std::mem::size_of;

pub const SIZE_OF_BYTE: u64 = 1;
pub const SIZE_OF_SHORT: u64 = 2;
pub const SIZE_OF_INT: u64 = 4;
pub const SIZE_OF_LONG: u64 = 8;

/// Accounting cost of one offset plus one null flag.
pub const SIZE_OF_OFFSET_AND_NULL: u64 = SIZE_OF_INT + SIZE_OF_BYTE;

/// Shallow size of a value of type `T`.
pub fn instance_size<T>() -> u64 {
	size_of::<T>() as u64
}
