// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

mod macros;

use thiserror::Error;

/// Failures raised by block construction, access and decoding.
///
/// All failures are local and synchronous: they surface at the call that
/// detected them and are never retried or swallowed by this layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	/// A construction-time invariant was violated.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// A position outside `0..position_count` was read.
	#[error("Invalid position {position} in block with {position_count} positions")]
	PositionOutOfBounds {
		position: usize,
		position_count: usize,
	},

	/// An `(offset, length)` pair does not fit inside the addressed range.
	#[error("Invalid offset {offset} and length {length} in block with {position_count} positions")]
	RegionOutOfBounds {
		offset: usize,
		length: usize,
		position_count: usize,
	},

	/// The operation is structurally meaningless for this block variant.
	#[error("unsupported operation: {0}")]
	Unsupported(String),

	#[error(transparent)]
	Decode(#[from] DecodeError),
}

/// Malformed or truncated bytes handed to a block decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
	#[error("unexpected end of input: needed {needed} bytes but only {remaining} remain")]
	UnexpectedEof {
		needed: usize,
		remaining: usize,
	},

	#[error("unknown block encoding: {0}")]
	UnknownEncoding(String),

	#[error("block encoding name is not valid utf-8")]
	InvalidName,

	#[error("negative {what}: {value}")]
	NegativeLength {
		what: &'static str,
		value: i32,
	},

	#[error("corrupt block: {0}")]
	Corrupt(String),
}

impl Error {
	pub fn is_decode(&self) -> bool {
		matches!(self, Error::Decode(_))
	}
}
