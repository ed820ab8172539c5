// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

/// Builds an [`Error::InvalidArgument`](crate::Error::InvalidArgument) from a format string.
#[macro_export]
macro_rules! invalid_argument {
	($($arg:tt)*) => {
		$crate::Error::InvalidArgument(format!($($arg)*))
	};
}

/// Builds an [`Error::Unsupported`](crate::Error::Unsupported) from a format string.
#[macro_export]
macro_rules! unsupported {
	($($arg:tt)*) => {
		$crate::Error::Unsupported(format!($($arg)*))
	};
}

/// Builds a corrupt-input [`Error::Decode`](crate::Error::Decode) from a format string.
#[macro_export]
macro_rules! corrupt {
	($($arg:tt)*) => {
		$crate::Error::Decode($crate::DecodeError::Corrupt(format!($($arg)*)))
	};
}

/// Returns early with the given error.
#[macro_export]
macro_rules! return_error {
	($err:expr) => {
		return Err($err)
	};
}
