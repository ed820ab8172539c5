// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use serde::{Deserialize, Serialize};
use tessera_type::{Result, invalid_argument};

pub const DEFAULT_MAX_PAGE_SIZE_IN_BYTES: u64 = 1024 * 1024;
pub const DEFAULT_MAX_BLOCK_SIZE_IN_BYTES: u64 = 64 * 1024;
pub const DEFAULT_EXPECTED_ENTRIES: usize = 1024;

/// How dictionary blocks are written to the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DictionaryEncodingPolicy {
	/// Write the dictionary as it is, unreferenced entries included.
	Preserve,
	/// Compact the dictionary before writing it.
	#[default]
	Compact,
	/// Write the flattened values instead of a dictionary.
	Flatten,
}

/// Configuration for builders and block encoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
	/// Page size at which a page builder reports itself full.
	pub max_page_size_in_bytes: u64,
	/// Upper bound used when presizing a single block builder.
	pub max_block_size_in_bytes: u64,
	/// Default number of entries builders are presized for.
	pub expected_entries: usize,
	pub dictionary_encoding: DictionaryEncodingPolicy,
}

impl Default for BlockConfig {
	fn default() -> Self {
		Self {
			max_page_size_in_bytes: DEFAULT_MAX_PAGE_SIZE_IN_BYTES,
			max_block_size_in_bytes: DEFAULT_MAX_BLOCK_SIZE_IN_BYTES,
			expected_entries: DEFAULT_EXPECTED_ENTRIES,
			dictionary_encoding: DictionaryEncodingPolicy::default(),
		}
	}
}

impl BlockConfig {
	pub fn from_json(json: &str) -> Result<Self> {
		let config: BlockConfig =
			serde_json::from_str(json).map_err(|e| invalid_argument!("invalid block configuration: {}", e))?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.max_page_size_in_bytes == 0 {
			return Err(invalid_argument!("max_page_size_in_bytes must be positive"));
		}
		if self.max_block_size_in_bytes == 0 {
			return Err(invalid_argument!("max_block_size_in_bytes must be positive"));
		}
		if self.max_block_size_in_bytes > self.max_page_size_in_bytes {
			return Err(invalid_argument!(
				"max_block_size_in_bytes ({}) exceeds max_page_size_in_bytes ({})",
				self.max_block_size_in_bytes,
				self.max_page_size_in_bytes
			));
		}
		Ok(())
	}

	pub fn with_dictionary_encoding(mut self, policy: DictionaryEncodingPolicy) -> Self {
		self.dictionary_encoding = policy;
		self
	}
}

#[cfg(test)]
pub mod tests {
	use super::*;

	#[test]
	fn test_default() {
		let config = BlockConfig::default();
		assert_eq!(config.max_page_size_in_bytes, 1024 * 1024);
		assert_eq!(config.max_block_size_in_bytes, 64 * 1024);
		assert_eq!(config.expected_entries, 1024);
		assert_eq!(config.dictionary_encoding, DictionaryEncodingPolicy::Compact);
	}

	#[test]
	fn test_from_json_partial() {
		let config = BlockConfig::from_json(r#"{ "dictionary_encoding": "flatten", "expected_entries": 16 }"#).unwrap();
		assert_eq!(config.dictionary_encoding, DictionaryEncodingPolicy::Flatten);
		assert_eq!(config.expected_entries, 16);
		assert_eq!(config.max_page_size_in_bytes, DEFAULT_MAX_PAGE_SIZE_IN_BYTES);
	}

	#[test]
	fn test_from_json_invalid() {
		assert!(BlockConfig::from_json(r#"{ "dictionary_encoding": "zip" }"#).is_err());
		assert!(BlockConfig::from_json(r#"{ "max_page_size_in_bytes": 0 }"#).is_err());
		assert!(BlockConfig::from_json(r#"{ "max_page_size_in_bytes": 10, "max_block_size_in_bytes": 20 }"#).is_err());
	}
}
