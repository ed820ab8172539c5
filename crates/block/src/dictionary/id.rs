// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	fmt::{self, Display, Formatter},
	sync::atomic::{AtomicU64, Ordering},
};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static NODE_SOURCE: Lazy<Uuid> = Lazy::new(Uuid::new_v4);
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Identity of a dictionary.
///
/// Two dictionary blocks carrying the same id reference the same dictionary
/// content, so consumers may skip re-processing it. Ids are assigned at each
/// dictionary-producing operation and travel with the wire encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DictionaryId {
	source: Uuid,
	sequence: u64,
}

impl DictionaryId {
	pub fn new(source: Uuid, sequence: u64) -> Self {
		Self {
			source,
			sequence,
		}
	}

	/// Fresh id, unique within this process and across processes.
	pub fn random() -> Self {
		Self {
			source: *NODE_SOURCE,
			sequence: SEQUENCE.fetch_add(1, Ordering::Relaxed),
		}
	}

	pub fn source(&self) -> Uuid {
		self.source
	}

	pub fn sequence(&self) -> u64 {
		self.sequence
	}
}

impl Display for DictionaryId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.source, self.sequence)
	}
}
