// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#![cfg_attr(not(debug_assertions), deny(warnings))]

mod block;
mod builder;
pub mod config;
pub mod dictionary;
pub mod encoding;
pub mod lazy;
pub mod map;
pub mod page;
pub mod primitive;
pub mod rle;
pub mod row;
pub mod size;
pub mod status;
pub mod types;
pub mod util;
pub mod variable_width;

pub use block::{Block, BlockRef};
pub use builder::BlockBuilder;
pub use config::{BlockConfig, DictionaryEncodingPolicy};
pub use dictionary::{DictionaryBlock, DictionaryId};
pub use encoding::{BlockEncoding, BlockEncodingSerde};
pub use lazy::LazyBlock;
pub use map::{HASH_MULTIPLIER, HashTables, MapBlock, MapBlockBuilder, SingleMapBlock};
pub use page::PageBuilder;
pub use primitive::{
	ByteArrayBlock, ByteArrayBlockBuilder, IntArrayBlock, IntArrayBlockBuilder, LongArrayBlock, LongArrayBlockBuilder,
	Primitive, PrimitiveBlock, PrimitiveBlockBuilder, ShortArrayBlock, ShortArrayBlockBuilder,
};
pub use rle::RunLengthEncodedBlock;
pub use row::{RowBlock, RowBlockBuilder, SingleRowBlock};
pub use status::{BlockBuilderStatus, PageBuilderStatus};
pub use tessera_type::{DecodeError, Error, Result, Type, Value};
pub use variable_width::{VariableWidthBlock, VariableWidthBlockBuilder};
