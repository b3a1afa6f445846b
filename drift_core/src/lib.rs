//! Core algorithms and data structures of drift.
//!
//! Everything in this crate is deterministic: given the same seed and the
//! same [`config::GenConfig`], program generation and reduction replay the
//! exact same sequence of decisions.

use ahash::{AHashMap, AHashSet};

#[macro_use]
pub mod verbose;
pub mod checksum;
pub mod config;
pub mod gen;
pub mod literal;
pub mod print;
pub mod prog;
pub mod reduce;
pub mod rng;
pub mod statics;
pub mod ty;
pub mod universe;

pub type HashMap<K, V> = AHashMap<K, V>;
pub type HashSet<V> = AHashSet<V>;
pub type RngType = rand::rngs::SmallRng;

/// Version stamp recorded in generated source headers.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
