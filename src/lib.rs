#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// A hash map from byte-string keys to fixed-width byte values.
///
/// This module provides the `ByteMap`: separate chaining over packed cells,
/// a bucket count fixed at construction, and an optional cleanup callback
/// run when a cell is permanently destroyed.
pub mod byte_map;

mod byte_map_proptest;

/// A growable sequence of fixed-width byte elements.
///
/// This module provides the `StrideVec`, a thin stride-management layer over
/// a contiguous byte buffer with the same cleanup-callback contract as the
/// map.
pub mod stride_vec;

pub use byte_map::ByteMap;
#[cfg(any(test, feature = "stats"))]
pub use byte_map::ChainStats;
pub use stride_vec::StrideVec;
