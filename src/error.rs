//! # Error Types for the Red-Black Tree
//!
//! This module defines the error types used by the tree engine for
//! reporting allocation problems.
//!
//! ## Error Handling Strategy
//!
//! The tree has exactly one fatal failure mode: it could not obtain a node
//! slot for an insertion. That splits into two observable conditions:
//!
//! - The arena could not grow ([`Error::Alloc`]). The underlying
//!   `Vec::try_reserve` failed, so the allocator is out of memory.
//! - The insertion would exceed the tree's capacity bound
//!   ([`Error::CapacityExceeded`]). The bound is derived from the maximum
//!   addressable arena size for the node layout, mirroring what an
//!   allocator-backed implementation would report as `max_size`.
//!
//! In both cases the failed insertion leaves the tree exactly as it was:
//! slots are acquired before any link is touched, so no partially-linked
//! node can ever be observed.
//!
//! Everything else the tree can tell a caller is *not* an error. Looking up
//! an absent key yields the end sentinel (facades translate that to
//! `None`), and removing an absent key reports `None`/`false`.

use std::collections::TryReserveError;

use thiserror::Error;

/// Errors that can occur while inserting into the tree.
#[derive(Error, Debug)]
pub enum Error {
	/// The node arena could not grow.
	///
	/// Raised when the backing storage fails to reserve space for one more
	/// node. The tree is left in its previous valid state; retrying after
	/// freeing memory is safe.
	#[error("node allocation failed: {0}")]
	Alloc(#[from] TryReserveError),

	/// The insertion would exceed the tree's capacity bound.
	///
	/// The bound (`limit`) is the largest number of elements the arena can
	/// address for this node layout. Unlike [`Error::Alloc`] this condition
	/// cannot be cured by freeing memory elsewhere; the container is simply
	/// full.
	#[error("tree capacity exceeded (limit of {limit} nodes)")]
	CapacityExceeded {
		/// The maximum number of elements this tree can hold.
		limit: usize,
	},
}

/// A Result type alias using the crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
