//! Chord ring.
//!
//! Nodes are placed on a circular identifier space of `2^m` positions. Each
//! node owns the half-open arc `(predecessor, node]` and stores the keys that
//! fall into it. Lookups enter at any node and hop through finger tables
//! (shortcuts at exponentially growing distances) until they reach the owner.
//!
//! Membership changes are handled by [`Node::join`] and [`Node::leave`], which
//! move keys across the shifted ownership boundary, while
//! [`Node::stabilize`] and [`Node::fix_fingers`] heal successor pointers and
//! finger tables after churn (see [`Maintainer`] for running them in the
//! background). [`Node::space_shuffle_optimization`] is an auxiliary pass that
//! evens out per-node key counts.
//!
//! ```
//! use chordring::RingBuilder;
//!
//! let ring = RingBuilder::new().with_bits(8).build().unwrap();
//! let first = ring.add_node(0).unwrap();
//! first.join(None).unwrap();
//! let second = ring.add_node(128).unwrap();
//! second.join(Some(0)).unwrap();
//!
//! assert_eq!(first.insert(100, Some(7)).unwrap(), 128);
//! assert_eq!(first.find(100).unwrap().value(), Some(7));
//! ```

mod builder;
mod error;
mod finger;
mod interval;
mod maintenance;
mod membership;
mod migration;
mod node;
mod ring;
mod routing;
mod shuffle;
mod store;


pub use {
    builder::{DEFAULT_MAINTENANCE_INTERVAL, RingBuilder, RingConfig},
    error::{RingError, RingResult},
    finger::FingerTable,
    interval::{IdSpace, MAX_BITS, in_open_range, in_range},
    maintenance::Maintainer,
    node::Node,
    ring::Ring,
    routing::Lookup,
    shuffle::{Relocation, ShuffleReport},
    store::KeyStore,
};

/// Position on the ring, shared by nodes and keys.
pub type Id = u64;

/// Value stored under a key.
pub type Value = u8;

/// Default identifier width.
pub const DEFAULT_BITS: u32 = 8;
