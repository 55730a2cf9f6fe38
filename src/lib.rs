//! bloomap implements a family-indexed probabilistic associative set: a
//! group of compartmented bloom filters ([`Map`]s) that share hash
//! coefficients and an append-only ghost-index, letting each map support
//! approximate enumeration and exact set algebra against its siblings in
//! addition to the usual probabilistic membership test.
//!
//! Where a standalone bloom filter only answers "have I seen this before?",
//! a [`Family`] of [`Map`]s answers "have I seen this before, in which of
//! these related sets, and roughly what else is in this one?" — at the cost
//! of a shared ghost whose size is driven by the total number of distinct
//! elements ever inserted into any sibling, not any single map's own load.
//!
//! ```
//! use bloomap::Family;
//!
//! let family = Family::for_elements_and_prob(1_000, 0.01);
//! let mut evens = family.new_map();
//! let mut odds = family.new_map();
//!
//! for n in (0..100).step_by(2) {
//!     evens.add(n);
//! }
//! for n in (1..100).step_by(2) {
//!     odds.add(n);
//! }
//!
//! assert!(evens.contains(42));
//! assert!(!odds.contains(42));
//! assert!(evens.is_intersection_empty(&odds));
//! ```
//!
//! ## Layout
//!
//! * [`Family`] derives and owns the sizing (`m`, `k`, `compsize`), the hash
//!   coefficient table, and the ghost.
//! * [`Map`] is a single compartmented filter attached to a family; most
//!   work happens here ([`add`](Map::add), [`contains`](Map::contains),
//!   [`intersect`](Map::intersect), [`iter`](Map::iter), ...).
//! * [`BitMatrix`] is the dense packed-word bit storage `Map` is built on.

mod bitmap;
mod family;
mod map;
mod sizing;

pub use bitmap::BitMatrix;
pub use family::Family;
pub use map::{Map, MapIter};
pub use sizing::Params;
