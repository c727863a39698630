//! Fast hash-map/set aliases used throughout the analyzer.
//!
//! The taint lattice and link graph do many small map lookups per AST node;
//! `rustc-hash`'s FxHash is non-cryptographic but several times faster than
//! SipHash for the short string/int keys this crate deals in.

use rustc_hash::FxBuildHasher;

pub type FxHashMap<K, V> = std::collections::HashMap<K, V, FxBuildHasher>;
pub type FxHashSet<T> = std::collections::HashSet<T, FxBuildHasher>;
