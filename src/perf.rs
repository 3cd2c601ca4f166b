// Memo tables for the span-tree algorithms. A shared list is identified by
// its address, which is stable while any handle to it is alive; every table
// lives for a single call and is never iterated.

use std::sync::Arc;

#[cfg(all(feature = "fast-hash", not(feature = "deterministic-order")))]
pub type FastSet<T> = ahash::AHashSet<T>;

#[cfg(feature = "deterministic-order")]
pub type FastSet<T> = std::collections::BTreeSet<T>;

#[cfg(not(any(feature = "fast-hash", feature = "deterministic-order")))]
pub type FastSet<T> = std::collections::HashSet<T>;

#[cfg(all(feature = "fast-hash", not(feature = "deterministic-order")))]
pub type FastMap<K, V> = ahash::AHashMap<K, V>;

#[cfg(feature = "deterministic-order")]
pub type FastMap<K, V> = std::collections::BTreeMap<K, V>;

#[cfg(not(any(feature = "fast-hash", feature = "deterministic-order")))]
pub type FastMap<K, V> = std::collections::HashMap<K, V>;

/// Address of a tree node.
pub type NodeKey = usize;

/// Nodes already visited by a walk over a DAG of shared lists.
pub type Visited = FastSet<NodeKey>;

/// Per-node results of a walk.
pub type NodeMemo<V> = FastMap<NodeKey, V>;

/// Results keyed by an ordered pair of nodes (binary tree operations).
pub type PairMemo<V> = FastMap<(NodeKey, NodeKey), V>;

#[inline]
pub fn node_key<T>(node: &T) -> NodeKey {
    node as *const T as usize
}

#[inline]
pub fn pair_key<T>(a: &Arc<T>, b: &Arc<T>) -> (NodeKey, NodeKey) {
    (Arc::as_ptr(a) as usize, Arc::as_ptr(b) as usize)
}
