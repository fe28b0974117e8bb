//! A single layer's adjacency lists: one `RwLock<Vec<NodeId>>` per node,
//! locked independently so concurrent inserts only contend on the nodes
//! they actually touch.

use parking_lot::RwLock;

/// Internal dense node index (distinct from the caller-facing
/// [`crate::object::ObjectId`]; see [`crate::hnsw::graph::HnswIndex`]'s
/// id-mapping table).
pub type NodeId = usize;

/// Adjacency lists for every node present at this layer.
#[derive(Debug, Default)]
pub struct Layer {
    neighbors: Vec<RwLock<Vec<NodeId>>>,
}

impl Layer {
    /// Creates a layer with `capacity` pre-allocated (empty) adjacency
    /// slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            neighbors: (0..capacity).map(|_| RwLock::new(Vec::new())).collect(),
        }
    }

    /// Grows this layer so node ids up to `node_id` (inclusive) have a
    /// slot.
    pub fn ensure_capacity(&mut self, node_id: NodeId) {
        while self.neighbors.len() <= node_id {
            self.neighbors.push(RwLock::new(Vec::new()));
        }
    }

    /// Returns a clone of `node_id`'s current neighbor list (empty if the
    /// node has no slot at this layer).
    #[must_use]
    pub fn get_neighbors(&self, node_id: NodeId) -> Vec<NodeId> {
        self.neighbors
            .get(node_id)
            .map(|lock| lock.read().clone())
            .unwrap_or_default()
    }

    /// Overwrites `node_id`'s neighbor list. A no-op if `node_id` has no
    /// slot (the node does not exist at this layer).
    pub fn set_neighbors(&self, node_id: NodeId, neighbors: Vec<NodeId>) {
        if let Some(lock) = self.neighbors.get(node_id) {
            *lock.write() = neighbors;
        }
    }

    /// Number of node slots this layer has allocated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// Whether this layer has no node slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}
