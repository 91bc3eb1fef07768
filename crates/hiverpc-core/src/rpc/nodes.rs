use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use tracing::info;

use crate::config::validate_nodes;
use crate::error::CoreError;

/// Ordered node list with a round-robin cursor.
///
/// Rotation is blind: it never probes node health and is driven purely by
/// transport failures. Concurrent rotations may race; node selection is a
/// failover heuristic, so the only guarantee kept is that the cursor always
/// points inside the list.
pub struct NodePool {
    nodes: RwLock<Vec<String>>,
    index: AtomicUsize,
}

impl NodePool {
    pub fn new(nodes: Vec<String>) -> Result<Self, CoreError> {
        validate_nodes(&nodes)?;
        Ok(Self {
            nodes: RwLock::new(nodes),
            index: AtomicUsize::new(0),
        })
    }

    pub fn current(&self) -> String {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes[self.index.load(Ordering::Relaxed) % nodes.len()].clone()
    }

    pub fn index(&self) -> usize {
        let len = self.len();
        self.index.load(Ordering::Relaxed) % len
    }

    /// Advance to the next node, wrapping past the end, and return it.
    pub fn rotate(&self) -> String {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        let from = self.index.load(Ordering::Relaxed) % nodes.len();
        let to = (from + 1) % nodes.len();
        self.index.store(to, Ordering::Relaxed);
        info!(from = %nodes[from], to = %nodes[to], "switching rpc node");
        nodes[to].clone()
    }

    /// Replace the node list and reset the cursor to the first entry.
    pub fn set_nodes(&self, nodes: Vec<String>) -> Result<(), CoreError> {
        validate_nodes(&nodes)?;
        let mut guard = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        *guard = nodes;
        self.index.store(0, Ordering::Relaxed);
        Ok(())
    }

    pub fn nodes(&self) -> Vec<String> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
