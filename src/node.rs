use {
    crate::{
        Id,
        RingError,
        RingResult,
        Value,
        finger::FingerTable,
        interval::{IdSpace, in_range},
        ring::Ring,
        store::KeyStore,
    },
    std::{collections::BTreeMap, fmt},
};

/// Mutable state of a node, guarded by the node's lock.
#[derive(Debug)]
pub(crate) struct NodeState {
    pub(crate) id: Id,
    pub(crate) fingers: FingerTable,
    /// `None` until the node joins a ring.
    pub(crate) predecessor: Option<Id>,
    pub(crate) store: KeyStore,
    /// Last finger entry refreshed by `fix_fingers`, `0` before the first
    /// refresh.
    pub(crate) next_finger: usize,
    /// Set once the node has handed its keys over on departure. A leaving
    /// node accepts no more writes.
    pub(crate) leaving: bool,
}

impl NodeState {
    pub(crate) fn new(id: Id, space: IdSpace) -> Self {
        Self {
            id,
            fingers: FingerTable::new(id, space),
            predecessor: None,
            store: KeyStore::new(),
            next_finger: 0,
            leaving: false,
        }
    }

    pub(crate) fn successor(&self) -> RingResult<Id> {
        self.fingers.successor().ok_or(RingError::Detached(self.id))
    }

    pub(crate) fn predecessor(&self) -> RingResult<Id> {
        self.predecessor.ok_or(RingError::Detached(self.id))
    }

    /// Whether the key falls into `(predecessor, self]`.
    ///
    /// A node that is its own predecessor is alone and owns every key.
    pub(crate) fn owns(&self, key: Id) -> RingResult<bool> {
        let predecessor = self.predecessor()?;
        Ok(predecessor == self.id || in_range(key, predecessor, self.id))
    }
}

/// Handle to a node of a [`Ring`].
///
/// Handles are cheap to clone and can be sent across threads. All operations
/// lock the node only for as long as they touch its own state; calls into
/// other nodes go through their handles in turn.
#[derive(Clone)]
pub struct Node {
    id: Id,
    ring: Ring,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node").field("id", &self.id).finish()
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl Node {
    pub(crate) fn new(id: Id, ring: Ring) -> Self {
        Self { id, ring }
    }

    /// Handle to another node of the same ring.
    pub(crate) fn peer(&self, id: Id) -> Node {
        Node::new(id, self.ring.clone())
    }

    /// Node identifier, fixed for the node's lifetime.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Ring the node belongs to.
    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    /// Whether the node has joined a ring (and not left it).
    pub fn is_joined(&self) -> bool {
        self.ring
            .with_node(self.id, |state| state.fingers.successor().is_some())
            .unwrap_or(false)
    }

    /// Current predecessor, `None` before the node joins.
    pub fn predecessor(&self) -> RingResult<Option<Id>> {
        self.ring.predecessor_of(self.id)
    }

    /// Current successor (finger entry 1).
    pub fn successor(&self) -> RingResult<Id> {
        self.ring.successor_of(self.id)
    }

    /// Copy of the node's finger table.
    pub fn finger_table(&self) -> RingResult<FingerTable> {
        self.ring.with_node(self.id, |state| state.fingers.clone())
    }

    /// Copy of the keys stored locally.
    pub fn keys(&self) -> RingResult<BTreeMap<Id, Option<Value>>> {
        self.ring.with_node(self.id, |state| state.store.snapshot())
    }

    /// Number of keys stored locally.
    pub fn key_count(&self) -> RingResult<usize> {
        self.ring.with_node(self.id, |state| state.store.len())
    }

    /// Follows predecessor pointers, starting with this node, for at most
    /// `limit` nodes.
    ///
    /// Stops early when the chain returns to this node or runs into a node
    /// without predecessor.
    pub fn predecessor_chain(&self, limit: usize) -> RingResult<Vec<Id>> {
        let mut chain = Vec::with_capacity(limit);
        let mut current = self.id;
        while chain.len() < limit {
            chain.push(current);
            match self.ring.predecessor_of(current)? {
                Some(predecessor) if predecessor != self.id => current = predecessor,
                _ => break,
            }
        }
        Ok(chain)
    }
}
