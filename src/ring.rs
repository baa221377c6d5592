use {
    crate::{
        Id,
        Node,
        RingError,
        RingResult,
        builder::RingConfig,
        interval::IdSpace,
        migration::Relocations,
        node::NodeState,
    },
    parking_lot::{Mutex, MutexGuard, RwLock},
    rapidhash::RapidBuildHasher,
    std::{
        collections::{HashMap, HashSet},
        sync::Arc,
    },
};

/// Set of identifiers, used to keep ring walks cycle-safe.
pub(crate) type IdSet = HashSet<Id, RapidBuildHasher>;

/// Node slot: every node is guarded by its own lock.
type Slot = Arc<Mutex<NodeState>>;

/// Registry of nodes.
///
/// The registry owns the nodes, all references between nodes (predecessor,
/// fingers) are identifiers resolved through it.
struct Registry {
    nodes: HashMap<Id, Slot, RapidBuildHasher>,
    version: u64,
}

impl Registry {
    fn new() -> Self {
        Self {
            nodes: HashMap::with_hasher(RapidBuildHasher::default()),
            version: 0,
        }
    }

    fn insert(&mut self, state: NodeState) -> RingResult<()> {
        let id = state.id;
        if self.nodes.contains_key(&id) {
            return Err(RingError::DuplicateNode(id));
        }
        self.nodes.insert(id, Arc::new(Mutex::new(state)));
        self.version += 1;
        Ok(())
    }

    fn remove(&mut self, id: Id) -> Option<Slot> {
        self.nodes.remove(&id).inspect(|_| self.version += 1)
    }
}

struct Shared {
    config: RingConfig,
    registry: RwLock<Registry>,
    relocations: Mutex<Relocations>,
}

/// Chord ring.
///
/// Holds every node created in it, whether joined or still detached. The ring
/// itself never routes: nodes find each other through their successor
/// pointers and finger tables, the registry only resolves identifiers to
/// nodes.
///
/// Cloning is cheap, clones share the same ring.
#[derive(Clone)]
pub struct Ring {
    shared: Arc<Shared>,
}

impl Ring {
    pub(crate) fn new(config: RingConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                registry: RwLock::new(Registry::new()),
                relocations: Mutex::new(Relocations::default()),
            }),
        }
    }

    /// Ring configuration.
    pub fn config(&self) -> &RingConfig {
        &self.shared.config
    }

    /// Identifier space of the ring.
    pub fn space(&self) -> IdSpace {
        self.shared.config.space()
    }

    /// Creates a detached node with the given identifier.
    ///
    /// The node takes no part in routing until it [joins](Node::join).
    pub fn add_node(&self, id: Id) -> RingResult<Node> {
        let space = self.space();
        space.check(id)?;
        self.shared
            .registry
            .write()
            .insert(NodeState::new(id, space))?;
        Ok(Node::new(id, self.clone()))
    }

    /// Handle to a registered node.
    pub fn node(&self, id: Id) -> Option<Node> {
        self.contains(id).then(|| Node::new(id, self.clone()))
    }

    /// Identifiers of all registered nodes, in ascending order.
    ///
    /// Diagnostic only: nodes never use this to route.
    pub fn nodes(&self) -> Vec<Id> {
        let mut ids: Vec<Id> = self.shared.registry.read().nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.shared.registry.read().nodes.len()
    }

    /// Whether the ring has no registered node.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registry version, bumped on every node addition or removal.
    pub fn version(&self) -> u64 {
        self.shared.registry.read().version
    }

    /// Whether a node with the given identifier is registered.
    pub fn contains(&self, id: Id) -> bool {
        self.shared.registry.read().nodes.contains_key(&id)
    }

    pub(crate) fn unregister(&self, id: Id) -> bool {
        self.shared.registry.write().remove(id).is_some()
    }

    pub(crate) fn relocations(&self) -> MutexGuard<'_, Relocations> {
        self.shared.relocations.lock()
    }

    fn slot(&self, id: Id) -> RingResult<Slot> {
        self.shared
            .registry
            .read()
            .nodes
            .get(&id)
            .cloned()
            .ok_or(RingError::UnknownNode(id))
    }

    /// Runs `f` against the node's state while holding its lock.
    ///
    /// The lock is held only for the duration of `f`, which must not call
    /// back into the ring.
    pub(crate) fn with_node<R>(&self, id: Id, f: impl FnOnce(&mut NodeState) -> R) -> RingResult<R> {
        let slot = self.slot(id)?;
        let mut state = slot.lock();
        Ok(f(&mut *state))
    }

    /// Same as [`with_node`](Self::with_node), for fallible closures.
    pub(crate) fn try_with_node<R>(
        &self,
        id: Id,
        f: impl FnOnce(&mut NodeState) -> RingResult<R>,
    ) -> RingResult<R> {
        self.with_node(id, f)?
    }

    /// Runs `f` against two distinct nodes, holding both locks.
    ///
    /// Locks are always taken in ascending identifier order, so concurrent
    /// pairs cannot deadlock.
    pub(crate) fn with_pair<R>(
        &self,
        a: Id,
        b: Id,
        f: impl FnOnce(&mut NodeState, &mut NodeState) -> R,
    ) -> RingResult<R> {
        debug_assert_ne!(a, b, "pair of identical nodes");
        let (slot_a, slot_b) = (self.slot(a)?, self.slot(b)?);
        if a < b {
            let mut state_a = slot_a.lock();
            let mut state_b = slot_b.lock();
            Ok(f(&mut *state_a, &mut *state_b))
        } else {
            let mut state_b = slot_b.lock();
            let mut state_a = slot_a.lock();
            Ok(f(&mut *state_a, &mut *state_b))
        }
    }

    pub(crate) fn successor_of(&self, id: Id) -> RingResult<Id> {
        self.try_with_node(id, |state| state.successor())
    }

    pub(crate) fn predecessor_of(&self, id: Id) -> RingResult<Option<Id>> {
        self.with_node(id, |state| state.predecessor)
    }

    /// Nodes met by following successor pointers from `start`, once around
    /// the ring.
    ///
    /// The walk stops at the first node seen twice, so a broken ring never
    /// loops.
    pub(crate) fn walk(&self, start: Id) -> RingResult<Vec<Id>> {
        let mut visited = IdSet::default();
        let mut order = Vec::new();
        let mut current = start;
        while visited.insert(current) {
            order.push(current);
            current = self.successor_of(current)?;
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::RingBuilder};

    #[test]
    fn registry_ops() {
        let ring = RingBuilder::new().build().unwrap();
        assert!(ring.is_empty());

        for id in [160, 0, 65] {
            ring.add_node(id).unwrap();
        }
        assert_eq!(ring.nodes(), vec![0, 65, 160]);
        assert_eq!(ring.version(), 3);
        assert_eq!(ring.add_node(65).err(), Some(RingError::DuplicateNode(65)));
        assert_eq!(
            ring.add_node(256).err(),
            Some(RingError::IdOutOfRange { id: 256, size: 256 })
        );

        assert!(ring.unregister(65));
        assert!(!ring.unregister(65));
        assert!(ring.node(65).is_none());
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.version(), 4);
    }

    #[test]
    fn detached_nodes_have_no_successor() {
        let ring = RingBuilder::new().build().unwrap();
        ring.add_node(7).unwrap();
        assert_eq!(ring.successor_of(7), Err(RingError::Detached(7)));
        assert_eq!(ring.predecessor_of(7), Ok(None));
        assert_eq!(ring.successor_of(8), Err(RingError::UnknownNode(8)));
    }

    #[test]
    fn pair_locking_in_both_orders() {
        let ring = RingBuilder::new().build().unwrap();
        ring.add_node(1).unwrap();
        ring.add_node(2).unwrap();

        let ids = ring.with_pair(2, 1, |a, b| (a.id, b.id)).unwrap();
        assert_eq!(ids, (2, 1));
        let ids = ring.with_pair(1, 2, |a, b| (a.id, b.id)).unwrap();
        assert_eq!(ids, (1, 2));
    }
}
