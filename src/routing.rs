use {
    crate::{
        Id,
        Node,
        RingError,
        RingResult,
        Value,
        interval::{in_open_range, in_range},
    },
    tracing::{debug, warn},
};

/// Outcome of a key lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    /// Looked up key.
    pub key: Id,
    /// Identifiers of the nodes visited, starting with the node the lookup
    /// was issued at.
    pub path: Vec<Id>,
    /// Node whose store answered the lookup.
    pub holder: Id,
    /// Stored entry: `None` if the key is absent from the ring, `Some(None)`
    /// if it was inserted without a value.
    pub entry: Option<Option<Value>>,
}

impl Lookup {
    /// Whether the key is stored in the ring.
    pub fn contains(&self) -> bool {
        self.entry.is_some()
    }

    /// Stored value.
    ///
    /// Absent keys and keys stored without a value both yield `None`.
    pub fn value(&self) -> Option<Value> {
        self.entry.flatten()
    }
}

impl Node {
    /// Finger closest to `target` that strictly precedes it, scanning from
    /// the farthest finger down.
    ///
    /// Fingers pointing at nodes no longer in the ring are skipped. Falls
    /// back to this node when no finger qualifies.
    pub fn closest_preceding_finger(&self, target: Id) -> RingResult<Id> {
        let fingers = self.finger_table()?;
        if fingers.successor().is_none() {
            return Err(RingError::Detached(self.id()));
        }
        let found = fingers
            .iter()
            .rev()
            .filter_map(|(_, _, node)| node)
            .find(|&node| in_open_range(node, self.id(), target) && self.ring().contains(node));
        Ok(found.unwrap_or(self.id()))
    }

    /// Node whose successor interval `(node, successor]` contains `target`.
    ///
    /// In a ring that has not stabilized yet the answer may be stale: the
    /// search stops as soon as it cannot make progress.
    pub fn find_predecessor(&self, target: Id) -> RingResult<Id> {
        let limit = self.ring().space().size() as usize;
        let mut current = self.clone();
        for _ in 0..limit {
            let successor = current.successor()?;
            if in_range(target, current.id(), successor) {
                return Ok(current.id());
            }
            let next = current.closest_preceding_finger(target)?;
            if next == current.id() || next == self.id() {
                return Ok(next);
            }
            current = self.peer(next);
        }
        warn!(node = self.id(), target, "predecessor search exceeded hop limit");
        Err(RingError::NoRoute {
            target,
            hops: limit,
        })
    }

    /// Node responsible for `id`.
    pub fn find_successor(&self, id: Id) -> RingResult<Id> {
        let successor = self.successor()?;
        if successor == self.id() || in_range(id, self.id(), successor) {
            return Ok(successor);
        }
        let predecessor = self.find_predecessor(id)?;
        self.peer(predecessor).successor()
    }

    /// Looks up a key, starting at this node.
    ///
    /// The local store is checked first, then the lookup hops through finger
    /// tables until it reaches the node owning the key. Keys relocated by the
    /// space shuffle are found through the ring's relocation index.
    pub fn find(&self, key: Id) -> RingResult<Lookup> {
        self.ring().space().check(key)?;
        let local = self.ring().with_node(self.id(), |state| state.store.get(key))?;
        if let Some(entry) = local {
            debug!(key, node = self.id(), "key found locally");
            return Ok(Lookup {
                key,
                path: vec![self.id()],
                holder: self.id(),
                entry: Some(entry),
            });
        }

        let limit = self.ring().space().size() as usize;
        let mut path = vec![self.id()];
        let mut current = self.clone();
        let owner = loop {
            let next = current.closest_preceding_finger(key)?;
            if next == current.id() {
                let owner = current.successor()?;
                path.push(owner);
                break owner;
            }

            let next = self.peer(next);
            let next_successor = next.successor()?;
            if in_range(key, next.id(), next_successor) {
                path.push(next.id());
                path.push(next_successor);
                break next_successor;
            }

            path.push(next.id());
            current = next;
            if path.len() > limit {
                warn!(key, node = self.id(), hops = path.len(), "lookup loop detected");
                return Err(RingError::NoRoute {
                    target: key,
                    hops: path.len(),
                });
            }
        };

        let mut holder = owner;
        let mut entry = self.ring().with_node(owner, |state| state.store.get(key))?;
        if entry.is_none() {
            let relocated = self.ring().relocations().holder(key);
            if let Some(relocated) = relocated.filter(|&r| r != owner) {
                entry = self.ring().with_node(relocated, |state| state.store.get(key))?;
                if entry.is_some() {
                    path.push(relocated);
                    holder = relocated;
                }
            }
        }

        debug!(key, node = self.id(), ?path, found = entry.is_some(), "lookup finished");
        Ok(Lookup {
            key,
            path,
            holder,
            entry,
        })
    }
}
