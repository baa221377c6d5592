use {
    crate::{Id, Node, RingError, RingResult, Value, node::NodeState},
    rapidhash::RapidBuildHasher,
    std::collections::HashMap,
    tracing::{debug, info, warn},
};

/// Index of keys stored away from their owner.
///
/// Only the space shuffle places keys outside of their ownership interval.
/// The index maps such keys to the node currently holding them, so that
/// lookups can still find them and writes can evict the stray copy.
#[derive(Debug, Default)]
pub(crate) struct Relocations {
    holders: HashMap<Id, Id, RapidBuildHasher>,
}

impl Relocations {
    /// Records that `key` now lives at `holder`.
    pub fn record(&mut self, key: Id, holder: Id) {
        self.holders.insert(key, holder);
    }

    /// Node holding a relocated key.
    pub fn holder(&self, key: Id) -> Option<Id> {
        self.holders.get(&key).copied()
    }

    /// Drops the entry for `key`, returning its holder.
    pub fn forget(&mut self, key: Id) -> Option<Id> {
        self.holders.remove(&key)
    }

    /// Follows a relocated key that migrated to `to`. The entry is dropped
    /// once `to` owns the key.
    pub fn moved(&mut self, key: Id, to: Id, owned: bool) {
        if owned {
            self.holders.remove(&key);
        } else if let Some(holder) = self.holders.get_mut(&key) {
            *holder = to;
        }
    }
}

impl Node {
    /// Whether the key falls into this node's ownership interval
    /// `(predecessor, self]`.
    pub fn is_responsible_for_key(&self, key: Id) -> RingResult<bool> {
        self.ring().try_with_node(self.id(), |state| state.owns(key))
    }

    /// Moves `key`, if stored here, to `target`.
    ///
    /// Both stores are locked for the move, so the key is never visible in
    /// both or in neither. A target that is leaving the ring receives
    /// nothing. Returns whether the key was moved.
    pub fn transfer_key(&self, key: Id, target: Id) -> RingResult<bool> {
        if target == self.id() {
            return self
                .ring()
                .with_node(self.id(), |state| state.store.contains(key));
        }
        let moved = self.ring().with_pair(self.id(), target, |from, to| {
            if to.leaving {
                return None;
            }
            let value = from.store.remove(key)?;
            let owned = to.owns(key).unwrap_or(false);
            // An owner's own entry is newer than a copy found elsewhere.
            if !(owned && to.store.contains(key)) {
                to.store.insert(key, value);
            }
            Some(owned)
        })?;
        let Some(owned) = moved else {
            return Ok(false);
        };
        self.ring().relocations().moved(key, target, owned);
        info!(key, from = self.id(), to = target, "migrate key");
        Ok(true)
    }

    /// Pulls every key this node is responsible for from `source`.
    ///
    /// Returns the number of keys moved.
    pub fn move_keys(&self, source: Id) -> RingResult<usize> {
        if source == self.id() {
            return Ok(0);
        }
        let keys = self
            .ring()
            .with_node(source, |state| state.store.keys().collect::<Vec<_>>())?;
        let source = self.peer(source);
        let mut moved = 0;
        for key in keys {
            if self.is_responsible_for_key(key)? && source.transfer_key(key, self.id())? {
                moved += 1;
            }
        }
        Ok(moved)
    }

    /// Walks the whole ring and pulls every key this node is responsible for.
    ///
    /// Repairs placement drift that migrating from the successor alone would
    /// miss. Each node is visited at most once.
    pub fn check_all_nodes_for_keys(&self) -> RingResult<usize> {
        let mut moved = 0;
        for node in self.ring().walk(self.id())?.into_iter().skip(1) {
            moved += self.move_keys(node)?;
        }
        if moved > 0 {
            debug!(node = self.id(), moved, "ring sweep pulled keys");
        }
        Ok(moved)
    }

    /// Stores a key at the node responsible for it, overwriting any previous
    /// entry.
    ///
    /// Returns the identifier of the node the key was stored at.
    pub fn insert(&self, key: Id, value: Option<Value>) -> RingResult<Id> {
        self.ring().space().check(key)?;
        let (owner, _) = self.with_owner(key, |state| state.store.insert(key, value))?;
        self.evict_relocated(key, owner)?;
        info!(key, ?value, node = owner, "key inserted");
        Ok(owner)
    }

    /// Removes a key from the node responsible for it.
    ///
    /// Returns `false` if the key was not found.
    pub fn remove(&self, key: Id) -> RingResult<bool> {
        self.ring().space().check(key)?;
        let (owner, removed) = self.with_owner(key, |state| state.store.remove(key).is_some())?;
        let evicted = self.evict_relocated(key, owner)?;
        if removed || evicted {
            info!(key, node = owner, "key removed");
        } else {
            debug!(key, "key not found");
        }
        Ok(removed || evicted)
    }

    /// Runs `f` against the store of the node owning `key`.
    ///
    /// Ownership is checked under the owner's lock. While nodes join or
    /// leave, routing may name a node that no longer owns the key: a leaving
    /// node forwards to its successor, which took over its interval, any
    /// other node forwards to its predecessor, and a node that is already
    /// gone triggers a new lookup. Gives up after `2^m` attempts.
    fn with_owner<R>(
        &self,
        key: Id,
        mut f: impl FnMut(&mut NodeState) -> R,
    ) -> RingResult<(Id, R)> {
        let limit = self.ring().space().size() as usize;
        let mut target = self.find_successor(key)?;
        for _ in 0..limit {
            let placement = self.ring().try_with_node(target, |state| {
                if state.leaving {
                    return Ok(Placement::Forward(state.successor()?));
                }
                if state.owns(key)? {
                    return Ok(Placement::Owner(f(state)));
                }
                Ok(Placement::Forward(state.predecessor()?))
            });
            match placement {
                Ok(Placement::Owner(result)) => return Ok((target, result)),
                Ok(Placement::Forward(next)) => {
                    debug!(key, from = target, to = next, "write forwarded");
                    target = next;
                }
                Err(RingError::UnknownNode(id)) if id == target && id != self.id() => {
                    target = self.find_successor(key)?;
                }
                Err(err) => return Err(err),
            }
        }
        warn!(key, node = self.id(), "no owner found for write");
        Err(RingError::NoRoute {
            target: key,
            hops: limit,
        })
    }

    /// Deletes a copy of `key` stored away from `owner` by the space shuffle.
    fn evict_relocated(&self, key: Id, owner: Id) -> RingResult<bool> {
        let holder = self.ring().relocations().forget(key);
        match holder {
            Some(holder) if holder != owner && self.ring().contains(holder) => self
                .ring()
                .with_node(holder, |state| state.store.remove(key).is_some()),
            _ => Ok(false),
        }
    }
}

enum Placement<R> {
    Owner(R),
    Forward(Id),
}
