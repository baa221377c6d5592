use {
    crate::{
        Id,
        Node,
        RingResult,
        finger::FingerTable,
        interval::{in_open_range, in_range},
        node::NodeState,
        ring::IdSet,
    },
    tracing::{debug, info, warn},
};

impl Node {
    /// Joins the ring through `peer`, or starts a new ring when `peer` is
    /// `None`.
    ///
    /// The finger table is built by querying the peer, the node is spliced in
    /// front of its successor together with the keys it now owns, other
    /// nodes' finger tables are updated, and the rest of the ring is swept
    /// for misplaced keys.
    ///
    /// Joining is not atomic across the ring: lookups running concurrently
    /// may miss keys until the next stabilization round.
    pub fn join(&self, peer: Option<Id>) -> RingResult<()> {
        if self.is_joined() {
            warn!(node = self.id(), "node already joined, ignoring");
            return Ok(());
        }

        let Some(peer) = peer else {
            self.ring().with_node(self.id(), |state| {
                state.fingers.fill(state.id);
                state.predecessor = Some(state.id);
            })?;
            info!(node = self.id(), "first node to join the ring");
            return Ok(());
        };

        let bootstrap = self.peer(peer);
        let space = self.ring().space();
        let mut fingers = FingerTable::new(self.id(), space);

        let successor = bootstrap.find_successor(self.id())?;
        fingers.set(1, successor);
        let mut previous = successor;
        for i in 2..=fingers.len() {
            let start = space.finger_start(self.id(), i);
            // Consecutive fingers often collapse into the same successor.
            if !in_range(start, self.id(), previous) {
                previous = bootstrap.find_successor(start)?;
            }
            fingers.set(i, previous);
        }

        // Splice in front of the successor and take over its keys in one
        // step, so that writes land either before the hand-off or here.
        let (predecessor, moved) = self.ring().with_pair(self.id(), successor, |this, next| {
            let predecessor = next.predecessor.unwrap_or(next.id);
            this.fingers = fingers;
            this.predecessor = Some(predecessor);
            next.predecessor = Some(this.id);
            let owned: Vec<Id> = next
                .store
                .keys()
                .filter(|&key| in_range(key, predecessor, this.id))
                .collect();
            for &key in &owned {
                if let Some(value) = next.store.remove(key) {
                    this.store.insert(key, value);
                }
            }
            (predecessor, owned)
        })?;
        info!(node = self.id(), successor, predecessor, "joined the ring");
        for key in moved {
            self.ring().relocations().moved(key, self.id(), true);
            info!(key, from = successor, to = self.id(), "migrate key");
        }

        self.update_others()?;
        self.check_all_nodes_for_keys()?;

        debug!(node = self.id(), "finger table after join:\n{}", self.finger_table()?);
        Ok(())
    }

    /// Leaves the ring.
    ///
    /// Local keys go to the successor, the successor adopts this node's
    /// predecessor, and every finger entry pointing at this node is redirected
    /// to the successor. Afterwards the node is removed from the ring.
    ///
    /// A node alone in the ring stays where it is.
    pub fn leave(&self) -> RingResult<()> {
        info!(node = self.id(), "leaving the ring");
        let (predecessor, successor) = self
            .ring()
            .try_with_node(self.id(), |state| Ok((state.predecessor()?, state.successor()?)))?;
        if successor == self.id() {
            info!(node = self.id(), "node was the only node in the ring");
            return Ok(());
        }

        // The successor takes over the keys and the interval in one step, so
        // writes racing the departure are either handed off or forwarded.
        let moved = self.ring().with_pair(self.id(), successor, |this, next| {
            this.leaving = true;
            next.predecessor = Some(predecessor);
            hand_off(this, next)
        })?;
        self.follow_keys(moved, successor);

        let space = self.ring().space();
        for i in 1..=space.bits() as usize {
            match self.finger_origin_node(i) {
                Ok(node) if node != self.id() => {
                    self.ring().with_node(node, |state| {
                        if state.fingers.get(i) == Some(self.id()) {
                            state.fingers.set(i, successor);
                        }
                    })?;
                }
                Ok(_) => {}
                Err(err) => debug!(node = self.id(), i, %err, "finger fixup skipped"),
            }
        }

        if predecessor != self.id() {
            self.ring()
                .with_node(predecessor, |state| state.fingers.set(1, successor))?;
            if let Err(err) = self.peer(predecessor).fix_fingers() {
                warn!(node = predecessor, %err, "fix fingers after departure failed");
            }
        }

        let rewritten = self.purge_references(predecessor, successor)?;
        let stray = self
            .ring()
            .with_pair(self.id(), successor, |this, next| hand_off(this, next))?;
        self.follow_keys(stray, successor);
        self.ring().unregister(self.id());
        info!(
            node = self.id(),
            predecessor,
            successor,
            rewritten,
            "left the ring"
        );
        Ok(())
    }

    /// Records keys handed over to `successor` in the log and the relocation
    /// index.
    fn follow_keys(&self, moved: Vec<(Id, bool)>, successor: Id) {
        for (key, owned) in moved {
            self.ring().relocations().moved(key, successor, owned);
            info!(key, from = self.id(), to = successor, "migrate key");
        }
    }

    /// Walks the ring from the successor and rewrites every remaining finger
    /// or predecessor reference to this node.
    ///
    /// Returns the number of rewritten references.
    fn purge_references(&self, predecessor: Id, successor: Id) -> RingResult<usize> {
        let mut visited = IdSet::default();
        visited.insert(self.id());
        let mut rewritten = 0;
        let mut current = successor;
        while visited.insert(current) {
            current = self.ring().try_with_node(current, |state| {
                rewritten += state.fingers.replace(self.id(), successor);
                if state.predecessor == Some(self.id()) {
                    state.predecessor = Some(predecessor);
                    rewritten += 1;
                }
                state.successor()
            })?;
        }
        Ok(rewritten)
    }

    /// Verifies the successor link and tells the successor about this node.
    ///
    /// If the successor's predecessor sits between this node and the
    /// successor, it becomes the new successor. Safe to call repeatedly.
    pub fn stabilize(&self) -> RingResult<()> {
        let mut successor = self.successor()?;
        if !self.ring().contains(successor) {
            successor = self.repair_successor(successor)?;
        }
        let candidate = self.ring().predecessor_of(successor)?;
        if let Some(candidate) = candidate.filter(|&c| {
            c != successor && in_range(c, self.id(), successor) && self.ring().contains(c)
        }) {
            self.ring()
                .with_node(self.id(), |state| state.fingers.set(1, candidate))?;
            debug!(node = self.id(), from = successor, to = candidate, "successor corrected");
            successor = candidate;
        }
        self.peer(successor).notify(self.id())
    }

    /// Replaces a successor that has left the ring with the closest finger
    /// still in it, or with this node if there is none.
    fn repair_successor(&self, departed: Id) -> RingResult<Id> {
        let successor = self
            .finger_table()?
            .iter()
            .filter_map(|(_, _, node)| node)
            .find(|&node| self.ring().contains(node))
            .unwrap_or(self.id());
        self.ring()
            .with_node(self.id(), |state| state.fingers.set(1, successor))?;
        warn!(node = self.id(), departed, successor, "successor left the ring");
        Ok(successor)
    }

    /// Adopts `candidate` as predecessor if there is none yet, if the current
    /// predecessor has left, or if `candidate` sits between the current
    /// predecessor and this node.
    ///
    /// A candidate that is leaving the ring is never adopted.
    pub fn notify(&self, candidate: Id) -> RingResult<()> {
        let current = self.predecessor()?;
        let stale = current.is_some_and(|p| !self.ring().contains(p));
        let adopt = |state: &mut NodeState| {
            let adopt = match state.predecessor {
                None => true,
                Some(predecessor) => stale || in_range(candidate, predecessor, state.id),
            };
            if adopt && state.predecessor != Some(candidate) {
                state.predecessor = Some(candidate);
                return true;
            }
            false
        };
        let adopted = if candidate == self.id() {
            self.ring().with_node(self.id(), adopt)?
        } else {
            self.ring()
                .with_pair(self.id(), candidate, |this, other| !other.leaving && adopt(this))?
        };
        if adopted {
            debug!(node = self.id(), predecessor = candidate, "predecessor updated");
        }
        Ok(())
    }

    /// Refreshes one finger entry, advancing a rotating cursor.
    ///
    /// Called once per maintenance tick, so that `m` ticks refresh the whole
    /// table.
    pub fn fix_fingers(&self) -> RingResult<()> {
        let space = self.ring().space();
        let bits = space.bits() as usize;
        let (i, cached) = self.ring().with_node(self.id(), |state| {
            state.next_finger = state.next_finger % bits + 1;
            (state.next_finger, state.fingers.get(state.next_finger))
        })?;

        let successor = self.find_successor(space.finger_start(self.id(), i))?;
        if cached != Some(successor) {
            self.ring()
                .with_node(self.id(), |state| state.fingers.set(i, successor))?;
            debug!(node = self.id(), i, successor, "finger refreshed");
        }
        Ok(())
    }

    /// Installs this node into the finger tables of every node that should
    /// now point at it.
    pub(crate) fn update_others(&self) -> RingResult<()> {
        let space = self.ring().space();
        for i in 1..=space.bits() as usize {
            let node = self.finger_origin_node(i)?;
            if node != self.id() {
                self.peer(node).update_finger_table(self.id(), i)?;
            }
        }
        Ok(())
    }

    /// Last node at or before `id - 2^(i-1)`: the node whose `i`-th finger
    /// may point at this node.
    fn finger_origin_node(&self, i: usize) -> RingResult<Id> {
        let origin = self.ring().space().finger_origin(self.id(), i);
        let node = self.find_predecessor(origin)?;
        // A node sitting exactly at the origin is reported as its
        // predecessor's successor.
        if self.peer(node).successor()? == origin {
            return Ok(origin);
        }
        Ok(node)
    }

    /// Installs `candidate` as finger `i` if it is closer than the current
    /// entry, then keeps walking backwards through predecessors for as long
    /// as they accept the update.
    pub(crate) fn update_finger_table(&self, candidate: Id, i: usize) -> RingResult<()> {
        let mut visited = IdSet::default();
        let mut current = self.id();
        while visited.insert(current) {
            let next = self.ring().with_node(current, |state| {
                let install = match state.fingers.get(i) {
                    None => true,
                    Some(finger) => in_open_range(candidate, state.id, finger),
                };
                if !install {
                    return None;
                }
                state.fingers.set(i, candidate);
                Some(state.predecessor)
            })?;
            let Some(predecessor) = next else {
                break;
            };
            debug!(node = current, i, finger = candidate, "finger installed");
            match predecessor {
                Some(p) if p != current && p != candidate => current = p,
                _ => break,
            }
        }
        Ok(())
    }
}

/// Moves every key of `this` into `next`, reporting for each key whether
/// `next` owns it.
fn hand_off(this: &mut NodeState, next: &mut NodeState) -> Vec<(Id, bool)> {
    this.store
        .drain()
        .into_iter()
        .map(|(key, value)| {
            next.store.insert(key, value);
            (key, next.owns(key).unwrap_or(false))
        })
        .collect()
}
