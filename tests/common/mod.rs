#![allow(dead_code)]

use {
    chordring::{FingerTable, Id, Node, Ring, RingBuilder, Value},
    std::{
        collections::BTreeMap,
        thread,
        time::{Duration, Instant},
    },
};

/// Node identifiers of the reference ring.
pub const IDS: [Id; 6] = [0, 30, 65, 110, 160, 230];

/// Keys inserted into the reference ring.
pub const KEYS: [(Id, Option<Value>); 12] = [
    (3, Some(3)),
    (200, None),
    (123, None),
    (45, Some(3)),
    (99, None),
    (60, Some(10)),
    (50, Some(8)),
    (100, Some(5)),
    (101, Some(4)),
    (102, Some(6)),
    (240, Some(8)),
    (250, Some(10)),
];

/// Builds an 8-bit ring, joining each node through the previous one.
pub fn ring_of(ids: &[Id]) -> (Ring, Vec<Node>) {
    ring_with_bits(8, ids, |nodes| nodes.last().map(Node::id))
}

/// Builds a ring, asking `bootstrap` which node every new node joins through.
pub fn ring_with_bits(
    bits: u32,
    ids: &[Id],
    bootstrap: impl Fn(&[Node]) -> Option<Id>,
) -> (Ring, Vec<Node>) {
    let ring = RingBuilder::new().with_bits(bits).build().unwrap();
    let mut nodes: Vec<Node> = Vec::new();
    for &id in ids {
        let node = ring.add_node(id).unwrap();
        node.join(bootstrap(&nodes)).unwrap();
        nodes.push(node);
    }
    (ring, nodes)
}

/// Reference ring with [`KEYS`] inserted through node 0.
pub fn populated_ring() -> (Ring, Vec<Node>) {
    let (ring, nodes) = ring_of(&IDS);
    for (key, value) in KEYS {
        nodes[0].insert(key, value).unwrap();
    }
    (ring, nodes)
}

/// Runs enough stabilization and finger refresh rounds on every node still
/// in the ring for it to converge.
pub fn settle(ring: &Ring) {
    let nodes: Vec<Node> = ring.nodes().into_iter().filter_map(|id| ring.node(id)).collect();
    for _ in 0..10 {
        for node in &nodes {
            node.stabilize().unwrap();
        }
    }
    for _ in 0..ring.space().bits() {
        for node in &nodes {
            node.fix_fingers().unwrap();
        }
    }
}

/// First node at or after `id`, clockwise.
pub fn expected_successor(ids: &[Id], id: Id) -> Id {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .copied()
        .find(|&node| node >= id)
        .unwrap_or(sorted[0])
}

/// Last node before `id`, clockwise.
pub fn expected_predecessor(ids: &[Id], id: Id) -> Id {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .rev()
        .copied()
        .find(|&node| node < id)
        .unwrap_or(sorted[sorted.len() - 1])
}

/// Whether every node's predecessor and finger table match the node set.
pub fn is_converged(ring: &Ring) -> bool {
    let ids = ring.nodes();
    ids.iter().all(|&id| {
        let Some(node) = ring.node(id) else {
            return false;
        };
        let fingers_ok = node.finger_table().is_ok_and(|table| {
            table
                .iter()
                .all(|(_, start, finger)| finger == Some(expected_successor(&ids, start)))
        });
        let predecessor_ok = node.predecessor() == Ok(Some(expected_predecessor(&ids, id)));
        fingers_ok && predecessor_ok
    })
}

/// Per-node state, keyed by node identifier.
pub type Snapshot = BTreeMap<Id, (Option<Id>, FingerTable, BTreeMap<Id, Option<Value>>)>;

pub fn snapshot(ring: &Ring) -> Snapshot {
    ring.nodes()
        .into_iter()
        .filter_map(|id| ring.node(id))
        .map(|node| {
            let state = (
                node.predecessor().unwrap(),
                node.finger_table().unwrap(),
                node.keys().unwrap(),
            );
            (node.id(), state)
        })
        .collect()
}

/// Total number of keys stored in the ring.
pub fn total_keys(ring: &Ring) -> usize {
    ring.nodes()
        .into_iter()
        .filter_map(|id| ring.node(id))
        .map(|node| node.key_count().unwrap())
        .sum()
}

/// Polls `condition` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
