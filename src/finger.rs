use {
    crate::{Id, interval::IdSpace},
    std::fmt,
};

/// Routing table of a node.
///
/// Entry `i` (1-indexed, `1..=m`) points to the node responsible for
/// identifier `(owner + 2^(i-1)) mod 2^m`. Entry 1 is the immediate successor
/// of the owner.
///
/// Entries are identifiers, not references: nodes live in the ring registry
/// and are looked up on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerTable {
    owner: Id,
    space: IdSpace,
    entries: Vec<Option<Id>>,
}

impl FingerTable {
    /// Creates an empty table for the given node.
    pub fn new(owner: Id, space: IdSpace) -> Self {
        Self {
            owner,
            space,
            entries: vec![None; space.bits() as usize],
        }
    }

    /// Number of entries (`m`).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrites entry `i`.
    ///
    /// Callers guarantee `1 <= i <= m`.
    pub fn set(&mut self, i: usize, node: Id) {
        self.entries[i - 1] = Some(node);
    }

    /// Node referenced by entry `i`, if initialized.
    pub fn get(&self, i: usize) -> Option<Id> {
        self.entries[i - 1]
    }

    /// Immediate successor of the owner.
    pub fn successor(&self) -> Option<Id> {
        self.entries[0]
    }

    /// Points every entry at `node`.
    pub fn fill(&mut self, node: Id) {
        self.entries.iter_mut().for_each(|e| *e = Some(node));
    }

    /// Whether any entry references `node`.
    pub fn references(&self, node: Id) -> bool {
        self.entries.contains(&Some(node))
    }

    /// Replaces every reference to `from` with `to`.
    ///
    /// Returns the number of rewritten entries.
    pub fn replace(&mut self, from: Id, to: Id) -> usize {
        let mut count = 0;
        for entry in self.entries.iter_mut().filter(|e| **e == Some(from)) {
            *entry = Some(to);
            count += 1;
        }
        count
    }

    /// Iterator over `(i, start, node)` triples, from entry 1 up to entry `m`.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (usize, Id, Option<Id>)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, node)| (idx + 1, self.space.finger_start(self.owner, idx + 1), *node))
    }
}

fn fmt_entry(node: Option<Id>) -> String {
    node.map_or_else(|| "-".to_string(), |n| n.to_string())
}

impl fmt::Display for FingerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "----------Node id:{}----------", self.owner)?;
        writeln!(f, "Successor: {}", fmt_entry(self.successor()))?;
        writeln!(f, "FingerTables:")?;
        for (i, start, node) in self.iter() {
            let end = self.space.add(self.owner, 1 << i);
            writeln!(
                f,
                "| k = {i} [{start} , {end}) \tsucc. = {} |",
                fmt_entry(node)
            )?;
        }
        write!(f, "-----------------------------")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_ops() {
        let space = IdSpace::new(8).unwrap();
        let mut table = FingerTable::new(30, space);
        assert_eq!(table.len(), 8);
        assert_eq!(table.successor(), None);

        table.fill(30);
        assert!((1..=8).all(|i| table.get(i) == Some(30)));

        table.set(1, 65);
        table.set(7, 110);
        assert_eq!(table.successor(), Some(65));
        assert!(table.references(110));

        assert_eq!(table.replace(30, 160), 6);
        assert!(!table.references(30));
        assert_eq!(table.get(8), Some(160));
    }

    #[test]
    fn starts_wrap() {
        let space = IdSpace::new(8).unwrap();
        let table = FingerTable::new(230, space);
        let starts: Vec<Id> = table.iter().map(|(_, start, _)| start).collect();
        assert_eq!(starts, vec![231, 232, 234, 238, 246, 6, 38, 102]);
    }

    #[test]
    fn display() {
        let space = IdSpace::new(3).unwrap();
        let mut table = FingerTable::new(0, space);
        table.fill(4);
        let dump = table.to_string();
        assert!(dump.starts_with("----------Node id:0----------\nSuccessor: 4\n"));
        assert!(dump.contains("| k = 3 [4 , 0) \tsucc. = 4 |"));
    }
}
