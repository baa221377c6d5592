use crate::{Id, RingError, RingResult};

/// Largest supported identifier width.
pub const MAX_BITS: u32 = 32;

/// Circular identifier space of `2^bits` positions.
///
/// All arithmetic wraps at `2^bits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdSpace {
    bits: u32,
}

impl IdSpace {
    /// Creates identifier space `[0, 2^bits)`.
    pub fn new(bits: u32) -> RingResult<Self> {
        if bits == 0 || bits > MAX_BITS {
            return Err(RingError::InvalidBits(bits));
        }
        Ok(Self { bits })
    }

    /// Number of bits in an identifier (`m`).
    ///
    /// This is also the number of entries in every finger table.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Number of identifiers on the ring, `2^m`.
    pub fn size(&self) -> u64 {
        1 << self.bits
    }

    /// Ensures that the identifier belongs to the space.
    pub fn check(&self, id: Id) -> RingResult<Id> {
        if id < self.size() {
            Ok(id)
        } else {
            Err(RingError::IdOutOfRange {
                id,
                size: self.size(),
            })
        }
    }

    /// `(id + delta) mod 2^m`
    pub fn add(&self, id: Id, delta: u64) -> Id {
        (id + delta % self.size()) % self.size()
    }

    /// `(id - delta) mod 2^m`
    pub fn sub(&self, id: Id, delta: u64) -> Id {
        (id + self.size() - delta % self.size()) % self.size()
    }

    /// First identifier covered by the `i`-th finger of `id` (1-indexed).
    pub fn finger_start(&self, id: Id, i: usize) -> Id {
        self.add(id, 1 << (i - 1))
    }

    /// Identifier of the node that may hold `id` as its `i`-th finger, i.e.
    /// `id - 2^(i-1)`.
    pub fn finger_origin(&self, id: Id, i: usize) -> Id {
        self.sub(id, 1 << (i - 1))
    }
}

/// Checks whether `id` lies in the half-open arc `(start, end]`, walked
/// clockwise.
///
/// When `start == end` the arc covers the whole ring: a node alone in the ring
/// is its own predecessor and successor and owns every identifier.
pub fn in_range(id: Id, start: Id, end: Id) -> bool {
    if start == end {
        true
    } else if start < end {
        id > start && id <= end
    } else {
        id > start || id <= end
    }
}

/// Checks whether `id` lies in the open arc `(start, end)`.
///
/// When `start == end` every identifier except `start` itself qualifies.
pub fn in_open_range(id: Id, start: Id, end: Id) -> bool {
    if start == end {
        id != start
    } else {
        in_range(id, start, end) && id != end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_open_arc() {
        assert!(in_range(10, 5, 20));
        assert!(in_range(20, 5, 20));
        assert!(!in_range(5, 5, 20));
        assert!(!in_range(21, 5, 20));
        assert!(!in_range(0, 5, 20));
    }

    #[test]
    fn wrapping_arc() {
        // (230, 30] wraps through zero.
        assert!(in_range(231, 230, 30));
        assert!(in_range(255, 230, 30));
        assert!(in_range(0, 230, 30));
        assert!(in_range(30, 230, 30));
        assert!(!in_range(230, 230, 30));
        assert!(!in_range(31, 230, 30));
        assert!(!in_range(110, 230, 30));
    }

    #[test]
    fn degenerate_arc_covers_ring() {
        for id in 0..=255 {
            assert!(in_range(id, 42, 42));
        }
    }

    #[test]
    fn exhaustive_against_clockwise_walk() {
        let space = IdSpace::new(5).unwrap();
        let size = space.size();
        for a in 0..size {
            for b in 0..size {
                if a == b {
                    continue;
                }
                // Walk clockwise from a (exclusive) to b (inclusive).
                let mut covered = vec![false; size as usize];
                let mut x = space.add(a, 1);
                loop {
                    covered[x as usize] = true;
                    if x == b {
                        break;
                    }
                    x = space.add(x, 1);
                }
                for x in 0..size {
                    assert_eq!(in_range(x, a, b), covered[x as usize], "x={x} a={a} b={b}");
                    assert_eq!(
                        in_open_range(x, a, b),
                        covered[x as usize] && x != b,
                        "x={x} a={a} b={b}"
                    );
                }
            }
        }
    }

    #[test]
    fn open_arc_excludes_both_ends() {
        assert!(!in_open_range(5, 5, 20));
        assert!(!in_open_range(20, 5, 20));
        assert!(in_open_range(19, 5, 20));
        assert!(!in_open_range(7, 7, 7));
        assert!(in_open_range(8, 7, 7));
    }

    #[test]
    fn modular_arithmetic() {
        let space = IdSpace::new(8).unwrap();
        assert_eq!(space.size(), 256);
        assert_eq!(space.add(250, 10), 4);
        assert_eq!(space.sub(3, 5), 254);
        assert_eq!(space.finger_start(230, 1), 231);
        assert_eq!(space.finger_start(230, 8), 102);
        assert_eq!(space.finger_origin(65, 7), 1);
        assert_eq!(space.finger_origin(65, 8), 193);
        assert_eq!(space.check(255), Ok(255));
        assert_eq!(
            space.check(256),
            Err(RingError::IdOutOfRange { id: 256, size: 256 })
        );
    }

    #[test]
    fn bits_bounds() {
        assert_eq!(IdSpace::new(0), Err(RingError::InvalidBits(0)));
        assert_eq!(IdSpace::new(33), Err(RingError::InvalidBits(33)));
        assert_eq!(IdSpace::new(32).unwrap().size(), 1 << 32);
    }
}
