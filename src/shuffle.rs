use {
    crate::{Id, Node, RingResult, Value},
    rand::{Rng, seq::SliceRandom},
    std::collections::BTreeMap,
    tracing::info,
};

/// Nodes holding more than this multiple of the mean key count are heavy.
const HEAVY_FACTOR: f64 = 1.2;

/// Nodes holding less than this multiple of the mean key count are light.
const LIGHT_FACTOR: f64 = 0.8;

/// A key moved by the space shuffle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub key: Id,
    pub value: Option<Value>,
    pub from: Id,
    pub to: Id,
}

/// Summary of a space shuffle pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ShuffleReport {
    /// Variance of per-node key counts before the pass.
    pub variance_before: f64,
    /// Variance of per-node key counts after the pass.
    pub variance_after: f64,
    /// Relative variance reduction, in percent. Zero when the load was
    /// already even.
    pub improvement_percent: f64,
    /// Keys moved by the pass.
    pub relocations: Vec<Relocation>,
}

fn mean(counts: &[usize]) -> f64 {
    if counts.is_empty() {
        return 0.0;
    }
    counts.iter().sum::<usize>() as f64 / counts.len() as f64
}

/// Population variance of the key counts.
fn variance(counts: &[usize]) -> f64 {
    if counts.is_empty() {
        return 0.0;
    }
    let mean = mean(counts);
    counts
        .iter()
        .map(|&count| (count as f64 - mean).powi(2))
        .sum::<f64>()
        / counts.len() as f64
}

impl Node {
    /// Evens out key counts across the ring, see
    /// [`space_shuffle_with_rng`](Self::space_shuffle_with_rng).
    pub fn space_shuffle_optimization(&self) -> RingResult<ShuffleReport> {
        self.space_shuffle_with_rng(&mut rand::thread_rng())
    }

    /// Evens out key counts across the ring.
    ///
    /// Nodes are enumerated by walking successors once around the ring. Each
    /// heavy node (above 1.2x the mean key count) is randomly paired with a
    /// light node (below 0.8x the mean), and half of the count difference is
    /// moved from the heavy node to the light one.
    ///
    /// The pass ignores ownership intervals: moved keys are recorded in the
    /// ring's relocation index, which is how lookups keep finding them.
    pub fn space_shuffle_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> RingResult<ShuffleReport> {
        info!(node = self.id(), "space shuffle started");
        let mut counts = BTreeMap::new();
        for node in self.ring().walk(self.id())? {
            counts.insert(node, self.peer(node).key_count()?);
        }

        let before: Vec<usize> = counts.values().copied().collect();
        let variance_before = variance(&before);
        let mean = mean(&before);
        let (mut heavy, mut light): (Vec<Id>, Vec<Id>) = (Vec::new(), Vec::new());
        for (&node, &count) in &counts {
            if count as f64 > HEAVY_FACTOR * mean {
                heavy.push(node);
            } else if (count as f64) < LIGHT_FACTOR * mean {
                light.push(node);
            }
        }
        heavy.shuffle(rng);
        light.shuffle(rng);

        let mut relocations = Vec::new();
        for (&from, &to) in heavy.iter().zip(&light) {
            let wanted = counts[&from].saturating_sub(counts[&to]) / 2;
            if wanted == 0 {
                continue;
            }
            let moved = self.ring().with_pair(from, to, |source, target| {
                if source.leaving || target.leaving {
                    return Vec::new();
                }
                let keys: Vec<Id> = source.store.keys().take(wanted).collect();
                keys.into_iter()
                    .filter_map(|key| {
                        let value = source.store.remove(key)?;
                        target.store.insert(key, value);
                        Some(Relocation {
                            key,
                            value,
                            from,
                            to,
                        })
                    })
                    .collect::<Vec<_>>()
            })?;

            for relocation in &moved {
                self.ring().relocations().record(relocation.key, to);
                info!(
                    key = relocation.key,
                    value = ?relocation.value,
                    from,
                    to,
                    "space shuffle migrated key"
                );
            }
            if let Some(count) = counts.get_mut(&from) {
                *count -= moved.len();
            }
            if let Some(count) = counts.get_mut(&to) {
                *count += moved.len();
            }
            relocations.extend(moved);
        }

        let after: Vec<usize> = counts.values().copied().collect();
        let variance_after = variance(&after);
        let improvement_percent = if variance_before > 0.0 {
            (variance_before - variance_after) / variance_before * 100.0
        } else {
            0.0
        };
        info!(
            variance_before,
            variance_after,
            improvement_percent,
            moved = relocations.len(),
            "space shuffle finished"
        );

        Ok(ShuffleReport {
            variance_before,
            variance_after,
            improvement_percent,
            relocations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(mean(&[2, 4, 6]), 4.0);
        assert!((variance(&[2, 4, 6]) - 8.0 / 3.0).abs() < 1e-9);
        assert_eq!(variance(&[5, 5, 5, 5]), 0.0);
    }
}
