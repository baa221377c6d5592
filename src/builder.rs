use {
    crate::{DEFAULT_BITS, Ring, RingResult, interval::IdSpace},
    std::time::Duration,
};

/// Default tick of the background maintenance loop.
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_millis(50);

/// Ring configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    space: IdSpace,
    maintenance_interval: Duration,
}

impl RingConfig {
    /// Identifier space.
    pub fn space(&self) -> IdSpace {
        self.space
    }

    /// Tick interval used by [`Maintainer::spawn`](crate::Maintainer::spawn).
    pub fn maintenance_interval(&self) -> Duration {
        self.maintenance_interval
    }
}

/// Ring builder.
#[derive(Debug, Clone)]
pub struct RingBuilder {
    bits: u32,
    maintenance_interval: Duration,
}

impl Default for RingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RingBuilder {
    /// Creates a builder with an 8-bit identifier space.
    pub fn new() -> Self {
        Self {
            bits: DEFAULT_BITS,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
        }
    }

    /// Sets the identifier width `m`: the ring holds `2^m` identifiers and
    /// every finger table has `m` entries.
    pub fn with_bits(mut self, bits: u32) -> Self {
        self.bits = bits;
        self
    }

    /// Sets the tick of background maintenance.
    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    /// Builds an empty ring.
    pub fn build(self) -> RingResult<Ring> {
        let config = RingConfig {
            space: IdSpace::new(self.bits)?,
            maintenance_interval: self.maintenance_interval,
        };
        Ok(Ring::new(config))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::RingError};

    #[test]
    fn ring_builder() {
        let ring = RingBuilder::new().build().unwrap();
        assert_eq!(ring.space().bits(), 8);
        assert_eq!(ring.space().size(), 256);
        assert_eq!(
            ring.config().maintenance_interval(),
            DEFAULT_MAINTENANCE_INTERVAL
        );

        let ring = RingBuilder::new()
            .with_bits(16)
            .with_maintenance_interval(Duration::from_millis(5))
            .build()
            .unwrap();
        assert_eq!(ring.space().size(), 65536);
        assert_eq!(
            ring.config().maintenance_interval(),
            Duration::from_millis(5)
        );

        assert_eq!(
            RingBuilder::new().with_bits(0).build().err(),
            Some(RingError::InvalidBits(0))
        );
        assert_eq!(
            RingBuilder::new().with_bits(64).build().err(),
            Some(RingError::InvalidBits(64))
        );
    }
}
