use crate::Id;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RingError {
    /// Identifier width is not supported.
    #[error("Unsupported identifier width: {0} bits")]
    InvalidBits(u32),

    /// Node with the same identifier is already registered.
    #[error("Node {0} already exists")]
    DuplicateNode(Id),

    /// Identifier does not fit into the identifier space.
    #[error("Identifier {id} is outside of [0, {size})")]
    IdOutOfRange { id: Id, size: u64 },

    /// Node is not (or no longer) part of the ring.
    #[error("Unknown node: {0}")]
    UnknownNode(Id),

    /// Node has not joined a ring yet.
    ///
    /// Reaching this is a caller bug: every operation except `join` requires
    /// an attached node.
    #[error("Node {0} has not joined a ring")]
    Detached(Id),

    /// Routing gave up after visiting as many hops as there are identifiers.
    #[error("No route to {target} after {hops} hops")]
    NoRoute { target: Id, hops: usize },
}

pub type RingResult<T> = Result<T, RingError>;
