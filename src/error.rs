use crate::vertex_id::VertexId;

/// Failure modes surfaced by [`crate::GraphStore`].
///
/// All variants abort the single operation that raised them. `OutOfRange`
/// and `InvalidArgument` leave the graph unchanged; `CorruptGraph` leaves it
/// in whatever partially-unlinked state the failing operation observed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("vertex {vertex_id} is out of range")]
    OutOfRange { vertex_id: VertexId },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("graph is corrupt: edge {u}-{w} is reachable from {u} but not from {w}")]
    CorruptGraph { u: VertexId, w: VertexId },
}
