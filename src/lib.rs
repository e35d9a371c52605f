//! An in-memory dynamic undirected graph with directional edge payloads,
//! implemented as an intrusive doubly-threaded adjacency list over parallel
//! flat arrays.
//!
//! The graph is algorithm-agnostic: it stores vertex coordinates and
//! per-edge payloads and exposes a read/write/compaction contract. Path
//! search, edge interpretation, and serialization live outside this crate.

pub mod comparator;
pub mod config;
pub mod error;
pub mod payload;
pub mod store;
pub mod vertex_id;

pub use comparator::EdgeComparator;
pub use config::GraphStoreConfig;
pub use error::GraphError;
pub use payload::Payload;
pub use store::GraphStore;
pub use vertex_id::VertexId;
