/// Sizing knobs for a freshly constructed [`crate::GraphStore`].
///
/// Following the workspace convention of a small config struct ahead of a
/// constructed component: `GraphStore::new` takes this by value instead of a
/// growing list of positional arguments.
#[derive(Copy, Clone, Debug)]
pub struct GraphStoreConfig {
    /// Initial estimate of the number of vertices the graph will hold.
    /// Used to presize the vertex table, coordinate table, edge arena
    /// (at `3 * initial_vertex_estimate` edge slots), and payload arena.
    pub initial_vertex_estimate: usize,
    /// Fixed increment by which the vertex table grows when exhausted.
    pub vertex_growth_increment: usize,
    /// Fixed increment (in edge *slots*, always a multiple of 4) by which
    /// the edge arena grows when exhausted.
    pub edge_slot_growth_increment: usize,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        GraphStoreConfig {
            initial_vertex_estimate: 1000,
            vertex_growth_increment: 10_000,
            edge_slot_growth_increment: 10_000,
        }
    }
}
