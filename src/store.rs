use geo_types::Coord;
use log::{debug, info};

use crate::comparator::EdgeComparator;
use crate::config::GraphStoreConfig;
use crate::error::GraphError;
use crate::payload::Payload;
use crate::vertex_id::VertexId;

/// Sentinel marking "no such edge", used both as a vertex's empty head and
/// as a thread's terminating next-pointer.
const NONE: u32 = u32::MAX;

/// Which of an edge record's two endpoint slots a given vertex occupies.
/// Determines which `next` pointer belongs to that vertex's adjacency
/// thread.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Which {
    A,
    B,
}

/// A single cell of the edge arena: an unordered pair of endpoints plus the
/// two next-pointers threading this record through both endpoints'
/// adjacency lists. One record occupies one index in `edges`/`payloads`
/// (the spec's raw 4-slot-per-record arena collapses to a single struct
/// here; see `DESIGN.md`).
#[derive(Copy, Clone, Debug)]
struct EdgeRecord {
    node_a: u32,
    node_b: u32,
    next_a: u32,
    next_b: u32,
}

impl EdgeRecord {
    fn empty() -> Self {
        EdgeRecord {
            node_a: NONE,
            node_b: NONE,
            next_a: NONE,
            next_b: NONE,
        }
    }

    fn is_live(&self) -> bool {
        self.node_a != NONE
    }

    fn which_for(&self, v: u32) -> Which {
        if self.node_a == v {
            Which::A
        } else {
            Which::B
        }
    }

    fn other(&self, v: u32) -> u32 {
        if self.node_a == v {
            self.node_b
        } else {
            self.node_a
        }
    }

    fn next(&self, which: Which) -> u32 {
        match which {
            Which::A => self.next_a,
            Which::B => self.next_b,
        }
    }

    fn set_next(&mut self, which: Which, value: u32) {
        match which {
            Which::A => self.next_a = value,
            Which::B => self.next_b = value,
        }
    }
}

/// An in-memory undirected graph with directional edge payloads, backed by
/// an intrusive doubly-threaded adjacency list over parallel flat arrays.
///
/// See the crate documentation for the invariants this structure
/// maintains. `GraphStore` is single-writer: all operations assume
/// exclusive access by the caller, and concurrent mutation is undefined
/// behavior.
pub struct GraphStore<P> {
    vertex_heads: Vec<u32>,
    coordinates: Vec<Coord<f32>>,
    edges: Vec<EdgeRecord>,
    payloads: Vec<Option<P>>,
    next_vertex_id: u32,
    next_edge_slot: usize,
    vertex_growth_increment: usize,
    edge_slot_growth_increment: usize,
}

impl<P: Payload> GraphStore<P> {
    /// Builds an empty store sized according to `config`.
    pub fn new(config: GraphStoreConfig) -> Self {
        let s = config.initial_vertex_estimate;
        let edge_capacity = 3 * s;
        info!(
            "allocating graph store: {} vertices, {} edge slots",
            s, edge_capacity
        );
        GraphStore {
            vertex_heads: vec![NONE; s],
            coordinates: vec![Coord { x: 0.0, y: 0.0 }; s],
            edges: vec![EdgeRecord::empty(); edge_capacity],
            payloads: (0..edge_capacity).map(|_| None).collect(),
            next_vertex_id: 1,
            next_edge_slot: 0,
            vertex_growth_increment: config.vertex_growth_increment,
            edge_slot_growth_increment: config.edge_slot_growth_increment,
        }
    }

    /// Number of vertices currently addressable (`next_vertex_id - 1`).
    pub fn vertex_count(&self) -> u32 {
        self.next_vertex_id - 1
    }

    fn check_vertex(&self, v: VertexId) -> Result<(), GraphError> {
        if v.0 >= self.next_vertex_id {
            Err(GraphError::OutOfRange { vertex_id: v })
        } else {
            Ok(())
        }
    }

    fn grow_vertex_tables(&mut self) {
        let old_len = self.vertex_heads.len();
        let new_len = old_len + self.vertex_growth_increment;
        debug!("growing vertex tables from {} to {}", old_len, new_len);
        self.vertex_heads.resize(new_len, NONE);
        self.coordinates.resize(new_len, Coord { x: 0.0, y: 0.0 });
    }

    fn grow_edge_arena(&mut self) {
        let old_len = self.edges.len();
        let new_len = old_len + self.edge_slot_growth_increment;
        debug!("growing edge arena from {} to {}", old_len, new_len);
        self.edges.resize(new_len, EdgeRecord::empty());
        self.payloads.resize_with(new_len, || None);
    }

    /// Adds a new vertex at `(lat, lon)` and returns its freshly assigned,
    /// strictly-increasing id.
    pub fn add_vertex(&mut self, lat: f32, lon: f32) -> VertexId {
        if self.next_vertex_id as usize >= self.vertex_heads.len() {
            self.grow_vertex_tables();
        }
        let id = self.next_vertex_id;
        self.coordinates[id as usize] = Coord { x: lon, y: lat };
        self.next_vertex_id += 1;
        VertexId(id)
    }

    /// Overwrites the coordinate of an existing vertex.
    pub fn set_vertex(&mut self, v: VertexId, lat: f32, lon: f32) -> Result<(), GraphError> {
        self.check_vertex(v)?;
        self.coordinates[v.index()] = Coord { x: lon, y: lat };
        Ok(())
    }

    /// Returns `(lat, lon)` for `v`, or `None` if `v` was never assigned.
    pub fn get_vertex(&self, v: VertexId) -> Option<(f32, f32)> {
        if v.0 < self.next_vertex_id {
            let c = self.coordinates[v.index()];
            Some((c.y, c.x))
        } else {
            None
        }
    }

    /// Inserts the edge `{u, w}` if absent, overwriting any existing
    /// payload unconditionally.
    pub fn add_edge(&mut self, u: VertexId, w: VertexId, payload: P) -> Result<(), GraphError> {
        self.add_edge_impl(u, w, payload, None)
    }

    /// Inserts the edge `{u, w}` if absent. If present, `comparator`
    /// decides whether the new payload overwrites the existing one; a
    /// non-overlapping duplicate is silently ignored.
    pub fn add_edge_with_comparator<C: EdgeComparator<P>>(
        &mut self,
        u: VertexId,
        w: VertexId,
        payload: P,
        comparator: &C,
    ) -> Result<(), GraphError> {
        self.add_edge_impl(u, w, payload, Some(comparator))
    }

    fn add_edge_impl(
        &mut self,
        u: VertexId,
        w: VertexId,
        payload: P,
        comparator: Option<&dyn EdgeComparator<P>>,
    ) -> Result<(), GraphError> {
        if u == w {
            return Err(GraphError::InvalidArgument(format!(
                "self-loop at vertex {u} is not permitted"
            )));
        }
        if !payload.is_forward() {
            return Err(GraphError::InvalidArgument(
                "payload passed to add_edge must be in forward orientation".to_string(),
            ));
        }
        self.check_vertex(u)?;
        self.check_vertex(w)?;

        // Scan u's thread for an existing edge to w, remembering the tail
        // (the last u-successor slot) in case we need to append.
        let mut cursor = self.vertex_heads[u.index()];
        let mut tail_u: Option<(usize, Which)> = None;
        while cursor != NONE {
            let idx = cursor as usize;
            let rec = self.edges[idx];
            let which_u = rec.which_for(u.0);
            if rec.other(u.0) == w.0 {
                let reversed = which_u == Which::B;
                let candidate = if reversed { payload.reverse() } else { payload };
                let overwrite = match comparator {
                    None => true,
                    Some(cmp) => {
                        let existing = self.payloads[idx]
                            .as_ref()
                            .expect("live edge record must carry a payload");
                        cmp.overlaps(&candidate, existing)
                    }
                };
                if overwrite {
                    self.payloads[idx] = Some(candidate);
                }
                return Ok(());
            }
            tail_u = Some((idx, which_u));
            cursor = rec.next(which_u);
        }

        // Not found: allocate a new record.
        if self.next_edge_slot >= self.edges.len() {
            self.grow_edge_arena();
        }
        let new_idx = self.next_edge_slot;
        self.edges[new_idx] = EdgeRecord {
            node_a: u.0,
            node_b: w.0,
            next_a: NONE,
            next_b: NONE,
        };
        self.payloads[new_idx] = Some(payload);
        self.next_edge_slot += 1;

        // Link into u's thread.
        match tail_u {
            None => self.vertex_heads[u.index()] = new_idx as u32,
            Some((idx, which)) => self.edges[idx].set_next(which, new_idx as u32),
        }

        // Link into w's thread by walking to its tail independently.
        let mut cursor_w = self.vertex_heads[w.index()];
        if cursor_w == NONE {
            self.vertex_heads[w.index()] = new_idx as u32;
        } else {
            loop {
                let idx = cursor_w as usize;
                let rec = self.edges[idx];
                let which_w = rec.which_for(w.0);
                let next = rec.next(which_w);
                if next == NONE {
                    self.edges[idx].set_next(which_w, new_idx as u32);
                    break;
                }
                cursor_w = next;
            }
        }

        Ok(())
    }

    /// Unlinks the edge record reachable from `at` whose other endpoint is
    /// `target`, relinking `at`'s thread around it. Returns the record's
    /// index if one was found.
    fn unlink_from_thread(&mut self, at: VertexId, target: VertexId) -> Option<usize> {
        let mut prev: Option<(usize, Which)> = None;
        let mut cursor = self.vertex_heads[at.index()];
        while cursor != NONE {
            let idx = cursor as usize;
            let rec = self.edges[idx];
            let which = rec.which_for(at.0);
            let next = rec.next(which);
            if rec.other(at.0) == target.0 {
                match prev {
                    None => self.vertex_heads[at.index()] = next,
                    Some((pidx, pwhich)) => self.edges[pidx].set_next(pwhich, next),
                }
                return Some(idx);
            }
            prev = Some((idx, which));
            cursor = next;
        }
        None
    }

    /// Removes the edge `{u, w}` if present. A no-op if either vertex has
    /// no incident edges, or if `{u, w}` does not exist.
    pub fn remove_edge(&mut self, u: VertexId, w: VertexId) -> Result<(), GraphError> {
        self.check_vertex(u)?;
        self.check_vertex(w)?;
        if self.vertex_heads[u.index()] == NONE || self.vertex_heads[w.index()] == NONE {
            return Ok(());
        }
        let Some(idx) = self.unlink_from_thread(u, w) else {
            return Ok(());
        };
        if self.unlink_from_thread(w, u).is_none() {
            return Err(GraphError::CorruptGraph { u, w });
        }
        self.edges[idx] = EdgeRecord::empty();
        self.payloads[idx] = None;
        Ok(())
    }

    /// Removes every edge incident to `v`.
    pub fn remove_edges(&mut self, v: VertexId) -> Result<(), GraphError> {
        self.check_vertex(v)?;
        let neighbors: Vec<VertexId> = self.get_edges(v)?.into_iter().map(|(n, _)| n).collect();
        for n in neighbors {
            self.remove_edge(v, n)?;
        }
        Ok(())
    }

    /// Returns `(neighbor, payload)` pairs for every edge incident to `v`,
    /// in the order they were linked into `v`'s thread. Payloads are
    /// normalized to read as "from `v`".
    pub fn get_edges(&self, v: VertexId) -> Result<Vec<(VertexId, P)>, GraphError> {
        self.check_vertex(v)?;
        let mut result = Vec::new();
        let mut cursor = self.vertex_heads[v.index()];
        while cursor != NONE {
            let idx = cursor as usize;
            let rec = self.edges[idx];
            let which = rec.which_for(v.0);
            let payload = self.payloads[idx]
                .clone()
                .expect("live edge record must carry a payload");
            match which {
                Which::A => result.push((VertexId(rec.node_b), payload)),
                Which::B => result.push((VertexId(rec.node_a), payload.reverse())),
            }
            cursor = rec.next(which);
        }
        Ok(result)
    }

    /// `true` iff `{u, w}` exists.
    pub fn contains_edge(&self, u: VertexId, w: VertexId) -> Result<bool, GraphError> {
        self.check_vertex(u)?;
        self.check_vertex(w)?;
        let mut cursor = self.vertex_heads[u.index()];
        while cursor != NONE {
            let rec = self.edges[cursor as usize];
            if rec.other(u.0) == w.0 {
                return Ok(true);
            }
            cursor = rec.next(rec.which_for(u.0));
        }
        Ok(false)
    }

    /// Returns the payload of `{u, w}` normalized to read "from `u`", or
    /// `None` if the edge does not exist.
    pub fn get_edge(&self, u: VertexId, w: VertexId) -> Result<Option<P>, GraphError> {
        self.check_vertex(u)?;
        self.check_vertex(w)?;
        let mut cursor = self.vertex_heads[u.index()];
        while cursor != NONE {
            let idx = cursor as usize;
            let rec = self.edges[idx];
            let which = rec.which_for(u.0);
            if rec.other(u.0) == w.0 {
                let payload = self.payloads[idx]
                    .clone()
                    .expect("live edge record must carry a payload");
                return Ok(Some(if which == Which::B {
                    payload.reverse()
                } else {
                    payload
                }));
            }
            cursor = rec.next(which);
        }
        Ok(None)
    }

    /// Shrinks the backing arrays to exactly their live high-water marks.
    /// Performs no re-indexing.
    pub fn trim(&mut self) {
        let vertex_len = self.next_vertex_id as usize;
        info!(
            "trimming graph store: vertices {} -> {}, edge slots {} -> {}",
            self.vertex_heads.len(),
            vertex_len,
            self.edges.len(),
            self.next_edge_slot
        );
        self.vertex_heads.truncate(vertex_len);
        self.vertex_heads.shrink_to_fit();
        self.coordinates.truncate(vertex_len);
        self.coordinates.shrink_to_fit();
        self.edges.truncate(self.next_edge_slot);
        self.edges.shrink_to_fit();
        self.payloads.truncate(self.next_edge_slot);
        self.payloads.shrink_to_fit();
    }

    /// Packs live edge records into the low end of the arena, rewriting
    /// every reference to a moved record, then reclaims a trailing prefix
    /// of isolated vertices. Interior isolated vertices keep their ids.
    pub fn compress(&mut self) {
        let mut fill = 0usize;
        for e in 0..self.next_edge_slot {
            if self.edges[e].is_live() {
                if e != fill {
                    self.move_edge(e, fill);
                }
                fill += 1;
            }
        }
        let reclaimed_edges = self.next_edge_slot - fill;
        self.next_edge_slot = fill;

        let mut last_used: u32 = 0;
        for v in 1..self.next_vertex_id {
            if self.vertex_heads[v as usize] != NONE {
                last_used = v;
            }
        }
        let reclaimed_vertices = self.next_vertex_id - (last_used + 1);
        self.next_vertex_id = last_used + 1;

        info!(
            "compressed graph store: reclaimed {} edge slots, {} trailing vertices",
            reclaimed_edges, reclaimed_vertices
        );
    }

    /// Relocates the live record at `old` to `new` (`new < old`), rewriting
    /// the single reference to `old` held by each endpoint's thread.
    fn move_edge(&mut self, old: usize, new: usize) {
        let rec = self.edges[old];
        self.edges[new] = rec;
        self.payloads[new] = self.payloads[old].take();

        for v in [rec.node_a, rec.node_b] {
            if self.vertex_heads[v as usize] == old as u32 {
                self.vertex_heads[v as usize] = new as u32;
                continue;
            }
            let mut cursor = self.vertex_heads[v as usize];
            loop {
                let idx = cursor as usize;
                let r = self.edges[idx];
                let which = r.which_for(v);
                let next = r.next(which);
                if next == old as u32 {
                    self.edges[idx].set_next(which, new as u32);
                    break;
                }
                cursor = next;
            }
        }

        self.edges[old] = EdgeRecord::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq)]
    struct TestPayload {
        forward: bool,
        tag: i32,
    }

    impl TestPayload {
        fn forward(tag: i32) -> Self {
            TestPayload { forward: true, tag }
        }
    }

    impl Payload for TestPayload {
        fn is_forward(&self) -> bool {
            self.forward
        }

        fn reverse(&self) -> Self {
            TestPayload {
                forward: !self.forward,
                tag: -self.tag,
            }
        }
    }

    fn small_store() -> GraphStore<TestPayload> {
        GraphStore::new(GraphStoreConfig {
            initial_vertex_estimate: 4,
            vertex_growth_increment: 4,
            edge_slot_growth_increment: 4,
        })
    }

    fn neighbor_ids(store: &GraphStore<TestPayload>, v: VertexId) -> Vec<u32> {
        let mut ids: Vec<u32> = store
            .get_edges(v)
            .unwrap()
            .into_iter()
            .map(|(n, _)| n.0)
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn triangle() {
        let mut g = small_store();
        let a = g.add_vertex(1.0, 1.0);
        let b = g.add_vertex(2.0, 2.0);
        let c = g.add_vertex(3.0, 3.0);
        assert_eq!((a.0, b.0, c.0), (1, 2, 3));

        let p = TestPayload::forward(7);
        g.add_edge(a, b, p).unwrap();
        g.add_edge(b, c, p).unwrap();
        g.add_edge(a, c, p).unwrap();

        assert_eq!(g.vertex_count(), 3);
        assert_eq!(neighbor_ids(&g, a), vec![2, 3]);
        assert_eq!(g.get_edge(c, a).unwrap(), Some(p.reverse()));
    }

    #[test]
    fn overwrite_without_comparator() {
        let mut g = small_store();
        let a = g.add_vertex(0.0, 0.0);
        let b = g.add_vertex(0.0, 0.0);
        g.add_edge(a, b, TestPayload::forward(1)).unwrap();
        g.add_edge(a, b, TestPayload::forward(2)).unwrap();
        assert_eq!(g.get_edge(a, b).unwrap(), Some(TestPayload::forward(2)));
    }

    #[test]
    fn overwrite_with_non_overlapping_comparator_is_ignored() {
        let mut g = small_store();
        let a = g.add_vertex(0.0, 0.0);
        let b = g.add_vertex(0.0, 0.0);
        g.add_edge(a, b, TestPayload::forward(1)).unwrap();
        let never_overlaps = |_: &TestPayload, _: &TestPayload| false;
        g.add_edge_with_comparator(a, b, TestPayload::forward(2), &never_overlaps)
            .unwrap();
        assert_eq!(g.get_edge(a, b).unwrap(), Some(TestPayload::forward(1)));
    }

    #[test]
    fn overwrite_with_overlapping_comparator() {
        let mut g = small_store();
        let a = g.add_vertex(0.0, 0.0);
        let b = g.add_vertex(0.0, 0.0);
        g.add_edge(a, b, TestPayload::forward(1)).unwrap();
        let always_overlaps = |_: &TestPayload, _: &TestPayload| true;
        g.add_edge_with_comparator(a, b, TestPayload::forward(2), &always_overlaps)
            .unwrap();
        assert_eq!(g.get_edge(a, b).unwrap(), Some(TestPayload::forward(2)));
    }

    #[test]
    fn remove_middle_edge() {
        let mut g = small_store();
        let a = g.add_vertex(0.0, 0.0);
        let b = g.add_vertex(0.0, 0.0);
        let c = g.add_vertex(0.0, 0.0);
        let p = TestPayload::forward(1);
        g.add_edge(a, b, p).unwrap();
        g.add_edge(b, c, p).unwrap();
        g.add_edge(a, c, p).unwrap();

        g.remove_edge(b, c).unwrap();

        assert!(!g.contains_edge(b, c).unwrap());
        assert!(g.contains_edge(a, b).unwrap());
        assert!(g.contains_edge(a, c).unwrap());
        assert_eq!(neighbor_ids(&g, b), vec![a.0]);
    }

    #[test]
    fn compaction_after_fragmentation() {
        let mut g = small_store();
        let ids: Vec<VertexId> = (0..5).map(|_| g.add_vertex(0.0, 0.0)).collect();
        let p = TestPayload::forward(1);
        for pair in ids.windows(2) {
            g.add_edge(pair[0], pair[1], p).unwrap();
        }

        g.remove_edge(ids[1], ids[2]).unwrap();
        g.remove_edge(ids[2], ids[3]).unwrap();

        let before: Vec<Vec<u32>> = ids.iter().map(|&v| neighbor_ids(&g, v)).collect();
        let live_edges = 2usize; // the first and last links of the chain survive

        g.compress();

        let after: Vec<Vec<u32>> = ids.iter().map(|&v| neighbor_ids(&g, v)).collect();
        assert_eq!(before, after);

        g.trim();
        assert_eq!(g.edges.len(), live_edges);
        assert_eq!(g.payloads.len(), live_edges);
    }

    #[test]
    fn out_of_range_vertex_leaves_graph_unchanged() {
        let mut g = small_store();
        let a = g.add_vertex(0.0, 0.0);
        let missing = VertexId(a.0 + 1);

        let err = g.add_edge(a, missing, TestPayload::forward(1)).unwrap_err();
        assert_eq!(
            err,
            GraphError::OutOfRange {
                vertex_id: missing
            }
        );
        assert!(!g.contains_edge(a, missing).is_ok_and(|found| found));
    }

    #[test]
    fn self_loop_is_rejected() {
        let mut g = small_store();
        let a = g.add_vertex(0.0, 0.0);
        let err = g.add_edge(a, a, TestPayload::forward(1)).unwrap_err();
        assert_eq!(err, GraphError::InvalidArgument(format!("self-loop at vertex {a} is not permitted")));
    }

    #[test]
    fn reverse_payload_is_rejected_as_input() {
        let mut g = small_store();
        let a = g.add_vertex(0.0, 0.0);
        let b = g.add_vertex(0.0, 0.0);
        let reversed = TestPayload::forward(1).reverse();
        assert!(g.add_edge(a, b, reversed).is_err());
    }

    #[test]
    fn remove_then_add_restores_observational_state() {
        let mut g = small_store();
        let a = g.add_vertex(0.0, 0.0);
        let b = g.add_vertex(0.0, 0.0);
        let before = neighbor_ids(&g, a);

        g.add_edge(a, b, TestPayload::forward(9)).unwrap();
        g.remove_edge(a, b).unwrap();

        assert_eq!(neighbor_ids(&g, a), before);
        assert_eq!(neighbor_ids(&g, b), Vec::<u32>::new());
    }
}
