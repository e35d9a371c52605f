/// Decides whether a rediscovered edge's payload should be overwritten by a
/// new [`crate::GraphStore::add_edge`] call.
///
/// Absence of a comparator (the two-argument `add_edge` overload) means
/// unconditional overwrite. When a comparator is present, only payloads it
/// judges to overlap the existing one overwrite; non-overlapping duplicates
/// are silently ignored (neither overwritten nor inserted as a second edge,
/// since this graph forbids multi-graphs).
pub trait EdgeComparator<P> {
    /// `true` if `candidate` overlaps `existing` and should replace it.
    fn overlaps(&self, candidate: &P, existing: &P) -> bool;
}

impl<P, F> EdgeComparator<P> for F
where
    F: Fn(&P, &P) -> bool,
{
    fn overlaps(&self, candidate: &P, existing: &P) -> bool {
        self(candidate, existing)
    }
}
