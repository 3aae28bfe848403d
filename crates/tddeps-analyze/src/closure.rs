//! Incremental transitive closure with cycle collapsing.
//!
//! Nodes are dense indices. Every processed node owns a record; records are
//! kept in a union-find so that all members of a strongly connected component
//! end up sharing one record. A record's member set is everything reachable
//! from its owners, which includes the owners themselves exactly when they
//! lie on a cycle.
//!
//! Files are processed one at a time in discovery order. A dependency that is
//! not processed yet is added as a provisional member; when it is processed
//! later its reachable set is pushed into every record holding it, tracked
//! through the `holders` back-references.

use std::collections::HashSet;

use thiserror::Error;

/// Violations of the engine's invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClosureError {
    /// A node was processed twice.
    #[error("node {0} processed twice")]
    AlreadyProcessed(usize),

    /// A node that is not on a cycle reached itself.
    #[error("node {0} reaches itself without a cycle")]
    SelfDependency(usize),
}

#[derive(Debug, Default)]
struct Record {
    /// Reachable nodes.
    members: HashSet<usize>,
    /// Processed nodes sharing this record.
    owners: Vec<usize>,
}

/// Union-find over per-component reachability records.
#[derive(Debug, Default)]
pub struct ClosureEngine {
    /// Record of each processed node.
    record_of: Vec<Option<usize>>,
    /// Union-find parent per record.
    parent: Vec<usize>,
    /// Record payloads; only canonical records are kept up to date.
    records: Vec<Record>,
    /// Records that contain each node.
    holders: Vec<HashSet<usize>>,
}

impl ClosureEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes known to the engine.
    pub fn len(&self) -> usize {
        self.record_of.len()
    }

    /// Whether no node is known.
    pub fn is_empty(&self) -> bool {
        self.record_of.is_empty()
    }

    /// Whether `node` has been processed.
    pub fn is_processed(&self, node: usize) -> bool {
        self.record_of.get(node).is_some_and(Option::is_some)
    }

    /// Process `node` with its direct dependencies.
    pub fn process(&mut self, node: usize, deps: &[usize]) -> Result<(), ClosureError> {
        self.ensure(node);
        for &dep in deps {
            self.ensure(dep);
        }
        if self.is_processed(node) {
            return Err(ClosureError::AlreadyProcessed(node));
        }

        let rec = self.records.len();
        self.records.push(Record {
            members: HashSet::new(),
            owners: vec![node],
        });
        self.parent.push(rec);
        self.record_of[node] = Some(rec);

        // Direct dependencies plus everything already known to be below them.
        for &dep in deps {
            self.add_member(rec, dep);
            if let Some(dep_rec) = self.canonical_record(dep)
                && dep_rec != rec
            {
                let below: Vec<usize> = self.records[dep_rec].members.iter().copied().collect();
                for member in below {
                    self.add_member(rec, member);
                }
            }
        }

        // Collapse closed cycles: a record holding `node` whose owner is
        // reachable from `node` belongs to the same component.
        let rec = self.collapse_cycles(node, rec);

        // Push the result into every other record that reaches `node`.
        let members: Vec<usize> = self.records[rec].members.iter().copied().collect();
        for holder in self.canonical_holders(node) {
            if holder == rec {
                continue;
            }
            for &member in &members {
                self.add_member(holder, member);
            }
        }

        let record = &self.records[rec];
        if record.members.contains(&node) && record.owners.len() == 1 && !deps.contains(&node) {
            return Err(ClosureError::SelfDependency(node));
        }
        Ok(())
    }

    /// Nodes reachable from `node`, excluding `node` itself.
    ///
    /// Unprocessed nodes and placeholders have an empty closure.
    pub fn closure(&self, node: usize) -> Vec<usize> {
        match self.canonical_record(node) {
            Some(rec) => {
                let mut out: Vec<usize> = self.records[rec]
                    .members
                    .iter()
                    .copied()
                    .filter(|&m| m != node)
                    .collect();
                out.sort_unstable();
                out
            }
            None => Vec::new(),
        }
    }

    /// Full member set of `node`'s record: the closure, plus `node` when it
    /// lies on a cycle. Identical for all members of one component.
    pub fn component_key(&self, node: usize) -> Vec<usize> {
        match self.canonical_record(node) {
            Some(rec) => {
                let record = &self.records[rec];
                // A lone owner only reaches itself through a self-include.
                let solo = record.owners.len() == 1;
                let mut out: Vec<usize> = record
                    .members
                    .iter()
                    .copied()
                    .filter(|&m| !(solo && m == node))
                    .collect();
                out.sort_unstable();
                out
            }
            None => Vec::new(),
        }
    }

    /// Whether two processed nodes share a record.
    pub fn same_component(&self, a: usize, b: usize) -> bool {
        match (self.canonical_record(a), self.canonical_record(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    fn ensure(&mut self, node: usize) {
        if node >= self.record_of.len() {
            self.record_of.resize(node + 1, None);
            self.holders.resize_with(node + 1, HashSet::new);
        }
    }

    fn find(&self, mut rec: usize) -> usize {
        while self.parent[rec] != rec {
            rec = self.parent[rec];
        }
        rec
    }

    fn canonical_record(&self, node: usize) -> Option<usize> {
        self.record_of.get(node).copied().flatten().map(|r| self.find(r))
    }

    fn canonical_holders(&self, node: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self.holders[node].iter().map(|&h| self.find(h)).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn add_member(&mut self, rec: usize, member: usize) {
        if self.records[rec].members.insert(member) {
            self.holders[member].insert(rec);
        }
    }

    fn collapse_cycles(&mut self, node: usize, mut rec: usize) -> usize {
        loop {
            let cyclic: Vec<usize> = self
                .canonical_holders(node)
                .into_iter()
                .filter(|&h| h != rec)
                .filter(|&h| {
                    self.records[h]
                        .owners
                        .iter()
                        .any(|owner| self.records[rec].members.contains(owner))
                })
                .collect();
            if cyclic.is_empty() {
                return rec;
            }
            for other in cyclic {
                rec = self.union(rec, other);
            }
        }
    }

    /// Merge two canonical records, returning the surviving one.
    fn union(&mut self, a: usize, b: usize) -> usize {
        let (keep, gone) = if self.records[a].members.len() >= self.records[b].members.len() {
            (a, b)
        } else {
            (b, a)
        };
        self.parent[gone] = keep;

        let moved = std::mem::take(&mut self.records[gone]);
        for member in moved.members {
            self.add_member(keep, member);
        }
        self.records[keep].owners.extend(moved.owners);
        keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: usize = 0;
    const B: usize = 1;
    const C: usize = 2;
    const D: usize = 3;
    const E: usize = 4;

    #[test]
    fn test_chain_forward_order() {
        // a -> b -> c, processed leaves first.
        let mut engine = ClosureEngine::new();
        engine.process(C, &[]).unwrap();
        engine.process(B, &[C]).unwrap();
        engine.process(A, &[B]).unwrap();

        assert_eq!(engine.closure(A), vec![B, C]);
        assert_eq!(engine.closure(B), vec![C]);
        assert!(engine.closure(C).is_empty());
    }

    #[test]
    fn test_chain_reverse_order() {
        // a -> b -> c, processed roots first: back-references fill in later.
        let mut engine = ClosureEngine::new();
        engine.process(A, &[B]).unwrap();
        engine.process(B, &[C]).unwrap();
        assert_eq!(engine.closure(A), vec![B, C]);

        engine.process(C, &[D]).unwrap();
        assert_eq!(engine.closure(A), vec![B, C, D]);
        assert_eq!(engine.closure(B), vec![C, D]);
    }

    #[test]
    fn test_self_include_keeps_plain_key() {
        let mut engine = ClosureEngine::new();
        engine.process(A, &[A, C]).unwrap();
        engine.process(B, &[C]).unwrap();
        engine.process(C, &[]).unwrap();

        assert_eq!(engine.closure(A), vec![C]);
        assert_eq!(engine.component_key(A), vec![C]);
        assert_eq!(engine.component_key(A), engine.component_key(B));
    }

    #[test]
    fn test_two_cycle() {
        let mut engine = ClosureEngine::new();
        engine.process(A, &[B]).unwrap();
        engine.process(B, &[A]).unwrap();
        engine.process(C, &[]).unwrap();

        assert_eq!(engine.closure(A), vec![B]);
        assert_eq!(engine.closure(B), vec![A]);
        assert!(engine.closure(C).is_empty());
        assert!(engine.same_component(A, B));
        assert_eq!(engine.component_key(A), engine.component_key(B));
        assert_ne!(engine.component_key(A), engine.component_key(C));
    }

    #[test]
    fn test_three_cycle_with_tail() {
        // a -> b -> c -> a, c -> d; e -> a.
        let mut engine = ClosureEngine::new();
        engine.process(E, &[A]).unwrap();
        engine.process(A, &[B]).unwrap();
        engine.process(B, &[C]).unwrap();
        engine.process(C, &[A, D]).unwrap();

        assert_eq!(engine.closure(A), vec![B, C, D]);
        assert_eq!(engine.closure(B), vec![A, C, D]);
        assert_eq!(engine.closure(C), vec![A, B, D]);
        assert_eq!(engine.closure(E), vec![A, B, C, D]);
        assert!(!engine.closure(E).contains(&E));
    }

    #[test]
    fn test_cycle_closed_by_middle_node() {
        // Cycle a -> b -> c -> a where b is processed last.
        let mut engine = ClosureEngine::new();
        engine.process(A, &[B]).unwrap();
        engine.process(C, &[A]).unwrap();
        engine.process(B, &[C]).unwrap();

        for node in [A, B, C] {
            assert_eq!(engine.closure(node).len(), 2);
        }
        assert!(engine.same_component(A, C));
    }

    #[test]
    fn test_self_include() {
        let mut engine = ClosureEngine::new();
        engine.process(A, &[A, B]).unwrap();
        assert_eq!(engine.closure(A), vec![B]);
    }

    #[test]
    fn test_already_processed() {
        let mut engine = ClosureEngine::new();
        engine.process(A, &[]).unwrap();
        assert_eq!(engine.process(A, &[B]), Err(ClosureError::AlreadyProcessed(A)));
    }

    #[test]
    fn test_placeholders_are_leaves() {
        let mut engine = ClosureEngine::new();
        engine.process(A, &[D]).unwrap();
        assert!(!engine.is_processed(D));
        assert!(engine.closure(D).is_empty());
        assert_eq!(engine.closure(A), vec![D]);
    }
}
