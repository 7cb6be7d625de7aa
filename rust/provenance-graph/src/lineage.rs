use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;

use crate::{Deadline, Graph, Identifier, ProvenanceGraphError};

/// How many node expansions happen between deadline checks
const DEADLINE_STRIDE: usize = 64;

/// [`Lineage`] answers reachability questions over one [`Graph`] snapshot.
///
/// Edges run from the subject of a [`crate::Triple`] to its object. A path
/// always has at least one edge: a node does not reach itself unless there
/// is a cycle (or a self-loop) back to it. Traversal is breadth-first with a
/// visited set, so cyclic graphs terminate, and every query stops early with
/// [`ProvenanceGraphError::Timeout`] once the [`Deadline`] has passed.
pub struct Lineage<'a> {
    graph: &'a Graph,
    deadline: Deadline,
}

impl<'a> Lineage<'a> {
    /// Query `graph`, giving up once `deadline` passes
    pub fn new(graph: &'a Graph, deadline: Deadline) -> Self {
        Self { graph, deadline }
    }

    /// The [`Graph`] being queried
    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    /// Whether `to` can be reached from `from` by following one or more
    /// edges labelled `via`
    pub fn reachable(&self, from: &str, via: &str, to: &str) -> Result<bool, ProvenanceGraphError> {
        Ok(self.path(from, via, to)?.is_some())
    }

    /// Whether `to` can be reached from `from` by following one or more
    /// edges labelled with any of `via`
    pub fn reachable_any(
        &self,
        from: &str,
        via: &[Identifier],
        to: &str,
    ) -> Result<bool, ProvenanceGraphError> {
        Ok(self.path_any(from, via, to)?.is_some())
    }

    /// A shortest witnessing path from `from` to `to` over edges labelled
    /// `via`, listing every node including both ends
    pub fn path(
        &self,
        from: &str,
        via: &str,
        to: &str,
    ) -> Result<Option<Vec<Identifier>>, ProvenanceGraphError> {
        self.search(from, to, |predicate| predicate.as_str() == via)
    }

    /// A shortest witnessing path from `from` to `to` over edges labelled
    /// with any of `via`
    pub fn path_any(
        &self,
        from: &str,
        via: &[Identifier],
        to: &str,
    ) -> Result<Option<Vec<Identifier>>, ProvenanceGraphError> {
        if via.is_empty() {
            return Ok(None);
        }

        let allowed: HashSet<&str> = via.iter().map(Identifier::as_str).collect();
        self.search(from, to, |predicate| allowed.contains(predicate.as_str()))
    }

    /// A witnessing path from `from` to `to` whose n-th edge is labelled with
    /// the n-th predicate of `sequence`. An empty sequence never matches.
    pub fn follows(
        &self,
        from: &str,
        sequence: &[Identifier],
        to: &str,
    ) -> Result<Option<Vec<Identifier>>, ProvenanceGraphError> {
        let Some(origin) = self.origin(from) else {
            return Ok(None);
        };

        if sequence.is_empty() {
            return Ok(None);
        }

        let mut frontier: IndexMap<Identifier, Vec<Identifier>> =
            IndexMap::from([(origin.clone(), vec![origin])]);
        let mut expanded = 0usize;

        for predicate in sequence {
            let mut next: IndexMap<Identifier, Vec<Identifier>> = IndexMap::new();

            for (node, path) in &frontier {
                if expanded % DEADLINE_STRIDE == 0 {
                    self.deadline.check(expanded)?;
                }
                expanded += 1;

                for edge in self.graph.outgoing(node) {
                    if edge.predicate != *predicate || next.contains_key(&edge.object) {
                        continue;
                    }

                    let mut extended = path.clone();
                    extended.push(edge.object.clone());
                    next.insert(edge.object.clone(), extended);
                }
            }

            if next.is_empty() {
                return Ok(None);
            }

            frontier = next;
        }

        Ok(frontier.swap_remove(to))
    }

    /// The graph's own copy of `node`, if it has any outgoing edge
    fn origin(&self, node: &str) -> Option<Identifier> {
        self.graph
            .outgoing(node)
            .next()
            .map(|edge| edge.subject.clone())
    }

    fn search<F>(
        &self,
        from: &str,
        to: &str,
        allowed: F,
    ) -> Result<Option<Vec<Identifier>>, ProvenanceGraphError>
    where
        F: Fn(&Identifier) -> bool,
    {
        let Some(origin) = self.origin(from) else {
            return Ok(None);
        };

        let mut parents: HashMap<Identifier, Identifier> = HashMap::new();
        let mut visited: HashSet<Identifier> = HashSet::from([origin.clone()]);
        let mut queue: VecDeque<Identifier> = VecDeque::from([origin.clone()]);
        let mut expanded = 0usize;

        while let Some(node) = queue.pop_front() {
            if expanded % DEADLINE_STRIDE == 0 {
                self.deadline.check(visited.len())?;
            }
            expanded += 1;

            for edge in self.graph.outgoing(&node) {
                if !allowed(&edge.predicate) {
                    continue;
                }

                // Checked before the visited set so that a cycle back to the
                // origin still counts as a path to it
                if edge.object.as_str() == to {
                    return Ok(Some(trace(&parents, &origin, &node, &edge.object)));
                }

                if visited.insert(edge.object.clone()) {
                    parents.insert(edge.object.clone(), node.clone());
                    queue.push_back(edge.object.clone());
                }
            }
        }

        Ok(None)
    }
}

fn trace(
    parents: &HashMap<Identifier, Identifier>,
    origin: &Identifier,
    last: &Identifier,
    to: &Identifier,
) -> Vec<Identifier> {
    let mut path = vec![to.clone(), last.clone()];
    let mut node = last;

    while node != origin {
        let Some(parent) = parents.get(node) else {
            break;
        };
        path.push(parent.clone());
        node = parent;
    }

    path.reverse();
    path
}
