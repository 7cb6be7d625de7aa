use std::{collections::HashMap, sync::Arc};

use indexmap::{IndexSet, set::Iter};

use crate::{Identifier, Triple, TripleSelector};

#[cfg(doc)]
use crate::TripleStore;

/// The set of [`Triple`]s that share one index key, in insertion order.
type Bucket = IndexSet<Arc<Triple>>;

/// An index from one position of a [`Triple`] to every [`Triple`] that
/// carries that identifier in the position.
type Index = HashMap<Identifier, Bucket>;

/// A [`Graph`] is one version of the provenance graph. Every [`Triple`] is
/// allocated once and referenced from the insertion-ordered triple set as
/// well as from the subject, predicate and object indexes.
///
/// A [`Graph`] handed out by [`TripleStore::snapshot`] is never mutated:
/// the store applies the next batch to its own copy and publishes that copy
/// whole.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    triples: Bucket,
    subject_index: Index,
    predicate_index: Index,
    object_index: Index,
    version: u64,
}

impl Graph {
    /// The number of [`Triple`]s in the graph
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// True when the graph holds no [`Triple`]s
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// The version of this graph; every batch applied by a [`TripleStore`]
    /// produces a graph with a greater version
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the exact [`Triple`] is present
    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    /// Whether the identifier appears as the subject or the object of any
    /// [`Triple`], i.e. whether it is a node of the graph
    pub fn contains_identifier(&self, identifier: &str) -> bool {
        self.subject_index.contains_key(identifier) || self.object_index.contains_key(identifier)
    }

    /// Every distinct predicate used by the graph
    pub fn predicates(&self) -> impl Iterator<Item = &Identifier> {
        self.predicate_index.keys()
    }

    /// The [`Triple`]s whose subject is `node`, i.e. its outgoing edges
    pub fn outgoing(&self, node: &str) -> impl Iterator<Item = &Arc<Triple>> {
        self.subject_index
            .get(node)
            .into_iter()
            .flat_map(|bucket| bucket.iter())
    }

    /// Lazily select the [`Triple`]s that match the selector, in insertion
    /// order.
    ///
    /// A fully bound selector is a hash lookup. Otherwise the smallest index
    /// bucket among the bound positions is scanned and the remaining bound
    /// positions are checked against each candidate. An unbound selector
    /// scans the whole graph.
    pub fn select(&self, selector: &TripleSelector) -> Matches<'_> {
        if let Some(triple) = selector.as_triple() {
            return Matches {
                candidates: Candidates::Single(self.triples.get(&triple)),
                selector: selector.clone(),
            };
        }

        let buckets = [
            selector
                .subject
                .as_ref()
                .map(|subject| self.subject_index.get(subject)),
            selector
                .predicate
                .as_ref()
                .map(|predicate| self.predicate_index.get(predicate)),
            selector
                .object
                .as_ref()
                .map(|object| self.object_index.get(object)),
        ];

        let mut smallest: Option<&Bucket> = None;

        for bucket in buckets.into_iter().flatten() {
            let Some(bucket) = bucket else {
                // A bound position with no index entry cannot match anything
                return Matches {
                    candidates: Candidates::Empty,
                    selector: selector.clone(),
                };
            };

            if smallest.is_none_or(|current| bucket.len() < current.len()) {
                smallest = Some(bucket);
            }
        }

        Matches {
            candidates: Candidates::Scan(smallest.unwrap_or(&self.triples).iter()),
            selector: selector.clone(),
        }
    }

    /// Add a [`Triple`]; returns false if it was already present
    pub(crate) fn assert(&mut self, triple: Triple) -> bool {
        if self.triples.contains(&triple) {
            return false;
        }

        let triple = Arc::new(triple);

        self.subject_index
            .entry(triple.subject.clone())
            .or_default()
            .insert(triple.clone());
        self.predicate_index
            .entry(triple.predicate.clone())
            .or_default()
            .insert(triple.clone());
        self.object_index
            .entry(triple.object.clone())
            .or_default()
            .insert(triple.clone());
        self.triples.insert(triple);

        true
    }

    /// Remove a [`Triple`]; returns false if it was not present
    pub(crate) fn retract(&mut self, triple: &Triple) -> bool {
        if !self.triples.shift_remove(triple) {
            return false;
        }

        unindex(&mut self.subject_index, &triple.subject, triple);
        unindex(&mut self.predicate_index, &triple.predicate, triple);
        unindex(&mut self.object_index, &triple.object, triple);

        true
    }

    pub(crate) fn advance(&mut self) {
        self.version += 1;
    }
}

fn unindex(index: &mut Index, key: &Identifier, triple: &Triple) {
    if let Some(bucket) = index.get_mut(key) {
        bucket.shift_remove(triple);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}

enum Candidates<'a> {
    Empty,
    Single(Option<&'a Arc<Triple>>),
    Scan(Iter<'a, Arc<Triple>>),
}

/// The lazy sequence of [`Triple`]s produced by [`Graph::select`]
pub struct Matches<'a> {
    candidates: Candidates<'a>,
    selector: TripleSelector,
}

impl<'a> Iterator for Matches<'a> {
    type Item = &'a Arc<Triple>;

    fn next(&mut self) -> Option<Self::Item> {
        let Matches {
            candidates,
            selector,
        } = self;

        match candidates {
            Candidates::Empty => None,
            Candidates::Single(triple) => triple.take(),
            Candidates::Scan(iter) => iter.by_ref().find(|triple| selector.matches(triple)),
        }
    }
}
