use anyhow::Result;

use crate::{Triple, TripleStore};

/// Build a [`Triple`] from string slices, for use in tests
pub fn make_triple(subject: &str, predicate: &str, object: &str) -> Result<Triple> {
    Ok(Triple::parse(subject, predicate, object)?)
}

/// Build a [`Triple`] for every consecutive pair of `nodes`, all sharing
/// `predicate` (`a -> b -> c` for `["a", "b", "c"]`), for use in tests
pub fn make_chain(predicate: &str, nodes: &[&str]) -> Result<Vec<Triple>> {
    nodes
        .windows(2)
        .map(|pair| make_triple(pair[0], predicate, pair[1]))
        .collect()
}

/// Creates an unbounded [`TripleStore`] already holding `triples`, for use in
/// tests
pub fn make_store(triples: &[(&str, &str, &str)]) -> Result<TripleStore> {
    let store = TripleStore::default();
    let batch = triples
        .iter()
        .map(|(s, p, o)| make_triple(s, p, o))
        .collect::<Result<Vec<_>>>()?;
    store.ingest(batch)?;
    Ok(store)
}
