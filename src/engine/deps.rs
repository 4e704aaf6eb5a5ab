//! # Dependency index over installed manifolds.
//!
//! Keeps the manifold registry together with the transpose of its Inputs
//! relation, so the loop can answer "who depends on this?" in one lookup.
//!
//! Invariant: `dependents` is exactly the transpose of the Inputs relation
//! over `manifolds`. Both maps grow together in [`DependencyIndex::insert`]
//! and are never mutated elsewhere; manifolds are not removable.

use std::collections::HashMap;

use crate::manifold::Manifold;

/// Bidirectional view of the installed dependency graph.
///
/// The graph is acyclic by construction: installation requires every input
/// to be present already, so no edge can ever point forward.
#[derive(Default)]
pub(crate) struct DependencyIndex {
    /// Installed manifolds by name.
    manifolds: HashMap<String, Manifold>,
    /// For each name, the names that declare it as an input.
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// True if a manifold with this name is installed.
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.manifolds.contains_key(name)
    }

    /// Returns the named manifold, if installed.
    pub(crate) fn manifold(&self, name: &str) -> Option<&Manifold> {
        self.manifolds.get(name)
    }

    /// Registers a validated manifold and extends the transpose for each of
    /// its inputs.
    ///
    /// The caller must have checked that `name` is new and every input is
    /// already installed.
    pub(crate) fn insert(&mut self, name: String, manifold: Manifold) {
        for input in manifold.inputs() {
            self.dependents
                .entry(input.clone())
                .or_default()
                .push(name.clone());
        }
        self.manifolds.insert(name, manifold);
    }

    /// Names that declared `name` as an input, in installation order.
    pub(crate) fn dependents_of(&self, name: &str) -> &[String] {
        self.dependents.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::FnWorker;

    fn leaf() -> Manifold {
        Manifold::new(Vec::<String>::new(), |_| async {
            Ok(FnWorker::spawn(|_| async { Ok(()) }))
        })
    }

    fn depending_on<const N: usize>(inputs: [&str; N]) -> Manifold {
        Manifold::new(inputs, |_| async {
            Ok(FnWorker::spawn(|_| async { Ok(()) }))
        })
    }

    #[tokio::test]
    async fn insert_registers_the_manifold() {
        let mut index = DependencyIndex::new();
        assert!(!index.contains("a"));

        index.insert("a".into(), leaf());
        assert!(index.contains("a"));
        assert!(index.manifold("a").is_some());
        assert!(index.dependents_of("a").is_empty());
    }

    #[tokio::test]
    async fn dependents_are_the_transpose_of_inputs() {
        let mut index = DependencyIndex::new();
        index.insert("a".into(), leaf());
        index.insert("b".into(), depending_on(["a"]));
        index.insert("c".into(), depending_on(["a", "b"]));

        assert_eq!(index.dependents_of("a"), ["b", "c"]);
        assert_eq!(index.dependents_of("b"), ["c"]);
        assert!(index.dependents_of("c").is_empty());
    }
}
