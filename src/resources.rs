//! # The frozen dependency view handed to start functions.
//!
//! [`Resources`] is a snapshot, captured by the loop at driver launch time,
//! of each declared input's output projection and running worker. Snapshotting
//! sidesteps the lost-update race between a dependent consulting its
//! dependencies and a dependency being bounced in parallel: if the view turns
//! out stale, the start function returns a degenerate worker that exits
//! cleanly, and the ensuing bounce restarts it against a fresh snapshot.

use std::any::Any;
use std::collections::HashMap;

use crate::manifold::OutputFn;
use crate::worker::WorkerRef;

/// One input's share of the snapshot.
#[derive(Clone)]
pub(crate) struct Resource {
    pub(crate) output: Option<OutputFn>,
    pub(crate) worker: Option<WorkerRef>,
}

/// # Resource accessor over a launch-time snapshot.
///
/// Passed by value to a manifold's start function, which may consult it any
/// number of times during its own execution but must not retain it after
/// returning.
#[derive(Clone, Default)]
pub struct Resources {
    entries: HashMap<String, Resource>,
}

impl Resources {
    pub(crate) fn new(entries: HashMap<String, Resource>) -> Self {
        Self { entries }
    }

    /// Projects the named input into `out`.
    ///
    /// Returns:
    /// - `false` if the input had no running worker at snapshot time (or is
    ///   not a declared input at all);
    /// - `true`, leaving the slot untouched, if `out` is `None` and the
    ///   input declares no output projection;
    /// - otherwise, whatever the input's output function reports after
    ///   populating the slot. Asking for no projection from an input that
    ///   defines one is a failure condition (`false`), as is a slot of the
    ///   wrong type.
    pub fn get(&self, name: &str, out: Option<&mut dyn Any>) -> bool {
        let Some(resource) = self.entries.get(name) else {
            return false;
        };
        let Some(worker) = &resource.worker else {
            return false;
        };
        match &resource.output {
            None => out.is_none(),
            Some(project) => match out {
                Some(slot) => project(worker, slot),
                None => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::manifold::Manifold;
    use crate::worker::FnWorker;

    fn snapshot_with(name: &str, resource: Resource) -> Resources {
        let mut entries = HashMap::new();
        entries.insert(name.to_string(), resource);
        Resources::new(entries)
    }

    #[tokio::test]
    async fn missing_worker_reports_false() {
        let snap = snapshot_with(
            "db",
            Resource {
                output: None,
                worker: None,
            },
        );
        assert!(!snap.get("db", None));
        assert!(!snap.get("unheard-of", None));
    }

    #[tokio::test]
    async fn running_worker_without_projection_satisfies_presence_check() {
        let worker = FnWorker::spawn(|_| async { Ok(()) });
        let snap = snapshot_with(
            "db",
            Resource {
                output: None,
                worker: Some(worker),
            },
        );
        assert!(snap.get("db", None));

        // A slot cannot be filled when the input projects nothing.
        let mut slot: Option<u32> = None;
        assert!(!snap.get("db", Some(&mut slot)));
        assert_eq!(slot, None);
    }

    #[tokio::test]
    async fn projection_populates_a_typed_slot() {
        let manifold = Manifold::new(Vec::<String>::new(), |_resources| async {
            Ok(FnWorker::spawn(|_| async { Ok(()) }))
        })
        .with_output(|worker, slot| {
            // Projection sees the concrete worker type.
            if worker.as_any().downcast_ref::<FnWorker>().is_none() {
                return false;
            }
            match slot.downcast_mut::<Option<u64>>() {
                Some(place) => {
                    *place = Some(42);
                    true
                }
                None => false,
            }
        });

        let worker = FnWorker::spawn(|_| async { Ok(()) });
        let snap = snapshot_with(
            "counter",
            Resource {
                output: manifold.output_fn(),
                worker: Some(Arc::clone(&worker)),
            },
        );

        let mut slot: Option<u64> = None;
        assert!(snap.get("counter", Some(&mut slot)));
        assert_eq!(slot, Some(42));

        // Wrong slot type propagates as a failure condition.
        let mut wrong: Option<String> = None;
        assert!(!snap.get("counter", Some(&mut wrong)));

        // Absent slot against a declared projection is a caller error.
        assert!(!snap.get("counter", None));
        worker.kill();
    }
}
