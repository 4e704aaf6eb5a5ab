//! Engine scenario tests.
//!
//! Delay-sensitive cases run under `start_paused` so sleeps auto-advance;
//! rendezvous ordering is exercised through the event stream.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::{self, timeout, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::{EngineError, InstallError, WorkerError};
use crate::events::{Event, EventKind};
use crate::manifold::Manifold;
use crate::worker::{FnWorker, Worker, WorkerRef};

const PATIENCE: Duration = Duration::from_secs(5);

fn never_fatal(_err: &WorkerError) -> bool {
    false
}

/// A worker that runs until killed.
fn idle_worker() -> WorkerRef {
    FnWorker::spawn(|token: CancellationToken| async move {
        token.cancelled().await;
        Ok(())
    })
}

/// A worker that immediately finishes its job.
fn done_worker() -> WorkerRef {
    FnWorker::spawn(|_token| async { Ok(()) })
}

fn leaf() -> Manifold {
    Manifold::new(Vec::<String>::new(), |_resources| async { Ok(idle_worker()) })
}

fn depending_on<const N: usize>(inputs: [&str; N]) -> Manifold {
    Manifold::new(inputs, |_resources| async { Ok(idle_worker()) })
}

/// Collects the event kinds of one manifold until its worker has been
/// adopted `until_started` times.
async fn lifecycle_of(
    rx: &mut broadcast::Receiver<Event>,
    name: &str,
    until_started: usize,
) -> Vec<EventKind> {
    timeout(PATIENCE, async {
        let mut kinds = Vec::new();
        let mut started = 0;
        while started < until_started {
            let ev = rx.recv().await.expect("event stream closed");
            if ev.manifold.as_deref() != Some(name) {
                continue;
            }
            kinds.push(ev.kind);
            if ev.kind == EventKind::WorkerStarted {
                started += 1;
            }
        }
        kinds
    })
    .await
    .expect("timed out collecting lifecycle events")
}

async fn expect_event(rx: &mut broadcast::Receiver<Event>, kind: EventKind, name: &str) {
    timeout(PATIENCE, async {
        loop {
            let ev = rx.recv().await.expect("event stream closed");
            if ev.kind == kind && ev.manifold.as_deref() == Some(name) {
                return;
            }
        }
    })
    .await
    .expect("timed out waiting for event");
}

#[tokio::test]
async fn install_requires_inputs_before_dependents() {
    let engine = Engine::new(EngineConfig::default(), never_fatal);

    let err = engine
        .install("B", depending_on(["A"]))
        .await
        .expect_err("B must be rejected before A exists");
    assert_eq!(err.to_string(), "B manifold depends on unknown A manifold");

    engine.install("A", leaf()).await.expect("A installs");
    engine
        .install("B", depending_on(["A"]))
        .await
        .expect("B installs once A exists");

    engine.kill();
    assert_eq!(engine.wait().await, EngineError::Dying);
}

#[tokio::test]
async fn duplicate_names_and_inputs_are_rejected() {
    let engine = Engine::new(EngineConfig::default(), never_fatal);

    engine.install("A", leaf()).await.expect("A installs");
    let err = engine
        .install("A", leaf())
        .await
        .expect_err("second A must be rejected");
    assert_eq!(err.to_string(), "A manifold already installed");

    let err = engine
        .install("B", depending_on(["A", "A"]))
        .await
        .expect_err("duplicate inputs must be rejected");
    assert_eq!(
        err,
        InstallError::DuplicateInput {
            name: "B".into(),
            input: "A".into(),
        }
    );

    engine.kill();
    engine.wait().await;
}

#[tokio::test]
async fn install_after_kill_is_rejected() {
    let engine = Engine::new(EngineConfig::default(), never_fatal);
    engine.kill();
    let err = engine
        .install("A", leaf())
        .await
        .expect_err("install after kill must fail");
    assert_eq!(err, InstallError::ShuttingDown);
    assert_eq!(engine.wait().await, EngineError::Dying);
}

#[tokio::test(start_paused = true)]
async fn dependent_bounces_when_its_input_starts() {
    let engine = Engine::new(EngineConfig::default(), never_fatal);
    let mut events = engine.events();

    // A takes 50ms to come up.
    engine
        .install(
            "A",
            Manifold::new(Vec::<String>::new(), |_resources| async {
                time::sleep(Duration::from_millis(50)).await;
                Ok(idle_worker())
            }),
        )
        .await
        .expect("A installs");

    // B records whether it saw A's worker on each start; without A it does
    // what little it can and exits cleanly.
    let observations = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&observations);
    engine
        .install(
            "B",
            Manifold::new(["A"], move |resources| {
                let seen = Arc::clone(&seen);
                async move {
                    let up = resources.get("A", None);
                    seen.lock().unwrap().push(up);
                    if up {
                        Ok(idle_worker())
                    } else {
                        Ok(done_worker())
                    }
                }
            }),
        )
        .await
        .expect("B installs");

    let kinds = lifecycle_of(&mut events, "B", 2).await;
    assert_eq!(
        kinds,
        [
            EventKind::ManifoldInstalled,
            EventKind::StartScheduled,
            EventKind::WorkerStarting,
            EventKind::WorkerStarted,
            EventKind::WorkerStopped,
            EventKind::StartScheduled,
            EventKind::WorkerStarting,
            EventKind::WorkerStarted,
        ]
    );
    assert_eq!(*observations.lock().unwrap(), [false, true]);

    engine.kill();
    assert_eq!(engine.wait().await, EngineError::Dying);
}

#[tokio::test(start_paused = true)]
async fn fatal_worker_error_stops_the_engine() {
    let engine = Engine::new(EngineConfig::default(), |err: &WorkerError| {
        matches!(err, WorkerError::Failed { reason } if reason == "boom")
    });

    // A bystander that observes its own kill.
    let killed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&killed);
    engine
        .install(
            "C",
            Manifold::new(Vec::<String>::new(), move |_resources| {
                let flag = Arc::clone(&flag);
                async move {
                    Ok(FnWorker::spawn(move |token: CancellationToken| async move {
                        token.cancelled().await;
                        flag.store(true, Ordering::SeqCst);
                        Ok(())
                    }))
                }
            }),
        )
        .await
        .expect("C installs");

    engine
        .install(
            "A",
            Manifold::new(Vec::<String>::new(), |_resources| async {
                Ok(FnWorker::spawn(|_token| async {
                    Err(WorkerError::failed("boom"))
                }))
            }),
        )
        .await
        .expect("A installs");

    let terminal = timeout(PATIENCE, engine.wait())
        .await
        .expect("engine must stop in bounded time");
    assert_eq!(terminal, EngineError::Fatal(WorkerError::failed("boom")));
    assert!(killed.load(Ordering::SeqCst), "bystander must be killed");
}

#[tokio::test(start_paused = true)]
async fn recoverable_failure_restarts_after_error_delay() {
    let cfg = EngineConfig {
        error_delay: Duration::from_millis(100),
        ..EngineConfig::default()
    };
    let engine = Engine::new(cfg, never_fatal);

    let starts = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&starts);
    engine
        .install(
            "A",
            Manifold::new(Vec::<String>::new(), move |_resources| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push(Instant::now());
                    Ok(FnWorker::spawn(|_token| async {
                        Err(WorkerError::failed("transient"))
                    }))
                }
            }),
        )
        .await
        .expect("A installs");

    timeout(PATIENCE, async {
        while starts.lock().unwrap().len() < 3 {
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("A must keep restarting");

    let starts = starts.lock().unwrap();
    for pair in starts.windows(2) {
        assert!(
            pair[1] - pair[0] >= Duration::from_millis(100),
            "restarts must back off by error_delay"
        );
    }
    drop(starts);

    engine.kill();
    assert_eq!(engine.wait().await, EngineError::Dying);
}

#[tokio::test(start_paused = true)]
async fn clean_exit_parks_until_inputs_change() {
    let engine = Engine::new(EngineConfig::default(), never_fatal);
    let mut events = engine.events();

    let a_starts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&a_starts);
    engine
        .install(
            "A",
            Manifold::new(Vec::<String>::new(), move |_resources| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(done_worker()) }
            }),
        )
        .await
        .expect("A installs");
    expect_event(&mut events, EventKind::WorkerStopped, "A").await;

    // New dependents extend the graph but never revive a worker that
    // finished its job.
    engine
        .install("B", depending_on(["A"]))
        .await
        .expect("B installs");
    engine
        .install("C", depending_on(["A"]))
        .await
        .expect("C installs");

    time::sleep(Duration::from_millis(500)).await;
    assert_eq!(a_starts.load(Ordering::SeqCst), 1, "A must stay parked");

    engine.kill();
    assert_eq!(engine.wait().await, EngineError::Dying);
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_a_slow_start() {
    let engine = Engine::new(EngineConfig::default(), never_fatal);

    engine
        .install(
            "A",
            Manifold::new(Vec::<String>::new(), |_resources| async {
                time::sleep(Duration::from_millis(500)).await;
                Ok(idle_worker())
            }),
        )
        .await
        .expect("A installs");

    engine.kill();
    let terminal = timeout(PATIENCE, engine.wait())
        .await
        .expect("engine must stop in bounded time");
    assert_eq!(terminal, EngineError::Dying);
}

/// A worker carrying state its manifold projects to dependents.
struct CounterWorker {
    inner: WorkerRef,
    value: Arc<AtomicU64>,
}

#[async_trait]
impl Worker for CounterWorker {
    fn kill(&self) {
        self.inner.kill();
    }

    async fn wait(&self) -> Result<(), WorkerError> {
        self.inner.wait().await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[tokio::test(start_paused = true)]
async fn output_projection_reaches_dependents() {
    let engine = Engine::new(EngineConfig::default(), never_fatal);

    engine
        .install(
            "counter",
            Manifold::new(Vec::<String>::new(), |_resources| async {
                let value = Arc::new(AtomicU64::new(7));
                Ok(Arc::new(CounterWorker {
                    inner: idle_worker(),
                    value,
                }) as WorkerRef)
            })
            .with_output(|worker, slot| {
                let Some(counter) = worker.as_any().downcast_ref::<CounterWorker>() else {
                    return false;
                };
                match slot.downcast_mut::<Option<Arc<AtomicU64>>>() {
                    Some(place) => {
                        *place = Some(Arc::clone(&counter.value));
                        true
                    }
                    None => false,
                }
            }),
        )
        .await
        .expect("counter installs");

    let read = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&read);
    engine
        .install(
            "reader",
            Manifold::new(["counter"], move |resources| {
                let sink = Arc::clone(&sink);
                async move {
                    let mut slot: Option<Arc<AtomicU64>> = None;
                    if !resources.get("counter", Some(&mut slot)) {
                        // Counter not up yet; wait to be bounced.
                        return Ok(done_worker());
                    }
                    let value = slot.expect("projection fills the slot");
                    *sink.lock().unwrap() = Some(value.load(Ordering::SeqCst));
                    Ok(idle_worker())
                }
            }),
        )
        .await
        .expect("reader installs");

    timeout(PATIENCE, async {
        loop {
            if read.lock().unwrap().is_some() {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("reader must eventually see the projection");
    assert_eq!(*read.lock().unwrap(), Some(7));

    engine.kill();
    assert_eq!(engine.wait().await, EngineError::Dying);
}
