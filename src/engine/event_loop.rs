//! # The engine loop: sole owner and mutator of engine state.
//!
//! The loop serializes every state transition by selecting over four
//! sources, one event at a time:
//!
//! - **install tickets** from [`Engine::install`](crate::Engine::install),
//!   validated inline and answered through a oneshot reply;
//! - **started tickets** from drivers offering a freshly built worker;
//! - **stopped tickets** from drivers reporting a cycle's terminal outcome;
//! - **the shutdown token**, observed exactly once, after which every
//!   installed name is stopped and the loop drains reports until all
//!   entries are stopped.
//!
//! ## Rules
//! - Nothing outside this loop reads or writes `current`, the manifold
//!   registry, or the dependents index.
//! - At most one driver exists per name at any time; `starting` and a
//!   present worker are mutually exclusive.
//! - Once the shutdown token fires, no new drivers are launched.
//! - Ticket channels have rendezvous capacity: a driver's report is only
//!   ever parked momentarily, and the loop cannot exit while one is
//!   outstanding (an entry stays non-stopped until its report is consumed).

use std::collections::HashMap;
use std::mem;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::engine::core::FatalPredicate;
use crate::engine::deps::DependencyIndex;
use crate::engine::driver::Driver;
use crate::error::{EngineError, InstallError, WorkerError};
use crate::events::{Bus, Event, EventKind};
use crate::manifold::Manifold;
use crate::resources::{Resource, Resources};
use crate::worker::WorkerRef;

/// Asks the loop to install a manifold; the requester blocks on `reply`.
pub(crate) struct InstallTicket {
    pub(crate) name: String,
    pub(crate) manifold: Manifold,
    pub(crate) reply: oneshot::Sender<Result<(), InstallError>>,
}

/// A driver offering its freshly built worker.
pub(crate) struct StartedTicket {
    pub(crate) name: String,
    pub(crate) worker: WorkerRef,
}

/// A driver reporting the end of its cycle (`None` = clean exit).
pub(crate) struct StoppedTicket {
    pub(crate) name: String,
    pub(crate) error: Option<WorkerError>,
}

/// Per-name worker state.
///
/// `stopped` holds exactly when no driver is underway and no worker is
/// assigned; `stopping` means a termination request is in flight.
#[derive(Default)]
struct WorkerInfo {
    starting: bool,
    stopping: bool,
    worker: Option<WorkerRef>,
}

impl WorkerInfo {
    fn stopped(&self) -> bool {
        self.worker.is_none() && !self.starting
    }
}

pub(crate) struct EngineLoop {
    cfg: EngineConfig,
    is_fatal: FatalPredicate,
    bus: Bus,
    shutdown: CancellationToken,

    index: DependencyIndex,
    current: HashMap<String, WorkerInfo>,

    /// First captured terminal error (fatal worker error or protocol
    /// violation); `None` means a plain dying shutdown.
    terminal: Option<EngineError>,

    install_rx: mpsc::Receiver<InstallTicket>,
    started_rx: mpsc::Receiver<StartedTicket>,
    stopped_rx: mpsc::Receiver<StoppedTicket>,

    // Cloned into every driver; keeping one of each here also keeps the
    // receive sides open for the lifetime of the loop.
    started_tx: mpsc::Sender<StartedTicket>,
    stopped_tx: mpsc::Sender<StoppedTicket>,
}

impl EngineLoop {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        cfg: EngineConfig,
        is_fatal: FatalPredicate,
        bus: Bus,
        shutdown: CancellationToken,
        install_rx: mpsc::Receiver<InstallTicket>,
        started_tx: mpsc::Sender<StartedTicket>,
        started_rx: mpsc::Receiver<StartedTicket>,
        stopped_tx: mpsc::Sender<StoppedTicket>,
        stopped_rx: mpsc::Receiver<StoppedTicket>,
    ) -> Self {
        Self {
            cfg,
            is_fatal,
            bus,
            shutdown,
            index: DependencyIndex::new(),
            current: HashMap::new(),
            terminal: None,
            install_rx,
            started_rx,
            stopped_rx,
            started_tx,
            stopped_tx,
        }
    }

    /// Runs until the engine is dying and every entry is stopped; returns
    /// the terminal reason.
    pub(crate) async fn run(mut self) -> EngineError {
        let shutdown = self.shutdown.clone();
        let mut shutdown_armed = true;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled(), if shutdown_armed => {
                    shutdown_armed = false;
                    self.bus.publish(Event::now(EventKind::ShutdownRequested));
                    let names: Vec<String> = self.current.keys().cloned().collect();
                    for name in names {
                        self.stop(&name);
                    }
                }
                Some(ticket) = self.install_rx.recv() => {
                    let outcome = self.got_install(ticket.name, ticket.manifold);
                    let _ = ticket.reply.send(outcome);
                }
                Some(ticket) = self.started_rx.recv() => {
                    self.got_started(ticket.name, ticket.worker);
                }
                Some(ticket) = self.stopped_rx.recv() => {
                    self.got_stopped(ticket.name, ticket.error);
                }
            }

            if self.is_dying() && self.all_stopped() {
                let terminal = self.terminal.take().unwrap_or(EngineError::Dying);
                self.bus.publish(
                    Event::now(EventKind::EngineStopped).with_error(terminal.to_string()),
                );
                return terminal;
            }
        }
    }

    /// Validates and registers a manifold, then launches its first driver.
    fn got_install(&mut self, name: String, manifold: Manifold) -> Result<(), InstallError> {
        if self.index.contains(&name) {
            return Err(InstallError::AlreadyInstalled { name });
        }
        let mut seen = std::collections::HashSet::new();
        for input in manifold.inputs() {
            if !self.index.contains(input) {
                return Err(InstallError::UnknownInput {
                    name,
                    input: input.clone(),
                });
            }
            if !seen.insert(input.as_str()) {
                return Err(InstallError::DuplicateInput {
                    name,
                    input: input.clone(),
                });
            }
        }

        self.index.insert(name.clone(), manifold);
        self.current.insert(name.clone(), WorkerInfo::default());
        self.bus
            .publish(Event::now(EventKind::ManifoldInstalled).with_manifold(&name));
        self.start(&name, Duration::ZERO);
        Ok(())
    }

    /// Adopts a freshly reported worker, or kills it if it is no longer
    /// wanted.
    fn got_started(&mut self, name: String, worker: WorkerRef) {
        let dying = self.is_dying();
        let Some(info) = self.current.get_mut(&name) else {
            worker.kill();
            self.abort(EngineError::protocol(format!(
                "started ticket for unknown {name} manifold"
            )));
            return;
        };

        if info.worker.is_some() {
            // Two live workers for one name means a driver protocol breach.
            worker.kill();
            self.abort(EngineError::protocol(format!(
                "unexpected {name} manifold worker start"
            )));
        } else if info.stopping || dying {
            self.bus
                .publish(Event::now(EventKind::WorkerDiscarded).with_manifold(&name));
            worker.kill();
        } else {
            info.starting = false;
            info.worker = Some(worker);
            self.bus
                .publish(Event::now(EventKind::WorkerStarted).with_manifold(&name));
            self.bounce_dependents(&name);
        }
    }

    /// Processes the end of a driver cycle: classify the error, decide on a
    /// restart, and notify dependents if a running worker disappeared.
    fn got_stopped(&mut self, name: String, error: Option<WorkerError>) {
        match &error {
            Some(err) => self.bus.publish(
                Event::now(EventKind::WorkerFailed)
                    .with_manifold(&name)
                    .with_error(err.to_string()),
            ),
            None => self
                .bus
                .publish(Event::now(EventKind::WorkerStopped).with_manifold(&name)),
        }

        let Some(info) = self.current.get_mut(&name) else {
            self.abort(EngineError::protocol(format!(
                "stopped ticket for unknown {name} manifold"
            )));
            return;
        };
        if info.stopped() {
            self.abort(EngineError::protocol(format!(
                "unexpected {name} manifold worker stop"
            )));
            return;
        }

        let old = mem::take(info);

        if let Some(err) = &error {
            if (self.is_fatal)(err) {
                self.abort(EngineError::Fatal(err.clone()));
                return;
            }
        }

        if error.is_some() {
            // Something went wrong, but we don't much care what. Try again
            // in a bit.
            self.start(&name, self.cfg.error_delay);
        } else if old.stopping {
            // We told it to stop because its dependencies changed; start it
            // again promptly.
            self.start(&name, self.cfg.bounce_delay);
        }
        // A clean, unprompted exit means the worker finished its job; it
        // stays parked until one of its inputs changes.

        // Dependents only need to know if a running worker went away; if
        // none was assigned, nothing they could observe has changed.
        if old.worker.is_some() {
            self.bounce_dependents(&name);
        }
    }

    /// Launches a driver for `name` after `delay`.
    ///
    /// No-op during shutdown. Preconditions (installed manifold, stopped
    /// entry) failing indicate an engine bug and abort with a diagnostic.
    fn start(&mut self, name: &str, delay: Duration) {
        if self.is_dying() {
            return;
        }
        let Some(manifold) = self.index.manifold(name) else {
            self.abort(EngineError::protocol(format!(
                "attempt to start unknown {name} manifold worker"
            )));
            return;
        };
        let manifold = manifold.clone();
        let resources = self.capture_resources(&manifold);

        match self.current.get_mut(name) {
            Some(info) if info.stopped() => info.starting = true,
            _ => {
                self.abort(EngineError::protocol(format!(
                    "attempt to start a second {name} manifold worker"
                )));
                return;
            }
        }

        let driver = Driver {
            name: name.to_string(),
            start: manifold.start_fn(),
            resources,
            delay,
            shutdown: self.shutdown.clone(),
            started_tx: self.started_tx.clone(),
            stopped_tx: self.stopped_tx.clone(),
            bus: self.bus.clone(),
        };
        tokio::spawn(driver.run());
    }

    /// Asks `name` to terminate soon; the stopped ticket arrives later.
    fn stop(&mut self, name: &str) {
        let Some(info) = self.current.get_mut(name) else {
            return;
        };
        if info.stopping || info.stopped() {
            return;
        }
        info.stopping = true;
        if let Some(worker) = &info.worker {
            worker.kill();
        }
    }

    /// Starts every stopped dependent of `name` and stops every started one
    /// (trusting the stop path to restart them). The rule is uniform
    /// whether `name` just appeared or just disappeared: dependents must
    /// reconsult their snapshot either way.
    fn bounce_dependents(&mut self, name: &str) {
        let dependents: Vec<String> = self.index.dependents_of(name).to_vec();
        for dependent in dependents {
            let stopped = self
                .current
                .get(&dependent)
                .map(WorkerInfo::stopped)
                .unwrap_or(false);
            if stopped {
                self.start(&dependent, self.cfg.bounce_delay);
            } else {
                self.stop(&dependent);
            }
        }
    }

    /// Freezes each declared input's output function and current worker.
    fn capture_resources(&self, manifold: &Manifold) -> Resources {
        let mut entries = HashMap::new();
        for input in manifold.inputs() {
            let output = self.index.manifold(input).and_then(|m| m.output_fn());
            let worker = self
                .current
                .get(input)
                .and_then(|info| info.worker.clone());
            entries.insert(input.clone(), Resource { output, worker });
        }
        Resources::new(entries)
    }

    /// Records the first terminal error and triggers shutdown.
    fn abort(&mut self, error: EngineError) {
        if self.terminal.is_none() {
            self.terminal = Some(error);
        }
        self.shutdown.cancel();
    }

    fn is_dying(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn all_stopped(&self) -> bool {
        self.current.values().all(WorkerInfo::stopped)
    }
}
