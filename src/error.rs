//! # Error types used by the engine and by worker activities.
//!
//! This module defines three enums:
//!
//! - [`InstallError`] validation failures returned synchronously from
//!   [`Engine::install`](crate::Engine::install).
//! - [`WorkerError`] the terminal error of a worker activity (or of a start
//!   function that failed to produce one).
//! - [`EngineError`] the engine's own termination reason, yielded by
//!   [`Engine::wait`](crate::Engine::wait).
//!
//! All types provide `as_label()` helpers for logs/metrics.

use thiserror::Error;

/// # Errors returned from manifold installation.
///
/// Installation is validated inline by the engine loop; on failure the
/// engine state is unchanged.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    /// A manifold with this name is already installed.
    #[error("{name} manifold already installed")]
    AlreadyInstalled {
        /// The duplicate manifold name.
        name: String,
    },
    /// The manifold declares an input that is not installed yet.
    ///
    /// Inputs must be installed before their dependents; this rule is what
    /// keeps the dependency graph acyclic.
    #[error("{name} manifold depends on unknown {input} manifold")]
    UnknownInput {
        /// The manifold being installed.
        name: String,
        /// The missing input name.
        input: String,
    },
    /// The manifold declares the same input more than once.
    #[error("{name} manifold declares duplicate {input} input")]
    DuplicateInput {
        /// The manifold being installed.
        name: String,
        /// The repeated input name.
        input: String,
    },
    /// The engine has already been asked to shut down.
    #[error("engine is shutting down")]
    ShuttingDown,
}

impl InstallError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            InstallError::AlreadyInstalled { .. } => "install_already_installed",
            InstallError::UnknownInput { .. } => "install_unknown_input",
            InstallError::DuplicateInput { .. } => "install_duplicate_input",
            InstallError::ShuttingDown => "install_shutting_down",
        }
    }
}

/// # Terminal error of a worker activity.
///
/// Produced either by a start function that failed to construct a worker, or
/// by the worker's own `wait`. The engine never interprets the contents; it
/// only passes each error through the caller-supplied fatal predicate.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// The activity failed for a worker-specific reason.
    #[error("{reason}")]
    Failed {
        /// Human-readable failure description.
        reason: String,
    },
    /// The activity was abandoned because the engine is shutting down.
    ///
    /// Reported by a driver whose start delay or worker handover was
    /// interrupted by the shutdown token.
    #[error("engine is shutting down")]
    Dying,
}

impl WorkerError {
    /// Creates a [`WorkerError::Failed`] from any displayable reason.
    pub fn failed(reason: impl Into<String>) -> Self {
        WorkerError::Failed {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Failed { .. } => "worker_failed",
            WorkerError::Dying => "worker_dying",
        }
    }
}

/// # The engine's termination reason.
///
/// [`Engine::wait`](crate::Engine::wait) yields exactly one of these once
/// the loop has exited and every worker has reported back.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Normal shutdown: the engine was killed and wound down cleanly.
    #[error("engine is shutting down")]
    Dying,
    /// A worker's terminal error satisfied the fatal predicate.
    #[error("{0}")]
    Fatal(WorkerError),
    /// An internal invariant was breached; this is a bug, not an
    /// operational failure.
    #[error("engine protocol violation: {reason}")]
    Protocol {
        /// Diagnostic description of the breach.
        reason: String,
    },
}

impl EngineError {
    pub(crate) fn protocol(reason: impl Into<String>) -> Self {
        EngineError::Protocol {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::Dying => "engine_dying",
            EngineError::Fatal(_) => "engine_fatal",
            EngineError::Protocol { .. } => "engine_protocol",
        }
    }
}
