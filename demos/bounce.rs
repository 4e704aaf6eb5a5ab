//! # Dependency bounce in action
//!
//! Demonstrates the core supervision loop:
//! - A "source" worker that takes a moment to come up and exposes a counter
//! - A "reporter" that depends on it and prints the projected value
//! - The reporter's first start sees nothing, exits cleanly, and is bounced
//!   once the source is running
//!
//! Run with: `cargo run --example bounce --features logging`

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use manifold::{
    Engine, EngineBuilder, EngineConfig, FnWorker, LogWriter, Manifold, Worker, WorkerError,
    WorkerRef,
};

/// Source worker: ticks a counter until killed.
struct SourceWorker {
    inner: WorkerRef,
    counter: Arc<AtomicU64>,
}

#[async_trait]
impl Worker for SourceWorker {
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

fn source_manifold() -> Manifold {
    Manifold::new(Vec::<String>::new(), |_resources| async {
        // Simulate slow startup so the reporter's first snapshot is empty.
        tokio::time::sleep(Duration::from_millis(300)).await;

        let counter = Arc::new(AtomicU64::new(0));
        let ticks = Arc::clone(&counter);
        let inner = FnWorker::spawn(move |token: CancellationToken| async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(Duration::from_millis(250)) => {
                        ticks.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        });
        Ok(Arc::new(SourceWorker { inner, counter }) as WorkerRef)
    })
    .with_output(|worker, slot| {
        let Some(source) = worker.as_any().downcast_ref::<SourceWorker>() else {
            return false;
        };
        match slot.downcast_mut::<Option<Arc<AtomicU64>>>() {
            Some(place) => {
                *place = Some(Arc::clone(&source.counter));
                true
            }
            None => false,
        }
    })
}

fn reporter_manifold() -> Manifold {
    Manifold::new(["source"], |resources| async move {
        let mut slot: Option<Arc<AtomicU64>> = None;
        if !resources.get("source", Some(&mut slot)) {
            // Source not up yet: nothing to report. Exit cleanly and let
            // the engine bounce us once it appears.
            println!("reporter: source not available yet");
            return Ok(FnWorker::spawn(|_| async { Ok(()) }));
        }

        let counter = slot.expect("source projection fills the slot");
        Ok(FnWorker::spawn(move |token: CancellationToken| async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(Duration::from_millis(500)) => {
                        println!("reporter: {} ticks", counter.load(Ordering::Relaxed));
                    }
                }
            }
        }))
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let engine: Engine = EngineBuilder::new(EngineConfig::default())
        .with_subscribers(vec![Arc::new(LogWriter)])
        .build();

    engine.install("source", source_manifold()).await?;
    engine.install("reporter", reporter_manifold()).await?;

    tokio::time::sleep(Duration::from_secs(3)).await;

    engine.kill();
    let reason = engine.wait().await;
    println!("engine stopped: {reason}");
    Ok(())
}
