//! # Fatal errors stop the whole engine
//!
//! A flaky worker fails twice with a recoverable error (watch the restarts
//! back off by `error_delay`), then hits a fatal one. The fatal predicate
//! claims it and the engine tears everything down.
//!
//! Run with: `cargo run --example fatal --features logging`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use manifold::{
    EngineBuilder, EngineConfig, FnWorker, LogWriter, Manifold, WorkerError,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig {
        error_delay: Duration::from_millis(500),
        ..EngineConfig::default()
    };
    let engine = EngineBuilder::new(config)
        .fatal_if(|err: &WorkerError| {
            matches!(err, WorkerError::Failed { reason } if reason == "disk gone")
        })
        .with_subscribers(vec![Arc::new(LogWriter)])
        .build();

    let attempts = Arc::new(AtomicU64::new(0));
    engine
        .install(
            "flaky",
            Manifold::new(Vec::<String>::new(), move |_resources| {
                let attempts = Arc::clone(&attempts);
                async move {
                    let n = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    Ok(FnWorker::spawn(move |_token| async move {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        if n < 3 {
                            Err(WorkerError::failed("connection refused"))
                        } else {
                            Err(WorkerError::failed("disk gone"))
                        }
                    }))
                }
            }),
        )
        .await?;

    // A healthy bystander that gets taken down with the engine.
    engine
        .install(
            "steady",
            Manifold::new(Vec::<String>::new(), |_resources| async {
                Ok(FnWorker::spawn(|token| async move {
                    token.cancelled().await;
                    println!("steady: asked to stop");
                    Ok(())
                }))
            }),
        )
        .await?;

    let reason = engine.wait().await;
    println!("engine stopped: {reason}");
    Ok(())
}
