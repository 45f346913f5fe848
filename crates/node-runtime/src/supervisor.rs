//! Task supervision.
//!
//! Every long-running component runs as a named task. The first task that
//! fails triggers the shared [`ShutdownSignal`]; the others stop at their
//! next suspension point and [`Supervisor::join`] reports the first error.

use std::future::Future;

use shared_types::{Shutdown, ShutdownSignal};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::error::{KeyperError, KeyperResult};

pub struct Supervisor {
    signal: ShutdownSignal,
    tasks: JoinSet<(&'static str, KeyperResult<()>)>,
    names: Vec<&'static str>,
}

impl Supervisor {
    pub fn new(signal: ShutdownSignal) -> Self {
        Self {
            signal,
            tasks: JoinSet::new(),
            names: Vec::new(),
        }
    }

    /// A listener for the shared signal.
    pub fn shutdown(&self) -> Shutdown {
        self.signal.subscribe()
    }

    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = KeyperResult<()>> + Send + 'static,
    {
        info!(task = name, "[supervisor] starting task");
        self.names.push(name);
        self.tasks.spawn(async move { (name, task.await) });
    }

    /// Trigger shutdown on Ctrl-C.
    pub fn spawn_ctrl_c(&mut self) {
        let signal = self.signal.clone();
        let shutdown = self.shutdown();
        self.spawn("ctrl-c", async move {
            tokio::select! {
                _ = shutdown.wait() => {}
                result = tokio::signal::ctrl_c() => {
                    if let Err(err) = result {
                        error!(error = %err, "[supervisor] cannot listen for ctrl-c");
                    } else {
                        info!("[supervisor] ctrl-c received, shutting down");
                    }
                    signal.trigger();
                }
            }
            Ok(())
        });
    }

    /// Wait for every task. Returns the first failure, if any.
    pub async fn join(mut self) -> KeyperResult<()> {
        let mut first_error = None;
        while let Some(joined) = self.tasks.join_next().await {
            let (name, result) = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(error = %err, "[supervisor] task panicked");
                    ("unknown", Err(KeyperError::TaskPanicked(err.to_string())))
                }
            };
            match result {
                Ok(()) => info!(task = name, "[supervisor] task finished"),
                Err(err) => {
                    error!(task = name, error = %err, "[supervisor] task failed, shutting down");
                    self.signal.trigger();
                    first_error.get_or_insert(err);
                }
            }
        }
        info!(tasks = ?self.names, "[supervisor] all tasks stopped");
        first_error.map_or(Ok(()), Err)
    }
}
