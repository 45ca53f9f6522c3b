//! Teardown actions collected during a launch attempt
//!
//! Every step that leaves something behind (a port forward, a background
//! process) registers how to undo it before the next step runs. The registry
//! is drained once when the attempt ends, in reverse registration order, so a
//! tunnel outlives the app that talks through it.

use std::fmt;
use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use meteor_core::prelude::*;
use meteor_core::EventSink;
use meteor_tools::ProcessHandle;

/// Source name used for advisory teardown failures on the sink
const SOURCE: &str = "meteor";

type Teardown = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Ordered collection of teardown actions
#[derive(Default)]
pub struct DisposableRegistry {
    entries: Vec<(String, Teardown)>,
}

impl DisposableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a teardown action under a label used in logs
    pub fn push<F, Fut>(&mut self, label: impl Into<String>, teardown: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let label = label.into();
        debug!("Registered teardown: {}", label);
        self.entries
            .push((label, Box::new(move || teardown().boxed())));
    }

    /// Register termination of a background process
    pub fn push_process(&mut self, handle: ProcessHandle) {
        let label = format!("terminate {}", handle.label());
        self.push(label, move || async move { handle.terminate().await });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labels in registration order
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|(label, _)| label.as_str()).collect()
    }

    /// Run every registered teardown, last registered first.
    ///
    /// Failures are logged and reported to the sink as error output; they
    /// never stop the drain. Entries are removed before running, so a second
    /// drain only sees teardowns registered since.
    pub async fn drain(&mut self, sink: Option<&EventSink>) {
        let entries = std::mem::take(&mut self.entries);
        if entries.is_empty() {
            return;
        }

        debug!("Draining {} teardown(s)", entries.len());

        for (label, teardown) in entries.into_iter().rev() {
            trace!("Teardown: {}", label);
            if let Err(e) = teardown().await {
                warn!("Teardown '{}' failed: {}", label, e);
                if let Some(sink) = sink {
                    sink.error_output(SOURCE, format!("Failed to {}: {}", label, e))
                        .await;
                }
            }
        }
    }
}

impl fmt::Debug for DisposableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableRegistry")
            .field("entries", &self.labels())
            .finish()
    }
}

impl Drop for DisposableRegistry {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            // Dropped process handles still kill their processes
            warn!(
                "{} teardown(s) dropped without being run: {:?}",
                self.entries.len(),
                self.labels()
            );
        }
    }
}
