//! Shared state of one launch sequence and the step runner

use std::future::Future;

use meteor_core::prelude::*;
use meteor_core::{EventSink, LaunchConfiguration};
use meteor_tools::Toolchain;

use crate::cancel::CancelToken;
use crate::disposables::DisposableRegistry;

/// Source name for advisory messages the agent itself writes to the sink
pub(crate) const SOURCE: &str = "meteor";

/// How a failing step affects the rest of the sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Failure aborts the sequence
    Required,
    /// Failure is logged and reported, the sequence continues
    BestEffort,
}

/// Everything a platform strategy needs while it runs
pub struct LaunchContext<'a, T: Toolchain> {
    pub config: &'a LaunchConfiguration,
    pub tools: &'a T,
    pub sink: &'a EventSink,
    pub registry: &'a mut DisposableRegistry,
    cancel: &'a CancelToken,
}

impl<'a, T: Toolchain> LaunchContext<'a, T> {
    pub fn new(
        config: &'a LaunchConfiguration,
        tools: &'a T,
        sink: &'a EventSink,
        registry: &'a mut DisposableRegistry,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            config,
            tools,
            sink,
            registry,
            cancel,
        }
    }

    /// Run one step, racing it against cancellation.
    ///
    /// Returns `Ok(None)` when a best-effort step failed. Cancellation is
    /// always an error, whatever the kind: the step future is dropped, which
    /// kills a tool that is still running.
    pub async fn step<R, F>(&self, kind: StepKind, name: &str, step: F) -> Result<Option<R>>
    where
        F: Future<Output = Result<R>>,
    {
        debug!("Step: {}", name);

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                info!("Step '{}' cancelled", name);
                Err(Error::Cancelled)
            }
            result = step => result,
        };

        match result {
            Ok(value) => Ok(Some(value)),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => match kind {
                StepKind::Required => {
                    error!("Step '{}' failed: {}", name, e);
                    Err(e)
                }
                StepKind::BestEffort => {
                    warn!("Step '{}' failed, continuing: {}", name, e);
                    self.sink
                        .error_output(SOURCE, format!("{} failed: {}", name, e))
                        .await;
                    Ok(None)
                }
            },
        }
    }

    pub async fn required<R, F>(&self, name: &str, step: F) -> Result<R>
    where
        F: Future<Output = Result<R>>,
    {
        self.step(StepKind::Required, name, step)
            .await?
            .ok_or_else(|| Error::launch(format!("{} did not complete", name)))
    }

    pub async fn best_effort<R, F>(&self, name: &str, step: F) -> Result<Option<R>>
    where
        F: Future<Output = Result<R>>,
    {
        self.step(StepKind::BestEffort, name, step).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use meteor_core::{DeviceIdentity, DeviceKind, LaunchEvent};
    use meteor_tools::test_utils::FakeTools;
    use std::time::Duration;

    fn config() -> LaunchConfiguration {
        LaunchConfiguration::new(
            DeviceIdentity::new("emulator-5554", DeviceKind::Android),
            "/out/com.example.app-Signed.apk",
        )
    }

    #[tokio::test]
    async fn test_required_step_propagates_error() {
        let (config, tools) = (config(), FakeTools::new());
        let (sink, mut rx) = EventSink::channel(8);
        let mut registry = DisposableRegistry::new();
        let (_handle, token) = cancel_pair();
        let ctx = LaunchContext::new(&config, &tools, &sink, &mut registry, &token);

        let err = ctx
            .required("install", async {
                Err::<(), _>(Error::tool_failed("adb", "INSTALL_FAILED"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ToolFailed { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_best_effort_step_reports_and_continues() {
        let (config, tools) = (config(), FakeTools::new());
        let (sink, mut rx) = EventSink::channel(8);
        let mut registry = DisposableRegistry::new();
        let (_handle, token) = cancel_pair();
        let ctx = LaunchContext::new(&config, &tools, &sink, &mut registry, &token);

        let value = ctx
            .best_effort("uninstall", async {
                Err::<(), _>(Error::tool_failed("adb", "not installed"))
            })
            .await
            .unwrap();

        assert!(value.is_none());
        assert!(matches!(
            rx.try_recv(),
            Ok(LaunchEvent::ErrorOutput { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_aborts_pending_step() {
        let (config, tools) = (config(), FakeTools::new());
        let (sink, _rx) = EventSink::channel(8);
        let mut registry = DisposableRegistry::new();
        let (handle, token) = cancel_pair();
        let ctx = LaunchContext::new(&config, &tools, &sink, &mut registry, &token);

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let err = ctx
            .best_effort("install", async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        canceller.await.unwrap();
    }
}
