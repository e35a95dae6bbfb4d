//! Top-level run: resolve the context, connect, pull every image

use crate::cli::args::Args;
use crate::config::RunConfig;
use crate::context::ClientContext;
use crate::engine::EngineClient;
use crate::error::Result;
use crate::logging::Logger;
use crate::orchestrator::{PullOrchestrator, PullSummary};
use crate::progress::ConsoleSink;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Runner {
    config: RunConfig,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Result<Self> {
        let config = RunConfig::from_args(args)?;
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: RunConfig) -> Self {
        let output = config.logger();
        Self { config, output }
    }

    pub fn output(&self) -> &Logger {
        &self.output
    }

    /// Pull every configured image. Errors returned from here are fatal; failed
    /// pulls are only reported in the summary.
    pub async fn run(&self) -> Result<PullSummary> {
        self.output
            .section(&format!("multipull v{}", env!("CARGO_PKG_VERSION")));

        let context = self.resolve_context()?;
        let engine = Arc::new(self.connect(&context)?);

        let root = CancellationToken::new();
        let interrupts = InterruptWatch::spawn(root.clone(), self.output.clone());

        let sink = Arc::new(ConsoleSink::new(self.output.clone()));
        let orchestrator = PullOrchestrator::new(
            engine,
            self.config.parallel,
            sink,
            self.output.clone(),
        )?
        .with_cancellation(root);

        self.output.debug(&format!(
            "pulling {} image(s), {} at a time",
            self.config.images.len(),
            orchestrator.concurrency()
        ));

        let summary = orchestrator.run(&self.config.images).await?;
        interrupts.stop().await;
        drop(orchestrator.release());

        self.report(&summary);
        Ok(summary)
    }

    fn resolve_context(&self) -> Result<ClientContext> {
        if !self.config.context.is_requested() {
            return Ok(ClientContext::default_context());
        }

        let store = self.config.context_store()?;
        let context = store.resolve_selection(&self.config.context)?;
        self.output.info(&format!(
            "using context {} ({})",
            context.name,
            context.endpoint_host.as_deref().unwrap_or("environment defaults")
        ));
        Ok(context)
    }

    fn connect(&self, context: &ClientContext) -> Result<EngineClient> {
        let client = EngineClient::from_context(context, self.output.clone())?;
        self.output.debug("engine client ready");
        Ok(client)
    }

    fn report(&self, summary: &PullSummary) {
        let failed = summary.len() - summary.succeeded();
        if failed > 0 {
            self.output.warning(&format!(
                "{} of {} image(s) failed",
                failed,
                summary.len()
            ));
            for report in summary.failures() {
                self.output.detail(&format!("{}: {}", report.reference, report.status));
            }
        }
        self.output.debug(&format!(
            "finished in {}",
            self.output.format_duration(self.output.elapsed())
        ));
        self.output.plain("done.");
    }
}

/// Cancels the root token on Ctrl-C until stopped or dropped
struct InterruptWatch {
    stop: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl InterruptWatch {
    fn spawn(root: CancellationToken, output: Logger) -> Self {
        let stop = CancellationToken::new();
        let stopped = stop.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = stopped.cancelled() => {}
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        output.warning("interrupted, cancelling pulls");
                        root.cancel();
                    }
                }
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop watching and wait for the watcher task to exit
    async fn stop(mut self) {
        self.stop.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for InterruptWatch {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextSelection;
    use crate::error::{ContextError, MultipullError};

    fn config(dir: &std::path::Path, context: ContextSelection) -> RunConfig {
        RunConfig {
            parallel: 2,
            context,
            config_dir: Some(dir.to_path_buf()),
            verbose: false,
            quiet: true,
            images: vec!["alpine".to_string()],
        }
    }

    #[tokio::test]
    async fn test_missing_context_is_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let runner = Runner::with_config(config(
            dir.path(),
            ContextSelection::Named("prod".to_string()),
        ));

        let err = runner.run().await.unwrap_err();

        assert!(matches!(
            err,
            MultipullError::ConfigResolution(ContextError::MetadataUnreadable { .. })
        ));
    }

    #[tokio::test]
    async fn test_undefined_current_context_is_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        let runner = Runner::with_config(config(dir.path(), ContextSelection::Current));

        let err = runner.run().await.unwrap_err();

        assert!(matches!(
            err,
            MultipullError::ConfigResolution(ContextError::CurrentContextUndefined)
        ));
    }

    #[tokio::test]
    async fn test_interrupt_watch_stops() {
        let root = CancellationToken::new();
        let watch = InterruptWatch::spawn(root.clone(), Logger::new_quiet());
        let stop = watch.stop.clone();

        tokio::time::timeout(std::time::Duration::from_secs(5), watch.stop())
            .await
            .expect("watcher did not exit");

        assert!(stop.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[tokio::test]
    async fn test_interrupt_watch_stops_on_drop() {
        let root = CancellationToken::new();
        let watch = InterruptWatch::spawn(root.clone(), Logger::new_quiet());
        let stop = watch.stop.clone();

        drop(watch);

        assert!(stop.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[test]
    fn test_new_rejects_invalid_args() {
        use clap::Parser;
        let args = Args::try_parse_from(["multipull", "--parallel", "0", "alpine"]).unwrap();
        assert!(matches!(Runner::new(args), Err(MultipullError::Usage(_))));
    }
}
