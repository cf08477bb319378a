//! Completion for compilations that report through a one-shot hook.

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{AdapterKind, CompletionAdapter, CompletionJob, finish};
use crate::compilation::ChildCompilation;
use crate::{EmittedFiles, Error, Result};

/// Registers a hook through [`ChildCompilation::run_with_hook`] and suspends
/// until the engine fires it. The engine may fire it from any thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct LegacyAdapter;

#[async_trait]
impl CompletionAdapter for LegacyAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Legacy
    }

    async fn complete(
        &self,
        mut unit: Box<dyn ChildCompilation>,
        job: &CompletionJob,
    ) -> Result<EmittedFiles> {
        let (tx, rx) = oneshot::channel();
        unit.run_with_hook(Box::new(move |result| {
            // Receiver gone means the request was abandoned.
            let _ = tx.send(result);
        }));

        let output = rx.await.map_err(|_| Error::AdapterThrow {
            request: job.request.clone(),
            message: "completion hook dropped without firing".to_string(),
        })??;

        finish(job, output)
    }
}
