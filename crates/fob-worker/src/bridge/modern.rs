//! Completion for compilations that run as a future and expose a cache.

use async_trait::async_trait;

use super::{AdapterKind, CompletionAdapter, CompletionJob, finish};
use crate::compilation::{ChildCompilation, ChildOutput};
use crate::{EmittedFiles, Result};

/// Awaits [`ChildCompilation::run_as_child`].
///
/// When the compilation has a cache, the entry's file list is stored under an
/// etag of the emitted files, and a later build producing the same files gets
/// the stored list back.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModernAdapter;

#[async_trait]
impl CompletionAdapter for ModernAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Modern
    }

    async fn complete(
        &self,
        mut unit: Box<dyn ChildCompilation>,
        job: &CompletionJob,
    ) -> Result<EmittedFiles> {
        let cache = unit.cache();
        let output = unit.run_as_child().await?;
        let etag = etag(&output, &job.entry_name);

        let files = finish(job, output)?;

        let Some(cache) = cache else {
            return Ok(files);
        };
        if let Some(cached) = cache.get(&job.compiler_name, &etag) {
            tracing::debug!(compiler = %job.compiler_name, %etag, "cached file list");
            return Ok(cached);
        }
        cache.store(&job.compiler_name, &etag, &files);
        Ok(files)
    }
}

/// BLAKE3 etag over the entry's files, independent of their order.
pub fn etag(output: &ChildOutput, entry_name: &str) -> String {
    let mut files = output.entry_files(entry_name).unwrap_or_default();
    files.sort();

    let mut hasher = blake3::Hasher::new();
    for file in &files {
        hasher.update(file.as_bytes());
        hasher.update(&[0]);
        if let Some(source) = output.assets.get(file) {
            hasher.update(source.as_bytes());
        }
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex().to_string()
}
