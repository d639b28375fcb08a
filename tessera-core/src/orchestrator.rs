use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{
    instrument::{Instrument, WithSubscriber},
    Dispatch,
};

use crate::{
    io::ContainerIo,
    parser::DatasetParser,
    promise::ReadPromise,
    request::{dedup_requests, DatasetRequest, ReadOptions},
};

/// Fans a batch of dataset requests out to one task per distinct path.
#[derive(Clone)]
pub struct ReadOrchestrator {
    io: Arc<ContainerIo>,
    parser: Arc<dyn DatasetParser>,
    diagnostics: Dispatch,
}

impl std::fmt::Debug for ReadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOrchestrator")
            .field("io", &self.io)
            .finish_non_exhaustive()
    }
}

impl ReadOrchestrator {
    pub fn new(io: Arc<ContainerIo>, parser: Arc<dyn DatasetParser>, diagnostics: Dispatch) -> Self {
        Self {
            io,
            parser,
            diagnostics,
        }
    }

    /// Starts one read task per distinct path of `requests`.
    ///
    /// Returns `None` for an empty batch. With `options.block` set every task
    /// has finished by the time the promise is returned.
    pub async fn submit<I, R>(&self, requests: I, options: ReadOptions) -> Option<ReadPromise>
    where
        I: IntoIterator<Item = R>,
        R: Into<DatasetRequest>,
    {
        let specs = dedup_requests(requests, &options);
        if specs.is_empty() {
            return None;
        }

        tracing::debug!(
            "Submitting {} dataset reads (block: {}, meta_only: {})",
            specs.len(),
            options.block,
            options.meta_only
        );

        let mut tasks = IndexMap::with_capacity(specs.len());
        for (path, spec) in specs {
            let io = self.io.clone();
            let parser = self.parser.clone();
            let task = async move {
                let outcome = parser.parse(&io, &spec).await;
                match &outcome {
                    Ok(dataset) => tracing::trace!(
                        "Read {} ({} value bytes)",
                        spec.path,
                        dataset.values.as_ref().map_or(0, |v| v.len())
                    ),
                    Err(err) => tracing::warn!("Failed to read {}: {}", spec.path, err),
                }
                outcome
            };
            let handle = tokio::spawn(
                task.in_current_span()
                    .with_subscriber(self.diagnostics.clone()),
            );
            tasks.insert(path, handle);
        }

        let mut promise = ReadPromise::new(tasks);
        if options.block {
            promise.resolve_all().await;
        }
        Some(promise)
    }
}
