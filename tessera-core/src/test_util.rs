use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use bytes::Bytes;
use tessera_object_storage::{Driver, StorageError, StorageResult};

/// In-memory driver that records every request it serves.
#[derive(Debug)]
pub(crate) struct MemoryDriver {
    data: Bytes,
    reads: parking_lot::Mutex<Vec<(u64, u64)>>,
    delay: Option<Duration>,
    fail: AtomicBool,
}

impl MemoryDriver {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self {
            data: Bytes::from(data),
            reads: parking_lot::Mutex::new(Vec::new()),
            delay: None,
            fail: AtomicBool::new(false),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn reads(&self) -> Vec<(u64, u64)> {
        self.reads.lock().clone()
    }

    pub(crate) fn read_count(&self) -> usize {
        self.reads.lock().len()
    }
}

#[async_trait::async_trait]
impl Driver for MemoryDriver {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read(&self, offset: u64, length: u64) -> StorageResult<Bytes> {
        self.reads.lock().push((offset, length));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::InitializationError(
                "backend unavailable".to_string(),
            ));
        }
        let end = offset + length;
        if end > self.len() {
            return Err(StorageError::OutOfRange {
                offset,
                length,
                size: self.len(),
            });
        }
        Ok(self.data.slice(offset as usize..end as usize))
    }
}

/// Parser over a fixed path table. Each known path reads `len` bytes at
/// `offset` and registers itself in the metadata table.
#[derive(Debug, Default)]
pub(crate) struct StubParser {
    entries: std::collections::HashMap<String, (u64, u64)>,
    calls: parking_lot::Mutex<Vec<String>>,
}

impl StubParser {
    pub(crate) fn with_entry(mut self, path: &str, offset: u64, len: u64) -> Self {
        self.entries.insert(path.to_string(), (offset, len));
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl crate::parser::DatasetParser for StubParser {
    async fn parse_superblock(
        &self,
        _io: &crate::io::ContainerIo,
    ) -> crate::error::TesseraResult<crate::io::Superblock> {
        Ok(crate::io::Superblock {
            offset_size: 8,
            length_size: 8,
            ..Default::default()
        })
    }

    async fn parse(
        &self,
        io: &crate::io::ContainerIo,
        request: &crate::request::DatasetRequestSpec,
    ) -> crate::error::TesseraResult<crate::parser::Dataset> {
        self.calls.lock().push(request.path.clone());
        let (offset, len) = self
            .entries
            .get(&request.path)
            .copied()
            .ok_or_else(|| crate::error::TesseraError::parse(&request.path, "no such object"))?;
        let meta = crate::metadata::MetadataRecord::variable()
            .with_dimensions(vec![len])
            .with_address(offset);
        io.metadata().insert(&request.path, meta.clone());
        let values = if request.meta_only {
            None
        } else {
            Some(io.read(offset, len).await?)
        };
        Ok(crate::parser::Dataset { meta, values })
    }
}
