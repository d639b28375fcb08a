#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    io::Write,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use bytes::Bytes;
use tessera_core::{
    ContainerIo, Dataset, DatasetParser, DatasetRequestSpec, Driver, MetadataRecord, Superblock,
    TesseraError, TesseraResult,
};
use tessera_object_storage::StorageResult;

pub const MAGIC: &[u8; 4] = b"TSRA";
pub const HEADER_LEN: u64 = 20;

/// Builds a container image: magic, base address and root address at the
/// start of the file, `payload` at `base`.
pub fn container_bytes(base: u64, root: u64, payload: &[u8]) -> Vec<u8> {
    assert!(base >= HEADER_LEN);
    let mut data = Vec::with_capacity(base as usize + payload.len());
    data.extend_from_slice(MAGIC);
    data.extend_from_slice(&base.to_le_bytes());
    data.extend_from_slice(&root.to_le_bytes());
    data.resize(base as usize, 0);
    data.extend_from_slice(payload);
    data
}

pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Driver over a byte buffer that counts backend requests.
#[derive(Debug)]
pub struct CountingDriver {
    data: Bytes,
    reads: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingDriver {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Bytes::from(data),
            reads: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Driver for CountingDriver {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read(&self, offset: u64, length: u64) -> StorageResult<Bytes> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .data
            .slice(offset as usize..(offset + length) as usize))
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    offset: u64,
    len: u64,
    is_attribute: bool,
}

/// Parser for the test layout: a flat table of objects with their logical
/// offset and length. Parsing a path registers the path and, unless
/// `early_exit` is set, its immediate children.
#[derive(Debug, Default)]
pub struct FakeParser {
    entries: BTreeMap<String, Entry>,
    failing: HashSet<String>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeParser {
    pub fn group(mut self, path: &str) -> Self {
        self.entries.insert(
            path.to_string(),
            Entry {
                offset: 0,
                len: 0,
                is_attribute: false,
            },
        );
        self
    }

    pub fn variable(mut self, path: &str, offset: u64, len: u64) -> Self {
        self.entries.insert(
            path.to_string(),
            Entry {
                offset,
                len,
                is_attribute: false,
            },
        );
        self
    }

    pub fn attribute(mut self, path: &str, offset: u64, len: u64) -> Self {
        self.entries.insert(
            path.to_string(),
            Entry {
                offset,
                len,
                is_attribute: true,
            },
        );
        self
    }

    /// Registers `path` but fails every parse of it.
    pub fn failing(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    fn record(entry: &Entry) -> MetadataRecord {
        let record = if entry.is_attribute {
            MetadataRecord::attribute()
        } else {
            MetadataRecord::variable()
        };
        record.with_dimensions(vec![entry.len]).with_address(entry.offset)
    }

    fn children<'a>(&'a self, parent: &str) -> impl Iterator<Item = (&'a String, &'a Entry)> {
        let prefix = format!("{}/", parent.trim_end_matches('/'));
        self.entries.iter().filter(move |(path, _)| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
        })
    }
}

#[async_trait::async_trait]
impl DatasetParser for FakeParser {
    async fn parse_superblock(&self, io: &ContainerIo) -> TesseraResult<Superblock> {
        let header = io.read(0, HEADER_LEN).await?;
        if &header[..4] != MAGIC {
            return Err(TesseraError::parse("/", "bad magic"));
        }
        Ok(Superblock {
            offset_size: 8,
            length_size: 8,
            base_address: u64::from_le_bytes(header[4..12].try_into().unwrap()),
            root_address: u64::from_le_bytes(header[12..20].try_into().unwrap()),
        })
    }

    async fn parse(&self, io: &ContainerIo, request: &DatasetRequestSpec) -> TesseraResult<Dataset> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.path.clone())
            .or_default() += 1;

        if self.failing.contains(&request.path) {
            return Err(TesseraError::parse(&request.path, "corrupt object header"));
        }
        let entry = self
            .entries
            .get(&request.path)
            .ok_or_else(|| TesseraError::parse(&request.path, "object not found"))?;

        let meta = Self::record(entry);
        io.metadata().insert(&request.path, meta.clone());
        if !request.early_exit {
            for (child, child_entry) in self.children(&request.path) {
                if child_entry.is_attribute && !request.include_attributes {
                    continue;
                }
                io.metadata().insert(child, Self::record(child_entry));
            }
        }

        let values = if request.meta_only || entry.len == 0 {
            None
        } else {
            Some(io.read(entry.offset, entry.len).await?)
        };
        Ok(Dataset { meta, values })
    }
}

/// In-memory log sink for an injected diagnostics dispatch.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
