//! Seam to the component that understands the container's binary layout.

use bytes::Bytes;

use crate::{
    error::TesseraResult,
    io::{ContainerIo, Superblock},
    metadata::MetadataRecord,
    request::DatasetRequestSpec,
};

/// Decoded result of one dataset or attribute read.
///
/// The default value is the empty result recorded for a failed read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub meta: MetadataRecord,
    /// Raw value bytes, `None` for metadata-only reads.
    pub values: Option<Bytes>,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.values.is_none() && self.meta == MetadataRecord::default()
    }
}

/// Parses the binary layout of a container.
///
/// Implementations read exclusively through [`ContainerIo`] and register every
/// object they come across in [`ContainerIo::metadata`], marking attributes as
/// such. Parses of different paths run concurrently against the same
/// `ContainerIo`.
#[async_trait::async_trait]
pub trait DatasetParser: Send + Sync {
    /// Called exactly once per container, before any other read.
    async fn parse_superblock(&self, io: &ContainerIo) -> TesseraResult<Superblock>;

    async fn parse(&self, io: &ContainerIo, request: &DatasetRequestSpec)
        -> TesseraResult<Dataset>;
}
