//! Concurrent, cached reads of hierarchical scientific containers.
//!
//! A [`Container`] pairs a byte-range [`tessera_object_storage::Driver`] with a
//! line-aligned [`RangeCache`] and a [`MetadataTable`] shared by every read.
//! The binary layout itself is decoded by a [`DatasetParser`] supplied by the
//! caller; this crate schedules its work, one task per requested path.

pub mod cache;
pub mod container;
pub mod error;
pub mod io;
pub mod metadata;
pub mod options;
pub mod orchestrator;
pub mod parser;
pub mod promise;
pub mod request;

#[cfg(test)]
mod test_util;

pub use cache::{CacheOptions, CacheStats, RangeCache, ReadRequest};
pub use container::{Container, GroupListing, GroupVariables, InspectedVariable};
pub use error::{TesseraError, TesseraResult};
pub use io::{ContainerIo, Superblock};
pub use metadata::{ElementType, MetadataRecord, MetadataTable};
pub use options::ContainerOptions;
pub use orchestrator::ReadOrchestrator;
pub use parser::{Dataset, DatasetParser};
pub use promise::{ReadPromise, ReadResults};
pub use request::{DatasetRequest, DatasetRequestSpec, ReadOptions, RowCount};

pub use tessera_object_storage::{Credentials, Driver, Resource};
