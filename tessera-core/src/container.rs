//! Handle over one opened container.
//!
//! Opening a container builds the driver, the line cache and the metadata
//! table, and parses the superblock once. Every later operation goes through
//! the [`ReadOrchestrator`] so that reads of different paths run concurrently
//! against the same cache.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use bytes::Bytes;
use futures::future::join_all;
use indexmap::IndexMap;
use tessera_object_storage::{open_driver, Credentials, Driver, DriverOptions, Resource};
use tracing::{instrument::WithSubscriber, Dispatch};

use crate::{
    cache::{CacheOptions, CacheStats, RangeCache},
    error::{TesseraError, TesseraResult},
    io::{ContainerIo, Superblock},
    metadata::{normalize_group, MetadataRecord, MetadataTable},
    options::ContainerOptions,
    orchestrator::ReadOrchestrator,
    parser::{Dataset, DatasetParser},
    promise::ReadPromise,
    request::{DatasetRequest, ReadOptions},
};

/// Metadata of one variable plus the values of its attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InspectedVariable {
    pub metadata: MetadataRecord,
    /// Attribute path to value, `None` where the attribute could not be read.
    pub attributes: IndexMap<String, Option<Bytes>>,
}

/// Variables of a group, by name only or with their inspected metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupVariables {
    Names(BTreeSet<String>),
    Inspected(BTreeMap<String, InspectedVariable>),
}

impl GroupVariables {
    pub fn names(&self) -> Vec<&str> {
        match self {
            GroupVariables::Names(names) => names.iter().map(String::as_str).collect(),
            GroupVariables::Inspected(vars) => vars.keys().map(String::as_str).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            GroupVariables::Names(names) => names.len(),
            GroupVariables::Inspected(vars) => vars.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupListing {
    pub variables: GroupVariables,
    /// Attribute names of the group itself, empty unless requested.
    pub attributes: BTreeSet<String>,
}

struct ContainerInner {
    resource: Option<Resource>,
    io: Arc<ContainerIo>,
    orchestrator: ReadOrchestrator,
    options: ContainerOptions,
    diagnostics: Dispatch,
}

/// An opened container. Clones share the cache and the metadata table.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("resource", &self.inner.resource)
            .field("superblock", &self.superblock())
            .field("metadata_entries", &self.inner.io.metadata().len())
            .finish()
    }
}

impl Container {
    /// Opens the container stored at `identifier`.
    ///
    /// `identifier` is an `s3://`, `http(s)://` or `file://` URL or a plain
    /// filesystem path.
    pub async fn open(
        identifier: &str,
        credentials: &Credentials,
        parser: Arc<dyn DatasetParser>,
        options: ContainerOptions,
    ) -> TesseraResult<Self> {
        let diagnostics = options.resolve_diagnostics();
        let resource = Resource::parse(identifier)?;
        let driver = open_driver(
            identifier,
            credentials,
            DriverOptions {
                read_timeout: options.read_timeout,
            },
        )
        .with_subscriber(diagnostics)
        .await?;
        Self::build(Some(resource), driver, parser, options).await
    }

    /// Opens a container over an already constructed driver.
    pub async fn with_driver(
        driver: Arc<dyn Driver>,
        parser: Arc<dyn DatasetParser>,
        options: ContainerOptions,
    ) -> TesseraResult<Self> {
        Self::build(None, driver, parser, options).await
    }

    async fn build(
        resource: Option<Resource>,
        driver: Arc<dyn Driver>,
        parser: Arc<dyn DatasetParser>,
        options: ContainerOptions,
    ) -> TesseraResult<Self> {
        let diagnostics = options.resolve_diagnostics();
        let cache = RangeCache::new(
            driver,
            CacheOptions {
                line_size: options.cache_line_size,
                capacity: options.cache_capacity,
                verbose: options.verbose,
            },
        )?;
        let io = Arc::new(ContainerIo::new(cache, &options));

        let superblock = parser
            .parse_superblock(&io)
            .with_subscriber(diagnostics.clone())
            .await?;
        io.install_superblock(superblock);

        tracing::dispatcher::with_default(&diagnostics, || {
            tracing::info!(
                "Opened container {} (base address {:#x}, root {:#x})",
                resource
                    .as_ref()
                    .map_or_else(|| "<driver>".to_string(), |r| r.to_string()),
                superblock.base_address,
                superblock.root_address
            );
        });

        let orchestrator = ReadOrchestrator::new(io.clone(), parser, diagnostics.clone());
        Ok(Self {
            inner: Arc::new(ContainerInner {
                resource,
                io,
                orchestrator,
                options,
                diagnostics,
            }),
        })
    }

    fn diagnostics(&self) -> Dispatch {
        self.inner.diagnostics.clone()
    }

    /// Reads every requested path concurrently. `None` for an empty batch.
    pub async fn read_datasets<I, R>(&self, requests: I, options: ReadOptions) -> Option<ReadPromise>
    where
        I: IntoIterator<Item = R>,
        R: Into<DatasetRequest>,
    {
        self.inner
            .orchestrator
            .submit(requests, options)
            .with_subscriber(self.diagnostics())
            .await
    }

    /// Metadata of `path`, optionally with the values of its attributes.
    ///
    /// # Errors
    /// Any failure to read `path` itself is returned. Attributes that fail to
    /// read are reported as `None`.
    pub async fn inspect_variable(
        &self,
        path: &str,
        with_attributes: bool,
    ) -> TesseraResult<(MetadataRecord, IndexMap<String, Option<Bytes>>)> {
        self.inspect(path, with_attributes)
            .with_subscriber(self.diagnostics())
            .await
    }

    async fn inspect(
        &self,
        path: &str,
        with_attributes: bool,
    ) -> TesseraResult<(MetadataRecord, IndexMap<String, Option<Bytes>>)> {
        let dataset = self
            .read_one(path, ReadOptions::default().meta_only().with_early_exit())
            .await?;

        let mut attributes = IndexMap::new();
        if !with_attributes {
            return Ok((dataset.meta, attributes));
        }

        let (_, names) = self.list_group_names(path, true).await?;
        let base = path.trim_end_matches('/');
        let attr_paths: Vec<String> = names.iter().map(|name| format!("{base}/{name}")).collect();
        let options = ReadOptions::default().with_attributes();
        if let Some(promise) = self.inner.orchestrator.submit(&attr_paths, options).await {
            let mut results = promise.wait().await;
            for attr_path in attr_paths {
                let values = results
                    .take(&attr_path)
                    .and_then(|outcome| outcome.ok())
                    .and_then(|dataset| dataset.values);
                attributes.insert(attr_path, values);
            }
        }
        Ok((dataset.meta, attributes))
    }

    /// Lists the immediate children of `group`.
    ///
    /// With `with_inspect` every variable is inspected concurrently; a variable
    /// that fails to inspect is listed with empty metadata.
    ///
    /// # Errors
    /// [`TesseraError::InvalidArgument`] for an empty group name. Backend
    /// failures while parsing the group are returned, parse failures only
    /// limit the listing to what is already known.
    pub async fn list_group(
        &self,
        group: &str,
        with_attributes: bool,
        with_inspect: bool,
    ) -> TesseraResult<GroupListing> {
        async move {
            let (variables, attributes) = self.list_group_names(group, with_attributes).await?;
            let variables = if with_inspect {
                GroupVariables::Inspected(self.inspect_all(group, variables, with_attributes).await)
            } else {
                GroupVariables::Names(variables)
            };
            Ok(GroupListing {
                variables,
                attributes,
            })
        }
        .with_subscriber(self.diagnostics())
        .await
    }

    async fn list_group_names(
        &self,
        group: &str,
        with_attributes: bool,
    ) -> TesseraResult<(BTreeSet<String>, BTreeSet<String>)> {
        if group.is_empty() {
            return Err(TesseraError::InvalidArgument(
                "group name must not be empty".to_string(),
            ));
        }

        let options = ReadOptions {
            block: true,
            early_exit: false,
            meta_only: true,
            include_attributes: with_attributes,
        };
        if let Err(err) = self.read_one(group, options).await {
            match err {
                TesseraError::Backend(_) | TesseraError::TaskFailed { .. } => return Err(err),
                err => {
                    tracing::debug!("Group {} could not be parsed, listing nothing: {}", group, err);
                    return Ok((BTreeSet::new(), BTreeSet::new()));
                }
            }
        }

        let (variables, attributes) = self.metadata().children(group);
        Ok((
            variables,
            if with_attributes {
                attributes
            } else {
                BTreeSet::new()
            },
        ))
    }

    async fn inspect_all(
        &self,
        group: &str,
        variables: BTreeSet<String>,
        with_attributes: bool,
    ) -> BTreeMap<String, InspectedVariable> {
        let group = normalize_group(group);
        let mut names = Vec::with_capacity(variables.len());
        let mut tasks = Vec::with_capacity(variables.len());
        for name in variables {
            let path = if group.is_empty() {
                format!("/{name}")
            } else {
                format!("/{group}/{name}")
            };
            let container = self.clone();
            let task = async move { container.inspect(&path, with_attributes).await };
            tasks.push(tokio::spawn(task.with_subscriber(self.diagnostics())));
            names.push(name);
        }

        let mut inspected = BTreeMap::new();
        for (name, outcome) in names.into_iter().zip(join_all(tasks).await) {
            let variable = match outcome {
                Ok(Ok((metadata, attributes))) => InspectedVariable {
                    metadata,
                    attributes,
                },
                Ok(Err(err)) => {
                    tracing::warn!("Failed to inspect {}: {}", name, err);
                    InspectedVariable::default()
                }
                Err(join_error) => {
                    tracing::warn!("Inspect task for {} did not complete: {}", name, join_error);
                    InspectedVariable::default()
                }
            };
            inspected.insert(name, variable);
        }
        inspected
    }

    /// Value bytes of the attribute at `path`.
    pub async fn read_attribute(&self, path: &str) -> TesseraResult<Option<Bytes>> {
        let dataset = self
            .read_one(path, ReadOptions::default().with_attributes())
            .with_subscriber(self.diagnostics())
            .await?;
        Ok(dataset.values)
    }

    async fn read_one(
        &self,
        path: &str,
        options: ReadOptions,
    ) -> TesseraResult<Dataset> {
        let promise = self
            .inner
            .orchestrator
            .submit([path], ReadOptions { block: true, ..options })
            .await;
        let mut results = match promise {
            Some(promise) => promise.wait().await,
            None => {
                return Err(TesseraError::InvalidArgument(
                    "no path to read".to_string(),
                ))
            }
        };
        results.take(path).unwrap_or_else(|| {
            Err(TesseraError::TaskFailed {
                path: path.to_string(),
                reason: "no result recorded".to_string(),
            })
        })
    }

    pub fn superblock(&self) -> Superblock {
        self.inner.io.superblock().copied().unwrap_or_default()
    }

    pub fn root_address(&self) -> u64 {
        self.superblock().root_address
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.io.cache_stats()
    }

    pub fn metadata(&self) -> &MetadataTable {
        self.inner.io.metadata()
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.inner.options
    }

    /// `None` for containers built with [`Container::with_driver`].
    pub fn resource(&self) -> Option<&Resource> {
        self.inner.resource.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{MemoryDriver, StubParser};

    async fn container(parser: StubParser) -> (Arc<StubParser>, Container) {
        let parser = Arc::new(parser);
        let container = Container::with_driver(
            Arc::new(MemoryDriver::new((0..=255).collect())),
            parser.clone(),
            ContainerOptions::default().with_cache_line_size(64),
        )
        .await
        .unwrap();
        (parser, container)
    }

    #[tokio::test]
    async fn empty_group_is_rejected() {
        let (parser, container) = container(StubParser::default()).await;
        let err = container.list_group("", false, false).await.unwrap_err();
        assert!(matches!(err, TesseraError::InvalidArgument(_)));
        assert!(parser.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_line_size_fails_construction() {
        let err = Container::with_driver(
            Arc::new(MemoryDriver::new(vec![0; 16])),
            Arc::new(StubParser::default()),
            ContainerOptions::default().with_cache_line_size(100),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TesseraError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn read_attribute_surfaces_failures() {
        let (_, container) = container(StubParser::default().with_entry("/g/units", 8, 2)).await;

        let units = container.read_attribute("/g/units").await.unwrap();
        assert_eq!(units.as_deref(), Some(&[8, 9][..]));
        assert!(container.read_attribute("/g/missing").await.is_err());
        assert!(container.resource().is_none());
    }

    #[tokio::test]
    async fn unparsable_groups_list_nothing() {
        let (parser, container) = container(
            StubParser::default()
                .with_entry("/g/a", 0, 4)
                .with_entry("/g/b", 4, 4),
        )
        .await;
        container
            .read_datasets(["/g/a", "/g/b"], ReadOptions::default())
            .await
            .unwrap();

        // The stub parser knows no object called `/g`.
        let listing = container.list_group("/g", true, false).await.unwrap();
        assert!(listing.variables.is_empty());
        assert!(listing.attributes.is_empty());
        assert!(parser.calls().contains(&"/g".to_string()));

        let listing = container.list_group("/g", false, true).await.unwrap();
        assert_eq!(listing.variables, GroupVariables::Inspected(BTreeMap::new()));
    }
}
