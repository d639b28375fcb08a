//! Resource identifiers and the object stores they resolve to.

use std::{fmt::Display, path::PathBuf, sync::Arc};

use object_store::{
    aws::AmazonS3Builder, http::HttpBuilder, local::LocalFileSystem, path::Path, ObjectStore,
};
use url::Url;

use crate::error::{StorageError, StorageResult};

/// A parsed backend resource identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// `s3://bucket/key`
    S3 { bucket: String, key: Path },
    /// `http(s)://host/path[?query]`, read with range requests. The query is
    /// sent with every request, which keeps presigned URLs working.
    Http(Url),
    /// `file:///abs/path` or a bare filesystem path.
    Local(PathBuf),
}

impl Resource {
    pub fn parse(identifier: &str) -> StorageResult<Self> {
        if identifier.is_empty() {
            return Err(StorageError::InvalidResource(
                "resource identifier is empty".to_string(),
            ));
        }

        let url = match Url::parse(identifier) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                return Ok(Resource::Local(PathBuf::from(identifier)))
            }
            Err(e) => {
                return Err(StorageError::InvalidResource(format!("{identifier}: {e}")));
            }
        };

        // `Url` lowercases the scheme.
        match url.scheme() {
            "s3" => {
                let bucket = url.host_str().unwrap_or_default().to_string();
                let key = Path::from_url_path(url.path())
                    .map_err(|e| StorageError::InvalidResource(format!("{identifier}: {e}")))?;
                if bucket.is_empty() || key.as_ref().is_empty() {
                    return Err(StorageError::InvalidResource(format!(
                        "expected s3://bucket/key, got {identifier}"
                    )));
                }
                Ok(Resource::S3 { bucket, key })
            }
            "http" | "https" => {
                if url.host_str().is_none() || url.path().trim_matches('/').is_empty() {
                    return Err(StorageError::InvalidResource(format!(
                        "expected {}://host/path, got {identifier}",
                        url.scheme()
                    )));
                }
                Ok(Resource::Http(url))
            }
            "file" => url.to_file_path().map(Resource::Local).map_err(|_| {
                StorageError::InvalidResource(format!("not a local file path: {identifier}"))
            }),
            scheme => Err(StorageError::InvalidResource(format!(
                "unsupported scheme {scheme} in {identifier}"
            ))),
        }
    }

    /// Resolves the resource into a store and the location of the object inside it.
    pub fn object_store(
        &self,
        credentials: &Credentials,
    ) -> StorageResult<(Arc<dyn ObjectStore>, Path)> {
        match self {
            Resource::S3 { bucket, key } => {
                tracing::debug!("Using S3 object store for bucket {}", bucket);
                let store = Self::s3_object_store(bucket, credentials)?;
                Ok((Arc::new(store), key.clone()))
            }
            Resource::Http(url) => {
                let (base_url, location) = Self::http_parts(url)?;
                tracing::debug!("Using HTTP object store for {}", base_url.origin().ascii_serialization());
                let store = HttpBuilder::new()
                    .with_url(base_url.as_str())
                    .build()
                    .map_err(|e| {
                        StorageError::InitializationError(format!(
                            "Failed to build HTTP object store: {e}"
                        ))
                    })?;
                Ok((Arc::new(store), location))
            }
            Resource::Local(path) => {
                tracing::debug!("Using LocalFileSystem object store for {}", path.display());
                let location = Path::from_filesystem_path(path).map_err(|e| {
                    StorageError::InvalidResource(format!("{}: {e}", path.display()))
                })?;
                Ok((Arc::new(LocalFileSystem::new()), location))
            }
        }
    }

    /// Splits an HTTP URL into the store root, which keeps the query, and the
    /// decoded object location the store appends to it.
    fn http_parts(url: &Url) -> StorageResult<(Url, Path)> {
        let location = Path::from_url_path(url.path())
            .map_err(|e| StorageError::InvalidResource(format!("{url}: {e}")))?;
        let mut base_url = url.clone();
        base_url.set_path("/");
        base_url.set_fragment(None);
        Ok((base_url, location))
    }

    fn s3_object_store(
        bucket: &str,
        credentials: &Credentials,
    ) -> StorageResult<object_store::aws::AmazonS3> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_allow_http(credentials.allow_http);

        if let Some(access_key_id) = &credentials.access_key_id {
            builder = builder.with_access_key_id(access_key_id);
        }
        if let Some(secret_access_key) = &credentials.secret_access_key {
            builder = builder.with_secret_access_key(secret_access_key);
        }
        if let Some(token) = &credentials.session_token {
            builder = builder.with_token(token);
        }
        if let Some(region) = &credentials.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &credentials.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        builder.build().map_err(|e| {
            StorageError::InitializationError(format!("Failed to build S3 object store: {e}"))
        })
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
            Resource::Http(url) => write!(f, "{url}"),
            Resource::Local(path) => write!(f, "file://{}", path.display()),
        }
    }
}

/// Credentials handed to the backend at construction.
///
/// Unset fields fall back to whatever the environment provides.
#[derive(Clone, Default)]
pub struct Credentials {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub allow_http: bool,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("allow_http", &self.allow_http)
            .finish()
    }
}
