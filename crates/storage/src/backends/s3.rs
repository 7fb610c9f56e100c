//! S3-compatible backend using AWS SDK.
//!
//! Blobs and content share one bucket connection. The writer lock for a blob
//! `<prefix>/<name>` is the sibling object `<prefix>/<name>.lock`, created
//! with a conditional put (`If-None-Match: *`) so only one writer can win.

use super::validate_key;
use crate::error::{StorageError, StorageResult};
use crate::lock::LockPolicy;
use crate::traits::{BlobStore, ContentStore};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::future::ProvideCredentials as ProvideCredentialsFuture;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_smithy_http_client::Builder as SmithyHttpClientBuilder;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::instrument;

/// Marker included in lazy-credentials errors so they map to config errors
/// instead of generic S3 transport failures.
const CREDENTIALS_INIT_ERROR_MARKER: &str = "coffer-s3-lazy-credentials-init";
const CREDENTIALS_RESOLVE_ERROR_MARKER: &str = "coffer-s3-lazy-credentials-resolve";

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Lazily initializes the AWS default credentials chain on first signed request.
#[derive(Debug)]
struct LazyDefaultCredentialsProvider {
    region: String,
    chain: OnceCell<aws_config::default_provider::credentials::DefaultCredentialsChain>,
}

impl LazyDefaultCredentialsProvider {
    fn new(region: String) -> Self {
        Self {
            region,
            chain: OnceCell::new(),
        }
    }

    async fn chain(
        &self,
    ) -> Result<&aws_config::default_provider::credentials::DefaultCredentialsChain, CredentialsError>
    {
        self.chain
            .get_or_try_init(|| async {
                let region = aws_config::Region::new(self.region.clone());
                tokio::task::spawn(async move {
                    aws_config::default_provider::credentials::DefaultCredentialsChain::builder()
                        .region(region)
                        .build()
                        .await
                })
                .await
                .map_err(|join_err| {
                    CredentialsError::provider_error(format!(
                        "{CREDENTIALS_INIT_ERROR_MARKER}: failed to initialize AWS default credential chain: {join_err}"
                    ))
                })
            })
            .await
    }

    async fn credentials(&self) -> aws_credential_types::provider::Result {
        let chain = self.chain().await?;
        chain.provide_credentials().await.map_err(|err| {
            CredentialsError::provider_error(format!(
                "{CREDENTIALS_RESOLVE_ERROR_MARKER}: default AWS credentials resolution failed: {err}"
            ))
        })
    }
}

impl ProvideCredentials for LazyDefaultCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> ProvideCredentialsFuture<'a>
    where
        Self: 'a,
    {
        ProvideCredentialsFuture::new(self.credentials())
    }
}

fn map_s3_operation_error<E>(err: SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let err_text = err.to_string();
    if err_text.contains(CREDENTIALS_INIT_ERROR_MARKER)
        || err_text.contains(CREDENTIALS_RESOLVE_ERROR_MARKER)
    {
        return StorageError::Config(
            "S3 credential initialization failed. Configure AWS credentials explicitly or ensure ambient AWS credentials and trust roots are available."
                .to_string(),
        );
    }

    StorageError::S3(Box::new(err))
}

/// HTTP status of a service error, if the request reached the service.
fn service_status<E>(err: &SdkError<E>) -> Option<u16> {
    match err {
        SdkError::ServiceError(service_err) => Some(service_err.raw().status().as_u16()),
        _ => None,
    }
}

/// A configured bucket connection shared by the S3 stores.
pub struct S3Bucket {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    endpoint: String,
    region: String,
}

impl std::fmt::Debug for S3Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Bucket")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl S3Bucket {
    /// Build a bucket connection.
    ///
    /// `force_path_style` selects `endpoint/bucket/key` URLs instead of
    /// `bucket.endpoint/key`. MinIO and some S3-compatible services need it.
    pub async fn connect(
        bucket: &str,
        endpoint: Option<String>,
        region: Option<String>,
        prefix: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        if access_key_id.is_some() ^ secret_access_key.is_some() {
            return Err(StorageError::Config(
                "s3 config requires both access_key_id and secret_access_key when either is set"
                    .to_string(),
            ));
        }

        let resolved_region = region.unwrap_or_else(|| "us-east-1".to_string());
        let mut s3_config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new(resolved_region.clone()));

        if let (Some(key_id), Some(secret)) = (access_key_id, secret_access_key) {
            let credentials =
                aws_sdk_s3::config::Credentials::new(key_id, secret, None, None, "coffer-config");
            s3_config_builder = s3_config_builder.credentials_provider(credentials);
        } else {
            s3_config_builder = s3_config_builder
                .credentials_provider(LazyDefaultCredentialsProvider::new(resolved_region.clone()));
        }

        // Bare host:port endpoints (e.g. "minio:9000") get an http:// scheme
        let normalized_endpoint = endpoint.map(|endpoint_url| {
            let lower = endpoint_url.to_ascii_lowercase();
            if lower.starts_with("http://") || lower.starts_with("https://") {
                endpoint_url
            } else {
                format!("http://{endpoint_url}")
            }
        });

        if let Some(endpoint_url) = &normalized_endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
            // Plain HTTP endpoints don't need native trust roots
            if endpoint_url.to_ascii_lowercase().starts_with("http://") {
                s3_config_builder =
                    s3_config_builder.http_client(SmithyHttpClientBuilder::new().build_http());
            }
        }

        if force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());
        let endpoint = match normalized_endpoint {
            Some(url) => url,
            None => format!("s3.{resolved_region}.amazonaws.com"),
        };

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            prefix: prefix
                .map(|p| p.trim_end_matches('/').to_string())
                .filter(|p| !p.is_empty()),
            endpoint,
            region: resolved_region,
        })
    }

    /// Get the full object key for a key (applies prefix if configured).
    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        }
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Bytes>> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) if service_status(&err) == Some(404) => return Ok(None),
            Err(err) => return Err(map_s3_operation_error(err)),
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?
            .into_bytes();
        Ok(Some(bytes))
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .body(data.into())
            .send()
            .await
            .map_err(map_s3_operation_error)?;
        Ok(())
    }

    /// Create `key` only if absent. `Ok(false)` means it already exists.
    async fn put_if_absent(&self, key: &str, data: Bytes) -> StorageResult<bool> {
        match self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .if_none_match("*")
            .body(data.into())
            .send()
            .await
        {
            Ok(_) => Ok(true),
            // 412: object exists; 409: a concurrent conditional put is in flight
            Err(err) if matches!(service_status(&err), Some(412) | Some(409)) => Ok(false),
            Err(err) => Err(map_s3_operation_error(err)),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if service_status(&err) == Some(404) => Ok(false),
            Err(err) => Err(map_s3_operation_error(err)),
        }
    }

    /// Delete `key`, reporting `Ok(false)` when it was not there.
    async fn delete(&self, key: &str) -> StorageResult<bool> {
        // delete_object succeeds on missing keys, so probe first
        if !self.exists(key).await? {
            return Ok(false);
        }
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(map_s3_operation_error)?;
        Ok(true)
    }

    async fn health_check(&self) -> StorageResult<()> {
        let probe = self.client.head_bucket().bucket(&self.bucket).send();
        tokio::time::timeout(HEALTH_CHECK_TIMEOUT, probe)
            .await
            .map_err(|_| {
                StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "S3 health check timed out after 10 seconds",
                ))
            })?
            .map_err(map_s3_operation_error)?;
        Ok(())
    }
}

/// S3 blob store with a sibling lock object.
#[derive(Debug)]
pub struct S3BlobStore {
    bucket: Arc<S3Bucket>,
    name: String,
    lock_key: String,
    policy: LockPolicy,
}

impl S3BlobStore {
    pub fn new(bucket: Arc<S3Bucket>, name: &str, policy: LockPolicy) -> StorageResult<Self> {
        validate_key(name)?;
        Ok(Self {
            bucket,
            name: name.to_string(),
            lock_key: format!("{name}.lock"),
            policy,
        })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), fields(backend = "s3", store = %self.name))]
    async fn wait_unlocked(&self) -> StorageResult<()> {
        self.policy
            .retry(&self.name, || async {
                self.bucket.exists(&self.lock_key).await.map(|locked| !locked)
            })
            .await
    }

    #[instrument(skip(self), fields(backend = "s3", store = %self.name))]
    async fn lock(&self) -> StorageResult<()> {
        self.policy
            .retry(&self.name, || {
                self.bucket.put_if_absent(&self.lock_key, Bytes::new())
            })
            .await
    }

    #[instrument(skip(self), fields(backend = "s3", store = %self.name))]
    async fn unlock(&self) -> StorageResult<()> {
        if self.bucket.delete(&self.lock_key).await? {
            Ok(())
        } else {
            Err(StorageError::LockNotHeld(self.name.clone()))
        }
    }

    async fn is_locked(&self) -> StorageResult<bool> {
        self.bucket.exists(&self.lock_key).await
    }

    #[instrument(skip(self), fields(backend = "s3", store = %self.name))]
    async fn load(&self) -> StorageResult<Bytes> {
        Ok(self.bucket.get(&self.name).await?.unwrap_or_default())
    }

    #[instrument(skip(self, data), fields(backend = "s3", store = %self.name, size = data.len()))]
    async fn store(&self, data: Bytes) -> StorageResult<()> {
        self.bucket.put(&self.name, data).await
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.bucket.health_check().await
    }
}

/// S3 content store. Objects live under `<prefix>/<dir>/<name>`.
#[derive(Debug)]
pub struct S3ContentStore {
    bucket: Arc<S3Bucket>,
    dir: String,
}

impl S3ContentStore {
    pub fn new(bucket: Arc<S3Bucket>, dir: &str) -> Self {
        Self {
            bucket,
            dir: dir.trim_matches('/').to_string(),
        }
    }

    fn key(&self, name: &str) -> StorageResult<String> {
        validate_key(name)?;
        Ok(format!("{}/{}", self.dir, name))
    }
}

#[async_trait]
impl ContentStore for S3ContentStore {
    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn write(&self, name: &str, data: Bytes) -> StorageResult<()> {
        self.bucket.put(&self.key(name)?, data).await
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn read(&self, name: &str) -> StorageResult<Bytes> {
        self.bucket
            .get(&self.key(name)?)
            .await?
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete(&self, name: &str) -> StorageResult<()> {
        if self.bucket.delete(&self.key(name)?).await? {
            Ok(())
        } else {
            Err(StorageError::NotFound(name.to_string()))
        }
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn exists(&self, name: &str) -> StorageResult<bool> {
        self.bucket.exists(&self.key(name)?).await
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
