// S3 store tests against a MinIO container.
// Skipped when SKIP_S3_TESTS is set or the container cannot start.

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use bytes::Bytes;
use coffer_storage::{BlobStore, ContentStore, LockPolicy, S3BlobStore, S3Bucket, S3ContentStore};
use coffer_storage::StorageError;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::{ContainerAsync, GenericImage, ImageExt, runners::AsyncRunner};

const MINIO_IMAGE: &str = "minio/minio";
const MINIO_TAG: &str = "RELEASE.2025-04-22T22-12-26Z";

fn should_skip_s3_tests() -> bool {
    std::env::var("SKIP_S3_TESTS").is_ok()
}

struct MinioContext {
    _container: ContainerAsync<GenericImage>,
    endpoint: String,
    access_key: String,
    secret_key: String,
}

impl MinioContext {
    async fn new() -> Result<Self, String> {
        let access_key = "minio-access-key".to_string();
        let secret_key = "minio-secret-key".to_string();

        let container: ContainerAsync<GenericImage> = GenericImage::new(MINIO_IMAGE, MINIO_TAG)
            .with_exposed_port(9000.tcp())
            .with_wait_for(WaitFor::message_on_stdout("API:"))
            .with_env_var("MINIO_ROOT_USER", access_key.clone())
            .with_env_var("MINIO_ROOT_PASSWORD", secret_key.clone())
            .with_cmd(vec!["server", "/data"])
            .start()
            .await
            .map_err(|e| format!("failed to start MinIO container: {e}"))?;

        let host = container
            .get_host()
            .await
            .map_err(|e| format!("failed to get host: {e}"))?;
        let port = container
            .get_host_port_ipv4(9000.tcp())
            .await
            .map_err(|e| format!("failed to get port: {e}"))?;

        Ok(Self {
            _container: container,
            endpoint: format!("http://{host}:{port}"),
            access_key,
            secret_key,
        })
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), String> {
        let credentials = Credentials::new(
            self.access_key.clone(),
            self.secret_key.clone(),
            None,
            None,
            "test",
        );
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new("us-east-1"))
            .credentials_provider(credentials)
            .http_client(aws_smithy_http_client::Builder::new().build_http())
            .endpoint_url(self.endpoint.clone())
            .force_path_style(true)
            .build();

        Client::from_conf(config)
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| format!("failed to create bucket: {e}"))?;
        Ok(())
    }
}

struct S3TestHarness {
    _context: MinioContext,
    bucket: Arc<S3Bucket>,
}

impl S3TestHarness {
    async fn new(prefix: Option<String>) -> Result<Self, String> {
        let context = MinioContext::new().await?;
        let bucket = "coffer-test";
        context.create_bucket(bucket).await?;

        let bucket = S3Bucket::connect(
            bucket,
            Some(context.endpoint.clone()),
            Some("us-east-1".to_string()),
            prefix,
            Some(context.access_key.clone()),
            Some(context.secret_key.clone()),
            true,
        )
        .await
        .map_err(|e| format!("failed to connect S3 bucket: {e}"))?;

        Ok(Self {
            _context: context,
            bucket: Arc::new(bucket),
        })
    }

    fn blob(&self, name: &str) -> S3BlobStore {
        S3BlobStore::new(
            self.bucket.clone(),
            name,
            LockPolicy::new(5, Duration::from_millis(20)),
        )
        .unwrap()
    }
}

#[tokio::test]
async fn test_s3_blob_lock_protocol() {
    if should_skip_s3_tests() {
        return;
    }

    let harness = match S3TestHarness::new(Some("prefix".to_string())).await {
        Ok(harness) => harness,
        Err(err) => {
            eprintln!("Skipping S3 test: {err}");
            return;
        }
    };
    let a = harness.blob("users.json");
    let b = harness.blob("users.json");

    assert!(a.read().await.unwrap().is_empty());
    a.health_check().await.unwrap();

    a.read_for_write().await.unwrap();
    assert!(b.is_locked().await.unwrap());
    assert!(b.read_for_write().await.unwrap_err().is_lock_timeout());

    a.write_locked(Bytes::from_static(b"{}")).await.unwrap();
    a.unlock().await.unwrap();
    assert!(matches!(a.unlock().await, Err(StorageError::LockNotHeld(_))));

    assert_eq!(b.read().await.unwrap(), Bytes::from_static(b"{}"));
    b.write(Bytes::from_static(b"{\"a\":1}")).await.unwrap();
    assert!(!b.is_locked().await.unwrap());
}

#[tokio::test]
async fn test_s3_content_store() {
    if should_skip_s3_tests() {
        return;
    }

    let harness = match S3TestHarness::new(None).await {
        Ok(harness) => harness,
        Err(err) => {
            eprintln!("Skipping S3 test: {err}");
            return;
        }
    };
    let content = S3ContentStore::new(harness.bucket.clone(), "content");

    assert!(matches!(
        content.read("foo.txt").await,
        Err(StorageError::NotFound(_))
    ));
    content
        .write("foo.txt", Bytes::from_static(b"hello"))
        .await
        .unwrap();
    assert!(content.exists("foo.txt").await.unwrap());
    assert_eq!(
        content.read("foo.txt").await.unwrap(),
        Bytes::from_static(b"hello")
    );
    content.delete("foo.txt").await.unwrap();
    assert!(matches!(
        content.delete("foo.txt").await,
        Err(StorageError::NotFound(_))
    ));
}
