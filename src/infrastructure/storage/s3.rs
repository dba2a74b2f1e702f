use super::{ObjectStore, PutOptions, StorageError};
use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tracing::{debug, info};

/// S3-compatible client. Built once at start-up and only read afterwards,
/// so clones can be used from concurrent jobs.
#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
}

impl StorageService {
    pub fn new(
        endpoint: &str,
        region: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!("✅ S3 client configured for bucket '{}'", bucket);

        Self {
            client,
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for StorageService {
    async fn put_object(&self, key: &str, body: Bytes, options: &PutOptions) -> Result<(), StorageError> {
        let size = body.len();
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(options.content_type)
            .cache_control(options.cache_control)
            .content_disposition(options.content_disposition);

        if options.public_read {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                message: aws_sdk_s3::Error::from(e).to_string(),
            })?;

        debug!(bucket = %self.bucket, key, size, "Object stored");
        Ok(())
    }
}
