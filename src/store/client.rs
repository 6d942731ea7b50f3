use super::{ObjectStore, ProgressSender, TransferUpdate};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{config::Region, types::ObjectCannedAcl, Client as S3Client};

pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    base_url: String,
}

impl S3ObjectStore {
    pub async fn new(
        access_key_id: String,
        secret_access_key: String,
        endpoint: String,
        bucket: String,
        base_url: String,
    ) -> Result<Self> {
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "digital-ocean-spaces",
        );

        // Create custom config for DigitalOcean Spaces
        let config = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new("us-east-1")) // DigitalOcean Spaces doesn't really use regions
            .endpoint_url(endpoint)
            .load()
            .await;

        let client = S3Client::new(&config);

        Ok(Self {
            client,
            bucket,
            base_url,
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        progress: ProgressSender,
    ) -> Result<String> {
        let total = data.len() as u64;
        let body = ByteStream::from(data.to_vec());

        // The SDK streams the body internally without surfacing byte counts,
        // so the client reports the transfer boundaries only. Payloads here
        // are small (compressed to ~1 MiB), one PUT each.
        let _ = progress.send(TransferUpdate {
            transferred: 0,
            total,
        });

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| Error::Transfer(format!("Failed to upload object: {}", e)))?;

        let _ = progress.send(TransferUpdate {
            transferred: total,
            total,
        });

        Ok(self.public_url(key))
    }
}
