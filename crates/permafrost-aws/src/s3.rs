//! S3 implementation of the object store interface.

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use tracing::{debug, info};

use permafrost_core::{Error, ObjectStore, Result};

/// Blob storage over S3, one bucket/key per call.
pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    /// Create a store over an existing client.
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    /// Create a store from the default AWS environment configuration.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(S3Client::new(&config))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_not_found()) =>
            {
                Ok(false)
            }
            Err(err) => Err(Error::Transport(format!(
                "head s3://{}/{}: {}",
                bucket, key, err
            ))),
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| Error::Transport(format!("get s3://{}/{}: {}", bucket, key, err)))?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|err| Error::Transport(format!("read s3://{}/{}: {}", bucket, key, err)))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(data.to_vec().into())
            .send()
            .await
            .map_err(|err| Error::Transport(format!("put s3://{}/{}: {}", bucket, key, err)))?;

        debug!(
            subsystem = "store",
            component = "s3",
            op = "put",
            bucket = bucket,
            key = key,
            size = data.len(),
            "Object written"
        );
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| Error::Transport(format!("delete s3://{}/{}: {}", bucket, key, err)))?;
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(|err| {
                Error::Transport(format!("list s3://{}/{}: {}", bucket, prefix, err))
            })?;

            for object in output.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        info!(
            subsystem = "store",
            component = "s3",
            op = "list",
            bucket = bucket,
            key = prefix,
            object_count = keys.len(),
            "Prefix listed"
        );
        Ok(keys)
    }
}
