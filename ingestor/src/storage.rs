use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use ingest_core::config::StorageConfig;
use ingest_core::{Error, Result};
use tracing::{debug, info, instrument};

/// Object storage with a single put operation.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `body` under `bucket/key`, replacing any existing object.
    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<()>;

    fn store_id(&self) -> &str;
}

pub struct S3Store {
    client: S3Client,
}

impl S3Store {
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some(profile) = &config.aws_profile {
            config_loader = config_loader.profile_name(profile);
        }

        if let Some((access_key_id, secret_access_key)) = config.static_credentials() {
            config_loader = config_loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "ingest-config",
            ));
        }

        let sdk_config = config_loader.load().await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
        }

        info!(
            region = %config.region,
            endpoint = ?config.endpoint,
            "S3 client configured"
        );

        Ok(Self {
            client: S3Client::from_conf(s3_config.build()),
        })
    }
}

#[async_trait]
impl BlobStore for S3Store {
    #[instrument(skip(self, body))]
    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
        let size = body.len();
        let response = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                let details = match e {
                    aws_sdk_s3::error::SdkError::ServiceError(ref err) => {
                        format!("S3 service error: {:?}", err.err())
                    }
                    _ => format!("put_object failed: {}", e),
                };
                Error::Storage {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    details,
                }
            })?;

        debug!(
            etag = response.e_tag().unwrap_or("unknown"),
            bytes = size,
            "Object stored"
        );

        Ok(())
    }

    fn store_id(&self) -> &str {
        "s3"
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-process store keyed by `(bucket, key)`, counting puts.
    #[derive(Default)]
    pub struct MemoryStore {
        objects: Mutex<HashMap<(String, String), Bytes>>,
        puts: Mutex<usize>,
        fail_with: Option<String>,
    }

    impl MemoryStore {
        pub fn failing(details: &str) -> Self {
            Self {
                fail_with: Some(details.to_string()),
                ..Self::default()
            }
        }

        pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
            self.objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
        }

        pub fn puts(&self) -> usize {
            *self.puts.lock().unwrap()
        }

        pub fn keys(&self) -> Vec<String> {
            self.objects
                .lock()
                .unwrap()
                .keys()
                .map(|(_, key)| key.clone())
                .collect()
        }
    }

    #[async_trait]
    impl BlobStore for MemoryStore {
        async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<()> {
            if let Some(details) = &self.fail_with {
                return Err(Error::Storage {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    details: details.clone(),
                });
            }
            *self.puts.lock().unwrap() += 1;
            self.objects
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), body);
            Ok(())
        }

        fn store_id(&self) -> &str {
            "memory"
        }
    }
}
