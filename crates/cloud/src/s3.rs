//! S3-compatible object storage (AWS S3, RunPod network volumes, MinIO).
//!
//! Each [`S3Storage`] is built from a user's stored settings, so clients
//! are created per request rather than once at startup.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use engui_core::settings::{
    KEY_ACCESS_KEY_ID, KEY_BUCKET, KEY_ENDPOINT_URL, KEY_FORCE_PATH_STYLE, KEY_REGION,
    KEY_SECRET_ACCESS_KEY,
};
use serde::Serialize;

use crate::store::{MediaStore, StorageError, StoredObject};

/// Shortest accepted presigned URL lifetime.
pub const MIN_PRESIGN_TTL: Duration = Duration::from_secs(1);

/// Longest presigned URL lifetime S3 (SigV4) allows.
pub const MAX_PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default presigned URL lifetime.
pub const DEFAULT_PRESIGN_TTL: Duration = Duration::from_secs(60 * 60);

/// Per-operation timeout for S3 calls.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(120);

const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings for an S3-compatible store.
#[derive(Clone)]
pub struct S3Settings {
    pub endpoint_url: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub force_path_style: bool,
}

impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("force_path_style", &self.force_path_style)
            .finish_non_exhaustive()
    }
}

impl S3Settings {
    /// Build settings from decrypted `s3` user settings keyed by config key.
    ///
    /// `bucket`, `access_key_id` and `secret_access_key` are required.
    /// Region defaults to `us-east-1`; path-style addressing defaults to on
    /// when a custom endpoint is set.
    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, StorageError> {
        let get = |key: &str| {
            values
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            get(key).ok_or_else(|| StorageError::NotConfigured(format!("missing s3.{key}")))
        };

        let endpoint_url = get(KEY_ENDPOINT_URL).map(|u| u.trim_end_matches('/').to_string());
        let force_path_style = match get(KEY_FORCE_PATH_STYLE).as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => endpoint_url.is_some(),
        };
        Ok(Self {
            region: get(KEY_REGION).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            bucket: required(KEY_BUCKET)?,
            access_key_id: required(KEY_ACCESS_KEY_ID)?,
            secret_access_key: required(KEY_SECRET_ACCESS_KEY)?,
            endpoint_url,
            force_path_style,
        })
    }
}

/// An object listed from a bucket.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
}

/// S3 client bound to one bucket.
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    settings: S3Settings,
}

/// Clamp a requested presign lifetime into the range S3 accepts.
pub fn clamp_presign_ttl(ttl: Duration) -> Duration {
    ttl.clamp(MIN_PRESIGN_TTL, MAX_PRESIGN_TTL)
}

/// Map an SDK error, keeping timeouts distinguishable.
fn sdk_error<E, R>(err: SdkError<E, R>) -> StorageError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err {
        SdkError::TimeoutError(_) => StorageError::Timeout,
        other => StorageError::S3(DisplayErrorContext(&other).to_string()),
    }
}

impl S3Storage {
    pub fn new(settings: S3Settings) -> Self {
        let credentials = aws_credential_types::Credentials::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            None,
            None,
            "engui-user-settings",
        );
        let timeouts = aws_config::timeout::TimeoutConfig::builder()
            .operation_timeout(OPERATION_TIMEOUT)
            .build();

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .timeout_config(timeouts)
            .force_path_style(settings.force_path_style);
        if let Some(endpoint) = &settings.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            settings,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.settings.bucket
    }

    /// Upload an object.
    pub async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.settings.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    /// Delete an object. S3 treats missing keys as success.
    pub async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.settings.bucket)
            .key(key)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    /// List every object under `prefix`, following continuation tokens.
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        let mut objects = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.settings.bucket)
                .prefix(prefix);
            if let Some(t) = &token {
                request = request.continuation_token(t);
            }
            let page = request.send().await.map_err(sdk_error)?;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                objects.push(ObjectInfo {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0),
                    last_modified: object
                        .last_modified()
                        .and_then(|t| DateTime::from_timestamp(t.secs(), 0)),
                    content_type: None,
                });
            }

            match (page.is_truncated(), page.next_continuation_token()) {
                (Some(true), Some(next)) => token = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(objects)
    }

    /// Metadata of one object, or `None` if it does not exist.
    pub async fn head_object(&self, key: &str) -> Result<Option<ObjectInfo>, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.settings.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(head) => Ok(Some(ObjectInfo {
                key: key.to_string(),
                size: head.content_length().unwrap_or(0),
                last_modified: head
                    .last_modified()
                    .and_then(|t| DateTime::from_timestamp(t.secs(), 0)),
                content_type: head.content_type().map(str::to_string),
            })),
            Err(SdkError::ServiceError(e)) if e.err().is_not_found() => Ok(None),
            Err(e) => Err(sdk_error(e)),
        }
    }

    /// Presigned GET URL valid for `ttl` (clamped to 1 s ..= 7 days).
    pub async fn presigned_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let config = PresigningConfig::expires_in(clamp_presign_ttl(ttl))
            .map_err(|e| StorageError::S3(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.settings.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(sdk_error)?;
        Ok(request.uri().to_string())
    }

    /// Presigned PUT URL valid for `ttl` (clamped to 1 s ..= 7 days).
    pub async fn presigned_put(
        &self,
        key: &str,
        content_type: Option<&str>,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let config = PresigningConfig::expires_in(clamp_presign_ttl(ttl))
            .map_err(|e| StorageError::S3(e.to_string()))?;
        let request = self
            .client
            .put_object()
            .bucket(&self.settings.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .presigned(config)
            .await
            .map_err(sdk_error)?;
        Ok(request.uri().to_string())
    }

    /// Cheap connectivity and credentials check: list at most one key.
    pub async fn check_access(&self) -> Result<(), StorageError> {
        self.client
            .list_objects_v2()
            .bucket(&self.settings.bucket)
            .max_keys(1)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    /// Stable, unsigned URL of an object. Private buckets need
    /// [`S3Storage::presigned_get`] to actually fetch it.
    pub fn object_url(&self, key: &str) -> String {
        format!("{}{key}", self.url_base())
    }

    /// The key of a URL produced by [`S3Storage::object_url`], if it is one.
    pub fn key_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.url_base().as_str()).filter(|k| !k.is_empty())
    }

    fn url_base(&self) -> String {
        let bucket = &self.settings.bucket;
        match &self.settings.endpoint_url {
            Some(endpoint) if self.settings.force_path_style => format!("{endpoint}/{bucket}/"),
            Some(endpoint) => match endpoint.split_once("://") {
                Some((scheme, host)) => format!("{scheme}://{bucket}.{host}/"),
                None => format!("{endpoint}/{bucket}/"),
            },
            None => format!("https://{bucket}.s3.{}.amazonaws.com/", self.settings.region),
        }
    }
}

#[async_trait]
impl MediaStore for S3Storage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject, StorageError> {
        let size = bytes.len() as u64;
        self.put_object(key, bytes, content_type).await?;
        tracing::debug!(key, size, bucket = %self.settings.bucket, "Stored object in S3");
        Ok(StoredObject {
            key: key.to_string(),
            url: self.object_url(key),
            size,
            content_type: content_type.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.delete_object(key).await
    }

    fn url_for(&self, key: &str) -> String {
        self.object_url(key)
    }
}
