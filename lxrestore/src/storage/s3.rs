// SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
// SPDX-License-Identifier: Apache-2.0

//! # S3 object store
//!
//! [`ObjectStore`] backed by `aws-sdk-s3`. Works with MinIO and other
//! S3-compatible servers when an endpoint and path-style addressing are configured.

use aws_sdk_s3::{
    Client, Config,
    config::{BehaviorVersion, Credentials, Region},
    error::{DisplayErrorContext, SdkError},
    operation::{get_object::GetObjectError, head_object::HeadObjectError},
};
use tracing::debug;

use crate::{
    Result,
    config::S3Config,
    error::RestoreError,
    storage::{ObjectInfo, ObjectReader, ObjectStore},
};

const CREDENTIALS_PROVIDER: &str = "lxrestore";

/// S3-compatible object store.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Creates a store from connection settings. Credentials are static and never refreshed.
    pub fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key.as_str(),
            config.secret_key.as_str(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );
        let mut builder = Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .force_path_style(config.force_path_style)
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        debug!(endpoint = ?config.endpoint, region = %config.region, "s3 client configured");
        Self::with_client(Client::from_conf(builder.build()))
    }

    /// Creates a store from an existing `aws_sdk_s3::Client`.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl ObjectStore for S3Store {
    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        let head = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let not_found = err
                    .as_service_error()
                    .is_some_and(HeadObjectError::is_not_found);
                request_error(bucket, key, not_found, &err)
            })?;
        let length = head.content_length().unwrap_or_default();
        let size_bytes = u64::try_from(length).map_err(|_| RestoreError::Transfer {
            key: key.to_string(),
            message: format!("server reported invalid content length {length}"),
        })?;
        Ok(ObjectInfo { size_bytes })
    }

    async fn open(&self, bucket: &str, key: &str) -> Result<ObjectReader> {
        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let not_found = err
                    .as_service_error()
                    .is_some_and(GetObjectError::is_no_such_key);
                request_error(bucket, key, not_found, &err)
            })?;
        Ok(Box::pin(object.body.into_async_read()))
    }
}

fn request_error<E, R>(bucket: &str, key: &str, not_found: bool, err: &SdkError<E, R>) -> RestoreError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if not_found {
        RestoreError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    } else {
        RestoreError::Transfer {
            key: key.to_string(),
            message: DisplayErrorContext(err).to_string(),
        }
    }
}
