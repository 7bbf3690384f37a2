use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketCannedAcl, BucketLocationConstraint, CreateBucketConfiguration, ObjectCannedAcl,
    ObjectOwnership,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use stratus_core::{DriverConfig, ObjectEntry};

use super::{S3Api, S3Connector};
use crate::backend::{BackendError, BackendResult};

const DEFAULT_REGION: &str = "us-east-1";

/// Builds an `aws-sdk-s3` client per session.
///
/// Static credentials come from `access_key`/`access_secret`; with an empty
/// `access_key` the AWS default credential chain is used instead. Extra keys:
/// `region`, `endpoint` and `force_path_style`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsS3Connector;

#[async_trait]
impl S3Connector for AwsS3Connector {
    async fn connect(&self, config: &DriverConfig) -> BackendResult<Box<dyn S3Api>> {
        let region = config
            .extra_str("region")
            .unwrap_or(DEFAULT_REGION)
            .to_string();

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));
        if !config.access_key.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.access_secret.clone(),
                None,
                None,
                "stratus",
            ));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = config.extra_str("endpoint") {
            // S3-compatible providers (MinIO etc.) need path-style addressing
            builder = builder
                .endpoint_url(endpoint)
                .force_path_style(config.extra_bool("force_path_style").unwrap_or(true));
        } else if let Some(path_style) = config.extra_bool("force_path_style") {
            builder = builder.force_path_style(path_style);
        }

        Ok(Box::new(AwsS3Api {
            client: Client::from_conf(builder.build()),
        }))
    }
}

struct AwsS3Api {
    client: Client,
}

/// Map an SDK failure onto the backend categories.
fn classify<E>(err: SdkError<E, HttpResponse>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(service) => {
            let status = service.raw().status().as_u16();
            let code = service.err().code().unwrap_or_default();
            let message = match service.err().message() {
                Some(text) if !code.is_empty() => format!("{}: {}", code, text),
                Some(text) => text.to_string(),
                None if !code.is_empty() => format!("{} (HTTP {})", code, status),
                None => format!("HTTP {}", status),
            };

            match (code, status) {
                ("InvalidAccessKeyId" | "SignatureDoesNotMatch" | "AccessDenied"
                | "ExpiredToken", _)
                | (_, 401 | 403) => BackendError::Authentication(message),
                ("NoSuchKey" | "NoSuchBucket" | "NotFound", _) | (_, 404) => {
                    BackendError::NotFound(message)
                }
                ("BucketNotEmpty", _) => BackendError::NotEmpty(message),
                (_, 500..=599) => BackendError::Transport(message),
                _ => BackendError::Rejected(message),
            }
        }
        SdkError::ConstructionFailure(_) => {
            BackendError::Rejected(DisplayErrorContext(&err).to_string())
        }
        _ => BackendError::Transport(DisplayErrorContext(&err).to_string()),
    }
}

/// `Ok(false)` for not-found, the error otherwise.
fn found_or<T>(result: Result<T, BackendError>) -> BackendResult<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(BackendError::NotFound(_)) => Ok(false),
        Err(other) => Err(other),
    }
}

#[async_trait]
impl S3Api for AwsS3Api {
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> BackendResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> BackendResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> BackendResult<bool> {
        found_or(
            self.client
                .head_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(classify),
        )
    }

    async fn create_bucket(&self, bucket: &str, location: Option<&str>) -> BackendResult<()> {
        let mut request = self
            .client
            .create_bucket()
            .bucket(bucket)
            .acl(BucketCannedAcl::PublicRead)
            .object_ownership(ObjectOwnership::ObjectWriter);

        // us-east-1 is the implicit location and must not be sent
        if let Some(location) = location.filter(|l| !l.is_empty() && *l != DEFAULT_REGION) {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(location))
                    .build(),
            );
        }

        request.send().await.map_err(classify)?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> BackendResult<()> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> BackendResult<bool> {
        found_or(
            self.client
                .head_bucket()
                .bucket(bucket)
                .send()
                .await
                .map_err(classify),
        )
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        max_keys: usize,
    ) -> BackendResult<Vec<ObjectEntry>> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_prefix(prefix.map(str::to_string))
            .max_keys(i32::try_from(max_keys).unwrap_or(i32::MAX))
            .send()
            .await
            .map_err(classify)?;

        Ok(output
            .contents()
            .iter()
            .filter_map(|object| {
                let size = object.size().unwrap_or_default().max(0) as u64;
                object.key().map(|key| ObjectEntry::from_key(key, size))
            })
            .collect())
    }

    async fn copy_object(
        &self,
        from_bucket: &str,
        key: &str,
        to_bucket: &str,
        new_key: &str,
    ) -> BackendResult<()> {
        // URL-encode the copy source per AWS S3 API requirements
        let copy_source = format!("{}/{}", from_bucket, urlencoding::encode(key));

        self.client
            .copy_object()
            .copy_source(copy_source)
            .bucket(to_bucket)
            .key(new_key)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}
