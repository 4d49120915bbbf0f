//! S3-backed object store.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;

use crate::aws::{self, FailureKind};
use crate::error::PipelineError;
use crate::types::{ObjectReference, Visibility};

use super::{ObjectStore, PutOptions};

/// Object store over the S3 API.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from shared SDK configuration.
    ///
    /// Path-style addressing is needed for most S3-compatible servers
    /// (MinIO, LocalStack).
    pub fn from_sdk_config(sdk_config: &SdkConfig, force_path_style: bool) -> Self {
        let config = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(force_path_style)
            .build();
        Self::new(Client::from_conf(config))
    }
}

fn store_error<E>(
    operation: &'static str,
    container: &str,
    key: &str,
    err: &SdkError<E>,
) -> PipelineError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let target = format!("{container}/{key}");
    let message = aws::describe(err);
    match aws::classify(err) {
        FailureKind::NotFound if operation == "fetch" => PipelineError::NotFound {
            container: container.to_string(),
            key: key.to_string(),
        },
        FailureKind::Transient => PipelineError::TransientIo {
            operation,
            target,
            message,
        },
        FailureKind::NotFound | FailureKind::Fatal => PipelineError::Fatal {
            operation,
            target,
            message,
        },
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    async fn fetch(&self, object_ref: &ObjectReference) -> Result<Vec<u8>, PipelineError> {
        let output = self
            .client
            .get_object()
            .bucket(&object_ref.container_id)
            .key(&object_ref.key)
            .send()
            .await
            .map_err(|e| store_error("fetch", &object_ref.container_id, &object_ref.key, &e))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| PipelineError::TransientIo {
                operation: "fetch",
                target: object_ref.to_string(),
                message: format!("Body stream failed: {e}"),
            })?;

        Ok(body.into_bytes().to_vec())
    }

    async fn put(
        &self,
        container_id: &str,
        key: &str,
        bytes: Vec<u8>,
        options: &PutOptions,
    ) -> Result<(), PipelineError> {
        let mut request = self
            .client
            .put_object()
            .bucket(container_id)
            .key(key)
            .content_type(&options.content_type)
            .body(ByteStream::from(bytes));
        if options.visibility == Visibility::PublicRead {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request
            .send()
            .await
            .map_err(|e| store_error("put", container_id, key, &e))?;
        Ok(())
    }
}
