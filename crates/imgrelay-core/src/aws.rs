//! Shared AWS SDK plumbing: client configuration and error classification.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

pub use aws_config::SdkConfig;

use crate::config::AwsConfig;

/// Load SDK configuration from the default provider chain.
///
/// Credentials and region come from (in order) environment variables,
/// `~/.aws/config` / `~/.aws/credentials`, and instance metadata. The
/// `[aws]` config section can pin the region or point at a custom endpoint.
pub async fn load_sdk_config(config: &AwsConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &config.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(endpoint) = &config.endpoint_url {
        tracing::info!("Using custom AWS endpoint: {}", endpoint);
        loader = loader.endpoint_url(endpoint);
    }
    loader.load().await
}

/// Coarse classification of a failed SDK call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureKind {
    NotFound,
    Transient,
    Fatal,
}

/// Classify an SDK error from any service client.
pub(crate) fn classify<E>(err: &SdkError<E>) -> FailureKind
where
    E: ProvideErrorMetadata,
{
    match err {
        SdkError::ConstructionFailure(_) => FailureKind::Fatal,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            FailureKind::Transient
        }
        SdkError::ServiceError(_) => {
            let status = err.raw_response().map(|r| r.status().as_u16());
            classify_service_error(status, err.code())
        }
        _ => FailureKind::Transient,
    }
}

/// Classify a service-level error by HTTP status and error code.
///
/// Codes win over status: S3 reports `RequestTimeout` as a 400.
pub(crate) fn classify_service_error(status: Option<u16>, code: Option<&str>) -> FailureKind {
    match code {
        Some(
            "RequestTimeout" | "SlowDown" | "Throttling" | "ThrottlingException"
            | "RequestThrottled" | "InternalError" | "ServiceUnavailable",
        ) => return FailureKind::Transient,
        Some("NoSuchKey" | "NotFound") => return FailureKind::NotFound,
        Some(
            "NoSuchBucket" | "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"
            | "ExpiredToken" | "QueueDoesNotExist" | "AWS.SimpleQueueService.NonExistentQueue",
        ) => return FailureKind::Fatal,
        _ => {}
    }

    match status {
        Some(404) => FailureKind::NotFound,
        Some(408 | 429) => FailureKind::Transient,
        Some(s) if s >= 500 => FailureKind::Transient,
        Some(_) => FailureKind::Fatal,
        None => FailureKind::Transient,
    }
}

/// Full error chain as a single line.
pub(crate) fn describe<E>(err: &SdkError<E>) -> String
where
    E: std::error::Error + 'static,
{
    DisplayErrorContext(err).to_string()
}
