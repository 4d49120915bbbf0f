//! Core data types for the imgrelay pipeline.
//!
//! These types describe a unit of work (a [`Notification`] about one source
//! object), the variant catalog it is transcoded into, and the aggregated
//! [`ProcessingOutcome`] the orchestrator uses to decide acknowledgment.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

/// Identifies one object in a key/blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectReference {
    /// Bucket or container name
    pub container_id: String,
    /// Object key within the container
    pub key: String,
}

impl ObjectReference {
    pub fn new(container_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container_id, self.key)
    }
}

/// Opaque token the consumer needs to acknowledge or release a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Receipt(String);

impl Receipt {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One unit of work: a newly created source object plus its acknowledgment handle.
#[derive(Debug, Clone)]
pub struct Notification {
    /// The source object to transcode
    pub object_ref: ObjectReference,
    /// Handle for ack/release
    pub receipt: Receipt,
    /// Delivery attempt, starting at 1
    pub attempt: u32,
}

impl Notification {
    pub fn new(object_ref: ObjectReference, receipt: Receipt) -> Self {
        Self {
            object_ref,
            receipt,
            attempt: 1,
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt.max(1);
        self
    }
}

/// Access level applied to written variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    /// Store default (no ACL)
    #[default]
    Private,
    /// Anonymous read access
    PublicRead,
}

/// Encoded format of a variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantFormat {
    #[default]
    Jpeg,
    Png,
}

impl VariantFormat {
    /// Default file extension used in destination keys.
    pub fn extension(&self) -> &'static str {
        match self {
            VariantFormat::Jpeg => "jpg",
            VariantFormat::Png => "png",
        }
    }

    /// MIME type sent with the upload.
    pub fn content_type(&self) -> &'static str {
        match self {
            VariantFormat::Jpeg => "image/jpeg",
            VariantFormat::Png => "image/png",
        }
    }
}

/// Builds destination keys of the form `<prefix><key>/<width>.<ext>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NamingRule {
    /// Keyspace prefix prepended to the source key (may be empty)
    pub prefix: String,
    /// Extension override; falls back to the format's extension
    pub extension: Option<String>,
}

impl NamingRule {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extension: None,
        }
    }

    pub fn key(&self, object_ref: &ObjectReference, width: u32, format: VariantFormat) -> String {
        let ext = self.extension.as_deref().unwrap_or(format.extension());
        format!("{}{}/{}.{}", self.prefix, object_ref.key, width, ext)
    }
}

/// One target transformation in the variant catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantSpec {
    pub target_width: u32,
    pub format: VariantFormat,
    pub naming_rule: NamingRule,
}

impl VariantSpec {
    pub fn new(target_width: u32, format: VariantFormat, naming_rule: NamingRule) -> Self {
        Self {
            target_width,
            format,
            naming_rule,
        }
    }

    /// Destination key for this variant of `object_ref`.
    pub fn destination_key(&self, object_ref: &ObjectReference) -> String {
        self.naming_rule
            .key(object_ref, self.target_width, self.format)
    }
}

/// Object-level result of one delivery coordinator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Overall {
    AllSucceeded,
    PartialFailure,
    TotalFailure,
}

/// Result of delivering one variant.
#[derive(Debug, Clone)]
pub struct VariantOutcome {
    pub spec: VariantSpec,
    /// Destination key the variant was (or would have been) written to
    pub key: String,
    pub result: Result<(), PipelineError>,
}

/// Aggregated per-variant results for one source object.
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub object_ref: ObjectReference,
    /// BLAKE3 digest of the source bytes, when they were fetched
    pub source_digest: Option<String>,
    /// Fetch or decode failure that prevented any variant work
    pub source_error: Option<PipelineError>,
    pub variants: Vec<VariantOutcome>,
    pub overall: Overall,
}

impl ProcessingOutcome {
    /// Outcome when the source could not be fetched or decoded.
    pub fn source_failure(
        object_ref: ObjectReference,
        source_digest: Option<String>,
        error: PipelineError,
    ) -> Self {
        Self {
            object_ref,
            source_digest,
            source_error: Some(error),
            variants: Vec::new(),
            overall: Overall::TotalFailure,
        }
    }

    /// Aggregate per-variant results into an object-level outcome.
    ///
    /// `TotalFailure` only when every variant failed and none of the failures
    /// is retryable; any mix involving a retryable failure or a success is a
    /// `PartialFailure`.
    pub fn aggregate(
        object_ref: ObjectReference,
        source_digest: Option<String>,
        variants: Vec<VariantOutcome>,
    ) -> Self {
        let failed = variants.iter().filter(|v| v.result.is_err()).count();
        let any_retryable = variants
            .iter()
            .any(|v| matches!(&v.result, Err(e) if e.is_retryable()));

        let overall = if failed == 0 {
            Overall::AllSucceeded
        } else if failed == variants.len() && !any_retryable {
            Overall::TotalFailure
        } else {
            Overall::PartialFailure
        };

        Self {
            object_ref,
            source_digest,
            source_error: None,
            variants,
            overall,
        }
    }

    /// Whether redelivering the notification could complete the object.
    pub fn is_retryable(&self) -> bool {
        match self.overall {
            Overall::AllSucceeded => false,
            Overall::PartialFailure => true,
            Overall::TotalFailure => self
                .source_error
                .as_ref()
                .is_some_and(PipelineError::is_retryable),
        }
    }

    /// First failure that must halt the orchestrator, if any.
    pub fn fatal_error(&self) -> Option<&PipelineError> {
        self.errors().find(|e| e.is_fatal())
    }

    /// All recorded failures, source first.
    pub fn errors(&self) -> impl Iterator<Item = &PipelineError> {
        self.source_error
            .iter()
            .chain(self.variants.iter().filter_map(|v| v.result.as_ref().err()))
    }

    /// Destination keys that were written successfully.
    pub fn delivered_keys(&self) -> Vec<&str> {
        self.variants
            .iter()
            .filter(|v| v.result.is_ok())
            .map(|v| v.key.as_str())
            .collect()
    }
}

/// Terminal state of one delivery attempt of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// All variants persisted; notification deleted
    Acknowledged,
    /// Not acknowledged; the consumer will redeliver it
    AwaitingRedelivery,
    /// Permanently failed; recorded in the dead-letter sink and acknowledged
    DeadLettered,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Disposition::Acknowledged => "acknowledged",
            Disposition::AwaitingRedelivery => "awaiting_redelivery",
            Disposition::DeadLettered => "dead_lettered",
        };
        f.write_str(s)
    }
}

/// Serializable summary of one variant's delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantReport {
    pub width: u32,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Serializable summary of a [`ProcessingOutcome`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub container: String,
    pub key: String,
    pub overall: Overall,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    pub variants: Vec<VariantReport>,
}

impl From<&ProcessingOutcome> for OutcomeReport {
    fn from(outcome: &ProcessingOutcome) -> Self {
        Self {
            container: outcome.object_ref.container_id.clone(),
            key: outcome.object_ref.key.clone(),
            overall: outcome.overall,
            source_digest: outcome.source_digest.clone(),
            source_error: outcome.source_error.as_ref().map(|e| e.to_string()),
            variants: outcome
                .variants
                .iter()
                .map(|v| VariantReport {
                    width: v.spec.target_width,
                    key: v.key.clone(),
                    error: v.result.as_ref().err().map(|e| e.to_string()),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(width: u32) -> VariantSpec {
        VariantSpec::new(width, VariantFormat::Jpeg, NamingRule::default())
    }

    fn ok(width: u32) -> VariantOutcome {
        VariantOutcome {
            spec: spec(width),
            key: format!("k/{width}.jpg"),
            result: Ok(()),
        }
    }

    fn failed(width: u32, error: PipelineError) -> VariantOutcome {
        VariantOutcome {
            spec: spec(width),
            key: format!("k/{width}.jpg"),
            result: Err(error),
        }
    }

    fn transient() -> PipelineError {
        PipelineError::TransientIo {
            operation: "put",
            target: "out/k".to_string(),
            message: "503".to_string(),
        }
    }

    fn encode_error(width: u32) -> PipelineError {
        PipelineError::Encode {
            width,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_destination_key_without_prefix() {
        let object = ObjectReference::new("uploads", "photos/cat.png");
        assert_eq!(spec(100).destination_key(&object), "photos/cat.png/100.jpg");
    }

    #[test]
    fn test_destination_key_with_prefix_and_extension() {
        let object = ObjectReference::new("uploads", "cat.png");
        let rule = NamingRule {
            prefix: "resized/".to_string(),
            extension: Some("jpeg".to_string()),
        };
        let spec = VariantSpec::new(500, VariantFormat::Jpeg, rule);
        assert_eq!(spec.destination_key(&object), "resized/cat.png/500.jpeg");
    }

    #[test]
    fn test_naming_rule_distinguishes_objects_and_widths() {
        let a = ObjectReference::new("uploads", "a.png");
        let b = ObjectReference::new("uploads", "b.png");
        assert_ne!(spec(100).destination_key(&a), spec(100).destination_key(&b));
        assert_ne!(spec(100).destination_key(&a), spec(500).destination_key(&a));
    }

    #[test]
    fn test_aggregate_all_succeeded() {
        let outcome = ProcessingOutcome::aggregate(
            ObjectReference::new("c", "k"),
            None,
            vec![ok(100), ok(500)],
        );
        assert_eq!(outcome.overall, Overall::AllSucceeded);
        assert!(!outcome.is_retryable());
    }

    #[test]
    fn test_aggregate_partial_failure() {
        let outcome = ProcessingOutcome::aggregate(
            ObjectReference::new("c", "k"),
            None,
            vec![ok(100), failed(500, transient()), ok(1000)],
        );
        assert_eq!(outcome.overall, Overall::PartialFailure);
        assert!(outcome.is_retryable());
        assert_eq!(outcome.delivered_keys(), vec!["k/100.jpg", "k/1000.jpg"]);
    }

    #[test]
    fn test_aggregate_all_non_retryable_is_total() {
        let outcome = ProcessingOutcome::aggregate(
            ObjectReference::new("c", "k"),
            None,
            vec![failed(100, encode_error(100)), failed(500, encode_error(500))],
        );
        assert_eq!(outcome.overall, Overall::TotalFailure);
        assert!(!outcome.is_retryable());
    }

    #[test]
    fn test_aggregate_all_retryable_is_partial() {
        let outcome = ProcessingOutcome::aggregate(
            ObjectReference::new("c", "k"),
            None,
            vec![failed(100, transient()), failed(500, transient())],
        );
        assert_eq!(outcome.overall, Overall::PartialFailure);
        assert!(outcome.is_retryable());
    }

    #[test]
    fn test_source_failure_retryability_follows_error() {
        let object = ObjectReference::new("c", "k");
        let missing = ProcessingOutcome::source_failure(
            object.clone(),
            None,
            PipelineError::NotFound {
                container: "c".to_string(),
                key: "k".to_string(),
            },
        );
        assert_eq!(missing.overall, Overall::TotalFailure);
        assert!(!missing.is_retryable());

        let flaky = ProcessingOutcome::source_failure(object, None, transient());
        assert!(flaky.is_retryable());
    }

    #[test]
    fn test_fatal_error_found_in_variants() {
        let fatal = PipelineError::Fatal {
            operation: "put",
            target: "out/k".to_string(),
            message: "AccessDenied".to_string(),
        };
        let outcome = ProcessingOutcome::aggregate(
            ObjectReference::new("c", "k"),
            None,
            vec![ok(100), failed(500, fatal.clone())],
        );
        assert_eq!(outcome.fatal_error(), Some(&fatal));
    }

    #[test]
    fn test_report_serializes_errors() {
        let outcome = ProcessingOutcome::aggregate(
            ObjectReference::new("c", "k"),
            Some("abc".to_string()),
            vec![ok(100), failed(500, transient())],
        );
        let report = OutcomeReport::from(&outcome);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["overall"], "partial_failure");
        assert!(json["variants"][0].get("error").is_none());
        assert!(json["variants"][1]["error"]
            .as_str()
            .unwrap()
            .contains("Transient put failure"));
    }

    #[test]
    fn test_notification_attempt_starts_at_one() {
        let n = Notification::new(ObjectReference::new("c", "k"), Receipt::new("r"));
        assert_eq!(n.attempt, 1);
        assert_eq!(n.clone().with_attempt(0).attempt, 1);
        assert_eq!(n.with_attempt(3).attempt, 3);
    }
}
