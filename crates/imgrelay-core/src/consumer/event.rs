//! S3 event-notification message bodies.

use serde::Deserialize;

use crate::error::ConsumerError;
use crate::types::ObjectReference;

#[derive(Debug, Deserialize)]
struct S3Event {
    #[serde(rename = "Records", default)]
    records: Vec<S3EventRecord>,

    /// Set to `s3:TestEvent` on the test message S3 sends when notifications are configured
    #[serde(rename = "Event")]
    event: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S3EventRecord {
    #[serde(default)]
    event_name: String,
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct S3Object {
    key: String,
}

/// What a message body turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBody {
    /// A newly created source object
    Object(ObjectReference),
    /// Valid JSON that is not an object notification; safe to discard
    Ignored(String),
}

/// Parse an S3 event-notification body.
///
/// S3 emits one record per message, so only the first record is used. Keys
/// arrive URL-encoded with `+` for spaces.
pub fn parse_event_body(body: &str) -> Result<EventBody, ConsumerError> {
    let event: S3Event = serde_json::from_str(body)?;

    if let Some(kind) = event.event {
        return Ok(EventBody::Ignored(kind));
    }

    let Some(record) = event.records.into_iter().next() else {
        return Ok(EventBody::Ignored("no records".to_string()));
    };

    if !record.event_name.is_empty() && !record.event_name.starts_with("ObjectCreated") {
        return Ok(EventBody::Ignored(record.event_name));
    }

    let key = decode_key(&record.s3.object.key);
    Ok(EventBody::Object(ObjectReference::new(
        record.s3.bucket.name,
        key,
    )))
}

fn decode_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(key) => key.into_owned(),
        Err(e) => {
            tracing::warn!(key = %raw, "Object key is not valid percent-encoded UTF-8: {e}");
            spaced
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(bucket: &str, key: &str, event_name: &str) -> String {
        serde_json::json!({
            "Records": [{
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "awsRegion": "us-east-1",
                "eventName": event_name,
                "s3": {
                    "s3SchemaVersion": "1.0",
                    "bucket": { "name": bucket, "arn": format!("arn:aws:s3:::{bucket}") },
                    "object": { "key": key, "size": 1024, "eTag": "abc" }
                }
            }]
        })
        .to_string()
    }

    #[test]
    fn test_parses_object_created() {
        let parsed = parse_event_body(&body("uploads", "photos/cat.png", "ObjectCreated:Put")).unwrap();
        assert_eq!(
            parsed,
            EventBody::Object(ObjectReference::new("uploads", "photos/cat.png"))
        );
    }

    #[test]
    fn test_decodes_url_encoded_key() {
        let parsed =
            parse_event_body(&body("uploads", "holiday+pics/caf%C3%A9+1.png", "ObjectCreated:Put"))
                .unwrap();
        assert_eq!(
            parsed,
            EventBody::Object(ObjectReference::new("uploads", "holiday pics/café 1.png"))
        );
    }

    #[test]
    fn test_literal_plus_is_percent_encoded() {
        let parsed = parse_event_body(&body("uploads", "a%2Bb.png", "ObjectCreated:Put")).unwrap();
        assert_eq!(
            parsed,
            EventBody::Object(ObjectReference::new("uploads", "a+b.png"))
        );
    }

    #[test]
    fn test_test_event_is_ignored() {
        let test_event = r#"{"Service":"Amazon S3","Event":"s3:TestEvent","Time":"2024-01-01T00:00:00.000Z","Bucket":"uploads"}"#;
        assert_eq!(
            parse_event_body(test_event).unwrap(),
            EventBody::Ignored("s3:TestEvent".to_string())
        );
    }

    #[test]
    fn test_empty_records_ignored() {
        assert!(matches!(
            parse_event_body(r#"{"Records":[]}"#).unwrap(),
            EventBody::Ignored(_)
        ));
    }

    #[test]
    fn test_removal_events_ignored() {
        let parsed = parse_event_body(&body("uploads", "a.png", "ObjectRemoved:Delete")).unwrap();
        assert_eq!(parsed, EventBody::Ignored("ObjectRemoved:Delete".to_string()));
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(matches!(
            parse_event_body("not json"),
            Err(ConsumerError::Event(_))
        ));
    }
}
