use crate::error::PipelineError;
use crate::models::{BatchSummary, NotificationRecord};
use aws_lambda_events::event::s3::S3Event;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use tracing::warn;

/// Object keys in S3 notifications are form-encoded: `+` is a space and
/// everything else is percent-escaped.
pub fn decode_object_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Splits an event into usable records and the number of malformed ones.
pub fn records_from_event(event: &S3Event) -> (Vec<NotificationRecord>, usize) {
    let mut records = Vec::with_capacity(event.records.len());
    let mut rejected = 0;

    for record in &event.records {
        let bucket = record.s3.bucket.name.as_deref().filter(|b| !b.is_empty());
        let key = record.s3.object.key.as_deref().filter(|k| !k.is_empty());

        match (bucket, key) {
            (Some(bucket), Some(key)) => {
                records.push(NotificationRecord::new(bucket, decode_object_key(key)));
            }
            _ => {
                warn!("Skipping notification record without bucket name or object key");
                rejected += 1;
            }
        }
    }

    (records, rejected)
}

/// Response envelope returned to the invoking trigger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<BatchSummary>,
}

impl HandlerResponse {
    pub fn from_result(result: Result<BatchSummary, PipelineError>) -> Self {
        match result {
            Ok(summary) => Self {
                status_code: 200,
                body: format!(
                    "Image processing complete: {} resized, {} failed",
                    summary.processed, summary.failed
                ),
                summary: Some(summary),
            },
            Err(e) => Self {
                status_code: 500,
                body: e.to_string(),
                summary: None,
            },
        }
    }
}
