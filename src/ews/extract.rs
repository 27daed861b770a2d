use base64::prelude::BASE64_STANDARD;
use base64::Engine;

use crate::error::{PipelineError, Result};
use crate::ews::envelope::{Element, Envelope};
use crate::ews::TYPES_NS;

/// A decoded file attachment, handed by value to the storage step.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttachment {
    pub display_name: String,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

/// Yields every `t:FileAttachment` of the envelope in document order.
///
/// Item attachments (forwarded messages, meeting requests) are not
/// returned. A file attachment missing its name or content yields an
/// error, after which the caller should stop consuming.
pub fn extract(envelope: &Envelope) -> impl Iterator<Item = Result<RawAttachment>> + '_ {
    envelope
        .descendants_named(TYPES_NS, "FileAttachment")
        .map(decode_file_attachment)
}

fn decode_file_attachment(element: &Element) -> Result<RawAttachment> {
    let display_name = element
        .child(TYPES_NS, "Name")
        .map(|name| name.text.clone())
        .ok_or_else(|| PipelineError::Malformed("FileAttachment without Name".into()))?;
    let content = element
        .child(TYPES_NS, "Content")
        .ok_or_else(|| {
            PipelineError::Malformed(format!("FileAttachment '{}' without Content", display_name))
        })?;

    // Servers may wrap long base64 payloads across lines.
    let encoded: String = content.text.split_ascii_whitespace().collect();
    let content = BASE64_STANDARD.decode(encoded).map_err(|e| {
        PipelineError::Malformed(format!(
            "FileAttachment '{}' has undecodable content: {}",
            display_name, e
        ))
    })?;

    let content_type = element
        .child(TYPES_NS, "ContentType")
        .map(|ct| ct.text.trim().to_string())
        .filter(|ct| !ct.is_empty());

    Ok(RawAttachment {
        display_name,
        content_type,
        content,
    })
}
