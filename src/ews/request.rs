use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::error::{PipelineError, Result};
use crate::ews::{MESSAGES_NS, SOAP_NS, TYPES_NS};

const SERVER_VERSION: &str = "Exchange2013";

/// Builds the SOAP `GetAttachment` request for a single attachment id.
///
/// The id ends up in an attribute value, which the writer escapes, so ids
/// carrying `"`, `<` or `&` cannot break out of the document.
pub fn build_get_attachment(attachment_id: &str) -> Result<String> {
    let mut writer = Writer::new(Vec::new());

    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
    )?;
    write(
        &mut writer,
        Event::Start(BytesStart::new("soap:Envelope").with_attributes([
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
            ("xmlns:xsd", "http://www.w3.org/2001/XMLSchema"),
            ("xmlns:soap", SOAP_NS),
            ("xmlns:t", TYPES_NS),
        ])),
    )?;

    write(&mut writer, Event::Start(BytesStart::new("soap:Header")))?;
    write(
        &mut writer,
        Event::Empty(
            BytesStart::new("t:RequestServerVersion").with_attributes([("Version", SERVER_VERSION)]),
        ),
    )?;
    write(&mut writer, Event::End(BytesEnd::new("soap:Header")))?;

    write(&mut writer, Event::Start(BytesStart::new("soap:Body")))?;
    write(
        &mut writer,
        Event::Start(
            BytesStart::new("GetAttachment")
                .with_attributes([("xmlns", MESSAGES_NS), ("xmlns:t", TYPES_NS)]),
        ),
    )?;
    write(&mut writer, Event::Empty(BytesStart::new("AttachmentShape")))?;
    write(&mut writer, Event::Start(BytesStart::new("AttachmentIds")))?;
    write(
        &mut writer,
        Event::Empty(BytesStart::new("t:AttachmentId").with_attributes([("Id", attachment_id)])),
    )?;
    write(&mut writer, Event::End(BytesEnd::new("AttachmentIds")))?;
    write(&mut writer, Event::End(BytesEnd::new("GetAttachment")))?;
    write(&mut writer, Event::End(BytesEnd::new("soap:Body")))?;
    write(&mut writer, Event::End(BytesEnd::new("soap:Envelope")))?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| PipelineError::RequestEncoding(e.to_string()))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| PipelineError::RequestEncoding(e.to_string()))
}
