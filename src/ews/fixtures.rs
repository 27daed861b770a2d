use base64::prelude::BASE64_STANDARD;
use base64::Engine;

pub(crate) enum Part<'a> {
    File { name: &'a str, content: &'a [u8] },
    Item { name: &'a str },
}

/// A `GetAttachmentResponse` as Exchange 2013 returns it.
pub(crate) fn response(code: &str, parts: &[Part<'_>]) -> String {
    let attachments: String = parts
        .iter()
        .map(|part| match part {
            Part::File { name, content } => format!(
                "<t:FileAttachment><t:AttachmentId Id=\"x\"/><t:Name>{}</t:Name>\
                 <t:ContentType>application/octet-stream</t:ContentType>\
                 <t:Content>{}</t:Content></t:FileAttachment>",
                name,
                BASE64_STANDARD.encode(content)
            ),
            Part::Item { name } => format!(
                "<t:ItemAttachment><t:Name>{}</t:Name><t:Message/></t:ItemAttachment>",
                name
            ),
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Header>
    <h:ServerVersionInfo MajorVersion="15" MinorVersion="0" xmlns:h="http://schemas.microsoft.com/exchange/services/2006/types"/>
  </s:Header>
  <s:Body>
    <m:GetAttachmentResponse xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages"
        xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">
      <m:ResponseMessages>
        <m:GetAttachmentResponseMessage ResponseClass="Success">
          <m:ResponseCode>{code}</m:ResponseCode>
          <m:Attachments>{attachments}</m:Attachments>
        </m:GetAttachmentResponseMessage>
      </m:ResponseMessages>
    </m:GetAttachmentResponse>
  </s:Body>
</s:Envelope>"#
    )
}
