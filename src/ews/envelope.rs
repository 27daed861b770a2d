use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::error::{PipelineError, Result};
use crate::ews::{MESSAGES_NS, NO_ERROR};

/// A namespace-resolved XML element with its concatenated text content.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub namespace: Option<String>,
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    /// First direct child with the given qualified name.
    pub fn child(&self, namespace: &str, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(namespace, name))
    }

    /// Pre-order walk over this element and everything below it, in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    fn open(namespace: ResolveResult, start: &BytesStart) -> Result<Self> {
        let name = std::str::from_utf8(start.local_name().as_ref())
            .map_err(|e| PipelineError::Malformed(e.to_string()))?
            .to_string();
        let namespace = match namespace {
            ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
            ResolveResult::Unbound => None,
            ResolveResult::Unknown(prefix) => {
                return Err(PipelineError::Malformed(format!(
                    "unbound namespace prefix '{}' on <{}>",
                    String::from_utf8_lossy(&prefix),
                    name
                )))
            }
        };
        Ok(Self {
            namespace,
            name,
            ..Default::default()
        })
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

/// Parsed SOAP response for one `GetAttachment` call.
#[derive(Debug)]
pub struct Envelope {
    root: Element,
}

impl Envelope {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut reader = NsReader::from_reader(body);

        let mut buf = Vec::new();
        let mut open: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_resolved_event_into(&mut buf) {
                Ok((ns, Event::Start(start))) => open.push(Element::open(ns, &start)?),
                Ok((ns, Event::Empty(start))) => {
                    let element = Element::open(ns, &start)?;
                    close(&mut open, &mut root, element)?;
                }
                Ok((_, Event::End(_))) => {
                    let element = open
                        .pop()
                        .ok_or_else(|| PipelineError::Malformed("unbalanced end tag".into()))?;
                    close(&mut open, &mut root, element)?;
                }
                Ok((_, Event::Text(text))) => {
                    let text = text
                        .unescape()
                        .map_err(|e| PipelineError::Malformed(e.to_string()))?;
                    if let Some(current) = open.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Ok((_, Event::CData(data))) => {
                    let data = String::from_utf8(data.into_inner().into_owned())
                        .map_err(|e| PipelineError::Malformed(e.to_string()))?;
                    if let Some(current) = open.last_mut() {
                        current.text.push_str(&data);
                    }
                }
                Ok((_, Event::Eof)) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(PipelineError::Malformed(format!(
                        "at byte {}: {}",
                        reader.error_position(),
                        e
                    )))
                }
            }
            buf.clear();
        }

        if !open.is_empty() {
            return Err(PipelineError::Malformed(format!(
                "document ended inside <{}>",
                open.last().map(|e| e.name.as_str()).unwrap_or_default()
            )));
        }
        root.map(|root| Self { root })
            .ok_or_else(|| PipelineError::Malformed("empty document".into()))
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn descendants_named<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.root
            .descendants()
            .filter(move |element| element.is(namespace, name))
    }

    /// Fails on the first `m:ResponseCode` that is not `NoError`.
    pub fn check_response_codes(&self) -> Result<()> {
        match self
            .descendants_named(MESSAGES_NS, "ResponseCode")
            .find(|code| code.text.trim() != NO_ERROR)
        {
            Some(code) => Err(PipelineError::ResponseCode(code.text.trim().to_string())),
            None => Ok(()),
        }
    }
}

fn close(open: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match open.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(PipelineError::Malformed("multiple root elements".into())),
    }
    Ok(())
}
