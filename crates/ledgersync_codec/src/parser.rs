//! Structural parse of sanitized documents into an [`Element`] tree.

use crate::element::Element;
use crate::error::{CodecError, CodecResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Name of the synthetic node that holds the top-level elements.
pub const DOCUMENT_NODE: &str = "#document";

fn xml<E: std::fmt::Display>(e: E) -> CodecError {
    CodecError::malformed(e.to_string())
}

/// Parses a sanitized document.
///
/// The returned element is a synthetic [`DOCUMENT_NODE`] whose children are
/// the document's top-level elements.
pub fn parse_document(text: &str) -> CodecResult<Element> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut stack = vec![Element::new(DOCUMENT_NODE)];

    loop {
        match reader.read_event().map_err(xml)? {
            Event::Start(e) => stack.push(open(&e)?),
            Event::Empty(e) => {
                let element = open(&e)?;
                attach(&mut stack, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| CodecError::malformed("unbalanced end tag"))?;
                attach(&mut stack, element)?;
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(xml)?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&raw));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        let open_name = stack.last().map(|e| e.name.clone()).unwrap_or_default();
        return Err(CodecError::malformed(format!("unclosed element <{open_name}>")));
    }

    let document = stack
        .pop()
        .ok_or_else(|| CodecError::malformed("empty document"))?;
    if document.children.is_empty() {
        return Err(CodecError::malformed("no root element"));
    }
    Ok(document)
}

fn open(start: &BytesStart<'_>) -> CodecResult<Element> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(xml)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml)?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], element: Element) -> CodecResult<()> {
    let parent = stack
        .last_mut()
        .ok_or_else(|| CodecError::malformed("unbalanced end tag"))?;
    parent.children.push(element);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let doc = parse_document(
            r#"<ENVELOPE><BODY><LEDGER NAME="Cash &amp; Bank"><GUID>g-1</GUID><EMPTY/></LEDGER></BODY></ENVELOPE>"#,
        )
        .unwrap();

        let ledger = doc.descendants("LEDGER")[0];
        assert_eq!(ledger.attr("NAME"), Some("Cash & Bank"));
        assert_eq!(ledger.text_of("GUID"), Some("g-1"));
        assert!(ledger.child("EMPTY").is_some());
    }

    #[test]
    fn mismatched_tags_are_malformed() {
        let err = parse_document("<A><B></A>").unwrap_err();
        assert!(matches!(err, CodecError::MalformedDocument { .. }));
    }

    #[test]
    fn unclosed_tags_are_malformed() {
        assert!(parse_document("<A><B>text").is_err());
    }

    #[test]
    fn text_only_is_malformed() {
        assert!(parse_document("not a document").is_err());
    }
}
