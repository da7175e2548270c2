//! XML documents: root element, declared encoding, title and character data.

use burrow_streams::Stream;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use super::{read_limited, skip_bom_and_space};
use crate::analyzer::{AnalyzerFactory, EndAnalyzer, EndAnalyzerFactory};
use crate::{AnalysisResult, AnalyzerConfig, AnalyzerError, FieldRegister, FieldType};

pub const TITLE_FIELD: &str = "content.title";
pub const ENCODING_FIELD: &str = "document.encoding";
pub const ROOT_FIELD: &str = "document.root";

pub struct XmlEndFactory;

impl AnalyzerFactory for XmlEndFactory {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn register_fields(&self, fields: &mut FieldRegister) {
        fields.register(TITLE_FIELD, FieldType::Text, 1);
        fields.register(ENCODING_FIELD, FieldType::Text, 1);
        fields.register(ROOT_FIELD, FieldType::Text, 1);
    }
}

impl EndAnalyzerFactory for XmlEndFactory {
    fn create(&self, config: &AnalyzerConfig) -> Box<dyn EndAnalyzer> {
        Box::new(XmlEndAnalyzer {
            limit: config.markup_limit,
        })
    }
}

pub struct XmlEndAnalyzer {
    limit: usize,
}

/// What one parse of a document produced.
#[derive(Debug, Default)]
struct Parsed {
    root: Option<String>,
    encoding: Option<String>,
    title: Option<String>,
    text: Vec<String>,
}

impl EndAnalyzer for XmlEndAnalyzer {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn check_header(&self, header: &[u8]) -> bool {
        skip_bom_and_space(header).starts_with(b"<?xml")
    }

    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn Stream<u8>,
    ) -> Result<(), AnalyzerError> {
        let (data, complete) = read_limited(input, self.limit)?;
        if !complete {
            return Err(AnalyzerError::Format(format!(
                "document larger than {} bytes",
                self.limit
            )));
        }
        let parsed = parse(&data)?;

        result.set_mime_type("text/xml");
        if let Some(root) = parsed.root {
            result.add_field(ROOT_FIELD, root);
        }
        if let Some(encoding) = parsed.encoding {
            result.add_field(ENCODING_FIELD, encoding);
        }
        if let Some(title) = parsed.title {
            result.add_field(TITLE_FIELD, title);
        }
        for text in &parsed.text {
            result.add_text(text);
        }
        Ok(())
    }
}

fn parse(data: &[u8]) -> Result<Parsed, AnalyzerError> {
    let data = data.strip_prefix(b"\xef\xbb\xbf").unwrap_or(data);
    let mut reader = Reader::from_reader(data);
    reader.trim_text(true);
    reader.check_end_names(false);

    let mut parsed = Parsed::default();
    let mut in_title = false;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| AnalyzerError::Format(e.to_string()))?;
        match event {
            Event::Decl(decl) => {
                if let Some(Ok(encoding)) = decl.encoding() {
                    parsed.encoding = Some(String::from_utf8_lossy(&encoding).into_owned());
                }
            }
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                in_title = name.eq_ignore_ascii_case("title");
                if parsed.root.is_none() {
                    parsed.root = Some(name);
                }
            }
            Event::Empty(e) => {
                if parsed.root.is_none() {
                    parsed.root = Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                }
            }
            Event::End(_) => in_title = false,
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| AnalyzerError::Format(e.to_string()))?
                    .into_owned();
                if in_title && parsed.title.is_none() {
                    parsed.title = Some(text.clone());
                }
                parsed.text.push(text);
            }
            Event::CData(c) => {
                parsed.text.push(String::from_utf8_lossy(&c).into_owned());
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if parsed.root.is_none() {
        return Err(AnalyzerError::Format("no root element".to_string()));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document() {
        let doc = br#"<?xml version="1.0" encoding="UTF-8"?>
<rss><channel><title>News &amp; notes</title><item>first</item><![CDATA[raw <b>]]></channel></rss>"#;
        let parsed = parse(doc).unwrap();
        assert_eq!(parsed.root.as_deref(), Some("rss"));
        assert_eq!(parsed.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(parsed.title.as_deref(), Some("News & notes"));
        assert_eq!(parsed.text, ["News & notes", "first", "raw <b>"]);
    }

    #[test]
    fn test_malformed_is_format_error() {
        assert!(matches!(
            parse(b"<?xml version=\"1.0\"?><a><!-- never closed"),
            Err(AnalyzerError::Format(_))
        ));
        assert!(matches!(
            parse(b"<?xml version=\"1.0\"?>"),
            Err(AnalyzerError::Format(_))
        ));
    }

    #[test]
    fn test_check_header() {
        let analyzer = XmlEndAnalyzer { limit: 100 };
        assert!(analyzer.check_header(b"\xef\xbb\xbf\n<?xml version=\"1.0\"?>"));
        assert!(!analyzer.check_header(b"<html>"));
    }
}
