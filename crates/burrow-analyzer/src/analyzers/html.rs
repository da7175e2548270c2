//! HTML documents: title and link targets.

use crate::analyzer::{AnalyzerFactory, SaxAnalyzer, SaxAnalyzerFactory};
use crate::{AnalysisResult, AnalyzerConfig, FieldRegister, FieldType};

pub const TITLE_FIELD: &str = "content.title";
pub const LINKS_FIELD: &str = "content.links";

pub struct HtmlSaxFactory;

impl AnalyzerFactory for HtmlSaxFactory {
    fn name(&self) -> &'static str {
        "html"
    }

    fn register_fields(&self, fields: &mut FieldRegister) {
        fields.register(TITLE_FIELD, FieldType::Text, 1);
        fields.register(LINKS_FIELD, FieldType::Text, 0);
    }
}

impl SaxAnalyzerFactory for HtmlSaxFactory {
    fn create(&self, _config: &AnalyzerConfig) -> Box<dyn SaxAnalyzer> {
        Box::new(HtmlSaxAnalyzer::default())
    }
}

#[derive(Debug, Default)]
pub struct HtmlSaxAnalyzer {
    started: bool,
    active: bool,
    in_title: bool,
    title: String,
    links: Vec<String>,
}

impl SaxAnalyzer for HtmlSaxAnalyzer {
    fn name(&self) -> &'static str {
        "html"
    }

    fn start_analysis(&mut self, _result: &AnalysisResult<'_>) {
        *self = Self::default();
    }

    fn start_element(&mut self, name: &str, attributes: &[(String, String)]) {
        if !self.started {
            self.started = true;
            self.active = name == "html";
        }
        if !self.active {
            return;
        }
        match name {
            "title" => self.in_title = true,
            "a" => {
                if let Some((_, href)) = attributes.iter().find(|(k, _)| k == "href") {
                    if !href.is_empty() {
                        self.links.push(href.clone());
                    }
                }
            }
            _ => {}
        }
    }

    fn end_element(&mut self, name: &str) {
        if name == "title" {
            self.in_title = false;
        }
    }

    fn characters(&mut self, text: &str) {
        if self.active && self.in_title {
            if !self.title.is_empty() {
                self.title.push(' ');
            }
            self.title.push_str(text.trim());
        }
    }

    fn end_analysis(&mut self, result: &mut AnalysisResult<'_>, _complete: bool) {
        if !self.active {
            return;
        }
        result.set_mime_type("text/html");
        if !self.title.is_empty() {
            result.add_field(TITLE_FIELD, std::mem::take(&mut self.title));
        }
        for link in self.links.drain(..) {
            result.add_field(LINKS_FIELD, link);
        }
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_title_and_links() {
        let mut html = HtmlSaxAnalyzer::default();
        let href = vec![("href".to_string(), "/docs".to_string())];
        html.start_element("html", &[]);
        html.start_element("title", &[]);
        html.characters("Home");
        html.end_element("title");
        html.characters("ignored");
        html.start_element("a", &href);
        html.start_element("a", &[]);

        assert!(html.active);
        assert_eq!(html.title, "Home");
        assert_eq!(html.links, ["/docs"]);
    }

    #[test]
    fn test_other_root_is_ignored() {
        let mut html = HtmlSaxAnalyzer::default();
        html.start_element("svg", &[]);
        html.start_element("title", &[]);
        html.characters("Icon");
        assert!(!html.active);
        assert!(html.title.is_empty());
    }
}
