//! Ordered registry of analyzer factories.
//!
//! Registration order is the order in which through-analyzers are chained
//! and end analyzers are tried, so earlier registrations win ties.

use tracing::debug;

use crate::analyzer::{
    AnalyzerFactory, EndAnalyzer, EndAnalyzerFactory, EventAnalyzerFactory, LineAnalyzerFactory,
    SaxAnalyzerFactory, ThroughAnalyzer, ThroughAnalyzerFactory,
};
use crate::analyzers;
use crate::{AnalyzerConfig, FieldRegister};

/// Kind of a registered factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerKind {
    Through,
    End,
    Event,
    Line,
    Sax,
}

impl AnalyzerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerKind::Through => "through",
            AnalyzerKind::End => "end",
            AnalyzerKind::Event => "event",
            AnalyzerKind::Line => "line",
            AnalyzerKind::Sax => "sax",
        }
    }
}

/// Factories for every analyzer kind plus the shared field register.
pub struct AnalyzerRegistry {
    config: AnalyzerConfig,
    fields: FieldRegister,
    through: Vec<Box<dyn ThroughAnalyzerFactory>>,
    end: Vec<Box<dyn EndAnalyzerFactory>>,
    event: Vec<Box<dyn EventAnalyzerFactory>>,
    line: Vec<Box<dyn LineAnalyzerFactory>>,
    sax: Vec<Box<dyn SaxAnalyzerFactory>>,
    order: Vec<(AnalyzerKind, &'static str)>,
}

impl AnalyzerRegistry {
    /// Empty registry.
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            fields: FieldRegister::new(),
            through: Vec::new(),
            end: Vec::new(),
            event: Vec::new(),
            line: Vec::new(),
            sax: Vec::new(),
            order: Vec::new(),
        }
    }

    /// Registry with the built-in analyzers.
    pub fn with_defaults(config: AnalyzerConfig) -> Self {
        let mut registry = Self::new(config);
        registry.register_event(Box::new(analyzers::mime::MimeEventFactory));
        registry.register_line(Box::new(analyzers::m3u::M3uLineFactory));
        registry.register_sax(Box::new(analyzers::html::HtmlSaxFactory));
        registry.register_through(Box::new(analyzers::digest::DigestThroughFactory));
        registry.register_through(Box::new(analyzers::id3v2::Id3v2ThroughFactory));
        registry.register_through(Box::new(analyzers::au::AuThroughFactory));
        registry.register_through(Box::new(analyzers::xattr::XattrThroughFactory));
        registry.register_end(Box::new(analyzers::bz2::Bz2EndFactory));
        registry.register_end(Box::new(analyzers::gzip::GzipEndFactory));
        registry.register_end(Box::new(analyzers::tar::TarEndFactory));
        registry.register_end(Box::new(analyzers::xml::XmlEndFactory));
        registry.register_end(Box::new(analyzers::helper::HelperEndFactory));
        registry.register_end(Box::new(analyzers::text::TextEndFactory));
        registry
    }

    /// Keep the factory and declare its fields unless it declines.
    fn accept<F: AnalyzerFactory + ?Sized>(&mut self, factory: &F, kind: AnalyzerKind) -> bool {
        if !factory.wants(&self.config) {
            debug!(analyzer = factory.name(), kind = kind.as_str(), "Analyzer declined");
            return false;
        }
        factory.register_fields(&mut self.fields);
        self.order.push((kind, factory.name()));
        true
    }

    pub fn register_through(&mut self, factory: Box<dyn ThroughAnalyzerFactory>) -> bool {
        let accepted = self.accept(&*factory, AnalyzerKind::Through);
        if accepted {
            self.through.push(factory);
        }
        accepted
    }

    pub fn register_end(&mut self, factory: Box<dyn EndAnalyzerFactory>) -> bool {
        let accepted = self.accept(&*factory, AnalyzerKind::End);
        if accepted {
            self.end.push(factory);
        }
        accepted
    }

    pub fn register_event(&mut self, factory: Box<dyn EventAnalyzerFactory>) -> bool {
        let accepted = self.accept(&*factory, AnalyzerKind::Event);
        if accepted {
            self.event.push(factory);
        }
        accepted
    }

    pub fn register_line(&mut self, factory: Box<dyn LineAnalyzerFactory>) -> bool {
        let accepted = self.accept(&*factory, AnalyzerKind::Line);
        if accepted {
            self.line.push(factory);
        }
        accepted
    }

    pub fn register_sax(&mut self, factory: Box<dyn SaxAnalyzerFactory>) -> bool {
        let accepted = self.accept(&*factory, AnalyzerKind::Sax);
        if accepted {
            self.sax.push(factory);
        }
        accepted
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn fields(&self) -> &FieldRegister {
        &self.fields
    }

    /// Accepted analyzers in registration order.
    pub fn analyzers(&self) -> &[(AnalyzerKind, &'static str)] {
        &self.order
    }

    /// One through-analyzer per through factory, in order, followed by the
    /// event dispatcher when any event, line or markup analyzers exist.
    pub(crate) fn create_through(&self) -> Vec<Box<dyn ThroughAnalyzer>> {
        let mut through: Vec<Box<dyn ThroughAnalyzer>> = self
            .through
            .iter()
            .map(|f| f.create(&self.config))
            .collect();

        if !(self.event.is_empty() && self.line.is_empty() && self.sax.is_empty()) {
            through.push(Box::new(analyzers::event::EventThroughAnalyzer::new(
                self.event.iter().map(|f| f.create(&self.config)).collect(),
                self.line.iter().map(|f| f.create(&self.config)).collect(),
                self.sax.iter().map(|f| f.create(&self.config)).collect(),
                self.config.markup_limit,
            )));
        }
        through
    }

    /// One end analyzer per end factory, in order.
    pub(crate) fn create_end(&self) -> Vec<Box<dyn EndAnalyzer>> {
        self.end.iter().map(|f| f.create(&self.config)).collect()
    }
}
