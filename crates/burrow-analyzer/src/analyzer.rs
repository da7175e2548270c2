//! Analyzer capabilities and their factories.
//!
//! Factories are stateless descriptors kept by the
//! [`AnalyzerRegistry`](crate::AnalyzerRegistry); they declare fields and
//! build one analyzer instance per nesting depth. Instances are reused for
//! every unit analyzed at that depth.

use burrow_streams::Stream;

use crate::{AnalysisResult, AnalyzerConfig, AnalyzerError, FieldRegister};

/// Behaviour shared by every factory.
pub trait AnalyzerFactory: Send + Sync {
    /// Name used in configuration and logs.
    fn name(&self) -> &'static str;

    /// Declare the fields this analyzer produces.
    fn register_fields(&self, fields: &mut FieldRegister);

    /// Whether the analyzer should be activated under `config`.
    fn wants(&self, config: &AnalyzerConfig) -> bool {
        !config.is_disabled(self.name())
    }
}

/// Sits in the stream chain and may wrap the stream to observe every byte.
pub trait ThroughAnalyzer: Send {
    /// Attach to `result`, returning the stream the next analyzer sees.
    fn connect_input_stream<'s>(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: Box<dyn Stream<u8> + 's>,
    ) -> Box<dyn Stream<u8> + 's>;

    /// Whether the analyzer has seen everything it needs.
    fn is_ready_with_stream(&self) -> bool;

    /// `result` is about to be finished; write pending values and detach.
    fn release(&mut self, result: &mut AnalysisResult<'_>);
}

/// Consumes a unit's stream, possibly recursing into nested units.
pub trait EndAnalyzer: Send {
    fn name(&self) -> &'static str;

    /// Cheap check against the first bytes of the unit.
    fn check_header(&self, header: &[u8]) -> bool;

    /// Analyze the unit. An error after a positive header check hands the
    /// unit to the next candidate.
    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn Stream<u8>,
    ) -> Result<(), AnalyzerError>;
}

/// Receives raw data chunks observed by the event through-analyzer.
pub trait EventAnalyzer: Send {
    fn name(&self) -> &'static str;
    fn start_analysis(&mut self, result: &AnalysisResult<'_>);
    fn handle_data(&mut self, data: &[u8]);
    fn is_ready_with_stream(&self) -> bool;
    /// `complete` is true when the whole stream was observed.
    fn end_analysis(&mut self, result: &mut AnalysisResult<'_>, complete: bool);
}

/// Receives the unit's text one line at a time.
pub trait LineAnalyzer: Send {
    fn name(&self) -> &'static str;
    fn start_analysis(&mut self, result: &AnalysisResult<'_>);
    fn handle_line(&mut self, line: &str);
    fn is_ready_with_stream(&self) -> bool;
    fn end_analysis(&mut self, result: &mut AnalysisResult<'_>, complete: bool);
}

/// Receives markup structure parsed from the unit.
pub trait SaxAnalyzer: Send {
    fn name(&self) -> &'static str;
    fn start_analysis(&mut self, result: &AnalysisResult<'_>);
    fn start_element(&mut self, name: &str, attributes: &[(String, String)]);
    fn end_element(&mut self, name: &str);
    fn characters(&mut self, text: &str);
    fn end_analysis(&mut self, result: &mut AnalysisResult<'_>, complete: bool);
}

pub trait ThroughAnalyzerFactory: AnalyzerFactory {
    fn create(&self, config: &AnalyzerConfig) -> Box<dyn ThroughAnalyzer>;
}

pub trait EndAnalyzerFactory: AnalyzerFactory {
    fn create(&self, config: &AnalyzerConfig) -> Box<dyn EndAnalyzer>;
}

pub trait EventAnalyzerFactory: AnalyzerFactory {
    fn create(&self, config: &AnalyzerConfig) -> Box<dyn EventAnalyzer>;
}

pub trait LineAnalyzerFactory: AnalyzerFactory {
    fn create(&self, config: &AnalyzerConfig) -> Box<dyn LineAnalyzer>;
}

pub trait SaxAnalyzerFactory: AnalyzerFactory {
    fn create(&self, config: &AnalyzerConfig) -> Box<dyn SaxAnalyzer>;
}
