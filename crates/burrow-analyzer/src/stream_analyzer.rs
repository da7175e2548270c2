//! Recursive analysis of a unit and everything nested inside it.
//!
//! Each nesting depth owns a pool of analyzer instances. The pool for depth
//! `d` is taken out while a unit at depth `d` is analyzed and put back
//! afterwards, so siblings at the same depth reuse it while deeper units get
//! their own. Only one unit per depth is ever active.

use std::path::Path;
use std::time::UNIX_EPOCH;

use burrow_streams::{FileSource, Stream, StreamError, StreamStatus};
use tracing::{debug, warn};

use crate::analyzer::{EndAnalyzer, ThroughAnalyzer};
use crate::index::IndexWriter;
use crate::{AnalysisError, AnalysisResult, AnalyzerConfig, AnalyzerRegistry, FieldRegister};

/// Bytes skipped per step while draining a unit for its through-analyzers.
const DRAIN_CHUNK: i64 = 1_000_000;

/// Analyzer instances for one nesting depth.
struct DepthPool {
    through: Vec<Box<dyn ThroughAnalyzer>>,
    end: Vec<Box<dyn EndAnalyzer>>,
}

/// Drives the analyzers of a registry over files and streams.
pub struct StreamAnalyzer {
    registry: AnalyzerRegistry,
    pools: Vec<Option<DepthPool>>,
    pools_created: usize,
}

impl StreamAnalyzer {
    pub fn new(registry: AnalyzerRegistry) -> Self {
        Self {
            registry,
            pools: Vec::new(),
            pools_created: 0,
        }
    }

    pub fn registry(&self) -> &AnalyzerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AnalyzerConfig {
        self.registry.config()
    }

    pub fn fields(&self) -> &FieldRegister {
        self.registry.fields()
    }

    /// Number of depth pools instantiated so far.
    pub fn pools_created(&self) -> usize {
        self.pools_created
    }

    /// Analyze the file at `path` and write it through `writer`.
    ///
    /// A file that exists but cannot be opened is still recorded, without
    /// content.
    pub fn analyze_file(
        &mut self,
        path: &Path,
        writer: &dyn IndexWriter,
    ) -> Result<(), AnalysisError> {
        let Some(name) = path.to_str() else {
            return Err(AnalysisError::Rejected {
                path: path.display().to_string(),
                reason: "path is not valid UTF-8".to_string(),
            });
        };
        let metadata = std::fs::metadata(path).map_err(|e| AnalysisError::Rejected {
            path: name.to_string(),
            reason: e.to_string(),
        })?;
        if metadata.is_dir() {
            return Err(AnalysisError::Rejected {
                path: name.to_string(),
                reason: "is a directory".to_string(),
            });
        }
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let mut file = FileSource::open(path);
        let mut result = AnalysisResult::new(name.to_string(), mtime, 0, self, writer);
        let outcome = match file.as_mut() {
            Ok(stream) => Self::analyze_unit(&mut result, Some(stream as &mut dyn Stream<u8>)),
            Err(e) => {
                debug!(path = %name, error = %e, "Cannot open file, recording without content");
                Self::analyze_unit(&mut result, None)
            }
        };
        outcome
    }

    /// Analyze `input` as a top-level unit called `path`.
    pub fn analyze_stream(
        &mut self,
        path: &str,
        mtime: i64,
        input: &mut dyn Stream<u8>,
        writer: &dyn IndexWriter,
    ) -> Result<(), AnalysisError> {
        let mut result = AnalysisResult::new(path.to_string(), mtime, 0, self, writer);
        Self::analyze_unit(&mut result, Some(input))
    }

    /// Run the pool for `result`'s depth over `input`.
    pub(crate) fn analyze_unit(
        result: &mut AnalysisResult<'_>,
        input: Option<&mut dyn Stream<u8>>,
    ) -> Result<(), AnalysisError> {
        let depth = result.depth();
        let mut pool = result.analyzer_mut().checkout(depth);
        let outcome = run_pool(&mut pool, result, input);
        result.analyzer_mut().checkin(depth, pool);
        outcome
    }

    fn checkout(&mut self, depth: u32) -> DepthPool {
        let slot = depth as usize;
        if self.pools.len() <= slot {
            self.pools.resize_with(slot + 1, || None);
        }
        match self.pools[slot].take() {
            Some(pool) => pool,
            None => {
                self.pools_created += 1;
                debug!(depth, "Creating analyzer pool");
                DepthPool {
                    through: self.registry.create_through(),
                    end: self.registry.create_end(),
                }
            }
        }
    }

    fn checkin(&mut self, depth: u32, pool: DepthPool) {
        self.pools[depth as usize] = Some(pool);
    }
}

fn run_pool(
    pool: &mut DepthPool,
    result: &mut AnalysisResult<'_>,
    input: Option<&mut dyn Stream<u8>>,
) -> Result<(), AnalysisError> {
    let Some(input) = input else {
        release(pool, result);
        return Ok(());
    };

    let start = input.position();
    let mut stream: Box<dyn Stream<u8> + '_> = Box::new(input);
    for through in pool.through.iter_mut() {
        stream = through.connect_input_stream(result, stream);
    }
    if stream.position() != start && stream.reset(start) != start {
        warn!(
            path = result.path(),
            position = stream.position(),
            "Through-analyzers left the stream past the start of the unit"
        );
        return abort(pool, result, stream, start);
    }

    // Read the header, then rewind so the end analyzers see the unit from
    // the start.
    let header_size = result.config().header_size;
    let header = match stream.read(header_size, header_size) {
        Ok(header) => header.to_vec(),
        Err(_) => Vec::new(),
    };
    if !header.is_empty() && stream.reset(start) != start {
        warn!(path = result.path(), "Stream cannot rewind after header read");
        return abort(pool, result, stream, start);
    }

    let mut stuck = false;
    if !header.is_empty() {
        for end in pool.end.iter_mut() {
            if !end.check_header(&header) {
                continue;
            }
            match end.analyze(result, &mut *stream) {
                Ok(()) => {
                    debug!(path = result.path(), analyzer = end.name(), "Unit analyzed");
                    break;
                }
                Err(e) => {
                    debug!(
                        path = result.path(),
                        analyzer = end.name(),
                        error = %e,
                        "End analyzer failed"
                    );
                    if stream.status() == StreamStatus::Error {
                        break;
                    }
                    if stream.reset(start) != start {
                        warn!(
                            path = result.path(),
                            analyzer = end.name(),
                            "Stream cannot rewind after failed end analyzer"
                        );
                        stuck = true;
                        break;
                    }
                }
            }
        }
    }
    if stuck {
        return abort(pool, result, stream, start);
    }

    // Read the rest for through-analyzers that need the whole stream.
    while stream.status() == StreamStatus::Ok {
        let ready = stream.size() >= 0 && pool.through.iter().all(|t| t.is_ready_with_stream());
        if ready || stream.skip(DRAIN_CHUNK).is_err() {
            break;
        }
    }

    let outcome = match stream_error(&*stream, result) {
        Some(e) => Err(e),
        None => {
            if stream.size() >= 0 {
                let size = stream.size();
                let field = result.fields().size_field();
                result.add_value(field, size);
            }
            Ok(())
        }
    };
    drop(stream);

    release(pool, result);
    outcome
}

/// Stop analyzing a unit whose stream could not go back to `start`. Fields
/// written so far are kept.
fn abort(
    pool: &mut DepthPool,
    result: &mut AnalysisResult<'_>,
    stream: Box<dyn Stream<u8> + '_>,
    start: i64,
) -> Result<(), AnalysisError> {
    let error = stream_error(&*stream, result).unwrap_or_else(|| AnalysisError::NotRewindable {
        path: result.path().to_string(),
        position: start,
    });
    drop(stream);
    release(pool, result);
    Err(error)
}

fn stream_error(stream: &dyn Stream<u8>, result: &AnalysisResult<'_>) -> Option<AnalysisError> {
    if stream.status() != StreamStatus::Error {
        return None;
    }
    let source = stream
        .error()
        .cloned()
        .unwrap_or_else(|| StreamError::Io("stream failed".to_string()));
    Some(AnalysisError::Stream {
        path: result.path().to_string(),
        source,
    })
}

fn release(pool: &mut DepthPool, result: &mut AnalysisResult<'_>) {
    for through in pool.through.iter_mut() {
        through.release(result);
    }
}
