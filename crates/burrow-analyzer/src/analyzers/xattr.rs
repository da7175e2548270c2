//! Extended attributes of top-level files.
//!
//! Each attribute becomes one `name=value` entry of [`XATTR_FIELD`]. The
//! stream is passed on untouched. Nested units have no file of their own
//! and are ignored.

use std::io;

use burrow_streams::Stream;
use tracing::debug;

use crate::analyzer::{AnalyzerFactory, ThroughAnalyzer, ThroughAnalyzerFactory};
use crate::{AnalysisResult, AnalyzerConfig, FieldRegister, FieldType};

pub const XATTR_FIELD: &str = "file.xattr";

/// Largest attribute name list or value read.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
const MAX_ATTR_BYTES: usize = 256 * 1024;

pub struct XattrThroughFactory;

impl AnalyzerFactory for XattrThroughFactory {
    fn name(&self) -> &'static str {
        "xattr"
    }

    fn register_fields(&self, fields: &mut FieldRegister) {
        fields.register(XATTR_FIELD, FieldType::Text, 0);
    }
}

impl ThroughAnalyzerFactory for XattrThroughFactory {
    fn create(&self, _config: &AnalyzerConfig) -> Box<dyn ThroughAnalyzer> {
        Box::new(XattrThroughAnalyzer)
    }
}

pub struct XattrThroughAnalyzer;

impl ThroughAnalyzer for XattrThroughAnalyzer {
    fn connect_input_stream<'s>(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: Box<dyn Stream<u8> + 's>,
    ) -> Box<dyn Stream<u8> + 's> {
        if result.depth() != 0 {
            return input;
        }
        match read_attributes(result.path()) {
            Ok(attributes) => {
                for (name, value) in attributes {
                    let value = String::from_utf8_lossy(&value);
                    result.add_field(XATTR_FIELD, format!("{}={}", name, value.trim_end_matches('\0')));
                }
            }
            Err(e) => debug!(path = result.path(), error = %e, "Cannot list extended attributes"),
        }
        input
    }

    fn is_ready_with_stream(&self) -> bool {
        true
    }

    fn release(&mut self, _result: &mut AnalysisResult<'_>) {}
}

/// Name and raw value of every attribute of `path`, without following a
/// final symlink.
#[cfg(target_os = "linux")]
pub fn read_attributes(path: &str) -> io::Result<Vec<(String, Vec<u8>)>> {
    use std::ffi::CString;

    let c_path = CString::new(path).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let names = read_sized(|buf| unsafe {
        libc::llistxattr(c_path.as_ptr(), buf.as_mut_ptr() as *mut libc::c_char, buf.len())
    })?;

    let mut attributes = Vec::new();
    for name in names.split(|&b| b == 0).filter(|n| !n.is_empty()) {
        let Ok(c_name) = CString::new(name) else {
            continue;
        };
        let value = read_sized(|buf| unsafe {
            libc::lgetxattr(
                c_path.as_ptr(),
                c_name.as_ptr(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        });
        match value {
            Ok(value) => attributes.push((String::from_utf8_lossy(name).into_owned(), value)),
            Err(e) => debug!(path, error = %e, "Cannot read extended attribute"),
        }
    }
    Ok(attributes)
}

#[cfg(not(target_os = "linux"))]
pub fn read_attributes(_path: &str) -> io::Result<Vec<(String, Vec<u8>)>> {
    Ok(Vec::new())
}

/// Call `get` with a buffer that doubles on `ERANGE` up to
/// [`MAX_ATTR_BYTES`], returning the filled part.
#[cfg(target_os = "linux")]
fn read_sized(mut get: impl FnMut(&mut [u8]) -> libc::ssize_t) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; 1024];
    loop {
        let n = get(&mut buf);
        if n >= 0 {
            buf.truncate(n as usize);
            return Ok(buf);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ERANGE) && buf.len() < MAX_ATTR_BYTES {
            let len = (buf.len() * 2).min(MAX_ATTR_BYTES);
            buf.resize(len, 0);
            continue;
        }
        return Err(err);
    }
}
