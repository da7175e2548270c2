//! Stream over the output of an external helper process.
//!
//! Input is spooled to an anonymous temporary file before the helper starts
//! so the helper reads it as a regular file. Writing into a pipe while also
//! reading the helper's output from the same thread could block forever.

use std::io::{Read, Seek, SeekFrom, Write};
use std::process::{Child, ChildStdout, Command, Stdio};

use tracing::debug;

use crate::{BufferedStream, Fill, Filled, Stream, StreamError};

/// Reads the standard output of a helper process.
pub struct ProcessSource {
    command: String,
    child: Child,
    stdout: ChildStdout,
    exited: bool,
}

impl ProcessSource {
    /// Start `argv` with the remaining contents of `input` (if any) on its
    /// standard input.
    pub fn spawn(
        argv: &[String],
        input: Option<&mut dyn Stream<u8>>,
    ) -> Result<ProcessStream, StreamError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| StreamError::Process("empty helper command".to_string()))?;

        let stdin = match input {
            Some(input) => Stdio::from(spool(input)?),
            None => Stdio::null(),
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(StreamError::Process(format!("{}: no output pipe", program)));
            }
        };

        debug!(command = %program, pid = child.id(), "Helper started");

        Ok(BufferedStream::new(Self {
            command: program.clone(),
            child,
            stdout,
            exited: false,
        }))
    }
}

fn spool(input: &mut dyn Stream<u8>) -> Result<std::fs::File, StreamError> {
    let mut file = tempfile::tempfile()?;
    loop {
        let chunk = input.read(1, 0)?;
        if chunk.is_empty() {
            break;
        }
        file.write_all(chunk)?;
    }
    file.seek(SeekFrom::Start(0))?;
    Ok(file)
}

impl Fill<u8> for ProcessSource {
    fn fill(&mut self, out: &mut [u8]) -> Result<Filled, StreamError> {
        if self.exited {
            return Ok(Filled::End);
        }
        match self.stdout.read(out)? {
            0 => {
                self.exited = true;
                let status = self.child.wait()?;
                if !status.success() {
                    return Err(StreamError::Process(format!(
                        "{} exited with {}",
                        self.command, status
                    )));
                }
                Ok(Filled::End)
            }
            n => Ok(Filled::Data(n)),
        }
    }
}

impl Drop for ProcessSource {
    fn drop(&mut self) {
        if !self.exited {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Stream of helper process output.
pub type ProcessStream = BufferedStream<u8, ProcessSource>;
