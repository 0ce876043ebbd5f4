//! Subprocess seam for the external transcoding tool

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, ChildStderr, Command, Stdio};

use tracing::debug;

use crate::error::{FramexError, FramexResult};

/// An active transcoding tool subprocess
pub trait ToolProcess {
    /// Read the next line of merged diagnostic output, or `None` at end of
    /// stream. Blocks until the tool produces output.
    fn next_line(&mut self) -> FramexResult<Option<String>>;

    /// Terminate the subprocess forcefully and reap it
    fn kill(&mut self) -> FramexResult<()>;

    /// Wait for the subprocess to run to completion
    fn wait(&mut self) -> FramexResult<()>;
}

/// Something that can launch the transcoding tool
pub trait ToolSpawner: Send + Sync {
    type Process: ToolProcess;

    /// Launch `executable` with `args`, diagnostics readable as one stream
    fn spawn(&self, executable: &Path, args: &[String]) -> FramexResult<Self::Process>;
}

/// Spawner backed by real operating-system processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpawner;

impl ToolSpawner for SystemSpawner {
    type Process = SystemProcess;

    fn spawn(&self, executable: &Path, args: &[String]) -> FramexResult<Self::Process> {
        debug!("Spawning {} {}", executable.display(), args.join(" "));

        let mut child = Command::new(executable)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| FramexError::ProcessStart {
                tool: executable.display().to_string(),
                message: error.to_string(),
            })?;

        // FFmpeg writes both diagnostics and progress to stderr, so that
        // single pipe carries the whole textual protocol
        let stderr = child.stderr.take().ok_or_else(|| FramexError::ProcessStart {
            tool: executable.display().to_string(),
            message: "could not capture diagnostic stream".to_string(),
        })?;

        Ok(SystemProcess {
            child,
            reader: BufReader::new(stderr),
        })
    }
}

/// A spawned tool process reading its diagnostic stream line by line
pub struct SystemProcess {
    child: Child,
    reader: BufReader<ChildStderr>,
}

impl ToolProcess for SystemProcess {
    fn next_line(&mut self) -> FramexResult<Option<String>> {
        Ok(read_tool_line(&mut self.reader)?)
    }

    fn kill(&mut self) -> FramexResult<()> {
        self.child.kill()?;
        let status = self.child.wait()?;
        debug!("Killed tool process, exit status {}", status);
        Ok(())
    }

    fn wait(&mut self) -> FramexResult<()> {
        let status = self.child.wait()?;
        debug!("Tool process exited with status {}", status);
        Ok(())
    }
}

/// Read one line from the tool's diagnostic stream.
///
/// FFmpeg terminates progress updates with a bare carriage return so it can
/// rewrite the console line in place; both `\r` and `\n` end a line here.
/// Empty lines are skipped. Returns `None` at end of stream.
fn read_tool_line<R: BufRead>(reader: &mut R) -> std::io::Result<Option<String>> {
    let mut buffer = Vec::new();

    loop {
        let mut byte = [0u8; 1];
        let read = reader.read(&mut byte)?;
        if read == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            return Ok(Some(String::from_utf8_lossy(&buffer).into_owned()));
        }

        match byte[0] {
            b'\n' | b'\r' => {
                if buffer.is_empty() {
                    continue;
                }
                return Ok(Some(String::from_utf8_lossy(&buffer).into_owned()));
            }
            other => buffer.push(other),
        }
    }
}
