use crate::constants::exec::{IDLE_POLL_MS, READ_CHUNK_BYTES};
use crate::errors::ToolError;
use serde::Serialize;
use std::io::{ErrorKind, Read};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecOutput {
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// Runs a shell command on the remote host. Implementations return only after
/// both output streams are drained and the exit status is known. An `Err` means
/// the command could not be run at all; a non-zero exit is an `Ok`.
pub trait CommandExecutor {
    fn exec(&self, command: &str) -> Result<ExecOutput, ToolError>;
}

#[derive(Debug, Default)]
struct StreamState {
    buf: Vec<u8>,
    closed: bool,
}

impl StreamState {
    fn pump<R: Read>(
        &mut self,
        reader: &mut R,
        chunk: &mut [u8],
        label: &str,
    ) -> Result<bool, ToolError> {
        if self.closed {
            return Ok(false);
        }
        match reader.read(chunk) {
            Ok(0) => {
                self.closed = true;
                Ok(false)
            }
            Ok(n) => {
                self.buf.extend_from_slice(&chunk[..n]);
                Ok(true)
            }
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Ok(false)
            }
            Err(err) => Err(ToolError::internal(format!(
                "SSH {} read failed: {}",
                label, err
            ))),
        }
    }
}

/// Reads two non-blocking streams in alternation until both report EOF, or
/// until `finished` reports the channel is done and a full pass produced no
/// data. Neither stream can stall the other, so a peer that fills one pipe
/// while we wait on the other cannot deadlock.
pub fn drain_interleaved<O, E, F>(
    stdout: &mut O,
    stderr: &mut E,
    mut finished: F,
) -> Result<(Vec<u8>, Vec<u8>), ToolError>
where
    O: Read,
    E: Read,
    F: FnMut() -> bool,
{
    let mut out = StreamState::default();
    let mut err = StreamState::default();
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];

    loop {
        let mut progressed = out.pump(stdout, &mut chunk, "stdout")?;
        progressed |= err.pump(stderr, &mut chunk, "stderr")?;

        if out.closed && err.closed {
            break;
        }
        if !progressed {
            if finished() {
                break;
            }
            std::thread::sleep(Duration::from_millis(IDLE_POLL_MS));
        }
    }

    Ok((out.buf, err.buf))
}
