//! Line server: newline-delimited messages in, one response line out each.

use std::io::{self, BufRead, Read, Write};

use tracing::{info, warn};

use super::dispatch::{error_response, handle_message, AppState};

/// Maximum message line size (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Options for one `serve` run.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Longest accepted line, excluding the newline.
    pub max_message_size: usize,
    /// Log every message and response at info level.
    pub trace: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            max_message_size: MAX_MESSAGE_SIZE,
            trace: false,
        }
    }
}

/// One framed line from the input.
enum Line {
    Message(String),
    TooLarge(usize),
    InvalidUtf8(std::str::Utf8Error),
    Eof,
}

/// Read one line, buffering at most `limit + 1` bytes of it.
fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<Line> {
    buf.clear();
    let n = reader
        .by_ref()
        .take(limit as u64 + 1)
        .read_until(b'\n', buf)?;
    if n == 0 {
        return Ok(Line::Eof);
    }
    if buf.last() != Some(&b'\n') && buf.len() > limit {
        let dropped = buf.len() + discard_line(reader)?;
        return Ok(Line::TooLarge(dropped));
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    match String::from_utf8(std::mem::take(buf)) {
        Ok(text) => Ok(Line::Message(text)),
        Err(e) => Ok(Line::InvalidUtf8(e.utf8_error())),
    }
}

/// Skip the rest of the current line without buffering it.
/// Returns the number of bytes dropped, newline included.
fn discard_line<R: BufRead>(reader: &mut R) -> io::Result<usize> {
    let mut dropped = 0;
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(dropped);
        }
        let (used, done) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };
        reader.consume(used);
        dropped += used;
        if done {
            return Ok(dropped);
        }
    }
}

/// Answer every message on `reader` until end of input.
///
/// Oversized and non-UTF-8 lines get an error response and the loop
/// carries on; only I/O errors end it. Returns the number of responses
/// written.
pub fn serve<R: BufRead, W: Write>(
    mut reader: R,
    mut out: W,
    state: &mut AppState,
    config: &ServeConfig,
) -> io::Result<u64> {
    let mut buf = Vec::new();
    let mut handled = 0u64;

    loop {
        let response = match read_line(&mut reader, &mut buf, config.max_message_size)? {
            Line::Eof => break,
            Line::TooLarge(len) => {
                warn!("message too large: {} bytes", len);
                Some(error_response(0, "message too large"))
            }
            Line::InvalidUtf8(e) => {
                warn!("message is not valid UTF-8: {}", e);
                Some(error_response(0, "invalid UTF-8"))
            }
            Line::Message(text) => {
                if config.trace {
                    info!("<< {}", text);
                }
                handle_message(state, &text)
            }
        };

        if let Some(response) = response {
            if config.trace {
                info!(">> {}", response);
            }
            writeln!(out, "{}", response)?;
            out.flush()?;
            handled += 1;
        }
    }

    Ok(handled)
}
