//! Pipe-backed transport over a `Read`/`Write` pair.

use std::io::{Read, Write};

use crate::error::{BridgeError, BridgeResult};

use super::Transport;

/// Transport over a pair of byte streams, typically the stdin/stdout pipes
/// of the authoring-tool subprocess.
///
/// Spawning and reaping the subprocess is the caller's concern; this type
/// only owns the two stream halves. A hung peer blocks the caller
/// indefinitely - the peer is a cooperating local subprocess, not an
/// untrusted network endpoint, so no timeout layer exists here.
pub struct PipeTransport<R: Read, W: Write> {
    reader: R,
    writer: W,
}

impl<R: Read, W: Write> PipeTransport<R, W> {
    /// Wrap a read half and a write half into a transport.
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<R: Read, W: Write> Transport for PipeTransport<R, W> {
    fn read_line(&mut self, max: usize) -> BridgeResult<String> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        while line.len() < max.saturating_sub(1) {
            self.reader.read_exact(&mut byte)?;
            if byte[0] == b'\n' || byte[0] == b'\0' {
                break;
            }
            line.push(byte[0]);
        }
        String::from_utf8(line).map_err(|e| {
            BridgeError::MalformedRecord(format!("non-UTF-8 text on line channel: {e}"))
        })
    }

    fn write_line(&mut self, line: &str) -> BridgeResult<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> BridgeResult<()> {
        self.reader.read_exact(buf)?;
        Ok(())
    }

    fn write_exact(&mut self, buf: &[u8]) -> BridgeResult<()> {
        self.writer.write_all(buf)?;
        self.writer.flush()?;
        Ok(())
    }
}
