//! In-memory transport with pre-scripted peer replies.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{BridgeError, BridgeResult};

use super::Transport;

/// A transport whose peer side is scripted in advance.
///
/// Replies are queued with the `reply_*` builders before the session runs;
/// every read pulls the next queued bytes and every write is captured for
/// later inspection. This is the deterministic stand-in for the authoring
/// tool used by the crate's tests and examples.
///
/// # Example
///
/// ```
/// use blendbridge::transport::{ScriptedTransport, Transport};
///
/// let mut peer = ScriptedTransport::new();
/// peer.reply_line("READY");
/// assert_eq!(peer.read_line(16).unwrap(), "READY");
/// ```
#[derive(Default)]
pub struct ScriptedTransport {
    /// Bytes the peer will send, in order.
    incoming: Vec<u8>,
    /// Read position within `incoming`.
    pos: usize,
    /// Everything the session wrote, in order. Shared so a [`SentLog`] tap
    /// stays readable after the transport is boxed into a session.
    outgoing: Rc<RefCell<Vec<u8>>>,
}

/// Read handle on a [`ScriptedTransport`]'s outgoing buffer.
///
/// Obtained with [`ScriptedTransport::tap`] before handing the transport
/// to a session; keeps recording as the session writes.
#[derive(Clone)]
pub struct SentLog(Rc<RefCell<Vec<u8>>>);

impl SentLog {
    /// Everything written so far, as raw bytes.
    pub fn bytes(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }

    /// The text lines written so far, split on `\n`.
    ///
    /// Binary writes end up interleaved in the raw buffer; this accessor is
    /// only meaningful for token-level assertions in line-only exchanges.
    pub fn lines(&self) -> Vec<String> {
        self.0
            .borrow()
            .split(|&b| b == b'\n')
            .filter(|s| !s.is_empty())
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect()
    }
}

impl ScriptedTransport {
    /// Create a transport with an empty reply script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a newline-terminated text reply.
    pub fn reply_line(&mut self, line: &str) -> &mut Self {
        self.incoming.extend_from_slice(line.as_bytes());
        self.incoming.push(b'\n');
        self
    }

    /// Queue raw binary reply bytes.
    pub fn reply_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.incoming.extend_from_slice(bytes);
        self
    }

    /// Queue a little-endian `u32` reply record.
    pub fn reply_u32(&mut self, value: u32) -> &mut Self {
        self.reply_bytes(&value.to_le_bytes())
    }

    /// Queue a little-endian `i32` reply record.
    pub fn reply_i32(&mut self, value: i32) -> &mut Self {
        self.reply_bytes(&value.to_le_bytes())
    }

    /// Queue a little-endian `f32` reply record.
    pub fn reply_f32(&mut self, value: f32) -> &mut Self {
        self.reply_bytes(&value.to_le_bytes())
    }

    /// Queue a 3-float vector reply record.
    pub fn reply_vec3(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        self.reply_f32(x).reply_f32(y).reply_f32(z)
    }

    /// Queue a 2-float vector reply record.
    pub fn reply_vec2(&mut self, x: f32, y: f32) -> &mut Self {
        self.reply_f32(x).reply_f32(y)
    }

    /// Take a read handle on the outgoing buffer.
    pub fn tap(&self) -> SentLog {
        SentLog(Rc::clone(&self.outgoing))
    }

    /// Everything the session has written so far, as raw bytes.
    pub fn sent(&self) -> Vec<u8> {
        self.outgoing.borrow().clone()
    }

    /// The text lines the session has written, split on `\n`.
    pub fn sent_lines(&self) -> Vec<String> {
        self.tap().lines()
    }

    /// Number of scripted bytes not yet consumed by the session.
    pub fn unread(&self) -> usize {
        self.incoming.len() - self.pos
    }

    fn take(&mut self, n: usize) -> BridgeResult<&[u8]> {
        if self.pos + n > self.incoming.len() {
            return Err(BridgeError::Transport(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "scripted peer has no more replies",
            )));
        }
        let slice = &self.incoming[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}

impl Transport for ScriptedTransport {
    fn read_line(&mut self, max: usize) -> BridgeResult<String> {
        let mut line = Vec::new();
        while line.len() < max.saturating_sub(1) {
            let byte = self.take(1)?[0];
            if byte == b'\n' || byte == b'\0' {
                break;
            }
            line.push(byte);
        }
        String::from_utf8(line).map_err(|e| {
            BridgeError::MalformedRecord(format!("non-UTF-8 text on line channel: {e}"))
        })
    }

    fn write_line(&mut self, line: &str) -> BridgeResult<()> {
        let mut out = self.outgoing.borrow_mut();
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> BridgeResult<()> {
        let bytes = self.take(buf.len())?;
        buf.copy_from_slice(bytes);
        Ok(())
    }

    fn write_exact(&mut self, buf: &[u8]) -> BridgeResult<()> {
        self.outgoing.borrow_mut().extend_from_slice(buf);
        Ok(())
    }
}
