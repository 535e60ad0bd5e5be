//! Script execution and the keyframe animation sub-stream.
//!
//! Inside an open script stream each statement is sent as one line and
//! acknowledged individually with `OK`, so a rejected statement is
//! attributable to its source text rather than to a batch.

use crate::error::{BridgeError, BridgeResult};
use crate::session::{Session, MAX_ACK_LINE};

/// The open script-execution stream.
///
/// Same lifecycle as the data stream: errors are fatal to the stream, and
/// dropping the guard still sends the end token so the lock is released.
pub struct ScriptStream<'a> {
    session: &'a mut Session,
    closed: bool,
}

impl<'a> ScriptStream<'a> {
    pub(crate) fn new(session: &'a mut Session) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    /// Execute one script statement and wait for its acknowledgement.
    ///
    /// A reply other than `OK` is reported as a rejection carrying the
    /// statement and the peer's literal reply.
    pub fn execute(&mut self, statement: &str) -> BridgeResult<()> {
        let t = self.session.transport();
        t.write_line(statement)?;
        let ack = t.read_line(MAX_ACK_LINE)?;
        if ack != "OK" {
            return Err(BridgeError::CompileRejected {
                target: statement.to_string(),
                reason: ack,
            });
        }
        Ok(())
    }

    /// Execute each line of a multi-line script block in order.
    pub fn execute_block(&mut self, block: &str) -> BridgeResult<()> {
        for line in block.lines() {
            self.execute(line)?;
        }
        Ok(())
    }

    /// Open the binary keyframe sub-stream on this script stream.
    pub fn anim_stream(&mut self) -> BridgeResult<AnimStream<'a, '_>> {
        let t = self.session.transport();
        t.write_line("PYANIM")?;
        let ack = t.read_line(MAX_ACK_LINE)?;
        if ack != "ANIMREADY" {
            return Err(BridgeError::Protocol {
                expected: "ANIMREADY",
                got: ack,
            });
        }
        Ok(AnimStream {
            stream: self,
            cur_keys: 0,
            total_keys: 0,
        })
    }

    /// Close the stream, reporting the end-handshake result.
    pub fn close(mut self) -> BridgeResult<()> {
        self.closed = true;
        self.session.close_stream()
    }
}

impl Drop for ScriptStream<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.session.close_stream() {
                log::warn!("script stream close failed: {e}");
            }
        }
    }
}

/// Kind of animation curve being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    Rotate = 0,
    Translate = 1,
    Scale = 2,
}

/// Binary keyframe writer nested in a script stream.
///
/// Keys are pushed one curve at a time: [`change_curve`] declares the
/// curve and its key count, and exactly that many [`write_key`] calls must
/// follow before the next curve or [`finish`].
///
/// [`change_curve`]: AnimStream::change_curve
/// [`write_key`]: AnimStream::write_key
/// [`finish`]: AnimStream::finish
pub struct AnimStream<'a, 'b> {
    stream: &'b mut ScriptStream<'a>,
    cur_keys: u32,
    total_keys: u32,
}

impl AnimStream<'_, '_> {
    /// Declare the next curve: kind tag, component index, key count.
    pub fn change_curve(&mut self, kind: CurveKind, component: u32, keys: u32) -> BridgeResult<()> {
        if self.cur_keys != self.total_keys {
            return Err(BridgeError::MalformedRecord(format!(
                "curve changed after {} of {} declared keys",
                self.cur_keys, self.total_keys
            )));
        }
        let t = self.stream.session.transport();
        t.write_exact(&[kind as u8])?;
        t.write_exact(&component.to_le_bytes())?;
        t.write_exact(&keys.to_le_bytes())?;
        self.cur_keys = 0;
        self.total_keys = keys;
        Ok(())
    }

    /// Write one keyframe on the current curve.
    pub fn write_key(&mut self, frame: u32, value: f32) -> BridgeResult<()> {
        if self.cur_keys == self.total_keys {
            return Err(BridgeError::MalformedRecord(format!(
                "key written past the declared count of {}",
                self.total_keys
            )));
        }
        let t = self.stream.session.transport();
        t.write_exact(&frame.to_le_bytes())?;
        t.write_exact(&value.to_le_bytes())?;
        self.cur_keys += 1;
        Ok(())
    }

    /// Terminate the keyframe stream and wait for the peer to commit it.
    pub fn finish(self) -> BridgeResult<()> {
        if self.cur_keys != self.total_keys {
            return Err(BridgeError::MalformedRecord(format!(
                "animation finished after {} of {} declared keys",
                self.cur_keys, self.total_keys
            )));
        }
        let t = self.stream.session.transport();
        t.write_exact(&[0xFF])?;
        let ack = t.read_line(MAX_ACK_LINE)?;
        if ack != "ANIMDONE" {
            return Err(BridgeError::Protocol {
                expected: "ANIMDONE",
                got: ack,
            });
        }
        Ok(())
    }
}
