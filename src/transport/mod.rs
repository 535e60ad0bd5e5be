//! Byte transport between a [`Session`](crate::session::Session) and the
//! authoring tool.
//!
//! This module provides:
//! - [`Transport`] - the blocking byte-channel trait the session drives
//! - [`PipeTransport`] - an implementation over any `Read + Write` pair
//!   (typically the child process stdio pipes)
//! - [`ScriptedTransport`] - an in-memory peer with pre-scripted replies,
//!   used by tests and examples

mod pipe;
mod scripted;

pub use pipe::PipeTransport;
pub use scripted::{ScriptedTransport, SentLog};

use crate::error::BridgeResult;

/// Blocking, synchronous byte channel to the authoring tool.
///
/// The protocol interleaves two framings on one channel: short
/// terminator-delimited ASCII token lines for handshakes and requests, and
/// raw fixed-size binary records for bulk data. There is exactly one
/// request in flight at a time; every operation blocks the calling thread
/// until it completes or fails.
///
/// # Failure contract
///
/// A closed channel, a short read, or a short write all surface as an
/// error. The session above treats every transport error as fatal to the
/// current stream; implementations must not retry internally.
pub trait Transport {
    /// Read one text line, blocking until a terminator byte (`\n` or `\0`)
    /// arrives or `max - 1` bytes have been consumed.
    ///
    /// The terminator is consumed but not included in the returned string.
    fn read_line(&mut self, max: usize) -> BridgeResult<String>;

    /// Write one text line followed by a `\n` terminator and flush.
    fn write_line(&mut self, line: &str) -> BridgeResult<()>;

    /// Read exactly `buf.len()` bytes into `buf`, or fail.
    fn read_exact(&mut self, buf: &mut [u8]) -> BridgeResult<()>;

    /// Write exactly `buf.len()` bytes, or fail.
    fn write_exact(&mut self, buf: &[u8]) -> BridgeResult<()>;
}
