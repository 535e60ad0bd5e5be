//! Error types for the authoring-tool bridge.

use thiserror::Error;

/// Errors that can occur while talking to the authoring tool or while
/// compiling the record stream it sends back.
///
/// Every variant is fatal to the stream it occurred on: the in-flight
/// decode result is discarded and the session's close path still runs so a
/// new stream can be attempted afterwards.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The underlying byte channel failed (closed pipe, short read/write).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The peer answered a handshake with an unexpected token.
    #[error("protocol error: expected {expected:?}, peer answered {got:?}")]
    Protocol {
        /// The acknowledgement token we were waiting for.
        expected: &'static str,
        /// The literal text the peer sent instead.
        got: String,
    },

    /// A stream was opened while another stream was still active on the
    /// same session.
    #[error("a stream is already open on this session")]
    AlreadyLocked,

    /// A binary record violated its declared size or count bounds.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// A single surface references more distinct bones than one skin bank
    /// can hold.
    #[error("surface {surface} references {bones} distinct bones, skin slot budget is {budget}")]
    SkinBankOverflow {
        /// Index of the offending surface in decode order.
        surface: usize,
        /// Distinct bone count the surface requires.
        bones: usize,
        /// The caller-supplied skin slot budget.
        budget: usize,
    },

    /// The peer rejected a compile request with a failure reason string.
    #[error("unable to compile {target}: {reason}")]
    CompileRejected {
        /// The mesh or actor the request was for.
        target: String,
        /// The failure text the peer sent back.
        reason: String,
    },
}

/// Convenience alias used throughout the crate.
pub type BridgeResult<T> = Result<T, BridgeError>;
