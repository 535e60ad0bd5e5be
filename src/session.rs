//! Session state and stream handshakes.
//!
//! A [`Session`] owns the transport to the authoring tool and a single
//! "stream open" flag. At most one streaming sub-protocol - data exchange
//! or script execution - is active at a time; each is represented by a
//! guard that borrows the session mutably and closes the stream on drop.
//!
//! The session is an owned value: callers that want process-wide sharing
//! wrap it themselves. The flag is the sole concurrency guard and assumes
//! single-threaded use (or external serialization by the caller).

use crate::actor::Actor;
use crate::decode;
use crate::error::{BridgeError, BridgeResult};
use crate::mesh::{Mesh, Topology};
use crate::script::ScriptStream;
use crate::transport::Transport;

/// Byte cap on acknowledgement lines, sized so a peer failure reason
/// survives intact into the error message.
pub const MAX_ACK_LINE: usize = 256;

/// The two streaming sub-protocols a session can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Binary record exchange (`DATABEGIN` .. `DATAEND`).
    DataExchange,
    /// Script statement execution (`PYBEGIN` .. `PYEND`).
    ScriptExec,
}

impl StreamKind {
    fn begin_token(self) -> &'static str {
        match self {
            Self::DataExchange => "DATABEGIN",
            Self::ScriptExec => "PYBEGIN",
        }
    }

    fn end_token(self) -> &'static str {
        match self {
            Self::DataExchange => "DATAEND",
            Self::ScriptExec => "PYEND",
        }
    }
}

/// Acknowledgement expected after a begin token.
const READY_TOKEN: &str = "READY";
/// Acknowledgement expected after an end token.
const DONE_TOKEN: &str = "DONE";

/// A stateful connection to the authoring tool.
pub struct Session {
    transport: Box<dyn Transport>,
    open_stream: Option<StreamKind>,
}

impl Session {
    /// Create a session over the given transport.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            open_stream: None,
        }
    }

    /// Whether a stream is currently open on this session.
    pub fn is_stream_open(&self) -> bool {
        self.open_stream.is_some()
    }

    /// Open the data-exchange stream.
    ///
    /// Fails with [`BridgeError::AlreadyLocked`] if any stream is open, or
    /// with [`BridgeError::Protocol`] carrying the peer's literal reply if
    /// the handshake is not acknowledged - in which case the lock is not
    /// taken and the session stays usable.
    pub fn data_stream(&mut self) -> BridgeResult<DataStream<'_>> {
        self.open(StreamKind::DataExchange)?;
        Ok(DataStream {
            session: self,
            closed: false,
        })
    }

    /// Open the script-execution stream.
    ///
    /// Same locking and handshake contract as [`data_stream`](Self::data_stream).
    pub fn script_stream(&mut self) -> BridgeResult<ScriptStream<'_>> {
        self.open(StreamKind::ScriptExec)?;
        Ok(ScriptStream::new(self))
    }

    fn open(&mut self, kind: StreamKind) -> BridgeResult<()> {
        if self.open_stream.is_some() {
            return Err(BridgeError::AlreadyLocked);
        }
        self.transport.write_line(kind.begin_token())?;
        let ack = self.transport.read_line(MAX_ACK_LINE)?;
        if ack != READY_TOKEN {
            return Err(BridgeError::Protocol {
                expected: READY_TOKEN,
                got: ack,
            });
        }
        self.open_stream = Some(kind);
        log::debug!("opened {kind:?} stream");
        Ok(())
    }

    /// Close the currently open stream, if any.
    ///
    /// The open-stream flag is cleared unconditionally before returning,
    /// even when the end handshake fails: the session must always be able
    /// to accept a new stream after a failed close.
    pub(crate) fn close_stream(&mut self) -> BridgeResult<()> {
        let Some(kind) = self.open_stream else {
            return Ok(());
        };
        let result = (|| {
            self.transport.write_line(kind.end_token())?;
            let ack = self.transport.read_line(MAX_ACK_LINE)?;
            if ack != DONE_TOKEN {
                return Err(BridgeError::Protocol {
                    expected: DONE_TOKEN,
                    got: ack,
                });
            }
            Ok(())
        })();
        self.open_stream = None;
        log::debug!("closed {kind:?} stream");
        result
    }

    pub(crate) fn transport(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }
}

/// The open data-exchange stream.
///
/// All operations block until the peer answers. Any error is fatal to the
/// stream: the in-flight result is discarded, and dropping (or explicitly
/// closing) the guard still sends the end token so the lock is released.
pub struct DataStream<'a> {
    session: &'a mut Session,
    closed: bool,
}

impl std::fmt::Debug for DataStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStream")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl DataStream<'_> {
    /// Request the peer's list of mesh names.
    pub fn mesh_list(&mut self) -> BridgeResult<Vec<String>> {
        let t = self.session.transport();
        t.write_line("MESHLIST")?;
        let count = decode::read_count(t, "mesh name")?;
        let mut names = Vec::with_capacity(count as usize);
        for _ in 0..count {
            names.push(decode::read_name(t)?);
        }
        Ok(names)
    }

    /// Compile the current context's mesh.
    ///
    /// `progress` is invoked synchronously once per completed surface with
    /// the number of surfaces decoded so far; it must not re-enter the
    /// session.
    pub fn compile_mesh(
        &mut self,
        topology: Topology,
        skin_slot_budget: usize,
        progress: &mut dyn FnMut(usize),
    ) -> BridgeResult<Mesh> {
        let req = format!("MESHCOMPILE {} {}", topology.token(), skin_slot_budget);
        self.compile_request(&req, "<current mesh>", topology, skin_slot_budget, progress)
    }

    /// Compile a mesh by name.
    pub fn compile_mesh_named(
        &mut self,
        name: &str,
        topology: Topology,
        skin_slot_budget: usize,
        progress: &mut dyn FnMut(usize),
    ) -> BridgeResult<Mesh> {
        let req = format!(
            "MESHCOMPILENAME {} {} {}",
            name,
            topology.token(),
            skin_slot_budget
        );
        self.compile_request(&req, name, topology, skin_slot_budget, progress)
    }

    /// Compile and merge all meshes in the peer's context.
    pub fn compile_all_meshes(
        &mut self,
        topology: Topology,
        skin_slot_budget: usize,
        max_octant_length: f32,
        progress: &mut dyn FnMut(usize),
    ) -> BridgeResult<Mesh> {
        let req = format!(
            "MESHCOMPILEALL {} {} {}",
            topology.token(),
            skin_slot_budget,
            max_octant_length
        );
        self.compile_request(&req, "<all meshes>", topology, skin_slot_budget, progress)
    }

    /// Compile the current actor context.
    pub fn compile_actor(&mut self) -> BridgeResult<Actor> {
        let t = self.session.transport();
        t.write_line("ACTORCOMPILE")?;
        let ack = t.read_line(MAX_ACK_LINE)?;
        if ack != "OK" {
            return Err(BridgeError::CompileRejected {
                target: "<current actor>".to_string(),
                reason: ack,
            });
        }
        Actor::read(t)
    }

    fn compile_request(
        &mut self,
        request: &str,
        target: &str,
        topology: Topology,
        skin_slot_budget: usize,
        progress: &mut dyn FnMut(usize),
    ) -> BridgeResult<Mesh> {
        let t = self.session.transport();
        t.write_line(request)?;
        let ack = t.read_line(MAX_ACK_LINE)?;
        if ack != "OK" {
            return Err(BridgeError::CompileRejected {
                target: target.to_string(),
                reason: ack,
            });
        }
        Mesh::read(t, topology, skin_slot_budget, progress)
    }

    /// Close the stream, reporting the end-handshake result.
    ///
    /// The session accepts a new stream afterwards whether or not the
    /// handshake succeeded.
    pub fn close(mut self) -> BridgeResult<()> {
        self.closed = true;
        self.session.close_stream()
    }
}

impl Drop for DataStream<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.session.close_stream() {
                log::warn!("data stream close failed: {e}");
            }
        }
    }
}
