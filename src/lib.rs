//! Data-exchange bridge to a script-driven authoring tool.
//!
//! The bridge drives an authoring tool (typically a headless Blender
//! child process) over a pair of byte pipes, interleaving token-line
//! handshakes with fixed little-endian binary records. A [`Session`]
//! serializes access to the connection: at most one stream - data
//! exchange or script execution - is open at a time, and every operation
//! blocks until the peer answers.
//!
//! # Example
//!
//! ```
//! use blendbridge::mesh::Topology;
//! use blendbridge::transport::ScriptedTransport;
//! use blendbridge::Session;
//!
//! # fn main() -> blendbridge::BridgeResult<()> {
//! let mut peer = ScriptedTransport::new();
//! peer.reply_line("READY");
//! peer.reply_u32(1).reply_line("hero_body");
//! peer.reply_line("DONE");
//!
//! let mut session = Session::new(Box::new(peer));
//! let mut stream = session.data_stream()?;
//! let names = stream.mesh_list()?;
//! assert_eq!(names, ["hero_body"]);
//! stream.close()?;
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod decode;
pub mod error;
pub mod mesh;
pub mod script;
pub mod session;
pub mod transport;

pub use actor::Actor;
pub use error::{BridgeError, BridgeResult};
pub use mesh::{Mesh, MeshBuffers, SkinBanks, Topology};
pub use script::{AnimStream, CurveKind, ScriptStream};
pub use session::{DataStream, Session};

/// Crate version, for peer-side compatibility reporting.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
