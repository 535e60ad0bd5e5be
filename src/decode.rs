//! Fixed-layout binary record decoding.
//!
//! Records arrive on the transport with no padding and no alignment: a
//! record is the little-endian concatenation of its fields in declaration
//! order. The record shape is never inferred from content - the request
//! that opened the stream fixes the schema, and both sides must agree on
//! it in advance.

use glam::{Vec2, Vec3, Vec4};

use crate::error::{BridgeError, BridgeResult};
use crate::transport::Transport;

/// Ceiling on any count-prefixed record sequence.
///
/// A declared count above this is treated as a malformed stream rather
/// than an allocation request.
pub const MAX_RECORD_COUNT: u32 = 16 * 1024 * 1024;

/// Byte cap on name lines (mesh names, bone names, texture paths).
pub const MAX_NAME_LEN: usize = 128;

/// Byte cap on a length-prefixed shader source blob.
pub const MAX_SOURCE_LEN: u32 = 64 * 1024;

/// A value decodable from a fixed-width binary record.
pub trait ReadRecord: Sized {
    /// Decode one record from the transport.
    fn read(t: &mut dyn Transport) -> BridgeResult<Self>;
}

/// Read one little-endian `u32`.
pub fn read_u32(t: &mut dyn Transport) -> BridgeResult<u32> {
    let mut buf = [0u8; 4];
    t.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read one little-endian `i32`.
pub fn read_i32(t: &mut dyn Transport) -> BridgeResult<i32> {
    let mut buf = [0u8; 4];
    t.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Read one little-endian IEEE-754 `f32`.
pub fn read_f32(t: &mut dyn Transport) -> BridgeResult<f32> {
    let mut buf = [0u8; 4];
    t.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

/// Read a sequence count and validate it against [`MAX_RECORD_COUNT`].
pub fn read_count(t: &mut dyn Transport, what: &str) -> BridgeResult<u32> {
    let count = read_u32(t)?;
    if count > MAX_RECORD_COUNT {
        return Err(BridgeError::MalformedRecord(format!(
            "{what} count {count} exceeds ceiling {MAX_RECORD_COUNT}"
        )));
    }
    Ok(count)
}

/// Read a count-prefixed sequence of fixed records.
pub fn read_seq<T: ReadRecord>(t: &mut dyn Transport, what: &str) -> BridgeResult<Vec<T>> {
    let count = read_count(t, what)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(T::read(t)?);
    }
    Ok(out)
}

/// Read a terminator-delimited name line bounded by [`MAX_NAME_LEN`].
pub fn read_name(t: &mut dyn Transport) -> BridgeResult<String> {
    t.read_line(MAX_NAME_LEN)
}

/// Read a length-prefixed string blob bounded by [`MAX_SOURCE_LEN`].
pub fn read_source(t: &mut dyn Transport) -> BridgeResult<String> {
    let len = read_u32(t)?;
    if len > MAX_SOURCE_LEN {
        return Err(BridgeError::MalformedRecord(format!(
            "source blob length {len} exceeds buffer size {MAX_SOURCE_LEN}"
        )));
    }
    let mut buf = vec![0u8; len as usize];
    t.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map_err(|e| BridgeError::MalformedRecord(format!("non-UTF-8 source blob: {e}")))
}

impl ReadRecord for u32 {
    fn read(t: &mut dyn Transport) -> BridgeResult<Self> {
        read_u32(t)
    }
}

impl ReadRecord for i32 {
    fn read(t: &mut dyn Transport) -> BridgeResult<Self> {
        read_i32(t)
    }
}

impl ReadRecord for Vec2 {
    fn read(t: &mut dyn Transport) -> BridgeResult<Self> {
        Ok(Vec2::new(read_f32(t)?, read_f32(t)?))
    }
}

impl ReadRecord for Vec3 {
    fn read(t: &mut dyn Transport) -> BridgeResult<Self> {
        Ok(Vec3::new(read_f32(t)?, read_f32(t)?, read_f32(t)?))
    }
}

impl ReadRecord for Vec4 {
    fn read(t: &mut dyn Transport) -> BridgeResult<Self> {
        Ok(Vec4::new(
            read_f32(t)?,
            read_f32(t)?,
            read_f32(t)?,
            read_f32(t)?,
        ))
    }
}
