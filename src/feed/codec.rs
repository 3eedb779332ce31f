//! Device packet framing.
//!
//! A packet is a 20-byte header followed by the body:
//!
//! | bytes  | field | encoding                         |
//! |--------|-------|----------------------------------|
//! | 0..8   | magic | `b"data"`, NUL padded            |
//! | 8..10  | `n`   | packet counter, u16 big endian   |
//! | 10..12 | `k`   | body length in bytes, u16 BE     |
//! | 12..20 | `q`   | send time, f64 little endian     |
//!
//! The body holds sub-frames x channels samples as i32 little endian,
//! row by row.
use crate::scope::ScopeError;

pub const HEADER_LEN: usize = 20;
pub const MAGIC: [u8; 8] = *b"data\0\0\0\0";
const SAMPLE_LEN: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PacketHeader {
    pub n: u16,
    /// Body length in bytes.
    pub k: u16,
    /// Seconds since the Unix epoch when the packet was sent.
    pub q: f64,
}

pub fn encode_header(header: &PacketHeader) -> [u8; HEADER_LEN] {
    let mut out = [0u8; HEADER_LEN];
    out[..8].copy_from_slice(&MAGIC);
    out[8..10].copy_from_slice(&header.n.to_be_bytes());
    out[10..12].copy_from_slice(&header.k.to_be_bytes());
    out[12..20].copy_from_slice(&header.q.to_le_bytes());
    out
}

pub fn decode_header(bytes: &[u8]) -> Result<PacketHeader, ScopeError> {
    if bytes.len() != HEADER_LEN {
        return Err(ScopeError::Packet(format!(
            "header is {} bytes, expected {HEADER_LEN}",
            bytes.len()
        )));
    }
    if bytes[..8] != MAGIC {
        return Err(ScopeError::Packet(format!("bad magic {:?}", &bytes[..8])));
    }
    let mut q = [0u8; 8];
    q.copy_from_slice(&bytes[12..20]);
    Ok(PacketHeader {
        n: u16::from_be_bytes([bytes[8], bytes[9]]),
        k: u16::from_be_bytes([bytes[10], bytes[11]]),
        q: f64::from_le_bytes(q),
    })
}

/// Packs sub-frames as i32 samples. Values are rounded and saturate at
/// the i32 range.
pub fn encode_body(frames: &[Vec<f64>]) -> Result<Vec<u8>, ScopeError> {
    let samples: usize = frames.iter().map(Vec::len).sum();
    let len = samples * SAMPLE_LEN;
    if len > usize::from(u16::MAX) {
        return Err(ScopeError::Packet(format!(
            "body of {len} bytes does not fit the u16 length field"
        )));
    }
    let mut out = Vec::with_capacity(len);
    for value in frames.iter().flatten() {
        out.extend_from_slice(&(value.round() as i32).to_le_bytes());
    }
    Ok(out)
}

pub fn decode_body(bytes: &[u8], channels: usize) -> Result<Vec<Vec<f64>>, ScopeError> {
    let row = channels * SAMPLE_LEN;
    if row == 0 || bytes.len() % row != 0 {
        return Err(ScopeError::Packet(format!(
            "body of {} bytes is not a whole number of {channels}-channel frames",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(row)
        .map(|frame| {
            frame
                .chunks_exact(SAMPLE_LEN)
                .map(|s| i32::from_le_bytes([s[0], s[1], s[2], s[3]]) as f64)
                .collect()
        })
        .collect())
}

/// Header and body of one packet, ready to write to a socket.
pub fn encode_packet(n: u16, q: f64, frames: &[Vec<f64>]) -> Result<Vec<u8>, ScopeError> {
    let body = encode_body(frames)?;
    let header = PacketHeader {
        n,
        // encode_body already bounded the length
        k: body.len() as u16,
        q,
    };
    let mut packet = Vec::with_capacity(HEADER_LEN + body.len());
    packet.extend_from_slice(&encode_header(&header));
    packet.extend_from_slice(&body);
    Ok(packet)
}
