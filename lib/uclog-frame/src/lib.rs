// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Consistent Overhead Byte Stuffing (COBS) for the log wire format.
//!
//! A frame on the wire is `[SENTINEL, stuffed(payload), SENTINEL]`. Stuffing
//! guarantees the middle section never contains `SENTINEL` (`0x00`), so a
//! receiver can always find frame boundaries by scanning for that one byte
//! regardless of what the payload contains. Two sentinels back to back decode
//! to an empty frame, which callers are expected to ignore rather than treat
//! as an error; that's what lets a sender resynchronise mid-stream by just
//! emitting a lone `0x00`.

#![cfg_attr(not(feature = "std"), no_std)]

use core::fmt;

/// The single frame delimiter byte.
pub const SENTINEL: u8 = 0x00;

/// Errors from [`encode`], [`decode`], and [`decode_in_place`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum FrameError {
    /// The destination slice was too small for the worst-case or actual
    /// output size.
    BufferTooSmall,
    /// The stuffed byte sequence was not a well-formed COBS encoding (a code
    /// byte of zero, or a code byte whose run extends past the end of the
    /// input).
    CobsError,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::BufferTooSmall => f.write_str("destination buffer too small"),
            FrameError::CobsError => f.write_str("malformed COBS stuffing"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameError {}

/// Worst-case length of a full `[SENTINEL, stuffed(payload), SENTINEL]` frame
/// for a payload of `payload_len` bytes.
///
/// One code byte is inserted at least every 254 data bytes, plus the two
/// frame sentinels; callers must size transmit buffers against this, not
/// against `payload_len` alone.
pub const fn max_frame_len(payload_len: usize) -> usize {
    payload_len + (payload_len / 254) + 1 + 2
}

/// Worst-case length of just the stuffed region (no sentinels).
pub const fn max_stuffed_len(payload_len: usize) -> usize {
    payload_len + (payload_len / 254) + 1
}

/// Stuffs `payload` into `out`, returning the number of bytes written to
/// `out`. Does not add frame sentinels; see [`encode_frame`] for that.
///
/// `out` must be at least [`max_stuffed_len`]`(payload.len())` bytes.
pub fn stuff(payload: &[u8], out: &mut [u8]) -> Result<usize, FrameError> {
    if out.len() < max_stuffed_len(payload.len()) {
        return Err(FrameError::BufferTooSmall);
    }
    let mut out_idx = 1usize;
    let mut code_idx = 0usize;
    let mut code = 1u8;
    for &byte in payload {
        if byte == SENTINEL {
            out[code_idx] = code;
            code_idx = out_idx;
            out_idx += 1;
            code = 1;
        } else {
            out[out_idx] = byte;
            out_idx += 1;
            code += 1;
            if code == 0xFF {
                out[code_idx] = code;
                code_idx = out_idx;
                out_idx += 1;
                code = 1;
            }
        }
    }
    out[code_idx] = code;
    Ok(out_idx)
}

/// Encodes `payload` into a complete wire frame: leading sentinel, stuffed
/// bytes, trailing sentinel.
///
/// `out` must be at least [`max_frame_len`]`(payload.len())` bytes.
pub fn encode_frame(payload: &[u8], out: &mut [u8]) -> Result<usize, FrameError> {
    if out.is_empty() {
        return Err(FrameError::BufferTooSmall);
    }
    out[0] = SENTINEL;
    let stuffed_len = stuff(payload, &mut out[1..])?;
    let end = 1 + stuffed_len;
    if end >= out.len() {
        return Err(FrameError::BufferTooSmall);
    }
    out[end] = SENTINEL;
    Ok(end + 1)
}

/// Unstuffs a COBS-encoded region (the bytes between two sentinels, sentinels
/// excluded) into `out`, returning the decoded payload length.
///
/// Per the module-level description, an empty `stuffed` slice decodes to an
/// empty payload rather than an error.
pub fn decode(stuffed: &[u8], out: &mut [u8]) -> Result<usize, FrameError> {
    let len = unstuff_into(stuffed, out)?;
    Ok(len)
}

/// Unstuffs `buf` in place, returning the decoded payload length.
///
/// Safe because COBS decoding never produces more bytes than it consumes: the
/// write cursor never overtakes the read cursor. `buf` holds the stuffed
/// bytes on entry and the decoded payload (in its first `n` bytes) on a
/// successful return.
pub fn decode_in_place(buf: &mut [u8]) -> Result<usize, FrameError> {
    let mut in_idx = 0usize;
    let mut out_idx = 0usize;
    let len = buf.len();
    while in_idx < len {
        let code = buf[in_idx];
        if code == 0 {
            return Err(FrameError::CobsError);
        }
        let run = code as usize - 1;
        in_idx += 1;
        if in_idx + run > len {
            return Err(FrameError::CobsError);
        }
        // Read-then-write is safe in place: out_idx <= in_idx throughout.
        for i in 0..run {
            buf[out_idx + i] = buf[in_idx + i];
        }
        out_idx += run;
        in_idx += run;
        if code != 0xFF && in_idx < len {
            buf[out_idx] = SENTINEL;
            out_idx += 1;
        }
    }
    Ok(out_idx)
}

fn unstuff_into(stuffed: &[u8], out: &mut [u8]) -> Result<usize, FrameError> {
    let mut in_idx = 0usize;
    let mut out_idx = 0usize;
    let len = stuffed.len();
    while in_idx < len {
        let code = stuffed[in_idx];
        if code == 0 {
            return Err(FrameError::CobsError);
        }
        let run = code as usize - 1;
        in_idx += 1;
        if in_idx + run > len {
            return Err(FrameError::CobsError);
        }
        let trailing_zero = (code != 0xFF && in_idx + run < len) as usize;
        if out_idx + run + trailing_zero > out.len() {
            return Err(FrameError::BufferTooSmall);
        }
        out[out_idx..out_idx + run].copy_from_slice(&stuffed[in_idx..in_idx + run]);
        out_idx += run;
        in_idx += run;
        if trailing_zero == 1 {
            out[out_idx] = SENTINEL;
            out_idx += 1;
        }
    }
    Ok(out_idx)
}
