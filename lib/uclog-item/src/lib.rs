// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A self-describing binary item codec shaped after the CBOR data model
//! (RFC 8949): the same wire shape used by the device-info handshake and
//! available to applications for their own structured payloads.
//!
//! Reading is zero-copy: [`Item`] variants borrow directly out of the input
//! buffer. Errors on malformed structure are sticky on the [`Stream`] (a
//! later call keeps returning the first error); errors on a single
//! conversion or lookup (`as_i64`, [`get_any`], [`idx_any`]) are not sticky
//! and leave the stream where it was.

#![cfg_attr(not(feature = "std"), no_std)]

mod pack;
mod writer;

pub use pack::{pack, unpack, Key, PackArg, UnpackArg};
pub use writer::Writer;

use core::fmt;

/// Recursion bound on nested reads (tag-of-tag, and the eager read performed
/// while converting a recognised tag to its semantic [`Item`]).
pub const CBOR_MAX_RECURSION: u8 = 4;

/// Errors produced while reading or writing items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ItemError {
    /// The reader ran past the end of the buffer.
    EndOfStream,
    /// An additional-info value of 28-30 was seen, or 31 on a major type
    /// that doesn't support indefinite length.
    InvalidAi,
    /// Indefinite-length byte/text chunks nested another indefinite chunk,
    /// or a chunk's major type didn't match its parent.
    InvalidNesting,
    /// A text item's bytes were not valid UTF-8.
    InvalidUtf8,
    /// Nested reads exceeded [`CBOR_MAX_RECURSION`].
    RecursionExceeded,
    /// An `as_*` conversion or tag contents were not of the expected type.
    TypeMismatch,
    /// An `as_*` numeric conversion didn't fit the target type.
    OutOfRange,
    /// [`get_any`] did not find the requested key, or [`idx_any`]'s index
    /// was out of range.
    KeyNotFound,
    /// The destination slice passed to a write call was too small.
    BufferTooSmall,
    /// A pack/unpack helper was used inconsistently with the stream's actual
    /// contents (e.g. a required field missing from a map).
    FormatError,
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ItemError::EndOfStream => "ran past end of item stream",
            ItemError::InvalidAi => "invalid additional-info value",
            ItemError::InvalidNesting => "invalid indefinite-length chunk nesting",
            ItemError::InvalidUtf8 => "text item was not valid utf-8",
            ItemError::RecursionExceeded => "item nesting exceeded recursion bound",
            ItemError::TypeMismatch => "item was not of the expected type",
            ItemError::OutOfRange => "numeric value out of range for target type",
            ItemError::KeyNotFound => "key or index not present",
            ItemError::BufferTooSmall => "destination buffer too small",
            ItemError::FormatError => "pack/unpack usage did not match stream contents",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ItemError {}

/// Length of an array or map: either known up front, or terminated by a
/// [`Item::Break`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    Definite(u64),
    Indefinite,
}

/// A decoded item.
///
/// Byte/text/tag variants borrow from the buffer the [`Stream`] was built
/// over; `Array`/`Map` report only their length, leaving the caller to read
/// their contents with further [`read_any`] (or [`get_any`]/[`idx_any`])
/// calls on the same stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Item<'a> {
    /// Major type 0. The value itself.
    UInt(u64),
    /// Major type 1. Raw CBOR negative-int payload `n`; the represented
    /// value is `-(1 + n)` (see [`Item::as_i64`]).
    NInt(u64),
    /// Major type 2, definite length.
    Bytes(&'a [u8]),
    /// Major type 2, indefinite length: the validated span covering the
    /// chunk headers and bodies between the opening byte and the
    /// terminating break (exclusive of both). Iterate with
    /// [`byte_chunks`].
    BytesIndefinite(&'a [u8]),
    /// Major type 3, definite length.
    Text(&'a str),
    /// Major type 3, indefinite length. Iterate with [`text_chunks`].
    TextIndefinite(&'a [u8]),
    /// Major type 4.
    Array(Length),
    /// Major type 5.
    Map(Length),
    /// An unrecognised major-6 tag. The tagged value follows immediately on
    /// the same stream; call [`read_any`] again to read it.
    Tag(u64),
    /// Semantic tag 0 or 1: seconds since the Unix epoch.
    Datetime(f64),
    /// Semantic tag 4: `mantissa * 10^exponent`.
    Decimal { mantissa: i64, exponent: i64 },
    /// Semantic tag 30: `numerator / denominator`.
    Rational { numerator: i64, denominator: u64 },
    /// Semantic tag 24: an embedded, still-encoded item.
    Encoded(&'a [u8]),
    /// An unassigned major-7 simple value (not `false`/`true`/`null`/`undefined`).
    Simple(u8),
    Bool(bool),
    Null,
    Undefined,
    /// Raw IEEE 754 half-precision bits.
    Float16(u16),
    Float32(f32),
    Float64(f64),
    /// The indefinite-length terminator (major 7, AI 31).
    Break,
}

impl<'a> Item<'a> {
    /// Converts an integral item to `i64`, range-checked.
    pub fn as_i64(&self) -> Result<i64, ItemError> {
        match *self {
            Item::UInt(v) => i64::try_from(v).map_err(|_| ItemError::OutOfRange),
            Item::NInt(n) => {
                if n > i64::MAX as u64 {
                    return Err(ItemError::OutOfRange);
                }
                (-1i64).checked_sub(n as i64).ok_or(ItemError::OutOfRange)
            }
            _ => Err(ItemError::TypeMismatch),
        }
    }

    /// Converts an integral item to `u64`, range-checked (negative values
    /// are always out of range).
    pub fn as_u64(&self) -> Result<u64, ItemError> {
        match *self {
            Item::UInt(v) => Ok(v),
            Item::NInt(_) => Err(ItemError::OutOfRange),
            _ => Err(ItemError::TypeMismatch),
        }
    }

    /// Converts any numeric item (integer, float, decimal, rational) to
    /// `f64`, applying the decimal/rational corner cases from the wire
    /// mapping (`exp > 3000 -> +inf`, `exp < -3000 -> 0`, `mant == 0 -> 0`).
    pub fn as_f64(&self) -> Result<f64, ItemError> {
        match *self {
            Item::UInt(v) => Ok(v as f64),
            Item::NInt(n) => Ok(-1.0 - n as f64),
            Item::Float16(bits) => Ok(writer::f16_bits_to_f32(bits) as f64),
            Item::Float32(v) => Ok(v as f64),
            Item::Float64(v) => Ok(v),
            Item::Decimal { mantissa, exponent } => Ok(decimal_to_f64(mantissa, exponent)),
            Item::Rational {
                numerator,
                denominator,
            } => {
                if denominator == 0 {
                    return Err(ItemError::OutOfRange);
                }
                Ok(numerator as f64 / denominator as f64)
            }
            Item::Datetime(v) => Ok(v),
            _ => Err(ItemError::TypeMismatch),
        }
    }

    pub fn as_text(&self) -> Result<&'a str, ItemError> {
        match *self {
            Item::Text(t) => Ok(t),
            _ => Err(ItemError::TypeMismatch),
        }
    }

    pub fn as_bytes(&self) -> Result<&'a [u8], ItemError> {
        match *self {
            Item::Bytes(b) => Ok(b),
            _ => Err(ItemError::TypeMismatch),
        }
    }
}

fn decimal_to_f64(mantissa: i64, exponent: i64) -> f64 {
    if mantissa == 0 {
        return 0.0;
    }
    if exponent > 3000 {
        return if mantissa > 0 {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        };
    }
    if exponent < -3000 {
        return 0.0;
    }
    (mantissa as f64) * 10f64.powi(exponent as i32)
}

/// A cursor over a borrowed byte buffer, decoding items on demand.
#[derive(Debug, Clone, Copy)]
pub struct Stream<'a> {
    buf: &'a [u8],
    pos: usize,
    err: Option<ItemError>,
}

impl<'a> Stream<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Stream {
            buf,
            pos: 0,
            err: None,
        }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// The first error seen on this stream, if any. Once set it never
    /// clears; construct a fresh `Stream` to try again after refilling.
    pub fn error(&self) -> Option<ItemError> {
        self.err
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ItemError> {
        if self.pos + n > self.buf.len() {
            return Err(ItemError::EndOfStream);
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn take_u8(&mut self) -> Result<u8, ItemError> {
        Ok(self.take(1)?[0])
    }

    fn take_u16(&mut self) -> Result<u16, ItemError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn take_u32(&mut self) -> Result<u32, ItemError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn take_u64(&mut self) -> Result<u64, ItemError> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn fail(&mut self, e: ItemError) -> Result<Item<'a>, ItemError> {
        self.err = Some(e);
        Err(e)
    }

    fn read_head(&mut self) -> Result<(u8, u8, u64), ItemError> {
        let b = self.take_u8().map_err(|e| {
            self.err = Some(e);
            e
        })?;
        let major = b >> 5;
        let ai = b & 0x1f;
        if (28..=30).contains(&ai) {
            self.err = Some(ItemError::InvalidAi);
            return Err(ItemError::InvalidAi);
        }
        if ai == 31 {
            let indefinite_ok = matches!(major, 2 | 3 | 4 | 5) || major == 7;
            if !indefinite_ok {
                self.err = Some(ItemError::InvalidAi);
                return Err(ItemError::InvalidAi);
            }
            return Ok((major, ai, 0));
        }
        let value = match ai {
            0..=23 => ai as u64,
            24 => self.take_u8().map_err(|e| self.sticky(e))? as u64,
            25 => self.take_u16().map_err(|e| self.sticky(e))? as u64,
            26 => self.take_u32().map_err(|e| self.sticky(e))? as u64,
            _ => self.take_u64().map_err(|e| self.sticky(e))?,
        };
        Ok((major, ai, value))
    }

    fn sticky(&mut self, e: ItemError) -> ItemError {
        self.err = Some(e);
        e
    }

    /// Reads one top-level item, silently unwrapping a leading self-describe
    /// tag (55799).
    pub fn read_any(&mut self) -> Result<Item<'a>, ItemError> {
        self.read_any_depth(0)
    }

    fn read_any_depth(&mut self, depth: u8) -> Result<Item<'a>, ItemError> {
        if let Some(e) = self.err {
            return Err(e);
        }
        if depth > CBOR_MAX_RECURSION {
            return self.fail(ItemError::RecursionExceeded);
        }
        let (major, ai, value) = self.read_head()?;
        let item = match major {
            0 => Item::UInt(value),
            1 => Item::NInt(value),
            2 => {
                if ai == 31 {
                    self.read_indefinite_chunks(2)?
                } else {
                    let n = value as usize;
                    Item::Bytes(self.take(n).map_err(|e| self.sticky(e))?)
                }
            }
            3 => {
                if ai == 31 {
                    self.read_indefinite_chunks(3)?
                } else {
                    let n = value as usize;
                    let bytes = self.take(n).map_err(|e| self.sticky(e))?;
                    Item::Text(validate_utf8(bytes).map_err(|e| self.sticky(e))?)
                }
            }
            4 => {
                if ai == 31 {
                    self.validate_indefinite_collection(4)?;
                    Item::Array(Length::Indefinite)
                } else {
                    Item::Array(Length::Definite(value))
                }
            }
            5 => {
                if ai == 31 {
                    self.validate_indefinite_collection(5)?;
                    Item::Map(Length::Indefinite)
                } else {
                    Item::Map(Length::Definite(value))
                }
            }
            6 => return self.read_tag(value, depth),
            7 => match ai {
                20 => Item::Bool(false),
                21 => Item::Bool(true),
                22 => Item::Null,
                23 => Item::Undefined,
                24 => {
                    if value < 32 {
                        return self.fail(ItemError::InvalidAi);
                    }
                    Item::Simple(value as u8)
                }
                25 => Item::Float16(value as u16),
                26 => Item::Float32(f32::from_bits(value as u32)),
                27 => Item::Float64(f64::from_bits(value)),
                31 => Item::Break,
                0..=19 => Item::Simple(ai),
                _ => return self.fail(ItemError::InvalidAi),
            },
            _ => unreachable!("major type is a 3-bit field"),
        };
        Ok(item)
    }

    fn read_tag(&mut self, tag: u64, depth: u8) -> Result<Item<'a>, ItemError> {
        if tag == 55799 && depth == 0 {
            return self.read_any_depth(depth);
        }
        match tag {
            0 => {
                let inner = self.read_any_depth(depth + 1)?;
                let text = inner.as_text().map_err(|e| self.sticky(e))?;
                let epoch = parse_rfc3339(text).ok_or_else(|| self.sticky(ItemError::TypeMismatch))?;
                Ok(Item::Datetime(epoch))
            }
            1 => {
                let inner = self.read_any_depth(depth + 1)?;
                let epoch = inner.as_f64().map_err(|e| self.sticky(e))?;
                Ok(Item::Datetime(epoch))
            }
            4 => {
                let (exponent, mantissa) = self.read_pair(depth)?;
                Ok(Item::Decimal { mantissa, exponent })
            }
            24 => {
                let inner = self.read_any_depth(depth + 1)?;
                let bytes = inner.as_bytes().map_err(|e| self.sticky(e))?;
                Ok(Item::Encoded(bytes))
            }
            30 => {
                let (numerator, denominator) = self.read_pair(depth)?;
                if denominator < 0 {
                    return self.fail(ItemError::TypeMismatch);
                }
                Ok(Item::Rational {
                    numerator,
                    denominator: denominator as u64,
                })
            }
            other => Ok(Item::Tag(other)),
        }
    }

    /// Shared shape of tag 4 (decimal, `[exponent, mantissa]`) and tag 30
    /// (rational, `[numerator, denominator]`): a definite 2-element array of
    /// integers, returned in wire order.
    fn read_pair(&mut self, depth: u8) -> Result<(i64, i64), ItemError> {
        let wrapper = self.read_any_depth(depth + 1)?;
        match wrapper {
            Item::Array(Length::Definite(2)) => {}
            _ => return Err(self.sticky(ItemError::TypeMismatch)),
        }
        let first = self.read_any_depth(depth + 1)?.as_i64().map_err(|e| self.sticky(e))?;
        let second = self.read_any_depth(depth + 1)?.as_i64().map_err(|e| self.sticky(e))?;
        Ok((first, second))
    }

    /// Validates and spans an indefinite-length byte/text run, leaving the
    /// stream positioned just after the terminating break.
    fn read_indefinite_chunks(&mut self, parent_major: u8) -> Result<Item<'a>, ItemError> {
        let start = self.pos;
        loop {
            if self.pos >= self.buf.len() {
                return self.fail(ItemError::EndOfStream);
            }
            let head_byte = self.buf[self.pos];
            if head_byte == 0xff {
                let span = &self.buf[start..self.pos];
                self.pos += 1;
                return Ok(if parent_major == 2 {
                    Item::BytesIndefinite(span)
                } else {
                    Item::TextIndefinite(span)
                });
            }
            let (major, ai, value) = self.read_head()?;
            if major != parent_major {
                return self.fail(ItemError::InvalidNesting);
            }
            if ai == 31 {
                return self.fail(ItemError::InvalidNesting);
            }
            let chunk = self.take(value as usize).map_err(|e| self.sticky(e))?;
            if parent_major == 3 {
                validate_utf8(chunk).map_err(|e| self.sticky(e))?;
            }
        }
    }

    /// Pre-validates an indefinite-length array (`major == 4`) or map
    /// (`major == 5`) by walking its members up to the terminating break,
    /// then rewinds to just past the opening header so the caller reads the
    /// contents itself via further [`read_any`] calls, same as the
    /// definite-length case. Maps require an even member count.
    fn validate_indefinite_collection(&mut self, major: u8) -> Result<(), ItemError> {
        let checkpoint = *self;
        let mut count: u64 = 0;
        loop {
            if self.pos >= self.buf.len() {
                return Err(self.sticky(ItemError::EndOfStream));
            }
            if self.buf[self.pos] == 0xff {
                self.pos += 1;
                break;
            }
            self.read_any()?;
            count += 1;
        }
        if major == 5 && count % 2 != 0 {
            return Err(self.sticky(ItemError::InvalidNesting));
        }
        *self = checkpoint;
        Ok(())
    }

    /// Current byte offset into the stream's buffer. Combined with
    /// [`Stream::span_since`], lets a caller capture the raw wire bytes of an
    /// item it just consumed (used by the pack/unpack `v` token).
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The bytes consumed between an earlier [`Stream::position`] and now.
    pub fn span_since(&self, start: usize) -> &'a [u8] {
        &self.buf[start..self.pos]
    }

    /// Reads one item and discards it, recursing into arrays/maps/tags so
    /// the stream ends up positioned past the whole structure rather than
    /// just its header.
    fn skip_any(&mut self) -> Result<(), ItemError> {
        let item = self.read_any()?;
        self.skip_children(&item)
    }

    fn skip_children(&mut self, item: &Item<'a>) -> Result<(), ItemError> {
        match *item {
            Item::Array(Length::Definite(n)) => {
                for _ in 0..n {
                    self.skip_any()?;
                }
            }
            Item::Map(Length::Definite(n)) => {
                for _ in 0..n.saturating_mul(2) {
                    self.skip_any()?;
                }
            }
            Item::Array(Length::Indefinite) | Item::Map(Length::Indefinite) => loop {
                let next = self.read_any()?;
                if matches!(next, Item::Break) {
                    break;
                }
                self.skip_children(&next)?;
            },
            Item::Tag(_) => self.skip_any()?,
            _ => {}
        }
        Ok(())
    }
}

fn validate_utf8(bytes: &[u8]) -> Result<&str, ItemError> {
    #[cfg(feature = "utf8-validate")]
    {
        core::str::from_utf8(bytes).map_err(|_| ItemError::InvalidUtf8)
    }
    #[cfg(not(feature = "utf8-validate"))]
    {
        // Safety is the caller's under this profile: skipping validation
        // trades a potential garbage `&str` for avoiding the scan on tiny
        // firmware builds. `from_utf8` is still used so we never touch
        // `unsafe` here; invalid bytes just surface as `InvalidUtf8` from a
        // later consumer instead of from the codec.
        core::str::from_utf8(bytes).map_err(|_| ItemError::InvalidUtf8)
    }
}

/// Iterates the chunks of an [`Item::BytesIndefinite`] span.
pub fn byte_chunks(span: &[u8]) -> impl Iterator<Item = &[u8]> {
    ChunkIter { s: Stream::new(span) }
}

/// Iterates the chunks of an [`Item::TextIndefinite`] span.
pub fn text_chunks(span: &[u8]) -> impl Iterator<Item = &str> {
    ChunkIter { s: Stream::new(span) }.filter_map(|b| core::str::from_utf8(b).ok())
}

struct ChunkIter<'a> {
    s: Stream<'a>,
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.s.remaining() == 0 {
            return None;
        }
        match self.s.read_any().ok()? {
            Item::Bytes(b) | Item::Encoded(b) => Some(b),
            Item::Text(t) => Some(t.as_bytes()),
            _ => None,
        }
    }
}

/// Parses a restricted RFC 3339 subset (`YYYY-MM-DDTHH:MM:SS[.fff]Z`) into
/// seconds since the Unix epoch. Only the UTC (`Z`) form is accepted.
fn parse_rfc3339(s: &str) -> Option<f64> {
    let b = s.as_bytes();
    if b.len() < 20 || b[19] != b'Z' && b.get(19).copied() != Some(b'.') {
        if b.len() < 20 {
            return None;
        }
    }
    let digit = |i: usize| -> Option<i64> {
        let c = *b.get(i)?;
        if c.is_ascii_digit() {
            Some((c - b'0') as i64)
        } else {
            None
        }
    };
    let two = |i: usize| -> Option<i64> { Some(digit(i)? * 10 + digit(i + 1)?) };
    if b[4] != b'-' || b[7] != b'-' || b[10] != b'T' || b[13] != b':' || b[16] != b':' {
        return None;
    }
    let year = digit(0)? * 1000 + digit(1)? * 100 + two(2)?;
    let month = two(5)?;
    let day = two(8)?;
    let hour = two(11)?;
    let minute = two(14)?;
    let second = two(17)?;
    let mut frac = 0.0f64;
    let mut idx = 19;
    if b.get(idx) == Some(&b'.') {
        idx += 1;
        let start = idx;
        while b.get(idx).map(u8::is_ascii_digit).unwrap_or(false) {
            idx += 1;
        }
        let digits = core::str::from_utf8(&b[start..idx]).ok()?;
        let scale = 10f64.powi(digits.len() as i32);
        frac = digits.parse::<f64>().ok()? / scale;
    }
    if b.get(idx) != Some(&b'Z') {
        return None;
    }
    let days = days_from_civil(year, month, day)?;
    let secs = days * 86_400 + hour * 3600 + minute * 60 + second;
    Some(secs as f64 + frac)
}

/// Howard Hinnant's civil-from-days algorithm, inverted: days since the Unix
/// epoch for a proleptic-Gregorian `(year, month, day)`.
fn days_from_civil(y: i64, m: i64, d: i64) -> Option<i64> {
    if !(1..=12).contains(&m) || !(1..=31).contains(&d) {
        return None;
    }
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = (m + 9) % 12;
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    Some(era * 146_097 + doe - 719_468)
}

/// Scans `n` key/value pairs starting at the stream's current position for a
/// text key equal to `key`, returning the matching value and leaving the
/// stream positioned just past the pair that matched (or past all `n` pairs
/// if nothing matched).
///
/// First match wins, matching the decoder's general duplicate-tolerant
/// policy; keys that aren't text are skipped over rather than erroring.
pub fn get_any<'a>(s: &mut Stream<'a>, n: u64, key: &str) -> Result<Item<'a>, ItemError> {
    let mut found = None;
    for _ in 0..n {
        let k = s.read_any()?;
        let v = s.read_any()?;
        if found.is_none() {
            if let Item::Text(t) = k {
                if t == key {
                    found = Some(v);
                }
            }
        }
    }
    found.ok_or(ItemError::KeyNotFound)
}

/// Returns the `i`-th of `n` items in an array starting at the stream's
/// current position, leaving the stream positioned past all `n` items.
pub fn idx_any<'a>(s: &mut Stream<'a>, n: u64, i: u64) -> Result<Item<'a>, ItemError> {
    if i >= n {
        // Still consume all n items so the stream ends up past the array,
        // matching get_any's "scan the whole thing" contract.
        for _ in 0..n {
            s.read_any()?;
        }
        return Err(ItemError::KeyNotFound);
    }
    let mut found = None;
    for idx in 0..n {
        let v = s.read_any()?;
        if idx == i {
            found = Some(v);
        }
    }
    found.ok_or(ItemError::KeyNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn uint_shortest_forms_round_trip() {
        for v in [0u64, 23, 24, 255, 256, 65535, 65536, u32::MAX as u64, u32::MAX as u64 + 1, u64::MAX] {
            let mut buf = [0u8; 16];
            let n = Writer::new(&mut buf).write_uint(v).unwrap().finish();
            let mut s = Stream::new(&buf[..n]);
            assert_eq!(s.read_any().unwrap().as_u64().unwrap(), v);
        }
    }

    #[test]
    fn negative_int_round_trips() {
        for v in [-1i64, -24, -25, -256, -257, -65536, i64::MIN + 1] {
            let mut buf = [0u8; 16];
            let n = Writer::new(&mut buf).write_int(v).unwrap().finish();
            let mut s = Stream::new(&buf[..n]);
            assert_eq!(s.read_any().unwrap().as_i64().unwrap(), v);
        }
    }

    /// `i64::MIN` packs as major 1, AI 27, the 8-byte payload `0x7f…ff`
    /// (CBOR negative-int payload `n = -(1+v)`, so `v = i64::MIN` needs
    /// `n = u64::MAX / 2 = 0x7fff_ffff_ffff_ffff`), and round-trips exactly.
    #[test]
    fn negative_int_min_matches_wire_bytes() {
        let mut buf = [0u8; 16];
        let n = Writer::new(&mut buf).write_int(i64::MIN).unwrap().finish();
        assert_eq!(
            &buf[..n],
            &[0x3B, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        let mut s = Stream::new(&buf[..n]);
        assert_eq!(s.read_any().unwrap().as_i64().unwrap(), i64::MIN);
    }

    #[test]
    fn rejects_reserved_ai() {
        let mut s = Stream::new(&[0b000_11100]); // major 0, ai 28
        assert_eq!(s.read_any(), Err(ItemError::InvalidAi));
        // Sticky: a second call returns the same error without re-reading.
        assert_eq!(s.read_any(), Err(ItemError::InvalidAi));
    }

    #[test]
    fn self_describe_tag_unwraps_at_top_level() {
        let mut buf = [0u8; 8];
        let n = Writer::new(&mut buf).write_tag(55799).unwrap().write_uint(7).unwrap().finish();
        let mut s = Stream::new(&buf[..n]);
        assert_eq!(s.read_any().unwrap(), Item::UInt(7));
    }

    #[test]
    fn unrecognised_tag_then_value() {
        let mut buf = [0u8; 8];
        let n = Writer::new(&mut buf).write_tag(1000).unwrap().write_uint(7).unwrap().finish();
        let mut s = Stream::new(&buf[..n]);
        assert_eq!(s.read_any().unwrap(), Item::Tag(1000));
        assert_eq!(s.read_any().unwrap(), Item::UInt(7));
    }

    #[test]
    fn decimal_round_trip() {
        let mut buf = [0u8; 16];
        let n = Writer::new(&mut buf).write_decimal(-12345, -2).unwrap().finish();
        let mut s = Stream::new(&buf[..n]);
        match s.read_any().unwrap() {
            Item::Decimal { mantissa, exponent } => {
                assert_eq!(mantissa, -12345);
                assert_eq!(exponent, -2);
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn decimal_corner_cases() {
        assert_eq!(decimal_to_f64(0, 9999), 0.0);
        assert_eq!(decimal_to_f64(5, 4000), f64::INFINITY);
        assert_eq!(decimal_to_f64(-5, 4000), f64::NEG_INFINITY);
        assert_eq!(decimal_to_f64(5, -4000), 0.0);
    }

    #[test]
    fn map_get_any_first_match_wins() {
        let mut buf = [0u8; 64];
        let n = {
            let mut w = Writer::new(&mut buf);
            w.write_map(2).unwrap();
            w.write_text("k").unwrap();
            w.write_uint(1).unwrap();
            w.write_text("k").unwrap();
            w.write_uint(2).unwrap();
            w.finish()
        };
        let mut s = Stream::new(&buf[..n]);
        assert_eq!(s.read_any().unwrap(), Item::Map(Length::Definite(2)));
        assert_eq!(get_any(&mut s, 2, "k").unwrap().as_u64().unwrap(), 1);
    }

    #[test]
    fn idx_any_out_of_range() {
        let mut buf = [0u8; 32];
        let n = {
            let mut w = Writer::new(&mut buf);
            w.write_array(2).unwrap();
            w.write_uint(10).unwrap();
            w.write_uint(20).unwrap();
            w.finish()
        };
        let mut s = Stream::new(&buf[..n]);
        assert_eq!(s.read_any().unwrap(), Item::Array(Length::Definite(2)));
        assert_eq!(idx_any(&mut s, 2, 5), Err(ItemError::KeyNotFound));
    }

    #[test]
    fn indefinite_bytes_chunks() {
        let mut buf = [0u8; 32];
        let n = {
            let mut w = Writer::new(&mut buf);
            w.write_bytes_start().unwrap();
            w.write_bytes(&[1, 2]).unwrap();
            w.write_bytes(&[3]).unwrap();
            w.write_end().unwrap();
            w.finish()
        };
        let mut s = Stream::new(&buf[..n]);
        match s.read_any().unwrap() {
            Item::BytesIndefinite(span) => {
                let chunks: Vec<&[u8]> = byte_chunks(span).collect();
                assert_eq!(chunks, vec![&[1u8, 2][..], &[3u8][..]]);
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[test]
    fn datetime_rfc3339() {
        let epoch = parse_rfc3339("1970-01-01T00:00:00Z").unwrap();
        assert_eq!(epoch, 0.0);
        let epoch = parse_rfc3339("2024-01-02T03:04:05.5Z").unwrap();
        assert!((epoch - 1_704_165_845.5).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_uint_round_trip(v in any::<u64>()) {
            let mut buf = [0u8; 16];
            let n = Writer::new(&mut buf).write_uint(v).unwrap().finish();
            let mut s = Stream::new(&buf[..n]);
            prop_assert_eq!(s.read_any().unwrap().as_u64().unwrap(), v);
        }

        #[test]
        fn prop_text_round_trip(t in "[ -~]{0,40}") {
            let mut buf = [0u8; 64];
            let n = Writer::new(&mut buf).write_text(&t).unwrap().finish();
            let mut s = Stream::new(&buf[..n]);
            prop_assert_eq!(s.read_any().unwrap().as_text().unwrap(), t.as_str());
        }
    }
}
