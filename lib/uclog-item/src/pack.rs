// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The pack/unpack format-string DSL: a single-pass driver over a compact
//! token grammar that builds or reads a [`crate::Item`] tree from a flat
//! argument list, standing in for C variadics in a `no_std`/no-`alloc`
//! crate.
//!
//! Grammar (see module docs for the full type table):
//! - `{`/`}` - indefinite map; `[`/`]` - indefinite array.
//! - `.NAME:` - literal text key; `s:`/`i:` - text/integer key from an arg.
//! - `:?X` - (map fields only) value is optional; consumes a `bool*`
//!   presence arg before `X`'s own arg.
//! - `i`/`I`/`q`/`Q` - i32/u32/i64/u64. `s` - text (C-string on unpack).
//! - `b` - byte string. `?` - bool. `d`/`f`/`e` - float64/32/16.
//! - `R` - rational. `D` - decimal. `t` - datetime. `v` - (unpack only) a
//!   captured sub-stream span, for deferred parsing.
//!
//! Packing always emits indefinite map/array forms; unpacking accepts
//! either. Unpacking a map reads the whole map, then looks each format
//! field up by key in format order; a missing required key fails.

use core::slice::{Iter, IterMut};

use crate::{Item, ItemError, Length, Stream, Writer, CBOR_MAX_RECURSION};

/// A key supplied dynamically (the `s:`/`i:` key forms) rather than as a
/// format-string literal (`.NAME:`).
#[derive(Debug, Clone, Copy)]
pub enum Key<'a> {
    Text(&'a str),
    Int(i64),
}

/// One packed argument, consumed in format-string order.
#[derive(Debug, Clone, Copy)]
pub enum PackArg<'a> {
    /// Supplies a dynamic map key (`s:`/`i:`).
    Key(Key<'a>),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    Bool(bool),
    Text(&'a str),
    Bytes(&'a [u8]),
    F64(f64),
    F32(f32),
    /// Raw IEEE 754 half-precision bits.
    F16(u16),
    Rational { numerator: i64, denominator: u64 },
    Decimal { mantissa: i64, exponent: i64 },
    /// Epoch seconds.
    Datetime(f64),
}

/// One unpacked argument: either a dynamic lookup key, or a mutable output
/// slot filled from the matching wire value.
pub enum UnpackArg<'a> {
    Key(Key<'a>),
    I32(&'a mut i32),
    U32(&'a mut u32),
    I64(&'a mut i64),
    U64(&'a mut u64),
    Bool(&'a mut bool),
    /// Presence flag for a `:?` optional field.
    Present(&'a mut bool),
    /// `s`: a NUL-terminated C string. `len` receives the byte count
    /// including the terminator.
    Text { buf: &'a mut [u8], len: &'a mut usize },
    Bytes { buf: &'a mut [u8], len: &'a mut usize },
    F64(&'a mut f64),
    F32(&'a mut f32),
    F16(&'a mut u16),
    Rational {
        numerator: &'a mut i64,
        denominator: &'a mut u64,
    },
    Decimal {
        mantissa: &'a mut i64,
        exponent: &'a mut i64,
    },
    Datetime(&'a mut f64),
    /// `v`: captures the raw wire bytes of the matched item for later
    /// parsing, rather than decoding it now.
    Sub(&'a mut &'a [u8]),
}

/// A cursor over the format string itself, slicing literal key names
/// directly out of it rather than copying them (no `alloc` in this crate).
struct Fmt<'f> {
    s: &'f str,
    pos: usize,
}

impl<'f> Fmt<'f> {
    fn new(s: &'f str) -> Self {
        Fmt { s, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.s[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, want: char) -> Result<(), ItemError> {
        if self.bump() == Some(want) {
            Ok(())
        } else {
            Err(ItemError::FormatError)
        }
    }

    fn take_literal_key(&mut self) -> Result<&'f str, ItemError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == ':' {
                break;
            }
            self.bump();
        }
        let name = &self.s[start..self.pos];
        self.eat(':')?;
        Ok(name)
    }

    /// Consumes a `:?` optional-value marker if present.
    fn eat_optional(&mut self) -> Result<bool, ItemError> {
        if self.peek() == Some(':') {
            self.bump();
            self.eat('?')?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.s.len()
    }
}

fn check_depth(depth: u8) -> Result<(), ItemError> {
    if depth > CBOR_MAX_RECURSION {
        Err(ItemError::RecursionExceeded)
    } else {
        Ok(())
    }
}

/// Packs `args` into `out` following `fmt`, returning the number of bytes
/// written.
pub fn pack(fmt: &str, args: &[PackArg], out: &mut [u8]) -> Result<usize, ItemError> {
    let mut w = Writer::new(out);
    let mut f = Fmt::new(fmt);
    let mut it = args.iter();
    pack_value(&mut w, &mut f, &mut it, 0)?;
    if !f.at_end() {
        return Err(ItemError::FormatError);
    }
    Ok(w.finish())
}

fn pack_value<'a>(
    w: &mut Writer,
    f: &mut Fmt,
    args: &mut Iter<'a, PackArg<'a>>,
    depth: u8,
) -> Result<(), ItemError> {
    match f.peek().ok_or(ItemError::FormatError)? {
        '{' => {
            check_depth(depth)?;
            f.bump();
            w.write_map_start()?;
            while f.peek() != Some('}') {
                pack_key(w, f, args)?;
                pack_value(w, f, args, depth + 1)?;
                if f.peek() == Some(',') {
                    f.bump();
                }
            }
            f.bump();
            w.write_end()?;
        }
        '[' => {
            check_depth(depth)?;
            f.bump();
            w.write_array_start()?;
            while f.peek() != Some(']') {
                pack_value(w, f, args, depth + 1)?;
                if f.peek() == Some(',') {
                    f.bump();
                }
            }
            f.bump();
            w.write_end()?;
        }
        _ => {
            let c = f.bump().unwrap();
            pack_scalar(c, w, args)?;
        }
    }
    Ok(())
}

fn pack_key<'a>(w: &mut Writer, f: &mut Fmt, args: &mut Iter<'a, PackArg<'a>>) -> Result<(), ItemError> {
    match f.peek().ok_or(ItemError::FormatError)? {
        '.' => {
            f.bump();
            let name = f.take_literal_key()?;
            w.write_text(name)?;
        }
        's' => {
            f.bump();
            f.eat(':')?;
            match args.next().ok_or(ItemError::FormatError)? {
                PackArg::Key(Key::Text(k)) => {
                    w.write_text(*k)?;
                }
                _ => return Err(ItemError::FormatError),
            }
        }
        'i' => {
            f.bump();
            f.eat(':')?;
            match args.next().ok_or(ItemError::FormatError)? {
                PackArg::Key(Key::Int(k)) => {
                    w.write_int(*k)?;
                }
                _ => return Err(ItemError::FormatError),
            }
        }
        _ => return Err(ItemError::FormatError),
    }
    Ok(())
}

fn pack_scalar<'a>(c: char, w: &mut Writer, args: &mut Iter<'a, PackArg<'a>>) -> Result<(), ItemError> {
    let arg = args.next().ok_or(ItemError::FormatError)?;
    match (c, arg) {
        ('i', PackArg::I32(v)) => {
            w.write_int(*v as i64)?;
        }
        ('I', PackArg::U32(v)) => {
            w.write_uint(*v as u64)?;
        }
        ('q', PackArg::I64(v)) => {
            w.write_int(*v)?;
        }
        ('Q', PackArg::U64(v)) => {
            w.write_uint(*v)?;
        }
        ('?', PackArg::Bool(v)) => {
            w.write_bool(*v)?;
        }
        ('s', PackArg::Text(t)) => {
            w.write_text(t)?;
        }
        ('b', PackArg::Bytes(b)) => {
            w.write_bytes(b)?;
        }
        ('d', PackArg::F64(v)) => {
            w.write_float64(*v)?;
        }
        ('f', PackArg::F32(v)) => {
            w.write_float32(*v)?;
        }
        ('e', PackArg::F16(bits)) => {
            w.write_float16(*bits)?;
        }
        (
            'R',
            PackArg::Rational {
                numerator,
                denominator,
            },
        ) => {
            w.write_rational(*numerator, *denominator)?;
        }
        (
            'D',
            PackArg::Decimal {
                mantissa,
                exponent,
            },
        ) => {
            w.write_decimal(*mantissa, *exponent)?;
        }
        ('t', PackArg::Datetime(epoch)) => {
            w.write_datetime(*epoch)?;
        }
        _ => return Err(ItemError::FormatError),
    }
    Ok(())
}

/// Unpacks `buf` following `fmt`, filling the output slots in `args`.
pub fn unpack<'a>(buf: &'a [u8], fmt: &str, args: &mut [UnpackArg<'a>]) -> Result<(), ItemError> {
    let mut s = Stream::new(buf);
    let mut f = Fmt::new(fmt);
    let mut it = args.iter_mut();
    unpack_value(&mut s, &mut f, &mut it, 0)?;
    if !f.at_end() {
        return Err(ItemError::FormatError);
    }
    Ok(())
}

fn unpack_value<'a>(
    s: &mut Stream<'a>,
    f: &mut Fmt,
    args: &mut IterMut<'_, UnpackArg<'a>>,
    depth: u8,
) -> Result<(), ItemError> {
    match f.peek().ok_or(ItemError::FormatError)? {
        '{' => {
            check_depth(depth)?;
            f.bump();
            unpack_map(s, f, args, depth)?;
        }
        '[' => {
            check_depth(depth)?;
            f.bump();
            unpack_array(s, f, args, depth)?;
        }
        _ => unpack_scalar(s, f, args)?,
    }
    Ok(())
}

fn unpack_map<'a>(
    s: &mut Stream<'a>,
    f: &mut Fmt,
    args: &mut IterMut<'_, UnpackArg<'a>>,
    depth: u8,
) -> Result<(), ItemError> {
    let header = s.read_any()?;
    let n = match header {
        Item::Map(Length::Definite(n)) => Some(n),
        Item::Map(Length::Indefinite) => None,
        _ => return Err(ItemError::TypeMismatch),
    };
    let content_start = *s;

    while f.peek() != Some('}') {
        let mut scan = content_start;
        let (optional, found) = match f.peek().ok_or(ItemError::FormatError)? {
            '.' => {
                f.bump();
                let name = f.take_literal_key()?;
                let optional = f.eat_optional()?;
                let found = find_field(&mut scan, n, |k| matches!(k, Item::Text(t) if *t == name));
                (optional, found)
            }
            's' => {
                f.bump();
                f.eat(':')?;
                let name = match args.next().ok_or(ItemError::FormatError)? {
                    UnpackArg::Key(Key::Text(k)) => *k,
                    _ => return Err(ItemError::FormatError),
                };
                let optional = f.eat_optional()?;
                let found = find_field(&mut scan, n, |k| matches!(k, Item::Text(t) if *t == name));
                (optional, found)
            }
            'i' => {
                f.bump();
                f.eat(':')?;
                let want = match args.next().ok_or(ItemError::FormatError)? {
                    UnpackArg::Key(Key::Int(k)) => *k,
                    _ => return Err(ItemError::FormatError),
                };
                let optional = f.eat_optional()?;
                let found = find_field(&mut scan, n, |k| k.as_i64() == Ok(want));
                (optional, found)
            }
            _ => return Err(ItemError::FormatError),
        };
        match found {
            Ok(()) => {
                if optional {
                    set_present(args, true)?;
                }
                unpack_value(&mut scan, f, args, depth + 1)?;
            }
            Err(ItemError::KeyNotFound) if optional => {
                set_present(args, false)?;
                skip_value_spec(f, args)?;
            }
            Err(e) => return Err(e),
        }
        if f.peek() == Some(',') {
            f.bump();
        }
    }
    f.bump();

    // Advance the real stream past the whole map now that every field has
    // been resolved against its own snapshot.
    match n {
        Some(n) => {
            for _ in 0..n {
                s.skip_any()?;
                s.skip_any()?;
            }
        }
        None => loop {
            let k = s.read_any()?;
            if matches!(k, Item::Break) {
                break;
            }
            s.skip_any()?;
        },
    }
    Ok(())
}

fn set_present<'a>(args: &mut IterMut<'_, UnpackArg<'a>>, value: bool) -> Result<(), ItemError> {
    match args.next().ok_or(ItemError::FormatError)? {
        UnpackArg::Present(p) => {
            **p = value;
            Ok(())
        }
        _ => Err(ItemError::FormatError),
    }
}

/// Scans a map's `n` pairs (or, if `n` is `None`, until [`Item::Break`]) for
/// a key satisfying `matches_key`, leaving `scan` positioned right at the
/// start of the matching value on success so the caller can read into it.
/// Non-matching values are discarded with a full structural skip, not just
/// their header.
fn find_field<'a>(
    scan: &mut Stream<'a>,
    n: Option<u64>,
    matches_key: impl Fn(&Item<'a>) -> bool,
) -> Result<(), ItemError> {
    let mut i: u64 = 0;
    loop {
        if let Some(limit) = n {
            if i >= limit {
                break;
            }
        }
        let k = scan.read_any()?;
        if n.is_none() && matches!(k, Item::Break) {
            break;
        }
        if matches_key(&k) {
            return Ok(());
        }
        scan.skip_any()?;
        i += 1;
    }
    Err(ItemError::KeyNotFound)
}

fn unpack_array<'a>(
    s: &mut Stream<'a>,
    f: &mut Fmt,
    args: &mut IterMut<'_, UnpackArg<'a>>,
    depth: u8,
) -> Result<(), ItemError> {
    let header = s.read_any()?;
    let n = match header {
        Item::Array(Length::Definite(n)) => Some(n),
        Item::Array(Length::Indefinite) => None,
        _ => return Err(ItemError::TypeMismatch),
    };
    let mut i = 0u64;
    loop {
        if f.peek() == Some(']') {
            break;
        }
        if let Some(limit) = n {
            if i >= limit {
                break;
            }
        }
        unpack_value(s, f, args, depth + 1)?;
        i += 1;
        if f.peek() == Some(',') {
            f.bump();
        }
    }
    f.eat(']')?;
    match n {
        Some(limit) if i != limit => return Err(ItemError::FormatError),
        None => {
            let b = s.read_any()?;
            if !matches!(b, Item::Break) {
                return Err(ItemError::TypeMismatch);
            }
        }
        _ => {}
    }
    Ok(())
}

fn unpack_scalar<'a>(
    s: &mut Stream<'a>,
    f: &mut Fmt,
    args: &mut IterMut<'_, UnpackArg<'a>>,
) -> Result<(), ItemError> {
    let c = f.bump().ok_or(ItemError::FormatError)?;
    if c == 'v' {
        let start = s.position();
        s.skip_any()?;
        let span = s.span_since(start);
        return match args.next().ok_or(ItemError::FormatError)? {
            UnpackArg::Sub(out) => {
                **out = span;
                Ok(())
            }
            _ => Err(ItemError::FormatError),
        };
    }
    let item = s.read_any()?;
    let slot = args.next().ok_or(ItemError::FormatError)?;
    match (c, slot) {
        ('i', UnpackArg::I32(out)) => {
            **out = i32::try_from(item.as_i64()?).map_err(|_| ItemError::OutOfRange)?;
        }
        ('I', UnpackArg::U32(out)) => {
            **out = u32::try_from(item.as_u64()?).map_err(|_| ItemError::OutOfRange)?;
        }
        ('q', UnpackArg::I64(out)) => {
            **out = item.as_i64()?;
        }
        ('Q', UnpackArg::U64(out)) => {
            **out = item.as_u64()?;
        }
        ('?', UnpackArg::Bool(out)) => match item {
            Item::Bool(b) => **out = b,
            _ => return Err(ItemError::TypeMismatch),
        },
        ('s', UnpackArg::Text { buf, len }) => match item {
            Item::Text(t) => {
                let bytes = t.as_bytes();
                if bytes.len() + 1 > buf.len() {
                    return Err(ItemError::BufferTooSmall);
                }
                buf[..bytes.len()].copy_from_slice(bytes);
                buf[bytes.len()] = 0;
                **len = bytes.len() + 1;

            }
            _ => return Err(ItemError::TypeMismatch),
        },
        ('b', UnpackArg::Bytes { buf, len }) => match item {
            Item::Bytes(b) => {
                if b.len() > buf.len() {
                    return Err(ItemError::BufferTooSmall);
                }
                buf[..b.len()].copy_from_slice(b);
                **len = b.len();
            }
            _ => return Err(ItemError::TypeMismatch),
        },
        ('d', UnpackArg::F64(out)) => {
            **out = item.as_f64()?;
        }
        ('f', UnpackArg::F32(out)) => {
            **out = item.as_f64()? as f32;
        }
        ('e', UnpackArg::F16(out)) => match item {
            Item::Float16(bits) => **out = bits,
            _ => return Err(ItemError::TypeMismatch),
        },
        (
            'R',
            UnpackArg::Rational {
                numerator,
                denominator,
            },
        ) => match item {
            Item::Rational {
                numerator: n2,
                denominator: d2,
            } => {
                **numerator = n2;
                **denominator = d2;
            }
            _ => return Err(ItemError::TypeMismatch),
        },
        (
            'D',
            UnpackArg::Decimal {
                mantissa,
                exponent,
            },
        ) => match item {
            Item::Decimal {
                mantissa: m2,
                exponent: e2,
            } => {
                **mantissa = m2;
                **exponent = e2;
            }
            _ => return Err(ItemError::TypeMismatch),
        },
        ('t', UnpackArg::Datetime(out)) => {
            **out = item.as_f64()?;
        }
        _ => return Err(ItemError::FormatError),
    }
    Ok(())
}

/// Mirrors [`unpack_value`]'s grammar walk without a stream, for a map field
/// whose optional key wasn't found: advances `f` and consumes the matching
/// args without reading or writing anything.
fn skip_value_spec<'a>(f: &mut Fmt, args: &mut IterMut<'_, UnpackArg<'a>>) -> Result<(), ItemError> {
    match f.peek().ok_or(ItemError::FormatError)? {
        '{' => {
            f.bump();
            while f.peek() != Some('}') {
                skip_key_spec(f, args)?;
                f.eat_optional()?;
                skip_value_spec(f, args)?;
                if f.peek() == Some(',') {
                    f.bump();
                }
            }
            f.bump();
        }
        '[' => {
            f.bump();
            while f.peek() != Some(']') {
                skip_value_spec(f, args)?;
                if f.peek() == Some(',') {
                    f.bump();
                }
            }
            f.bump();
        }
        _ => {
            f.bump();
            args.next().ok_or(ItemError::FormatError)?;
        }
    }
    Ok(())
}

fn skip_key_spec<'a>(f: &mut Fmt, args: &mut IterMut<'_, UnpackArg<'a>>) -> Result<(), ItemError> {
    match f.peek().ok_or(ItemError::FormatError)? {
        '.' => {
            f.bump();
            f.take_literal_key()?;
        }
        's' | 'i' => {
            f.bump();
            f.eat(':')?;
            args.next().ok_or(ItemError::FormatError)?;
        }
        _ => return Err(ItemError::FormatError),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `{.a:i,.b:s,.c:[i,i,i]}` packed with `(1, "hi", 10, 20, 30)` unpacks
    /// back to the same values.
    #[test]
    fn mixed_map_round_trip() {
        let mut buf = [0u8; 128];
        let args = [
            PackArg::I32(1),
            PackArg::Text("hi"),
            PackArg::I32(10),
            PackArg::I32(20),
            PackArg::I32(30),
        ];
        let n = pack("{.a:i,.b:s,.c:[i,i,i]}", &args, &mut buf).unwrap();

        let mut a = 0i32;
        let mut b_buf = [0u8; 16];
        let mut b_len = 0usize;
        let (mut c0, mut c1, mut c2) = (0i32, 0i32, 0i32);
        let mut unpack_args = [
            UnpackArg::I32(&mut a),
            UnpackArg::Text {
                buf: &mut b_buf,
                len: &mut b_len,
            },
            UnpackArg::I32(&mut c0),
            UnpackArg::I32(&mut c1),
            UnpackArg::I32(&mut c2),
        ];
        unpack(&buf[..n], "{.a:i,.b:s,.c:[i,i,i]}", &mut unpack_args).unwrap();

        assert_eq!(a, 1);
        assert_eq!(&b_buf[..b_len], b"hi\0");
        assert_eq!((c0, c1, c2), (10, 20, 30));
    }

    #[test]
    fn out_of_order_wire_map_still_resolves_by_key() {
        // Build the map by hand with fields in the opposite order from the
        // format string, proving unpack looks fields up rather than reading
        // them positionally.
        let mut buf = [0u8; 64];
        let n = {
            let mut w = Writer::new(&mut buf);
            w.write_map_start().unwrap();
            w.write_text("b").unwrap();
            w.write_uint(7).unwrap();
            w.write_text("a").unwrap();
            w.write_int(-3).unwrap();
            w.write_end().unwrap();
            w.finish()
        };
        let mut a = 0i32;
        let mut b = 0u64;
        let mut args = [UnpackArg::I32(&mut a), UnpackArg::U64(&mut b)];
        unpack(&buf[..n], "{.a:i,.b:Q}", &mut args).unwrap();
        assert_eq!(a, -3);
        assert_eq!(b, 7);
    }

    #[test]
    fn missing_required_key_fails() {
        let mut buf = [0u8; 32];
        let n = {
            let mut w = Writer::new(&mut buf);
            w.write_map(1).unwrap();
            w.write_text("a").unwrap();
            w.write_uint(1).unwrap();
            w.finish()
        };
        let mut b = 0i32;
        let mut args = [UnpackArg::I32(&mut b)];
        assert_eq!(
            unpack(&buf[..n], "{.b:i}", &mut args),
            Err(ItemError::KeyNotFound)
        );
    }

    #[test]
    fn optional_missing_key_sets_presence_false() {
        let mut buf = [0u8; 32];
        let n = {
            let mut w = Writer::new(&mut buf);
            w.write_map(0).unwrap();
            w.finish()
        };
        let mut present = true;
        let mut v = 0i32;
        let mut args = [UnpackArg::Present(&mut present), UnpackArg::I32(&mut v)];
        unpack(&buf[..n], "{.a::?i}", &mut args).unwrap();
        assert!(!present);
    }

    #[test]
    fn optional_present_key_fills_value_and_presence() {
        let mut buf = [0u8; 32];
        let n = {
            let mut w = Writer::new(&mut buf);
            w.write_map(1).unwrap();
            w.write_text("a").unwrap();
            w.write_uint(5).unwrap();
            w.finish()
        };
        let mut present = false;
        let mut v = 0i32;
        let mut args = [UnpackArg::Present(&mut present), UnpackArg::I32(&mut v)];
        unpack(&buf[..n], "{.a::?i}", &mut args).unwrap();
        assert!(present);
        assert_eq!(v, 5);
    }

    #[test]
    fn dynamic_int_key_round_trip() {
        let mut buf = [0u8; 32];
        let args = [PackArg::Key(Key::Int(42)), PackArg::I32(9)];
        let n = pack("{i:i}", &args, &mut buf).unwrap();

        let mut out = 0i32;
        let mut unpack_args = [UnpackArg::Key(Key::Int(42)), UnpackArg::I32(&mut out)];
        unpack(&buf[..n], "{i:i}", &mut unpack_args).unwrap();
        assert_eq!(out, 9);
    }

    #[test]
    fn v_token_captures_raw_sub_stream() {
        let mut buf = [0u8; 32];
        let n = {
            let mut w = Writer::new(&mut buf);
            w.write_array(2).unwrap();
            w.write_uint(1).unwrap();
            w.write_uint(2).unwrap();
            w.finish()
        };
        let mut sub: &[u8] = &[];
        let mut args = [UnpackArg::Sub(&mut sub)];
        unpack(&buf[..n], "v", &mut args).unwrap();

        let mut reread = Stream::new(sub);
        assert_eq!(reread.read_any().unwrap(), Item::Array(Length::Definite(2)));
        assert_eq!(reread.read_any().unwrap().as_u64().unwrap(), 1);
        assert_eq!(reread.read_any().unwrap().as_u64().unwrap(), 2);
    }

    #[test]
    fn indefinite_map_with_odd_entries_is_rejected() {
        let mut buf = [0u8; 32];
        let n = {
            let mut w = Writer::new(&mut buf);
            w.write_map_start().unwrap();
            w.write_text("a").unwrap();
            w.write_uint(1).unwrap();
            w.write_text("b").unwrap();
            // missing value: break lands mid-pair
            w.write_end().unwrap();
            w.finish()
        };
        let mut s = Stream::new(&buf[..n]);
        assert_eq!(s.read_any(), Err(ItemError::InvalidNesting));
    }
}
