// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::marker::PhantomData;

use uclog_frame::encode_frame;
use uclog_ring::RingBuffer;

use crate::config::{DefaultLogConfig, LogConfig};
use crate::error::Fatal;
use crate::traits::Link;

const TYPE_DATA: u8 = 0b11;

/// Owns the TX ring and multiplexes arbitrary port payloads onto it.
///
/// `TX_N` is the ring's backing capacity, following the teacher's
/// `Usart<const TX_BUF_LEN: usize, ...>` convention of sizing buffers with
/// const generics rather than a runtime-configured allocator.
pub struct LogTransport<const TX_N: usize, L: Link, C: LogConfig = DefaultLogConfig> {
    ring: RingBuffer<TX_N>,
    suspended: bool,
    _link: PhantomData<L>,
    _cfg: PhantomData<C>,
}

impl<const TX_N: usize, L: Link, C: LogConfig> LogTransport<TX_N, L, C> {
    pub const fn new() -> Self {
        LogTransport {
            ring: RingBuffer::new(),
            suspended: false,
            _link: PhantomData,
            _cfg: PhantomData,
        }
    }

    /// Frames `payload` for `port` (`header = (port << 2) | 0b11`) and
    /// appends it to the TX ring, then calls [`Link::tx_schedule`] unless TX
    /// is currently suspended.
    ///
    /// This always writes via [`RingBuffer::write`], which overwrites
    /// unread bytes on overflow rather than blocking: there's no
    /// `WaitHandle` at this layer to block on. [`crate::LogEmitter`]'s
    /// port-0 paths apply the "if the ring lacks room, flush-wait" policy
    /// themselves, using [`LogTransport::tx_avail`], before calling down to
    /// this; other ports get this unconditional, overwrite-on-overflow
    /// behavior.
    pub fn emit_raw(&mut self, link: &L, port: u8, payload: &[u8]) -> Result<(), Fatal> {
        if payload.len() > C::MAX_PACKET_SIZE {
            return Err(Fatal::PacketTooLarge);
        }
        let header = (port << 2) | TYPE_DATA;
        self.framed_write(header, payload)?;
        if !self.suspended {
            link.tx_schedule();
        }
        Ok(())
    }

    /// `C::MAX_PACKET_SIZE` is a trait-associated const, and stable Rust
    /// can't size a stack array from it directly; `BODY_CAP` instead covers
    /// the documented default (`LOG_MAX_PACKET_SIZE = 1500`) plus the
    /// header byte. `emit_raw`'s `C::MAX_PACKET_SIZE` check runs first, so
    /// this only rejects configurations that raise the limit past that
    /// default.
    fn framed_write(&mut self, header: u8, payload: &[u8]) -> Result<(), Fatal> {
        const BODY_CAP: usize = 1500 + 1;
        let body_len = payload.len() + 1;
        if body_len > BODY_CAP {
            return Err(Fatal::PacketTooLarge);
        }
        let mut body = [0u8; BODY_CAP];
        body[0] = header;
        body[1..body_len].copy_from_slice(payload);
        let mut frame = [0u8; max_frame_len_const(BODY_CAP)];
        let n = encode_frame(&body[..body_len], &mut frame).map_err(|_| Fatal::PacketTooLarge)?;
        self.ring.write(&frame[..n]);
        Ok(())
    }

    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Free space in the TX ring, for producers that need to query
    /// backpressure instead of risking data loss.
    pub fn tx_avail(&self) -> usize {
        self.ring.write_avail()
    }

    pub fn ring(&mut self) -> &mut RingBuffer<TX_N> {
        &mut self.ring
    }
}

impl<const TX_N: usize, L: Link, C: LogConfig> Default for LogTransport<TX_N, L, C> {
    fn default() -> Self {
        Self::new()
    }
}

const fn max_frame_len_const(payload_len: usize) -> usize {
    payload_len + (payload_len / 254) + 1 + 2
}
