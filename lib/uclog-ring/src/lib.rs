// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A fixed-capacity, index-only SPSC byte ring buffer.
//!
//! This is the single byte-queue type shared by the TX staging buffer, the RX
//! staging buffer, and the crash-persisted "saved log" region. It never
//! blocks and never returns an error: the producer decides what to do when
//! [`RingBuffer::write_avail`] says there isn't enough room, and the consumer
//! decides how much of [`RingBuffer::read_avail`] to drain.
//!
//! The buffer is always kept one byte short of full, so that `r == w` is an
//! unambiguous "empty" and the buffer never has to distinguish full from
//! empty by any other means (a generation counter, a separate `len` field,
//! ...). Both indices live in `[0, N)` at all times; there are no pointers in
//! this type, only offsets, which is what lets it be placed in
//! uninitialised-at-boot memory and recovered after a reset (see
//! `uclog_core::persist`).

#![cfg_attr(not(feature = "std"), no_std)]

/// A ring buffer over `N` bytes of inline storage.
///
/// `N` bytes are reserved, but only `N - 1` are ever usable at once; see the
/// module documentation for why.
#[repr(C)]
pub struct RingBuffer<const N: usize> {
    /// Next byte to be read, in `[0, N)`.
    r: usize,
    /// Next byte to be written, in `[0, N)`.
    w: usize,
    storage: [u8; N],
}

impl<const N: usize> RingBuffer<N> {
    /// Creates an empty ring buffer.
    ///
    /// `N` must be at least 2 for the buffer to hold any data; a `RingBuffer<1>`
    /// or `RingBuffer<0>` is well-formed but can never report nonzero
    /// `write_avail`.
    pub const fn new() -> Self {
        Self {
            r: 0,
            w: 0,
            storage: [0; N],
        }
    }

    /// Resets both indices to zero without touching `storage`.
    ///
    /// This discards all buffered data; it does not zero it, matching the
    /// "indices are the only state that matters" design used for crash
    /// persistence.
    pub fn reset(&mut self) {
        self.r = 0;
        self.w = 0;
    }

    /// Number of bytes currently available to [`RingBuffer::read`].
    pub const fn read_avail(&self) -> usize {
        (self.w + N - self.r) % N
    }

    /// Number of bytes currently available to [`RingBuffer::write`] without
    /// overwriting unread data.
    ///
    /// [`RingBuffer::write`] does not check this; callers that care about
    /// data loss must check it themselves.
    pub const fn write_avail(&self) -> usize {
        (self.r + N - self.w - 1) % N
    }

    /// Raw read index, for persistence validation.
    pub const fn read_index(&self) -> usize {
        self.r
    }

    /// Raw write index, for persistence validation.
    pub const fn write_index(&self) -> usize {
        self.w
    }

    /// The full backing storage, physical order, for persistence snapshots.
    /// Indices from [`RingBuffer::read_index`]/[`RingBuffer::write_index`]
    /// are needed alongside this to make sense of which bytes are live.
    pub const fn backing(&self) -> &[u8; N] {
        &self.storage
    }

    /// Copies `out.len()` bytes out of the buffer, advancing `r`.
    ///
    /// # Panics
    ///
    /// Panics (via slice indexing) if `out.len() > self.read_avail()`; the
    /// caller is responsible for checking this first.
    pub fn read(&mut self, out: &mut [u8]) {
        let n = out.len();
        debug_assert!(n <= self.read_avail());
        let first = core::cmp::min(n, N - self.r);
        out[..first].copy_from_slice(&self.storage[self.r..self.r + first]);
        if first < n {
            out[first..].copy_from_slice(&self.storage[..n - first]);
        }
        self.r = (self.r + n) % N;
    }

    /// A contiguous view of unread bytes starting at `r`, never wrapping.
    ///
    /// The returned slice may be shorter than [`RingBuffer::read_avail`] if
    /// the unread region wraps past the end of `storage`; call
    /// [`RingBuffer::skip`] and [`RingBuffer::peek`] again to see the rest.
    pub fn peek(&self) -> &[u8] {
        let avail = core::cmp::min(self.read_avail(), N - self.r);
        &self.storage[self.r..self.r + avail]
    }

    /// Advances `r` by `n` bytes, as if those bytes had been read via
    /// [`RingBuffer::read`] into a buffer the caller discarded (or consumed
    /// directly from [`RingBuffer::peek`]).
    ///
    /// # Panics
    ///
    /// Debug builds assert `n <= self.read_avail()`.
    pub fn skip(&mut self, n: usize) {
        debug_assert!(n <= self.read_avail());
        self.r = (self.r + n) % N;
    }

    /// A contiguous mutable view of free bytes starting at `w`, never
    /// wrapping and never including the one reserved slot.
    ///
    /// Intended for zero-copy writes (e.g. a DMA engine writing directly into
    /// the ring); follow with [`RingBuffer::commit`].
    pub fn space(&mut self) -> &mut [u8] {
        let avail = core::cmp::min(self.write_avail(), N - self.w);
        &mut self.storage[self.w..self.w + avail]
    }

    /// Advances `w` by `n` bytes after a direct write into
    /// [`RingBuffer::space`].
    ///
    /// # Panics
    ///
    /// Debug builds assert `n` does not exceed the slice last returned by
    /// [`RingBuffer::space`].
    pub fn commit(&mut self, n: usize) {
        debug_assert!(n <= core::cmp::min(self.write_avail(), N - self.w));
        self.w = (self.w + n) % N;
    }

    /// Copies `src` into the buffer, advancing `w`.
    ///
    /// This function does **not** check [`RingBuffer::write_avail`] first: if
    /// `src.len()` exceeds the available space, unread data is silently
    /// overwritten on wrap. Overflow policy (drop, wait, flush) is the
    /// caller's responsibility; see [`RingBuffer::write_avail`].
    ///
    /// # Panics
    ///
    /// Panics if `src.len() >= N` (there is nowhere to put that many bytes
    /// even ignoring the read side).
    pub fn write(&mut self, src: &[u8]) {
        let n = src.len();
        assert!(n < N, "write of {n} bytes exceeds ring capacity {N}");
        let first = core::cmp::min(n, N - self.w);
        self.storage[self.w..self.w + first].copy_from_slice(&src[..first]);
        if first < n {
            self.storage[..n - first].copy_from_slice(&src[first..]);
        }
        self.w = (self.w + n) % N;
    }

    /// True when `read_avail() == 0`.
    pub const fn is_empty(&self) -> bool {
        self.r == self.w
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
