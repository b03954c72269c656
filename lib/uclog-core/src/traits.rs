// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The RTOS/HAL seam. The core never calls into a specific RTOS; an
//! integrator implements these three traits for their hardware, mirroring
//! how the teacher's `usart` crate separates the hardware `Device` from the
//! buffer/queue logic the owning task drives, and how its host-sp-comms task
//! separates protocol state (`TxBuf`) from the notification-driven `main`
//! loop.

/// The link layer: whatever owns the actual UART/USB-CDC bytes.
pub trait Link {
    /// Wakes (or is a no-op on) the link's TX path so it notices newly
    /// appended TX-ring bytes. Must be idempotent: if the link is already
    /// transmitting, this returns immediately and the new bytes are picked
    /// up as the current DMA chunk drains.
    fn tx_schedule(&self);

    /// Feeds the hardware watchdog. Called by the server worker on every
    /// idle-timeout wake; most integrators with no watchdog leave this as
    /// the default no-op.
    fn feed_watchdog(&self) {}
}

/// A millisecond clock, used only for the server worker's idle timeout and
/// blocking-rx deadlines.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// A one-shot wait/wake primitive, used for the blocking-rx slot.
///
/// `wait` returns `true` if woken by [`WaitHandle::signal`], `false` if
/// `timeout_ms` elapsed first. Implementations may spuriously return `true`
/// without a matching `signal`; callers re-check their condition either way,
/// matching the usual condvar contract.
pub trait WaitHandle {
    fn wait(&self, timeout_ms: u32) -> bool;
    fn signal(&self);
}
