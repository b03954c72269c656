// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::fmt;

/// Errors raised while assembling or dispatching frames on the RX side, or
/// while waiting for one via `rx`.
///
/// These are all recoverable: a frame error resynchronises on the next
/// sentinel and the server keeps running; a `rx` timeout just means the
/// caller can retry. A second thread calling `rx` concurrently is the one
/// RX-side condition that isn't recoverable — see [`Fatal::ConcurrentBlockingRx`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ServerError {
    /// Malformed COBS stuffing in the frame just received.
    CobsError,
    /// The assembly buffer filled before a sentinel arrived.
    FrameOverrun,
    /// The frame's type field was not `0b11`.
    WrongType,
    /// The frame's port exceeded the handler table size.
    InvalidPort,
    /// No handler is registered for an otherwise valid port.
    NoHandler,
    /// `rx`'s deadline elapsed with no matching frame.
    Timeout,
    /// A decoded payload exceeded `LogConfig::MAX_PACKET_SIZE`.
    PacketTooLarge,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ServerError::CobsError => "malformed frame stuffing",
            ServerError::FrameOverrun => "assembly buffer filled before a sentinel arrived",
            ServerError::WrongType => "frame type was not data-bearing",
            ServerError::InvalidPort => "port exceeds the handler table size",
            ServerError::NoHandler => "no handler registered for port",
            ServerError::Timeout => "rx() deadline elapsed",
            ServerError::PacketTooLarge => "payload exceeds the configured packet size limit",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ServerError {}

/// A terminal condition: flush and hand control back to the integrator's
/// reset hook. Never returned in the ordinary sense — a value of this type
/// means the caller should treat the emitter/server as no longer usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Fatal {
    /// A payload exceeded `LogConfig::MAX_PACKET_SIZE` on the TX side.
    PacketTooLarge,
    /// `rx()` was called from a second thread while one was already
    /// waiting.
    ConcurrentBlockingRx,
    /// The device-info beacon could not be built (e.g. the app hash or
    /// board identifier didn't fit its field).
    InvalidBeacon,
    /// A port-0 record's flush-wait deadline elapsed with the TX ring still
    /// too full to hold it.
    FlushTimeout,
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Fatal::PacketTooLarge => "payload exceeds LOG_MAX_PACKET_SIZE",
            Fatal::ConcurrentBlockingRx => "concurrent blocking rx() calls",
            Fatal::InvalidBeacon => "device-info beacon could not be constructed",
            Fatal::FlushTimeout => "timed out waiting for the TX ring to drain",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Fatal {}
