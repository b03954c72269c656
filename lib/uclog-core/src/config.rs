// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Firmware-image constants, following the teacher's const-generic
/// configuration pattern (`Usart<const TX_BUF_LEN: usize, ...>`): these are
/// baked in at build time, not negotiated at runtime.
///
/// Ring and assembly-buffer *sizes* are plain const generics on
/// [`crate::LogTransport`] and [`crate::LogServer`] themselves, matching how
/// `Usart` takes its buffer lengths directly rather than through a trait;
/// `LogConfig` carries the remaining scalar knobs that don't determine a
/// type's layout.
pub trait LogConfig {
    /// Maximum port-payload size before a `fatal` condition is raised.
    const MAX_PACKET_SIZE: usize = 1500;
    /// Port-handler table size a server of this configuration expects to
    /// serve; informational unless the server's own `PORTS` const generic
    /// happens to differ, in which case the server's is authoritative.
    const MAX_IN_PORTS: usize = 8;
    /// Length of the application content hash carried in the app-hash
    /// beacon and validated by [`crate::persist`].
    const APP_HASH_SIZE: usize = 64;
    /// Idle window before the server worker feeds the watchdog and
    /// considers itself paused.
    const IDLE_TIMEOUT_MS: u32 = 1000;
    /// Decoder recursion bound, re-exported from `uclog-item` for callers
    /// that only depend on this crate.
    const CBOR_MAX_RECURSION: u8 = uclog_item::CBOR_MAX_RECURSION;
}

/// The table's defaults, for integrators that don't need to override
/// anything.
pub struct DefaultLogConfig;

impl LogConfig for DefaultLogConfig {}
