// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Embedded-device-to-host binary log transport.
//!
//! This crate is a thin facade over four smaller crates, each independently
//! usable:
//!
//! - [`uclog_ring`]: a fixed-capacity SPSC byte ring buffer.
//! - [`uclog_frame`]: COBS framing (stream delimiting).
//! - [`uclog_item`]: a self-describing binary item codec shaped after CBOR.
//! - [`uclog_core`]: port multiplexing, record construction, RX dispatch,
//!   and crash-persisted recovery built on the three above.
//!
//! An integrator picks buffer sizes via const generics, implements
//! [`Link`]/[`Clock`]/[`WaitHandle`] for their RTOS/HAL, and drives a
//! [`LogEmitter`] from firmware threads and a [`LogServer`] from one worker.

#![cfg_attr(not(feature = "std"), no_std)]

pub use uclog_core::{
    build_device_info, ports, recover_or_reinitialize, Clock, CrashPersistence, DefaultLogConfig,
    Fatal, Handler, IdleTransition, Link, LogConfig, LogEmitter, LogServer, LogTransport,
    PersistedRegion, SavedLog, ServerError, Slot, WaitHandle, RECORD_BUILD_CAPACITY,
};
pub use uclog_frame::{FrameError, SENTINEL};
pub use uclog_item::{
    byte_chunks, get_any, idx_any, pack, text_chunks, unpack, Item, ItemError, Key, Length,
    PackArg, Stream, UnpackArg, Writer, CBOR_MAX_RECURSION,
};
pub use uclog_ring::RingBuffer;
