// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Port multiplexing, record construction, RX dispatch, and crash-persisted
//! recovery, built on [`uclog_ring`], [`uclog_frame`], and [`uclog_item`].

#![cfg_attr(not(feature = "std"), no_std)]

mod config;
mod emitter;
mod error;
mod persist;
mod server;
mod traits;
mod transport;

pub use config::{DefaultLogConfig, LogConfig};
pub use emitter::{LogEmitter, Slot, RECORD_BUILD_CAPACITY};
pub use error::{Fatal, ServerError};
pub use persist::{recover_or_reinitialize, CrashPersistence, PersistedRegion, SavedLog};
pub use server::{Handler, IdleTransition, LogServer};
pub use traits::{Clock, Link, WaitHandle};
pub use transport::LogTransport;

/// Port numbers with crate-assigned meaning; application ports are free to
/// use `1..=7` by default and any unreserved value up to 63.
pub mod ports {
    /// Log records built by [`crate::LogEmitter`].
    pub const LOG: u8 = 0;
    /// Device-info handshake (board identifier, application hash).
    pub const DEVICE_INFO: u8 = 62;
    /// Application-hash beacon sent on TX resume.
    pub const APP_HASH_BEACON: u8 = 63;
}

/// Builds the port-62 device-info beacon payload: a self-describing map with
/// `app_hash` (byte string) and `board` (text string) keys, per the wire
/// format's handshake contract.
pub fn build_device_info<'a>(
    buf: &'a mut [u8],
    app_hash: &[u8],
    board: &str,
) -> Result<&'a [u8], Fatal> {
    let n = {
        let mut w = uclog_item::Writer::new(&mut *buf);
        w.write_map(2u64).map_err(|_| Fatal::InvalidBeacon)?;
        w.write_text("app_hash").map_err(|_| Fatal::InvalidBeacon)?;
        w.write_bytes(app_hash).map_err(|_| Fatal::InvalidBeacon)?;
        w.write_text("board").map_err(|_| Fatal::InvalidBeacon)?;
        w.write_text(board).map_err(|_| Fatal::InvalidBeacon)?;
        w.finish()
    };
    Ok(&buf[..n])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_info_beacon_round_trips_through_item_codec() {
        let mut buf = [0u8; 128];
        let hash = [0xABu8; 8];
        let encoded = build_device_info(&mut buf, &hash, "widget-v2").unwrap();

        let mut s = uclog_item::Stream::new(encoded);
        match s.read_any().unwrap() {
            uclog_item::Item::Map(uclog_item::Length::Definite(2)) => {}
            other => panic!("expected a 2-entry map, got {other:?}"),
        }
        let got_hash = uclog_item::get_any(&mut s, 2, "app_hash").unwrap();
        assert_eq!(got_hash.as_bytes().unwrap(), &hash[..]);

        let mut s2 = uclog_item::Stream::new(encoded);
        s2.read_any().unwrap();
        let got_board = uclog_item::get_any(&mut s2, 2, "board").unwrap();
        assert_eq!(got_board.as_text().unwrap(), "widget-v2");
    }
}
