#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]
//! # embedded-onewire
//! A no-std implementation of the 1-Wire protocol.
//!
//! This crate provides a trait-based interface for 1-Wire communication, allowing you to implement the protocol on various platforms.
//! [OneWire] trait defines the basic operations required for 1-Wire communication, such as resetting the bus, writing and reading bytes, and writing and reading bits.
//!
//! On top of the trait the crate provides:
//! - the ROM search algorithm for discovering devices on the 1-Wire bus, implemented in [OneWireSearch],
//! - the 1-Wire CRC-8, as a lookup table and bit-serial computation ([crc8_table], [crc8_compute]),
//! - [session] helpers that address one device, issue a command and read back a CRC-protected frame.

pub mod consts;
mod crc;
mod error;
mod search;
pub mod session;
mod traits;
#[cfg(test)]
pub(crate) mod testbus;

pub use crc::{OneWireCrc, crc8, crc8_compute, crc8_table, rom_is_valid};
pub use error::OneWireError;
pub use search::{OneWireSearch, OneWireSearchKind};
pub use traits::{OneWire, OneWireStatus};

/// Error type for 1-Wire operations.
pub type OneWireResult<T, E> = Result<T, OneWireError<E>>;
