//! One module per vendor, plus the wire helpers they share.
//!
//! Each vendor module exposes its adapter type, the fixed `LINE_CONFIG` for
//! its bus and the `TEMPERATURE_RANGE` its units accept.

pub mod checksum;
pub mod encoding;

pub mod daikin;
pub mod fujitsu;
pub mod hitachi;
pub mod lg;
pub mod mitsubishi;
pub mod sharp;
pub mod toshiba;

pub use encoding::Encodable;
