#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! aircon_uart
//!
//! Serial protocol drivers for the service ports of heat pumps (aka air
//! conditioners) from Daikin, Mitsubishi, Fujitsu, Hitachi, LG, Sharp and
//! Toshiba. Every vendor is driven through the same [`Climate`] trait and the
//! same vendor-neutral [`ClimateSettings`].
//!
//! It is intended for use on embedded hardware, and as such is `no_std`. The
//! `std` feature adds a [`clock::SystemClock`]; the `serde` feature derives
//! `Serialize`/`Deserialize` for the settings and adapter configuration.
//!
//! The crate does not own a serial peripheral. Adapters talk through a
//! [`Transport`]: either your own, or [`interface::HalSerial`] wrapping any
//! `embedded-hal` serial port. Time comes from an injected [`Clock`]. Each
//! adapter exposes the line settings its units need as `LINE_CONFIG` and
//! applies them when [`Climate::init`] opens the transport.
//!
//! Logging goes through the `log` facade: install whichever logger suits the
//! target to see frame traffic and connection changes.
//!
//! ## General Usage
//!
//! ```ignore
//! use aircon_uart::{AdapterConfig, Climate, ClimateSettings, Action, Mode, Vendor};
//!
//! let mut ac = AdapterConfig::new(Vendor::Mitsubishi).build(transport, clock);
//! ac.init()?;
//!
//! let mut settings = ac.get_state()?;
//! settings.action = Action::On;
//! settings.mode = Mode::Heat;
//! settings.temperature = 22;
//! ac.set_state(&settings)?;
//!
//! let room = ac.room_temperature()?;
//! ```
//!
//! The wire formats are usable on their own too. Encode a Mitsubishi connect
//! packet:
//!
//! ```
//! use aircon_uart::protocol::Encodable;
//! use aircon_uart::protocol::mitsubishi::{ConnectRequest, Packet};
//!
//! let mut buf = [0u8; 32];
//! let encoded = Packet(ConnectRequest).encode(&mut buf).unwrap();
//!
//! assert_eq!(
//!     // Frame Header
//!     //
//!     //       ---- DataType::ConnectRequest = 0x5a
//!     //       ||||              ---- datalen = 0x02
//!     //       ||||              ||||
//!     encoded,
//!     &[ 0xfc, 0x5a, 0x01, 0x30, 0x02,
//!
//!     // Frame Data, then the checksum
//!        0xca, 0x01, 0xa8 ]
//! );
//! ```

pub mod climate;
pub mod clock;
pub mod error;
pub mod interface;
pub mod link;
pub mod protocol;
pub mod types;

#[cfg(test)]
mod testing;

pub use climate::{AdapterConfig, AnyClimate, Climate, Vendor};
pub use clock::Clock;
pub use error::{Error, Result};
pub use interface::{LineConfig, Parity, Transport};
pub use types::{Action, ClimateSettings, FanSpeed, Mode, VaneMode};
