//! The vendor-neutral front of the crate.
//!
//! Every adapter implements [`Climate`]. Hosts that pick the vendor at runtime
//! build an [`AnyClimate`] from an [`AdapterConfig`]:
//!
//! ```
//! use aircon_uart::climate::{AdapterConfig, AnyClimate, Vendor};
//!
//! let config = AdapterConfig { vendor: "toshiba".parse().unwrap(), secondary: false };
//! assert_eq!(config.vendor, Vendor::Toshiba);
//! # struct Idle;
//! # impl aircon_uart::interface::Transport for Idle {
//! #     fn open(&mut self, _: aircon_uart::interface::LineConfig) -> aircon_uart::Result<()> { Ok(()) }
//! #     fn close(&mut self) -> aircon_uart::Result<()> { Ok(()) }
//! #     fn available(&mut self) -> usize { 0 }
//! #     fn read(&mut self, _: &mut [u8]) -> aircon_uart::Result<usize> { Ok(0) }
//! #     fn write(&mut self, _: &[u8]) -> aircon_uart::Result<()> { Ok(()) }
//! # }
//! # struct Zero;
//! # impl aircon_uart::clock::Clock for Zero { fn now_ms(&self) -> u32 { 0 } }
//! let ac: AnyClimate<Idle, Zero> = config.build(Idle, Zero);
//! assert_eq!(ac.vendor(), Vendor::Toshiba);
//! ```

use core::fmt;
use core::str::FromStr;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::interface::{LineConfig, Transport};
use crate::protocol::daikin::DaikinS21;
use crate::protocol::fujitsu::Fujitsu;
use crate::protocol::hitachi::HitachiHLink;
use crate::protocol::lg::LgAircon;
use crate::protocol::mitsubishi::Mitsubishi;
use crate::protocol::sharp::Sharp;
use crate::protocol::toshiba::Toshiba;
use crate::types::ClimateSettings;

/// A heat pump reachable over a serial link.
///
/// Operations block until the exchange completes or times out. `init` must be
/// called once before anything else; adapters with a connection handshake
/// redo it transparently when a later call finds the link down.
pub trait Climate {
    /// Opens the line with the vendor's settings and performs any handshake.
    fn init(&mut self) -> Result<()>;

    /// Applies `settings`. The temperature is clamped to what the vendor
    /// can encode.
    fn set_state(&mut self, settings: &ClimateSettings) -> Result<()>;

    fn get_state(&mut self) -> Result<ClimateSettings>;

    /// Current room temperature in degrees Celsius.
    fn room_temperature(&mut self) -> Result<f32>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Vendor {
    Daikin,
    Mitsubishi,
    Fujitsu,
    Hitachi,
    Lg,
    Sharp,
    Toshiba,
}

impl Vendor {
    pub const ALL: [Vendor; 7] = [
        Vendor::Daikin,
        Vendor::Mitsubishi,
        Vendor::Fujitsu,
        Vendor::Hitachi,
        Vendor::Lg,
        Vendor::Sharp,
        Vendor::Toshiba,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Vendor::Daikin => "daikin",
            Vendor::Mitsubishi => "mitsubishi",
            Vendor::Fujitsu => "fujitsu",
            Vendor::Hitachi => "hitachi",
            Vendor::Lg => "lg",
            Vendor::Sharp => "sharp",
            Vendor::Toshiba => "toshiba",
        }
    }

    /// The fixed line setting the vendor's units speak.
    pub fn line_config(&self) -> LineConfig {
        type D = ();
        match self {
            Vendor::Daikin => DaikinS21::<D, D>::LINE_CONFIG,
            Vendor::Mitsubishi => Mitsubishi::<D, D>::LINE_CONFIG,
            Vendor::Fujitsu => Fujitsu::<D, D>::LINE_CONFIG,
            Vendor::Hitachi => HitachiHLink::<D, D>::LINE_CONFIG,
            Vendor::Lg => LgAircon::<D, D>::LINE_CONFIG,
            Vendor::Sharp => Sharp::<D, D>::LINE_CONFIG,
            Vendor::Toshiba => Toshiba::<D, D>::LINE_CONFIG,
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Vendor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Vendor::ALL
            .into_iter()
            .find(|v| v.name().eq_ignore_ascii_case(s))
            .ok_or(Error::InvalidParameters)
    }
}

/// Selects and configures an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdapterConfig {
    pub vendor: Vendor,
    /// Fujitsu only: act as the secondary wired controller.
    #[cfg_attr(feature = "serde", serde(default))]
    pub secondary: bool,
}

impl AdapterConfig {
    pub fn new(vendor: Vendor) -> Self {
        AdapterConfig { vendor, secondary: false }
    }

    pub fn build<T: Transport, C: Clock>(&self, transport: T, clock: C) -> AnyClimate<T, C> {
        log::debug!("building {} adapter", self.vendor);
        match self.vendor {
            Vendor::Daikin => AnyClimate::Daikin(DaikinS21::new(transport, clock)),
            Vendor::Mitsubishi => AnyClimate::Mitsubishi(Mitsubishi::new(transport, clock)),
            Vendor::Fujitsu => AnyClimate::Fujitsu(Fujitsu::new(transport, clock, self.secondary)),
            Vendor::Hitachi => AnyClimate::Hitachi(HitachiHLink::new(transport, clock)),
            Vendor::Lg => AnyClimate::Lg(LgAircon::new(transport, clock)),
            Vendor::Sharp => AnyClimate::Sharp(Sharp::new(transport, clock)),
            Vendor::Toshiba => AnyClimate::Toshiba(Toshiba::new(transport, clock)),
        }
    }
}

/// One adapter of any vendor.
pub enum AnyClimate<T, C> {
    Daikin(DaikinS21<T, C>),
    Mitsubishi(Mitsubishi<T, C>),
    Fujitsu(Fujitsu<T, C>),
    Hitachi(HitachiHLink<T, C>),
    Lg(LgAircon<T, C>),
    Sharp(Sharp<T, C>),
    Toshiba(Toshiba<T, C>),
}

macro_rules! dispatch {
    ($self:expr, $ac:ident => $call:expr) => {
        match $self {
            AnyClimate::Daikin($ac) => $call,
            AnyClimate::Mitsubishi($ac) => $call,
            AnyClimate::Fujitsu($ac) => $call,
            AnyClimate::Hitachi($ac) => $call,
            AnyClimate::Lg($ac) => $call,
            AnyClimate::Sharp($ac) => $call,
            AnyClimate::Toshiba($ac) => $call,
        }
    };
}

impl<T: Transport, C: Clock> AnyClimate<T, C> {
    pub fn vendor(&self) -> Vendor {
        match self {
            AnyClimate::Daikin(_) => Vendor::Daikin,
            AnyClimate::Mitsubishi(_) => Vendor::Mitsubishi,
            AnyClimate::Fujitsu(_) => Vendor::Fujitsu,
            AnyClimate::Hitachi(_) => Vendor::Hitachi,
            AnyClimate::Lg(_) => Vendor::Lg,
            AnyClimate::Sharp(_) => Vendor::Sharp,
            AnyClimate::Toshiba(_) => Vendor::Toshiba,
        }
    }

    pub fn transport(&self) -> &T {
        dispatch!(self, ac => ac.link().transport())
    }
}

impl<T: Transport, C: Clock> Climate for AnyClimate<T, C> {
    fn init(&mut self) -> Result<()> {
        dispatch!(self, ac => ac.init())
    }

    fn set_state(&mut self, settings: &ClimateSettings) -> Result<()> {
        dispatch!(self, ac => ac.set_state(settings))
    }

    fn get_state(&mut self) -> Result<ClimateSettings> {
        dispatch!(self, ac => ac.get_state())
    }

    fn room_temperature(&mut self) -> Result<f32> {
        dispatch!(self, ac => ac.room_temperature())
    }
}
