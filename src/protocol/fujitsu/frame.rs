use bitfield::bitfield;
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::types::{FanSpeed, Mode};

pub const FRAME_LEN: usize = 8;

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, IntoPrimitive)]
pub enum Address {
    #[num_enum(default)]
    Start = 0,
    Unit = 1,
    Primary = 32,
    Secondary = 33,
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, IntoPrimitive)]
pub enum MessageType {
    Status = 0,
    Error = 1,
    Login = 2,
    #[num_enum(default)]
    Unknown = 3,
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, IntoPrimitive)]
pub enum FujiMode {
    Fan = 1,
    Dry = 2,
    Cool = 3,
    Heat = 4,
    #[num_enum(default)]
    Auto = 5,
}

impl From<Mode> for FujiMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Fan => FujiMode::Fan,
            Mode::Dry => FujiMode::Dry,
            Mode::Cold => FujiMode::Cool,
            Mode::Heat => FujiMode::Heat,
            Mode::Auto | Mode::None => FujiMode::Auto,
        }
    }
}

impl From<FujiMode> for Mode {
    fn from(mode: FujiMode) -> Self {
        match mode {
            FujiMode::Fan => Mode::Fan,
            FujiMode::Dry => Mode::Dry,
            FujiMode::Cool => Mode::Cold,
            FujiMode::Heat => Mode::Heat,
            FujiMode::Auto => Mode::Auto,
        }
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, IntoPrimitive)]
pub enum FujiFan {
    #[num_enum(default)]
    Auto = 0,
    Quiet = 1,
    Low = 2,
    Medium = 3,
    High = 4,
}

impl From<FanSpeed> for FujiFan {
    fn from(fan: FanSpeed) -> Self {
        match fan {
            FanSpeed::Low => FujiFan::Low,
            FanSpeed::Med => FujiFan::Medium,
            FanSpeed::High => FujiFan::High,
            FanSpeed::Auto | FanSpeed::None => FujiFan::Auto,
        }
    }
}

impl From<FujiFan> for FanSpeed {
    fn from(fan: FujiFan) -> Self {
        match fan {
            FujiFan::Auto => FanSpeed::Auto,
            FujiFan::Quiet | FujiFan::Low => FanSpeed::Low,
            FujiFan::Medium => FanSpeed::Med,
            FujiFan::High => FanSpeed::High,
        }
    }
}

// 8 bytes, bit 0 is the LSB of byte 0:
//
// byte 0: source address
// byte 1: dest address (0..6, the login flag doubles as bit 5), unknown (7)
// byte 2: write (3), type (4..5)
// byte 3: enabled (0), mode (1..3), fan (4..6), error (7)
// byte 4: temperature (0..6), economy (7)
// byte 5: swing step (1), swing (2), update magic (4..7)
// byte 6: controller present (0), controller temperature (1..6)
// byte 7: unused
bitfield! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Frame([u8]);
    pub u8, source, set_source: 7, 0;
    pub u8, dest, set_dest: 14, 8;
    pub login, set_login: 13;
    pub unknown, set_unknown: 15;
    pub write, set_write: 19;
    pub u8, type_raw, set_type_raw: 21, 20;
    pub enabled, set_enabled: 24;
    pub u8, mode_raw, set_mode_raw: 27, 25;
    pub u8, fan_raw, set_fan_raw: 30, 28;
    pub error, set_error: 31;
    pub u8, temperature, set_temperature: 38, 32;
    pub economy, set_economy: 39;
    pub swing_step, set_swing_step: 41;
    pub swing, set_swing: 42;
    pub u8, update_magic, set_update_magic: 47, 44;
    pub controller_present, set_controller_present: 48;
    pub u8, controller_temp, set_controller_temp: 54, 49;
}

/// Bits that carry a field; everything else is sent as zero.
const FIELD_MASK: [u8; FRAME_LEN] = [0xff, 0xff, 0x38, 0xff, 0xff, 0xf6, 0x7f, 0x00];

pub type RawFrame = Frame<[u8; FRAME_LEN]>;

impl Frame<[u8; FRAME_LEN]> {
    /// The state assumed before the unit has reported anything.
    pub fn idle() -> Self {
        let mut frame = Frame([0u8; FRAME_LEN]);
        frame.set_temperature(16);
        frame.set_controller_temp(16);
        frame
    }

    /// Decodes the line-inverted bytes received from the bus.
    pub fn from_wire(wire: [u8; FRAME_LEN]) -> Self {
        Frame(wire.map(|b| b ^ 0xff))
    }

    pub fn to_wire(&self) -> [u8; FRAME_LEN] {
        self.0.map(|b| b ^ 0xff)
    }

    /// A copy holding only the known fields, as a reply starts out.
    pub fn fields_only(&self) -> Self {
        let mut bytes = self.0;
        for (byte, mask) in bytes.iter_mut().zip(FIELD_MASK) {
            *byte &= mask;
        }
        Frame(bytes)
    }

    pub fn message_type(&self) -> MessageType {
        MessageType::from(self.type_raw())
    }

    pub fn set_message_type(&mut self, message_type: MessageType) {
        self.set_type_raw(message_type.into());
    }

    /// Sets the destination, then the login flag on top of it.
    pub fn address(&mut self, dest: Address, login: bool) {
        self.set_dest(dest.into());
        self.set_login(login);
    }

    pub fn mode(&self) -> Mode {
        FujiMode::from(self.mode_raw()).into()
    }

    pub fn fan(&self) -> FanSpeed {
        FujiFan::from(self.fan_raw()).into()
    }
}
