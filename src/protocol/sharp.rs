//! Sharp units.
//!
//! The adapter walks a fixed handshake, then listens to the frames the unit
//! pushes: a 14 byte mode frame and an 18 byte status frame. Every frame
//! received is acknowledged with a single ACK byte.

use heapless::Vec;

use crate::climate::Climate;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::interface::{LineConfig, Parity, Transport};
use crate::link::Link;
use crate::protocol::checksum;
use crate::types::{Action, ClimateSettings, FanSpeed, Mode, VaneMode};

const READ_TIMEOUT_MS: u32 = 500;
// Frames drained after a handshake step or a failed command.
const FLUSH_BUDGET: usize = 16;

pub const COMMAND_FRAME_LEN: usize = 14;
const MODE_FRAME_LEN: usize = 14;
const STATUS_FRAME_LEN: usize = 18;
const MAX_FRAME_LEN: usize = STATUS_FRAME_LEN;
const ACK: u8 = 0x06;

const FRAME_START_TX: u8 = 0xdd;
const FRAME_START_RX: u8 = 0xdc;
const FRAME_TYPE_COMMAND: u8 = 0xfb;
const FRAME_TYPE_RESPONSE: u8 = 0xfc;

const MODE_HEAT: u8 = 0x01;
const MODE_COOL: u8 = 0x02;
const MODE_DRY: u8 = 0x03;
const MODE_FAN: u8 = 0x04;

const FAN_AUTO: u8 = 0x02;
const FAN_MID: u8 = 0x03;
const FAN_LOW: u8 = 0x04;
const FAN_HIGH: u8 = 0x05;
const FAN_HIGHEST: u8 = 0x07;

const VANE_AUTO: u8 = 0x08;
const VANE_SWING: u8 = 0x0f;
// V1 (highest) through V5 (lowest) are consecutive.
const VANE_HIGHEST: u8 = 0x09;
const SWING_H_MIDDLE: u8 = 0x01;

pub const TEMPERATURE_RANGE: core::ops::RangeInclusive<i32> = 16..=30;

const MSG_INIT1: &[u8] = &[0x02, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00];
const MSG_INIT2: &[u8] = &[0x02, 0xff, 0xff, 0x01, 0x01, 0x00, 0x01, 0x00];
const MSG_SUBSCRIBE1: &[u8] = &[0x03, 0xff, 0xa0, 0x01, 0x00, 0x00, 0x00];
const MSG_SUBSCRIBE2: &[u8] = &[0x03, 0xfe, 0xa0, 0x01, 0x00, 0x00, 0x00];
const MSG_GET_STATE: &[u8] = &[0xdd, 0x02, 0xfc, 0x62];
const MSG_GET_STATUS: &[u8] = &[0xdd, 0x02, 0xfd, 0x62];
const MSG_CONNECTED: &[u8] = &[0x03, 0x05, 0xb0, 0x00, 0x10, 0x00, 0x00];

pub const HANDSHAKE: [&[u8]; 7] = [
    MSG_INIT1,
    MSG_INIT2,
    MSG_SUBSCRIBE1,
    MSG_SUBSCRIBE2,
    MSG_GET_STATE,
    MSG_GET_STATUS,
    MSG_CONNECTED,
];

pub type Frame = Vec<u8, MAX_FRAME_LEN>;

fn mode_code(mode: Mode) -> u8 {
    match mode {
        Mode::Heat => MODE_HEAT,
        Mode::Dry => MODE_DRY,
        Mode::Fan => MODE_FAN,
        Mode::Cold | Mode::Auto | Mode::None => MODE_COOL,
    }
}

fn mode_from_code(code: u8) -> Mode {
    match code {
        MODE_HEAT => Mode::Heat,
        MODE_DRY => Mode::Dry,
        MODE_FAN => Mode::Fan,
        _ => Mode::Cold,
    }
}

fn fan_code(fan: FanSpeed) -> u8 {
    match fan {
        FanSpeed::Low => FAN_LOW,
        FanSpeed::Med => FAN_MID,
        FanSpeed::High => FAN_HIGH,
        FanSpeed::Auto | FanSpeed::None => FAN_AUTO,
    }
}

fn fan_from_code(code: u8) -> FanSpeed {
    match code {
        FAN_LOW => FanSpeed::Low,
        FAN_MID => FanSpeed::Med,
        FAN_HIGH | FAN_HIGHEST => FanSpeed::High,
        _ => FanSpeed::Auto,
    }
}

fn vane_code(vane: VaneMode) -> u8 {
    match vane {
        VaneMode::Auto => VANE_AUTO,
        VaneMode::Swing => VANE_SWING,
        VaneMode::V1 => VANE_HIGHEST,
        VaneMode::V2 => VANE_HIGHEST + 1,
        VaneMode::V3 => VANE_HIGHEST + 2,
        VaneMode::V4 => VANE_HIGHEST + 3,
        VaneMode::V5 => VANE_HIGHEST + 4,
    }
}

fn vane_from_code(code: u8) -> VaneMode {
    match code {
        VANE_SWING => VaneMode::Swing,
        0x09 => VaneMode::V1,
        0x0a => VaneMode::V2,
        0x0b => VaneMode::V3,
        0x0c => VaneMode::V4,
        0x0d => VaneMode::V5,
        _ => VaneMode::Auto,
    }
}

/// Builds the 14 byte command frame for `settings`.
pub fn encode_command(settings: &ClimateSettings) -> [u8; COMMAND_FRAME_LEN] {
    let on = settings.is_on();
    let mut frame = [0u8; COMMAND_FRAME_LEN];
    frame[..4].copy_from_slice(&[FRAME_START_TX, 0x0b, FRAME_TYPE_COMMAND, 0x60]);

    frame[4] = match settings.mode {
        Mode::Fan => 0x01,
        Mode::Dry => 0x00,
        _ => 0xc0 | (settings.clamped_temperature(TEMPERATURE_RANGE) - 16) as u8,
    };
    frame[5] = if on { 0x31 } else { 0x21 };

    let mode = mode_code(settings.mode);
    let mut fan = fan_code(settings.fan_speed);
    if mode == MODE_FAN && fan == FAN_AUTO {
        fan = FAN_LOW;
    }
    frame[6] = mode | fan << 4;
    frame[8] = SWING_H_MIDDLE << 4 | vane_code(settings.vane_mode);
    frame[9] = if on { 0x80 } else { 0x00 };
    frame[11] = 0x10;

    frame[12] = checksum::nibble_xor(&frame[4..12]);
    frame[13] = checksum::negated_sum(&frame[1..13]);
    frame
}

/// Decodes a mode frame. Status frames only carry a temperature.
pub fn decode_frame(frame: &[u8]) -> Result<ClimateSettings> {
    if frame.len() == MODE_FRAME_LEN && frame[2] == FRAME_TYPE_RESPONSE {
        let settings = ClimateSettings {
            action: if frame[8] & 0x80 != 0 { Action::On } else { Action::Off },
            temperature: (frame[4] & 0x0f) as i32 + 16,
            fan_speed: fan_from_code(frame[5] >> 4),
            mode: mode_from_code(frame[5] & 0x0f),
            vane_mode: vane_from_code(frame[6] & 0x0f),
        };
        log::debug!("mode frame: {:?}", settings);
        Ok(settings)
    } else if frame.len() == STATUS_FRAME_LEN {
        log::debug!("status frame: temp={}", frame[7]);
        Ok(ClimateSettings { temperature: frame[7] as i32, ..Default::default() })
    } else {
        log::warn!("unexpected frame: {:02x?}", frame);
        Err(Error::InvalidData)
    }
}

pub struct Sharp<T, C> {
    link: Link<T, C>,
    connected: bool,
}

impl<T, C> Sharp<T, C> {
    pub const LINE_CONFIG: LineConfig = LineConfig::new(9600, Parity::Even, 1);
}

impl<T: Transport, C: Clock> Sharp<T, C> {
    pub fn new(transport: T, clock: C) -> Self {
        Sharp { link: Link::new(transport, clock, "sharp"), connected: false }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn link(&self) -> &Link<T, C> {
        &self.link
    }

    fn read_frame(&mut self) -> Result<Frame> {
        self.link.sync(FRAME_START_RX, READ_TIMEOUT_MS)?;
        let len = self.link.read_byte(READ_TIMEOUT_MS)?;

        let size = len as usize + 3;
        if size > MAX_FRAME_LEN {
            log::error!("frame too long: {} bytes", size);
            return Err(Error::InvalidData);
        }

        let mut buf = [0u8; MAX_FRAME_LEN];
        buf[0] = FRAME_START_RX;
        buf[1] = len;
        self.link.read_exact(&mut buf[2..size], READ_TIMEOUT_MS)?;

        let frame = &buf[..size];
        let calculated = checksum::negated_sum(&frame[1..size - 1]);
        if frame[size - 1] != calculated {
            log::error!("invalid checksum: {:02x?}", frame);
            return Err(Error::InvalidCrc);
        }

        log::debug!("read frame: size={}, type=0x{:02x}", size, frame[2]);
        Vec::from_slice(frame).map_err(|_| Error::InvalidData)
    }

    fn ack(&mut self, frame: &Frame) -> Result<()> {
        if frame.len() > 1 {
            self.link.write(&[ACK])
        } else {
            Ok(())
        }
    }

    fn flush(&mut self) {
        for _ in 0..FLUSH_BUDGET {
            if self.read_frame().is_err() {
                break;
            }
        }
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = false;
        log::debug!("starting handshake");

        for (i, packet) in HANDSHAKE.iter().enumerate() {
            log::debug!("sending handshake packet {}", i + 1);
            self.link.write(packet).map_err(|e| {
                log::error!("handshake packet {} failed: {}", i + 1, e);
                e
            })?;
            self.flush();
        }

        log::info!("connected");
        self.connected = true;
        Ok(())
    }

    fn ensure_connected(&mut self) -> Result<()> {
        if self.connected {
            return Ok(());
        }
        self.connect().map_err(|_| Error::NotConnected)
    }

    fn read_acked_frame(&mut self) -> Result<Frame> {
        let frame = self.read_frame()?;
        self.ack(&frame)?;
        Ok(frame)
    }
}

impl<T: Transport, C: Clock> Climate for Sharp<T, C> {
    /// Opens the port and attempts the handshake. A failed handshake is
    /// retried by the next operation.
    fn init(&mut self) -> Result<()> {
        self.link.open(Self::LINE_CONFIG)?;
        if let Err(e) = self.connect() {
            log::debug!("initial connection failed: {}", e);
        }
        Ok(())
    }

    fn set_state(&mut self, settings: &ClimateSettings) -> Result<()> {
        self.ensure_connected()?;

        let command = encode_command(settings);
        log::debug!("sending command: {:02x?}", command);
        self.link.write(&command)?;

        match self.read_acked_frame() {
            Ok(_) => Ok(()),
            Err(e) => {
                self.flush();
                Err(e)
            }
        }
    }

    fn get_state(&mut self) -> Result<ClimateSettings> {
        self.ensure_connected()?;

        let frame = self.read_acked_frame().map_err(|e| {
            log::error!("failed to read state frame");
            e
        })?;
        let settings = decode_frame(&frame)?;
        self.flush();
        Ok(settings)
    }

    fn room_temperature(&mut self) -> Result<f32> {
        self.ensure_connected()?;

        let frame = self.read_acked_frame()?;
        if frame.len() == STATUS_FRAME_LEN {
            let temperature = frame[7] as f32;
            log::debug!("room temperature: {:.1}", temperature);
            Ok(temperature)
        } else {
            Err(Error::InvalidData)
        }
    }
}
