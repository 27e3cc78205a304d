//! Toshiba units.
//!
//! Packets are `STX h0 h1 type u1 u2 len data checksum`. Commands carry a
//! function code and an optional value; the unit replies with a packet of
//! type 0x90 whose data echoes the function code at offset 7.

use heapless::Vec;

use crate::climate::Climate;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::interface::{LineConfig, Parity, Transport};
use crate::link::Link;
use crate::protocol::checksum;
use crate::types::{Action, ClimateSettings, FanSpeed, Mode, VaneMode};

const READ_TIMEOUT_MS: u32 = 250;
const STX: u8 = 0x02;
const HEADER_LEN: usize = 7;
const MAX_DATA_LEN: usize = u8::MAX as usize;
const MAX_COMMAND_LEN: usize = 64;
// Packets inspected while looking for a reply, and drained after a handshake step.
const REPLY_SCAN_BUDGET: usize = 16;

const PACKET_TYPE_COMMAND: u8 = 0x10;
const PACKET_TYPE_REPLY: u8 = PACKET_TYPE_COMMAND | 0x80;

/// Function codes understood by the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Function {
    PowerState = 0x80,
    Status = 0x88,
    FanMode = 0xa0,
    Swing = 0xa3,
    UnitMode = 0xb0,
    Setpoint = 0xb3,
    RoomTemp = 0xbb,
    Group = 0xf8,
}

const POWER_ON: u8 = 0x30;
const POWER_OFF: u8 = 0x31;

const MODE_AUTO: u8 = 0x41;
const MODE_COOL: u8 = 0x42;
const MODE_HEAT: u8 = 0x43;
const MODE_DRY: u8 = 0x44;
const MODE_FAN: u8 = 0x45;

const FAN_QUIET: u8 = 0x31;
const FAN_LVL1: u8 = 0x32;
const FAN_LVL2: u8 = 0x33;
const FAN_LVL3: u8 = 0x34;
const FAN_LVL4: u8 = 0x35;
const FAN_LVL5: u8 = 0x36;
const FAN_AUTO: u8 = 0x41;

const SWING_FIX: u8 = 0x31;
const SWING_VERTICAL: u8 = 0x41;
const SWING_HORIZONTAL: u8 = 0x42;
const SWING_BOTH: u8 = 0x43;
const SWING_POS1: u8 = 0x50;

pub const TEMPERATURE_RANGE: core::ops::RangeInclusive<i32> = 17..=30;

pub const HANDSHAKE: [&[u8]; 8] = [
    &[0x02, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0x02],
    &[0x02, 0xff, 0xff, 0x01, 0x00, 0x00, 0x01, 0x02, 0xfe],
    &[0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x02, 0x02, 0xfa],
    &[0x02, 0x00, 0x01, 0x81, 0x01, 0x00, 0x02, 0x00, 0x00, 0x7b],
    &[0x02, 0x00, 0x01, 0x02, 0x00, 0x00, 0x02, 0x00, 0x00, 0xfb],
    &[0x02, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0xfe],
    &[0x02, 0x00, 0x02, 0x01, 0x00, 0x00, 0x02, 0x00, 0x00, 0xfb],
    &[0x02, 0x00, 0x02, 0x02, 0x00, 0x00, 0x02, 0x00, 0x00, 0xfa],
];

fn mode_code(mode: Mode) -> u8 {
    match mode {
        Mode::Cold => MODE_COOL,
        Mode::Heat => MODE_HEAT,
        Mode::Dry => MODE_DRY,
        Mode::Fan => MODE_FAN,
        Mode::Auto | Mode::None => MODE_AUTO,
    }
}

fn mode_from_code(code: u8) -> Mode {
    match code {
        MODE_COOL => Mode::Cold,
        MODE_HEAT => Mode::Heat,
        MODE_DRY => Mode::Dry,
        MODE_FAN => Mode::Fan,
        _ => Mode::Auto,
    }
}

fn fan_code(fan: FanSpeed) -> u8 {
    match fan {
        FanSpeed::Low => FAN_LVL1,
        FanSpeed::Med => FAN_LVL3,
        FanSpeed::High => FAN_LVL5,
        FanSpeed::Auto | FanSpeed::None => FAN_AUTO,
    }
}

fn fan_from_code(code: u8) -> FanSpeed {
    match code {
        FAN_QUIET | FAN_LVL1 => FanSpeed::Low,
        FAN_LVL2 | FAN_LVL3 => FanSpeed::Med,
        FAN_LVL4 | FAN_LVL5 => FanSpeed::High,
        _ => FanSpeed::Auto,
    }
}

fn vane_code(vane: VaneMode) -> u8 {
    match vane {
        VaneMode::Auto => SWING_FIX,
        VaneMode::Swing => SWING_VERTICAL,
        VaneMode::V1 => SWING_POS1,
        VaneMode::V2 => SWING_POS1 + 1,
        VaneMode::V3 => SWING_POS1 + 2,
        VaneMode::V4 => SWING_POS1 + 3,
        VaneMode::V5 => SWING_POS1 + 4,
    }
}

fn vane_from_code(code: u8) -> VaneMode {
    match code {
        SWING_VERTICAL | SWING_HORIZONTAL | SWING_BOTH => VaneMode::Swing,
        0x50 => VaneMode::V1,
        0x51 => VaneMode::V2,
        0x52 => VaneMode::V3,
        0x53 => VaneMode::V4,
        0x54 => VaneMode::V5,
        _ => VaneMode::Auto,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: [u8; 2],
    pub kind: u8,
    pub data: Vec<u8, MAX_DATA_LEN>,
}

impl Packet {
    fn is_reply(&self) -> bool {
        self.kind == PACKET_TYPE_REPLY
    }

    /// The value of a reply to `function`, if this is one of at least
    /// `min_len` data bytes.
    fn value_for(&self, function: Function, min_len: usize) -> Option<u8> {
        if self.data.len() >= min_len.max(9) && self.data[7] == function as u8 {
            Some(self.data[8])
        } else {
            None
        }
    }
}

/// Builds a command packet around `payload` (function code, then value).
pub fn encode_command(payload: &[u8]) -> Result<Vec<u8, MAX_COMMAND_LEN>> {
    if payload.len() + 13 > MAX_COMMAND_LEN {
        return Err(Error::InvalidParameters);
    }
    let len = payload.len() as u8;
    let mut packet: Vec<u8, MAX_COMMAND_LEN> = Vec::new();
    packet
        .extend_from_slice(&[STX, 0x00, 0x03, PACKET_TYPE_COMMAND, 0x00, 0x00, len + 5, 0x01, 0x30, 0x01, 0x00, len])
        .map_err(|_| Error::InvalidParameters)?;
    packet.extend_from_slice(payload).map_err(|_| Error::InvalidParameters)?;
    let cs = checksum::negated_sum(&packet[1..]);
    packet.push(cs).map_err(|_| Error::InvalidParameters)?;
    Ok(packet)
}

pub struct Toshiba<T, C> {
    link: Link<T, C>,
    connected: bool,
}

impl<T, C> Toshiba<T, C> {
    pub const LINE_CONFIG: LineConfig = LineConfig::new(9600, Parity::Even, 1);
}

impl<T: Transport, C: Clock> Toshiba<T, C> {
    pub fn new(transport: T, clock: C) -> Self {
        Toshiba { link: Link::new(transport, clock, "toshiba"), connected: false }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn link(&self) -> &Link<T, C> {
        &self.link
    }

    /// Reads one packet. Checksum mismatches are only logged.
    fn read_packet(&mut self) -> Result<Packet> {
        self.link.sync(STX, READ_TIMEOUT_MS)?;
        let mut header = [0u8; HEADER_LEN];
        header[0] = STX;
        self.link.read_exact(&mut header[1..], READ_TIMEOUT_MS)?;

        let mut data = [0u8; MAX_DATA_LEN];
        let len = header[HEADER_LEN - 1] as usize;
        self.link.read_exact(&mut data[..len], READ_TIMEOUT_MS)?;
        let received = self.link.read_byte(READ_TIMEOUT_MS)?;

        let calculated =
            checksum::additive(&header[1..]).wrapping_add(checksum::additive(&data[..len])).wrapping_neg();
        if received != calculated {
            log::error!("invalid checksum recv=0x{:02x}, calc=0x{:02x}", received, calculated);
        }

        let packet = Packet {
            header: [header[1], header[2]],
            kind: header[3],
            data: Vec::from_slice(&data[..len]).map_err(|_| Error::InvalidData)?,
        };
        log::debug!("read packet: type=0x{:02x}, data={:02x?}", packet.kind, packet.data);
        Ok(packet)
    }

    fn flush(&mut self) {
        for _ in 0..REPLY_SCAN_BUDGET {
            if self.read_packet().is_err() {
                break;
            }
        }
    }

    fn send(&mut self, payload: &[u8]) -> Result<Packet> {
        let packet = encode_command(payload)?;
        log::debug!("sending command: {:02x?}", packet);
        self.link.write(&packet)?;

        for _ in 0..REPLY_SCAN_BUDGET {
            match self.read_packet() {
                Ok(reply) if reply.is_reply() => return Ok(reply),
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        Err(Error::Timeout)
    }

    fn query(&mut self, function: Function) -> Result<Packet> {
        self.send(&[function as u8])
    }

    fn command(&mut self, function: Function, value: u8) -> Result<()> {
        let reply = self.send(&[function as u8, value])?;
        log::debug!("command response for {:?} (size={})", function, reply.data.len());
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = false;
        log::debug!("starting handshake");

        for (i, packet) in HANDSHAKE.iter().enumerate() {
            log::debug!("sending handshake SYN{}", i + 1);
            self.link.write(packet).map_err(|e| {
                log::error!("handshake SYN{} failed: {}", i + 1, e);
                e
            })?;
            self.flush();
        }

        if self.query(Function::Status).is_err() {
            log::error!("handshake failed, no response to status query");
            return Err(Error::Timeout);
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
}

impl<T: Transport, C: Clock> Climate for Toshiba<T, C> {
    /// Opens the port and attempts the handshake. A failed handshake is
    /// retried by the next operation.
    fn init(&mut self) -> Result<()> {
        self.connected = false;
        self.link.open(Self::LINE_CONFIG)?;
        if let Err(e) = self.connect() {
            log::debug!("initial connection failed: {}", e);
        }
        Ok(())
    }

    fn set_state(&mut self, settings: &ClimateSettings) -> Result<()> {
        self.ensure_connected()?;

        let power = if settings.is_on() { POWER_ON } else { POWER_OFF };
        self.command(Function::PowerState, power)?;

        if settings.is_on() {
            let target = settings.clamped_temperature(TEMPERATURE_RANGE) as u8;
            self.command(Function::Setpoint, target)?;
            self.command(Function::UnitMode, mode_code(settings.mode))?;
            self.command(Function::FanMode, fan_code(settings.fan_speed))?;
            self.command(Function::Swing, vane_code(settings.vane_mode))?;
        }

        self.flush();
        Ok(())
    }

    fn get_state(&mut self) -> Result<ClimateSettings> {
        self.ensure_connected()?;

        let group = match self.query(Function::Group) {
            Ok(reply) if reply.value_for(Function::Group, 12).is_some() => reply,
            _ => {
                log::error!("failed to get group state, marking as disconnected");
                self.connected = false;
                return Err(Error::Timeout);
            }
        };
        let mode = mode_from_code(group.data[8]);
        let temperature = group.data[9] as i32;
        let fan_speed = fan_from_code(group.data[10]);

        let power = self
            .query(Function::PowerState)
            .ok()
            .and_then(|reply| reply.value_for(Function::PowerState, 9))
            .ok_or_else(|| {
                log::error!("failed to get power state");
                Error::InvalidData
            })?;
        let action = if power == POWER_ON { Action::On } else { Action::Off };

        let swing = self
            .query(Function::Swing)
            .ok()
            .and_then(|reply| reply.value_for(Function::Swing, 9))
            .ok_or_else(|| {
                log::error!("failed to get swing state");
                Error::InvalidData
            })?;

        self.flush();

        let settings =
            ClimateSettings { action, temperature, fan_speed, mode, vane_mode: vane_from_code(swing) };
        log::debug!("state: {:?}", settings);
        Ok(settings)
    }

    fn room_temperature(&mut self) -> Result<f32> {
        self.ensure_connected()?;

        let value = self
            .query(Function::RoomTemp)
            .ok()
            .and_then(|reply| reply.value_for(Function::RoomTemp, 9))
            .ok_or(Error::InvalidData)?;
        let temperature = value as i8 as f32;
        log::debug!("room temperature: {:.1}", temperature);
        Ok(temperature)
    }
}
