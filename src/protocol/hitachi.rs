//! Hitachi units speaking H-Link.
//!
//! H-Link is line based ASCII. A read is `MT P=<address> C=<checksum>` and a
//! write is `ST P=<address>,<data> C=<checksum>`, each terminated by CR. The
//! unit answers `OK`, `NG`, or `OK P=<data> C=<checksum>` for reads.

use core::fmt::Write;

use heapless::{String, Vec};
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::hex_digit0;
use nom::character::complete::hex_digit1;
use nom::combinator::{all_consuming, opt, value};
use nom::sequence::{preceded, tuple};
use nom::IResult;

use crate::climate::Climate;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::interface::{LineConfig, Parity, Transport};
use crate::link::Link;
use crate::protocol::checksum;
use crate::types::{Action, ClimateSettings, FanSpeed, Mode, VaneMode};

const READ_TIMEOUT_MS: u32 = 300;
const MSG_BUFFER_LEN: usize = 64;
const DATA_MAX_LEN: usize = 8;
const CR: u8 = 0x0d;

pub const TEMPERATURE_RANGE: core::ops::RangeInclusive<i32> = 16..=32;

/// Register addresses of the features this crate uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Feature {
    Power = 0x0000,
    Mode = 0x0001,
    FanMode = 0x0002,
    TargetTemp = 0x0003,
    SwingMode = 0x0014,
    IndoorTemp = 0x0100,
}

const MODE_HEAT: u16 = 0x0010;
const MODE_HEAT_AUTO: u16 = 0x8010;
const MODE_COOL: u16 = 0x0040;
const MODE_COOL_AUTO: u16 = 0x8040;
const MODE_DRY: u16 = 0x0020;
const MODE_DRY_AUTO: u16 = 0x8020;
const MODE_FAN: u16 = 0x0050;
const MODE_AUTO: u16 = 0x8000;

const FAN_AUTO: u8 = 0x00;
const FAN_HIGH: u8 = 0x01;
const FAN_MED: u8 = 0x02;
const FAN_LOW: u8 = 0x03;
const FAN_QUIET: u8 = 0x04;

const SWING_OFF: u8 = 0x00;
const SWING_VERTICAL: u8 = 0x01;
const SWING_HORIZONTAL: u8 = 0x02;
const SWING_BOTH: u8 = 0x03;

const POWER_ON: u8 = 0x01;
const POWER_OFF: u8 = 0x00;

fn mode_word(mode: Mode) -> u16 {
    match mode {
        Mode::Cold => MODE_COOL,
        Mode::Heat => MODE_HEAT,
        Mode::Dry => MODE_DRY,
        Mode::Fan => MODE_FAN,
        Mode::Auto | Mode::None => MODE_AUTO,
    }
}

fn mode_from_word(word: u16) -> Mode {
    match word {
        MODE_COOL => Mode::Cold,
        MODE_HEAT => Mode::Heat,
        MODE_DRY => Mode::Dry,
        MODE_FAN => Mode::Fan,
        MODE_HEAT_AUTO | MODE_COOL_AUTO | MODE_DRY_AUTO | MODE_AUTO => Mode::Auto,
        _ => Mode::Auto,
    }
}

fn fan_code(fan: FanSpeed) -> u8 {
    match fan {
        FanSpeed::High => FAN_HIGH,
        FanSpeed::Med => FAN_MED,
        FanSpeed::Low => FAN_LOW,
        FanSpeed::Auto | FanSpeed::None => FAN_AUTO,
    }
}

fn fan_from_code(code: u8) -> FanSpeed {
    match code {
        FAN_HIGH => FanSpeed::High,
        FAN_MED => FanSpeed::Med,
        FAN_LOW => FanSpeed::Low,
        FAN_AUTO | FAN_QUIET => FanSpeed::Auto,
        _ => FanSpeed::Auto,
    }
}

fn swing_code(vane: VaneMode) -> u8 {
    match vane {
        VaneMode::Swing => SWING_BOTH,
        VaneMode::V1 | VaneMode::V2 | VaneMode::V3 | VaneMode::V4 | VaneMode::V5 => SWING_VERTICAL,
        VaneMode::Auto => SWING_OFF,
    }
}

fn vane_from_code(code: u8) -> VaneMode {
    match code {
        SWING_VERTICAL | SWING_HORIZONTAL | SWING_BOTH => VaneMode::Swing,
        _ => VaneMode::Auto,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Ng,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub data: Vec<u8, DATA_MAX_LEN>,
}

impl Response {
    /// The first one or two data bytes as a big-endian value.
    fn value(&self) -> Result<u16> {
        match self.data.as_slice() {
            [b] => Ok(*b as u16),
            [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
            [] => Err(Error::InvalidData),
        }
    }
}

fn status(input: &[u8]) -> IResult<&[u8], Status> {
    alt((value(Status::Ok, tag("OK")), value(Status::Ng, tag("NG"))))(input)
}

fn payload(input: &[u8]) -> IResult<&[u8], Option<(&[u8], &[u8])>> {
    opt(tuple((preceded(tag(" P="), hex_digit0), preceded(tag(" C="), hex_digit1))))(input)
}

fn hex_nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => c - b'A' + 10,
    }
}

/// Parses one reply line, without its CR.
pub fn parse_response(line: &[u8]) -> Result<Response> {
    let (_, (status, payload)) =
        all_consuming(tuple((status, payload)))(line).map_err(|_| Error::InvalidData)?;

    let mut response = Response { status, data: Vec::new() };
    let Some((hex, cs)) = payload else {
        return Ok(response);
    };

    if hex.len() % 2 != 0 || cs.len() > 4 {
        return Err(Error::InvalidData);
    }
    for pair in hex.chunks(2) {
        response
            .data
            .push(hex_nibble(pair[0]) << 4 | hex_nibble(pair[1]))
            .map_err(|_| Error::InvalidData)?;
    }

    let received = cs.iter().fold(0u16, |acc, c| acc << 4 | hex_nibble(*c) as u16);
    let calculated = checksum::subtractive16(0, &response.data);
    if received != calculated {
        log::error!("invalid checksum recv=0x{:04X}, calc=0x{:04X}", received, calculated);
        return Err(Error::InvalidCrc);
    }
    Ok(response)
}

/// Formats a request line, CR included.
pub fn format_request(kind: &str, address: u16, data: &[u8]) -> Result<String<MSG_BUFFER_LEN>> {
    if data.len() > DATA_MAX_LEN {
        return Err(Error::InvalidParameters);
    }
    let mut line = String::new();
    write_request(&mut line, kind, address, data).map_err(|_| Error::InvalidParameters)?;
    Ok(line)
}

fn write_request(line: &mut impl Write, kind: &str, address: u16, data: &[u8]) -> core::fmt::Result {
    write!(line, "{} P={:04X}", kind, address)?;
    if !data.is_empty() {
        line.write_char(',')?;
        for b in data {
            write!(line, "{:02X}", b)?;
        }
    }
    write!(line, " C={:04X}\r", checksum::subtractive16(address, data))
}

pub struct HitachiHLink<T, C> {
    link: Link<T, C>,
    connected: bool,
}

impl<T, C> HitachiHLink<T, C> {
    pub const LINE_CONFIG: LineConfig = LineConfig::new(9600, Parity::Odd, 1);
}

impl<T: Transport, C: Clock> HitachiHLink<T, C> {
    pub fn new(transport: T, clock: C) -> Self {
        HitachiHLink { link: Link::new(transport, clock, "hlink"), connected: false }
    }

    pub fn link(&self) -> &Link<T, C> {
        &self.link
    }

    fn send(&mut self, kind: &str, address: u16, data: &[u8]) -> Result<()> {
        let line = format_request(kind, address, data)?;
        log::debug!("send: {}", line.trim_end());
        self.link.write(line.as_bytes())
    }

    fn read_line(&mut self) -> Result<Vec<u8, MSG_BUFFER_LEN>> {
        let start = self.link.now_ms();
        let mut line = Vec::new();
        loop {
            let elapsed = self.link.clock().elapsed_ms(start);
            if elapsed >= READ_TIMEOUT_MS {
                return Err(Error::Timeout);
            }
            let byte = self.link.read_byte(READ_TIMEOUT_MS - elapsed)?;
            if byte == CR {
                return Ok(line);
            }
            if line.len() + 1 >= MSG_BUFFER_LEN {
                return Err(Error::InvalidData);
            }
            line.push(byte).map_err(|_| Error::InvalidData)?;
        }
    }

    fn exchange(&mut self, kind: &str, feature: Feature, data: &[u8]) -> Result<Response> {
        self.send(kind, feature as u16, data)?;
        let line = self.read_line().map_err(|e| {
            log::error!("failed to read response line for {:?}", feature);
            e
        })?;
        log::debug!("read: {:02x?}", line);
        let response = parse_response(&line)?;
        match response.status {
            Status::Ok => Ok(response),
            Status::Ng => Err(Error::InvalidReply),
        }
    }

    fn query(&mut self, feature: Feature) -> Result<Response> {
        self.exchange("MT", feature, &[])
    }

    /// A failed read of a feature is reported as invalid data.
    fn query_value(&mut self, feature: Feature) -> Result<u16> {
        self.query(feature)
            .and_then(|response| response.value())
            .map_err(|e| {
                log::debug!("query {:?} failed: {}", feature, e);
                Error::InvalidData
            })
    }

    /// Single-byte codes sit in the first data byte whatever the reply length.
    fn query_code(&mut self, feature: Feature) -> Result<u8> {
        self.query(feature)
            .and_then(|response| response.data.first().copied().ok_or(Error::InvalidData))
            .map_err(|e| {
                log::debug!("query {:?} failed: {}", feature, e);
                Error::InvalidData
            })
    }

    fn command(&mut self, feature: Feature, data: &[u8]) -> Result<()> {
        self.exchange("ST", feature, data).map(|_| ())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

impl<T: Transport, C: Clock> Climate for HitachiHLink<T, C> {
    fn init(&mut self) -> Result<()> {
        self.link.open(Self::LINE_CONFIG)?;
        self.connected = true;
        Ok(())
    }

    fn set_state(&mut self, settings: &ClimateSettings) -> Result<()> {
        self.ensure_connected()?;

        let power = if settings.is_on() { POWER_ON } else { POWER_OFF };
        self.command(Feature::Power, &[power])?;

        if settings.is_on() {
            self.command(Feature::Mode, &mode_word(settings.mode).to_be_bytes())?;
            let target = settings.clamped_temperature(TEMPERATURE_RANGE) as u16;
            self.command(Feature::TargetTemp, &target.to_be_bytes())?;
            self.command(Feature::FanMode, &[fan_code(settings.fan_speed)])?;
            self.command(Feature::SwingMode, &[swing_code(settings.vane_mode)])?;
        }
        Ok(())
    }

    fn get_state(&mut self) -> Result<ClimateSettings> {
        self.ensure_connected()?;

        // Order matters to the unit.
        let power = self.query(Feature::Power).map_err(|_| Error::InvalidData)?;
        let action = match power.data.first() {
            Some(&POWER_ON) => Action::On,
            Some(_) => Action::Off,
            None => return Err(Error::InvalidData),
        };

        let mode = self.query(Feature::Mode).map_err(|_| Error::InvalidData)?;
        let mode = match mode.data.as_slice() {
            [hi, lo, ..] => mode_from_word(u16::from_be_bytes([*hi, *lo])),
            _ => return Err(Error::InvalidData),
        };

        let temperature = self.query_value(Feature::TargetTemp)? as i32;
        let vane_mode = vane_from_code(self.query_code(Feature::SwingMode)?);
        let fan_speed = fan_from_code(self.query_code(Feature::FanMode)?);

        let settings = ClimateSettings { action, temperature, fan_speed, mode, vane_mode };
        log::debug!("state: {:?}", settings);
        Ok(settings)
    }

    fn room_temperature(&mut self) -> Result<f32> {
        self.ensure_connected()?;

        let response = self.query(Feature::IndoorTemp).map_err(|_| Error::InvalidData)?;
        let temperature = match response.data.as_slice() {
            [b] => *b as f32,
            [hi, lo, ..] => i16::from_be_bytes([*hi, *lo]) as f32,
            [] => return Err(Error::InvalidData),
        };
        log::debug!("room temperature: {:.1}", temperature);
        Ok(temperature)
    }
}
