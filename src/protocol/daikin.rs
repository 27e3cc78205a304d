//! Daikin units with an S21 connector.
//!
//! Frames are `STX payload checksum ETX`, where payload is two command letters
//! followed by ASCII-ish parameters and the checksum is the additive sum of the
//! payload. Every frame is acknowledged with a single ACK byte.

use heapless::Vec;
use nom::branch::alt;
use nom::character::complete::{char, digit1, space0};
use nom::combinator::opt;
use nom::sequence::tuple;
use nom::IResult;

use crate::climate::Climate;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::interface::{LineConfig, Parity, Transport};
use crate::link::Link;
use crate::protocol::checksum;
use crate::types::{Action, ClimateSettings, FanSpeed, Mode, VaneMode};

const STX: u8 = 0x02;
const ETX: u8 = 0x03;
const ACK: u8 = 0x06;
pub const NAK: u8 = 0x15;

pub const MAX_FRAME_LEN: usize = 64;
const RESPONSE_TIMEOUT_MS: u32 = 250;

const SETPOINT_OFFSET: i32 = 28;
const SETPOINT_STEP: i32 = 5;
pub const TEMPERATURE_RANGE: core::ops::RangeInclusive<i32> = 18..=32;

const QUERY_STATE: &[u8] = b"F1";
const QUERY_SWING: &[u8] = b"F5";
const QUERY_ROOM_TEMPERATURE: &[u8] = b"RH";

pub type Payload = Vec<u8, MAX_FRAME_LEN>;

/// Whether an ETX read after `body` is the checksum rather than the end of
/// the frame.
fn is_checksum_etx(body: &[u8]) -> bool {
    let complete = matches!(body.split_last(), Some((&cs, payload)) if checksum::additive(payload) == cs);
    !body.is_empty() && !complete && checksum::additive(body) == ETX
}

fn mode_from_code(code: u8) -> Mode {
    match code {
        b'4' => Mode::Heat,
        b'3' => Mode::Cold,
        b'2' => Mode::Dry,
        b'6' => Mode::Fan,
        b'1' => Mode::Auto,
        b'0' => Mode::None,
        _ => Mode::Auto,
    }
}

fn mode_code(mode: Mode, action: Action) -> u8 {
    if action != Action::On {
        return b'0';
    }
    match mode {
        Mode::None => b'0',
        Mode::Heat => b'4',
        Mode::Cold => b'3',
        Mode::Dry => b'2',
        Mode::Fan => b'6',
        Mode::Auto => b'1',
    }
}

fn fan_from_code(code: u8) -> FanSpeed {
    match code {
        b'A' => FanSpeed::Auto,
        b'B' | b'3' => FanSpeed::Low,
        b'4' | b'5' => FanSpeed::Med,
        b'6' | b'7' => FanSpeed::High,
        _ => FanSpeed::Auto,
    }
}

fn fan_code(fan: FanSpeed) -> u8 {
    match fan {
        FanSpeed::Low => b'3',
        FanSpeed::Med => b'5',
        FanSpeed::High => b'7',
        FanSpeed::Auto | FanSpeed::None => b'A',
    }
}

fn encode_setpoint(degrees: i32) -> u8 {
    ((degrees * 10 + 3) / SETPOINT_STEP + SETPOINT_OFFSET) as u8
}

fn decode_setpoint(byte: u8) -> i32 {
    ((byte as i32 - SETPOINT_OFFSET) * SETPOINT_STEP) / 10
}

fn swing_command(vertical: bool, horizontal: bool) -> [u8; 6] {
    let mut bits = u8::from(vertical) + 2 * u8::from(horizontal);
    if vertical && horizontal {
        bits += 4;
    }
    let enabled = if vertical || horizontal { b'?' } else { b'0' };
    [b'D', b'5', b'0' + bits, enabled, b'0', b'0']
}

/// Parses a signed decimal, as sent after `SH`.
fn signed_decimal(input: &[u8]) -> IResult<&[u8], i32> {
    let (input, (_, sign, digits)) = tuple((space0, opt(alt((char('-'), char('+')))), digit1))(input)?;
    let value = digits.iter().fold(0i32, |acc, d| acc.saturating_mul(10).saturating_add((d - b'0') as i32));
    Ok((input, if sign == Some('-') { -value } else { value }))
}

fn decode_room_temperature(payload: &[u8]) -> Result<f32> {
    match payload {
        [b'S', b'H', rest @ ..] if !rest.is_empty() => signed_decimal(rest)
            .map(|(_, tenths)| tenths as f32 / 10.0)
            .map_err(|_| Error::InvalidData),
        _ => Err(Error::InvalidData),
    }
}

fn decode_state(payload: &[u8]) -> Result<ClimateSettings> {
    let [b'G', b'1', power, mode, setpoint, fan, ..] = *payload else {
        return Err(Error::InvalidData);
    };
    let action = if power == b'1' { Action::On } else { Action::Off };
    Ok(ClimateSettings {
        action,
        temperature: decode_setpoint(setpoint),
        fan_speed: fan_from_code(fan),
        mode: if action == Action::On { mode_from_code(mode) } else { Mode::None },
        vane_mode: VaneMode::Auto,
    })
}

fn decode_swing(payload: &[u8]) -> Option<VaneMode> {
    match payload {
        [b'G', b'5', bits, ..] if bits & 0x03 != 0 => Some(VaneMode::Swing),
        [b'G', b'5', ..] => Some(VaneMode::Auto),
        _ => None,
    }
}

pub struct DaikinS21<T, C> {
    link: Link<T, C>,
    connected: bool,
}

impl<T, C> DaikinS21<T, C> {
    pub const LINE_CONFIG: LineConfig = LineConfig::new(2400, Parity::Even, 2);
}

impl<T: Transport, C: Clock> DaikinS21<T, C> {
    pub fn new(transport: T, clock: C) -> Self {
        DaikinS21 { link: Link::new(transport, clock, "daikin"), connected: false }
    }

    pub fn link(&self) -> &Link<T, C> {
        &self.link
    }

    fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        let mut frame: Vec<u8, { MAX_FRAME_LEN + 3 }> = Vec::new();
        frame.push(STX).map_err(|_| Error::InvalidParameters)?;
        frame.extend_from_slice(payload).map_err(|_| Error::InvalidParameters)?;
        frame
            .extend_from_slice(&[checksum::additive(payload), ETX])
            .map_err(|_| Error::InvalidParameters)?;
        self.link.write(&frame)
    }

    fn wait_for_ack(&mut self) -> Result<()> {
        match self.link.read_byte(RESPONSE_TIMEOUT_MS) {
            Ok(ACK) => Ok(()),
            Ok(byte) => {
                log::warn!("unexpected byte waiting for ACK: 0x{:02x}", byte);
                Err(Error::InvalidReply)
            }
            Err(e) => {
                log::warn!("timeout waiting for ACK");
                Err(e)
            }
        }
    }

    /// Reads one frame and returns its payload.
    ///
    /// A payload summing to ETX carries ETX as its checksum, so an ETX only
    /// ends the frame once the bytes before it check out as payload and
    /// checksum, or cannot become so.
    fn read_frame(&mut self) -> Result<Payload> {
        self.link.sync(STX, RESPONSE_TIMEOUT_MS)?;

        let mut body: Vec<u8, MAX_FRAME_LEN> = Vec::new();
        loop {
            let byte = self.link.read_byte(RESPONSE_TIMEOUT_MS).map_err(|e| {
                log::warn!("timeout reading frame");
                e
            })?;
            if byte == ETX && !is_checksum_etx(&body) {
                break;
            }
            body.push(byte).map_err(|_| {
                log::error!("frame exceeds {} bytes", MAX_FRAME_LEN);
                Error::InvalidData
            })?;
        }

        let Some((&received, payload)) = body.split_last() else {
            return Err(Error::InvalidData);
        };
        let calculated = checksum::additive(payload);
        if received != calculated {
            log::error!("checksum mismatch {:02x} != {:02x}: {:02x?}", received, calculated, body);
            return Err(Error::InvalidCrc);
        }
        body.pop();
        Ok(body)
    }

    /// Sends `payload`, waits for the ACK and the reply frame, then ACKs it.
    fn query(&mut self, payload: &[u8]) -> Result<Payload> {
        self.send_frame(payload)?;
        self.wait_for_ack()?;
        let reply = self.read_frame()?;
        self.link.write(&[ACK])?;
        Ok(reply)
    }

    fn command(&mut self, payload: &[u8]) -> Result<()> {
        self.send_frame(payload)?;
        self.wait_for_ack()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

impl<T: Transport, C: Clock> Climate for DaikinS21<T, C> {
    fn init(&mut self) -> Result<()> {
        self.link.open(Self::LINE_CONFIG)?;
        self.connected = true;
        Ok(())
    }

    fn set_state(&mut self, settings: &ClimateSettings) -> Result<()> {
        self.ensure_connected()?;

        let target = settings.clamped_temperature(TEMPERATURE_RANGE);
        let command = [
            b'D',
            b'1',
            if settings.is_on() { b'1' } else { b'0' },
            mode_code(settings.mode, settings.action),
            encode_setpoint(target),
            fan_code(settings.fan_speed),
        ];
        self.command(&command)?;

        let swing = settings.vane_mode == VaneMode::Swing;
        if let Err(e) = self.command(&swing_command(swing, swing)) {
            log::warn!("swing update failed: {}", e);
        }
        Ok(())
    }

    fn get_state(&mut self) -> Result<ClimateSettings> {
        self.ensure_connected()?;

        let reply = self.query(QUERY_STATE).map_err(|e| {
            log::error!("failed to query basic state: {}", e);
            e
        })?;
        let mut settings = decode_state(&reply)?;

        match self.query(QUERY_SWING) {
            Ok(reply) => {
                if let Some(vane_mode) = decode_swing(&reply) {
                    settings.vane_mode = vane_mode;
                }
            }
            Err(e) => log::debug!("swing query failed: {}", e),
        }
        Ok(settings)
    }

    fn room_temperature(&mut self) -> Result<f32> {
        self.ensure_connected()?;

        let reply = self.query(QUERY_ROOM_TEMPERATURE).map_err(|e| {
            log::warn!("failed to query room temperature: {}", e);
            e
        })?;
        decode_room_temperature(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{init_logger, ScriptedTransport, SimClock};

    fn frame(payload: &[u8]) -> std::vec::Vec<u8> {
        let mut out = vec![STX];
        out.extend_from_slice(payload);
        out.push(checksum::additive(payload));
        out.push(ETX);
        out
    }

    fn reply(payload: &[u8]) -> std::vec::Vec<u8> {
        let mut out = vec![ACK];
        out.extend(frame(payload));
        out
    }

    fn adapter(transport: ScriptedTransport) -> DaikinS21<ScriptedTransport, SimClock> {
        init_logger();
        let mut ac = DaikinS21::new(transport, SimClock::new());
        ac.init().unwrap();
        ac
    }

    #[test]
    fn setpoint_formula() {
        assert_eq!(encode_setpoint(27), 82);
        assert_eq!(decode_setpoint(82), 27);
        assert_eq!(encode_setpoint(18), 64);
        assert_eq!(decode_setpoint(64), 18);
    }

    #[test]
    fn get_state_decodes_f1() {
        let mut transport = ScriptedTransport::new();
        transport.expect(&frame(b"F1"), &reply(&[b'G', b'1', b'1', b'3', 82, b'A']));
        let mut ac = adapter(transport);

        let settings = ac.get_state().unwrap();
        assert_eq!(settings.action, Action::On);
        assert_eq!(settings.mode, Mode::Cold);
        assert_eq!(settings.temperature, 27);
        assert_eq!(settings.fan_speed, FanSpeed::Auto);
        assert_eq!(settings.vane_mode, VaneMode::Auto);

        let written = ac.link().transport().writes.clone();
        assert_eq!(written[0], [0x02, b'F', b'1', 0x77, 0x03]);
        assert_eq!(written[1], [ACK]);
    }

    #[test]
    fn get_state_reads_swing() {
        let mut transport = ScriptedTransport::new();
        transport
            .expect(&frame(b"F1"), &reply(&[b'G', b'1', b'0', b'3', 82, b'7']))
            .expect(&frame(b"F5"), &reply(b"G51000"));
        let mut ac = adapter(transport);

        let settings = ac.get_state().unwrap();
        assert_eq!(settings.action, Action::Off);
        assert_eq!(settings.mode, Mode::None);
        assert_eq!(settings.fan_speed, FanSpeed::High);
        assert_eq!(settings.vane_mode, VaneMode::Swing);
    }

    #[test]
    fn corrupted_reply_is_rejected() {
        let mut bad = reply(&[b'G', b'1', b'1', b'3', 82, b'A']);
        bad[3] ^= 0x01;
        let mut transport = ScriptedTransport::new();
        transport.expect(&frame(b"F1"), &bad);
        let mut ac = adapter(transport);
        assert_eq!(ac.get_state(), Err(Error::InvalidCrc));
    }

    #[test]
    fn checksum_equal_to_etx() {
        let payload = b"G5aaad";
        assert_eq!(checksum::additive(payload), ETX);

        let mut transport = ScriptedTransport::new();
        transport.expect(&frame(b"F5"), &reply(payload));
        let mut ac = adapter(transport);

        assert_eq!(ac.query(b"F5").unwrap().as_slice(), payload);
        assert_eq!(ac.link().transport().writes[1], [ACK]);
    }

    #[test]
    fn nak_is_an_invalid_reply() {
        let mut transport = ScriptedTransport::new();
        transport.expect(&frame(b"F1"), &[NAK]);
        let mut ac = adapter(transport);
        assert_eq!(ac.get_state(), Err(Error::InvalidReply));
    }

    #[test]
    fn set_state_clamps_setpoint() {
        let settings = ClimateSettings {
            action: Action::On,
            temperature: 35,
            fan_speed: FanSpeed::Low,
            mode: Mode::Heat,
            vane_mode: VaneMode::Swing,
        };
        let mut transport = ScriptedTransport::new();
        transport
            .expect(&frame(&[b'D', b'1', b'1', b'4', 92, b'3']), &[ACK])
            .expect(&frame(b"D57?00"), &[ACK]);
        let mut ac = adapter(transport);
        assert_eq!(ac.set_state(&settings), Ok(()));
        assert_eq!(ac.link().transport().pending_exchanges(), 0);
    }

    #[test]
    fn swing_failure_does_not_fail_set_state() {
        let settings = ClimateSettings { temperature: 20, ..Default::default() };
        let mut transport = ScriptedTransport::new();
        transport.expect(&frame(&[b'D', b'1', b'0', b'0', encode_setpoint(20), b'A']), &[ACK]);
        let mut ac = adapter(transport);
        assert_eq!(ac.set_state(&settings), Ok(()));
        assert_eq!(ac.link().transport().writes[1], frame(b"D50000"));
    }

    #[test]
    fn room_temperature_test() {
        let mut transport = ScriptedTransport::new();
        transport
            .expect(&frame(b"RH"), &reply(b"SH+215"))
            .expect(&frame(b"RH"), &reply(b"SH-035"))
            .expect(&frame(b"RH"), &reply(b"SH"));
        let mut ac = adapter(transport);
        assert_eq!(ac.room_temperature(), Ok(21.5));
        assert_eq!(ac.room_temperature(), Ok(-3.5));
        assert_eq!(ac.room_temperature(), Err(Error::InvalidData));
    }

    #[test]
    fn requires_init() {
        init_logger();
        let mut ac = DaikinS21::new(ScriptedTransport::new(), SimClock::new());
        assert_eq!(ac.get_state(), Err(Error::NotConnected));
        assert_eq!(ac.set_state(&ClimateSettings::default()), Err(Error::NotConnected));
        assert_eq!(ac.room_temperature(), Err(Error::NotConnected));
    }
}
