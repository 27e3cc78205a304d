use num_enum::{FromPrimitive, IntoPrimitive};

use crate::error::{Error, Result};
use crate::protocol::encoding::{claim, Encodable};
use crate::types::{Action, ClimateSettings, FanSpeed, Mode, VaneMode};

use super::frame::{DataType, Frame};

pub const DATA_LEN: usize = 0x10;

// Indexed by the ordinal of the neutral enum.
const MODE_CODES: [u8; 6] = [0xff, 0x03, 0x02, 0x07, 0x08, 0x01];
const FAN_CODES: [u8; 5] = [0xff, 0x00, 0x06, 0x03, 0x01];
const VANE_CODES: [u8; 7] = [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x07];

const MODES: [Mode; 6] = [Mode::None, Mode::Cold, Mode::Dry, Mode::Fan, Mode::Auto, Mode::Heat];
const VANES: [VaneMode; 7] = [
    VaneMode::Auto,
    VaneMode::V1,
    VaneMode::V2,
    VaneMode::V3,
    VaneMode::V4,
    VaneMode::V5,
    VaneMode::Swing,
];

pub const TEMPERATURE_RANGE: core::ops::RangeInclusive<i32> = 16..=31;

pub fn mode_code(mode: Mode) -> u8 {
    MODE_CODES[mode as usize]
}

pub fn fan_code(fan: FanSpeed) -> u8 {
    FAN_CODES[fan as usize]
}

pub fn vane_code(vane: VaneMode) -> u8 {
    VANE_CODES[vane as usize]
}

/// Reverse lookup; unknown codes keep `fallback`.
fn lookup<T: Copy>(codes: &[u8], values: &[T], code: u8, fallback: T) -> T {
    codes
        .iter()
        .position(|c| *c == code)
        .map(|i| values[i])
        .unwrap_or(fallback)
}

pub fn mode_from_code(code: u8) -> Mode {
    lookup(&MODE_CODES, &MODES, code, Mode::Auto)
}

pub fn vane_from_code(code: u8) -> VaneMode {
    lookup(&VANE_CODES, &VANES, code, VaneMode::Auto)
}

pub fn fan_from_code(code: u8) -> FanSpeed {
    match code {
        0x01 | 0x02 => FanSpeed::Low,
        0x03 | 0x04 => FanSpeed::Med,
        0x05 | 0x06 => FanSpeed::High,
        _ => FanSpeed::Auto,
    }
}

/// Packets this crate sends. Each knows its type byte and how to fill its data.
pub trait PacketData {
    const TYPE: DataType;

    fn fill(&self, data: &mut [u8]);

    fn len(&self) -> usize {
        DATA_LEN
    }
}

/// A request ready to be encoded as a full frame.
pub struct Packet<D>(pub D);

impl<D: PacketData> Encodable for Packet<D> {
    fn encoded_len(&self) -> usize {
        self.0.len() + 6
    }

    fn encode<'a>(&self, into: &'a mut [u8]) -> Result<&'a [u8]> {
        let mut data = [0u8; DATA_LEN];
        let data = data.get_mut(..self.0.len()).ok_or(Error::InvalidParameters)?;
        self.0.fill(data);
        let out = claim(into, self.encoded_len())?;
        Frame::new(D::TYPE, data).encode(out)
    }
}

pub struct ConnectRequest;

impl PacketData for ConnectRequest {
    const TYPE: DataType = DataType::ConnectRequest;

    fn fill(&self, data: &mut [u8]) {
        data.copy_from_slice(&[0xca, 0x01]);
    }

    fn len(&self) -> usize {
        2
    }
}

// 16 bytes:
//
//  0   1   2   3   4   5   6   7   8 .. 15
// ID  F0  F1  PW  MO  TM  FA  VA  xx
//
// ID: 0x01
// F0: 0x1f, power/mode/temp/fan/vane are present
// TM: 0x0f - (degrees - 16)
pub struct SetRequest<'a>(pub &'a ClimateSettings);

impl PacketData for SetRequest<'_> {
    const TYPE: DataType = DataType::SetRequest;

    fn fill(&self, data: &mut [u8]) {
        let settings = self.0;
        let temperature = settings.clamped_temperature(TEMPERATURE_RANGE);
        data[0] = 0x01;
        data[1] = 0x1f;
        data[3] = u8::from(settings.is_on());
        data[4] = mode_code(settings.mode);
        data[5] = (0x0f - (temperature - 16)) as u8;
        data[6] = fan_code(settings.fan_speed);
        data[7] = vane_code(settings.vane_mode);
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, IntoPrimitive)]
pub enum InfoType {
    Settings = 0x02,
    RoomTemp = 0x03,
    Timers = 0x05,
    Status = 0x06,
    #[num_enum(default)]
    Unknown = 0xff,
}

pub struct GetInfoRequest(pub InfoType);

impl PacketData for GetInfoRequest {
    const TYPE: DataType = DataType::GetInfoRequest;

    fn fill(&self, data: &mut [u8]) {
        data[0] = self.0.into();
    }
}

/// The info type a reply carries, in its first data byte.
pub fn reply_info(data: &[u8]) -> InfoType {
    InfoType::from(data.first().copied().unwrap_or(0xff))
}

pub fn decode_settings(data: &[u8]) -> Result<ClimateSettings> {
    if data.len() < 8 || reply_info(data) != InfoType::Settings {
        return Err(Error::InvalidData);
    }
    Ok(ClimateSettings {
        action: if data[3] == 0x01 { Action::On } else { Action::Off },
        mode: mode_from_code(data[4]),
        temperature: (0x0f - data[5] as i32) + 16,
        fan_speed: fan_from_code(data[6]),
        vane_mode: vane_from_code(data[7]),
    })
}

pub fn decode_room_temperature(data: &[u8]) -> Result<f32> {
    if data.len() < 7 || reply_info(data) != InfoType::RoomTemp {
        return Err(Error::InvalidData);
    }
    if data[6] != 0x00 {
        Ok((data[6] & 0x7f) as f32 / 2.0)
    } else {
        Ok(data[3] as f32 + 10.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mitsubishi::frame::MAX_FRAME_LEN;
    use hex_literal::hex;

    #[test]
    fn get_info_request_test() {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let packet = Packet(GetInfoRequest(InfoType::Settings));
        assert_eq!(
            packet.encode(&mut buf),
            Ok(&hex!("fc 42 01 30 10 02 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 7b")[..])
        );
    }

    #[test]
    fn set_request_test() {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let settings = ClimateSettings {
            action: Action::On,
            temperature: 21,
            fan_speed: FanSpeed::Auto,
            mode: Mode::Auto,
            vane_mode: VaneMode::Swing,
        };
        let encoded = Packet(SetRequest(&settings)).encode(&mut buf).unwrap();
        assert_eq!(&encoded[..13], &hex!("fc 41 01 30 10 01 1f 00 01 08 0a 00 07"));
        assert!(encoded[13..21].iter().all(|b| *b == 0));
        assert_eq!(Frame::parse_complete(encoded).map(|f| f.validate_checksum()), Ok(true));
    }

    #[test]
    fn set_request_clamps_temperature() {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let settings = ClimateSettings { temperature: 40, ..Default::default() };
        let encoded = Packet(SetRequest(&settings)).encode(&mut buf).unwrap();
        assert_eq!(encoded[10], 0x00);
    }

    #[test]
    fn decode_settings_test() {
        let data = hex!("02 00 00 01 03 06 05 07 00 00 00 00 00 00 00 00");
        let settings = decode_settings(&data).unwrap();
        assert_eq!(settings.action, Action::On);
        assert_eq!(settings.mode, Mode::Cold);
        assert_eq!(settings.temperature, 25);
        assert_eq!(settings.fan_speed, FanSpeed::High);
        assert_eq!(settings.vane_mode, VaneMode::Swing);
    }

    #[test]
    fn decode_rejects_other_info() {
        let data = hex!("03 00 00 01 03 06 05 07");
        assert_eq!(decode_settings(&data), Err(Error::InvalidData));
    }

    #[test]
    fn code_tables_round_trip() {
        for mode in MODES {
            assert_eq!(mode_from_code(mode_code(mode)), mode);
        }
        for vane in VANES {
            assert_eq!(vane_from_code(vane_code(vane)), vane);
        }
        for fan in [FanSpeed::Auto, FanSpeed::Low, FanSpeed::Med, FanSpeed::High] {
            assert_eq!(fan_from_code(fan_code(fan)), fan);
        }
        assert_eq!(mode_from_code(0x42), Mode::Auto);
        assert_eq!(vane_from_code(0x42), VaneMode::Auto);
        assert_eq!(fan_from_code(0x42), FanSpeed::Auto);
    }

    #[test]
    fn room_temperature_test() {
        assert_eq!(decode_room_temperature(&hex!("03 00 00 0c 00 00 00")), Ok(22.0));
        assert_eq!(decode_room_temperature(&hex!("03 00 00 0c 00 00 ad")), Ok(22.5));
    }
}
