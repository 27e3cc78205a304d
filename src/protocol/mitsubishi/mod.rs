//! Mitsubishi heat pumps with a CN105 connector.
//!
//! Every exchange is a request packet answered by one reply packet. Replies
//! with a bad checksum are logged and still used, since the units are known to
//! send them.

mod frame;
mod packets;

pub use frame::{DataType, Frame};
pub use packets::{ConnectRequest, GetInfoRequest, InfoType, Packet, SetRequest};

use crate::climate::Climate;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::interface::{LineConfig, Parity, Transport};
use crate::link::Link;
use crate::protocol::encoding::Encodable;
use crate::types::ClimateSettings;

use frame::{FRAME_START, HEADER_LEN, MAX_FRAME_LEN};
use packets::PacketData;

const TIMEOUT_MS: u32 = 1000;
// Unrelated packets tolerated while waiting for the connect reply.
const CONNECT_REPLY_BUDGET: usize = 8;

pub struct Mitsubishi<T, C> {
    link: Link<T, C>,
    connected: bool,
}

impl<T, C> Mitsubishi<T, C> {
    pub const LINE_CONFIG: LineConfig = LineConfig::new(2400, Parity::Even, 1);
}

impl<T: Transport, C: Clock> Mitsubishi<T, C> {
    pub fn new(transport: T, clock: C) -> Self {
        Mitsubishi { link: Link::new(transport, clock, "mitsubishi"), connected: false }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn link(&self) -> &Link<T, C> {
        &self.link
    }

    pub fn release(self) -> (T, C) {
        self.link.release()
    }

    fn write_packet<D: PacketData>(&mut self, packet: Packet<D>) -> Result<()> {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let encoded = packet.encode(&mut buf)?;
        log::debug!("write packet: type={:?}", D::TYPE);
        self.link.write(encoded)
    }

    /// Reads the next packet into `buf`. Checksum mismatches are only logged.
    fn read_packet<'b>(&mut self, buf: &'b mut [u8; MAX_FRAME_LEN]) -> Result<Frame<'b>> {
        self.link.sync(FRAME_START, TIMEOUT_MS)?;
        buf[0] = FRAME_START;
        self.link.read_exact(&mut buf[1..HEADER_LEN], TIMEOUT_MS)?;

        let len = HEADER_LEN + buf[HEADER_LEN - 1] as usize + 1;
        if len > MAX_FRAME_LEN {
            log::error!("packet too long: {} bytes", len);
            return Err(Error::InvalidData);
        }
        self.link.read_exact(&mut buf[HEADER_LEN..len], TIMEOUT_MS)?;

        let buf: &'b [u8; MAX_FRAME_LEN] = buf;
        let frame = Frame::parse_complete(&buf[..len])?;
        if !frame.validate_checksum() {
            log::error!(
                "invalid checksum rcv=0x{:02x}, calc=0x{:02x}, continuing",
                frame.received_checksum(),
                frame.calculated_checksum()
            );
        }
        log::debug!("read packet: type=0x{:02x}, {:02x?}", frame.type_byte(), &buf[..len]);
        Ok(frame)
    }

    fn connect(&mut self) -> Result<()> {
        log::debug!("connecting");
        self.connected = false;
        self.write_packet(Packet(ConnectRequest))?;

        let mut buf = [0u8; MAX_FRAME_LEN];
        for _ in 0..CONNECT_REPLY_BUDGET {
            match self.read_packet(&mut buf) {
                Ok(frame) if frame.data_type.is_connect() => {
                    log::info!("connected");
                    self.connected = true;
                    return Ok(());
                }
                Ok(_) => continue,
                Err(_) => break,
            }
        }

        log::error!("not connected");
        Err(Error::NotConnected)
    }

    fn ensure_connected(&mut self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            self.connect()
        }
    }

    fn get_info(&mut self, info: InfoType) -> Result<()> {
        self.ensure_connected()?;
        self.write_packet(Packet(GetInfoRequest(info)))
    }
}

impl<T: Transport, C: Clock> Climate for Mitsubishi<T, C> {
    fn init(&mut self) -> Result<()> {
        self.link.open(Self::LINE_CONFIG)?;
        self.connect()
    }

    fn set_state(&mut self, settings: &ClimateSettings) -> Result<()> {
        self.ensure_connected()?;
        self.write_packet(Packet(SetRequest(settings)))?;

        let mut buf = [0u8; MAX_FRAME_LEN];
        let reply = self.read_packet(&mut buf)?;
        if reply.data_type == DataType::SetResponse {
            Ok(())
        } else {
            log::error!("unexpected reply to set request: 0x{:02x}", reply.type_byte());
            Err(Error::InvalidReply)
        }
    }

    fn get_state(&mut self) -> Result<ClimateSettings> {
        self.get_info(InfoType::Settings)?;

        let mut buf = [0u8; MAX_FRAME_LEN];
        let reply = match self.read_packet(&mut buf) {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("failed to get state, marking as disconnected");
                self.connected = false;
                return Err(e);
            }
        };
        packets::decode_settings(reply.data).map_err(|e| {
            log::error!("invalid reply info type: {:?}", packets::reply_info(reply.data));
            e
        })
    }

    fn room_temperature(&mut self) -> Result<f32> {
        self.get_info(InfoType::RoomTemp)?;

        let mut buf = [0u8; MAX_FRAME_LEN];
        let reply = self.read_packet(&mut buf)?;
        packets::decode_room_temperature(reply.data).map_err(|e| {
            log::error!("invalid reply info type: {:?}", packets::reply_info(reply.data));
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{init_logger, ScriptedTransport, SimClock};
    use crate::types::{Action, FanSpeed, Mode, VaneMode};
    use hex_literal::hex;

    const CONNECT: [u8; 8] = hex!("fc 5a 01 30 02 ca 01 a8");
    const CONNECTED: [u8; 7] = hex!("fc 7a 01 30 01 00 54");
    const GET_SETTINGS: [u8; 22] =
        hex!("fc 42 01 30 10 02 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 7b");

    fn settings_reply() -> [u8; 22] {
        let data = hex!("02 00 00 01 03 06 05 07 00 00 00 00 00 00 00 00");
        let mut buf = [0u8; 22];
        Frame::new(DataType::GetInfoResponse, &data).encode(&mut buf).unwrap();
        buf
    }

    fn adapter(transport: ScriptedTransport) -> Mitsubishi<ScriptedTransport, SimClock> {
        init_logger();
        Mitsubishi::new(transport, SimClock::new())
    }

    #[test]
    fn init_connects() {
        let mut transport = ScriptedTransport::new();
        transport.expect(&CONNECT, &CONNECTED);
        let mut ac = adapter(transport);
        ac.init().unwrap();
        assert!(ac.is_connected());
        assert_eq!(ac.link().transport().line, Some(Mitsubishi::<ScriptedTransport, SimClock>::LINE_CONFIG));
    }

    #[test]
    fn init_without_reply_is_not_connected() {
        let mut ac = adapter(ScriptedTransport::new());
        assert_eq!(ac.init(), Err(Error::NotConnected));
        assert!(!ac.is_connected());
    }

    #[test]
    fn get_state_decodes_settings() {
        let mut transport = ScriptedTransport::new();
        transport.expect(&CONNECT, &CONNECTED).expect(&GET_SETTINGS, &settings_reply());
        let mut ac = adapter(transport);
        ac.init().unwrap();

        let settings = ac.get_state().unwrap();
        assert_eq!(
            settings,
            ClimateSettings {
                action: Action::On,
                temperature: 25,
                fan_speed: FanSpeed::High,
                mode: Mode::Cold,
                vane_mode: VaneMode::Swing,
            }
        );
    }

    #[test]
    fn get_state_reconnects_transparently() {
        let mut transport = ScriptedTransport::new();
        transport.expect(&CONNECT, &CONNECTED).expect(&GET_SETTINGS, &settings_reply());
        let mut ac = adapter(transport);
        assert!(ac.get_state().is_ok());
        assert!(ac.is_connected());
    }

    #[test]
    fn failed_get_state_disconnects() {
        let mut transport = ScriptedTransport::new();
        transport.expect(&CONNECT, &CONNECTED);
        let mut ac = adapter(transport);
        ac.init().unwrap();
        assert_eq!(ac.get_state(), Err(Error::Timeout));
        assert!(!ac.is_connected());
    }

    #[test]
    fn bad_checksum_is_tolerated() {
        let mut reply = settings_reply();
        reply[21] ^= 0xff;
        let mut transport = ScriptedTransport::new();
        transport.expect(&CONNECT, &CONNECTED).expect(&GET_SETTINGS, &reply);
        let mut ac = adapter(transport);
        ac.init().unwrap();
        assert_eq!(ac.get_state().map(|s| s.temperature), Ok(25));
    }

    #[test]
    fn set_state_requires_set_response() {
        let settings = ClimateSettings { action: Action::On, temperature: 21, ..Default::default() };
        let mut request = [0u8; 22];
        Packet(SetRequest(&settings)).encode(&mut request).unwrap();

        let mut ack = [0u8; 22];
        Frame::new(DataType::SetResponse, &[0u8; 16]).encode(&mut ack).unwrap();

        let mut transport = ScriptedTransport::new();
        transport.expect(&CONNECT, &CONNECTED).expect(&request, &ack).expect(&request, &CONNECTED);
        let mut ac = adapter(transport);
        ac.init().unwrap();
        assert_eq!(ac.set_state(&settings), Ok(()));
        assert_eq!(ac.set_state(&settings), Err(Error::InvalidReply));
    }
}
