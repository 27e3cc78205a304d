//! Fujitsu units on the shared three-wire controller bus.
//!
//! The indoor unit drives the bus, sending a status frame to each controller
//! in turn. A controller only ever speaks in reply to a frame addressed to it,
//! so every operation here runs the same [`Fujitsu::poll`] cycle: read a
//! frame, classify it, wait out the frame gap and reply. A pending
//! `set_state` rides along in the next status reply.
//!
//! The adapter can act as the primary controller or, next to an existing wall
//! remote, as the secondary one.

mod frame;

pub use frame::{Address, FujiFan, FujiMode, MessageType, RawFrame};

use crate::climate::Climate;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::interface::{LineConfig, Parity, Transport};
use crate::link::Link;
use crate::types::{Action, ClimateSettings, VaneMode};

use frame::{Frame, FRAME_LEN};

const READ_TIMEOUT_MS: u32 = 1000;
const FRAME_GAP_MS: u32 = 50;

const INIT_POLLS: usize = 10;
const SET_STATE_POLLS: usize = 20;
const GET_STATE_POLLS: usize = 10;

pub const TEMPERATURE_RANGE: core::ops::RangeInclusive<i32> = 16..=30;

pub struct Fujitsu<T, C> {
    link: Link<T, C>,
    secondary: bool,
    address: u8,
    logged_in: bool,
    seen_secondary: bool,
    last_frame_ms: u32,
    pending: Option<ClimateSettings>,
    current: RawFrame,
}

impl<T, C> Fujitsu<T, C> {
    pub const LINE_CONFIG: LineConfig = LineConfig::new(500, Parity::Even, 1);
}

impl<T: Transport, C: Clock> Fujitsu<T, C> {
    /// `secondary` selects the secondary controller role.
    pub fn new(transport: T, clock: C, secondary: bool) -> Self {
        Fujitsu {
            link: Link::new(transport, clock, "fujitsu"),
            secondary,
            address: Address::Start.into(),
            logged_in: false,
            seen_secondary: false,
            last_frame_ms: 0,
            pending: None,
            current: Frame::idle(),
        }
    }

    pub fn is_secondary(&self) -> bool {
        self.secondary
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// Whether frames for a secondary controller have been seen on the bus.
    pub fn seen_secondary(&self) -> bool {
        self.seen_secondary
    }

    pub fn has_pending_update(&self) -> bool {
        self.pending.is_some()
    }

    pub fn link(&self) -> &Link<T, C> {
        &self.link
    }

    fn read_frame(&mut self) -> Result<RawFrame> {
        let mut wire = [0u8; FRAME_LEN];
        if self.link.read_within(&mut wire, READ_TIMEOUT_MS)? < FRAME_LEN {
            log::debug!("frame read timeout");
            return Err(Error::Timeout);
        }
        let frame = Frame::from_wire(wire);
        log::debug!("rx: {:02x?}", frame.0);
        Ok(frame)
    }

    fn write_frame(&mut self, frame: &RawFrame) -> Result<()> {
        log::debug!("tx: {:02x?}", frame.0);
        self.link.write(&frame.to_wire())?;

        // Our own bytes come back on the shared line.
        let mut echo = [0u8; FRAME_LEN];
        let echoed = self.link.read_within(&mut echo, READ_TIMEOUT_MS)?;
        if echoed < FRAME_LEN {
            log::debug!("only {} echo bytes read back", echoed);
        }
        Ok(())
    }

    fn process_status(&mut self, rx: &RawFrame) -> RawFrame {
        let mut tx = rx.fields_only();
        tx.set_source(self.address);
        tx.set_message_type(MessageType::Status);
        tx.set_unknown(true);
        tx.set_write(false);

        if rx.controller_present() {
            self.logged_in = true;

            if self.seen_secondary {
                tx.address(Address::Secondary, true);
                tx.set_controller_present(false);
            } else {
                tx.address(Address::Unit, false);
                tx.set_controller_present(true);
            }
            tx.set_update_magic(0);

            if let Some(update) = self.pending.take() {
                log::debug!("folding pending update into reply");
                tx.set_write(true);
                tx.set_enabled(update.action == Action::On);
                tx.set_temperature(update.clamped_temperature(TEMPERATURE_RANGE) as u8);
                tx.set_mode_raw(FujiMode::from(update.mode).into());
                tx.set_fan_raw(FujiFan::from(update.fan_speed).into());
                tx.set_swing(update.vane_mode == VaneMode::Swing);
            }

            self.current = *rx;
        } else if !self.secondary {
            tx.address(Address::Unit, false);
            tx.set_controller_present(false);
            tx.set_update_magic(0);
            tx.set_message_type(MessageType::Login);

            tx.set_enabled(false);
            tx.set_temperature(0);
            tx.set_mode_raw(0);
            tx.set_fan_raw(0);
            tx.set_swing(false);
            tx.set_swing_step(false);
            tx.set_error(false);
        } else {
            tx.address(Address::Unit, false);
            tx.set_controller_present(true);
            tx.set_update_magic(2);
        }
        tx
    }

    fn process_login(&self, rx: &RawFrame) -> RawFrame {
        let mut tx = rx.fields_only();
        tx.set_source(self.address);
        tx.address(Address::Secondary, true);
        tx.set_controller_present(true);
        tx.set_update_magic(0);
        tx.set_unknown(true);
        tx.set_write(false);

        let current = &self.current;
        tx.set_enabled(current.enabled());
        tx.set_temperature(current.temperature());
        tx.set_mode_raw(current.mode_raw());
        tx.set_fan_raw(current.fan_raw());
        tx.set_swing(current.swing());
        tx.set_swing_step(current.swing_step());
        tx.set_error(current.error());
        tx
    }

    /// Reads one frame from the bus and replies to it if it is addressed to
    /// this controller.
    pub fn poll(&mut self) -> Result<()> {
        let rx = self.read_frame()?;

        if rx.dest() != self.address {
            if rx.dest() == u8::from(Address::Secondary) {
                self.seen_secondary = true;
                self.current.set_controller_temp(rx.controller_temp());
            }
            return Ok(());
        }

        self.last_frame_ms = self.link.now_ms();

        let tx = match rx.message_type() {
            MessageType::Status => self.process_status(&rx),
            MessageType::Login => self.process_login(&rx),
            MessageType::Error => {
                log::error!("unit reported an error, code={}", u8::from(rx.error()));
                return Err(Error::UnitFault(u8::from(rx.error())));
            }
            MessageType::Unknown => {
                log::warn!("unknown message type {}", rx.type_raw());
                return Err(Error::InvalidData);
            }
        };

        self.link.wait_gap(self.last_frame_ms, FRAME_GAP_MS);
        self.write_frame(&tx)
    }

    /// Polls `count` times. Timeouts are expected while the bus is quiet.
    fn poll_for(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            match self.poll() {
                Ok(()) | Err(Error::Timeout) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn ensure_logged_in(&self) -> Result<()> {
        if self.logged_in {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

impl<T: Transport, C: Clock> Climate for Fujitsu<T, C> {
    fn init(&mut self) -> Result<()> {
        self.link.open(Self::LINE_CONFIG)?;

        let address = if self.secondary { Address::Secondary } else { Address::Primary };
        self.address = address.into();
        log::info!(
            "init as {} controller (addr={})",
            if self.secondary { "secondary" } else { "primary" },
            self.address
        );

        for _ in 0..INIT_POLLS {
            if let Err(e) = self.poll() {
                log::debug!("init poll: {}", e);
            }
        }
        Ok(())
    }

    fn set_state(&mut self, settings: &ClimateSettings) -> Result<()> {
        self.pending = Some(*settings);

        for _ in 0..SET_STATE_POLLS {
            if self.pending.is_none() {
                break;
            }
            match self.poll() {
                Ok(()) | Err(Error::Timeout) => {}
                Err(e) => return Err(e),
            }
        }

        if self.pending.is_some() {
            Err(Error::Timeout)
        } else {
            Ok(())
        }
    }

    fn get_state(&mut self) -> Result<ClimateSettings> {
        self.poll_for(GET_STATE_POLLS)?;
        self.ensure_logged_in()?;

        let current = &self.current;
        Ok(ClimateSettings {
            action: if current.enabled() { Action::On } else { Action::Off },
            temperature: current.temperature() as i32,
            fan_speed: current.fan(),
            mode: current.mode(),
            vane_mode: if current.swing() { VaneMode::Swing } else { VaneMode::Auto },
        })
    }

    fn room_temperature(&mut self) -> Result<f32> {
        self.poll_for(GET_STATE_POLLS)?;
        self.ensure_logged_in()?;
        Ok(self.current.controller_temp() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{init_logger, ScriptedTransport, SimClock};
    use crate::types::{FanSpeed, Mode};

    type Adapter = Fujitsu<ScriptedTransport, SimClock>;

    fn status_from_unit(dest: Address, present: bool) -> RawFrame {
        let mut frame = RawFrame::idle();
        frame.set_source(Address::Unit.into());
        frame.set_dest(dest.into());
        frame.set_message_type(MessageType::Status);
        frame.set_enabled(true);
        frame.set_mode_raw(FujiMode::Cool.into());
        frame.set_fan_raw(FujiFan::Medium.into());
        frame.set_temperature(24);
        frame.set_controller_present(present);
        frame.set_controller_temp(21);
        frame
    }

    /// An adapter with its address assigned, without running the init polls.
    fn adapter(transport: ScriptedTransport, secondary: bool) -> Adapter {
        init_logger();
        let mut ac = Fujitsu::new(transport, SimClock::new(), secondary);
        ac.address = if secondary { Address::Secondary } else { Address::Primary }.into();
        ac
    }

    fn last_reply(ac: &Adapter) -> RawFrame {
        let writes = &ac.link().transport().writes;
        let wire: [u8; FRAME_LEN] = writes[writes.len() - 1].as_slice().try_into().unwrap();
        RawFrame::from_wire(wire)
    }

    #[test]
    fn logged_in_status_gets_primary_reply() {
        let mut transport = ScriptedTransport::echoing();
        transport.deliver(&status_from_unit(Address::Primary, true).to_wire());
        let mut ac = adapter(transport, false);

        ac.poll().unwrap();
        assert!(ac.is_logged_in());
        let reply = last_reply(&ac);
        assert_eq!(reply.source(), u8::from(Address::Primary));
        assert_eq!(reply.dest(), u8::from(Address::Unit));
        assert!(!reply.login());
        assert!(reply.controller_present());
        assert!(reply.unknown());
        assert!(!reply.write());
        assert_eq!(reply.update_magic(), 0);
        assert_eq!(reply.temperature(), 24);
        assert_eq!(ac.link().transport().unread(), 0);
    }

    #[test]
    fn reply_waits_for_frame_gap() {
        let mut transport = ScriptedTransport::echoing();
        transport.deliver(&status_from_unit(Address::Primary, true).to_wire());
        let mut ac = adapter(transport, false);

        let before = ac.link().now_ms();
        ac.poll().unwrap();
        assert!(ac.link().clock().elapsed_ms(before) >= FRAME_GAP_MS);
    }

    #[test]
    fn bystander_frame_marks_secondary() {
        let mut to_secondary = status_from_unit(Address::Secondary, true);
        to_secondary.set_controller_temp(19);
        let mut transport = ScriptedTransport::echoing();
        transport.deliver(&to_secondary.to_wire());
        let mut ac = adapter(transport, false);

        ac.poll().unwrap();
        assert!(ac.seen_secondary());
        assert!(!ac.is_logged_in());
        assert!(ac.link().transport().writes.is_empty());
        assert_eq!(ac.current.controller_temp(), 19);
    }

    #[test]
    fn status_after_secondary_seen_addresses_secondary() {
        let mut transport = ScriptedTransport::echoing();
        transport.deliver(&status_from_unit(Address::Secondary, true).to_wire());
        transport.deliver(&status_from_unit(Address::Primary, true).to_wire());
        let mut ac = adapter(transport, false);

        ac.poll().unwrap();
        ac.poll().unwrap();
        let reply = last_reply(&ac);
        assert_eq!(reply.dest(), u8::from(Address::Secondary));
        assert!(reply.login());
        assert!(!reply.controller_present());
    }

    #[test]
    fn primary_logs_in() {
        let mut transport = ScriptedTransport::echoing();
        transport.deliver(&status_from_unit(Address::Primary, false).to_wire());
        let mut ac = adapter(transport, false);

        ac.poll().unwrap();
        assert!(!ac.is_logged_in());
        let reply = last_reply(&ac);
        assert_eq!(reply.message_type(), MessageType::Login);
        assert_eq!(reply.dest(), u8::from(Address::Unit));
        assert!(!reply.enabled());
        assert_eq!(reply.temperature(), 0);
        assert_eq!(reply.mode_raw(), 0);
        assert_eq!(reply.fan_raw(), 0);
    }

    #[test]
    fn secondary_announces_presence() {
        let mut transport = ScriptedTransport::echoing();
        transport.deliver(&status_from_unit(Address::Secondary, false).to_wire());
        let mut ac = adapter(transport, true);

        ac.poll().unwrap();
        let reply = last_reply(&ac);
        assert_eq!(reply.source(), u8::from(Address::Secondary));
        assert_eq!(reply.message_type(), MessageType::Status);
        assert!(reply.controller_present());
        assert_eq!(reply.update_magic(), 2);
    }

    #[test]
    fn login_frame_echoes_current_state() {
        let mut login = status_from_unit(Address::Primary, true);
        login.set_message_type(MessageType::Login);
        login.set_temperature(30);
        let mut transport = ScriptedTransport::echoing();
        transport.deliver(&status_from_unit(Address::Primary, true).to_wire());
        transport.deliver(&login.to_wire());
        let mut ac = adapter(transport, false);

        ac.poll().unwrap();
        ac.poll().unwrap();
        let reply = last_reply(&ac);
        assert_eq!(reply.dest(), u8::from(Address::Secondary));
        assert!(reply.login());
        assert_eq!(reply.temperature(), 24);
        assert_eq!(reply.mode(), Mode::Cold);
    }

    #[test]
    fn pending_update_is_folded_into_reply() {
        let status = status_from_unit(Address::Primary, true);
        let mut transport = ScriptedTransport::echoing();
        transport.deliver(&status.to_wire());
        let mut ac = adapter(transport, false);

        let settings = ClimateSettings {
            action: Action::On,
            temperature: 35,
            fan_speed: FanSpeed::High,
            mode: Mode::Heat,
            vane_mode: VaneMode::Swing,
        };
        assert_eq!(ac.set_state(&settings), Ok(()));
        assert!(!ac.has_pending_update());

        let reply = last_reply(&ac);
        assert!(reply.write());
        assert!(reply.enabled());
        assert_eq!(reply.temperature(), 30);
        assert_eq!(reply.mode(), Mode::Heat);
        assert_eq!(reply.fan(), FanSpeed::High);
        assert!(reply.swing());
    }

    #[test]
    fn set_state_times_out_without_unit() {
        let mut ac = adapter(ScriptedTransport::echoing(), false);
        assert_eq!(ac.set_state(&ClimateSettings::default()), Err(Error::Timeout));
        assert!(ac.has_pending_update());
    }

    #[test]
    fn error_frame_surfaces_fault() {
        let mut error = status_from_unit(Address::Primary, true);
        error.set_message_type(MessageType::Error);
        error.set_error(true);
        let mut transport = ScriptedTransport::echoing();
        transport.deliver(&error.to_wire());
        let mut ac = adapter(transport, false);
        assert_eq!(ac.poll(), Err(Error::UnitFault(1)));
    }

    #[test]
    fn unknown_frame_is_invalid_data() {
        let mut unknown = status_from_unit(Address::Primary, true);
        unknown.set_message_type(MessageType::Unknown);
        let mut transport = ScriptedTransport::echoing();
        transport.deliver(&unknown.to_wire());
        let mut ac = adapter(transport, false);
        assert_eq!(ac.poll(), Err(Error::InvalidData));
        assert!(ac.link().transport().writes.is_empty());
    }

    #[test]
    fn get_state_reads_cached_status() {
        let mut transport = ScriptedTransport::echoing();
        transport.deliver(&status_from_unit(Address::Primary, true).to_wire());
        let mut ac = adapter(transport, false);

        let settings = ac.get_state().unwrap();
        assert_eq!(settings.action, Action::On);
        assert_eq!(settings.mode, Mode::Cold);
        assert_eq!(settings.fan_speed, FanSpeed::Med);
        assert_eq!(settings.temperature, 24);
        assert_eq!(ac.room_temperature(), Ok(21.0));
    }

    #[test]
    fn get_state_before_login_is_not_connected() {
        let mut ac = adapter(ScriptedTransport::echoing(), false);
        assert_eq!(ac.get_state(), Err(Error::NotConnected));
    }

    #[test]
    fn init_takes_primary_address() {
        init_logger();
        let mut transport = ScriptedTransport::echoing();
        transport.deliver(&status_from_unit(Address::Primary, true).to_wire());
        let mut ac = Fujitsu::new(transport, SimClock::new(), false);
        assert_eq!(ac.init(), Ok(()));
        assert!(ac.is_logged_in());
        assert_eq!(ac.link().transport().line, Some(Adapter::LINE_CONFIG));
    }
}
