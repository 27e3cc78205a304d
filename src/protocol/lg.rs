//! LG units on the 104 baud single wire bus.
//!
//! The unit and the master broadcast 13 byte status messages. Writes resend
//! the last unit status with the controlled fields replaced.

use crate::climate::Climate;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::interface::{LineConfig, Parity, Transport};
use crate::link::Link;
use crate::protocol::checksum;
use crate::types::{Action, ClimateSettings, FanSpeed, Mode, VaneMode};

pub const MSG_LEN: usize = 13;

const BYTE_TIMEOUT_MS: u32 = 500;
const STATUS_WINDOW_MS: u32 = 2000;
// Statuses drained after a read before giving up on an idle bus.
const FLUSH_BUDGET: usize = 8;
const DEFAULT_ROOM_TEMPERATURE: f32 = 20.0;

const MSG_TYPE_STATUS_MASTER: u8 = 0xa8;
const MSG_TYPE_STATUS_UNIT: u8 = 0xc8;

const MODE_COOL: u8 = 0;
const MODE_DRY: u8 = 1;
const MODE_FAN: u8 = 2;
const MODE_AUTO: u8 = 3;
const MODE_HEAT: u8 = 4;

const FAN_LOW: u8 = 0;
const FAN_MED: u8 = 1;
const FAN_HIGH: u8 = 2;
const FAN_AUTO: u8 = 3;

const POWER_ON: u8 = 0x02;
const SWING_HORIZONTAL: u8 = 0x40;
const SWING_VERTICAL: u8 = 0x80;
const HALF_DEGREE: u8 = 0x01;

pub const TEMPERATURE_RANGE: core::ops::RangeInclusive<i32> = 16..=30;

pub type Message = [u8; MSG_LEN];

fn mode_code(mode: Mode) -> u8 {
    match mode {
        Mode::Cold => MODE_COOL,
        Mode::Dry => MODE_DRY,
        Mode::Fan => MODE_FAN,
        Mode::Heat => MODE_HEAT,
        Mode::Auto | Mode::None => MODE_AUTO,
    }
}

fn mode_from_code(code: u8) -> Mode {
    match code {
        MODE_COOL => Mode::Cold,
        MODE_DRY => Mode::Dry,
        MODE_FAN => Mode::Fan,
        MODE_HEAT => Mode::Heat,
        _ => Mode::Auto,
    }
}

fn fan_code(fan: FanSpeed) -> u8 {
    match fan {
        FanSpeed::Low => FAN_LOW,
        FanSpeed::Med => FAN_MED,
        FanSpeed::High => FAN_HIGH,
        FanSpeed::Auto | FanSpeed::None => FAN_AUTO,
    }
}

fn fan_from_code(code: u8) -> FanSpeed {
    match code {
        FAN_LOW => FanSpeed::Low,
        FAN_MED => FanSpeed::Med,
        FAN_HIGH => FanSpeed::High,
        _ => FanSpeed::Auto,
    }
}

fn seal(msg: &mut Message) {
    msg[MSG_LEN - 1] = checksum::biased_sum(&msg[..MSG_LEN - 1]);
}

fn is_unit_status(msg: &Message) -> bool {
    msg[0] & 0xf8 == MSG_TYPE_STATUS_UNIT && msg[0] & 0x07 == 0
}

/// Room temperature carried in a unit status.
pub fn room_temperature_of(status: &Message) -> f32 {
    (status[7] & 0x3f) as f32 / 2.0 + 10.0
}

/// Decodes a unit status. The setpoint rounds half degrees up.
pub fn decode_status(status: &Message) -> ClimateSettings {
    let action = if status[1] & POWER_ON == 0 { Action::Off } else { Action::On };
    let mode = mode_from_code((status[1] >> 2) & 0x07);
    let fan_speed = fan_from_code((status[1] >> 5) & 0x07);

    let mut target = ((status[6] & 0x0f) + 15) as f32;
    if status[5] & HALF_DEGREE != 0 {
        target += 0.5;
    }
    let temperature = (target + 0.5) as i32;

    let vane_mode = if status[2] & SWING_VERTICAL != 0 { VaneMode::Swing } else { VaneMode::Auto };

    ClimateSettings { action, temperature, fan_speed, mode, vane_mode }
}

/// Builds a master status applying `settings` over the last unit status.
pub fn encode_settings(settings: &ClimateSettings, last: &Message) -> Message {
    let mut msg = *last;
    msg[0] = MSG_TYPE_STATUS_MASTER;

    msg[1] = 0x01;
    if settings.is_on() {
        msg[1] |= POWER_ON;
    }
    msg[1] |= (mode_code(settings.mode) & 0x07) << 2;
    msg[1] |= (fan_code(settings.fan_speed) & 0x07) << 5;

    msg[2] = last[2] & !(SWING_HORIZONTAL | SWING_VERTICAL);
    if settings.vane_mode == VaneMode::Swing {
        msg[2] |= SWING_VERTICAL;
    }
    msg[5] = last[5] & !HALF_DEGREE;

    let target = settings.clamped_temperature(TEMPERATURE_RANGE);
    msg[6] = 0x10 | ((target - 15) as u8 & 0x0f);

    seal(&mut msg);
    msg
}

fn connect_message() -> Message {
    let mut msg = [0u8; MSG_LEN];
    msg[0] = MSG_TYPE_STATUS_MASTER;
    msg[8] |= 0x40;
    msg[10] = 0x80;
    seal(&mut msg);
    msg
}

pub struct LgAircon<T, C> {
    link: Link<T, C>,
    connected: bool,
    room_temperature: f32,
    last_status: Message,
}

impl<T, C> LgAircon<T, C> {
    pub const LINE_CONFIG: LineConfig = LineConfig::new(104, Parity::None, 1);
}

impl<T: Transport, C: Clock> LgAircon<T, C> {
    pub fn new(transport: T, clock: C) -> Self {
        LgAircon {
            link: Link::new(transport, clock, "lg"),
            connected: false,
            room_temperature: DEFAULT_ROOM_TEMPERATURE,
            last_status: [0u8; MSG_LEN],
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn link(&self) -> &Link<T, C> {
        &self.link
    }

    fn read_msg(&mut self) -> Result<Message> {
        let mut msg = [0u8; MSG_LEN];
        self.link.read_exact(&mut msg, BYTE_TIMEOUT_MS)?;
        log::debug!("read: {:02x?}", msg);

        let expected = checksum::biased_sum(&msg[..MSG_LEN - 1]);
        if msg[MSG_LEN - 1] != expected {
            log::error!("invalid checksum rcv=0x{:02x}, calc=0x{:02x}", msg[MSG_LEN - 1], expected);
            return Err(Error::InvalidCrc);
        }
        Ok(msg)
    }

    /// Waits for the next unit status and caches it.
    fn read_status(&mut self) -> Result<()> {
        let start = self.link.now_ms();
        while self.link.clock().elapsed_ms(start) < STATUS_WINDOW_MS {
            match self.read_msg() {
                Ok(msg) if is_unit_status(&msg) => {
                    self.room_temperature = room_temperature_of(&msg);
                    self.last_status = msg;
                    return Ok(());
                }
                Ok(msg) => log::trace!("skipping message type 0x{:02x}", msg[0]),
                Err(_) => continue,
            }
        }
        Err(Error::Timeout)
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = false;
        self.link.write(&connect_message())?;
        self.read_status()?;
        log::info!("connected");
        self.connected = true;
        Ok(())
    }

    fn ensure_connected(&mut self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            self.connect()
        }
    }
}

impl<T: Transport, C: Clock> Climate for LgAircon<T, C> {
    fn init(&mut self) -> Result<()> {
        self.last_status = [0u8; MSG_LEN];
        self.room_temperature = DEFAULT_ROOM_TEMPERATURE;
        self.link.open(Self::LINE_CONFIG)?;
        self.connect()
    }

    fn set_state(&mut self, settings: &ClimateSettings) -> Result<()> {
        self.ensure_connected()?;

        let msg = encode_settings(settings, &self.last_status);
        self.link.write(&msg)?;
        self.read_status().map_err(|e| {
            log::warn!("no response after set_state");
            e
        })
    }

    fn get_state(&mut self) -> Result<ClimateSettings> {
        self.ensure_connected()?;
        self.read_status()?;
        let settings = decode_status(&self.last_status);

        for _ in 0..FLUSH_BUDGET {
            if self.read_status().is_err() {
                break;
            }
        }
        Ok(settings)
    }

    fn room_temperature(&mut self) -> Result<f32> {
        self.ensure_connected()?;
        Ok(self.room_temperature)
    }
}
