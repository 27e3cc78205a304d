use embedded_hal::serial;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Line settings a protocol requires. Data bits are always 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineConfig {
    pub baud_rate: u32,
    pub parity: Parity,
    pub stop_bits: u8,
}

impl LineConfig {
    pub const fn new(baud_rate: u32, parity: Parity, stop_bits: u8) -> Self {
        LineConfig { baud_rate, parity, stop_bits }
    }
}

/// A byte-oriented, half-duplex serial channel owned by exactly one adapter.
pub trait Transport {
    fn open(&mut self, config: LineConfig) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// Number of bytes that can be read without waiting.
    fn available(&mut self) -> usize;

    /// Reads whatever is already buffered into `buf`, without waiting.
    /// `Ok(0)` means nothing has arrived yet.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes all of `buf` or fails.
    fn write(&mut self, buf: &[u8]) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn open(&mut self, config: LineConfig) -> Result<()> {
        (**self).open(config)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn available(&mut self) -> usize {
        (**self).available()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write(buf)
    }
}

/// Applies a [`LineConfig`] to a HAL peripheral. HALs configure baud rate and
/// framing outside of `embedded-hal`, so the host supplies this.
pub type Configure<S> = fn(&mut S, LineConfig) -> Result<()>;

/// [`Transport`] over any `embedded-hal` serial peripheral.
///
/// ```
/// use aircon_uart::interface::{HalSerial, LineConfig, Parity, Transport};
///
/// struct Loopback(Option<u8>);
///
/// impl embedded_hal::serial::Read<u8> for Loopback {
///     type Error = ();
///     fn read(&mut self) -> nb::Result<u8, ()> {
///         self.0.take().ok_or(nb::Error::WouldBlock)
///     }
/// }
///
/// impl embedded_hal::serial::Write<u8> for Loopback {
///     type Error = ();
///     fn write(&mut self, word: u8) -> nb::Result<(), ()> {
///         self.0 = Some(word);
///         Ok(())
///     }
///     fn flush(&mut self) -> nb::Result<(), ()> {
///         Ok(())
///     }
/// }
///
/// let mut serial = HalSerial::new(Loopback(None));
/// serial.open(LineConfig::new(2400, Parity::Even, 1)).unwrap();
/// serial.write(&[0x06]).unwrap();
///
/// let mut buf = [0u8; 4];
/// assert_eq!(serial.read(&mut buf), Ok(1));
/// assert_eq!(buf[0], 0x06);
/// ```
pub struct HalSerial<S> {
    serial: S,
    configure: Option<Configure<S>>,
    peeked: Option<u8>,
    line: Option<LineConfig>,
}

impl<S> HalSerial<S>
where
    S: serial::Read<u8> + serial::Write<u8>,
{
    /// Wraps a peripheral that is already set up for the protocol's line settings.
    pub fn new(serial: S) -> Self {
        HalSerial { serial, configure: None, peeked: None, line: None }
    }

    /// Wraps a peripheral that `configure` reconfigures on every `open`.
    pub fn with_configure(serial: S, configure: Configure<S>) -> Self {
        HalSerial { serial, configure: Some(configure), peeked: None, line: None }
    }

    pub fn line(&self) -> Option<LineConfig> {
        self.line
    }

    pub fn release(self) -> S {
        self.serial
    }

    fn poll_byte(&mut self) -> Result<Option<u8>> {
        if let Some(byte) = self.peeked.take() {
            return Ok(Some(byte));
        }
        match self.serial.read() {
            Ok(byte) => Ok(Some(byte)),
            Err(nb::Error::WouldBlock) => Ok(None),
            Err(nb::Error::Other(_)) => Err(Error::ReadError),
        }
    }
}

impl<S> Transport for HalSerial<S>
where
    S: serial::Read<u8> + serial::Write<u8>,
{
    fn open(&mut self, config: LineConfig) -> Result<()> {
        if let Some(configure) = self.configure {
            configure(&mut self.serial, config).map_err(|_| Error::DeviceInitFailed)?;
        }
        log::debug!(
            "serial open: {} baud, {:?} parity, {} stop bits",
            config.baud_rate,
            config.parity,
            config.stop_bits
        );
        self.peeked = None;
        self.line = Some(config);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.line = None;
        self.peeked = None;
        Ok(())
    }

    fn available(&mut self) -> usize {
        if self.peeked.is_none() {
            self.peeked = self.poll_byte().ok().flatten();
        }
        usize::from(self.peeked.is_some())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut count = 0;
        while count < buf.len() {
            match self.poll_byte()? {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if self.line.is_none() {
            return Err(Error::InvalidState);
        }
        for &byte in buf {
            nb::block!(self.serial.write(byte)).map_err(|_| Error::WriteError)?;
        }
        nb::block!(self.serial.flush()).map_err(|_| Error::WriteError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeUart {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
        baud: u32,
    }

    impl serial::Read<u8> for FakeUart {
        type Error = ();
        fn read(&mut self) -> nb::Result<u8, ()> {
            self.rx.pop_front().ok_or(nb::Error::WouldBlock)
        }
    }

    impl serial::Write<u8> for FakeUart {
        type Error = ();
        fn write(&mut self, word: u8) -> nb::Result<(), ()> {
            self.tx.push(word);
            Ok(())
        }
        fn flush(&mut self) -> nb::Result<(), ()> {
            Ok(())
        }
    }

    fn set_baud(uart: &mut FakeUart, line: LineConfig) -> Result<()> {
        uart.baud = line.baud_rate;
        Ok(())
    }

    #[test]
    fn open_applies_line_config() {
        let mut serial = HalSerial::with_configure(FakeUart::default(), set_baud);
        serial.open(LineConfig::new(9600, Parity::Odd, 1)).unwrap();
        assert_eq!(serial.line().map(|l| l.parity), Some(Parity::Odd));
        assert_eq!(serial.release().baud, 9600);
    }

    #[test]
    fn write_requires_open() {
        let mut serial = HalSerial::new(FakeUart::default());
        assert_eq!(serial.write(&[1, 2]), Err(Error::InvalidState));
        serial.open(LineConfig::new(2400, Parity::Even, 1)).unwrap();
        serial.write(&[1, 2]).unwrap();
        assert_eq!(serial.release().tx, [1, 2]);
    }

    #[test]
    fn read_is_non_blocking() {
        let mut uart = FakeUart::default();
        uart.rx.extend([0xfc, 0x7a]);
        let mut serial = HalSerial::new(uart);

        assert_eq!(serial.available(), 1);
        let mut buf = [0u8; 4];
        assert_eq!(serial.read(&mut buf), Ok(2));
        assert_eq!(&buf[..2], &[0xfc, 0x7a]);
        assert_eq!(serial.read(&mut buf), Ok(0));
        assert_eq!(serial.available(), 0);
    }
}
