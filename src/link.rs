use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::interface::{LineConfig, Transport};

/// A transport and the clock that bounds every wait on it.
///
/// All suspension in this crate happens here: [`Link::read_byte`] polls the
/// transport until a byte arrives or the deadline passes, and
/// [`Link::wait_gap`] spins out bus turnaround time. Neither returns early.
pub struct Link<T, C> {
    transport: T,
    clock: C,
    name: &'static str,
}

impl<T: Transport, C: Clock> Link<T, C> {
    /// `name` prefixes this link's log lines.
    pub fn new(transport: T, clock: C, name: &'static str) -> Self {
        Link { transport, clock, name }
    }

    pub fn open(&mut self, line: LineConfig) -> Result<()> {
        self.transport.open(line).map_err(|e| {
            log::error!("{}: failed to open transport: {}", self.name, e);
            e
        })
    }

    pub fn now_ms(&self) -> u32 {
        self.clock.now_ms()
    }

    /// Waits at most `timeout_ms` for a single byte.
    pub fn read_byte(&mut self, timeout_ms: u32) -> Result<u8> {
        let start = self.clock.now_ms();
        let mut byte = [0u8; 1];
        while self.clock.elapsed_ms(start) < timeout_ms {
            if self.transport.read(&mut byte)? == 1 {
                return Ok(byte[0]);
            }
        }
        log::debug!("{}: read timeout ({} ms)", self.name, timeout_ms);
        Err(Error::Timeout)
    }

    /// Fills `buf`, allowing `timeout_ms` for each byte.
    pub fn read_exact(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<()> {
        for slot in buf.iter_mut() {
            *slot = self.read_byte(timeout_ms)?;
        }
        Ok(())
    }

    /// Reads into `buf` until it is full or `timeout_ms` has passed in total.
    /// Returns how many bytes arrived.
    pub fn read_within(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
        let start = self.clock.now_ms();
        let mut count = 0;
        while count < buf.len() {
            if self.clock.elapsed_ms(start) > timeout_ms {
                break;
            }
            count += self.transport.read(&mut buf[count..count + 1])?;
        }
        Ok(count)
    }

    /// Discards bytes until `start` is seen.
    pub fn sync(&mut self, start: u8, timeout_ms: u32) -> Result<()> {
        loop {
            let byte = self.read_byte(timeout_ms)?;
            if byte == start {
                return Ok(());
            }
            log::warn!("{}: discarded byte 0x{:02x}", self.name, byte);
        }
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        log::trace!("{} tx: {:02x?}", self.name, bytes);
        self.transport.write(bytes).map_err(|e| {
            log::error!("{}: write failed: {}", self.name, e);
            e
        })
    }

    /// Blocks until `gap_ms` have passed since `since`.
    pub fn wait_gap(&self, since: u32, gap_ms: u32) {
        while self.clock.elapsed_ms(since) < gap_ms {}
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn release(self) -> (T, C) {
        (self.transport, self.clock)
    }
}
