//! Scripted transport and simulated clock shared by the adapter tests.

use core::cell::Cell;
use std::collections::VecDeque;
use std::vec::Vec;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::interface::{LineConfig, Transport};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A transport that answers writes from a script.
///
/// Each exchange pairs an expected request with the bytes the unit replies
/// with. A reply is only delivered once the front request has been written
/// exactly, so a test fails by timing out when an adapter sends the wrong
/// thing.
#[derive(Default)]
pub struct ScriptedTransport {
    rx: VecDeque<u8>,
    exchanges: VecDeque<(Vec<u8>, Vec<u8>)>,
    pub writes: Vec<Vec<u8>>,
    pub line: Option<LineConfig>,
    echo: bool,
    read_fails: bool,
    write_fails: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write is also received, as on a single-wire bus.
    pub fn echoing() -> Self {
        ScriptedTransport { echo: true, ..Self::default() }
    }

    pub fn expect(&mut self, request: &[u8], reply: &[u8]) -> &mut Self {
        self.exchanges.push_back((request.to_vec(), reply.to_vec()));
        self
    }

    /// Queues bytes as if the unit sent them unprompted.
    pub fn deliver(&mut self, bytes: &[u8]) -> &mut Self {
        self.rx.extend(bytes.iter().copied());
        self
    }

    pub fn fail_reads(&mut self) {
        self.read_fails = true;
    }

    pub fn fail_writes(&mut self) {
        self.write_fails = true;
    }

    pub fn pending_exchanges(&self) -> usize {
        self.exchanges.len()
    }

    pub fn unread(&self) -> usize {
        self.rx.len()
    }

    /// Every byte written, in order.
    pub fn written(&self) -> Vec<u8> {
        self.writes.concat()
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self, config: LineConfig) -> Result<()> {
        self.line = Some(config);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.line = None;
        Ok(())
    }

    fn available(&mut self) -> usize {
        self.rx.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.read_fails {
            return Err(Error::ReadError);
        }
        let mut count = 0;
        while count < buf.len() {
            match self.rx.pop_front() {
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
        if self.write_fails {
            return Err(Error::WriteError);
        }
        self.writes.push(buf.to_vec());
        if self.echo {
            self.rx.extend(buf.iter().copied());
        }
        let matched = matches!(self.exchanges.front(), Some((request, _)) if request.as_slice() == buf);
        if matched {
            if let Some((_, reply)) = self.exchanges.pop_front() {
                self.rx.extend(reply);
            }
        }
        Ok(())
    }
}

/// A clock that moves forward by one millisecond every time it is read.
pub struct SimClock {
    now: Cell<u32>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(ms: u32) -> Self {
        SimClock { now: Cell::new(ms) }
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u32 {
        let now = self.now.get();
        self.now.set(now.wrapping_add(1));
        now
    }
}
