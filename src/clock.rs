/// Monotonic millisecond time source. Wraps around after ~49 days, so callers
/// only ever compare differences.
pub trait Clock {
    fn now_ms(&self) -> u32;

    fn elapsed_ms(&self, since: u32) -> u32 {
        self.now_ms().wrapping_sub(since)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

#[cfg(feature = "std")]
pub use self::system::SystemClock;

#[cfg(feature = "std")]
mod system {
    use std::time::Instant;

    /// Milliseconds since the clock was created, from [`Instant`].
    #[derive(Debug, Clone, Copy)]
    pub struct SystemClock {
        origin: Instant,
    }

    impl SystemClock {
        pub fn new() -> Self {
            SystemClock { origin: Instant::now() }
        }
    }

    impl Default for SystemClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl super::Clock for SystemClock {
        fn now_ms(&self) -> u32 {
            self.origin.elapsed().as_millis() as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct Fixed(Cell<u32>);

    impl Clock for Fixed {
        fn now_ms(&self) -> u32 {
            self.0.get()
        }
    }

    #[test]
    fn elapsed_survives_wraparound() {
        let clock = Fixed(Cell::new(5));
        assert_eq!(clock.elapsed_ms(u32::MAX - 4), 10);
        clock.0.set(100);
        assert_eq!(clock.elapsed_ms(40), 60);
    }
}
