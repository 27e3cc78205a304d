use crate::error::{Error, Result};

/// Something that can be written onto the wire.
pub trait Encodable {
    /// Exact number of bytes `encode` produces.
    fn encoded_len(&self) -> usize;

    /// Encodes into the front of `into`, returning the written slice.
    fn encode<'a>(&self, into: &'a mut [u8]) -> Result<&'a [u8]>;
}

/// Returns the front `len` bytes of `into`, or `InvalidParameters` when the
/// buffer is too small.
pub fn claim(into: &mut [u8], len: usize) -> Result<&mut [u8]> {
    into.get_mut(..len).ok_or(Error::InvalidParameters)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ack;

    impl Encodable for Ack {
        fn encoded_len(&self) -> usize {
            1
        }

        fn encode<'a>(&self, into: &'a mut [u8]) -> Result<&'a [u8]> {
            let out = claim(into, 1)?;
            out[0] = 0x06;
            Ok(out)
        }
    }

    #[test]
    fn encode_into_larger_buffer() {
        let mut buf = [0u8; 4];
        assert_eq!(Ack.encode(&mut buf), Ok(&[0x06][..]));
    }

    #[test]
    fn encode_into_short_buffer() {
        let mut buf = [0u8; 0];
        assert_eq!(Ack.encode(&mut buf), Err(Error::InvalidParameters));
    }
}
