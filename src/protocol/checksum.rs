//! The checksum families spoken by the supported units.
//!
//! Each function covers exactly the bytes it is given; callers slice the frame
//! to the range their vendor defines.

/// 8-bit wrapping sum.
pub fn additive(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Two's complement of the 8-bit sum, so that the covered bytes plus the
/// checksum add up to zero.
pub fn negated_sum(bytes: &[u8]) -> u8 {
    additive(bytes).wrapping_neg()
}

/// 8-bit sum XOR 0x55.
pub fn biased_sum(bytes: &[u8]) -> u8 {
    additive(bytes) ^ 0x55
}

/// XOR of every nibble, seeded with 0x03, folded into the high nibble of the
/// result with a fixed low nibble of 0x1.
pub fn nibble_xor(bytes: &[u8]) -> u8 {
    let x = bytes.iter().fold(0x03u8, |acc, b| acc ^ (b & 0x0f) ^ (b >> 4));
    ((0x0f - (x & 0x0f)) << 4) | 0x01
}

/// 0xFFFF minus both address bytes and every data byte.
pub fn subtractive16(address: u16, data: &[u8]) -> u16 {
    let [hi, lo] = address.to_be_bytes();
    data.iter()
        .fold(0xffffu16.wrapping_sub(hi as u16).wrapping_sub(lo as u16), |sum, b| {
            sum.wrapping_sub(*b as u16)
        })
}
