//! Bitwise CRC-32 (IEEE 802.3, reflected polynomial).

const POLY_REV: u32 = 0xEDB8_8320;

/// Computes the CRC-32 of `bytes`.
///
/// Register starts at all ones, the polynomial is applied LSB-first eight
/// times per byte and the result is complemented.
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut rem = u32::MAX;
    for &byte in bytes {
        rem ^= u32::from(byte);
        for _ in 0..8 {
            rem = if rem & 1 == 1 {
                (rem >> 1) ^ POLY_REV
            } else {
                rem >> 1
            };
        }
    }
    !rem
}

/// Recomputes the checksum over `bytes` and compares it with `expected`.
pub fn verify(bytes: &[u8], expected: u32) -> bool {
    crc32(bytes) == expected
}
