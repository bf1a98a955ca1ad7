//! Packet checksum
//!
//! The checksum is the number of set bits in every byte ahead of it,
//! truncated to a single byte. It catches single bit flips but is blind to
//! a flip that sets one bit paired with one that clears another, and to
//! reordered bytes.

/// Count the set bits in `bytes`, modulo 256
pub fn compute(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(byte.count_ones() as u8))
}

/// Check the checksum byte stored at `offset` against everything before it.
///
/// Returns `false` when `offset` is outside the buffer.
pub fn verify(buffer: &[u8], offset: usize) -> bool {
    match buffer.get(offset) {
        Some(&declared) => compute(&buffer[..offset]) == declared,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_counts_bits() {
        assert_eq!(compute(&[]), 0);
        assert_eq!(compute(&[0xFF]), 8);
        assert_eq!(compute(&[0x04, 0xD2, 0x80, 0x08, 0x04, 0x0A, 0x64]), 13);
    }

    #[test]
    fn test_compute_wraps() {
        // 40 bytes of 0xFF is 320 set bits
        let bytes = [0xFFu8; 40];
        assert_eq!(compute(&bytes), (320 % 256) as u8);
    }

    #[test]
    fn test_verify() {
        let buffer = [0x04, 0xD2, 0x80, 0x08, 0x04, 0x0A, 0x64, 0x0D];
        assert!(verify(&buffer, 7));
        assert!(!verify(&buffer, 6));
        assert!(!verify(&buffer, 8));
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let buffer = [0x04, 0xD2, 0x80, 0x08, 0x04, 0x0A, 0x64, 0x0D];
        for byte in 0..7 {
            for bit in 0..8 {
                let mut corrupted = buffer;
                corrupted[byte] ^= 1 << bit;
                assert!(!verify(&corrupted, 7), "flip at byte {} bit {}", byte, bit);
            }
        }
    }

    #[test]
    fn test_compensating_flips_are_missed() {
        let mut buffer = [0x04, 0xD2, 0x80, 0x08, 0x04, 0x0A, 0x64, 0x0D];
        buffer[4] = 0x02; // one bit moved within the byte
        assert!(verify(&buffer, 7));
    }
}
