//! CRC16 for S101 frames
//!
//! CCITT polynomial, bit-reflected, table driven. The transmitted checksum
//! is the inverted running value, low byte first; a receiver folding the
//! frame body including the checksum ends on a fixed residue.

use crate::error::{EmberError, EmberResult};

const INITIAL_CRC: u16 = 0xFFFF;
const GOOD_CRC: u16 = 0xF0B8;
const KEY: u16 = 0x8408; // Bit-reversed 1021

/// Precomputed CRC table
static CRC_TABLE: once_cell::sync::Lazy<[u16; 256]> = once_cell::sync::Lazy::new(|| {
    let mut table = [0u16; 256];
    for b in 0..=0xFF {
        let mut v = b as u16;
        for _ in 0..8 {
            if (v & 1) == 1 {
                v = (v >> 1) ^ KEY;
            } else {
                v >>= 1;
            }
        }
        table[b as usize] = v;
    }
    table
});

/// Running CRC16 calculator
pub struct Crc16 {
    value: u16,
}

impl Crc16 {
    pub fn new() -> Self {
        Self { value: INITIAL_CRC }
    }

    /// Reset to the initial state
    pub fn reset(&mut self) {
        self.value = INITIAL_CRC;
    }

    /// Fold a single byte into the running value
    pub fn update(&mut self, byte: u8) {
        self.value = (self.value >> 8) ^ CRC_TABLE[((self.value ^ byte as u16) & 0xFF) as usize];
    }

    /// Fold a slice of bytes into the running value
    pub fn update_bytes(&mut self, data: &[u8]) {
        for &byte in data {
            self.update(byte);
        }
    }

    /// The checksum bytes to append to a frame: inverted, low byte first
    pub fn frame_bytes(&self) -> [u8; 2] {
        let inverted = self.value ^ 0xFFFF;
        [(inverted & 0xFF) as u8, (inverted >> 8) as u8]
    }

    /// Validate the residue after folding a frame body including its
    /// checksum bytes
    pub fn validate(&self) -> EmberResult<()> {
        if self.value != GOOD_CRC {
            Err(EmberError::ProtocolViolation(format!(
                "CRC has wrong value: 0x{:04X}, expected 0x{:04X}",
                self.value, GOOD_CRC
            )))
        } else {
            Ok(())
        }
    }

    /// The current running value
    pub fn value(&self) -> u16 {
        self.value
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_check_value() {
        // CRC-16/X-25 check input
        let mut crc = Crc16::new();
        crc.update_bytes(b"123456789");
        assert_eq!(crc.value() ^ 0xFFFF, 0x906E);
        assert_eq!(crc.frame_bytes(), [0x6E, 0x90]);
    }

    #[test]
    fn test_residue_over_appended_checksum() {
        let data = [0x00, 0x0E, 0x01, 0x01];
        let mut crc = Crc16::new();
        crc.update_bytes(&data);
        let checksum = crc.frame_bytes();

        let mut check = Crc16::new();
        check.update_bytes(&data);
        check.update_bytes(&checksum);
        check.validate().unwrap();
    }

    #[test]
    fn test_corruption_breaks_residue() {
        let data = [0x01, 0x02, 0x03];
        let mut crc = Crc16::new();
        crc.update_bytes(&data);
        let checksum = crc.frame_bytes();

        let mut check = Crc16::new();
        check.update_bytes(&[0x01, 0x02, 0x04]);
        check.update_bytes(&checksum);
        assert!(check.validate().is_err());
    }

    #[test]
    fn test_reset() {
        let mut crc = Crc16::new();
        crc.update(0x55);
        crc.reset();
        assert_eq!(crc.value(), INITIAL_CRC);
    }
}
