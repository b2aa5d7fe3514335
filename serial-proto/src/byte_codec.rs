//! Per-byte check code: a 5-bit payload packed with a 3-bit check code into
//! one wire byte. (spec §4.1)
//!
//! `CHECK` is a fixed constant, not a computed CRC polynomial; `unprocess`
//! relies on table equality only, never an algebraic property of the table.

use bitmatch::bitmatch;

use crate::error::CorruptByte;

#[rustfmt::skip]
const CHECK: [u8; 32] = [
    0, 3, 6, 5, 7, 4, 1, 2, 5, 6, 3, 0, 2, 1, 4, 7,
    1, 2, 7, 4, 6, 5, 0, 3, 4, 7, 2, 1, 3, 0, 5, 6,
];

/// Packs a 5-bit payload (`0..32`) into a wire byte with its check code in
/// the low 3 bits.
pub fn process(payload: u8) -> u8 {
    debug_assert!(payload < 32, "payload {} exceeds 5 bits", payload);
    (payload << 3) | CHECK[payload as usize]
}

/// Unpacks a wire byte, verifying its check code. Returns the 5-bit payload,
/// or `CorruptByte` if the check code doesn't match the table.
#[bitmatch]
pub fn unprocess(wire: u8) -> Result<u8, CorruptByte> {
    #[bitmatch]
    let "mmmm_mccc" = wire;
    if CHECK[m as usize] == c {
        Ok(m)
    } else {
        Err(CorruptByte { byte: wire })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_payload() {
        for m in 0..32u8 {
            assert_eq!(unprocess(process(m)), Ok(m));
        }
    }

    #[test]
    fn zero_payload_has_zero_check() {
        assert_eq!(process(0), 0);
    }

    #[test]
    fn rejects_mismatched_check_code() {
        // process(0) is 0x00; flipping the low check bit makes it corrupt,
        // since CHECK[0] == 0.
        assert_eq!(unprocess(0x01), Err(CorruptByte { byte: 0x01 }));
    }

    #[test]
    fn every_non_image_byte_is_corrupt() {
        let image: std::collections::HashSet<u8> = (0..32u8).map(process).collect();
        for w in 0..=255u8 {
            if image.contains(&w) {
                assert!(unprocess(w).is_ok());
            } else {
                assert!(unprocess(w).is_err());
            }
        }
    }
}
