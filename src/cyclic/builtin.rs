use crc::{Crc, CRC_8_SMBUS};

/// Generator `0x07` (`x⁸ + x² + x + 1`), zero init, no reflection, no xor-out.
pub const FCS_ALGORITHM: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// The corruption injector flips a single bit with this probability and a
/// pair of distinct bits otherwise.
pub const SINGLE_FLIP_PROBABILITY: f64 = 0.25;
