use super::builtin::{FCS_ALGORITHM, SINGLE_FLIP_PROBABILITY};
use crate::link::encode::{DecodeToBytes, EncodeFromBytes};
use rand::{rngs::SmallRng, Rng};

/// Outcome of checking received bytes against their frame check sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FcsCheck {
    NoError,
    /// A single flipped bit reconciled the check; carries the corrected bytes.
    SingleCorrected(Vec<u8>),
    DoubleOrMore,
}

pub fn checksum(bytes: &[u8]) -> u8 {
    FCS_ALGORITHM.checksum(bytes)
}

pub fn verify(bytes: &[u8], fcs: u8) -> bool {
    checksum(bytes) == fcs
}

/// Recomputes the check over `bytes` and compares against the received FCS.
/// On mismatch, flips each bit of the big-endian expansion in order and
/// returns the first candidate whose checksum matches; when no single flip
/// reconciles, the error is classified as double or worse.
pub fn detect_and_correct(bytes: &[u8], fcs: u8) -> FcsCheck {
    if verify(bytes, fcs) {
        return FcsCheck::NoError;
    }

    let mut bits = bytes.encode();
    for index in 0..bits.len() {
        let flipped = !bits[index];
        bits.set(index, flipped);
        let candidate = DecodeToBytes::decode(&bits);
        if verify(&candidate, fcs) {
            return FcsCheck::SingleCorrected(candidate);
        }
        bits.set(index, !flipped);
    }

    FcsCheck::DoubleOrMore
}

/// Flips one random bit of `bytes` with probability `SINGLE_FLIP_PROBABILITY`
/// and two distinct random bits otherwise. Empty input is returned unchanged.
pub fn corrupt(bytes: &[u8], rng: &mut SmallRng) -> Vec<u8> {
    if bytes.is_empty() {
        return vec![];
    }

    let mut bits = bytes.encode();
    let first = rng.gen_range(0..bits.len());
    let flipped = !bits[first];
    bits.set(first, flipped);

    if !rng.gen_bool(SINGLE_FLIP_PROBABILITY) {
        let mut second = rng.gen_range(0..bits.len());
        while second == first {
            second = rng.gen_range(0..bits.len());
        }
        let flipped = !bits[second];
        bits.set(second, flipped);
    }

    DecodeToBytes::decode(&bits)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_checksum_known_values() {
        assert_eq!(checksum(b"123456789"), 0xF4);
        assert_eq!(checksum(&[0x01, 0x00, 0x48, 0x69]), 0xFD);
        assert_eq!(checksum(&[0x01, 0x00, 0x41]), 0xAB);
    }

    #[test]
    fn test_checksum_of_zeros_is_zero() {
        for len in 0..16 {
            assert_eq!(checksum(&vec![0u8; len]), 0x00);
        }
    }

    #[test]
    fn test_checksum_is_linear_over_xor() {
        let a = [0x13u8, 0x37, 0xAB, 0x01];
        let b = [0xC0u8, 0xFF, 0xEE, 0x42];
        let xored = a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| x ^ y)
            .collect::<Vec<_>>();
        assert_eq!(checksum(&xored), checksum(&a) ^ checksum(&b));
    }

    #[test]
    fn test_verify() {
        let bytes = [0x01u8, 0x00, 0x48, 0x69];
        assert!(verify(&bytes, checksum(&bytes)));
        assert!(!verify(&bytes, checksum(&bytes) ^ 0x01));
    }

    #[test]
    fn test_detect_no_error() {
        let bytes = [0x02u8, 0x00, 0x41];
        assert_eq!(detect_and_correct(&bytes, checksum(&bytes)), FcsCheck::NoError);
    }

    #[test]
    fn test_every_single_flip_is_corrected() {
        let original = vec![0x01u8, 0x00, 0x48, 0x69];
        let fcs = checksum(&original);
        for index in 0..original.len() * 8 {
            let mut received = original.clone();
            received[index / 8] ^= 0x80 >> (index % 8);
            assert_eq!(
                detect_and_correct(&received, fcs),
                FcsCheck::SingleCorrected(original.clone()),
                "bit {}",
                index
            );
        }
    }

    #[test]
    fn test_single_flip_in_data_field() {
        // "A" transmitted, data octet received with bit 2 flipped.
        let fcs = checksum(&[0x01, 0x00, 0x41]);
        assert_eq!(
            detect_and_correct(&[0x01, 0x00, 0x61], fcs),
            FcsCheck::SingleCorrected(vec![0x01, 0x00, 0x41])
        );
    }

    #[test]
    fn test_double_flip_is_uncorrectable() {
        // "A" transmitted, data octet received with bits 2 and 6 flipped.
        let fcs = checksum(&[0x01, 0x00, 0x41]);
        assert_eq!(
            detect_and_correct(&[0x01, 0x00, 0x63], fcs),
            FcsCheck::DoubleOrMore
        );
    }

    #[test]
    fn test_corrupt_flips_one_or_two_bits() {
        let mut rng = SmallRng::seed_from_u64(29);
        let original = vec![0x41u8, 0x42, 0x43];
        let (mut singles, mut doubles) = (0, 0);
        for _ in 0..200 {
            let corrupted = corrupt(&original, &mut rng);
            let flipped: u32 = original
                .iter()
                .zip(corrupted.iter())
                .map(|(a, b)| (a ^ b).count_ones())
                .sum();
            match flipped {
                1 => singles += 1,
                2 => doubles += 1,
                n => panic!("{} bits flipped", n),
            }
        }
        assert!(singles > 0);
        assert!(doubles > 0);
    }

    #[test]
    fn test_corrupt_empty_input() {
        let mut rng = SmallRng::seed_from_u64(31);
        assert!(corrupt(&[], &mut rng).is_empty());
    }
}
