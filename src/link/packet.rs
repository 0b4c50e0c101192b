use super::builtin::{ADDRESS_BITS_LEN, CONTROL_BITS_LEN, FLAG_BYTE};
use crate::cyclic::{self, FcsCheck};
use rand::rngs::SmallRng;
use std::fmt;

/// One link-layer packet: the interior fields of a frame. A packet lives for
/// a single transmit or receive cycle; the flag is a constant, not state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub address: u8,
    pub control: u8,
    pub data: Vec<u8>,
    pub fcs: u8,
}

impl Packet {
    pub const FLAG: u8 = FLAG_BYTE;

    /// Binds the header fields to the payload and seals them with the FCS.
    pub fn new(address: u8, control: u8, data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let fcs = cyclic::checksum(&check_bytes(address, control, &data));
        Self {
            address,
            control,
            data,
            fcs,
        }
    }

    /// The FCS scope: address, control and data octets in transmission order.
    /// The flags and the alignment pad are outside it.
    pub fn check_bytes(&self) -> Vec<u8> {
        check_bytes(self.address, self.control, &self.data)
    }

    pub fn verify_fcs(&self) -> bool {
        cyclic::verify(&self.check_bytes(), self.fcs)
    }

    pub fn detect_and_correct(&self) -> FcsCheck {
        cyclic::detect_and_correct(&self.check_bytes(), self.fcs)
    }

    /// Perturbs the data field in place while the FCS keeps its value, so the
    /// emitted frame demonstrably carries bit errors.
    pub fn corrupt(&mut self, rng: &mut SmallRng) {
        self.data = cyclic::corrupt(&self.data, rng);
    }
}

fn check_bytes(address: u8, control: u8, data: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity((ADDRESS_BITS_LEN + CONTROL_BITS_LEN) / 8 + data.len());
    bytes.push(address);
    bytes.push(control);
    bytes.extend_from_slice(data);
    bytes
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Field | Value (Hex) | Value (Binary)")?;
        writeln!(f, "---|---|---")?;
        writeln!(f, "Flag | 0x{:02X} | {:08b}", Self::FLAG, Self::FLAG)?;
        writeln!(f, "Address | 0x{:02X} | {:08b}", self.address, self.address)?;
        writeln!(f, "Control | 0x{:02X} | {:08b}", self.control, self.control)?;
        writeln!(
            f,
            "Data | {} | {} (length {})",
            self.data
                .iter()
                .map(|byte| format!("{:02x}", byte))
                .collect::<String>(),
            String::from_utf8_lossy(&self.data),
            self.data.len()
        )?;
        writeln!(f, "FCS | 0x{:02X} | {:08b}", self.fcs, self.fcs)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_new_seals_fcs() {
        let packet = Packet::new(0x01, 0x00, *b"Hi");
        assert_eq!(packet.fcs, 0xFD);
        assert!(packet.verify_fcs());
    }

    #[test]
    fn test_verify_fcs_detects_mutation() {
        let mut packet = Packet::new(0x01, 0x00, *b"Hi");
        packet.data[0] ^= 0x20;
        assert!(!packet.verify_fcs());
    }

    #[test]
    fn test_corrupt_keeps_fcs_and_length() {
        let mut rng = SmallRng::seed_from_u64(17);
        let original = Packet::new(0x01, 0x00, *b"payload");
        for _ in 0..50 {
            let mut corrupted = original.clone();
            corrupted.corrupt(&mut rng);
            assert_eq!(corrupted.fcs, original.fcs);
            assert_eq!(corrupted.data.len(), original.data.len());
            assert_ne!(corrupted.data, original.data);
        }
    }

    #[test]
    fn test_detect_and_correct_roundtrip() {
        let original = Packet::new(0x01, 0x00, *b"A");
        assert_eq!(original.detect_and_correct(), FcsCheck::NoError);

        let mut single = original.clone();
        single.data = vec![0x61];
        assert_eq!(
            single.detect_and_correct(),
            FcsCheck::SingleCorrected(vec![0x01, 0x00, 0x41])
        );

        let mut double = original.clone();
        double.data = vec![0x63];
        assert_eq!(double.detect_and_correct(), FcsCheck::DoubleOrMore);
    }
}
