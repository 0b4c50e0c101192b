use super::{
    codec,
    encode::{group_octets, EncodeFromBytes},
    packet::Packet,
};
use bitvec::prelude::*;

const GROUPS_PER_LINE: usize = 16;

/// Renders the operator-facing markdown dump of one transmission: the header
/// fields, the payload before and after the demonstration corruption, and the
/// frame bit groups before and after stuffing. `corrupted` is the packet that
/// actually went on the wire.
pub fn transmission_info(original: &Packet, corrupted: &Packet) -> String {
    let mut md = String::new();

    md.push_str(&format!(
        "**Flag:** `0x{:02X}` ({:08b})\n\n",
        Packet::FLAG,
        Packet::FLAG
    ));
    md.push_str(&format!(
        "**Sender's address:** {} ({:08b})\n\n",
        original.address, original.address
    ));
    md.push_str(&format!(
        "**Control:** {} ({:08b})\n\n",
        original.control, original.control
    ));
    md.push_str(&format!(
        "**FCS (Cyclic Code):** 0x{:02X} ({:08b})\n\n",
        original.fcs, original.fcs
    ));

    md.push_str("**Original data:**\n\n```text\n");
    md.push_str(&group_octets(&original.data.encode()));
    md.push_str("\n```\n\n");

    md.push_str("**Corrupted data:**\n\n```text\n");
    md.push_str(&group_octets(&corrupted.data.encode()));
    md.push_str("\n```\n\n");

    let mut plain = bitvec![];
    plain.extend(Packet::FLAG.view_bits::<Msb0>());
    plain.extend(corrupted.check_bytes().encode());
    plain.extend(corrupted.fcs.view_bits::<Msb0>());
    plain.extend(Packet::FLAG.view_bits::<Msb0>());

    md.push_str("**Frame before bit-stuffing:**\n\n```text\n");
    md.push_str(&octet_lines(&plain));
    md.push_str("```\n\n");

    md.push_str("**Frame after bit-stuffing:**\n\n```text\n");
    md.push_str(&octet_lines(&codec::frame(corrupted).encode()));
    md.push_str("```\n\n");

    md
}

fn octet_lines(bits: &BitSlice) -> String {
    let mut lines = String::new();
    for chunk in bits.chunks(8 * GROUPS_PER_LINE) {
        lines.push_str(&group_octets(chunk));
        lines.push('\n');
    }
    lines
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_transmission_info_sections() {
        let mut rng = SmallRng::seed_from_u64(19);
        let original = Packet::new(0x01, 0x00, *b"Hi");
        let mut corrupted = original.clone();
        corrupted.corrupt(&mut rng);

        let info = transmission_info(&original, &corrupted);
        assert!(info.contains("**Flag:** `0x0E` (00001110)"));
        assert!(info.contains("**FCS (Cyclic Code):** 0xFD"));
        assert!(info.contains("**Original data:**"));
        assert!(info.contains("**Corrupted data:**"));
        assert!(info.contains("**Frame after bit-stuffing:**"));
        // The wire frame opens and closes on the flag octet.
        assert!(info.contains("00001110"));
    }
}
