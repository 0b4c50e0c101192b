use super::{
    builtin::{
        ADDRESS_BITS_LEN, CONTROL_BITS_LEN, FCS_BITS_LEN, FLAG_BITS_LEN, FLAG_BYTE,
        MIN_FRAME_BITS_LEN, MIN_INTERIOR_BYTES_LEN, STUFF_RUN_LEN,
    },
    encode::{DecodeToBytes, EncodeFromBytes},
    packet::Packet,
};
use bitvec::prelude::*;

/// Inserts a zero after every run of five consecutive one bits. The run
/// counter resets on every zero, original or inserted, so the flag pattern can
/// never straddle a stuffed interior unnoticed.
pub fn stuff(bits: &BitSlice) -> BitVec {
    let mut stuffed = BitVec::with_capacity(bits.len() + bits.len() / STUFF_RUN_LEN);
    let mut run = 0usize;
    for bit in bits {
        stuffed.push(*bit);
        if *bit {
            run += 1;
            if run == STUFF_RUN_LEN {
                stuffed.push(false);
                run = 0;
            }
        } else {
            run = 0;
        }
    }
    stuffed
}

/// Drops the bit following every run of five consecutive one bits.
pub fn destuff(bits: &BitSlice) -> BitVec {
    let mut destuffed = BitVec::with_capacity(bits.len());
    let mut run = 0usize;
    let mut skip = false;
    for bit in bits {
        if skip {
            skip = false;
            continue;
        }
        destuffed.push(*bit);
        if *bit {
            run += 1;
            if run == STUFF_RUN_LEN {
                skip = true;
                run = 0;
            }
        } else {
            run = 0;
        }
    }
    destuffed
}

/// Serializes a packet into its wire frame: the interior fields are stuffed as
/// one bit string, zero-padded to a byte boundary and wrapped in flag bytes.
/// The flags themselves are never stuffed.
pub fn frame(packet: &Packet) -> Vec<u8> {
    let mut bits = bitvec![];
    bits.extend(&packet.address.view_bits::<Msb0>()[..ADDRESS_BITS_LEN]);
    bits.extend(&packet.control.view_bits::<Msb0>()[..CONTROL_BITS_LEN]);
    bits.extend(packet.data.encode());
    bits.extend(&packet.fcs.view_bits::<Msb0>()[..FCS_BITS_LEN]);

    let mut interior = stuff(&bits);
    let pad = (8 - interior.len() % 8) % 8;
    interior.extend(std::iter::repeat(false).take(pad));

    let mut bytes = vec![FLAG_BYTE];
    bytes.extend(DecodeToBytes::decode(&interior));
    bytes.push(FLAG_BYTE);
    bytes
}

/// Parses a flag-delimited candidate frame, inclusive of both flags. Returns
/// `None` when the candidate is shorter than two flags, when either delimiter
/// is wrong, or when the destuffed interior is structurally too short.
pub fn deframe(bytes: &[u8]) -> Option<Packet> {
    if bytes.len() * 8 < MIN_FRAME_BITS_LEN {
        return None;
    }
    if bytes[0] != FLAG_BYTE || bytes[bytes.len() - 1] != FLAG_BYTE {
        return None;
    }

    let bits = bytes.encode();
    let mut interior = destuff(&bits[FLAG_BITS_LEN..bits.len() - FLAG_BITS_LEN]);

    // Undo the transmit-side pad: trim at most `len mod 8` trailing zeros,
    // then re-pad to the next byte boundary.
    let rem = interior.len() % 8;
    if rem != 0 {
        let mut trim = rem;
        while trim > 0 && interior.last().map(|bit| *bit) == Some(false) {
            interior.pop();
            trim -= 1;
        }
        let pad = (8 - interior.len() % 8) % 8;
        interior.extend(std::iter::repeat(false).take(pad));
    }

    let fields = DecodeToBytes::decode(&interior);
    if fields.len() < MIN_INTERIOR_BYTES_LEN {
        return None;
    }

    Some(Packet {
        address: fields[0],
        control: fields[1],
        data: fields[2..fields.len() - 1].to_vec(),
        fcs: fields[fields.len() - 1],
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    #[test]
    fn test_stuff_is_inverted_by_destuff() {
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..500 {
            let len = rng.gen_range(0..200);
            let bits = (0..len).map(|_| rng.gen::<bool>()).collect::<BitVec>();
            assert_eq!(destuff(&stuff(&bits)), bits);
        }
    }

    #[test]
    fn test_stuff_breaks_every_ones_run() {
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..500 {
            let len = rng.gen_range(0..200);
            let bits = (0..len).map(|_| rng.gen_bool(0.8)).collect::<BitVec>();
            let stuffed = stuff(&bits);
            let mut run = 0usize;
            for bit in &stuffed {
                if *bit {
                    run += 1;
                    assert!(run <= STUFF_RUN_LEN);
                } else {
                    run = 0;
                }
            }
        }
    }

    #[test]
    fn test_stuff_all_ones_run() {
        let bits = (0..24).map(|_| true).collect::<BitVec>();
        let stuffed = stuff(&bits);
        assert_eq!(stuffed.len(), 28);
        for (index, bit) in stuffed.iter().enumerate() {
            assert_eq!(*bit, (index + 1) % 6 != 0, "bit {}", index);
        }
        assert_eq!(destuff(&stuffed), bits);
    }

    #[test]
    fn test_frame_known_bytes() {
        let packet = Packet::new(0x01, 0x00, *b"Hi");
        assert_eq!(packet.fcs, 0xFD);
        assert_eq!(
            frame(&packet),
            vec![0x0E, 0x01, 0x00, 0x48, 0x69, 0xF6, 0x80, 0x0E]
        );
    }

    #[test]
    fn test_frame_roundtrip() {
        let mut rng = SmallRng::seed_from_u64(13);
        for _ in 0..500 {
            let len = rng.gen_range(0..32);
            let data = (0..len).map(|_| rng.gen::<u8>()).collect::<Vec<_>>();
            let packet = Packet::new(rng.gen(), rng.gen(), data);
            let parsed = deframe(&frame(&packet)).unwrap();
            assert_eq!(parsed, packet);
            assert!(parsed.verify_fcs());
        }
    }

    #[test]
    fn test_frame_roundtrip_run_across_fields() {
        // The address ends in four ones and the data begins with one, so a
        // five-ones run spans the field boundary.
        let packet = Packet::new(0x0F, 0x00, [0xFF, 0xFF, 0xFF]);
        let parsed = deframe(&frame(&packet)).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn test_frame_roundtrip_empty_data() {
        let packet = Packet::new(0x02, 0x00, vec![]);
        let parsed = deframe(&frame(&packet)).unwrap();
        assert_eq!(parsed, packet);
        assert!(parsed.data.is_empty());
    }

    #[test]
    fn test_deframe_rejects_short_candidate() {
        assert_eq!(deframe(&[0x0E]), None);
        assert_eq!(deframe(&[]), None);
    }

    #[test]
    fn test_deframe_rejects_wrong_delimiters() {
        assert_eq!(deframe(&[0x0E, 0x01, 0x00, 0xFD, 0x0F]), None);
        assert_eq!(deframe(&[0x0F, 0x01, 0x00, 0xFD, 0x0E]), None);
    }

    #[test]
    fn test_deframe_rejects_short_interior() {
        // Two adjacent flags with a single interior byte cannot hold the
        // address, control and FCS fields.
        assert_eq!(deframe(&[0x0E, 0x0E]), None);
        assert_eq!(deframe(&[0x0E, 0x01, 0x0E]), None);
    }
}
