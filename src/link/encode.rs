use bitvec::prelude::*;
use num::traits::PrimInt;

pub trait DecodeToInt<T: PrimInt> {
    fn decode(&self) -> T;
}

fn decode<T: PrimInt>(bits: &BitSlice) -> T {
    let zero = T::zero();
    let one = T::one();
    bits.iter().fold(
        zero,
        |acc, bit| if *bit { (acc << 1) | one } else { acc << 1 },
    )
}

impl<T: PrimInt> DecodeToInt<T> for BitVec {
    fn decode(&self) -> T {
        decode::<T>(self.as_bitslice())
    }
}

impl<T: PrimInt> DecodeToInt<T> for BitSlice {
    fn decode(&self) -> T {
        decode::<T>(self)
    }
}

pub trait DecodeToBytes {
    fn decode(&self) -> Vec<u8>;
}

impl DecodeToBytes for BitVec {
    fn decode(&self) -> Vec<u8> {
        DecodeToBytes::decode(self.as_bitslice())
    }
}

impl DecodeToBytes for BitSlice {
    fn decode(&self) -> Vec<u8> {
        // A trailing short group is right-padded with zeros.
        self.chunks(8)
            .map(|chunk| DecodeToInt::<u8>::decode(chunk) << (8 - chunk.len()))
            .collect()
    }
}

pub trait EncodeFromBytes {
    fn encode(&self) -> BitVec;
}

impl EncodeFromBytes for [u8] {
    fn encode(&self) -> BitVec {
        self.iter()
            .flat_map(|byte| byte.view_bits::<Msb0>())
            .collect()
    }
}

impl EncodeFromBytes for Vec<u8> {
    fn encode(&self) -> BitVec {
        self.as_slice().encode()
    }
}

/// Renders a bit string as `0`/`1` characters in space-separated octet groups.
pub fn group_octets(bits: &BitSlice) -> String {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .map(|bit| if *bit { '1' } else { '0' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}
