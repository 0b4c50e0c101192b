pub const FLAG_BYTE: u8 = 0x0E;

pub const FLAG_BITS_LEN: usize = 8;
pub const ADDRESS_BITS_LEN: usize = 8;
pub const CONTROL_BITS_LEN: usize = 8;
pub const FCS_BITS_LEN: usize = 8;

/// Address, control and FCS octets around a possibly empty data field.
pub const MIN_INTERIOR_BYTES_LEN: usize =
    (ADDRESS_BITS_LEN + CONTROL_BITS_LEN + FCS_BITS_LEN) / 8;
pub const MIN_FRAME_BITS_LEN: usize = FLAG_BITS_LEN + FLAG_BITS_LEN;

/// A stuffing zero is inserted after this many consecutive one bits.
pub const STUFF_RUN_LEN: usize = 5;
