//! # Serlink Link Layer
//! The link layer turns user payloads into self-delimiting frames on a raw
//! byte stream. A frame is delimited by the flag byte on both ends; the
//! interior carries the address, control and data fields followed by the frame
//! check sequence, bit-stuffed so the flag pattern stays unambiguous and
//! zero-padded to a byte boundary before the trailing flag.
//! ## Frame structure
//! | Flag (FLAG_BITS_LEN) | Stuffed(Address ‖ Control ‖ Data ‖ FCS) | Pad (0..8) | Flag (FLAG_BITS_LEN) |

mod codec;
mod packet;
mod report;

pub mod builtin;
pub mod encode;

pub use codec::{deframe, destuff, frame, stuff};
pub use packet::Packet;
pub use report::transmission_info;
