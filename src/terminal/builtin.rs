use std::time::Duration;

pub const BAUD_RATE: u32 = 9600;

pub const READ_TIMEOUT: Duration = Duration::from_millis(50);
pub const READ_CHUNK_BYTES_LEN: usize = 512;
pub const READ_EOF_INTERVAL: Duration = Duration::from_millis(100);
pub const READ_ERROR_INTERVAL: Duration = Duration::from_secs(1);

/// The receive accumulator is discarded whole past this many octets.
pub const RECV_BUFFER_LIMIT: usize = 1024;

pub const SEND_MAX_ATTEMPTS: usize = 16;
pub const SEND_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Pause between closing and reopening the port on a data-bits change.
pub const REOPEN_DELAY: Duration = Duration::from_millis(100);

pub const MESSAGE_CHANNEL_CAPACITY: usize = 100;
pub const PACKET_CHANNEL_CAPACITY: usize = 50;

/// Two-station topology: a port name ending in the peer suffix is the second
/// station, everything else is the first.
pub const LOCAL_STATION_ADDRESS: u8 = 0x01;
pub const PEER_STATION_ADDRESS: u8 = 0x02;
pub const PEER_PORT_SUFFIX: &str = "ttys003";

/// The control octet is reserved and always transmitted as zero.
pub const RESERVED_CONTROL: u8 = 0x00;
