//! MAVLink v1 framing.
//!
//! ```text
//!  FE | len | seq | sysid | compid | msgid | payload[len] | crc_lo | crc_hi
//! ```
//!
//! The checksum is CRC-16/MCRF4XX (MAVLink's "X.25") over everything after the start byte,
//! followed by a per-message "CRC extra" seed byte taken from a 256 entry table indexed by
//! message id.
use crc::{Crc, CRC_16_MCRF4XX};

use super::framer::Framing;

const X25: Crc<u16> = Crc::<u16>::new(&CRC_16_MCRF4XX);

/// CRC extra bytes of the common message set, indexed by message id.
#[rustfmt::skip]
pub const DEFAULT_CRC_EXTRA: [u8; 256] = [
     50, 124, 137,   0, 237, 217, 104, 119,   0,   0,
      0,  89,   0,   0,   0,   0,   0,   0,   0,   0,
    214, 159, 220, 168,  24,  23, 170, 144,  67, 115,
     39, 246, 185, 104, 237, 244, 222, 212,   9, 254,
    230,  28,  28, 132, 221, 232,  11, 153,  41,  39,
      0,   0,   0,   0,  15,   3,   0,   0,   0,   0,
      0, 153, 183,  51,  82, 118, 148,  21,   0, 243,
    124,   0,   0,  38,  20, 158, 152, 143,   0,   0,
      0, 106,  49,  22,  29,  12, 241, 233,   0, 231,
    183,  63,  54,   0,   0,   0,   0,   0,   0,   0,
    175, 102, 158, 208,  56,  93, 211, 108,  32, 185,
     84,  34,   0, 124, 119,   4,  76, 128,  56, 116,
    134, 237, 203, 250,  87, 203, 220,  25, 226,   0,
     29, 223,  85,   6, 229, 203,   1,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,  13,  49,   0,
    134, 219, 208, 188,  84,  22,  19,  21, 134,   0,
     78,  68, 189, 127, 154,  21,  21, 144,   1, 234,
     73, 181,  22,  83, 167, 138, 234, 240,  47, 189,
     52, 174,   0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,   8, 204,
     49, 170,  44,  83,  46,   0,
];

pub struct Mavlink1 {
    crc_extra: [u8; 256],
}

impl Mavlink1 {
    pub const STX: u8 = 0xFE;
    /// Header plus the 2 byte checksum.
    pub const OVERHEAD: usize = <Self as Framing>::HEADER_LEN + 2;

    pub fn new() -> Self {
        Self::with_crc_extra(DEFAULT_CRC_EXTRA)
    }

    pub fn with_crc_extra(crc_extra: [u8; 256]) -> Self {
        Mavlink1 { crc_extra }
    }

    pub fn crc_extra(&self) -> &[u8; 256] {
        &self.crc_extra
    }

    /// Checksum of a frame whose `len` byte and header are filled in; the trailing checksum
    /// bytes, if present, are ignored.
    pub fn checksum(&self, frame: &[u8]) -> u16 {
        let end = <Self as Framing>::HEADER_LEN + frame[1] as usize;
        let mut digest = X25.digest();
        digest.update(&frame[1..end]);
        digest.update(&[self.crc_extra[frame[5] as usize]]);
        digest.finalize()
    }
}

impl Default for Mavlink1 {
    fn default() -> Self {
        Self::new()
    }
}

impl Framing for Mavlink1 {
    const NAME: &'static str = "mavlink1";
    const PREAMBLE: &'static [u8] = &[Self::STX];
    // start byte, length, sequence, system, component and message id
    const HEADER_LEN: usize = 6;
    const MAX_FRAME: usize = Mavlink1::OVERHEAD + u8::MAX as usize;
    const RESYNC: usize = 1;

    fn frame_len(&self, header: &[u8]) -> usize {
        Self::OVERHEAD + header[1] as usize
    }

    fn valid_checksum(&self, frame: &[u8]) -> bool {
        let n = frame.len();
        u16::from_le_bytes([frame[n - 2], frame[n - 1]]) == self.checksum(frame)
    }
}
