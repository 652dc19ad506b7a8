//! u-blox UBX framing.
//!
//! ```text
//!  B5 62 | class | id | length (u16 LE) | payload[length] | ck_a | ck_b
//! ```
//!
//! The checksum is the 8-bit Fletcher pair over class, id, length and payload.
use super::framer::Framing;

#[derive(Debug, Default)]
pub struct Ubx;

impl Ubx {
    pub const SYNC: [u8; 2] = [0xB5, 0x62];

    /// Fletcher-8 `(ck_a, ck_b)` over `data`.
    pub fn checksum(data: &[u8]) -> (u8, u8) {
        data.iter().fold((0u8, 0u8), |(a, b), x| {
            let a = a.wrapping_add(*x);
            (a, b.wrapping_add(a))
        })
    }
}

impl Framing for Ubx {
    const NAME: &'static str = "ubx";
    const PREAMBLE: &'static [u8] = &Ubx::SYNC;
    const HEADER_LEN: usize = 6;
    const MAX_FRAME: usize = u16::MAX as usize + 8;
    // both sync bytes, the second can never start a frame
    const RESYNC: usize = 2;

    fn frame_len(&self, header: &[u8]) -> usize {
        usize::from(u16::from_le_bytes([header[4], header[5]])) + 8
    }

    fn valid_checksum(&self, frame: &[u8]) -> bool {
        let n = frame.len();
        Self::checksum(&frame[2..n - 2]) == (frame[n - 2], frame[n - 1])
    }
}
