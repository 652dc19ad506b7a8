//! RTCM 3 transport framing.
//!
//! ```text
//!  D3 | 6 reserved bits + 10 bit length | payload[length] | CRC-24Q (3 bytes, big endian)
//! ```
use crc::{Crc, CRC_24_LTE_A};

use super::framer::Framing;

/// CRC-24Q, the Qualcomm CRC used by RTCM: polynomial 0x1864CFB, no reflection, zero init.
/// The crc catalogue knows it as CRC-24/LTE-A.
const CRC24Q: Crc<u32> = Crc::<u32>::new(&CRC_24_LTE_A);

#[derive(Debug, Default)]
pub struct Rtcm3;

impl Rtcm3 {
    pub const PREAMBLE: u8 = 0xD3;
    pub const MAX_PAYLOAD: usize = 0x3ff;

    pub fn checksum(data: &[u8]) -> u32 {
        CRC24Q.checksum(data)
    }
}

impl Framing for Rtcm3 {
    const NAME: &'static str = "rtcm3";
    const PREAMBLE: &'static [u8] = &[Rtcm3::PREAMBLE];
    const HEADER_LEN: usize = 3;
    const MAX_FRAME: usize = Rtcm3::MAX_PAYLOAD + 6;
    const RESYNC: usize = 1;

    fn frame_len(&self, header: &[u8]) -> usize {
        let payload = usize::from(u16::from_be_bytes([header[1], header[2]])) & Self::MAX_PAYLOAD;
        payload + 6
    }

    fn valid_checksum(&self, frame: &[u8]) -> bool {
        let (body, crc) = frame.split_at(frame.len() - 3);
        u32::from_be_bytes([0, crc[0], crc[1], crc[2]]) == Self::checksum(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc24q_check_value() {
        assert_eq!(Rtcm3::checksum(b"123456789"), 0xCDE703);
    }

    #[test]
    fn empty_message() {
        let frame = [0xD3, 0x00, 0x00, 0x47, 0xEA, 0x4B];
        assert_eq!(Rtcm3.frame_len(&frame[..3]), 6);
        assert!(Rtcm3.valid_checksum(&frame));
    }

    #[test]
    fn reserved_bits_are_ignored_in_length() {
        assert_eq!(Rtcm3.frame_len(&[0xD3, 0xFC, 0x05]), 11);
        assert_eq!(Rtcm3.frame_len(&[0xD3, 0x03, 0xFF]), 1029);
    }
}
