use std::fmt::Write;

use super::pipe::Pipe;

/// Renders every buffer as a hex dump, 16 bytes per line, and writes the text to `next`.
///
/// ```text
/// 0000 : $GPGLL,4717.1163 24 47 50 47 4c 4c 2c 34 37 31 37 2e 31 31 36 33
/// ```
#[derive(Debug, Default)]
pub struct Hex;

impl Hex {
    pub const BYTES_PER_LINE: usize = 16;

    pub fn new() -> Self {
        Hex
    }

    pub fn dump(buf: &[u8]) -> String {
        let lines = buf.len().div_ceil(Self::BYTES_PER_LINE);
        let mut out = String::with_capacity(lines * 72);
        for (idx, chunk) in buf.chunks(Self::BYTES_PER_LINE).enumerate() {
            let ascii: String = chunk
                .iter()
                .map(|&b| match b {
                    0x20..=0x7e => char::from(b),
                    _ => '.',
                })
                .collect();
            let pairs = chunk.iter().fold(String::with_capacity(48), |mut s, b| {
                let _ = write!(s, "{b:02x} ");
                s
            });
            let _ = writeln!(
                out,
                "{:04x} : {:<17}{:<48}",
                idx * Self::BYTES_PER_LINE,
                ascii,
                pairs
            );
        }
        out
    }

    pub fn write(&self, buf: &[u8], pipe: &Pipe) -> usize {
        if buf.is_empty() {
            return 0;
        }
        pipe.write_next(Self::dump(buf).as_bytes());
        buf.len()
    }
}
