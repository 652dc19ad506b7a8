//! NMEA-0183 sentence framing.
//!
//! A sentence is `$`, ASCII fields, `*`, two hex digits of checksum, then CR LF. The checksum
//! is the XOR of every byte between `$` and `*`.
use tracing::{trace, warn};

use super::framer::{drive, Feed, Step};
use super::pipe::Pipe;

const PREAMBLE: u8 = b'$';
const CR: u8 = b'\r';
const LF: u8 = b'\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Before,
    Body,
    Lf,
}

#[derive(Debug)]
pub struct Nmea {
    state: State,
    line: Vec<u8>,
}

impl Nmea {
    /// Longest sentence held, terminator included.
    pub const MAX_LINE: usize = 1024;

    pub fn new() -> Self {
        Nmea {
            state: State::Before,
            line: Vec::with_capacity(Self::MAX_LINE),
        }
    }

    pub fn buffered(&self) -> usize {
        self.line.len()
    }

    pub fn write(&mut self, buf: &[u8], pipe: &Pipe) -> usize {
        drive(self, buf, pipe)
    }

    /// Whether a complete sentence, CR LF included, carries a valid `*hh` checksum.
    pub fn valid_checksum(line: &[u8]) -> bool {
        let n = line.len();
        if n < 6 || line[n - 5] != b'*' {
            return false;
        }
        let sum = line[1..n - 5].iter().fold(0u8, |a, b| a ^ b);
        match (hex_digit(line[n - 4]), hex_digit(line[n - 3])) {
            (Some(hi), Some(lo)) => sum == (hi << 4 | lo),
            _ => false,
        }
    }

    fn resync(&mut self, pipe: &Pipe) -> Vec<u8> {
        pipe.write_rest(&self.line[..1]);
        let replay = self.line.split_off(1);
        self.line.clear();
        self.state = State::Before;
        replay
    }
}

impl Default for Nmea {
    fn default() -> Self {
        Self::new()
    }
}

fn hex_digit(b: u8) -> Option<u8> {
    char::from(b).to_digit(16).map(|d| d as u8)
}

impl Feed for Nmea {
    fn feed(&mut self, data: &[u8], pipe: &Pipe) -> Step {
        let mut pos = 0;
        while pos < data.len() {
            match self.state {
                State::Before => {
                    let Some(idx) = data[pos..].iter().position(|&b| b == PREAMBLE) else {
                        pipe.write_rest(&data[pos..]);
                        pos = data.len();
                        break;
                    };
                    pipe.write_rest(&data[pos..pos + idx]);
                    pos += idx + 1;
                    self.line.clear();
                    self.line.push(PREAMBLE);
                    self.state = State::Body;
                }
                State::Body => {
                    let cr = data[pos..].iter().position(|&b| b == CR);
                    let take = cr.unwrap_or(data.len() - pos);
                    // room must remain for CR LF
                    if self.line.len() + take > Self::MAX_LINE - 2 {
                        warn!(filter = "nmea", len = self.line.len() + take, "sentence too long");
                        return Step::resync(pos, self.resync(pipe));
                    }
                    self.line.extend_from_slice(&data[pos..pos + take]);
                    pos += take;
                    if cr.is_some() {
                        self.line.push(CR);
                        pos += 1;
                        self.state = State::Lf;
                    }
                }
                State::Lf => {
                    self.state = State::Before;
                    if data[pos] != LF {
                        // not a terminator, the byte is parsed again from BEFORE
                        pipe.write_rest(&self.line);
                        self.line.clear();
                        continue;
                    }
                    self.line.push(LF);
                    pos += 1;
                    if Self::valid_checksum(&self.line) {
                        trace!(filter = "nmea", len = self.line.len(), "sentence");
                        pipe.write_next(&self.line);
                        self.line.clear();
                    } else {
                        trace!(filter = "nmea", len = self.line.len(), "bad checksum");
                        pipe.bad_checksum();
                        return Step::resync(pos, self.resync(pipe));
                    }
                }
            }
        }
        Step::done(pos)
    }
}
