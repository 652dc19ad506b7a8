//! Incremental framing shared by the binary protocol filters.
//!
//! A binary frame is a preamble, a fixed-size header declaring the total frame length, then
//! payload and a trailing checksum. Parsing is a small state machine fed with whatever chunks
//! the transport delivers:
//!
//! ```text
//!   BEFORE ──preamble──▶ PREAMBLE ──▶ HEADER ──length──▶ LOAD ──checksum ok──▶ next
//!     ▲                                                   │
//!     └──────────── resync: skip prefix to rest, re-parse ┘
//! ```
//!
//! On a checksum mismatch the first [Framing::RESYNC] accumulated bytes go to `rest` and the
//! remaining accumulated bytes are parsed again before any unread input, so no byte is lost
//! or duplicated and each failure advances by at least one byte.
use tracing::{trace, warn};

use super::pipe::Pipe;

/// Outcome of feeding one chunk into a decoder.
#[derive(Debug, Default)]
pub(crate) struct Step {
    /// Bytes of the chunk consumed.
    pub consumed: usize,
    /// Previously accumulated bytes that must be parsed again before the unconsumed input.
    pub replay: Option<Vec<u8>>,
}

impl Step {
    pub fn done(consumed: usize) -> Self {
        Step {
            consumed,
            replay: None,
        }
    }

    pub fn resync(consumed: usize, replay: Vec<u8>) -> Self {
        Step {
            consumed,
            replay: Some(replay),
        }
    }
}

/// A decoder that can be driven chunk by chunk.
pub(crate) trait Feed {
    /// Consume as much of `data` as possible, stopping early only to request a replay.
    fn feed(&mut self, data: &[u8], pipe: &Pipe) -> Step;
}

/// Push all of `buf` through `decoder`, processing replays depth first.
///
/// Replays are kept on an explicit stack so a long run of false frames cannot exhaust the
/// call stack.
pub(crate) fn drive<D: Feed>(decoder: &mut D, buf: &[u8], pipe: &Pipe) -> usize {
    let mut pending: Vec<(Vec<u8>, usize)> = Vec::new();
    let mut pos = 0;
    loop {
        let replay = match pending.last_mut() {
            Some((segment, offset)) => {
                if *offset >= segment.len() {
                    pending.pop();
                    continue;
                }
                let step = decoder.feed(&segment[*offset..], pipe);
                *offset += step.consumed;
                step.replay
            }
            None => {
                if pos >= buf.len() {
                    break;
                }
                let step = decoder.feed(&buf[pos..], pipe);
                pos += step.consumed;
                step.replay
            }
        };
        if let Some(replay) = replay.filter(|r| !r.is_empty()) {
            pending.push((replay, 0));
        }
    }
    buf.len()
}

/// Protocol description for [Framer].
pub trait Framing {
    /// Name used in logs and stats.
    const NAME: &'static str;
    /// Bytes that start every frame.
    const PREAMBLE: &'static [u8];
    /// Bytes, including the preamble, needed before the frame length is known.
    const HEADER_LEN: usize;
    /// Largest frame the protocol can declare.
    const MAX_FRAME: usize;
    /// Bytes sent to `rest` after a checksum failure.
    const RESYNC: usize;

    /// Total frame length declared by a complete header.
    fn frame_len(&self, header: &[u8]) -> usize;

    /// Whether a complete frame carries a valid checksum.
    fn valid_checksum(&self, frame: &[u8]) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Before,
    Preamble,
    Header,
    Load(usize),
}

/// Preamble/header/length/checksum state machine for a [Framing] protocol.
pub struct Framer<F> {
    proto: F,
    state: State,
    packet: Vec<u8>,
}

impl<F: Framing> Framer<F> {
    pub(crate) fn new(proto: F) -> Self {
        Framer {
            proto,
            state: State::Before,
            packet: Vec::with_capacity(F::HEADER_LEN),
        }
    }

    /// Number of bytes held for a frame that is not complete yet.
    pub fn buffered(&self) -> usize {
        self.packet.len()
    }

    pub fn write(&mut self, buf: &[u8], pipe: &Pipe) -> usize {
        drive(self, buf, pipe)
    }

    // Append from `data` until the packet holds `target` bytes; returns bytes taken.
    fn fill(&mut self, data: &[u8], target: usize) -> usize {
        let take = target.saturating_sub(self.packet.len()).min(data.len());
        self.packet.extend_from_slice(&data[..take]);
        take
    }

    fn resync(&mut self, skip: usize, pipe: &Pipe) -> Vec<u8> {
        let skip = skip.min(self.packet.len());
        pipe.write_rest(&self.packet[..skip]);
        let replay = self.packet.split_off(skip);
        self.packet.clear();
        self.state = State::Before;
        replay
    }
}

impl<F: Framing> Feed for Framer<F> {
    fn feed(&mut self, data: &[u8], pipe: &Pipe) -> Step {
        let mut pos = 0;
        while pos < data.len() {
            match self.state {
                State::Before => {
                    let start = F::PREAMBLE[0];
                    let Some(idx) = data[pos..].iter().position(|&b| b == start) else {
                        pipe.write_rest(&data[pos..]);
                        pos = data.len();
                        break;
                    };
                    pipe.write_rest(&data[pos..pos + idx]);
                    pos += idx + 1;
                    self.packet.clear();
                    self.packet.push(start);
                    self.state = if F::PREAMBLE.len() > 1 {
                        State::Preamble
                    } else {
                        State::Header
                    };
                }
                State::Preamble => {
                    let b = data[pos];
                    if b != F::PREAMBLE[self.packet.len()] {
                        // the mismatching byte is not consumed, it may start the next frame
                        return Step::resync(pos, self.resync(1, pipe));
                    }
                    self.packet.push(b);
                    pos += 1;
                    if self.packet.len() == F::PREAMBLE.len() {
                        self.state = State::Header;
                    }
                }
                State::Header => {
                    pos += self.fill(&data[pos..], F::HEADER_LEN);
                    if self.packet.len() == F::HEADER_LEN {
                        let len = self.proto.frame_len(&self.packet);
                        if len > F::MAX_FRAME || len <= F::HEADER_LEN {
                            warn!(filter = F::NAME, len, "declared frame length out of range");
                            return Step::resync(pos, self.resync(F::RESYNC, pipe));
                        }
                        self.packet.reserve(len - self.packet.len());
                        self.state = State::Load(len);
                    }
                }
                State::Load(len) => {
                    pos += self.fill(&data[pos..], len);
                    if self.packet.len() == len {
                        if self.proto.valid_checksum(&self.packet) {
                            trace!(filter = F::NAME, len, "frame");
                            pipe.write_next(&self.packet);
                            self.packet.clear();
                            self.state = State::Before;
                        } else {
                            trace!(filter = F::NAME, len, "bad checksum");
                            pipe.bad_checksum();
                            return Step::resync(pos, self.resync(F::RESYNC, pipe));
                        }
                    }
                }
            }
        }
        Step::done(pos)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::sink::{downgrade, Collector};

    /// `AA 55 <len> <payload...> <sum>`: sum is the wrapping sum of the payload.
    struct Toy;

    impl Framing for Toy {
        const NAME: &'static str = "toy";
        const PREAMBLE: &'static [u8] = &[0xAA, 0x55];
        const HEADER_LEN: usize = 3;
        const MAX_FRAME: usize = 20;
        const RESYNC: usize = 1;

        fn frame_len(&self, header: &[u8]) -> usize {
            header[2] as usize + 4
        }

        fn valid_checksum(&self, frame: &[u8]) -> bool {
            let (body, sum) = frame.split_at(frame.len() - 1);
            body[3..].iter().fold(0u8, |a, b| a.wrapping_add(*b)) == sum[0]
        }
    }

    fn setup() -> (Framer<Toy>, Pipe, Rc<Collector>, Rc<Collector>) {
        let next = Rc::new(Collector::new());
        let rest = Rc::new(Collector::new());
        let pipe = Pipe::new()
            .with_next(downgrade(&next))
            .with_rest(downgrade(&rest));
        (Framer::new(Toy), pipe, next, rest)
    }

    #[test]
    fn frame_split_across_writes() {
        let (mut framer, pipe, next, rest) = setup();
        let frame = [0xAA, 0x55, 2, 1, 2, 3];
        for chunk in frame.chunks(1) {
            assert_eq!(framer.write(chunk, &pipe), 1);
        }
        assert_eq!(next.writes(), vec![frame.to_vec()]);
        assert_eq!(rest.count(), 0);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn garbage_before_frame_goes_to_rest() {
        let (mut framer, pipe, next, rest) = setup();
        framer.write(&[1, 2, 0xAA, 0x55, 0, 0, 9], &pipe);
        assert_eq!(next.writes(), vec![vec![0xAA, 0x55, 0, 0]]);
        assert_eq!(rest.bytes(), vec![1, 2, 9]);
    }

    #[test]
    fn preamble_mismatch_reparses_current_byte() {
        let (mut framer, pipe, next, rest) = setup();
        framer.write(&[0xAA, 0xAA, 0x55, 1, 7, 7], &pipe);
        assert_eq!(rest.bytes(), vec![0xAA]);
        assert_eq!(next.writes(), vec![vec![0xAA, 0x55, 1, 7, 7]]);
    }

    #[test]
    fn frame_hidden_in_bad_frame_is_recovered() {
        let (mut framer, pipe, next, rest) = setup();
        // outer frame declares 3 payload bytes and fails its checksum; a complete inner
        // frame starts right after the outer header
        let input = [0xAA, 0x55, 3, 0xAA, 0x55, 0, 0, 0x42];
        framer.write(&input, &pipe);
        assert_eq!(next.writes(), vec![vec![0xAA, 0x55, 0, 0]]);
        assert_eq!(rest.bytes(), vec![0xAA, 0x55, 3, 0x42]);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn oversized_length_is_resynced() {
        let (mut framer, pipe, next, rest) = setup();
        framer.write(&[0xAA, 0x55, 200, 1], &pipe);
        assert_eq!(next.count(), 0);
        assert_eq!(rest.bytes(), vec![0xAA, 0x55, 200, 1]);
    }
}
