#![allow(dead_code)]

use std::path::PathBuf;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uav_router::filters::{Filter, FilterNode, Mavlink1, Pipe, Rtcm3, Ubx};
use uav_router::sink::{downgrade, Collector, Sink};

pub const HEARTBEAT: &str = "fe09000101000000000002035104037ddd";
pub const GPGLL: &str = "$GPGLL,4717.11634,N,00833.91297,E,124923.00,A,A*6E\r\n";
pub const RTCM_EMPTY: &str = "d3000047ea4b";
pub const UBX_ACK: &str = "b5620501020006010f38";

pub fn fixture_path(name: &str) -> PathBuf {
    let mut path =
        PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"));
    path.push("tests/fixtures");
    path.push(name);
    path
}

pub fn heartbeat() -> Vec<u8> {
    hex::decode(HEARTBEAT).unwrap()
}

/// MAVLink v1 frame with a valid checksum for the default CRC extra table.
pub fn mavlink_frame(seq: u8, msgid: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![Mavlink1::STX, payload.len() as u8, seq, 1, 1, msgid];
    frame.extend_from_slice(payload);
    let crc = Mavlink1::new().checksum(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

pub fn nmea_sentence(body: &str) -> Vec<u8> {
    let sum = body.bytes().fold(0u8, |a, b| a ^ b);
    format!("${body}*{sum:02X}\r\n").into_bytes()
}

pub fn rtcm_frame(payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u16;
    let mut frame = vec![Rtcm3::PREAMBLE, (len >> 8) as u8 & 0x03, len as u8];
    frame.extend_from_slice(payload);
    let crc = Rtcm3::checksum(&frame);
    frame.extend_from_slice(&crc.to_be_bytes()[1..]);
    frame
}

pub fn ubx_frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Ubx::SYNC.to_vec();
    frame.extend_from_slice(&[class, id]);
    frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    frame.extend_from_slice(payload);
    let (a, b) = Ubx::checksum(&frame[2..]);
    frame.extend_from_slice(&[a, b]);
    frame
}

/// A filter wired to two collectors.
pub struct Harness {
    pub node: Rc<FilterNode>,
    pub next: Rc<Collector>,
    pub rest: Rc<Collector>,
}

impl Harness {
    pub fn new(filter: &str) -> Self {
        let next = Rc::new(Collector::new());
        let rest = Rc::new(Collector::new());
        let pipe = Pipe::new()
            .with_next(downgrade(&next))
            .with_rest(downgrade(&rest));
        let filter = Filter::create(filter).unwrap();
        Harness {
            node: Rc::new(FilterNode::new(filter, pipe)),
            next,
            rest,
        }
    }

    pub fn write(&self, data: &[u8]) -> usize {
        self.node.write(data)
    }
}

/// Write `data` to `sink` in random chunks of 1 to `max` bytes.
pub fn write_chunked(sink: &dyn Sink, data: &[u8], max: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pos = 0;
    while pos < data.len() {
        let len = rng.gen_range(1..=max).min(data.len() - pos);
        sink.write(&data[pos..pos + len]);
        pos += len;
    }
}
