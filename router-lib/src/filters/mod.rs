//! Protocol filters.
//!
//! A filter splits a raw byte stream into validated frames, written to its `next` output, and
//! everything else, written to its `rest` output. Filters are incremental: a frame may arrive
//! across any number of writes.
//!
//! | tag        | frames                                   |
//! |------------|------------------------------------------|
//! | `mavlink1` | MAVLink v1, CRC-16/MCRF4XX with CRC extra |
//! | `nmea`     | NMEA-0183 sentences with `*hh` checksum  |
//! | `rtcm3`    | RTCM 3 transport frames, CRC-24Q         |
//! | `ubx`      | u-blox UBX, Fletcher-8                   |
//! | `hex`      | not a framer, dumps each buffer as text  |
mod framer;
mod hex;
mod mavlink1;
mod nmea;
mod pipe;
mod rtcm3;
mod ubx;

use std::cell::RefCell;

use tracing::warn;

pub use framer::{Framer, Framing};
pub use hex::Hex;
pub use mavlink1::{Mavlink1, DEFAULT_CRC_EXTRA};
pub use nmea::Nmea;
pub use pipe::Pipe;
pub use rtcm3::Rtcm3;
pub use ubx::Ubx;

use crate::sink::Sink;
use crate::stats::StatsSnapshot;
use crate::{Error, Result};

/// Filter type and options of a route node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    /// Filter tag, `type` in the configuration.
    pub kind: Option<String>,
    /// CRC extra table for `mavlink1`; shorter tables are zero padded.
    pub crc_extra: Option<Vec<u8>>,
}

impl FilterSpec {
    pub fn new(kind: &str) -> Self {
        FilterSpec {
            kind: Some(kind.to_string()),
            crc_extra: None,
        }
    }

    #[must_use]
    pub fn with_crc_extra(mut self, crc_extra: Vec<u8>) -> Self {
        self.crc_extra = Some(crc_extra);
        self
    }
}

pub enum Filter {
    Mavlink1(Framer<Mavlink1>),
    Nmea(Nmea),
    Rtcm3(Framer<Rtcm3>),
    Ubx(Framer<Ubx>),
    Hex(Hex),
}

impl Filter {
    /// Every tag accepted by [Filter::create].
    pub const NAMES: [&'static str; 5] = ["mavlink1", "nmea", "rtcm3", "ubx", "hex"];

    /// Create a filter with default options from its tag.
    pub fn create(name: &str) -> Option<Filter> {
        let filter = match name {
            "mavlink1" => Filter::Mavlink1(Framer::new(Mavlink1::new())),
            "nmea" => Filter::Nmea(Nmea::new()),
            "rtcm3" => Filter::Rtcm3(Framer::new(Rtcm3)),
            "ubx" => Filter::Ubx(Framer::new(Ubx)),
            "hex" => Filter::Hex(Hex::new()),
            _ => return None,
        };
        Some(filter)
    }

    /// Create a filter from a route node.
    ///
    /// Returns `Ok(None)` for an unknown tag.
    ///
    /// # Errors
    /// [Error::Filter] if the node has no type.
    pub fn from_spec(spec: &FilterSpec) -> Result<Option<Filter>> {
        let Some(kind) = spec.kind.as_deref() else {
            return Err(Error::Filter {
                filter: String::new(),
                reason: "missing filter type".to_string(),
            });
        };
        let Some(crc_extra) = &spec.crc_extra else {
            return Ok(Filter::create(kind));
        };
        if kind != "mavlink1" {
            warn!(filter = kind, "crc_extra ignored");
            return Ok(Filter::create(kind));
        }
        if crc_extra.len() > 256 {
            warn!(filter = kind, len = crc_extra.len(), "crc_extra longer than 256, truncated");
        } else if crc_extra.len() < 256 {
            warn!(filter = kind, len = crc_extra.len(), "crc_extra shorter than 256, zero padded");
        }
        let len = crc_extra.len().min(256);
        let mut table = [0u8; 256];
        table[..len].copy_from_slice(&crc_extra[..len]);
        Ok(Some(Filter::Mavlink1(Framer::new(Mavlink1::with_crc_extra(table)))))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Filter::Mavlink1(_) => <Mavlink1 as Framing>::NAME,
            Filter::Nmea(_) => "nmea",
            Filter::Rtcm3(_) => <Rtcm3 as Framing>::NAME,
            Filter::Ubx(_) => <Ubx as Framing>::NAME,
            Filter::Hex(_) => "hex",
        }
    }

    pub fn write(&mut self, buf: &[u8], pipe: &Pipe) -> usize {
        match self {
            Filter::Mavlink1(f) => f.write(buf, pipe),
            Filter::Nmea(f) => f.write(buf, pipe),
            Filter::Rtcm3(f) => f.write(buf, pipe),
            Filter::Ubx(f) => f.write(buf, pipe),
            Filter::Hex(f) => f.write(buf, pipe),
        }
    }

    /// Bytes held for an incomplete frame.
    pub fn buffered(&self) -> usize {
        match self {
            Filter::Mavlink1(f) => f.buffered(),
            Filter::Nmea(f) => f.buffered(),
            Filter::Rtcm3(f) => f.buffered(),
            Filter::Ubx(f) => f.buffered(),
            Filter::Hex(_) => 0,
        }
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filter")
            .field("name", &self.name())
            .field("buffered", &self.buffered())
            .finish()
    }
}

/// A filter wired to its outputs, as placed in a routing graph.
pub struct FilterNode {
    name: &'static str,
    filter: RefCell<Filter>,
    pipe: Pipe,
}

impl FilterNode {
    pub fn new(filter: Filter, pipe: Pipe) -> Self {
        FilterNode {
            name: filter.name(),
            filter: RefCell::new(filter),
            pipe,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn pipe(&self) -> &Pipe {
        &self.pipe
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.pipe.stats().snapshot(self.name)
    }

    /// Bytes held for an incomplete frame; 0 while the filter is writing.
    pub fn buffered(&self) -> usize {
        self.filter.try_borrow().map_or(0, |f| f.buffered())
    }
}

impl Sink for FilterNode {
    fn write(&self, buf: &[u8]) -> usize {
        // only possible when the graph loops back into this filter
        let Ok(mut filter) = self.filter.try_borrow_mut() else {
            warn!(filter = self.name, len = buf.len(), "re-entrant write dropped");
            return 0;
        };
        filter.write(buf, &self.pipe)
    }
}
