//! The write capability shared by every node of a routing graph.
use std::cell::RefCell;
use std::io::Write;
use std::rc::{Rc, Weak};

use tracing::warn;

/// Anything that accepts bytes.
///
/// Writes never block. The return value is the number of bytes accepted, which may be less
/// than `buf.len()` when the ultimate transport is not writable; the remainder is dropped by
/// the caller.
pub trait Sink {
    fn write(&self, buf: &[u8]) -> usize;
}

/// Downgrade a concrete sink handle into the non-owning form stored by graph nodes.
pub fn downgrade<S: Sink + 'static>(sink: &Rc<S>) -> Weak<dyn Sink> {
    Rc::downgrade(sink) as Weak<dyn Sink>
}

/// Adapts a [std::io::Write] into a [Sink].
///
/// Errors are logged and reported as a zero-length write.
pub struct WriterSink<W: Write> {
    name: String,
    writer: RefCell<W>,
}

impl<W: Write> WriterSink<W> {
    pub fn new(name: &str, writer: W) -> Self {
        WriterSink {
            name: name.to_string(),
            writer: RefCell::new(writer),
        }
    }

    /// Flush the underlying writer.
    ///
    /// # Errors
    /// Any error returned by the writer's flush.
    pub fn flush(&self) -> std::io::Result<()> {
        self.writer.borrow_mut().flush()
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> Sink for WriterSink<W> {
    fn write(&self, buf: &[u8]) -> usize {
        let Ok(mut writer) = self.writer.try_borrow_mut() else {
            warn!(endpoint = %self.name, len = buf.len(), "re-entrant write dropped");
            return 0;
        };
        match writer.write_all(buf) {
            Ok(()) => buf.len(),
            Err(err) => {
                warn!(endpoint = %self.name, "write failed: {err}");
                0
            }
        }
    }
}

/// A sink that keeps every buffer written to it, in order.
#[derive(Debug, Default)]
pub struct Collector {
    writes: RefCell<Vec<Vec<u8>>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Individual writes, in the order received.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.borrow().clone()
    }

    /// All bytes received, concatenated.
    pub fn bytes(&self) -> Vec<u8> {
        self.writes.borrow().concat()
    }

    pub fn count(&self) -> usize {
        self.writes.borrow().len()
    }

    pub fn clear(&self) {
        self.writes.borrow_mut().clear();
    }
}

impl Sink for Collector {
    fn write(&self, buf: &[u8]) -> usize {
        self.writes.borrow_mut().push(buf.to_vec());
        buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_sink_writes_all_bytes() {
        let sink = WriterSink::new("mem", Vec::new());
        assert_eq!(sink.write(b"abc"), 3);
        assert_eq!(sink.write(b"de"), 2);
        assert_eq!(sink.into_inner(), b"abcde");
    }

    #[test]
    fn collector_keeps_write_boundaries() {
        let sink = Collector::new();
        sink.write(&[1, 2]);
        sink.write(&[3]);
        assert_eq!(sink.writes(), vec![vec![1, 2], vec![3]]);
        assert_eq!(sink.bytes(), vec![1, 2, 3]);
        assert_eq!(sink.count(), 2);
    }

    #[test]
    fn downgraded_sink_dies_with_owner() {
        let sink = Rc::new(Collector::new());
        let weak = downgrade(&sink);
        assert!(weak.upgrade().is_some());
        drop(sink);
        assert!(weak.upgrade().is_none());
    }
}
