use std::rc::Weak;
use std::sync::Arc;

use crate::sink::Sink;
use crate::stats::FilterStats;

/// The two outputs of a filter.
///
/// `next` receives complete, validated frames; `rest` receives every byte that was not part
/// of one. Both targets are non-owning: writing to a target that has been dropped, or was
/// never set, is a no-op returning 0. Counters account for the bytes either way.
#[derive(Default)]
pub struct Pipe {
    next: Option<Weak<dyn Sink>>,
    rest: Option<Weak<dyn Sink>>,
    stats: Arc<FilterStats>,
}

impl Pipe {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_next(mut self, next: Weak<dyn Sink>) -> Self {
        self.next = Some(next);
        self
    }

    #[must_use]
    pub fn with_rest(mut self, rest: Weak<dyn Sink>) -> Self {
        self.rest = Some(rest);
        self
    }

    pub fn stats(&self) -> &Arc<FilterStats> {
        &self.stats
    }

    pub fn write_next(&self, buf: &[u8]) -> usize {
        self.stats.add_next(buf.len());
        forward(self.next.as_ref(), buf)
    }

    pub fn write_rest(&self, buf: &[u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        self.stats.add_rest(buf.len());
        forward(self.rest.as_ref(), buf)
    }

    pub(crate) fn bad_checksum(&self) {
        self.stats.add_bad_checksum();
    }
}

fn forward(target: Option<&Weak<dyn Sink>>, buf: &[u8]) -> usize {
    match target.and_then(Weak::upgrade) {
        Some(sink) => sink.write(buf),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::sink::{downgrade, Collector};

    #[test]
    fn unset_outputs_are_noops() {
        let pipe = Pipe::new();
        assert_eq!(pipe.write_next(&[1, 2, 3]), 0);
        assert_eq!(pipe.write_rest(&[4]), 0);
        assert_eq!(pipe.stats().packets(), 1);
        assert_eq!(pipe.stats().next_bytes(), 3);
        assert_eq!(pipe.stats().rest_bytes(), 1);
    }

    #[test]
    fn outputs_reach_their_targets() {
        let next = Rc::new(Collector::new());
        let rest = Rc::new(Collector::new());
        let pipe = Pipe::new()
            .with_next(downgrade(&next))
            .with_rest(downgrade(&rest));

        assert_eq!(pipe.write_next(&[1, 2]), 2);
        assert_eq!(pipe.write_rest(&[3]), 1);
        assert_eq!(next.bytes(), vec![1, 2]);
        assert_eq!(rest.bytes(), vec![3]);
    }

    #[test]
    fn dropped_target_stops_receiving() {
        let next = Rc::new(Collector::new());
        let pipe = Pipe::new().with_next(downgrade(&next));
        drop(next);
        assert_eq!(pipe.write_next(&[1]), 0);
    }
}
