use std::cell::RefCell;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::trace;

use crate::sink::{downgrade, Sink};

/// Fan-out of one stream to any number of sinks.
///
/// Members are held by non-owning reference. A member that has been dropped is unlinked the
/// next time the destination is written, never before.
///
/// The value returned by [Sink::write] is:
/// - `0` when there are no live members;
/// - the member's own result when exactly one member is live, so a short write is visible;
/// - `buf.len()` otherwise. Partial writes of individual members are not aggregated.
#[derive(Default)]
pub struct Destination {
    members: RefCell<Vec<Weak<dyn Sink>>>,
}

impl Destination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member. Adding the same sink twice has no effect.
    pub fn add(&self, sink: Weak<dyn Sink>) {
        let mut members = self.members.borrow_mut();
        if !members.iter().any(|m| Weak::ptr_eq(m, &sink)) {
            members.push(sink);
        }
    }

    pub fn add_sink<S: Sink + 'static>(&self, sink: &Rc<S>) {
        self.add(downgrade(sink));
    }

    pub fn clear(&self) {
        self.members.borrow_mut().clear();
    }

    /// Whether no member is linked; dropped members count until the next write.
    pub fn is_empty(&self) -> bool {
        self.members.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    /// Number of members that are still alive.
    pub fn live(&self) -> usize {
        self.members
            .borrow()
            .iter()
            .filter(|m| m.strong_count() > 0)
            .count()
    }
}

impl Sink for Destination {
    fn write(&self, buf: &[u8]) -> usize {
        // members are resolved up front so a member may add to this destination while writing
        let live: SmallVec<[Rc<dyn Sink>; 4]> = {
            let mut members = self.members.borrow_mut();
            if members.is_empty() {
                return 0;
            }
            let before = members.len();
            let mut live = SmallVec::new();
            members.retain(|m| match m.upgrade() {
                Some(sink) => {
                    live.push(sink);
                    true
                }
                None => false,
            });
            if members.len() != before {
                trace!(pruned = before - members.len(), "dropped members unlinked");
            }
            live
        };
        match live.as_slice() {
            [] => 0,
            [only] => only.write(buf),
            all => {
                for sink in all {
                    sink.write(buf);
                }
                buf.len()
            }
        }
    }
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Destination")
            .field("members", &self.len())
            .finish()
    }
}
