//! Simulation events.

use std::cmp::Ordering;

use downcast_rs::{impl_downcast, Downcast};
use dyn_clone::{clone_trait_object, DynClone};
use serde::ser::Serialize;

use crate::component::Id;

/// Event identifier, assigned sequentially as events are scheduled.
pub type EventId = u64;

/// Trait that event payloads must satisfy.
///
/// Payloads are plain data structs; the blanket implementation below covers
/// every `Clone + Serialize` type, so components never implement this trait
/// by hand. The bounds exist for the engine: `Downcast` lets receivers match
/// on the concrete payload type, `DynClone` lets listeners observe events
/// after delivery, and the erased serialization feeds the discard reports.
pub trait EventData: Downcast + DynClone + erased_serde::Serialize {}

impl_downcast!(EventData);

clone_trait_object!(EventData);

erased_serde::serialize_trait_object!(EventData);

impl<T: Serialize + DynClone + 'static> EventData for T {}

/// A scheduled occurrence: at `time`, deliver `data` from `src` to `dst`.
#[derive(Clone)]
pub struct Event {
    /// Time of event occurrence.
    pub time: f64,
    /// Identifier of event source.
    pub src: Id,
    /// Identifier of event destination.
    pub dst: Id,
    /// Scheduling order, unique within one simulation.
    pub id: EventId,
    /// Event payload.
    pub data: Box<dyn EventData>,
}

impl Event {
    /// The key events are delivered by: earliest time first, scheduling
    /// order within the same instant.
    ///
    /// The second component is what keeps same-time traffic deterministic
    /// and FIFO. A burst of events landing on one step boundary (cloudlet
    /// submissions, keep-alive ticks, a completion scheduled for the exact
    /// same moment) is replayed in the order it was produced, which the
    /// dispatch and rescheduling logic built on top of this engine relies
    /// upon.
    fn delivery_key(&self) -> (f64, EventId) {
        (self.time, self.id)
    }
}

impl Eq for Event {}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // the event queue is a max-heap, so the comparison is reversed to
        // pop the smallest delivery key first
        let (time, id) = self.delivery_key();
        let (other_time, other_id) = other.delivery_key();
        other_time.total_cmp(&time).then_with(|| other_id.cmp(&id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
