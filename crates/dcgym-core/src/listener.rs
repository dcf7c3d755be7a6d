//! Observing processed events.

use crate::event::Event;

/// Trait for observers invoked after each processed event.
///
/// Listeners are registered via [`Simulation::add_listener`](crate::Simulation::add_listener)
/// and fire after the event has been delivered to its destination handler.
/// Along with the event, a listener receives the number of events still
/// pending in the queue, which allows drivers to detect the final stretch of
/// a run and inject keep-alive events to let in-flight work finish.
pub trait EventListener {
    /// Called after `event` has been processed.
    fn on_event(&mut self, event: &Event, pending_events: usize);
}
