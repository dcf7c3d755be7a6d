//! Event handling.

use crate::event::Event;

/// Trait for consuming events in simulation components.
pub trait EventHandler {
    /// Processes event.
    ///
    /// Components implement their event processing logic here, typically by
    /// matching on the payload type via the [`cast!`](crate::cast!) macro.
    fn on(&mut self, event: Event);
}

/// Matches an event against a list of payload types, destructuring the
/// matched payload into the arm's bindings.
///
/// Each arm names a payload struct and the fields to bind; the first arm
/// whose type matches consumes the payload. Arms need not be exhaustive:
/// an event whose payload matches none of the listed types is reported at
/// `ERROR` level and dropped, so a component only ever sees the traffic it
/// declared. The event's `time`, `src` and `dst` fields stay readable
/// inside the arms.
///
/// # Examples
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use serde::Serialize;
/// use dcgym_core::{cast, Event, EventHandler, Simulation, SimulationContext};
///
/// #[derive(Clone, Serialize)]
/// pub struct SomeEvent {
///     some_field: u32,
/// }
///
/// #[derive(Clone, Serialize)]
/// pub struct AnotherEvent {
///     another_field: f64,
/// }
///
/// pub struct Component {
///     ctx: SimulationContext,
/// }
///
/// impl EventHandler for Component {
///     fn on(&mut self, event: Event) {
///         cast!(match event.data {
///             SomeEvent { some_field } => {
///                 // some event processing logic...
///             }
///             AnotherEvent { another_field } => {
///                 // some event processing logic...
///             }
///         })
///     }
/// }
///
/// let mut sim = Simulation::new(123);
/// let comp_ctx = sim.create_context("comp");
/// let comp_id = sim.add_handler("comp", Rc::new(RefCell::new(Component { ctx: comp_ctx })));
/// let client_ctx = sim.create_context("client");
/// client_ctx.emit(SomeEvent { some_field: 16 }, comp_id, 1.2);
/// client_ctx.emit(AnotherEvent { another_field: 1.6 }, comp_id, 2.5);
/// sim.step_until_no_events();
/// ```
#[macro_export]
macro_rules! cast {
    ( match $event:ident.data { $( $type:ident { $($tt:tt)* } => { $($expr:tt)* } )+ } ) => {
        $(
            if $event.data.is::<$type>() {
                match $event.data.downcast::<$type>() {
                    Ok(__payload) => {
                        let $type { $($tt)* } = *__payload;
                        $($expr)*
                    }
                    Err(__payload) => {
                        $crate::log::log_unhandled_event($event.time, $event.src, $event.dst, &*__payload);
                    }
                }
            } else
        )+
        {
            $crate::log::log_unhandled_event($event.time, $event.src, $event.dst, &*$event.data);
        }
    }
}
