//! Logging facilities.
//!
//! Every message carries a `[time LEVEL component]` prefix so that
//! interleaved component logs can be read as a single timeline of the run.
//! Events that the engine has to discard (no handler registered, no matching
//! payload type, rejected at scheduling time) are reported through a common
//! error path that serializes the payload for inspection.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};
use log::error;
use serde_json::json;
use serde_type_name::type_name;

use crate::component::Id;
use crate::event::{Event, EventData};

/// Applies the color to the string if stderr (log) goes to console.
pub fn get_colored(s: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        s.color(color)
    } else {
        s.normal()
    }
}

/// Shared body of the leveled logging macros: prefixes the message with the
/// current simulation time and the name of the reporting component, which is
/// also used as the log target.
#[doc(hidden)]
#[macro_export]
macro_rules! __sim_log {
    ($level:expr, $label:expr, $color:ident, $ctx:expr, $($arg:tt)+) => (
        log::log!(
            target: $ctx.name(),
            $level,
            "[{:.3} {} {}] {}",
            $ctx.time(),
            $crate::log::get_colored($label, $crate::colored::Color::$color),
            $ctx.name(),
            format_args!($($arg)+)
        )
    );
}

/// Logs a message at the info level on behalf of the component owning the
/// given context.
///
/// # Examples
///
/// ```rust
/// use std::io::Write;
/// use env_logger::Builder;
/// use dcgym_core::{log_info, Simulation, SimulationContext};
///
/// struct Component {
///     ctx: SimulationContext,
/// }
///
/// impl Component {
///     fn start(&self) {
///         log_info!(self.ctx, "started");
///     }
/// }
///
/// // configure env_logger
/// Builder::from_default_env()
///     .format(|buf, record| writeln!(buf, "{}", record.args()))
///     .init();
///
/// let mut sim = Simulation::new(123);
/// let comp = Component { ctx: sim.create_context("comp") };
/// comp.start();
/// ```
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $($arg:tt)+) => ($crate::__sim_log!(log::Level::Info, "INFO ", Green, $ctx, $($arg)+));
}

/// Logs a message at the debug level.
///
/// # Examples
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $($arg:tt)+) => ($crate::__sim_log!(log::Level::Debug, "DEBUG", Blue, $ctx, $($arg)+));
}

/// Logs a message at the trace level.
///
/// # Examples
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $($arg:tt)+) => ($crate::__sim_log!(log::Level::Trace, "TRACE", Cyan, $ctx, $($arg)+));
}

/// Logs a message at the warn level.
///
/// # Examples
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $($arg:tt)+) => ($crate::__sim_log!(log::Level::Warn, "WARN ", Yellow, $ctx, $($arg)+));
}

/// Logs a message at the error level.
///
/// # Examples
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $($arg:tt)+) => ($crate::__sim_log!(log::Level::Error, "ERROR", Red, $ctx, $($arg)+));
}

/// Common error report for every event the engine drops, with the payload
/// serialized so the discarded traffic can be reconstructed from the log.
fn report_discarded(what: &str, time: f64, src: Id, dst: Id, data: &dyn EventData) {
    error!(
        target: "simulation",
        "[{:.3} {} simulation] {} event: {}",
        time,
        get_colored("ERROR", Color::Red),
        what,
        json!({"type": type_name(&data).unwrap_or("unknown"), "data": data, "src": src, "dst": dst})
    );
}

/// Reports an event whose payload matched none of the receiver's payload
/// types.
///
/// This function is used internally in the [`cast!`](crate::cast!) macro.
pub fn log_unhandled_event(time: f64, src: Id, dst: Id, data: &dyn EventData) {
    report_discarded("Unhandled", time, src, dst, data);
}

/// Reports an event whose destination has no registered handler.
pub(crate) fn log_undelivered_event(event: &Event) {
    report_discarded("Undelivered", event.time, event.src, event.dst, &*event.data);
}

/// Reports an event rejected at scheduling time.
pub(crate) fn log_incorrect_event(event: &Event, reason: &str) {
    report_discarded(&format!("Incorrect ({})", reason), event.time, event.src, event.dst, &*event.data);
}
