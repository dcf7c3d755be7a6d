//! Simulation component identifiers.

/// Identifier of simulation component.
///
/// Identifiers are assigned sequentially starting from 0 upon the component
/// registration in [`Simulation`](crate::Simulation).
pub type Id = u32;
