//! Trigger types.

pub mod trigger;
