pub mod events;
pub mod messages;
pub mod phase_clock;
pub mod state;
