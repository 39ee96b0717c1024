//! Controller loop and shutdown signalling.

pub mod controller;
pub mod stop;

pub use controller::Controller;
pub use stop::{stop_channel, StopHandle, StopSignal};
